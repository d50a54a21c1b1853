use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::objects::tag::{Tag, TagSet};

/// An immutable view of the population, handed to sessions for reporting.
pub type Snapshot = Arc<Vec<Tag>>;

pub enum Command {
    Add(Vec<Tag>),
    Delete(Vec<Tag>),
    Retrieve,
    /// Registers a session's snapshot outlet; a session is considered to be
    /// reporting exactly while it holds a registration.
    Subscribe(usize, SyncSender<Snapshot>),
    Unsubscribe(usize),
}

struct Request {
    command: Command,
    reply: Sender<Vec<Tag>>,
}

/// Cloneable handle on the manager thread. Every call builds its own reply
/// channel, submits, and blocks until the manager answers.
#[derive(Clone)]
pub struct TagCommander {
    inbox: Arc<Mutex<Sender<Request>>>,
}

impl TagCommander {
    /// Returns the tags actually inserted; duplicates come back empty.
    pub fn add(&self, tags: Vec<Tag>) -> Result<Vec<Tag>, &'static str> {
        self.send(Command::Add(tags))
    }

    /// Returns the tags actually removed; unknown tags come back empty.
    pub fn delete(&self, tags: Vec<Tag>) -> Result<Vec<Tag>, &'static str> {
        self.send(Command::Delete(tags))
    }

    pub fn retrieve(&self) -> Result<Vec<Tag>, &'static str> {
        self.send(Command::Retrieve)
    }

    pub fn subscribe(&self, session: usize, outlet: SyncSender<Snapshot>) -> Result<(), &'static str> {
        self.send(Command::Subscribe(session, outlet)).map(|_| ())
    }

    pub fn unsubscribe(&self, session: usize) -> Result<(), &'static str> {
        self.send(Command::Unsubscribe(session)).map(|_| ())
    }

    fn send(&self, command: Command) -> Result<Vec<Tag>, &'static str> {
        let (reply, response) = mpsc::channel();
        {
            let inbox = match self.inbox.lock() {
                Ok(inbox) => inbox,
                Err(_) => return Err("unable to get inbox mutex"),
            };
            if inbox.send(Request { command, reply }).is_err() {
                return Err("tag manager is not running");
            }
        }
        response.recv().map_err(|_| "tag manager dropped the request")
    }
}

/// Spawns the manager thread. It is the sole owner of the tag set; all
/// mutation is serialized through its inbox.
pub fn start(tags: TagSet) -> (TagCommander, JoinHandle<()>) {
    let (inbox, requests) = mpsc::channel::<Request>();
    let handle = thread::spawn(move || {
        run(tags, requests);
    });
    (TagCommander { inbox: Arc::new(Mutex::new(inbox)) }, handle)
}

fn run(mut tags: TagSet, requests: Receiver<Request>) {
    let mut outlets: Vec<(usize, SyncSender<Snapshot>)> = Vec::new();
    while let Ok(request) = requests.recv() {
        let mut changed = false;
        let affected: Vec<Tag> = match request.command {
            Command::Add(list) => {
                let mut inserted = Vec::new();
                for tag in list {
                    if tags.add(tag.clone()) {
                        inserted.push(tag);
                    }
                }
                changed = !inserted.is_empty();
                inserted
            }
            Command::Delete(list) => {
                let mut removed = Vec::new();
                for tag in list {
                    if tags.remove(&tag) {
                        removed.push(tag);
                    }
                }
                changed = !removed.is_empty();
                removed
            }
            Command::Retrieve => tags.snapshot().to_vec(),
            Command::Subscribe(session, outlet) => {
                outlets.retain(|(s, _)| *s != session);
                outlets.push((session, outlet));
                Vec::new()
            }
            Command::Unsubscribe(session) => {
                outlets.retain(|(s, _)| *s != session);
                Vec::new()
            }
        };
        if changed && !outlets.is_empty() {
            debug!("tag set changed, now {} tags, notifying {} session(s)", tags.len(), outlets.len());
            let snapshot = tags.snapshot();
            // a session that is not draining its outlet misses this update
            // and catches up on the next one or its own next rebuild
            outlets.retain(|(session, outlet)| match outlet.try_send(snapshot.clone()) {
                Ok(_) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("session {session} is busy, dropping a tag update");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
        // callers may have given up waiting; that is their business
        let _ = request.reply.send(affected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tag(byte: u8) -> Tag {
        Tag::new(0x3000, vec![byte; 12])
    }

    #[test]
    fn test_add_delete_retrieve() {
        let (commander, _handle) = start(TagSet::default());
        let inserted = commander.add(vec![tag(1), tag(2)]).unwrap();
        assert_eq!(2, inserted.len());
        // adding again is a no-op with an empty reply
        let inserted = commander.add(vec![tag(1)]).unwrap();
        assert!(inserted.is_empty());
        let all = commander.retrieve().unwrap();
        assert_eq!(2, all.len());
        assert!(all[0].equal(&tag(1)));
        assert!(all[1].equal(&tag(2)));

        let removed = commander.delete(vec![tag(1)]).unwrap();
        assert_eq!(1, removed.len());
        let removed = commander.delete(vec![tag(1)]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(1, commander.retrieve().unwrap().len());
    }

    #[test]
    fn test_partial_add_reports_only_inserted() {
        let (commander, _handle) = start(TagSet::default());
        commander.add(vec![tag(5)]).unwrap();
        let inserted = commander.add(vec![tag(5), tag(6)]).unwrap();
        assert_eq!(1, inserted.len());
        assert!(inserted[0].equal(&tag(6)));
    }

    #[test]
    fn test_subscribers_get_snapshots() {
        let (commander, _handle) = start(TagSet::default());
        let (outlet, updates) = mpsc::sync_channel::<Snapshot>(4);
        commander.subscribe(7, outlet).unwrap();

        commander.add(vec![tag(1)]).unwrap();
        let snapshot = updates.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(1, snapshot.len());

        // a no-op change publishes nothing
        commander.add(vec![tag(1)]).unwrap();
        assert!(updates.recv_timeout(Duration::from_millis(50)).is_err());

        commander.delete(vec![tag(1)]).unwrap();
        let snapshot = updates.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(snapshot.is_empty());

        commander.unsubscribe(7).unwrap();
        commander.add(vec![tag(2)]).unwrap();
        assert!(updates.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
