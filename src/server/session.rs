use std::io::{ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::llrp::{self, message_types, requests};
use crate::manager::{Snapshot, TagCommander};
use crate::objects::tag::TagReportDataStack;

/// Takes the current value of a message id counter and advances it. Ids are
/// private to one session and strictly increasing across everything it sends.
pub(crate) fn next_id(counter: &Arc<Mutex<u32>>) -> u32 {
    match counter.lock() {
        Ok(mut v) => {
            let id = *v;
            *v = v.wrapping_add(1);
            id
        }
        Err(_) => 0,
    }
}

/// One LLRP session: the inbound reader runs on the spawned thread, the
/// report/keepalive loop on a second thread once the client has configured
/// the reader.
pub fn start(
    session: usize,
    stream: TcpStream,
    config: Arc<Config>,
    commander: TagCommander,
) -> JoinHandle<()> {
    thread::spawn(move || {
        run(session, stream, config, commander);
    })
}

fn run(session: usize, mut stream: TcpStream, config: Arc<Config>, commander: TagCommander) {
    let msg_id = Arc::new(Mutex::new(config.initial_message_id));
    let keepalive_id = Arc::new(Mutex::new(config.initial_keepalive_id));
    let running = Arc::new(Mutex::new(true));
    let acked = Arc::new(Mutex::new(false));

    // greeting: the reader event notification is the first thing on the wire
    let now = Utc::now().timestamp_micros() as u64;
    let greeting = requests::reader_event_notification(&next_id(&msg_id), now);
    if let Err(e) = stream.write_all(&greeting) {
        error!("error greeting the client: {e}");
        return;
    }
    debug!("<<< READER_EVENT_NOTIFICATION");

    let mut reporting = false;
    let mut reporter: Option<JoinHandle<()>> = None;
    loop {
        let (info, _body) = match llrp::read_message(&mut stream) {
            Ok(message) => message,
            Err(e) => {
                if e.kind() == ErrorKind::UnexpectedEof {
                    info!("the client is disconnected, closing LLRP connection");
                } else {
                    error!("closing LLRP connection: {e}");
                }
                break;
            }
        };
        if !reporting {
            match info.kind {
                message_types::SET_READER_CONFIG => {
                    debug!(">>> SET_READER_CONFIG");
                    let response = requests::set_reader_config_response(&next_id(&msg_id));
                    if let Err(e) = stream.write_all(&response) {
                        error!("error acknowledging reader config: {e}");
                        break;
                    }
                    debug!("<<< SET_READER_CONFIG_RESPONSE");
                    let (outlet, updates) = mpsc::sync_channel::<Snapshot>(4);
                    if commander.subscribe(session, outlet).is_err() {
                        error!("tag manager is gone, closing LLRP connection");
                        break;
                    }
                    let report_stream = match stream.try_clone() {
                        Ok(s) => s,
                        Err(e) => {
                            error!("unable to copy stream for reporting: {e}");
                            break;
                        }
                    };
                    let t_config = config.clone();
                    let t_commander = commander.clone();
                    let t_msg_id = msg_id.clone();
                    let t_keepalive_id = keepalive_id.clone();
                    let t_running = running.clone();
                    let t_acked = acked.clone();
                    reporter = Some(thread::spawn(move || {
                        report_loop(
                            report_stream,
                            updates,
                            t_config,
                            t_commander,
                            t_msg_id,
                            t_keepalive_id,
                            t_running,
                            t_acked,
                        );
                    }));
                    reporting = true;
                }
                _ => {
                    warn!("{}, resetting the connection", llrp::WireError::UnknownHeader(info.kind));
                    break;
                }
            }
        } else {
            match info.kind {
                message_types::KEEPALIVE_ACK => {
                    debug!(">>> KEEP_ALIVE_ACK");
                    if let Ok(mut a) = acked.lock() {
                        *a = true;
                    }
                }
                _ => {
                    warn!("{}, resetting the connection", llrp::WireError::UnknownHeader(info.kind));
                    break;
                }
            }
        }
    }

    // orderly teardown: stop the reporter, drop our manager registration,
    // and make sure both directions of the socket are gone
    if let Ok(mut r) = running.lock() {
        *r = false;
    }
    let _ = commander.unsubscribe(session);
    let _ = stream.shutdown(Shutdown::Both);
    if let Some(handle) = reporter {
        let _ = handle.join();
    }
    info!("session {session} closed");
}

#[allow(clippy::too_many_arguments)]
fn report_loop(
    mut stream: TcpStream,
    updates: Receiver<Snapshot>,
    config: Arc<Config>,
    commander: TagCommander,
    msg_id: Arc<Mutex<u32>>,
    keepalive_id: Arc<Mutex<u32>>,
    running: Arc<Mutex<bool>>,
    acked: Arc<Mutex<bool>>,
) {
    let report_interval = Duration::from_millis(config.report_interval_ms);
    let keepalive_interval = if config.keepalive_seconds > 0 {
        Some(Duration::from_secs(config.keepalive_seconds))
    } else {
        None
    };

    let mut trds = match commander.retrieve() {
        Ok(tags) => TagReportDataStack::build(&tags, config.max_pdu),
        Err(e) => {
            error!("unable to fetch tags for reporting: {e}");
            return;
        }
    };

    let mut next_report = Instant::now() + report_interval;
    let mut next_keepalive = keepalive_interval.map(|interval| Instant::now() + interval);
    let mut awaiting_ack = false;

    loop {
        if let Ok(r) = running.lock() {
            if !*r {
                break;
            }
        } else {
            break;
        }

        let mut deadline = next_report;
        if let Some(ka) = next_keepalive {
            if ka < deadline {
                deadline = ka;
            }
        }
        match updates.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(snapshot) => {
                // rebuild only; the fresh population goes out on the next tick
                debug!("tag set updated, rebuilding the report stack");
                trds = TagReportDataStack::build(&snapshot, config.max_pdu);
                continue;
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if now >= next_report {
            if !send_reports(&mut stream, &trds, &msg_id) {
                break;
            }
            next_report = Instant::now() + report_interval;
        }
        if let (Some(ka), Some(interval)) = (next_keepalive, keepalive_interval) {
            if now >= ka {
                let ack_received = match acked.lock() {
                    Ok(a) => *a,
                    Err(_) => false,
                };
                if awaiting_ack && !ack_received {
                    warn!("keepalive went unacknowledged, closing LLRP connection");
                    break;
                }
                debug!("<<< KEEP_ALIVE");
                if let Err(e) = stream.write_all(&requests::keepalive(&next_id(&keepalive_id))) {
                    error!("error writing keepalive: {e}");
                    break;
                }
                awaiting_ack = true;
                if let Ok(mut a) = acked.lock() {
                    *a = false;
                }
                next_keepalive = Some(Instant::now() + interval);
            }
        }
    }

    // a dead reporter means a dead session; unblock the reader too
    if let Ok(mut r) = running.lock() {
        *r = false;
    }
    let _ = stream.shutdown(Shutdown::Both);
}

fn send_reports(stream: &mut TcpStream, trds: &TagReportDataStack, msg_id: &Arc<Mutex<u32>>) -> bool {
    if trds.is_empty() {
        return true;
    }
    info!(
        "<<< RO_ACCESS_REPORT (# reports: {}, # total tags: {})",
        trds.len(),
        trds.total_tag_counts()
    );
    for trd in &trds.stack {
        let roar = requests::ro_access_report(&trd.data, &next_id(msg_id));
        if let Err(e) = stream.write_all(&roar) {
            error!("error writing report: {e}");
            return false;
        }
    }
    true
}
