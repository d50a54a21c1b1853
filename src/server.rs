use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info};

use crate::config::Config;
use crate::manager::{self, TagCommander};
use crate::network::api;
use crate::objects::tag::TagSet;
use crate::objects::tag_file;

pub mod session;

/// Runs the tag stream server: tag file, manager, admin surface, listener.
/// Returns the process exit code.
pub fn run(config: Arc<Config>, api_port: u16, file: String) -> i32 {
    info!("loading virtual tags from \"{file}\"");
    let mut tags = Vec::new();
    let path = Path::new(&file);
    if path.exists() {
        match tag_file::load(path) {
            Ok(loaded) => {
                info!("{} tags loaded from {file}", loaded.len());
                tags = loaded;
            }
            Err(e) => {
                error!("error loading tags from {file}: {e}");
                return 1;
            }
        }
    } else {
        info!("{file} doesn't exist, couldn't load tags");
    }

    let population = TagSet::new(tags);
    if population.is_empty() {
        info!("starting with an empty tag population");
    }
    let (commander, _manager) = manager::start(population);

    // admin surface; also owns signal handling and the shutdown tag save
    let api_commander = commander.clone();
    let api_file = file.clone();
    thread::spawn(move || {
        api::serve(api_port, api_commander, api_file);
    });

    let listener = match bind_listener(&config) {
        Ok(listener) => listener,
        Err(e) => {
            error!("error binding LLRP listener: {e}");
            return 1;
        }
    };
    info!("listening on {}", config.llrp_address());

    serve_llrp(listener, config, commander)
}

/// The listener socket is built by hand so SO_REUSEADDR can be set before
/// bind, which on some platforms does not work afterwards.
pub(crate) fn bind_listener(config: &Config) -> Result<TcpListener, std::io::Error> {
    let address: SocketAddr = SocketAddr::new(config.ip, config.port);
    let domain = if address.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&address.into())?;
    socket.listen(512)?;
    Ok(socket.into())
}

/// Accepts connections forever, one session per connection. The listener
/// never reads protocol bytes itself.
fn serve_llrp(listener: TcpListener, config: Arc<Config>, commander: TagCommander) -> i32 {
    info!("starting LLRP connection...");
    let mut session_counter: usize = 0;
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                session_counter += 1;
                info!("LLRP connection initiated with {addr}");
                session::start(session_counter, stream, config.clone(), commander.clone());
            }
            Err(e) => {
                error!("error accepting LLRP connection: {e}");
                return 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llrp::{self, message_types, requests};
    use crate::objects::tag::Tag;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            ip: "127.0.0.1".parse().unwrap(),
            port: 0,
            max_pdu: 1500,
            report_interval_ms: 50,
            keepalive_seconds: 0,
            initial_message_id: 1000,
            initial_keepalive_id: 80000,
        })
    }

    #[test]
    fn test_one_bad_session_leaves_others_alone() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (commander, _manager) = manager::start(TagSet::new(vec![Tag::new(0x3000, vec![0x0C; 12])]));
        let t_commander = commander.clone();
        thread::spawn(move || {
            serve_llrp(listener, test_config(), t_commander);
        });

        let mut healthy = TcpStream::connect(addr).unwrap();
        healthy.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let (info, _) = llrp::read_message(&mut healthy).unwrap();
        assert_eq!(message_types::READER_EVENT_NOTIFICATION, info.kind);
        healthy.write_all(&requests::set_reader_config(&1)).unwrap();
        let (info, _) = llrp::read_message(&mut healthy).unwrap();
        assert_eq!(message_types::SET_READER_CONFIG_RESPONSE, info.kind);

        // a second client talks garbage and gets cut off
        let mut hostile = TcpStream::connect(addr).unwrap();
        hostile.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let (info, _) = llrp::read_message(&mut hostile).unwrap();
        assert_eq!(message_types::READER_EVENT_NOTIFICATION, info.kind);
        hostile.write_all(&[0xFF, 0xFF, 0, 0, 0, 10, 0, 0, 0, 1]).unwrap();
        let mut buf = [0u8; 16];
        loop {
            match hostile.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        // the healthy session keeps reporting
        let (info, body) = llrp::read_message(&mut healthy).unwrap();
        assert_eq!(message_types::RO_ACCESS_REPORT, info.kind);
        let reports = requests::decode_ro_access_report(&body).unwrap();
        assert_eq!(1, reports.len());
        assert_eq!(vec![0x0C; 12], reports[0].epc);
    }
}
