use std::io::{ErrorKind, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::llrp::{self, message_types, requests};

/// A trivial LLRP client for loopback testing: dials the emulator, drives
/// the handshake, answers keepalives, and logs whatever arrives. Retries
/// the dial once a second until the server shows up.
pub fn run(config: &Config) -> i32 {
    let address = config.llrp_address();
    info!("waiting for {address} ...");
    let mut stream = loop {
        match TcpStream::connect(&address) {
            Ok(stream) => break stream,
            Err(_) => thread::sleep(Duration::from_secs(1)),
        }
    };
    let peer = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => address,
    };
    info!("established an LLRP connection with {peer}");

    loop {
        let (head, body) = match llrp::read_message(&mut stream) {
            Ok(message) => message,
            Err(e) => {
                if e.kind() == ErrorKind::UnexpectedEof {
                    info!("the server is disconnected, closing LLRP connection");
                    return 0;
                }
                error!("error reading from the server: {e}");
                return 1;
            }
        };
        match head.kind {
            message_types::READER_EVENT_NOTIFICATION => {
                info!(">>> READER_EVENT_NOTIFICATION [Message ID: {}]", head.id);
                debug!("reader speaks LLRP version {}", head.version);
                if let Err(e) = stream.write_all(&requests::set_reader_config(&(head.id + 1))) {
                    error!("error requesting reader config: {e}");
                    return 1;
                }
            }
            message_types::SET_READER_CONFIG_RESPONSE => {
                info!(">>> SET_READER_CONFIG_RESPONSE [Message ID: {}]", head.id);
            }
            message_types::KEEPALIVE => {
                info!(">>> KEEP_ALIVE [Message ID: {}]", head.id);
                if let Err(e) = stream.write_all(&requests::keepalive_ack(&head.id)) {
                    error!("error responding to keepalive: {e}");
                    return 1;
                }
            }
            message_types::RO_ACCESS_REPORT => {
                info!(">>> RO_ACCESS_REPORT [Message ID: {}]", head.id);
                match requests::decode_ro_access_report(&body) {
                    Ok(reports) => {
                        info!("{} events received", reports.len());
                        for report in &reports {
                            debug!(
                                "tag {} pc {:#06x} antenna {} rssi {} channel {} first seen {} last seen {} count {} rospec {} spec {} inventory {}",
                                hex::encode(&report.epc),
                                report.pc_bits,
                                report.antenna_id,
                                report.peak_rssi,
                                report.channel_index,
                                report.first_seen,
                                report.last_seen,
                                report.seen_count,
                                report.rospec_id,
                                report.spec_index,
                                report.inventory_parameter_spec_id,
                            );
                        }
                    }
                    Err(e) => error!("undecodable report: {e}"),
                }
            }
            other => {
                error!(
                    "{} ({})",
                    llrp::WireError::UnknownHeader(other),
                    message_types::get_message_name(other).unwrap_or("UNKNOWN")
                );
                return 1;
            }
        }
    }
}
