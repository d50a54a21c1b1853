use std::io::{ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::llrp::{self, message_types, requests};
use crate::objects::tag::TagReportDataStack;
use crate::objects::tag_file;
use crate::server;
use crate::server::session;

/// Simulator mode: one connection, one pre-recorded population per report
/// tick, wrapping back to the first file at the end.
pub fn run(config: Arc<Config>, dir: &Path) -> i32 {
    let files = match collect_simulation_files(dir) {
        Ok(files) => files,
        Err(e) => {
            error!("error reading {}: {e}", dir.display());
            return 1;
        }
    };
    if files.is_empty() {
        error!("no event cycle file found in {}", dir.display());
        return 1;
    }
    info!("{} event cycle(s) found in {}", files.len(), dir.display());

    let listener = match server::bind_listener(&config) {
        Ok(listener) => listener,
        Err(e) => {
            error!("error binding LLRP listener: {e}");
            return 1;
        }
    };
    info!("listening on {}", config.llrp_address());

    info!("waiting for LLRP connection...");
    let stream = match listener.accept() {
        Ok((stream, addr)) => {
            info!("initiated LLRP connection with {addr}");
            stream
        }
        Err(e) => {
            error!("error accepting LLRP connection: {e}");
            return 1;
        }
    };
    simulate(stream, config, files)
}

fn collect_simulation_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "gob").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn simulate(mut stream: TcpStream, config: Arc<Config>, files: Vec<PathBuf>) -> i32 {
    let msg_id = Arc::new(Mutex::new(config.initial_message_id));
    let running = Arc::new(Mutex::new(true));

    let now = Utc::now().timestamp_micros() as u64;
    let greeting = requests::reader_event_notification(&session::next_id(&msg_id), now);
    if let Err(e) = stream.write_all(&greeting) {
        error!("error greeting the client: {e}");
        return 1;
    }
    debug!("<<< READER_EVENT_NOTIFICATION");

    let mut ticker: Option<thread::JoinHandle<()>> = None;
    loop {
        let (head, _body) = match llrp::read_message(&mut stream) {
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
        match head.kind {
            message_types::SET_READER_CONFIG if ticker.is_none() => {
                debug!(">>> SET_READER_CONFIG");
                let response = requests::set_reader_config_response(&session::next_id(&msg_id));
                if let Err(e) = stream.write_all(&response) {
                    error!("error acknowledging reader config: {e}");
                    break;
                }
                let tick_stream = match stream.try_clone() {
                    Ok(s) => s,
                    Err(e) => {
                        error!("unable to copy stream for the event cycle ticker: {e}");
                        break;
                    }
                };
                let t_files = files.clone();
                let t_config = config.clone();
                let t_msg_id = msg_id.clone();
                let t_running = running.clone();
                ticker = Some(thread::spawn(move || {
                    run_event_cycles(tick_stream, t_config, t_files, t_msg_id, t_running);
                }));
            }
            other => {
                // the reference simulator shrugs off everything else
                debug!(">>> header: {other}");
            }
        }
    }

    if let Ok(mut r) = running.lock() {
        *r = false;
    }
    let _ = stream.shutdown(Shutdown::Both);
    if let Some(handle) = ticker {
        let _ = handle.join();
    }
    0
}

/// The ticker owns the event cycle counter; nothing else touches it.
fn run_event_cycles(
    mut stream: TcpStream,
    config: Arc<Config>,
    files: Vec<PathBuf>,
    msg_id: Arc<Mutex<u32>>,
    running: Arc<Mutex<bool>>,
) {
    let interval = Duration::from_millis(config.report_interval_ms);
    let mut event_cycle: usize = 0;
    let mut trds = TagReportDataStack { stack: Vec::new() };
    loop {
        thread::sleep(interval);
        if let Ok(r) = running.lock() {
            if !*r {
                break;
            }
        } else {
            break;
        }
        match tag_file::load(&files[event_cycle]) {
            Ok(tags) => trds = TagReportDataStack::build(&tags, config.max_pdu),
            Err(e) => {
                // keep emitting the previous population rather than skip a beat
                warn!("error loading {}: {e}", files[event_cycle].display());
            }
        }
        info!(
            "<<< simulated event cycle {event_cycle}, {} tags, {} reports",
            trds.total_tag_counts(),
            trds.len()
        );
        for trd in &trds.stack {
            let roar = requests::ro_access_report(&trd.data, &session::next_id(&msg_id));
            if let Err(e) = stream.write_all(&roar) {
                error!("error writing report: {e}");
                if let Ok(mut r) = running.lock() {
                    *r = false;
                }
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        }
        event_cycle = (event_cycle + 1) % files.len();
    }
}
