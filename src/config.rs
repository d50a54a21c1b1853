use std::net::IpAddr;

/// Runtime settings shared by every mode, built once from the command line.
pub struct Config {
    pub ip: IpAddr,
    pub port: u16,
    pub max_pdu: usize,
    pub report_interval_ms: u64,
    pub keepalive_seconds: u64,
    pub initial_message_id: u32,
    pub initial_keepalive_id: u32,
}

impl Config {
    pub fn llrp_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
