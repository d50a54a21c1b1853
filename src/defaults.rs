pub const DEFAULT_LISTEN_IP: &str = "0.0.0.0";
pub const DEFAULT_LLRP_PORT: u16 = 5084;
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_MAX_PDU: usize = 1500;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 10000;
pub const DEFAULT_KEEPALIVE_SECONDS: u64 = 0;
pub const DEFAULT_INITIAL_MESSAGE_ID: u32 = 1000;
pub const DEFAULT_INITIAL_KEEPALIVE_ID: u32 = 80000;
pub const DEFAULT_TAG_FILE: &str = "tags.gob";

pub const DEFAULT_ANTENNA_ID: u16 = 1;
pub const DEFAULT_CHANNEL_INDEX: u16 = 1;
pub const DEFAULT_TAG_SEEN_COUNT: u16 = 1;
pub const DEFAULT_ROSPEC_ID: u16 = 0;
pub const DEFAULT_SPEC_INDEX: u16 = 1;
pub const DEFAULT_INVENTORY_PARAMETER_SPEC_ID: u16 = 1;

// Synthesized signal strength range for virtual tags, in dBm.
pub const PEAK_RSSI_LOW: i8 = -80;
pub const PEAK_RSSI_HIGH: i8 = -40;
