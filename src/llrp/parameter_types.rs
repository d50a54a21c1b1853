// TLV parameters carried by the messages the emulator emits.
pub const UTC_TIMESTAMP: u16 = 128;
pub const TAG_REPORT_DATA: u16 = 240;
pub const EPC_DATA: u16 = 241;
pub const READER_EVENT_NOTIFICATION_DATA: u16 = 246;
pub const CONNECTION_ATTEMPT_EVENT: u16 = 256;
pub const LLRP_STATUS: u16 = 287;

// TV encodings (first bit 1, bits 2-8 are the type).
pub const ANTENNA_ID: u16 = 1;
pub const FIRST_SEEN_TIMESTAMP_UTC: u16 = 2;
pub const LAST_SEEN_TIMESTAMP_UTC: u16 = 4;
pub const PEAK_RSSI: u16 = 6;
pub const CHANNEL_INDEX: u16 = 7;
pub const TAG_SEEN_COUNT: u16 = 8;
pub const RO_SPEC_ID: u16 = 9;
pub const INVENTORY_PARAMETER_SPEC_ID: u16 = 10;
pub const SPEC_INDEX: u16 = 14;
pub const C1G2_PC: u16 = 12;
pub const EPC_96: u16 = 13;

// LLRP status codes.
pub const M_SUCCESS: u16 = 0;

// ConnectionAttemptEvent status values.
pub const CONNECTION_SUCCESS: u16 = 0;
