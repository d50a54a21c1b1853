// The emulator speaks a deliberately small slice of LLRP. Anything else on
// the wire is reported as unknown and ends the session.
pub const SET_READER_CONFIG: u16 = 3;
pub const SET_READER_CONFIG_RESPONSE: u16 = 13;
pub const RO_ACCESS_REPORT: u16 = 61;
pub const KEEPALIVE: u16 = 62;
pub const READER_EVENT_NOTIFICATION: u16 = 63;
pub const KEEPALIVE_ACK: u16 = 72;

pub fn get_message_name(kind: u16) -> Option<&'static str> {
    match kind {
        3 => Some("SET_READER_CONFIG"),
        13 => Some("SET_READER_CONFIG_RESPONSE"),
        61 => Some("RO_ACCESS_REPORT"),
        62 => Some("KEEPALIVE"),
        63 => Some("READER_EVENT_NOTIFICATION"),
        72 => Some("KEEPALIVE_ACK"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message_name() {
        assert_eq!(Some("SET_READER_CONFIG"), get_message_name(SET_READER_CONFIG));
        assert_eq!(Some("RO_ACCESS_REPORT"), get_message_name(RO_ACCESS_REPORT));
        assert_eq!(Some("KEEPALIVE_ACK"), get_message_name(KEEPALIVE_ACK));
        assert_eq!(None, get_message_name(100));
    }
}
