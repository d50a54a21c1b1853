use std::io::Read;

use thiserror::Error;

pub mod bit_masks;
pub mod message_types;
pub mod parameter_types;
pub mod requests;

/// Every LLRP message starts with a 10 byte header: version and type packed
/// into 16 bits, a 32 bit total length including the header, and a 32 bit
/// message id.
pub const HEADER_LENGTH: usize = 10;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    #[error("unknown header: {0}")]
    UnknownHeader(u16),
    #[error("tag report of {size} bytes cannot fit a PDU of {max_pdu} bytes")]
    OversizedTag { size: usize, max_pdu: usize },
}

/// Reads one framed LLRP message from the stream. The returned buffer is the
/// message body, header excluded.
pub fn read_message(stream: &mut impl Read) -> Result<(bit_masks::MsgTypeInfo, Vec<u8>), std::io::Error> {
    let mut header = [0u8; HEADER_LENGTH];
    stream.read_exact(&mut header)?;
    let info = bit_masks::get_msg_type(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if (info.length as usize) < HEADER_LENGTH {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            WireError::MalformedMessage("length field smaller than the header"),
        ));
    }
    let mut body = vec![0u8; info.length as usize - HEADER_LENGTH];
    stream.read_exact(&mut body)?;
    Ok((info, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_message() {
        // keepalive ack with message id 12
        let bytes = requests::keepalive_ack(&12);
        let mut cursor = Cursor::new(bytes.clone());
        let (info, body) = read_message(&mut cursor).unwrap();
        assert_eq!(message_types::KEEPALIVE_ACK, info.kind);
        assert_eq!(12, info.id);
        assert!(body.is_empty());

        // a length below 10 is rejected
        let mut short = bytes;
        short[5] = 9;
        let mut cursor = Cursor::new(short);
        let res = read_message(&mut cursor);
        assert!(res.is_err());
        assert_eq!(std::io::ErrorKind::InvalidData, res.unwrap_err().kind());

        // truncated stream
        let mut cursor = Cursor::new(vec![0x04u8, 0x3F, 0x00]);
        assert!(read_message(&mut cursor).is_err());
    }
}
