use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;

use super::tag::Tag;

// Versioned binary layout for persisted tag populations:
//   magic "GMTF", version u8, count u32 BE, then per tag
//   pc_bits u16 BE, epc_len u16 BE, epc bytes.
// Synthetic reader-side fields are rebuilt on load.
const MAGIC: &[u8; 4] = b"GMTF";
const VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum TagFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a tag file: bad magic")]
    BadMagic,
    #[error("unsupported tag file version {0}")]
    UnsupportedVersion(u8),
}

/// Loads a persisted population. The caller decides what a missing file
/// means; this only runs against paths that exist.
pub fn load(path: &Path) -> Result<Vec<Tag>, TagFileError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(TagFileError::BadMagic);
    }
    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != VERSION {
        return Err(TagFileError::UnsupportedVersion(version[0]));
    }
    let mut count = [0u8; 4];
    file.read_exact(&mut count)?;
    let count = u32::from_be_bytes(count);
    let mut tags = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut words = [0u8; 4];
        file.read_exact(&mut words)?;
        let pc_bits = u16::from_be_bytes([words[0], words[1]]);
        let epc_len = u16::from_be_bytes([words[2], words[3]]);
        let mut epc = vec![0u8; epc_len as usize];
        file.read_exact(&mut epc)?;
        tags.push(Tag::new(pc_bits, epc));
    }
    Ok(tags)
}

pub fn save(path: &Path, tags: &[Tag]) -> Result<(), TagFileError> {
    let mut file = File::create(path)?;
    file.write_all(MAGIC)?;
    file.write_all(&[VERSION])?;
    file.write_all(&(tags.len() as u32).to_be_bytes())?;
    for tag in tags {
        file.write_all(&tag.pc_bits.to_be_bytes())?;
        file.write_all(&(tag.epc.len() as u16).to_be_bytes())?;
        file.write_all(&tag.epc)?;
    }
    Ok(())
}
