use std::sync::Arc;

use chrono::Utc;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::defaults;
use crate::llrp::{requests, WireError, HEADER_LENGTH};

/// One virtual tag. Identity for lookups is the EPC plus the protocol
/// control word; everything else is reader-side synthesized state.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub epc: Vec<u8>,
    pub pc_bits: u16,
    pub antenna_id: u16,
    pub channel_index: u16,
    pub peak_rssi: i8,
    pub first_seen: u64,
    pub last_seen: u64,
    pub seen_count: u16,
    pub rospec_id: u16,
    pub spec_index: u16,
    pub inventory_parameter_spec_id: u16,
}

impl Tag {
    /// Builds a tag around an EPC and PC word, synthesizing the fields a
    /// physical reader would have observed.
    pub fn new(pc_bits: u16, epc: Vec<u8>) -> Tag {
        let now = Utc::now().timestamp_micros() as u64;
        Tag {
            epc,
            pc_bits,
            antenna_id: defaults::DEFAULT_ANTENNA_ID,
            channel_index: defaults::DEFAULT_CHANNEL_INDEX,
            peak_rssi: thread_rng().gen_range(defaults::PEAK_RSSI_LOW..=defaults::PEAK_RSSI_HIGH),
            first_seen: now,
            last_seen: now,
            seen_count: defaults::DEFAULT_TAG_SEEN_COUNT,
            rospec_id: defaults::DEFAULT_ROSPEC_ID,
            spec_index: defaults::DEFAULT_SPEC_INDEX,
            inventory_parameter_spec_id: defaults::DEFAULT_INVENTORY_PARAMETER_SPEC_ID,
        }
    }

    pub fn from_record(record: &TagRecord) -> Result<Tag, TagRecordError> {
        let epc = hex::decode(&record.epc)
            .map_err(|_| TagRecordError::InvalidEpc(record.epc.clone()))?;
        if epc.is_empty() {
            return Err(TagRecordError::EmptyEpc);
        }
        Ok(Tag::new(record.pc_bits, epc))
    }

    pub fn equal(&self, other: &Tag) -> bool {
        self.epc == other.epc && self.pc_bits == other.pc_bits
    }
}

/// The admin wire form of a tag, exactly what the REST surface accepts.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TagRecord {
    #[serde(rename = "PCBits")]
    pub pc_bits: u16,
    #[serde(rename = "EPC")]
    pub epc: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum TagRecordError {
    #[error("EPC is not a valid hex string: {0}")]
    InvalidEpc(String),
    #[error("EPC must not be empty")]
    EmptyEpc,
}

/// One serialized report batch: the concatenated TagReportData parameters
/// destined for a single RO_ACCESS_REPORT, plus how many tags they describe.
pub struct TagReportData {
    pub data: Vec<u8>,
    pub tag_count: u32,
}

/// The ordered batches one report tick walks through.
pub struct TagReportDataStack {
    pub stack: Vec<TagReportData>,
}

impl TagReportDataStack {
    /// Packs tags into batches so no RO_ACCESS_REPORT exceeds `max_pdu`
    /// bytes once the 10 byte envelope is added. A tag too large for even an
    /// otherwise empty message is logged and left out.
    pub fn build(tags: &[Tag], max_pdu: usize) -> TagReportDataStack {
        let mut stack: Vec<TagReportData> = Vec::new();
        let mut current = TagReportData { data: Vec::new(), tag_count: 0 };
        for tag in tags {
            let encoded = requests::tag_report_data(tag);
            if HEADER_LENGTH + encoded.len() > max_pdu {
                warn!("{}", WireError::OversizedTag { size: encoded.len(), max_pdu });
                continue;
            }
            if HEADER_LENGTH + current.data.len() + encoded.len() > max_pdu {
                stack.push(current);
                current = TagReportData { data: Vec::new(), tag_count: 0 };
            }
            current.data.extend_from_slice(&encoded);
            current.tag_count += 1;
        }
        if current.tag_count > 0 {
            stack.push(current);
        }
        TagReportDataStack { stack }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn total_tag_counts(&self) -> u32 {
        self.stack.iter().map(|trd| trd.tag_count).sum()
    }
}

/// The canonical population. Ordered, no two tags share an EPC and PC word.
/// Only the tag manager may hold one of these; everything else sees
/// snapshots.
#[derive(Default)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new(tags: Vec<Tag>) -> TagSet {
        let mut set = TagSet::default();
        for tag in tags {
            set.add(tag);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn index_of(&self, tag: &Tag) -> Option<usize> {
        self.tags.iter().position(|t| t.equal(tag))
    }

    /// Appends the tag unless one with the same identity exists. Returns
    /// whether anything was inserted.
    pub fn add(&mut self, tag: Tag) -> bool {
        if self.index_of(&tag).is_some() {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Removes the tag if present, keeping the order of the survivors.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        match self.index_of(tag) {
            Some(ix) => {
                self.tags.remove(ix);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Tag>> {
        Arc::new(self.tags.clone())
    }

    pub fn build_report_stack(&self, max_pdu: usize) -> TagReportDataStack {
        TagReportDataStack::build(&self.tags, max_pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llrp::requests::decode_ro_access_report;

    fn tag(byte: u8) -> Tag {
        Tag::new(0x3000, vec![byte; 12])
    }

    #[test]
    fn test_add_and_remove() {
        let mut set = TagSet::default();
        assert!(set.add(tag(1)));
        assert!(set.add(tag(2)));
        // same epc and pc word is a duplicate no matter the synthetic fields
        assert!(!set.add(tag(1)));
        assert_eq!(2, set.len());
        assert_eq!(Some(0), set.index_of(&tag(1)));
        assert_eq!(Some(1), set.index_of(&tag(2)));
        assert!(set.remove(&tag(1)));
        assert!(!set.remove(&tag(1)));
        assert_eq!(1, set.len());
        assert_eq!(Some(0), set.index_of(&tag(2)));
    }

    #[test]
    fn test_identity_includes_pc_bits() {
        let mut set = TagSet::default();
        assert!(set.add(Tag::new(0x3000, vec![7; 12])));
        assert!(set.add(Tag::new(0x3400, vec![7; 12])));
        assert_eq!(2, set.len());
    }

    #[test]
    fn test_new_dedupes() {
        let set = TagSet::new(vec![tag(1), tag(2), tag(1)]);
        assert_eq!(2, set.len());
    }

    #[test]
    fn test_from_record() {
        let record = TagRecord {
            pc_bits: 0x3000,
            epc: String::from("300833b2ddd9014035050000"),
        };
        let tag = Tag::from_record(&record).unwrap();
        assert_eq!(12, tag.epc.len());
        assert_eq!(0x30, tag.epc[0]);
        assert_eq!(0x3000, tag.pc_bits);
        assert_eq!(1, tag.antenna_id);
        assert_eq!(1, tag.seen_count);
        assert!(tag.peak_rssi >= defaults::PEAK_RSSI_LOW && tag.peak_rssi <= defaults::PEAK_RSSI_HIGH);

        let bad = TagRecord { pc_bits: 0, epc: String::from("zz") };
        assert!(Tag::from_record(&bad).is_err());
        let empty = TagRecord { pc_bits: 0, epc: String::new() };
        assert_eq!(Err(TagRecordError::EmptyEpc), Tag::from_record(&empty));
    }

    #[test]
    fn test_empty_set_builds_empty_stack() {
        let set = TagSet::default();
        let trds = set.build_report_stack(1500);
        assert!(trds.is_empty());
        assert_eq!(0, trds.total_tag_counts());
    }

    #[test]
    fn test_report_stack_respects_pdu_limit() {
        let tags: Vec<Tag> = (0..500u16)
            .map(|i| Tag::new(0x3000, [i.to_be_bytes().to_vec(), vec![0; 10]].concat()))
            .collect();
        let set = TagSet::new(tags);
        assert_eq!(500, set.len());
        let trds = set.build_report_stack(256);
        assert!(trds.len() >= 2);
        for trd in &trds.stack {
            assert!(10 + trd.data.len() <= 256);
            assert!(trd.tag_count > 0);
        }
        assert_eq!(500, trds.total_tag_counts());
        // every tag survives the split, in order
        let mut epcs: Vec<Vec<u8>> = Vec::new();
        for trd in &trds.stack {
            for report in decode_ro_access_report(&trd.data).unwrap() {
                epcs.push(report.epc);
            }
        }
        assert_eq!(500, epcs.len());
        for (i, epc) in epcs.iter().enumerate() {
            assert_eq!(&(i as u16).to_be_bytes(), &epc[..2]);
        }
    }

    #[test]
    fn test_report_stack_skips_oversized_tags() {
        let mut set = TagSet::default();
        set.add(Tag::new(0x3000, vec![1; 12]));
        set.add(Tag::new(0x3000, vec![2; 200]));
        set.add(Tag::new(0x3000, vec![3; 12]));
        let trds = set.build_report_stack(128);
        assert_eq!(2, trds.total_tag_counts());
        for trd in &trds.stack {
            assert!(10 + trd.data.len() <= 128);
        }
    }
}
