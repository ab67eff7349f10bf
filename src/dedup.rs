//! Per-window deduplication of beacon records.
//!
//! A beacon broadcasts several times per second, so one collection window
//! usually holds many copies of the same reading. Deduplication keeps one
//! record per identifier. Output order is the order in which each identifier
//! first appeared; the policy only decides which of its records survives.

use crate::beacon::BeaconRecord;
use crate::beacon_id::BeaconId;
use std::collections::HashMap;

/// Which record to keep when an identifier appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DedupPolicy {
    /// Keep the first record seen in the window
    #[default]
    First,
    /// Keep the most recent record seen in the window
    Latest,
    /// Keep the record received with the highest RSSI
    Strongest,
}

impl DedupPolicy {
    /// Collapse `records` to one record per identifier.
    pub fn apply(self, records: Vec<BeaconRecord>) -> Vec<BeaconRecord> {
        if self == DedupPolicy::First {
            return dedup_first(records);
        }

        let mut slots: HashMap<BeaconId, usize> = HashMap::new();
        let mut kept: Vec<BeaconRecord> = Vec::with_capacity(records.len());

        for record in records {
            match slots.get(&record.id) {
                Some(&slot) => {
                    if self.replaces(&kept[slot], &record) {
                        kept[slot] = record;
                    }
                }
                None => {
                    slots.insert(record.id, kept.len());
                    kept.push(record);
                }
            }
        }

        kept
    }

    fn replaces(self, current: &BeaconRecord, candidate: &BeaconRecord) -> bool {
        match self {
            DedupPolicy::First => false,
            DedupPolicy::Latest => true,
            // None sorts below any Some, so a measured RSSI always wins
            DedupPolicy::Strongest => candidate.rssi > current.rssi,
        }
    }
}

/// Keep the first record per identifier, preserving arrival order.
pub fn dedup_first(mut records: Vec<BeaconRecord>) -> Vec<BeaconRecord> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.id));
    records
}
