//! Wildcard result index
//!
//! A wildcard query (`meter.*/.*`) answers with a flat list of channel
//! records. The index resolves single channels from that list and
//! enumerates the module identifiers it contains, so the prober can publish
//! every discovered module without another round-trip.

use crate::channel::{join_address, ChannelRecord};
use serde::Deserialize;
use std::collections::HashSet;

static EMPTY_RECORD: ChannelRecord = ChannelRecord::EMPTY;

/// Records returned by one wildcard query, in device order.
///
/// Addresses are not guaranteed to be unique.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryResult {
    records: Vec<ChannelRecord>,
}

impl DiscoveryResult {
    /// Build an index from records
    pub fn new(records: Vec<ChannelRecord>) -> Self {
        Self { records }
    }

    /// First record whose address matches the joined segments,
    /// ignoring ASCII case. Unmatched lookups yield [`ChannelRecord::EMPTY`].
    pub fn lookup(&self, segments: &[&str]) -> &ChannelRecord {
        let address = join_address(segments);
        self.records
            .iter()
            .find(|record| record.address.eq_ignore_ascii_case(&address))
            .unwrap_or(&EMPTY_RECORD)
    }

    /// Distinct address tokens found at `position` (zero-based).
    ///
    /// Addresses with fewer segments contribute nothing.
    pub fn distinct_segments(&self, position: usize) -> HashSet<String> {
        self.records
            .iter()
            .filter_map(|record| record.segments().nth(position))
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the query returned nothing
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records
    pub fn records(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.records.iter()
    }
}

impl FromIterator<ChannelRecord> for DiscoveryResult {
    fn from_iter<I: IntoIterator<Item = ChannelRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
