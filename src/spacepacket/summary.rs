use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Apid, PacketView};

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApidSummary {
    pub count: usize,
    pub bytes: usize,
    pub missing: usize,
    pub reconstructed: usize,
}

/// Tracks stats on extracted packets.
///
/// # Example
/// ```
/// use ccsds_telemetry::spacepacket::{PacketView, Summary};
///
/// let dat: &[u8] = &[0x0b, 0xc1, 0xc0, 0x05, 0x00, 0x00, 0x00];
/// let mut summary = Summary::default();
/// summary.add(&PacketView::new(dat).unwrap(), false);
///
/// assert_eq!(summary.count, 1);
/// assert_eq!(summary.apids[&0x3c1].bytes, 7);
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub bytes: usize,
    pub missing: usize,
    pub apids: HashMap<Apid, ApidSummary>,

    #[serde(skip)]
    last_seq: HashMap<Apid, u16>,
}

impl Summary {
    pub fn add(&mut self, packet: &PacketView<'_>, reconstructed: bool) {
        let len = packet.as_bytes().len();
        self.count += 1;
        self.bytes += len;

        let apid = packet.apid();
        let seq = packet.sequence_count();
        let entry = self.apids.entry(apid).or_default();
        entry.count += 1;
        entry.bytes += len;
        if reconstructed {
            entry.reconstructed += 1;
        }

        if let Some(last) = self.last_seq.insert(apid, seq) {
            let missing = usize::from(missing_packets(seq, last));
            entry.missing += missing;
            self.missing += missing;
        }
    }
}

/// Calculate the number of packets missing between the sequence counts `last` and
/// `cur`, accounting for the 14-bit wrap-around.
#[must_use]
pub fn missing_packets(cur: u16, last: u16) -> u16 {
    cur.wrapping_sub(last).wrapping_sub(1) & PacketView::SEQ_MAX
}
