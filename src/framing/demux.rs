use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{extract_packets, ExtractOpts, ExtractionStats, FrameView, Rejected, Vcid};
use crate::spacepacket::Packet;

/// Packets and counters of a single virtual channel.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub packets: Vec<Packet>,
    pub stats: ExtractionStats,
    pub rejected: Rejected,
}

/// Extract the packets of every virtual channel present in `frames`.
///
/// Frames are partitioned by virtual channel id, keeping their relative order, and each
/// channel is then extracted independently using a rayon thread pool with
/// [ExtractOpts::num_threads] threads. Frames too short to have a header cannot be
/// attributed to a channel and are dropped.
///
/// # Example
/// ```
/// use ccsds_telemetry::framing::{extract_channels, ExtractOpts};
///
/// let mut frame = vec![0x2c, 0xb6, 0x00, 0x00, 0x9f, 0xfe];
/// frame.resize(64, 0);
///
/// let channels = extract_channels(vec![frame], &ExtractOpts::default());
/// assert_eq!(channels.len(), 1);
/// assert_eq!(channels[&3].stats.frames, 1);
/// ```
pub fn extract_channels<I>(frames: I, opts: &ExtractOpts) -> BTreeMap<Vcid, ChannelOutput>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]> + Send,
{
    let mut channels: BTreeMap<Vcid, Vec<I::Item>> = BTreeMap::new();
    for buf in frames {
        let vcid = match FrameView::new(buf.as_ref()) {
            Ok(frame) => frame.virtual_channel_id(),
            Err(err) => {
                warn!(%err, "dropping frame");
                continue;
            }
        };
        channels.entry(vcid).or_default().push(buf);
    }
    debug!(channels = channels.len(), "extracting channels");

    let opts = *opts;
    let extract = move || {
        channels
            .into_par_iter()
            .map(|(vcid, frames)| {
                let mut packets = extract_packets(frames, vcid, opts);
                let output = ChannelOutput {
                    packets: packets.by_ref().collect(),
                    stats: packets.stats(),
                    rejected: packets.rejected(),
                };
                debug!(vcid, stats = %output.stats, "channel done");
                (vcid, output)
            })
            .collect::<BTreeMap<_, _>>()
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(opts.num_threads)
        .build()
    {
        Ok(pool) => pool.install(extract),
        Err(err) => {
            warn!(%err, "failed to construct thread pool, using the global pool");
            extract()
        }
    }
}
