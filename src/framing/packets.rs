use std::collections::VecDeque;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

use super::{missing_frames, FrameView, Scid, Vcid};
use crate::spacepacket::{ExtractedPacket, Packet, PacketView};
use crate::{Error, Result};

/// Number of leading bytes shown when an incomplete packet is dropped.
const PREVIEW_LEN: usize = 8;

/// Receives the packets produced by a [PacketExtractor], in extraction order.
///
/// Implemented for any `FnMut(ExtractedPacket<'_>)`.
pub trait PacketSink {
    fn accept(&mut self, packet: ExtractedPacket<'_>);
}

impl<F> PacketSink for F
where
    F: FnMut(ExtractedPacket<'_>),
{
    fn accept(&mut self, packet: ExtractedPacket<'_>) {
        self(packet);
    }
}

/// Counters maintained by a [PacketExtractor]. They wrap around on overflow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Frames processed, idle frames included
    pub frames: u32,
    /// Packets handed to the sink
    pub packets: u32,
    /// Frames missing according to the virtual channel frame counter
    pub missing_frames: u32,
    /// Packets started but never completed
    pub lost_packets: u32,
}

impl Display for ExtractionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames={} packets={} missing_frames={} lost_packets={}",
            self.frames, self.packets, self.missing_frames, self.lost_packets
        )
    }
}

/// Reassembles the space packets carried by the frames of a single virtual channel.
///
/// Frames must be added in the order they were received. Packets fully contained in a
/// frame are handed to the sink as borrows of the frame, packets spanning frames are
/// copied into an internal buffer that is handed over once complete. At most one packet
/// is pending reassembly at any time.
///
/// Frame gaps and protocol violations are not errors; they are logged and reflected in
/// [ExtractionStats].
///
/// # Example
/// ```
/// use ccsds_telemetry::framing::{FrameView, PacketExtractor, VC_HOUSEKEEPING};
/// use ccsds_telemetry::spacepacket::{ExtractedPacket, Packet};
///
/// let mut packets: Vec<Packet> = Vec::new();
/// let mut extractor = PacketExtractor::new(VC_HOUSEKEEPING, |p: ExtractedPacket<'_>| {
///     packets.push(p.into_packet());
/// });
///
/// // a frame with only idle data
/// let mut dat = vec![0x2c, 0xb2, 0x00, 0x00, 0x9f, 0xfe];
/// dat.resize(64, 0);
/// extractor.add(&FrameView::new(&dat).unwrap()).unwrap();
/// extractor.end();
///
/// assert_eq!(extractor.frames_processed(), 1);
/// assert_eq!(extractor.packets_extracted(), 0);
/// drop(extractor);
/// assert!(packets.is_empty());
/// ```
pub struct PacketExtractor<S> {
    vcid: Vcid,
    /// Next expected virtual channel frame counter, `None` until the first frame
    expected: Option<u8>,
    /// Bytes of the packet currently being reassembled
    pending: Option<Vec<u8>>,
    stats: ExtractionStats,
    sink: S,
}

impl<S: PacketSink> PacketExtractor<S> {
    pub fn new(vcid: Vcid, sink: S) -> Self {
        PacketExtractor {
            vcid,
            expected: None,
            pending: None,
            stats: ExtractionStats::default(),
            sink,
        }
    }

    /// Add the next frame of the virtual channel, handing any packets it completes to
    /// the sink.
    ///
    /// # Errors
    /// [Error::WrongChannel] if the frame belongs to another virtual channel, or
    /// [Error::NotEnoughData] if the frame is too short to hold its data zone. The
    /// extractor state is not changed in either case.
    pub fn add(&mut self, frame: &FrameView<'_>) -> Result<()> {
        let vcid = frame.virtual_channel_id();
        if vcid != self.vcid {
            return Err(Error::WrongChannel {
                actual: vcid,
                expected: self.vcid,
            });
        }
        let data: &[u8] = if frame.is_idle() { &[] } else { frame.data()? };

        let vcfc = frame.virtual_channel_frame_count();
        self.stats.frames = self.stats.frames.wrapping_add(1);
        let first = self.expected.is_none();
        let mut gap = false;
        if let Some(expected) = self.expected {
            let missing = missing_frames(vcfc, expected);
            if missing != 0 {
                gap = true;
                self.stats.missing_frames =
                    self.stats.missing_frames.wrapping_add(u32::from(missing));
                warn!(
                    vcid,
                    vcfc,
                    missing,
                    "Missing {missing} frame(s) between counter {} and {vcfc}",
                    expected.wrapping_sub(1)
                );
                if let Some(pending) = self.pending.take() {
                    debug!(vcid, vcfc, bytes = pending.len(), "dropping pending packet after gap");
                    self.stats.lost_packets = self.stats.lost_packets.wrapping_add(1);
                }
            }
        }
        self.expected = Some(vcfc.wrapping_add(1));

        if frame.is_idle() {
            trace!(vcid, vcfc, "idle frame");
            return Ok(());
        }

        let fhp = frame.first_header_pointer();
        let continuation = if fhp == FrameView::FHP_NO_PACKET_START {
            data.len()
        } else if usize::from(fhp) > data.len() {
            warn!(
                vcid,
                vcfc,
                fhp,
                zone = data.len(),
                "first header pointer past the end of the data zone"
            );
            data.len()
        } else {
            usize::from(fhp)
        };

        let mut offset = 0;
        match self.pending.take() {
            Some(pending) if fhp == 0 => {
                if !gap {
                    error!(
                        vcid,
                        vcfc,
                        bytes = pending.len(),
                        "CCSDS Frame protocol violation: expected remaining bytes of packet started in previous frame, but got FHP=0"
                    );
                }
                self.stats.lost_packets = self.stats.lost_packets.wrapping_add(1);
            }
            None if fhp != 0 => {
                if !gap {
                    if first {
                        info!(vcid, vcfc, fhp, "first frame continues a packet we never saw the start of");
                    } else {
                        error!(
                            vcid,
                            vcfc,
                            fhp,
                            frame = self.stats.frames,
                            "CCSDS Frame protocol violation: expected FHP=0"
                        );
                        self.stats.lost_packets = self.stats.lost_packets.wrapping_add(1);
                    }
                }
                offset = continuation;
            }
            Some(pending) => {
                offset = continuation;
                self.continue_packet(pending, &data[..continuation], fhp, vcfc);
            }
            None => {}
        }

        self.start_packets(&data[offset..], vcfc);
        Ok(())
    }

    /// Append continuation bytes to a pending packet and hand it over if complete.
    fn continue_packet(&mut self, mut pending: Vec<u8>, dat: &[u8], fhp: u16, vcfc: u8) {
        pending.extend_from_slice(dat);

        let length = PacketView::new(&pending)
            .ok()
            .map(|view| view.packet_length());
        if let Some(packet_length) = length {
            if pending.len() >= packet_length {
                if pending.len() > packet_length {
                    trace!(
                        vcid = self.vcid,
                        vcfc,
                        bytes = pending.len() - packet_length,
                        "ignoring bytes following reassembled packet"
                    );
                    pending.truncate(packet_length);
                }
                self.emit(ExtractedPacket::owned(pending));
                return;
            }
        }

        if fhp == FrameView::FHP_NO_PACKET_START {
            // packet continues in the next frame
            self.pending = Some(pending);
            return;
        }

        match length {
            Some(length) => error!(
                vcid = self.vcid,
                vcfc,
                "CCSDS Frame protocol violation: missing {} bytes to reconstruct packet of {length} bytes",
                length - pending.len()
            ),
            None => error!(
                vcid = self.vcid,
                vcfc,
                "CCSDS Frame protocol violation: missing bytes to reconstruct packet, only had {} bytes",
                pending.len()
            ),
        }
        self.stats.lost_packets = self.stats.lost_packets.wrapping_add(1);
    }

    /// Hand over every packet starting in `dat`, keeping an unfinished trailing packet
    /// pending.
    fn start_packets(&mut self, mut dat: &[u8], vcfc: u8) {
        while !dat.is_empty() {
            let Ok(view) = PacketView::new(dat) else {
                // too short for a header
                self.pending = Some(dat.to_vec());
                return;
            };
            if view.is_zero_fill() {
                info!(
                    vcid = self.vcid,
                    vcfc,
                    bytes = dat.len(),
                    "Found idle data in frame, ignoring remaining bytes"
                );
                return;
            }

            let length = view.packet_length();
            if length > dat.len() {
                self.pending = Some(dat.to_vec());
                return;
            }

            let (packet, rest) = dat.split_at(length);
            self.emit(ExtractedPacket::borrowed(packet));
            dat = rest;
        }
    }

    fn emit(&mut self, packet: ExtractedPacket<'_>) {
        trace!(
            vcid = self.vcid,
            apid = packet.view().apid(),
            seq = packet.view().sequence_count(),
            reconstructed = packet.is_reconstructed(),
            "packet"
        );
        self.stats.packets = self.stats.packets.wrapping_add(1);
        self.sink.accept(packet);
    }

    /// Signal that no more frames will be added.
    ///
    /// A packet still pending is counted as lost, unless its bytes are all zero or look
    /// like the start of an idle packet.
    pub fn end(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let non_zero = pending.iter().any(|b| *b != 0);
        let idle_start = pending.first() == Some(&0x07)
            && pending.get(1).map_or(true, |b| *b == 0xff);
        if non_zero && !idle_start {
            let preview = hex::encode(&pending[..pending.len().min(PREVIEW_LEN)]);
            warn!(
                vcid = self.vcid,
                bytes = pending.len(),
                preview = %preview,
                "Packet extraction ended with incomplete packet being reconstructed"
            );
            self.stats.lost_packets = self.stats.lost_packets.wrapping_add(1);
        } else {
            debug!(vcid = self.vcid, bytes = pending.len(), "ignoring trailing fill");
        }
    }
}

impl<S> PacketExtractor<S> {
    /// Virtual channel this extractor accepts frames for.
    #[must_use]
    pub fn vcid(&self) -> Vcid {
        self.vcid
    }

    #[must_use]
    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    #[must_use]
    pub fn frames_processed(&self) -> u32 {
        self.stats.frames
    }

    #[must_use]
    pub fn packets_extracted(&self) -> u32 {
        self.stats.packets
    }

    #[must_use]
    pub fn frames_missing(&self) -> u32 {
        self.stats.missing_frames
    }

    #[must_use]
    pub fn packets_lost(&self) -> u32 {
        self.stats.lost_packets
    }

    /// True when a packet is waiting for continuation bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Options for [extract_packets] and [extract_channels](super::extract_channels).
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ExtractOpts {
    /// Skip frames that do not follow the fixed frame profile.
    #[builder(default = true)]
    pub validate_frames: bool,
    /// Drop extracted packets that fail validation, e.g., bad checksum.
    #[builder(default)]
    pub validate_packets: bool,
    /// Skip frames from any other spacecraft.
    #[builder(default, setter(strip_option))]
    pub spacecraft_id: Option<Scid>,
    /// Number of threads used to extract channels in parallel, 0 lets rayon decide.
    #[builder(default)]
    pub num_threads: usize,
}

impl Default for ExtractOpts {
    fn default() -> Self {
        ExtractOpts::builder().build()
    }
}

/// Frames and packets dropped before or after extraction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejected {
    pub frames: usize,
    pub packets: usize,
}

struct Ready {
    packets: VecDeque<Packet>,
    validate: bool,
    rejected: usize,
}

impl PacketSink for Ready {
    fn accept(&mut self, packet: ExtractedPacket<'_>) {
        if self.validate {
            if let Err(err) = packet.view().validate() {
                warn!(apid = packet.view().apid(), %err, "dropping invalid packet");
                self.rejected += 1;
                return;
            }
        }
        self.packets.push_back(packet.into_packet());
    }
}

/// Iterator of the packets in a sequence of frames, see [extract_packets].
pub struct PacketIter<I> {
    frames: I,
    opts: ExtractOpts,
    extractor: PacketExtractor<Ready>,
    rejected_frames: usize,
    done: bool,
}

impl<I> PacketIter<I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    fn feed(&mut self, buf: &[u8]) {
        let frame = match FrameView::new(buf) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping frame");
                self.rejected_frames += 1;
                return;
            }
        };
        if frame.virtual_channel_id() != self.extractor.vcid() {
            debug!(
                vcid = frame.virtual_channel_id(),
                "skipping frame for other virtual channel"
            );
            return;
        }

        let checked = if self.opts.validate_frames {
            frame.validate()
        } else {
            Ok(())
        };
        let checked = match (checked, self.opts.spacecraft_id) {
            (Ok(()), Some(scid)) => frame.validate_spacecraft(scid),
            (checked, _) => checked,
        };
        if let Err(err) = checked.and_then(|()| self.extractor.add(&frame)) {
            warn!(
                vcid = frame.virtual_channel_id(),
                vcfc = frame.virtual_channel_frame_count(),
                %err,
                "dropping frame"
            );
            self.rejected_frames += 1;
        }
    }
}

impl<I> PacketIter<I> {
    /// Extraction counters so far.
    #[must_use]
    pub fn stats(&self) -> ExtractionStats {
        self.extractor.stats()
    }

    /// Frames and packets rejected so far.
    #[must_use]
    pub fn rejected(&self) -> Rejected {
        Rejected {
            frames: self.rejected_frames,
            packets: self.extractor.sink().rejected,
        }
    }
}

impl<I> Iterator for PacketIter<I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    type Item = Packet;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(packet) = self.extractor.sink_mut().packets.pop_front() {
                return Some(packet);
            }
            if self.done {
                return None;
            }
            match self.frames.next() {
                Some(buf) => self.feed(buf.as_ref()),
                None => {
                    trace!(vcid = self.extractor.vcid(), "no more frames");
                    self.extractor.end();
                    self.done = true;
                }
            }
        }
    }
}

/// Extract the packets carried by the frames of virtual channel `vcid`.
///
/// Each item of `frames` is the bytes of one frame, in the order received. Frames of
/// other virtual channels are skipped. Frames that cannot be decoded, or fail the checks
/// enabled in `opts`, are dropped and counted in [PacketIter::rejected]; the extractor
/// then sees them as missing.
///
/// # Example
/// ```
/// use ccsds_telemetry::framing::{extract_packets, ExtractOpts};
///
/// let frames: Vec<Vec<u8>> = Vec::new();
/// let mut packets = extract_packets(frames, 1, ExtractOpts::default());
/// assert!(packets.next().is_none());
/// assert_eq!(packets.stats().frames, 0);
/// ```
pub fn extract_packets<I>(frames: I, vcid: Vcid, opts: ExtractOpts) -> PacketIter<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    PacketIter {
        frames: frames.into_iter(),
        opts,
        extractor: PacketExtractor::new(
            vcid,
            Ready {
                packets: VecDeque::new(),
                validate: opts.validate_packets,
                rejected: 0,
            },
        ),
        rejected_frames: 0,
        done: false,
    }
}
