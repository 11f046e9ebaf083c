//! CCSDS Telemetry Transfer Frame decoding.
//!
//! Frames follow the fixed CHEOPS profile: a 6 byte primary header, a 4 byte
//! secondary header, an optional 4 byte Operational Control Field trailer and no
//! Frame Error Control Field.
mod demux;
mod packets;

pub use demux::*;
pub use packets::*;

use std::ops::Range;

use crate::bytes::{read_be, BigEndian};
use crate::error::FrameViolation;
use crate::{Error, Result};

pub type Scid = u16;
pub type Vcid = u8;

/// Spacecraft id assigned to CHEOPS.
pub const CHEOPS_SCID: Scid = 0x2cb;
/// Playback telemetry, carrying service 3 housekeeping packets.
pub const VC_HOUSEKEEPING: Vcid = 1;
/// Instrument science telemetry, carrying service 13 large data transfer packets.
pub const VC_SCIENCE: Vcid = 3;
/// Event telemetry, carrying service 5 event packets.
pub const VC_EVENTS: Vcid = 5;

/// Read-only view of a single transfer frame.
///
/// No bytes are copied; field accessors decode directly from the borrowed buffer.
/// Header accessors do not require [FrameView::validate] to have been called.
///
/// # Example
/// ```
/// use ccsds_telemetry::framing::FrameView;
///
/// let mut dat = vec![0x0d, 0x22, 0xaa, 0xbb, 0x98, 0x00];
/// dat.resize(64, 0);
/// let frame = FrameView::new(&dat).unwrap();
/// frame.validate().unwrap();
///
/// assert_eq!(frame.spacecraft_id(), 210);
/// assert_eq!(frame.virtual_channel_id(), 1);
/// assert_eq!(frame.virtual_channel_frame_count(), 0xbb);
/// assert_eq!(frame.first_header_pointer(), 0);
/// assert_eq!(frame.data().unwrap().len(), 54);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    buf: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Transfer frame primary header length in bytes
    pub const PRIMARY_HEADER_LEN: usize = 6;
    /// Transfer frame secondary header length in bytes
    pub const SECONDARY_HEADER_LEN: usize = 4;
    /// Operational control field length in bytes
    pub const OCF_LEN: usize = 4;
    /// Smallest buffer a view can be constructed over
    pub const MIN_LEN: usize = 7;

    /// First-header-pointer value indicating no packet starts in this frame.
    pub const FHP_NO_PACKET_START: u16 = 0x7ff;
    /// First-header-pointer value indicating the data zone only contains idle data.
    pub const FHP_IDLE: u16 = 0x7fe;

    /// Create a view over the entire `buf`.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `buf` is shorter than [Self::MIN_LEN] or longer than a
    /// frame length can be.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < Self::MIN_LEN {
            return Err(Error::InvalidArgument(
                "The buffer is too small to contain any valid frame",
            ));
        }
        if buf.len() > usize::from(u16::MAX) {
            return Err(Error::InvalidArgument(
                "The buffer is larger than the maximum frame length",
            ));
        }
        Ok(FrameView { buf })
    }

    /// Create a view over the first `length` bytes of `buf`.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `length` is larger than `buf` or smaller than
    /// [Self::MIN_LEN].
    pub fn with_length(buf: &'a [u8], length: u16) -> Result<Self> {
        match buf.get(..usize::from(length)) {
            Some(buf) => Self::new(buf),
            None => Err(Error::InvalidArgument(
                "The declared frame length is larger than the buffer",
            )),
        }
    }

    /// Check the frame follows the fixed frame profile.
    ///
    /// # Errors
    /// [Error::MalformedFrame] naming the first rule violated.
    pub fn validate(&self) -> Result<()> {
        let version = self.version();
        if version != 0 {
            return Err(FrameViolation::Version(version).into());
        }

        let flags = self.header::<u8>(4);
        if flags & 0x80 == 0 {
            return Err(FrameViolation::SecondaryHeaderFlag.into());
        }
        if flags & 0x40 != 0 {
            return Err(FrameViolation::SynchronizationFlag.into());
        }
        if flags & 0x20 != 0 {
            return Err(FrameViolation::PacketOrderFlag.into());
        }
        if flags & 0x18 != 0x18 {
            return Err(FrameViolation::SegmentLengthId((flags >> 3) & 0x3).into());
        }
        Ok(())
    }

    /// Check the frame was produced by the `expected` spacecraft.
    ///
    /// # Errors
    /// [Error::MalformedFrame] with [FrameViolation::SpacecraftId] if it was not.
    pub fn validate_spacecraft(&self, expected: Scid) -> Result<()> {
        let actual = self.spacecraft_id();
        if actual != expected {
            return Err(FrameViolation::SpacecraftId { actual, expected }.into());
        }
        Ok(())
    }

    fn header<T: BigEndian + Default>(&self, offset: usize) -> T {
        // header fields lie within MIN_LEN, checked by new
        read_be(self.buf, offset).unwrap_or_default()
    }

    /// Total frame length, including headers, data and trailer.
    #[must_use]
    pub fn total_length(&self) -> u16 {
        // new guarantees the length fits
        u16::try_from(self.buf.len()).unwrap_or(u16::MAX)
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        (self.header::<u8>(0) >> 6) & 0x3
    }

    #[must_use]
    pub fn spacecraft_id(&self) -> Scid {
        (self.header::<u16>(0) >> 4) & 0x3ff
    }

    #[must_use]
    pub fn virtual_channel_id(&self) -> Vcid {
        (self.header::<u8>(1) >> 1) & 0x7
    }

    #[must_use]
    pub fn has_operational_control_field(&self) -> bool {
        self.header::<u8>(1) & 0x1 != 0
    }

    #[must_use]
    pub fn master_channel_frame_count(&self) -> u8 {
        self.header::<u8>(2)
    }

    #[must_use]
    pub fn virtual_channel_frame_count(&self) -> u8 {
        self.header::<u8>(3)
    }

    /// Offset into the data zone of the first packet header, or one of the
    /// `FHP_*` sentinels.
    #[must_use]
    pub fn first_header_pointer(&self) -> u16 {
        self.header::<u16>(4) & 0x7ff
    }

    /// True when the data zone only contains idle data.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.first_header_pointer() == Self::FHP_IDLE
    }

    /// True when a packet header starts somewhere in the data zone.
    #[must_use]
    pub fn has_packet_start(&self) -> bool {
        !matches!(
            self.first_header_pointer(),
            Self::FHP_IDLE | Self::FHP_NO_PACKET_START
        )
    }

    /// Byte range of the data zone within the frame.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the frame is too short to have a data zone.
    pub fn data_range(&self) -> Result<Range<usize>> {
        let start = Self::PRIMARY_HEADER_LEN + Self::SECONDARY_HEADER_LEN;
        let trailer = if self.has_operational_control_field() {
            Self::OCF_LEN
        } else {
            0
        };
        if self.buf.len() < start + trailer {
            return Err(Error::NotEnoughData {
                actual: self.buf.len(),
                minimum: start + trailer,
            });
        }
        Ok(start..self.buf.len() - trailer)
    }

    /// The data zone bytes.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the frame is too short to have a data zone.
    pub fn data(&self) -> Result<&'a [u8]> {
        let range = self.data_range()?;
        Ok(&self.buf[range])
    }

    /// All frame bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }
}

/// Calculate the number of frames missing between the `expected` virtual channel
/// frame counter and the `cur` one actually received, modulo 256.
#[must_use]
pub fn missing_frames(cur: u8, expected: u8) -> u8 {
    cur.wrapping_sub(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn valid_frame() -> Vec<u8> {
        let mut dat: Vec<u8> = vec![
            0x0d, 0x23, // version 0, scid 210, vcid 1, ocf
            0xaa, // mc frame count
            0xbb, // vc frame count
            0x9d, 0x55, // flags, fhp 0x555
            0xaa, 0xaa, 0xaa, 0xaa, // secondary header
        ];
        dat.resize(50, 0);
        dat
    }

    #[test]
    fn decode_header() {
        let dat = valid_frame();
        let frame = FrameView::new(&dat).unwrap();
        frame.validate().unwrap();

        assert_eq!(frame.total_length(), 50);
        assert_eq!(frame.version(), 0);
        assert_eq!(frame.spacecraft_id(), 210);
        assert_eq!(frame.virtual_channel_id(), 1);
        assert!(frame.has_operational_control_field());
        assert_eq!(frame.master_channel_frame_count(), 0xaa);
        assert_eq!(frame.virtual_channel_frame_count(), 0xbb);
        assert_eq!(frame.first_header_pointer(), 0x555);
        assert!(frame.has_packet_start());
        assert!(!frame.is_idle());
    }

    #[test]
    fn decode_header_minmax() {
        let dat = [0u8; 7];
        let frame = FrameView::new(&dat).unwrap();
        assert_eq!(frame.spacecraft_id(), 0);
        assert_eq!(frame.first_header_pointer(), 0);

        let dat = [0xffu8; 7];
        let frame = FrameView::new(&dat).unwrap();
        assert_eq!(frame.version(), 3);
        assert_eq!(frame.spacecraft_id(), 0x3ff);
        assert_eq!(frame.virtual_channel_id(), 7);
        assert_eq!(frame.first_header_pointer(), FrameView::FHP_NO_PACKET_START);
    }

    #[test]
    fn data_zone() {
        let dat = valid_frame();
        let frame = FrameView::new(&dat).unwrap();
        assert_eq!(frame.data_range().unwrap(), 10..46, "ocf trailer excluded");

        let mut dat = valid_frame();
        dat[1] &= !0x1;
        let frame = FrameView::new(&dat).unwrap();
        assert_eq!(frame.data_range().unwrap(), 10..50);
        assert_eq!(frame.data().unwrap().len(), 40);
    }

    #[test]
    fn data_zone_too_short() {
        let dat = valid_frame();
        let frame = FrameView::new(&dat[..12]).unwrap();
        assert_eq!(
            frame.data(),
            Err(Error::NotEnoughData {
                actual: 12,
                minimum: 14
            })
        );
    }

    #[test]
    fn construct_too_short() {
        let dat = valid_frame();
        assert!(matches!(
            FrameView::new(&dat[..5]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            FrameView::new(&[]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(FrameView::new(&dat[..7]).is_ok());
    }

    #[test]
    fn construct_with_length() {
        let dat = valid_frame();
        let frame = FrameView::with_length(&dat, 20).unwrap();
        assert_eq!(frame.total_length(), 20);
        assert_eq!(frame.as_bytes(), &dat[..20]);

        assert!(matches!(
            FrameView::with_length(&dat, 51),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn construct_too_long() {
        let dat = vec![0u8; usize::from(u16::MAX) + 1];
        assert!(matches!(
            FrameView::new(&dat),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test_case(0, 0x80, FrameViolation::Version(2); "version")]
    #[test_case(4, 0x80, FrameViolation::SecondaryHeaderFlag; "secondary header flag")]
    #[test_case(4, 0x40, FrameViolation::SynchronizationFlag; "sync flag")]
    #[test_case(4, 0x20, FrameViolation::PacketOrderFlag; "packet order flag")]
    #[test_case(4, 0x10, FrameViolation::SegmentLengthId(0b01); "segment length id")]
    #[test_case(4, 0x08, FrameViolation::SegmentLengthId(0b10); "segment length id low")]
    fn validate_flipped_bit(idx: usize, bit: u8, expected: FrameViolation) {
        let mut dat = valid_frame();
        dat[idx] ^= bit;
        let frame = FrameView::new(&dat).unwrap();

        assert_eq!(frame.validate(), Err(Error::MalformedFrame(expected)));
    }

    #[test]
    fn validate_spacecraft() {
        let dat = valid_frame();
        let frame = FrameView::new(&dat).unwrap();

        frame.validate_spacecraft(210).unwrap();
        assert_eq!(
            frame.validate_spacecraft(CHEOPS_SCID),
            Err(Error::MalformedFrame(FrameViolation::SpacecraftId {
                actual: 210,
                expected: CHEOPS_SCID
            }))
        );
    }

    #[test_case(0x07fe, false, true; "idle")]
    #[test_case(0x07ff, false, false; "no packet start")]
    #[test_case(0x0000, true, false; "start at zero")]
    #[test_case(0x07fd, true, false; "largest offset")]
    fn fhp_sentinels(fhp: u16, has_start: bool, idle: bool) {
        let mut dat = valid_frame();
        dat[4] = 0x98 | (fhp >> 8) as u8;
        dat[5] = (fhp & 0xff) as u8;
        let frame = FrameView::new(&dat).unwrap();

        assert_eq!(frame.first_header_pointer(), fhp);
        assert_eq!(frame.has_packet_start(), has_start);
        assert_eq!(frame.is_idle(), idle);
        frame.validate().unwrap();
    }

    #[test]
    fn test_missing_frames() {
        assert_eq!(missing_frames(5, 5), 0);
        assert_eq!(missing_frames(6, 5), 1);
        assert_eq!(missing_frames(0, 255), 1);
        assert_eq!(missing_frames(1, 255), 2);
        assert_eq!(missing_frames(4, 5), 255);
    }
}
