//! CCSDS Space Packets with the CHEOPS 10 byte data field header.
mod summary;
mod timecode;

pub use summary::*;
pub use timecode::*;

use std::borrow::Cow;
use std::fmt::Display;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::bytes::{read_be, BigEndian};
use crate::crc;
use crate::error::PacketViolation;
use crate::{Error, Result};

pub type Apid = u16;

/// Read-only view of a single space packet.
///
/// The buffer may be longer than the packet; [PacketView::packet_length] is taken from
/// the header. Primary header accessors only need the 7 bytes required at construction,
/// everything else is bounds checked and returns [Error::NotEnoughData] when the buffer
/// ends early. Nothing requires [PacketView::validate] to have been called.
///
/// # Example
/// ```
/// use ccsds_telemetry::spacepacket::PacketView;
///
/// #[rustfmt::skip]
/// let dat: &[u8] = &[
///     // primary header: apid 0x100, sequence count 1, length 18
///     0x09, 0x00, 0xc0, 0x01, 0x00, 0x0b,
///     // data field header: service 3, subtype 25, destination 0, time
///     0x10, 0x03, 0x19, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
///     // packet error control
///     0xda, 0x22,
/// ];
/// let packet = PacketView::new(dat).unwrap();
/// assert_eq!(packet.apid(), 0x100);
/// assert_eq!(packet.sequence_count(), 1);
/// assert_eq!(packet.packet_length(), 18);
/// assert_eq!(packet.service_type().unwrap(), 3);
/// assert_eq!(packet.payload().unwrap().len(), 0);
/// packet.validate().unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    buf: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// Packet primary header length in bytes
    pub const HEADER_LEN: usize = 6;
    /// Mission data field header length in bytes
    pub const DATA_FIELD_HEADER_LEN: usize = 10;
    /// Packet error control length in bytes
    pub const PEC_LEN: usize = 2;
    /// Smallest buffer a view can be constructed over
    pub const MIN_LEN: usize = 7;
    /// Value added to the packet length header field to get the total packet length.
    pub const LENGTH_OFFSET: usize = 7;
    /// Reserved APID of idle packets.
    pub const IDLE_APID: Apid = 0x7ff;
    /// Maximum sequence count before it wraps to 0.
    pub const SEQ_MAX: u16 = 0x3fff;

    /// Create a view over `buf`, which must start with a packet header.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `buf` is shorter than [Self::MIN_LEN].
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < Self::MIN_LEN {
            return Err(Error::InvalidArgument(
                "The buffer is too small to contain any valid packet",
            ));
        }
        Ok(PacketView { buf })
    }

    /// Check the packet is complete, uncorrupted and follows the fixed packet profile.
    ///
    /// # Errors
    /// [Error::MalformedPacket] naming the first rule violated. The checks are done in
    /// the order: length, checksum, version, type, data field header, segmentation.
    pub fn validate(&self) -> Result<()> {
        let length = self.packet_length();
        if self.buf.len() < length {
            return Err(PacketViolation::Truncated {
                length,
                available: self.buf.len(),
            }
            .into());
        }

        let computed = crc::compute(&self.buf[..length - Self::PEC_LEN]);
        let read = self.packet_error_control()?;
        if computed != read {
            return Err(PacketViolation::Crc { computed, read }.into());
        }

        let version = self.version();
        if version != 0 {
            return Err(PacketViolation::Version(version).into());
        }
        if self.packet_type() != 0 {
            return Err(PacketViolation::NotTelemetry.into());
        }
        if !self.has_data_field_header() {
            return Err(PacketViolation::NoDataFieldHeader.into());
        }
        let flags = self.sequence_flags();
        if flags != 0x3 {
            return Err(PacketViolation::Segmented(flags).into());
        }
        Ok(())
    }

    fn header<T: BigEndian + Default>(&self, offset: usize) -> T {
        // header fields lie within MIN_LEN, checked by new
        read_be(self.buf, offset).unwrap_or_default()
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        (self.header::<u8>(0) >> 5) & 0x7
    }

    /// Packet type, 0 for telemetry.
    #[must_use]
    pub fn packet_type(&self) -> u8 {
        (self.header::<u8>(0) >> 4) & 0x1
    }

    #[must_use]
    pub fn has_data_field_header(&self) -> bool {
        self.header::<u8>(0) & 0x8 != 0
    }

    #[must_use]
    pub fn apid(&self) -> Apid {
        self.header::<u16>(0) & 0x7ff
    }

    /// Segmentation flags, 0b11 for unsegmented packets.
    #[must_use]
    pub fn sequence_flags(&self) -> u8 {
        (self.header::<u8>(2) >> 6) & 0x3
    }

    #[must_use]
    pub fn sequence_count(&self) -> u16 {
        self.header::<u16>(2) & Self::SEQ_MAX
    }

    /// Total packet length in bytes, headers and error control included.
    #[must_use]
    pub fn packet_length(&self) -> usize {
        usize::from(self.header::<u16>(4)) + Self::LENGTH_OFFSET
    }

    /// # Errors
    /// [Error::NotEnoughData] if the buffer ends before the field.
    pub fn service_type(&self) -> Result<u8> {
        read_be(self.buf, 7)
    }

    /// # Errors
    /// [Error::NotEnoughData] if the buffer ends before the field.
    pub fn service_subtype(&self) -> Result<u8> {
        read_be(self.buf, 8)
    }

    /// # Errors
    /// [Error::NotEnoughData] if the buffer ends before the field.
    pub fn destination_id(&self) -> Result<u8> {
        read_be(self.buf, 9)
    }

    /// The 48-bit onboard time occupying the last 6 bytes of the data field header.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the buffer ends before the end of the data field header.
    pub fn onboard_time(&self) -> Result<u64> {
        // read 8 bytes ending with the time, then drop the 2 leading header bytes
        Ok(read_be::<u64>(self.buf, 8)? & OnboardTime::MASK)
    }

    /// [PacketView::onboard_time] decoded as an [OnboardTime].
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the buffer ends before the end of the data field header.
    pub fn onboard_timecode(&self) -> Result<OnboardTime> {
        Ok(OnboardTime::new(self.onboard_time()?))
    }

    /// CRC trailer read from the last 2 bytes of the packet.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the buffer is shorter than the packet.
    pub fn packet_error_control(&self) -> Result<u16> {
        read_be(self.buf, self.packet_length() - Self::PEC_LEN)
    }

    /// Byte range of the user data between the data field header and the error control.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the buffer is shorter than the packet, or the packet is
    /// too short to have headers and error control.
    pub fn payload_range(&self) -> Result<Range<usize>> {
        let start = Self::HEADER_LEN + Self::DATA_FIELD_HEADER_LEN;
        let length = self.packet_length();
        if length < start + Self::PEC_LEN {
            return Err(Error::NotEnoughData {
                actual: length,
                minimum: start + Self::PEC_LEN,
            });
        }
        if self.buf.len() < length {
            return Err(Error::NotEnoughData {
                actual: self.buf.len(),
                minimum: length,
            });
        }
        Ok(start..length - Self::PEC_LEN)
    }

    /// User data bytes.
    ///
    /// # Errors
    /// See [PacketView::payload_range].
    pub fn payload(&self) -> Result<&'a [u8]> {
        let range = self.payload_range()?;
        Ok(&self.buf[range])
    }

    /// The packet bytes, or the whole buffer if it is shorter than the packet.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        let end = self.packet_length().min(self.buf.len());
        &self.buf[..end]
    }

    /// True for packets with the all-zero idle pattern: a minimal length packet whose
    /// error control field reads 0.
    #[must_use]
    pub(crate) fn is_zero_fill(&self) -> bool {
        self.packet_length() == Self::MIN_LEN && matches!(self.packet_error_control(), Ok(0))
    }
}

/// Packet represents a single space packet that owns its bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// All packet bytes, including headers and error control
    pub data: Vec<u8>,
    /// True when the packet was reassembled from more than one frame
    pub reconstructed: bool,
}

impl Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.view() {
            Ok(view) => write!(
                f,
                "Packet{{apid={}, seq={}, len={}, reconstructed={}}}",
                view.apid(),
                view.sequence_count(),
                self.data.len(),
                self.reconstructed
            ),
            Err(_) => write!(f, "Packet{{data:[len={}]}}", self.data.len()),
        }
    }
}

impl Packet {
    /// # Errors
    /// [Error::InvalidArgument] if there are not enough bytes for a packet header.
    pub fn view(&self) -> Result<PacketView<'_>> {
        PacketView::new(&self.data)
    }
}

/// A packet handed out by a [PacketExtractor](crate::framing::PacketExtractor).
///
/// Packets fully contained in one frame borrow the frame bytes and are only valid for
/// the duration of the hand-off. Reassembled packets own their bytes, which can be
/// moved out with [ExtractedPacket::into_packet] without copying.
#[derive(Debug, Clone)]
pub struct ExtractedPacket<'a> {
    // Always at least PacketView::MIN_LEN bytes
    data: Cow<'a, [u8]>,
}

impl<'a> ExtractedPacket<'a> {
    pub(crate) fn borrowed(data: &'a [u8]) -> Self {
        debug_assert!(data.len() >= PacketView::MIN_LEN);
        ExtractedPacket {
            data: Cow::Borrowed(data),
        }
    }

    pub(crate) fn owned(data: Vec<u8>) -> ExtractedPacket<'static> {
        debug_assert!(data.len() >= PacketView::MIN_LEN);
        ExtractedPacket {
            data: Cow::Owned(data),
        }
    }

    #[must_use]
    pub fn view(&self) -> PacketView<'_> {
        PacketView { buf: &self.data }
    }

    /// True when the packet was reassembled from more than one frame.
    #[must_use]
    pub fn is_reconstructed(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Convert into an owned [Packet], copying only if the bytes are borrowed.
    #[must_use]
    pub fn into_packet(self) -> Packet {
        let reconstructed = self.is_reconstructed();
        Packet {
            data: self.data.into_owned(),
            reconstructed,
        }
    }
}
