use crate::framing::{Scid, Vcid};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A buffer handed to a reader or view cannot possibly hold what it is
    /// supposed to hold.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A field read would run past the end of the buffer.
    #[error("Not enough bytes; got {actual}, need at least {minimum}")]
    NotEnoughData {
        /// Number of bytes we got
        actual: usize,
        /// Minimum number of expected bytes
        minimum: usize,
    },

    #[error("malformed transfer frame: {0}")]
    MalformedFrame(#[from] FrameViolation),

    #[error("malformed space packet: {0}")]
    MalformedPacket(#[from] PacketViolation),

    #[error("Telemetry transfer frame belongs to virtual channel {actual}, extractor is for {expected}")]
    WrongChannel { actual: Vcid, expected: Vcid },
}

/// Fixed transfer frame profile rule that a frame did not follow.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameViolation {
    #[error("Invalid Transfer Frame Version Number {0}, only version 0 is supported")]
    Version(u8),
    #[error("Transfer Frame Secondary Header Flag must be 1, secondary header is always present")]
    SecondaryHeaderFlag,
    #[error("Synchronization Flag must be 0, any other value is not supported")]
    SynchronizationFlag,
    #[error("Packet Order Flag must be 0, any other value is not supported")]
    PacketOrderFlag,
    #[error("Segment Length Identifier must be 0b11, got {0:#04b}")]
    SegmentLengthId(u8),
    #[error("Invalid Spacecraft ID {actual:#x}, expected {expected:#x}")]
    SpacecraftId { actual: Scid, expected: Scid },
}

/// Fixed packet profile rule that a packet did not follow.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PacketViolation {
    #[error("The packet is truncated or the buffer is too small, packet is {length} bytes long, got {available} bytes")]
    Truncated { length: usize, available: usize },
    #[error("The packet is corrupted, checksum validation failed. Computed {computed:#06x}, read {read:#06x}")]
    Crc { computed: u16, read: u16 },
    #[error("Only packets version number 0 are supported, got {0}")]
    Version(u8),
    #[error("Only telemetry packets are supported")]
    NotTelemetry,
    #[error("Packets without a Data Field Header are not supported")]
    NoDataFieldHeader,
    #[error("Segmented packets are not supported, segmentation flags {0:#04b}")]
    Segmented(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
