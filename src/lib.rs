#![doc = include_str!("../README.md")]

mod error;

pub mod bytes;
pub mod crc;
pub mod framing;
pub mod spacepacket;

pub use error::{Error, FrameViolation, PacketViolation, Result};
