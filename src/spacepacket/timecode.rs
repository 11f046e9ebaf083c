use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Onboard time carried in the packet data field header.
///
/// A 48-bit count of 2^-16 second ticks since the onboard clock epoch. The least
/// significant bit of the fine part doubles as the clock synchronization flag.
///
/// # Example
/// ```
/// use ccsds_telemetry::spacepacket::OnboardTime;
///
/// let obt = OnboardTime::new(0x0001_0000_8001);
/// assert_eq!(obt.seconds(), 0x0001_0000);
/// assert_eq!(obt.fine(), 0x8001);
/// assert!(obt.is_synchronized());
/// ```
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OnboardTime(u64);

impl OnboardTime {
    /// Bits actually used by the time value.
    pub const MASK: u64 = 0xffff_ffff_ffff;
    /// Number of fine ticks in one second.
    pub const TICKS_PER_SECOND: u64 = 0x1_0000;

    /// Create from a raw value. Bits above the lower 48 are discarded.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        OnboardTime(raw & Self::MASK)
    }

    /// The raw 48-bit tick count.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Coarse time, whole seconds.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        // mask guarantees 32 bits remain after the shift
        (self.0 >> 16) as u32
    }

    /// Fine time, in 2^-16 s.
    #[must_use]
    pub fn fine(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// True when the onboard clock was synchronized when the time was sampled.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.0 & 0x1 != 0
    }

    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / Self::TICKS_PER_SECOND as f64
    }

    /// Seconds elapsed from `earlier` to `self`, negative if `earlier` is later.
    ///
    /// The synchronization flag bit is forced on both sides so it does not take
    /// part in the difference.
    #[must_use]
    pub fn seconds_since(&self, earlier: &OnboardTime) -> f64 {
        let diff = (self.0 | 0x1) as i64 - (earlier.0 | 0x1) as i64;
        diff as f64 / Self::TICKS_PER_SECOND as f64
    }
}

impl From<u64> for OnboardTime {
    fn from(raw: u64) -> Self {
        OnboardTime::new(raw)
    }
}

impl Display for OnboardTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:05}", self.seconds(), u32::from(self.fine()) * 100_000 / 0x1_0000)
    }
}
