//! Clock and timing parameter derivation.
//!
//! Both calculators are pure: they take the input clock as a parameter and
//! either produce a profile that passes [`TimingProfile::validate`] or fail with
//! a [`ConfigurationError`](crate::error::ConfigurationError) before any
//! register is touched.
use crate::error::ConfigurationError;

pub mod bit_timing;
pub mod storage_clock;

/// Timing parameters applied to a peripheral during its configuration phase.
pub trait TimingProfile: Copy + core::fmt::Debug {
    /// Check every field against the peripheral's documented ranges.
    fn validate(&self) -> Result<(), ConfigurationError>;
}
