//! Resolved peripheral configuration, supplied by board bootstrap code.
//!
//! Defaults reproduce the reference harness: CANPS 0 at 40 kbit/s from a
//! 24 MHz clock, SD 1 (eMMC) at 50 MHz with 512-byte blocks.
use crate::core::{PeripheralId, DEFAULT_BLOCK_SIZE};
use crate::error::ConfigurationError;
use crate::infra::poll::{default_clock, PollBudget, PollClock};
use crate::peripheral::mode::StallPolicy;
use crate::timing::bit_timing::{self, BitTiming, BitTimingRequest, CANPS_LIMITS};
use crate::timing::storage_clock::StorageClock;

/// Zynq-7000 CAN 0 register base.
pub const CANPS0_BASE_ADDRESS: u32 = 0xE000_8000;

/// Zynq-7000 SD 1 register base.
pub const SDPS1_BASE_ADDRESS: u32 = 0xE010_1000;

//==================================================================================PERIPHERAL_CONFIG
/// What the driver needs to bind to one hardware instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralConfig {
    pub id: PeripheralId,
    pub base_address: u32,
}

//==================================================================================CAN_CONFIG
#[derive(Clone, Copy, Debug)]
pub struct CanConfig {
    pub device_id: u16,
    pub base_address: u32,
    /// Target bit rate (bit/s).
    pub bit_rate: u32,
    /// CAN reference clock feeding the prescaler (Hz).
    pub clock_hz: u32,
    pub sample_point_permille: u16,
    /// Budget of every wait on this controller.
    pub poll: PollBudget,
    /// Measures `poll.timeout`.
    pub poll_clock: &'static dyn PollClock,
    pub stall: StallPolicy,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            base_address: CANPS0_BASE_ADDRESS,
            bit_rate: 40_000,
            clock_hz: 24_000_000,
            sample_point_permille: bit_timing::DEFAULT_SAMPLE_POINT_PERMILLE,
            poll: PollBudget::default(),
            poll_clock: default_clock(),
            stall: StallPolicy::Reissue { every: 1_000 },
        }
    }
}

impl CanConfig {
    pub fn peripheral(&self) -> PeripheralConfig {
        PeripheralConfig {
            id: PeripheralId::can(self.device_id),
            base_address: self.base_address,
        }
    }

    /// Derive the bit timing for this configuration.
    pub fn timing(&self) -> Result<BitTiming, ConfigurationError> {
        let request = BitTimingRequest::new(self.bit_rate, self.clock_hz)
            .with_sample_point(self.sample_point_permille);
        bit_timing::calculate(&request, &CANPS_LIMITS)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.poll.validate_for(self.poll_clock)?;
        self.stall.validate()?;
        self.timing().map(|_| ())
    }
}

//==================================================================================STORAGE_CONFIG
#[derive(Clone, Copy, Debug)]
pub struct StorageConfig {
    pub device_id: u16,
    pub base_address: u32,
    /// Host controller base clock (Hz).
    pub input_clock_hz: u32,
    /// Highest bus clock allowed for data transfer (Hz).
    pub clock_ceiling_hz: u32,
    pub block_size: usize,
    pub poll: PollBudget,
    pub poll_clock: &'static dyn PollClock,
    pub stall: StallPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            device_id: 1,
            base_address: SDPS1_BASE_ADDRESS,
            input_clock_hz: 50_000_000,
            clock_ceiling_hz: 50_000_000,
            block_size: DEFAULT_BLOCK_SIZE,
            poll: PollBudget::default(),
            poll_clock: default_clock(),
            stall: StallPolicy::Wait,
        }
    }
}

impl StorageConfig {
    pub fn peripheral(&self) -> PeripheralConfig {
        PeripheralConfig {
            id: PeripheralId::storage(self.device_id),
            base_address: self.base_address,
        }
    }

    /// Derive the transfer clock for this configuration.
    pub fn clock(&self) -> Result<StorageClock, ConfigurationError> {
        StorageClock::for_ceiling(self.input_clock_hz, self.clock_ceiling_hz)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_block_size(self.block_size)?;
        self.poll.validate_for(self.poll_clock)?;
        self.stall.validate()?;
        self.clock().map(|_| ())
    }
}

/// Block sizes must be non-zero powers of two.
pub fn validate_block_size(size: usize) -> Result<(), ConfigurationError> {
    if size == 0 || !size.is_power_of_two() {
        return Err(ConfigurationError::InvalidBlockSize { size });
    }
    Ok(())
}
