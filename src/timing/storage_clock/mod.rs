//! Storage bus clock selection. SD/eMMC host controllers divide their base
//! clock by 1 or by an even value up to 2046; the chosen clock is the fastest
//! one not exceeding the requested ceiling.
use crate::error::ConfigurationError;
use crate::timing::TimingProfile;

/// Highest bus clock for high-speed MMC.
pub const MMC_HIGH_SPEED_MAX_HZ: u32 = 52_000_000;

/// Card identification clock.
pub const MMC_IDENTIFICATION_HZ: u32 = 400_000;

/// Largest divisor supported by the 10-bit divided-clock mode.
pub const MAX_DIVISOR: u16 = 2046;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Storage timing profile: base clock, divisor and resulting bus clock.
pub struct StorageClock {
    pub input_hz: u32,
    pub divisor: u16,
    pub clock_frequency_hz: u32,
}

impl StorageClock {
    /// Fastest bus clock ≤ `ceiling_hz` (itself capped at 52 MHz).
    pub fn for_ceiling(input_hz: u32, ceiling_hz: u32) -> Result<Self, ConfigurationError> {
        if input_hz == 0 {
            return Err(ConfigurationError::ZeroClock);
        }
        let min_hz = input_hz / MAX_DIVISOR as u32;
        let too_low = ConfigurationError::ClockCeilingTooLow {
            input_hz,
            ceiling_hz,
            min_hz,
        };
        if ceiling_hz == 0 {
            return Err(too_low);
        }

        let ceiling = ceiling_hz.min(MMC_HIGH_SPEED_MAX_HZ);
        let divisor = match input_hz.div_ceil(ceiling) {
            0 | 1 => 1,
            x if x > MAX_DIVISOR as u32 => return Err(too_low),
            // Only even divisors above one.
            x => x.div_ceil(2) * 2,
        };

        Ok(Self {
            input_hz,
            divisor: divisor as u16,
            clock_frequency_hz: input_hz / divisor,
        })
    }

    /// Identification-phase clock (400 kHz ceiling).
    pub fn identification(input_hz: u32) -> Result<Self, ConfigurationError> {
        Self::for_ceiling(input_hz, MMC_IDENTIFICATION_HZ)
    }
}

impl TimingProfile for StorageClock {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.input_hz == 0 {
            return Err(ConfigurationError::ZeroClock);
        }
        let divisor = self.divisor as u32;
        if divisor == 0 || divisor > MAX_DIVISOR as u32 || (divisor > 1 && divisor % 2 != 0) {
            return Err(ConfigurationError::OutOfRange {
                field: "clock divisor",
                value: divisor,
                min: 1,
                max: MAX_DIVISOR as u32,
            });
        }
        if self.clock_frequency_hz != self.input_hz / divisor
            || self.clock_frequency_hz > MMC_HIGH_SPEED_MAX_HZ
        {
            return Err(ConfigurationError::OutOfRange {
                field: "clock frequency",
                value: self.clock_frequency_hz,
                min: self.input_hz / MAX_DIVISOR as u32,
                max: MMC_HIGH_SPEED_MAX_HZ.min(self.input_hz / divisor),
            });
        }
        Ok(())
    }
}
