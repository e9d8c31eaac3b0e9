//! CAN bit timing (ISO 11898-1): prescaler and segment lengths derived from a
//! target bit rate and the controller's input clock.
//!
//! ```text
//! bit_rate = clock_hz / (prescaler * (1 + ts1 + ts2))
//! sample point = (1 + ts1) / (1 + ts1 + ts2)
//! ```
use crate::error::ConfigurationError;
use crate::timing::TimingProfile;

//==================================================================================LIMITS
/// Valid ranges of the bit timing fields for one controller family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitTimingLimits {
    pub prescaler_min: u16,
    pub prescaler_max: u16,
    pub sjw_min: u8,
    pub sjw_max: u8,
    pub ts1_min: u8,
    pub ts1_max: u8,
    pub ts2_min: u8,
    pub ts2_max: u8,
    /// Time quanta per bit, sync segment included.
    pub quanta_min: u8,
    pub quanta_max: u8,
}

impl BitTimingLimits {
    /// Every range must be non-empty and start at one or more.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let ranges = [
            ("prescaler", self.prescaler_min as u32, self.prescaler_max as u32),
            ("sjw", self.sjw_min as u32, self.sjw_max as u32),
            ("ts1", self.ts1_min as u32, self.ts1_max as u32),
            ("ts2", self.ts2_min as u32, self.ts2_max as u32),
            ("quanta per bit", self.quanta_min as u32, self.quanta_max as u32),
        ];
        for (field, min, max) in ranges {
            if min == 0 || min > max {
                return Err(ConfigurationError::InvalidLimits { field });
            }
        }
        Ok(())
    }
}

/// Limits of the Zynq CANPS controller (8-bit BRPR, 2/4/3-bit BTR fields).
pub const CANPS_LIMITS: BitTimingLimits = BitTimingLimits {
    prescaler_min: 1,
    prescaler_max: 256,
    sjw_min: 1,
    sjw_max: 4,
    ts1_min: 1,
    ts1_max: 16,
    ts2_min: 1,
    ts2_max: 8,
    quanta_min: 8,
    quanta_max: 25,
};

/// Recommended sample point (CANopen / DeviceNet), in permille.
pub const DEFAULT_SAMPLE_POINT_PERMILLE: u16 = 875;

/// Accepted distance from the requested sample point before trying fewer quanta.
pub const DEFAULT_SAMPLE_POINT_TOLERANCE_PERMILLE: u16 = 50;

//==================================================================================BIT_TIMING
/// Bit timing in time quanta (not register encoding).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub prescaler: u16,
    pub sjw: u8,
    pub ts1: u8,
    pub ts2: u8,
}

/// Register encoding of a [`BitTiming`]: each field stores its value minus one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterFields {
    /// Baud rate prescaler register (BRPR).
    pub brp: u8,
    /// BTR synchronization jump width.
    pub sjw: u8,
    /// BTR time segment 1.
    pub ts1: u8,
    /// BTR time segment 2.
    pub ts2: u8,
}

impl BitTiming {
    /// Build a timing from quanta values, rejecting anything outside [`CANPS_LIMITS`].
    pub fn new(prescaler: u16, sjw: u8, ts1: u8, ts2: u8) -> Result<Self, ConfigurationError> {
        let timing = Self {
            prescaler,
            sjw,
            ts1,
            ts2,
        };
        timing.validate_against(&CANPS_LIMITS)?;
        Ok(timing)
    }

    /// Decode register fields (value minus one) into quanta values.
    pub fn from_register_fields(fields: RegisterFields) -> Result<Self, ConfigurationError> {
        Self::new(
            fields.brp as u16 + 1,
            fields.sjw.saturating_add(1),
            fields.ts1.saturating_add(1),
            fields.ts2.saturating_add(1),
        )
    }

    /// Encode for the BRPR/BTR registers. Meaningful only for a timing that
    /// passed validation; zero fields saturate at zero.
    pub fn register_fields(&self) -> RegisterFields {
        RegisterFields {
            brp: self.prescaler.saturating_sub(1) as u8,
            sjw: self.sjw.saturating_sub(1),
            ts1: self.ts1.saturating_sub(1),
            ts2: self.ts2.saturating_sub(1),
        }
    }

    /// Time quanta per bit, sync segment included.
    pub fn quanta_per_bit(&self) -> u32 {
        1 + self.ts1 as u32 + self.ts2 as u32
    }

    /// Bit rate produced by this timing for the given input clock (0 for a
    /// zero prescaler).
    pub fn bit_rate(&self, clock_hz: u32) -> u32 {
        clock_hz
            .checked_div(self.prescaler as u32 * self.quanta_per_bit())
            .unwrap_or(0)
    }

    pub fn sample_point_permille(&self) -> u16 {
        ((1 + self.ts1 as u32) * 1000 / self.quanta_per_bit()) as u16
    }

    pub fn validate_against(&self, limits: &BitTimingLimits) -> Result<(), ConfigurationError> {
        check_range(
            "prescaler",
            self.prescaler as u32,
            limits.prescaler_min as u32,
            limits.prescaler_max as u32,
        )?;
        check_range(
            "sjw",
            self.sjw as u32,
            limits.sjw_min as u32,
            limits.sjw_max as u32,
        )?;
        check_range(
            "ts1",
            self.ts1 as u32,
            limits.ts1_min as u32,
            limits.ts1_max as u32,
        )?;
        check_range(
            "ts2",
            self.ts2 as u32,
            limits.ts2_min as u32,
            limits.ts2_max as u32,
        )?;
        check_range(
            "quanta per bit",
            self.quanta_per_bit(),
            limits.quanta_min as u32,
            limits.quanta_max as u32,
        )?;
        if self.sjw > self.ts2 {
            return Err(ConfigurationError::JumpWidthExceedsSegment2 {
                sjw: self.sjw,
                ts2: self.ts2,
            });
        }
        Ok(())
    }
}

impl TimingProfile for BitTiming {
    fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_against(&CANPS_LIMITS)
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigurationError> {
    if value < min || value > max {
        return Err(ConfigurationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

//==================================================================================CALCULATOR
/// Inputs of the bit timing search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTimingRequest {
    pub bit_rate: u32,
    pub clock_hz: u32,
    pub sample_point_permille: u16,
    pub tolerance_permille: u16,
}

impl BitTimingRequest {
    /// Request with the recommended 87.5 % sample point.
    pub const fn new(bit_rate: u32, clock_hz: u32) -> Self {
        Self {
            bit_rate,
            clock_hz,
            sample_point_permille: DEFAULT_SAMPLE_POINT_PERMILLE,
            tolerance_permille: DEFAULT_SAMPLE_POINT_TOLERANCE_PERMILLE,
        }
    }

    pub const fn with_sample_point(mut self, permille: u16) -> Self {
        self.sample_point_permille = permille;
        self
    }
}

/// Compute a [`BitTiming`] reproducing `request.bit_rate` exactly.
///
/// Strategy:
/// 1. `clock_hz / bit_rate` must be an integer (prescaler × quanta per bit).
/// 2. Walk quanta counts from the largest down, keeping those that divide it
///    with an in-range prescaler.
/// 3. Split the segments around the requested sample point; the first split
///    within tolerance wins, otherwise the closest one found.
pub fn calculate(
    request: &BitTimingRequest,
    limits: &BitTimingLimits,
) -> Result<BitTiming, ConfigurationError> {
    limits.validate()?;
    if request.bit_rate == 0 {
        return Err(ConfigurationError::ZeroBitRate);
    }
    if request.clock_hz == 0 {
        return Err(ConfigurationError::ZeroClock);
    }
    if request.sample_point_permille == 0 || request.sample_point_permille >= 1000 {
        return Err(ConfigurationError::InvalidSamplePoint {
            permille: request.sample_point_permille,
        });
    }

    let no_solution = ConfigurationError::NoTimingSolution {
        bit_rate: request.bit_rate,
        clock_hz: request.clock_hz,
    };
    if request.clock_hz % request.bit_rate != 0 {
        return Err(no_solution);
    }
    let prescaler_quanta = request.clock_hz / request.bit_rate;

    let mut best: Option<(BitTiming, u16)> = None;
    for quanta in (limits.quanta_min..=limits.quanta_max).rev() {
        let quanta = quanta as u32;
        if prescaler_quanta % quanta != 0 {
            continue;
        }
        let prescaler = prescaler_quanta / quanta;
        if prescaler < limits.prescaler_min as u32 || prescaler > limits.prescaler_max as u32 {
            continue;
        }
        let Some(timing) = split_segments(prescaler as u16, quanta, request, limits) else {
            continue;
        };

        let error = timing
            .sample_point_permille()
            .abs_diff(request.sample_point_permille);
        if error <= request.tolerance_permille {
            return Ok(timing);
        }
        if best.map_or(true, |(_, best_error)| error < best_error) {
            best = Some((timing, error));
        }
    }

    best.map(|(timing, _)| timing).ok_or(no_solution)
}

/// Distribute `quanta - 1` between TS1 and TS2 around the requested sample point.
fn split_segments(
    prescaler: u16,
    quanta: u32,
    request: &BitTimingRequest,
    limits: &BitTimingLimits,
) -> Option<BitTiming> {
    let segments = quanta - 1;
    let lower = (limits.ts1_min as u32).max(segments.saturating_sub(limits.ts2_max as u32));
    let upper = (limits.ts1_max as u32).min(segments.checked_sub(limits.ts2_min as u32)?);
    if lower > upper {
        return None;
    }

    // Nearest integer to sample_point * quanta, minus the sync segment.
    let ideal = (request.sample_point_permille as u32 * quanta + 500) / 1000;
    let ts1 = ideal.saturating_sub(1).clamp(lower, upper);
    let ts2 = segments - ts1;
    let sjw = (limits.sjw_max as u32).min(ts2);
    if sjw < limits.sjw_min as u32 {
        return None;
    }

    let timing = BitTiming {
        prescaler,
        sjw: sjw as u8,
        ts1: ts1 as u8,
        ts2: ts2 as u8,
    };
    timing.validate_against(limits).ok().map(|_| timing)
}
