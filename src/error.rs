//! Error definitions shared across library modules.
//! Each type models one failure class: invalid timing or configuration,
//! rejected caller arguments, bounded-poll exhaustion and hardware faults.
use crate::core::{HardwareCode, Mode, Operation, PeripheralId};
use thiserror_no_std::Error;

//==================================================================================CONFIGURATION_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Invalid timing or configuration, detected before any register write.
pub enum ConfigurationError {
    /// Requested bit rate is zero.
    #[error("Bit rate must be non-zero")]
    ZeroBitRate,
    /// Input clock frequency is zero.
    #[error("Input clock frequency must be non-zero")]
    ZeroClock,
    /// No integer prescaler/segment split reaches the requested rate.
    #[error("No timing solution for {bit_rate} bit/s from a {clock_hz} Hz clock")]
    NoTimingSolution { bit_rate: u32, clock_hz: u32 },
    /// A timing field lies outside the controller's documented range.
    #[error("{field} = {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// ISO 11898-1: the resynchronization jump width may not exceed phase segment 2.
    #[error("SJW {sjw} exceeds time segment 2 ({ts2})")]
    JumpWidthExceedsSegment2 { sjw: u8, ts2: u8 },
    /// Sample point must lie strictly between 0 and 1000 permille.
    #[error("Invalid sample point: {permille} permille")]
    InvalidSamplePoint { permille: u16 },
    /// No divider keeps the storage clock at or below the ceiling.
    #[error("Clock ceiling {ceiling_hz} Hz unreachable from {input_hz} Hz (minimum {min_hz} Hz)")]
    ClockCeilingTooLow {
        input_hz: u32,
        ceiling_hz: u32,
        min_hz: u32,
    },
    /// Block size must be a non-zero power of two.
    #[error("Invalid block size {size}")]
    InvalidBlockSize { size: usize },
    /// Poll budget allows no iteration at all.
    #[error("Poll budget must allow at least one poll")]
    EmptyPollBudget,
    /// Wall-clock poll timeout configured with a clock that never advances.
    #[error("Poll timeout set but the poll clock does not track time")]
    TimeoutWithoutClock,
    /// Timing search limits with an empty or zero-based range.
    #[error("Invalid timing limits for {field}")]
    InvalidLimits { field: &'static str },
    /// Operational mode requested before a timing profile was applied.
    #[error("Timing profile not applied")]
    TimingNotApplied,
    /// Timing can only be written in Configuration mode.
    #[error("Timing registers are only writable in Configuration mode (current: {mode:?})")]
    NotInConfiguration { mode: Mode },
    /// The register layer refused the configuration.
    #[error("Driver rejected configuration: {code}")]
    Rejected { code: HardwareCode },
}

//==================================================================================ARGUMENT_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Caller-supplied value violating a data-model invariant.
pub enum ArgumentError {
    /// Buffer length is not a multiple of the block size.
    #[error("Buffer of {len} bytes is not a multiple of the {block_size}-byte block")]
    UnalignedBuffer { len: usize, block_size: usize },
    /// Zero-length transfer.
    #[error("Empty buffer")]
    EmptyBuffer,
    /// Transfer extends past the end of the device.
    #[error("Blocks {start}..{end} exceed capacity of {capacity} blocks")]
    BeyondCapacity { start: u32, end: u64, capacity: u32 },
    /// More than eight payload bytes.
    #[error("Payload of {len} bytes exceeds 8")]
    PayloadTooLong { len: usize },
    /// Data length code above 8 in a raw frame.
    #[error("Invalid data length code {dlc}")]
    InvalidLengthCode { dlc: u8 },
    /// Buffer too small for the register being read.
    #[error("Buffer of {len} bytes, {needed} required")]
    BufferTooSmall { len: usize, needed: usize },
}

//==================================================================================POLL_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Exit reasons of a bounded poll other than readiness.
pub enum PollError {
    /// Iteration cap or wall-clock timeout reached.
    #[error("Poll budget exhausted after {polls} polls")]
    Exhausted { polls: u32 },
    /// Cancellation signal observed.
    #[error("Poll cancelled after {polls} polls")]
    Cancelled { polls: u32 },
    /// The polled status carried an explicit error.
    #[error("Hardware fault {code} after {polls} polls")]
    Fault { code: HardwareCode, polls: u32 },
}

//==================================================================================HARNESS_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors surfaced by the mode controller and the transfer engines.
pub enum HarnessError {
    /// Invalid timing or parameters, rejected before touching hardware.
    #[error("{peripheral}: configuration error: {reason}")]
    Configuration {
        peripheral: PeripheralId,
        reason: ConfigurationError,
    },
    /// Caller argument rejected before touching hardware.
    #[error("{peripheral}: invalid argument for {operation:?}: {reason}")]
    InvalidArgument {
        peripheral: PeripheralId,
        operation: Operation,
        reason: ArgumentError,
    },
    /// Requested transition is not part of the state machine.
    #[error("{peripheral}: transition {from:?} -> {to:?} not allowed")]
    InvalidTransition {
        peripheral: PeripheralId,
        from: Mode,
        to: Mode,
    },
    /// Transfer attempted outside Operational mode.
    #[error("{peripheral}: {operation:?} requires Operational mode (current: {mode:?})")]
    NotOperational {
        peripheral: PeripheralId,
        operation: Operation,
        mode: Mode,
    },
    /// Bounded poll exhausted during a mode change.
    #[error("{peripheral}: mode {target:?} not reached after {polls} polls (observed {observed:?})")]
    ModeTransitionTimeout {
        peripheral: PeripheralId,
        target: Mode,
        observed: Mode,
        polls: u32,
    },
    /// Bounded poll exhausted waiting for TX room, RX data or storage ready.
    #[error("{peripheral}: {operation:?} timed out after {polls} polls")]
    TransferTimeout {
        peripheral: PeripheralId,
        operation: Operation,
        polls: u32,
    },
    /// Caller cancelled a bounded poll.
    #[error("{peripheral}: {operation:?} cancelled after {polls} polls")]
    Cancelled {
        peripheral: PeripheralId,
        operation: Operation,
        polls: u32,
    },
    /// The peripheral reported an explicit fault status.
    #[error("{peripheral}: hardware error {code} during {operation:?}")]
    Hardware {
        peripheral: PeripheralId,
        operation: Operation,
        code: HardwareCode,
    },
    /// Transferred data failed verification.
    #[error("Integrity mismatch at byte {index}: expected {expected:#04X}, got {actual:#04X}")]
    IntegrityMismatch {
        index: usize,
        expected: u8,
        actual: u8,
    },
    /// Transferred data agrees on the common bytes but differs in length.
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl HarnessError {
    /// Attach peripheral context to a poll exit.
    pub(crate) fn from_poll(
        peripheral: PeripheralId,
        operation: Operation,
        err: PollError,
    ) -> Self {
        match err {
            PollError::Exhausted { polls } => HarnessError::TransferTimeout {
                peripheral,
                operation,
                polls,
            },
            PollError::Cancelled { polls } => HarnessError::Cancelled {
                peripheral,
                operation,
                polls,
            },
            PollError::Fault { code, .. } => HarnessError::Hardware {
                peripheral,
                operation,
                code,
            },
        }
    }

    /// True for the timeout class (exhausted or cancelled polls).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HarnessError::ModeTransitionTimeout { .. }
                | HarnessError::TransferTimeout { .. }
                | HarnessError::Cancelled { .. }
        )
    }
}
