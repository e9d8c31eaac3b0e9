//! `polled-periph` library: a `no_std` polled transaction engine for a CAN
//! controller and an SD/eMMC host controller. It covers bit-timing and bus
//! clock calculation, a bounded mode state machine, blocking frame and block
//! transfers, and integrity verification of what came back.
#![no_std]
//==================================================================================
/// Shared vocabulary: modes, peripheral identity, hardware codes, transfer outcomes.
pub mod core;
/// Resolved peripheral configuration with board defaults.
pub mod config;
/// Error taxonomy (configuration, arguments, polls, transfers).
pub mod error;
/// Ready-made self-tests (CAN loopback, storage write/read-back).
pub mod harness;
/// Bounded polling primitive.
pub mod infra;
/// Driver contract, peripheral handle, mode controller and transfer engines.
pub mod peripheral;
/// Timing profile calculators (CAN bit timing, storage bus clock).
pub mod timing;
/// Byte and frame integrity checks.
pub mod verify;
//==================================================================================
