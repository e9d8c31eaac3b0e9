//! Block engine against the simulated eMMC card.
mod helpers {
    include!("helpers/mod.rs");
}

use core::sync::atomic::AtomicBool;

use helpers::{SimEmmc, SteppingClock};
use polled_periph::config::StorageConfig;
use polled_periph::core::{HardwareCode, Mode, Operation, PeripheralId, TransferOutcome};
use polled_periph::error::{ArgumentError, ConfigurationError, HarnessError};
use polled_periph::harness::{self, STORAGE_TEST_START_BLOCK};
use embassy_time::Duration;
use polled_periph::infra::poll::{PollBudget, PollContext};
use polled_periph::peripheral::storage::BlockEngine;

const SECTORS: u32 = 64;

fn engine() -> BlockEngine<SimEmmc> {
    harness::bring_up_storage(SimEmmc::new(SECTORS), &StorageConfig::default()).unwrap()
}

#[test]
/// Configuration phase: 50 MHz clock, 512-byte blocks, capacity from the ExtCSD.
fn test_bring_up() {
    let engine = engine();
    let card = engine.handle().driver();
    assert_eq!(card.clock.unwrap().clock_frequency_hz, 50_000_000);
    // Identification runs at 400 kHz or less before the transfer clock.
    assert_eq!(card.clock_history.len(), 2);
    assert!(card.clock_history[0].clock_frequency_hz <= 400_000);
    assert_eq!(card.block_size, 512);
    assert_eq!(engine.capacity(), Some(SECTORS));
    assert_eq!(engine.handle().current_mode(), Mode::Operational);
}

#[test]
/// Pattern 1..=20 written at block 5 over two blocks reads back intact.
fn test_storage_self_test() {
    let mut engine = engine();
    let mut write_buf = [0u8; 1024];
    let mut read_buf = [0u8; 1024];

    let report = harness::storage_self_test(
        &mut engine,
        STORAGE_TEST_START_BLOCK,
        &mut write_buf,
        &mut read_buf,
    );
    assert!(report.passed());
    assert_eq!(report.outcome, TransferOutcome::Success(1024));
    assert_eq!(report.peripheral, PeripheralId::storage(1));

    let expected: Vec<u8> = (1..=20).collect();
    assert_eq!(&read_buf[..20], expected.as_slice());
    assert!(read_buf[20..].iter().all(|&b| b == 0));

    let card = engine.handle().driver();
    assert_eq!(card.block_writes, 2);
    assert_eq!(card.block_reads, 2);
    assert_eq!(&card.memory[5 * 512..5 * 512 + 20], expected.as_slice());
}

#[test]
/// A 20-byte buffer is not a whole block: rejected before any register write.
fn test_unaligned_buffer_rejected() {
    let mut engine = engine();
    let pattern: Vec<u8> = (1..=20).collect();

    let result = engine.write_blocks(5, &pattern);
    assert_eq!(
        result,
        Err(HarnessError::InvalidArgument {
            peripheral: PeripheralId::storage(1),
            operation: Operation::WriteBlocks,
            reason: ArgumentError::UnalignedBuffer {
                len: 20,
                block_size: 512,
            },
        })
    );
    assert_eq!(TransferOutcome::from(result), TransferOutcome::Rejected);
    assert_eq!(engine.handle().driver().block_writes, 0);
    assert!(engine.handle().driver().memory.iter().all(|&b| b == 0xFF));
}

#[test]
/// Write then read returns the same bytes for multi-block buffers.
fn test_round_trip() {
    let mut engine = engine();
    for (start, blocks) in [(0u32, 1usize), (7, 3), (SECTORS - 4, 4)] {
        let data: Vec<u8> = (0..blocks * 512)
            .map(|i| (i as u32).wrapping_mul(2_654_435_761).to_le_bytes()[3] ^ start as u8)
            .collect();
        let mut back = vec![0u8; data.len()];

        assert_eq!(engine.write_blocks(start, &data), Ok(data.len()));
        assert_eq!(engine.read_blocks(start, &mut back), Ok(data.len()));
        assert_eq!(back, data);
    }
}

#[test]
/// Ranges past the card's end are rejected as invalid arguments.
fn test_beyond_capacity() {
    let mut engine = engine();
    let mut buffer = [0u8; 1024];
    assert_eq!(
        engine.read_blocks(SECTORS - 1, &mut buffer),
        Err(HarnessError::InvalidArgument {
            peripheral: PeripheralId::storage(1),
            operation: Operation::ReadBlocks,
            reason: ArgumentError::BeyondCapacity {
                start: SECTORS - 1,
                end: SECTORS as u64 + 1,
                capacity: SECTORS,
            },
        })
    );
    assert_eq!(engine.handle().driver().block_reads, 0);
}

#[test]
/// A card stuck busy ends in a bounded transfer timeout.
fn test_busy_card_times_out() {
    let config = StorageConfig {
        poll: PollBudget::polls(25),
        ..StorageConfig::default()
    };
    let mut engine = harness::bring_up_storage(SimEmmc::new(SECTORS), &config).unwrap();
    engine.handle_mut().driver_mut().stuck_busy = true;

    let result = engine.write_blocks(0, &[0u8; 512]);
    assert_eq!(
        result,
        Err(HarnessError::TransferTimeout {
            peripheral: PeripheralId::storage(1),
            operation: Operation::WriteBlocks,
            polls: 25,
        })
    );
    assert_eq!(TransferOutcome::from(result), TransferOutcome::Timeout);
    assert_eq!(engine.handle().driver().block_writes, 0);
}

#[test]
/// A failing block write is surfaced once; the remaining blocks are not attempted.
fn test_write_fault_not_retried() {
    let mut engine = engine();
    engine.handle_mut().driver_mut().fail_write_at = Some(11);

    let result = engine.write_blocks(10, &[0xAB; 2048]);
    assert_eq!(
        result,
        Err(HarnessError::Hardware {
            peripheral: PeripheralId::storage(1),
            operation: Operation::WriteBlocks,
            code: HardwareCode(1 << 26),
        })
    );
    assert_eq!(
        TransferOutcome::from(result),
        TransferOutcome::HardwareError(HardwareCode(1 << 26))
    );
    assert_eq!(engine.handle().driver().block_writes, 2);
}

#[test]
/// An error status raised while waiting for ready ends the read immediately.
fn test_error_status_during_read() {
    let mut engine = engine();
    engine.handle_mut().driver_mut().error = Some(HardwareCode(0x8000));
    let mut buffer = [0u8; 512];
    assert!(matches!(
        engine.read_blocks(0, &mut buffer),
        Err(HarnessError::Hardware {
            operation: Operation::ReadBlocks,
            code: HardwareCode(0x8000),
            ..
        })
    ));
    assert_eq!(engine.handle().driver().block_reads, 0);
}

#[test]
/// Self-test buffers too small for the pattern are rejected.
fn test_self_test_buffer_too_small() {
    let mut engine = engine();
    let mut write_buf = [0u8; 512];
    let mut read_buf = [0u8; 256];
    let report = harness::storage_self_test(&mut engine, 5, &mut write_buf, &mut read_buf);
    assert_eq!(report.outcome, TransferOutcome::Rejected);
    assert_eq!(engine.handle().driver().block_writes, 0);
}

#[test]
/// Non power-of-two block sizes fail configuration validation.
fn test_invalid_block_size() {
    let config = StorageConfig {
        block_size: 520,
        ..StorageConfig::default()
    };
    assert!(matches!(
        harness::bring_up_storage(SimEmmc::new(SECTORS), &config),
        Err(HarnessError::Configuration {
            reason: ConfigurationError::InvalidBlockSize { size: 520 },
            ..
        })
    ));
}

#[test]
/// Larger blocks scale the capacity down.
fn test_larger_blocks() {
    let config = StorageConfig {
        block_size: 1024,
        ..StorageConfig::default()
    };
    let mut engine = harness::bring_up_storage(SimEmmc::new(SECTORS), &config).unwrap();
    assert_eq!(engine.capacity(), Some(SECTORS / 2));

    let data = [0x5A; 1024];
    let mut back = [0u8; 1024];
    engine.write_blocks(3, &data).unwrap();
    engine.read_blocks(3, &mut back).unwrap();
    assert_eq!(back, data);
    assert_eq!(&engine.handle().driver().memory[3 * 1024..4 * 1024], &data[..]);
}

#[test]
/// A raised cancel flag stops the configuration phase at its first wait.
fn test_cancelled_bring_up() {
    let cancel = AtomicBool::new(true);
    let result = harness::bring_up_storage_with(
        SimEmmc::new(SECTORS),
        &StorageConfig::default(),
        PollContext::none().with_cancel(&cancel),
    );
    assert!(matches!(
        result,
        Err(HarnessError::Cancelled {
            operation: Operation::ModeChange,
            polls: 0,
            ..
        })
    ));
}

#[test]
/// Cancellation reaches the ExtCSD busy wait of the configuration phase.
fn test_cancelled_ext_csd_wait() {
    let mut engine = engine();
    engine.handle_mut().driver_mut().stuck_busy = true;
    let cancel = AtomicBool::new(true);
    let mut ext_csd = [0u8; 512];
    assert!(matches!(
        engine.read_ext_csd_with(&mut ext_csd, PollContext::none().with_cancel(&cancel)),
        Err(HarnessError::Cancelled {
            operation: Operation::ReadExtCsd,
            ..
        })
    ));
}

#[test]
/// The configured poll clock bounds a stuck busy wait by time.
fn test_wall_clock_busy_timeout() {
    let config = StorageConfig {
        poll: PollBudget::polls(1_000_000).with_timeout(Duration::from_millis(8)),
        poll_clock: SteppingClock::leaked(),
        ..StorageConfig::default()
    };
    let mut engine = harness::bring_up_storage(SimEmmc::new(SECTORS), &config).unwrap();
    engine.handle_mut().driver_mut().stuck_busy = true;
    match engine.write_blocks(0, &[0u8; 512]) {
        Err(HarnessError::TransferTimeout { polls, .. }) => assert!(polls <= 8, "polls = {}", polls),
        other => panic!("unexpected result: {:?}", other),
    }
}
