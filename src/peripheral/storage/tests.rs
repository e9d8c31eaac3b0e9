//! Unit tests for argument validation and capacity discovery.
use super::*;
use crate::config::PeripheralConfig;
use crate::infra::poll::PollBudget;
use crate::peripheral::mode::StallPolicy;
use crate::peripheral::traits::peripheral::Peripheral;

/// Card that follows mode requests at once and counts every register access.
#[derive(Default)]
struct CountingCard {
    mode: Option<Mode>,
    sec_count: u32,
    busy_polls: u32,
    accesses: u32,
    block_size: usize,
}

impl Peripheral for CountingCard {
    type Timing = StorageClock;

    fn initialize(&mut self, _config: &PeripheralConfig) -> Result<(), HardwareCode> {
        self.mode = Some(Mode::Reset);
        Ok(())
    }

    fn request_mode(&mut self, mode: Mode) {
        self.mode = Some(mode);
    }

    fn mode(&mut self) -> Mode {
        self.mode.unwrap_or(Mode::Reset)
    }

    fn write_timing(&mut self, _timing: &StorageClock) -> Result<(), HardwareCode> {
        Ok(())
    }

    fn error_status(&mut self) -> Option<HardwareCode> {
        None
    }
}

impl BlockRegisters for CountingCard {
    fn is_busy(&mut self) -> bool {
        self.busy_polls += 1;
        false
    }

    fn set_block_size(&mut self, size: usize) -> Result<(), HardwareCode> {
        self.block_size = size;
        Ok(())
    }

    fn read_ext_csd(&mut self, buffer: &mut [u8; EXT_CSD_SIZE]) -> Result<(), HardwareCode> {
        buffer.fill(0);
        buffer[EXT_CSD_SEC_COUNT..EXT_CSD_SEC_COUNT + 4].copy_from_slice(&self.sec_count.to_le_bytes());
        Ok(())
    }

    fn read_block(&mut self, _index: u32, buffer: &mut [u8]) -> Result<(), HardwareCode> {
        self.accesses += 1;
        buffer.fill(0xA5);
        Ok(())
    }

    fn write_block(&mut self, _index: u32, _buffer: &[u8]) -> Result<(), HardwareCode> {
        self.accesses += 1;
        Ok(())
    }
}

fn engine(sec_count: u32, block_size: usize) -> BlockEngine<CountingCard> {
    let config = PeripheralConfig {
        id: PeripheralId::storage(1),
        base_address: 0xE010_1000,
    };
    let card = CountingCard {
        sec_count,
        ..Default::default()
    };
    let handle =
        PeripheralHandle::initialize(card, config, PollBudget::polls(16), StallPolicy::Wait).unwrap();
    let mut engine = BlockEngine::new(handle, block_size).unwrap();
    engine
        .configure(StorageClock::for_ceiling(50_000_000, 50_000_000).unwrap())
        .unwrap();
    engine
}

#[test]
/// SEC_COUNT is converted from 512-byte sectors to the negotiated block size.
fn test_capacity_from_ext_csd() {
    let small = engine(4096, 512);
    assert_eq!(small.capacity(), Some(4096));
    assert_eq!(small.handle().driver().block_size, 512);

    let large = engine(4096, 2048);
    assert_eq!(large.capacity(), Some(1024));
}

#[test]
/// A card reporting no size leaves the range unchecked against capacity.
fn test_unknown_capacity() {
    let mut engine = engine(0, 512);
    assert_eq!(engine.capacity(), None);
    let block = [0u8; 512];
    assert_eq!(engine.write_blocks(1_000_000, &block), Ok(512));
    assert!(matches!(
        engine.write_blocks(u32::MAX, &[0u8; 1024]),
        Err(HarnessError::InvalidArgument {
            reason: ArgumentError::BeyondCapacity { .. },
            ..
        })
    ));
}

#[test]
/// Bad buffers are refused with no register access.
fn test_arguments_checked_first() {
    let mut engine = engine(64, 512);
    let busy_before = engine.handle().driver().busy_polls;

    let id = PeripheralId::storage(1);
    assert_eq!(
        engine.write_blocks(0, &[]),
        Err(HarnessError::InvalidArgument {
            peripheral: id,
            operation: Operation::WriteBlocks,
            reason: ArgumentError::EmptyBuffer,
        })
    );
    assert_eq!(
        engine.read_blocks(0, &mut [0u8; 100]),
        Err(HarnessError::InvalidArgument {
            peripheral: id,
            operation: Operation::ReadBlocks,
            reason: ArgumentError::UnalignedBuffer {
                len: 100,
                block_size: 512
            },
        })
    );
    assert_eq!(
        engine.write_blocks(63, &[0u8; 1024]),
        Err(HarnessError::InvalidArgument {
            peripheral: id,
            operation: Operation::WriteBlocks,
            reason: ArgumentError::BeyondCapacity {
                start: 63,
                end: 65,
                capacity: 64
            },
        })
    );

    assert_eq!(engine.handle().driver().accesses, 0);
    assert_eq!(engine.handle().driver().busy_polls, busy_before);
}

#[test]
/// The last block of the device is addressable.
fn test_last_block() {
    let mut engine = engine(64, 512);
    let mut block = [0u8; 1024];
    assert_eq!(engine.read_blocks(62, &mut block), Ok(1024));
    assert!(block.iter().all(|&b| b == 0xA5));
    assert_eq!(engine.handle().driver().accesses, 2);
}

#[test]
/// Block sizes must be powers of two.
fn test_invalid_block_size() {
    let config = PeripheralConfig {
        id: PeripheralId::storage(1),
        base_address: 0,
    };
    let handle = PeripheralHandle::initialize(
        CountingCard::default(),
        config,
        PollBudget::polls(4),
        StallPolicy::Wait,
    )
    .unwrap();
    assert!(matches!(
        BlockEngine::new(handle, 500),
        Err(HarnessError::Configuration {
            reason: ConfigurationError::InvalidBlockSize { size: 500 },
            ..
        })
    ));
}

#[test]
/// Transfers outside Operational mode are refused.
fn test_requires_operational() {
    let mut engine = engine(64, 512);
    engine.handle_mut().request_mode(Mode::Configuration).unwrap();
    assert!(matches!(
        engine.write_blocks(0, &[0u8; 512]),
        Err(HarnessError::NotOperational {
            mode: Mode::Configuration,
            ..
        })
    ));
}
