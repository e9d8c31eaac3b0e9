//! # Polled self-test
//!
//! Runs both board self-tests against the simulated controllers used by the
//! integration tests:
//! - CAN: 40 kbit/s from 24 MHz, loopback of frame 1365 with payload `0..8`
//! - eMMC: 50 MHz bus, pattern `1..=20` written at block 5 and read back
//!
//! A third run shows the bounded mode wait on a controller that never
//! reaches Operational.
//!
//! ```bash
//! cargo run --example polled_selftest
//! ```

#[path = "../../tests/helpers/mod.rs"]
mod helpers;

use helpers::{SimCan, SimEmmc};
use polled_periph::config::{CanConfig, StorageConfig};
use polled_periph::core::TransferOutcome;
use polled_periph::harness::{self, SelfTestReport, STORAGE_TEST_START_BLOCK};
use polled_periph::infra::poll::PollBudget;

fn print_report(name: &str, report: &SelfTestReport) {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    println!(
        "   {} [{}] {}: {:?}, {} bytes, mode {:?}",
        verdict, report.peripheral, name, report.outcome, report.bytes_moved, report.mode
    );
}

fn main() {
    println!("=== polled-periph self-test ===\n");

    // ======================================================================
    // 1. CAN loopback
    // ======================================================================
    let can_config = CanConfig::default();
    match can_config.timing() {
        Ok(timing) => {
            let fields = timing.register_fields();
            println!(
                "1. CAN timing: prescaler {}, ts1 {}, ts2 {}, sjw {} (BRPR {}), sample point {}‰",
                timing.prescaler,
                timing.ts1,
                timing.ts2,
                timing.sjw,
                fields.brp,
                timing.sample_point_permille()
            );
        }
        Err(e) => eprintln!("1. CAN timing error: {}", e),
    }
    match harness::bring_up_can(SimCan::loopback(), &can_config) {
        Ok(mut engine) => {
            let report = harness::can_loopback_self_test(&mut engine);
            print_report("loopback", &report);
        }
        Err(e) => eprintln!("   CAN bring-up failed: {}", e),
    }
    println!();

    // ======================================================================
    // 2. eMMC write / read-back
    // ======================================================================
    println!("2. eMMC write/read-back");
    match harness::bring_up_storage(SimEmmc::new(4096), &StorageConfig::default()) {
        Ok(mut engine) => {
            println!("   capacity: {:?} blocks", engine.capacity());
            let mut write_buf = [0u8; 1024];
            let mut read_buf = [0u8; 1024];
            let report = harness::storage_self_test(
                &mut engine,
                STORAGE_TEST_START_BLOCK,
                &mut write_buf,
                &mut read_buf,
            );
            print_report("write/read-back", &report);
            println!("   first bytes: {:?}", &read_buf[..20]);
        }
        Err(e) => eprintln!("   eMMC bring-up failed: {}", e),
    }
    println!();

    // ======================================================================
    // 3. Bounded mode wait
    // ======================================================================
    println!("3. Controller stuck in Configuration");
    let stuck = SimCan {
        never_operational: true,
        ..SimCan::loopback()
    };
    let config = CanConfig {
        poll: PollBudget::polls(10_000),
        ..CanConfig::default()
    };
    match harness::bring_up_can(stuck, &config) {
        Ok(_) => println!("   unexpectedly reached Operational"),
        Err(e) => println!("   {} -> {:?}", e, TransferOutcome::from(&e)),
    }
}
