//! Process-wide logger setup for simulation drivers, benchmarks and tests.
//!
//! Library code only emits through the `log` macros; installing a backend is
//! left to the binary. `RUST_LOG` overrides the defaults below.
use std::sync::Once;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

pub fn initialize_logger() {
    // call_once_force recovers if an earlier attempt panicked
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Info)
            .filter_module("cachesim", LevelFilter::Info)
            .filter_module("cachesim::simulator", LevelFilter::Info)
            .filter_module("cachesim::policy", LevelFilter::Warn)
            .format_timestamp_millis()
            .parse_default_env();

        // another logger may already be installed
        let _ = builder.try_init();
    });
}

/// Logger for tests: captured by the test harness, debug level.
pub fn initialize_test_logger() {
    let _ = Builder::new()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .try_init();
}
