//! Watchface core logic, testable on the host.
//!
//! Everything in here is pure: the formatter, the connectivity debounce
//! machine, the phone-link message merge and the event dispatcher. The
//! hardware binding lives in the binary (`main.rs`) and only builds for ARM.
//!
//! Run the tests on the host with `cargo test --lib`.

// Tests need std for the test harness, the firmware runs as no_std.
#![cfg_attr(not(test), no_std)]

pub mod face;
pub mod link;
