//! Firmware binary. All hardware binding lives in `app` and only builds for
//! ARM; the pure watchface logic is in the `gotthetime` library and is
//! tested on the host.

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
mod app;
#[cfg(target_arch = "arm")]
mod peripherals;
#[cfg(target_arch = "arm")]
mod system;

/// Keeps host builds (and `cargo test`) linking; the real entry point is
/// `app::main` on the device.
#[cfg(not(target_arch = "arm"))]
fn main() {}
