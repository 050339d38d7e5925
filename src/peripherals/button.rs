//! Watch button.
//!
//! The face has exactly one button interaction: a press asks the phone for
//! fresh data, so the driver exposes that intent directly instead of a raw
//! edge.

use debouncr::{debounce_2, Debouncer, Edge, Repeat2};
use embassy_nrf::{
    gpio::{Input, Output},
    peripherals::{P0_13, P0_15},
};
use embassy_time::{Duration, Timer};

pub struct Button {
    /// Button detection pin (high/low)
    pin_button: Input<'static, P0_13>,
    /// Button enable pin
    pin_enable: Output<'static, P0_15>,
    /// Debouncer for button
    debouncer: Debouncer<u8, Repeat2>,
}

impl Button {
    /// Configure button on boot
    pub fn init(button_pin: Input<'static, P0_13>, enable_pin: Output<'static, P0_15>) -> Self {
        Self {
            pin_button: button_pin,
            pin_enable: enable_pin,
            debouncer: debounce_2(false),
        }
    }

    /// Sample the button once; a debounced press is the wearer asking for
    /// fresh phone data.
    pub async fn poke_requested(&mut self) -> bool {
        // Enable button
        self.pin_enable.set_high();
        // The button needs a short time to give stable outputs
        Timer::after(Duration::from_nanos(1)).await;

        let requested = self.debouncer.update(self.pin_button.is_high()) == Some(Edge::Rising);

        // Button consumes around 34µA when P0.15 is left high.
        // To reduce current consumption, set it low most of the time.
        self.pin_enable.set_low();

        requested
    }
}
