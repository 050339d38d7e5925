//! Battery status check.
//!
//! Implementation based upon https://github.com/dbrgn/pinetime-rtic/blob/master/pinetime-rtic/src/battery.rs
//! and https://wiki.pine64.org/wiki/PineTime.

use embassy_nrf::{
    gpio::Input,
    peripherals::{P0_12, P0_19},
    saadc::Saadc,
};

use gotthetime::face::DeviceBatteryState;

/// Battery configuration
struct BatteryConfig<'a> {
    /// ADC instance for battery voltage measurement
    adc: Saadc<'a, 1>,
    /// Charge indication pin:
    /// high = battery, low = charging
    pin_charge_indication: Input<'a, P0_12>,
    /// Power presence pin:
    /// high = battery, low = 5V supply connected
    pin_power_presence: Input<'a, P0_19>,
}

/// Battery API
pub struct Battery {
    /// Battery configuration
    config: BatteryConfig<'static>,
}

impl Battery {
    /// Configure battery settings on boot
    pub fn init(
        adc: Saadc<'static, 1>,
        charge_pin: Input<'static, P0_12>,
        power_pin: Input<'static, P0_19>,
    ) -> Self {
        Self {
            config: BatteryConfig {
                adc,
                pin_charge_indication: charge_pin,
                pin_power_presence: power_pin,
            },
        }
    }

    /// Read the full battery state from the hardware.
    pub async fn sample(&mut self) -> DeviceBatteryState {
        DeviceBatteryState {
            percent: self.get_percent().await,
            charging: self.config.pin_charge_indication.is_low(),
            plugged: self.config.pin_power_presence.is_low(),
        }
    }

    /// Battery capacity in percent
    async fn get_percent(&mut self) -> u8 {
        let voltage = self.get_voltage().await;

        // Use fixed data points and linear interpolation in between
        // to estimate battery capacity.
        (match voltage {
            0..=3449 => 0,
            3450..=3699 => (voltage - 3450) / 5,
            3700..=4199 => 50 + (voltage - 3700) / 10,
            _ => 100,
        }) as u8
    }

    /// Battery voltage in millivolts
    async fn get_voltage(&mut self) -> u16 {
        let mut buf = [0; 1];
        self.config.adc.sample(&mut buf).await;
        // For detailed explanation of formula check https://wiki.pine64.org/wiki/PineTime
        // Use u32 during calculation to prevent overflow
        (buf[0] as u32 * 2000 / 1241) as u16
    }
}
