//! Phone-link message schema and merge.
//!
//! The companion app pushes partial, integer-keyed updates: any message may
//! carry any subset of the keys. Each present key overwrites only its own
//! slot in the stored state; absent keys keep their last known value
//! indefinitely. Malformed values and unknown keys are skipped, never fatal.
//! There is no atomicity across keys of one logical update and consumers
//! must tolerate transiently mixed state (e.g. fresh percentage, stale
//! charging flag).
//!
//! Everything here is pure and host-testable; the GATT plumbing lives in the
//! binary.

use heapless::Vec;

use crate::face::{DeviceBatteryState, WeatherIcon, WeatherSnapshot};

/// Most pairs one inbound message can carry.
pub const MAX_PAIRS: usize = 8;

/// Bytes per encoded pair on the wire: key byte + little-endian i32 value.
const PAIR_LEN: usize = 5;

/// Message dictionary keys, shared with the companion app.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppKey {
    PhoneBatteryPercent = 0,
    PhoneBatteryCharging = 1,
    PhoneBatteryPlugged = 2,
    WeatherIcon = 3,
    WeatherTemperature = 4,
    /// Current UTC epoch from the phone; consumed by the clock, not the
    /// merge.
    UtcEpoch = 5,
}

impl AppKey {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::PhoneBatteryPercent),
            1 => Some(Self::PhoneBatteryCharging),
            2 => Some(Self::PhoneBatteryPlugged),
            3 => Some(Self::WeatherIcon),
            4 => Some(Self::WeatherTemperature),
            5 => Some(Self::UtcEpoch),
            _ => None,
        }
    }
}

/// One key/value pair as it arrives off the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyValue {
    pub key: u8,
    pub value: i32,
}

/// Transport failure categories. Logged once each, never retried.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkError {
    Timeout,
    NotConnected,
    Busy,
    BufferOverflow,
    Malformed,
}

impl LinkError {
    /// Stable label for the diagnostics log.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NotConnected => "not connected",
            Self::Busy => "busy",
            Self::BufferOverflow => "buffer overflow",
            Self::Malformed => "malformed",
        }
    }
}

/// Decode a raw inbound payload into key/value pairs.
///
/// Trailing bytes that do not make a whole pair are dropped as malformed;
/// pairs beyond [`MAX_PAIRS`] are dropped as overflow. Both degrade to
/// "fewer updates", matching the skip-don't-fail contract, and are reported
/// alongside the pairs so the transport can log them.
pub fn decode(payload: &[u8]) -> (Vec<KeyValue, MAX_PAIRS>, Option<LinkError>) {
    let mut pairs = Vec::new();
    let mut diagnostic = None;
    for chunk in payload.chunks_exact(PAIR_LEN) {
        let value = i32::from_le_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        if pairs.push(KeyValue { key: chunk[0], value }).is_err() {
            diagnostic = Some(LinkError::BufferOverflow);
            break;
        }
    }
    if diagnostic.is_none() && payload.len() % PAIR_LEN != 0 {
        diagnostic = Some(LinkError::Malformed);
    }
    (pairs, diagnostic)
}

/// Which stored slots a merge actually touched.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct LinkDelta {
    pub phone_battery: bool,
    pub temperature: bool,
    /// Set only when a message carried an explicit, nonzero icon code. An
    /// absent or zero icon leaves the previously shown bitmap untouched.
    pub icon: Option<WeatherIcon>,
}

/// Fold a batch of pairs into the stored phone battery and weather state.
pub fn merge(
    pairs: &[KeyValue],
    phone: &mut DeviceBatteryState,
    weather: &mut WeatherSnapshot,
) -> LinkDelta {
    let mut delta = LinkDelta::default();

    for pair in pairs {
        match AppKey::from_raw(pair.key) {
            Some(AppKey::PhoneBatteryPercent) => {
                phone.percent = pair.value.clamp(0, 100) as u8;
                delta.phone_battery = true;
            }
            Some(AppKey::PhoneBatteryCharging) => {
                phone.charging = pair.value != 0;
                delta.phone_battery = true;
            }
            Some(AppKey::PhoneBatteryPlugged) => {
                phone.plugged = pair.value != 0;
                delta.phone_battery = true;
            }
            Some(AppKey::WeatherIcon) => {
                // Zero means "no new icon", out-of-range is malformed;
                // both keep the previous icon.
                if let Some(icon) = WeatherIcon::from_code(pair.value) {
                    weather.icon = Some(icon);
                    delta.icon = Some(icon);
                }
            }
            Some(AppKey::WeatherTemperature) => {
                weather.temperature_c = Some(pair.value.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
                delta.temperature = true;
            }
            // Time sync is handled upstream; unknown keys are skipped.
            Some(AppKey::UtcEpoch) | None => {}
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: AppKey, value: i32) -> KeyValue {
        KeyValue {
            key: key as u8,
            value,
        }
    }

    #[test]
    fn decode_splits_pairs_and_reports_trailing_garbage() {
        let mut payload = heapless::Vec::<u8, 16>::new();
        payload.push(3).unwrap();
        payload.extend_from_slice(&1i32.to_le_bytes()).unwrap();
        payload.push(4).unwrap();
        payload.extend_from_slice(&(-7i32).to_le_bytes()).unwrap();
        payload.push(0xff).unwrap(); // incomplete pair

        let (pairs, diagnostic) = decode(&payload);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], KeyValue { key: 3, value: 1 });
        assert_eq!(pairs[1], KeyValue { key: 4, value: -7 });
        assert_eq!(diagnostic, Some(LinkError::Malformed));
    }

    #[test]
    fn clean_payload_decodes_without_diagnostic() {
        let mut payload = heapless::Vec::<u8, 16>::new();
        payload.push(0).unwrap();
        payload.extend_from_slice(&55i32.to_le_bytes()).unwrap();

        let (pairs, diagnostic) = decode(&payload);
        assert_eq!(pairs.len(), 1);
        assert_eq!(diagnostic, None);
    }

    #[test]
    fn decode_reports_overflow_past_the_pair_limit() {
        let mut payload = heapless::Vec::<u8, 64>::new();
        for key in 0..(MAX_PAIRS as u8 + 1) {
            payload.push(key).unwrap();
            payload.extend_from_slice(&0i32.to_le_bytes()).unwrap();
        }

        let (pairs, diagnostic) = decode(&payload);
        assert_eq!(pairs.len(), MAX_PAIRS);
        assert_eq!(diagnostic, Some(LinkError::BufferOverflow));
    }

    #[test]
    fn icon_then_temperature_merges_into_one_snapshot() {
        let mut phone = DeviceBatteryState::default();
        let mut weather = WeatherSnapshot::default();

        let delta = merge(&[pair(AppKey::WeatherIcon, 1)], &mut phone, &mut weather);
        assert_eq!(delta.icon, Some(WeatherIcon::Rain));
        assert!(!delta.temperature);

        let delta = merge(
            &[pair(AppKey::WeatherTemperature, -3)],
            &mut phone,
            &mut weather,
        );
        assert_eq!(delta.icon, None);
        assert!(delta.temperature);

        assert_eq!(weather.icon, Some(WeatherIcon::Rain));
        assert_eq!(weather.temperature_c, Some(-3));
    }

    #[test]
    fn zero_icon_keeps_the_previous_icon() {
        let mut phone = DeviceBatteryState::default();
        let mut weather = WeatherSnapshot {
            icon: Some(WeatherIcon::Sun),
            temperature_c: Some(20),
        };

        let delta = merge(&[pair(AppKey::WeatherIcon, 0)], &mut phone, &mut weather);
        assert_eq!(delta.icon, None);
        assert_eq!(weather.icon, Some(WeatherIcon::Sun));
    }

    #[test]
    fn out_of_range_icon_is_skipped() {
        let mut phone = DeviceBatteryState::default();
        let mut weather = WeatherSnapshot::default();

        let delta = merge(&[pair(AppKey::WeatherIcon, 9)], &mut phone, &mut weather);
        assert_eq!(delta.icon, None);
        assert_eq!(weather.icon, None);
    }

    #[test]
    fn partial_battery_update_keeps_other_fields() {
        let mut phone = DeviceBatteryState {
            percent: 80,
            charging: true,
            plugged: true,
        };
        let mut weather = WeatherSnapshot::default();

        merge(
            &[pair(AppKey::PhoneBatteryPercent, 55)],
            &mut phone,
            &mut weather,
        );
        assert_eq!(phone.percent, 55);
        assert!(phone.charging);
        assert!(phone.plugged);
    }

    #[test]
    fn battery_percent_is_clamped() {
        let mut phone = DeviceBatteryState::default();
        let mut weather = WeatherSnapshot::default();

        merge(
            &[pair(AppKey::PhoneBatteryPercent, 250)],
            &mut phone,
            &mut weather,
        );
        assert_eq!(phone.percent, 100);

        merge(
            &[pair(AppKey::PhoneBatteryPercent, -5)],
            &mut phone,
            &mut weather,
        );
        assert_eq!(phone.percent, 0);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let mut phone = DeviceBatteryState::default();
        let mut weather = WeatherSnapshot::default();

        let delta = merge(&[KeyValue { key: 42, value: 1 }], &mut phone, &mut weather);
        assert_eq!(delta, LinkDelta::default());
        assert_eq!(phone, DeviceBatteryState::default());
    }
}
