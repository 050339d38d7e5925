//! Watchface state and event dispatch.
//!
//! The host binding feeds every event (tick, battery, connectivity, inbound
//! link message, one-shot timer) into [`WatchState::handle`], which folds it
//! into the stored state and returns the display commands to execute. The
//! binding executes commands and contains no decision logic, so all of the
//! behaviour here runs under host tests.

pub mod connectivity;
pub mod format;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use heapless::Vec;

pub use connectivity::{ConnectivityMonitor, LINK_DEBOUNCE_MS};
pub use format::{Text, TEXT_LEN};

use connectivity::{DebounceAction, LinkEventAction};

use crate::link::{self, KeyValue};

/// Delay before the firmware first asks the phone for fresh data, giving the
/// companion app time to come up after the connection.
pub const INITIAL_POKE_DELAY_MS: u64 = 3_000;

/// Number of configured alternate timezones.
pub const ALT_ZONE_COUNT: usize = 2;

/// Upper bound of commands one event can produce (a first tick emits text
/// for every region plus a possible chime).
pub const MAX_COMMANDS: usize = 12;

/// Wall-clock time broken into calendar fields, latest wins.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClockReading {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub weekday: Weekday,
}

impl From<NaiveDateTime> for ClockReading {
    fn from(time: NaiveDateTime) -> Self {
        Self {
            year: time.year(),
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            weekday: time.weekday(),
        }
    }
}

impl ClockReading {
    pub fn seconds_since_midnight(&self) -> u32 {
        self.hour as u32 * 3_600 + self.minute as u32 * 60 + self.second as u32
    }
}

/// Bitmask of calendar fields that changed since the previous tick.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FieldChange(u8);

impl FieldChange {
    pub const MINUTE: Self = Self(1 << 0);
    pub const HOUR: Self = Self(1 << 1);
    pub const DAY: Self = Self(1 << 2);
    pub const MONTH: Self = Self(1 << 3);
    pub const YEAR: Self = Self(1 << 4);
    /// Everything at once, used for the first render.
    pub const ALL: Self = Self(0x1f);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Which fields differ between two readings.
    pub fn between(prev: &ClockReading, next: &ClockReading) -> Self {
        let mut changed = Self::default();
        if prev.minute != next.minute {
            changed = changed.union(Self::MINUTE);
        }
        if prev.hour != next.hour {
            changed = changed.union(Self::HOUR);
        }
        if prev.day != next.day {
            changed = changed.union(Self::DAY);
        }
        if prev.month != next.month {
            changed = changed.union(Self::MONTH);
        }
        if prev.year != next.year {
            changed = changed.union(Self::YEAR);
        }
        changed
    }
}

/// Charge state of one device. The phone copy starts zeroed and may stay
/// stale until the companion app pushes an update.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct DeviceBatteryState {
    pub percent: u8,
    pub charging: bool,
    pub plugged: bool,
}

/// Weather condition icons, by companion-app code. Code 0 ("none") is not a
/// member: it means "no new icon" and keeps the previous one on screen.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WeatherIcon {
    Rain = 1,
    Snow = 2,
    Sun = 3,
    Cloud = 4,
}

impl WeatherIcon {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Rain),
            2 => Some(Self::Snow),
            3 => Some(Self::Sun),
            4 => Some(Self::Cloud),
            _ => None,
        }
    }
}

/// Last known weather, merged field by field as updates arrive.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct WeatherSnapshot {
    pub icon: Option<WeatherIcon>,
    pub temperature_c: Option<i16>,
}

/// Hour rendering preference, from the host locale.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClockStyle {
    H12,
    H24,
}

/// A secondary timezone shown as a fixed hour offset from local time.
#[derive(Clone, Copy, Debug)]
pub struct AltZone {
    pub label: &'static str,
    pub offset_hours: i8,
}

/// Static watchface configuration, fixed at boot.
#[derive(Clone, Copy, Debug)]
pub struct WatchConfig {
    pub style: ClockStyle,
    pub hourly_chime: bool,
    pub alt_zones: [AltZone; ALT_ZONE_COUNT],
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            style: ClockStyle::H12,
            hourly_chime: true,
            alt_zones: [
                AltZone {
                    label: "UTC",
                    offset_hours: -1,
                },
                AltZone {
                    label: "NYC",
                    offset_hours: -6,
                },
            ],
        }
    }
}

/// Named text regions on the face.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Region {
    Time,
    Meridiem,
    Weekday,
    Date,
    WatchBattery,
    PhoneBattery,
    Temperature,
    AltZone(u8),
    Beats,
}

/// The two fixed vibration patterns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VibePattern {
    /// Single short pulse at the top of the hour.
    HourlyChime,
    /// Double long pulse when the phone link is lost.
    LinkLost,
}

/// One-shot timers the dispatcher asks the host to schedule. The host never
/// cancels a running timer; staleness is handled by sequence number.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerId {
    LinkDebounce { seq: u8 },
    InitialPoke,
}

impl TimerId {
    pub fn delay_ms(&self) -> u64 {
        match self {
            Self::LinkDebounce { .. } => LINK_DEBOUNCE_MS,
            Self::InitialPoke => INITIAL_POKE_DELAY_MS,
        }
    }
}

/// Instructions for the host binding, in emit order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Command {
    /// Set the text of a named region.
    SetText(Region, Text),
    /// Redraw the battery fill bar at this percentage.
    BatteryFill(u8),
    /// Swap the weather bitmap.
    WeatherBitmap(WeatherIcon),
    /// Show or hide the link-lost indicator.
    LinkWarning(bool),
    /// Fire a vibration pattern.
    Vibrate(VibePattern),
    /// Schedule a one-shot timer; it reports back as [`Event::Timer`].
    StartTimer(TimerId),
    /// Send the empty poke message asking the phone for fresh data.
    SendPoke,
}

pub type Commands = Vec<Command, MAX_COMMANDS>;

/// Host events, one per framework callback.
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    /// Periodic time change with the fields that differ since last tick.
    /// The first tick after boot carries [`FieldChange::ALL`].
    Tick {
        reading: ClockReading,
        changed: FieldChange,
    },
    /// Watch battery changed.
    Battery(DeviceBatteryState),
    /// Phone link went up or down.
    Connectivity { connected: bool },
    /// Inbound key/value message from the companion app.
    Link(&'a [KeyValue]),
    /// A previously requested one-shot timer fired.
    Timer(TimerId),
}

/// All watchface state, owned by the display task.
pub struct WatchState {
    config: WatchConfig,
    watch_battery: DeviceBatteryState,
    phone_battery: DeviceBatteryState,
    weather: WeatherSnapshot,
    monitor: ConnectivityMonitor,
}

impl WatchState {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            watch_battery: DeviceBatteryState::default(),
            phone_battery: DeviceBatteryState::default(),
            weather: WeatherSnapshot::default(),
            monitor: ConnectivityMonitor::new(),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Fold one event into the state and return the display commands.
    pub fn handle(&mut self, event: Event<'_>) -> Commands {
        let mut commands = Commands::new();
        match event {
            Event::Tick { reading, changed } => self.on_tick(&reading, changed, &mut commands),
            Event::Battery(state) => self.on_battery(state, &mut commands),
            Event::Connectivity { connected } => self.on_connectivity(connected, &mut commands),
            Event::Link(pairs) => self.on_link(pairs, &mut commands),
            Event::Timer(id) => self.on_timer(id, &mut commands),
        }
        commands
    }

    fn on_tick(&mut self, reading: &ClockReading, changed: FieldChange, commands: &mut Commands) {
        // Time is re-rendered on every tick; we are only called at boot and
        // on minute changes.
        let (time, meridiem) = format::format_time(reading, self.config.style);
        push(commands, Command::SetText(Region::Time, time));
        if let Some(meridiem) = meridiem {
            push(commands, Command::SetText(Region::Meridiem, meridiem));
        }

        // Date only when the day actually changed, to skip redundant redraws.
        if changed.contains(FieldChange::DAY) {
            let (weekday, date) = format::format_date(reading);
            push(commands, Command::SetText(Region::Weekday, weekday));
            push(commands, Command::SetText(Region::Date, date));
        }

        for (index, zone) in self.config.alt_zones.iter().enumerate() {
            let text = format::format_alternate_zone(reading, zone.offset_hours);
            push(commands, Command::SetText(Region::AltZone(index as u8), text));
        }

        push(
            commands,
            Command::SetText(Region::Beats, format::format_beats(reading)),
        );

        if format::should_chime(reading, self.config.hourly_chime) {
            push(commands, Command::Vibrate(VibePattern::HourlyChime));
        }
    }

    fn on_battery(&mut self, state: DeviceBatteryState, commands: &mut Commands) {
        self.watch_battery = state;
        push(
            commands,
            Command::SetText(Region::WatchBattery, format::format_battery(&state)),
        );
        push(commands, Command::BatteryFill(state.percent.min(100)));
    }

    fn on_connectivity(&mut self, connected: bool, commands: &mut Commands) {
        match self.monitor.on_event(connected) {
            LinkEventAction::StartDebounce { seq } => push(
                commands,
                Command::StartTimer(TimerId::LinkDebounce { seq }),
            ),
            LinkEventAction::ClearWarning => push(commands, Command::LinkWarning(false)),
            LinkEventAction::None => {}
        }
    }

    fn on_link(&mut self, pairs: &[KeyValue], commands: &mut Commands) {
        let delta = link::merge(pairs, &mut self.phone_battery, &mut self.weather);

        if delta.phone_battery {
            push(
                commands,
                Command::SetText(
                    Region::PhoneBattery,
                    format::format_battery(&self.phone_battery),
                ),
            );
        }
        if delta.temperature {
            if let Some(celsius) = self.weather.temperature_c {
                push(
                    commands,
                    Command::SetText(Region::Temperature, format::format_temperature(celsius)),
                );
            }
        }
        if let Some(icon) = delta.icon {
            push(commands, Command::WeatherBitmap(icon));
        }
    }

    fn on_timer(&mut self, id: TimerId, commands: &mut Commands) {
        match id {
            TimerId::LinkDebounce { seq } => {
                if self.monitor.on_debounce_timer(seq) == DebounceAction::ShowWarning {
                    push(commands, Command::LinkWarning(true));
                    push(commands, Command::Vibrate(VibePattern::LinkLost));
                }
            }
            TimerId::InitialPoke => push(commands, Command::SendPoke),
        }
    }
}

// MAX_COMMANDS is sized for the worst-case event; a dropped command would be
// a display glitch, not a crash, but flag it in debug builds.
fn push(commands: &mut Commands, command: Command) {
    let _pushed = commands.push(command).is_ok();
    debug_assert!(_pushed);
}
