//! Hardware binding: embassy tasks translating host events (ticks, battery
//! samples, connectivity changes, inbound link messages, one-shot timers)
//! into watchface events, and executing the display commands that come back.

// Panic handler and debugging
use defmt::unwrap;

use defmt_rtt as _;
use panic_probe as _;

// Device
use embassy_executor::Spawner;
use embassy_nrf::{
    bind_interrupts,
    gpio::{Input, Level, Output, OutputDrive, Pull},
    peripherals::SPI2,
    saadc::{self, ChannelConfig, Resolution, Saadc},
    spim,
};
use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::ThreadModeRawMutex, channel::Channel, signal::Signal};
use embassy_time::{Duration, Ticker, Timer};
use nrf_softdevice::Softdevice;

// Crate
use crate::peripherals::{
    battery::Battery,
    button::Button,
    display::Display,
    vibrator::{PulseLength, Vibrator},
};
use crate::system::{
    config::SystemConfig,
    link::{self, Server},
    time::{TimeManager, TimeReference},
};
use gotthetime::face::{
    ClockReading, Command, Commands, DeviceBatteryState, Event, FieldChange, TimerId, VibePattern,
    WatchConfig, WatchState,
};
use gotthetime::link::{AppKey, KeyValue, MAX_PAIRS};

// Others
use chrono::NaiveDateTime;
use heapless::Vec;

// Include current UTC epoch at compile time; wall-clock fallback until the
// phone pushes the real time.
include!(concat!(env!("OUT_DIR"), "/utc.rs"));
const TIMEZONE: i64 = 3_600;

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
});

// Communication channels
static TICK: Signal<ThreadModeRawMutex, (ClockReading, FieldChange)> = Signal::new();
static BATTERY: Signal<ThreadModeRawMutex, DeviceBatteryState> = Signal::new();
static CONNECTIVITY: Signal<ThreadModeRawMutex, bool> = Signal::new();
static TIME_SYNC: Signal<ThreadModeRawMutex, i64> = Signal::new();
static POKE: Signal<ThreadModeRawMutex, ()> = Signal::new();
// Messages and timer fires must not coalesce (an icon-only message followed
// by a temperature-only message are two separate merges), so they queue.
static INBOUND: Channel<ThreadModeRawMutex, Vec<KeyValue, MAX_PAIRS>, 4> = Channel::new();
static TIMERS: Channel<ThreadModeRawMutex, TimerId, 4> = Channel::new();
// Latest requested link-loss debounce window; a new request replaces an
// open one.
static DEBOUNCE: Signal<ThreadModeRawMutex, TimerId> = Signal::new();

/// Derive minute ticks from the monotonic clock.
///
/// Signals a reading once at boot (with every field marked changed, for the
/// first full render) and afterwards whenever the minute rolls over, carrying
/// the delta of calendar fields.
#[embassy_executor::task(pool_size = 1)]
async fn tick_task() {
    let mut clock = TimeManager::init();
    if let Some(time) = NaiveDateTime::from_timestamp_opt(UTC_EPOCH + TIMEZONE, 0) {
        clock.set_time(TimeReference::from_datetime(time));
    }

    let mut last: Option<ClockReading> = None;
    let mut tick = Ticker::every(Duration::from_secs(1));
    loop {
        if TIME_SYNC.signaled() {
            let epoch = TIME_SYNC.wait().await;
            if let Some(time) = NaiveDateTime::from_timestamp_opt(epoch + TIMEZONE, 0) {
                defmt::info!("clock synced from phone");
                clock.set_time(TimeReference::from_datetime(time));
                // Force a full re-render with the corrected time.
                last = None;
            }
        }

        let reading = ClockReading::from(clock.get_time());
        match last {
            None => TICK.signal((reading, FieldChange::ALL)),
            Some(prev) if prev.minute != reading.minute => {
                TICK.signal((reading, FieldChange::between(&prev, &reading)));
            }
            _ => {}
        }
        last = Some(reading);

        tick.next().await;
    }
}

/// Fetch the battery status from the hardware, signalling only on change.
#[embassy_executor::task(pool_size = 1)]
async fn battery_task(mut battery: Battery) {
    let mut last: Option<DeviceBatteryState> = None;
    let mut tick = Ticker::every(Duration::from_secs(1));
    loop {
        let state = battery.sample().await;
        if last != Some(state) {
            defmt::info!(
                "battery: {}% ({})",
                state.percent,
                if state.charging {
                    "charging"
                } else if state.plugged {
                    "plugged"
                } else {
                    "discharging"
                }
            );
            BATTERY.signal(state);
            last = Some(state);
        }

        tick.next().await;
    }
}

/// Polls the button every 10ms; a press pokes the phone for fresh data.
#[embassy_executor::task(pool_size = 1)]
async fn button_task(mut button: Button) {
    loop {
        if button.poke_requested().await {
            defmt::info!("button pressed, requesting fresh phone data");
            POKE.signal(());
        }

        Timer::after(Duration::from_millis(10)).await;
    }
}

/// One-shot timer for the initial poke. Link-loss debounce has its own
/// long-lived task, so this never needs a pool.
#[embassy_executor::task(pool_size = 1)]
async fn oneshot_timer(id: TimerId) {
    Timer::after(Duration::from_millis(id.delay_ms())).await;
    if TIMERS.try_send(id).is_err() {
        defmt::warn!("timer queue full, dropping fire");
    }
}

/// Runs the link-loss debounce window. A request arriving while a window is
/// already open replaces it: the superseded timer's sequence number is stale
/// and its fire would be ignored anyway, so one task serves any number of
/// connection flaps without exhausting a pool.
#[embassy_executor::task(pool_size = 1)]
async fn link_debounce_task() {
    loop {
        let mut id = DEBOUNCE.wait().await;
        loop {
            let window = Timer::after(Duration::from_millis(id.delay_ms()));
            match select(window, DEBOUNCE.wait()).await {
                Either::First(()) => {
                    if TIMERS.try_send(id).is_err() {
                        defmt::warn!("timer queue full, dropping fire");
                    }
                    break;
                }
                Either::Second(newer) => id = newer,
            }
        }
    }
}

#[embassy_executor::task(pool_size = 1)]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, serve one connection at a time, and surface connectivity
/// transitions as events.
#[embassy_executor::task(pool_size = 1)]
async fn link_task(sd: &'static Softdevice, server: Server) -> ! {
    loop {
        let conn = match link::advertise(sd).await {
            Ok(conn) => conn,
            Err(err) => {
                defmt::warn!("advertising failed: {}", defmt::Debug2Format(&err));
                Timer::after(Duration::from_secs(1)).await;
                continue;
            }
        };
        defmt::info!("phone connected");
        CONNECTIVITY.signal(true);

        link::serve(&server, &conn, on_inbound, &POKE).await;

        defmt::info!("phone disconnected");
        CONNECTIVITY.signal(false);
    }
}

/// Route one decoded inbound message: time sync goes straight to the clock,
/// everything else queues for the dispatcher.
fn on_inbound(pairs: Vec<KeyValue, MAX_PAIRS>) {
    let mut rest: Vec<KeyValue, MAX_PAIRS> = Vec::new();
    for pair in &pairs {
        if pair.key == AppKey::UtcEpoch as u8 {
            TIME_SYNC.signal(pair.value as i64);
        } else {
            rest.push(*pair).ok();
        }
    }

    if !rest.is_empty() && INBOUND.try_send(rest).is_err() {
        defmt::warn!("inbound queue full, dropping message");
    }
}

/// Owns the watchface state; folds events in and executes the resulting
/// display commands.
#[embassy_executor::task(pool_size = 1)]
async fn watchface_task(mut display: Display<SPI2>, mut vibrator: Vibrator) {
    let mut state = WatchState::new(WatchConfig::default());
    if display.draw_chrome(state.config()).is_err() {
        defmt::warn!("display init drawing failed");
    }

    let mut tick = Ticker::every(Duration::from_millis(200));
    loop {
        if TICK.signaled() {
            let (reading, changed) = TICK.wait().await;
            let commands = state.handle(Event::Tick { reading, changed });
            execute(commands, &mut display, &mut vibrator).await;
        }

        if BATTERY.signaled() {
            let battery = BATTERY.wait().await;
            let commands = state.handle(Event::Battery(battery));
            execute(commands, &mut display, &mut vibrator).await;
        }

        if CONNECTIVITY.signaled() {
            let connected = CONNECTIVITY.wait().await;
            let commands = state.handle(Event::Connectivity { connected });
            execute(commands, &mut display, &mut vibrator).await;
        }

        while let Ok(pairs) = INBOUND.try_receive() {
            let commands = state.handle(Event::Link(&pairs));
            execute(commands, &mut display, &mut vibrator).await;
        }

        while let Ok(id) = TIMERS.try_receive() {
            let commands = state.handle(Event::Timer(id));
            execute(commands, &mut display, &mut vibrator).await;
        }

        tick.next().await;
    }
}

async fn execute(commands: Commands, display: &mut Display<SPI2>, vibrator: &mut Vibrator) {
    for command in commands {
        let drawn = match command {
            Command::SetText(region, ref text) => display.set_text(region, text),
            Command::BatteryFill(percent) => display.fill_battery_bar(percent),
            Command::WeatherBitmap(icon) => display.set_weather_icon(icon),
            Command::LinkWarning(shown) => display.show_link_warning(shown),
            Command::Vibrate(VibePattern::HourlyChime) => {
                vibrator.pulse(PulseLength::Short, 1).await;
                Ok(())
            }
            Command::Vibrate(VibePattern::LinkLost) => {
                vibrator.pulse(PulseLength::Long, 2).await;
                Ok(())
            }
            Command::StartTimer(id @ TimerId::LinkDebounce { .. }) => {
                DEBOUNCE.signal(id);
                Ok(())
            }
            Command::StartTimer(id) => {
                let spawner = Spawner::for_current_executor().await;
                if spawner.spawn(oneshot_timer(id)).is_err() {
                    defmt::warn!("timer task busy, dropping timer");
                }
                Ok(())
            }
            Command::SendPoke => {
                POKE.signal(());
                Ok(())
            }
        };

        if drawn.is_err() {
            defmt::warn!("display write failed");
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut p = embassy_nrf::init(SystemConfig::new());
    defmt::info!("booting watchface");

    // Initialize SAADC
    let mut saadc_config = saadc::Config::default();
    // Set resolution to 12bit, necessary for correct battery status calculation
    saadc_config.resolution = Resolution::_12BIT;
    // Pin P0.31: Voltage level
    let channel_config = ChannelConfig::single_ended(&mut p.P0_31);
    let saadc = Saadc::new(p.SAADC, Irqs, saadc_config, [channel_config]);
    saadc.calibrate().await;

    // Initialize battery monitoring
    let battery = Battery::init(
        saadc,
        Input::new(p.P0_12, Pull::None),
        Input::new(p.P0_19, Pull::None),
    );

    // Initialize button
    let button = Button::init(
        Input::new(p.P0_13, Pull::None),
        Output::new(p.P0_15, Level::Low, OutputDrive::Standard),
    );

    // Initialize vibration motor
    let vibrator = Vibrator::init(Output::new(p.P0_16, Level::High, OutputDrive::Standard));

    // Initialize SPI
    let mut spim_config = spim::Config::default();
    // Use SPI at 8MHz (the fastest clock available on the nRF52832),
    // otherwise refreshing will be super slow.
    spim_config.frequency = spim::Frequency::M8;
    // SPI must be used in mode 3. Mode 0 (the default) won't work.
    spim_config.mode = spim::MODE_3;
    let spim = spim::Spim::new(p.SPI2, Irqs, p.P0_02, p.P0_04, p.P0_03, spim_config);

    // Initialize LCD. The display owns the backlight pin: it must outlive
    // this task, which returns after spawning.
    let display = Display::init(
        spim,
        Output::new(p.P0_25, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_18, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_26, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_22, Level::Low, OutputDrive::Standard),
    );

    // Initialize Bluetooth phone link
    let sd = Softdevice::enable(&link::softdevice_config());
    let server = unwrap!(Server::new(sd));

    // Ask the phone for data once the companion app had time to come up.
    unwrap!(spawner.spawn(oneshot_timer(TimerId::InitialPoke)));

    // Schedule tasks
    unwrap!(spawner.spawn(link_debounce_task()));
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(link_task(sd, server)));
    unwrap!(spawner.spawn(tick_task()));
    unwrap!(spawner.spawn(battery_task(battery)));
    unwrap!(spawner.spawn(button_task(button)));
    unwrap!(spawner.spawn(watchface_task(display, vibrator)));
}
