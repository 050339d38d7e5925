//! Bluetooth phone-link module.
//!
//! A small custom GATT service stands in for the companion-app message
//! channel: the phone writes key/value batches to the inbound
//! characteristic, and the watch notifies the poke characteristic when it
//! wants fresh values pushed. Delivery is fire-and-forget; transport errors
//! are logged by category and never retried.

// Core
use core::mem;

// BLE
use nrf_softdevice::{
    self,
    ble::{
        advertisement_builder::{
            Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
        },
        gatt_server::{self, NotifyValueError},
        peripheral::{self, AdvertiseError},
        Connection,
    },
    raw, Config, RawError, Softdevice,
};

// Others
use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::ThreadModeRawMutex, signal::Signal};
use heapless::Vec;

use gotthetime::link::{decode, KeyValue, LinkError, MAX_PAIRS};

/// Longest inbound write: every key in one message.
const INBOUND_LEN: usize = MAX_PAIRS * 5;

/// 128-bit base of the phone-link service.
const SERVICE_UUID: [u8; 16] = [
    0xd8, 0x54, 0x7a, 0xb5, 0x02, 0x03, 0xc1, 0xb2, 0xf2, 0x47, 0x5a, 0x8c, 0x10, 0x16, 0x4e, 0x7e,
];

pub static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name("GotTheTime")
    .build();

pub static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[SERVICE_UUID])
    .build();

#[nrf_softdevice::gatt_service(uuid = "7e4e1610-8c5a-47f2-b2c1-0302b57a54d8")]
pub struct PhoneLinkService {
    /// Key/value batches from the companion app.
    #[characteristic(uuid = "7e4e1611-8c5a-47f2-b2c1-0302b57a54d8", write)]
    pub inbound: Vec<u8, INBOUND_LEN>,
    /// Poke counter; a notification asks the phone for a fresh push.
    #[characteristic(uuid = "7e4e1612-8c5a-47f2-b2c1-0302b57a54d8", read, notify)]
    pub poke: u8,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub link: PhoneLinkService,
}

pub fn softdevice_config() -> Config {
    Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"GotTheTime" as *const u8 as _,
            current_len: 10,
            max_len: 10,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// Advertise until a phone connects.
pub async fn advertise(sd: &Softdevice) -> Result<Connection, AdvertiseError> {
    let config = peripheral::Config::default();
    let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };
    peripheral::advertise_connectable(sd, adv, &config).await
}

/// Serve one connection until it drops.
///
/// Inbound writes are decoded and handed to `on_message`; every poke request
/// raised while the connection is up goes out as a notification.
pub async fn serve<F>(
    server: &Server,
    conn: &Connection,
    mut on_message: F,
    poke_requested: &Signal<ThreadModeRawMutex, ()>,
) where
    F: FnMut(Vec<KeyValue, MAX_PAIRS>),
{
    let gatt = gatt_server::run(conn, server, |event| match event {
        ServerEvent::Link(PhoneLinkServiceEvent::InboundWrite(payload)) => {
            let (pairs, diagnostic) = decode(&payload);
            if let Some(err) = diagnostic {
                defmt::warn!("inbound write: {}", err.category());
            }
            on_message(pairs);
        }
        ServerEvent::Link(PhoneLinkServiceEvent::PokeCccdWrite { .. }) => {}
    });

    let pokes = async {
        let mut count: u8 = 0;
        loop {
            poke_requested.wait().await;
            count = count.wrapping_add(1);
            // Fire-and-forget: the content is an empty poke, only the
            // notification itself matters.
            if let Err(err) = server.link.poke_notify(conn, &count) {
                defmt::warn!("poke failed: {}", categorize(&err).category());
            }
        }
    };

    if let Either::First(err) = select(gatt, pokes).await {
        defmt::info!("gatt server closed: {}", defmt::Debug2Format(&err));
    }
}

fn categorize(err: &NotifyValueError) -> LinkError {
    match err {
        NotifyValueError::Disconnected => LinkError::NotConnected,
        NotifyValueError::Raw(RawError::Timeout) => LinkError::Timeout,
        NotifyValueError::Raw(RawError::NoMem) => LinkError::BufferOverflow,
        NotifyValueError::Raw(RawError::Resources) => LinkError::Busy,
        NotifyValueError::Raw(_) => LinkError::Busy,
    }
}
