use core::convert::TryInto;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::Method,
    io::Write,
    mqtt::client::{Details, EventPayload, QoS},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::server::{Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request},
    log::EspLogger,
    mqtt::client::{EspMqttClient, EspMqttConnection, LwtConfiguration, MqttClientConfiguration},
    nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault},
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};
use serde::Serialize;

use fanctl_common::{
    api::{http_status, MappingStatusView, PwmStatusView, SensorStatusView},
    command::query_params,
    homeassistant::{
        diagnostic_messages, discovery_messages, state_messages, DeviceDiagnostics, OutboundMessage,
    },
    settings::{decode_nvs, encode_nvs, NvsValue},
    topics::{device_id_from_mac, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, MAX_MQTT_PAYLOAD_BYTES},
    CommandKind, ConfigStore, FanCommand, FanController, FanTelemetry, InboundTopic,
    NetworkConfig, RuntimeConfig, SettingKey, SettingValue, StoreError, TemperatureSource,
    Topics,
};

use crate::{fan_pwm::LedcFan, kmeter::KMeter};

const NVS_SETTINGS_NAMESPACE: &str = "settings";
const NVS_RUNTIME_NAMESPACE: &str = "fanctl";
const NVS_RUNTIME_KEY: &str = "runtime_json";
const WATCHDOG_TIMEOUT_SEC: u32 = 30;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const CONTROL_LOOP_SLEEP_MS: u64 = 100;
const RESTART_FLUSH_MS: u64 = 500;

type EspController = FanController<NvsSettingsStore, LedcFan>;

/// State shared by the HTTP handlers, the MQTT receiver and the control thread.
/// Only the control thread publishes; the others raise flags.
#[derive(Clone)]
struct SharedState {
    controller: Arc<Mutex<EspController>>,
    topics: Arc<Topics>,
    device_name: Arc<String>,
    started: Instant,
    announce_pending: Arc<AtomicBool>,
    publish_pending: Arc<AtomicBool>,
    restart_requested: Arc<AtomicBool>,
}

impl SharedState {
    fn controller(&self) -> MutexGuard<'_, EspController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "uptimeMs")]
    uptime_ms: u64,
    #[serde(flatten)]
    telemetry: FanTelemetry,
}

/// Tunables in the `settings` namespace, one typed entry per key.
pub struct NvsSettingsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsSettingsStore {
    fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_SETTINGS_NAMESPACE, true)
            .context("failed to open settings namespace")?;
        Ok(Self { nvs })
    }

    fn read_raw(&self, key: SettingKey) -> Result<Option<NvsValue>, StoreError> {
        let name = key.nvs_name();
        let result = match key {
            SettingKey::ControlMode | SettingKey::AutoPwmEnabled | SettingKey::ManualDuty => {
                self.nvs.get_u8(name).map(|value| value.map(NvsValue::U8))
            }
            SettingKey::ManualFreq => self.nvs.get_u32(name).map(|value| value.map(NvsValue::U32)),
            SettingKey::TempStart | SettingKey::TempMax => {
                self.nvs.get_i32(name).map(|value| value.map(NvsValue::I32))
            }
        };
        result.map_err(|err| StoreError::Unavailable(format!("{name}: {err}")))
    }

    fn write_raw(&mut self, key: SettingKey, value: NvsValue) -> Result<(), StoreError> {
        let name = key.nvs_name();
        let result = match value {
            NvsValue::U8(raw) => self.nvs.set_u8(name, raw),
            NvsValue::U32(raw) => self.nvs.set_u32(name, raw),
            NvsValue::I32(raw) => self.nvs.set_i32(name, raw),
        };
        result.map_err(|err| StoreError::Write {
            key: key.as_str(),
            reason: err.to_string(),
        })
    }

    fn restore(&mut self, key: SettingKey, previous: Option<NvsValue>) -> Result<(), StoreError> {
        match previous {
            Some(value) => self.write_raw(key, value),
            None => self
                .nvs
                .remove(key.nvs_name())
                .map(|_| ())
                .map_err(|err| StoreError::Write {
                    key: key.as_str(),
                    reason: err.to_string(),
                }),
        }
    }
}

impl ConfigStore for NvsSettingsStore {
    fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError> {
        self.read_raw(key)?
            .map(|raw| decode_nvs(key, raw))
            .transpose()
    }

    fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError> {
        let encoded = entries
            .iter()
            .map(|&(key, value)| encode_nvs(key, value).map(|raw| (key, raw)))
            .collect::<Result<Vec<_>, _>>()?;
        let previous = encoded
            .iter()
            .map(|&(key, _)| self.read_raw(key))
            .collect::<Result<Vec<_>, _>>()?;

        for (written, &(key, raw)) in encoded.iter().enumerate() {
            if let Err(err) = self.write_raw(key, raw) {
                for (&(key, _), &old) in encoded.iter().zip(&previous).take(written) {
                    if let Err(rollback) = self.restore(key, old) {
                        warn!("rollback of {} failed: {rollback}", key.as_str());
                    }
                }
                return Err(err);
            }
        }

        Ok(())
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut runtime = load_runtime_config(&nvs_partition).unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    ensure_build_defaults(&mut runtime.network);
    runtime.sanitize();

    info!(
        "runtime config: ssid=`{}`, mqtt=`{}:{}`, prefix=`{}`",
        runtime.network.wifi_ssid,
        runtime.network.mqtt_host,
        runtime.network.mqtt_port,
        runtime.network.mqtt_topic_prefix,
    );

    let peripherals = Peripherals::take()?;

    let fan = LedcFan::new(
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        peripherals.pins.gpio22,
        runtime.controller.auto_pwm_frequency_hz,
    )
    .context("fan PWM init failed")?;

    let sensor_refresh = Duration::from_millis(runtime.controller.sensor_read_interval_ms);
    let sensor = KMeter::new(
        peripherals.i2c0,
        peripherals.pins.gpio26,
        peripherals.pins.gpio32,
        sensor_refresh,
    )
    .unwrap_or_else(|err| {
        warn!("KMeter init failed, automatic control disabled: {err:#}");
        KMeter::disabled()
    });

    let store = NvsSettingsStore::new(nvs_partition.clone())?;
    let controller = FanController::start(runtime.controller.clone(), store, fan);

    let wifi = if runtime.network.wifi_ssid.is_empty() {
        warn!("no wifi credentials configured; running offline");
        None
    } else {
        match connect_wifi(peripherals.modem, sys_loop, nvs_partition, &runtime.network) {
            Ok(wifi) => {
                disable_wifi_power_save();
                Some(wifi)
            }
            Err(err) => {
                warn!("wifi unavailable, fan control continues offline: {err:#}");
                None
            }
        }
    };

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;

    let topics = Topics::new(&runtime.network.mqtt_topic_prefix, &read_device_id());
    info!("device id {}, topic base {}", topics.device_id(), topics.base());

    let state = SharedState {
        controller: Arc::new(Mutex::new(controller)),
        topics: Arc::new(topics),
        device_name: Arc::new(runtime.network.device_name.clone()),
        started: Instant::now(),
        announce_pending: Arc::new(AtomicBool::new(false)),
        publish_pending: Arc::new(AtomicBool::new(false)),
        restart_requested: Arc::new(AtomicBool::new(false)),
    };

    let mqtt = if wifi.is_some() {
        let (client, connection) = create_mqtt_client(&runtime.network, &state.topics)?;
        spawn_mqtt_receiver(state.clone(), connection)?;
        Some(client)
    } else {
        None
    };
    spawn_control_loop(state.clone(), sensor, mqtt)?;

    let server = create_http_server(state)?;

    // Keep services alive for the program lifetime.
    let _wifi = wifi;
    let _server = server;

    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn load_runtime_config(partition: &EspDefaultNvsPartition) -> anyhow::Result<RuntimeConfig> {
    let nvs = EspNvs::new(partition.clone(), NVS_RUNTIME_NAMESPACE, true)?;
    let mut buffer = vec![0_u8; 2048];

    match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
        Some(value) => Ok(serde_json::from_str::<RuntimeConfig>(value)?),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Fills blanks from credentials baked in at build time.
fn ensure_build_defaults(network: &mut NetworkConfig) {
    if network.wifi_ssid.is_empty() {
        if let Some(ssid) = option_env!("WIFI_SSID") {
            network.wifi_ssid = ssid.to_string();
        }
    }
    if network.wifi_pass.is_empty() {
        if let Some(pass) = option_env!("WIFI_PASS") {
            network.wifi_pass = pass.to_string();
        }
    }
    if let Some(host) = option_env!("MQTT_HOST") {
        network.mqtt_host = host.to_string();
    }
}

fn read_device_id() -> String {
    let mut mac = [0_u8; 6];
    let rc = unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        )
    };
    if rc != esp_idf_svc::sys::ESP_OK {
        warn!("esp_read_mac failed: esp_err_t={rc}");
    }
    device_id_from_mac(mac)
}

fn create_http_server(state: SharedState) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfiguration {
        stack_size: 16 * 1024,
        ..Default::default()
    })?;

    {
        let state = state.clone();
        server.fn_handler("/api/status", Method::Get, move |req| {
            let telemetry = state.controller().telemetry();
            write_json(req, &status_response(&state, telemetry))
        })?;
    }

    {
        let state = state.clone();
        server.fn_handler("/api/pwm-status", Method::Get, move |req| {
            let telemetry = state.controller().telemetry();
            write_json(req, &PwmStatusView::from(&telemetry))
        })?;
    }

    {
        let state = state.clone();
        server.fn_handler("/api/temp-mapping-status", Method::Get, move |req| {
            let telemetry = state.controller().telemetry();
            write_json(req, &MappingStatusView::from(&telemetry))
        })?;
    }

    {
        let state = state.clone();
        server.fn_handler("/api/sensor-status", Method::Get, move |req| {
            let telemetry = state.controller().telemetry();
            write_json(req, &SensorStatusView::from(&telemetry))
        })?;
    }

    let command_routes = [
        ("/api/manual-pwm-mode", CommandKind::Mode),
        ("/api/manual-pwm-settings", CommandKind::Manual),
        ("/api/temp-mapping", CommandKind::Mapping),
        ("/api/auto-pwm", CommandKind::AutoEnabled),
    ];
    for (uri, kind) in command_routes {
        let state = state.clone();
        server.fn_handler(uri, Method::Post, move |req| {
            let params = query_params(req.uri());
            let command =
                match FanCommand::from_query(kind, |name| params.get(name).map(String::as_str)) {
                    Ok(command) => command,
                    Err(err) => return write_error(req, 400, &err.to_string()),
                };

            let result = state.controller().apply(command);
            if let Err(err) = result {
                warn!("http command {command:?} failed: {err}");
                return write_error(req, http_status(&err), &err.to_string());
            }

            state.publish_pending.store(true, Ordering::Relaxed);
            let telemetry = state.controller().telemetry();
            write_json(req, &status_response(&state, telemetry))
        })?;
    }

    Ok(server)
}

fn status_response(state: &SharedState, telemetry: FanTelemetry) -> StatusResponse {
    StatusResponse {
        device_id: state.topics.device_id().to_string(),
        uptime_ms: u64::try_from(state.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        telemetry,
    }
}

fn write_json<T: Serialize>(
    req: Request<&mut EspHttpConnection<'_>>,
    payload: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(
        200,
        Some("OK"),
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}

fn write_error(
    req: Request<&mut EspHttpConnection<'_>>,
    status_code: u16,
    message: &str,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(&serde_json::json!({ "error": message }))?;
    req.into_response(
        status_code,
        None,
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("wifi up on attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
                last_err = None;
                break;
            }
            Err(err) => {
                warn!("wifi attempt {attempt}/{WIFI_CONNECT_ATTEMPTS} failed: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    if let Some(err) = last_err {
        let _ = wifi.stop();
        return Err(anyhow!(err).context("all wifi connect attempts failed"));
    }

    drop(wifi);
    Ok(esp_wifi)
}

fn create_mqtt_client(
    network: &NetworkConfig,
    topics: &Topics,
) -> anyhow::Result<(EspMqttClient<'static>, EspMqttConnection)> {
    let url = format!("mqtt://{}:{}", network.mqtt_host, network.mqtt_port);
    let client_id = format!("fanctl-{}", topics.device_id());
    let status_topic = topics.status();

    let conf = MqttClientConfiguration {
        client_id: Some(client_id.as_str()),
        username: (!network.mqtt_user.is_empty()).then_some(network.mqtt_user.as_str()),
        password: (!network.mqtt_pass.is_empty()).then_some(network.mqtt_pass.as_str()),
        keep_alive_interval: Some(Duration::from_secs(30)),
        lwt: Some(LwtConfiguration {
            topic: status_topic.as_str(),
            payload: AVAILABILITY_OFFLINE.as_bytes(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }),
        ..Default::default()
    };

    info!("mqtt connecting to {url} as {client_id}");
    Ok(EspMqttClient::new(url.as_str(), &conf)?)
}

fn spawn_mqtt_receiver(state: SharedState, mut conn: EspMqttConnection) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(12 * 1024)
        .spawn(move || loop {
            match conn.next() {
                Ok(event) => match event.payload() {
                    EventPayload::Connected(_) => {
                        info!("mqtt connected");
                        state.announce_pending.store(true, Ordering::Relaxed);
                    }
                    EventPayload::Disconnected => warn!("mqtt disconnected"),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => handle_mqtt_message(&state, topic, data),
                    _ => {}
                },
                Err(err) => {
                    warn!("mqtt receive loop error: {err:?}");
                    thread::sleep(Duration::from_secs(2));
                }
            }
        })
        .context("failed to spawn mqtt receiver thread")?;
    Ok(())
}

fn handle_mqtt_message(state: &SharedState, topic: &str, payload: &[u8]) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return;
    }

    let kind = match state.topics.classify(topic) {
        Some(InboundTopic::Command(kind)) => kind,
        Some(InboundTopic::Restart) => {
            info!("restart requested over mqtt");
            state.restart_requested.store(true, Ordering::Relaxed);
            return;
        }
        None => return,
    };

    match FanCommand::from_mqtt(kind, payload) {
        Ok(command) => {
            let result = state.controller().apply(command);
            if let Err(err) = result {
                warn!("mqtt command {command:?} failed: {err}");
            }
        }
        Err(err) => warn!("rejected mqtt command on {topic}: {err}"),
    }

    // Rejected commands still republish so the UI snaps back.
    state.publish_pending.store(true, Ordering::Relaxed);
}

fn spawn_control_loop(
    state: SharedState,
    mut sensor: KMeter,
    mut mqtt: Option<EspMqttClient<'static>>,
) -> anyhow::Result<()> {
    let (tick_every, heartbeat_every) = {
        let controller = state.controller();
        let config = controller.config();
        (
            Duration::from_millis(config.tick_interval_ms),
            Duration::from_millis(config.state_publish_interval_ms),
        )
    };

    thread::Builder::new()
        .name("control-loop".into())
        .stack_size(12 * 1024)
        .spawn(move || {
            if let Err(err) = add_current_task_to_watchdog() {
                warn!("failed to register control loop with watchdog: {err:#}");
            }

            let mut next_tick = Instant::now();
            let mut next_heartbeat = Instant::now() + heartbeat_every;

            loop {
                feed_watchdog();
                let now = Instant::now();

                if now >= next_tick {
                    next_tick = now + tick_every;
                    let reading = sensor.read();
                    let outcome = state.controller().tick(reading);
                    if outcome.changed() {
                        state.publish_pending.store(true, Ordering::Relaxed);
                    }
                }

                if let Some(client) = mqtt.as_mut() {
                    if state.announce_pending.swap(false, Ordering::Relaxed) {
                        announce(&state, client);
                        next_heartbeat = now + heartbeat_every;
                    }
                    if now >= next_heartbeat {
                        next_heartbeat = now + heartbeat_every;
                        state.publish_pending.store(true, Ordering::Relaxed);
                        publish_diagnostics(&state, client);
                    }
                    if state.publish_pending.swap(false, Ordering::Relaxed) {
                        publish_state(&state, client);
                    }
                }

                if state.restart_requested.load(Ordering::Relaxed) {
                    restart(&state, mqtt.as_mut());
                }

                thread::sleep(Duration::from_millis(CONTROL_LOOP_SLEEP_MS));
            }
        })
        .context("failed to spawn control loop thread")?;
    Ok(())
}

/// Runs after every broker (re)connect.
fn announce(state: &SharedState, mqtt: &mut EspMqttClient<'static>) {
    for topic in state.topics.subscriptions() {
        if let Err(err) = mqtt.subscribe(&topic, QoS::AtLeastOnce) {
            warn!("mqtt subscribe to {topic} failed: {err:?}");
        }
    }

    let mut messages = vec![OutboundMessage {
        topic: state.topics.status(),
        payload: AVAILABILITY_ONLINE.to_string(),
        retain: true,
    }];
    messages.extend(discovery_messages(&state.topics, &state.device_name));
    publish_all(mqtt, messages);

    publish_state(state, mqtt);
    publish_diagnostics(state, mqtt);
}

fn publish_diagnostics(state: &SharedState, mqtt: &mut EspMqttClient<'static>) {
    let diagnostics = DeviceDiagnostics {
        uptime_s: state.started.elapsed().as_secs(),
        wifi_rssi_dbm: wifi_rssi(),
    };
    publish_all(mqtt, diagnostic_messages(&state.topics, &diagnostics));
}

fn publish_state(state: &SharedState, mqtt: &mut EspMqttClient<'static>) {
    let payload = state.controller().state_payload();
    publish_all(mqtt, state_messages(&state.topics, &payload));
}

fn publish_all(mqtt: &mut EspMqttClient<'static>, messages: Vec<OutboundMessage>) {
    for message in messages {
        if let Err(err) = mqtt.publish(
            &message.topic,
            QoS::AtLeastOnce,
            message.retain,
            message.payload.as_bytes(),
        ) {
            warn!("mqtt publish to {} failed: {err:?}", message.topic);
        }
    }
}

fn restart(state: &SharedState, mqtt: Option<&mut EspMqttClient<'static>>) -> ! {
    warn!("restarting device");
    if let Some(client) = mqtt {
        publish_all(
            client,
            vec![OutboundMessage {
                topic: state.topics.status(),
                payload: AVAILABILITY_OFFLINE.to_string(),
                retain: true,
            }],
        );
    }
    thread::sleep(Duration::from_millis(RESTART_FLUSH_MS));
    unsafe { esp_idf_svc::sys::esp_restart() }
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

/// RSSI of the associated access point, `None` while not associated.
fn wifi_rssi() -> Option<i8> {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    (rc == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}
