use std::{
    collections::{BTreeMap, HashMap},
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fanctl_common::{
    api::{http_status, MappingStatusView, PwmStatusView, SensorStatusView},
    homeassistant::{
        diagnostic_messages, discovery_messages, state_messages, DeviceDiagnostics, OutboundMessage,
    },
    topics::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, MAX_MQTT_PAYLOAD_BYTES},
    CommandKind, ConfigStore, ControlError, FanCommand, FanController, FanTelemetry,
    InboundTopic, PwmActuator, PwmError, RuntimeConfig, SensorReading, SettingKey, SettingValue,
    StoreError, TemperatureSource, Topics,
};

type HostController = FanController<FileSettingsStore, LoggingPwm>;

#[derive(Clone)]
struct AppState {
    controller: Arc<Mutex<HostController>>,
    sensor: Arc<Mutex<SimulatedThermocouple>>,
    mqtt: AsyncClient,
    topics: Arc<Topics>,
    device_name: Arc<String>,
    started: Instant,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(rename = "deviceId")]
    device_id: String,
    timestamp: String,
    #[serde(flatten)]
    telemetry: FanTelemetry,
}

/// Flat `key -> value` JSON file, replaced atomically on every batch.
struct FileSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
}

impl FileSettingsStore {
    fn open(path: PathBuf) -> Self {
        let values = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
                warn!("ignoring unreadable settings file {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("failed to read settings file {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    fn write_all(&self, values: &BTreeMap<String, SettingValue>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl ConfigStore for FileSettingsStore {
    fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError> {
        Ok(self.values.get(key.as_str()).copied())
    }

    fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError> {
        let mut next = self.values.clone();
        for (key, value) in entries {
            next.insert(key.as_str().to_string(), *value);
        }

        self.write_all(&next).map_err(|err| {
            StoreError::Unavailable(format!("{}: {err}", self.path.display()))
        })?;
        self.values = next;
        Ok(())
    }
}

/// Stand-in for the LEDC channel: remembers and logs what it was told.
#[derive(Default)]
struct LoggingPwm {
    duty: u8,
    frequency_hz: u32,
}

impl PwmActuator for LoggingPwm {
    fn set_duty(&mut self, duty: u8) -> Result<(), PwmError> {
        if duty != self.duty {
            info!(duty, frequency_hz = self.frequency_hz, "pwm duty");
        }
        self.duty = duty;
        Ok(())
    }

    fn reconfigure_frequency(&mut self, hz: u32) -> Result<(), PwmError> {
        info!(from = self.frequency_hz, to = hz, "pwm timer reconfigured");
        self.frequency_hz = hz;
        Ok(())
    }
}

/// Thermocouple simulation sweeping between two temperatures. Readings are
/// cached and only refreshed every `refresh`, like the I2C driver.
struct SimulatedThermocouple {
    started: Instant,
    low_c: f32,
    high_c: f32,
    period: Duration,
    refresh: Duration,
    cached: Option<(Instant, SensorReading)>,
}

impl SimulatedThermocouple {
    fn new(refresh: Duration) -> Self {
        Self {
            started: Instant::now(),
            low_c: 25.0,
            high_c: 85.0,
            period: Duration::from_secs(300),
            refresh,
            cached: None,
        }
    }

    fn sample_at(&self, elapsed: Duration) -> f32 {
        let period = self.period.as_secs_f32();
        let phase = (elapsed.as_secs_f32() % period) / period;
        let ramp = if phase < 0.5 {
            phase * 2.0
        } else {
            (1.0 - phase) * 2.0
        };
        self.low_c + (self.high_c - self.low_c) * ramp
    }
}

impl TemperatureSource for SimulatedThermocouple {
    fn read(&mut self) -> SensorReading {
        let now = Instant::now();
        match self.cached {
            Some((at, reading)) if now.duration_since(at) < self.refresh => reading,
            _ => {
                let reading = SensorReading::ready(self.sample_at(now - self.started));
                self.cached = Some((now, reading));
                reading
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("FANCTL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.fanctl"));

    let mut runtime = load_runtime_config(&data_dir.join("runtime.json"))
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load runtime config: {err:#}");
            RuntimeConfig::default()
        });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let device_id = std::env::var("DEVICE_ID").unwrap_or_else(|_| "host".to_string());
    let topics = Topics::new(&runtime.network.mqtt_topic_prefix, &device_id);

    let store = FileSettingsStore::open(data_dir.join("settings.json"));
    let controller = FanController::start(runtime.controller.clone(), store, LoggingPwm::default());
    let sensor = SimulatedThermocouple::new(Duration::from_millis(
        runtime.controller.sensor_read_interval_ms,
    ));

    let mut mqtt_options = MqttOptions::new(
        format!("fanctl-{device_id}"),
        runtime.network.mqtt_host.clone(),
        runtime.network.mqtt_port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_last_will(LastWill::new(
        topics.status(),
        AVAILABILITY_OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    if !runtime.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            runtime.network.mqtt_user.clone(),
            runtime.network.mqtt_pass.clone(),
        );
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        controller: Arc::new(Mutex::new(controller)),
        sensor: Arc::new(Mutex::new(sensor)),
        mqtt,
        topics: Arc::new(topics),
        device_name: Arc::new(runtime.network.device_name.clone()),
        started: Instant::now(),
    };

    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(
        app_state.clone(),
        Duration::from_millis(runtime.controller.tick_interval_ms),
    );
    spawn_state_publish_loop(
        app_state.clone(),
        Duration::from_millis(runtime.controller.state_publish_interval_ms),
    );

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/pwm-status", get(handle_get_pwm_status))
        .route("/api/temp-mapping-status", get(handle_get_mapping_status))
        .route("/api/sensor-status", get(handle_get_sensor_status))
        .route("/api/manual-pwm-mode", post(handle_set_mode))
        .route("/api/manual-pwm-settings", post(handle_set_manual))
        .route("/api/temp-mapping", post(handle_set_mapping))
        .route("/api/auto-pwm", post(handle_set_auto))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state.clone());

    let port = std::env::var("FANCTL_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind fan controller server at {addr}"))?;

    info!("fan controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await?;
    Ok(())
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid runtime config {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    let network = &mut runtime.network;
    if let Ok(host) = std::env::var("MQTT_HOST") {
        network.mqtt_host = host;
    }
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
}

async fn shutdown_signal(app_state: AppState) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    if let Err(err) = app_state
        .mqtt
        .publish(
            app_state.topics.status(),
            QoS::AtLeastOnce,
            true,
            AVAILABILITY_OFFLINE,
        )
        .await
    {
        warn!("availability publish failed: {err}");
    }
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_mqtt_message(&app_state, &message.topic, &message.payload).await;
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    tokio::spawn(announce(app_state.clone()));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Runs after every broker (re)connect.
async fn announce(app_state: AppState) {
    for topic in app_state.topics.subscriptions() {
        if let Err(err) = app_state.mqtt.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
            warn!("mqtt subscribe to {topic} failed: {err}");
        }
    }

    let mut messages = vec![OutboundMessage {
        topic: app_state.topics.status(),
        payload: AVAILABILITY_ONLINE.to_string(),
        retain: true,
    }];
    messages.extend(discovery_messages(&app_state.topics, &app_state.device_name));
    publish_all(&app_state.mqtt, messages).await;

    publish_state(&app_state).await;
}

fn spawn_control_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            let reading = { app_state.sensor.lock().await.read() };
            let outcome = {
                let mut controller = app_state.controller.lock().await;
                controller.tick(reading)
            };

            if outcome.changed() {
                publish_state(&app_state).await;
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            publish_state(&app_state).await;
            publish_diagnostics(&app_state).await;
        }
    });
}

/// No radio on the host, so only uptime is reported.
async fn publish_diagnostics(app_state: &AppState) {
    let diagnostics = DeviceDiagnostics {
        uptime_s: app_state.started.elapsed().as_secs(),
        wifi_rssi_dbm: None,
    };
    publish_all(
        &app_state.mqtt,
        diagnostic_messages(&app_state.topics, &diagnostics),
    )
    .await;
}

async fn publish_state(app_state: &AppState) {
    let payload = { app_state.controller.lock().await.state_payload() };
    publish_all(&app_state.mqtt, state_messages(&app_state.topics, &payload)).await;
}

async fn publish_all(mqtt: &AsyncClient, messages: Vec<OutboundMessage>) {
    for message in messages {
        if let Err(err) = mqtt
            .publish(
                message.topic.as_str(),
                QoS::AtLeastOnce,
                message.retain,
                message.payload,
            )
            .await
        {
            warn!("mqtt publish to {} failed: {err}", message.topic);
        }
    }
}

async fn handle_mqtt_message(app_state: &AppState, topic: &str, payload: &[u8]) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return;
    }

    let kind = match app_state.topics.classify(topic) {
        Some(InboundTopic::Command(kind)) => kind,
        Some(InboundTopic::Restart) => {
            warn!("restart requested over mqtt; ignored on host build");
            return;
        }
        None => return,
    };

    let command = match FanCommand::from_mqtt(kind, payload) {
        Ok(command) => command,
        Err(err) => {
            warn!("rejected mqtt command on {topic}: {err}");
            publish_state(app_state).await;
            return;
        }
    };

    let result = { app_state.controller.lock().await.apply(command) };
    if let Err(err) = result {
        warn!("mqtt command {command:?} failed: {err}");
    }
    publish_state(app_state).await;
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let telemetry = { state.controller.lock().await.telemetry() };
    Json(StatusResponse {
        device_id: state.topics.device_id().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        telemetry,
    })
}

async fn handle_get_pwm_status(State(state): State<AppState>) -> impl IntoResponse {
    let telemetry = { state.controller.lock().await.telemetry() };
    Json(PwmStatusView::from(&telemetry))
}

async fn handle_get_mapping_status(State(state): State<AppState>) -> impl IntoResponse {
    let telemetry = { state.controller.lock().await.telemetry() };
    Json(MappingStatusView::from(&telemetry))
}

async fn handle_get_sensor_status(State(state): State<AppState>) -> impl IntoResponse {
    let telemetry = { state.controller.lock().await.telemetry() };
    Json(SensorStatusView::from(&telemetry))
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    apply_query(state, CommandKind::Mode, params).await
}

async fn handle_set_manual(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    apply_query(state, CommandKind::Manual, params).await
}

async fn handle_set_mapping(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    apply_query(state, CommandKind::Mapping, params).await
}

async fn handle_set_auto(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    apply_query(state, CommandKind::AutoEnabled, params).await
}

async fn apply_query(
    state: AppState,
    kind: CommandKind,
    params: HashMap<String, String>,
) -> axum::response::Response {
    let command =
        match FanCommand::from_query(kind, |name| params.get(name).map(String::as_str)) {
            Ok(command) => command,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        };

    let result = { state.controller.lock().await.apply(command) };
    if let Err(err) = result {
        warn!("http command {command:?} failed: {err}");
        return control_error_response(&err);
    }

    publish_state(&state).await;
    handle_get_status(State(state)).await.into_response()
}

fn control_error_response(err: &ControlError) -> axum::response::Response {
    let status =
        StatusCode::from_u16(http_status(err)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
