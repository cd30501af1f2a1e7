use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "HOMEGUARD_CONFIG";

/// Environment variable overriding every node's hub URL
pub const HUB_URL_ENV: &str = "HOMEGUARD_HUB_URL";

/// Complete Homeguard configuration, one section per node
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HomeguardConfig {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub door: DoorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Central hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_hub_bind")]
    pub bind_addr: String,
    /// Serial device carrying sensor lines
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Captured face crops
    #[serde(default = "default_faces_dir")]
    pub faces_dir: PathBuf,
    /// Enrolled roster (reference images)
    #[serde(default = "default_known_faces_dir")]
    pub known_faces_dir: PathBuf,
    #[serde(default = "default_pulse_ms")]
    pub vibration_pulse_ms: u64,
}

fn default_hub_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_faces_dir() -> PathBuf {
    PathBuf::from("data/faces")
}

fn default_known_faces_dir() -> PathBuf {
    PathBuf::from("data/known_faces")
}

fn default_pulse_ms() -> u64 {
    500
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_hub_bind(),
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            faces_dir: default_faces_dir(),
            known_faces_dir: default_known_faces_dir(),
            vibration_pulse_ms: default_pulse_ms(),
        }
    }
}

/// Camera node configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_bind")]
    pub bind_addr: String,
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    /// Recognize every Nth frame
    #[serde(default = "default_process_every")]
    pub process_every: u64,
    /// Seconds between face events for the same identity
    #[serde(default = "default_event_cooldown")]
    pub event_cooldown_secs: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_known_faces_dir")]
    pub known_faces_dir: PathBuf,
    /// Face recognition service; recognition is disabled when unset
    #[serde(default)]
    pub recognizer_url: Option<String>,
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
}

fn default_camera_bind() -> String {
    "0.0.0.0:9876".to_string()
}

fn default_camera_id() -> String {
    "cam_01".to_string()
}

fn default_process_every() -> u64 {
    5
}

fn default_event_cooldown() -> u64 {
    5
}

fn default_max_frame_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_hub_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_camera_bind(),
            camera_id: default_camera_id(),
            process_every: default_process_every(),
            event_cooldown_secs: default_event_cooldown(),
            max_frame_bytes: default_max_frame_bytes(),
            known_faces_dir: default_known_faces_dir(),
            recognizer_url: None,
            hub_url: default_hub_url(),
        }
    }
}

/// Door control node configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
    #[serde(default = "default_door_bind")]
    pub bind_addr: String,
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    /// Enrolled credentials: uid (hex) → name
    #[serde(default = "default_credentials")]
    pub credentials: HashMap<String, String>,
}

fn default_door_bind() -> String {
    "0.0.0.0:8765".to_string()
}

fn default_credentials() -> HashMap<String, String> {
    [
        ("A4961F3E", "Ammar"),
        ("03976D6A", "Hana"),
        ("945C453E", "Menna"),
        ("038E226A", "Mohamed"),
        ("1BB24302", "Andrew"),
        ("33D3316A", "Mostafa"),
        ("94A9133E", "Filo"),
    ]
    .into_iter()
    .map(|(uid, name)| (uid.to_string(), name.to_string()))
    .collect()
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_door_bind(),
            hub_url: default_hub_url(),
            credentials: default_credentials(),
        }
    }
}

/// Notification node configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    #[serde(default = "default_telegram_api")]
    pub telegram_api_url: String,
    /// Bot token; `TELEGRAM_TOKEN` takes precedence
    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default = "default_subscribers_dir")]
    pub subscribers_dir: PathBuf,
    #[serde(default = "default_vibration_cooldown")]
    pub vibration_cooldown_secs: u64,
    #[serde(default = "default_face_cooldown")]
    pub face_cooldown_secs: u64,
    #[serde(default = "default_camera_lat")]
    pub camera_lat: f64,
    #[serde(default = "default_camera_lon")]
    pub camera_lon: f64,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_subscribers_dir() -> PathBuf {
    PathBuf::from("data/subscribers")
}

fn default_vibration_cooldown() -> u64 {
    30
}

fn default_face_cooldown() -> u64 {
    20
}

fn default_camera_lat() -> f64 {
    30.0444
}

fn default_camera_lon() -> f64 {
    31.2357
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            hub_url: default_hub_url(),
            telegram_api_url: default_telegram_api(),
            telegram_token: None,
            subscribers_dir: default_subscribers_dir(),
            vibration_cooldown_secs: default_vibration_cooldown(),
            face_cooldown_secs: default_face_cooldown(),
            camera_lat: default_camera_lat(),
            camera_lon: default_camera_lon(),
        }
    }
}

impl NotifierConfig {
    /// Bot token from the environment or the config file
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var("TELEGRAM_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.telegram_token.clone())
    }
}

impl HomeguardConfig {
    /// Apply environment overrides on top of file values. `lookup` resolves
    /// a variable name, normally `std::env::var`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(HUB_URL_ENV).filter(|u| !u.is_empty()) {
            self.camera.hub_url = url.clone();
            self.door.hub_url = url.clone();
            self.notifier.hub_url = url;
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<HomeguardConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: HomeguardConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load the config named by `HOMEGUARD_CONFIG` (default `homeguard.toml`).
///
/// A missing file yields defaults; an unreadable or invalid one is an error.
pub fn load_from_env() -> Result<HomeguardConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "homeguard.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        load_config(path)?
    } else {
        HomeguardConfig::default()
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
