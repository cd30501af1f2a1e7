use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::SensorSnapshot;

mod validation;

pub use validation::{normalize_credential_id, CredentialError};

/// Wire name used for faces that did not match the roster.
pub const UNKNOWN_FACE_NAME: &str = "UNKNOWN";

/// Name reported in access audits when no identity is attached.
pub const UNKNOWN_IDENTITY_NAME: &str = "Unknown";

/// Credential id sentinel for face-triggered grants.
pub const FACE_CREDENTIAL: &str = "FACE";

/// Identity resolved from the enrolled roster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }

    /// Cooldown key for this identity.
    pub fn key(&self) -> &str {
        match self {
            Identity::Known(name) => name,
            Identity::Unknown => UNKNOWN_IDENTITY_NAME,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Recognition status carried by face events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FaceStatus {
    Known,
    #[default]
    Unknown,
}

/// FaceEvent as produced by the recognition pipeline.
///
/// Immutable once emitted; `image` holds the JPEG-encoded face crop.
#[derive(Clone, Debug)]
pub struct FaceEvent {
    pub camera_id: String,
    pub identity: Identity,
    pub image: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl FaceEvent {
    pub fn new(camera_id: impl Into<String>, identity: Identity, image: Vec<u8>) -> Self {
        Self {
            camera_id: camera_id.into(),
            identity,
            image,
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> FaceStatus {
        if self.identity.is_known() {
            FaceStatus::Known
        } else {
            FaceStatus::Unknown
        }
    }

    /// Wire shape posted to the hub.
    pub fn to_payload(&self) -> FaceEventPayload {
        use base64::Engine;

        let name = match &self.identity {
            Identity::Known(name) => name.clone(),
            Identity::Unknown => UNKNOWN_FACE_NAME.to_string(),
        };
        FaceEventPayload {
            camera_id: self.camera_id.clone(),
            name,
            status: self.status(),
            image: Some(base64::engine::general_purpose::STANDARD.encode(&self.image)),
        }
    }
}

/// Camera → hub face event body (`POST /api/face-event`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceEventPayload {
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    #[serde(default = "default_face_name")]
    pub name: String,
    #[serde(default)]
    pub status: FaceStatus,
    /// Base64-encoded JPEG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

fn default_camera_id() -> String {
    "cam_01".to_string()
}

fn default_face_name() -> String {
    UNKNOWN_FACE_NAME.to_string()
}

/// Face event as broadcast by the hub: the image is replaced by a reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub camera: String,
    pub name: String,
    pub status: FaceStatus,
    pub image_url: String,
    pub time: String,
}

impl FaceRecord {
    pub fn identity(&self) -> Identity {
        match self.status {
            FaceStatus::Known => Identity::Known(self.name.clone()),
            FaceStatus::Unknown => Identity::Unknown,
        }
    }
}

/// Outcome of an access decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessOutcome {
    Authorized,
    Denied,
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Authorized => f.write_str("AUTHORIZED"),
            AccessOutcome::Denied => f.write_str("DENIED"),
        }
    }
}

/// How an access decision was triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessMethod {
    Nfc,
    Face,
}

/// Access audit record (`nfc_event` on the hub).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub status: AccessOutcome,
    pub uid: String,
    pub name: String,
    pub method: AccessMethod,
    pub time: String,
}

impl AccessEvent {
    /// Audit for an NFC credential decision.
    pub fn nfc(uid: &str, outcome: AccessOutcome, identity: &Identity) -> Self {
        Self {
            status: outcome,
            uid: uid.to_string(),
            name: identity.key().to_string(),
            method: AccessMethod::Nfc,
            time: clock_time(),
        }
    }

    /// Audit for a face-triggered grant.
    pub fn face(name: &str) -> Self {
        Self {
            status: AccessOutcome::Authorized,
            uid: FACE_CREDENTIAL.to_string(),
            name: name.to_string(),
            method: AccessMethod::Face,
            time: clock_time(),
        }
    }
}

fn clock_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Hub → client messages on `/api/ws`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    Update(SensorSnapshot),
    FaceEvent(FaceRecord),
    NfcEvent(AccessEvent),
}

/// Client → hub messages on `/api/ws`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NfcEvent(AccessEvent),
}

/// Device → door node message.
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceMessage {
    pub uid: Option<String>,
}

/// Door node → device actuator command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum DoorCommand {
    Open { name: String },
    Denied,
}
