//! Door access authorization.
//!
//! NFC readers hold a persistent connection and present credential ids;
//! face grants arrive from the hub's `face_event` stream on the hub client
//! thread and are handed off to the device connections' own tasks. Every
//! decision is audited to the hub after the device has been answered.

mod credentials;
mod devices;
mod server;


pub use credentials::{CredentialTable, Decision};
pub use devices::DeviceRegistry;
pub use server::create_door_router;

use crate::event::{AccessEvent, AccessOutcome, DeviceMessage, DoorCommand, HubMessage, Identity};
use crate::hub_client::HubPublisher;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Destination for access audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AccessEvent);
}

impl AuditSink for HubPublisher {
    fn record(&self, event: AccessEvent) {
        self.publish_access(event);
    }
}

/// Reply and audit produced for one credential presentation
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialOutcome {
    pub decision: Decision,
    pub reply: DoorCommand,
    pub audit: AccessEvent,
}

pub struct AccessGateway {
    credentials: CredentialTable,
    devices: DeviceRegistry,
    audit: Arc<dyn AuditSink>,
}

impl AccessGateway {
    pub fn new(credentials: CredentialTable, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            credentials,
            devices: DeviceRegistry::new(),
            audit,
        }
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn authorize(&self, credential: &str) -> Decision {
        self.credentials.authorize(credential)
    }

    /// Evaluate a raw device message. `None` for malformed input, which the
    /// caller ignores while keeping the connection open.
    ///
    /// The returned audit is not recorded here; the caller sends the reply
    /// first and then passes the audit to [`AccessGateway::record`].
    pub fn handle_device_message(&self, text: &str) -> Option<CredentialOutcome> {
        let msg: DeviceMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed device message");
                return None;
            }
        };
        let Some(uid) = msg.uid else {
            warn!("Ignoring device message without uid");
            return None;
        };

        let decision = self.authorize(&uid);
        let (reply, audit) = match &decision {
            Decision::Authorized(name) => {
                info!(uid = %uid, name = %name, "Access granted");
                (
                    DoorCommand::Open { name: name.clone() },
                    AccessEvent::nfc(&uid, AccessOutcome::Authorized, &Identity::Known(name.clone())),
                )
            }
            Decision::Denied => {
                info!(uid = %uid, "Access denied");
                (
                    DoorCommand::Denied,
                    AccessEvent::nfc(&uid, AccessOutcome::Denied, &Identity::Unknown),
                )
            }
        };

        Some(CredentialOutcome {
            decision,
            reply,
            audit,
        })
    }

    pub fn record(&self, event: AccessEvent) {
        self.audit.record(event);
    }

    /// React to a hub message. Known faces open the door on every registered
    /// device and are audited with the face sentinel; everything else is
    /// ignored. Safe to call from any thread.
    pub fn handle_hub_message(&self, msg: &HubMessage) {
        let HubMessage::FaceEvent(record) = msg else {
            return;
        };

        match record.identity() {
            Identity::Known(name) => {
                info!(name = %name, camera = %record.camera, "Face access granted");
                let scheduled = self.devices.handoff(&DoorCommand::Open { name: name.clone() });
                debug!(devices = scheduled, "Open command handed off");
                self.record(AccessEvent::face(&name));
            }
            Identity::Unknown => {
                debug!(camera = %record.camera, "Ignoring unknown face");
            }
        }
    }
}
