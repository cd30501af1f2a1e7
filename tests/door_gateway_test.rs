// End-to-end tests for the door gateway over a real WebSocket connection
//
// The door router is served on an ephemeral port; a tungstenite client plays
// the NFC reader. Face grants are injected from a plain OS thread, the same
// way the hub client thread delivers them in production.

use futures::{SinkExt, StreamExt};
use homeguard::{
    access::{create_door_router, AccessGateway, AuditSink, CredentialTable},
    event::{AccessEvent, AccessMethod, AccessOutcome, FaceRecord, FaceStatus, HubMessage},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Default)]
struct RecordingAudit {
    events: Mutex<Vec<AccessEvent>>,
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AccessEvent) {
        self.events.lock().unwrap().push(event);
    }
}

async fn start_gateway() -> (String, Arc<AccessGateway>, Arc<RecordingAudit>) {
    let credentials: HashMap<String, String> = [("A4961F3E", "Ammar"), ("03976D6A", "Hana")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let audit = Arc::new(RecordingAudit::default());
    let gateway = Arc::new(AccessGateway::new(
        CredentialTable::from_map(&credentials),
        audit.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_door_router(Arc::clone(&gateway));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("ws://{}/ws", addr), gateway, audit)
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for device command")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_devices(gateway: &AccessGateway, count: usize) {
    for _ in 0..100 {
        if gateway.devices().len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("device registration did not reach {}", count);
}

#[tokio::test]
async fn test_nfc_credential_round_trip() {
    let (url, _gateway, audit) = start_gateway().await;
    let (ws, _) = connect_async(url.as_str()).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(r#"{"uid": "A4961F3E"}"#.to_string()))
        .await
        .unwrap();
    let reply = next_json(&mut read).await;
    assert_eq!(reply["action"], "OPEN");
    assert_eq!(reply["name"], "Ammar");

    // Malformed input keeps the connection open
    write.send(Message::Text("garbage".to_string())).await.unwrap();

    write
        .send(Message::Text(r#"{"uid": "FFFFFFFF"}"#.to_string()))
        .await
        .unwrap();
    let reply = next_json(&mut read).await;
    assert_eq!(reply["action"], "DENIED");

    let events = audit.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, AccessOutcome::Authorized);
    assert_eq!(events[0].name, "Ammar");
    assert_eq!(events[1].status, AccessOutcome::Denied);
    assert_eq!(events[1].name, "Unknown");
}

#[tokio::test]
async fn test_face_grant_from_foreign_thread_reaches_device() {
    let (url, gateway, audit) = start_gateway().await;
    let (ws, _) = connect_async(url.as_str()).await.unwrap();
    let (_write, mut read) = ws.split();
    wait_for_devices(&gateway, 1).await;

    let remote = Arc::clone(&gateway);
    std::thread::spawn(move || {
        remote.handle_hub_message(&HubMessage::FaceEvent(FaceRecord {
            camera: "cam_01".to_string(),
            name: "Hana".to_string(),
            status: FaceStatus::Known,
            image_url: "/faces/Hana_1.jpg".to_string(),
            time: "12:00:00".to_string(),
        }));
    })
    .join()
    .unwrap();

    let command = next_json(&mut read).await;
    assert_eq!(command["action"], "OPEN");
    assert_eq!(command["name"], "Hana");

    let events = audit.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].method, AccessMethod::Face);
}

#[tokio::test]
async fn test_disconnected_device_is_deregistered() {
    let (url, gateway, _audit) = start_gateway().await;
    let (ws, _) = connect_async(url.as_str()).await.unwrap();
    wait_for_devices(&gateway, 1).await;

    drop(ws);
    wait_for_devices(&gateway, 0).await;
}
