mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use common::{MockDevices, MockTransport, LOCAL_ID};
use peerpulse_client::{spawn_engine, EngineConfig, EngineError, EngineEvent, EngineHandle, Session, SystemClock};
use peerpulse_media::{CallStatus, EndReason};
use peerpulse_net::TransportEvent;
use peerpulse_shared::types::{MediaKind, PeerId};

const BOB: &str = "bob-4d2e81aa";

async fn next_event(
    rx: &mut mpsc::Receiver<EngineEvent>,
    want: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let event = rx.recv().await.expect("engine stopped");
            if want(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not seen")
}

async fn start() -> (
    EngineHandle,
    mpsc::Receiver<EngineEvent>,
    common::TransportProbe,
    MockDevices,
    PeerId,
) {
    let (transport, net) = MockTransport::new(LOCAL_ID);
    let session = Session::new(
        Box::new(transport),
        "NovaEcho",
        EngineConfig::default(),
        Arc::new(SystemClock),
    )
    .unwrap();
    let devices = MockDevices::default();
    let (handle, mut rx) = spawn_engine(session, Arc::new(devices.clone()));

    let bob = PeerId::from(BOB);
    let link = handle.open(bob.clone(), Some("StarWave".into())).await.unwrap();
    handle
        .deliver(TransportEvent::LinkOpened {
            peer: bob.clone(),
            link,
        })
        .await
        .unwrap();
    next_event(&mut rx, |e| matches!(e, EngineEvent::PeerConnected { .. })).await;

    (handle, rx, net, devices, bob)
}

#[tokio::test(start_paused = true)]
async fn typing_end_follows_a_second_of_silence() {
    let (handle, _rx, net, _devices, bob) = start().await;

    handle.notify_typing(bob.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    handle.notify_typing(bob.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(net.link(&bob).1.types(), vec!["USER_INFO", "TYPING_START"]);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        net.link(&bob).1.types(),
        vec!["USER_INFO", "TYPING_START", "TYPING_END"]
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_rings_out_after_thirty_seconds() {
    let (handle, mut rx, net, devices, bob) = start().await;

    handle.start_call(bob.clone(), MediaKind::Audio).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(net.call_count(), 1);
    assert_eq!(
        handle.call_status(bob.clone(), MediaKind::Audio).await.unwrap(),
        CallStatus::Ringing
    );

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(
        handle.call_status(bob.clone(), MediaKind::Audio).await.unwrap(),
        CallStatus::Ringing
    );

    let ended = next_event(&mut rx, |e| matches!(e, EngineEvent::CallEnded { .. })).await;
    assert!(matches!(
        ended,
        EngineEvent::CallEnded {
            reason: EndReason::RingTimeout,
            duration_secs: None,
            ..
        }
    ));

    let streams = devices.streams.lock().unwrap();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].1.is_stopped());
    assert!(net.call(&bob).1.is_closed());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_is_reported() {
    let (handle, mut rx, net, devices, bob) = start().await;
    *devices.deny.lock().unwrap() = true;

    handle.start_call(bob.clone(), MediaKind::Video).await.unwrap();
    let failed = next_event(&mut rx, |e| matches!(e, EngineEvent::MediaFailed { .. })).await;
    assert!(matches!(
        failed,
        EngineEvent::MediaFailed {
            kind: MediaKind::Video,
            ..
        }
    ));
    assert_eq!(net.call_count(), 0);
    assert_eq!(
        handle.call_status(bob, MediaKind::Video).await.unwrap(),
        CallStatus::None
    );
}

#[tokio::test(start_paused = true)]
async fn queries_and_shutdown() {
    let (handle, _rx, _net, _devices, bob) = start().await;

    let sent = handle.send_message(bob.clone(), "hello").await.unwrap();
    assert_eq!(handle.history(bob.clone()).await.unwrap(), vec![sent]);

    let peers = handle.peers().await.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].display_name, "StarWave");

    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(handle.peers().await, Err(EngineError::Shutdown)));
}
