#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::Value;

use peerpulse_client::{Effect, EngineConfig, EngineEvent, ManualClock, Session, TimerKey};
use peerpulse_media::{AcquireFuture, MediaConstraints, MediaDevices, MediaError};
use peerpulse_net::{CallHandle, Link, Transport, TransportError, TransportEvent};
use peerpulse_shared::media::{LocalStream, RemoteStream};
use peerpulse_shared::types::{CallId, LinkId, MediaKind, PeerId};

pub const LOCAL_ID: &str = "me-7f3a9c21";
pub const LOCAL_NAME: &str = "NovaEcho";

// ---------------------------------------------------------------------------
// Probes: shared views into what the mocks did
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct LinkProbe {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl LinkProbe {
    pub fn frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|t| serde_json::from_str(t).unwrap())
            .collect()
    }

    /// The `type` tag of every frame sent, `"chat"` for chat messages.
    pub fn types(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|f| {
                f.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("chat")
                    .to_string()
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[derive(Debug, Default, Clone)]
pub struct CallProbe {
    pub closed: Arc<Mutex<bool>>,
    pub answered: Arc<Mutex<bool>>,
}

impl CallProbe {
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    pub fn is_answered(&self) -> bool {
        *self.answered.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct StreamProbe {
    pub stopped: Arc<Mutex<bool>>,
    pub audio_enabled: Arc<Mutex<bool>>,
    pub video_enabled: Arc<Mutex<bool>>,
}

impl Default for StreamProbe {
    fn default() -> Self {
        Self {
            stopped: Arc::new(Mutex::new(false)),
            audio_enabled: Arc::new(Mutex::new(true)),
            video_enabled: Arc::new(Mutex::new(true)),
        }
    }
}

impl StreamProbe {
    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }

    pub fn audio_enabled(&self) -> bool {
        *self.audio_enabled.lock().unwrap()
    }

    pub fn video_enabled(&self) -> bool {
        *self.video_enabled.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockLink {
    id: LinkId,
    peer: PeerId,
    probe: LinkProbe,
}

impl MockLink {
    pub fn new(id: &str, peer: &PeerId) -> (Self, LinkProbe) {
        let probe = LinkProbe::default();
        (
            Self {
                id: LinkId::new(id),
                peer: peer.clone(),
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Link for MockLink {
    fn id(&self) -> &LinkId {
        &self.id
    }
    fn peer(&self) -> &PeerId {
        &self.peer
    }
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if *self.probe.closed.lock().unwrap() {
            return Err(TransportError::LinkClosed);
        }
        self.probe.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
    fn close(&mut self) {
        *self.probe.closed.lock().unwrap() = true;
    }
}

#[derive(Debug)]
pub struct MockCall {
    id: CallId,
    peer: PeerId,
    probe: CallProbe,
}

impl MockCall {
    pub fn new(id: &str, peer: &PeerId) -> (Self, CallProbe) {
        let probe = CallProbe::default();
        (
            Self {
                id: CallId::new(id),
                peer: peer.clone(),
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl CallHandle for MockCall {
    fn id(&self) -> &CallId {
        &self.id
    }
    fn peer(&self) -> &PeerId {
        &self.peer
    }
    fn answer(&mut self, _stream: &dyn LocalStream) -> Result<(), TransportError> {
        *self.probe.answered.lock().unwrap() = true;
        Ok(())
    }
    fn close(&mut self) {
        *self.probe.closed.lock().unwrap() = true;
    }
}

#[derive(Debug)]
pub struct MockStream {
    id: String,
    video: bool,
    probe: StreamProbe,
}

impl MockStream {
    pub fn new(id: &str, video: bool) -> (Box<dyn LocalStream>, StreamProbe) {
        let probe = StreamProbe::default();
        (
            Box::new(Self {
                id: id.to_string(),
                video,
                probe: probe.clone(),
            }),
            probe,
        )
    }
}

impl LocalStream for MockStream {
    fn id(&self) -> &str {
        &self.id
    }
    fn has_video(&self) -> bool {
        self.video
    }
    fn set_audio_enabled(&mut self, enabled: bool) {
        *self.probe.audio_enabled.lock().unwrap() = enabled;
    }
    fn set_video_enabled(&mut self, enabled: bool) {
        *self.probe.video_enabled.lock().unwrap() = enabled;
    }
    fn stop(&mut self) {
        *self.probe.stopped.lock().unwrap() = true;
    }
}

/// Everything the mock transport handed out, in order.
#[derive(Debug, Default, Clone)]
pub struct TransportProbe {
    pub links: Arc<Mutex<Vec<(PeerId, LinkId, LinkProbe)>>>,
    pub calls: Arc<Mutex<Vec<(PeerId, MediaKind, CallId, CallProbe)>>>,
    pub fail_calls: Arc<Mutex<bool>>,
}

impl TransportProbe {
    /// The most recent link opened to `peer`.
    pub fn link(&self, peer: &PeerId) -> (LinkId, LinkProbe) {
        self.links
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _, _)| p == peer)
            .map(|(_, id, probe)| (id.clone(), probe.clone()))
            .expect("no link to peer")
    }

    /// The most recent call placed to `peer`.
    pub fn call(&self, peer: &PeerId) -> (CallId, CallProbe) {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _, _, _)| p == peer)
            .map(|(_, _, id, probe)| (id.clone(), probe.clone()))
            .expect("no call to peer")
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[derive(Debug)]
pub struct MockTransport {
    local: PeerId,
    probe: TransportProbe,
}

impl MockTransport {
    pub fn new(local: &str) -> (Self, TransportProbe) {
        let probe = TransportProbe::default();
        (
            Self {
                local: PeerId::from(local),
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Transport for MockTransport {
    fn local_id(&self) -> PeerId {
        self.local.clone()
    }

    fn connect(&mut self, peer: &PeerId) -> Result<Box<dyn Link>, TransportError> {
        let mut links = self.probe.links.lock().unwrap();
        let id = format!("link-{}", links.len() + 1);
        let (link, probe) = MockLink::new(&id, peer);
        links.push((peer.clone(), LinkId::new(id), probe));
        Ok(Box::new(link))
    }

    fn call(
        &mut self,
        peer: &PeerId,
        kind: MediaKind,
        _stream: &dyn LocalStream,
    ) -> Result<Box<dyn CallHandle>, TransportError> {
        if *self.probe.fail_calls.lock().unwrap() {
            return Err(TransportError::Call("peer unreachable".into()));
        }
        let mut calls = self.probe.calls.lock().unwrap();
        let id = format!("out-call-{}", calls.len() + 1);
        let (call, probe) = MockCall::new(&id, peer);
        calls.push((peer.clone(), kind, CallId::new(id), probe));
        Ok(Box::new(call))
    }
}

/// Capture devices that hand out mock streams, or refuse.
#[derive(Debug, Default, Clone)]
pub struct MockDevices {
    pub deny: Arc<Mutex<bool>>,
    pub streams: Arc<Mutex<Vec<(MediaConstraints, StreamProbe)>>>,
}

impl MediaDevices for MockDevices {
    fn acquire(&self, constraints: &MediaConstraints) -> AcquireFuture {
        let deny = *self.deny.lock().unwrap();
        let streams = self.streams.clone();
        let constraints = constraints.clone();
        Box::pin(async move {
            if deny {
                return Err(MediaError::PermissionDenied);
            }
            let (stream, probe) = MockStream::new("local-stream", constraints.wants_video());
            streams.lock().unwrap().push((constraints, probe));
            Ok(stream)
        })
    }
}

// ---------------------------------------------------------------------------
// Harness driving a Session synchronously
// ---------------------------------------------------------------------------

pub struct Harness {
    pub session: Session,
    pub net: TransportProbe,
    pub clock: Arc<ManualClock>,
    pub effects: Vec<Effect>,
    call_seq: usize,
}

impl Harness {
    pub fn new() -> Self {
        let (transport, net) = MockTransport::new(LOCAL_ID);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let session = Session::new(
            Box::new(transport),
            LOCAL_NAME,
            EngineConfig::default(),
            clock.clone(),
        )
        .unwrap();
        Self {
            session,
            net,
            clock,
            effects: Vec::new(),
            call_seq: 0,
        }
    }

    /// Move queued effects into the harness record and return them.
    pub fn pump(&mut self) -> Vec<Effect> {
        let drained = self.session.drain_effects();
        self.effects.extend(drained.iter().cloned());
        drained
    }

    pub fn clear(&mut self) {
        self.pump();
        self.effects.clear();
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Emit(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Open an outbound link to `peer` and report it open.
    pub fn connect(&mut self, peer: &str) -> PeerId {
        let peer = PeerId::from(peer);
        let link = self.session.open(&peer, None).unwrap();
        self.session
            .handle_transport_event(TransportEvent::LinkOpened {
                peer: peer.clone(),
                link,
            });
        self.pump();
        peer
    }

    pub fn link(&self, peer: &PeerId) -> LinkProbe {
        self.net.link(peer).1
    }

    pub fn close_link(&mut self, peer: &PeerId) {
        let (link, _) = self.net.link(peer);
        self.session.handle_transport_event(TransportEvent::LinkClosed {
            peer: peer.clone(),
            link,
        });
        self.pump();
    }

    /// Deliver a JSON frame on the peer's current link.
    pub fn receive(&mut self, peer: &PeerId, frame: Value) {
        let (link, _) = self.net.link(peer);
        self.session.handle_transport_event(TransportEvent::LinkData {
            peer: peer.clone(),
            link,
            text: frame.to_string(),
        });
        self.pump();
    }

    /// Deliver an inbound call offer.
    pub fn offer(&mut self, peer: &PeerId, kind: MediaKind) -> (CallId, CallProbe) {
        self.call_seq += 1;
        let id = format!("in-call-{}", self.call_seq);
        let (call, probe) = MockCall::new(&id, peer);
        self.session.handle_transport_event(TransportEvent::InboundCall {
            peer: peer.clone(),
            kind,
            call: Box::new(call),
        });
        self.pump();
        (CallId::new(id), probe)
    }

    /// The attempt token of the latest media request for `peer`.
    pub fn media_request(&self, peer: &PeerId) -> Option<(MediaKind, u64)> {
        self.effects.iter().rev().find_map(|e| match e {
            Effect::AcquireMedia {
                peer: p,
                kind,
                attempt,
                ..
            } if p == peer => Some((*kind, *attempt)),
            _ => None,
        })
    }

    /// Complete the latest media request for `peer` with a fresh stream.
    pub fn grant_media(&mut self, peer: &PeerId) -> StreamProbe {
        let (kind, attempt) = self.media_request(peer).expect("no media request");
        let (stream, probe) = MockStream::new("local-stream", kind == MediaKind::Video);
        self.session.on_media_ready(peer, kind, attempt, Ok(stream));
        self.pump();
        probe
    }

    pub fn deny_media(&mut self, peer: &PeerId) {
        let (kind, attempt) = self.media_request(peer).expect("no media request");
        self.session
            .on_media_ready(peer, kind, attempt, Err(MediaError::PermissionDenied));
        self.pump();
    }

    pub fn remote_stream(&mut self, peer: &PeerId, call: &CallId, video: bool) {
        self.session.handle_transport_event(TransportEvent::CallStream {
            peer: peer.clone(),
            call: call.clone(),
            stream: RemoteStream::new("remote-stream", video),
        });
        self.pump();
    }

    /// The token of the latest arming of `timer`.
    pub fn armed(&self, timer: &TimerKey) -> Option<u64> {
        self.effects.iter().rev().find_map(|e| match e {
            Effect::ArmTimer { timer: t, token, .. } if t == timer => Some(*token),
            _ => None,
        })
    }

    pub fn fire(&mut self, timer: TimerKey, token: u64) {
        self.session.on_timer(timer, token);
        self.pump();
    }
}
