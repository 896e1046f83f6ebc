//! Engine task with tokio mpsc command/notification channels.
//!
//! The [`Session`] runs inside a dedicated tokio task. Callers talk to it
//! through an [`EngineHandle`]; the transport adapter pushes its events
//! through the same handle. After every input the task drains the
//! session's effects: timers become sleeping tasks, media requests become
//! spawned acquisitions, and events go out on the notification channel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use peerpulse_media::{CallStatus, MediaDevices, MediaError};
use peerpulse_net::TransportEvent;
use peerpulse_shared::media::LocalStream;
use peerpulse_shared::types::{LinkId, MediaKind, PeerId};
use peerpulse_store::Message;

use crate::error::EngineError;
use crate::events::{Effect, EngineEvent, TimerKey};
use crate::state::{PeerSummary, Session};

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

/// Commands sent *into* the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    Open {
        peer: PeerId,
        name_hint: Option<String>,
        reply: Reply<LinkId>,
    },
    OpenJoinLink {
        input: String,
        reply: Reply<LinkId>,
    },
    SendMessage {
        peer: PeerId,
        content: String,
        reply: Reply<Message>,
    },
    NotifyTyping {
        peer: PeerId,
        reply: Reply<()>,
    },
    SetActiveChat(Option<PeerId>),
    StartCall {
        peer: PeerId,
        kind: MediaKind,
        reply: Reply<()>,
    },
    AcceptCall {
        peer: PeerId,
        kind: MediaKind,
        reply: Reply<()>,
    },
    RejectCall {
        peer: PeerId,
        kind: MediaKind,
        reply: Reply<()>,
    },
    EndCall {
        peer: PeerId,
        kind: MediaKind,
        reply: Reply<()>,
    },
    SetMuted {
        peer: PeerId,
        kind: MediaKind,
        muted: bool,
        reply: Reply<()>,
    },
    SetVideoEnabled {
        peer: PeerId,
        enabled: bool,
        reply: Reply<()>,
    },
    GetHistory {
        peer: PeerId,
        reply: oneshot::Sender<Vec<Message>>,
    },
    GetPeers(oneshot::Sender<Vec<PeerSummary>>),
    GetCallStatus {
        peer: PeerId,
        kind: MediaKind,
        reply: oneshot::Sender<CallStatus>,
    },
    /// Gracefully shut down the engine.
    Shutdown,
}

/// Completions of work the engine spawned for itself.
enum Internal {
    TimerFired {
        timer: TimerKey,
        token: u64,
    },
    MediaReady {
        peer: PeerId,
        kind: MediaKind,
        attempt: u64,
        result: Result<Box<dyn LocalStream>, MediaError>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    transport_tx: mpsc::Sender<TransportEvent>,
}

impl EngineHandle {
    /// Forward one transport event to the engine.
    pub async fn deliver(&self, event: TransportEvent) -> Result<(), EngineError> {
        self.transport_tx
            .send(event)
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    pub async fn open(&self, peer: PeerId, name_hint: Option<String>) -> Result<LinkId, EngineError> {
        self.request(|reply| EngineCommand::Open {
            peer,
            name_hint,
            reply,
        })
        .await
    }

    pub async fn open_join_link(&self, input: impl Into<String>) -> Result<LinkId, EngineError> {
        let input = input.into();
        self.request(|reply| EngineCommand::OpenJoinLink { input, reply })
            .await
    }

    pub async fn send_message(&self, peer: PeerId, content: impl Into<String>) -> Result<Message, EngineError> {
        let content = content.into();
        self.request(|reply| EngineCommand::SendMessage {
            peer,
            content,
            reply,
        })
        .await
    }

    pub async fn notify_typing(&self, peer: PeerId) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::NotifyTyping { peer, reply })
            .await
    }

    pub async fn set_active_chat(&self, peer: Option<PeerId>) -> Result<(), EngineError> {
        self.cmd_tx
            .send(EngineCommand::SetActiveChat(peer))
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    pub async fn start_call(&self, peer: PeerId, kind: MediaKind) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::StartCall { peer, kind, reply })
            .await
    }

    pub async fn accept_call(&self, peer: PeerId, kind: MediaKind) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::AcceptCall { peer, kind, reply })
            .await
    }

    pub async fn reject_call(&self, peer: PeerId, kind: MediaKind) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::RejectCall { peer, kind, reply })
            .await
    }

    pub async fn end_call(&self, peer: PeerId, kind: MediaKind) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::EndCall { peer, kind, reply })
            .await
    }

    pub async fn set_muted(&self, peer: PeerId, kind: MediaKind, muted: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetMuted {
            peer,
            kind,
            muted,
            reply,
        })
        .await
    }

    pub async fn set_video_enabled(&self, peer: PeerId, enabled: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetVideoEnabled {
            peer,
            enabled,
            reply,
        })
        .await
    }

    pub async fn history(&self, peer: PeerId) -> Result<Vec<Message>, EngineError> {
        self.query(|reply| EngineCommand::GetHistory { peer, reply })
            .await
    }

    pub async fn peers(&self) -> Result<Vec<PeerSummary>, EngineError> {
        self.query(EngineCommand::GetPeers).await
    }

    pub async fn call_status(&self, peer: PeerId, kind: MediaKind) -> Result<CallStatus, EngineError> {
        self.query(|reply| EngineCommand::GetCallStatus { peer, kind, reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.cmd_tx
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EngineCommand) -> Result<T, EngineError> {
        self.query(build).await?
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::Shutdown)?;
        reply_rx.await.map_err(|_| EngineError::Shutdown)
    }
}

// ---------------------------------------------------------------------------
// Engine task
// ---------------------------------------------------------------------------

/// Spawn the engine task for `session`.
///
/// # Returns
///
/// `(handle, notification_rx)`
pub fn spawn_engine(
    session: Session,
    media: Arc<dyn MediaDevices>,
) -> (EngineHandle, mpsc::Receiver<EngineEvent>) {
    let buffer = session.config().event_buffer;
    let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>(buffer);
    let (transport_tx, transport_rx) = mpsc::channel::<TransportEvent>(buffer);
    let (internal_tx, internal_rx) = mpsc::channel::<Internal>(buffer);
    let (notif_tx, notif_rx) = mpsc::channel::<EngineEvent>(buffer);

    let engine = Engine {
        session,
        media,
        timers: HashMap::new(),
        internal_tx,
        notif_tx,
    };
    tokio::spawn(engine.run(cmd_rx, transport_rx, internal_rx));

    (
        EngineHandle {
            cmd_tx,
            transport_tx,
        },
        notif_rx,
    )
}

struct Engine {
    session: Session,
    media: Arc<dyn MediaDevices>,
    timers: HashMap<TimerKey, (u64, JoinHandle<()>)>,
    internal_tx: mpsc::Sender<Internal>,
    notif_tx: mpsc::Sender<EngineEvent>,
}

impl Engine {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<EngineCommand>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut internal_rx: mpsc::Receiver<Internal>,
    ) {
        info!(peer = %self.session.identity().peer_id().short(), "Engine started");

        loop {
            tokio::select! {
                // --- Incoming commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Shutdown) => {
                            info!("Engine shutdown requested");
                            break;
                        }
                        Some(cmd) => self.dispatch(cmd),
                        None => {
                            info!("Command channel closed, shutting down engine");
                            break;
                        }
                    }
                }

                // --- Transport events ---
                Some(event) = transport_rx.recv() => {
                    self.session.handle_transport_event(event);
                }

                // --- Timers and media completions ---
                Some(internal) = internal_rx.recv() => {
                    match internal {
                        Internal::TimerFired { timer, token } => {
                            if self.timers.get(&timer).is_some_and(|(armed, _)| *armed == token) {
                                self.timers.remove(&timer);
                            }
                            self.session.on_timer(timer, token);
                        }
                        Internal::MediaReady { peer, kind, attempt, result } => {
                            self.session.on_media_ready(&peer, kind, attempt, result);
                        }
                    }
                }
            }

            self.apply_effects().await;
        }

        for (_, (_, handle)) in self.timers.drain() {
            handle.abort();
        }
        info!("Engine stopped");
    }

    fn dispatch(&mut self, cmd: EngineCommand) {
        let session = &mut self.session;
        match cmd {
            EngineCommand::Open {
                peer,
                name_hint,
                reply,
            } => {
                let _ = reply.send(session.open(&peer, name_hint));
            }
            EngineCommand::OpenJoinLink { input, reply } => {
                let _ = reply.send(session.open_join_link(&input));
            }
            EngineCommand::SendMessage {
                peer,
                content,
                reply,
            } => {
                let _ = reply.send(session.send_message(&peer, &content));
            }
            EngineCommand::NotifyTyping { peer, reply } => {
                let _ = reply.send(session.notify_typing(&peer));
            }
            EngineCommand::SetActiveChat(peer) => session.set_active_chat(peer),
            EngineCommand::StartCall { peer, kind, reply } => {
                let _ = reply.send(session.start_call(&peer, kind));
            }
            EngineCommand::AcceptCall { peer, kind, reply } => {
                let _ = reply.send(session.accept_call(&peer, kind));
            }
            EngineCommand::RejectCall { peer, kind, reply } => {
                let _ = reply.send(session.reject_call(&peer, kind));
            }
            EngineCommand::EndCall { peer, kind, reply } => {
                let _ = reply.send(session.end_call(&peer, kind));
            }
            EngineCommand::SetMuted {
                peer,
                kind,
                muted,
                reply,
            } => {
                let _ = reply.send(session.set_muted(&peer, kind, muted));
            }
            EngineCommand::SetVideoEnabled {
                peer,
                enabled,
                reply,
            } => {
                let _ = reply.send(session.set_video_enabled(&peer, enabled));
            }
            EngineCommand::GetHistory { peer, reply } => {
                let _ = reply.send(session.history(&peer).to_vec());
            }
            EngineCommand::GetPeers(reply) => {
                let _ = reply.send(session.peers());
            }
            EngineCommand::GetCallStatus { peer, kind, reply } => {
                let _ = reply.send(session.call_status(&peer, kind));
            }
            EngineCommand::Shutdown => {}
        }
    }

    async fn apply_effects(&mut self) {
        for effect in self.session.drain_effects() {
            match effect {
                Effect::Emit(event) => {
                    if self.notif_tx.send(event).await.is_err() {
                        debug!("Notification receiver dropped");
                    }
                }
                Effect::ArmTimer {
                    timer,
                    token,
                    after,
                } => {
                    let tx = self.internal_tx.clone();
                    let fired = timer.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = tx
                            .send(Internal::TimerFired {
                                timer: fired,
                                token,
                            })
                            .await;
                    });
                    if let Some((_, previous)) = self.timers.insert(timer, (token, handle)) {
                        previous.abort();
                    }
                }
                Effect::CancelTimer(timer) => {
                    if let Some((_, handle)) = self.timers.remove(&timer) {
                        handle.abort();
                    }
                }
                Effect::AcquireMedia {
                    peer,
                    kind,
                    attempt,
                    constraints,
                } => {
                    debug!(peer = %peer.short(), %kind, attempt, "Acquiring local media");
                    let acquire = self.media.acquire(&constraints);
                    let tx = self.internal_tx.clone();
                    tokio::spawn(async move {
                        let result = acquire.await;
                        let ready = Internal::MediaReady {
                            peer,
                            kind,
                            attempt,
                            result,
                        };
                        if let Err(mpsc::error::SendError(Internal::MediaReady {
                            result: Ok(mut stream),
                            ..
                        })) = tx.send(ready).await
                        {
                            warn!("Engine gone before media arrived, releasing stream");
                            stream.stop();
                        }
                    });
                }
            }
        }
    }
}
