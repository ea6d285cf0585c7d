use std::{fmt, sync::Arc};

use futures::{SinkExt, Stream, StreamExt, TryFutureExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::{Message, WebSocket};

use crate::{
    registry::{Member, Outbound},
    relay::Relay,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, member not registered yet.
    Connecting,
    /// Registered and reading frames.
    Active,
    /// Read loop finished, tearing down.
    Closing,
    Closed,
}

/// Why a session's read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// Close frame from the peer, with its reason if one was given.
    PeerClosed(Option<String>),
    ReadError(String),
    StreamEnded,
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCause::PeerClosed(Some(reason)) => write!(f, "closed by peer: {}", reason),
            CloseCause::PeerClosed(None) => f.write_str("closed by peer"),
            CloseCause::ReadError(e) => write!(f, "read error: {}", e),
            CloseCause::StreamEnded => f.write_str("stream ended"),
        }
    }
}

/// Drive an upgraded websocket until it closes.
pub async fn user_connected(ws: WebSocket, relay: Arc<Relay>) {
    // Split the socket into a sender and receive of messages.
    let (mut user_ws_tx, user_ws_rx) = ws.split();

    // Use an unbounded channel to handle buffering and flushing of messages
    // to the websocket. The relay writes to it concurrently with this session.
    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            user_ws_tx
                .send(message)
                .unwrap_or_else(|e| {
                    log::debug!("websocket send error: {}", e);
                })
                .await;
        }
    });

    let mut session = Session::new(relay);
    session.run(tx, user_ws_rx).await;
}

/// Per-connection state machine: register, relay frames, tear down.
pub struct Session {
    relay: Arc<Relay>,
    state: SessionState,
}

impl Session {
    pub fn new(relay: Arc<Relay>) -> Session {
        Session {
            relay,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session over `inbound`, writing to the member's `outbound`.
    ///
    /// Returns once the member has been unregistered and its departure
    /// announced.
    pub async fn run<S, E>(&mut self, outbound: Outbound, inbound: S) -> CloseCause
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let member = self.relay.join(outbound).await;
        self.transition(SessionState::Active, &member);

        let cause = self.read_frames(&member, inbound).await;

        self.transition(SessionState::Closing, &member);
        log::info!("{} disconnected: {}", member.name, cause);
        self.relay.leave(&member).await;
        self.transition(SessionState::Closed, &member);

        cause
    }

    async fn read_frames<S, E>(&self, member: &Member, mut inbound: S) -> CloseCause
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        // Every time the member sends a line, relay it to everyone.
        while let Some(result) = inbound.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => return CloseCause::ReadError(e.to_string()),
            };
            if message.is_close() {
                let reason = message
                    .close_frame()
                    .map(|(_, reason)| reason.to_owned())
                    .filter(|reason| !reason.is_empty());
                return CloseCause::PeerClosed(reason);
            }
            // Skip any non-Text messages...
            match message.to_str() {
                Ok(text) => {
                    self.relay.broadcast_from(member, text).await;
                }
                Err(()) => log::trace!("{}: ignoring non-text frame", member.name),
            }
        }
        CloseCause::StreamEnded
    }

    fn transition(&mut self, next: SessionState, member: &Member) {
        log::debug!("{} ({}): {:?} -> {:?}", member.name, member.id, self.state, next);
        self.state = next;
    }
}
