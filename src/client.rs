//! Client side of the chat: one logical connection kept alive across
//! transient failures.
//!
//! [`Reconnector::run`] loops forever: connect, forward every received line to
//! a [`DisplaySink`], report the disconnect, wait a fixed delay, try again.
//! [`Reconnector::send`] queues on whatever transport is current and is a
//! no-op while disconnected. Each connection gets its own writer task, so a
//! stalled write never holds up the receive loop.

use std::{pin::Pin, time::Duration};

use futures::{
    future::{self, BoxFuture},
    stream::BoxStream,
    FutureExt, Sink, SinkExt, StreamExt, TryFutureExt,
};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use url::Url;

use crate::error::ClientError;

/// Fixed pause between reconnect attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Notice shown when a connect attempt fails.
pub const CONNECT_FAILED_NOTICE: &str = "Unable to connect.";

const DEFAULT_CLOSE_CAUSE: &str = "Connection closed";

/// An inbound frame, reduced to what the client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Remote close, with the peer's reason if it sent one.
    Close(Option<String>),
    /// Binary and control frames.
    Other,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Frame {
        match message {
            Message::Text(text) => Frame::Text(text),
            Message::Close(frame) => Frame::Close(
                frame
                    .map(|frame| frame.reason.into_owned())
                    .filter(|reason| !reason.is_empty()),
            ),
            _ => Frame::Other,
        }
    }
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
pub type FrameStream = BoxStream<'static, Result<Frame, ClientError>>;

/// Opens transports. The two halves are independent so writes can happen
/// while the receive loop is parked on the stream.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<(FrameSink, FrameStream), ClientError>>;
}

/// [`Connector`] over a real websocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> WsConnector {
        WsConnector { url }
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'_, Result<(FrameSink, FrameStream), ClientError>> {
        async move {
            let (ws, response) = connect_async(self.url.as_str())
                .await
                .map_err(ClientError::Connect)?;
            log::info!("connected to {} (status {})", self.url, response.status());

            let (sink, stream) = ws.split();
            let sink = sink
                .with(|text: String| future::ok::<_, tungstenite::Error>(Message::Text(text)))
                .sink_map_err(ClientError::from);
            let stream = stream.map(|result| match result {
                Ok(message) => Ok(Frame::from(message)),
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => Ok(Frame::Close(None)),
                Err(e) => Err(ClientError::from(e)),
            });

            let sink: FrameSink = Box::pin(sink);
            Ok((sink, stream.boxed()))
        }
        .boxed()
    }
}

/// Where received lines and connection notices go.
pub trait DisplaySink: Send + Sync {
    fn show(&self, line: &str);
}

impl DisplaySink for mpsc::UnboundedSender<String> {
    fn show(&self, line: &str) {
        if self.send(line.to_owned()).is_err() {
            log::debug!("display closed, dropping line");
        }
    }
}

/// Prints one line per display unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn show(&self, line: &str) {
        println!("{}", line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// How one connect-and-receive round ended.
#[derive(Debug)]
pub enum Outcome {
    ConnectFailed(ClientError),
    RemoteClosed(Option<String>),
    FrameError(String),
}

impl Outcome {
    /// The line shown to the user for this outcome.
    pub fn notice(&self) -> String {
        match self {
            Outcome::ConnectFailed(_) => CONNECT_FAILED_NOTICE.to_owned(),
            Outcome::RemoteClosed(reason) => format!(
                "Disconnected. {}.",
                reason.as_deref().unwrap_or(DEFAULT_CLOSE_CAUSE)
            ),
            Outcome::FrameError(reason) => format!("Disconnected. {}.", reason),
        }
    }
}

pub struct Reconnector<C, D> {
    connector: C,
    display: D,
    retry_delay: Duration,
    /// Held for a whole connection lifetime; one attempt in flight at a time.
    attempt: Mutex<()>,
    /// Queue feeding the current connection's writer task.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    state: watch::Sender<ConnectionState>,
}

impl<C, D> Reconnector<C, D>
where
    C: Connector,
    D: DisplaySink,
{
    pub fn new(connector: C, display: D) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Reconnector {
            connector,
            display,
            retry_delay: RETRY_DELAY,
            attempt: Mutex::new(()),
            outbound: Mutex::new(None),
            state,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Keep a connection up until the owning task is cancelled.
    pub async fn run(&self) {
        loop {
            let outcome = self.connect_and_receive().await;
            match &outcome {
                Outcome::ConnectFailed(e) => log::warn!("{}", e),
                Outcome::RemoteClosed(_) => log::info!("connection closed by server"),
                Outcome::FrameError(e) => log::warn!("connection failed: {}", e),
            }
            self.display.show(&outcome.notice());
            self.state.send_replace(ConnectionState::Disconnected);

            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// One connection lifetime: connect, then display lines until it ends.
    ///
    /// Concurrent callers wait their turn rather than opening a second
    /// transport.
    pub async fn connect_and_receive(&self) -> Outcome {
        let _attempt = self.attempt.lock().await;
        self.state.send_replace(ConnectionState::Connecting);
        let (sink, mut stream) = match self.connector.connect().await {
            Ok(halves) => halves,
            Err(e) => return Outcome::ConnectFailed(e),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(
            UnboundedReceiverStream::new(rx)
                .map(Ok::<_, ClientError>)
                .forward(sink)
                // The receive loop sees the dead transport and reconnects.
                .unwrap_or_else(|e| log::warn!("failed to send: {}", e)),
        );
        *self.outbound.lock().await = Some(tx);
        self.state.send_replace(ConnectionState::Connected);

        let outcome = loop {
            match stream.next().await {
                Some(Ok(Frame::Text(text))) => self.display.show(&text),
                Some(Ok(Frame::Other)) => {}
                Some(Ok(Frame::Close(reason))) => break Outcome::RemoteClosed(reason),
                Some(Err(e)) => break Outcome::FrameError(e.to_string()),
                None => break Outcome::RemoteClosed(None),
            }
        };

        self.outbound.lock().await.take();
        writer.abort();
        outcome
    }

    /// Queue the contents of `input` on the current connection and clear it.
    ///
    /// Empty input, or no live transport, leaves everything untouched. The
    /// write itself happens on the connection's writer task.
    pub async fn send(&self, input: &mut String) {
        if input.is_empty() {
            return;
        }
        let outbound = self.outbound.lock().await;
        let tx = match outbound.as_ref() {
            Some(tx) => tx,
            None => {
                log::debug!("not connected, keeping input");
                return;
            }
        };
        match tx.send(input.clone()) {
            Ok(()) => input.clear(),
            Err(_closed) => log::debug!("writer gone, keeping input"),
        }
    }
}
