use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures seen by the client side of a chat connection.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The transport could not be established.
    #[error("unable to connect: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// The transport went away underneath a send or receive.
    #[error("transport closed")]
    Closed,
}

/// Errors surfaced by the `relay-chat` binary.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(#[from] warp::Error),
}
