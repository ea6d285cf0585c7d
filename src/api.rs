use std::{convert::Infallible, sync::Arc};

use warp::Filter;

use crate::{relay::Relay, session::user_connected};

/// Path segment the chat socket is negotiated on.
pub const CHAT_PATH: &str = "chat";

fn with_relay(
    relay: Arc<Relay>,
) -> impl warp::Filter<Extract = (Arc<Relay>,), Error = Infallible> + Clone {
    warp::any().map(move || relay.clone())
}

async fn upgrade_connection(
    ws: warp::ws::Ws,
    relay: Arc<Relay>,
) -> Result<impl warp::Reply, Infallible> {
    // This will call our function if the handshake succeeds.
    Ok(ws.on_upgrade(move |socket| user_connected(socket, relay)))
}

// GET /chat -> websocket upgrade
fn ws_upgrade(
    relay: Arc<Relay>,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path(CHAT_PATH)
        .and(warp::path::end())
        // The `ws()` filter will prepare Websocket handshake...
        .and(warp::ws())
        .and(with_relay(relay))
        .and_then(upgrade_connection)
}

pub fn build_filters(
    relay: Arc<Relay>,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    ws_upgrade(relay).with(warp::log("relay_chat::api"))
}
