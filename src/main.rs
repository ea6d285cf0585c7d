use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use relay_chat::{
    api,
    client::{Reconnector, StdoutSink, WsConnector},
    config::{ClientArgs, Cli, Command, ServerArgs},
    error::ChatError,
    Registry, Relay,
};

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    pretty_env_logger::init();

    match Cli::parse().command {
        Command::Server(args) => serve(args).await,
        Command::Client(args) => chat(args).await,
    }
}

async fn serve(args: ServerArgs) -> Result<(), ChatError> {
    // Keep track of all connected members
    let relay = Arc::new(Relay::new(Arc::new(Registry::new()), args.relay_config()));
    let routes = api::build_filters(relay);

    let (addr, server) = warp::serve(routes).try_bind_ephemeral(args.listen)?;
    log::info!("relay listening on ws://{}/{}", addr, api::CHAT_PATH);
    server.await;
    Ok(())
}

async fn chat(args: ClientArgs) -> Result<(), ChatError> {
    let reconnector = Arc::new(
        Reconnector::new(WsConnector::new(args.url), StdoutSink)
            .with_retry_delay(*args.retry_delay),
    );
    let receiver = tokio::spawn({
        let reconnector = reconnector.clone();
        async move { reconnector.run().await }
    });

    // Each stdin line is one submission; stop at EOF.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(mut line) = lines.next_line().await? {
        reconnector.send(&mut line).await;
    }

    receiver.abort();
    Ok(())
}
