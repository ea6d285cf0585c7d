use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::relay::RelayConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay, accepting websocket connections on /chat.
    Server(ServerArgs),
    /// Connect to a relay, reading lines from stdin and printing the chat.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address to bind. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:3030")]
    pub listen: SocketAddr,

    /// Do not echo a member's chat lines back to that member.
    #[arg(long)]
    pub no_echo: bool,
}

impl ServerArgs {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            echo_to_sender: !self.no_echo,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Websocket endpoint of the relay.
    #[arg(long, default_value = "ws://127.0.0.1:3030/chat")]
    pub url: Url,

    /// Pause between reconnect attempts, e.g. "5s" or "500ms".
    #[arg(long, default_value = "5s")]
    pub retry_delay: humantime::Duration,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn client_defaults() {
        let cli = Cli::try_parse_from(["relay-chat", "client"]).unwrap();
        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.url.as_str(), "ws://127.0.0.1:3030/chat");
                assert_eq!(*args.retry_delay, Duration::from_millis(5000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn server_flags() {
        let cli =
            Cli::try_parse_from(["relay-chat", "server", "--listen", "0.0.0.0:0", "--no-echo"])
                .unwrap();
        match cli.command {
            Command::Server(args) => {
                assert_eq!(args.listen.port(), 0);
                assert!(!args.relay_config().echo_to_sender);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_a_bad_retry_delay() {
        assert!(Cli::try_parse_from(["relay-chat", "client", "--retry-delay", "soon"]).is_err());
    }
}
