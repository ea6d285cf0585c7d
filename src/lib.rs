// A websocket chat relay.
//
// Every member connects to `/chat`, is named `user1`, `user2`, ... in connect
// order, and every text line any member sends is fanned out to all members,
// the sender included:
//
// - `[server] Member joined: <name>.` when a member connects
// - `[<name>] <text>` for each line
// - `[server] Member left: <name>.` when a member goes away
//
// The client side keeps a single connection alive, retrying after a fixed
// delay whenever it drops.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod relay;
pub mod session;

pub use registry::{Member, Registry, SessionId};
pub use relay::{Relay, RelayConfig};
