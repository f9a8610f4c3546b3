//! Gateway: a single-room WebSocket broadcast relay.
//!
//! Lifecycle:
//! 1. Load config, bind the listener
//! 2. Serve `/ping`, `/health` and the `/ws` upgrade endpoint
//! 3. Each socket is registered with the [`room::Room`], which stamps every
//!    join, chat line and departure and fans it out to all live members
//! 4. On SIGINT/SIGTERM close every socket and drain within the grace period

pub mod connection;
pub mod registry;
pub mod room;
pub mod server;
pub mod ws;
