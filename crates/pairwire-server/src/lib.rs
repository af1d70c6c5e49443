//! pairwire-server: matchmaking relay for one-to-one WebRTC signaling.
//!
//! Clients connect over WebSocket, ask to be paired with a stranger, and once
//! matched exchange `offer` / `answer` / `ice` frames that the server relays
//! verbatim to the partner.
//!
//! All matchmaking state lives in a [`MatchmakingEngine`] owned by a single
//! hub task; connection tasks only feed it events.

#![forbid(unsafe_code)]

pub mod config;
pub mod hub;
pub mod matchmaking;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use hub::{HubEvent, HubHandle};
pub use matchmaking::MatchmakingEngine;
pub use server::PairwireServer;
pub use transport::PeerHandle;
