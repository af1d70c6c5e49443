//! pairwire-core: Shared protocol library for the pairwire matchmaking relay.
//!
//! Provides the JSON message types exchanged with clients, participant ids,
//! the error type, and the credential service seam.

pub mod accounts;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use accounts::{CredentialService, InMemoryCredentials};
pub use error::{PairwireError, PairwireResult};
pub use messages::{
    ClientMessage, ParticipantId, ServerMessage, SignalKind, DEFAULT_NICKNAME, WAITING_TEXT,
};
