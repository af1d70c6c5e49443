//! Matchmaking: participant registry, waiting queue, and pairing engine.

pub mod engine;
pub mod queue;
pub mod registry;

pub use engine::{EngineStats, MatchmakingEngine};
pub use queue::WaitingQueue;
pub use registry::{PairingState, Participant, ParticipantRegistry};
