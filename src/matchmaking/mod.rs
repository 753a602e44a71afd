//! Lobby pairing and the arena service that runs matches

pub mod queue;
pub mod service;

pub use service::{
    ArenaError, ArenaService, ArenaSettings, Collaborators, MoveReceipt, MoveSubmission,
    Registration, RegistrationStatus,
};
