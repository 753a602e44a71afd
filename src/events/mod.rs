//! Arena notifications

pub mod bus;
pub mod protocol;

pub use bus::EventBus;
pub use protocol::{ArenaEvent, PayoutStatus};
