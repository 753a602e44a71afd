//! Entry payments and prize settlement

pub mod gate;
pub mod payout;

pub use gate::{EntryGate, GateError, OpenGate, PlayerClaim, ReceiptGate};
pub use payout::{
    payout_with_retry, prize_for, DryRunSettlement, FacilitatorSettlement, RetryPolicy,
    Settlement,
};
