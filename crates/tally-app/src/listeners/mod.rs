//! Event listeners subscribed to the [`crate::bus::EventBus`].

pub mod loyalty;

pub use loyalty::{BestEffortAccrual, PosOrderPlacedLoyaltyListener};
