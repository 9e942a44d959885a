//! # Use Cases
//!
//! One struct per operation, each with an async `execute`.
//!
//! | Use case                       | Transaction | Events                          |
//! |--------------------------------|-------------|---------------------------------|
//! | [`PlaceOrderUseCase`]          | yes         | DiscountCodeApplied?, SplitPaymentProcessed?, PosOrderPlaced |
//! | [`CreatePosDiscountUseCase`]   | yes         | -                               |
//! | [`CreateLoyaltyProgramUseCase`]| yes         | LoyaltyProgramCreated           |
//! | [`AccrueLoyaltyPointsUseCase`] | yes         | LoyaltyPointsAccrued            |
//! | [`RedeemLoyaltyPointsUseCase`] | yes         | LoyaltyPointsRedeemed           |
//!
//! Events are dispatched only after the transaction commits.

pub mod accrue_points;
pub mod create_discount;
pub mod create_loyalty_program;
pub mod discount_applicator;
pub mod place_order;
pub mod redeem_points;

pub use accrue_points::AccrueLoyaltyPointsUseCase;
pub use create_discount::CreatePosDiscountUseCase;
pub use create_loyalty_program::CreateLoyaltyProgramUseCase;
pub use discount_applicator::DiscountCodeApplicator;
pub use place_order::{PlaceOrderInput, PlaceOrderOutput, PlaceOrderUseCase};
pub use redeem_points::{RedeemLoyaltyPointsUseCase, RedeemPointsInput, RedeemPointsOutput};
