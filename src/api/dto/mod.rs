//! Data Transfer Objects for REST request/response serialization.
//!
//! All amounts are integer kobo.

pub mod auth_dto;
pub mod checkout_dto;
pub mod common_dto;
pub mod event_dto;
pub mod payout_dto;
pub mod user_dto;

pub use auth_dto::*;
pub use checkout_dto::*;
pub use common_dto::*;
pub use event_dto::*;
pub use payout_dto::*;
pub use user_dto::*;
