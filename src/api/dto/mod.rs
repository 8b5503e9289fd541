//! Data Transfer Objects for the backend's REST responses.
//!
//! The backend is loosely typed: numbers sometimes arrive as strings and
//! most endpoints wrap their payload in an object with a `success` flag.
//! These types absorb that looseness at the boundary.

pub mod common_dto;
pub mod model_dto;
pub mod trading_dto;

pub use common_dto::*;
pub use model_dto::*;
pub use trading_dto::*;
