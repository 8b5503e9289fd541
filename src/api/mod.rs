//! REST layer: the backend's JSON endpoints and their DTOs.
//!
//! The push channel is the fast path for dashboard data; these endpoints
//! are the correctness backstop and the command surface (start, stop,
//! analyze, model selection).

pub mod client;
pub mod dto;

pub use client::RestClient;
