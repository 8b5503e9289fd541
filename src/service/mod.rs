//! Service layer: view lifecycle on top of the shared client.
//!
//! A [`ViewBinding`] ties one screen's lifetime to its subscriptions, its
//! connectivity listener, and its polling backstop.

pub mod status_source;
pub mod view_binding;

pub use status_source::StatusSource;
pub use view_binding::{ReceivedEvent, ViewBinding, ViewSpec, ViewState};
