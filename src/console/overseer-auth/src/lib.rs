//! # Overseer Auth
//!
//! Session state for the Overseer console.
//!
//! [`SessionStore`] mirrors the identity provider's current session into an
//! immutable [`SessionSnapshot`] and keeps it current from the provider's
//! change events. Consumers read the latest snapshot or await changes on a
//! `tokio::sync::watch` receiver.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::AuthError;
pub use snapshot::SessionSnapshot;
pub use store::{SessionStore, SignInOutcome};
