//! # Overseer Provider
//!
//! Abstraction over the external identity provider.
//!
//! The provider owns authentication, sessions and the user directory.
//! Overseer consumes it through two traits:
//!
//! - [`SessionProvider`] - session lookup, sign-in/up/out, change events
//! - [`AdminApi`] - the admin-privileged user directory

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod events;

pub use backend::{AdminApi, SessionProvider, SignUp};
pub use error::ProviderError;
pub use events::{ListenerRegistry, SessionEvent, SessionEventKind, SessionListener, Subscription};
