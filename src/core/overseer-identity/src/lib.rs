//! # Overseer Identity
//!
//! Identity model shared by every Overseer crate.
//!
//! ## Contents
//!
//! - [`Principal`] - an account as known to the identity provider
//! - [`UserMetadata`] / [`MetadataPatch`] - the metadata bag admin actions edit
//! - [`Session`] - a live authentication context owned by the provider
//! - [`AdminPolicy`] - the admin resolver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod metadata;
pub mod principal;
pub mod session;

pub use admin::{resolve_admin, AdminPolicy};
pub use metadata::{AppMetadata, IdentityProvider, MetadataPatch, UserMetadata, ROLE_ADMIN, ROLE_USER};
pub use principal::Principal;
pub use session::Session;
