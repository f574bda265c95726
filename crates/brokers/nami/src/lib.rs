//! Nami exchange adapter.
//!
//! Public ticker reads plus HMAC-SHA256 signed order placement against the
//! v4 REST API.

pub mod client;
pub mod signer;

pub use client::NamiClient;
pub use signer::{SignedHeaders, Signer};
