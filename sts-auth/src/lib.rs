//! Secret-free mutual authentication through AWS STS.
//!
//! A client signs an STS `GetCallerIdentity` request with temporary credentials
//! and ships the signature in its request headers. The server replays that
//! request against STS and lets the caller through only if the ARN STS reports
//! is on its allow-list.

pub mod client;
pub mod commands;
pub mod common;
pub mod server;

#[cfg(test)]
mod testutil;

pub use client::RequestSigner;
pub use common::{AllowList, CallerIdentity, ErrorKind, SignedAssertion, StsError, StsResult};
pub use server::{AuthenticationLayer, AuthenticationMiddleware};
