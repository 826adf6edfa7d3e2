//! Core library for the mooring volume attachment reconciler.
//!
//! A volume attachment binds a block-storage volume to a compute instance
//! under a device name. The control plane applies attach and detach commands
//! asynchronously, so the crate pairs every command with a bounded wait until
//! the observed state converges:
//!
//! - [`identity`] derives the stable `vai-<crc32>` token for an attachment.
//! - [`wait`] is the single poll-until-state loop.
//! - [`probe`] turns control-plane queries into attachment and instance states.
//! - [`reconciler`] drives create, read, and delete on top of them.
//! - [`scaleway`] talks to the real control plane through [`cloud::CloudApi`].
//! - [`ledger`] records the identities handed back to the caller.

pub mod cloud;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod probe;
pub mod reconciler;
pub mod request;
pub mod scaleway;
#[cfg(test)]
mod test_helpers;
pub mod test_support;
pub mod wait;

pub use cloud::{ApiError, CloudApi};
pub use config::{ConfigError, ReconcileConfig, ScalewayConfig};
pub use identity::{AttachmentIdentity, IdentityError};
pub use ledger::{AttachmentLedger, LedgerError, StateStore};
pub use reconciler::{AttachmentReconciler, Command, Phase, ReconcileError, ReconcilePolicy};
pub use request::{AttachmentRequest, AttachmentRequestBuilder, RequestError};
pub use scaleway::ScalewayClient;
pub use wait::{Backoff, WaitError, WaitSpec};
