//! Core of meo: chunk-addressed rewriting of markdown documents.
//!
//! A document is marked up into non-overlapping chunks ([`project`]), each
//! editable chunk becomes a self-contained task artifact ([`protocol`]), an
//! external agent fills in a reply ([`agent`], [`processing`]), and accepted
//! replies are patched into a git-tracked working copy ([`patch`],
//! [`ledger`]) where they can be reviewed chunk by chunk. [`lifecycle`] ties
//! it together as a state machine driven by user intents.

pub mod agent;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod patch;
pub mod presets;
pub mod processing;
pub mod project;
pub mod protocol;
pub mod session;
pub mod sidecar;
pub mod types;
