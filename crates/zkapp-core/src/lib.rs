//! zkapp-core: account updates and the authenticated call graph.
//!
//! This crate defines the **stable boundary** used across zkApp crates:
//! - account updates, their per-update event/action lists, and deferred
//!   (lazy) authorization,
//! - the hash-committed call forest (`AccountUpdateForest`/`AccountUpdateTree`),
//! - the mutable staging layer (`UnfinishedTree`/`UnfinishedForest`) and its
//!   arena owner `AccountUpdateLayout`,
//! - explicit transaction and contract-call contexts, and
//! - the **backend-agnostic** proving interface.
//!
//! ```
//! use zkapp_core::prelude::*;
//! use zkapp_crypto::Field;
//!
//! let mut tx = TransactionContext::new(PublicKey(Field::from(1u64)), 0);
//! let parent = tx.push(AccountUpdate::create(PublicKey(Field::from(2u64)), TokenId::DEFAULT))?;
//! {
//!     let mut call = tx.contract(parent)?;
//!     call.call(AccountUpdate::create(PublicKey(Field::from(3u64)), TokenId::DEFAULT))?;
//! }
//! let tx = tx.finish()?;
//! assert_eq!(tx.account_updates.len(), 2);
//! assert_eq!(tx.account_updates[1].body.call_depth, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Account update data model.
pub mod account_update;
/// Deferred authorization tokens and the authorizer pass.
pub mod authorization;
/// Minimal stateless proving interface.
pub mod backend;
/// Transaction and contract-call contexts.
pub mod context;
/// Crate error types.
pub mod error;
/// Per-update event and action lists, and the account action state.
pub mod events;
/// Hash-committed call forest.
pub mod forest;
/// Arena owner of the mutable call graph.
pub mod layout;
/// Mutable staging nodes.
pub mod unfinished;

// ---- Re-exports for workspace compatibility ----
pub use account_update::*;
pub use authorization::*;
pub use backend::*;
pub use context::*;
pub use error::*;
pub use events::*;
pub use forest::*;
pub use layout::*;
pub use unfinished::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use zkapp_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        account_update::{AccountUpdate, AccountUpdateId, PublicKey, TokenId},
        context::{SmartContractContext, Transaction, TransactionContext},
        error::ForestError,
        forest::{AccountUpdateForest, AccountUpdateTree},
        layout::AccountUpdateLayout,
    };
}
