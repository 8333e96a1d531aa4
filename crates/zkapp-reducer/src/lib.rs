//! zkapp-reducer: batch processing of dispatched actions.
//!
//! Contracts dispatch actions cheaply into their own account updates; the
//! protocol folds each update's action list into the account's action state.
//! This crate drains that unbounded backlog in fixed-size steps:
//!
//! - [`BatchReducer::dispatch`] / [`BatchReducer::dispatch_if`] append to the
//!   calling update's action list,
//! - [`BatchReducer::prepare_batches`] (off-chain) fetches the backlog,
//!   proves its reversal with [`ActionStackProgram`] and cuts it into
//!   batches along whole-list boundaries,
//! - [`BatchReducer::process_batch`] consumes one batch against the on-chain
//!   anchors and calls back once per slot, in dispatch order.
//!
//! Proofs come from any [`zkapp_core::ProvingBackend`]; [`MacBackend`] is a
//! transcript-MAC stand-in.
//!
//! ```
//! use zkapp_core::prelude::*;
//! use zkapp_crypto::Field;
//! use zkapp_reducer::{BatchReducer, ContractAddress, LocalActionLedger, MacBackend, ReducerConfig, ReducerState};
//!
//! let contract = ContractAddress::new(PublicKey(Field::from(7u64)));
//! let reducer = BatchReducer::<u64, MacBackend>::new(ReducerConfig::new(4))?;
//!
//! let mut tx = TransactionContext::new(PublicKey(Field::from(1u64)), 0);
//! let this = tx.push(AccountUpdate::create(contract.public_key, contract.token_id))?;
//! {
//!     let mut ctx = tx.contract(this)?;
//!     reducer.dispatch(&mut ctx, &1)?;
//!     reducer.dispatch(&mut ctx, &2)?;
//! }
//! let mut ledger = LocalActionLedger::new();
//! ledger.apply(&tx.finish()?)?;
//!
//! let mut state = ReducerState::default();
//! let mut seen = Vec::new();
//! for prepared in reducer.prepare_batches(&ledger, &contract)? {
//!     let onchain = zkapp_reducer::ActionSource::account_action_state(&ledger, &contract)?;
//!     reducer.process_batch(&mut state, onchain, &prepared, |a, dummy, _| {
//!         if !dummy {
//!             seen.push(a);
//!         }
//!     })?;
//! }
//! assert_eq!(seen, vec![1, 2]);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

/// Typed action lists and witness fetching.
pub mod actions;
/// Reducer configuration and boundary types.
pub mod api;
/// Reducer errors.
pub mod error;
/// Transcript-MAC mock backend.
pub mod mac;
/// Recursive action-stack program.
pub mod program;
/// Dispatch, batch preparation and the batch step.
pub mod reducer;
/// Action sources and the in-memory ledger.
pub mod source;

pub use crate::actions::{
    action_list, action_list_from_fields, fetch_action_witnesses, hashed_action, ActionList, FetchedActions,
    MerkleActions,
};
pub use crate::api::{ActionStackState, ActionWitness, Actionable, ReducerConfig, ReducerState};
pub use crate::error::ReducerError;
pub use crate::mac::{MacBackend, MacProof};
pub use crate::program::{action_stack_chunk, ActionStackProgram, ActionStackProof, PartialActionStack};
pub use crate::reducer::{ActionBatch, BatchReducer, PreparedBatch};
pub use crate::source::{ActionSource, ContractAddress, LocalActionLedger};
