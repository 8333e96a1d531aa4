// crates/zkapp-reducer/src/reducer.rs

//! Batch reducer: dispatch, off-chain batch preparation and the bounded
//! on-chain batch step.
//!
//! Dispatch appends to the calling update's own action list. Preparation
//! fetches the backlog since the last processed state, proves its reversal
//! into a stack (all but the oldest lists; the batch step reverses those
//! itself) and cuts the stack into batches along whole-list boundaries.
//! Each batch step trusts either that proof (first batch) or the stack
//! commitment the previous step left on chain, pops its lists and hands
//! exactly `batch_size` slots to the caller.

use std::marker::PhantomData;

use anyhow::ensure;
use tracing::{debug, info};
use zkapp_core::{empty_action_state, hash_event, update_sequence_state, ProvingBackend, SmartContractContext};
use zkapp_crypto::Field;
use zkapp_merkle::{HashedValue, MerkleError, MerkleList};

use crate::actions::{fetch_action_witnesses, FetchedActions, MerkleActions};
use crate::api::{ActionStackState, ActionWitness, Actionable, ReducerConfig, ReducerState};
use crate::error::{ensure_eq, ReducerError};
use crate::program::{action_stack_chunk, ActionStackProgram, ActionStackProof};
use crate::source::{ActionSource, ContractAddress};

/// Off-chain hint for one batch step.
#[derive(Clone, Debug)]
pub struct ActionBatch<A> {
    /// Trust the stack commitment left on chain instead of the proof.
    pub use_onchain_stack: bool,
    /// Reducer action state this batch starts from.
    pub processed_action_state: Field,
    /// Account action state the proof was built against.
    pub onchain_action_state: Field,
    /// Reducer stack commitment expected on chain (when trusted).
    pub onchain_stack: Field,
    /// Witness of the remaining stack; pops oldest list first.
    pub stack: MerkleActions<A>,
    /// Whether the proof covers any lists.
    pub is_recursive: bool,
    /// Oldest lists, reversed inside the batch step.
    pub witnesses: Vec<ActionWitness>,
}

/// A batch hint together with the proof it may need.
#[derive(Clone, Debug)]
pub struct PreparedBatch<A, P> {
    /// Action-stack proof shared by every batch of one preparation.
    pub proof: ActionStackProof<P>,
    /// The batch itself.
    pub batch: ActionBatch<A>,
}

/// Drains a contract's actions in fixed-size batches.
#[derive(Debug)]
pub struct BatchReducer<A, B> {
    config: ReducerConfig,
    program: ActionStackProgram<B>,
    _action: PhantomData<fn() -> A>,
}

impl<A, B> BatchReducer<A, B>
where
    A: Actionable,
    B: ProvingBackend,
{
    /// Reducer with a validated configuration.
    pub fn new(config: ReducerConfig) -> Result<Self, ReducerError> {
        config.validate()?;
        Ok(Self {
            program: ActionStackProgram::new(config.max_updates_per_proof)?,
            config,
            _action: PhantomData,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// The action-stack program used for preparation.
    #[must_use]
    pub const fn program(&self) -> &ActionStackProgram<B> {
        &self.program
    }

    /// Initial value of the reducer's action-state anchor.
    #[must_use]
    pub fn initial_action_state() -> Field {
        empty_action_state()
    }

    /// Initial value of the reducer's action-stack anchor.
    #[must_use]
    pub fn initial_action_stack() -> Field {
        empty_action_state()
    }

    /// Append `action` to the calling update's action list.
    pub fn dispatch(&self, ctx: &mut SmartContractContext<'_>, action: &A) -> Result<(), ReducerError> {
        self.dispatch_if(ctx, true, action)
    }

    /// Append `action` iff `cond`; the list is untouched otherwise.
    pub fn dispatch_if(
        &self,
        ctx: &mut SmartContractContext<'_>,
        cond: bool,
        action: &A,
    ) -> Result<(), ReducerError> {
        let update = ctx.self_update_mut()?;
        update.body.actions.push_if(cond, action.to_fields());
        debug!(update = %update.id, cond, "dispatched action");
        Ok(())
    }

    /// Fetch the backlog and cut it into batches that drain it completely.
    ///
    /// Returns no batches when nothing is pending.
    pub fn prepare_batches<S>(
        &self,
        source: &S,
        contract: &ContractAddress,
    ) -> anyhow::Result<Vec<PreparedBatch<A, B::Proof>>>
    where
        S: ActionSource + ?Sized,
    {
        let cfg = &self.config;
        let reducer = source.reducer_state(contract)?;
        let account_state = source.account_action_state(contract)?;
        let FetchedActions {
            end_action_state: end,
            witnesses,
            actions,
        } = fetch_action_witnesses::<A, S>(source, contract, reducer.action_state)?;
        ensure!(
            end == account_state,
            "fetched actions end at {end}, but the account action state is {account_state}"
        );
        if witnesses.is_empty() {
            info!(%contract, "no pending actions");
            return Ok(Vec::new());
        }
        if let Some(list) = actions.iter().find(|l| l.len() > cfg.max_actions_per_update) {
            return Err(ReducerError::ListTooLarge {
                len: list.len(),
                max: cfg.max_actions_per_update,
            }
            .into());
        }

        let partial = self.program.prove_partial_action_stack(
            end,
            &witnesses,
            cfg.max_updates_final_proof,
            cfg.proofs_enabled,
        )?;

        // `actions` pops newest first; the stack must pop oldest first.
        let oldest_first: Vec<_> = actions.to_vec().into_iter().rev().collect();
        let mut stack = MerkleActions::<A>::from_reverse(oldest_first);

        let mut processed = reducer.action_state;
        let mut onchain_stack = Field::ZERO;
        let mut use_onchain = false;
        let mut batches = Vec::new();
        while !stack.is_empty() {
            batches.push(ActionBatch {
                use_onchain_stack: use_onchain,
                processed_action_state: processed,
                onchain_action_state: end,
                onchain_stack,
                stack: stack.clone(),
                is_recursive: partial.is_recursive,
                witnesses: partial.final_witnesses.clone(),
            });

            let (mut lists, mut taken) = (0usize, 0usize);
            while lists < cfg.batch_size {
                let Some(len) = stack.iter().next().map(MerkleList::len) else {
                    break;
                };
                if taken + len > cfg.batch_size {
                    break;
                }
                let list = stack.pop_exn()?;
                processed = update_sequence_state(processed, list.hash());
                taken += len;
                lists += 1;
            }
            ensure!(lists > 0, "batch {} made no progress", batches.len() - 1);
            onchain_stack = stack.hash();
            use_onchain = true;
        }
        ensure!(processed == end, "batches end at {processed}, expected {end}");

        info!(
            %contract,
            lists = witnesses.len(),
            batches = batches.len(),
            recursive = partial.is_recursive,
            "prepared batches"
        );
        Ok(batches
            .into_iter()
            .map(|batch| PreparedBatch {
                proof: partial.proof.clone(),
                batch,
            })
            .collect())
    }

    /// Consume one batch: check it against the on-chain anchors, hand
    /// exactly `batch_size` slots to `callback` as `(action, is_dummy, index)`
    /// and advance `state`.
    ///
    /// Nothing is called and nothing is written when any check fails. Never
    /// process two batches inside one circuit call; raise `batch_size`
    /// instead.
    pub fn process_batch<F>(
        &self,
        state: &mut ReducerState,
        account_action_state: Field,
        prepared: &PreparedBatch<A, B::Proof>,
        mut callback: F,
    ) -> Result<(), ReducerError>
    where
        F: FnMut(A, bool, usize),
    {
        let cfg = &self.config;
        let PreparedBatch { proof, batch } = prepared;

        ensure_eq(
            "processed action state",
            state.action_state,
            batch.processed_action_state,
        )?;
        if batch.use_onchain_stack {
            ensure_eq("on-chain action stack", state.action_stack, batch.onchain_stack)?;
        } else {
            ensure_eq(
                "account action state",
                account_action_state,
                batch.onchain_action_state,
            )?;
        }

        let start = if batch.is_recursive {
            if cfg.proofs_enabled {
                self.program.verify(proof)?;
            }
            ensure_eq("proof input", batch.onchain_action_state, proof.public_input)?;
            proof.public_output
        } else {
            ActionStackState::initial(batch.onchain_action_state)
        };
        let reversed = action_stack_chunk(cfg.max_updates_final_proof, start, &batch.witnesses)?;
        if !batch.use_onchain_stack {
            ensure_eq("unreversed actions", batch.processed_action_state, reversed.actions)?;
        }

        let trusted = if batch.use_onchain_stack {
            batch.onchain_stack
        } else {
            reversed.stack
        };
        let mut stack = batch.stack.clone();
        stack.assert_hash(trusted)?;

        // Whole lists that fit, oldest first.
        let mut n = 0usize;
        let mut total = 0usize;
        for list in stack.iter().take(cfg.batch_size) {
            if total + list.len() > cfg.batch_size {
                break;
            }
            total += list.len();
            n += 1;
        }

        let mut processed = state.action_state;
        let mut popped: Vec<HashedValue<A>> = Vec::with_capacity(cfg.batch_size);
        for i in 0..cfg.batch_size {
            let Some(list) = stack.pop_if(i < n)? else {
                continue;
            };
            // `for_each_bounded` walks push order, which is dispatch order.
            list.for_each_bounded(cfg.max_actions_per_update, |action, _| {
                if let Some(a) = action {
                    popped.push(a.clone());
                }
            })?;
            processed = update_sequence_state(processed, list.hash());
        }
        if popped.len() > cfg.batch_size {
            return Err(MerkleError::TooLong {
                len: popped.len(),
                max: cfg.batch_size,
            }
            .into());
        }

        let mut values = Vec::with_capacity(popped.len());
        for hv in popped {
            let claimed = hv.hash();
            let value = hv.into_value()?;
            ensure_eq("action hash", claimed, hash_event(&value.to_fields()))?;
            values.push(value);
        }
        let real = values.len();
        let mut values = values.into_iter();
        for i in 0..cfg.batch_size {
            match values.next() {
                Some(a) => callback(a, false, i),
                None => callback(A::empty(), true, i),
            }
        }

        state.action_state = processed;
        state.action_stack = stack.hash();
        debug!(lists = n, actions = real, use_onchain = batch.use_onchain_stack, "processed batch");
        Ok(())
    }
}
