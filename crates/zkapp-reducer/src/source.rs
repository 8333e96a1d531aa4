//! Where pending actions come from.
//!
//! [`ActionSource`] is the network fetch layer seen from the reducer: it
//! reports the contract's reducer anchors, the account's raw action state,
//! and the action lists dispatched since a given state. Answers are treated
//! as already authenticated.
//!
//! [`LocalActionLedger`] is an in-memory implementation that applies
//! finalized transactions the way the protocol does: every non-empty
//! per-update action list is folded into the owning account's action state.

use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zkapp_core::{empty_action_state, update_sequence_state, PublicKey, TokenId, Transaction};
use zkapp_crypto::Field;

use crate::api::ReducerState;
use crate::error::ReducerError;

/// Account a reducer is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractAddress {
    /// Account key.
    pub public_key: PublicKey,
    /// Account token.
    pub token_id: TokenId,
}

impl ContractAddress {
    /// Address on the native token.
    #[must_use]
    pub const fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            token_id: TokenId::DEFAULT,
        }
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.public_key.0, self.token_id.0)
    }
}

/// Read access to dispatched actions and on-chain anchors.
pub trait ActionSource {
    /// The contract's reducer anchors.
    fn reducer_state(&self, contract: &ContractAddress) -> Result<ReducerState>;

    /// The account's protocol-maintained action state.
    fn account_action_state(&self, contract: &ContractAddress) -> Result<Field>;

    /// Action lists applied after `from`, oldest first; each list holds the
    /// field encodings of one update's actions in dispatch order.
    fn fetch_actions(&self, contract: &ContractAddress, from: Field) -> Result<Vec<Vec<Vec<Field>>>>;
}

#[derive(Clone, Debug)]
struct AppliedList {
    state_before: Field,
    actions: Vec<Vec<Field>>,
}

#[derive(Clone, Debug)]
struct AccountActions {
    history: Vec<AppliedList>,
    action_state: Field,
    reducer: ReducerState,
}

impl Default for AccountActions {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            action_state: empty_action_state(),
            reducer: ReducerState::default(),
        }
    }
}

/// In-memory action history per account.
#[derive(Clone, Debug, Default)]
pub struct LocalActionLedger {
    accounts: HashMap<ContractAddress, AccountActions>,
}

impl LocalActionLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every non-empty action list of `tx`; returns how many lists
    /// were applied.
    pub fn apply(&mut self, tx: &Transaction) -> Result<usize, ReducerError> {
        let mut applied = 0usize;
        for update in &tx.account_updates {
            let actions = &update.body.actions;
            if actions.is_empty() {
                continue;
            }
            actions.verify_chain()?;
            let contract = ContractAddress {
                public_key: update.body.public_key,
                token_id: update.body.token_id,
            };
            let account = self.accounts.entry(contract).or_default();
            let state_before = account.action_state;
            account.action_state = update_sequence_state(state_before, actions.hash());
            // The list iterates newest first.
            account.history.push(AppliedList {
                state_before,
                actions: actions.iter().rev().cloned().collect(),
            });
            applied += 1;
        }
        debug!(applied, "applied transaction actions to local ledger");
        Ok(applied)
    }

    /// Overwrite the contract's reducer anchors.
    pub fn set_reducer_state(&mut self, contract: &ContractAddress, state: ReducerState) {
        self.accounts.entry(*contract).or_default().reducer = state;
    }

    /// Total number of actions ever applied to `contract`.
    #[must_use]
    pub fn action_count(&self, contract: &ContractAddress) -> usize {
        self.accounts
            .get(contract)
            .map_or(0, |a| a.history.iter().map(|l| l.actions.len()).sum())
    }
}

impl ActionSource for LocalActionLedger {
    fn reducer_state(&self, contract: &ContractAddress) -> Result<ReducerState> {
        Ok(self
            .accounts
            .get(contract)
            .map(|a| a.reducer)
            .unwrap_or_default())
    }

    fn account_action_state(&self, contract: &ContractAddress) -> Result<Field> {
        Ok(self
            .accounts
            .get(contract)
            .map_or_else(empty_action_state, |a| a.action_state))
    }

    fn fetch_actions(&self, contract: &ContractAddress, from: Field) -> Result<Vec<Vec<Vec<Field>>>> {
        let Some(account) = self.accounts.get(contract) else {
            if from == empty_action_state() {
                return Ok(Vec::new());
            }
            bail!("no actions were ever dispatched to {contract}");
        };
        let start = if from == account.action_state {
            account.history.len()
        } else if let Some(i) = account.history.iter().position(|l| l.state_before == from) {
            i
        } else {
            bail!("action state {from:?} is not part of the history of {contract}");
        };
        Ok(account.history[start..]
            .iter()
            .map(|l| l.actions.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkapp_core::{AccountUpdate, TransactionContext};

    fn contract() -> ContractAddress {
        ContractAddress::new(PublicKey(Field::from(77u64)))
    }

    fn tx_with(lists: &[&[u64]]) -> Transaction {
        let mut tx = TransactionContext::new(PublicKey(Field::from(1u64)), 0);
        for list in lists {
            let mut u = AccountUpdate::create(contract().public_key, TokenId::DEFAULT);
            for &a in *list {
                u.body.actions.push(vec![Field::from(a)]);
            }
            tx.push(u).unwrap();
        }
        tx.finish().unwrap()
    }

    #[test]
    fn apply_folds_lists_into_action_state() {
        let mut ledger = LocalActionLedger::new();
        assert_eq!(ledger.account_action_state(&contract()).unwrap(), empty_action_state());

        let tx = tx_with(&[&[1, 2], &[], &[3]]);
        assert_eq!(ledger.apply(&tx).unwrap(), 2);
        assert_eq!(ledger.action_count(&contract()), 3);

        let expected = update_sequence_state(
            update_sequence_state(empty_action_state(), tx.account_updates[0].body.actions.hash()),
            tx.account_updates[2].body.actions.hash(),
        );
        assert_eq!(ledger.account_action_state(&contract()).unwrap(), expected);
    }

    #[test]
    fn fetch_returns_lists_after_state_in_dispatch_order() {
        let mut ledger = LocalActionLedger::new();
        ledger.apply(&tx_with(&[&[1, 2]])).unwrap();
        let mid = ledger.account_action_state(&contract()).unwrap();
        ledger.apply(&tx_with(&[&[3], &[4, 5]])).unwrap();
        let end = ledger.account_action_state(&contract()).unwrap();

        let f = |xs: &[u64]| xs.iter().map(|&x| vec![Field::from(x)]).collect::<Vec<_>>();
        assert_eq!(
            ledger.fetch_actions(&contract(), empty_action_state()).unwrap(),
            vec![f(&[1, 2]), f(&[3]), f(&[4, 5])]
        );
        assert_eq!(
            ledger.fetch_actions(&contract(), mid).unwrap(),
            vec![f(&[3]), f(&[4, 5])]
        );
        assert!(ledger.fetch_actions(&contract(), end).unwrap().is_empty());
        assert!(ledger.fetch_actions(&contract(), Field::from(5u64)).is_err());
    }

    #[test]
    fn unknown_contract_has_empty_history() {
        let ledger = LocalActionLedger::new();
        assert!(ledger
            .fetch_actions(&contract(), empty_action_state())
            .unwrap()
            .is_empty());
        assert_eq!(ledger.reducer_state(&contract()).unwrap(), ReducerState::default());
    }
}
