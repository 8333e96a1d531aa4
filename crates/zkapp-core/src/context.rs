//! Explicit transaction and contract-call contexts.
//!
//! A [`TransactionContext`] owns the layout for one transaction. Contract
//! code receives a [`SmartContractContext`] that borrows that layout and
//! names its own update; nested calls reborrow it. There is no ambient
//! "current transaction": the context value is the only way in.

use tracing::debug;
use zkapp_crypto::{hash_with_prefix, Field, Prefix};

use crate::account_update::{AccountUpdate, AccountUpdateId, PublicKey};
use crate::authorization::{authorize_all, AuthorizationError, Authorizer, Commitments};
use crate::error::ForestError;
use crate::forest::AccountUpdateForest;
use crate::layout::{AccountUpdateLayout, NodeRef};

/// Commitment extended with the fee payer, fee and memo.
#[must_use]
pub fn full_commitment(memo: Field, fee_payer: PublicKey, fee: u64, commitment: Field) -> Field {
    hash_with_prefix(
        Prefix::FullCommitment,
        &[memo, fee_payer.0, Field::from(fee), commitment],
    )
}

/// Builder for one transaction.
#[derive(Debug)]
pub struct TransactionContext {
    layout: AccountUpdateLayout,
    fee_payer: PublicKey,
    fee: u64,
    memo: Field,
}

impl TransactionContext {
    /// Empty transaction paid by `fee_payer`.
    #[must_use]
    pub fn new(fee_payer: PublicKey, fee: u64) -> Self {
        Self {
            layout: AccountUpdateLayout::new(None),
            fee_payer,
            fee,
            memo: Field::ZERO,
        }
    }

    /// Builder: attach a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: Field) -> Self {
        self.memo = memo;
        self
    }

    /// The staged call graph.
    #[must_use]
    pub const fn layout(&self) -> &AccountUpdateLayout {
        &self.layout
    }

    /// Mutable access to the staged call graph.
    pub fn layout_mut(&mut self) -> &mut AccountUpdateLayout {
        &mut self.layout
    }

    /// Append a top-level update.
    pub fn push(&mut self, update: impl Into<NodeRef>) -> Result<AccountUpdateId, ForestError> {
        self.layout.push_top_level(update)
    }

    /// Enter a contract call on `this` (which need not be attached yet).
    pub fn contract(&mut self, this: impl Into<NodeRef>) -> Result<SmartContractContext<'_>, ForestError> {
        let this = self.layout.get_or_create(this)?;
        Ok(SmartContractContext::new(&mut self.layout, this))
    }

    /// Finalize the call graph into a flat, committed transaction.
    pub fn finish(mut self) -> Result<Transaction, ForestError> {
        let forest = self.layout.finalize_children()?;
        let commitment = forest.hash();
        let account_updates = forest.to_flat_array(true, 0)?;
        let full_commitment = full_commitment(self.memo, self.fee_payer, self.fee, commitment);
        debug!(
            %commitment,
            updates = account_updates.len(),
            fee = self.fee,
            "transaction finalized"
        );
        Ok(Transaction {
            fee_payer: self.fee_payer,
            fee: self.fee,
            memo: self.memo,
            account_updates,
            commitment,
            full_commitment,
        })
    }
}

/// A contract method's view of the transaction: the shared layout plus the
/// update the method is acting as.
#[derive(Debug)]
pub struct SmartContractContext<'a> {
    layout: &'a mut AccountUpdateLayout,
    this: AccountUpdateId,
}

impl<'a> SmartContractContext<'a> {
    /// Act as `this` inside `layout`.
    pub fn new(layout: &'a mut AccountUpdateLayout, this: AccountUpdateId) -> Self {
        Self { layout, this }
    }

    /// The update this call acts as.
    #[must_use]
    pub const fn this(&self) -> AccountUpdateId {
        self.this
    }

    /// Mutable access to this call's own update.
    pub fn self_update_mut(&mut self) -> Result<&mut AccountUpdate, ForestError> {
        self.layout.update_mut(self.this)
    }

    /// The shared layout.
    pub fn layout_mut(&mut self) -> &mut AccountUpdateLayout {
        self.layout
    }

    /// Push `child` under this call without entering it.
    pub fn approve(&mut self, child: impl Into<NodeRef>) -> Result<AccountUpdateId, ForestError> {
        self.layout.push_child(self.this, child)
    }

    /// Push `child` under this call and enter it.
    pub fn call(&mut self, child: impl Into<NodeRef>) -> Result<SmartContractContext<'_>, ForestError> {
        let child = self.layout.push_child(self.this, child)?;
        Ok(SmartContractContext::new(self.layout, child))
    }

    /// Detach this call and return its finalized children.
    ///
    /// Lets a method hand its children to a caller as a committed forest.
    pub fn into_children(self) -> Result<AccountUpdateForest, ForestError> {
        let this = self.this;
        Ok(self
            .layout
            .finalize_and_remove(this)?
            .unwrap_or_else(AccountUpdateForest::empty))
    }
}

/// A finalized transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Fee payer.
    pub fee_payer: PublicKey,
    /// Fee.
    pub fee: u64,
    /// Memo.
    pub memo: Field,
    /// Pre-order update list with call depths set.
    pub account_updates: Vec<AccountUpdate>,
    /// Forest commitment.
    pub commitment: Field,
    /// Commitment including fee payer and memo.
    pub full_commitment: Field,
}

impl Transaction {
    /// Both commitments.
    #[must_use]
    pub const fn commitments(&self) -> Commitments {
        Commitments {
            commitment: self.commitment,
            full_commitment: self.full_commitment,
        }
    }

    /// Rebuild the committed forest from the flat list.
    pub fn forest(&self) -> Result<AccountUpdateForest, ForestError> {
        AccountUpdateForest::from_flat_array(self.account_updates.clone())
    }

    /// Resolve every pending lazy authorization.
    pub fn authorize<A: Authorizer + ?Sized>(&mut self, authorizer: &mut A) -> Result<usize, AuthorizationError> {
        let commitments = self.commitments();
        authorize_all(&mut self.account_updates, commitments, authorizer)
    }
}
