//! Account update data model.
//!
//! An [`AccountUpdate`] is a committed [`AccountUpdateBody`] plus an
//! [`Authorization`], together with three ephemeral fields that never enter
//! any commitment: the session-local [`AccountUpdateId`], a debug `label`,
//! and the deferred [`LazyAuthorization`] token.

use serde::{Deserialize, Serialize};
use std::fmt;
use zkapp_crypto::{hash_with_prefix, Field, Prefix};
use zkapp_merkle::{Commit, HashedValue};

use crate::authorization::LazyAuthorization;
use crate::events::{Actions, Events};

/// Number of on-chain application state slots per account.
pub const APP_STATE_LEN: usize = 8;

/// In-memory identity of an account update within one construction session.
///
/// Two structurally identical updates with different ids are distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountUpdateId(pub u64);

impl AccountUpdateId {
    /// Draw a fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for AccountUpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}

/// Account public key (compressed x-coordinate stand-in).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub Field);

impl PublicKey {
    /// The empty key; marks dummy updates.
    pub const EMPTY: Self = Self(Field::ZERO);

    /// True for [`PublicKey::EMPTY`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_zero()
    }
}

/// Token identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub Field);

impl TokenId {
    /// The native token.
    pub const DEFAULT: Self = Self(Field({
        let mut b = [0u8; 32];
        b[0] = 1;
        b
    }));
}

impl Default for TokenId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What kind of authorization the body commits to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationKind {
    /// No authorization.
    #[default]
    None,
    /// A signature by the account key.
    Signature,
    /// A proof against the given verification key hash.
    Proof {
        /// Hash of the verification key the proof must verify under.
        verification_key_hash: Field,
    },
}

/// The authorization actually attached to an update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authorization {
    /// Nothing attached.
    #[default]
    None,
    /// Opaque signature bytes.
    Signature(Vec<u8>),
    /// Opaque proof bytes.
    Proof(Vec<u8>),
}

/// Whether a child may use its parent's token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MayUseToken {
    /// Native token only.
    #[default]
    No,
    /// The parent's own custom token.
    ParentsOwnToken,
    /// Whatever token the parent may use.
    InheritFromParent,
}

/// Account preconditions checked by the protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preconditions {
    /// Required account nonce.
    pub nonce: Option<u32>,
    /// Required account action state.
    pub action_state: Option<Field>,
    /// Required app state values.
    pub app_state: [Option<Field>; APP_STATE_LEN],
}

/// The committed part of an account update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountUpdateBody {
    /// Target account.
    pub public_key: PublicKey,
    /// Token of the target account.
    pub token_id: TokenId,
    /// Signed balance delta.
    pub balance_change: i64,
    /// App state writes (`None` keeps the slot).
    pub app_state: [Option<Field>; APP_STATE_LEN],
    /// Preconditions.
    pub preconditions: Preconditions,
    /// Committed authorization kind.
    pub authorization_kind: AuthorizationKind,
    /// Emitted events.
    pub events: Events,
    /// Dispatched actions.
    pub actions: Actions,
    /// Nesting depth in the flattened transaction; not committed.
    pub call_depth: u32,
    /// Token permission.
    pub may_use_token: MayUseToken,
    /// Increment the account nonce.
    pub increment_nonce: bool,
    /// Sign the full commitment (fee payer and memo included).
    pub use_full_commitment: bool,
}

fn push_option(out: &mut Vec<Field>, x: Option<Field>) {
    out.push(Field::from(x.is_some()));
    out.push(x.unwrap_or_default());
}

impl AccountUpdateBody {
    /// Canonical field encoding of every committed field.
    ///
    /// `call_depth` is left out: it is recomputed from the tree position.
    #[must_use]
    pub fn to_fields(&self) -> Vec<Field> {
        let mut out = Vec::with_capacity(64);
        out.push(self.public_key.0);
        out.push(self.token_id.0);
        out.push(Field::from(self.balance_change.unsigned_abs()));
        out.push(Field::from(self.balance_change < 0));
        for x in self.app_state {
            push_option(&mut out, x);
        }
        push_option(&mut out, self.preconditions.nonce.map(Field::from));
        push_option(&mut out, self.preconditions.action_state);
        for x in self.preconditions.app_state {
            push_option(&mut out, x);
        }
        match self.authorization_kind {
            AuthorizationKind::None => out.extend([Field::from(0u64), Field::ZERO]),
            AuthorizationKind::Signature => out.extend([Field::from(1u64), Field::ZERO]),
            AuthorizationKind::Proof {
                verification_key_hash,
            } => out.extend([Field::from(2u64), verification_key_hash]),
        }
        out.push(self.events.hash());
        out.push(self.actions.hash());
        out.push(Field::from(self.may_use_token as u64));
        out.push(Field::from(self.increment_nonce));
        out.push(Field::from(self.use_full_commitment));
        out
    }

    /// Body commitment.
    #[must_use]
    pub fn hash(&self) -> Field {
        hash_with_prefix(Prefix::AccountUpdateBody, &self.to_fields())
    }
}

/// One atomic state-change instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    /// Session-local identity.
    pub id: AccountUpdateId,
    /// Debug label.
    pub label: String,
    /// Committed body.
    pub body: AccountUpdateBody,
    /// Attached authorization.
    pub authorization: Authorization,
    /// Deferred signing/proving instruction.
    pub lazy_authorization: LazyAuthorization,
}

impl AccountUpdate {
    /// A fresh update for `(public_key, token_id)` with a random id.
    #[must_use]
    pub fn create(public_key: PublicKey, token_id: TokenId) -> Self {
        Self {
            id: AccountUpdateId::random(),
            label: String::new(),
            body: AccountUpdateBody {
                public_key,
                token_id,
                ..AccountUpdateBody::default()
            },
            authorization: Authorization::None,
            lazy_authorization: LazyAuthorization::None,
        }
    }

    /// A dummy update (empty key); dropped at finalization.
    #[must_use]
    pub fn dummy() -> Self {
        Self::create(PublicKey::EMPTY, TokenId::DEFAULT)
    }

    /// Builder: set the debug label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Dummy updates target the empty key.
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.body.public_key.is_empty()
    }

    /// Body commitment.
    #[must_use]
    pub fn hash(&self) -> Field {
        self.body.hash()
    }

    /// Pair with its commitment.
    #[must_use]
    pub fn hashed(self) -> HashedValue<Self> {
        HashedValue::new(self)
    }

    /// Require a signature, deferring the actual signing.
    pub fn require_signature(&mut self) {
        self.body.authorization_kind = AuthorizationKind::Signature;
        self.lazy_authorization = LazyAuthorization::Signature;
    }

    /// Require a proof of `method_name(args)`, deferring the actual proving.
    pub fn require_proof(
        &mut self,
        verification_key_hash: Field,
        method_name: impl Into<String>,
        args: Vec<Field>,
    ) {
        self.body.authorization_kind = AuthorizationKind::Proof {
            verification_key_hash,
        };
        self.lazy_authorization = LazyAuthorization::Proof {
            method_name: method_name.into(),
            args,
            blinding: Field::from(rand::random::<u64>()),
        };
    }

    /// Label if set, otherwise the id.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.label.is_empty() {
            self.id.to_string()
        } else {
            self.label.clone()
        }
    }
}

impl Commit for AccountUpdate {
    fn commit(&self) -> Field {
        self.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(x: u64) -> PublicKey {
        PublicKey(Field::from(x))
    }

    #[test]
    fn ephemeral_fields_are_not_committed() {
        let a = AccountUpdate::create(pk(7), TokenId::DEFAULT).with_label("a");
        let mut b = a.clone();
        b.id = AccountUpdateId::random();
        b.label = "b".into();
        b.body.call_depth = 3;
        b.lazy_authorization = LazyAuthorization::Signature;
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a, b);
    }

    #[test]
    fn committed_fields_change_the_hash() {
        let a = AccountUpdate::create(pk(7), TokenId::DEFAULT);
        let mut b = a.clone();
        b.body.balance_change = -5;
        assert_ne!(a.hash(), b.hash());

        let mut c = a.clone();
        c.body.balance_change = 5;
        assert_ne!(b.hash(), c.hash());

        let mut d = a.clone();
        d.body.actions.push(vec![Field::from(1u64)]);
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn clone_keeps_identity() {
        let mut a = AccountUpdate::create(pk(1), TokenId::DEFAULT);
        a.require_signature();
        let b = a.clone();
        assert_eq!(a.id, b.id);
        assert_eq!(b.lazy_authorization, LazyAuthorization::Signature);
    }

    #[test]
    fn dummy_is_detected() {
        assert!(AccountUpdate::dummy().is_dummy());
        assert!(!AccountUpdate::create(pk(1), TokenId::DEFAULT).is_dummy());
    }

    #[test]
    fn hashed_matches_commit() {
        let a = AccountUpdate::create(pk(3), TokenId::DEFAULT);
        let h = a.hash();
        let hv = a.hashed();
        assert_eq!(hv.hash(), h);
        assert!(hv.check().is_ok());
    }
}
