//! Deferred authorization.
//!
//! While a transaction is being built, updates only record *what* kind of
//! authorization they will need ([`LazyAuthorization`]). Once the final
//! update list and commitments exist, [`authorize_all`] consumes every token
//! exactly once through an [`Authorizer`].

use tracing::debug;
use zkapp_crypto::Field;

use crate::account_update::{AccountUpdate, AccountUpdateId, Authorization};

/// Pending authorization work for one update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LazyAuthorization {
    /// Nothing to do.
    #[default]
    None,
    /// Sign the transaction commitment with the account key.
    Signature,
    /// Prove `method_name(args)`.
    Proof {
        /// Contract method to prove.
        method_name: String,
        /// Field-encoded arguments.
        args: Vec<Field>,
        /// Blinding value for the proof's public input.
        blinding: Field,
    },
    /// Already turned into an [`Authorization`].
    Consumed,
}

/// A taken pending token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAuthorization {
    /// See [`LazyAuthorization::Signature`].
    Signature,
    /// See [`LazyAuthorization::Proof`].
    Proof {
        /// Contract method to prove.
        method_name: String,
        /// Field-encoded arguments.
        args: Vec<Field>,
        /// Blinding value.
        blinding: Field,
    },
}

/// Authorization failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The token was consumed by an earlier pass.
    #[error("lazy authorization of {0} was already consumed")]
    AlreadyConsumed(AccountUpdateId),

    /// The authorizer failed.
    #[error("authorizing {id} failed: {reason}")]
    Failed {
        /// Update being authorized.
        id: AccountUpdateId,
        /// Rendered error chain.
        reason: String,
    },
}

impl LazyAuthorization {
    /// True for tokens with work left.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Signature | Self::Proof { .. })
    }

    /// Take the pending work, leaving [`LazyAuthorization::Consumed`].
    ///
    /// `None` stays `None` and yields `Ok(None)`; a consumed token errors.
    pub fn take(&mut self, id: AccountUpdateId) -> Result<Option<PendingAuthorization>, AuthorizationError> {
        match std::mem::replace(self, Self::Consumed) {
            Self::None => {
                *self = Self::None;
                Ok(None)
            }
            Self::Consumed => Err(AuthorizationError::AlreadyConsumed(id)),
            Self::Signature => Ok(Some(PendingAuthorization::Signature)),
            Self::Proof {
                method_name,
                args,
                blinding,
            } => Ok(Some(PendingAuthorization::Proof {
                method_name,
                args,
                blinding,
            })),
        }
    }
}

/// Transaction commitments an authorizer signs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitments {
    /// Commitment to the account-update forest.
    pub commitment: Field,
    /// Commitment extended with fee payer and memo.
    pub full_commitment: Field,
}

/// Produces signatures and proofs for pending tokens.
pub trait Authorizer {
    /// Sign `message` on behalf of `update`'s account.
    fn sign(&mut self, update: &AccountUpdate, message: Field) -> anyhow::Result<Vec<u8>>;

    /// Prove `method_name(args)` for `update`.
    fn prove(
        &mut self,
        update: &AccountUpdate,
        method_name: &str,
        args: &[Field],
        blinding: Field,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Consume every pending token in `updates`; returns how many were resolved.
///
/// Fails on the first token that was already consumed, or when the
/// authorizer fails; updates before the failure keep their new authorization.
pub fn authorize_all<A: Authorizer + ?Sized>(
    updates: &mut [AccountUpdate],
    commitments: Commitments,
    authorizer: &mut A,
) -> Result<usize, AuthorizationError> {
    let mut n = 0usize;
    for update in updates.iter_mut() {
        let id = update.id;
        let Some(pending) = update.lazy_authorization.take(id)? else {
            continue;
        };
        let result = match &pending {
            PendingAuthorization::Signature => {
                let message = if update.body.use_full_commitment {
                    commitments.full_commitment
                } else {
                    commitments.commitment
                };
                authorizer.sign(update, message).map(Authorization::Signature)
            }
            PendingAuthorization::Proof {
                method_name,
                args,
                blinding,
            } => authorizer
                .prove(update, method_name, args, *blinding)
                .map(Authorization::Proof),
        };
        update.authorization = result.map_err(|e| AuthorizationError::Failed {
            id,
            reason: format!("{e:#}"),
        })?;
        debug!(%id, "authorized account update");
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_update::{PublicKey, TokenId};

    struct Recorder {
        signed: Vec<(AccountUpdateId, Field)>,
    }

    impl Authorizer for Recorder {
        fn sign(&mut self, update: &AccountUpdate, message: Field) -> anyhow::Result<Vec<u8>> {
            self.signed.push((update.id, message));
            Ok(message.as_bytes().to_vec())
        }

        fn prove(
            &mut self,
            _update: &AccountUpdate,
            method_name: &str,
            _args: &[Field],
            _blinding: Field,
        ) -> anyhow::Result<Vec<u8>> {
            anyhow::ensure!(method_name != "broken", "prover rejected {method_name}");
            Ok(method_name.as_bytes().to_vec())
        }
    }

    fn commitments() -> Commitments {
        Commitments {
            commitment: Field::from(1u64),
            full_commitment: Field::from(2u64),
        }
    }

    #[test]
    fn tokens_are_consumed_exactly_once() {
        let mut a = AccountUpdate::create(PublicKey(Field::from(5u64)), TokenId::DEFAULT);
        a.require_signature();
        let mut b = AccountUpdate::create(PublicKey(Field::from(6u64)), TokenId::DEFAULT);
        b.require_proof(Field::from(9u64), "step", vec![]);
        b.body.use_full_commitment = true;
        let c = AccountUpdate::create(PublicKey(Field::from(7u64)), TokenId::DEFAULT);
        let mut updates = vec![a, b, c];

        let mut rec = Recorder { signed: vec![] };
        assert_eq!(authorize_all(&mut updates, commitments(), &mut rec).unwrap(), 2);
        assert_eq!(rec.signed, vec![(updates[0].id, Field::from(1u64))]);
        assert_eq!(updates[0].lazy_authorization, LazyAuthorization::Consumed);
        assert_eq!(updates[1].authorization, Authorization::Proof(b"step".to_vec()));
        assert_eq!(updates[2].lazy_authorization, LazyAuthorization::None);

        let err = authorize_all(&mut updates, commitments(), &mut rec).unwrap_err();
        assert_eq!(err, AuthorizationError::AlreadyConsumed(updates[0].id));
    }

    #[test]
    fn full_commitment_is_signed_when_requested() {
        let mut a = AccountUpdate::create(PublicKey(Field::from(5u64)), TokenId::DEFAULT);
        a.require_signature();
        a.body.use_full_commitment = true;
        let mut rec = Recorder { signed: vec![] };
        authorize_all(std::slice::from_mut(&mut a), commitments(), &mut rec).unwrap();
        assert_eq!(rec.signed[0].1, Field::from(2u64));
    }

    #[test]
    fn authorizer_failure_is_reported() {
        let mut a = AccountUpdate::create(PublicKey(Field::from(5u64)), TokenId::DEFAULT);
        a.require_proof(Field::ZERO, "broken", vec![]);
        let id = a.id;
        let mut rec = Recorder { signed: vec![] };
        let err = authorize_all(std::slice::from_mut(&mut a), commitments(), &mut rec).unwrap_err();
        assert!(matches!(err, AuthorizationError::Failed { id: i, .. } if i == id));
    }
}
