//! Transcript-MAC proving backend.
//!
//! Not zero-knowledge and not succinct: a "proof" is a BLAKE3 transcript MAC
//! over the statement, so verification simply recomputes it. It is enough
//! to exercise recursion plumbing end to end: a proof for one statement never
//! verifies against another, and dummies never verify at all.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use zkapp_core::{ProvingBackend, Statement};
use zkapp_crypto::{Blake3Transcript, Transcript};

use crate::api::DS_MAC_BACKEND;

/// Proof object of [`MacBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacProof {
    /// Transcript MAC over the statement.
    pub mac: [u8; 32],
    /// Set on placeholders.
    pub dummy: bool,
}

/// Backend whose proofs are transcript MACs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacBackend;

fn statement_mac(statement: &Statement) -> [u8; 32] {
    let mut tr = Blake3Transcript::new(DS_MAC_BACKEND);
    tr.absorb("program", statement.program.as_bytes());
    tr.absorb_fields("input", &statement.public_input);
    tr.absorb_fields("output", &statement.public_output);
    tr.challenge_32("mac")
}

impl ProvingBackend for MacBackend {
    type Proof = MacProof;
    const NAME: &'static str = "mac";

    fn prove(statement: &Statement) -> Result<MacProof> {
        Ok(MacProof {
            mac: statement_mac(statement),
            dummy: false,
        })
    }

    fn verify(statement: &Statement, proof: &MacProof) -> Result<()> {
        ensure!(!proof.dummy, "dummy proof for {}", statement.program);
        ensure!(
            proof.mac == statement_mac(statement),
            "MAC mismatch for {}",
            statement.program
        );
        Ok(())
    }

    fn dummy(_statement: &Statement) -> MacProof {
        MacProof {
            mac: [0u8; 32],
            dummy: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkapp_crypto::Field;

    fn st(out: u64) -> Statement {
        Statement::new("p", vec![Field::from(1u64)], vec![Field::from(out)])
    }

    #[test]
    fn proofs_bind_the_statement() {
        let proof = MacBackend::prove(&st(2)).unwrap();
        MacBackend::verify(&st(2), &proof).unwrap();
        assert!(MacBackend::verify(&st(3), &proof).is_err());

        let other = Statement::new("q", vec![Field::from(1u64)], vec![Field::from(2u64)]);
        assert!(MacBackend::verify(&other, &proof).is_err());
    }

    #[test]
    fn dummies_never_verify() {
        let dummy = MacBackend::dummy(&st(2));
        assert!(MacBackend::verify(&st(2), &dummy).is_err());

        // Even with the right MAC.
        let forged = MacProof {
            dummy: true,
            ..MacBackend::prove(&st(2)).unwrap()
        };
        assert!(MacBackend::verify(&st(2), &forged).is_err());
    }
}
