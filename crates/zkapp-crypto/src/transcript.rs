// crates/zkapp-crypto/src/transcript.rs

//! Absorb/challenge transcript.
//!
//! Deterministic, domain-separated random-oracle model. The mock proving
//! backend derives its MACs from it; **do not** rely on this construction
//! for security-critical deployments.

use blake3::Hasher;

use crate::field::Field;

/// Fixed domain prefix to seed transcripts.
const TRANSCRIPT_PREFIX: &[u8] = b"zkapp.transcript.v0";

/// Transcript interface used by proving backends.
///
/// Implementations should apply domain separation for both absorbs and challenges.
pub trait Transcript {
    /// Add raw bytes under a label (domain-separated).
    fn absorb(&mut self, label: &str, bytes: &[u8]);

    /// Convenience: absorb an unsigned 64-bit value (LE).
    fn absorb_u64(&mut self, label: &str, x: u64) {
        self.absorb(label, &x.to_le_bytes());
    }

    /// Convenience: absorb a field element.
    fn absorb_field(&mut self, label: &str, x: &Field) {
        self.absorb(label, x.as_bytes());
    }

    /// Convenience: absorb a length-prefixed vector of field elements.
    fn absorb_fields(&mut self, label: &str, xs: &[Field]) {
        self.absorb_u64(label, xs.len() as u64);
        for x in xs {
            self.absorb_field(label, x);
        }
    }

    /// Squeeze `n` bytes as a challenge under `label`.
    #[must_use]
    fn challenge_bytes(&mut self, label: &str, n: usize) -> Vec<u8>;

    /// Squeeze exactly 32 bytes.
    #[must_use]
    fn challenge_32(&mut self, label: &str) -> [u8; 32] {
        let v = self.challenge_bytes(label, 32);
        let mut out = [0u8; 32];
        out.copy_from_slice(&v);
        out
    }
}

/// Blake3-based transcript.
#[derive(Clone, Debug)]
pub struct Blake3Transcript {
    st: Hasher,
}

impl Blake3Transcript {
    /// Create a new transcript with a domain separation prefix.
    #[must_use]
    pub fn new(domain_sep: &str) -> Self {
        let mut st = Hasher::new();
        st.update(TRANSCRIPT_PREFIX);
        st.update(&(domain_sep.len() as u32).to_le_bytes());
        st.update(domain_sep.as_bytes());
        Self { st }
    }

    fn absorb_label(st: &mut Hasher, tag: &[u8], label: &str) {
        st.update(tag);
        st.update(&(label.len() as u32).to_le_bytes());
        st.update(label.as_bytes());
    }
}

impl Transcript for Blake3Transcript {
    fn absorb(&mut self, label: &str, bytes: &[u8]) {
        Self::absorb_label(&mut self.st, b"absorb", label);
        self.st.update(&(bytes.len() as u32).to_le_bytes());
        self.st.update(bytes);
    }

    fn challenge_bytes(&mut self, label: &str, n: usize) -> Vec<u8> {
        let mut st = self.st.clone();
        Self::absorb_label(&mut st, b"challenge", label);

        let mut out = vec![0u8; n];
        st.finalize_xof().fill(&mut out);

        // Forward progress: two identical challenges in a row must differ.
        Self::absorb_label(&mut self.st, b"after_challenge", label);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Blake3Transcript, Transcript};
    use crate::Field;

    #[test]
    fn determinism_and_label_sep() {
        let mut t1 = Blake3Transcript::new("dom");
        let mut t2 = Blake3Transcript::new("dom");

        t1.absorb_field("x", &Field::from(5u64));
        t2.absorb_field("x", &Field::from(5u64));
        assert_eq!(t1.challenge_32("c"), t2.challenge_32("c"));

        let mut t3 = Blake3Transcript::new("dom");
        t3.absorb_field("x", &Field::from(5u64));
        assert_ne!(t1.challenge_bytes("c", 32), t3.challenge_bytes("d", 32));
    }

    #[test]
    fn repeated_challenges_advance() {
        let mut t = Blake3Transcript::new("dom");
        let a = t.challenge_32("c");
        let b = t.challenge_32("c");
        assert_ne!(a, b);
    }

    #[test]
    fn field_vector_length_is_bound() {
        let mut t1 = Blake3Transcript::new("dom");
        let mut t2 = Blake3Transcript::new("dom");
        t1.absorb_fields("v", &[Field::ZERO]);
        t2.absorb_fields("v", &[Field::ZERO, Field::ZERO]);
        assert_ne!(t1.challenge_32("c"), t2.challenge_32("c"));
    }
}
