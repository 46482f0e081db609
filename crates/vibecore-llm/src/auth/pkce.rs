use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE verifier/challenge pair (RFC 7636).
///
/// Grounded on `auth/pkce.py`'s `PKCEGenerator`: 32 random bytes for the
/// verifier, base64url-unpadded; challenge is the base64url-unpadded
/// SHA-256 digest of the *ASCII bytes of the verifier string* (spec.md
/// §6.2 and §8's "PKCE: base64url(sha256(verifier)) == challenge").
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let challenge = Self::challenge_for(&verifier);

        Self { verifier, challenge }
    }

    /// Compute the challenge for an arbitrary verifier string. Exposed so
    /// callers (and tests) can verify the relationship independently of
    /// generation.
    pub fn challenge_for(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_matches_sha256_of_verifier() {
        let pair = PkceChallenge::generate();
        assert_eq!(pair.challenge, PkceChallenge::challenge_for(&pair.verifier));
    }

    #[test]
    fn verifier_has_no_padding_characters() {
        let pair = PkceChallenge::generate();
        assert!(!pair.verifier.contains('='));
        assert!(!pair.challenge.contains('='));
    }

    #[test]
    fn generation_is_not_deterministic() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.verifier, b.verifier);
    }
}
