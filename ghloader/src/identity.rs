use std::hash::Hasher;
use std::sync::Arc;

use gstorage::{IdKind, IdPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use siphasher::sip::SipHasher24;

use crate::error::{LoaderError, Result};

/// Perturbation attempts before a natural key is declared unplaceable.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

const DEFAULT_SIP_KEYS: (u64, u64) = (0x0706_0504_0302_0100, 0x0f0e_0d0c_0b0a_0908);

/// Maps natural keys onto store identifiers.
///
/// Keyed identifiers are a pure function of the key string and the SipHash
/// keys, so separate runs against the same store converge on the same vertex
/// without consulting it first. Keyless identifiers come from a local RNG.
pub struct IdentityResolver {
    policy: Arc<dyn IdPolicy>,
    keys: (u64, u64),
    max_attempts: u32,
    rng: StdRng,
}

impl IdentityResolver {
    pub fn new(policy: Arc<dyn IdPolicy>) -> Self {
        Self {
            policy,
            keys: DEFAULT_SIP_KEYS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic random draws, for reproducible tests.
    pub fn with_seed(policy: Arc<dyn IdPolicy>, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(policy)
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_keys(mut self, k0: u64, k1: u64) -> Self {
        self.keys = (k0, k1);
        self
    }

    pub fn policy(&self) -> &Arc<dyn IdPolicy> {
        &self.policy
    }

    fn hash(&self, key: &str) -> u64 {
        let mut hasher = SipHasher24::new_with_keys(self.keys.0, self.keys.1);
        hasher.write(key.as_bytes());
        hasher.finish()
    }

    /// Identifier for `key`, doubled until the policy accepts it.
    pub fn hashed_id(&self, key: &str, kind: IdKind) -> Result<u64> {
        let mut id = (self.hash(key) as i64).unsigned_abs();
        let mut attempts = 1;
        while !self.policy.is_valid(id, kind) {
            if attempts >= self.max_attempts {
                return Err(LoaderError::IdentitySpaceExhausted {
                    key: key.to_string(),
                    attempts,
                });
            }
            attempts += 1;
            id = (id as i64).wrapping_mul(2).unsigned_abs();
        }
        Ok(id)
    }

    pub fn random_id(&mut self, kind: IdKind) -> u64 {
        loop {
            let id = self.rng.gen::<u64>() >> 1;
            if self.policy.is_valid(id, kind) {
                return id;
            }
        }
    }
}
