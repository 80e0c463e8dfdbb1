use sha2::{Digest, Sha256};

/// Shared-secret check for the admin surface.
///
/// Only the digest of the secret is kept; comparisons run over fixed-length
/// digests so their timing does not depend on where the inputs differ.
#[derive(Clone)]
pub struct AdminGate {
    secret_digest: [u8; 32],
}

impl AdminGate {
    pub fn new(secret: &str) -> Self {
        Self {
            secret_digest: digest(secret),
        }
    }

    pub fn is_admin(&self, provided: Option<&str>) -> bool {
        let Some(provided) = provided else {
            return false;
        };
        if provided.is_empty() {
            return false;
        }

        let candidate = digest(provided);
        let diff = candidate
            .iter()
            .zip(self.secret_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        diff == 0
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}
