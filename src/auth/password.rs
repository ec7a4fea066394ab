use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64;
use rand_core::{OsRng, RngCore};
use sha2::Sha512;

/// PBKDF2-HMAC-SHA512 with parameters pinned as part of the storage contract: 300 000
/// iterations, 64-byte derived key, hex-encoded for storage/comparison.
/// These constants are part of the storage contract — never tune them
/// without a migration plan for existing password hashes.
const ITERATIONS: u32 = 300_000;
const OUTPUT_LEN: usize = 64;
const SALT_LEN: usize = 64;

pub struct HashedPassword {
    pub hash_hex: String,
    pub salt_b64: String,
}

pub fn hash_password(password: &str) -> HashedPassword {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let hash = derive(password, &salt);
    HashedPassword {
        hash_hex: hex::encode(hash),
        salt_b64: base64.encode(salt),
    }
}

pub fn verify_password(password: &str, hash_hex: &str, salt_b64: &str) -> bool {
    let Ok(salt) = base64.decode(salt_b64) else {
        return false;
    };
    let derived = derive(password, &salt);
    hex::encode(derived) == hash_hex
}

fn derive(password: &str, salt: &[u8]) -> [u8; OUTPUT_LEN] {
    let mut out = [0u8; OUTPUT_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, ITERATIONS, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hashed = hash_password("correct horse battery staple");
        assert!(verify_password(
            "correct horse battery staple",
            &hashed.hash_hex,
            &hashed.salt_b64
        ));
        assert!(!verify_password(
            "wrong password",
            &hashed.hash_hex,
            &hashed.salt_b64
        ));
    }

    #[test]
    fn salts_are_random_per_call() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a.salt_b64, b.salt_b64);
    }
}
