use hex::encode as hex_encode;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Single-use password reset credential. Only `digest()` is persisted; `token`
/// goes out in the email link.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl ResetToken {
    pub fn digest(&self) -> String {
        digest_token(&self.token)
    }
}

pub fn generate_reset_token(ttl_minutes: i64) -> ResetToken {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    ResetToken {
        token: hex_encode(bytes),
        expires_at: OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes),
    }
}

pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex_encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_and_expire_in_the_future() {
        let before = OffsetDateTime::now_utc();
        let a = generate_reset_token(60);
        let b = generate_reset_token(60);
        let after = OffsetDateTime::now_utc();
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 64);
        assert!(a.expires_at - before >= Duration::minutes(60));
        assert!(a.expires_at - after <= Duration::minutes(60));
    }

    #[test]
    fn digest_is_stable_and_not_the_token() {
        let t = generate_reset_token(5);
        assert_eq!(t.digest(), digest_token(&t.token));
        assert_ne!(t.digest(), t.token);
        assert_eq!(digest_token(" abc "), digest_token("abc"));
    }
}
