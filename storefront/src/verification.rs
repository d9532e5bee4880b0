//! Email verification challenge issued at signup.

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// How long a verification code stays valid.
pub const TOKEN_TTL: Duration = Duration::minutes(15);

/// A single-use 6-digit code and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChallenge {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("verification token does not match")]
    Invalid,
    #[error("verification token has expired")]
    Expired,
}

impl VerificationChallenge {
    pub fn issue(now: OffsetDateTime) -> Self {
        let token = rand::thread_rng().gen_range(100_000..=999_999u32).to_string();
        VerificationChallenge {
            token,
            expires_at: now + TOKEN_TTL,
        }
    }

    /// The token is compared before the expiry, so a wrong code is always
    /// `Invalid` even after the challenge lapsed.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> Result<(), VerifyError> {
        if self.token != token {
            return Err(VerifyError::Invalid);
        }
        if now >= self.expires_at {
            return Err(VerifyError::Expired);
        }
        Ok(())
    }
}

/// Check a presented token against the user's stored challenge.
///
/// A user with no outstanding challenge (already verified) rejects every token.
pub fn check(
    challenge: Option<&VerificationChallenge>,
    token: &str,
    now: OffsetDateTime,
) -> Result<(), VerifyError> {
    challenge
        .ok_or(VerifyError::Invalid)
        .and_then(|c| c.verify(token, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn issued_token_is_six_digits_and_expires_in_fifteen_minutes() {
        let now = datetime!(2026-01-01 12:00 UTC);
        for _ in 0..200 {
            let challenge = VerificationChallenge::issue(now);
            assert_eq!(challenge.token.len(), 6);
            assert!(challenge.token.chars().all(|c| c.is_ascii_digit()));
            assert!(!challenge.token.starts_with('0'));
            assert_eq!(challenge.expires_at, datetime!(2026-01-01 12:15 UTC));
        }
    }

    #[test]
    fn matching_token_before_expiry_verifies() {
        let now = datetime!(2026-01-01 12:00 UTC);
        let challenge = VerificationChallenge::issue(now);
        let token = challenge.token.clone();

        assert_eq!(challenge.verify(&token, now + Duration::minutes(14)), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = datetime!(2026-01-01 12:00 UTC);
        let challenge = VerificationChallenge::issue(now);
        let token = challenge.token.clone();

        assert_eq!(
            challenge.verify(&token, now + TOKEN_TTL),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn wrong_token_is_invalid_even_when_expired() {
        let now = datetime!(2026-01-01 12:00 UTC);
        let challenge = VerificationChallenge {
            token: "123456".into(),
            expires_at: now,
        };

        assert_eq!(
            challenge.verify("654321", now + Duration::hours(1)),
            Err(VerifyError::Invalid)
        );
    }

    #[test]
    fn cleared_challenge_rejects_everything() {
        let now = datetime!(2026-01-01 12:00 UTC);
        assert_eq!(check(None, "123456", now), Err(VerifyError::Invalid));
    }
}
