//! One-time passcode generation and comparison.

use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::models::OTP_LENGTH;

/// Draw `OTP_LENGTH` independent decimal digits from the OS CSPRNG.
pub fn generate_otp() -> String {
    let mut rng = OsRng;
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Constant-time comparison; differing lengths never match.
pub fn otp_matches(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}
