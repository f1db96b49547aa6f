use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const REFERRAL_CODE_LENGTH: usize = 6;

/// Hashes a password with Argon2id. Returns a PHC string.
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Could not hash password: {}", e))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if hash.is_empty() {
        return false;
    }

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// Collisions with existing codes are not checked.
pub fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Time based one time passwords (RFC 6238, HMAC-SHA256).
///
/// Codes are bound to a subject, usually a user id: the HMAC key is the
/// shared secret followed by the subject bytes, so a code issued for one
/// user never verifies for another. An empty subject yields plain RFC 6238
/// codes.
#[derive(Clone)]
pub struct OtpGenerator {
    secret: Arc<Vec<u8>>,
    step_seconds: u64,
    digits: u32,
}

impl OtpGenerator {
    pub fn new(secret: Vec<u8>, step_seconds: u64, digits: u32) -> Self {
        Self {
            secret: Arc::new(secret),
            step_seconds: step_seconds.max(1),
            digits: digits.clamp(4, 9),
        }
    }

    /// A generator with a process-local random secret.
    pub fn random(step_seconds: u64, digits: u32) -> Self {
        let mut secret = vec![0u8; 20];
        rand::thread_rng().fill_bytes(&mut secret);

        Self::new(secret, step_seconds, digits)
    }

    pub fn generate(&self, subject: &str) -> Result<String, anyhow::Error> {
        self.generate_at(subject, unix_now())
    }

    pub fn generate_at(&self, subject: &str, unix_seconds: u64) -> Result<String, anyhow::Error> {
        self.code_for_counter(subject, unix_seconds / self.step_seconds)
    }

    pub fn verify(&self, subject: &str, code: &str) -> bool {
        self.verify_at(subject, code, unix_now())
    }

    /// Accepts the code for the current step and both adjacent steps.
    pub fn verify_at(&self, subject: &str, code: &str, unix_seconds: u64) -> bool {
        let code = code.trim();
        let counter = unix_seconds / self.step_seconds;

        [counter.saturating_sub(1), counter, counter + 1]
            .iter()
            .filter_map(|c| self.code_for_counter(subject, *c).ok())
            .any(|expected| expected == code)
    }

    fn code_for_counter(&self, subject: &str, counter: u64) -> Result<String, anyhow::Error> {
        let mut key = Vec::with_capacity(self.secret.len() + subject.len());
        key.extend_from_slice(&self.secret);
        key.extend_from_slice(subject.as_bytes());

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("Invalid OTP secret: {}", e))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = ((digest[offset] as u32 & 0x7f) << 24)
            | ((digest[offset + 1] as u32) << 16)
            | ((digest[offset + 2] as u32) << 8)
            | (digest[offset + 3] as u32);
        let code = binary % 10_u32.pow(self.digits);

        Ok(format!("{:0width$}", code, width = self.digits as usize))
    }
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890123456789012";

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("abcdef").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "abcdef"));
        assert!(!verify_password(&hash, "abcdeg"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("", "abcdef"));
        assert!(!verify_password("not-a-phc-string", "abcdef"));
    }

    #[test]
    fn referral_codes_are_six_alphanumerics() {
        for _ in 0..50 {
            let code = generate_referral_code();
            assert_eq!(code.len(), REFERRAL_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn totp_matches_rfc_6238_sha256_vectors() {
        let otp = OtpGenerator::new(RFC_SECRET.to_vec(), 30, 8);

        assert_eq!(otp.generate_at("", 59).unwrap(), "46119246");
        assert_eq!(otp.generate_at("", 1111111109).unwrap(), "68084774");
        assert_eq!(otp.generate_at("", 1111111111).unwrap(), "67062674");
        assert_eq!(otp.generate_at("", 1234567890).unwrap(), "91819424");
        assert_eq!(otp.generate_at("", 2000000000).unwrap(), "90698825");
    }

    #[test]
    fn otp_verification_tolerates_one_step_of_drift() {
        let otp = OtpGenerator::new(RFC_SECRET.to_vec(), 30, 6);
        let code = otp.generate_at("u-1", 1_000_000).unwrap();

        assert_eq!(code.len(), 6);
        assert!(otp.verify_at("u-1", &code, 1_000_000));
        assert!(otp.verify_at("u-1", &code, 1_000_000 + 30));
        assert!(!otp.verify_at("u-1", &code, 1_000_000 + 120));
        assert!(!otp.verify_at("u-1", "", 1_000_000));
    }

    #[test]
    fn codes_are_bound_to_their_subject() {
        let otp = OtpGenerator::new(RFC_SECRET.to_vec(), 30, 8);
        let at = 1_700_000_000;

        let code = otp.generate_at("alice", at).unwrap();
        assert!(otp.verify_at("alice", &code, at));
        assert!(!otp.verify_at("bob", &code, at));
        assert_ne!(code, otp.generate_at("bob", at).unwrap());
    }

    #[test]
    fn random_generators_do_not_share_secrets() {
        let a = OtpGenerator::random(30, 6);
        let b = OtpGenerator::random(30, 6);
        let at = 1_700_000_000;

        // Two 6 digit codes from independent secrets collide with p = 1e-6.
        let codes: Vec<String> = (0..4)
            .map(|i| a.generate_at("u-1", at + i * 30).unwrap())
            .collect();
        let others: Vec<String> = (0..4)
            .map(|i| b.generate_at("u-1", at + i * 30).unwrap())
            .collect();
        assert_ne!(codes, others);
    }
}
