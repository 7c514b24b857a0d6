//! # Request Signing
//!
//! Every provider authenticates requests and notifications with a keyed hash
//! over an ordered list of fields. The strategies differ only in how the
//! fields are combined and which digest is used.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ConcatHmacSha256   base64(HMAC-SHA256(key, f1 + f2 + ... + fn))        │
//! │  JoinedHmacSha512   base64(HMAC-SHA512(key, f1 | f2 | ... | fn))        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Verification decodes the presented signature and compares MACs in
//! constant time.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::error::{GatewayError, GatewayResult};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Keyed hash over an ordered field list.
pub trait RequestSigner: Send + Sync {
    /// Short algorithm name for logs.
    fn algorithm(&self) -> &'static str;

    /// Base64 signature of `fields` in the given order.
    fn sign(&self, fields: &[&str]) -> String;

    /// Checks `signature` against `fields`. Never panics on bad input.
    fn verify(&self, fields: &[&str], signature: &str) -> bool;
}

// =============================================================================
// HMAC-SHA256 over concatenated fields
// =============================================================================

/// Fields concatenated with no separator. Salts are passed as ordinary
/// fields at the position the provider expects them.
#[derive(Clone)]
pub struct ConcatHmacSha256 {
    keyed: HmacSha256,
}

impl ConcatHmacSha256 {
    pub fn new(key: impl AsRef<[u8]>) -> GatewayResult<Self> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(key.as_ref())
            .map_err(|e| GatewayError::Config(format!("invalid signing key: {}", e)))?;
        Ok(ConcatHmacSha256 { keyed })
    }

    fn mac(&self, fields: &[&str]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        for field in fields {
            mac.update(field.as_bytes());
        }
        mac
    }
}

impl RequestSigner for ConcatHmacSha256 {
    fn algorithm(&self) -> &'static str {
        "hmac-sha256-concat"
    }

    fn sign(&self, fields: &[&str]) -> String {
        STANDARD.encode(self.mac(fields).finalize().into_bytes())
    }

    fn verify(&self, fields: &[&str], signature: &str) -> bool {
        match STANDARD.decode(signature.trim()) {
            Ok(bytes) => self.mac(fields).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for ConcatHmacSha256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatHmacSha256").field("key", &"***").finish()
    }
}

// =============================================================================
// HMAC-SHA512 over joined fields
// =============================================================================

/// Fields joined with a separator (`|` by default).
#[derive(Clone)]
pub struct JoinedHmacSha512 {
    keyed: HmacSha512,
    separator: char,
}

impl JoinedHmacSha512 {
    pub fn new(key: impl AsRef<[u8]>) -> GatewayResult<Self> {
        let keyed = <HmacSha512 as Mac>::new_from_slice(key.as_ref())
            .map_err(|e| GatewayError::Config(format!("invalid signing key: {}", e)))?;
        Ok(JoinedHmacSha512 { keyed, separator: '|' })
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    fn mac(&self, fields: &[&str]) -> HmacSha512 {
        let mut mac = self.keyed.clone();
        let mut separator = [0u8; 4];
        let separator = self.separator.encode_utf8(&mut separator).as_bytes();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                mac.update(separator);
            }
            mac.update(field.as_bytes());
        }
        mac
    }
}

impl RequestSigner for JoinedHmacSha512 {
    fn algorithm(&self) -> &'static str {
        "hmac-sha512-joined"
    }

    fn sign(&self, fields: &[&str]) -> String {
        STANDARD.encode(self.mac(fields).finalize().into_bytes())
    }

    fn verify(&self, fields: &[&str], signature: &str) -> bool {
        match STANDARD.decode(signature.trim()) {
            Ok(bytes) => self.mac(fields).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for JoinedHmacSha512 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinedHmacSha512")
            .field("key", &"***")
            .field("separator", &self.separator)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_matches_single_message() {
        let signer = ConcatHmacSha256::new("merchant-key").unwrap();
        let split = signer.sign(&["INV-1", "salt", "success", "25000"]);
        let joined = signer.sign(&["INV-1saltsuccess25000"]);
        assert_eq!(split, joined);
        assert!(signer.verify(&["INV-1", "salt", "success", "25000"], &split));
    }

    #[test]
    fn test_concat_rejects_tampering() {
        let signer = ConcatHmacSha256::new("merchant-key").unwrap();
        let signature = signer.sign(&["INV-1", "salt", "success", "25000"]);

        assert!(!signer.verify(&["INV-1", "salt", "success", "99999"], &signature));
        assert!(!ConcatHmacSha256::new("other-key").unwrap().verify(&["INV-1", "salt", "success", "25000"], &signature));
        assert!(!signer.verify(&["INV-1", "salt", "success", "25000"], "not base64!"));
        assert!(!signer.verify(&["INV-1", "salt", "success", "25000"], ""));
    }

    #[test]
    fn test_joined_uses_separator() {
        let signer = JoinedHmacSha512::new("store-key").unwrap();
        let signature = signer.sign(&["ORD-1", "00", "250.00"]);

        // Same bytes without separators must not verify.
        assert!(!signer.verify(&["ORD-100250.00"], &signature));
        assert!(signer.verify(&["ORD-1|00|250.00"], &signature));
        assert!(signer.verify(&["ORD-1", "00", "250.00"], &signature));

        let semicolon = JoinedHmacSha512::new("store-key").unwrap().with_separator(';');
        assert_ne!(semicolon.sign(&["ORD-1", "00", "250.00"]), signature);
    }

    #[test]
    fn test_sha512_signature_length() {
        let signature = JoinedHmacSha512::new("k").unwrap().sign(&["a"]);
        assert_eq!(STANDARD.decode(signature).unwrap().len(), 64);
        let signature = ConcatHmacSha256::new("k").unwrap().sign(&["a"]);
        assert_eq!(STANDARD.decode(signature).unwrap().len(), 32);
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", ConcatHmacSha256::new("secret").unwrap());
        assert!(!debug.contains("secret"));
    }
}
