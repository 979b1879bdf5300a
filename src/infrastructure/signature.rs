//! Signature primitives shared by the gateway adapters.
//!
//! Every verifier works on the bytes exactly as received and returns `false`
//! instead of failing on malformed input.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Separator between digest and salt index in salted digests
pub const SALT_INDEX_SEPARATOR: &str = "###";

pub const PAYTM_CHECKSUM_FIELD: &str = "CHECKSUMHASH";

pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha256_hex(secret: &str, message: &str) -> Option<String> {
    hmac_sha256(secret.as_bytes(), message.as_bytes()).map(hex::encode)
}

pub fn sha256_hex(message: &str) -> String {
    hex::encode(Sha256::digest(message.as_bytes()))
}

pub fn sha512_hex(message: &str) -> String {
    hex::encode(Sha512::digest(message.as_bytes()))
}

/// Scheme (a): lowercase hex HMAC-SHA256 of the payload, compared case-sensitively
pub fn verify_hmac_sha256_hex(payload: &str, secret: &str, signature: &str) -> bool {
    match hmac_sha256_hex(secret, payload) {
        Some(expected) => secure_eq(expected.as_bytes(), signature.as_bytes()),
        None => false,
    }
}

pub fn sign_hmac_sha256_timestamped_base64(
    payload: &str,
    timestamp: &str,
    secret: &str,
) -> Option<String> {
    let mut message = String::with_capacity(payload.len() + timestamp.len());
    message.push_str(payload);
    message.push_str(timestamp);
    hmac_sha256(secret.as_bytes(), message.as_bytes())
        .map(|digest| base64::engine::general_purpose::STANDARD.encode(digest))
}

/// Scheme (b): base64 HMAC-SHA256 of `payload + timestamp`
pub fn verify_hmac_sha256_timestamped_base64(
    payload: &str,
    timestamp: &str,
    secret: &str,
    signature: &str,
) -> bool {
    match sign_hmac_sha256_timestamped_base64(payload, timestamp, secret) {
        Some(expected) => secure_eq(expected.as_bytes(), signature.as_bytes()),
        None => false,
    }
}

/// Scheme (c): `SHA256(payload + path + SHA256(salt_key)) + "###" + salt_index`
pub fn salted_digest(payload: &str, path: &str, salt_key: &str, salt_index: &str) -> String {
    let key_hash = sha256_hex(salt_key);
    let digest = sha256_hex(&format!("{}{}{}", payload, path, key_hash));
    format!("{}{}{}", digest, SALT_INDEX_SEPARATOR, salt_index)
}

pub fn verify_salted_digest(
    payload: &str,
    path: &str,
    salt_key: &str,
    salt_index: &str,
    signature: &str,
) -> bool {
    let expected = salted_digest(payload, path, salt_key, salt_index);
    secure_eq(expected.as_bytes(), signature.as_bytes())
}

/// Stripe's `t=<unix>,v1=<hex>` header over `"{t}.{payload}"`; any matching v1 entry passes
pub fn verify_stripe_signature(payload: &str, header: &str, secret: &str) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    let Some(expected) = hmac_sha256_hex(secret, &format!("{}.{}", timestamp, payload)) else {
        return false;
    };

    candidates
        .iter()
        .any(|candidate| secure_eq(expected.as_bytes(), candidate.as_bytes()))
}

/// HMAC-SHA256 hex over the values of `params` in key order, joined by `|`.
/// `CHECKSUMHASH` itself never takes part.
pub fn paytm_checksum(params: &BTreeMap<String, String>, merchant_key: &str) -> Option<String> {
    let joined = params
        .iter()
        .filter(|(key, _)| key.as_str() != PAYTM_CHECKSUM_FIELD)
        .map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join("|");
    hmac_sha256_hex(merchant_key, &joined)
}

pub fn verify_paytm_checksum(
    params: &BTreeMap<String, String>,
    merchant_key: &str,
    signature: &str,
) -> bool {
    match paytm_checksum(params, merchant_key) {
        Some(expected) => secure_eq(expected.as_bytes(), signature.as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_eq() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_hmac_hex_known_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha256_hex("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_hex_is_case_sensitive() {
        let payload = r#"{"event":"payment.captured"}"#;
        let signature = hmac_sha256_hex("whsec", payload).unwrap();
        assert!(verify_hmac_sha256_hex(payload, "whsec", &signature));
        assert!(!verify_hmac_sha256_hex(
            payload,
            "whsec",
            &signature.to_ascii_uppercase()
        ));
    }

    #[test]
    fn test_timestamped_signature_rejects_any_single_byte_mutation() {
        let payload = r#"{"data":{"order":{"order_id":"cf_1"}}}"#;
        let timestamp = "1700000000";
        let secret = "cf_secret";
        let signature = sign_hmac_sha256_timestamped_base64(payload, timestamp, secret).unwrap();

        assert!(verify_hmac_sha256_timestamped_base64(
            payload, timestamp, secret, &signature
        ));

        for i in 0..payload.len() {
            let mut bytes = payload.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let mutated = String::from_utf8_lossy(&bytes).to_string();
            assert!(
                !verify_hmac_sha256_timestamped_base64(&mutated, timestamp, secret, &signature),
                "payload mutation at {} accepted",
                i
            );
        }

        for i in 0..timestamp.len() {
            let mut bytes = timestamp.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let mutated = String::from_utf8_lossy(&bytes).to_string();
            assert!(!verify_hmac_sha256_timestamped_base64(
                payload, &mutated, secret, &signature
            ));
        }

        for i in 0..signature.len() {
            let mut bytes = signature.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let mutated = String::from_utf8_lossy(&bytes).to_string();
            assert!(!verify_hmac_sha256_timestamped_base64(
                payload, timestamp, secret, &mutated
            ));
        }
    }

    #[test]
    fn test_salted_digest_carries_index_suffix() {
        let signature = salted_digest("eyJzdWNjZXNzIjp0cnVlfQ==", "/pg/v1/status", "salt", "1");
        assert!(signature.ends_with("###1"));
        assert_eq!(signature.len(), 64 + 4);
        assert!(verify_salted_digest(
            "eyJzdWNjZXNzIjp0cnVlfQ==",
            "/pg/v1/status",
            "salt",
            "1",
            &signature
        ));
        assert!(!verify_salted_digest(
            "eyJzdWNjZXNzIjp0cnVlfQ==",
            "/pg/v1/status",
            "salt",
            "2",
            &signature
        ));
    }

    #[test]
    fn test_stripe_header() {
        let payload = r#"{"id":"evt_1"}"#;
        let v1 = hmac_sha256_hex("whsec_test", &format!("1700000000.{}", payload)).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={}", v1);
        assert!(verify_stripe_signature(payload, &header, "whsec_test"));
        assert!(!verify_stripe_signature(payload, "v1=abc", "whsec_test"));
        assert!(!verify_stripe_signature(payload, "garbage", "whsec_test"));
    }

    #[test]
    fn test_paytm_checksum_ignores_order_and_own_field() {
        let mut params = BTreeMap::new();
        params.insert("STATUS".to_string(), "TXN_SUCCESS".to_string());
        params.insert("ORDERID".to_string(), "PTM_1".to_string());
        params.insert("MID".to_string(), "MID001".to_string());

        let checksum = paytm_checksum(&params, "mkey").unwrap();
        assert_eq!(
            checksum,
            hmac_sha256_hex("mkey", "MID001|PTM_1|TXN_SUCCESS").unwrap()
        );

        params.insert(PAYTM_CHECKSUM_FIELD.to_string(), checksum.clone());
        assert!(verify_paytm_checksum(&params, "mkey", &checksum));
        assert!(!verify_paytm_checksum(&params, "other", &checksum));
    }

    #[test]
    fn test_malformed_inputs_return_false() {
        assert!(!verify_hmac_sha256_hex("", "", ""));
        assert!(!verify_hmac_sha256_timestamped_base64("x", "", "k", "not base64"));
        assert!(!verify_salted_digest("x", "", "", "", ""));
    }
}
