//! Client side of Cognito's `USER_SRP_AUTH` flow.
//!
//! Cognito uses SRP-6a over the 3072-bit group of RFC 3526 with SHA-256, and
//! derives the password claim key with a single HKDF block.

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

const G_HEX: &str = "2";

const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key\x01";

const DERIVED_KEY_LEN: usize = 16;

/// Cognito wants the day of month without zero padding
const TIMESTAMP_FORMAT: &str = "%a %b %-d %H:%M:%S UTC %Y";

/// One SRP exchange: the ephemeral secret `a` and public value `A`
pub struct SrpSession {
    pool_name: String,
    n: BigUint,
    g: BigUint,
    k: BigUint,
    small_a: BigUint,
    large_a: BigUint,
}

impl SrpSession {
    pub fn new(user_pool_id: &str) -> Result<Self> {
        let mut bytes = [0u8; 128];
        rand::rng().fill_bytes(&mut bytes);
        Self::with_secret(user_pool_id, BigUint::from_bytes_be(&bytes))
    }

    fn with_secret(user_pool_id: &str, secret: BigUint) -> Result<Self> {
        let pool_name = user_pool_id
            .split_once('_')
            .map(|(_, name)| name.to_string())
            .with_context(|| format!("Invalid user pool id: {user_pool_id}"))?;

        let n = hex_to_big(N_HEX)?;
        let g = hex_to_big(G_HEX)?;
        let k = hex_to_big(&hex_hash(&format!("00{N_HEX}0{G_HEX}"))?)?;

        let small_a = secret % &n;
        let large_a = g.modpow(&small_a, &n);
        if large_a.bits() == 0 {
            bail!("SRP public value A is zero");
        }

        Ok(Self {
            pool_name,
            n,
            g,
            k,
            small_a,
            large_a,
        })
    }

    /// `SRP_A` auth parameter
    pub fn srp_a(&self) -> String {
        self.large_a.to_str_radix(16)
    }

    /// Answer a `PASSWORD_VERIFIER` challenge
    pub fn process_challenge(
        &self,
        password: &str,
        parameters: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, String>> {
        let param = |name: &str| {
            parameters
                .get(name)
                .map(String::as_str)
                .with_context(|| format!("{name} missing from PASSWORD_VERIFIER challenge"))
        };
        let user_id = param("USER_ID_FOR_SRP")?;
        let salt_hex = param("SALT")?;
        let srp_b_hex = param("SRP_B")?;
        let secret_block_b64 = param("SECRET_BLOCK")?;

        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let key = self.password_authentication_key(user_id, password, srp_b_hex, salt_hex)?;

        let secret_block = STANDARD
            .decode(secret_block_b64)
            .context("Failed to decode SECRET_BLOCK")?;

        let mut mac = new_hmac(&key)?;
        mac.update(self.pool_name.as_bytes());
        mac.update(user_id.as_bytes());
        mac.update(&secret_block);
        mac.update(timestamp.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(HashMap::from([
            ("TIMESTAMP".to_string(), timestamp),
            ("USERNAME".to_string(), user_id.to_string()),
            (
                "PASSWORD_CLAIM_SECRET_BLOCK".to_string(),
                secret_block_b64.to_string(),
            ),
            ("PASSWORD_CLAIM_SIGNATURE".to_string(), signature),
        ]))
    }

    fn password_authentication_key(
        &self,
        user_id: &str,
        password: &str,
        srp_b_hex: &str,
        salt_hex: &str,
    ) -> Result<Vec<u8>> {
        let large_b = hex_to_big(srp_b_hex)?;
        if (&large_b % &self.n).bits() == 0 {
            bail!("SRP server value B is invalid");
        }

        let u = hex_to_big(&hex_hash(&format!(
            "{}{}",
            pad_big(&self.large_a),
            pad_big(&large_b)
        ))?)?;
        if u.bits() == 0 {
            bail!("SRP scrambling parameter u is zero");
        }

        let identity = format!("{}{}:{}", self.pool_name, user_id, password);
        let identity_hash = format!("{:x}", Sha256::digest(identity.as_bytes()));
        let x = hex_to_big(&hex_hash(&format!("{}{identity_hash}", pad_hex(salt_hex)))?)?;

        // S = (B - k * g^x) ^ (a + u * x) mod N
        let kgx = (&self.k * self.g.modpow(&x, &self.n)) % &self.n;
        let base = ((&large_b % &self.n) + &self.n - kgx) % &self.n;
        let exponent = &self.small_a + &u * &x;
        let s = base.modpow(&exponent, &self.n);

        hkdf(&decode_hex(&pad_big(&s))?, &decode_hex(&pad_big(&u))?)
    }
}

/// Single-block HKDF-SHA256 truncated to the derived key length
fn hkdf(ikm: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    let mut extract = new_hmac(salt)?;
    extract.update(ikm);
    let prk = extract.finalize().into_bytes();

    let mut expand = new_hmac(&prk)?;
    expand.update(DERIVED_KEY_INFO);
    let okm = expand.finalize().into_bytes();

    Ok(okm[..DERIVED_KEY_LEN].to_vec())
}

fn new_hmac(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid HMAC key: {e}"))
}

/// SHA-256 of the bytes a hex string encodes, as 64 hex digits
fn hex_hash(hex: &str) -> Result<String> {
    Ok(format!("{:x}", Sha256::digest(decode_hex(hex)?)))
}

fn hex_to_big(hex: &str) -> Result<BigUint> {
    BigUint::parse_bytes(hex.as_bytes(), 16).with_context(|| format!("Invalid hex value: {hex}"))
}

fn pad_big(value: &BigUint) -> String {
    pad_hex(&value.to_str_radix(16))
}

/// Even-length hex whose leading bit is clear, so it reads as non-negative
fn pad_hex(hex: &str) -> String {
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else if hex.starts_with(['8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'A', 'B', 'C', 'D', 'E', 'F'])
    {
        format!("00{hex}")
    } else {
        hex.to_string()
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 == 1 {
        bail!("Hex value has odd length: {hex}");
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .with_context(|| format!("Invalid hex value: {hex}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn challenge() -> HashMap<String, String> {
        HashMap::from([
            ("USER_ID_FOR_SRP".to_string(), "alice".to_string()),
            ("SALT".to_string(), "a1b2c3d4".to_string()),
            ("SRP_B".to_string(), "abcdef0123456789".to_string()),
            ("SECRET_BLOCK".to_string(), STANDARD.encode(b"secret-block")),
        ])
    }

    #[test]
    fn test_pad_hex() {
        assert_eq!(pad_hex("abc"), "0abc");
        assert_eq!(pad_hex("7f"), "7f");
        assert_eq!(pad_hex("80"), "0080");
        assert_eq!(pad_hex("Ff01"), "00Ff01");
        assert_eq!(pad_hex("0"), "00");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn test_hex_hash_of_empty_input() {
        assert_eq!(
            hex_hash("").unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_group_prime_is_3072_bits() {
        assert_eq!(hex_to_big(N_HEX).unwrap().bits(), 3072);
    }

    #[test]
    fn test_srp_a_from_known_secret() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(10u32)).unwrap();
        assert_eq!(session.srp_a(), "400");
        assert_eq!(session.pool_name, "Pool");
    }

    #[test]
    fn test_random_sessions_differ() {
        let first = SrpSession::new("us-east-1_Pool").unwrap();
        let second = SrpSession::new("us-east-1_Pool").unwrap();
        assert_ne!(first.srp_a(), second.srp_a());
    }

    #[test]
    fn test_invalid_pool_id() {
        assert!(SrpSession::new("no-underscore").is_err());
    }

    #[test]
    fn test_process_challenge_response_fields() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(12345u32)).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 3, 7).unwrap();

        let response = session
            .process_challenge("hunter2", &challenge(), now)
            .unwrap();

        assert_eq!(response["TIMESTAMP"], "Mon Jan 5 09:03:07 UTC 2026");
        assert_eq!(response["USERNAME"], "alice");
        assert_eq!(
            response["PASSWORD_CLAIM_SECRET_BLOCK"],
            STANDARD.encode(b"secret-block")
        );
        let signature = STANDARD
            .decode(&response["PASSWORD_CLAIM_SIGNATURE"])
            .unwrap();
        assert_eq!(signature.len(), 32);
    }

    #[test]
    fn test_process_challenge_known_signature() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(12345u32)).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 3, 7).unwrap();

        let response = session
            .process_challenge("hunter2", &challenge(), now)
            .unwrap();

        assert_eq!(
            response["PASSWORD_CLAIM_SIGNATURE"],
            "eBqgoikV1egeSoCj4LmG1nv/KJ47vFw/1oqBQfn2c4g="
        );
    }

    #[test]
    fn test_process_challenge_is_deterministic_for_fixed_inputs() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(12345u32)).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        let first = session.process_challenge("pw", &challenge(), now).unwrap();
        let second = session.process_challenge("pw", &challenge(), now).unwrap();
        let other = session.process_challenge("other", &challenge(), now).unwrap();

        assert_eq!(
            first["PASSWORD_CLAIM_SIGNATURE"],
            second["PASSWORD_CLAIM_SIGNATURE"]
        );
        assert_ne!(
            first["PASSWORD_CLAIM_SIGNATURE"],
            other["PASSWORD_CLAIM_SIGNATURE"]
        );
    }

    #[test]
    fn test_process_challenge_rejects_b_multiple_of_n() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(7u32)).unwrap();
        let mut params = challenge();
        params.insert("SRP_B".to_string(), N_HEX.to_string());

        let err = session
            .process_challenge("pw", &params, Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("value B"));
    }

    #[test]
    fn test_process_challenge_missing_parameter() {
        let session = SrpSession::with_secret("us-east-1_Pool", BigUint::from(7u32)).unwrap();
        let mut params = challenge();
        params.remove("SALT");

        let err = session
            .process_challenge("pw", &params, Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("SALT"));
    }
}
