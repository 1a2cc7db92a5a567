//! Cryptographic primitives for ForgeChain

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{SCHNORR_SIGNATURE_SIZE, SECRET_KEY_SIZE},
    schnorr::Signature,
    All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// 32-byte x-only public key as carried in block headers and transactions.
pub type PublicKeyBytes = [u8; 32];

/// 64-byte Schnorr signature.
pub type SignatureBytes = [u8; SCHNORR_SIGNATURE_SIZE];

pub type Sha256Hash = [u8; 32];

/// Numeric account identifier derived from a public key.
pub type AccountId = u64;

pub fn sha256(data: &[u8]) -> Sha256Hash {
    Sha256::digest(data).into()
}

/// Takes the first 8 bytes of a full hash, reversed, as an unsigned integer.
///
/// Used for block ids, transaction ids and account ids alike.
pub fn full_hash_to_id(hash: &Sha256Hash) -> u64 {
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(first)
}

/// Account id of the holder of `public_key`.
pub fn account_id(public_key: &PublicKeyBytes) -> AccountId {
    full_hash_to_id(&sha256(public_key))
}

/// Parse an unsigned decimal id as used in structured representations.
pub fn parse_unsigned_id(s: &str) -> Result<u64, ChainError> {
    s.parse::<u64>()
        .map_err(|e| ChainError::NotValid(format!("Invalid id '{}': {}", s, e)))
}

pub fn parse_hex_array<const N: usize>(field: &str, hex_str: &str) -> Result<[u8; N], ChainError> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != N {
        return Err(ChainError::NotValid(format!(
            "{} must be {} bytes, got {}",
            field,
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    keypair: Keypair,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, ChainError> {
        let secret_key = SecretKey::new(&mut OsRng);
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        KeyPair {
            keypair: Keypair::from_secret_key(&SECP256K1_CONTEXT, &secret_key),
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Deterministic key derivation from a passphrase, handy for tests and devnets.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, ChainError> {
        Self::from_secret_bytes(&sha256(passphrase.as_bytes()))
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        self.keypair.x_only_public_key().0.serialize()
    }

    pub fn account_id(&self) -> AccountId {
        account_id(&self.public_key())
    }

    /// Signs SHA-256(`message`) and returns the 64-byte Schnorr signature.
    pub fn sign(&self, message: &[u8]) -> Result<SignatureBytes, ChainError> {
        let digest = sha256(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;
        let signature = SECP256K1_CONTEXT.sign_schnorr_no_aux_rand(&message, &self.keypair);
        Ok(signature.serialize())
    }
}

/// Verifies a Schnorr signature over SHA-256(`message`).
pub fn verify_signature(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), ChainError> {
    let public_key = XOnlyPublicKey::from_slice(public_key)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;

    let digest = sha256(message);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_slice(signature)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_schnorr(&signature, &message, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Hello, ForgeChain!";

        let signature = keypair.sign(message).unwrap();
        let result = verify_signature(&keypair.public_key(), message, &signature);
        assert!(result.is_ok());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let keypair = KeyPair::from_passphrase("forger").unwrap();
        assert_eq!(keypair.sign(b"abc").unwrap(), keypair.sign(b"abc").unwrap());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::generate().unwrap();

        let message = b"Test message";
        let signature = keypair1.sign(message).unwrap();

        let result = verify_signature(&keypair2.public_key(), message, &signature);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Original message").unwrap();

        let result = verify_signature(&keypair.public_key(), b"Tampered message", &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_full_hash_to_id_reverses_first_eight_bytes() {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(full_hash_to_id(&hash), 0x0807060504030201);
    }

    #[test]
    fn test_account_id_matches_keypair() {
        let keypair = KeyPair::from_passphrase("alice").unwrap();
        assert_eq!(keypair.account_id(), account_id(&keypair.public_key()));
        assert_ne!(
            keypair.account_id(),
            KeyPair::from_passphrase("bob").unwrap().account_id()
        );
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result.unwrap_err().to_string().contains("Secret key must be"));
    }

    #[test]
    fn test_parse_hex_array_length_check() {
        assert!(parse_hex_array::<4>("field", "00112233").is_ok());
        assert!(parse_hex_array::<4>("field", "0011").is_err());
        assert!(parse_hex_array::<4>("field", "zz").is_err());
    }
}
