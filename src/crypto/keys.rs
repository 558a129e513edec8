//! Wallets: P-256 keypairs, address derivation, and the `wallet.dat`
//! persistence format.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::config::{ADDRESS_CHECKSUM_LEN, ADDRESS_VERSION};
use crate::crypto::base58;
use crate::crypto::hash::hash_pub_key;
use crate::crypto::signatures::{public_key_to_bytes, verifying_key_from_bytes};
use crate::error::{Error, Result};

/// A single keypair plus its cached public key bytes. Private keys are
/// stored as the raw 32-byte P-256 scalar.
#[derive(Clone, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(with = "serde_bytes")]
    private_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            private_key: signing_key.to_bytes().to_vec(),
            public_key: public_key_to_bytes(&verifying_key).to_vec(),
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_slice(&self.private_key).map_err(|_| Error::Internal("corrupt wallet key".into()))
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        verifying_key_from_bytes(&self.public_key)
    }

    /// Derives this wallet's Base58Check address from its public key.
    pub fn address(&self) -> String {
        address_from_pub_key(&self.public_key)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives a Base58Check address from a raw 64-byte public key, per §4.2.
pub fn address_from_pub_key(pub_key: &[u8]) -> String {
    let pub_key_hash = hash_pub_key(pub_key);
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len());
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&pub_key_hash);
    base58::encode_check(&payload)
}

/// Recovers the public-key-hash payload (without version/checksum) from an
/// address string, validating the checksum.
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>> {
    let payload = base58::decode_check(address).ok_or(Error::BadRequest)?;
    if payload.is_empty() || payload[0] != ADDRESS_VERSION {
        return Err(Error::BadRequest);
    }
    Ok(payload[1..].to_vec())
}

/// Validates that `address` is well-formed: decodes, has the expected
/// version byte, and a 20-byte hash payload.
pub fn validate_address(address: &str) -> bool {
    match base58::decode_check(address) {
        Some(payload) => payload.len() == 1 + 20 && payload[0] == ADDRESS_VERSION,
        None => false,
    }
}

/// In-memory map of address to wallet, persisted as a single `bincode`-
/// encoded file (§4.7, §6).
#[derive(Default, Serialize, Deserialize)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads wallets from `path`, returning an empty set if the file does
    /// not yet exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read(path)?;
        let wallets = bincode::deserialize(&data)?;
        Ok(Self { wallets })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = bincode::serialize(&self.wallets)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Creates a new wallet, stores it under its own address, and returns
    /// that address.
    pub fn create_wallet(&mut self) -> String {
        let wallet = Wallet::new();
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        address
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.wallets.keys().cloned().collect();
        addrs.sort();
        addrs
    }
}
