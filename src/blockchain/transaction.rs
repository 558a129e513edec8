//! Transactions: coinbase and ordinary spends, trimmed-copy signing, and
//! id computation (§4.4).

use serde::{Deserialize, Serialize};

use crate::config::SUBSIDY;
use crate::crypto::hash::sha256;
use crate::crypto::keys::{address_from_pub_key, pub_key_hash_from_address, Wallet};
use crate::crypto::signatures::{sign_prehash, verify_prehash};
use crate::error::{Error, Result};

/// A reference to a previous transaction's output, plus its unlocking
/// signature and the spender's public key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    pub tx_id: [u8; 32],
    pub out_index: u32,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub pub_key: Vec<u8>,
}

impl TxInput {
    /// True if `pub_key` hashes to the same pub-key-hash as `address`.
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        crate::crypto::hash::hash_pub_key(&self.pub_key) == pub_key_hash
    }
}

/// A value locked to whoever can prove ownership of the key hashing to
/// `pub_key_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: Vec<u8>,
}

impl TxOutput {
    pub fn lock(value: u64, address: &str) -> Result<Self> {
        let pub_key_hash = pub_key_hash_from_address(address)?;
        Ok(Self { value, pub_key_hash })
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: [u8; 32],
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// The view hashed to produce a transaction's id — inputs and outputs only,
/// with no `id` field to zero out (§4.4/SPEC_FULL.md Open Question #1).
#[derive(Serialize)]
struct TxPreimage<'a> {
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
}

fn compute_id(inputs: &[TxInput], outputs: &[TxOutput]) -> Result<[u8; 32]> {
    let preimage = TxPreimage { inputs, outputs };
    let encoded = bincode::serialize(&preimage)?;
    Ok(sha256(&encoded))
}

impl Transaction {
    /// A coinbase transaction: one input referencing nothing, carrying
    /// `data` as an arbitrary miner tag, paying the fixed subsidy to `to`.
    /// An empty `data` is replaced with 20 random bytes so that coinbase ids
    /// do not collide across identical reward addresses.
    pub fn new_coinbase(to: &str, data: Vec<u8>) -> Result<Self> {
        let data = if data.is_empty() {
            let mut bytes = [0u8; 20];
            rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
            bytes.to_vec()
        } else {
            data
        };

        let input = TxInput {
            tx_id: [0u8; 32],
            out_index: u32::MAX,
            signature: Vec::new(),
            pub_key: data,
        };
        let output = TxOutput::lock(SUBSIDY, to)?;
        let inputs = vec![input];
        let outputs = vec![output];
        let id = compute_id(&inputs, &outputs)?;
        Ok(Self { id, inputs, outputs })
    }

    /// True for the single-input, sourceless coinbase shape.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].tx_id == [0u8; 32]
            && self.inputs[0].out_index == u32::MAX
    }

    /// Builds an ordinary transaction spending `spendable` (tx_id, out_index,
    /// value triples already selected to cover `amount`), paying `amount` to
    /// `to` and any change back to `from`. Does not sign the inputs.
    pub fn new_unsigned(
        from_wallet: &Wallet,
        to: &str,
        amount: u64,
        spendable: Vec<(([u8; 32], u32), u64)>,
        total: u64,
    ) -> Result<Self> {
        let pub_key = from_wallet.public_key().to_vec();
        let from_address = from_wallet.address();

        let mut inputs = Vec::with_capacity(spendable.len());
        for ((tx_id, out_index), _value) in spendable {
            inputs.push(TxInput {
                tx_id,
                out_index,
                signature: Vec::new(),
                pub_key: pub_key.clone(),
            });
        }

        let mut outputs = vec![TxOutput::lock(amount, to)?];
        if total > amount {
            outputs.push(TxOutput::lock(total - amount, &from_address)?);
        }

        let id = compute_id(&inputs, &outputs)?;
        Ok(Self { id, inputs, outputs })
    }

    /// Builds the trimmed copy used as the per-input signing document: every
    /// input's signature and pub_key are cleared except the input currently
    /// being signed, whose `pub_key` is replaced with the referenced output's
    /// `pub_key_hash` (§9).
    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                tx_id: input.tx_id,
                out_index: input.out_index,
                signature: Vec::new(),
                pub_key: Vec::new(),
            })
            .collect();
        Transaction {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Signs every input against the transactions it references.
    /// `prev_txs` maps a referenced tx id to that transaction (must contain
    /// an entry for every input's `tx_id`).
    pub fn sign(
        &mut self,
        signing_key: &p256::ecdsa::SigningKey,
        prev_txs: &std::collections::HashMap<[u8; 32], Transaction>,
    ) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.tx_id) {
                return Err(Error::BadRequest);
            }
        }

        let mut trimmed = self.trimmed_copy();

        for i in 0..self.inputs.len() {
            let prev_tx = &prev_txs[&self.inputs[i].tx_id];
            let referenced_output = prev_tx
                .outputs
                .get(self.inputs[i].out_index as usize)
                .ok_or(Error::BadRequest)?;

            trimmed.inputs[i].pub_key = referenced_output.pub_key_hash.clone();
            let digest = compute_id(&trimmed.inputs, &trimmed.outputs)?;
            trimmed.inputs[i].pub_key = Vec::new();

            let signature = sign_prehash(signing_key, &digest)?;
            self.inputs[i].signature = signature.to_vec();
        }

        Ok(())
    }

    /// Verifies every input's signature against the transactions it
    /// references.
    pub fn verify(&self, prev_txs: &std::collections::HashMap<[u8; 32], Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.tx_id) {
                return Err(Error::BadRequest);
            }
        }

        let mut trimmed = self.trimmed_copy();

        for i in 0..self.inputs.len() {
            let prev_tx = &prev_txs[&self.inputs[i].tx_id];
            let referenced_output = prev_tx
                .outputs
                .get(self.inputs[i].out_index as usize)
                .ok_or(Error::BadRequest)?;

            trimmed.inputs[i].pub_key = referenced_output.pub_key_hash.clone();
            let digest = compute_id(&trimmed.inputs, &trimmed.outputs)?;
            trimmed.inputs[i].pub_key = Vec::new();

            let ok = verify_prehash(&self.inputs[i].pub_key, &digest, &self.inputs[i].signature)?;
            if !ok {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Derives the address locking a normal (non-coinbase) input's referenced
/// output, from the spender's public key.
pub fn input_source_address(input: &TxInput) -> String {
    address_from_pub_key(&input.pub_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn coinbase_has_fixed_subsidy_and_no_real_input() {
        let wallet = Wallet::new();
        let tx = Transaction::new_coinbase(&wallet.address(), Vec::new()).unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, SUBSIDY);
    }

    #[test]
    fn coinbase_id_is_deterministic_given_explicit_data() {
        let wallet = Wallet::new();
        let tx1 = Transaction::new_coinbase(&wallet.address(), b"tag".to_vec()).unwrap();
        let tx2 = Transaction::new_coinbase(&wallet.address(), b"tag".to_vec()).unwrap();
        assert_eq!(tx1.id, tx2.id);
    }

    #[test]
    fn coinbase_ids_differ_with_random_data() {
        let wallet = Wallet::new();
        let tx1 = Transaction::new_coinbase(&wallet.address(), Vec::new()).unwrap();
        let tx2 = Transaction::new_coinbase(&wallet.address(), Vec::new()).unwrap();
        assert_ne!(tx1.id, tx2.id);
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let from = Wallet::new();
        let to = Wallet::new();

        let funding = Transaction::new_coinbase(&from.address(), Vec::new()).unwrap();
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        let spendable = vec![((funding.id, 0u32), funding.outputs[0].value)];
        let mut tx = Transaction::new_unsigned(
            &from,
            &to.address(),
            funding.outputs[0].value,
            spendable,
            funding.outputs[0].value,
        )
        .unwrap();

        tx.sign(&from.signing_key().unwrap(), &prev_txs).unwrap();
        assert!(tx.verify(&prev_txs).unwrap());
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let from = Wallet::new();
        let to = Wallet::new();

        let funding = Transaction::new_coinbase(&from.address(), Vec::new()).unwrap();
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        let spendable = vec![((funding.id, 0u32), funding.outputs[0].value)];
        let mut tx = Transaction::new_unsigned(
            &from,
            &to.address(),
            funding.outputs[0].value,
            spendable,
            funding.outputs[0].value,
        )
        .unwrap();

        tx.sign(&from.signing_key().unwrap(), &prev_txs).unwrap();
        tx.inputs[0].signature[0] ^= 0xFF;
        assert!(!tx.verify(&prev_txs).unwrap());
    }

    #[test]
    fn change_output_returned_when_spending_more_than_amount() {
        let from = Wallet::new();
        let to = Wallet::new();

        let funding = Transaction::new_coinbase(&from.address(), Vec::new()).unwrap();
        let spendable = vec![((funding.id, 0u32), funding.outputs[0].value)];
        let tx = Transaction::new_unsigned(&from, &to.address(), 4, spendable, funding.outputs[0].value)
            .unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 4);
        assert_eq!(tx.outputs[1].value, funding.outputs[0].value - 4);
    }
}
