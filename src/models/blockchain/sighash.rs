//! Signature hashing and ECDSA signing of transaction inputs.
//!
//! The digest follows the BIP-143 layout with the fork id flag set. Two hash
//! types are used by the engine:
//!
//! * `ALL|FORKID` commits to every input and output. Ordinary transfers and
//!   the accepting side of a swap use it.
//! * `SINGLE|ANYONECANPAY|FORKID` commits only to the signed input and the
//!   output at the same index, so further inputs and outputs can be appended
//!   by someone else without invalidating it. Swap proposals use it.

use secp256k1::ecdsa::Signature;
use secp256k1::Message;
use secp256k1::PublicKey;
use secp256k1::Secp256k1;
use secp256k1::SecretKey;
use serde::Deserialize;
use serde::Serialize;

use super::encoding::sha256d;
use super::encoding::write_var_bytes;
use super::script::parse_pushes;
use super::script::push_data;
use super::script::push_len;
use super::script::Script;
use super::transaction::Transaction;

const SIGHASH_ALL: u8 = 0x01;
const SIGHASH_SINGLE: u8 = 0x03;
const SIGHASH_FORKID: u8 = 0x40;
const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// longest DER signature plus the hash type byte
pub const MAX_SIGNATURE_LEN: usize = 73;
pub const PUBKEY_LEN: usize = 33;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum SighashType {
    #[strum(to_string = "ALL|FORKID")]
    All,
    #[strum(to_string = "SINGLE|ANYONECANPAY|FORKID")]
    SingleAnyoneCanPay,
}

impl SighashType {
    pub fn byte(&self) -> u8 {
        match self {
            Self::All => SIGHASH_ALL | SIGHASH_FORKID,
            Self::SingleAnyoneCanPay => SIGHASH_SINGLE | SIGHASH_ANYONECANPAY | SIGHASH_FORKID,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        [Self::All, Self::SingleAnyoneCanPay]
            .into_iter()
            .find(|t| t.byte() == byte)
    }

    fn anyone_can_pay(&self) -> bool {
        self.byte() & SIGHASH_ANYONECANPAY != 0
    }

    fn single(&self) -> bool {
        self.byte() & 0x1f == SIGHASH_SINGLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SigningError {
    #[error("input index {index} out of range for {count} inputs")]
    InputOutOfRange { index: usize, count: usize },

    #[error("unlocking script of input {0} is not `<signature> <pubkey>`")]
    MalformedUnlockingScript(usize),

    #[error("unknown sighash type byte {0:#04x}")]
    UnknownSighashType(u8),

    #[error("signature of input {0} does not verify")]
    InvalidSignature(usize),

    #[error("pubkey of input {0} does not own the spent output")]
    WrongKey(usize),

    #[error("secp256k1: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Digest signed for input `index`, which spends an output locked by
/// `script_code` holding `value`.
pub fn signature_hash(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32], SigningError> {
    let input = tx.inputs.get(index).ok_or(SigningError::InputOutOfRange {
        index,
        count: tx.inputs.len(),
    })?;

    let hash_prevouts = if sighash_type.anyone_can_pay() {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(36 * tx.inputs.len());
        for i in &tx.inputs {
            buf.extend_from_slice(&i.prev_out.to_wire_bytes());
        }
        sha256d(&buf)
    };

    let hash_sequence = if sighash_type.anyone_can_pay() || sighash_type.single() {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(4 * tx.inputs.len());
        for i in &tx.inputs {
            buf.extend_from_slice(&i.sequence.to_le_bytes());
        }
        sha256d(&buf)
    };

    let hash_outputs = if !sighash_type.single() {
        let mut buf = vec![];
        for o in &tx.outputs {
            o.encode_into(&mut buf);
        }
        sha256d(&buf)
    } else if let Some(output) = tx.outputs.get(index) {
        let mut buf = vec![];
        output.encode_into(&mut buf);
        sha256d(&buf)
    } else {
        [0u8; 32]
    };

    let mut preimage = Vec::with_capacity(160 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&input.prev_out.to_wire_bytes());
    write_var_bytes(&mut preimage, script_code.as_bytes());
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&u32::from(sighash_type.byte()).to_le_bytes());

    Ok(sha256d(&preimage))
}

/// DER signature with the hash type byte appended.
pub fn sign_input(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: u64,
    sighash_type: SighashType,
    secret_key: &SecretKey,
) -> Result<Vec<u8>, SigningError> {
    let digest = signature_hash(tx, index, script_code, value, sighash_type)?;
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa(&Message::from_digest(digest), secret_key);
    let mut sig = signature.serialize_der().to_vec();
    sig.push(sighash_type.byte());
    Ok(sig)
}

/// `<sig> <pubkey>` unlocking script, optionally followed by extra pushes.
pub fn unlocking_script(signature: &[u8], public_key: &PublicKey, extra: &[&[u8]]) -> Script {
    let mut buf = vec![];
    push_data(&mut buf, signature);
    push_data(&mut buf, &public_key.serialize());
    for item in extra {
        push_data(&mut buf, item);
    }
    Script::new(buf)
}

/// Worst case unlocking script used for fee estimation before signing.
pub fn placeholder_unlocking_script(extra: &[&[u8]]) -> Script {
    let mut buf = vec![];
    push_data(&mut buf, &[0u8; MAX_SIGNATURE_LEN]);
    push_data(&mut buf, &[0u8; PUBKEY_LEN]);
    for item in extra {
        push_data(&mut buf, item);
    }
    Script::new(buf)
}

/// byte length of [placeholder_unlocking_script] without extra pushes
pub fn placeholder_unlocking_len() -> usize {
    push_len(MAX_SIGNATURE_LEN) + push_len(PUBKEY_LEN)
}

/// A decoded `<sig> <pubkey> ...` unlocking script.
#[derive(Debug, Clone)]
pub struct InputSignature {
    pub signature: Signature,
    pub sighash_type: SighashType,
    pub public_key: PublicKey,
}

impl InputSignature {
    pub fn parse(tx: &Transaction, index: usize) -> Result<Self, SigningError> {
        let input = tx.inputs.get(index).ok_or(SigningError::InputOutOfRange {
            index,
            count: tx.inputs.len(),
        })?;
        let items = parse_pushes(input.script_sig.as_bytes())
            .filter(|items| items.len() >= 2)
            .ok_or(SigningError::MalformedUnlockingScript(index))?;

        let (hash_type, der) = items[0]
            .split_last()
            .ok_or(SigningError::MalformedUnlockingScript(index))?;
        let sighash_type =
            SighashType::from_byte(*hash_type).ok_or(SigningError::UnknownSighashType(*hash_type))?;

        Ok(Self {
            signature: Signature::from_der(der)?,
            sighash_type,
            public_key: PublicKey::from_slice(items[1])?,
        })
    }
}

/// Check the signature of input `index` against the output it spends.
///
/// The output's pubkey hash must match the presented key, and the signature
/// must verify over the digest of its own hash type.
pub fn verify_input(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: u64,
    owner_pubkey_hash: &[u8; 20],
) -> Result<SighashType, SigningError> {
    let parsed = InputSignature::parse(tx, index)?;
    if super::address::hash160(&parsed.public_key.serialize()) != *owner_pubkey_hash {
        return Err(SigningError::WrongKey(index));
    }
    let digest = signature_hash(tx, index, script_code, value, parsed.sighash_type)?;
    let mut signature = parsed.signature;
    signature.normalize_s();
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from_digest(digest), &signature, &parsed.public_key)
        .map_err(|_| SigningError::InvalidSignature(index))?;
    Ok(parsed.sighash_type)
}
