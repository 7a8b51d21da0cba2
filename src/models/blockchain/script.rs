//! Locking script builders and classification.
//!
//! Three ownership shapes exist on chain for wallet coins:
//!
//! ```text
//!  native   OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG
//!  fungible <p2pkh> OP_STATESEPARATOR OP_PUSHINPUTREF <ref> <ft epilogue>
//!  nft      OP_PUSHINPUTREFSINGLETON <ref> OP_DROP <p2pkh>
//! ```
//!
//! plus the mint commit script, which locks the commit output to a payload
//! hash and the minting address.
//!
//! The token ref is embedded in wire (LE) byte order, so the same owner holding
//! two different tokens always has two distinct scripts.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::address::Address;
use super::glyph::ContractType;
use super::outpoint::TokenRef;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_DROP: u8 = 0x75;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_HASH256: u8 = 0xaa;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_STATESEPARATOR: u8 = 0xbd;
    pub const OP_PUSHINPUTREF: u8 = 0xd0;
    pub const OP_PUSHINPUTREFSINGLETON: u8 = 0xd8;
}

use opcodes::*;

/// Fungible token conservation epilogue appended after the state separator.
pub const FT_EPILOGUE: [u8; 12] = [
    0xde, 0xc0, 0xe9, 0xaa, 0x76, 0xe3, 0x78, 0xe4, 0xa2, 0x69, 0xe6, 0x9d,
];

/// marker pushed in commit scripts and reveal unlocking scripts
pub const GLYPH_MAGIC: &[u8; 3] = b"gly";

const P2PKH_LEN: usize = 25;
const REF_LEN: usize = 36;
const FT_LEN: usize = P2PKH_LEN + 2 + REF_LEN + FT_EPILOGUE.len();
const NFT_LEN: usize = 1 + REF_LEN + 1 + P2PKH_LEN;
const COMMIT_LEN: usize = 2 + 32 + 1 + 4 + 1 + P2PKH_LEN;

#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script(#[serde(with = "hex::serde")] Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn classify(&self) -> ScriptKind {
        ScriptKind::of(&self.0)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Minimal push of `data` onto `buf`.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        buf.push(len as u8);
    } else if len <= 0xff {
        buf.push(OP_PUSHDATA1);
        buf.push(len as u8);
    } else if len <= 0xffff {
        buf.push(OP_PUSHDATA2);
        buf.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        buf.push(OP_PUSHDATA4);
        buf.extend_from_slice(&(len as u32).to_le_bytes());
    }
    buf.extend_from_slice(data);
}

/// byte length of the minimal push of a `len` byte item
pub fn push_len(len: usize) -> usize {
    let prefix = if len < OP_PUSHDATA1 as usize {
        1
    } else if len <= 0xff {
        2
    } else if len <= 0xffff {
        3
    } else {
        5
    };
    prefix + len
}

/// Split a push-only script into its pushed items.
///
/// Returns `None` if the script contains a non-push opcode or a truncated
/// push.
pub fn parse_pushes(bytes: &[u8]) -> Option<Vec<&[u8]>> {
    let mut items = vec![];
    let mut at = 0usize;
    while at < bytes.len() {
        let op = bytes[at];
        at += 1;
        let len = match op {
            OP_0 => 0,
            0x01..=0x4b => op as usize,
            OP_PUSHDATA1 => {
                let n = *bytes.get(at)? as usize;
                at += 1;
                n
            }
            OP_PUSHDATA2 => {
                let n = u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?) as usize;
                at += 2;
                n
            }
            OP_PUSHDATA4 => {
                let n = u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?) as usize;
                at += 4;
                n
            }
            _ => return None,
        };
        items.push(bytes.get(at..at.checked_add(len)?)?);
        at += len;
    }
    Some(items)
}

fn append_p2pkh(buf: &mut Vec<u8>, pubkey_hash: &[u8; 20]) {
    buf.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    buf.extend_from_slice(pubkey_hash);
    buf.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
}

pub fn p2pkh_script(address: &Address) -> Script {
    let mut buf = Vec::with_capacity(P2PKH_LEN);
    append_p2pkh(&mut buf, address.pubkey_hash());
    Script(buf)
}

pub fn ft_script(address: &Address, token_ref: &TokenRef) -> Script {
    let mut buf = Vec::with_capacity(FT_LEN);
    append_p2pkh(&mut buf, address.pubkey_hash());
    buf.push(OP_STATESEPARATOR);
    buf.push(OP_PUSHINPUTREF);
    buf.extend_from_slice(&token_ref.to_le_bytes());
    buf.extend_from_slice(&FT_EPILOGUE);
    Script(buf)
}

pub fn nft_script(address: &Address, token_ref: &TokenRef) -> Script {
    let mut buf = Vec::with_capacity(NFT_LEN);
    buf.push(OP_PUSHINPUTREFSINGLETON);
    buf.extend_from_slice(&token_ref.to_le_bytes());
    buf.push(OP_DROP);
    append_p2pkh(&mut buf, address.pubkey_hash());
    Script(buf)
}

/// Commit output script for a mint: requires the reveal to present the
/// payload hashing to `payload_hash` and a signature from `address`.
pub fn commit_script(address: &Address, payload_hash: &[u8; 32]) -> Script {
    let mut buf = Vec::with_capacity(COMMIT_LEN);
    buf.push(OP_HASH256);
    push_data(&mut buf, payload_hash);
    buf.push(OP_EQUALVERIFY);
    push_data(&mut buf, GLYPH_MAGIC);
    buf.push(OP_EQUALVERIFY);
    append_p2pkh(&mut buf, address.pubkey_hash());
    Script(buf)
}

/// Locking script for `contract_type` owned by `address`.
///
/// `token_ref` is ignored for native coins and required otherwise; `None`
/// is returned when a token script is requested without one.
pub fn script_for(
    contract_type: ContractType,
    address: &Address,
    token_ref: Option<&TokenRef>,
) -> Option<Script> {
    match (contract_type, token_ref) {
        (ContractType::Native, _) => Some(p2pkh_script(address)),
        (ContractType::Fungible, Some(r)) => Some(ft_script(address, r)),
        (ContractType::NonFungible, Some(r)) => Some(nft_script(address, r)),
        (_, None) => None,
    }
}

/// What a locking script is, and who can spend it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptKind {
    P2pkh {
        pubkey_hash: [u8; 20],
    },
    Fungible {
        pubkey_hash: [u8; 20],
        token_ref: TokenRef,
    },
    NonFungible {
        pubkey_hash: [u8; 20],
        token_ref: TokenRef,
    },
    Commit {
        pubkey_hash: [u8; 20],
        payload_hash: [u8; 32],
    },
    Unknown,
}

impl ScriptKind {
    fn of(bytes: &[u8]) -> Self {
        match bytes.len() {
            P2PKH_LEN => match parse_p2pkh(bytes) {
                Some(pubkey_hash) => Self::P2pkh { pubkey_hash },
                None => Self::Unknown,
            },
            FT_LEN => {
                let (head, tail) = bytes.split_at(P2PKH_LEN);
                let Some(pubkey_hash) = parse_p2pkh(head) else {
                    return Self::Unknown;
                };
                if tail[0] != OP_STATESEPARATOR
                    || tail[1] != OP_PUSHINPUTREF
                    || tail[2 + REF_LEN..] != FT_EPILOGUE
                {
                    return Self::Unknown;
                }
                Self::Fungible {
                    pubkey_hash,
                    token_ref: read_ref(&tail[2..2 + REF_LEN]),
                }
            }
            NFT_LEN => {
                if bytes[0] != OP_PUSHINPUTREFSINGLETON || bytes[1 + REF_LEN] != OP_DROP {
                    return Self::Unknown;
                }
                match parse_p2pkh(&bytes[2 + REF_LEN..]) {
                    Some(pubkey_hash) => Self::NonFungible {
                        pubkey_hash,
                        token_ref: read_ref(&bytes[1..1 + REF_LEN]),
                    },
                    None => Self::Unknown,
                }
            }
            COMMIT_LEN => {
                let expected_mid = [OP_EQUALVERIFY, 3, b'g', b'l', b'y', OP_EQUALVERIFY];
                if bytes[0] != OP_HASH256 || bytes[1] != 32 || bytes[34..40] != expected_mid {
                    return Self::Unknown;
                }
                let mut payload_hash = [0u8; 32];
                payload_hash.copy_from_slice(&bytes[2..34]);
                match parse_p2pkh(&bytes[40..]) {
                    Some(pubkey_hash) => Self::Commit {
                        pubkey_hash,
                        payload_hash,
                    },
                    None => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        }
    }

    pub fn pubkey_hash(&self) -> Option<&[u8; 20]> {
        match self {
            Self::P2pkh { pubkey_hash }
            | Self::Fungible { pubkey_hash, .. }
            | Self::NonFungible { pubkey_hash, .. }
            | Self::Commit { pubkey_hash, .. } => Some(pubkey_hash),
            Self::Unknown => None,
        }
    }

    pub fn token_ref(&self) -> Option<TokenRef> {
        match self {
            Self::Fungible { token_ref, .. } | Self::NonFungible { token_ref, .. } => {
                Some(*token_ref)
            }
            _ => None,
        }
    }

    /// contract type of a spendable coin under this script, if it is one
    pub fn contract_type(&self) -> Option<ContractType> {
        match self {
            Self::P2pkh { .. } => Some(ContractType::Native),
            Self::Fungible { .. } => Some(ContractType::Fungible),
            Self::NonFungible { .. } => Some(ContractType::NonFungible),
            Self::Commit { .. } | Self::Unknown => None,
        }
    }
}

fn parse_p2pkh(bytes: &[u8]) -> Option<[u8; 20]> {
    if bytes.len() != P2PKH_LEN
        || bytes[..3] != [OP_DUP, OP_HASH160, 20]
        || bytes[23..] != [OP_EQUALVERIFY, OP_CHECKSIG]
    {
        return None;
    }
    let mut pubkey_hash = [0u8; 20];
    pubkey_hash.copy_from_slice(&bytes[3..23]);
    Some(pubkey_hash)
}

fn read_ref(bytes: &[u8]) -> TokenRef {
    let mut raw = [0u8; REF_LEN];
    raw.copy_from_slice(bytes);
    TokenRef::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_models::network::Network;
    use crate::models::blockchain::outpoint::Outpoint;
    use crate::models::blockchain::outpoint::Txid;

    fn address(b: u8) -> Address {
        Address::new(Network::Main, [b; 20])
    }

    fn token(b: u8) -> TokenRef {
        TokenRef(Outpoint::new(Txid([b; 32]), 0))
    }

    #[test]
    fn p2pkh_matches_standard_template() {
        let script = p2pkh_script(&address(0x11));
        assert_eq!(
            script.to_hex(),
            format!("76a914{}88ac", "11".repeat(20))
        );
        assert_eq!(
            script.classify(),
            ScriptKind::P2pkh {
                pubkey_hash: [0x11; 20]
            }
        );
    }

    #[test]
    fn ft_script_layout() {
        let script = ft_script(&address(1), &token(2));
        let hex = script.to_hex();
        assert!(hex.starts_with("76a914"));
        assert!(hex.contains(&format!("88acbdd0{}", token(2).to_le_bytes().map(|b| format!("{b:02x}")).concat())));
        assert!(hex.ends_with("dec0e9aa76e378e4a269e69d"));
        assert_eq!(script.classify().token_ref(), Some(token(2)));
        assert_eq!(script.classify().contract_type(), Some(ContractType::Fungible));
    }

    #[test]
    fn nft_script_layout() {
        let script = nft_script(&address(1), &token(3));
        assert!(script.to_hex().starts_with("d8"));
        assert_eq!(
            script.classify(),
            ScriptKind::NonFungible {
                pubkey_hash: [1; 20],
                token_ref: token(3)
            }
        );
    }

    #[test]
    fn distinct_refs_give_distinct_scripts() {
        let owner = address(5);
        assert_ne!(ft_script(&owner, &token(1)), ft_script(&owner, &token(2)));
        assert_ne!(nft_script(&owner, &token(1)), nft_script(&owner, &token(2)));
        assert_ne!(ft_script(&owner, &token(1)).as_bytes(), nft_script(&owner, &token(1)).as_bytes());
    }

    #[test]
    fn commit_script_classifies() {
        let script = commit_script(&address(4), &[9u8; 32]);
        assert_eq!(
            script.classify(),
            ScriptKind::Commit {
                pubkey_hash: [4; 20],
                payload_hash: [9; 32]
            }
        );
        assert_eq!(script.classify().contract_type(), None);
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(Script::new(vec![0x6a, 0x01, 0x02]).classify(), ScriptKind::Unknown);
        let mut tampered = p2pkh_script(&address(1)).as_bytes().to_vec();
        tampered[24] = OP_DROP;
        assert_eq!(Script::new(tampered).classify(), ScriptKind::Unknown);
    }

    #[test]
    fn pushes_parse_back() {
        let mut buf = vec![];
        push_data(&mut buf, &[1u8; 72]);
        push_data(&mut buf, &[2u8; 33]);
        push_data(&mut buf, &[3u8; 300]);
        let items = parse_pushes(&buf).unwrap();
        assert_eq!(vec![&[1u8; 72][..], &[2u8; 33][..], &[3u8; 300][..]], items);

        assert!(parse_pushes(&[OP_DUP]).is_none());
        assert!(parse_pushes(&[0x05, 1, 2]).is_none());
    }

    #[test]
    fn push_len_matches_push_data() {
        for len in [0usize, 1, 75, 76, 255, 256, 70_000] {
            let mut buf = vec![];
            push_data(&mut buf, &vec![0u8; len]);
            assert_eq!(buf.len(), push_len(len));
        }
    }
}
