use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::encoding::DecodeError;

/// A transaction id, stored in wire byte order.
///
/// Displays in the conventional reversed ("big endian") order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut display = self.0;
        display.reverse();
        hex::encode(display)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Txid {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes: [u8; 32] = hex::decode(s)
            .map_err(|e| DecodeError::Hex(e.to_string()))?
            .try_into()
            .map_err(|v: Vec<u8>| DecodeError::Hex(format!("txid has {} bytes", v.len())))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl Serialize for Txid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a spendable output: `(txid, vout)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Outpoint {
    pub txid: Txid,
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// the 36 byte wire form: txid (wire order) followed by vout (LE)
    pub fn to_wire_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.txid.0);
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }

    pub fn from_wire_bytes(bytes: [u8; 36]) -> Self {
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&bytes[..32]);
        let mut vout = [0u8; 4];
        vout.copy_from_slice(&bytes[32..]);
        Self {
            txid: Txid(txid),
            vout: u32::from_le_bytes(vout),
        }
    }

    /// natural order ref string: display txid followed by big endian vout
    pub fn to_ref_hex(&self) -> String {
        let mut bytes = self.to_wire_bytes();
        bytes.reverse();
        hex::encode(bytes)
    }

    /// reversed (wire order) ref string, as embedded in token scripts
    pub fn to_ref_le_hex(&self) -> String {
        hex::encode(self.to_wire_bytes())
    }

    /// parse a natural-order ref string, see [Self::to_ref_hex]
    pub fn from_ref_hex(s: &str) -> Result<Self, DecodeError> {
        let mut bytes: [u8; 36] = hex::decode(s)
            .map_err(|e| DecodeError::Hex(e.to_string()))?
            .try_into()
            .map_err(|v: Vec<u8>| DecodeError::Hex(format!("ref has {} bytes", v.len())))?;
        bytes.reverse();
        Ok(Self::from_wire_bytes(bytes))
    }

    /// abbreviated form for logs and listings
    pub fn short_ref(&self) -> String {
        let hex = self.txid.to_hex();
        format!("{}..{}:{}", &hex[..6], &hex[58..], self.vout)
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Reference to a token contract: the outpoint of the output that created it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TokenRef(pub Outpoint);

impl TokenRef {
    pub fn to_le_bytes(&self) -> [u8; 36] {
        self.0.to_wire_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 36]) -> Self {
        Self(Outpoint::from_wire_bytes(bytes))
    }

    pub fn outpoint(&self) -> Outpoint {
        self.0
    }
}

impl From<Outpoint> for TokenRef {
    fn from(outpoint: Outpoint) -> Self {
        Self(outpoint)
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_ref_hex())
    }
}

impl FromStr for TokenRef {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outpoint::from_ref_hex(s).map(Self)
    }
}
