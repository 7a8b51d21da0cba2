//! The glyph metadata payload revealed by a mint.
//!
//! The payload is a CBOR map. Keys follow the glyph convention:
//!
//! | key              | value                                             |
//! |------------------|---------------------------------------------------|
//! | `p`              | protocol markers, `[1]` fungible, `[2]` NFT       |
//! | `name`, `ticker` | text; ticker only for fungible tokens             |
//! | `desc`, `license`| text                                              |
//! | `type`           | `container` or `user`; omitted for plain objects  |
//! | `args`           | `{ i: false }` when the token is mutable          |
//! | `attrs`          | text to text map                                  |
//! | `in`, `by`       | arrays of 36-byte token refs (wire order)         |
//! | `main.<ext>`     | bytes, or `{ src: url, h: sha256 }` for remote    |

use std::collections::BTreeMap;

use ciborium::value::Value;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use super::glyph::ContractType;
use super::outpoint::TokenRef;

const PROTOCOL_FT: u8 = 1;
const PROTOCOL_NFT: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("cbor: {0}")]
    Cbor(String),

    #[error("a glyph is fungible or non-fungible, not {0}")]
    NotAToken(ContractType),

    #[error("payload is not a glyph map")]
    NotAGlyph,
}

/// Role of a non-fungible token within the glyph graph.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TokenKind {
    #[default]
    Object,
    Container,
    User,
}

/// The main file of a glyph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MainContent {
    /// raw bytes stored on chain as `main.<extension>`
    Embedded {
        extension: String,
        #[serde(with = "hex::serde")]
        bytes: Vec<u8>,
    },

    /// utf-8 text stored on chain as `main.txt`
    Text { text: String },

    /// content stored elsewhere
    Remote {
        extension: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hash")]
        sha256: Option<[u8; 32]>,
    },
}

impl MainContent {
    /// Bytes stored on chain for this content, if any.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Embedded { bytes, .. } => Some(bytes),
            Self::Text { text } => Some(text.as_bytes()),
            Self::Remote { .. } => None,
        }
    }

    fn file_name(&self) -> String {
        match self {
            Self::Embedded { extension, .. } | Self::Remote { extension, .. } => {
                format!("main.{extension}")
            }
            Self::Text { .. } => "main.txt".to_owned(),
        }
    }

    fn to_cbor(&self) -> Value {
        match self {
            Self::Embedded { bytes, .. } => Value::Bytes(bytes.clone()),
            Self::Text { text } => Value::Bytes(text.as_bytes().to_vec()),
            Self::Remote { url, sha256, .. } => {
                let mut entries = vec![(text("src"), text(url))];
                if let Some(hash) = sha256 {
                    entries.push((text("h"), Value::Bytes(hash.to_vec())));
                }
                Value::Map(entries)
            }
        }
    }
}

/// Metadata and content of a token to be minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphPayload {
    pub contract_type: ContractType,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default)]
    pub kind: TokenKind,

    /// immutable unless set
    #[serde(default)]
    pub mutable: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    /// containers this token belongs to (`in`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<TokenRef>,

    /// authors of this token (`by`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<TokenRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MainContent>,

    /// fungible supply in photons; ignored for NFTs
    #[serde(default)]
    pub supply: u64,
}

impl GlyphPayload {
    pub fn non_fungible(name: impl Into<String>) -> Self {
        Self {
            contract_type: ContractType::NonFungible,
            name: name.into(),
            ticker: None,
            description: None,
            license: None,
            kind: TokenKind::Object,
            mutable: false,
            attrs: BTreeMap::new(),
            containers: vec![],
            authors: vec![],
            content: None,
            supply: 0,
        }
    }

    pub fn fungible(name: impl Into<String>, ticker: impl Into<String>, supply: u64) -> Self {
        Self {
            contract_type: ContractType::Fungible,
            ticker: Some(ticker.into()),
            supply,
            ..Self::non_fungible(name)
        }
    }

    /// Every relation the mint must prove it holds: authors, then containers.
    pub fn relations(&self) -> impl Iterator<Item = &TokenRef> {
        self.authors.iter().chain(&self.containers)
    }

    /// Photons locked in the token output: the supply for fungible tokens,
    /// one for NFTs.
    pub fn token_value(&self) -> u64 {
        match self.contract_type {
            ContractType::Fungible => self.supply,
            _ => 1,
        }
    }

    pub fn to_cbor(&self) -> Result<Value, PayloadError> {
        let protocol = match self.contract_type {
            ContractType::Fungible => PROTOCOL_FT,
            ContractType::NonFungible => PROTOCOL_NFT,
            ContractType::Native => return Err(PayloadError::NotAToken(ContractType::Native)),
        };

        let mut map = vec![(
            text("p"),
            Value::Array(vec![Value::Integer(protocol.into())]),
        )];
        map.push((text("name"), text(&self.name)));
        if let (ContractType::Fungible, Some(ticker)) = (self.contract_type, &self.ticker) {
            map.push((text("ticker"), text(ticker)));
        }
        if let Some(desc) = &self.description {
            map.push((text("desc"), text(desc)));
        }
        if let Some(license) = &self.license {
            map.push((text("license"), text(license)));
        }
        if self.kind != TokenKind::Object {
            map.push((text("type"), text(&self.kind.to_string())));
        }
        if self.mutable {
            map.push((
                text("args"),
                Value::Map(vec![(text("i"), Value::Bool(false))]),
            ));
        }
        if !self.attrs.is_empty() {
            let attrs = self.attrs.iter().map(|(k, v)| (text(k), text(v))).collect();
            map.push((text("attrs"), Value::Map(attrs)));
        }
        for (key, refs) in [("in", &self.containers), ("by", &self.authors)] {
            if !refs.is_empty() {
                let refs = refs
                    .iter()
                    .map(|r| Value::Bytes(r.to_le_bytes().to_vec()))
                    .collect();
                map.push((text(key), Value::Array(refs)));
            }
        }
        if let Some(content) = &self.content {
            map.push((text(&content.file_name()), content.to_cbor()));
        }
        Ok(Value::Map(map))
    }

    /// CBOR bytes pushed by the reveal.
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let mut buf = vec![];
        ciborium::ser::into_writer(&self.to_cbor()?, &mut buf)
            .map_err(|e| PayloadError::Cbor(e.to_string()))?;
        Ok(buf)
    }
}

/// Decode a revealed payload into its CBOR map, checking the protocol marker.
pub fn decode_payload(bytes: &[u8]) -> Result<Vec<(String, Value)>, PayloadError> {
    let value: Value =
        ciborium::de::from_reader(bytes).map_err(|e| PayloadError::Cbor(e.to_string()))?;
    let Value::Map(entries) = value else {
        return Err(PayloadError::NotAGlyph);
    };
    let entries: Vec<(String, Value)> = entries
        .into_iter()
        .filter_map(|(k, v)| match k {
            Value::Text(k) => Some((k, v)),
            _ => None,
        })
        .collect();
    if !entries.iter().any(|(k, _)| k == "p") {
        return Err(PayloadError::NotAGlyph);
    }
    Ok(entries)
}

/// sha256 of content, as committed in remote references
pub fn content_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

mod opt_hash {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(hash: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(h) => s.serialize_str(&hex::encode(h)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let mut hash = [0u8; 32];
        hex::decode_to_slice(s, &mut hash).map_err(serde::de::Error::custom)?;
        Ok(Some(hash))
    }
}
