//! Bitcoin-model transactions and their wire encoding.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::encoding::sha256d;
use super::encoding::var_int_len;
use super::encoding::write_var_bytes;
use super::encoding::write_var_int;
use super::encoding::DecodeError;
use super::encoding::Reader;
use super::outpoint::Outpoint;
use super::outpoint::Txid;
use super::script::Script;

pub const TX_VERSION: i32 = 1;
pub const FINAL_SEQUENCE: u32 = 0xffff_ffff;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prev_out: Outpoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxInput {
    /// unsigned input spending `prev_out`
    pub fn spending(prev_out: Outpoint) -> Self {
        Self {
            prev_out,
            script_sig: Script::default(),
            sequence: FINAL_SEQUENCE,
        }
    }

    fn encoded_len(&self) -> usize {
        36 + var_int_len(self.script_sig.len() as u64) + self.script_sig.len() + 4
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script: Script,
}

impl TxOutput {
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(buf, self.script.as_bytes());
    }

    pub fn encoded_len(&self) -> usize {
        8 + var_int_len(self.script.len() as u64) + self.script.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            inputs: vec![],
            outputs: vec![],
            lock_time: 0,
        }
    }
}

impl Transaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_var_int(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_out.to_wire_bytes());
            write_var_bytes(&mut buf, input.script_sig.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_var_int(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode_into(&mut buf);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let version = reader.read_i32_le()?;

        let input_count = reader.read_var_int()?;
        let mut inputs = vec![];
        for _ in 0..input_count {
            let prev_out = Outpoint::from_wire_bytes(reader.read_array()?);
            let script_sig = Script::new(reader.read_var_bytes()?.to_vec());
            let sequence = reader.read_u32_le()?;
            inputs.push(TxInput {
                prev_out,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_var_int()?;
        let mut outputs = vec![];
        for _ in 0..output_count {
            let value = reader.read_u64_le()?;
            let script = Script::new(reader.read_var_bytes()?.to_vec());
            outputs.push(TxOutput { value, script });
        }

        let lock_time = reader.read_u32_le()?;
        reader.finish()?;

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| DecodeError::Hex(e.to_string()))?;
        Self::decode(&bytes)
    }

    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.encode()))
    }

    /// serialized length in bytes
    pub fn size(&self) -> usize {
        4 + var_int_len(self.inputs.len() as u64)
            + self.inputs.iter().map(TxInput::encoded_len).sum::<usize>()
            + var_int_len(self.outputs.len() as u64)
            + self.outputs.iter().map(TxOutput::encoded_len).sum::<usize>()
            + 4
    }

    /// outpoint of output `vout` of this transaction
    pub fn outpoint(&self, vout: u32) -> Outpoint {
        Outpoint::new(self.txid(), vout)
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn spends(&self, outpoint: &Outpoint) -> bool {
        self.inputs.iter().any(|i| i.prev_out == *outpoint)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {} ({} in, {} out, {} bytes)",
            self.txid(),
            self.inputs.len(),
            self.outputs.len(),
            self.size()
        )
    }
}

impl Serialize for Transaction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
