//! Bitcoin-model byte encoding primitives: compact-size integers, length
//! prefixed byte strings and a cursor for decoding them.

use sha2::Digest;
use sha2::Sha256;

/// errors that can occur while decoding wire data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("non-canonical compact size at offset {0}")]
    NonCanonicalVarInt(usize),

    #[error("invalid hex: {0}")]
    Hex(String),
}

/// double sha256, the digest used for txids and payload commitments.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

pub fn write_var_int(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// number of bytes `write_var_int` emits for `n`
pub fn var_int_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// A forward-only cursor over a byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_var_int(&mut self) -> Result<u64, DecodeError> {
        let start = self.offset;
        let (value, min) = match self.read_u8()? {
            0xfd => (u64::from(u16::from_le_bytes(self.read_array()?)), 0xfd),
            0xfe => (u64::from(u32::from_le_bytes(self.read_array()?)), 0x1_0000),
            0xff => (u64::from_le_bytes(self.read_array()?), 0x1_0000_0000),
            n => return Ok(u64::from(n)),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalVarInt(start));
        }
        Ok(value)
    }

    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_var_int()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::UnexpectedEof {
            offset: self.offset,
            needed: usize::MAX,
        })?;
        self.read_bytes(len)
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_int_boundaries() {
        for n in [0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            let mut buf = vec![];
            write_var_int(&mut buf, n);
            assert_eq!(buf.len(), var_int_len(n));
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.read_var_int().unwrap(), n);
            reader.finish().unwrap();
        }
    }

    #[test]
    fn non_canonical_var_int_is_rejected() {
        let buf = [0xfd, 0x10, 0x00];
        let mut reader = Reader::new(&buf);
        assert_eq!(
            reader.read_var_int(),
            Err(DecodeError::NonCanonicalVarInt(0))
        );
    }

    #[test]
    fn short_read_reports_offset() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.read_bytes(2).unwrap();
        assert_eq!(
            reader.read_u32_le(),
            Err(DecodeError::UnexpectedEof {
                offset: 2,
                needed: 4
            })
        );
    }

    #[test]
    fn sha256d_of_empty_input() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }
}
