// Payload header: MAGIC + version + u64 BE length + u16-prefixed name + u8-prefixed type + SHA-256.
//
//   [4 ] magic "SGCV"
//   [1 ] version
//   [8 ] payload length (big-endian)
//   [2 ] name length (big-endian), then name bytes (UTF-8)
//   [1 ] type length, then type bytes (UTF-8)
//   [32] SHA-256 of the payload bytes

use sha2::{Digest, Sha256};

use crate::error::{Result, StegoError};

pub const MAGIC: &[u8; 4] = b"SGCV";
pub const VERSION: u8 = 1;
pub const CHECKSUM_LEN: usize = 32;

const FIXED_PREFIX_LEN: usize = 4 + 1 + 8 + 2;
pub const MAX_NAME_LEN: usize = u16::MAX as usize;
pub const MAX_TYPE_LEN: usize = u8::MAX as usize;
/// Longest header this codec can produce.
pub const MAX_HEADER_LEN: usize = FIXED_PREFIX_LEN + MAX_NAME_LEN + 1 + MAX_TYPE_LEN + CHECKSUM_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHeader {
    pub version: u8,
    pub payload_length: u64,
    pub name: String,
    pub type_hint: String,
    pub checksum: [u8; CHECKSUM_LEN],
}

pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    Sha256::digest(payload).into()
}

impl PayloadHeader {
    /// Builds the header describing `payload`; fails if the name or type does not fit its length prefix.
    pub fn for_payload(payload: &[u8], name: &str, type_hint: &str) -> Result<Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(StegoError::InvalidConfig(format!(
                "payload name is {} bytes, limit is {MAX_NAME_LEN}",
                name.len()
            )));
        }
        if type_hint.len() > MAX_TYPE_LEN {
            return Err(StegoError::InvalidConfig(format!(
                "payload type is {} bytes, limit is {MAX_TYPE_LEN}",
                type_hint.len()
            )));
        }
        Ok(Self {
            version: VERSION,
            payload_length: payload.len() as u64,
            name: name.to_string(),
            type_hint: type_hint.to_string(),
            checksum: checksum(payload),
        })
    }

    pub fn encoded_len(&self) -> usize {
        FIXED_PREFIX_LEN + self.name.len() + 1 + self.type_hint.len() + CHECKSUM_LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.payload_length.to_be_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.push(self.type_hint.len() as u8);
        out.extend_from_slice(self.type_hint.as_bytes());
        out.extend_from_slice(&self.checksum);
        out
    }

    /// Parses a header from the front of `raw`, returning it with the number of bytes consumed.
    /// Fields are read in order, so a bad magic is reported before any length is trusted.
    pub fn deserialize(raw: &[u8]) -> Result<(Self, usize)> {
        let mut reader = FieldReader { raw, pos: 0 };
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(StegoError::HeaderMagicMismatch);
        }
        let version = reader.take(1)?[0];
        if version > VERSION {
            return Err(StegoError::HeaderVersionUnsupported(version));
        }
        let payload_length = u64::from_be_bytes(reader.array::<8>()?);
        let name_len = u16::from_be_bytes(reader.array::<2>()?) as usize;
        let name = String::from_utf8_lossy(reader.take(name_len)?).into_owned();
        let type_len = reader.take(1)?[0] as usize;
        let type_hint = String::from_utf8_lossy(reader.take(type_len)?).into_owned();
        let checksum = reader.array::<CHECKSUM_LEN>()?;
        Ok((
            Self {
                version,
                payload_length,
                name,
                type_hint,
                checksum,
            },
            reader.pos,
        ))
    }

    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 != self.payload_length || checksum(payload) != self.checksum {
            return Err(StegoError::PayloadCorrupted);
        }
        Ok(())
    }
}

struct FieldReader<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.raw.len() {
            return Err(StegoError::HeaderTruncated {
                needed: end as u64,
                available: self.raw.len() as u64,
            });
        }
        let out = &self.raw[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PayloadHeader {
        PayloadHeader::for_payload(b"Hello", "msg.txt", "text/plain").unwrap()
    }

    #[test]
    fn layout_is_big_endian_and_ordered() {
        let bytes = sample().serialize();
        assert_eq!(&bytes[..4], b"SGCV");
        assert_eq!(bytes[4], VERSION);
        assert_eq!(&bytes[5..13], &5u64.to_be_bytes());
        assert_eq!(&bytes[13..15], &[0, 7]);
        assert_eq!(&bytes[15..22], b"msg.txt");
        assert_eq!(bytes[22], 10);
        assert_eq!(&bytes[23..33], b"text/plain");
        assert_eq!(&bytes[33..], &checksum(b"Hello"));
        assert_eq!(bytes.len(), sample().encoded_len());
    }

    #[test]
    fn parse_ignores_trailing_bytes() {
        let header = sample();
        let mut bytes = header.serialize();
        let len = bytes.len();
        bytes.extend_from_slice(&[0xAA; 40]);
        let (parsed, consumed) = PayloadHeader::deserialize(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(consumed, len);
    }

    #[test]
    fn wrong_magic() {
        let mut bytes = sample().serialize();
        bytes[0] ^= 0x01;
        assert!(matches!(
            PayloadHeader::deserialize(&bytes),
            Err(StegoError::HeaderMagicMismatch)
        ));
    }

    #[test]
    fn truncated_name() {
        let bytes = sample().serialize();
        match PayloadHeader::deserialize(&bytes[..18]) {
            Err(StegoError::HeaderTruncated { needed, available }) => {
                assert_eq!(needed, 22);
                assert_eq!(available, 18);
            }
            other => panic!("expected HeaderTruncated, got {other:?}"),
        }
    }

    #[test]
    fn newer_version_rejected() {
        let mut bytes = sample().serialize();
        bytes[4] = VERSION + 1;
        assert!(matches!(
            PayloadHeader::deserialize(&bytes),
            Err(StegoError::HeaderVersionUnsupported(v)) if v == VERSION + 1
        ));
    }

    #[test]
    fn verify_detects_corruption() {
        let header = sample();
        assert!(header.verify(b"Hello").is_ok());
        assert!(matches!(header.verify(b"Hellp"), Err(StegoError::PayloadCorrupted)));
        assert!(matches!(header.verify(b"Hell"), Err(StegoError::PayloadCorrupted)));
    }

    #[test]
    fn oversized_type_rejected() {
        let long = "x".repeat(MAX_TYPE_LEN + 1);
        assert!(matches!(
            PayloadHeader::for_payload(b"", "a", &long),
            Err(StegoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_fields_round_trip() {
        let header = PayloadHeader::for_payload(&[], "", "").unwrap();
        let (parsed, consumed) = PayloadHeader::deserialize(&header.serialize()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(consumed, FIXED_PREFIX_LEN + 1 + CHECKSUM_LEN);
    }
}
