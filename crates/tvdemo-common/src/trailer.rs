use crate::error::{Error, Result};
use std::collections::BTreeMap;

const MAX_KEY_LEN: usize = 63;

/// Key/value trailer appended to a finished recording, patched in after the
/// frame stream is complete because values like `dur` (duration) aren't
/// known until `StopRecord`. Only `dur` (a little-endian `u32` of
/// milliseconds) is written today, but the format is a generic map so
/// future keys don't require a format version bump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    pub entries: BTreeMap<String, Vec<u8>>,
}

impl Trailer {
    pub fn with_duration(duration_ms: u32) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("dur".to_string(), duration_ms.to_le_bytes().to_vec());
        Self { entries }
    }

    pub fn duration_ms(&self) -> Option<u32> {
        self.entries.get("dur").and_then(|v| {
            if v.len() == 4 {
                Some(u32::from_le_bytes(v.clone().try_into().unwrap()))
            } else {
                None
            }
        })
    }

    /// Serializes as `TVDt` + repeated `{key<=63B NUL-terminated, u16
    /// valueLen, value}` + empty-key terminator + trailing `u32` total size
    /// (read from the end of the file first, per §4.1).
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&crate::constants::TRAILER_MAGIC);
        for (key, value) in &self.entries {
            debug_assert!(key.len() <= MAX_KEY_LEN);
            body.extend_from_slice(key.as_bytes());
            body.push(0);
            body.extend_from_slice(&(value.len() as u16).to_le_bytes());
            body.extend_from_slice(value);
        }
        body.push(0); // empty-key terminator

        let mut out = body;
        let size = out.len() as u32 + 4;
        out.extend_from_slice(&size.to_le_bytes());
        out
    }

    /// Decodes a trailer from the tail of a whole file buffer, following
    /// the original engine's exact validation: the last 4 bytes give the
    /// trailer size, which must be between 9 (empty magic+terminator+size)
    /// and the file length.
    pub fn decode_from_tail(file: &[u8]) -> Result<Self> {
        if file.len() < 4 {
            return Err(Error::BadFormat("file too short for trailer size".into()));
        }
        let size_bytes = &file[file.len() - 4..];
        let trailer_size = u32::from_le_bytes(size_bytes.try_into().unwrap()) as usize;
        if trailer_size < 9 || trailer_size > file.len() {
            return Err(Error::BadFormat(format!(
                "invalid trailer size {trailer_size}"
            )));
        }
        let start = file.len() - trailer_size;
        let body = &file[start..file.len() - 4];

        if body.len() < 4 || body[0..4] != crate::constants::TRAILER_MAGIC {
            return Err(Error::BadFormat("missing TVDt magic".into()));
        }

        let mut cursor = 4;
        let mut entries = BTreeMap::new();
        loop {
            let key_end = body[cursor..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::BadFormat("unterminated trailer key".into()))?;
            let key = &body[cursor..cursor + key_end];
            cursor += key_end + 1;

            if key.is_empty() {
                break;
            }
            if key.len() > MAX_KEY_LEN {
                return Err(Error::BadFormat("trailer key too long".into()));
            }

            if cursor + 2 > body.len() {
                return Err(Error::BadFormat("truncated trailer value length".into()));
            }
            let value_len =
                u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;

            if cursor + value_len > body.len() {
                return Err(Error::BadFormat("truncated trailer value".into()));
            }
            let value = body[cursor..cursor + value_len].to_vec();
            cursor += value_len;

            let key_str = String::from_utf8_lossy(key).to_string();
            entries.insert(key_str, value);
        }

        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_round_trips() {
        let trailer = Trailer::with_duration(123_456);
        let mut file = vec![0u8; 32];
        file.extend_from_slice(&trailer.encode());

        let decoded = Trailer::decode_from_tail(&file).unwrap();
        assert_eq!(decoded.duration_ms(), Some(123_456));
    }

    #[test]
    fn rejects_size_larger_than_file() {
        let mut file = vec![0u8; 4];
        file[0..4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(Trailer::decode_from_tail(&file).is_err());
    }

    #[test]
    fn rejects_missing_magic() {
        let mut file = vec![0u8; 20];
        let size = 12u32;
        file[16..20].copy_from_slice(&size.to_le_bytes());
        assert!(Trailer::decode_from_tail(&file).is_err());
    }
}
