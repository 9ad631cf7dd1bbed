use crate::constants::{MAGIC, PROTOCOL_VERSION};
use crate::error::{Error, Result};
use std::io::Write;

/// Fixed-layout file header, written before the configstring table and
/// frame stream. `duration_ms` is a placeholder at write time (patched in
/// at `StopRecord`) and authoritative only once the trailer confirms it.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub protocol: u32,
    pub tick_rate: u32,
    pub max_clients: u32,
    pub duration_ms: u32,
    pub map_name: String,
    pub timestamp: String,
}

/// Byte offset of the duration placeholder, patched in place once
/// `StopRecord` knows the real value.
pub const DURATION_OFFSET: u64 = 16;

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.protocol.to_le_bytes());
        out.extend_from_slice(&self.tick_rate.to_le_bytes());
        out.extend_from_slice(&self.max_clients.to_le_bytes());
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
        out.extend_from_slice(self.map_name.as_bytes());
        out.push(0);
        out.extend_from_slice(self.timestamp.as_bytes());
        out.push(0);
        out
    }

    pub fn write_to(&self, w: &mut dyn Write) -> Result<()> {
        w.write_all(&self.encode())?;
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 20 {
            return Err(Error::BadFormat("header shorter than fixed prefix".into()));
        }
        if buf[0..4] != MAGIC {
            return Err(Error::BadFormat("bad magic".into()));
        }
        let protocol = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if protocol != PROTOCOL_VERSION {
            return Err(Error::BadFormat(format!(
                "unsupported protocol version {protocol}"
            )));
        }
        let tick_rate = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let max_clients = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        let duration_ms = u32::from_le_bytes(buf[16..20].try_into().unwrap());

        let mut cursor = 20;
        let map_end = buf[cursor..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::BadFormat("unterminated map name".into()))?;
        let map_name = String::from_utf8_lossy(&buf[cursor..cursor + map_end]).to_string();
        cursor += map_end + 1;

        let ts_end = buf[cursor..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::BadFormat("unterminated timestamp".into()))?;
        let timestamp = String::from_utf8_lossy(&buf[cursor..cursor + ts_end]).to_string();
        cursor += ts_end + 1;

        Ok((
            Self {
                protocol,
                tick_rate,
                max_clients,
                duration_ms,
                map_name,
                timestamp,
            },
            cursor,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = Header {
            protocol: PROTOCOL_VERSION,
            tick_rate: 40,
            max_clients: 32,
            duration_ms: 0,
            map_name: "q3dm17".into(),
            timestamp: "2026-07-31T00:00:00Z".into(),
        };
        let encoded = h.encode();
        let (decoded, consumed) = Header::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 24];
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(Header::decode(&buf).is_err());
    }

    #[test]
    fn duration_offset_matches_layout() {
        let h = Header {
            protocol: PROTOCOL_VERSION,
            tick_rate: 40,
            max_clients: 32,
            duration_ms: 0xAABBCCDD,
            map_name: "m".into(),
            timestamp: "t".into(),
        };
        let encoded = h.encode();
        let at_offset =
            u32::from_le_bytes(encoded[DURATION_OFFSET as usize..DURATION_OFFSET as usize + 4]
                .try_into()
                .unwrap());
        assert_eq!(at_offset, 0xAABBCCDD);
    }
}
