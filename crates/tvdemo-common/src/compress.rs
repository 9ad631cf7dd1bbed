use crate::error::{Error, Result};
use std::io::Write;

/// Thin wrapper around `zstd`'s streaming API, matching the shape of
/// the original engine's `ZSTD_createDStream`/`ZSTD_decompressStream` use
/// on the playback side. The recorder uses a one-shot streaming encoder
/// (frames are flushed per-write so a reader opening a truncated file can
/// still decode every complete frame written so far); playback re-decodes
/// the whole cumulative input on every call (see `FrameDecoder::decompress`)
/// rather than keeping a live decoder session, so a backward seek's `reset`
/// only has to drop the buffered input, not tear down any decoder state.
pub struct FrameEncoder {
    inner: zstd::stream::write::Encoder<'static, Vec<u8>>,
}

impl FrameEncoder {
    pub fn new(level: i32) -> Result<Self> {
        let inner = zstd::stream::write::Encoder::new(Vec::new(), level)
            .map_err(|e| Error::Compression(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Compresses `data`, flushes it so it is immediately decodable, and
    /// returns the compressed bytes produced so far (draining the internal
    /// buffer).
    pub fn compress_frame(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .write_all(data)
            .map_err(|e| Error::Compression(e.to_string()))?;
        self.inner
            .flush()
            .map_err(|e| Error::Compression(e.to_string()))?;
        let buf = self.inner.get_mut();
        let out = std::mem::take(buf);
        Ok(out)
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.inner
            .finish()
            .map_err(|e| Error::Compression(e.to_string()))
    }
}

/// Decodes against the full cumulative compressed stream seen so far.
/// `ZSTD_createDStream`/`ZSTD_decompressStream` in the original keep one
/// context alive and feed it new bytes incrementally; this wrapper instead
/// re-opens a fresh `zstd::stream::read::Decoder` over `buffered_input` on
/// every `decompress` call, so each call's cost grows with the total bytes
/// read so far rather than just the new chunk. `reset` clears
/// `buffered_input`, which is sufficient here (there is no separate
/// decoder-context lifetime to tear down).
pub struct FrameDecoder {
    buffered_input: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffered_input: Vec::new(),
        }
    }

    /// Feeds more compressed bytes in and decodes as much as is available.
    /// Bounded at `limit` bytes of decompressed output to guard against a
    /// corrupt or hostile stream expanding without bound, matching
    /// `myq2-common`'s bounded-decompress convention.
    pub fn decompress(&mut self, compressed_chunk: &[u8], limit: usize) -> Result<Vec<u8>> {
        self.buffered_input.extend_from_slice(compressed_chunk);
        let cursor = std::io::Cursor::new(self.buffered_input.as_slice());
        let mut decoder =
            zstd::stream::read::Decoder::new(cursor).map_err(|e| Error::Compression(e.to_string()))?;
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            use std::io::Read;
            let n = decoder
                .read(&mut chunk)
                .map_err(|e| Error::Compression(e.to_string()))?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            if out.len() > limit {
                return Err(Error::FrameBufferOverflow {
                    size: out.len(),
                    limit,
                });
            }
        }
        Ok(out)
    }

    /// Resets decode state for a backward seek without destroying the
    /// session.
    pub fn reset(&mut self) {
        self.buffered_input.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_and_decompress_round_trip() {
        let mut enc = FrameEncoder::new(3).unwrap();
        let payload = b"hello tv demo frame payload, repeated repeated repeated";
        let compressed = enc.compress_frame(payload).unwrap();

        let mut dec = FrameDecoder::new();
        let out = dec.decompress(&compressed, 1 << 20).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn decompress_bomb_guard_rejects_oversized_output() {
        let mut enc = FrameEncoder::new(3).unwrap();
        let payload = vec![b'x'; 10_000];
        let compressed = enc.compress_frame(&payload).unwrap();

        let mut dec = FrameDecoder::new();
        let result = dec.decompress(&compressed, 100);
        assert!(matches!(result, Err(Error::FrameBufferOverflow { .. })));
    }

    #[test]
    fn reset_clears_buffered_state() {
        let mut dec = FrameDecoder::new();
        dec.buffered_input.extend_from_slice(b"garbage");
        dec.reset();
        assert!(dec.buffered_input.is_empty());
    }
}
