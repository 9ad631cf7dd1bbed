use tvdemo_common::cmdring::ReliableCommand;
use tvdemo_common::codec::{DeltaCodec, EntityCodec, PlayerCodec};
use tvdemo_common::compress::FrameDecoder;
use tvdemo_common::constants::{
    CS_SERVERINFO, CS_TERMINATOR, MAX_CLIENTS, MAX_GENTITIES, MAX_MSGLEN, TEAM_SPECTATOR,
};
use tvdemo_common::error::{Error, Result};
use tvdemo_common::header::Header;
use tvdemo_common::trailer::Trailer;
use tvdemo_common::vfs::Filesystem;
use tvdemo_common::{Bitmask, ConfigstringTable, EntityState, PlayerState};

use crate::running_state::RunningState;

/// Opened-file state that doesn't belong to `RunningState` (which gets
/// wholesale reset on a backward seek): the raw file bytes, the header, and
/// bookkeeping for where the frame stream starts and ends.
pub struct Decoder {
    file_bytes: Vec<u8>,
    pub header: Header,
    pub trailer: Trailer,
    first_frame_offset: usize,
    frame_region_end: usize,
    cursor: usize,
    zstd: FrameDecoder,
    decoded_total: Vec<u8>,
    decoded_consumed: usize,
    initial_gamestate: ConfigstringTable,
    pub running: RunningState,
    pub at_end: bool,
}

impl Decoder {
    /// Opens a TV demo file: validates the header, populates the initial
    /// configstring table, injects `tv=1` into serverinfo, reads the
    /// trailer, and primes the first frame. `Playback::open` reads the
    /// second frame of the opening snapshot pair on top of this.
    pub fn open(fs: &impl Filesystem, path: &std::path::Path) -> Result<Self> {
        let file_bytes = fs.read(path)?;
        let (header, mut cursor) = Header::decode(&file_bytes)?;

        let mut configstrings = ConfigstringTable::new();
        loop {
            if cursor + 2 > file_bytes.len() {
                return Err(Error::BadFormat("truncated configstring table".into()));
            }
            let marker = u16::from_le_bytes(file_bytes[cursor..cursor + 2].try_into().unwrap());
            if marker == CS_TERMINATOR {
                cursor += 2;
                break;
            }
            let index = marker as usize;
            cursor += 2;
            if cursor + 2 > file_bytes.len() {
                return Err(Error::BadFormat("truncated configstring length".into()));
            }
            let len = u16::from_le_bytes(file_bytes[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;
            if cursor + len > file_bytes.len() {
                return Err(Error::BadFormat("truncated configstring value".into()));
            }
            let value = String::from_utf8_lossy(&file_bytes[cursor..cursor + len]).to_string();
            cursor += len;
            configstrings.update(index, &value)?;
        }

        configstrings.inject_tv_flag()?;

        let trailer = Trailer::decode_from_tail(&file_bytes).unwrap_or_default();
        let trailer_size = if trailer.entries.is_empty() {
            0
        } else {
            trailer.encode().len()
        };
        let frame_region_end = file_bytes.len().saturating_sub(trailer_size);

        let mut running = RunningState::default();
        running.configstrings = configstrings.clone();

        tracing::info!(
            map = %header.map_name,
            timestamp = %header.timestamp,
            tick_rate = header.tick_rate,
            max_clients = header.max_clients,
            duration_ms = header.duration_ms,
            "TV: opened recording"
        );

        let mut decoder = Self {
            file_bytes,
            header,
            trailer,
            first_frame_offset: cursor,
            frame_region_end,
            cursor,
            zstd: FrameDecoder::new(),
            decoded_total: Vec::new(),
            decoded_consumed: 0,
            initial_gamestate: configstrings,
            running,
            at_end: false,
        };

        // Primes exactly one frame here; the second frame of the opening
        // snapshot pair is read by `Playback::build_snapshot_pair`, which
        // also builds both snapshots from two genuinely distinct ticks.
        decoder.read_frame()?;
        decoder.running.viewpoint = decoder.find_first_active_player().unwrap_or(0);

        Ok(decoder)
    }

    pub fn close(&mut self) {
        self.file_bytes.clear();
        self.at_end = true;
    }

    fn player_team(&self, client_num: i32) -> i32 {
        tvdemo_common::configstring::value_for_key(
            self.running.configstrings.get(cs_players_index(client_num as usize)),
            "t",
        )
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
    }

    /// Returns the first live, non-spectator client, or `None` if no such
    /// player currently exists.
    fn find_first_active_player(&self) -> Option<i32> {
        for i in 0..MAX_CLIENTS {
            if !self.running.player_bitmask.get(i) {
                continue;
            }
            if self.player_team(i as i32) != TEAM_SPECTATOR {
                return Some(i as i32);
            }
        }
        None
    }

    /// Reads and applies the next frame, or sets `at_end` once the stream
    /// is exhausted. Implements the dual zeroing invariant: any slot whose
    /// bitmask bit just went clear has its running-state entry zeroed, so a
    /// later reappearance decodes as a full delta against zero.
    pub fn read_frame(&mut self) -> Result<()> {
        if self.cursor >= self.frame_region_end {
            self.at_end = true;
            return Ok(());
        }

        if self.cursor + 4 > self.frame_region_end {
            self.at_end = true;
            return Ok(());
        }
        let frame_size =
            u32::from_le_bytes(self.file_bytes[self.cursor..self.cursor + 4].try_into().unwrap())
                as usize;
        self.cursor += 4;

        if self.cursor + frame_size > self.frame_region_end {
            self.at_end = true;
            return Ok(());
        }
        let chunk = &self.file_bytes[self.cursor..self.cursor + frame_size];
        self.cursor += frame_size;

        let decoded_before = self.decoded_total.len();
        let full = self.zstd.decompress(chunk, 64 * MAX_MSGLEN)?;
        self.decoded_total = full;
        let body = self.decoded_total[decoded_before..].to_vec();

        self.apply_frame_body(&body)
    }

    fn apply_frame_body(&mut self, body: &[u8]) -> Result<()> {
        let mut cursor = 0usize;

        if body.len() < 4 {
            self.at_end = true;
            return Ok(());
        }
        self.running.server_time = i32::from_le_bytes(body[0..4].try_into().unwrap());
        cursor += 4;

        let entity_bytes = (MAX_GENTITIES + 7) / 8;
        if cursor + entity_bytes > body.len() {
            self.at_end = true;
            return Ok(());
        }
        let new_entity_mask =
            Bitmask::from_bytes(body[cursor..cursor + entity_bytes].to_vec(), MAX_GENTITIES);
        cursor += entity_bytes;

        for slot in new_entity_mask.newly_cleared(&self.running.entity_bitmask) {
            self.running.entities[slot] = EntityState::default();
        }

        for i in 0..MAX_GENTITIES {
            if !new_entity_mask.get(i) {
                continue;
            }
            let (decoded, consumed) =
                EntityCodec::decode_delta(&self.running.entities[i], &body[cursor..]);
            self.running.entities[i] = decoded;
            cursor += consumed;
        }

        if cursor + 2 > body.len() {
            self.at_end = true;
            return Ok(());
        }
        let sentinel = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap());
        cursor += 2;
        if sentinel != MAX_GENTITIES as u16 - 1 {
            return Err(Error::BadFormat(format!(
                "missing entity end marker, got {sentinel}"
            )));
        }
        self.running.entity_bitmask = new_entity_mask;

        let player_bytes = (MAX_CLIENTS + 7) / 8;
        if cursor + player_bytes > body.len() {
            self.at_end = true;
            return Ok(());
        }
        let new_player_mask =
            Bitmask::from_bytes(body[cursor..cursor + player_bytes].to_vec(), MAX_CLIENTS);
        cursor += player_bytes;

        for slot in new_player_mask.newly_cleared(&self.running.player_bitmask) {
            self.running.players[slot] = PlayerState::default();
        }

        for i in 0..MAX_CLIENTS {
            if !new_player_mask.get(i) {
                continue;
            }
            let client_num = body[cursor] as usize;
            cursor += 1;
            let (decoded, consumed) =
                PlayerCodec::decode_delta(&self.running.players[client_num], &body[cursor..]);
            self.running.players[client_num] = decoded;
            cursor += consumed;
        }
        self.running.player_bitmask = new_player_mask;

        // Auto-viewpoint: while not seeking, a viewpoint that has gone
        // inactive or drifted onto the spectator team is replaced by the
        // first live non-spectator player, mirroring the block in
        // `ReadFrame` right after player decode in `original_source`. If no
        // such player exists the viewpoint is left exactly where it was.
        if !self.running.seeking {
            let vp = self.running.viewpoint;
            let live = self.running.player_bitmask.get(vp as usize);
            if !live || self.player_team(vp) == TEAM_SPECTATOR {
                if let Some(new_vp) = self.find_first_active_player() {
                    self.running.viewpoint = new_vp;
                }
            }
        }

        if cursor + 2 > body.len() {
            self.at_end = true;
            return Ok(());
        }
        let cs_count = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
        cursor += 2;
        for _ in 0..cs_count {
            let index = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;
            let len = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;
            let value = String::from_utf8_lossy(&body[cursor..cursor + len]).to_string();
            cursor += len;
            self.update_configstring(index, &value)?;
            if !self.running.seeking {
                self.running.cmds.push(ReliableCommand {
                    target: None,
                    text: format!("cs {index} \"{value}\""),
                });
            }
        }

        let cmd_count = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
        cursor += 2;
        for _ in 0..cmd_count {
            let target_byte = body[cursor];
            cursor += 1;
            let len = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;
            let text = String::from_utf8_lossy(&body[cursor..cursor + len]).to_string();
            cursor += len;
            let target = if target_byte == 255 {
                None
            } else {
                Some(target_byte as i32)
            };
            if !self.running.seeking
                && (target.is_none() || target == Some(self.running.viewpoint))
            {
                self.running.cmds.push(ReliableCommand { target, text });
            }
        }

        Ok(())
    }

    /// Whole-arena rebuild of a single configstring, with the `tv=1`
    /// re-injection invariant on every write to `CS_SERVERINFO`.
    pub fn update_configstring(&mut self, index: usize, value: &str) -> Result<()> {
        self.running.configstrings.update(index, value)?;
        if index == CS_SERVERINFO {
            self.running.configstrings.inject_tv_flag()?;
        }
        Ok(())
    }

    pub fn initial_gamestate(&self) -> &ConfigstringTable {
        &self.initial_gamestate
    }

    pub fn first_frame_offset(&self) -> usize {
        self.first_frame_offset
    }

    /// Resets the decoder to the beginning of the frame stream for a
    /// backward seek, without discarding the opened file or trailer.
    pub fn restart_from_beginning(&mut self) {
        self.cursor = self.first_frame_offset;
        self.zstd.reset();
        self.decoded_total.clear();
        self.decoded_consumed = 0;
        self.running = RunningState::default();
        self.running.configstrings = self.initial_gamestate.clone();
        self.at_end = false;
    }
}

fn cs_players_index(client_num: usize) -> usize {
    tvdemo_common::constants::CS_PLAYERS + client_num
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvdemo_common::vfs::StdFilesystem;

    fn temp_fs() -> StdFilesystem {
        let dir = std::env::temp_dir().join(format!(
            "tvdemo-playback-test-{}-{}",
            std::process::id(),
            unique()
        ));
        StdFilesystem::new(dir)
    }

    fn unique() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn open_empty_recording_reaches_end_quickly() {
        use std::io::Write;
        use tvdemo_common::compress::FrameEncoder;

        let fs = temp_fs();
        let header = Header {
            protocol: tvdemo_common::constants::PROTOCOL_VERSION,
            tick_rate: 40,
            max_clients: 8,
            duration_ms: 0,
            map_name: "q3dm1".into(),
            timestamp: "2026-07-31T00:00:00Z".into(),
        };

        let mut file_bytes = header.encode();
        file_bytes.extend_from_slice(&CS_TERMINATOR.to_le_bytes());

        let mut enc = FrameEncoder::new(3).unwrap();
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&vec![0u8; (MAX_GENTITIES + 7) / 8]);
        body.extend_from_slice(&((MAX_GENTITIES as u16 - 1).to_le_bytes()));
        body.extend_from_slice(&vec![0u8; (MAX_CLIENTS + 7) / 8]);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        let compressed = enc.compress_frame(&body).unwrap();
        file_bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        file_bytes.extend_from_slice(&compressed);
        let tail = enc.finish().unwrap();
        file_bytes.extend_from_slice(&tail);

        let trailer = Trailer::with_duration(0);
        file_bytes.extend_from_slice(&trailer.encode());

        let mut w = fs.create(std::path::Path::new("t.tvd")).unwrap();
        w.write_all(&file_bytes).unwrap();
        drop(w);

        let decoder = Decoder::open(&fs, std::path::Path::new("t.tvd")).unwrap();
        assert_eq!(decoder.header.map_name, "q3dm1");
    }

    /// Builds a recording with one entity that appears, disappears, and
    /// reappears with a different value, then exercises both forward replay
    /// (dual zeroing on disappearance) and a backward seek (full restart and
    /// forward replay to an earlier point).
    #[test]
    fn reappeared_entity_deltas_against_zero_and_backward_seek_replays() {
        use std::io::Write;
        use tvdemo_common::compress::FrameEncoder;

        let fs = temp_fs();
        let header = Header {
            protocol: tvdemo_common::constants::PROTOCOL_VERSION,
            tick_rate: 40,
            max_clients: 8,
            duration_ms: 0,
            map_name: "q3dm1".into(),
            timestamp: "2026-07-31T00:00:00Z".into(),
        };
        let mut file_bytes = header.encode();
        file_bytes.extend_from_slice(&CS_TERMINATOR.to_le_bytes());

        let entity_bytes = (MAX_GENTITIES + 7) / 8;
        let player_bytes = (MAX_CLIENTS + 7) / 8;
        let slot = 5;

        let frame = |server_time: i32, live: bool, powerups: i32| {
            let mut body = Vec::new();
            body.extend_from_slice(&server_time.to_le_bytes());

            let mut mask = vec![0u8; entity_bytes];
            if live {
                mask[slot / 8] |= 1 << (slot % 8);
            }
            body.extend_from_slice(&mask);

            if live {
                let mut cur = EntityState::default();
                cur.number = slot as i32;
                cur.powerups = powerups;
                EntityCodec::encode_delta(&EntityState::default(), &cur, &mut body);
            }
            body.extend_from_slice(&((MAX_GENTITIES as u16 - 1).to_le_bytes()));

            body.extend_from_slice(&vec![0u8; player_bytes]);
            body.extend_from_slice(&0u16.to_le_bytes()); // cs_count
            body.extend_from_slice(&0u16.to_le_bytes()); // cmd_count
            body
        };

        let mut enc = FrameEncoder::new(3).unwrap();
        let mut frame_bytes = Vec::new();
        for (t, live, powerups) in [(0i32, true, 7), (10, false, 0), (20, true, 9)] {
            let body = frame(t, live, powerups);
            let compressed = enc.compress_frame(&body).unwrap();
            frame_bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            frame_bytes.extend_from_slice(&compressed);
        }
        file_bytes.extend_from_slice(&frame_bytes);
        file_bytes.extend_from_slice(&enc.finish().unwrap());
        file_bytes.extend_from_slice(&Trailer::with_duration(20).encode());

        let mut w = fs.create(std::path::Path::new("reappear.tvd")).unwrap();
        w.write_all(&file_bytes).unwrap();
        drop(w);

        // `Decoder::open` itself primes only the first frame (0ms); the
        // second frame of the opening pair is read by
        // `Playback::build_snapshot_pair`, not by `Decoder::open` itself, so
        // a bare `Decoder::open` here leaves frames 2 (10ms) and 3 (20ms)
        // unread.
        let mut decoder = Decoder::open(&fs, std::path::Path::new("reappear.tvd")).unwrap();
        assert_eq!(decoder.running.server_time, 0);
        assert!(decoder.running.entity_bitmask.get(slot));
        assert_eq!(decoder.running.entities[slot].powerups, 7);

        decoder.read_frame().unwrap();
        assert_eq!(decoder.running.server_time, 10);
        assert!(!decoder.running.entity_bitmask.get(slot));
        assert_eq!(decoder.running.entities[slot].powerups, 0);

        decoder.read_frame().unwrap();
        assert_eq!(decoder.running.server_time, 20);
        assert_eq!(decoder.running.entities[slot].powerups, 9);

        crate::seek::seek(&mut decoder, 10).unwrap();
        assert_eq!(decoder.running.server_time, 10);
        assert!(!decoder.running.entity_bitmask.get(slot));
        assert_eq!(decoder.running.entities[slot].powerups, 0);
    }
}
