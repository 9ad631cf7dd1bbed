use tvdemo_common::cmdring::ReliableCommand;
use tvdemo_common::constants::MAX_RELIABLE_COMMANDS;
use tvdemo_common::error::Result;
use tvdemo_common::vfs::Filesystem;

use crate::decoder::Decoder;
use crate::running_state::Snapshot;
use crate::seek;
use crate::snapshot::{self, BigConfigStringBuffer, ServerCommandResult};
use crate::viewpoint;

/// Top-level facade tying the decoder, snapshot builder, seek controller
/// and viewpoint control together — the single object a console command
/// surface or render frontend drives.
pub struct Playback {
    pub decoder: Decoder,
    bcs: BigConfigStringBuffer,
    snapshot_cursor: u32,
}

impl Playback {
    pub fn open(fs: &impl Filesystem, path: &std::path::Path) -> Result<Self> {
        let decoder = Decoder::open(fs, path)?;
        let mut playback = Self {
            decoder,
            bcs: BigConfigStringBuffer::default(),
            snapshot_cursor: 0,
        };
        playback.build_snapshot_pair()?;
        Ok(playback)
    }

    pub fn close(&mut self) {
        self.decoder.close();
    }

    pub fn read_frame(&mut self) -> Result<()> {
        self.decoder.read_frame()?;
        if !self.decoder.running.seeking {
            self.build_next_snapshot();
        }
        Ok(())
    }

    /// Builds one fresh snapshot into whichever of the two double-buffer
    /// slots is due to be aged out next, and advances `snap_count`.
    fn build_next_snapshot(&mut self) -> usize {
        self.snapshot_cursor += 1;
        let message_num = self.snapshot_cursor;
        let slot = (self.decoder.running.snap_count % 2) as usize;
        self.decoder.running.snapshots[slot] =
            snapshot::build_snapshot(&mut self.decoder.running, message_num);
        self.decoder.running.snap_count += 1;
        slot
    }

    /// Interleaves one `read_frame`/`build_next_snapshot` pair the way
    /// `CL_TV_Open`/`CL_TV_Seek` do, so the two published snapshots come
    /// from two genuinely distinct ticks. If the extra `read_frame` reaches
    /// the end of the stream, snapshot 1 is a clone of snapshot 0 with a
    /// fresh `message_num` instead of a second `BuildSnapshot`/scores push.
    fn build_snapshot_pair(&mut self) -> Result<()> {
        let first_slot = self.build_next_snapshot();
        self.decoder.read_frame()?;
        if self.decoder.at_end {
            self.snapshot_cursor += 1;
            let message_num = self.snapshot_cursor;
            let next_slot = (self.decoder.running.snap_count % 2) as usize;
            let mut dup = self.decoder.running.snapshots[first_slot].clone();
            dup.message_num = message_num;
            self.decoder.running.snapshots[next_slot] = dup;
            self.decoder.running.snap_count += 1;
        } else {
            self.build_next_snapshot();
        }
        Ok(())
    }

    pub fn get_snapshot(&self, message_num: u32) -> Option<&Snapshot> {
        snapshot::get_snapshot(&self.decoder.running.snapshots, message_num)
    }

    pub fn current_snapshot_number(&self) -> u32 {
        self.decoder.running.snap_count
    }

    pub fn seek(&mut self, target_time_ms: i32) -> Result<()> {
        seek::seek(&mut self.decoder, target_time_ms)?;
        self.build_snapshot_pair()?;
        self.decoder.running.cmds.push(ReliableCommand {
            target: None,
            text: format!("tv_seek_sync {}", self.decoder.running.viewpoint),
        });
        Ok(())
    }

    pub fn view(&mut self, client_num: i32) -> bool {
        viewpoint::view(&mut self.decoder.running, client_num)
    }

    pub fn view_next(&mut self) -> bool {
        viewpoint::view_next(&mut self.decoder.running)
    }

    pub fn view_prev(&mut self) -> bool {
        viewpoint::view_prev(&mut self.decoder.running)
    }

    /// Fetches and applies server command `number`, following the
    /// `bcs0`/`bcs1`/`bcs2` reassembly, `cs`/`map_restart` recognition, and
    /// range-check rules described in `snapshot::check_command_range`.
    pub fn get_server_command(&mut self, number: u32) -> Result<Option<ServerCommandResult>> {
        snapshot::check_command_range(
            number,
            self.decoder.running.cmds.sequence(),
            MAX_RELIABLE_COMMANDS as u32,
        )?;

        let cmd: ReliableCommand = self.decoder.running.cmds.get(number)?.clone();

        let result = self.bcs.handle(&cmd.text)?;
        if let Some(ServerCommandResult::ConfigstringChanged { index, value }) = &result {
            self.decoder.update_configstring(*index, value)?;
        }
        Ok(result)
    }

    pub fn scores_command(&self) -> String {
        snapshot::synthesize_scores_command(&self.decoder.running)
    }

    /// Exports `viewpoint\nclientnum\tname\tteam\tmodel\tvr\n...` lines for
    /// an embedded spectator UI, reading name/model/vr from each active
    /// client's configstring (never `persistant[]`, which is unreliable for
    /// players following someone else).
    pub fn get_player_list(&self) -> String {
        let mut out = format!("{}\n", self.decoder.running.viewpoint);
        for i in 0..tvdemo_common::constants::MAX_CLIENTS {
            if !self.decoder.running.player_bitmask.get(i) {
                continue;
            }
            let cs = self
                .decoder
                .running
                .configstrings
                .get(tvdemo_common::constants::CS_PLAYERS + i);
            let name = tvdemo_common::configstring::value_for_key(cs, "n").unwrap_or_default();
            let team: i32 = tvdemo_common::configstring::value_for_key(cs, "t")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let model = tvdemo_common::configstring::value_for_key(cs, "model").unwrap_or_default();
            let vr: i32 = tvdemo_common::configstring::value_for_key(cs, "vr")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            out.push_str(&format!("{i}\t{name}\t{team}\t{model}\t{vr}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvdemo_common::vfs::StdFilesystem;

    fn temp_fs() -> StdFilesystem {
        let dir = std::env::temp_dir().join(format!(
            "tvdemo-playback-facade-test-{}-{}",
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

    fn write_minimal_demo(fs: &StdFilesystem, name: &str) {
        use std::io::Write;
        use tvdemo_common::compress::FrameEncoder;
        use tvdemo_common::constants::{CS_TERMINATOR, MAX_CLIENTS, MAX_GENTITIES};
        use tvdemo_common::header::Header;
        use tvdemo_common::trailer::Trailer;

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
        let mut frame_bytes = Vec::new();
        for t in [0i32, 25] {
            let mut body = Vec::new();
            body.extend_from_slice(&t.to_le_bytes());
            body.extend_from_slice(&vec![0u8; (MAX_GENTITIES + 7) / 8]);
            body.extend_from_slice(&((MAX_GENTITIES as u16 - 1).to_le_bytes()));
            body.extend_from_slice(&vec![0u8; (MAX_CLIENTS + 7) / 8]);
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
            let compressed = enc.compress_frame(&body).unwrap();
            frame_bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            frame_bytes.extend_from_slice(&compressed);
        }
        file_bytes.extend_from_slice(&frame_bytes);
        file_bytes.extend_from_slice(&enc.finish().unwrap());
        file_bytes.extend_from_slice(&Trailer::with_duration(25).encode());

        let mut w = fs.create(std::path::Path::new(name)).unwrap();
        w.write_all(&file_bytes).unwrap();
    }

    #[test]
    fn open_and_player_list_header_line() {
        let fs = temp_fs();
        write_minimal_demo(&fs, "p.tvd");
        let playback = Playback::open(&fs, std::path::Path::new("p.tvd")).unwrap();
        let list = playback.get_player_list();
        assert!(list.starts_with("0\n"));
    }

    #[test]
    fn view_next_false_with_no_players() {
        let fs = temp_fs();
        write_minimal_demo(&fs, "p2.tvd");
        let mut playback = Playback::open(&fs, std::path::Path::new("p2.tvd")).unwrap();
        assert!(!playback.view_next());
    }
}
