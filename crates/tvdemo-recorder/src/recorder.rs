use crate::baseline::BaselineState;
use std::path::{Path, PathBuf};
use tvdemo_common::codec::{DeltaCodec, EntityCodec, PlayerCodec};
use tvdemo_common::compress::FrameEncoder;
use tvdemo_common::constants::{MAX_CLIENTS, MAX_GENTITIES, MAX_MSGLEN, MAX_RELIABLE_COMMANDS};
use tvdemo_common::error::{Error, Result};
use tvdemo_common::header::{Header, DURATION_OFFSET};
use tvdemo_common::trailer::Trailer;
use tvdemo_common::vfs::Filesystem;
use tvdemo_common::{Bitmask, ConfigstringTable, EntityState, PlayerState};

/// One inbound server tick's worth of state the recorder deltas and writes.
/// The recorder has no opinion on how liveness is computed (linked flags,
/// `SVF_NOCLIENT`, connection state) — that's the game/network layer's
/// call, supplied here as already-resolved bitmasks.
pub struct FrameInput<'a> {
    pub server_time: i32,
    pub entities: &'a [EntityState],
    pub live_entities: &'a Bitmask,
    pub players: &'a [PlayerState],
    pub live_players: &'a Bitmask,
    /// Current configstring values, read (not diffed) at indices flagged
    /// dirty by `configstring_changed` since the last frame.
    pub configstrings: &'a ConfigstringTable,
}

#[derive(Debug, Clone)]
struct PendingCommand {
    target: Option<i32>,
    text: String,
}

enum AutoStartState {
    Disabled,
    Pending { had_human: bool },
}

pub struct Recorder<F: Filesystem> {
    fs: F,
    recording: bool,
    auto: AutoStartState,
    recording_path: PathBuf,
    file: Option<Box<dyn std::io::Write>>,
    encoder: Option<FrameEncoder>,
    baseline: BaselineState,
    cs_changed: Bitmask,
    pending_commands: Vec<PendingCommand>,
    frame_count: u32,
    first_server_time: i32,
    last_server_time: i32,
    bytes_written: u64,
}

impl<F: Filesystem> Recorder<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            recording: false,
            auto: AutoStartState::Disabled,
            recording_path: PathBuf::new(),
            file: None,
            encoder: None,
            baseline: BaselineState::default(),
            cs_changed: Bitmask::new(tvdemo_common::constants::MAX_CONFIGSTRINGS),
            pending_commands: Vec::new(),
            frame_count: 0,
            first_server_time: 0,
            last_server_time: 0,
            bytes_written: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Marks auto-record as armed; the next `poll_auto_start` call with a
    /// satisfied precondition begins recording. Silent no-op preconditions
    /// per §7: calling this while already recording or already pending does
    /// nothing.
    pub fn auto_start(&mut self) {
        if self.recording {
            return;
        }
        if matches!(self.auto, AutoStartState::Pending { .. }) {
            return;
        }
        self.auto = AutoStartState::Pending { had_human: false };
        tracing::info!("TV: Auto-record pending, waiting for first client.");
    }

    /// Resolves a deferred auto-start. `match_state` and `match_uuid` mirror
    /// the `g_matchState`/`g_matchUUID` cvars a match-aware mod sets;
    /// `human_connected` is true once a non-bot client is active. When
    /// `match_state` is present, recording starts only on `"active"`;
    /// otherwise the first human client triggers it.
    pub fn poll_auto_start(
        &mut self,
        match_state: Option<&str>,
        match_uuid: Option<&str>,
        human_connected: bool,
        tick_rate: u32,
        max_clients: u32,
        map_name: &str,
    ) -> Result<()> {
        let had_human = match &mut self.auto {
            AutoStartState::Disabled => return Ok(()),
            AutoStartState::Pending { had_human } => had_human,
        };
        *had_human = *had_human || human_connected;

        let should_start = match match_state {
            Some(state) => state.eq_ignore_ascii_case("active"),
            None => human_connected,
        };
        if !should_start {
            return Ok(());
        }

        let name = match match_uuid {
            Some(uuid) if !uuid.is_empty() => uuid.to_string(),
            _ => default_recording_name(),
        };
        self.auto = AutoStartState::Disabled;
        self.start_record(&name, tick_rate, max_clients, map_name, &ConfigstringTable::new())
    }

    pub fn start_record(
        &mut self,
        filename: &str,
        tick_rate: u32,
        max_clients: u32,
        map_name: &str,
        configstrings: &ConfigstringTable,
    ) -> Result<()> {
        if self.recording {
            return Err(Error::AlreadyRecording);
        }

        self.recording_path = PathBuf::from(filename);
        let tmp_path = tmp_path(&self.recording_path);

        let mut file = self.fs.create(&tmp_path)?;
        self.bytes_written = 0;

        let header = Header {
            protocol: tvdemo_common::constants::PROTOCOL_VERSION,
            tick_rate,
            max_clients,
            duration_ms: 0,
            map_name: map_name.to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        };
        let header_bytes = header.encode();
        file.write_all(&header_bytes)?;
        self.bytes_written += header_bytes.len() as u64;

        let mut cs_bytes = Vec::new();
        for (index, value) in configstrings.iter_nonempty() {
            cs_bytes.extend_from_slice(&(index as u16).to_le_bytes());
            cs_bytes.extend_from_slice(&(value.len() as u16).to_le_bytes());
            cs_bytes.extend_from_slice(value.as_bytes());
        }
        cs_bytes.extend_from_slice(&tvdemo_common::constants::CS_TERMINATOR.to_le_bytes());
        file.write_all(&cs_bytes)?;
        self.bytes_written += cs_bytes.len() as u64;

        self.file = Some(file);
        self.encoder = Some(FrameEncoder::new(3)?);
        self.baseline = BaselineState::default();
        self.cs_changed = Bitmask::new(tvdemo_common::constants::MAX_CONFIGSTRINGS);
        self.pending_commands.clear();
        self.frame_count = 0;
        self.recording = true;

        tracing::info!(path = %tmp_path.display(), "TV: Recording started");
        Ok(())
    }

    pub fn configstring_changed(&mut self, index: usize) {
        if index < self.cs_changed.bits() {
            self.cs_changed.set(index, true);
        }
    }

    /// Drops the command silently once either capacity guard is exceeded,
    /// matching the original's fire-and-forget overflow behavior (no error
    /// surfaced to the caller — losing a TV spectator command is not worth
    /// failing the tick over).
    pub fn capture_server_command(&mut self, target: Option<i32>, text: &str) {
        if !self.recording {
            return;
        }
        if self.pending_commands.len() >= MAX_RELIABLE_COMMANDS {
            return;
        }
        self.pending_commands.push(PendingCommand {
            target,
            text: text.to_string(),
        });
    }

    pub fn write_frame(&mut self, input: FrameInput) -> Result<()> {
        if !self.recording {
            return Ok(());
        }

        if self.frame_count == 0 {
            self.first_server_time = input.server_time;
        }
        self.last_server_time = input.server_time;

        let mut body = Vec::new();
        body.extend_from_slice(&input.server_time.to_le_bytes());

        body.extend_from_slice(input.live_entities.as_bytes());
        for i in 0..MAX_GENTITIES {
            if !input.live_entities.get(i) {
                continue;
            }
            let cur = input
                .entities
                .get(i)
                .cloned()
                .unwrap_or_default();
            EntityCodec::encode_delta(&self.baseline.prev_entities[i], &cur, &mut body);
        }
        body.extend_from_slice(&((MAX_GENTITIES as u16 - 1).to_le_bytes()));

        body.extend_from_slice(input.live_players.as_bytes());
        for i in 0..MAX_CLIENTS {
            if !input.live_players.get(i) {
                continue;
            }
            let cur = input.players.get(i).cloned().unwrap_or_default();
            body.push(i as u8);
            PlayerCodec::encode_delta(&self.baseline.prev_players[i], &cur, &mut body);
        }

        let changed: Vec<usize> = self.cs_changed.iter_set().collect();
        body.extend_from_slice(&(changed.len() as u16).to_le_bytes());
        for &idx in &changed {
            let value = input.configstrings.get(idx);
            body.extend_from_slice(&(idx as u16).to_le_bytes());
            body.extend_from_slice(&(value.len() as u16).to_le_bytes());
            body.extend_from_slice(value.as_bytes());
        }
        self.cs_changed = Bitmask::new(tvdemo_common::constants::MAX_CONFIGSTRINGS);

        body.extend_from_slice(&(self.pending_commands.len() as u16).to_le_bytes());
        for cmd in &self.pending_commands {
            let target_byte = match cmd.target {
                None => 255u8,
                Some(t) => t as u8,
            };
            body.push(target_byte);
            body.extend_from_slice(&(cmd.text.len() as u16).to_le_bytes());
            body.extend_from_slice(cmd.text.as_bytes());
        }
        self.pending_commands.clear();

        if body.len() > MAX_MSGLEN {
            tracing::warn!(
                frame = self.frame_count,
                "TV: frame overflowed message buffer, stopping recording"
            );
            self.stop_record(true)?;
            return Err(Error::FrameBufferOverflow {
                size: body.len(),
                limit: MAX_MSGLEN,
            });
        }

        let compressed = self
            .encoder
            .as_mut()
            .expect("recording implies encoder is present")
            .compress_frame(&body)?;

        let frame_size = compressed.len() as u32;
        let file = self.file.as_mut().expect("recording implies file is open");
        file.write_all(&frame_size.to_le_bytes())?;
        file.write_all(&compressed)?;
        self.bytes_written += 4 + compressed.len() as u64;

        for i in 0..MAX_GENTITIES {
            if input.live_entities.get(i) {
                self.baseline.prev_entities[i] = input.entities.get(i).cloned().unwrap_or_default();
            } else {
                self.baseline.prev_entities[i] = EntityState::default();
            }
        }
        self.baseline.prev_entity_bitmask = input.live_entities.clone();

        for i in 0..MAX_CLIENTS {
            if input.live_players.get(i) {
                self.baseline.prev_players[i] = input.players.get(i).cloned().unwrap_or_default();
            } else {
                self.baseline.prev_players[i] = PlayerState::default();
            }
        }
        self.baseline.prev_player_bitmask = input.live_players.clone();

        self.frame_count += 1;
        Ok(())
    }

    pub fn stop_record(&mut self, discard: bool) -> Result<()> {
        self.auto = AutoStartState::Disabled;
        if !self.recording {
            return Ok(());
        }

        let tmp_path = tmp_path(&self.recording_path);

        if discard {
            self.file = None;
            self.fs.remove(&tmp_path)?;
            tracing::info!("TV: Recording discarded, file deleted.");
        } else {
            if let Some(encoder) = self.encoder.take() {
                let tail = encoder.finish()?;
                if let Some(file) = self.file.as_mut() {
                    file.write_all(&tail)?;
                }
            }

            let duration_ms = (self.last_server_time - self.first_server_time).max(0) as u32;
            let trailer = Trailer::with_duration(duration_ms);
            if let Some(file) = self.file.as_mut() {
                file.write_all(&trailer.encode())?;
            }
            self.file = None;

            patch_duration(&self.fs, &tmp_path, duration_ms)?;

            let final_path = final_path(&self.recording_path);
            self.fs.rename(&tmp_path, &final_path)?;

            tracing::info!(
                frames = self.frame_count,
                seconds = duration_ms as f32 / 1000.0,
                bytes = self.bytes_written,
                "TV: Recording stopped"
            );
        }

        self.recording = false;
        Ok(())
    }
}

fn tmp_path(recording_path: &Path) -> PathBuf {
    let mut p = recording_path.as_os_str().to_os_string();
    p.push(".tvd.tmp");
    PathBuf::from(p)
}

fn final_path(recording_path: &Path) -> PathBuf {
    let mut p = recording_path.as_os_str().to_os_string();
    p.push(".tvd");
    PathBuf::from(p)
}

fn default_recording_name() -> String {
    format!("tv_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Re-reads the just-written temp file, patches the duration field at
/// `DURATION_OFFSET`, and writes it back. A real VFS would expose a seek+
/// write-in-place primitive (as the original's `FS_Seek`/`FS_Write` does);
/// `Filesystem::create` here only exposes an append stream, so the patch is
/// done as a read-modify-write over the whole temp file instead.
fn patch_duration<F: Filesystem>(fs: &F, tmp_path: &Path, duration_ms: u32) -> Result<()> {
    let mut bytes = fs.read(tmp_path)?;
    let offset = DURATION_OFFSET as usize;
    if bytes.len() < offset + 4 {
        return Err(Error::BadFormat("recorded file shorter than header".into()));
    }
    bytes[offset..offset + 4].copy_from_slice(&duration_ms.to_le_bytes());
    let mut w = fs.create(tmp_path)?;
    w.write_all(&bytes)?;
    Ok(())
}
