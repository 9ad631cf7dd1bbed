use tvdemo_common::constants::{
    MAX_ENTITIES_IN_SNAPSHOT, MAX_GENTITIES, PERS_ASSIST_COUNT, PERS_CAPTURES, PERS_DEFEND_COUNT,
    PERS_EXCELLENT_COUNT, PERS_GAUNTLET_FRAG_COUNT, PERS_IMPRESSIVE_COUNT, PERS_KILLED, PERS_RANK,
    PERS_SCORE,
};
use tvdemo_common::error::{Error, Result};
use tvdemo_common::{EntityState, ReliableCommand};

use crate::running_state::{RunningState, Snapshot};

/// Synthesizes the `scores` console command from the current player list,
/// in the exact field order the renderer's scoreboard parser expects:
/// `clientNum score ping time scoreFlags powerups accuracy impressive
/// excellent gauntlet defend assist perfect captures`. Grounded verbatim on
/// `CL_TV_InjectScores`'s field layout in `original_source`.
pub fn synthesize_scores_command(running: &RunningState) -> String {
    let entries: Vec<&tvdemo_common::PlayerState> = running
        .players
        .iter()
        .enumerate()
        .filter(|(i, _)| running.player_bitmask.get(*i))
        .map(|(_, p)| p)
        .collect();

    let mut out = format!("scores {} 0 0", entries.len());
    for p in entries {
        let powerups = running
            .entities
            .get(p.client_num as usize)
            .map(|e| e.powerups)
            .unwrap_or(0);
        let perfect = (p.persistent[PERS_RANK] == 0 && p.persistent[PERS_KILLED] == 0) as i32;
        out.push_str(&format!(
            " {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            p.client_num,
            p.persistent[PERS_SCORE],
            0, // ping (no live connection to measure)
            0, // time
            0, // scoreFlags
            powerups,
            0, // accuracy
            p.persistent[PERS_IMPRESSIVE_COUNT],
            p.persistent[PERS_EXCELLENT_COUNT],
            p.persistent[PERS_GAUNTLET_FRAG_COUNT],
            p.persistent[PERS_DEFEND_COUNT],
            p.persistent[PERS_ASSIST_COUNT],
            perfect,
            p.persistent[PERS_CAPTURES],
        ));
    }
    out
}

/// Entities whose event type is a score-plum, directed at someone other
/// than the current viewpoint, are hidden — they'd otherwise flash a score
/// popup meant for a different player.
fn is_visible(entity: &EntityState, viewpoint: i32) -> bool {
    !entity.is_scoreplum_for_other(viewpoint)
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

/// Builds one of the two double-buffered snapshots. Unconditionally
/// synthesizes and queues the `scores` command first, matching
/// `CL_TV_BuildSnapshot`'s unconditional call to `CL_TV_InjectScores`, and
/// stamps the resulting ring watermark into the snapshot. Candidate
/// entities (live, visible, excluding the viewpoint's own entity) are
/// included directly if they fit in `MAX_ENTITIES_IN_SNAPSHOT`; otherwise
/// the closest ones to the viewpoint's origin are kept, exactly mirroring
/// `CL_TV_BuildSnapshot`'s qsort-by-distance fallback.
pub fn build_snapshot(running: &mut RunningState, message_num: u32) -> Snapshot {
    let scores_cmd = synthesize_scores_command(running);
    running.cmds.push(ReliableCommand {
        target: None,
        text: scores_cmd,
    });
    let server_command_num = running.cmds.sequence();

    let viewpoint = running.viewpoint;
    let view_origin = running.view_origin;

    let mut candidates: Vec<&EntityState> = running
        .entities
        .iter()
        .enumerate()
        .filter(|(i, _)| running.entity_bitmask.get(*i))
        .filter(|(i, _)| *i as i32 != viewpoint)
        .map(|(_, e)| e)
        .filter(|e| is_visible(e, viewpoint))
        .collect();

    if candidates.len() > MAX_ENTITIES_IN_SNAPSHOT {
        candidates.sort_by(|a, b| {
            distance_sq(a.pos.tr_base, view_origin)
                .partial_cmp(&distance_sq(b.pos.tr_base, view_origin))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(MAX_ENTITIES_IN_SNAPSHOT);
    }

    let player = running
        .players
        .get(viewpoint as usize)
        .cloned()
        .unwrap_or_default();

    Snapshot {
        message_num,
        server_time: running.server_time,
        server_command_num,
        entities: candidates.into_iter().cloned().collect(),
        player,
    }
}

pub fn get_snapshot<'a>(snapshots: &'a [Snapshot; 2], message_num: u32) -> Option<&'a Snapshot> {
    snapshots.iter().find(|s| s.message_num == message_num)
}

/// Working state for the three-step `bcs0`/`bcs1`/`bcs2` big-configstring
/// reassembly: `bcs0`/`bcs1` build up a buffer and report "not ready yet",
/// only `bcs2` closes it and re-tokenizes as `cs`.
#[derive(Debug, Default)]
pub struct BigConfigStringBuffer {
    buffer: String,
}

pub enum ServerCommandResult {
    /// Command consumed internally (e.g. `bcs0`/`bcs1`, `disconnect`), no
    /// further action needed by the caller.
    Consumed,
    /// A `cs <index> <value>` command (from `cs` directly or `bcs2`
    /// reassembly) that changed a configstring.
    ConfigstringChanged { index: usize, value: String },
    /// `map_restart` passed through for the caller to clear transient UI.
    MapRestart,
    /// Any other command text, passed through verbatim.
    Other(String),
}

impl BigConfigStringBuffer {
    pub fn handle(&mut self, text: &str) -> Result<Option<ServerCommandResult>> {
        let mut parts = text.splitn(2, ' ');
        let verb = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");

        match verb {
            "bcs0" => {
                self.buffer = rest.to_string();
                Ok(None)
            }
            "bcs1" => {
                self.buffer.push_str(rest);
                Ok(None)
            }
            "bcs2" => {
                self.buffer.push_str(rest);
                let full = std::mem::take(&mut self.buffer);
                Self::parse_cs(&full).map(Some)
            }
            "cs" => Self::parse_cs(rest).map(Some),
            "disconnect" => Ok(Some(ServerCommandResult::Consumed)),
            "map_restart" => Ok(Some(ServerCommandResult::MapRestart)),
            _ => Ok(Some(ServerCommandResult::Other(text.to_string()))),
        }
    }

    fn parse_cs(rest: &str) -> Result<ServerCommandResult> {
        let mut parts = rest.splitn(2, ' ');
        let index: usize = parts
            .next()
            .ok_or_else(|| Error::BadFormat("cs command missing index".into()))?
            .parse()
            .map_err(|_| Error::BadFormat("cs command index not a number".into()))?;
        let value = parts.next().unwrap_or("").to_string();
        Ok(ServerCommandResult::ConfigstringChanged { index, value })
    }
}

/// Resolves `GetServerCommand`'s range checks: asking for a command older
/// than the ring retains is a caller-recoverable "not available" (clear and
/// resync); asking ahead of what has been produced is a caller bug.
pub fn check_command_range(
    requested: u32,
    server_command_number: u32,
    ring_capacity: u32,
) -> Result<()> {
    if requested > server_command_number {
        return Err(Error::CommandNotYetAvailable {
            requested,
            have: server_command_number,
        });
    }
    if server_command_number.wrapping_sub(requested) >= ring_capacity {
        return Err(Error::CommandTooOld {
            requested,
            oldest: server_command_number.saturating_sub(ring_capacity - 1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvdemo_common::constants::MAX_CLIENTS;

    fn running_with_entities(n: usize) -> RunningState {
        let mut rs = RunningState::default();
        for i in 0..n.min(MAX_GENTITIES) {
            rs.entity_bitmask.set(i, true);
            rs.entities[i].number = i as i32;
            rs.entities[i].pos.tr_base = [i as f32, 0.0, 0.0];
        }
        rs
    }

    #[test]
    fn snapshot_excludes_viewpoint_entity() {
        let mut rs = running_with_entities(5);
        rs.viewpoint = 2;
        let snap = build_snapshot(&mut rs, 10);
        assert!(snap.entities.iter().all(|e| e.number != 2));
        assert_eq!(snap.entities.len(), 4);
    }

    #[test]
    fn snapshot_caps_at_max_entities_by_distance() {
        let mut rs = running_with_entities(MAX_ENTITIES_IN_SNAPSHOT + 50);
        let snap = build_snapshot(&mut rs, 0);
        assert_eq!(snap.entities.len(), MAX_ENTITIES_IN_SNAPSHOT);
    }

    #[test]
    fn snapshot_records_server_command_watermark() {
        let mut rs = running_with_entities(0);
        let snap = build_snapshot(&mut rs, 1);
        assert_eq!(snap.server_command_num, rs.cmds.sequence());
        assert_eq!(snap.server_command_num, 1);
    }

    #[test]
    fn get_snapshot_matches_message_num() {
        let mut snapshots = [Snapshot::default(), Snapshot::default()];
        snapshots[0].message_num = 5;
        snapshots[1].message_num = 6;
        assert!(get_snapshot(&snapshots, 6).is_some());
        assert!(get_snapshot(&snapshots, 7).is_none());
    }

    #[test]
    fn bcs_three_step_reassembly() {
        let mut buf = BigConfigStringBuffer::default();
        assert!(buf.handle("bcs0 1 hel").unwrap().is_none());
        assert!(buf.handle("bcs1 lo wo").unwrap().is_none());
        let result = buf.handle("bcs2 rld").unwrap().unwrap();
        match result {
            ServerCommandResult::ConfigstringChanged { index, value } => {
                assert_eq!(index, 1);
                assert_eq!(value, "hello world");
            }
            _ => panic!("expected ConfigstringChanged"),
        }
    }

    #[test]
    fn plain_cs_command_parses_directly() {
        let mut buf = BigConfigStringBuffer::default();
        let result = buf.handle("cs 3 hello").unwrap().unwrap();
        match result {
            ServerCommandResult::ConfigstringChanged { index, value } => {
                assert_eq!(index, 3);
                assert_eq!(value, "hello");
            }
            _ => panic!("expected ConfigstringChanged"),
        }
    }

    #[test]
    fn map_restart_passed_through() {
        let mut buf = BigConfigStringBuffer::default();
        assert!(matches!(
            buf.handle("map_restart").unwrap().unwrap(),
            ServerCommandResult::MapRestart
        ));
    }

    #[test]
    fn command_range_rejects_ahead_of_sequence() {
        assert!(check_command_range(10, 5, 128).is_err());
    }

    #[test]
    fn command_range_rejects_too_old() {
        assert!(check_command_range(1, 200, 128).is_err());
    }

    #[test]
    fn command_range_accepts_recent() {
        assert!(check_command_range(190, 200, 128).is_ok());
    }

    #[test]
    fn scores_command_lists_every_live_player() {
        let mut rs = RunningState::default();
        rs.player_bitmask.set(0, true);
        rs.players[0].client_num = 0;
        rs.players[0].persistent[PERS_SCORE] = 42;
        let cmd = synthesize_scores_command(&rs);
        assert!(cmd.starts_with("scores 1 0 0"));
        assert!(cmd.contains("42"));
    }

    #[test]
    fn player_array_sized_for_max_clients() {
        let rs = RunningState::default();
        assert_eq!(rs.players.len(), MAX_CLIENTS);
    }
}
