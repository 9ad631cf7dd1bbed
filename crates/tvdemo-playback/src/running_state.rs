use tvdemo_common::cmdring::CommandRing;
use tvdemo_common::constants::{MAX_CLIENTS, MAX_GENTITIES};
use tvdemo_common::{Bitmask, ConfigstringTable, EntityState, PlayerState, Vec3};

/// A materialized snapshot handed to the renderer. Two of these are kept
/// double-buffered so the renderer can interpolate between them; they are
/// full copies, never delta-encoded, matching `spec.md` §4.4.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub message_num: u32,
    pub server_time: i32,
    pub server_command_num: u32,
    pub entities: Vec<EntityState>,
    pub player: PlayerState,
}

/// Decoder-side state deltas are applied against. Renewed wholesale on
/// `Open` and on a backward seek's restore; zeroed per-slot in `ReadFrame`
/// whenever that slot's bitmask bit just went clear — the decode-side half
/// of the dual baseline/running-state zeroing invariant (see
/// `tvdemo-recorder::BaselineState` for the encode-side half).
pub struct RunningState {
    pub entities: Vec<EntityState>,
    pub entity_bitmask: Bitmask,
    pub players: Vec<PlayerState>,
    pub player_bitmask: Bitmask,
    pub configstrings: ConfigstringTable,
    pub server_time: i32,
    pub viewpoint: i32,
    pub view_origin: Vec3,
    pub cmds: CommandRing,
    pub snapshots: [Snapshot; 2],
    pub snap_count: u32,
    pub seeking: bool,
}

impl Default for RunningState {
    fn default() -> Self {
        Self {
            entities: (0..MAX_GENTITIES).map(|_| EntityState::default()).collect(),
            entity_bitmask: Bitmask::new(MAX_GENTITIES),
            players: (0..MAX_CLIENTS).map(|_| PlayerState::default()).collect(),
            player_bitmask: Bitmask::new(MAX_CLIENTS),
            configstrings: ConfigstringTable::new(),
            server_time: 0,
            viewpoint: 0,
            view_origin: [0.0; 3],
            cmds: CommandRing::new(),
            snapshots: [Snapshot::default(), Snapshot::default()],
            snap_count: 0,
            seeking: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_running_state_has_full_capacity() {
        let rs = RunningState::default();
        assert_eq!(rs.entities.len(), MAX_GENTITIES);
        assert_eq!(rs.players.len(), MAX_CLIENTS);
        assert_eq!(rs.snap_count, 0);
    }
}
