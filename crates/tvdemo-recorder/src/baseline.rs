use tvdemo_common::constants::{MAX_CLIENTS, MAX_GENTITIES};
use tvdemo_common::{Bitmask, EntityState, PlayerState};

/// Previous-tick state the recorder deltas against. Renewed wholesale at
/// `StartRecord`, and zeroed per-slot in `WriteFrame` whenever that slot's
/// bitmask bit just went clear — the encode-side half of the dual
/// baseline/running-state zeroing invariant (see `tvdemo-playback`'s
/// `RunningState` for the decode-side half).
pub struct BaselineState {
    pub prev_entities: Vec<EntityState>,
    pub prev_entity_bitmask: Bitmask,
    pub prev_players: Vec<PlayerState>,
    pub prev_player_bitmask: Bitmask,
}

impl Default for BaselineState {
    fn default() -> Self {
        Self {
            prev_entities: (0..MAX_GENTITIES).map(|_| EntityState::default()).collect(),
            prev_entity_bitmask: Bitmask::new(MAX_GENTITIES),
            prev_players: (0..MAX_CLIENTS).map(|_| PlayerState::default()).collect(),
            prev_player_bitmask: Bitmask::new(MAX_CLIENTS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_baseline_has_full_capacity() {
        let b = BaselineState::default();
        assert_eq!(b.prev_entities.len(), MAX_GENTITIES);
        assert_eq!(b.prev_players.len(), MAX_CLIENTS);
    }
}
