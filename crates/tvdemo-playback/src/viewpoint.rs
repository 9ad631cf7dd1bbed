use tvdemo_common::constants::{CS_PLAYERS, MAX_CLIENTS, TEAM_SPECTATOR};

use crate::running_state::RunningState;

fn player_team(running: &RunningState, client_num: i32) -> i32 {
    tvdemo_common::configstring::value_for_key(
        running.configstrings.get(CS_PLAYERS + client_num as usize),
        "t",
    )
    .and_then(|s| s.parse().ok())
    .unwrap_or(0)
}

/// `snapCount -= 2` (clamped at zero) so the replacement snapshot pair
/// occupies the same renderer timeline slot a viewpoint switch just
/// invalidated — the one documented exception to `snapCount` otherwise
/// being monotonic.
fn rebuild_snapshots(running: &mut RunningState) {
    running.snap_count = running.snap_count.saturating_sub(2);
}

/// Switches to a specific live, non-spectator client. No-op if the
/// requested client isn't currently live or is a spectator.
pub fn view(running: &mut RunningState, client_num: i32) -> bool {
    if client_num < 0 || client_num as usize >= MAX_CLIENTS {
        return false;
    }
    if !running.player_bitmask.get(client_num as usize) {
        return false;
    }
    if player_team(running, client_num) == TEAM_SPECTATOR {
        return false;
    }
    running.viewpoint = client_num;
    rebuild_snapshots(running);
    true
}

fn find_wrapping(running: &RunningState, start: i32, step: i32) -> Option<i32> {
    let mut candidate = start;
    for _ in 0..MAX_CLIENTS {
        candidate = (candidate + step).rem_euclid(MAX_CLIENTS as i32);
        if candidate == start {
            break;
        }
        if running.player_bitmask.get(candidate as usize)
            && player_team(running, candidate) != TEAM_SPECTATOR
        {
            return Some(candidate);
        }
    }
    None
}

pub fn view_next(running: &mut RunningState) -> bool {
    match find_wrapping(running, running.viewpoint, 1) {
        Some(next) => {
            running.viewpoint = next;
            rebuild_snapshots(running);
            true
        }
        None => false,
    }
}

pub fn view_prev(running: &mut RunningState) -> bool {
    match find_wrapping(running, running.viewpoint, -1) {
        Some(prev) => {
            running.viewpoint = prev;
            rebuild_snapshots(running);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_active_players(indices: &[i32]) -> RunningState {
        let mut rs = RunningState::default();
        for &i in indices {
            rs.player_bitmask.set(i as usize, true);
        }
        rs
    }

    #[test]
    fn view_rejects_inactive_client() {
        let mut rs = with_active_players(&[0, 1]);
        assert!(!view(&mut rs, 5));
    }

    #[test]
    fn view_accepts_active_non_spectator() {
        let mut rs = with_active_players(&[0, 1]);
        assert!(view(&mut rs, 1));
        assert_eq!(rs.viewpoint, 1);
    }

    #[test]
    fn view_switch_decrements_snap_count_clamped_at_zero() {
        let mut rs = with_active_players(&[0, 1]);
        rs.snap_count = 1;
        view(&mut rs, 1);
        assert_eq!(rs.snap_count, 0);

        rs.snap_count = 10;
        view(&mut rs, 0);
        assert_eq!(rs.snap_count, 8);
    }

    #[test]
    fn view_next_wraps_around() {
        let mut rs = with_active_players(&[0, 3]);
        rs.viewpoint = 3;
        assert!(view_next(&mut rs));
        assert_eq!(rs.viewpoint, 0);
    }

    #[test]
    fn view_next_returns_false_with_no_other_candidates() {
        let mut rs = with_active_players(&[2]);
        rs.viewpoint = 2;
        assert!(!view_next(&mut rs));
    }
}
