use crate::entity::EntityState;
use crate::player::PlayerState;

/// Stand-in for the externally-owned bit-message codec: the original engine
/// packs entity/player deltas into a variable-bit-length message stream
/// (`MSG_WriteDeltaEntity` et al.), which is explicitly out of scope for
/// this subsystem. This trait gives the recorder/decoder a concrete,
/// self-contained, round-trippable codec with the same field-changed-mask
/// shape (see `sv_emit_packet_entities`'s `U_REMOVE`/`U_NUMBER16`-style
/// changed bits), expressed as ordinary byte-aligned Rust instead of literal
/// bit-packing.
pub trait DeltaCodec<T> {
    fn encode_delta(base: &T, cur: &T, out: &mut Vec<u8>);
    fn decode_delta(base: &T, buf: &[u8]) -> (T, usize);
}

bitflags::bitflags! {
    struct EntityChanged: u16 {
        const POS_BASE   = 1 << 0;
        const POS_DELTA  = 1 << 1;
        const APOS_BASE  = 1 << 2;
        const APOS_DELTA = 1 << 3;
        const E_TYPE     = 1 << 4;
        const EVENT      = 1 << 5;
        const OTHER_ENT  = 1 << 6;
        const POWERUPS   = 1 << 7;
        const SOLID      = 1 << 8;
        const MODEL_IDX  = 1 << 9;
        const FRAME      = 1 << 10;
        const CLIENT_NUM = 1 << 11;
    }
}

fn write_vec3(out: &mut Vec<u8>, v: [f32; 3]) {
    for c in v {
        out.extend_from_slice(&c.to_le_bytes());
    }
}

fn read_vec3(buf: &[u8]) -> [f32; 3] {
    [
        f32::from_le_bytes(buf[0..4].try_into().unwrap()),
        f32::from_le_bytes(buf[4..8].try_into().unwrap()),
        f32::from_le_bytes(buf[8..12].try_into().unwrap()),
    ]
}

pub struct EntityCodec;

impl DeltaCodec<EntityState> for EntityCodec {
    fn encode_delta(base: &EntityState, cur: &EntityState, out: &mut Vec<u8>) {
        let mut changed = EntityChanged::empty();
        if base.pos.tr_base != cur.pos.tr_base {
            changed |= EntityChanged::POS_BASE;
        }
        if base.pos.tr_delta != cur.pos.tr_delta {
            changed |= EntityChanged::POS_DELTA;
        }
        if base.apos.tr_base != cur.apos.tr_base {
            changed |= EntityChanged::APOS_BASE;
        }
        if base.apos.tr_delta != cur.apos.tr_delta {
            changed |= EntityChanged::APOS_DELTA;
        }
        if base.e_type != cur.e_type {
            changed |= EntityChanged::E_TYPE;
        }
        if base.event != cur.event {
            changed |= EntityChanged::EVENT;
        }
        if base.other_entity_num != cur.other_entity_num {
            changed |= EntityChanged::OTHER_ENT;
        }
        if base.powerups != cur.powerups {
            changed |= EntityChanged::POWERUPS;
        }
        if base.solid != cur.solid {
            changed |= EntityChanged::SOLID;
        }
        if base.model_index != cur.model_index {
            changed |= EntityChanged::MODEL_IDX;
        }
        if base.frame != cur.frame {
            changed |= EntityChanged::FRAME;
        }
        if base.client_num != cur.client_num {
            changed |= EntityChanged::CLIENT_NUM;
        }

        out.extend_from_slice(&(cur.number as u16).to_le_bytes());
        out.extend_from_slice(&changed.bits().to_le_bytes());

        if changed.contains(EntityChanged::POS_BASE) {
            write_vec3(out, cur.pos.tr_base);
        }
        if changed.contains(EntityChanged::POS_DELTA) {
            write_vec3(out, cur.pos.tr_delta);
        }
        if changed.contains(EntityChanged::APOS_BASE) {
            write_vec3(out, cur.apos.tr_base);
        }
        if changed.contains(EntityChanged::APOS_DELTA) {
            write_vec3(out, cur.apos.tr_delta);
        }
        if changed.contains(EntityChanged::E_TYPE) {
            out.extend_from_slice(&cur.e_type.to_le_bytes());
        }
        if changed.contains(EntityChanged::EVENT) {
            out.extend_from_slice(&cur.event.to_le_bytes());
        }
        if changed.contains(EntityChanged::OTHER_ENT) {
            out.extend_from_slice(&cur.other_entity_num.to_le_bytes());
        }
        if changed.contains(EntityChanged::POWERUPS) {
            out.extend_from_slice(&cur.powerups.to_le_bytes());
        }
        if changed.contains(EntityChanged::SOLID) {
            out.extend_from_slice(&cur.solid.to_le_bytes());
        }
        if changed.contains(EntityChanged::MODEL_IDX) {
            out.extend_from_slice(&cur.model_index.to_le_bytes());
        }
        if changed.contains(EntityChanged::FRAME) {
            out.extend_from_slice(&cur.frame.to_le_bytes());
        }
        if changed.contains(EntityChanged::CLIENT_NUM) {
            out.extend_from_slice(&cur.client_num.to_le_bytes());
        }
    }

    fn decode_delta(base: &EntityState, buf: &[u8]) -> (EntityState, usize) {
        let mut cursor = 0usize;
        let number = u16::from_le_bytes(buf[0..2].try_into().unwrap()) as i32;
        cursor += 2;
        let changed =
            EntityChanged::from_bits_truncate(u16::from_le_bytes(buf[2..4].try_into().unwrap()));
        cursor += 2;

        let mut out = base.clone();
        out.number = number;

        macro_rules! read_vec3_field {
            ($flag:expr, $field:expr) => {
                if changed.contains($flag) {
                    $field = read_vec3(&buf[cursor..cursor + 12]);
                    cursor += 12;
                }
            };
        }
        macro_rules! read_i32_field {
            ($flag:expr, $field:expr) => {
                if changed.contains($flag) {
                    $field = i32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap());
                    cursor += 4;
                }
            };
        }

        read_vec3_field!(EntityChanged::POS_BASE, out.pos.tr_base);
        read_vec3_field!(EntityChanged::POS_DELTA, out.pos.tr_delta);
        read_vec3_field!(EntityChanged::APOS_BASE, out.apos.tr_base);
        read_vec3_field!(EntityChanged::APOS_DELTA, out.apos.tr_delta);
        read_i32_field!(EntityChanged::E_TYPE, out.e_type);
        read_i32_field!(EntityChanged::EVENT, out.event);
        read_i32_field!(EntityChanged::OTHER_ENT, out.other_entity_num);
        read_i32_field!(EntityChanged::POWERUPS, out.powerups);
        read_i32_field!(EntityChanged::SOLID, out.solid);
        read_i32_field!(EntityChanged::MODEL_IDX, out.model_index);
        read_i32_field!(EntityChanged::FRAME, out.frame);
        read_i32_field!(EntityChanged::CLIENT_NUM, out.client_num);

        (out, cursor)
    }
}

bitflags::bitflags! {
    struct PlayerChanged: u8 {
        const PMOVE_ORIGIN = 1 << 0;
        const VIEW_ANGLES  = 1 << 1;
        const PERSISTENT   = 1 << 2;
    }
}

pub struct PlayerCodec;

impl DeltaCodec<PlayerState> for PlayerCodec {
    fn encode_delta(base: &PlayerState, cur: &PlayerState, out: &mut Vec<u8>) {
        let mut changed = PlayerChanged::empty();
        if base.pmove_origin != cur.pmove_origin {
            changed |= PlayerChanged::PMOVE_ORIGIN;
        }
        if base.view_angles != cur.view_angles {
            changed |= PlayerChanged::VIEW_ANGLES;
        }
        if base.persistent != cur.persistent {
            changed |= PlayerChanged::PERSISTENT;
        }

        out.push(cur.client_num as u8);
        out.push(changed.bits());

        if changed.contains(PlayerChanged::PMOVE_ORIGIN) {
            write_vec3(out, cur.pmove_origin);
        }
        if changed.contains(PlayerChanged::VIEW_ANGLES) {
            write_vec3(out, cur.view_angles);
        }
        if changed.contains(PlayerChanged::PERSISTENT) {
            for v in cur.persistent {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    fn decode_delta(base: &PlayerState, buf: &[u8]) -> (PlayerState, usize) {
        let mut cursor = 0usize;
        let client_num = buf[0] as i32;
        cursor += 1;
        let changed = PlayerChanged::from_bits_truncate(buf[1]);
        cursor += 1;

        let mut out = base.clone();
        out.client_num = client_num;

        if changed.contains(PlayerChanged::PMOVE_ORIGIN) {
            out.pmove_origin = read_vec3(&buf[cursor..cursor + 12]);
            cursor += 12;
        }
        if changed.contains(PlayerChanged::VIEW_ANGLES) {
            out.view_angles = read_vec3(&buf[cursor..cursor + 12]);
            cursor += 12;
        }
        if changed.contains(PlayerChanged::PERSISTENT) {
            for slot in out.persistent.iter_mut() {
                *slot = i32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap());
                cursor += 4;
            }
        }

        (out, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_delta_round_trips_unchanged_fields() {
        let base = EntityState::default();
        let mut cur = EntityState::default();
        cur.number = 7;
        cur.pos.tr_base = [1.0, 2.0, 3.0];

        let mut buf = Vec::new();
        EntityCodec::encode_delta(&base, &cur, &mut buf);
        let (decoded, consumed) = EntityCodec::decode_delta(&base, &buf);

        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.number, 7);
        assert_eq!(decoded.pos.tr_base, [1.0, 2.0, 3.0]);
        assert_eq!(decoded.pos.tr_delta, base.pos.tr_delta);
    }

    #[test]
    fn entity_delta_against_zero_after_reappearance() {
        let zero = EntityState::default();
        let mut reappeared = EntityState::default();
        reappeared.number = 9;
        reappeared.powerups = 4;

        let mut buf = Vec::new();
        EntityCodec::encode_delta(&zero, &reappeared, &mut buf);
        let (decoded, _) = EntityCodec::decode_delta(&zero, &buf);
        assert_eq!(decoded.powerups, 4);
    }

    #[test]
    fn player_delta_round_trips() {
        let base = PlayerState::default();
        let mut cur = PlayerState::default();
        cur.client_num = 2;
        cur.persistent[crate::constants::PERS_SCORE] = 15;

        let mut buf = Vec::new();
        PlayerCodec::encode_delta(&base, &cur, &mut buf);
        let (decoded, consumed) = PlayerCodec::decode_delta(&base, &buf);

        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.client_num, 2);
        assert_eq!(decoded.persistent[crate::constants::PERS_SCORE], 15);
    }
}
