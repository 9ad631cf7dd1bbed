use crate::constants::MAX_PERSISTENT;
use crate::entity::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub client_num: i32,
    pub pmove_origin: Vec3,
    pub view_angles: Vec3,
    pub persistent: [i32; MAX_PERSISTENT],
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            client_num: 0,
            pmove_origin: [0.0; 3],
            view_angles: [0.0; 3],
            persistent: [0; MAX_PERSISTENT],
        }
    }
}
