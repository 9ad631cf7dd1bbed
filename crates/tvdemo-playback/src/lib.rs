//! TV demo playback: decodes a recording written by `tvdemo-recorder` back
//! into the per-tick snapshot shape the render pipeline expects, with seek
//! and viewpoint control on top.

mod commands;
mod cvars;
mod decoder;
mod playback;
mod running_state;
mod seek;
mod snapshot;
mod viewpoint;

pub use commands::{tv_seek, tv_view, tv_view_next, tv_view_prev};
pub use cvars::{register as register_cvars, sync as sync_cvars};
pub use decoder::Decoder;
pub use playback::Playback;
pub use running_state::{RunningState, Snapshot};
pub use snapshot::{synthesize_scores_command, ServerCommandResult};
