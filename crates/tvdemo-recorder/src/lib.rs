//! TV demo recorder: writes the authoritative server tick stream to a
//! compact compressed file a playback decoder can later read back.

mod baseline;
mod cvars;
mod recorder;

pub use baseline::BaselineState;
pub use cvars::{auto_enabled, record_path, register as register_cvars};
pub use recorder::{FrameInput, Recorder};
