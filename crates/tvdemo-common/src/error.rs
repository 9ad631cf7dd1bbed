use thiserror::Error;

/// Error taxonomy for the TV demo subsystem.
///
/// Mirrors the two-tier severity the original engine encodes as
/// `Com_Error(ERR_FATAL, ...)` vs `Com_Error(ERR_DROP, ...)`:
/// `Fatal` variants abort the operation that raised them and must be
/// propagated by the caller; everything else is recoverable and degrades
/// a stream's state (`at_end`, a failed `Option`) rather than erroring out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad tv demo format: {0}")]
    BadFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("gamestate too large: {size} bytes exceeds limit of {limit}")]
    GamestateOverflow { size: usize, limit: usize },

    #[error("frame buffer overflow: {size} bytes exceeds limit of {limit}")]
    FrameBufferOverflow { size: usize, limit: usize },

    #[error("server command {requested} is too old, oldest available is {oldest}")]
    CommandTooOld { requested: u32, oldest: u32 },

    #[error("server command {requested} requested before it was received (have {have})")]
    CommandNotYetAvailable { requested: u32, have: u32 },

    #[error("slot index {index} out of range (max {max})")]
    SlotOutOfRange { index: usize, max: usize },

    #[error("not recording")]
    NotRecording,

    #[error("already recording")]
    AlreadyRecording,

    #[error("not open")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, Error>;
