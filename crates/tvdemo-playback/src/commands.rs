use crate::playback::Playback;

/// Console command handlers for the four commands `Open` registers:
/// `tv_view <clientnum>`, `tv_view_next`, `tv_view_prev`, `tv_seek <ms>`.
/// Kept as plain functions over `&mut Playback` rather than the teacher's
/// boxed-closure `CmdFunction` table (`myq2-common::cmd`), since this crate
/// has no command-line tokenizer of its own to register against — the
/// owning engine's `Cmd_AddCommand` is the out-of-scope collaborator these
/// functions are meant to be wired into.
pub fn tv_view(playback: &mut Playback, args: &[&str]) -> bool {
    match args.first().and_then(|s| s.parse::<i32>().ok()) {
        Some(client_num) => playback.view(client_num),
        None => false,
    }
}

pub fn tv_view_next(playback: &mut Playback) -> bool {
    playback.view_next()
}

pub fn tv_view_prev(playback: &mut Playback) -> bool {
    playback.view_prev()
}

pub fn tv_seek(playback: &mut Playback, args: &[&str]) -> tvdemo_common::error::Result<bool> {
    match args.first().and_then(|s| s.parse::<i32>().ok()) {
        Some(ms) => {
            playback.seek(ms)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
