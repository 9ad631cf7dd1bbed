use tvdemo_common::cvar::{CvarFlags, CvarRegistry};

use crate::playback::Playback;

/// Registers the three read-only status cvars `Open` exposes to the rest
/// of the engine. Mirrors `CL_TV_Init`'s
/// `Cvar_Get("cl_tvViewpoint", "0", CVAR_ROM)` trio.
pub fn register(registry: &mut CvarRegistry) {
    registry.register("cl_tvViewpoint", "0", CvarFlags::ROM);
    registry.register("cl_tvTime", "0", CvarFlags::ROM);
    registry.register("cl_tvDuration", "0", CvarFlags::ROM);
}

/// Syncs the read-only status cvars to the current playback state. Called
/// after every frame read, seek, or viewpoint switch.
pub fn sync(registry: &mut CvarRegistry, playback: &Playback) {
    registry.set("cl_tvViewpoint", &playback.decoder.running.viewpoint.to_string());
    registry.set("cl_tvTime", &playback.decoder.running.server_time.to_string());
    registry.set(
        "cl_tvDuration",
        &playback.decoder.trailer.duration_ms().unwrap_or(0).to_string(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvdemo_common::vfs::{Filesystem, StdFilesystem};

    fn temp_fs() -> StdFilesystem {
        let dir = std::env::temp_dir().join(format!(
            "tvdemo-playback-cvars-test-{}-{}",
            std::process::id(),
            unique()
        ));
        StdFilesystem::new(dir)
    }

    fn unique() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    fn write_minimal_demo(fs: &StdFilesystem, name: &str) {
        use std::io::Write;
        use tvdemo_common::compress::FrameEncoder;
        use tvdemo_common::constants::{CS_TERMINATOR, MAX_CLIENTS, MAX_GENTITIES};
        use tvdemo_common::header::Header;
        use tvdemo_common::trailer::Trailer;

        let header = Header {
            protocol: tvdemo_common::constants::PROTOCOL_VERSION,
            tick_rate: 40,
            max_clients: 8,
            duration_ms: 0,
            map_name: "q3dm1".into(),
            timestamp: "2026-07-31T00:00:00Z".into(),
        };
        let mut file_bytes = header.encode();
        file_bytes.extend_from_slice(&CS_TERMINATOR.to_le_bytes());

        let mut enc = FrameEncoder::new(3).unwrap();
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&vec![0u8; (MAX_GENTITIES + 7) / 8]);
        body.extend_from_slice(&((MAX_GENTITIES as u16 - 1).to_le_bytes()));
        body.extend_from_slice(&vec![0u8; (MAX_CLIENTS + 7) / 8]);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        let compressed = enc.compress_frame(&body).unwrap();
        file_bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        file_bytes.extend_from_slice(&compressed);
        file_bytes.extend_from_slice(&enc.finish().unwrap());
        file_bytes.extend_from_slice(&Trailer::with_duration(2500).encode());

        let mut w = fs.create(std::path::Path::new(name)).unwrap();
        w.write_all(&file_bytes).unwrap();
    }

    #[test]
    fn sync_reflects_trailer_duration() {
        let fs = temp_fs();
        write_minimal_demo(&fs, "cv.tvd");
        let playback = Playback::open(&fs, std::path::Path::new("cv.tvd")).unwrap();

        let mut registry = CvarRegistry::new();
        register(&mut registry);
        sync(&mut registry, &playback);

        assert_eq!(registry.get("cl_tvDuration"), Some("2500"));
    }
}
