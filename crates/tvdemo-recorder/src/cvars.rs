use tvdemo_common::cvar::{CvarFlags, CvarRegistry};

/// Registers the two persistent cvars this subsystem owns. Mirrors
/// `SV_TV_Init`'s `Cvar_Get("sv_tvauto", "0", CVAR_ARCHIVE)` /
/// `Cvar_Get("sv_tvpath", "demos", CVAR_ARCHIVE)` pair.
pub fn register(registry: &mut CvarRegistry) {
    registry.register("sv_tvauto", "0", CvarFlags::ARCHIVE);
    registry.register("sv_tvpath", "demos", CvarFlags::ARCHIVE);
}

pub fn auto_enabled(registry: &CvarRegistry) -> bool {
    registry.get_int("sv_tvauto") != 0
}

pub fn record_path(registry: &CvarRegistry) -> &str {
    registry.get("sv_tvpath").unwrap_or("demos")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_with_expected_defaults() {
        let mut reg = CvarRegistry::new();
        register(&mut reg);
        assert_eq!(reg.get("sv_tvauto"), Some("0"));
        assert_eq!(reg.get("sv_tvpath"), Some("demos"));
        assert!(!auto_enabled(&reg));
        assert_eq!(record_path(&reg), "demos");
    }
}
