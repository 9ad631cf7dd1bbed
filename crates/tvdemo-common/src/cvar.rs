use std::collections::HashMap;

bitflags::bitflags! {
    #[derive(Clone, Copy)]
    pub struct CvarFlags: u32 {
        const ARCHIVE = 1 << 0;
        const ROM     = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: CvarFlagsRepr,
    pub modified: bool,
}

/// Plain integer mirror of `CvarFlags` so `Cvar` can derive `Debug` without
/// requiring `bitflags` to implement it for us in this version of the crate.
pub type CvarFlagsRepr = u32;

/// Process-wide cvar table for the handful of cvars this subsystem owns:
/// `sv_tvauto`/`sv_tvpath` (persistent, `CVAR_ARCHIVE`) and
/// `cl_tvViewpoint`/`cl_tvTime`/`cl_tvDuration` (read-only status, `CVAR_ROM`).
/// Mirrors `myq2-common`'s `CvarContext` central-state pattern.
#[derive(Debug, Default)]
pub struct CvarRegistry {
    vars: HashMap<String, Cvar>,
}

impl CvarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, default: &str, flags: CvarFlags) {
        self.vars.entry(name.to_string()).or_insert(Cvar {
            name: name.to_string(),
            string: default.to_string(),
            flags: flags.bits(),
            modified: false,
        });
    }

    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(cvar) = self.vars.get_mut(name) {
            if cvar.string != value {
                cvar.string = value.to_string();
                cvar.modified = true;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|c| c.string.as_str())
    }

    pub fn get_int(&self, name: &str) -> i32 {
        self.get(name).and_then(|s| s.parse().ok()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_sets_default_and_get_reads_it() {
        let mut reg = CvarRegistry::new();
        reg.register("sv_tvauto", "0", CvarFlags::ARCHIVE);
        assert_eq!(reg.get("sv_tvauto"), Some("0"));
    }

    #[test]
    fn register_is_idempotent() {
        let mut reg = CvarRegistry::new();
        reg.register("sv_tvpath", "tvdemos", CvarFlags::ARCHIVE);
        reg.set("sv_tvpath", "custom");
        reg.register("sv_tvpath", "tvdemos", CvarFlags::ARCHIVE);
        assert_eq!(reg.get("sv_tvpath"), Some("custom"));
    }

    #[test]
    fn set_marks_modified_only_on_change() {
        let mut reg = CvarRegistry::new();
        reg.register("cl_tvTime", "0", CvarFlags::ROM);
        reg.set("cl_tvTime", "0");
        assert!(!reg.vars.get("cl_tvTime").unwrap().modified);
        reg.set("cl_tvTime", "1500");
        assert!(reg.vars.get("cl_tvTime").unwrap().modified);
    }
}
