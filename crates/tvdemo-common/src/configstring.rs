use crate::constants::{CS_SERVERINFO, MAX_CONFIGSTRINGS, MAX_GAMESTATE_CHARS};

/// Packed configstring arena: one flat byte blob backing all
/// `MAX_CONFIGSTRINGS` slots, plus a per-index offset table. Index 0 is
/// reserved to mean "empty string" and is never written to.
///
/// Mirrors the original engine's `gameState_t` (`stringData` + per-index
/// `stringOffsets`) rather than a `Vec<String>` per slot, so a whole-arena
/// rebuild on `update` matches the original's semantics exactly.
#[derive(Debug, Clone)]
pub struct ConfigstringTable {
    offsets: [u32; MAX_CONFIGSTRINGS],
    data: Vec<u8>,
}

impl Default for ConfigstringTable {
    fn default() -> Self {
        Self {
            offsets: [0; MAX_CONFIGSTRINGS],
            // index 0 reserved: a single NUL at offset 0 is the empty string.
            data: vec![0u8],
        }
    }
}

impl ConfigstringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> &str {
        let off = self.offsets[index] as usize;
        if off == 0 {
            return "";
        }
        let end = self.data[off..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| off + p)
            .unwrap_or(self.data.len());
        std::str::from_utf8(&self.data[off..end]).unwrap_or("")
    }

    /// Rebuilds the whole arena with `index` replaced by `value`. Matches
    /// the original engine's behavior: configstrings are not edited
    /// in-place, the entire backing buffer is regenerated on every change.
    pub fn update(&mut self, index: usize, value: &str) -> Result<(), crate::error::Error> {
        assert!(index < MAX_CONFIGSTRINGS, "configstring index out of range");

        let mut new_data = vec![0u8];
        let mut new_offsets = [0u32; MAX_CONFIGSTRINGS];

        for i in 0..MAX_CONFIGSTRINGS {
            let s = if i == index { value } else { self.get(i) };
            if s.is_empty() {
                new_offsets[i] = 0;
                continue;
            }
            new_offsets[i] = new_data.len() as u32;
            new_data.extend_from_slice(s.as_bytes());
            new_data.push(0);
        }

        if new_data.len() > MAX_GAMESTATE_CHARS {
            return Err(crate::error::Error::GamestateOverflow {
                size: new_data.len(),
                limit: MAX_GAMESTATE_CHARS,
            });
        }

        self.data = new_data;
        self.offsets = new_offsets;
        Ok(())
    }

    /// `tv=1` must always be present in the serverinfo configstring so the
    /// render pipeline knows it is watching a TV demo rather than a live
    /// connection. Re-injected on every write to `CS_SERVERINFO`.
    pub fn inject_tv_flag(&mut self) -> Result<(), crate::error::Error> {
        let current = self.get(CS_SERVERINFO).to_string();
        let updated = set_info_key(&current, "tv", "1");
        self.update(CS_SERVERINFO, &updated)
    }

    pub fn iter_nonempty(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        (0..MAX_CONFIGSTRINGS).filter_map(move |i| {
            let s = self.get(i);
            if s.is_empty() {
                None
            } else {
                Some((i, s))
            }
        })
    }
}

/// Minimal Quake-style infostring key/value editor (`\key\value\key\value`).
pub fn set_info_key(info: &str, key: &str, value: &str) -> String {
    let mut pairs: Vec<(String, String)> = info
        .trim_start_matches('\\')
        .split('\\')
        .collect::<Vec<_>>()
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| (c[0].to_string(), c[1].to_string()))
        .collect();

    if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
        existing.1 = value.to_string();
    } else {
        pairs.push((key.to_string(), value.to_string()));
    }

    let mut out = String::new();
    for (k, v) in pairs {
        out.push('\\');
        out.push_str(&k);
        out.push('\\');
        out.push_str(&v);
    }
    out
}

pub fn value_for_key(info: &str, key: &str) -> Option<String> {
    info.trim_start_matches('\\')
        .split('\\')
        .collect::<Vec<_>>()
        .chunks(2)
        .find(|c| c.len() == 2 && c[0] == key)
        .map(|c| c[1].to_string())
}
