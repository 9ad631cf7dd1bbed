use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Minimal virtual filesystem contract this subsystem needs from the
/// engine's VFS. Kept small and trait-based rather than depending on the
/// teacher's full `Pack`/`SearchPath` machinery, since the TV demo format
/// only ever reads/writes a single home-directory file — the rest of the
/// engine's VFS (pak search order, pk3 mounting) is out of scope.
///
/// `remove` and `rename` are kept as distinct methods rather than collapsed
/// into one, matching the original engine's separate `FS_HomeRemove`
/// (discard) and `FS_Rename` (finalize) calls.
pub trait Filesystem {
    fn create(&self, path: &Path) -> Result<Box<dyn Write>>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn remove(&self, path: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Plain `std::fs`-backed filesystem rooted at a home directory, standing
/// in for the engine's `fs_homepath`-relative file access.
pub struct StdFilesystem {
    root: PathBuf,
}

impl StdFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Filesystem for StdFilesystem {
    fn create(&self, path: &Path) -> Result<Box<dyn Write>> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(fs::File::create(full)?))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path))?)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(self.resolve(path))?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Ok(fs::rename(self.resolve(from), self.resolve(to))?)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }
}
