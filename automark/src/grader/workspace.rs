use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// A student's scratch build directory. Every test unit starts from an empty one.
#[derive(Debug, Clone)]
pub struct Workspace {
    build_dir: PathBuf,
}

impl Workspace {
    pub fn new(build_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let build_dir = build_dir.into();
        fs::create_dir_all(&build_dir)?;
        Ok(Self { build_dir })
    }

    pub fn path(&self) -> &Path {
        &self.build_dir
    }

    /// Removes everything inside the build directory, keeping the directory itself.
    pub fn reset(&self) -> io::Result<()> {
        fs::create_dir_all(&self.build_dir)?;
        for entry in fs::read_dir(&self.build_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
