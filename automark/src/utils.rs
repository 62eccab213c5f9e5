#[cfg(unix)]
use std::path::{Path, PathBuf};

/// Writes an executable `sh` script standing in for an external tool.
#[cfg(unix)]
pub fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(&path, perms).unwrap();
    path
}
