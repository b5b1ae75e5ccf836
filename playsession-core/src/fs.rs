//! Atomic disk persistence for save states, resume snapshots, and battery saves.
//!
//! Every write creates its parent directory and goes through a temp-file-plus-rename
//! so a crash or power loss mid-write never leaves a torn save file on disk. Save
//! payloads are already-serialized bytes handed up by the emulator core through
//! [`crate::emulator::SaveStater`]/[`crate::emulator::BatterySaver`]; this module
//! never interprets their contents.

use crate::error::FsError as Error;
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Writes `contents` to `path` atomically: write to a sibling temp file, fsync, then
/// rename over the destination. The parent directory is created (mode 0755) if needed.
fn write_atomic(path: &Path, contents: impl FnOnce(&mut File) -> std::io::Result<()>) -> Result<()> {
    let Some(dir) = path.parent() else {
        return Err(Error::InvalidPath(path.to_path_buf()));
    };
    if !dir.as_os_str().is_empty() && !dir.exists() {
        create_dir_all_mode(dir).map_err(|err| Error::io(err, format!("failed to create directory {dir:?}")))?;
    }
    let tmp_path = path.with_extension(format!("{}.tmp", path.extension().and_then(|e| e.to_str()).unwrap_or("")));
    let mut file = File::create(&tmp_path).map_err(|err| Error::io(err, format!("failed to create {tmp_path:?}")))?;
    contents(&mut file).map_err(|err| Error::io(err, format!("failed to write {tmp_path:?}")))?;
    file.sync_all().map_err(|err| Error::io(err, format!("failed to sync {tmp_path:?}")))?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(|err| Error::io(err, format!("failed to rename {tmp_path:?} to {path:?}")))?;
    Ok(())
}

#[cfg(unix)]
fn create_dir_all_mode(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all_mode(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

pub fn save_raw(path: impl AsRef<Path>, value: &[u8]) -> Result<()> {
    write_atomic(path.as_ref(), |writer| writer.write_all(value))
}

pub fn load_raw(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut reader = File::open(path).map_err(|err| Error::io(err, format!("failed to open {path:?}")))?;
    let mut data = vec![];
    reader.read_to_end(&mut data).map_err(|err| Error::io(err, "failed to load data"))?;
    Ok(data)
}

pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_dir() -> std::path::PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("playsession-fs-test-{}-{id}", std::process::id()))
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = temp_dir();
        let path = dir.join("slot.state");
        let value = vec![1u8, 2, 3, 4, 5];
        save_raw(&path, &value).expect("save");
        assert!(path.exists());
        let loaded = load_raw(&path).expect("load");
        assert_eq!(loaded, value);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = load_raw("/nonexistent/path/does/not/exist.state");
        assert!(result.is_err());
    }

    #[test]
    fn exists_reports_missing_path() {
        assert!(!exists("/nonexistent/path/does/not/exist.state"));
    }
}
