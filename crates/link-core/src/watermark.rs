//! Watermark persistence: the per-channel receiver checkpoint file and the
//! link-wide recover marker.
//!
//! Grounded on the source's `link/util/uio.go` (plain decimal text files)
//! and `link/util/util.go` (`IsRecover`/`RunOnce`, a marker file literally
//! named `BanG`). Persistence failures are logged, never fatal to the
//! channel — callers treat [`write_consumer_seq`] errors as
//! best-effort.

use std::path::{Path, PathBuf};

/// Name of the link-wide marker file signaling "this store_path has
/// already been started once". Reserved: no channel may be named this.
pub const MARKER_FILE_NAME: &str = "BanG";

#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("channel name {0:?} collides with the reserved marker file name")]
    ReservedChannelName(String),
    #[error("reading watermark file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing watermark file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watermark file {path} does not contain a valid decimal sequence")]
    Malformed { path: PathBuf },
}

/// Rejects a channel name that would collide with the marker file.
pub fn validate_channel_name(name: &str) -> Result<(), WatermarkError> {
    if name == MARKER_FILE_NAME {
        return Err(WatermarkError::ReservedChannelName(name.to_owned()));
    }
    Ok(())
}

/// True if `store_path` already carries the recover marker.
#[must_use]
pub fn is_recover(store_path: &Path) -> bool {
    store_path.join(MARKER_FILE_NAME).exists()
}

/// Creates the recover marker under `store_path`, signaling that this is no
/// longer a fresh start. Idempotent: writing it again is harmless.
pub fn run_once(store_path: &Path) -> Result<(), WatermarkError> {
    let path = store_path.join(MARKER_FILE_NAME);
    std::fs::write(&path, MARKER_FILE_NAME).map_err(|source| WatermarkError::Write {
        path,
        source,
    })
}

/// Reads the persisted `consumer_seq` for a channel, if the file exists.
pub fn read_consumer_seq(store_path: &Path, channel: &str) -> Result<Option<u64>, WatermarkError> {
    let path = store_path.join(channel);
    match std::fs::read_to_string(&path) {
        Ok(contents) => contents
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| WatermarkError::Malformed { path }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(WatermarkError::Read { path, source }),
    }
}

/// Overwrites the persisted `consumer_seq` for a channel with plain decimal
/// text, as the checkpoint ticker does on every tick.
pub fn write_consumer_seq(
    store_path: &Path,
    channel: &str,
    seq: u64,
) -> Result<(), WatermarkError> {
    let path = store_path.join(channel);
    std::fs::write(&path, seq.to_string()).map_err(|source| WatermarkError::Write { path, source })
}
