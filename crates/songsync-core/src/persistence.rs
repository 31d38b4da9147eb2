use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::model::SongDescription;

#[instrument(fields(path = %path.display()))]
pub fn load_song(path: &Path) -> Result<SongDescription> {
    let content =
        fs::read(path).with_context(|| format!("failed to read song: {}", path.display()))?;
    let song = parse_song(&content)?;
    info!(
        sections = song.sections().len(),
        tracks = song.tracks.len(),
        "song loaded"
    );
    Ok(song)
}

pub fn parse_song(bytes: &[u8]) -> Result<SongDescription> {
    serde_json::from_slice(bytes).context("invalid song json")
}

/// Writes `value` as pretty JSON through a temp file in the same directory,
/// so readers never observe a partial file.
#[instrument(skip(value), fields(path = %path.display()))]
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory: {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(value).context("failed to serialize json")?;
    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).context("failed to create temp file")?;
    temp_file
        .write_all(&json)
        .context("failed to write temp file")?;
    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist {}", path.display()))?;

    info!(bytes = json.len(), "json saved");
    Ok(())
}
