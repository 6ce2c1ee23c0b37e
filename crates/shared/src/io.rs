use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::drafts::Draft;
use crate::models::{ArticleRecord, DatasetExport};

/// Get the default directory for storing datasets, snapshots and posts
pub fn get_default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("press-room");

    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    Ok(data_dir)
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S-%3f").to_string()
}

fn write_unique(dir: &Path, prefix: &str, extension: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let stamp = timestamp();
    let mut filepath = dir.join(format!("{}-{}.{}", prefix, stamp, extension));
    let mut n = 1;
    while filepath.exists() {
        filepath = dir.join(format!("{}-{}-{}.{}", prefix, stamp, n, extension));
        n += 1;
    }

    // Readers never see a partially written artifact
    let partial = filepath.with_extension(format!("{}.partial", extension));
    fs::write(&partial, contents)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    fs::rename(&partial, &filepath)
        .with_context(|| format!("Failed to finalize {}", filepath.display()))?;

    Ok(filepath)
}

/// Save an article collection as `dataset-<timestamp>.json`
pub fn save_dataset(dir: &Path, data: &DatasetExport) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize dataset")?;
    write_unique(dir, "dataset", "json", &json)
}

/// Load a dataset written by [`save_dataset`]
pub fn load_dataset(filepath: &Path) -> Result<DatasetExport> {
    if !filepath.exists() {
        anyhow::bail!("Dataset file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read dataset file: {}", filepath.display()))?;

    let data: DatasetExport = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse dataset JSON from {}. The file may be corrupted or not a valid dataset.",
            filepath.display()
        )
    })?;

    if data.version != DatasetExport::VERSION {
        anyhow::bail!(
            "Unsupported dataset version: {}. Expected {}. Please re-export the dataset.",
            data.version,
            DatasetExport::VERSION
        );
    }

    if data.articles.is_empty() {
        anyhow::bail!(
            "Dataset {} contains no articles. The file may be incomplete.",
            filepath.display()
        );
    }

    Ok(data)
}

/// List all loadable datasets in `dir`, newest first
pub fn list_datasets(dir: &Path) -> Result<Vec<(PathBuf, DatasetExport)>> {
    let mut files = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir).context("Failed to read data directory")? {
            let path = entry?.path();
            let is_dataset = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("dataset-") && n.ends_with(".json"))
                .unwrap_or(false);

            if is_dataset {
                match load_dataset(&path) {
                    Ok(data) => files.push((path, data)),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable dataset"),
                }
            }
        }
    }

    files.sort_by(|a, b| {
        let time_a = DateTime::parse_from_rfc3339(&a.1.created_at).ok();
        let time_b = DateTime::parse_from_rfc3339(&b.1.created_at).ok();
        time_b.cmp(&time_a)
    });

    Ok(files)
}

/// Append-only audit copy of extracted article bodies
pub fn save_snapshot(dir: &Path, articles: &[ArticleRecord]) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(articles).context("Failed to serialize snapshot")?;
    write_unique(dir, "extracted", "json", &json)
}

pub fn save_draft(dir: &Path, draft: &Draft) -> Result<PathBuf> {
    let prefix = format!("post-{}", draft.platform.slug());
    write_unique(dir, &prefix, "txt", &draft.text)
}
