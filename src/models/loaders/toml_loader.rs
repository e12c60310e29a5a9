use crate::models::document::{DocumentInput, DocumentManifest};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Load one document manifest and resolve its page images
pub async fn load_document_manifest(manifest_path: &Path) -> Result<DocumentInput> {
    let content = fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("Cannot read manifest: {}", manifest_path.display()))?;

    let manifest: DocumentManifest = toml::from_str(&content)
        .with_context(|| format!("Cannot parse manifest: {}", manifest_path.display()))?;

    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.into_document(base_dir))
}

/// Load every `*.toml` manifest in a folder, in file-name order
///
/// A broken manifest is logged and skipped; it never aborts the batch.
pub async fn load_all_manifests(folder_path: &str) -> Result<Vec<DocumentInput>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("Folder does not exist: {}", folder_path);
    }

    let mut manifest_paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("Cannot read folder: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            manifest_paths.push(path);
        }
    }
    manifest_paths.sort();

    let mut documents = Vec::new();
    for path in manifest_paths {
        tracing::info!(
            "Loading: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_document_manifest(&path).await {
            Ok(doc) => {
                tracing::info!("Loaded {} ({} pages)", doc.name, doc.pages.len());
                documents.push(doc);
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(documents)
}
