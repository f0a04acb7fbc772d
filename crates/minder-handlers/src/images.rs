//! Cover image provisioning for generated articles.
//!
//! Selection rules:
//! - material has an explicitly empty `sources` list → skipped, no
//!   file is written (the article has nothing to illustrate).
//! - otherwise a real image is attempted (search → download); any
//!   failure or absence falls back to a bundled placeholder PNG at
//!   a deterministic path.
//! A missing material record is treated as an empty one, never
//! dereferenced.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::search::{SearchClient, SearchSnippet};

/// Minimal transparent 1×1 PNG used as the placeholder.
const PLACEHOLDER_PNG: [u8; 68] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x60,
    0x60, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x2b, 0x09, 0x4d, 0x84, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Material pack an article was generated from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Material {
    /// `None` means "sources unknown"; `Some(vec![])` means
    /// "explicitly no sources"; the two behave differently here.
    #[serde(default)]
    pub sources: Option<Vec<SearchSnippet>>,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Outcome of the cover image sub-step, serialized into article
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverImage {
    pub image_status: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub relpath: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub license_note: Option<String>,
}

impl CoverImage {
    fn skipped(reason: &str) -> Self {
        Self {
            image_status: "skipped".into(),
            mode: None,
            path: None,
            relpath: None,
            reason: Some(reason.into()),
            source_url: None,
            site_name: None,
            license_note: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            image_status: "failed".into(),
            mode: None,
            path: None,
            relpath: None,
            reason: Some(reason),
            source_url: None,
            site_name: None,
            license_note: None,
        }
    }
}

/// Provide a cover image for an article, writing under
/// `<base_output>/images/<slug>.png`.
pub async fn provide_cover_image(
    material: Option<&Material>,
    search: Option<&SearchClient>,
    topic: &str,
    base_output: &Path,
    slug: &str,
) -> CoverImage {
    // None is treated as an empty mapping.
    let empty = Material::default();
    let material = material.unwrap_or(&empty);

    // Explicitly empty sources: nothing to illustrate, write nothing.
    if matches!(&material.sources, Some(sources) if sources.is_empty()) {
        return CoverImage::skipped("no_sources");
    }

    let images_dir = base_output.join("images");
    if let Err(e) = std::fs::create_dir_all(&images_dir) {
        return CoverImage::failed(format!("disk_write_failed: {e}"));
    }
    let dest = images_dir.join(format!("{slug}.png"));
    let relpath = format!("images/{slug}.png");

    // Real image attempt: search → download.
    if let Some(search) = search {
        match try_real_image(search, topic).await {
            Ok(Some((bytes, source_url, site_name))) => {
                if std::fs::write(&dest, &bytes).is_ok() {
                    tracing::info!("🖼️ real cover image for '{topic}' from {site_name}");
                    return CoverImage {
                        image_status: "ok".into(),
                        mode: Some("real".into()),
                        path: Some(dest.display().to_string()),
                        relpath: Some(relpath),
                        reason: None,
                        source_url: Some(source_url),
                        site_name: Some(site_name.clone()),
                        license_note: Some(format!("Image courtesy of {site_name}; verify license before publishing")),
                    };
                }
            }
            Ok(None) => tracing::debug!("no image candidates for '{topic}'"),
            Err(e) => tracing::warn!("⚠️ image lookup failed for '{topic}': {e}"),
        }
    }

    // Fallback: deterministic placeholder.
    match std::fs::write(&dest, PLACEHOLDER_PNG) {
        Ok(()) => CoverImage {
            image_status: "ok".into(),
            mode: Some("placeholder".into()),
            path: Some(dest.display().to_string()),
            relpath: Some(relpath),
            reason: Some("no_image_candidates".into()),
            source_url: None,
            site_name: None,
            license_note: None,
        },
        Err(e) => CoverImage::failed(format!("disk_write_failed: {e}")),
    }
}

async fn try_real_image(
    search: &SearchClient,
    topic: &str,
) -> Result<Option<(Vec<u8>, String, String)>, String> {
    let Some(candidate) = search.image_search(topic).await? else {
        return Ok(None);
    };
    let bytes = search.download_image(&candidate.url).await?;
    Ok(Some((bytes, candidate.source_url, candidate.site_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("minder-images-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn explicit_empty_sources_skips_without_writing() {
        let dir = temp_dir("skip");
        let material = Material {
            sources: Some(vec![]),
            key_points: vec![],
        };
        let result = provide_cover_image(Some(&material), None, "ai", &dir, "ai").await;
        assert_eq!(result.image_status, "skipped");
        assert_eq!(result.reason.as_deref(), Some("no_sources"));
        assert!(result.path.is_none());
        assert!(!dir.join("images/ai.png").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_material_writes_placeholder() {
        let dir = temp_dir("empty-material");
        let result =
            provide_cover_image(Some(&Material::default()), None, "ai", &dir, "ai").await;
        assert_eq!(result.image_status, "ok");
        assert_eq!(result.mode.as_deref(), Some("placeholder"));
        assert_eq!(result.reason.as_deref(), Some("no_image_candidates"));
        assert!(result.source_url.is_none());
        assert!(result.site_name.is_none());
        assert!(result.license_note.is_none());

        let written = std::fs::read(dir.join("images/ai.png")).unwrap();
        assert_eq!(written, PLACEHOLDER_PNG);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_material_behaves_like_empty() {
        let dir = temp_dir("none-material");
        let result = provide_cover_image(None, None, "cloud", &dir, "cloud").await;
        assert_eq!(result.image_status, "ok");
        assert_eq!(result.mode.as_deref(), Some("placeholder"));
        assert!(dir.join("images/cloud.png").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn populated_sources_without_search_still_placeholder() {
        let dir = temp_dir("populated");
        let material = Material {
            sources: Some(vec![SearchSnippet {
                title: "t".into(),
                url: "https://example.com".into(),
                snippet: "s".into(),
            }]),
            key_points: vec![],
        };
        let result = provide_cover_image(Some(&material), None, "ai", &dir, "ai").await;
        assert_eq!(result.image_status, "ok");
        assert_eq!(result.mode.as_deref(), Some("placeholder"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
