use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::section::PageRole;

/// A rasterized page image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    /// MIME type used in the data URL sent to the oracle
    pub mime: String,
}

impl PageImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }

    /// Guess the MIME type from a file extension; PNG when unknown
    pub fn mime_for(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            _ => "image/png",
        }
    }
}

/// Where a page image comes from
///
/// File-backed images are read only when needed, so at most one page image
/// is held in memory at a time.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Memory(Arc<PageImage>),
}

impl ImageSource {
    pub async fn load(&self) -> AppResult<Arc<PageImage>> {
        match self {
            ImageSource::Memory(image) => Ok(Arc::clone(image)),
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
                Ok(Arc::new(PageImage::new(bytes, PageImage::mime_for(path))))
            }
        }
    }
}

/// One page of a document: (page_number, rasterized image, plain-text hint)
#[derive(Debug, Clone)]
pub struct PageInput {
    pub page_number: u32,
    pub text_hint: String,
    pub image: ImageSource,
}

/// One exam paper with its externally resolved metadata
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub school: String,
    pub year: i32,
    /// Display name, defaults to "{school} {year}"
    pub name: String,
    pub pages: Vec<PageInput>,
}

impl DocumentInput {
    pub fn new(school: impl Into<String>, year: i32, pages: Vec<PageInput>) -> Self {
        let school = school.into();
        Self {
            name: format!("{} {}", school, year),
            school,
            year,
            pages,
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// Classification result for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSignal {
    pub page_number: u32,
    pub text_hint: String,
    pub role: PageRole,
}

// ========== TOML manifest ==========

/// On-disk description of a document
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentManifest {
    pub school: String,
    pub year: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageManifest {
    pub page_number: u32,
    /// Image path, relative to the manifest file
    pub image: PathBuf,
    #[serde(default)]
    pub text_hint: String,
}

impl DocumentManifest {
    /// Resolve image paths against `base_dir` and order pages by number
    pub fn into_document(self, base_dir: &Path) -> DocumentInput {
        let mut pages: Vec<PageInput> = self
            .pages
            .into_iter()
            .map(|p| {
                let path = if p.image.is_absolute() {
                    p.image
                } else {
                    base_dir.join(p.image)
                };
                PageInput {
                    page_number: p.page_number,
                    text_hint: p.text_hint,
                    image: ImageSource::File(path),
                }
            })
            .collect();
        pages.sort_by_key(|p| p.page_number);

        let mut doc = DocumentInput::new(self.school, self.year, pages);
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            doc.name = name;
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_resolves_paths_and_sorts_pages() {
        let manifest: DocumentManifest = toml::from_str(
            r#"
school = "Rosyth"
year = 2024

[[pages]]
page_number = 2
image = "p2.jpg"
text_hint = "Booklet A"

[[pages]]
page_number = 1
image = "/abs/p1.png"
"#,
        )
        .unwrap();

        let doc = manifest.into_document(Path::new("/data/rosyth"));
        assert_eq!(doc.name, "Rosyth 2024");
        assert_eq!(doc.total_pages(), 2);
        assert_eq!(doc.pages[0].page_number, 1);
        assert!(doc.pages[0].text_hint.is_empty());
        match &doc.pages[1].image {
            ImageSource::File(p) => assert_eq!(p, Path::new("/data/rosyth/p2.jpg")),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(PageImage::mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(PageImage::mime_for(Path::new("a.png")), "image/png");
        assert_eq!(PageImage::mime_for(Path::new("a")), "image/png");
    }

    #[tokio::test]
    async fn test_memory_source_loads_without_io() {
        let image = Arc::new(PageImage::png(vec![1, 2, 3]));
        let source = ImageSource::Memory(Arc::clone(&image));
        let loaded = source.load().await.unwrap();
        assert_eq!(loaded.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_file_is_file_error() {
        let source = ImageSource::File(PathBuf::from("/nonexistent/page-1.png"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, AppError::File(_)));
    }
}
