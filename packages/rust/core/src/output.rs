//! Document naming, writing, and lookup on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use sitemark_shared::{Result, SitemarkError};

/// A document written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub filename: String,
    /// Hex SHA-256 of the document bytes.
    pub sha256: String,
    pub bytes: usize,
}

/// `{host[_port]}_full_{YYYYMMDD_HHMMSS}.md` for the given sitemap.
///
/// Dots and colons in the host become underscores. An unparseable sitemap
/// URL falls back to the name `sitemap`.
pub fn document_filename<Tz>(sitemap_url: &str, generated_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let netloc = Url::parse(sitemap_url)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            Some(match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| "sitemap".to_string());

    let domain = netloc.replace(['.', ':'], "_");
    format!("{domain}_full_{}.md", generated_at.format("%Y%m%d_%H%M%S"))
}

/// Write `text` to `dir/filename`, creating `dir` if needed.
///
/// The file is written under a temporary name and renamed into place, so a
/// download never observes a partial document.
#[instrument(skip_all, fields(dir = %dir.display(), %filename))]
pub fn write_document(dir: &Path, filename: &str, text: &str) -> Result<WrittenDocument> {
    std::fs::create_dir_all(dir).map_err(|e| SitemarkError::io(dir, e))?;

    let path = dir.join(filename);
    let tmp_path = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&tmp_path, text).map_err(|e| SitemarkError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| SitemarkError::io(&path, e))?;

    let sha256 = format!("{:x}", Sha256::digest(text.as_bytes()));

    info!(path = %path.display(), bytes = text.len(), %sha256, "document written");

    Ok(WrittenDocument {
        path,
        filename: filename.to_string(),
        sha256,
        bytes: text.len(),
    })
}

/// Resolve a requested download name to a file inside `dir`.
///
/// Returns `None` for names that could escape the directory, hidden or
/// temporary files, and files that do not exist.
pub fn resolve_download(dir: &Path, filename: &str) -> Option<PathBuf> {
    if filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\'])
        || filename.contains("..")
    {
        debug!(%filename, "rejected download name");
        return None;
    }

    let path = dir.join(filename);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sitemark-output-{}", uuid::Uuid::now_v7()))
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn filename_from_domain_and_timestamp() {
        assert_eq!(
            document_filename("https://docs.example.com/sitemap.xml", &fixed_time()),
            "docs_example_com_full_20240501_090507.md"
        );
    }

    #[test]
    fn filename_keeps_port() {
        assert_eq!(
            document_filename("http://127.0.0.1:8080/sitemap.xml", &fixed_time()),
            "127_0_0_1_8080_full_20240501_090507.md"
        );
    }

    #[test]
    fn filename_for_unparseable_url() {
        assert_eq!(
            document_filename("not a url", &fixed_time()),
            "sitemap_full_20240501_090507.md"
        );
    }

    #[test]
    fn write_then_resolve() {
        let dir = temp_dir();
        let written = write_document(&dir, "doc.md", "# Hello\n").unwrap();

        assert_eq!(written.bytes, 8);
        assert_eq!(written.sha256.len(), 64);
        assert_eq!(std::fs::read_to_string(&written.path).unwrap(), "# Hello\n");
        assert!(!dir.join(".doc.md.tmp").exists());

        assert_eq!(resolve_download(&dir, "doc.md"), Some(written.path));
        assert_eq!(resolve_download(&dir, "missing.md"), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn traversal_names_are_rejected() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".hidden.md"), "x").unwrap();

        for name in ["", "../etc/passwd", "a/b.md", "a\\b.md", "..", ".hidden.md"] {
            assert_eq!(resolve_download(&dir, name), None, "accepted {name:?}");
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
