//! WARC export of crawl results
//!
//! Writes a gzip-compressed WARC/1.0 container: one `warcinfo` record with
//! crawl metadata, then one `resource` record per saved page, each followed
//! by resource records for that page's locally-saved assets. Every record is
//! its own gzip member, per the WARC gzip convention.

use crate::crawler::{resolve_assets, CrawlResult};
use crate::url::asset_local_path;
use crate::{GrabError, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// Software identifier written into the warcinfo record
pub const SOFTWARE: &str = concat!("sitegrab/", env!("CARGO_PKG_VERSION"));

/// Crawl parameters recorded in the warcinfo record
#[derive(Debug, Clone)]
pub struct CrawlMetadata {
    pub max_depth: u32,
    pub max_pages: usize,
    pub concurrency: usize,
    pub respect_robots: bool,
}

/// Low-level WARC/1.0 record writer
///
/// Each record is compressed as an independent gzip member so readers can
/// seek between records without decompressing the whole file.
pub struct WarcWriter<W: Write> {
    out: W,
}

impl<W: Write> WarcWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Writes the leading warcinfo record
    pub fn write_warcinfo(&mut self, filename: &str, fields: &[(&str, String)]) -> Result<()> {
        let payload: String = fields
            .iter()
            .map(|(name, value)| format!("{}: {}\r\n", name, value))
            .collect();

        self.write_record(
            &[
                ("WARC-Type", "warcinfo"),
                ("WARC-Filename", filename),
                ("Content-Type", "application/warc-fields"),
            ],
            payload.as_bytes(),
        )
    }

    /// Writes a resource record keyed by its target URL
    pub fn write_resource(&mut self, target_uri: &str, payload: &[u8]) -> Result<()> {
        self.write_record(
            &[
                ("WARC-Type", "resource"),
                ("WARC-Target-URI", target_uri),
                ("Content-Type", "application/octet-stream"),
            ],
            payload,
        )
    }

    fn write_record(&mut self, headers: &[(&str, &str)], payload: &[u8]) -> Result<()> {
        let mut encoder = GzEncoder::new(&mut self.out, Compression::default());

        let write = |encoder: &mut GzEncoder<&mut W>| -> std::io::Result<()> {
            write!(encoder, "WARC/1.0\r\n")?;
            for (name, value) in headers {
                write!(encoder, "{}: {}\r\n", name, value)?;
            }
            write!(encoder, "WARC-Record-ID: <urn:uuid:{}>\r\n", Uuid::new_v4())?;
            write!(
                encoder,
                "WARC-Date: {}\r\n",
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
            )?;
            write!(encoder, "Content-Length: {}\r\n", payload.len())?;
            write!(encoder, "\r\n")?;
            encoder.write_all(payload)?;
            write!(encoder, "\r\n\r\n")?;
            Ok(())
        };

        write(&mut encoder).map_err(|e| GrabError::Export(format!("record write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| GrabError::Export(format!("gzip finish failed: {}", e)))?;
        Ok(())
    }
}

/// Exports crawl results to a WARC file at `warc_path`
///
/// Pages whose saved file no longer exists are skipped. After each page
/// record, the saved markup is re-parsed and any asset with a file at its
/// expected local path is appended as an additional resource record keyed by
/// the asset's absolute URL; any failure in that phase is logged and does
/// not abort the export of subsequent records.
pub fn export_warc(
    results: &[CrawlResult],
    output_dir: &Path,
    warc_path: &Path,
    meta: &CrawlMetadata,
) -> Result<PathBuf> {
    let file = fs::File::create(warc_path)
        .map_err(|e| GrabError::Export(format!("cannot create {}: {}", warc_path.display(), e)))?;
    let mut writer = WarcWriter::new(file);

    let warc_filename = warc_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let fields = [
        ("Software", SOFTWARE.to_string()),
        (
            "Crawl-Start",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
        ("Pages-Crawled", results.len().to_string()),
        ("Max-Depth", meta.max_depth.to_string()),
        ("Max-Pages", meta.max_pages.to_string()),
        ("Concurrency", meta.concurrency.to_string()),
        ("Respect-Robots", meta.respect_robots.to_string()),
    ];
    writer.write_warcinfo(&warc_filename, &fields)?;

    for result in results {
        let saved = match &result.saved_path {
            Some(path) if path.exists() => path,
            _ => continue,
        };

        let payload = fs::read(saved)
            .map_err(|e| GrabError::Export(format!("cannot read {}: {}", saved.display(), e)))?;
        writer.write_resource(&result.url, &payload)?;

        if let Err(e) = append_page_assets(&mut writer, result, saved, output_dir) {
            tracing::debug!("Failed adding assets for {} to WARC: {}", result.url, e);
        }
    }

    tracing::info!("WARC export complete: {}", warc_path.display());
    Ok(warc_path.to_path_buf())
}

/// Best-effort inclusion of one page's locally-saved assets
fn append_page_assets<W: Write>(
    writer: &mut WarcWriter<W>,
    result: &CrawlResult,
    saved: &Path,
    output_dir: &Path,
) -> Result<()> {
    let html = fs::read_to_string(saved)?;
    let base = Url::parse(&result.url)?;

    for asset in resolve_assets(&html, &base) {
        let candidate = asset_local_path(output_dir, &asset.url);
        if !candidate.exists() {
            continue;
        }
        let payload = fs::read(&candidate)?;
        writer.write_resource(asset.url.as_str(), &payload)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;

    fn decode(bytes: &[u8]) -> String {
        let mut decoder = MultiGzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_warcinfo_record_layout() {
        let mut writer = WarcWriter::new(Vec::new());
        writer
            .write_warcinfo("crawl.warc.gz", &[("Software", "test/1.0".to_string())])
            .unwrap();
        let text = decode(&writer.out);

        assert!(text.starts_with("WARC/1.0\r\n"));
        assert!(text.contains("WARC-Type: warcinfo\r\n"));
        assert!(text.contains("WARC-Filename: crawl.warc.gz\r\n"));
        assert!(text.contains("Content-Type: application/warc-fields\r\n"));
        assert!(text.contains("WARC-Record-ID: <urn:uuid:"));
        assert!(text.contains("Software: test/1.0\r\n"));
    }

    #[test]
    fn test_resource_record_payload_and_length() {
        let mut writer = WarcWriter::new(Vec::new());
        writer
            .write_resource("https://example.com/", b"<html>hi</html>")
            .unwrap();
        let text = decode(&writer.out);

        assert!(text.contains("WARC-Type: resource\r\n"));
        assert!(text.contains("WARC-Target-URI: https://example.com/\r\n"));
        assert!(text.contains("Content-Length: 15\r\n"));
        assert!(text.contains("<html>hi</html>"));
    }

    #[test]
    fn test_each_record_is_its_own_gzip_member() {
        let mut writer = WarcWriter::new(Vec::new());
        writer.write_resource("https://example.com/a", b"a").unwrap();
        writer.write_resource("https://example.com/b", b"b").unwrap();

        // A plain single-member decoder stops at the first member boundary
        let mut single = Vec::new();
        flate2::read::GzDecoder::new(&writer.out[..])
            .read_to_end(&mut single)
            .unwrap();
        let first = String::from_utf8_lossy(&single);
        assert!(first.contains("example.com/a"));
        assert!(!first.contains("example.com/b"));

        // The multi-member decoder sees both
        let all = decode(&writer.out);
        assert!(all.contains("example.com/a"));
        assert!(all.contains("example.com/b"));
    }

    #[test]
    fn test_export_skips_missing_saved_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let results = vec![CrawlResult {
            url: "https://example.com/gone".to_string(),
            saved_path: Some(dir.path().join("never-written.html")),
            error: None,
        }];
        let warc_path = dir.path().join("crawl.warc.gz");

        let meta = CrawlMetadata {
            max_depth: 1,
            max_pages: 10,
            concurrency: 2,
            respect_robots: true,
        };
        export_warc(&results, dir.path(), &warc_path, &meta).unwrap();

        let text = decode(&fs::read(&warc_path).unwrap());
        assert!(text.contains("WARC-Type: warcinfo"));
        assert!(!text.contains("WARC-Type: resource"));
    }
}
