//! EXIF extraction into the consolidated summary document.

use exif::{Field, In, Reader, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FailurePolicy, FormatsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ExtractionReport, MetadataRecord};

use super::list_names;

/// Scans an output folder and writes one summary of every image's metadata.
pub struct MetadataExtractor {
    formats: FormatsConfig,
    summary_file: String,
    policy: FailurePolicy,
}

impl MetadataExtractor {
    pub fn new(
        formats: FormatsConfig,
        summary_file: impl Into<String>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            formats,
            summary_file: summary_file.into(),
            policy,
        }
    }

    /// Read all EXIF tags from one file.
    ///
    /// Returns `Ok(None)` when the file carries no EXIF block, and a
    /// `PerFileMetadata` error when it cannot be opened or parsed.
    pub fn read_tags(path: &Path) -> PipelineResult<Option<BTreeMap<String, serde_json::Value>>> {
        let file = File::open(path).map_err(|e| per_file(path, e))?;
        let mut reader = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(per_file(path, e)),
        };

        // Primary image tags first so they win over thumbnail duplicates
        let (primary, rest): (Vec<&Field>, Vec<&Field>) =
            exif.fields().partition(|f| f.ifd_num == In::PRIMARY);

        let mut tags = BTreeMap::new();
        for field in primary.into_iter().chain(rest) {
            tags.entry(field.tag.to_string())
                .or_insert_with(|| field_to_json(field));
        }

        if tags.is_empty() {
            Ok(None)
        } else {
            Ok(Some(tags))
        }
    }

    /// Extract metadata from every supported image in `dir` and write the
    /// summary document, replacing any previous one.
    ///
    /// Never returns an error: a listing or write failure is reported through
    /// `success: false` so the run can still report what it did.
    pub async fn extract_dir(&self, dir: &Path) -> ExtractionReport {
        let start = Instant::now();
        tracing::info!("Starting metadata extraction...");

        match self.extract_and_write(dir).await {
            Ok((output_file_path, records)) => {
                let elapsed_seconds = start.elapsed().as_secs_f64();
                tracing::info!(
                    "Metadata extraction completed in {:.2} seconds ({} record(s))",
                    elapsed_seconds,
                    records
                );
                ExtractionReport {
                    success: true,
                    elapsed_seconds,
                    output_file_path: Some(output_file_path),
                    records,
                    error: None,
                }
            }
            Err(e) => {
                let elapsed_seconds = start.elapsed().as_secs_f64();
                tracing::error!(
                    "Metadata extraction failed after {:.2} seconds: {}",
                    elapsed_seconds,
                    e
                );
                ExtractionReport {
                    success: false,
                    elapsed_seconds,
                    output_file_path: None,
                    records: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Collect records for every supported image in `dir`, sorted by name.
    pub async fn collect(&self, dir: &Path) -> PipelineResult<Vec<MetadataRecord>> {
        let names = list_names(dir).await?;
        tracing::debug!("Found {} file(s) in {:?}", names.len(), dir);

        let mut records = Vec::new();
        for entry in names {
            if entry == self.summary_file.as_str() {
                continue;
            }
            let path = dir.join(&entry);
            let name = entry.to_string_lossy().into_owned();
            if !self.formats.is_metadata_image(&path) {
                tracing::debug!("{} is not a supported image format", name);
                continue;
            }

            let task_path = path.clone();
            let parsed = tokio::task::spawn_blocking(move || Self::read_tags(&task_path))
                .await
                .unwrap_or_else(|e| Err(per_file(&path, format!("Task join error: {}", e))));

            match parsed {
                Ok(Some(metadata)) => {
                    tracing::debug!("Metadata extracted for {} ({} tags)", name, metadata.len());
                    records.push(MetadataRecord {
                        file: name,
                        metadata,
                    });
                }
                Ok(None) => tracing::warn!("No metadata found for {}", name),
                Err(e) => match self.policy {
                    FailurePolicy::Tolerate => {
                        tracing::error!("Error extracting metadata from {}: {}", name, e)
                    }
                    FailurePolicy::FailFast => return Err(e),
                },
            }
        }

        Ok(records)
    }

    async fn extract_and_write(&self, dir: &Path) -> PipelineResult<(PathBuf, usize)> {
        let records = self.collect(dir).await?;

        let output_file_path = dir.join(&self.summary_file);
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| summary_error(&output_file_path, e))?;
        tokio::fs::write(&output_file_path, json)
            .await
            .map_err(|e| summary_error(&output_file_path, e))?;
        tracing::info!("Metadata saved to {:?}", output_file_path);

        Ok((output_file_path, records.len()))
    }
}

/// Convert one EXIF field into JSON.
///
/// Single-element numeric fields become plain numbers, longer ones arrays.
/// Opaque byte blobs use the library's display rendering.
fn field_to_json(field: &Field) -> serde_json::Value {
    match &field.value {
        Value::Ascii(parts) => {
            let mut strings: Vec<serde_json::Value> = parts
                .iter()
                .map(|p| {
                    serde_json::Value::String(
                        String::from_utf8_lossy(p).trim_end_matches('\0').to_string(),
                    )
                })
                .collect();
            match strings.len() {
                0 => serde_json::Value::Null,
                1 => strings.remove(0),
                _ => serde_json::Value::Array(strings),
            }
        }
        Value::Byte(v) => numbers(v),
        Value::SByte(v) => numbers(v),
        Value::Short(v) => numbers(v),
        Value::SShort(v) => numbers(v),
        Value::Long(v) => numbers(v),
        Value::SLong(v) => numbers(v),
        Value::Float(v) => numbers(v),
        Value::Double(v) => numbers(v),
        Value::Rational(v) => numbers(&v.iter().map(|r| r.to_f64()).collect::<Vec<_>>()),
        Value::SRational(v) => numbers(&v.iter().map(|r| r.to_f64()).collect::<Vec<_>>()),
        _ => serde_json::Value::String(field.display_value().to_string()),
    }
}

fn numbers<T>(values: &[T]) -> serde_json::Value
where
    T: Copy + Into<serde_json::Value>,
{
    match values {
        [single] => (*single).into(),
        many => serde_json::Value::Array(many.iter().map(|v| (*v).into()).collect()),
    }
}

fn per_file(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::PerFileMetadata {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn summary_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::SummaryWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal JPEG whose only EXIF tag is `Make`.
    fn jpeg_with_make(make: &str) -> Vec<u8> {
        let mut value = make.as_bytes().to_vec();
        value.push(0);
        assert!(value.len() > 4, "value must live outside the IFD entry");

        let mut tiff = vec![b'M', b'M', 0, 42, 0, 0, 0, 8];
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
        tiff.extend_from_slice(&2u16.to_be_bytes());
        tiff.extend_from_slice(&(value.len() as u32).to_be_bytes());
        tiff.extend_from_slice(&26u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        tiff.extend_from_slice(&value);

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend(tiff);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        jpeg.extend(app1);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    fn extractor() -> MetadataExtractor {
        MetadataExtractor::new(
            FormatsConfig::default(),
            "metadata.json",
            FailurePolicy::Tolerate,
        )
    }

    #[test]
    fn test_read_tags_missing_file() {
        let err = MetadataExtractor::read_tags(Path::new("/nonexistent/file.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::PerFileMetadata { .. }));
    }

    #[test]
    fn test_read_tags_from_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, jpeg_with_make("Canon")).unwrap();

        let tags = MetadataExtractor::read_tags(&path).unwrap().unwrap();
        assert_eq!(tags.get("Make"), Some(&serde_json::json!("Canon")));
    }

    #[test]
    fn test_numbers_single_and_many() {
        assert_eq!(numbers(&[400u16]), serde_json::json!(400));
        assert_eq!(numbers(&[1u32, 2]), serde_json::json!([1, 2]));
        assert_eq!(numbers(&[0.5f64]), serde_json::json!(0.5));
    }

    #[tokio::test]
    async fn test_extract_dir_writes_sorted_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg_with_make("Nikon")).unwrap();
        std::fs::write(dir.path().join("a.jpg"), jpeg_with_make("Canon")).unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let report = extractor().extract_dir(dir.path()).await;
        assert!(report.success);
        assert_eq!(report.records, 2);

        let summary_path = report.output_file_path.unwrap();
        assert_eq!(summary_path, dir.path().join("metadata.json"));
        let records: Vec<MetadataRecord> =
            serde_json::from_slice(&std::fs::read(&summary_path).unwrap()).unwrap();
        let files: Vec<&str> = records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["a.jpg", "b.jpg"]);
        assert_eq!(records[1].metadata["Make"], serde_json::json!("Nikon"));
    }

    #[tokio::test]
    async fn test_extract_dir_is_idempotent_and_skips_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), jpeg_with_make("Canon")).unwrap();

        let first = extractor().extract_dir(dir.path()).await;
        let first_bytes = std::fs::read(first.output_file_path.unwrap()).unwrap();
        let second = extractor().extract_dir(dir.path()).await;
        let second_bytes = std::fs::read(second.output_file_path.unwrap()).unwrap();

        assert_eq!(first_bytes, second_bytes);
        assert_eq!(second.records, 1);
        assert!(!String::from_utf8(second_bytes)
            .unwrap()
            .contains("\"file\": \"metadata.json\""));
    }

    #[tokio::test]
    async fn test_extract_dir_fail_fast_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        // A TIFF header with a truncated IFD
        std::fs::write(dir.path().join("a.tiff"), b"MM\x00\x2a\x00\x00\x00\x08\x00").unwrap();

        let extractor = MetadataExtractor::new(
            FormatsConfig::default(),
            "metadata.json",
            FailurePolicy::FailFast,
        );
        let report = extractor.extract_dir(dir.path()).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("a.tiff"));
        assert!(!dir.path().join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_extract_dir_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = extractor().extract_dir(&dir.path().join("gone")).await;
        assert!(!report.success);
        assert!(report.output_file_path.is_none());
        assert!(report.error.is_some());
    }
}
