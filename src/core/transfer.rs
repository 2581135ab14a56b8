/*!
 * Single-object transfer executed on a pool worker
 */

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace};

use crate::core::plan::same_location;
use crate::core::progress::{ByteCounter, ProgressReader};
use crate::error::CascadeError;

/// One source object and where it should land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl TransferJob {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Outcome of one transfer, success or failure
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub source: PathBuf,
    pub target: PathBuf,
    pub bytes: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Failed result for a job that never ran
    pub fn failed(job: &TransferJob, err: &CascadeError) -> Self {
        Self {
            source: job.source.clone(),
            target: job.target.clone(),
            bytes: 0,
            duration_ms: 0,
            error: Some(err.to_string()),
            error_category: Some(err.category().to_string()),
        }
    }
}

/// Options shared by every transfer in a batch
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferOptions {
    /// Replace an existing target file
    pub overwrite: bool,
}

/// Copy `job.source` to `job.target`, counting bytes into `counter`.
///
/// Never fails outright: errors are folded into the returned result.
pub fn execute(job: &TransferJob, counter: &ByteCounter, options: TransferOptions) -> TransferResult {
    let start = Instant::now();
    let outcome = copy_object(&job.source, &job.target, counter, options);
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(bytes) => {
            debug!(
                source = %job.source.display(),
                target = %job.target.display(),
                bytes,
                duration_ms,
                "Transfer complete"
            );
            TransferResult {
                source: job.source.clone(),
                target: job.target.clone(),
                bytes,
                duration_ms,
                error: None,
                error_category: None,
            }
        }
        Err(err) => {
            debug!(source = %job.source.display(), "Transfer failed: {}", err);
            TransferResult {
                duration_ms,
                ..TransferResult::failed(job, &err)
            }
        }
    }
}

fn copy_object(
    source: &Path,
    target: &Path,
    counter: &ByteCounter,
    options: TransferOptions,
) -> Result<u64, CascadeError> {
    let input = File::open(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CascadeError::SourceNotFound(source.to_path_buf()),
        _ => CascadeError::Io(e),
    })?;

    if input.metadata()?.is_dir() {
        return Err(CascadeError::TransferFailed(format!(
            "{} is a directory",
            source.display()
        )));
    }

    // Truncating the target would destroy the source before it is read
    if target.exists() && same_location(source, target) {
        return Err(CascadeError::TransferFailed(format!(
            "{} and {} are the same file",
            source.display(),
            target.display()
        )));
    }

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut open = OpenOptions::new();
    open.write(true);
    if options.overwrite {
        open.create(true).truncate(true);
    } else {
        open.create_new(true);
    }
    let output = open.open(target).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => CascadeError::TransferFailed(format!(
            "{} already exists",
            target.display()
        )),
        _ => CascadeError::Io(e),
    })?;

    let mut reader = ProgressReader::new(input, counter.clone());
    let mut writer = BufWriter::new(output);
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    trace!(bytes = copied, "Copied {}", source.display());
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_counts_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.bin");
        fs::write(&source, vec![1u8; 4096]).unwrap();
        let job = TransferJob::new(&source, dir.path().join("out/a.bin"));

        let counter = ByteCounter::new();
        let result = execute(&job, &counter, TransferOptions::default());

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.bytes, 4096);
        assert_eq!(counter.get(), 4096);
        assert_eq!(fs::read(dir.path().join("out/a.bin")).unwrap().len(), 4096);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let dir = tempdir().unwrap();
        let job = TransferJob::new(dir.path().join("nope"), dir.path().join("dest"));

        let result = execute(&job, &ByteCounter::new(), TransferOptions::default());
        assert!(!result.is_success());
        assert_eq!(result.error_category.as_deref(), Some("validation"));
        assert!(!dir.path().join("dest").exists());
    }

    #[test]
    fn test_existing_target_needs_overwrite() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src.txt");
        let target = dir.path().join("dst.txt");
        fs::write(&source, b"new contents").unwrap();
        fs::write(&target, b"old").unwrap();
        let job = TransferJob::new(&source, &target);

        let result = execute(&job, &ByteCounter::new(), TransferOptions::default());
        assert!(!result.is_success());
        assert_eq!(fs::read(&target).unwrap(), b"old");

        let result = execute(&job, &ByteCounter::new(), TransferOptions { overwrite: true });
        assert!(result.is_success());
        assert_eq!(fs::read(&target).unwrap(), b"new contents");
    }

    #[test]
    fn test_directory_source_fails() {
        let dir = tempdir().unwrap();
        let job = TransferJob::new(dir.path(), dir.path().join("copy"));
        let result = execute(&job, &ByteCounter::new(), TransferOptions::default());
        assert!(!result.is_success());
        assert!(result.error.unwrap().contains("is a directory"));
    }

    #[test]
    fn test_result_json_omits_empty_error() {
        let result = TransferResult {
            source: PathBuf::from("/a"),
            target: PathBuf::from("/b"),
            bytes: 3,
            duration_ms: 1,
            error: None,
            error_category: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"bytes\":3"));
    }

    #[test]
    fn test_overwrite_onto_source_keeps_data() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"precious data").unwrap();
        let job = TransferJob::new(&source, dir.path().join(".").join("a.txt"));

        let result = execute(&job, &ByteCounter::new(), TransferOptions { overwrite: true });
        assert!(!result.is_success());
        assert!(result.error.unwrap().contains("same file"));
        assert_eq!(fs::read(&source).unwrap(), b"precious data");
    }
}
