//! cwebp subprocess invocation for one processable file.
//!
//! The command line is a fixed prefix plus the whitelisted option tokens plus
//! the entity's temp input path and a freshly generated random output path.
//! Arguments are passed as a vector to the process-spawn API; no shell is
//! ever involved. Only the exit condition and the output file are consulted
//! for the success decision — tool stdout is discarded. Input and output
//! files are deleted when the invocation finishes, success or failure.

use crate::pipeline::options::ConversionOptions;
use crate::pipeline::{remove_quietly, Scratch};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

/// A conversion that did not produce a usable output file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("Conversion failed.")]
    Failed,
    #[error("Conversion timed out.")]
    TimedOut,
}

/// Successful conversion output, sizes in bytes.
#[derive(Debug)]
pub struct ConvertedImage {
    pub orig_size: u64,
    pub new_size: u64,
    pub data: Vec<u8>,
}

/// Drives cwebp for the files of a batch. Immutable once constructed; shared
/// read-only across concurrent conversions.
#[derive(Debug, Clone)]
pub struct Converter {
    binary: PathBuf,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl Converter {
    pub fn new(binary: PathBuf, temp_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            binary,
            temp_dir,
            timeout,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Convert one input file. The input temp file and any output file are
    /// removed before this returns, whatever the outcome.
    pub async fn convert(
        &self,
        input: &Path,
        options: &ConversionOptions,
        scratch: &Scratch,
    ) -> Result<ConvertedImage, ConvertError> {
        let output = self
            .temp_dir
            .join(format!("{}.webp", Uuid::new_v4().simple()));
        scratch.register(output.clone());

        let result = self.run(input, &output, options).await;

        remove_quietly(input);
        remove_quietly(&output);
        result
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
    ) -> Result<ConvertedImage, ConvertError> {
        let orig_size = tokio::fs::metadata(input)
            .await
            .map_err(|_| ConvertError::Failed)?
            .len();

        let mut child = Command::new(&self.binary)
            .arg("-quiet")
            .arg("-mt")
            .args(options.to_args())
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                tracing::warn!(binary = %self.binary.display(), error = %err, "failed to spawn converter");
                ConvertError::Failed
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "converter process failed to report status");
                return Err(ConvertError::Failed);
            }
            Err(_) => {
                let _ = child.start_kill();
                tracing::warn!(
                    input = %input.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "converter exceeded its time budget"
                );
                return Err(ConvertError::TimedOut);
            }
        };

        if !status.success() {
            return Err(ConvertError::Failed);
        }

        // A clean exit with an empty or missing output still counts as a
        // failed conversion.
        let new_size = match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => return Err(ConvertError::Failed),
        };

        let data = tokio::fs::read(output)
            .await
            .map_err(|_| ConvertError::Failed)?;

        Ok(ConvertedImage {
            orig_size,
            new_size,
            data,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Stands in for cwebp: copies input to output, fails when the input
    /// contains the marker string FAIL, hangs when it contains HANG.
    const STUB_CONVERTER: &str = r#"#!/bin/sh
in= out=
while [ "$#" -gt 0 ]; do
  case "$1" in
    -o) out=$2; shift 2 ;;
    -pass|-m|-near_lossless|-hint|-jpeg_like) shift 2 ;;
    -quiet|-mt|-lossless) shift ;;
    *) in=$1; shift ;;
  esac
done
grep -q HANG "$in" && sleep 60
grep -q FAIL "$in" && exit 1
grep -q EMPTY "$in" && { : > "$out"; exit 0; }
cp "$in" "$out"
"#;

    fn stub_converter(dir: &Path) -> PathBuf {
        let path = dir.join("stub-cwebp");
        std::fs::write(&path, STUB_CONVERTER).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn input_file(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join(format!("{}.jpg", Uuid::new_v4().simple()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn converter(dir: &Path, timeout: Duration) -> Converter {
        Converter::new(stub_converter(dir), dir.to_path_buf(), timeout)
    }

    #[tokio::test]
    async fn successful_conversion_reports_sizes_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path(), Duration::from_secs(10));
        let input = input_file(dir.path(), b"sixteen bytes!!!");
        let scratch = Scratch::new();

        let image = converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .expect("stub conversion succeeds");

        assert_eq!(image.orig_size, 16);
        assert_eq!(image.new_size, 16);
        assert_eq!(image.data, b"sixteen bytes!!!");
    }

    #[tokio::test]
    async fn input_and_output_are_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path(), Duration::from_secs(10));
        let input = input_file(dir.path(), b"payload");
        let scratch = Scratch::new();

        converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .unwrap();

        assert!(!input.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "webp"))
            .collect();
        assert!(leftovers.is_empty(), "no output file may survive");
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure_and_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path(), Duration::from_secs(10));
        let input = input_file(dir.path(), b"FAIL marker");
        let scratch = Scratch::new();

        let err = converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .unwrap_err();

        assert_eq!(err, ConvertError::Failed);
        assert_eq!(err.to_string(), "Conversion failed.");
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn clean_exit_with_empty_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path(), Duration::from_secs(10));
        let input = input_file(dir.path(), b"EMPTY marker");
        let scratch = Scratch::new();

        let err = converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .unwrap_err();
        assert_eq!(err, ConvertError::Failed);
    }

    #[tokio::test]
    async fn slow_converter_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path(), Duration::from_millis(200));
        let input = input_file(dir.path(), b"HANG marker");
        let scratch = Scratch::new();

        let err = converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .unwrap_err();

        assert_eq!(err, ConvertError::TimedOut);
        assert_eq!(err.to_string(), "Conversion timed out.");
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn missing_binary_is_a_per_file_failure() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(
            dir.path().join("no-such-binary"),
            dir.path().to_path_buf(),
            Duration::from_secs(10),
        );
        let input = input_file(dir.path(), b"payload");
        let scratch = Scratch::new();

        let err = converter
            .convert(&input, &ConversionOptions::default(), &scratch)
            .await
            .unwrap_err();
        assert_eq!(err, ConvertError::Failed);
    }
}
