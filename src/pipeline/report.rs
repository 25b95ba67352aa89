//! Result records and the response envelope.
//!
//! The assembler turns the ordered per-file outcomes into the final report:
//! one record per uploaded file, upload order preserved, nothing dropped or
//! deduplicated. Descriptor extras are flattened into each record; they can
//! never shadow the pipeline-owned fields because reserved keys were stripped
//! when the descriptor was indexed.

use crate::pipeline::descriptor::Descriptor;
use crate::pipeline::executor::{ConvertError, ConvertedImage};
use crate::pipeline::intake::Entity;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::time::Duration;

/// One file's outcome after intake and (when processable) conversion.
#[derive(Debug)]
pub struct FileOutcome {
    pub entity: Entity,
    pub conversion: Option<Result<ConvertedImage, ConvertError>>,
}

/// Output unit of the batch report.
#[derive(Debug, Serialize)]
pub struct ResultRecord {
    pub filename: String,
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orig_filesize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_filesize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp_image_base64: Option<String>,
    #[serde(flatten)]
    pub descriptor: Descriptor,
}

impl ResultRecord {
    fn failure(filename: String, descriptor: Descriptor, error: String) -> Self {
        Self {
            filename,
            status: false,
            error: Some(error),
            orig_filesize: None,
            new_filesize: None,
            compression_ratio: None,
            webp_image_base64: None,
            descriptor,
        }
    }

    fn success(filename: String, descriptor: Descriptor, image: &ConvertedImage) -> Self {
        Self {
            filename,
            status: true,
            error: None,
            orig_filesize: Some(format_bytes(image.orig_size)),
            new_filesize: Some(format_bytes(image.new_size)),
            compression_ratio: Some(compression_ratio(image.orig_size, image.new_size)),
            webp_image_base64: Some(BASE64.encode(&image.data)),
            descriptor,
        }
    }

    fn from_outcome(outcome: FileOutcome) -> Self {
        let FileOutcome { entity, conversion } = outcome;
        match conversion {
            Some(Ok(image)) => Self::success(entity.filename, entity.descriptor, &image),
            Some(Err(err)) => Self::failure(entity.filename, entity.descriptor, err.to_string()),
            None => Self::failure(
                entity.filename,
                entity.descriptor,
                entity
                    .error
                    .unwrap_or_else(|| "Unknown upload error.".to_string()),
            ),
        }
    }
}

/// Merge the ordered outcomes into the final report body.
pub fn assemble(outcomes: Vec<FileOutcome>) -> Vec<ResultRecord> {
    outcomes.into_iter().map(ResultRecord::from_outcome).collect()
}

/// Completed-batch response envelope.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub status: bool,
    pub version: &'static str,
    pub elapsed_time: String,
    pub response: Vec<ResultRecord>,
}

impl BatchReport {
    pub fn new(response: Vec<ResultRecord>, elapsed: Duration) -> Self {
        Self {
            status: true,
            version: crate::VERSION,
            elapsed_time: format_elapsed(elapsed),
            response,
        }
    }
}

/// Compression ratio percentage, rounded to two decimals. Defined as 0 for a
/// zero-byte original so the metric can never divide by zero.
pub fn compression_ratio(orig_size: u64, new_size: u64) -> f64 {
    if orig_size == 0 {
        return 0.0;
    }
    let ratio = (orig_size as f64 - new_size as f64) / orig_size as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Render a float with at most two decimals, trailing zeros trimmed.
fn trim_decimal(value: f64) -> String {
    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    rendered.to_string()
}

/// Human-readable size with B/kB/MB/GB/TB units and at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut pow = 0usize;
    let mut scaled = bytes;
    while scaled >= 1024 && pow < UNITS.len() - 1 {
        scaled /= 1024;
        pow += 1;
    }
    let value = bytes as f64 / 1024f64.powi(pow as i32);
    format!("{} {}", trim_decimal(value), UNITS[pow])
}

/// Wall-clock formatting for the `elapsed_time` envelope field.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{}s", trim_decimal(elapsed.as_secs_f64()))
}
