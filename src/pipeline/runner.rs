//! Batch orchestration across the pipeline stages.
//!
//! Options and descriptors are parsed once, before any file is touched.
//! Intake runs per upload in batch order; conversions run concurrently with
//! a bounded limit and the results are re-sorted so the report always matches
//! upload order, whatever the completion order. A failure inside one file's
//! conversion — including a panic — becomes that file's error record and
//! never aborts the batch.

use crate::pipeline::descriptor::{DescriptorIndex, DescriptorParseError};
use crate::pipeline::executor::{ConvertError, Converter};
use crate::pipeline::intake::{intake, UploadItem};
use crate::pipeline::options::ConversionOptions;
use crate::pipeline::report::{assemble, FileOutcome, ResultRecord};
use crate::pipeline::Scratch;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

/// Immutable per-process pipeline wiring: the converter, the scratch
/// directory uploads are admitted into, and the conversion concurrency bound.
#[derive(Debug, Clone)]
pub struct Pipeline {
    converter: Converter,
    temp_dir: PathBuf,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(converter: Converter, temp_dir: PathBuf, concurrency: usize) -> Self {
        Self {
            converter,
            temp_dir,
            concurrency: concurrency.max(1),
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Run one batch to completion and return the ordered result records.
    ///
    /// The only fatal outcome is a malformed `descriptors` body; every
    /// per-file failure is isolated into that file's record.
    pub async fn run(
        &self,
        params: &HashMap<String, String>,
        descriptor_body: Option<&str>,
        uploads: Vec<UploadItem>,
        scratch: &Scratch,
    ) -> Result<Vec<ResultRecord>, DescriptorParseError> {
        let options = ConversionOptions::from_query(params);
        let index = DescriptorIndex::parse(descriptor_body)?;

        let mut entities = Vec::with_capacity(uploads.len());
        for item in uploads {
            entities.push(intake(item, &index, &self.temp_dir, scratch).await);
        }

        let mut outcomes: Vec<(usize, FileOutcome)> =
            stream::iter(entities.into_iter().enumerate().map(|(idx, entity)| {
                let options = &options;
                async move {
                    let conversion = match entity.temp_path.clone() {
                        Some(path) if entity.processable => {
                            let attempt = AssertUnwindSafe(
                                self.converter.convert(&path, options, scratch),
                            )
                            .catch_unwind()
                            .await;
                            match attempt {
                                Ok(result) => Some(result),
                                Err(_) => {
                                    tracing::error!(
                                        filename = %entity.filename,
                                        "conversion task panicked"
                                    );
                                    Some(Err(ConvertError::Failed))
                                }
                            }
                        }
                        _ => None,
                    };
                    (idx, FileOutcome { entity, conversion })
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(assemble(outcomes.into_iter().map(|(_, outcome)| outcome).collect()))
    }
}
