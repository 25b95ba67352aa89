//! Per-file upload validation and admission into the pipeline.
//!
//! Each uploaded file arrives as an [`UploadItem`]: the untrusted original
//! filename, the transport's error code, and the spool file the transport
//! wrote the body to. Intake decides whether the file can be processed and,
//! if so, moves it to a request-scoped temporary path whose name is random —
//! never derived from the client filename. Checks run in a fixed order and
//! the first failure wins; every outcome, processable or not, carries the
//! file's matched descriptor.

use crate::pipeline::descriptor::{Descriptor, DescriptorIndex};
use crate::pipeline::Scratch;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extensions the gateway accepts, compared lower-cased.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// Transport-level outcome of receiving one file part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorCode {
    /// The part was received completely.
    Ok,
    /// The part exceeded the per-file size limit.
    SizeExceeded,
    /// The body stream ended before the part was complete.
    Partial,
    /// The part carried no file (empty filename).
    NoFile,
    /// The spool directory was missing when the part arrived.
    NoTempDir,
    /// Writing the spool file failed.
    WriteFailure,
    /// An upload filter rejected the part.
    Blocked,
    /// Any other transport failure.
    Unknown,
}

impl UploadErrorCode {
    /// Fixed code-to-message table for unprocessable uploads.
    pub fn message(&self) -> &'static str {
        match self {
            UploadErrorCode::Ok => "OK",
            UploadErrorCode::SizeExceeded => "The uploaded file exceeds the maximum allowed size.",
            UploadErrorCode::Partial => "The uploaded file was only partially uploaded.",
            UploadErrorCode::NoFile => "No file was uploaded.",
            UploadErrorCode::NoTempDir => "Missing a temporary folder.",
            UploadErrorCode::WriteFailure => "Failed to write file to disk.",
            UploadErrorCode::Blocked => "An upload filter stopped the file upload.",
            UploadErrorCode::Unknown => "Unknown upload error.",
        }
    }
}

/// One member of the uploaded batch, as handed over by the transport.
///
/// The filename is untrusted and may contain path-like segments; it is only
/// ever used for descriptor correlation and reporting, never as a filesystem
/// path. Consumed exactly once by [`intake`].
#[derive(Debug)]
pub struct UploadItem {
    pub filename: String,
    pub extension: String,
    pub error: UploadErrorCode,
    pub spool_path: Option<PathBuf>,
    pub size: u64,
}

/// Lower-cased extension of an untrusted filename. Pure string parsing; the
/// filename never touches the filesystem.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

impl UploadItem {
    /// A part the transport spooled to disk successfully.
    pub fn spooled(filename: String, spool_path: PathBuf, size: u64) -> Self {
        let extension = extension_of(&filename);
        Self {
            filename,
            extension,
            error: UploadErrorCode::Ok,
            spool_path: Some(spool_path),
            size,
        }
    }

    /// A part the transport failed to receive.
    pub fn failed(filename: String, error: UploadErrorCode) -> Self {
        let extension = extension_of(&filename);
        Self {
            filename,
            extension,
            error,
            spool_path: None,
            size: 0,
        }
    }

    /// Whether the spool handle points at a genuine completed upload. Rejects
    /// attempts to point the pipeline at arbitrary filesystem paths.
    fn is_genuine(&self) -> bool {
        match self.error {
            // Failed parts legitimately have no spool file.
            UploadErrorCode::Ok => self.spool_path.as_deref().is_some_and(Path::is_file),
            _ => true,
        }
    }
}

/// The per-file working record threaded through the rest of the pipeline.
///
/// `processable == true` implies `temp_path` is set and points at a file this
/// request exclusively owns; `processable == false` implies `error` is set.
#[derive(Debug)]
pub struct Entity {
    pub filename: String,
    pub processable: bool,
    pub descriptor: Descriptor,
    pub temp_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl Entity {
    fn unprocessable(filename: String, descriptor: Descriptor, error: impl Into<String>) -> Self {
        Self {
            filename,
            processable: false,
            descriptor,
            temp_path: None,
            error: Some(error.into()),
        }
    }

    fn admitted(filename: String, descriptor: Descriptor, temp_path: PathBuf) -> Self {
        Self {
            filename,
            processable: true,
            descriptor,
            temp_path: Some(temp_path),
            error: None,
        }
    }
}

/// Validate one upload and admit it into the pipeline.
///
/// Checks run in order, first match wins:
/// 1. spool authenticity,
/// 2. transport error code,
/// 3. extension whitelist,
/// 4. move into `temp_dir` under a random name.
pub async fn intake(
    item: UploadItem,
    index: &DescriptorIndex,
    temp_dir: &Path,
    scratch: &Scratch,
) -> Entity {
    let descriptor = index.lookup(&item.filename);

    if !item.is_genuine() {
        return Entity::unprocessable(
            item.filename,
            descriptor,
            "Cannot process a fake uploaded file.",
        );
    }

    if item.error != UploadErrorCode::Ok {
        return Entity::unprocessable(item.filename, descriptor, item.error.message());
    }

    if !ALLOWED_EXTENSIONS.contains(&item.extension.as_str()) {
        return Entity::unprocessable(
            item.filename,
            descriptor,
            "This file extension is not allowed.",
        );
    }

    // is_genuine() established the spool path is present.
    let spool_path = item.spool_path.expect("genuine upload has a spool path");
    let temp_path = temp_dir.join(format!("{}.{}", Uuid::new_v4().simple(), item.extension));
    scratch.register(temp_path.clone());

    match tokio::fs::rename(&spool_path, &temp_path).await {
        Ok(()) => Entity::admitted(item.filename, descriptor, temp_path),
        Err(err) => {
            tracing::warn!(
                filename = %item.filename,
                error = %err,
                "failed to move spooled upload into process directory"
            );
            Entity::unprocessable(
                item.filename,
                descriptor,
                "Cannot move the upload file to the temporary process directory.",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spool_file(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join(format!("spool-{}", Uuid::new_v4().simple()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn extension_parsing_is_lowercased_and_path_safe() {
        assert_eq!(extension_of("photo.JPG"), "jpg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("../../etc/shadow.png"), "png");
        assert_eq!(extension_of("no_extension"), "");
        assert_eq!(extension_of(""), "");
    }

    #[tokio::test]
    async fn missing_spool_file_is_rejected_as_fake() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let item = UploadItem::spooled(
            "cat.jpg".to_string(),
            dir.path().join("does-not-exist"),
            10,
        );

        let entity = intake(item, &DescriptorIndex::default(), dir.path(), &scratch).await;
        assert!(!entity.processable);
        assert_eq!(
            entity.error.as_deref(),
            Some("Cannot process a fake uploaded file.")
        );
        assert!(entity.temp_path.is_none());
    }

    #[tokio::test]
    async fn transport_errors_map_to_fixed_messages() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let cases = [
            (UploadErrorCode::SizeExceeded, "The uploaded file exceeds the maximum allowed size."),
            (UploadErrorCode::Partial, "The uploaded file was only partially uploaded."),
            (UploadErrorCode::NoFile, "No file was uploaded."),
            (UploadErrorCode::NoTempDir, "Missing a temporary folder."),
            (UploadErrorCode::WriteFailure, "Failed to write file to disk."),
            (UploadErrorCode::Blocked, "An upload filter stopped the file upload."),
            (UploadErrorCode::Unknown, "Unknown upload error."),
        ];

        for (code, message) in cases {
            let item = UploadItem::failed("cat.jpg".to_string(), code);
            let entity = intake(item, &DescriptorIndex::default(), dir.path(), &scratch).await;
            assert!(!entity.processable);
            assert_eq!(entity.error.as_deref(), Some(message));
        }
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let spool = spool_file(dir.path(), b"not an image");
        let item = UploadItem::spooled("notes.txt".to_string(), spool.clone(), 12);

        let entity = intake(item, &DescriptorIndex::default(), dir.path(), &scratch).await;
        assert!(!entity.processable);
        assert_eq!(
            entity.error.as_deref(),
            Some("This file extension is not allowed.")
        );
        // The spool file is left for the scratch guard to reclaim.
        assert!(spool.exists());
    }

    #[tokio::test]
    async fn admitted_upload_moves_under_a_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let spool = spool_file(dir.path(), b"jpeg bytes");
        let item = UploadItem::spooled("../sneaky/cat.jpg".to_string(), spool.clone(), 10);

        let entity = intake(item, &DescriptorIndex::default(), dir.path(), &scratch).await;
        assert!(entity.processable);
        assert!(entity.error.is_none());

        let temp_path = entity.temp_path.expect("admitted entity has a temp path");
        assert!(temp_path.is_file());
        assert!(!spool.exists(), "spool file must have been moved");
        assert_eq!(temp_path.extension().unwrap(), "jpg");
        let stem = temp_path.file_stem().unwrap().to_str().unwrap();
        assert!(!stem.contains("cat"), "temp name must not derive from the client filename");
        assert!(!stem.contains("sneaky"));
    }

    #[tokio::test]
    async fn every_outcome_carries_the_matched_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let index = DescriptorIndex::parse(Some(
            r#"[{"filename":"cat.jpg","album":"pets"},{"filename":"bad.txt","album":"docs"}]"#,
        ))
        .unwrap();

        let spool = spool_file(dir.path(), b"jpeg bytes");
        let good = intake(
            UploadItem::spooled("cat.jpg".to_string(), spool, 10),
            &index,
            dir.path(),
            &scratch,
        )
        .await;
        assert_eq!(good.descriptor.get("album"), Some(&json!("pets")));

        let bad = intake(
            UploadItem::failed("bad.txt".to_string(), UploadErrorCode::Partial),
            &index,
            dir.path(),
            &scratch,
        )
        .await;
        assert_eq!(bad.descriptor.get("album"), Some(&json!("docs")));
    }

    #[tokio::test]
    async fn two_uploads_never_collide_on_temp_names() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new();
        let index = DescriptorIndex::default();

        let first = intake(
            UploadItem::spooled("a.png".to_string(), spool_file(dir.path(), b"one"), 3),
            &index,
            dir.path(),
            &scratch,
        )
        .await;
        let second = intake(
            UploadItem::spooled("a.png".to_string(), spool_file(dir.path(), b"two"), 3),
            &index,
            dir.path(),
            &scratch,
        )
        .await;

        assert_ne!(first.temp_path, second.temp_path);
    }
}
