//! Shared helpers for the gateway integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use webpgate::{GatewayConfig, GatewayState};

/// Stands in for cwebp: copies input to output, fails when the input
/// contains the marker string FAIL.
pub const STUB_CONVERTER: &str = r#"#!/bin/sh
in= out=
while [ "$#" -gt 0 ]; do
  case "$1" in
    -o) out=$2; shift 2 ;;
    -pass|-m|-near_lossless|-hint|-jpeg_like) shift 2 ;;
    -quiet|-mt|-lossless) shift ;;
    *) in=$1; shift ;;
  esac
done
grep -q FAIL "$in" && exit 1
cp "$in" "$out"
"#;

pub fn write_stub_converter(dir: &Path) -> PathBuf {
    let path = dir.join("stub-cwebp");
    std::fs::write(&path, STUB_CONVERTER).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

pub const TEST_API_KEY: &str = "test-api-key";

/// Gateway state wired to the stub converter, scratch space under `dir`.
pub fn test_state(dir: &Path) -> Arc<GatewayState> {
    let config = GatewayConfig {
        api_key: TEST_API_KEY.to_string(),
        temp_dir: dir.join("scratch"),
        cwebp_path: Some(write_stub_converter(dir)),
        ..GatewayConfig::default()
    };
    Arc::new(GatewayState::new(config).expect("failed to create test state"))
}

pub const BOUNDARY: &str = "gatewaytestboundary";

/// Hand-rolled multipart/form-data body builder.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, contents: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }
}
