//! Whitelisted cwebp option parsing.
//!
//! Query parameters are untrusted input that ends up on a subprocess command
//! line, so only a fixed set of parameters is recognized and each one is
//! validated against its own rule before it is rendered. Anything invalid is
//! dropped rather than rejected: option parsing never fails a request.
//!
//! | parameter      | rule                          | rendered as        |
//! |----------------|-------------------------------|--------------------|
//! | `pass`         | integer 1–10                  | `-pass N`          |
//! | `m`            | integer 0–6, default 4        | `-m N` (always)    |
//! | `lossless`     | `"1"` or `"true"`             | `-lossless`        |
//! | `near_lossless`| integer 0–100                 | `-near_lossless N` |
//! | `hint`         | `photo`, `picture`, `graph`   | `-hint H`          |
//! | `jpeg_like`    | integer 1–100                 | `-jpeg_like N`     |

use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Content hint forwarded to cwebp's `-hint` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentHint {
    Photo,
    Picture,
    Graph,
}

impl ContentHint {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "photo" => Some(ContentHint::Photo),
            "picture" => Some(ContentHint::Picture),
            "graph" => Some(ContentHint::Graph),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentHint::Photo => "photo",
            ContentHint::Picture => "picture",
            ContentHint::Graph => "graph",
        }
    }
}

/// Validated, batch-wide conversion options.
///
/// Constructed once per request from the query string and shared read-only by
/// every file in the batch. Each field is independently optional except
/// `method`, which falls back to 4 whenever the input is absent or outside
/// [0, 6].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub pass: Option<u32>,
    pub method: u8,
    pub lossless: bool,
    pub near_lossless: Option<u32>,
    pub hint: Option<ContentHint>,
    pub jpeg_like: Option<u32>,
}

pub const DEFAULT_METHOD: u8 = 4;

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            pass: None,
            method: DEFAULT_METHOD,
            lossless: false,
            near_lossless: None,
            hint: None,
            jpeg_like: None,
        }
    }
}

fn bounded_int(params: &HashMap<String, String>, name: &str, range: RangeInclusive<u32>) -> Option<u32> {
    params
        .get(name)
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| range.contains(value))
}

impl ConversionOptions {
    /// Parse options from the flat query-parameter map.
    ///
    /// Never fails: unrecognized, malformed, or out-of-range values are
    /// silently dropped (or defaulted, for `m`).
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        Self {
            pass: bounded_int(params, "pass", 1..=10),
            method: bounded_int(params, "m", 0..=6)
                .map(|value| value as u8)
                .unwrap_or(DEFAULT_METHOD),
            lossless: params
                .get("lossless")
                .is_some_and(|raw| raw == "1" || raw == "true"),
            near_lossless: bounded_int(params, "near_lossless", 0..=100),
            hint: params
                .get("hint")
                .and_then(|raw| ContentHint::parse(raw)),
            jpeg_like: bounded_int(params, "jpeg_like", 1..=100),
        }
    }

    /// Render the options as an argument vector.
    ///
    /// Each token is a separate argument handed to the process-spawn API;
    /// nothing here ever passes through a shell.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(pass) = self.pass {
            args.push("-pass".to_string());
            args.push(pass.to_string());
        }
        args.push("-m".to_string());
        args.push(self.method.to_string());
        if self.lossless {
            args.push("-lossless".to_string());
        }
        if let Some(level) = self.near_lossless {
            args.push("-near_lossless".to_string());
            args.push(level.to_string());
        }
        if let Some(hint) = self.hint {
            args.push("-hint".to_string());
            args.push(hint.as_str().to_string());
        }
        if let Some(quality) = self.jpeg_like {
            args.push("-jpeg_like".to_string());
            args.push(quality.to_string());
        }
        args
    }
}
