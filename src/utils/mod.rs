use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use regex::Regex;

/// Accepts any trailing bits and ignores padding, so truncated payloads still decode.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    NO_PAD
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/([a-zA-Z0-9]+);base64,(.+)$").expect("data uri pattern compiles")
});

static DATA_URI_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/\w+;base64,").expect("data uri prefix pattern compiles")
});

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Folder-safe form of a work title: ASCII alphanumerics and CJK ideographs
/// survive, everything else becomes `_`, capped at 50 characters.
pub fn safe_folder_name(title: &str) -> String {
    let title = if title.is_empty() { "Untitled" } else { title };
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect()
}

/// Work ids end up in folder names, so only plain `[A-Za-z0-9-]` tokens
/// are accepted.
pub fn is_valid_work_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Decodes an uploaded image. Well-formed data URIs keep their declared
/// type; anything else is treated as best-effort base64 PNG and never fails.
pub fn decode_image_data(image: &str) -> DecodedImage {
    if let Some(captures) = DATA_URI.captures(image) {
        let declared = &captures[1];
        let extension = if declared == "jpeg" { "jpg" } else { declared };
        return DecodedImage {
            extension: extension.to_string(),
            bytes: decode_base64_lenient(&captures[2]),
        };
    }

    let stripped = DATA_URI_PREFIX.replace(image, "");
    DecodedImage {
        extension: "png".to_string(),
        bytes: decode_base64_lenient(&stripped),
    }
}

fn decode_base64_lenient(input: &str) -> Vec<u8> {
    let mut cleaned: String = input
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();
    // A single dangling sextet cannot form a byte.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    LENIENT_BASE64.decode(cleaned.as_bytes()).unwrap_or_default()
}
