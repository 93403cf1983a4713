//! Preview payloads, discriminated by `type`.

use serde::{Deserialize, Serialize};

/// What a client gets back for `GET /files/preview/{file_path}/`.
///
/// - `text`: small text files — the content itself is inlined.
/// - `media`: images, video, audio and PDFs — a short-lived signed URL the
///   client renders from directly.
/// - `file`: everything else (including oversized text) — metadata plus a
///   signed URL to open or download.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilePreview {
    Text {
        content: String,
        content_type: Option<String>,
        size: i64,
        name: String,
    },
    Media {
        url: String,
        content_type: Option<String>,
        size: i64,
        name: String,
    },
    File {
        url: String,
        content_type: Option<String>,
        size: i64,
        name: String,
    },
}
