//! Media kinds, transport metadata, and the authoritative size/MIME policy.

use crate::error::GatewayError;
use crate::message::MessageKind;
use serde::{Deserialize, Serialize};

/// Downloadable media categories the protocol distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }

    pub fn message_kind(&self) -> MessageKind {
        match self {
            MediaKind::Image => MessageKind::Image,
            MediaKind::Video => MessageKind::Video,
            MediaKind::Audio => MessageKind::Audio,
            MediaKind::Document => MessageKind::Document,
            MediaKind::Sticker => MessageKind::Sticker,
        }
    }

    /// File extension used when the MIME type gives us nothing usable.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "ogg",
            MediaKind::Document => "bin",
            MediaKind::Sticker => "webp",
        }
    }
}

/// Cryptographic transport metadata for a media payload.
///
/// The live download path ignores this (the connected client already holds
/// the decryption context); the historical path needs the full set to
/// decrypt-and-download by path, and falls back to `url` when it is
/// incomplete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRef {
    /// Provider-hosted URL. Time-limited; the degraded fallback target.
    pub url: Option<String>,
    pub direct_path: Option<String>,
    pub media_key: Option<Vec<u8>>,
    pub file_enc_sha256: Option<Vec<u8>>,
    pub file_sha256: Option<Vec<u8>>,
    pub file_length: Option<u64>,
}

impl MediaRef {
    /// Whether enough metadata is present for a decrypt-and-download by path.
    pub fn has_crypto_metadata(&self) -> bool {
        self.direct_path.is_some()
            && self.media_key.is_some()
            && self.file_enc_sha256.is_some()
            && self.file_sha256.is_some()
            && self.file_length.is_some()
    }
}

/// Decoded media payload attached to a message event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaContent {
    pub kind: MediaKind,
    pub caption: String,
    pub mime_type: String,
    /// Original file name, set for documents.
    pub file_name: String,
    pub media_ref: MediaRef,
}

/// Per-kind ceilings and allowed MIME types. One authoritative table —
/// the sender validates against it before any I/O, and any outer API layer
/// is expected to consult the same table.
pub struct MediaPolicy {
    pub kind: MediaKind,
    pub max_bytes: u64,
    /// Empty slice means any MIME type is accepted.
    pub allowed_mime: &'static [&'static str],
}

const MIB: u64 = 1024 * 1024;

static POLICIES: [MediaPolicy; 5] = [
    MediaPolicy {
        kind: MediaKind::Image,
        max_bytes: 16 * MIB,
        allowed_mime: &["image/jpeg", "image/png", "image/gif", "image/webp"],
    },
    MediaPolicy {
        kind: MediaKind::Video,
        max_bytes: 64 * MIB,
        allowed_mime: &["video/mp4", "video/3gpp", "video/quicktime"],
    },
    MediaPolicy {
        kind: MediaKind::Audio,
        max_bytes: 16 * MIB,
        allowed_mime: &[
            "audio/aac",
            "audio/mp4",
            "audio/mpeg",
            "audio/amr",
            "audio/ogg",
            "audio/ogg; codecs=opus",
            "audio/wav",
        ],
    },
    MediaPolicy {
        kind: MediaKind::Document,
        max_bytes: 100 * MIB,
        allowed_mime: &[],
    },
    MediaPolicy {
        kind: MediaKind::Sticker,
        max_bytes: MIB,
        allowed_mime: &["image/webp"],
    },
];

/// Look up the policy row for a media kind.
pub fn policy_for(kind: MediaKind) -> &'static MediaPolicy {
    POLICIES
        .iter()
        .find(|p| p.kind == kind)
        .unwrap_or(&POLICIES[3])
}

/// Validate a payload against the policy table. Called before any network
/// I/O so oversized or mistyped uploads fail fast.
pub fn validate_media(kind: MediaKind, mime_type: &str, size: usize) -> Result<(), GatewayError> {
    let policy = policy_for(kind);
    if size == 0 {
        return Err(GatewayError::InvalidInput(format!(
            "{} payload is empty",
            kind.as_str()
        )));
    }
    if size as u64 > policy.max_bytes {
        return Err(GatewayError::InvalidInput(format!(
            "{} payload of {size} bytes exceeds the {} byte limit",
            kind.as_str(),
            policy.max_bytes
        )));
    }
    if !policy.allowed_mime.is_empty() {
        let base = mime_type.trim();
        if !policy
            .allowed_mime
            .iter()
            .any(|m| base.eq_ignore_ascii_case(m))
        {
            return Err(GatewayError::InvalidInput(format!(
                "mime type '{mime_type}' is not allowed for {}",
                kind.as_str()
            )));
        }
    }
    Ok(())
}

/// Derive a file extension from a MIME type, falling back to the kind's
/// default. Parameters after `;` are stripped; subtypes like `ogg; codecs=`
/// resolve to their bare form.
pub fn extension_from_mime(mime_type: &str, kind: MediaKind) -> String {
    let base = mime_type.split(';').next().unwrap_or("").trim();
    match base.split('/').nth(1) {
        Some(sub) if !sub.is_empty() => match sub {
            "jpeg" => "jpg".to_string(),
            "quicktime" => "mov".to_string(),
            "3gpp" => "3gp".to_string(),
            "mpeg" => "mp3".to_string(),
            "plain" => "txt".to_string(),
            other => other.to_string(),
        },
        _ => kind.default_extension().to_string(),
    }
}
