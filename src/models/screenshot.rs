use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fs;
use std::path::Path;

use crate::error::{JournalError, Result};

/// Chart screenshot attached to a trade, kept base64 encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub mime_type: String,
    pub data: String, // base64 payload without the data URL prefix
}

impl Screenshot {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mime_type = mime_type_for(path).ok_or_else(|| {
            JournalError::validation(
                "screenshot",
                format!("unsupported image type: {}", path.display()),
            )
        })?;
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(JournalError::validation("screenshot", "image file is empty"));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }

    /// Parse `data:<mime>;base64,<payload>`
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (meta, data) = rest.split_once(',')?;
        let mime_type = meta.strip_suffix(";base64")?;
        if mime_type.is_empty() || data.is_empty() {
            return None;
        }

        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decoded size in bytes
    pub fn size(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
