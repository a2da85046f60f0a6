//! Company logo uploads: data-URL decoding, image sniffing and object keys.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use thiserror::Error;
use url::Url;

pub const LOGO_PREFIX: &str = "logos";
pub const DEFAULT_LOGO_NAME: &str = "company-logo";
const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogoError {
    #[error("Logo must be a base64 data URL")]
    NotDataUrl,
    #[error("Logo data is not valid base64")]
    InvalidBase64,
    #[error("Logo must be a PNG, JPEG, GIF or WEBP image")]
    UnsupportedImage,
    #[error("Invalid logo URL")]
    InvalidUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

/// Decodes `data:<mime>;base64,<payload>`. A header without a mime type
/// falls back to `image/png`.
pub fn parse_data_url(data_url: &str) -> Result<LogoUpload, LogoError> {
    let (header, payload) = data_url
        .trim()
        .split_once(',')
        .ok_or(LogoError::NotDataUrl)?;
    if !header.starts_with("data:") {
        return Err(LogoError::NotDataUrl);
    }

    let content_type = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_ascii_lowercase();

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| LogoError::InvalidBase64)?;

    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP) => {}
        _ => return Err(LogoError::UnsupportedImage),
    }

    let extension = extension_for(&content_type);
    Ok(LogoUpload {
        bytes,
        content_type,
        extension,
    })
}

/// The mime subtype when it is a registered extension of that mime type,
/// otherwise the first registered extension.
fn extension_for(content_type: &str) -> String {
    let subtype = content_type.split('/').nth(1).unwrap_or("png");
    match mime_guess::get_mime_extensions_str(content_type) {
        Some(known) if known.contains(&subtype) => subtype.to_string(),
        Some([first, ..]) => first.to_string(),
        _ => subtype.to_string(),
    }
}

/// `logos/<name>-<millis>.<ext>`. Characters outside `[A-Za-z0-9._-]` in the
/// name are replaced so the key never gains extra path segments.
pub fn logo_key(file_name: Option<&str>, extension: &str, millis: i64) -> String {
    let name: String = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_LOGO_NAME)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    format!("{LOGO_PREFIX}/{name}-{millis}.{extension}")
}

/// Object key of a public logo URL: everything after `/<bucket>/`.
pub fn key_from_public_url(url: &str, bucket: &str) -> Result<String, LogoError> {
    let parsed = Url::parse(url.trim()).map_err(|_| LogoError::InvalidUrl)?;
    let marker = format!("/{bucket}/");
    let (_, key) = parsed
        .path()
        .split_once(&marker)
        .ok_or(LogoError::InvalidUrl)?;
    if key.is_empty() {
        return Err(LogoError::InvalidUrl);
    }
    Ok(key.to_string())
}
