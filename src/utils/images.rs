use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Guess the MIME type of an image file from its extension
pub fn mime_for_path(path: &Path) -> mime::Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("svg") => mime::IMAGE_SVG,
        Some("webp") => "image/webp"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Encode raw bytes as a self-contained `data:<mime>;base64,<payload>` URL
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "{DATA_URL_PREFIX}{mime_type}{BASE64_MARKER}{}",
        STANDARD.encode(bytes)
    )
}

pub fn is_data_url(data: &str) -> bool {
    data.starts_with(DATA_URL_PREFIX) && data.contains(BASE64_MARKER)
}

/// Number of bytes carried by a data URL or a bare base64 payload.
/// `None` when the payload is not valid base64.
pub fn decoded_len(data: &str) -> Option<u64> {
    let payload = data
        .split_once(BASE64_MARKER)
        .map_or(data, |(_, payload)| payload);
    STANDARD
        .decode(payload.trim())
        .ok()
        .and_then(|bytes| u64::try_from(bytes.len()).ok())
}
