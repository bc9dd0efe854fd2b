//! Filename resolution for downloaded files

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use std::path::Path;

use crate::types::{FileId, TaskId};

/// Name used when nothing better can be derived
pub const FALLBACK_FILENAME: &str = "downloaded.bin";

/// Stem used with a Content-Type extension when the URL has no usable segment
const FALLBACK_STEM: &str = "downloaded";

/// Resolve the on-disk name for a response
///
/// Strict precedence:
/// 1. `Content-Disposition` `filename` (or RFC 5987 `filename*`)
/// 2. an extension derived from `Content-Type`, on the URL's last segment stem
/// 3. the URL's last path segment, when it has an extension
/// 4. [`FALLBACK_FILENAME`]
///
/// The result never contains path separators.
///
/// # Examples
///
/// ```
/// use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
/// use task_dl::utils::resolve_filename;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
/// assert_eq!(resolve_filename(&headers, "http://x/picture"), "picture.png");
/// ```
pub fn resolve_filename(headers: &HeaderMap, url: &str) -> String {
    if let Some(value) = headers.get(CONTENT_DISPOSITION)
        && let Ok(value) = value.to_str()
        && let Some(name) = filename_from_content_disposition(value)
    {
        return name;
    }

    let segment = last_url_segment(url);
    let url_extension = segment
        .as_deref()
        .and_then(|s| Path::new(s).extension())
        .and_then(|e| e.to_str());

    if let Some(value) = headers.get(CONTENT_TYPE)
        && let Ok(value) = value.to_str()
        && let Some(ext) = extension_for_content_type(value, url_extension)
    {
        let stem = segment
            .as_deref()
            .and_then(|s| Path::new(s).file_stem())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_STEM);
        return format!("{}.{}", stem, ext);
    }

    if let Some(segment) = segment
        && Path::new(&segment).extension().is_some()
    {
        return segment;
    }

    FALLBACK_FILENAME.to_string()
}

/// Final name of a downloaded file: `{task_id}-{file_id}-{resolved}`
pub fn final_filename(task_id: &TaskId, file_id: &FileId, resolved: &str) -> String {
    format!("{}-{}-{}", task_id, file_id, resolved)
}

/// Extract the filename from a Content-Disposition value
///
/// `filename*` (RFC 5987) wins over a plain `filename` when both are present.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // Format is: charset'lang'encoded-filename
                let raw = raw.trim().trim_matches('"');
                let encoded = raw.rfind('\'').map_or(raw, |idx| &raw[idx + 1..]);
                if let Ok(decoded) = urlencoding::decode(encoded)
                    && let Some(name) = sanitize_filename(&decoded)
                {
                    return Some(name);
                }
            }
            "filename" => {
                if plain.is_none() {
                    plain = sanitize_filename(raw.trim().trim_matches('"'));
                }
            }
            _ => {}
        }
    }

    plain
}

/// Conventional extension for types whose registered list leads with a rarer one
const CANONICAL_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/javascript", "js"),
    ("application/javascript", "js"),
    ("application/x-javascript", "js"),
    ("text/markdown", "md"),
    ("audio/mpeg", "mp3"),
    ("application/gzip", "gz"),
    ("application/x-gzip", "gz"),
];

/// File extension for a Content-Type value, if any
///
/// In order of preference:
/// 1. `url_extension`, when it is registered for the type (`readme.txt` stays `.txt`)
/// 2. the conventional extension of a common type (`text/plain` is `txt`)
/// 3. the registered extension spelled like the subtype (`png`, `pdf`, `zip`)
/// 4. the first registered extension
///
/// `application/octet-stream` carries no naming information and yields `None`.
pub fn extension_for_content_type(value: &str, url_extension: Option<&str>) -> Option<String> {
    let mime: mime::Mime = value.trim().parse().ok()?;
    let essence = mime.essence_str();
    if essence == mime::APPLICATION_OCTET_STREAM.essence_str() {
        return None;
    }

    let registered = mime_guess::get_mime_extensions(&mime).unwrap_or_default();

    if let Some(ext) = url_extension
        && registered.iter().any(|r| r.eq_ignore_ascii_case(ext))
    {
        return Some(ext.to_string());
    }

    if let Some((_, ext)) = CANONICAL_EXTENSIONS.iter().find(|(ty, _)| *ty == essence) {
        return Some((*ext).to_string());
    }

    let subtype = mime.subtype().as_str();
    registered
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| registered.first())
        .map(|ext| (*ext).to_string())
}

/// Last non-empty, percent-decoded path segment of `url`
fn last_url_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    sanitize_filename(&decoded)
}

/// Strip directory components and reject names that are empty or dot-only
fn sanitize_filename(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if name.is_empty() || name.chars().all(|c| c == '.') || name.contains('\0') {
        return None;
    }
    Some(name.to_string())
}
