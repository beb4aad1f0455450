//! Destination names for intercepted downloads.
//!
//! A name comes from, in order: a `Content-Disposition` style hint, a literal
//! name hint, the last segment of the URL, or [`FALLBACK_NAME`]. It is then
//! sanitized and given an extension from the MIME type when it has none.

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use crate::domain::DownloadRequest;
use crate::utils::{non_empty, sanitize_filename};

pub const FALLBACK_NAME: &str = "download";

/// Display name for a download. Never empty.
pub fn resolve(url: &str, hint: Option<&str>, mime_type: Option<&str>) -> String {
    let from_hint = hint.and_then(non_empty).and_then(|hint| {
        if has_filename_marker(&hint) {
            filename_from_disposition(&hint)
        } else {
            Some(hint)
        }
    });
    let name = from_hint.or_else(|| filename_from_url(url));
    ensure_file_name(name.as_deref(), mime_type)
}

pub fn resolve_request(request: &DownloadRequest) -> String {
    resolve(
        &request.url,
        request.name_hint(),
        request.mime_type.as_deref(),
    )
}

pub fn has_filename_marker(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains("filename=") || lower.contains("filename*=")
}

/// Sanitizes `name`, falls back to [`FALLBACK_NAME`] and appends the MIME
/// extension when the name has none.
pub fn ensure_file_name(name: Option<&str>, mime_type: Option<&str>) -> String {
    let sanitized = sanitize_filename(name.unwrap_or_default().trim());
    let trimmed = sanitized.trim().trim_end_matches(['.', ' ']);

    let mut name = if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    };

    if !name.contains('.') {
        if let Some(ext) = mime_type.and_then(extension_for_mime) {
            name.push('.');
            name.push_str(&ext);
        }
    }
    name
}

/// Filename from a disposition header. `filename*` (RFC 5987) wins over `filename`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let extended = Regex::new(r#"(?i)filename\*\s*=\s*([^;]+)"#).ok()?;
    let plain = Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*("(?:[^"\\]|\\.)*"|[^;]*)"#).ok()?;

    let star = extended.captures(value).and_then(|caps| {
        let raw = caps[1].trim().trim_matches('"');
        let encoded = match raw.find("''") {
            Some(idx) => &raw[idx + 2..],
            None => raw,
        };
        let decoded = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
        non_empty(&decoded)
    });

    let name = star.or_else(|| {
        plain.captures(value).and_then(|caps| {
            let raw = caps[1].trim();
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .map(|r| r.replace("\\\"", "\"").replace("\\\\", "\\"))
                .unwrap_or_else(|| raw.to_string());
            non_empty(&unquoted)
        })
    })?;

    // A disposition may carry a client path; only the last component names the file.
    name.rsplit(['/', '\\']).next().and_then(non_empty)
}

/// Last non-empty path segment of `url`, percent-decoded. `blob:` URLs use
/// the URL they wrap.
pub fn filename_from_url(url: &str) -> Option<String> {
    let inner = url.strip_prefix("blob:").unwrap_or(url);

    let segment = match Url::parse(inner) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => inner
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    }?;

    let decoded = percent_decode_str(&segment).decode_utf8_lossy().into_owned();
    non_empty(&decoded)
}

/// Extension registered for a MIME type, without the dot.
pub fn extension_for_mime(mime_type: &str) -> Option<String> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let known = match essence.as_str() {
        "" | "*/*" | "application/octet-stream" => return None,
        "text/csv" => Some("csv"),
        "text/plain" => Some("txt"),
        "text/html" => Some("html"),
        "application/json" => Some("json"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        _ => None,
    };

    known.map(str::to_string).or_else(|| {
        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    #[test]
    fn test_name_from_url_path() {
        assert_eq!(resolve("https://x/report.xlsx", None, Some(XLSX)), "report.xlsx");
    }

    #[test]
    fn test_blob_hint_gets_mime_extension() {
        let url = "blob:https://x/6f1c2d4e-1111-2222-3333-444455556666";
        assert_eq!(resolve(url, Some("data"), Some("text/csv")), "data.csv");
    }

    #[test]
    fn test_disposition_hint() {
        let name = resolve(
            "https://x/export?id=4",
            Some("attachment; filename=\"Q3 sales.xlsx\""),
            Some(XLSX),
        );
        assert_eq!(name, "Q3 sales.xlsx");
    }

    #[test]
    fn test_extended_disposition_wins() {
        let header = "attachment; filename=\"fallback.csv\"; filename*=UTF-8''r%C3%A9sum%C3%A9.csv";
        assert_eq!(filename_from_disposition(header).as_deref(), Some("résumé.csv"));
    }

    #[test]
    fn test_disposition_strips_client_path() {
        let header = r#"attachment; filename="C:\\Users\\me\\secret.txt""#;
        assert_eq!(filename_from_disposition(header).as_deref(), Some("secret.txt"));
        assert_eq!(
            filename_from_disposition("attachment; filename=../../evil.sh").as_deref(),
            Some("evil.sh")
        );
    }

    #[test]
    fn test_literal_hint_is_sanitized() {
        assert_eq!(resolve("blob:https://x/1", Some("a/b:c"), None), "a_b_c");
    }

    #[test]
    fn test_falls_back_to_generic_name() {
        assert_eq!(resolve("https://x/", None, None), "download");
        assert_eq!(resolve("", None, None), "download");
        assert_eq!(resolve("https://x/", Some("   "), Some("text/csv")), "download.csv");
        assert_eq!(resolve("https://x/", Some(".."), None), "download");
    }

    #[test]
    fn test_disposition_without_filename_uses_url() {
        let request = DownloadRequest::from_intent(
            "https://x/files/report.pdf",
            None,
            Some("attachment"),
            Some("application/pdf"),
        );
        assert_eq!(resolve_request(&request), "report.pdf");
    }

    #[test]
    fn test_url_segment_is_percent_decoded() {
        assert_eq!(
            filename_from_url("https://x/a/monthly%20report.csv?x=1#top").as_deref(),
            Some("monthly report.csv")
        );
    }

    #[test]
    fn test_existing_extension_is_kept() {
        assert_eq!(ensure_file_name(Some("notes.md"), Some("text/csv")), "notes.md");
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        assert_eq!(extension_for_mime("text/csv; charset=utf-8").as_deref(), Some("csv"));
        assert_eq!(extension_for_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_output_never_empty() {
        let hints = [None, Some(""), Some("  "), Some("..."), Some("filename=")];
        let urls = ["", "https://x/", "blob:null/", "not a url"];
        for url in urls {
            for hint in hints {
                assert!(!resolve(url, hint, None).is_empty(), "{url:?} {hint:?}");
            }
        }
    }
}
