use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Notification id derived from the wall clock, kept within 31 bits.
pub fn notification_id() -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    (millis & 0x7fff_ffff) as u32
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect()
}

/// Neutralizes characters that could break out of a single-quoted JS string.
pub fn escape_js_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn is_blob_url(url: &str) -> bool {
    url.starts_with("blob:")
}

/// Trimmed value, or `None` when nothing is left.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Splits `report.xlsx` into `("report", ".xlsx")`. A leading dot is part of the base.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    }
}

/// First path in `base.ext`, `base(1).ext`, `base(2).ext`, ... that does not exist yet.
pub fn unique_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let name = candidate
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (base, ext) = split_name(&name);
    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));

    let mut index: u64 = 1;
    loop {
        let probe = parent.join(format!("{}({}){}", base, index, ext));
        if !probe.exists() {
            return probe;
        }
        index += 1;
    }
}
