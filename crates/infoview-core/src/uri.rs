//! `file://` URI helpers.
//!
//! Command links in rendered markup carry file URIs; this module converts between those and the
//! plain file names the engine tracks.

/// Convert a file name (absolute path) into a `file://` URI.
pub fn file_name_to_uri(file_name: &str) -> String {
    let mut path = file_name.replace('\\', "/");
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    format!("file://{}", percent_encode_path(&path))
}

/// Convert a `file://` URI back into a file name.
///
/// Returns `None` for non-`file` URIs.
pub fn uri_to_file_name(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("file://")?;
    // Drop an optional authority (`file://localhost/...`).
    let path = match rest.find('/') {
        Some(0) => rest,
        Some(idx) => &rest[idx..],
        None => return None,
    };
    let decoded = percent_decode(path);

    // `/C:/foo` -> `C:/foo`
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
    {
        return Some(decoded[1..].to_string());
    }
    Some(decoded)
}

/// Percent-encode a path for URIs.
///
/// Keeps URI-safe bytes (and `/`) and percent-encodes the rest.
pub fn percent_encode_path(path: &str) -> String {
    encode(path, |b| b == b'/')
}

/// Percent-encode an arbitrary component (e.g. a JSON query string).
pub fn percent_encode_component(text: &str) -> String {
    encode(text, |_| false)
}

fn encode(text: &str, keep_extra: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            b if keep_extra(b) => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Percent-decode a URI component. Invalid escapes are kept verbatim.
pub fn percent_decode(text: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = text.as_bytes();
    let mut out = Vec::<u8>::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
