use sha2::{Digest, Sha256};

const FALLBACK_FILENAME: &str = "vocabulary";
const CONCEPT_PATH_MARKER: &str = "/Concept/";

/// Turn a vocabulary name into a file stem: whitespace removed, characters
/// that are illegal in common filesystems dropped, no leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stable identifier for a concept, derived only from its URI.
///
/// `http://host/Concept/1234` gives `1234`, other IRIs give their local name
/// (after the last `#` or `/`). Blank nodes and IRIs without a usable local
/// name get the first 16 hex digits of the URI's SHA-256.
pub fn concept_local_id(uri: &str) -> String {
    if uri.starts_with("_:") {
        return short_hash(uri);
    }

    let local = match uri.split_once(CONCEPT_PATH_MARKER) {
        Some((_, rest)) => rest.trim_end_matches('/'),
        None => uri
            .trim_end_matches(['/', '#'])
            .rsplit(['/', '#'])
            .next()
            .unwrap_or(""),
    };

    let local = local.trim();
    if local.is_empty() || local.contains(char::is_whitespace) || local == uri {
        short_hash(uri)
    } else {
        local.to_string()
    }
}

fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}
