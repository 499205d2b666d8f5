//! Cache Key Builders
//!
//! Deterministic keys: the same logical identity always yields the same key,
//! and different part lists (values or order) never yield the same key.

/// Separator between domain and parts.
pub const KEY_DELIMITER: char = ':';

// == Build Key ==
/// Joins `domain` and `parts` with `:`.
///
/// `\` and `:` inside a part are backslash-escaped so that, for example,
/// `["a:b"]` and `["a", "b"]` produce different keys.
pub fn build_key<S: AsRef<str>>(domain: &str, parts: &[S]) -> String {
    let mut key = escape(domain);
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(&escape(part.as_ref()));
    }
    key
}

fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c == '\\' || c == KEY_DELIMITER {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// == Fingerprint ==
/// Stable 64-bit FNV-1a hash of `content`, as 16 hex digits.
///
/// Used to keep keys for large content (prompts, documents) bounded in size.
pub fn fingerprint(content: &str) -> String {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = content.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(PRIME)
    });
    format!("{:016x}", hash)
}

// == Domain Builders ==
/// Key for a video-scoped result, e.g. `video:abc123:summary`.
pub fn video_key(video_id: &str, kind: &str) -> String {
    build_key("video", &[video_id, kind])
}

/// Key for a text-generation result, fingerprinting the prompt content.
pub fn prompt_key(model: &str, prompt: &str) -> String {
    build_key("prompt", &[model, &fingerprint(prompt)])
}

/// Key for a third-party metadata lookup.
pub fn metadata_key(provider: &str, id: &str) -> String {
    build_key("meta", &[provider, id])
}
