//! File name generation for new records
//!
//! Proposed names are sanitized into something every filesystem accepts,
//! then made unique with `_<n>` suffixes. Once the suffix ceiling is crossed
//! the generator switches to hash-derived names so creation always terminates.

use pilotsync_core::ContentHash;

/// Replacement for path-unsafe and control characters
pub const PLACEHOLDER: char = '_';

/// Name used when sanitizing leaves nothing behind
pub const DEFAULT_NAME: &str = "untitled";

/// Hash-derived names tried after the suffix ceiling
pub const MAX_HASH_ATTEMPTS: u32 = 16;

fn is_unsafe(ch: char) -> bool {
    ch.is_control() || matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

fn is_edge_junk(ch: char) -> bool {
    ch == ' ' || ch == '.' || ch == PLACEHOLDER
}

/// Turns a proposed record name into a safe file stem of at most `max_len` characters
pub fn sanitize_name(proposed: &str, max_len: usize) -> String {
    let mut cleaned = String::with_capacity(proposed.len());
    let mut last = None;

    for ch in proposed.chars() {
        let ch = if is_unsafe(ch) {
            PLACEHOLDER
        } else if ch.is_whitespace() {
            ' '
        } else {
            ch
        };
        if (ch == PLACEHOLDER || ch == ' ') && last == Some(ch) {
            continue;
        }
        cleaned.push(ch);
        last = Some(ch);
    }

    let trimmed = cleaned.trim_matches(is_edge_junk);
    let truncated: String = trimmed.chars().take(max_len).collect();
    let truncated = truncated.trim_end_matches(is_edge_junk);

    if truncated.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

/// Candidate file names for one new record, in the order they should be tried
///
/// `stem.ext`, `stem_1.ext` .. `stem_<ceiling>.ext`, then up to
/// [`MAX_HASH_ATTEMPTS`] hash-derived names. The first hash name comes from
/// the payload hash; each further one re-hashes the previous name.
pub struct NameCandidates {
    stem: String,
    extension: String,
    ceiling: u32,
    suffix: u32,
    hash_attempt: u32,
    next_hash: ContentHash,
    started: bool,
}

impl NameCandidates {
    pub fn new(stem: &str, extension: &str, ceiling: u32, payload_hash: &ContentHash) -> Self {
        Self {
            stem: stem.to_string(),
            extension: extension.to_string(),
            ceiling,
            suffix: 0,
            hash_attempt: 0,
            next_hash: payload_hash.clone(),
            started: false,
        }
    }

    fn file_name(&self, stem: &str) -> String {
        if self.extension.is_empty() {
            stem.to_string()
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }
}

impl Iterator for NameCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.started {
            self.started = true;
            return Some(self.file_name(&self.stem));
        }

        if self.suffix < self.ceiling {
            self.suffix += 1;
            return Some(self.file_name(&format!("{}_{}", self.stem, self.suffix)));
        }

        if self.hash_attempt < MAX_HASH_ATTEMPTS {
            self.hash_attempt += 1;
            let stem = self.next_hash.short().to_string();
            self.next_hash = ContentHash::of(stem.as_bytes());
            return Some(self.file_name(&stem));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_name("a/b\\c:d", 64), "a_b_c_d");
        assert_eq!(sanitize_name("what?*<>|\"", 64), "what");
        assert_eq!(sanitize_name("tab\there", 64), "tab_here");
    }

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_name("a//b", 64), "a_b");
        assert_eq!(sanitize_name("many    spaces", 64), "many spaces");
        assert_eq!(sanitize_name("a_/_b", 64), "a_b");
    }

    #[test]
    fn test_sanitize_trims_edges() {
        assert_eq!(sanitize_name("  ..hidden..  ", 64), "hidden");
        assert_eq!(sanitize_name("__x__", 64), "x");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_name(&long, 10).len(), 10);
        assert_eq!(sanitize_name("abc       def", 4), "abc");
    }

    #[test]
    fn test_sanitize_handles_multibyte() {
        assert_eq!(sanitize_name("Grüße an Zoë", 5), "Grüße");
    }

    #[test]
    fn test_sanitize_empty_defaults() {
        assert_eq!(sanitize_name("", 64), DEFAULT_NAME);
        assert_eq!(sanitize_name("///", 64), DEFAULT_NAME);
        assert_eq!(sanitize_name(" . ", 64), DEFAULT_NAME);
    }

    #[test]
    fn test_candidates_order() {
        let hash = ContentHash::of(b"payload");
        let names: Vec<String> = NameCandidates::new("note", "txt", 2, &hash).collect();

        assert_eq!(names.len(), 3 + MAX_HASH_ATTEMPTS as usize);
        assert_eq!(names[0], "note.txt");
        assert_eq!(names[1], "note_1.txt");
        assert_eq!(names[2], "note_2.txt");
        assert_eq!(names[3], format!("{}.txt", hash.short()));
    }

    #[test]
    fn test_hash_candidates_are_distinct() {
        let hash = ContentHash::of(b"payload");
        let names: Vec<String> = NameCandidates::new("n", "ics", 0, &hash).skip(1).collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_candidates_without_extension() {
        let hash = ContentHash::of(b"");
        let first = NameCandidates::new("plain", "", 1, &hash).next();
        assert_eq!(first.as_deref(), Some("plain"));
    }
}
