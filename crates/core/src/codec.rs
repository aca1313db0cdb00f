//! # Multi-File Codec
//!
//! Serializes a mapping of relative file paths to text content into a single
//! delimited blob, and back. This is the wire format used to move a whole
//! codebase through one LLM-shaped text channel:
//!
//! ```text
//! >>> src/App.tsx
//! (content)
//!
//! >>> src/index.css
//! (content)
//! ```
//!
//! The decoder input comes from an untrusted generative capability, so it is
//! tolerant: missing delimiters yield an empty map, markdown fences are
//! stripped, and paths that escape the project root are dropped.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Line-start token that introduces a file entry.
pub const FILE_DELIMITER: &str = ">>>";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z0-9_-]*").expect("valid fence regex"));

/// Encode a file mapping into a single delimited blob.
///
/// Entries are emitted in map iteration order, separated by a blank line.
pub fn encode(files: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (path, content) in files {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(FILE_DELIMITER);
        out.push(' ');
        out.push_str(path);
        out.push('\n');
        out.push_str(content);
    }
    out
}

/// Decode a delimited blob back into a file mapping.
///
/// Splits at start-of-line `>>>` occurrences; the remainder of the delimiter
/// line (trimmed) is the path, the following lines (block-trimmed, with
/// markdown fences removed) are the content. A blob with no delimiters
/// decodes to an empty map - callers treat that as "nothing to write".
pub fn decode(blob: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in blob.lines() {
        if let Some(rest) = line.strip_prefix(FILE_DELIMITER) {
            if let Some((path, body)) = current.take() {
                insert_entry(&mut files, path, &body);
            }
            current = Some((rest.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
        // Lines before the first delimiter are preamble chatter; ignored.
    }
    if let Some((path, body)) = current.take() {
        insert_entry(&mut files, path, &body);
    }

    files
}

fn insert_entry(files: &mut BTreeMap<String, String>, raw_path: String, body: &[&str]) {
    let Some(path) = sanitize_path(&raw_path) else {
        return;
    };
    let content = strip_fences(&body.join("\n"));
    files.insert(path, content);
}

/// Remove markdown code-fence markers the model may have wrapped around
/// content, leaving raw source only.
pub fn strip_fences(content: &str) -> String {
    FENCE_RE.replace_all(content, "").trim().to_string()
}

/// Normalize a decoded path for use as a file-system path.
///
/// Backslashes become forward slashes; empty paths, absolute paths, drive
/// prefixes, and `..` segments are rejected (the blob comes from an
/// untrusted source and must not write outside the project root).
pub fn sanitize_path(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace('\\', "/");
    if normalized.is_empty() {
        return None;
    }
    if normalized.starts_with('/') || normalized.contains(':') {
        warn!(path = %raw, "discarding non-relative path from decoded blob");
        return None;
    }
    if normalized.split('/').any(|seg| seg == "..") {
        warn!(path = %raw, "discarding traversal path from decoded blob");
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let files = map(&[
            ("src/App.tsx", "export default function App() {\n  return null;\n}"),
            ("src/index.css", "body {\n\n  margin: 0;\n}"),
            ("README.md", "hello `world`"),
        ]);
        assert_eq!(decode(&encode(&files)), files);
    }

    #[test]
    fn test_decode_without_delimiters_is_empty() {
        assert!(decode("").is_empty());
        assert!(decode("no delimiters here\njust prose").is_empty());
    }

    #[test]
    fn test_decode_strips_markdown_fences() {
        let blob = ">>> src/App.tsx\n```tsx\nconst x = 1;\n```";
        let files = decode(blob);
        assert_eq!(files["src/App.tsx"], "const x = 1;");
    }

    #[test]
    fn test_decode_discards_empty_path() {
        let blob = ">>>\nsome orphan content\n\n>>> src/ok.ts\nexport {};";
        let files = decode(blob);
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("src/ok.ts"));
    }

    #[test]
    fn test_decode_normalizes_windows_separators() {
        let files = decode(">>> src\\components\\Button.tsx\nconst b = 2;");
        assert_eq!(files["src/components/Button.tsx"], "const b = 2;");
    }

    #[test]
    fn test_decode_rejects_traversal_and_absolute_paths() {
        let blob = ">>> ../../etc/passwd\nroot::0\n\n>>> /etc/hosts\nlocal\n\n>>> C:\\windows\\sys.ini\nx\n\n>>> src/safe.ts\nok";
        let files = decode(blob);
        assert_eq!(files.len(), 1);
        assert_eq!(files["src/safe.ts"], "ok");
    }

    #[test]
    fn test_decode_ignores_preamble() {
        let blob = "Sure! Here is the codebase:\n\n>>> src/a.ts\nconst a = 1;";
        let files = decode(blob);
        assert_eq!(files.len(), 1);
        assert_eq!(files["src/a.ts"], "const a = 1;");
    }

    #[test]
    fn test_round_trip_many_files() {
        let files: BTreeMap<String, String> = (0..50)
            .map(|i| (format!("src/mod_{i}.ts"), format!("// file {i}\nexport const N = {i};")))
            .collect();
        assert_eq!(decode(&encode(&files)), files);
    }
}
