use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::iter::Peekable;
use std::path::Path;
use std::str::CharIndices;
use std::time::Instant;
use tracing::debug;

use super::types::{RawCrateData, SearchIndex};
use super::validate::{Severity, has_errors, validate_all};
use crate::error::{IndexError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

lazy_static! {
    /// `JSON.parse('` as written by the generator, with or without `new Map(`
    static ref WRAPPER: Regex = Regex::new(r"JSON\.parse\(\s*'").unwrap();
}

/// Read an index file, transparently decompressing gzip content
pub fn read_index_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut text)
            .map_err(|source| IndexError::Decompress {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(text);
    }

    String::from_utf8(bytes).map_err(|e| IndexError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

/// Return the JSON payload of an index file
pub fn extract_json(source: &str) -> Result<Cow<'_, str>> {
    let trimmed = source.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return Ok(Cow::Borrowed(trimmed));
    }

    let start = WRAPPER
        .find(source)
        .ok_or(IndexError::WrapperNotFound)?
        .end();
    unescape_js_string(&source[start..], start).map(Cow::Owned)
}

/// Undo JavaScript single-quoted string escaping up to the closing quote.
/// `base` is the offset of `body` in the file, for error messages.
fn unescape_js_string(body: &str, base: usize) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        match c {
            '\'' => return Ok(out),
            '\\' => {
                let Some((at, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    // line continuation
                    '\n' | '\u{2028}' | '\u{2029}' => {}
                    '\r' => {
                        if chars.peek().is_some_and(|(_, c)| *c == '\n') {
                            chars.next();
                        }
                    }
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'x' => out.push(hex_escape(&mut chars, 2, base + at)?),
                    'u' => out.push(hex_escape(&mut chars, 4, base + at)?),
                    other => out.push(other),
                }
            }
            _ => out.push(c),
        }
    }

    Err(IndexError::UnterminatedString(base))
}

fn hex_escape(chars: &mut Peekable<CharIndices<'_>>, digits: usize, offset: usize) -> Result<char> {
    let bad = |reason: &str| IndexError::BadEscape {
        offset,
        reason: reason.to_string(),
    };

    let mut code = 0u32;
    for _ in 0..digits {
        let (_, c) = chars.next().ok_or_else(|| bad("escape cut short"))?;
        let digit = c.to_digit(16).ok_or_else(|| bad("expected a hex digit"))?;
        code = code * 16 + digit;
    }
    char::from_u32(code).ok_or_else(|| bad("not a unicode scalar value"))
}

/// Parse the JSON payload into `(crate name, record)` pairs in file order.
/// The legacy object form is keyed by crate name and comes back sorted.
pub fn parse_records(json: &str) -> Result<Vec<(String, RawCrateData)>> {
    if json.trim_start().starts_with('{') {
        let map: BTreeMap<String, RawCrateData> = serde_json::from_str(json)?;
        return Ok(map.into_iter().collect());
    }
    Ok(serde_json::from_str(json)?)
}

/// Parse, validate and decode an index held in memory
pub fn load_str(source: &str) -> Result<SearchIndex> {
    let start = Instant::now();

    let json = extract_json(source)?;
    let records = parse_records(&json)?;
    let parse_time = start.elapsed();

    let issues = validate_all(&records);
    if has_errors(&issues) {
        let errors = issues
            .into_iter()
            .filter(|issue| issue.severity == Severity::Error)
            .collect();
        return Err(IndexError::Inconsistent(errors));
    }
    for issue in &issues {
        debug!("{}", issue);
    }

    let decode_start = Instant::now();
    let index = SearchIndex::from_validated_records(&records)?;

    debug!(
        crates = index.crates.len(),
        items = index.total_items(),
        parse = ?parse_time,
        decode = ?decode_start.elapsed(),
        "search index loaded"
    );

    Ok(index)
}

/// Load an index file from disk. Errors past reading the file are wrapped
/// in [`IndexError::InFile`].
pub fn load(path: &Path) -> Result<SearchIndex> {
    debug!(path = %path.display(), "reading search index");
    let source = read_index_file(path)?;
    load_str(&source).map_err(|source| IndexError::InFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = "var searchIndex = new Map(JSON.parse('[\\\n[\"demo\",{\"doc\":\"it\\'s\",\"t\":\"H\",\"n\":[\"run\"],\"q\":[[0,\"demo\"]],\"d\":[\"Runs \\\\\\\"fast\\\\\\\"\"],\"i\":[0],\"f\":\"`\",\"c\":[],\"p\":[],\"b\":[]}]\\\n]'));\nif (typeof exports !== 'undefined') exports.searchIndex = searchIndex;\n";

    #[test]
    fn test_extract_wrapped() {
        let json = extract_json(WRAPPED).unwrap();
        assert!(json.starts_with("[\n[\"demo\"") || json.starts_with("[[\"demo\""));
        assert!(json.contains("\"doc\":\"it's\""));
        assert!(json.ends_with("}]]"));
    }

    #[test]
    fn test_load_wrapped() {
        let index = load_str(WRAPPED).unwrap();
        let krate = index.get_crate("demo").unwrap();
        assert_eq!(krate.doc, "it's");
        assert_eq!(krate.items[0].desc, "Runs \"fast\"");
        assert_eq!(krate.full_path(0), "demo::run");
    }

    #[test]
    fn test_raw_json_and_legacy_object() {
        let raw = r#"[["a",{"t":"H","n":["x"],"d":[""],"i":[0],"f":"`"}]]"#;
        assert_eq!(load_str(raw).unwrap().crates[0].name, "a");

        let legacy = r#"{"b":{"t":"","n":[]},"a":{"t":"","n":[]}}"#;
        let names: Vec<_> = load_str(legacy)
            .unwrap()
            .crates
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(unescape_js_string(r"a\x41é\tb'", 0).unwrap(), "aAé\tb");
        assert_eq!(unescape_js_string("a\\\r\nb'", 0).unwrap(), "ab");
        assert!(matches!(
            unescape_js_string(r"\xZZ'", 0),
            Err(IndexError::BadEscape { .. })
        ));
        assert!(matches!(
            unescape_js_string("never closed", 7),
            Err(IndexError::UnterminatedString(7))
        ));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            load_str("console.log(1)"),
            Err(IndexError::WrapperNotFound)
        ));
        assert!(matches!(load_str("[[\"a\", 5]]"), Err(IndexError::Json(_))));
        assert!(matches!(
            load_str(r#"[["a",{"t":"HH","n":["x"]}]]"#),
            Err(IndexError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_deeply_nested_signature_is_reported() {
        let source = format!(
            r#"[["a",{{"t":"H","n":["x"],"d":[""],"i":[0],"f":"{}"}}]]"#,
            "{".repeat(200_000)
        );
        match load_str(&source) {
            Err(IndexError::Inconsistent(issues)) => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].message.contains("nesting too deep"));
            }
            other => panic!("expected an inconsistent index, got {other:?}"),
        }
    }

    #[test]
    fn test_gzip_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search-index.js.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(WRAPPED.as_bytes()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let index = load(&path).unwrap();
        assert_eq!(index.total_items(), 1);
    }

    #[test]
    fn test_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search-index.js");
        fs::write(&path, "console.log(1)").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
        match err {
            IndexError::InFile { source, .. } => {
                assert!(matches!(*source, IndexError::WrapperNotFound));
            }
            other => panic!("expected a file error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/definitely/not/here.js")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.js"));
    }
}
