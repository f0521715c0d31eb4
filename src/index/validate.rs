//! Self-consistency checks for raw index records

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::signature::decode_all;
use super::types::{ItemType, RawCrateData};
use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub crate_name: String,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn error(crate_name: &str, message: String) -> Self {
        Issue {
            crate_name: crate_name.to_string(),
            severity: Severity::Error,
            message,
        }
    }

    pub fn warning(crate_name: &str, message: String) -> Self {
        Issue {
            crate_name: crate_name.to_string(),
            severity: Severity::Warning,
            message,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{}] {}: {}", self.crate_name, severity, self.message)
    }
}

pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(|issue| issue.severity == Severity::Error)
}

/// Check one crate record
pub fn validate(crate_name: &str, raw: &RawCrateData) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut error = |message: String| issues.push(Issue::error(crate_name, message));

    let count = raw.n.len();
    let kinds = raw.t.chars().count();
    if kinds != count {
        error(format!("{kinds} kind codes for {count} names"));
    }
    if raw.d.len() != count {
        error(format!("{} descriptions for {count} names", raw.d.len()));
    }
    if raw.i.len() != count {
        error(format!("{} parent links for {count} names", raw.i.len()));
    }

    for (idx, code) in raw.t.chars().enumerate() {
        if ItemType::from_char(code).is_none() {
            error(format!("item {idx} has unknown kind code {code:?}"));
        }
    }
    for (idx, entry) in raw.p.iter().enumerate() {
        if ItemType::from_code(entry.kind).is_none() {
            error(format!(
                "path entry {idx} (`{}`) has unknown kind code {}",
                entry.name, entry.kind
            ));
        }
    }

    for (idx, parent) in raw.i.iter().enumerate() {
        if *parent > raw.p.len() {
            error(format!(
                "item {idx} links to parent {parent}, but only {} path entries exist",
                raw.p.len()
            ));
        }
    }

    for idx in &raw.c {
        if *idx >= count {
            error(format!("deprecated item {idx} does not exist"));
        }
    }
    for (idx, _) in &raw.b {
        if *idx >= count {
            error(format!("disambiguated item {idx} does not exist"));
        }
    }

    if let Err(err) = decode_all(crate_name, &raw.f, count, raw.p.len()) {
        let message = match err {
            IndexError::Signature { offset, reason, .. } => {
                format!("function signatures at offset {offset}: {reason}")
            }
            other => other.to_string(),
        };
        error(message);
    }

    let mut previous: Option<usize> = None;
    for (idx, _) in &raw.q {
        if previous.is_some_and(|p| *idx <= p) {
            issues.push(Issue::warning(
                crate_name,
                format!("path table index {idx} is out of order"),
            ));
        }
        previous = Some(*idx);
    }

    let known: HashSet<usize> = raw.q.iter().map(|(idx, _)| *idx).collect();
    for (idx, entry) in raw.p.iter().enumerate() {
        for path in [entry.path, entry.exact_path].into_iter().flatten() {
            if !known.contains(&path) {
                issues.push(Issue::warning(
                    crate_name,
                    format!(
                        "path entry {idx} (`{}`) refers to missing path {path}",
                        entry.name
                    ),
                ));
            }
        }
    }

    issues
}

/// Check every record of an index file, including cross-record properties
pub fn validate_all(records: &[(String, RawCrateData)]) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (name, raw) in records {
        if name.is_empty() {
            issues.push(Issue::warning(name, "crate has an empty name".to_string()));
        }
        let occurrences = seen.entry(name.as_str()).or_insert(0);
        *occurrences += 1;
        if *occurrences == 2 {
            issues.push(Issue::warning(
                name,
                "crate appears more than once".to_string(),
            ));
        }
        issues.extend(validate(name, raw));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::RawPath;

    fn record() -> RawCrateData {
        RawCrateData {
            t: "FH".to_string(),
            n: vec!["Thing".to_string(), "make".to_string()],
            q: vec![(0, "demo".to_string())],
            d: vec!["".to_string(), "".to_string()],
            i: vec![0, 0],
            f: "`{{}b}".to_string(),
            p: vec![RawPath {
                kind: 5,
                name: "Thing".to_string(),
                path: Some(0),
                exact_path: None,
            }],
            ..RawCrateData::default()
        }
    }

    fn messages(issues: &[Issue]) -> Vec<String> {
        issues.iter().map(|i| i.message.clone()).collect()
    }

    #[test]
    fn test_consistent_record() {
        assert!(validate("demo", &record()).is_empty());
    }

    #[test]
    fn test_length_mismatches() {
        let mut raw = record();
        raw.t.push('H');
        raw.d.pop();
        let issues = validate("demo", &raw);
        assert!(has_errors(&issues));
        let messages = messages(&issues);
        assert!(messages.contains(&"3 kind codes for 2 names".to_string()));
        assert!(messages.contains(&"1 descriptions for 2 names".to_string()));
    }

    #[test]
    fn test_bad_codes_and_links() {
        let mut raw = record();
        raw.t = "F~".to_string();
        raw.i = vec![0, 2];
        raw.c = vec![5];
        let issues = validate("demo", &raw);
        let messages = messages(&issues);
        assert!(messages.iter().any(|m| m.contains("unknown kind code '~'")));
        assert!(messages.iter().any(|m| m.contains("links to parent 2")));
        assert!(messages.iter().any(|m| m.contains("deprecated item 5")));
    }

    #[test]
    fn test_truncated_signatures() {
        let mut raw = record();
        raw.f = "`".to_string();
        let issues = validate("demo", &raw);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("function signatures"));
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let mut raw = record();
        raw.q.push((0, "again".to_string()));
        raw.p[0].path = Some(7);
        let issues = validate("demo", &raw);
        assert!(!has_errors(&issues));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_duplicate_crates() {
        let records = vec![
            ("demo".to_string(), record()),
            ("demo".to_string(), record()),
        ];
        let issues = validate_all(&records);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].to_string(), "[demo] warning: crate appears more than once");
    }
}
