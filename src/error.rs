use std::path::PathBuf;

use thiserror::Error;

use crate::index::validate::Issue;

pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress {}: {source}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no search index found: expected `JSON.parse('...')` or a raw JSON document")]
    WrapperNotFound,

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid escape sequence at offset {offset}: {reason}")]
    BadEscape { offset: usize, reason: String },

    #[error("invalid index JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crate `{crate_name}`: bad function signature data at offset {offset}: {reason}")]
    Signature {
        crate_name: String,
        offset: usize,
        reason: String,
    },

    #[error("index is inconsistent ({} issue(s)), first: {}", .0.len(), first_issue(.0))]
    Inconsistent(Vec<Issue>),

    #[error("failed to load {}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<IndexError>,
    },

    #[error("invalid query: {0}")]
    Query(String),
}

fn first_issue(issues: &[Issue]) -> String {
    issues
        .first()
        .map(|issue| issue.to_string())
        .unwrap_or_default()
}
