//! Query parsing and ranking over a loaded [`SearchIndex`]

use serde::Serialize;
use std::cmp::Ordering;

use crate::error::{IndexError, Result};
use crate::index::{CrateIndex, Item, ItemType, SearchIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub raw: String,
    /// Kinds accepted by a `kind:` prefix
    pub kinds: Option<Vec<ItemType>>,
    /// Leading `a::b::` components, lowercase
    pub path: Vec<String>,
    /// Item name, lowercase; empty for signature queries
    pub name: String,
    /// `"quoted"` names only match exactly
    pub exact: bool,
    pub signature: Option<SignatureQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureQuery {
    pub inputs: Vec<String>,
    pub output: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Only search these crates; empty searches all
    pub crate_filter: Vec<String>,
    /// Maximum number of hits; 0 is unlimited
    pub limit: usize,
    /// Edit distance cap for fuzzy matches; defaults to a third of the query
    pub max_distance: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            crate_filter: Vec::new(),
            limit: 20,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
    Fuzzy,
    Signature,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "crate")]
    pub crate_name: String,
    /// Index of the item within its crate
    pub item: usize,
    pub path: String,
    pub kind: ItemType,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
    pub distance: usize,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub deprecated: bool,
}

/// Item kinds named by a `kind:` filter. Some filters cover several kinds.
pub fn kind_filter(name: &str) -> Option<Vec<ItemType>> {
    let kinds = match name.to_ascii_lowercase().as_str() {
        "fn" | "function" => vec![ItemType::Fn, ItemType::Method, ItemType::TyMethod],
        "const" => vec![ItemType::Constant, ItemType::AssociatedConstant],
        "field" => vec![ItemType::StructField],
        "module" => vec![ItemType::Mod],
        "type" => vec![ItemType::Type, ItemType::AssociatedType],
        other => vec![ItemType::from_name(other)?],
    };
    Some(kinds)
}

impl Query {
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(IndexError::Query("empty query".to_string()));
        }

        let (kinds, rest) = split_kind(raw)?;

        if let Some((inputs, output)) = rest.split_once("->") {
            let signature = SignatureQuery {
                inputs: type_names(inputs),
                output: type_names(output),
            };
            if signature.inputs.is_empty() && signature.output.is_empty() {
                return Err(IndexError::Query(
                    "signature query needs at least one type name".to_string(),
                ));
            }
            return Ok(Query {
                raw: raw.to_string(),
                kinds,
                path: Vec::new(),
                name: String::new(),
                exact: false,
                signature: Some(signature),
            });
        }

        let (exact, rest) = match rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            Some(inner) => (true, inner),
            None => (false, rest),
        };

        let mut components: Vec<String> = rest
            .split("::")
            .map(|part| part.trim().to_lowercase())
            .collect();
        if components.iter().any(|part| part.is_empty()) {
            return Err(IndexError::Query(format!("empty path component in `{raw}`")));
        }
        if components.iter().any(|part| part.contains(char::is_whitespace)) {
            return Err(IndexError::Query(format!("unexpected whitespace in `{raw}`")));
        }
        let name = components.pop().unwrap_or_default();

        Ok(Query {
            raw: raw.to_string(),
            kinds,
            path: components,
            name,
            exact,
            signature: None,
        })
    }

    fn accepts_kind(&self, ty: ItemType) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&ty))
    }
}

/// Split a leading `kind:` filter off the query; `a::b` is not a filter
fn split_kind(raw: &str) -> Result<(Option<Vec<ItemType>>, &str)> {
    let Some(colon) = raw.find(':') else {
        return Ok((None, raw));
    };
    if raw[colon + 1..].starts_with(':') {
        return Ok((None, raw));
    }

    let label = raw[..colon].trim();
    let kinds = kind_filter(label)
        .ok_or_else(|| IndexError::Query(format!("unknown item kind `{label}`")))?;
    let rest = raw[colon + 1..].trim();
    if rest.is_empty() {
        return Err(IndexError::Query(format!("nothing to search for after `{label}:`")));
    }
    Ok((Some(kinds), rest))
}

fn type_names(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Run a query and return hits, best first
pub fn run(index: &SearchIndex, query: &Query, options: &SearchOptions) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let crates = index.crates.iter().filter(|krate| {
        options.crate_filter.is_empty() || options.crate_filter.iter().any(|c| *c == krate.name)
    });

    for krate in crates {
        for (idx, item) in krate.items.iter().enumerate() {
            if !query.accepts_kind(item.ty) {
                continue;
            }
            let full_path = krate.full_path(idx);
            if !path_matches(&query.path, &full_path) {
                continue;
            }

            let scored = match &query.signature {
                Some(signature) => score_signature(signature, item, krate),
                None => score_name(query, item, options.max_distance),
            };
            let Some((match_kind, distance)) = scored else {
                continue;
            };

            hits.push(SearchHit {
                crate_name: krate.name.clone(),
                item: idx,
                path: full_path,
                kind: item.ty,
                match_kind,
                distance,
                description: item.desc.clone(),
                signature: krate.render_signature(idx),
                deprecated: item.deprecated,
            });
        }
    }

    hits.sort_by(compare_hits);
    if options.limit > 0 {
        hits.truncate(options.limit);
    }
    hits
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.match_kind
        .cmp(&b.match_kind)
        .then(a.distance.cmp(&b.distance))
        .then(a.path.len().cmp(&b.path.len()))
        .then_with(|| a.path.cmp(&b.path))
}

/// Leading query components must appear, in order, among the item's path
/// segments (the last segment is the item name and is not considered)
fn path_matches(components: &[String], full_path: &str) -> bool {
    if components.is_empty() {
        return true;
    }
    let mut segments: Vec<String> = full_path.split("::").map(str::to_lowercase).collect();
    segments.pop();

    let mut segments = segments.iter();
    components
        .iter()
        .all(|component| segments.any(|segment| segment == component))
}

fn score_name(query: &Query, item: &Item, max_distance: Option<usize>) -> Option<(MatchKind, usize)> {
    let name = item.name.to_lowercase();
    let wanted = &query.name;

    if name == *wanted {
        return Some((MatchKind::Exact, 0));
    }
    if query.exact {
        return None;
    }

    let extra = name.chars().count().saturating_sub(wanted.chars().count());
    if name.starts_with(wanted.as_str()) {
        return Some((MatchKind::Prefix, extra));
    }
    if name.contains(wanted.as_str()) {
        return Some((MatchKind::Substring, extra));
    }

    let cap = max_distance.unwrap_or(wanted.chars().count() / 3);
    if cap == 0 {
        return None;
    }
    let distance = edit_distance(wanted, &name);
    (distance <= cap).then_some((MatchKind::Fuzzy, distance))
}

fn score_signature(
    query: &SignatureQuery,
    item: &Item,
    krate: &CrateIndex,
) -> Option<(MatchKind, usize)> {
    let signature = item.signature.as_ref()?;
    let inputs = signature.input_names(&krate.paths);
    let output = signature.output_names(&krate.paths);

    let found = query.inputs.iter().all(|name| inputs.contains(name))
        && query.output.iter().all(|name| output.contains(name));
    if !found {
        return None;
    }

    let extra = (inputs.len() + output.len()).saturating_sub(query.inputs.len() + query.output.len());
    Some((MatchKind::Signature, extra))
}

/// Close item names for a lookup that found nothing, as full paths
pub fn suggest(index: &SearchIndex, name: &str) -> Vec<String> {
    let wanted = name.rsplit("::").next().unwrap_or(name).to_lowercase();

    let mut scored: Vec<(usize, String)> = index
        .crates
        .iter()
        .flat_map(|krate| {
            krate.items.iter().enumerate().filter_map(|(idx, item)| {
                let distance = edit_distance(&wanted, &item.name.to_lowercase());
                (distance <= 2).then(|| (distance, krate.full_path(idx)))
            })
        })
        .collect();

    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(5).map(|(_, path)| path).collect()
}

/// Levenshtein distance between two strings, by characters
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let s1: Vec<char> = s1.chars().collect();
    let s2: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=s2.len()).collect();
    let mut current = vec![0; s2.len() + 1];

    for i in 1..=s1.len() {
        current[0] = i;
        for j in 1..=s2.len() {
            let cost = if s1[i - 1] == s2[j - 1] { 0 } else { 1 };
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::load_str;

    const INDEX: &str = r#"[["shapes",{"t":"FONNHGP","n":["Circle","radius","area","scale","circle","Shape","Circle"],
        "q":[[0,"shapes"],[7,"core::primitive"]],
        "d":["A circle","","Area of the circle","","Build a circle","","A circle shape"],
        "i":[0,1,1,1,0,0,3],
        "f":"``{bd}{{bd}b}{db}``",
        "c":[3],
        "p":[[5,"Circle",0],[1,"f64",7],[6,"Shape",0]]}]]"#;

    fn index() -> SearchIndex {
        load_str(INDEX).unwrap()
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.path.as_str()).collect()
    }

    #[test]
    fn test_parse_plain_and_kind() {
        let query = Query::parse("  fn:Circle ").unwrap();
        assert_eq!(query.name, "circle");
        assert_eq!(
            query.kinds,
            Some(vec![ItemType::Fn, ItemType::Method, ItemType::TyMethod])
        );

        let query = Query::parse("shapes::Circle::area").unwrap();
        assert_eq!(query.path, vec!["shapes", "circle"]);
        assert_eq!(query.name, "area");
        assert!(query.kinds.is_none());

        assert!(Query::parse("\"Circle\"").unwrap().exact);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Query::parse("   ").is_err());
        assert!(Query::parse("gadget:Circle").is_err());
        assert!(Query::parse("fn:").is_err());
        assert!(Query::parse("a::::b").is_err());
        assert!(Query::parse("two words").is_err());
        assert!(Query::parse("->").is_err());
    }

    #[test]
    fn test_parse_signature() {
        let query = Query::parse("Circle, f64 -> Result<Circle>").unwrap();
        let signature = query.signature.unwrap();
        assert_eq!(signature.inputs, vec!["circle", "f64"]);
        assert_eq!(signature.output, vec!["result", "circle"]);
    }

    #[test]
    fn test_ranking_order() {
        let hits = run(&index(), &Query::parse("circle").unwrap(), &SearchOptions::default());
        assert_eq!(
            paths(&hits),
            vec![
                "shapes::Circle",
                "shapes::circle",
                "shapes::Shape::Circle"
            ]
        );
        assert!(hits.iter().all(|h| h.match_kind == MatchKind::Exact));

        let hits = run(&index(), &Query::parse("are").unwrap(), &SearchOptions::default());
        assert_eq!(paths(&hits), vec!["shapes::Circle::area"]);
        assert_eq!(hits[0].match_kind, MatchKind::Prefix);
    }

    #[test]
    fn test_substring_and_fuzzy() {
        let hits = run(&index(), &Query::parse("ircl").unwrap(), &SearchOptions::default());
        assert!(hits.iter().all(|h| h.match_kind == MatchKind::Substring));

        let hits = run(&index(), &Query::parse("radios").unwrap(), &SearchOptions::default());
        assert_eq!(paths(&hits), vec!["shapes::Circle::radius"]);
        assert_eq!(hits[0].match_kind, MatchKind::Fuzzy);
        assert_eq!(hits[0].distance, 1);

        let strict = SearchOptions {
            max_distance: Some(0),
            ..SearchOptions::default()
        };
        assert!(run(&index(), &Query::parse("radios").unwrap(), &strict).is_empty());
    }

    #[test]
    fn test_filters() {
        let hits = run(&index(), &Query::parse("fn:circle").unwrap(), &SearchOptions::default());
        assert_eq!(paths(&hits), vec!["shapes::circle"]);

        let hits = run(
            &index(),
            &Query::parse("shape::circle").unwrap(),
            &SearchOptions::default(),
        );
        assert_eq!(paths(&hits), vec!["shapes::Shape::Circle"]);

        let other_crate = SearchOptions {
            crate_filter: vec!["other".to_string()],
            ..SearchOptions::default()
        };
        assert!(run(&index(), &Query::parse("circle").unwrap(), &other_crate).is_empty());

        let limited = SearchOptions {
            limit: 1,
            ..SearchOptions::default()
        };
        assert_eq!(run(&index(), &Query::parse("circle").unwrap(), &limited).len(), 1);
    }

    #[test]
    fn test_signature_search() {
        let hits = run(&index(), &Query::parse("-> f64").unwrap(), &SearchOptions::default());
        assert_eq!(paths(&hits), vec!["shapes::Circle::area"]);
        assert_eq!(
            hits[0].signature.as_deref(),
            Some("fn area(Circle) -> f64")
        );

        let hits = run(
            &index(),
            &Query::parse("circle -> circle").unwrap(),
            &SearchOptions::default(),
        );
        assert_eq!(paths(&hits), vec!["shapes::Circle::scale"]);
        assert!(hits[0].deprecated);
    }

    #[test]
    fn test_suggest() {
        let suggestions = suggest(&index(), "shapes::Cirle");
        assert_eq!(
            suggestions,
            vec!["shapes::Circle", "shapes::Shape::Circle", "shapes::circle"]
        );
        assert!(suggest(&index(), "zzzzzzzz").is_empty());
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }
}
