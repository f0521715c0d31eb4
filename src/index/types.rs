use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::signature::{FunctionSignature, decode_all};
use super::validate::{self, Severity};
use crate::error::{IndexError, Result};

/// Kind of an indexed item, in the order of the generator's kind codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Keyword,
    Primitive,
    Mod,
    ExternCrate,
    Import,
    Struct,
    Enum,
    Fn,
    Type,
    Static,
    Trait,
    Impl,
    TyMethod,
    Method,
    StructField,
    Variant,
    Macro,
    AssociatedType,
    Constant,
    AssociatedConstant,
    Union,
    ForeignType,
    Existential,
    Attr,
    Derive,
    TraitAlias,
    Generic,
}

impl ItemType {
    pub const ALL: [ItemType; 27] = [
        ItemType::Keyword,
        ItemType::Primitive,
        ItemType::Mod,
        ItemType::ExternCrate,
        ItemType::Import,
        ItemType::Struct,
        ItemType::Enum,
        ItemType::Fn,
        ItemType::Type,
        ItemType::Static,
        ItemType::Trait,
        ItemType::Impl,
        ItemType::TyMethod,
        ItemType::Method,
        ItemType::StructField,
        ItemType::Variant,
        ItemType::Macro,
        ItemType::AssociatedType,
        ItemType::Constant,
        ItemType::AssociatedConstant,
        ItemType::Union,
        ItemType::ForeignType,
        ItemType::Existential,
        ItemType::Attr,
        ItemType::Derive,
        ItemType::TraitAlias,
        ItemType::Generic,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Decode one character of the packed `t` string (`'A'` is code 0)
    pub fn from_char(c: char) -> Option<Self> {
        let code = (c as u32).checked_sub('A' as u32)?;
        u8::try_from(code).ok().and_then(Self::from_code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Keyword => "keyword",
            ItemType::Primitive => "primitive",
            ItemType::Mod => "mod",
            ItemType::ExternCrate => "externcrate",
            ItemType::Import => "import",
            ItemType::Struct => "struct",
            ItemType::Enum => "enum",
            ItemType::Fn => "fn",
            ItemType::Type => "type",
            ItemType::Static => "static",
            ItemType::Trait => "trait",
            ItemType::Impl => "impl",
            ItemType::TyMethod => "tymethod",
            ItemType::Method => "method",
            ItemType::StructField => "structfield",
            ItemType::Variant => "variant",
            ItemType::Macro => "macro",
            ItemType::AssociatedType => "associatedtype",
            ItemType::Constant => "constant",
            ItemType::AssociatedConstant => "associatedconstant",
            ItemType::Union => "union",
            ItemType::ForeignType => "foreigntype",
            ItemType::Existential => "existential",
            ItemType::Attr => "attr",
            ItemType::Derive => "derive",
            ItemType::TraitAlias => "traitalias",
            ItemType::Generic => "generic",
        }
    }

    /// Whether items of this kind can own fields, variants or methods
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ItemType::Struct
                | ItemType::Enum
                | ItemType::Union
                | ItemType::Trait
                | ItemType::Primitive
                | ItemType::ForeignType
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw records, as serialized by the generator
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCrateData {
    #[serde(default)]
    pub doc: String,
    pub t: String,
    pub n: Vec<String>,
    #[serde(default)]
    pub q: Vec<(usize, String)>,
    #[serde(default)]
    pub d: Vec<String>,
    #[serde(default)]
    pub i: Vec<usize>,
    #[serde(default)]
    pub f: String,
    #[serde(default)]
    pub c: Vec<usize>,
    #[serde(default)]
    pub p: Vec<RawPath>,
    #[serde(default)]
    pub b: Vec<(usize, String)>,
}

/// One `p` entry: `[kind, name, path?, exact_path?]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPath {
    pub kind: u8,
    pub name: String,
    pub path: Option<usize>,
    pub exact_path: Option<usize>,
}

impl<'de> Deserialize<'de> for RawPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RawPathVisitor;

        impl<'de> Visitor<'de> for RawPathVisitor {
            type Value = RawPath;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array [kind, name, path?, exact_path?]")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<RawPath, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let kind = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let name = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let path = seq.next_element::<Option<usize>>()?.flatten();
                let exact_path = seq.next_element::<Option<usize>>()?.flatten();
                while seq.next_element::<IgnoredAny>()?.is_some() {}

                Ok(RawPath {
                    kind,
                    name,
                    path,
                    exact_path,
                })
            }
        }

        deserializer.deserialize_seq(RawPathVisitor)
    }
}

// ============================================================================
// Decoded index
// ============================================================================

/// A type referenced by the index: a parent of some item or a signature type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEntry {
    pub ty: ItemType,
    pub name: String,
    pub path: Option<String>,
    pub exact_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub ty: ItemType,
    /// Module path the item lives in
    pub path: String,
    /// Index into [`CrateIndex::paths`]
    pub parent: Option<usize>,
    pub desc: String,
    pub deprecated: bool,
    pub signature: Option<FunctionSignature>,
    pub disambiguator: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CrateIndex {
    pub name: String,
    pub doc: String,
    pub items: Vec<Item>,
    pub paths: Vec<PathEntry>,
    /// Lowercase item name to item indices
    by_name: HashMap<String, Vec<usize>>,
    /// Full path to the first item with that path
    by_path: HashMap<String, usize>,
}

impl CrateIndex {
    /// Decode a raw record. Records with validation errors are rejected.
    pub fn decode(name: &str, raw: &RawCrateData) -> Result<Self> {
        let errors: Vec<_> = validate::validate(name, raw)
            .into_iter()
            .filter(|issue| issue.severity == Severity::Error)
            .collect();
        if !errors.is_empty() {
            return Err(IndexError::Inconsistent(errors));
        }
        Self::decode_validated(name, raw)
    }

    /// Decode a record that has already passed validation. Malformed input
    /// still surfaces as an error, only less precisely.
    pub(crate) fn decode_validated(name: &str, raw: &RawCrateData) -> Result<Self> {
        let item_paths: HashMap<usize, &str> =
            raw.q.iter().map(|(idx, path)| (*idx, path.as_str())).collect();
        let paths = resolve_paths(&raw.p, &item_paths);
        let signatures = decode_all(name, &raw.f, raw.n.len(), paths.len())?;
        let deprecated: HashSet<usize> = raw.c.iter().copied().collect();
        let disambiguators: HashMap<usize, &str> =
            raw.b.iter().map(|(idx, d)| (*idx, d.as_str())).collect();

        let mut items = Vec::with_capacity(raw.n.len());
        let mut last_path = name;
        for (idx, ((code, item_name), signature)) in raw
            .t
            .chars()
            .zip(&raw.n)
            .zip(signatures)
            .enumerate()
        {
            if let Some(path) = item_paths.get(&idx) {
                last_path = *path;
            }
            let ty = ItemType::from_char(code).ok_or_else(|| {
                IndexError::Inconsistent(vec![validate::Issue::error(
                    name,
                    format!("item {idx} has unknown kind code {code:?}"),
                )])
            })?;
            let parent = match raw.i.get(idx).copied().unwrap_or(0) {
                0 => None,
                k => Some(k - 1),
            };

            items.push(Item {
                name: item_name.clone(),
                ty,
                path: last_path.to_string(),
                parent,
                desc: raw.d.get(idx).cloned().unwrap_or_default(),
                deprecated: deprecated.contains(&idx),
                signature,
                disambiguator: disambiguators.get(&idx).map(|d| d.to_string()),
            });
        }

        let mut index = CrateIndex {
            name: name.to_string(),
            doc: raw.doc.clone(),
            items,
            paths,
            by_name: HashMap::new(),
            by_path: HashMap::new(),
        };
        index.build_lookups();
        Ok(index)
    }

    fn build_lookups(&mut self) {
        for idx in 0..self.items.len() {
            self.by_name
                .entry(self.items[idx].name.to_lowercase())
                .or_default()
                .push(idx);
            let full = self.full_path(idx);
            self.by_path.entry(full).or_insert(idx);
        }
    }

    /// `module::Parent::name` for the item at `idx`
    pub fn full_path(&self, idx: usize) -> String {
        let item = &self.items[idx];
        match self.parent_of(item) {
            Some(parent) => format!("{}::{}::{}", item.path, parent.name, item.name),
            None => format!("{}::{}", item.path, item.name),
        }
    }

    pub fn parent_of(&self, item: &Item) -> Option<&PathEntry> {
        item.parent.and_then(|p| self.paths.get(p))
    }

    /// Look up an item by its full path (case-sensitive)
    pub fn find_by_path(&self, full_path: &str) -> Option<usize> {
        self.by_path.get(full_path).copied()
    }

    /// Indices of items with the given name (case-insensitive)
    pub fn items_named(&self, name: &str) -> &[usize] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The `paths` entry describing the item at `idx`, when it owns children
    pub fn path_entry_for(&self, idx: usize) -> Option<usize> {
        let item = &self.items[idx];
        if !item.ty.is_container() {
            return None;
        }
        self.paths.iter().position(|entry| {
            entry.ty == item.ty
                && entry.name == item.name
                && entry.path.as_deref() == Some(item.path.as_str())
        })
    }

    /// Items whose parent is the `paths` entry `parent`
    pub fn children(&self, parent: usize) -> impl Iterator<Item = (usize, &Item)> {
        self.items
            .iter()
            .enumerate()
            .filter(move |(_, item)| item.parent == Some(parent))
    }

    pub fn kind_counts(&self) -> BTreeMap<ItemType, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.ty).or_insert(0) += 1;
        }
        counts
    }

    /// Rendered signature of the item at `idx`, if it has one
    pub fn render_signature(&self, idx: usize) -> Option<String> {
        let item = &self.items[idx];
        item.signature
            .as_ref()
            .map(|sig| sig.render(&item.name, &self.paths))
    }
}

/// Resolve `p` entries against the `q` table. An entry without a path
/// index keeps `None`; an entry whose index is missing from `q` inherits the
/// previous entry's path.
fn resolve_paths(raw: &[RawPath], item_paths: &HashMap<usize, &str>) -> Vec<PathEntry> {
    let mut last_path: Option<String> = None;
    raw.iter()
        .map(|entry| {
            let mut path = None;
            if let Some(idx) = entry.path {
                path = item_paths
                    .get(&idx)
                    .map(|p| p.to_string())
                    .or_else(|| last_path.clone());
                last_path = path.clone();
            }
            let exact_path = match entry.exact_path {
                Some(idx) => item_paths.get(&idx).map(|p| p.to_string()),
                None => path.clone(),
            };
            PathEntry {
                ty: ItemType::from_code(entry.kind).unwrap_or(ItemType::Type),
                name: entry.name.clone(),
                path,
                exact_path,
            }
        })
        .collect()
}

/// All crates of one index file, in file order
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    pub crates: Vec<CrateIndex>,
}

impl SearchIndex {
    pub fn from_records(records: &[(String, RawCrateData)]) -> Result<Self> {
        let crates = records
            .iter()
            .map(|(name, raw)| CrateIndex::decode(name, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchIndex { crates })
    }

    /// Like [`SearchIndex::from_records`], for records already checked with
    /// [`validate::validate_all`]
    pub(crate) fn from_validated_records(records: &[(String, RawCrateData)]) -> Result<Self> {
        let crates = records
            .iter()
            .map(|(name, raw)| CrateIndex::decode_validated(name, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchIndex { crates })
    }

    pub fn get_crate(&self, name: &str) -> Option<&CrateIndex> {
        self.crates.iter().find(|c| c.name == name)
    }

    pub fn total_items(&self) -> usize {
        self.crates.iter().map(|c| c.items.len()).sum()
    }

    /// Look up an item by full path across all crates
    pub fn find_by_path(&self, full_path: &str) -> Option<(&CrateIndex, usize)> {
        self.crates
            .iter()
            .find_map(|krate| krate.find_by_path(full_path).map(|idx| (krate, idx)))
    }
}
