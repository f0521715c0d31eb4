//! Decoder for the compressed function-signature string (`f`).
//!
//! Every item contributes one entry. An entry is either the "no signature"
//! marker `` ` ``, a one-character back-reference to one of the last sixteen
//! decoded entries (`'0'` is the most recent), or a freshly encoded value.
//!
//! Values are nested lists (`{` ... `}`) of integers. Integers are written as
//! variable-length hex: characters in `@..=O` carry a nibble and continue,
//! characters in `` `..=o `` carry the last nibble. The lowest bit of the
//! result is the sign.

use serde::Serialize;
use std::collections::VecDeque;

use super::types::{ItemType, PathEntry};
use crate::error::{IndexError, Result};

const BACKREF_SLOTS: usize = 16;
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    List(Vec<Value>),
}

#[derive(Debug)]
pub struct DecodeError {
    pub offset: usize,
    pub reason: String,
}

pub struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
    backrefs: VecDeque<Value>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a str) -> Self {
        Decoder {
            bytes: data.as_bytes(),
            offset: 0,
            backrefs: VecDeque::with_capacity(BACKREF_SLOTS + 1),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_finished(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    /// Decode the next item's entry; `None` means the item has no signature
    pub fn next_entry(&mut self) -> std::result::Result<Option<Value>, DecodeError> {
        let c = self.peek()?;
        match c {
            b'0'..=b'?' => {
                let slot = (c - b'0') as usize;
                let value = self.backrefs.get(slot).cloned().ok_or_else(|| {
                    self.error(format!("back-reference to empty slot {slot}"))
                })?;
                self.offset += 1;
                Ok(Some(value))
            }
            b'`' => {
                self.offset += 1;
                Ok(None)
            }
            _ => {
                let value = self.decode(0)?;
                self.backrefs.push_front(value.clone());
                self.backrefs.truncate(BACKREF_SLOTS);
                Ok(Some(value))
            }
        }
    }

    fn decode(&mut self, depth: usize) -> std::result::Result<Value, DecodeError> {
        if self.peek()? == b'{' {
            if depth >= MAX_NESTING {
                return Err(self.error("signature nesting too deep".to_string()));
            }
            self.offset += 1;
            return self.decode_list(depth + 1);
        }

        let mut n: i64 = 0;
        loop {
            let c = self.peek()?;
            n = n
                .checked_mul(16)
                .ok_or_else(|| self.error("integer overflow".to_string()))?
                | i64::from(c & 0xF);
            match c {
                b'@'..=b'O' => self.offset += 1,
                b'`'..=b'o' => {
                    self.offset += 1;
                    break;
                }
                _ => return Err(self.error(format!("unexpected character {:?}", c as char))),
            }
        }

        let magnitude = n >> 1;
        Ok(Value::Int(if n & 1 == 1 { -magnitude } else { magnitude }))
    }

    fn decode_list(&mut self, depth: usize) -> std::result::Result<Value, DecodeError> {
        let mut values = Vec::new();
        loop {
            if self.peek()? == b'}' {
                self.offset += 1;
                return Ok(Value::List(values));
            }
            values.push(self.decode(depth)?);
        }
    }

    fn peek(&self) -> std::result::Result<u8, DecodeError> {
        self.bytes
            .get(self.offset)
            .copied()
            .ok_or_else(|| self.error("unexpected end of signature data".to_string()))
    }

    fn error(&self, reason: String) -> DecodeError {
        DecodeError {
            offset: self.offset,
            reason,
        }
    }
}

// ============================================================================
// Typed signatures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeId {
    /// Generic parameter, numbered from 1
    Generic(usize),
    Unknown,
    /// Index into the crate's path table
    Path(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeNode {
    pub id: TypeId,
    pub generics: Vec<TypeNode>,
    pub bindings: Vec<(TypeNode, Vec<TypeNode>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub inputs: Vec<TypeNode>,
    pub output: Vec<TypeNode>,
    /// Bounds of generic parameter `n` live at `where_clauses[n - 1]`
    pub where_clauses: Vec<Vec<TypeNode>>,
}

impl FunctionSignature {
    /// Build a signature from a decoded entry. `path_count` bounds type ids.
    pub fn from_value(value: &Value, path_count: usize) -> std::result::Result<Self, String> {
        let Value::List(parts) = value else {
            return Err("signature entry must be a list".to_string());
        };
        let mut parts = parts.iter();
        let inputs = match parts.next() {
            Some(part) => build_types(part, path_count)?,
            None => Vec::new(),
        };
        let output = match parts.next() {
            Some(part) => build_types(part, path_count)?,
            None => Vec::new(),
        };
        let where_clauses = parts
            .map(|part| build_types(part, path_count))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(FunctionSignature {
            inputs,
            output,
            where_clauses,
        })
    }

    pub fn render(&self, name: &str, paths: &[PathEntry]) -> String {
        let inputs = render_list(&self.inputs, paths);
        let mut rendered = format!("fn {name}({inputs})");

        match self.output.as_slice() {
            [] => {}
            [single] => {
                rendered.push_str(" -> ");
                rendered.push_str(&render_type(single, paths));
            }
            many => {
                rendered.push_str(&format!(" -> ({})", render_list(many, paths)));
            }
        }

        let bounds: Vec<String> = self
            .where_clauses
            .iter()
            .enumerate()
            .filter(|(_, bounds)| !bounds.is_empty())
            .map(|(idx, bounds)| {
                let rendered: Vec<String> = bounds.iter().map(|b| render_type(b, paths)).collect();
                format!("{}: {}", generic_name(idx + 1), rendered.join(" + "))
            })
            .collect();
        if !bounds.is_empty() {
            rendered.push_str(" where ");
            rendered.push_str(&bounds.join(", "));
        }

        rendered
    }

    /// Lowercase names of every type mentioned by the inputs
    pub fn input_names(&self, paths: &[PathEntry]) -> Vec<String> {
        let mut names = Vec::new();
        for ty in &self.inputs {
            self.collect_names(ty, paths, &mut names, &mut Vec::new());
        }
        names
    }

    /// Lowercase names of every type mentioned by the output
    pub fn output_names(&self, paths: &[PathEntry]) -> Vec<String> {
        let mut names = Vec::new();
        for ty in &self.output {
            self.collect_names(ty, paths, &mut names, &mut Vec::new());
        }
        names
    }

    /// `expanding` holds the generic parameters whose bounds are being
    /// walked; a bound may mention its own parameter.
    fn collect_names(
        &self,
        ty: &TypeNode,
        paths: &[PathEntry],
        out: &mut Vec<String>,
        expanding: &mut Vec<usize>,
    ) {
        match ty.id {
            TypeId::Path(idx) => {
                if let Some(entry) = paths.get(idx) {
                    out.push(entry.name.to_lowercase());
                }
            }
            TypeId::Generic(n) if !expanding.contains(&n) => {
                if let Some(bounds) = self.where_clauses.get(n - 1) {
                    expanding.push(n);
                    for bound in bounds {
                        self.collect_names(bound, paths, out, expanding);
                    }
                    expanding.pop();
                }
            }
            TypeId::Generic(_) => {}
            TypeId::Unknown => {}
        }
        for generic in &ty.generics {
            self.collect_names(generic, paths, out, expanding);
        }
        for (_, constraints) in &ty.bindings {
            for constraint in constraints {
                self.collect_names(constraint, paths, out, expanding);
            }
        }
    }
}

fn build_types(value: &Value, path_count: usize) -> std::result::Result<Vec<TypeNode>, String> {
    match value {
        Value::Int(_) => Ok(vec![build_type(value, path_count)?]),
        Value::List(items) => items.iter().map(|v| build_type(v, path_count)).collect(),
    }
}

fn build_type(value: &Value, path_count: usize) -> std::result::Result<TypeNode, String> {
    match value {
        Value::Int(id) => Ok(TypeNode {
            id: type_id(*id, path_count)?,
            generics: Vec::new(),
            bindings: Vec::new(),
        }),
        Value::List(parts) => {
            let Some(Value::Int(id)) = parts.first() else {
                return Err("type entry must start with a type id".to_string());
            };
            let generics = match parts.get(1) {
                Some(generics) => build_types(generics, path_count)?,
                None => Vec::new(),
            };
            let bindings = match parts.get(2) {
                Some(Value::List(bindings)) => bindings
                    .iter()
                    .map(|binding| build_binding(binding, path_count))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                Some(Value::Int(_)) => return Err("type bindings must be a list".to_string()),
                None => Vec::new(),
            };
            Ok(TypeNode {
                id: type_id(*id, path_count)?,
                generics,
                bindings,
            })
        }
    }
}

fn build_binding(
    value: &Value,
    path_count: usize,
) -> std::result::Result<(TypeNode, Vec<TypeNode>), String> {
    match value {
        Value::List(parts) if parts.len() == 2 => Ok((
            build_type(&parts[0], path_count)?,
            build_types(&parts[1], path_count)?,
        )),
        _ => Err("binding must be [assoc_type, constraints]".to_string()),
    }
}

fn type_id(id: i64, path_count: usize) -> std::result::Result<TypeId, String> {
    match id {
        0 => Ok(TypeId::Unknown),
        id if id < 0 => Ok(TypeId::Generic(id.unsigned_abs() as usize)),
        id => {
            let idx = id as usize - 1;
            if idx >= path_count {
                Err(format!(
                    "type id {id} is beyond the path table ({path_count} entries)"
                ))
            } else {
                Ok(TypeId::Path(idx))
            }
        }
    }
}

/// Decode exactly `count` entries from `data`, one per item
pub fn decode_all(
    crate_name: &str,
    data: &str,
    count: usize,
    path_count: usize,
) -> Result<Vec<Option<FunctionSignature>>> {
    let mut decoder = Decoder::new(data);
    let mut signatures = Vec::with_capacity(count);

    let fail = |offset: usize, reason: String| IndexError::Signature {
        crate_name: crate_name.to_string(),
        offset,
        reason,
    };

    for idx in 0..count {
        if decoder.is_finished() {
            return Err(fail(
                decoder.offset(),
                format!("only {idx} of {count} entries present"),
            ));
        }
        let start = decoder.offset();
        let entry = decoder
            .next_entry()
            .map_err(|e| fail(e.offset, e.reason))?;
        let signature = match entry {
            None | Some(Value::Int(0)) => None,
            Some(value) => Some(
                FunctionSignature::from_value(&value, path_count)
                    .map_err(|reason| fail(start, format!("item {idx}: {reason}")))?,
            ),
        };
        signatures.push(signature);
    }

    if !decoder.is_finished() {
        return Err(fail(
            decoder.offset(),
            format!("trailing data after {count} entries"),
        ));
    }

    Ok(signatures)
}

// ============================================================================
// Rendering
// ============================================================================

fn generic_name(n: usize) -> String {
    const NAMES: [&str; 7] = ["T", "U", "V", "W", "X", "Y", "Z"];
    match NAMES.get(n.wrapping_sub(1)) {
        Some(name) => name.to_string(),
        None => format!("T{n}"),
    }
}

fn render_list(types: &[TypeNode], paths: &[PathEntry]) -> String {
    types
        .iter()
        .map(|t| render_type(t, paths))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_type(ty: &TypeNode, paths: &[PathEntry]) -> String {
    let entry = match ty.id {
        TypeId::Generic(n) => return generic_name(n),
        TypeId::Unknown => return "_".to_string(),
        TypeId::Path(idx) => match paths.get(idx) {
            Some(entry) => entry,
            None => return "?".to_string(),
        },
    };

    let first = || {
        ty.generics
            .first()
            .map(|g| render_type(g, paths))
            .unwrap_or_else(|| "_".to_string())
    };

    if entry.ty == ItemType::Primitive {
        match entry.name.as_str() {
            "unit" => return "()".to_string(),
            "tuple" => return format!("({})", render_list(&ty.generics, paths)),
            "slice" => return format!("[{}]", first()),
            "array" => return format!("[{}; N]", first()),
            "reference" => return format!("&{}", first()),
            "pointer" => return format!("*const {}", first()),
            _ => {}
        }
    }

    let mut args: Vec<String> = ty.generics.iter().map(|g| render_type(g, paths)).collect();
    for (assoc, constraints) in &ty.bindings {
        let assoc = render_type(assoc, paths);
        if constraints.is_empty() {
            args.push(assoc);
        } else {
            let constraints: Vec<String> =
                constraints.iter().map(|c| render_type(c, paths)).collect();
            args.push(format!("{assoc} = {}", constraints.join(" + ")));
        }
    }

    if args.is_empty() {
        entry.name.clone()
    } else {
        format!("{}<{}>", entry.name, args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ty: ItemType, name: &str) -> PathEntry {
        PathEntry {
            ty,
            name: name.to_string(),
            path: None,
            exact_path: None,
        }
    }

    fn paths() -> Vec<PathEntry> {
        vec![
            entry(ItemType::Struct, "Command"),
            entry(ItemType::Enum, "Result"),
            entry(ItemType::Trait, "Deserializer"),
            entry(ItemType::Primitive, "unit"),
            entry(ItemType::Primitive, "reference"),
            entry(ItemType::Primitive, "str"),
        ]
    }

    #[test]
    fn test_integer_encoding() {
        let mut decoder = Decoder::new("`abcA`Ab");
        assert_eq!(decoder.next_entry().unwrap(), None);
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(0)));
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(1)));
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(-1)));
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(8)));
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(9)));
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_backrefs() {
        let mut decoder = Decoder::new("{bb}{{}b}01`0");
        let first = decoder.next_entry().unwrap();
        let second = decoder.next_entry().unwrap();
        assert_eq!(decoder.next_entry().unwrap(), second);
        assert_eq!(decoder.next_entry().unwrap(), first);
        assert_eq!(decoder.next_entry().unwrap(), None);
        // repeats are not queued again
        assert_eq!(decoder.next_entry().unwrap(), second);
    }

    #[test]
    fn test_backref_window_is_sixteen() {
        let fresh: String = (0..17).map(|_| "b").collect();
        let data = format!("{fresh}?");
        let mut decoder = Decoder::new(&data);
        for _ in 0..17 {
            decoder.next_entry().unwrap();
        }
        assert_eq!(decoder.next_entry().unwrap(), Some(Value::Int(1)));

        let mut empty = Decoder::new("b1");
        empty.next_entry().unwrap();
        let err = empty.next_entry().unwrap_err();
        assert!(err.reason.contains("empty slot 1"));
    }

    #[test]
    fn test_malformed_data() {
        assert!(Decoder::new("{bb").next_entry().is_err());
        assert!(Decoder::new("A").next_entry().is_err());
        assert!(Decoder::new("{b~}").next_entry().is_err());
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let nested = "{".repeat(200_000);
        let err = Decoder::new(&nested).next_entry().unwrap_err();
        assert!(err.reason.contains("nesting too deep"));
        assert_eq!(err.offset, MAX_NESTING);

        let fits = format!("{}{}", "{".repeat(MAX_NESTING), "}".repeat(MAX_NESTING));
        assert!(Decoder::new(&fits).next_entry().is_ok());
    }

    #[test]
    fn test_render_generic_with_bound() {
        // deserialize<D: Deserializer>(D) -> Result<Command>
        let data = "{c{{d{b}}}f}";
        let signatures = decode_all("demo", data, 1, paths().len()).unwrap();
        let sig = signatures[0].as_ref().unwrap();
        assert_eq!(
            sig.render("deserialize", &paths()),
            "fn deserialize(T) -> Result<Command> where T: Deserializer"
        );
        assert_eq!(sig.input_names(&paths()), vec!["deserializer"]);
        assert_eq!(sig.output_names(&paths()), vec!["result", "command"]);
    }

    #[test]
    fn test_names_of_nested_and_recursive_types() {
        // Result<Result<...<Command>>>, nine levels deep
        let mut ty = "b".to_string();
        for _ in 0..9 {
            ty = format!("{{d{{{ty}}}}}");
        }
        let data = format!("{{{{}}{{{ty}}}}}");
        let signatures = decode_all("demo", &data, 1, paths().len()).unwrap();
        let names = signatures[0].as_ref().unwrap().output_names(&paths());
        assert_eq!(names.len(), 10);
        assert_eq!(names.last().map(String::as_str), Some("command"));

        // f<T>(T) where T: Result<T>
        let signatures = decode_all("demo", "{c{}{{d{c}}}}", 1, paths().len()).unwrap();
        let sig = signatures[0].as_ref().unwrap();
        assert_eq!(sig.input_names(&paths()), vec!["result"]);
    }

    #[test]
    fn test_render_primitives() {
        // f(&str) -> (), then a two-value output
        let signatures = decode_all("demo", "{{{j{l}}}h}{{}{bd}}", 2, paths().len()).unwrap();
        assert_eq!(
            signatures[0].as_ref().unwrap().render("f", &paths()),
            "fn f(&str) -> ()"
        );
        assert_eq!(
            signatures[1].as_ref().unwrap().render("g", &paths()),
            "fn g() -> (Command, Result)"
        );
    }

    #[test]
    fn test_decode_all_counts_entries() {
        let short = decode_all("demo", "``", 3, 0).unwrap_err();
        assert!(short.to_string().contains("only 2 of 3"));

        let long = decode_all("demo", "```", 2, 0).unwrap_err();
        assert!(long.to_string().contains("trailing data"));

        let dangling = decode_all("demo", "{{}n}", 1, 2).unwrap_err();
        assert!(dangling.to_string().contains("beyond the path table"));
    }
}
