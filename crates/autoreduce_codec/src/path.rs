//! Field path traversal.
//!
//! A path is a `.`-separated chain of field names, optionally followed by
//! `,`-separated steps that fan out over arrays:
//!
//! - `Address.City` descends through nested maps.
//! - `Friends,Name` reads `Name` from every element of the `Friends` array.
//! - `Items,,Bar.Foo` unwraps one extra array level before reading `Bar.Foo`.
//!
//! Paths are parsed once into a [`FieldPath`] and evaluated with [`read`].
//! Missing fields and type mismatches are never errors: a single-valued read
//! returns `None`, and elements of a sequence that do not match are skipped.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::fmt;
use std::iter;
use std::str::FromStr;

/// Separator for nested map fields.
const FIELD_SEPARATOR: char = '.';

/// Separator introducing an array step.
const ARRAY_SEPARATOR: char = ',';

/// A parsed field path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    head: Vec<String>,
    steps: Vec<ArrayStep>,
}

/// One `,` step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayStep {
    /// Extra array levels to flatten before reading `fields`.
    unwrap: usize,
    /// Nested field names read from every element.
    fields: Vec<String>,
}

impl ArrayStep {
    /// Number of extra array levels flattened by this step.
    pub fn unwrap_levels(&self) -> usize {
        self.unwrap
    }

    /// Field names read from each element.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl FieldPath {
    /// Parse a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidPath`] for an empty path, an empty field
    /// name between dots, or a path that ends with `,`.
    pub fn parse(raw: &str) -> CodecResult<Self> {
        let mut segments = raw.split(ARRAY_SEPARATOR);
        let head = match segments.next() {
            Some(first) if !first.is_empty() => split_fields(raw, first)?,
            _ => return Err(CodecError::invalid_path(raw, "path must start with a field name")),
        };

        let mut steps = Vec::new();
        let mut unwrap = 0;
        for segment in segments {
            if segment.is_empty() {
                unwrap += 1;
                continue;
            }
            steps.push(ArrayStep {
                unwrap,
                fields: split_fields(raw, segment)?,
            });
            unwrap = 0;
        }
        if unwrap > 0 || raw.ends_with(ARRAY_SEPARATOR) {
            return Err(CodecError::invalid_path(raw, "path cannot end with ','"));
        }

        Ok(Self {
            raw: raw.to_string(),
            head,
            steps,
        })
    }

    /// The original expression.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field names resolved before the first array step.
    pub fn head(&self) -> &[String] {
        &self.head
    }

    /// Array steps, in order.
    pub fn steps(&self) -> &[ArrayStep] {
        &self.steps
    }

    /// Returns `true` if reads through this path produce sequences.
    pub fn is_multi_valued(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Evaluate this path against a document. See [`read`].
    pub fn read<'a>(&'a self, document: &'a Value) -> Option<Traversed<'a>> {
        read(document, self)
    }
}

fn split_fields(raw: &str, segment: &str) -> CodecResult<Vec<String>> {
    segment
        .split(FIELD_SEPARATOR)
        .map(|name| {
            if name.is_empty() {
                Err(CodecError::invalid_path(raw, "empty field name"))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}

impl FromStr for FieldPath {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The result of a successful read.
#[derive(Debug, Clone, Copy)]
pub enum Traversed<'a> {
    /// The path had no array steps and resolved to one value.
    Single(&'a Value),
    /// The path crossed at least one `,` boundary.
    Many(Sequence<'a>),
}

impl Traversed<'_> {
    /// Realize the result as an owned value. Sequences become arrays.
    pub fn to_value(&self) -> Value {
        match self {
            Traversed::Single(value) => (*value).clone(),
            Traversed::Many(sequence) => Value::Array(sequence.iter().cloned().collect()),
        }
    }
}

/// A lazily evaluated sequence of values produced by array steps.
///
/// The sequence borrows the source document and holds no cursor state, so
/// every call to [`Sequence::iter`] walks the document again from the start.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    items: &'a [Value],
    steps: &'a [ArrayStep],
}

impl<'a> Sequence<'a> {
    /// Iterate over the values of this sequence.
    pub fn iter(&self) -> impl Iterator<Item = &'a Value> + 'a {
        expand(self.items, self.steps)
    }
}

/// Read the value at `path` from `document`.
///
/// Returns `None` if a field along the head of the path is missing, if a
/// `.` step meets a non-map, or if a `,` step meets a non-array.
///
/// ```
/// use autoreduce_codec::{read, FieldPath, Traversed, Value};
///
/// let doc = Value::object([("Address", Value::object([("City", Value::from("X"))]))]);
/// let path = FieldPath::parse("Address.City").unwrap();
/// assert!(matches!(read(&doc, &path), Some(Traversed::Single(Value::Text(city))) if city == "X"));
/// ```
pub fn read<'a>(document: &'a Value, path: &'a FieldPath) -> Option<Traversed<'a>> {
    let value = descend(document, &path.head)?;
    if path.steps.is_empty() {
        return Some(Traversed::Single(value));
    }
    let items = value.as_array()?;
    Some(Traversed::Many(Sequence {
        items,
        steps: &path.steps,
    }))
}

fn descend<'a>(value: &'a Value, fields: &[String]) -> Option<&'a Value> {
    fields.iter().try_fold(value, |current, name| current.get(name))
}

type ValueIter<'a> = Box<dyn Iterator<Item = &'a Value> + 'a>;

fn expand<'a>(items: &'a [Value], steps: &'a [ArrayStep]) -> ValueIter<'a> {
    let Some((step, rest)) = steps.split_first() else {
        return Box::new(items.iter());
    };
    Box::new(
        items
            .iter()
            .flat_map(move |item| unwrap(item, step.unwrap))
            .filter_map(move |element| descend(element, &step.fields))
            .flat_map(move |value| -> ValueIter<'a> {
                if rest.is_empty() {
                    return Box::new(iter::once(value));
                }
                match value.as_array() {
                    Some(inner) => expand(inner, rest),
                    None => Box::new(iter::empty()),
                }
            }),
    )
}

fn unwrap(item: &Value, levels: usize) -> ValueIter<'_> {
    if levels == 0 {
        return Box::new(iter::once(item));
    }
    match item.as_array() {
        Some(inner) => Box::new(inner.iter().flat_map(move |v| unwrap(v, levels - 1))),
        None => Box::new(iter::empty()),
    }
}
