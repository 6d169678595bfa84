//! Auto map-reduce index definitions.

use crate::error::{CoreError, CoreResult};
use autoreduce_codec::{FieldPath, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// What the map step does with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperation {
    /// Pass the value through. Group-by fields always use this.
    None,
    /// Contribute `1` regardless of the document.
    Count,
    /// Contribute the field's value to a sum.
    Sum,
}

impl FieldOperation {
    /// Stable name used in stored definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldOperation::None => "None",
            FieldOperation::Count => "Count",
            FieldOperation::Sum => "Sum",
        }
    }
}

impl fmt::Display for FieldOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldOperation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(FieldOperation::None),
            "Count" => Ok(FieldOperation::Count),
            "Sum" => Ok(FieldOperation::Sum),
            other => Err(CoreError::invalid_definition(format!(
                "unknown field operation '{other}'"
            ))),
        }
    }
}

/// One field of an index: an output name, where to read it, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexField {
    name: String,
    path: FieldPath,
    operation: FieldOperation,
}

impl IndexField {
    /// Creates a field reading `path` into output `name`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `path` is not a valid field path.
    pub fn new(name: impl Into<String>, path: &str, operation: FieldOperation) -> CoreResult<Self> {
        Ok(Self {
            name: name.into(),
            path: FieldPath::parse(path)?,
            operation,
        })
    }

    /// A group-by field named after its path.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `path` is not a valid field path.
    pub fn group_by(path: &str) -> CoreResult<Self> {
        Self::new(path, path, FieldOperation::None)
    }

    /// A summed field named after its path.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `path` is not a valid field path.
    pub fn sum(path: &str) -> CoreResult<Self> {
        Self::new(path, path, FieldOperation::Sum)
    }

    /// A count field. Counts never read the document.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `name` is not a valid field path.
    pub fn count(name: &str) -> CoreResult<Self> {
        Self::new(name, name, FieldOperation::Count)
    }

    /// Output name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Map operation.
    #[must_use]
    pub fn operation(&self) -> FieldOperation {
        self.operation
    }

    fn to_value(&self) -> Value {
        Value::object([
            ("name", Value::from(self.name.as_str())),
            ("path", Value::from(self.path.as_str())),
            ("op", Value::from(self.operation.as_str())),
        ])
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let name = text_field(value, "name")?;
        let path = text_field(value, "path")?;
        let operation = text_field(value, "op")?.parse()?;
        Self::new(name, path, operation)
    }
}

/// Declarative definition of an auto map-reduce index.
///
/// ```
/// use autoreduce_core::{AutoMapReduceIndexDefinition, IndexField};
///
/// let definition = AutoMapReduceIndexDefinition::new("orders_by_category", "Orders")
///     .with_map_field(IndexField::sum("Price").unwrap())
///     .with_map_field(IndexField::count("Count").unwrap())
///     .with_group_by(IndexField::group_by("Category").unwrap());
/// assert!(definition.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoMapReduceIndexDefinition {
    name: String,
    collection: String,
    map_fields: Vec<IndexField>,
    group_by_fields: Vec<IndexField>,
}

impl AutoMapReduceIndexDefinition {
    /// Starts a definition with no fields.
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            map_fields: Vec::new(),
            group_by_fields: Vec::new(),
        }
    }

    /// Adds an aggregation field.
    #[must_use]
    pub fn with_map_field(mut self, field: IndexField) -> Self {
        self.map_fields.push(field);
        self
    }

    /// Adds a group-by field.
    #[must_use]
    pub fn with_group_by(mut self, field: IndexField) -> Self {
        self.group_by_fields.push(field);
        self
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Aggregation fields, in declaration order.
    #[must_use]
    pub fn map_fields(&self) -> &[IndexField] {
        &self.map_fields
    }

    /// Group-by fields, in declaration order.
    #[must_use]
    pub fn group_by_fields(&self) -> &[IndexField] {
        &self.group_by_fields
    }

    /// Checks that the definition can back an index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDefinition`] if the name is empty or
    /// contains `/`, there are no group-by fields, a group-by field is not a
    /// passthrough, or two fields share an output name.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(CoreError::invalid_definition(format!(
                "index name '{}' must be non-empty and must not contain '/'",
                self.name
            )));
        }
        if self.group_by_fields.is_empty() {
            return Err(CoreError::invalid_definition(
                "at least one group-by field is required",
            ));
        }
        if let Some(field) = self
            .group_by_fields
            .iter()
            .find(|f| f.operation != FieldOperation::None)
        {
            return Err(CoreError::invalid_definition(format!(
                "group-by field '{}' cannot use {}",
                field.name, field.operation
            )));
        }

        let mut seen = HashSet::new();
        for field in self.map_fields.iter().chain(&self.group_by_fields) {
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::invalid_definition(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Stored form of the definition.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let fields = |fields: &[IndexField]| Value::Array(fields.iter().map(IndexField::to_value).collect());
        Value::object([
            ("name", Value::from(self.name.as_str())),
            ("collection", Value::from(self.collection.as_str())),
            ("map", fields(&self.map_fields)),
            ("group_by", fields(&self.group_by_fields)),
        ])
    }

    /// Rebuilds a definition from [`to_value`](Self::to_value) output.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the value has the wrong shape,
    /// or a definition error if it does not validate.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let fields = |key: &str| -> CoreResult<Vec<IndexField>> {
            value
                .get(key)
                .and_then(Value::as_array)
                .ok_or_else(|| CoreError::invalid_format(format!("definition lacks '{key}'")))?
                .iter()
                .map(IndexField::from_value)
                .collect()
        };

        let definition = Self {
            name: text_field(value, "name")?.to_string(),
            collection: text_field(value, "collection")?.to_string(),
            map_fields: fields("map")?,
            group_by_fields: fields("group_by")?,
        };
        definition.validate()?;
        Ok(definition)
    }
}

fn text_field<'a>(value: &'a Value, key: &str) -> CoreResult<&'a str> {
    value
        .get(key)
        .and_then(Value::as_text)
        .ok_or_else(|| CoreError::invalid_format(format!("definition lacks text field '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> AutoMapReduceIndexDefinition {
        AutoMapReduceIndexDefinition::new("orders", "Orders")
            .with_map_field(IndexField::sum("Price").unwrap())
            .with_map_field(IndexField::count("Count").unwrap())
            .with_group_by(IndexField::group_by("Category").unwrap())
    }

    #[test]
    fn stored_form_round_trips() {
        let definition = orders();
        let restored = AutoMapReduceIndexDefinition::from_value(&definition.to_value()).unwrap();
        assert_eq!(restored, definition);
    }

    #[test]
    fn requires_group_by() {
        let definition = AutoMapReduceIndexDefinition::new("orders", "Orders")
            .with_map_field(IndexField::sum("Price").unwrap());
        assert!(matches!(
            definition.validate(),
            Err(CoreError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_names_and_bad_index_names() {
        let duplicate = orders().with_map_field(IndexField::sum("Category").unwrap());
        assert!(duplicate.validate().is_err());

        let slashed = AutoMapReduceIndexDefinition::new("a/b", "Orders")
            .with_group_by(IndexField::group_by("Category").unwrap());
        assert!(slashed.validate().is_err());
    }

    #[test]
    fn group_by_must_be_passthrough() {
        let definition = AutoMapReduceIndexDefinition::new("orders", "Orders").with_group_by(
            IndexField::new("Category", "Category", FieldOperation::Sum).unwrap(),
        );
        assert!(definition.validate().is_err());
    }

    #[test]
    fn operation_names() {
        for op in [FieldOperation::None, FieldOperation::Count, FieldOperation::Sum] {
            assert_eq!(op.as_str().parse::<FieldOperation>().unwrap(), op);
        }
        assert!("Avg".parse::<FieldOperation>().is_err());
    }

    #[test]
    fn invalid_path_is_rejected() {
        assert!(matches!(
            IndexField::sum("Lines,,"),
            Err(CoreError::Codec(_))
        ));
    }
}
