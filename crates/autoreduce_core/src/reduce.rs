//! Reduce step: fold the blobs of one bucket into one output document.

use crate::definition::{AutoMapReduceIndexDefinition, FieldOperation, IndexField};
use crate::error::{CoreError, CoreResult};
use autoreduce_codec::Value;

/// Reduce the mapped blobs of one bucket.
///
/// Count and Sum fields are added up; integer elements of an array value are
/// added individually and anything that is not an integer counts as zero.
/// Passthrough fields take the first non-null value in etag order. Group-by
/// fields are not stored in blobs, so they come from `group_key` when given.
///
/// Returns `None` for an empty bucket.
///
/// # Errors
///
/// Returns [`CoreError::AggregationOverflow`] if a sum leaves the `i64` range.
pub fn reduce_bucket<'a>(
    definition: &AutoMapReduceIndexDefinition,
    group_key: Option<&Value>,
    blobs: impl IntoIterator<Item = &'a Value>,
) -> CoreResult<Option<Value>> {
    let blobs: Vec<&Value> = blobs.into_iter().collect();
    if blobs.is_empty() {
        return Ok(None);
    }

    let mut output = Vec::with_capacity(
        definition.map_fields().len() + definition.group_by_fields().len(),
    );
    for field in definition.group_by_fields() {
        let value = group_key
            .and_then(|key| key.get(field.name()))
            .cloned()
            .unwrap_or(Value::Null);
        output.push((field.name().to_string(), value));
    }
    for field in definition.map_fields() {
        output.push((field.name().to_string(), reduce_field(field, &blobs)?));
    }
    Ok(Some(Value::object(output)))
}

fn reduce_field(field: &IndexField, blobs: &[&Value]) -> CoreResult<Value> {
    let values = blobs.iter().filter_map(|blob| blob.get(field.name()));
    match field.operation() {
        FieldOperation::Count | FieldOperation::Sum => {
            let mut total: i64 = 0;
            for value in values {
                total = total
                    .checked_add(integer_sum(value, field)?)
                    .ok_or_else(|| overflow(field))?;
            }
            Ok(Value::Integer(total))
        }
        FieldOperation::None => Ok(values
            .into_iter()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
    }
}

fn integer_sum(value: &Value, field: &IndexField) -> CoreResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_integer)
            .try_fold(0i64, |acc, n| acc.checked_add(n))
            .ok_or_else(|| overflow(field)),
        _ => Ok(0),
    }
}

fn overflow(field: &IndexField) -> CoreError {
    CoreError::AggregationOverflow {
        field: field.name().to_string(),
    }
}
