//! Key encoding and tree naming.
//!
//! Etags and hashes are stored as fixed-width big-endian integers so that
//! bytewise tree order matches numeric order on every host. Document keys
//! are stored raw.

use crate::error::{CoreError, CoreResult};
use crate::types::{Etag, ReduceKeyHash};
use autoreduce_codec::{to_canonical_cbor, Value};
use xxhash_rust::xxh64::xxh64;

/// Width of an encoded etag or hash.
pub const KEY_WIDTH: usize = 8;

/// Encode a `u64` as big-endian bytes.
#[must_use]
pub const fn encode_big_endian_u64(value: u64) -> [u8; KEY_WIDTH] {
    value.to_be_bytes()
}

/// Decode big-endian bytes produced by [`encode_big_endian_u64`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] if `bytes` is not exactly
/// [`KEY_WIDTH`] long.
pub fn decode_big_endian_u64(bytes: &[u8]) -> CoreResult<u64> {
    let array: [u8; KEY_WIDTH] = bytes.try_into().map_err(|_| {
        CoreError::invalid_format(format!("expected {KEY_WIDTH} key bytes, got {}", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(array))
}

/// Encode an etag as a bucket or table key.
#[must_use]
pub const fn encode_etag(etag: Etag) -> [u8; KEY_WIDTH] {
    encode_big_endian_u64(etag.as_u64())
}

/// Decode an etag key.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] on a malformed key.
pub fn decode_etag(bytes: &[u8]) -> CoreResult<Etag> {
    decode_big_endian_u64(bytes).map(Etag::new)
}

/// Encode a reduce key hash as an index column.
#[must_use]
pub const fn encode_hash(hash: ReduceKeyHash) -> [u8; KEY_WIDTH] {
    encode_big_endian_u64(hash.as_u64())
}

/// Decode a reduce key hash column.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] on a malformed column.
pub fn decode_hash(bytes: &[u8]) -> CoreResult<ReduceKeyHash> {
    decode_big_endian_u64(bytes).map(ReduceKeyHash::new)
}

/// Hash a group-by projection.
///
/// The projection is serialized to canonical CBOR and hashed with XXH64
/// (seed 0). Distinct projections may collide; collisions share a bucket.
///
/// # Errors
///
/// Returns a codec error if the projection cannot be serialized.
pub fn hash_reduce_key(projection: &Value) -> CoreResult<ReduceKeyHash> {
    let bytes = to_canonical_cbor(projection)?;
    Ok(ReduceKeyHash::new(xxh64(&bytes, 0)))
}

/// Tree holding an index's definition and counters.
#[must_use]
pub fn meta_tree(index: &str) -> String {
    format!("{index}/meta")
}

/// Name of an index's map entry table.
#[must_use]
pub fn map_entries_table(index: &str) -> String {
    format!("{index}/MapResults")
}

/// Tree mapping each reduce key hash to the group-by projection it was
/// computed from.
#[must_use]
pub fn reduce_keys_tree(index: &str) -> String {
    format!("{index}/ReduceKeys")
}

/// Prefix shared by all of an index's bucket trees.
#[must_use]
pub fn bucket_tree_prefix(index: &str) -> String {
    format!("{index}/reduce/")
}

/// Name of the bucket tree for one reduce key hash.
#[must_use]
pub fn bucket_tree(index: &str, hash: ReduceKeyHash) -> String {
    format!("{}{hash}", bucket_tree_prefix(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_order_matches_numeric_order() {
        let values = [0u64, 1, 255, 256, 65_535, 1 << 40, u64::MAX];
        for pair in values.windows(2) {
            assert!(encode_big_endian_u64(pair[0]) < encode_big_endian_u64(pair[1]));
        }
        assert_eq!(encode_etag(Etag::new(1)), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn decode_rejects_wrong_width() {
        assert!(matches!(
            decode_etag(&[1, 2, 3]),
            Err(CoreError::InvalidFormat { .. })
        ));
        assert_eq!(decode_hash(&encode_hash(ReduceKeyHash::new(42))).unwrap().as_u64(), 42);
    }

    #[test]
    fn hash_depends_on_values_not_field_order() {
        let a = Value::object([("Category", Value::from("A")), ("Region", Value::from("EU"))]);
        let b = Value::object([("Region", Value::from("EU")), ("Category", Value::from("A"))]);
        let c = Value::object([("Category", Value::from("B")), ("Region", Value::from("EU"))]);

        assert_eq!(hash_reduce_key(&a).unwrap(), hash_reduce_key(&b).unwrap());
        assert_ne!(hash_reduce_key(&a).unwrap(), hash_reduce_key(&c).unwrap());
    }

    #[test]
    fn hash_is_xxh64_of_canonical_bytes() {
        let projection = Value::object([("Category", Value::from("A"))]);
        let bytes = to_canonical_cbor(&projection).unwrap();
        assert_eq!(hash_reduce_key(&projection).unwrap().as_u64(), xxh64(&bytes, 0));
    }

    #[test]
    fn tree_names() {
        let hash = ReduceKeyHash::new(0x1f);
        assert_eq!(bucket_tree("orders", hash), "orders/reduce/000000000000001f");
        assert!(bucket_tree("orders", hash).starts_with(&bucket_tree_prefix("orders")));
        assert_eq!(map_entries_table("orders"), "orders/MapResults");
        assert_eq!(meta_tree("orders"), "orders/meta");
        assert!(!reduce_keys_tree("orders").starts_with(&bucket_tree_prefix("orders")));
    }
}
