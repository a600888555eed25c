//! Shared value types returned by storage backends.

use bytes::Bytes;

/// A key-value pair returned by prefix scans.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use keygate_storage::KeyValue;
///
/// let kv = KeyValue::new(Bytes::from("challenges/ab12"), Bytes::from("{}"));
/// assert_eq!(kv.key, Bytes::from("challenges/ab12"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}
