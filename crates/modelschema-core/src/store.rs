//! Record sources.
//!
//! The schema layer never persists anything; it only needs to look records
//! up when a relation has not been loaded. [`RecordSource`] is that seam and
//! [`MemoryStore`] a small in-process implementation of it.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::Result;
use crate::error::Error;
use crate::record::Record;
use crate::value::{Value, whole_i64};

/// Lookup interface used to resolve relations that are not cached.
pub trait RecordSource: Send + Sync {
    /// Fetch the record of `model` whose primary key is `key`.
    fn fetch(&self, model: &str, key: &Value) -> Result<Option<Record>>;

    /// All records of `model` whose `attribute` equals `value`.
    fn select_by(&self, model: &str, attribute: &str, value: &Value) -> Result<Vec<Record>>;
}

/// Hash a key into a stable bucket id.
///
/// Integral doubles hash like integers so `1` and `1.0` address the same
/// record.
fn hash_key(value: &Value) -> u64 {
    use std::collections::hash_map::DefaultHasher;

    let mut hasher = DefaultHasher::new();
    hash_single_value(value, &mut hasher);
    hasher.finish()
}

fn hash_single_value(v: &Value, hasher: &mut impl Hasher) {
    match v {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::BigInt(i) => {
            2u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Double(f) => match whole_i64(*f) {
            Some(i) => {
                2u8.hash(hasher);
                i.hash(hasher);
            }
            None => {
                3u8.hash(hasher);
                f.to_bits().hash(hasher);
            }
        },
        Value::Decimal(s) | Value::Text(s) => {
            4u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Bytes(b) => {
            5u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Date(d) => {
            6u8.hash(hasher);
            d.hash(hasher);
        }
        Value::Time(t) => {
            7u8.hash(hasher);
            t.hash(hasher);
        }
        Value::Timestamp(ts) => {
            8u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::Uuid(u) => {
            9u8.hash(hasher);
            u.hash(hasher);
        }
        Value::Json(j) => {
            10u8.hash(hasher);
            j.to_string().hash(hasher);
        }
        Value::Array(items) => {
            11u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_single_value(item, hasher);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: IndexMap<u64, Record>,
    next_id: i64,
}

/// In-memory record store keyed by model name and primary key.
///
/// Stored records are plain values: relation caches are kept as given, and
/// callers receive clones.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning it with its primary key set.
    ///
    /// Records of auto-keyed models without a key are numbered from 1.
    pub fn insert(&self, mut record: Record) -> Result<Record> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Custom("record store lock poisoned".to_string()))?;
        let table = tables.entry(record.model_name().to_string()).or_default();

        let pk_attr = record.model().primary_key().clone();
        if record.pk().is_null() {
            if !pk_attr.ty.is_auto() {
                return Err(Error::Custom(format!(
                    "cannot insert {} without a primary key",
                    record.model_name()
                )));
            }
            table.next_id += 1;
            record.set(&pk_attr.name, table.next_id)?;
        } else if let Some(id) = record.pk().as_i64() {
            table.next_id = table.next_id.max(id);
        }

        tracing::trace!(model = record.model_name(), pk = %record.pk(), "Storing record");
        table.rows.insert(hash_key(record.pk()), record.clone());
        Ok(record)
    }

    /// Number of stored records of `model`.
    pub fn count(&self, model: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(model).map_or(0, |t| t.rows.len()))
            .unwrap_or(0)
    }

    /// Remove every record.
    pub fn clear(&self) {
        if let Ok(mut tables) = self.tables.write() {
            tables.clear();
        }
    }
}

impl RecordSource for MemoryStore {
    fn fetch(&self, model: &str, key: &Value) -> Result<Option<Record>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::Custom("record store lock poisoned".to_string()))?;
        let Some(table) = tables.get(model) else {
            return Ok(None);
        };
        // Coerce through the stored model's key type so "1" finds 1.
        let key = match table.rows.values().next() {
            Some(sample) => sample
                .model()
                .primary_key()
                .coerce_value(key)
                .unwrap_or_else(|_| key.clone()),
            None => return Ok(None),
        };
        Ok(table.rows.get(&hash_key(&key)).cloned())
    }

    fn select_by(&self, model: &str, attribute: &str, value: &Value) -> Result<Vec<Record>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::Custom("record store lock poisoned".to_string()))?;
        let Some(table) = tables.get(model) else {
            return Ok(Vec::new());
        };
        let wanted = hash_key(value);
        Ok(table
            .rows
            .values()
            .filter(|r| r.get(attribute).is_some_and(|v| hash_key(v) == wanted))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeInfo;
    use crate::model::ModelDef;
    use crate::types::AttributeType;

    fn models() -> (std::sync::Arc<ModelDef>, std::sync::Arc<ModelDef>) {
        let role = ModelDef::builder("Role")
            .attribute(AttributeInfo::char("name", 255))
            .build();
        let user = ModelDef::builder("User")
            .attribute(AttributeInfo::char("name", 255))
            .attribute(AttributeInfo::foreign_key("role", "Role"))
            .build();
        (role, user)
    }

    #[test]
    fn insert_assigns_ids() {
        let (role, _) = models();
        let store = MemoryStore::new();
        let a = store.insert(Record::new(role.clone()).with("name", "a")).unwrap();
        let b = store.insert(Record::new(role.clone()).with("id", 10)).unwrap();
        let c = store.insert(Record::new(role)).unwrap();
        assert_eq!(a.pk(), &Value::BigInt(1));
        assert_eq!(b.pk(), &Value::BigInt(10));
        assert_eq!(c.pk(), &Value::BigInt(11));
        assert_eq!(store.count("Role"), 3);
    }

    #[test]
    fn fetch_coerces_key() {
        let (role, _) = models();
        let store = MemoryStore::new();
        let admin = store.insert(Record::new(role).with("name", "admin")).unwrap();
        assert_eq!(store.fetch("Role", &Value::from("1")).unwrap(), Some(admin));
        assert_eq!(store.fetch("Role", &Value::BigInt(2)).unwrap(), None);
        assert_eq!(store.fetch("Team", &Value::BigInt(1)).unwrap(), None);
    }

    #[test]
    fn select_by_foreign_key() {
        let (role, user) = models();
        let store = MemoryStore::new();
        let admin = store.insert(Record::new(role)).unwrap();
        store
            .insert(Record::new(user.clone()).with("role", admin.pk().clone()))
            .unwrap();
        store.insert(Record::new(user.clone()).with("role", 99)).unwrap();

        let found = store.select_by("User", "role", &Value::BigInt(1)).unwrap();
        assert_eq!(found.len(), 1);
        store.clear();
        assert_eq!(store.count("User"), 0);
    }

    #[test]
    fn insert_requires_key_for_manual_keys() {
        let token = ModelDef::builder("Token")
            .attribute(AttributeInfo::new("key", AttributeType::Uuid).primary_key(true))
            .build();
        let store = MemoryStore::new();
        assert!(store.insert(Record::new(token)).is_err());
    }
}
