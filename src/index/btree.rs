// Ordered per-column index: comparable key -> set of row ids. Backed by the
// standard ordered map under the manager's coordination; uniqueness is
// enforced at insertion. The on-disk `.idx` format is a big-endian stream:
//
//   index_name | table_name | column_name   (u16 length-prefixed UTF-8)
//   unique:u8 | insert_count:u64 | lookup_count:u64 | range_count:u64
//   key_count:u32
//   per key: tag:u8 + value (codec tags, big-endian scalars)
//            row_id_count:u32 + row_id:u64 ...

use crate::common::{RowId, Value};
use crate::error::{DbError, Result};
use crate::index::key::IndexKey;
use crate::storage::codec::{TAG_BOOL, TAG_F64, TAG_I32, TAG_I64, TAG_NULL, TAG_STRING};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[derive(Debug)]
pub struct BTreeIndex {
    index_name: String,
    table_name: String,
    column_name: String,
    unique: bool,
    entries: BTreeMap<IndexKey, BTreeSet<RowId>>,
    insert_count: u64,
    lookup_count: AtomicU64,
    range_count: AtomicU64,
}

/// Snapshot of an index's identity and counters.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
    pub unique: bool,
    pub key_count: usize,
    pub entry_count: usize,
    pub insert_count: u64,
    pub lookup_count: u64,
    pub range_count: u64,
}

impl BTreeIndex {
    pub fn new(
        index_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        unique: bool,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            unique,
            entries: BTreeMap::new(),
            insert_count: 0,
            lookup_count: AtomicU64::new(0),
            range_count: AtomicU64::new(0),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Register `row_id` under `key`. Unique indexes reject a key that
    /// already has any registered row.
    pub fn insert(&mut self, key: Value, row_id: RowId) -> Result<()> {
        let key = IndexKey(key);
        if self.unique {
            if let Some(existing) = self.entries.get(&key) {
                if !existing.is_empty() {
                    return Err(DbError::UniqueKeyViolation {
                        table: self.table_name.clone(),
                        column: self.column_name.clone(),
                        value: key.0,
                    });
                }
            }
        }
        self.entries.entry(key).or_default().insert(row_id);
        self.insert_count += 1;
        Ok(())
    }

    /// Unregister `row_id` from `key`, purging the bucket when it empties so
    /// `contains_key` stays accurate.
    pub fn delete(&mut self, key: &Value, row_id: RowId) {
        let key = IndexKey(key.clone());
        if let Some(bucket) = self.entries.get_mut(&key) {
            bucket.remove(&row_id);
            if bucket.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Move `row_id` from `old` to `new`.
    pub fn update(&mut self, old: &Value, new: Value, row_id: RowId) -> Result<()> {
        self.delete(old, row_id);
        self.insert(new, row_id)
    }

    /// Row ids registered under exactly `key`.
    pub fn find(&self, key: &Value) -> BTreeSet<RowId> {
        self.lookup_count.fetch_add(1, AtomicOrdering::Relaxed);
        self.entries
            .get(&IndexKey(key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&IndexKey(key.clone()))
    }

    /// Row ids with `min <= key <= max` (inclusive both ends).
    pub fn find_range(&self, min: &Value, max: &Value) -> BTreeSet<RowId> {
        self.range_count.fetch_add(1, AtomicOrdering::Relaxed);
        if IndexKey::compare(min, max) == std::cmp::Ordering::Greater {
            return BTreeSet::new();
        }
        self.collect(self.entries.range(IndexKey(min.clone())..=IndexKey(max.clone())))
    }

    pub fn find_greater_than(&self, key: &Value, inclusive: bool) -> BTreeSet<RowId> {
        self.range_count.fetch_add(1, AtomicOrdering::Relaxed);
        let lower = if inclusive {
            Bound::Included(IndexKey(key.clone()))
        } else {
            Bound::Excluded(IndexKey(key.clone()))
        };
        self.collect(self.entries.range((lower, Bound::Unbounded)))
    }

    pub fn find_less_than(&self, key: &Value, inclusive: bool) -> BTreeSet<RowId> {
        self.range_count.fetch_add(1, AtomicOrdering::Relaxed);
        let upper = if inclusive {
            Bound::Included(IndexKey(key.clone()))
        } else {
            Bound::Excluded(IndexKey(key.clone()))
        };
        // Stay above NULL: range scans never surface null-keyed rows.
        let lower = Bound::Excluded(IndexKey(Value::Null));
        self.collect(self.entries.range((lower, upper)))
    }

    fn collect<'a>(
        &self,
        range: impl Iterator<Item = (&'a IndexKey, &'a BTreeSet<RowId>)>,
    ) -> BTreeSet<RowId> {
        let mut out = BTreeSet::new();
        for (_key, bucket) in range {
            out.extend(bucket.iter().copied());
        }
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of (key, row_id) registrations.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(|bucket| bucket.len()).sum()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            index_name: self.index_name.clone(),
            table_name: self.table_name.clone(),
            column_name: self.column_name.clone(),
            unique: self.unique,
            key_count: self.key_count(),
            entry_count: self.entry_count(),
            insert_count: self.insert_count,
            lookup_count: self.lookup_count.load(AtomicOrdering::Relaxed),
            range_count: self.range_count.load(AtomicOrdering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(DbError::index)?;
        let mut writer = BufWriter::new(file);

        write_string(&mut writer, &self.index_name)?;
        write_string(&mut writer, &self.table_name)?;
        write_string(&mut writer, &self.column_name)?;
        write_all(&mut writer, &[self.unique as u8])?;
        write_all(&mut writer, &self.insert_count.to_be_bytes())?;
        write_all(
            &mut writer,
            &self.lookup_count.load(AtomicOrdering::Relaxed).to_be_bytes(),
        )?;
        write_all(
            &mut writer,
            &self.range_count.load(AtomicOrdering::Relaxed).to_be_bytes(),
        )?;
        write_all(&mut writer, &(self.entries.len() as u32).to_be_bytes())?;

        for (key, bucket) in &self.entries {
            write_key(&mut writer, &key.0)?;
            write_all(&mut writer, &(bucket.len() as u32).to_be_bytes())?;
            for row_id in bucket {
                write_all(&mut writer, &row_id.to_be_bytes())?;
            }
        }

        writer.flush().map_err(DbError::index)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(DbError::index)?;
        let mut reader = BufReader::new(file);

        let index_name = read_string(&mut reader)?;
        let table_name = read_string(&mut reader)?;
        let column_name = read_string(&mut reader)?;
        let unique = read_u8(&mut reader)? != 0;
        let insert_count = read_u64(&mut reader)?;
        let lookup_count = read_u64(&mut reader)?;
        let range_count = read_u64(&mut reader)?;
        let key_count = read_u32(&mut reader)? as usize;

        let mut entries = BTreeMap::new();
        for _ in 0..key_count {
            let key = read_key(&mut reader)?;
            let row_count = read_u32(&mut reader)? as usize;
            let mut bucket = BTreeSet::new();
            for _ in 0..row_count {
                bucket.insert(read_u64(&mut reader)?);
            }
            entries.insert(IndexKey(key), bucket);
        }

        Ok(Self {
            index_name,
            table_name,
            column_name,
            unique,
            entries,
            insert_count,
            lookup_count: AtomicU64::new(lookup_count),
            range_count: AtomicU64::new(range_count),
        })
    }
}

impl PartialEq for BTreeIndex {
    fn eq(&self, other: &Self) -> bool {
        self.index_name == other.index_name
            && self.table_name == other.table_name
            && self.column_name == other.column_name
            && self.unique == other.unique
            && self.entries == other.entries
            && self.stats() == other.stats()
    }
}

fn write_all(writer: &mut impl Write, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(DbError::index)
}

fn write_string(writer: &mut impl Write, text: &str) -> Result<()> {
    write_all(writer, &(text.len() as u16).to_be_bytes())?;
    write_all(writer, text.as_bytes())
}

fn write_key(writer: &mut impl Write, value: &Value) -> Result<()> {
    match value {
        Value::Null => write_all(writer, &[TAG_NULL]),
        Value::Integer(i) => {
            write_all(writer, &[TAG_I32])?;
            write_all(writer, &i.to_be_bytes())
        }
        Value::BigInt(i) => {
            write_all(writer, &[TAG_I64])?;
            write_all(writer, &i.to_be_bytes())
        }
        Value::Double(d) => {
            write_all(writer, &[TAG_F64])?;
            write_all(writer, &d.to_be_bytes())
        }
        Value::Boolean(b) => {
            write_all(writer, &[TAG_BOOL])?;
            write_all(writer, &[*b as u8])
        }
        Value::String(s) => {
            write_all(writer, &[TAG_STRING])?;
            write_all(writer, &(s.len() as u32).to_be_bytes())?;
            write_all(writer, s.as_bytes())
        }
    }
}

fn read_exact<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(DbError::index)?;
    Ok(buf)
}

fn read_u8(reader: &mut impl Read) -> Result<u8> {
    Ok(read_exact::<1>(reader)?[0])
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    Ok(u32::from_be_bytes(read_exact::<4>(reader)?))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    Ok(u64::from_be_bytes(read_exact::<8>(reader)?))
}

fn read_string(reader: &mut impl Read) -> Result<String> {
    let len = u16::from_be_bytes(read_exact::<2>(reader)?) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(DbError::index)?;
    String::from_utf8(buf).map_err(|_| DbError::index("index file contains invalid UTF-8"))
}

fn read_key(reader: &mut impl Read) -> Result<Value> {
    let tag = read_u8(reader)?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_I32 => Ok(Value::Integer(i32::from_be_bytes(read_exact::<4>(reader)?))),
        TAG_I64 => Ok(Value::BigInt(i64::from_be_bytes(read_exact::<8>(reader)?))),
        TAG_F64 => Ok(Value::Double(f64::from_be_bytes(read_exact::<8>(reader)?))),
        TAG_BOOL => Ok(Value::Boolean(read_u8(reader)? != 0)),
        TAG_STRING => {
            let len = read_u32(reader)? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).map_err(DbError::index)?;
            String::from_utf8(buf)
                .map(Value::String)
                .map_err(|_| DbError::index("index file contains invalid UTF-8"))
        }
        other => Err(DbError::index(format!("unknown index key tag {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(index: &BTreeIndex, key: &Value) -> Vec<RowId> {
        index.find(key).into_iter().collect()
    }

    #[test]
    fn test_insert_find_delete() {
        let mut index = BTreeIndex::new("idx_price", "products", "price", false);
        index.insert(Value::Integer(10), 1).unwrap();
        index.insert(Value::Integer(10), 2).unwrap();
        index.insert(Value::Integer(20), 3).unwrap();

        assert_eq!(ids(&index, &Value::Integer(10)), vec![1, 2]);
        assert_eq!(ids(&index, &Value::Integer(20)), vec![3]);
        assert!(ids(&index, &Value::Integer(30)).is_empty());

        index.delete(&Value::Integer(10), 1);
        assert_eq!(ids(&index, &Value::Integer(10)), vec![2]);

        // Deleting the last row purges the bucket entirely.
        index.delete(&Value::Integer(10), 2);
        assert!(!index.contains_key(&Value::Integer(10)));
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn test_unique_rejects_duplicates() {
        let mut index = BTreeIndex::new("pk_users_id", "users", "id", true);
        index.insert(Value::Integer(1), 1).unwrap();
        let err = index.insert(Value::Integer(1), 2).unwrap_err();
        assert_eq!(err.code(), "UNIQUE_KEY_VIOLATION");

        // After deletion the key is free again.
        index.delete(&Value::Integer(1), 1);
        index.insert(Value::Integer(1), 2).unwrap();
    }

    #[test]
    fn test_update_moves_row() {
        let mut index = BTreeIndex::new("idx", "t", "c", false);
        index.insert(Value::Integer(5), 1).unwrap();
        index.update(&Value::Integer(5), Value::Integer(9), 1).unwrap();

        assert!(ids(&index, &Value::Integer(5)).is_empty());
        assert_eq!(ids(&index, &Value::Integer(9)), vec![1]);
    }

    #[test]
    fn test_range_lookups() {
        let mut index = BTreeIndex::new("idx", "t", "c", false);
        for (row_id, price) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
            index.insert(Value::Integer(price), row_id).unwrap();
        }

        let range: Vec<RowId> = index
            .find_range(&Value::Integer(20), &Value::Integer(30))
            .into_iter()
            .collect();
        assert_eq!(range, vec![2, 3]);

        let gt: Vec<RowId> = index
            .find_greater_than(&Value::Integer(20), false)
            .into_iter()
            .collect();
        assert_eq!(gt, vec![3, 4]);

        let gte: Vec<RowId> = index
            .find_greater_than(&Value::Integer(20), true)
            .into_iter()
            .collect();
        assert_eq!(gte, vec![2, 3, 4]);

        let lt: Vec<RowId> = index
            .find_less_than(&Value::Integer(30), false)
            .into_iter()
            .collect();
        assert_eq!(lt, vec![1, 2]);

        // Inverted bounds yield nothing rather than panicking.
        assert!(index
            .find_range(&Value::Integer(30), &Value::Integer(20))
            .is_empty());
    }

    #[test]
    fn test_less_than_excludes_nulls() {
        let mut index = BTreeIndex::new("idx", "t", "c", false);
        index.insert(Value::Null, 1).unwrap();
        index.insert(Value::Integer(5), 2).unwrap();

        let lt: Vec<RowId> = index
            .find_less_than(&Value::Integer(10), true)
            .into_iter()
            .collect();
        assert_eq!(lt, vec![2]);
    }

    #[test]
    fn test_counters_and_stats() {
        let mut index = BTreeIndex::new("idx", "t", "c", false);
        index.insert(Value::Integer(1), 1).unwrap();
        index.insert(Value::Integer(1), 2).unwrap();
        index.find(&Value::Integer(1));
        index.find_greater_than(&Value::Integer(0), false);

        let stats = index.stats();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.insert_count, 2);
        assert_eq!(stats.lookup_count, 1);
        assert_eq!(stats.range_count, 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx_mixed.idx");

        let mut index = BTreeIndex::new("idx_mixed", "things", "val", true);
        index.insert(Value::Integer(1), 10).unwrap();
        index.insert(Value::BigInt(1 << 40), 11).unwrap();
        index.insert(Value::Double(2.75), 12).unwrap();
        index.insert(Value::Boolean(true), 13).unwrap();
        index.insert(Value::String("käse".to_string()), 14).unwrap();
        index.insert(Value::Null, 15).unwrap();
        index.find(&Value::Integer(1));
        index.find_range(&Value::Integer(0), &Value::Integer(5));

        index.save(&path).unwrap();
        let restored = BTreeIndex::load(&path).unwrap();
        assert_eq!(restored, index);
    }

    #[test]
    fn test_load_missing_file_is_index_error() {
        let dir = TempDir::new().unwrap();
        let err = BTreeIndex::load(&dir.path().join("nope.idx")).unwrap_err();
        assert_eq!(err.code(), "INDEX_ERROR");
    }
}
