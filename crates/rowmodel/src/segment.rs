//! In-process record segments.
//!
//! A [`Segment`] holds validated records of one model, keyed by the model's
//! `search_by` field and ordered by access. It enforces two policies:
//!
//! - Capacity: adding to a full segment evicts the least recently accessed
//!   entry, or fails when the segment may not make space
//! - Invalidation: an entry fetched `invalidate_after` times through
//!   [`Segment::get`] is returned one last time and dropped

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use regex::Regex;
use rowmodel_core::{
    DumpOptions, Error, FieldInput, ModelSchema, Record, Result, SegmentError, SegmentErrorKind,
    Value, validate_field,
};

use crate::export::ExportItem;

/// Capacity of a segment built with [`Segment::new`].
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Hashable form of a key value.
///
/// Both integer widths hash alike, so `Int(7)` and `BigInt(7)` name the
/// same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Json(String),
}

impl From<&Value> for Key {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Key::Null,
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(i) => Key::Int(i64::from(*i)),
            Value::BigInt(i) => Key::Int(*i),
            Value::Double(f) => Key::Float(f.to_bits()),
            Value::Text(s) => Key::Text(s.clone()),
            Value::Bytes(b) => Key::Bytes(b.clone()),
            Value::Json(j) => Key::Json(j.to_string()),
        }
    }
}

#[derive(Debug)]
struct Entry {
    record: Record,
    fetches: u64,
}

/// Records of one model, keyed by its primary key and ordered by access.
#[derive(Debug)]
pub struct Segment {
    name: String,
    model: Arc<ModelSchema>,
    max_size: Option<usize>,
    make_space: bool,
    entries: HashMap<Key, Entry>,
    /// Least recently accessed first
    order: VecDeque<Key>,
    invalidated_last: bool,
}

impl Segment {
    /// Create an empty segment holding up to [`DEFAULT_MAX_SIZE`] records
    /// and evicting when full.
    pub fn new(name: impl Into<String>, model: Arc<ModelSchema>) -> Self {
        Self {
            name: name.into(),
            model,
            max_size: Some(DEFAULT_MAX_SIZE),
            make_space: true,
            entries: HashMap::new(),
            order: VecDeque::new(),
            invalidated_last: false,
        }
    }

    /// Cap the number of records. Zero means no cap.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = (max_size > 0).then_some(max_size);
        self
    }

    /// Evict the least recently accessed record when full, instead of
    /// rejecting the add.
    #[must_use]
    pub fn make_space(mut self, make_space: bool) -> Self {
        self.make_space = make_space;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Arc<ModelSchema> {
        &self.model
    }

    pub fn capacity(&self) -> Option<usize> {
        self.max_size
    }

    pub fn makes_space(&self) -> bool {
        self.make_space
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Did the last successful [`get`](Self::get) drop its entry?
    pub fn invalidated_last(&self) -> bool {
        self.invalidated_last
    }

    pub fn contains(&self, key: impl Into<Value>) -> bool {
        self.entries.contains_key(&self.key_of(key.into()))
    }

    /// Stored keys, least recently accessed first.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Value> {
        self.oldest_entries().map(|entry| entry.record.key())
    }

    /// Records from the least recently accessed on.
    pub fn oldest(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.oldest_entries().map(|entry| &entry.record)
    }

    /// Records from the most recently accessed on.
    pub fn newest(&self) -> impl Iterator<Item = &Record> {
        self.oldest().rev()
    }

    /// The most recently accessed record.
    pub fn first(&self) -> Option<&Record> {
        self.newest().next()
    }

    /// The least recently accessed record.
    pub fn last(&self) -> Option<&Record> {
        self.oldest().next()
    }

    /// Validate `item` through the segment's model and store it.
    ///
    /// Fails when the key is already stored, or when the segment is full
    /// and may not make space.
    #[allow(clippy::result_large_err)]
    pub fn add(&mut self, item: impl Into<ExportItem>) -> Result<()> {
        let record = item.into().into_record(&self.model)?;
        self.insert(record, false).map(drop)
    }

    /// Like [`add`](Self::add), but an entry with the same key is replaced
    /// and returned.
    #[allow(clippy::result_large_err)]
    pub fn replace(&mut self, item: impl Into<ExportItem>) -> Result<Option<Record>> {
        let record = item.into().into_record(&self.model)?;
        self.insert(record, true)
    }

    /// Fetch a record and mark it most recently accessed.
    ///
    /// Counts one fetch against the entry. The fetch that reaches the
    /// model's `invalidate_after` returns the record and drops the entry.
    /// Keys are coerced through the primary key field, so `"7"` finds the
    /// entry keyed by integer 7.
    pub fn get(&mut self, key: impl Into<Value>) -> Option<Record> {
        let key = self.key_of(key.into());
        self.fetch(&key)
    }

    /// Look at a record without counting a fetch or touching the order.
    pub fn peek(&self, key: impl Into<Value>) -> Option<&Record> {
        self.entries
            .get(&self.key_of(key.into()))
            .map(|entry| &entry.record)
    }

    /// Fetches counted against the entry so far.
    pub fn fetch_count(&self, key: impl Into<Value>) -> Option<u64> {
        self.entries
            .get(&self.key_of(key.into()))
            .map(|entry| entry.fetches)
    }

    pub fn remove(&mut self, key: impl Into<Value>) -> Option<Record> {
        let key = self.key_of(key.into());
        self.unlink(&key)
    }

    /// Rebuild a record with `changes` applied over its current fields.
    ///
    /// The result is validated through the model; on failure the stored
    /// record is untouched. Changing the primary key moves the entry.
    #[allow(clippy::result_large_err)]
    pub fn update<I, K, V>(&mut self, key: impl Into<Value>, changes: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldInput>,
    {
        let key = self.key_of(key.into());
        let Some(current) = self.entries.get(&key) else {
            return Err(self.error(SegmentErrorKind::KeyNotFound, "no entry with that key"));
        };
        let fetches = current.fetches;
        let merged: Vec<(String, FieldInput)> = current
            .record
            .iter()
            .map(|(name, value)| (name.to_string(), FieldInput::from(value.clone())))
            .chain(changes.into_iter().map(|(k, v)| (k.into(), v.into())))
            .collect();
        let record = self.model.validate(merged)?;

        let new_key = Key::from(record.key());
        if new_key != key && self.entries.contains_key(&new_key) {
            return Err(self.duplicate(record.key()));
        }
        self.unlink(&key);
        self.order.push_back(new_key.clone());
        self.entries.insert(
            new_key,
            Entry {
                record: record.clone(),
                fetches,
            },
        );
        Ok(record)
    }

    /// Fetch every record `predicate` accepts, most recently accessed first.
    ///
    /// Each match counts as a [`get`](Self::get). A `limit` of zero means
    /// no limit.
    pub fn search(&mut self, mut predicate: impl FnMut(&Record) -> bool, limit: usize) -> Vec<Record> {
        let keys: Vec<Key> = self
            .order
            .iter()
            .rev()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| predicate(&entry.record))
            })
            .take(cap(limit))
            .cloned()
            .collect();
        keys.iter().filter_map(|key| self.fetch(key)).collect()
    }

    /// [`search`](Self::search) for records whose `field` matches `pattern`
    /// at its start. `field` defaults to the model's `search_by` field;
    /// values are compared in their display form.
    #[allow(clippy::result_large_err)]
    pub fn search_using_re(
        &mut self,
        pattern: &str,
        field: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let field = field.map_or_else(|| self.model.config().search_by.clone(), str::to_string);
        if !self.model.has_field(&field) {
            return Err(self.error(
                SegmentErrorKind::UnknownField,
                format!("model '{}' has no field '{field}'", self.model.name()),
            ));
        }
        let regex = Regex::new(pattern).map_err(|e| {
            self.error(
                SegmentErrorKind::InvalidPattern,
                format!("invalid regex pattern '{pattern}': {e}"),
            )
        })?;
        Ok(self.search(
            |record| {
                record.value(&field).is_some_and(|value| {
                    regex
                        .find(&value.to_string())
                        .is_some_and(|m| m.start() == 0)
                })
            },
            limit,
        ))
    }

    /// Drop every record `predicate` accepts, least recently accessed first,
    /// and return them. A `limit` of zero means no limit.
    pub fn invalidate_all(
        &mut self,
        mut predicate: impl FnMut(&Record) -> bool,
        limit: usize,
    ) -> Vec<Record> {
        let keys: Vec<Key> = self
            .order
            .iter()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| predicate(&entry.record))
            })
            .take(cap(limit))
            .cloned()
            .collect();
        let removed: Vec<Record> = keys.iter().filter_map(|key| self.unlink(key)).collect();
        if !removed.is_empty() {
            tracing::debug!(segment = %self.name, removed = removed.len(), "entries invalidated");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.invalidated_last = false;
    }

    /// Change the cap, evicting the least recently accessed records that no
    /// longer fit. Zero means no cap.
    pub fn set_max_size(&mut self, max_size: usize) -> Vec<Record> {
        self.max_size = (max_size > 0).then_some(max_size);
        let mut evicted = Vec::new();
        while self.max_size.is_some_and(|max| self.entries.len() > max) {
            match self.evict_oldest() {
                Some(record) => evicted.push(record),
                None => break,
            }
        }
        evicted
    }

    pub fn set_make_space(&mut self, make_space: bool) {
        self.make_space = make_space;
    }

    /// Re-validate every stored record through `model` and adopt it.
    ///
    /// All or nothing: if any record fails, or two records end up with the
    /// same key, the segment keeps its current model and records.
    #[allow(clippy::result_large_err)]
    pub fn set_model(&mut self, model: Arc<ModelSchema>) -> Result<()> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        let mut order = VecDeque::with_capacity(self.order.len());
        for entry in self.oldest_entries() {
            let record = model.validate_row(&entry.record.dump_with(&DumpOptions::new()))?;
            let key = Key::from(record.key());
            if entries.contains_key(&key) {
                return Err(self.duplicate(record.key()));
            }
            order.push_back(key.clone());
            entries.insert(
                key,
                Entry {
                    record,
                    fetches: entry.fetches,
                },
            );
        }
        tracing::debug!(segment = %self.name, model = model.name(), "segment model replaced");
        self.model = model;
        self.entries = entries;
        self.order = order;
        Ok(())
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[allow(clippy::result_large_err)]
    fn insert(&mut self, record: Record, overwrite: bool) -> Result<Option<Record>> {
        let key = Key::from(record.key());
        if self.entries.contains_key(&key) {
            if !overwrite {
                return Err(self.duplicate(record.key()));
            }
            self.touch(&key);
            let previous = self.entries.insert(key, Entry { record, fetches: 0 });
            return Ok(previous.map(|entry| entry.record));
        }

        if self.max_size.is_some_and(|max| self.entries.len() >= max) {
            if !self.make_space {
                return Err(self.error(
                    SegmentErrorKind::Full,
                    format!("segment is full ({} records)", self.entries.len()),
                ));
            }
            self.evict_oldest();
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Entry { record, fetches: 0 });
        Ok(None)
    }

    fn fetch(&mut self, key: &Key) -> Option<Record> {
        let entry = self.entries.get_mut(key)?;
        entry.fetches += 1;
        let fetches = entry.fetches;

        let config = self.model.config();
        config.record_fetch();
        if config.exhausts(fetches) {
            self.invalidated_last = true;
            tracing::debug!(segment = %self.name, fetches, "entry invalidated on fetch");
            return self.unlink(key);
        }
        self.invalidated_last = false;
        self.touch(key);
        self.entries.get(key).map(|entry| entry.record.clone())
    }

    fn oldest_entries(&self) -> impl DoubleEndedIterator<Item = &Entry> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    /// Move `key` to the most recently accessed end.
    fn touch(&mut self, key: &Key) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }

    fn unlink(&mut self, key: &Key) -> Option<Record> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry.record)
    }

    fn evict_oldest(&mut self) -> Option<Record> {
        let key = self.order.pop_front()?;
        let entry = self.entries.remove(&key)?;
        tracing::debug!(segment = %self.name, key = %entry.record.key(), "evicted to make space");
        Some(entry.record)
    }

    /// Coerce a lookup value the way the primary key field stores it.
    /// Values the field rejects are looked up as given.
    fn key_of(&self, value: Value) -> Key {
        match validate_field(self.model.primary_key_field(), value.clone()) {
            Ok(coerced) => Key::from(&coerced),
            Err(_) => Key::from(&value),
        }
    }

    fn duplicate(&self, key: &Value) -> Error {
        self.error(
            SegmentErrorKind::DuplicateKey,
            format!("an entry with key {key} already exists"),
        )
    }

    fn error(&self, kind: SegmentErrorKind, message: impl Into<String>) -> Error {
        Error::Segment(SegmentError {
            kind,
            segment: self.name.clone(),
            message: message.into(),
        })
    }
}

fn cap(limit: usize) -> usize {
    if limit == 0 { usize::MAX } else { limit }
}
