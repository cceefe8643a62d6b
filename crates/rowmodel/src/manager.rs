//! Named segments, and the links between them.
//!
//! A [`Manager`] owns segments by name. Reading through the manager expands
//! partial fields: the key a partial field holds is looked up in the segment
//! its model maps the field to, and the record found there replaces the key.

use std::sync::Arc;

use rowmodel_core::{
    Backend, Error, ModelSchema, Record, Result, SegmentError, SegmentErrorKind, Value,
};

use crate::driver::Driver;
use crate::export::{ExportItem, ExportOptions, ExportReport};
use crate::fetch::FetchOptions;
use crate::segment::Segment;

/// Segments by name, in the order they were added.
#[derive(Debug, Default)]
pub struct Manager {
    segments: Vec<Segment>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manage `segment`. Fails if a segment with the same name is managed.
    #[allow(clippy::result_large_err)]
    pub fn add_segment(&mut self, segment: Segment) -> Result<()> {
        if self.contains(segment.name()) {
            return Err(segment_error(
                SegmentErrorKind::DuplicateSegment,
                segment.name(),
                "a segment with this name is already managed",
            ));
        }
        tracing::debug!(segment = segment.name(), model = segment.model().name(), "segment added");
        self.segments.push(segment);
        Ok(())
    }

    /// Add an empty segment with default capacity.
    #[allow(clippy::result_large_err)]
    pub fn create_segment(
        &mut self,
        name: impl Into<String>,
        model: Arc<ModelSchema>,
    ) -> Result<&mut Segment> {
        let index = self.segments.len();
        self.add_segment(Segment::new(name, model))?;
        Ok(&mut self.segments[index])
    }

    #[allow(clippy::result_large_err)]
    pub fn remove_segment(&mut self, name: &str) -> Result<Segment> {
        let index = self.position(name)?;
        tracing::debug!(segment = name, "segment removed");
        Ok(self.segments.remove(index))
    }

    /// Put `segment` in place of the one with its name, or add it.
    pub fn replace_segment(&mut self, segment: Segment) -> Option<Segment> {
        match self.segments.iter().position(|s| s.name() == segment.name()) {
            Some(index) => Some(std::mem::replace(&mut self.segments[index], segment)),
            None => {
                self.segments.push(segment);
                None
            }
        }
    }

    #[allow(clippy::result_large_err)]
    pub fn rename_segment(&mut self, name: &str, new_name: &str) -> Result<()> {
        if name != new_name && self.contains(new_name) {
            return Err(segment_error(
                SegmentErrorKind::DuplicateSegment,
                new_name,
                "a segment with this name is already managed",
            ));
        }
        self.segment_mut(name)?.rename(new_name);
        Ok(())
    }

    /// Re-validate a segment's records through `model` and adopt it.
    #[allow(clippy::result_large_err)]
    pub fn replace_model(&mut self, name: &str, model: Arc<ModelSchema>) -> Result<()> {
        self.segment_mut(name)?.set_model(model)
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name() == name)
    }

    #[allow(clippy::result_large_err)]
    pub fn segment_mut(&mut self, name: &str) -> Result<&mut Segment> {
        let index = self.position(name)?;
        Ok(&mut self.segments[index])
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(Segment::name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelSchema>> {
        self.segments.iter().map(Segment::model)
    }

    pub fn model(&self, name: &str) -> Option<&Arc<ModelSchema>> {
        self.segment(name).map(Segment::model)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.segment(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Add every item to a segment, stopping at the first failure.
    ///
    /// Returns the number of items added.
    #[allow(clippy::result_large_err)]
    pub fn populate<I>(&mut self, name: &str, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<ExportItem>,
    {
        let segment = self.segment_mut(name)?;
        let mut added = 0;
        for item in items {
            segment.add(item)?;
            added += 1;
        }
        Ok(added)
    }

    /// Fetch a record from a segment with its partial fields expanded.
    ///
    /// The record counts one fetch in its own segment, as with
    /// [`Segment::get`]. Referenced records are read without counting and
    /// are expanded in turn. A key stays a key when its segment is not
    /// managed, holds no record under it, or holds a model other than the
    /// one the field targets.
    #[allow(clippy::result_large_err)]
    pub fn get(&mut self, name: &str, key: impl Into<Value>) -> Result<Option<Record>> {
        let Some(record) = self.segment_mut(name)?.get(key) else {
            return Ok(None);
        };
        Ok(Some(self.expand(record)))
    }

    /// Fill a segment from a driver location.
    ///
    /// The fetch binds the segment's model to the location when `options`
    /// names no model and none is bound. Rows are read in full and validated
    /// through the segment's model; a backend failure, an invalid row or a
    /// duplicate key stops the fill. Returns the number of records added.
    #[allow(clippy::result_large_err)]
    pub fn populate_using_driver<B: Backend>(
        &mut self,
        name: &str,
        driver: &mut Driver<B>,
        location: &str,
        mut options: FetchOptions,
    ) -> Result<usize> {
        let segment = self.segment_mut(name)?;
        if options.model.is_none() {
            options.model = Some(Arc::clone(segment.model()));
        }
        options.no_handle = false;
        options.ignore_model = true;

        let Some(records) = driver.fetch(location, options).into_result()? else {
            return Ok(0);
        };
        let mut added = 0;
        for row in records {
            if let Some(row) = row?.into_row() {
                segment.add(row)?;
                added += 1;
            }
        }
        tracing::debug!(segment = name, location, added, "segment populated");
        Ok(added)
    }

    /// Export a segment's records, least recently accessed first.
    #[allow(clippy::result_large_err)]
    pub fn export_segment<B: Backend>(
        &self,
        name: &str,
        driver: &mut Driver<B>,
        location: &str,
        options: &ExportOptions,
    ) -> Result<ExportReport> {
        let segment = self.segment(name).ok_or_else(|| unknown_segment(name))?;
        driver.export(location, segment.oldest().cloned(), options)
    }

    // Partial targets are defined before the models that reference them,
    // so expansion always terminates.
    fn expand(&self, mut record: Record) -> Record {
        let schema = Arc::clone(record.schema());
        for field in schema.partial_fields() {
            let Some(segment) = schema.segment_for(field).and_then(|s| self.segment(s)) else {
                continue;
            };
            let Some(key) = record.value(field).filter(|k| !k.is_null()) else {
                continue;
            };
            if let Some(target) = segment.peek(key).cloned() {
                record.attach(field, self.expand(target));
            }
        }
        record
    }

    #[allow(clippy::result_large_err)]
    fn position(&self, name: &str) -> Result<usize> {
        self.segments
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| unknown_segment(name))
    }
}

fn unknown_segment(name: &str) -> Error {
    segment_error(SegmentErrorKind::UnknownSegment, name, "no segment with this name")
}

fn segment_error(kind: SegmentErrorKind, segment: &str, message: &str) -> Error {
    Error::Segment(SegmentError {
        kind,
        segment: segment.to_string(),
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverBuilder;
    use crate::testing::{MemoryBackend, blog_models, define_user, user_model};
    use rowmodel_core::{Config, FieldDef, FieldValue, ModelBuilder, Registry};
    use serde_json::json;

    fn blog() -> Manager {
        let (user, post) = blog_models();
        let mut manager = Manager::new();
        manager.create_segment("users", user).unwrap();
        manager.create_segment("posts", post).unwrap();
        manager
    }

    #[test]
    fn segments_are_kept_in_insertion_order() {
        let mut manager = blog();
        assert_eq!(manager.names().collect::<Vec<_>>(), ["users", "posts"]);

        let err = manager
            .add_segment(Segment::new("users", user_model()))
            .unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::DuplicateSegment));

        manager.add_segment(Segment::new("extra", user_model())).unwrap();
        manager.rename_segment("extra", "spare").unwrap();
        assert_eq!(
            manager.names().collect::<Vec<_>>(),
            ["users", "posts", "spare"]
        );
        let err = manager.rename_segment("spare", "users").unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::DuplicateSegment));

        let removed = manager.remove_segment("spare").unwrap();
        assert_eq!(removed.name(), "spare");
        assert!(!manager.contains("spare"));
        let err = manager.remove_segment("spare").unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::UnknownSegment));
    }

    #[test]
    fn replace_segment_keeps_position() {
        let mut manager = blog();
        let fresh = Segment::new("users", user_model()).max_size(5);
        let old = manager.replace_segment(fresh).unwrap();
        assert_eq!(old.capacity(), Some(crate::segment::DEFAULT_MAX_SIZE));
        assert_eq!(manager.names().collect::<Vec<_>>(), ["users", "posts"]);
        assert_eq!(manager.segment("users").unwrap().capacity(), Some(5));

        assert!(manager.replace_segment(Segment::new("more", user_model())).is_none());
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn models_follow_their_segments() {
        let mut manager = blog();
        let names: Vec<&str> = manager.models().map(|m| m.name()).collect();
        assert_eq!(names, ["User", "Post"]);

        let alternate = Registry::new()
            .define(
                ModelBuilder::new("Alternate")
                    .field(FieldDef::int("id"))
                    .config(Config::new("id")),
            )
            .unwrap();
        manager.replace_model("users", Arc::clone(&alternate)).unwrap();
        assert!(Arc::ptr_eq(manager.model("users").unwrap(), &alternate));
    }

    #[test]
    fn get_expands_partial_keys_through_their_segment() {
        let mut manager = blog();
        manager.populate("users", [json!({"id": 0, "name": "Foo"})]).unwrap();
        manager
            .populate(
                "posts",
                [
                    json!({"id": 0, "title": "hello", "author": 0}),
                    json!({"id": 1, "title": "orphan", "author": 9}),
                ],
            )
            .unwrap();

        let post = manager.get("posts", 0).unwrap().unwrap();
        let author = post.get("author").unwrap().as_instance().unwrap();
        assert_eq!(author.value("name"), Some(Value::from("Foo")));
        assert_eq!(post.value("author"), Some(Value::Int(0)));
        // the referenced record is read without counting a fetch
        assert_eq!(manager.segment("users").unwrap().fetch_count(0), Some(0));

        let orphan = manager.get("posts", 1).unwrap().unwrap();
        assert_eq!(orphan.get("author"), Some(&FieldValue::Scalar(Value::Int(9))));

        assert!(manager.get("posts", 2).unwrap().is_none());
        let err = manager.get("comments", 0).unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::UnknownSegment));
    }

    #[test]
    fn references_expand_through_every_level() {
        let mut registry = Registry::new();
        let user = define_user(&mut registry);
        let post = registry
            .define(
                ModelBuilder::new("Post")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::text("title"))
                    .field(FieldDef::partial("author", "User"))
                    .config(Config::new("id").partial("author", "users")),
            )
            .unwrap();
        let comment = registry
            .define(
                ModelBuilder::new("Comment")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::partial("post", "Post").optional())
                    .config(Config::new("id").partial("post", "posts")),
            )
            .unwrap();
        let mut manager = Manager::new();
        manager.create_segment("users", user).unwrap();
        manager.create_segment("posts", post).unwrap();
        manager.create_segment("comments", comment).unwrap();
        manager.populate("users", [json!({"id": 1, "name": "ann"})]).unwrap();
        manager
            .populate("posts", [json!({"id": 10, "title": "t", "author": 1})])
            .unwrap();
        manager
            .populate("comments", [json!({"id": 100, "post": 10}), json!({"id": 101})])
            .unwrap();

        let comment = manager.get("comments", 100).unwrap().unwrap();
        let post = comment.get("post").unwrap().as_instance().unwrap();
        let author = post.get("author").unwrap().as_instance().unwrap();
        assert_eq!(author.value("name"), Some(Value::from("ann")));

        let bare = manager.get("comments", 101).unwrap().unwrap();
        assert!(bare.get("post").unwrap().is_null());
    }

    #[test]
    fn populate_stops_at_the_first_bad_item() {
        let mut manager = blog();
        let err = manager
            .populate(
                "users",
                [
                    json!({"id": 1, "name": "a"}),
                    json!({"id": 1, "name": "b"}),
                    json!({"id": 2, "name": "c"}),
                ],
            )
            .unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::DuplicateKey));
        assert_eq!(manager.segment("users").unwrap().len(), 1);
    }

    #[test]
    fn populate_using_driver_reads_full_rows() {
        let (user, _) = blog_models();
        let hidden = Registry::new()
            .define(
                ModelBuilder::new("Account")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::text("secret"))
                    .config(Config::new("id").exclude(["secret"])),
            )
            .unwrap();
        let backend = MemoryBackend::new()
            .table("user_table", &["id", "name"])
            .row("user_table", vec![Value::Int(1), Value::from("ann")])
            .row("user_table", vec![Value::Int(2), Value::from("bob")])
            .table("accounts", &["id", "secret"])
            .row("accounts", vec![Value::Int(7), Value::from("pw")]);
        let mut driver = DriverBuilder::new()
            .map("users", "user_table")
            .build(backend)
            .unwrap();

        let mut manager = Manager::new();
        manager.create_segment("users", Arc::clone(&user)).unwrap();
        manager.create_segment("accounts", hidden).unwrap();

        let added = manager
            .populate_using_driver("users", &mut driver, "users", FetchOptions::new())
            .unwrap();
        assert_eq!(added, 2);
        let bound = driver.model_for("users").unwrap();
        assert!(Arc::ptr_eq(&bound, &user));

        // excluded fields are still cached
        manager
            .populate_using_driver("accounts", &mut driver, "accounts", FetchOptions::new())
            .unwrap();
        let account = manager.segment("accounts").unwrap().peek(7).unwrap();
        assert_eq!(account.value("secret"), Some(Value::from("pw")));
    }

    #[test]
    fn populate_using_driver_surfaces_backend_failures() {
        let backend = MemoryBackend::new()
            .table("user_table", &["id", "name"])
            .fail_select();
        let mut driver = Driver::new(backend).unwrap();
        let mut manager = blog();
        let err = manager
            .populate_using_driver("users", &mut driver, "user_table", FetchOptions::new())
            .unwrap_err();
        assert!(err.is_backend_error());

        let empty = MemoryBackend::new().table("user_table", &["id", "name"]);
        let mut driver = Driver::new(empty).unwrap();
        let added = manager
            .populate_using_driver("users", &mut driver, "user_table", FetchOptions::new())
            .unwrap();
        assert_eq!(added, 0);
    }

    #[test]
    fn export_segment_writes_oldest_first() {
        let mut manager = blog();
        manager
            .populate(
                "users",
                [json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})],
            )
            .unwrap();
        manager.segment_mut("users").unwrap().get(1).unwrap();

        let user = Arc::clone(manager.model("users").unwrap());
        let backend = MemoryBackend::new().table("user_table", &["id", "name"]);
        let mut driver = DriverBuilder::new()
            .model("users", user)
            .map("users", "user_table")
            .build(backend)
            .unwrap();
        let report = manager
            .export_segment("users", &mut driver, "users", &ExportOptions::new())
            .unwrap();
        assert_eq!(report.committed(), 2);
        let ids: Vec<Value> = driver
            .backend()
            .rows("user_table")
            .into_iter()
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(ids, [Value::Int(2), Value::Int(1)]);

        let err = manager
            .export_segment("nope", &mut driver, "users", &ExportOptions::new())
            .unwrap_err();
        assert_eq!(err.segment_kind(), Some(SegmentErrorKind::UnknownSegment));
    }
}
