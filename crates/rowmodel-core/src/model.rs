//! Model schemas and the registry that defines them.
//!
//! A model is a named record schema: an ordered list of [`FieldDef`]s plus a
//! [`Config`] naming the primary key, the fields hidden on fetch and the
//! segment each partial reference points at. Models are built with a
//! [`ModelBuilder`] and become usable only through [`Registry::define`],
//! which runs every definition-time check exactly once.
//!
//! # Example
//!
//! ```
//! use rowmodel_core::{Config, FieldDef, ModelBuilder, Registry};
//!
//! let mut registry = Registry::new();
//! let user = registry
//!     .define(
//!         ModelBuilder::new("User")
//!             .field(FieldDef::int("id"))
//!             .field(FieldDef::text("name"))
//!             .config(Config::new("id")),
//!     )
//!     .unwrap();
//!
//! let post = registry
//!     .define(
//!         ModelBuilder::new("Post")
//!             .field(FieldDef::int("id"))
//!             .field(FieldDef::partial("author", "User"))
//!             .config(serde_json::json!({
//!                 "search_by": "id",
//!                 "partials": {"author": "users"}
//!             })),
//!     )
//!     .unwrap();
//!
//! assert_eq!(user.config().search_by, "id");
//! assert_eq!(post.segment_for("author"), Some("users"));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use crate::Result;
use crate::error::{SchemaError, SchemaErrorKind};
use crate::field::FieldDef;
use crate::validate::validate_pattern;

/// Per-model configuration.
///
/// Everything but the fetch counter is fixed once the model is defined.
#[derive(Debug)]
pub struct Config {
    /// Name of the primary key field. Must be unique per record.
    pub search_by: String,
    /// Fields never emitted on fetch
    pub exclude: BTreeSet<String>,
    /// Partial field name -> segment (model key) it refers to
    pub partials: BTreeMap<String, String>,
    /// Fetches after which an entry counts as exhausted; negative disables
    pub invalidate_after: i64,
    fetch_count: AtomicU64,
}

impl Config {
    /// Create a configuration keyed by `search_by`.
    pub fn new(search_by: impl Into<String>) -> Self {
        Self {
            search_by: search_by.into(),
            exclude: BTreeSet::new(),
            partials: BTreeMap::new(),
            invalidate_after: -1,
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Hide these fields from fetched records.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Map a partial field to the segment it refers to.
    pub fn partial(mut self, field: impl Into<String>, segment: impl Into<String>) -> Self {
        self.partials.insert(field.into(), segment.into());
        self
    }

    /// Count an entry as exhausted after `n` fetches.
    pub fn invalidate_after(mut self, n: i64) -> Self {
        self.invalidate_after = n;
        self
    }

    /// Count one fetch. Returns true once `invalidate_after` is reached.
    pub fn record_fetch(&self) -> bool {
        let count = self.fetch_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.exhausts(count)
    }

    /// Number of fetches counted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Has the fetch counter reached `invalidate_after`?
    pub fn is_exhausted(&self) -> bool {
        self.exhausts(self.fetch_count())
    }

    /// Start counting fetches from zero again.
    pub fn reset_fetch_count(&self) {
        self.fetch_count.store(0, Ordering::Relaxed);
    }

    /// Is an entry fetched `count` times exhausted?
    pub fn exhausts(&self, count: u64) -> bool {
        u64::try_from(self.invalidate_after).is_ok_and(|limit| count >= limit)
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            search_by: self.search_by.clone(),
            exclude: self.exclude.clone(),
            partials: self.partials.clone(),
            invalidate_after: self.invalidate_after,
            fetch_count: AtomicU64::new(self.fetch_count()),
        }
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.search_by == other.search_by
            && self.exclude == other.exclude
            && self.partials == other.partials
            && self.invalidate_after == other.invalidate_after
    }
}

/// Serde shape of a raw configuration mapping.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    search_by: String,
    #[serde(default)]
    exclude: BTreeSet<String>,
    #[serde(default)]
    partials: BTreeMap<String, String>,
    #[serde(default = "RawConfig::no_invalidation")]
    invalidate_after: i64,
}

impl RawConfig {
    const fn no_invalidation() -> i64 {
        -1
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            search_by: raw.search_by,
            exclude: raw.exclude,
            partials: raw.partials,
            invalidate_after: raw.invalidate_after,
            fetch_count: AtomicU64::new(0),
        }
    }
}

/// How a model's configuration was supplied.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A JSON object with the same keys as [`Config`]
    Raw(serde_json::Value),
    /// An already-built configuration, accepted as-is
    Typed(Config),
}

impl ConfigSource {
    /// Normalize into a [`Config`].
    pub fn resolve(self, model: &str) -> std::result::Result<Config, SchemaError> {
        match self {
            ConfigSource::Typed(config) => Ok(config),
            ConfigSource::Raw(value @ serde_json::Value::Object(_)) => {
                serde_json::from_value::<RawConfig>(value)
                    .map(Config::from)
                    .map_err(|e| {
                        SchemaError::new(
                            SchemaErrorKind::InvalidConfig,
                            model,
                            format!("invalid configuration: {e}"),
                        )
                    })
            }
            ConfigSource::Raw(other) => Err(SchemaError::new(
                SchemaErrorKind::InvalidConfig,
                model,
                format!("configuration must be an object, got {other}"),
            )),
        }
    }
}

impl From<Config> for ConfigSource {
    fn from(config: Config) -> Self {
        ConfigSource::Typed(config)
    }
}

impl From<serde_json::Value> for ConfigSource {
    fn from(value: serde_json::Value) -> Self {
        ConfigSource::Raw(value)
    }
}

/// Declares a model before it is checked and registered.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    inherited: Vec<FieldDef>,
    fields: Vec<FieldDef>,
    config: Option<ConfigSource>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherited: Vec::new(),
            fields: Vec::new(),
            config: None,
        }
    }

    /// Start from `parent`'s fields, and its configuration unless one is
    /// given explicitly. Fields declared here override inherited ones of
    /// the same name.
    pub fn extends(mut self, parent: &ModelSchema) -> Self {
        self.inherited = parent.fields.clone();
        if self.config.is_none() {
            self.config = Some(ConfigSource::Typed(parent.config.clone()));
        }
        self
    }

    /// Declare a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Supply the model's configuration.
    pub fn config(mut self, config: impl Into<ConfigSource>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A checked, immutable model definition.
#[derive(Debug)]
pub struct ModelSchema {
    name: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    primary_key: usize,
    config: Config,
    partial_fields: Vec<String>,
    targets: HashMap<String, Arc<ModelSchema>>,
}

impl ModelSchema {
    /// Registry name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The field named by `Config::search_by`.
    pub fn primary_key_field(&self) -> &FieldDef {
        &self.fields[self.primary_key]
    }

    pub(crate) fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    /// Names of the partial reference fields, in declaration order.
    pub fn partial_fields(&self) -> &[String] {
        &self.partial_fields
    }

    /// The model a partial field refers to.
    pub fn partial_target(&self, field: &str) -> Option<&Arc<ModelSchema>> {
        self.targets.get(field)
    }

    /// The segment a partial field is mapped to.
    pub fn segment_for(&self, field: &str) -> Option<&str> {
        self.config.partials.get(field).map(String::as_str)
    }

    /// Columns this model does not declare. Empty when the model fits.
    pub fn missing_columns<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        columns
            .into_iter()
            .filter(|c| !self.has_field(c))
            .map(str::to_string)
            .collect()
    }

    /// Can this model hold every one of `columns`?
    pub fn fits_columns<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> bool {
        self.missing_columns(columns).is_empty()
    }
}

/// The set of defined models, addressed by name.
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, Arc<ModelSchema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a model declaration and register it.
    ///
    /// Fails with [`SchemaErrorKind::MissingConfig`] when no configuration
    /// was supplied, and with a batch error naming every offending field
    /// when partial fields are not fully mapped.
    #[allow(clippy::result_large_err)]
    pub fn define(&mut self, builder: ModelBuilder) -> Result<Arc<ModelSchema>> {
        let ModelBuilder {
            name,
            inherited,
            fields: declared,
            config,
        } = builder;

        let config = config
            .ok_or_else(|| {
                SchemaError::new(
                    SchemaErrorKind::MissingConfig,
                    &name,
                    "configuration not found",
                )
            })?
            .resolve(&name)?;

        if self.models.contains_key(&name) {
            return Err(SchemaError::new(
                SchemaErrorKind::DuplicateModel,
                &name,
                "a model with this name is already defined",
            )
            .into());
        }

        let fields = merge_fields(&name, inherited, declared)?;
        let index: HashMap<String, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        for field in &fields {
            if let Some(msg) = field.pattern.as_deref().and_then(validate_pattern) {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidPattern,
                    &name,
                    format!("field '{}': {msg}", field.name),
                )
                .with_fields(vec![field.name.clone()])
                .into());
            }
        }

        let primary_key = *index.get(&config.search_by).ok_or_else(|| {
            SchemaError::new(
                SchemaErrorKind::UnknownSearchKey,
                &name,
                format!("search_by names unknown field '{}'", config.search_by),
            )
            .with_fields(vec![config.search_by.clone()])
        })?;

        let mut partial_fields = Vec::new();
        let mut targets = HashMap::new();
        let mut invalid = Vec::new();
        for field in &fields {
            let Some(target) = field.partial_target() else {
                continue;
            };
            partial_fields.push(field.name.clone());
            match self.models.get(target) {
                Some(schema) => {
                    targets.insert(field.name.clone(), Arc::clone(schema));
                }
                None => invalid.push(field.name.clone()),
            }
        }
        if !invalid.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidPartialTarget,
                &name,
                format!(
                    "invalid model provided for partial definition: {}",
                    invalid.join(", ")
                ),
            )
            .with_fields(invalid)
            .into());
        }

        let missing: Vec<String> = partial_fields
            .iter()
            .filter(|f| !config.partials.contains_key(*f))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::MissingPartials,
                &name,
                format!("missing partial definitions for: {}", missing.join(", ")),
            )
            .with_fields(missing)
            .into());
        }

        let declared_partials: HashSet<&str> = partial_fields.iter().map(String::as_str).collect();
        let unknown: Vec<String> = config
            .partials
            .keys()
            .filter(|k| !declared_partials.contains(k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::UnknownPartials,
                &name,
                format!("partials name non-partial fields: {}", unknown.join(", ")),
            )
            .with_fields(unknown)
            .into());
        }

        let schema = Arc::new(ModelSchema {
            name: name.clone(),
            fields,
            index,
            primary_key,
            config,
            partial_fields,
            targets,
        });
        tracing::debug!(model = %name, fields = schema.fields.len(), "model defined");
        self.models.insert(name, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn merge_fields(
    model: &str,
    mut inherited: Vec<FieldDef>,
    declared: Vec<FieldDef>,
) -> std::result::Result<Vec<FieldDef>, SchemaError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for field in &declared {
        if !seen.insert(field.name.as_str()) {
            duplicates.push(field.name.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(SchemaError::new(
            SchemaErrorKind::DuplicateField,
            model,
            format!("fields declared more than once: {}", duplicates.join(", ")),
        )
        .with_fields(duplicates));
    }

    for field in declared {
        match inherited.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => inherited.push(field),
        }
    }
    Ok(inherited)
}
