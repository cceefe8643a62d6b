//! The driver: location resolution and model binding over one backend.
//!
//! A [`Driver`] reflects the backend's tables once, when it is built, and
//! keeps that header snapshot for its whole lifetime. Locations name tables
//! either directly or through the [`LocationMap`]; each location may have a
//! model bound to it. The read and write pipelines live in
//! [`crate::fetch`] and [`crate::export`].
//!
//! A driver owns a single backend connection and is not reentrant: every
//! operation takes `&mut self` and runs to completion.

use std::collections::HashMap;
use std::sync::Arc;

use rowmodel_core::{
    Backend, ColumnInfo, Error, IntegrityError, ModelSchema, Result, SchemaError,
    SchemaErrorKind,
};

use crate::location::LocationMap;

/// Configures the initial state of a [`Driver`].
#[derive(Debug, Default)]
pub struct DriverBuilder {
    models: Vec<(String, Arc<ModelSchema>)>,
    maps: Vec<(String, String)>,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `model` to `location`.
    pub fn model(mut self, location: impl Into<String>, model: Arc<ModelSchema>) -> Self {
        self.models.push((location.into(), model));
        self
    }

    /// Map `location` to the physical table `table`.
    pub fn map(mut self, location: impl Into<String>, table: impl Into<String>) -> Self {
        self.maps.push((location.into(), table.into()));
        self
    }

    /// Reflect `backend`'s tables and build the driver.
    #[allow(clippy::result_large_err)]
    pub fn build<B: Backend>(self, backend: B) -> Result<Driver<B>> {
        let headers = backend
            .reflect()?
            .into_iter()
            .map(|header| (header.name, Arc::new(ColumnInfo::new(header.columns))))
            .collect::<HashMap<_, _>>();
        tracing::debug!(tables = headers.len(), "reflected backend");

        let mut locations = LocationMap::new();
        locations.extend(self.maps);

        Ok(Driver {
            backend,
            headers,
            models: self.models.into_iter().collect(),
            locations,
        })
    }
}

/// Typed access to the tables of one backend.
#[derive(Debug)]
pub struct Driver<B: Backend> {
    pub(crate) backend: B,
    headers: HashMap<String, Arc<ColumnInfo>>,
    models: HashMap<String, Arc<ModelSchema>>,
    pub(crate) locations: LocationMap,
}

impl<B: Backend> Driver<B> {
    /// Build a driver with no models or location maps.
    #[allow(clippy::result_large_err)]
    pub fn new(backend: B) -> Result<Self> {
        DriverBuilder::new().build(backend)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// The reflected column names of `table`.
    pub fn header(&self, table: &str) -> Option<&[String]> {
        self.headers.get(table).map(|info| info.names())
    }

    pub(crate) fn columns(&self, table: &str) -> Option<Arc<ColumnInfo>> {
        self.headers.get(table).cloned()
    }

    /// Reflected table names, sorted.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        tables.sort_unstable();
        tables
    }

    pub fn locations(&self) -> &LocationMap {
        &self.locations
    }

    /// Merge location -> table pairs into the location map.
    pub fn map_to_model<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.locations.extend(pairs);
        tracing::debug!(maps = self.locations.len(), "location map updated");
    }

    /// Bind `model` to `location`, replacing any earlier binding.
    pub fn bind_model(&mut self, location: impl Into<String>, model: Arc<ModelSchema>) {
        let location = location.into();
        tracing::debug!(location = %location, model = model.name(), "model bound");
        self.models.insert(location, model);
    }

    /// Bind `model` to `location` unless a model already resolves there.
    pub(crate) fn bind_if_unbound(&mut self, location: &str, model: &Arc<ModelSchema>) {
        if self.model_for(location).is_none() {
            self.bind_model(location, Arc::clone(model));
        }
    }

    /// The model bound to a location.
    ///
    /// Tried in order: the location itself, the table it maps to, the key
    /// that maps to it.
    pub fn model_for(&self, location: &str) -> Option<Arc<ModelSchema>> {
        self.models
            .get(location)
            .or_else(|| {
                self.locations
                    .table_for(location)
                    .and_then(|table| self.models.get(table))
            })
            .or_else(|| {
                self.locations
                    .key_for(location)
                    .and_then(|key| self.models.get(key))
            })
            .cloned()
    }

    /// The physical table a location names.
    pub fn table_for<'a>(&'a self, location: &'a str) -> &'a str {
        self.locations.resolve(location)
    }

    /// Is a model bound to `location` that declares every column of its table?
    pub fn model_fits(&self, location: &str) -> bool {
        self.fitting_model(location).is_ok()
    }

    /// The bound model, if it can hold every column of the location's table.
    #[allow(clippy::result_large_err)]
    pub(crate) fn fitting_model(&self, location: &str) -> Result<Arc<ModelSchema>> {
        let table = self.table_for(location);
        let Some(columns) = self.headers.get(table) else {
            return Err(table_not_found(location, table));
        };

        let Some(model) = self.model_for(location) else {
            return Err(Error::Integrity(IntegrityError {
                location: location.to_string(),
                table: table.to_string(),
                model: None,
                missing_fields: Vec::new(),
            }));
        };

        let missing = model.missing_columns(columns.names().iter().map(String::as_str));
        if missing.is_empty() {
            Ok(model)
        } else {
            Err(Error::Integrity(IntegrityError {
                location: location.to_string(),
                table: table.to_string(),
                model: Some(model.name().to_string()),
                missing_fields: missing,
            }))
        }
    }
}

/// The error for a table that was not seen when the backend was reflected.
pub(crate) fn table_not_found(location: &str, table: &str) -> Error {
    Error::Schema(
        SchemaError::new(
            SchemaErrorKind::TableNotFound,
            location,
            format!("table '{table}' was not found when the backend was reflected"),
        )
        .with_fields(vec![table.to_string()]),
    )
}
