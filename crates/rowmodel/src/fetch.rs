//! The read pipeline.
//!
//! `fetch` resolves a location to its table, runs one selection and hands
//! back a single-pass [`Records`] iterator. Rows are zipped with the table's
//! reflected header and, when a model is bound, validated into records as
//! they are pulled.
//!
//! Backend failures never propagate as `Err` from `fetch`: they are logged
//! and returned as [`Fetched::BackendFailed`]. Validation failures surface
//! per row, as `Err` items of the iterator.

use std::sync::Arc;

use rowmodel_core::{Backend, ColumnInfo, Error, ModelSchema, Result, Row, SelectQuery, Value};

use crate::driver::{Driver, table_not_found};

/// Options for [`Driver::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Raw predicate placed after `WHERE`
    pub condition: Option<String>,
    /// Positional parameters bound to `?` placeholders
    pub params: Vec<Value>,
    pub limit: Option<usize>,
    /// Model to bind to the location if none is bound yet
    pub model: Option<Arc<ModelSchema>>,
    /// Complete statement replacing the generated selection
    pub raw: Option<String>,
    /// Return positional rows, skipping header zip and model conversion
    pub no_handle: bool,
    /// Return named rows even when a model is bound
    pub ignore_model: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    #[must_use]
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Cap the number of rows. Zero means no cap.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    #[must_use]
    pub fn model(mut self, model: Arc<ModelSchema>) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.raw = Some(sql.into());
        self
    }

    #[must_use]
    pub fn no_handle(mut self) -> Self {
        self.no_handle = true;
        self
    }

    #[must_use]
    pub fn ignore_model(mut self) -> Self {
        self.ignore_model = true;
        self
    }

    fn to_query(&self, table: &str) -> SelectQuery {
        let mut query = SelectQuery::new(table).params(self.params.clone());
        if let Some(condition) = &self.condition {
            query = query.condition(condition.clone());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(raw) = &self.raw {
            query = query.raw(raw.clone());
        }
        query
    }
}

/// The outcome of a fetch.
#[derive(Debug)]
pub enum Fetched<T> {
    /// At least one row matched
    Rows(T),
    /// The selection matched nothing
    Empty,
    /// The backend failed; the error has already been logged
    BackendFailed(Error),
}

impl<T> Fetched<T> {
    pub fn is_rows(&self) -> bool {
        matches!(self, Fetched::Rows(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Fetched::Empty)
    }

    pub fn is_backend_failed(&self) -> bool {
        matches!(self, Fetched::BackendFailed(_))
    }

    /// The rows, if any. Backend errors are dropped.
    pub fn rows(self) -> Option<T> {
        match self {
            Fetched::Rows(rows) => Some(rows),
            Fetched::Empty | Fetched::BackendFailed(_) => None,
        }
    }

    pub fn backend_error(&self) -> Option<&Error> {
        match self {
            Fetched::BackendFailed(e) => Some(e),
            Fetched::Rows(_) | Fetched::Empty => None,
        }
    }

    /// Turn a backend failure back into an error.
    #[allow(clippy::result_large_err)]
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Fetched::Rows(rows) => Ok(Some(rows)),
            Fetched::Empty => Ok(None),
            Fetched::BackendFailed(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Rows(rows) => Fetched::Rows(f(rows)),
            Fetched::Empty => Fetched::Empty,
            Fetched::BackendFailed(e) => Fetched::BackendFailed(e),
        }
    }
}

/// One fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRow {
    /// Positional values, as the backend returned them
    Raw(Vec<Value>),
    /// Named values, canonicalized through the bound model when there is one
    Mapped(Row),
}

impl FetchedRow {
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            FetchedRow::Mapped(row) => Some(row),
            FetchedRow::Raw(_) => None,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            FetchedRow::Mapped(row) => Some(row),
            FetchedRow::Raw(_) => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            FetchedRow::Raw(values) => values,
            FetchedRow::Mapped(row) => row.into_values(),
        }
    }

    /// Look up a column by name. Raw rows have no names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.as_row().and_then(|row| row.get_by_name(column))
    }
}

#[derive(Debug)]
enum Conversion {
    Raw,
    Named {
        columns: Arc<ColumnInfo>,
        model: Option<Arc<ModelSchema>>,
    },
}

/// A single-pass sequence of fetched rows.
///
/// Conversion happens as rows are pulled, so a row that fails validation
/// does not stop the rows after it.
#[derive(Debug)]
pub struct Records {
    rows: std::vec::IntoIter<Vec<Value>>,
    conversion: Conversion,
}

impl Records {
    fn raw(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: rows.into_iter(),
            conversion: Conversion::Raw,
        }
    }

    fn named(
        rows: Vec<Vec<Value>>,
        columns: Arc<ColumnInfo>,
        model: Option<Arc<ModelSchema>>,
    ) -> Self {
        Self {
            rows: rows.into_iter(),
            conversion: Conversion::Named { columns, model },
        }
    }

    /// The model rows are validated through, if any.
    pub fn model(&self) -> Option<&Arc<ModelSchema>> {
        match &self.conversion {
            Conversion::Named { model, .. } => model.as_ref(),
            Conversion::Raw => None,
        }
    }

    #[allow(clippy::result_large_err)]
    fn convert(&self, values: Vec<Value>) -> Result<FetchedRow> {
        let Conversion::Named { columns, model } = &self.conversion else {
            return Ok(FetchedRow::Raw(values));
        };
        let row = Row::with_columns(Arc::clone(columns), values);
        let Some(model) = model else {
            return Ok(FetchedRow::Mapped(row));
        };

        let record = model.validate_row(&row)?;
        // model-wide tally; per-entry invalidation is enforced by segments
        model.config().record_fetch();
        Ok(FetchedRow::Mapped(record.dump()))
    }
}

impl Iterator for Records {
    type Item = Result<FetchedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let values = self.rows.next()?;
        Some(self.convert(values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Records {}

impl<B: Backend> Driver<B> {
    /// Select rows from a location.
    ///
    /// A model passed in `options` is bound to the location first, unless
    /// one is already bound.
    pub fn fetch(&mut self, location: &str, options: FetchOptions) -> Fetched<Records> {
        if let Some(model) = &options.model {
            self.bind_if_unbound(location, model);
        }

        let table = self.table_for(location).to_string();
        let query = options.to_query(&table);
        let rows = match self.backend.select(&query) {
            Ok(rows) => rows,
            Err(error) => {
                tracing::error!(location, table = %table, error = %error, "fetch failed");
                return Fetched::BackendFailed(error);
            }
        };
        tracing::debug!(location, table = %table, rows = rows.len(), "fetched");

        if rows.is_empty() {
            return Fetched::Empty;
        }
        if options.no_handle {
            return Fetched::Rows(Records::raw(rows));
        }

        let Some(columns) = self.columns(&table) else {
            let error = table_not_found(location, &table);
            tracing::error!(location, table = %table, error = %error, "fetch failed");
            return Fetched::BackendFailed(error);
        };

        let model = if options.ignore_model {
            None
        } else {
            self.model_for(location)
        };
        Fetched::Rows(Records::named(rows, columns, model))
    }

    /// Select at most one row from a location.
    ///
    /// Validation errors for that row are returned as `Err`; backend
    /// failures come back as [`Fetched::BackendFailed`] as with `fetch`.
    #[allow(clippy::result_large_err)]
    pub fn fetch_one(
        &mut self,
        location: &str,
        options: FetchOptions,
    ) -> Result<Fetched<FetchedRow>> {
        match self.fetch(location, options.limit(1)) {
            Fetched::Rows(mut records) => match records.next() {
                Some(row) => Ok(Fetched::Rows(row?)),
                None => Ok(Fetched::Empty),
            },
            Fetched::Empty => Ok(Fetched::Empty),
            Fetched::BackendFailed(e) => Ok(Fetched::BackendFailed(e)),
        }
    }
}
