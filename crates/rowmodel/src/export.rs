//! The write pipeline.
//!
//! Every item is validated through the location's model, projected onto the
//! table's columns and inserted in its own transaction. A failing item is
//! rolled back and reported; the items around it are unaffected.

use std::collections::BTreeSet;
use std::sync::Arc;

use rowmodel_core::{
    Backend, DumpOptions, Error, InsertStatement, ModelSchema, Record, Result, Row,
    SchemaError, SchemaErrorKind, Value,
};

use crate::driver::{Driver, table_not_found};

/// Options for [`Driver::export`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Columns to write; `None` writes every table column
    pub include: Option<BTreeSet<String>>,
    /// Columns never written
    pub exclude: BTreeSet<String>,
    /// Overwrite rows with a conflicting key
    pub replace: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include: None,
            exclude: BTreeSet::new(),
            replace: true,
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn include(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn exclude(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    fn keeps(&self, column: &str) -> bool {
        self.include.as_ref().is_none_or(|inc| inc.contains(column))
            && !self.exclude.contains(column)
    }
}

/// An item to export.
#[derive(Debug, Clone)]
pub enum ExportItem {
    /// A validated record; re-validated only if it belongs to another model
    Record(Record),
    /// Named values, validated through the location's model
    Row(Row),
    /// A JSON object, validated through the location's model
    Json(serde_json::Value),
}

impl From<Record> for ExportItem {
    fn from(record: Record) -> Self {
        ExportItem::Record(record)
    }
}

impl From<Row> for ExportItem {
    fn from(row: Row) -> Self {
        ExportItem::Row(row)
    }
}

impl From<serde_json::Value> for ExportItem {
    fn from(json: serde_json::Value) -> Self {
        ExportItem::Json(json)
    }
}

impl ExportItem {
    #[allow(clippy::result_large_err)]
    pub(crate) fn into_record(self, model: &Arc<ModelSchema>) -> Result<Record> {
        let record = match self {
            ExportItem::Record(record) if Arc::ptr_eq(record.schema(), model) => record,
            ExportItem::Record(record) => {
                model.validate_row(&record.dump_with(&DumpOptions::new()))?
            }
            ExportItem::Row(row) => model.validate_row(&row)?,
            ExportItem::Json(json) => model.validate_json(&json)?,
        };
        Ok(record)
    }
}

/// What happened to one exported item.
#[derive(Debug)]
pub enum ItemOutcome {
    Committed { index: usize },
    Failed { index: usize, error: Error },
}

impl ItemOutcome {
    pub fn index(&self) -> usize {
        match self {
            ItemOutcome::Committed { index } | ItemOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, ItemOutcome::Committed { .. })
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ItemOutcome::Failed { error, .. } => Some(error),
            ItemOutcome::Committed { .. } => None,
        }
    }
}

/// Per-item outcomes of one export, in input order.
#[derive(Debug, Default)]
pub struct ExportReport {
    outcomes: Vec<ItemOutcome>,
}

impl ExportReport {
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.committed()
    }

    /// `(index, error)` for every item that was not committed.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.index(), e)))
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl<B: Backend> Driver<B> {
    /// Write items to a location, one transaction per item.
    ///
    /// Fails before touching any item when no model is bound to the location,
    /// or when the model does not declare every column of the table. After
    /// that, item failures are reported in the returned [`ExportReport`].
    #[allow(clippy::result_large_err)]
    pub fn export<I>(
        &mut self,
        location: &str,
        items: I,
        options: &ExportOptions,
    ) -> Result<ExportReport>
    where
        I: IntoIterator,
        I::Item: Into<ExportItem>,
    {
        let model = self.fitting_model(location)?;
        let table = self.table_for(location).to_string();
        let header = self
            .columns(&table)
            .ok_or_else(|| table_not_found(location, &table))?;
        let columns: Vec<String> = header
            .names()
            .iter()
            .filter(|c| options.keeps(c))
            .cloned()
            .collect();
        if columns.is_empty() {
            return Err(Error::Schema(
                SchemaError::new(
                    SchemaErrorKind::EmptyProjection,
                    model.name(),
                    format!("include/exclude leave no column of table '{table}' to write"),
                )
                .with_fields(header.names().to_vec()),
            ));
        }

        let mut report = ExportReport::default();
        for (index, item) in items.into_iter().enumerate() {
            let outcome = match item.into().into_record(&model) {
                Ok(record) => {
                    let values = columns
                        .iter()
                        .map(|c| record.value(c).unwrap_or(Value::Null))
                        .collect();
                    let statement = InsertStatement::new(&table, columns.clone(), values)
                        .replace(options.replace);
                    self.insert_one(location, index, &statement)
                }
                Err(error) => {
                    tracing::warn!(location, index, error = %error, "export item rejected");
                    ItemOutcome::Failed { index, error }
                }
            };
            report.outcomes.push(outcome);
        }

        tracing::debug!(
            location,
            table = %table,
            committed = report.committed(),
            failed = report.failed(),
            "export finished"
        );
        Ok(report)
    }

    fn insert_one(
        &self,
        location: &str,
        index: usize,
        statement: &InsertStatement,
    ) -> ItemOutcome {
        if let Err(error) = self.backend.begin() {
            tracing::error!(
                location,
                table = %statement.table,
                index,
                error = %error,
                "export begin failed"
            );
            return ItemOutcome::Failed { index, error };
        }

        let result = self
            .backend
            .insert(statement)
            .and_then(|_| self.backend.commit());
        match result {
            Ok(()) => ItemOutcome::Committed { index },
            Err(error) => {
                if let Err(rollback) = self.backend.rollback() {
                    tracing::warn!(location, index, error = %rollback, "rollback failed");
                }
                tracing::error!(
                    location,
                    table = %statement.table,
                    index,
                    error = %error,
                    "export item failed, rolled back"
                );
                ItemOutcome::Failed { index, error }
            }
        }
    }
}
