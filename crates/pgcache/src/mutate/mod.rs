//! Module: mutate
//! Responsibility: apply one insert/update/upsert/delete request to every
//! cached query of the mutated table.
//! Does not own: storage (the `CacheAdapter` does) or key layout (the codec).
//!
//! Invariants:
//! - A request that cannot identify its rows is rejected before any entry
//!   is read.
//! - A failure confined to one entry never aborts the others.
//! - Adapter failures propagate unchanged.

mod entry;
mod order;


use crate::{
    cache::CacheAdapter,
    codec::KeyCodec,
    config::{EngineConfig, UnresolvedPolicy},
    error::InternalError,
    identity::missing_key_column,
    obs::sink::{self, MetricsEvent, MutationSpan},
    row::Row,
};
use entry::{EntryContext, EntryOutcome, apply_entry};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

// re-exports
pub use entry::InvalidationReason;

///
/// MutationError
///

#[derive(Debug, ThisError)]
pub enum MutationError {
    #[error("mutation on '{table}' names no primary-key columns")]
    EmptyPrimaryKey { table: String },

    #[error("payload row {index} does not supply primary-key column '{column}'")]
    IdentityAmbiguous { index: usize, column: String },

    #[error(transparent)]
    Cache(#[from] InternalError),
}

///
/// Operation
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }

    /// Inserts may rely on server-assigned keys; everything else must
    /// name the rows it touches.
    #[must_use]
    pub const fn requires_key(self) -> bool {
        !matches!(self, Self::Insert)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// MutationRequest
///
/// One user-triggered write, consumed synchronously by the engine.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MutationRequest {
    /// `None` targets the configured default schema.
    pub schema: Option<String>,
    pub table: String,
    pub operation: Operation,
    pub payload: Vec<Row>,
    pub primary_keys: Vec<String>,
}

impl MutationRequest {
    #[must_use]
    pub fn new(table: impl Into<String>, operation: Operation) -> Self {
        Self {
            schema: None,
            table: table.into(),
            operation,
            payload: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn insert(table: impl Into<String>) -> Self {
        Self::new(table, Operation::Insert)
    }

    #[must_use]
    pub fn update(table: impl Into<String>) -> Self {
        Self::new(table, Operation::Update)
    }

    #[must_use]
    pub fn upsert(table: impl Into<String>) -> Self {
        Self::new(table, Operation::Upsert)
    }

    #[must_use]
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(table, Operation::Delete)
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn row(mut self, row: Row) -> Self {
        self.payload.push(row);
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.payload.extend(rows);
        self
    }

    #[must_use]
    pub fn primary_keys<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = columns.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<(), MutationError> {
        if self.primary_keys.is_empty() {
            return Err(MutationError::EmptyPrimaryKey {
                table: self.table.clone(),
            });
        }
        if !self.operation.requires_key() {
            return Ok(());
        }

        for (index, row) in self.payload.iter().enumerate() {
            if let Some(column) = missing_key_column(&self.primary_keys, row) {
                return Err(MutationError::IdentityAmbiguous {
                    index,
                    column: column.to_string(),
                });
            }
        }

        Ok(())
    }
}

///
/// MutationOutcome
///
/// Keys the engine rewrote and keys it marked stale, in scan order.
/// Under `UnresolvedPolicy::Skip` unresolved entries appear in neither.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MutationOutcome {
    pub updated_keys: Vec<String>,
    pub invalidated_keys: Vec<String>,
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.updated_keys.is_empty() && self.invalidated_keys.is_empty()
    }
}

///
/// MutationEngine
///
/// Stateless between calls; holds only configuration and the key codec.
///

#[derive(Clone, Debug)]
pub struct MutationEngine {
    config: EngineConfig,
    codec: KeyCodec,
}

impl MutationEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let codec = KeyCodec::new(config.key_prefix.clone());

        Self { config, codec }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    fn debug_log(&self, s: impl Into<String>) {
        if self.config.debug {
            println!("[debug] {}", s.into());
        }
    }

    /// Apply `request` to every cached query of its table.
    pub fn apply<A>(
        &self,
        adapter: &mut A,
        request: &MutationRequest,
    ) -> Result<MutationOutcome, MutationError>
    where
        A: CacheAdapter + ?Sized,
    {
        let table = request.table.as_str();
        if let Err(err) = request.validate() {
            sink::record(MetricsEvent::RequestRejected { table });
            self.debug_log(format!("rejected {} on {table}: {err}", request.operation));
            return Err(err);
        }

        let schema = request
            .schema
            .as_deref()
            .unwrap_or(&self.config.default_schema);
        let mut span = MutationSpan::new(request.operation, table);
        let mut outcome = MutationOutcome::default();

        let entries = adapter.scan(table)?;
        sink::record(MetricsEvent::EntriesScanned {
            table,
            entries: u64::try_from(entries.len()).unwrap_or(u64::MAX),
        });
        self.debug_log(format!(
            "{} on {schema}.{table}: {} payload row(s), {} candidate entries",
            request.operation,
            request.payload.len(),
            entries.len()
        ));

        for (key, entry) in entries {
            let descriptor = match self.codec.decode(&key) {
                Ok(descriptor) if descriptor.schema == schema && descriptor.table == table => {
                    descriptor
                }
                Ok(_) | Err(_) => {
                    sink::record(MetricsEvent::ForeignKeySkipped { table });
                    continue;
                }
            };

            let ctx = EntryContext {
                descriptor: &descriptor,
                primary_keys: &request.primary_keys,
            };

            match apply_entry(&ctx, request.operation, &request.payload, &entry) {
                EntryOutcome::Unchanged => {}
                EntryOutcome::Updated(next) => {
                    adapter.commit(&key, next)?;
                    sink::record(MetricsEvent::EntryUpdated { table });
                    self.debug_log(format!("updated {key}"));
                    outcome.updated_keys.push(key);
                }
                EntryOutcome::Invalidate(reason) => match self.config.unresolved {
                    UnresolvedPolicy::Invalidate => {
                        adapter.invalidate(&key)?;
                        sink::record(MetricsEvent::EntryInvalidated { table, reason });
                        self.debug_log(format!("invalidated {key} ({reason})"));
                        outcome.invalidated_keys.push(key);
                    }
                    UnresolvedPolicy::Skip => {
                        self.debug_log(format!("left {key} untouched ({reason})"));
                    }
                },
            }
        }

        span.set_outcome(
            u64::try_from(outcome.updated_keys.len()).unwrap_or(u64::MAX),
            u64::try_from(outcome.invalidated_keys.len()).unwrap_or(u64::MAX),
        );

        Ok(outcome)
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Apply `request` with the default engine configuration.
pub fn apply_mutation<A>(
    adapter: &mut A,
    request: &MutationRequest,
) -> Result<MutationOutcome, MutationError>
where
    A: CacheAdapter + ?Sized,
{
    MutationEngine::default().apply(adapter, request)
}
