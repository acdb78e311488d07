use crate::{
    query::{
        Cardinality, CountMode, Filter, FilterClause, FilterOp, OrderTerm, QueryDescriptor, Range,
        Selection, normalize,
    },
    value::Value,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// QueryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("'{method}' is not available once a query is {stage}")]
    Capability {
        method: &'static str,
        stage: QueryStage,
    },

    #[error("'{op}' on column '{column}' expects {expected}")]
    InvalidLiteral {
        column: String,
        op: FilterOp,
        expected: &'static str,
    },

    #[error("range {from}..={to} is inverted or too long")]
    InvalidRange { from: u64, to: u64 },

    #[error("logic group must contain at least one filter")]
    EmptyGroup,
}

///
/// QueryStage
///
/// Capability tag of a query under construction. Each stage grants a
/// fixed set of capabilities instead of probing the builder's shape.
///
/// Filterable    → filters, transforms, and terminal calls
/// Transformable → transforms and terminal calls (ordered or windowed)
/// Terminal      → nothing; the query is complete
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryStage {
    Filterable,
    Transformable,
    Terminal,
}

impl QueryStage {
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Filterable => Capabilities {
                filter: true,
                transform: true,
            },
            Self::Transformable => Capabilities {
                filter: false,
                transform: true,
            },
            Self::Terminal => Capabilities {
                filter: false,
                transform: false,
            },
        }
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Filterable => "filterable",
            Self::Transformable => "transformable",
            Self::Terminal => "terminal",
        };
        write!(f, "{label}")
    }
}

///
/// Capabilities
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    pub filter: bool,
    pub transform: bool,
}

///
/// QueryBuilder
///
/// Fluent construction of a [`QueryDescriptor`], mirroring the
/// PostgREST client call chain:
///
/// `QueryBuilder::from("contact").select("id,username")?.in_("username", ["a", "b"])?`
///

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    descriptor: QueryDescriptor,
    stage: QueryStage,
}

impl QueryBuilder {
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            descriptor: QueryDescriptor::new(table),
            stage: QueryStage::Filterable,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> QueryStage {
        self.stage
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.descriptor.schema = schema.into();
        self
    }

    pub fn select(mut self, columns: &str) -> Result<Self, QueryError> {
        self.require_filter("select")?;
        self.descriptor.fields = Selection::parse(columns);

        Ok(self)
    }

    /// Request a row count alongside the rows.
    pub fn count(mut self, mode: CountMode) -> Result<Self, QueryError> {
        self.require_filter("count")?;
        self.descriptor.count = Some(mode);

        Ok(self)
    }

    // ─────────────────────────────────────────────
    // Filters
    // ─────────────────────────────────────────────

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("eq", FilterClause::new(column, FilterOp::Eq, value))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("neq", FilterClause::new(column, FilterOp::Neq, value))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("gt", FilterClause::new(column, FilterOp::Gt, value))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("gte", FilterClause::new(column, FilterOp::Gte, value))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("lt", FilterClause::new(column, FilterOp::Lt, value))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("lte", FilterClause::new(column, FilterOp::Lte, value))
    }

    pub fn like(self, column: &str, pattern: &str) -> Result<Self, QueryError> {
        self.clause("like", FilterClause::new(column, FilterOp::Like, pattern))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Result<Self, QueryError> {
        self.clause("ilike", FilterClause::new(column, FilterOp::Ilike, pattern))
    }

    /// `is.null`, `is.true`, `is.false`.
    pub fn is(self, column: &str, value: Option<bool>) -> Result<Self, QueryError> {
        self.clause("is", FilterClause::new(column, FilterOp::Is, value))
    }

    pub fn in_<V: Into<Value>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, QueryError> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.clause("in", FilterClause::new(column, FilterOp::In, values))
    }

    /// Array / json / range containment (`cs`).
    pub fn contains(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("contains", FilterClause::new(column, FilterOp::Contains, value))
    }

    /// Inverse containment (`cd`).
    pub fn contained_by(self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause(
            "contained_by",
            FilterClause::new(column, FilterOp::ContainedBy, value),
        )
    }

    /// Negated clause (`column=not.op.value`).
    pub fn not(self, column: &str, op: FilterOp, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.clause("not", FilterClause::new(column, op, value).negate())
    }

    /// Disjunction of filters (`or=(...)`).
    pub fn or(self, filters: Vec<Filter>) -> Result<Self, QueryError> {
        self.group("or", filters, Filter::Or)
    }

    /// Explicit conjunction group (`and=(...)`), useful nested inside `or`.
    pub fn and(self, filters: Vec<Filter>) -> Result<Self, QueryError> {
        self.group("and", filters, Filter::And)
    }

    /// Add an already-constructed clause.
    pub fn filter(self, clause: FilterClause) -> Result<Self, QueryError> {
        self.clause("filter", clause)
    }

    // ─────────────────────────────────────────────
    // Transforms
    // ─────────────────────────────────────────────

    pub fn order(mut self, term: OrderTerm) -> Result<Self, QueryError> {
        self.require_transform("order")?;
        self.descriptor.order.push(term);
        self.stage = QueryStage::Transformable;

        Ok(self)
    }

    /// Inclusive row range, as in `range(from, to)`.
    pub fn range(mut self, from: u64, to: u64) -> Result<Self, QueryError> {
        self.require_transform("range")?;
        let limit = to
            .checked_sub(from)
            .and_then(|span| span.checked_add(1))
            .ok_or(QueryError::InvalidRange { from, to })?;
        self.descriptor.range = Some(Range {
            offset: from,
            limit,
        });
        self.stage = QueryStage::Transformable;

        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Result<Self, QueryError> {
        self.require_transform("limit")?;
        if limit == 0 {
            return Err(QueryError::InvalidRange { from: 0, to: 0 });
        }
        let offset = self.descriptor.range.map_or(0, |range| range.offset);
        self.descriptor.range = Some(Range { offset, limit });
        self.stage = QueryStage::Transformable;

        Ok(self)
    }

    // ─────────────────────────────────────────────
    // Terminal
    // ─────────────────────────────────────────────

    pub fn single(self) -> Result<Self, QueryError> {
        self.terminal("single", Cardinality::Single)
    }

    pub fn maybe_single(self) -> Result<Self, QueryError> {
        self.terminal("maybe_single", Cardinality::MaybeSingle)
    }

    /// Count-only query (`HEAD` request).
    pub fn head(mut self, mode: CountMode) -> Result<Self, QueryError> {
        self.require_transform("head")?;
        self.descriptor.is_head = true;
        self.descriptor.count = Some(mode);
        self.stage = QueryStage::Terminal;

        Ok(self)
    }

    /// Finish the query as a normalized descriptor.
    #[must_use]
    pub fn build(self) -> QueryDescriptor {
        normalize(&self.descriptor)
    }

    // ─────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────

    fn clause(mut self, method: &'static str, clause: FilterClause) -> Result<Self, QueryError> {
        self.require_filter(method)?;
        validate_literal(&clause)?;
        self.descriptor.filters.push(Filter::Clause(clause));

        Ok(self)
    }

    fn group(
        mut self,
        method: &'static str,
        filters: Vec<Filter>,
        make: fn(Vec<Filter>) -> Filter,
    ) -> Result<Self, QueryError> {
        self.require_filter(method)?;
        validate_group(&filters)?;
        self.descriptor.filters.push(make(filters));

        Ok(self)
    }

    fn terminal(mut self, method: &'static str, cardinality: Cardinality) -> Result<Self, QueryError> {
        self.require_transform(method)?;
        self.descriptor.cardinality = cardinality;
        self.stage = QueryStage::Terminal;

        Ok(self)
    }

    const fn require_filter(&self, method: &'static str) -> Result<(), QueryError> {
        if self.stage.capabilities().filter {
            Ok(())
        } else {
            Err(QueryError::Capability {
                method,
                stage: self.stage,
            })
        }
    }

    const fn require_transform(&self, method: &'static str) -> Result<(), QueryError> {
        if self.stage.capabilities().transform {
            Ok(())
        } else {
            Err(QueryError::Capability {
                method,
                stage: self.stage,
            })
        }
    }
}

fn validate_group(filters: &[Filter]) -> Result<(), QueryError> {
    if filters.is_empty() {
        return Err(QueryError::EmptyGroup);
    }
    for filter in filters {
        match filter {
            Filter::Clause(clause) => validate_literal(clause)?,
            Filter::And(children) | Filter::Or(children) => validate_group(children)?,
        }
    }

    Ok(())
}

// Reject literal shapes that an operator can never evaluate.
fn validate_literal(clause: &FilterClause) -> Result<(), QueryError> {
    let expected = match (clause.op, &clause.value) {
        (FilterOp::In, Value::List(items)) if items.iter().all(Value::is_scalar) => return Ok(()),
        (FilterOp::In, _) => "a list of scalars",
        (FilterOp::Is, Value::Null | Value::Bool(_)) => return Ok(()),
        (FilterOp::Is, _) => "null, true, or false",
        (FilterOp::Like | FilterOp::Ilike, Value::Text(_)) => return Ok(()),
        (FilterOp::Like | FilterOp::Ilike, _) => "a text pattern",
        (FilterOp::Contains | FilterOp::ContainedBy, Value::List(items))
            if items.iter().all(Value::is_scalar) =>
        {
            return Ok(());
        }
        (FilterOp::Contains | FilterOp::ContainedBy, Value::Map(_) | Value::Text(_)) => return Ok(()),
        (FilterOp::Contains | FilterOp::ContainedBy, _) => "an array, object, or range literal",
        (_, Value::Float(float)) if !float.is_finite() => "a finite number",
        (_, value) if value.is_scalar() => return Ok(()),
        (_, _) => "a scalar",
    };

    Err(QueryError::InvalidLiteral {
        column: clause.column.clone(),
        op: clause.op,
        expected,
    })
}

///
/// TESTS
///
