use crate::{
    query::Selection,
    row::FieldPath,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Schema assumed when a query does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

///
/// QueryDescriptor
///
/// Identifying parameters of one cached query. Two descriptors that
/// encode to the same cache key describe the same query.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub schema: String,
    pub table: String,
    pub fields: Selection,
    /// Top-level conjunction.
    pub filters: Vec<Filter>,
    /// Empty when the query has no ORDER BY.
    pub order: Vec<OrderTerm>,
    pub range: Option<Range>,
    pub is_head: bool,
    pub count: Option<CountMode>,
    pub cardinality: Cardinality,
}

impl QueryDescriptor {
    /// Descriptor for `select=*` over a table in the default schema.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            fields: Selection::all(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            is_head: false,
            count: None,
            cardinality: Cardinality::Many,
        }
    }

    /// Root columns referenced by any filter, including logic groups.
    #[must_use]
    pub fn filter_columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        for filter in &self.filters {
            filter.collect_columns(&mut columns);
        }

        columns
    }

    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        !self.order.is_empty()
    }

    /// Inclusive pagination window, when the query is paginated.
    #[must_use]
    pub fn window(&self) -> Option<Window> {
        self.range.map(Range::window)
    }
}

///
/// Filter
///
/// One conjunct of a query's filter: a column clause or a nested
/// `and(...)` / `or(...)` logic group.
///

#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Filter {
    Clause(FilterClause),
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl Filter {
    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Clause(clause) => {
                out.insert(clause.path().root().to_string());
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }
}

impl From<FilterClause> for Filter {
    fn from(clause: FilterClause) -> Self {
        Self::Clause(clause)
    }
}

///
/// FilterClause
///
/// `column [not.]op.value`. Field order drives canonical ordering:
/// column first, then operator.
///

#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub negated: bool,
    pub value: Value,
}

impl FilterClause {
    #[must_use]
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            negated: false,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    #[must_use]
    pub fn path(&self) -> FieldPath {
        FieldPath::parse(&self.column)
    }
}

///
/// FilterOp
///
/// Closed PostgREST operator set; each has exactly one evaluation rule.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(u8)]
pub enum FilterOp {
    Eq = 0x01,
    Neq = 0x02,
    Gt = 0x03,
    Gte = 0x04,
    Lt = 0x05,
    Lte = 0x06,
    Like = 0x07,
    Ilike = 0x08,
    Is = 0x09,
    In = 0x0a,
    Contains = 0x0b,
    ContainedBy = 0x0c,
}

impl FilterOp {
    pub const ALL: [Self; 12] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Like,
        Self::Ilike,
        Self::Is,
        Self::In,
        Self::Contains,
        Self::ContainedBy,
    ];

    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Operator keyword as it appears in a PostgREST query string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::Is => "is",
            Self::In => "in",
            Self::Contains => "cs",
            Self::ContainedBy => "cd",
        }
    }

    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == keyword)
    }

    /// Operators whose literal is a list (`in.(..)`, `cs.{..}`, `cd.{..}`).
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Contains | Self::ContainedBy)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OrderTerm {
    pub column: String,
    pub direction: SortDirection,
    /// `None` means the PostgreSQL default for the direction.
    pub nulls: Option<NullsOrder>,
}

impl OrderTerm {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
            nulls: None,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
            nulls: None,
        }
    }

    #[must_use]
    pub const fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// ASC sorts NULLS LAST and DESC sorts NULLS FIRST unless overridden.
    #[must_use]
    pub fn nulls_first(&self) -> bool {
        match self.nulls {
            Some(nulls) => nulls == NullsOrder::First,
            None => self.direction == SortDirection::Desc,
        }
    }

    #[must_use]
    pub fn path(&self) -> FieldPath {
        FieldPath::parse(&self.column)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum NullsOrder {
    First,
    Last,
}

///
/// Range
///
/// `offset` / `limit` pagination; `limit` is always at least one.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Range {
    pub offset: u64,
    pub limit: u64,
}

impl Range {
    /// Inclusive window `[offset, offset + limit - 1]`.
    #[must_use]
    pub const fn window(self) -> Window {
        Window {
            from: self.offset,
            to: self.offset.saturating_add(self.limit.saturating_sub(1)),
        }
    }
}

///
/// Window
///
/// Inclusive row window of a paginated result.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Window {
    pub from: u64,
    pub to: u64,
}

impl Window {
    #[must_use]
    pub const fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Number of rows the window can hold.
    #[must_use]
    pub const fn capacity(self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }

    #[must_use]
    pub const fn starts_at_first_row(self) -> bool {
        self.from == 0
    }
}

///
/// CountMode
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CountMode {
    Exact,
    Planned,
    Estimated,
}

impl CountMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Planned => "planned",
            Self::Estimated => "estimated",
        }
    }

    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "exact" => Some(Self::Exact),
            "planned" => Some(Self::Planned),
            "estimated" => Some(Self::Estimated),
            _ => None,
        }
    }
}

///
/// Cardinality
///
/// `Single` / `MaybeSingle` queries return one object instead of an array.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Cardinality {
    Many,
    Single,
    MaybeSingle,
}

impl Cardinality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Many => "many",
            Self::Single => "single",
            Self::MaybeSingle => "maybe_single",
        }
    }

    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "many" => Some(Self::Many),
            "single" => Some(Self::Single),
            "maybe_single" => Some(Self::MaybeSingle),
            _ => None,
        }
    }
}
