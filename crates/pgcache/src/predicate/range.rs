use std::ops::Bound;

///
/// NumericRange
///
/// Parsed PostgreSQL range literal with numeric bounds, such as `[1,10)`,
/// `(,5]` or `[2.5,)`. An empty bound is unbounded.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct NumericRange {
    lower: Bound<f64>,
    upper: Bound<f64>,
}

impl NumericRange {
    #[must_use]
    pub(super) fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let lower_inclusive = match raw.chars().next()? {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let upper_inclusive = match raw.chars().last()? {
            ']' => true,
            ')' => false,
            _ => return None,
        };
        let inner = raw.get(1..raw.len() - 1)?;
        let (lo, hi) = inner.split_once(',')?;

        Some(Self {
            lower: parse_bound(lo, lower_inclusive)?,
            upper: parse_bound(hi, upper_inclusive)?,
        })
    }

    /// `self @> other`
    #[must_use]
    pub(super) fn contains_range(&self, other: &Self) -> bool {
        lower_le(self.lower, other.lower) && upper_ge(self.upper, other.upper)
    }
}

fn parse_bound(raw: &str, inclusive: bool) -> Option<Bound<f64>> {
    let raw = raw.trim().trim_matches('"');
    if raw.is_empty() {
        return Some(Bound::Unbounded);
    }
    let value: f64 = raw.parse().ok()?;

    Some(if inclusive {
        Bound::Included(value)
    } else {
        Bound::Excluded(value)
    })
}

// Lower bound `a` starts at or before lower bound `b`.
fn lower_le(a: Bound<f64>, b: Bound<f64>) -> bool {
    match (a, b) {
        (Bound::Unbounded, _) => true,
        (_, Bound::Unbounded) => false,
        (Bound::Excluded(x), Bound::Included(y)) => x < y,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            x <= y
        }
    }
}

// Upper bound `a` ends at or after upper bound `b`.
fn upper_ge(a: Bound<f64>, b: Bound<f64>) -> bool {
    match (a, b) {
        (Bound::Unbounded, _) => true,
        (_, Bound::Unbounded) => false,
        (Bound::Excluded(x), Bound::Included(y)) => x > y,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            x >= y
        }
    }
}

///
/// TESTS
///
