//! State values and identifiers.

use corral_expr::Expr;
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier minted by the simulation environment.
///
/// Identity is by id; equality of the underlying states is by value.
/// Ids stay valid for the lifetime of the environment that minted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    pub(crate) fn from_index(idx: usize) -> Self {
        StateId(idx as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// An ordered tuple of integer variable valuations.
/// Index 0 is the location discriminator; indices 1.. are data variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateValues {
    values: Vec<i64>,
}

/// A deduplicated set of owned states. Ordered so that iteration (and
/// therefore refinement) is deterministic for a fixed seed.
pub type StateSet = BTreeSet<StateValues>;

impl StateValues {
    pub fn new(values: Vec<i64>) -> Self {
        StateValues { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> i64 {
        self.values[idx]
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }

    /// Data-variable values, excluding the location discriminator.
    pub fn data_values(&self) -> &[i64] {
        &self.values[1..]
    }

    /// Point predicate `⋀_i x_i = v_i` over all variables.
    pub fn to_condition(&self) -> Expr {
        Expr::point(&self.values)
    }
}

impl From<Vec<i64>> for StateValues {
    fn from(values: Vec<i64>) -> Self {
        StateValues::new(values)
    }
}

impl fmt::Display for StateValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_condition() {
        let s = StateValues::new(vec![0, 3, 7]);
        let cond = s.to_condition();
        assert!(cond.holds(&[0, 3, 7]));
        assert!(!cond.holds(&[0, 3, 8]));
    }

    #[test]
    fn test_display() {
        let s = StateValues::new(vec![1, 2]);
        assert_eq!(s.to_string(), "[1, 2]");
        assert_eq!(StateId::from_index(4).to_string(), "s4");
    }
}
