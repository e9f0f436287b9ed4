//! Query term flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// The set of operations currently active on a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryTerms(u8);

impl QueryTerms {
    pub const NONE: Self = Self(0);
    pub const SKIP: Self = Self(1);
    pub const TAKE: Self = Self(1 << 1);
    pub const WHERE: Self = Self(1 << 2);
    pub const ORDER_BY: Self = Self(1 << 3);
    pub const SELECT: Self = Self(1 << 4);
    pub const DISTINCT: Self = Self(1 << 5);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::SKIP, "Skip"),
        (Self::TAKE, "Take"),
        (Self::WHERE, "Where"),
        (Self::ORDER_BY, "OrderBy"),
        (Self::SELECT, "Select"),
        (Self::DISTINCT, "Distinct"),
    ];

    /// True if every term in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any term in `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for QueryTerms {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for QueryTerms {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for QueryTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        let mut first = true;
        for (term, name) in Self::NAMES {
            if self.contains(term) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}
