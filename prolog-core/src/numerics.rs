use std::cmp::Ordering;
use std::fmt;

/// A Prolog number: an exact integer or an IEEE-754 double.
#[derive(Debug, Copy, Clone)]
pub enum Numeric {
    Integer(i64),
    Float(f64),
}

impl Numeric {
    pub fn is_integer(&self) -> bool {
        matches!(self, Numeric::Integer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Numeric::Float(_))
    }

    /// Total order over numbers, used by the standard order of terms.
    ///
    /// Mixed comparisons promote the integer to a float. When the promoted
    /// values are equal the float orders first, so `1.0` sorts before `1`
    /// and the two never compare equal (they do not unify either).
    pub fn compare(&self, other: &Self) -> Ordering {
        use Numeric::*;
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Greater),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Less),
        }
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.compare(other), Ordering::Equal)
    }
}

impl Eq for Numeric {}

impl From<i64> for Numeric {
    fn from(other: i64) -> Self {
        Self::Integer(other)
    }
}

impl From<f64> for Numeric {
    fn from(other: f64) -> Self {
        Self::Float(other)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Numeric::Integer(i) => write!(f, "{}", i),
            // Debug formatting keeps the trailing `.0` on whole floats.
            Numeric::Float(x) => write!(f, "{:?}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_comparison() {
        assert_eq!(Numeric::Integer(1), Numeric::Integer(1));
        assert_eq!(Numeric::Float(1.0), Numeric::Float(1.0));
        // Equal in value, but distinct terms: the float orders first.
        assert_ne!(Numeric::Integer(1), Numeric::Float(1.0));
        assert_eq!(
            Numeric::Float(1.0).compare(&Numeric::Integer(1)),
            Ordering::Less
        );
        assert_eq!(
            Numeric::Integer(2).compare(&Numeric::Float(1.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Numeric::Integer(-3).to_string(), "-3");
        assert_eq!(Numeric::Float(2.0).to_string(), "2.0");
    }
}
