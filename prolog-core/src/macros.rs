/// Helper macros to build term graphs without a parser.
use crate::numerics::Numeric;
use crate::terms::{Symbol, Term, Value, Variable};

#[macro_export]
macro_rules! sym {
    ($arg:expr) => {
        $crate::terms::Symbol::new($arg)
    };
}

#[macro_export]
macro_rules! value {
    ($arg:expr) => {
        $crate::macros::TestHelper::<$crate::terms::Value>::from($arg).0
    };
}

#[macro_export]
macro_rules! term {
    ($arg:expr) => {
        $crate::macros::TestHelper::<$crate::terms::Term>::from($arg).0
    };
}

/// An atom as a term.
#[macro_export]
macro_rules! atom {
    ($arg:expr) => {
        $crate::term!($crate::sym!($arg))
    };
}

/// A fresh unbound variable as a term. Takes the creation epoch, which
/// defaults to zero for variables born before any choice point.
#[macro_export]
macro_rules! var {
    () => {
        $crate::var!(0)
    };
    ($epoch:expr) => {
        $crate::terms::Term::from($crate::terms::Value::Variable($crate::terms::Variable::new(
            $epoch,
        )))
    };
}

#[macro_export]
macro_rules! structure {
    ($name:expr, [$($args:expr),* $(,)?]) => {
        $crate::terms::Term::from($crate::terms::Value::Structure($crate::terms::Structure {
            functor: $crate::sym!($name),
            args: vec![$($crate::term!($args)),*],
        }))
    };
}

#[macro_export]
macro_rules! list {
    () => {
        $crate::terms::Term::nil()
    };
    ($($elem:expr),+ ; $tail:expr) => {
        $crate::terms::Term::list_with_tail(vec![$($crate::term!($elem)),+], $crate::term!($tail))
    };
    ($($elem:expr),+ $(,)?) => {
        $crate::terms::Term::list(vec![$($crate::term!($elem)),+])
    };
}

/// Special struct which is way more eager at implementing `From` than the
/// types themselves, so the macros above accept mixed argument lists.
pub struct TestHelper<T>(pub T);

impl From<Value> for TestHelper<Value> {
    fn from(other: Value) -> Self {
        Self(other)
    }
}

impl From<i64> for TestHelper<Value> {
    fn from(other: i64) -> Self {
        Self(Value::Number(Numeric::Integer(other)))
    }
}

impl From<f64> for TestHelper<Value> {
    fn from(other: f64) -> Self {
        Self(Value::Number(Numeric::Float(other)))
    }
}

/// String literals become atoms, not character lists.
impl From<&str> for TestHelper<Value> {
    fn from(other: &str) -> Self {
        Self(Value::Symbol(Symbol::new(other)))
    }
}

impl From<Symbol> for TestHelper<Value> {
    fn from(other: Symbol) -> Self {
        Self(Value::Symbol(other))
    }
}

impl From<Variable> for TestHelper<Value> {
    fn from(other: Variable) -> Self {
        Self(Value::Variable(other))
    }
}

impl From<Term> for TestHelper<Term> {
    fn from(other: Term) -> Self {
        Self(other)
    }
}

impl From<Value> for TestHelper<Term> {
    fn from(other: Value) -> Self {
        Self(Term::from(other))
    }
}

impl From<i64> for TestHelper<Term> {
    fn from(other: i64) -> Self {
        Self(Term::from(TestHelper::<Value>::from(other).0))
    }
}

impl From<f64> for TestHelper<Term> {
    fn from(other: f64) -> Self {
        Self(Term::from(TestHelper::<Value>::from(other).0))
    }
}

impl From<&str> for TestHelper<Term> {
    fn from(other: &str) -> Self {
        Self(Term::from(TestHelper::<Value>::from(other).0))
    }
}

impl From<Symbol> for TestHelper<Term> {
    fn from(other: Symbol) -> Self {
        Self(Term::from(Value::Symbol(other)))
    }
}

impl From<Variable> for TestHelper<Term> {
    fn from(other: Variable) -> Self {
        Self(Term::from(Value::Variable(other)))
    }
}
