use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub use super::numerics::Numeric;

/// An atom name or functor name.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A predicate identity: name plus arity. Recorded by choice points and
/// reported in goal traces.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Functor {
    pub name: Symbol,
    pub arity: usize,
}

impl Functor {
    pub fn new(name: &str, arity: usize) -> Self {
        Self {
            name: Symbol::new(name),
            arity,
        }
    }
}

/// A compound term: functor applied to one or more arguments.
#[derive(Debug, Clone)]
pub struct Structure {
    pub functor: Symbol,
    pub args: Vec<Term>,
}

/// A list cell. The empty list is the atom `[]`, not a cell.
#[derive(Debug, Clone)]
pub struct Cons {
    pub head: Term,
    pub tail: Term,
}

/// An opaque host object carried through the term graph. Unifies only with
/// itself (same underlying allocation).
#[derive(Clone)]
pub struct HostValue {
    repr: String,
    object: Rc<dyn Any>,
}

impl HostValue {
    pub fn new<T: Any>(repr: &str, object: T) -> Self {
        Self {
            repr: repr.to_string(),
            object: Rc::new(object),
        }
    }

    pub fn repr(&self) -> &str {
        &self.repr
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref()
    }

    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }

    /// Stable identity for the standard order among host values.
    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.object) as *const () as usize
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostValue({})", self.repr)
    }
}

/// A host-level failure wrapped as a term, so that error values can flow
/// through unification and be handed to the diagnostic interface.
#[derive(Clone)]
pub struct ErrorValue {
    source: Rc<dyn std::error::Error>,
}

impl ErrorValue {
    pub fn new<E: std::error::Error + 'static>(source: E) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    pub fn source(&self) -> &dyn std::error::Error {
        self.source.as_ref()
    }

    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.source) as *const () as usize
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ErrorValue({})", self.source)
    }
}

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(0);

/// A logical variable: the only mutable term.
///
/// The binding slot is `None` while unbound (the distinguished
/// self-referential state) and holds the bound term otherwise. Cloning a
/// `Variable` shares the cell, so every term mentioning the variable sees
/// the binding. The creation epoch is stamped once, from the trail's
/// counter, and never changes; the id is a process-wide tag used only for
/// display and for the stable ordering of unbound variables.
#[derive(Clone)]
pub struct Variable(Rc<VariableCell>);

struct VariableCell {
    id: u64,
    epoch: u64,
    slot: RefCell<Option<Term>>,
}

impl Variable {
    pub fn new(epoch: u64) -> Self {
        Self(Rc::new(VariableCell {
            id: NEXT_VARIABLE_ID.fetch_add(1, AtomicOrdering::SeqCst),
            epoch,
            slot: RefCell::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn epoch(&self) -> u64 {
        self.0.epoch
    }

    pub fn is_unbound(&self) -> bool {
        self.0.slot.borrow().is_none()
    }

    /// The bound term, if any. Follows a single link, not the whole chain.
    pub fn value(&self) -> Option<Term> {
        self.0.slot.borrow().clone()
    }

    /// Two handles on the same cell?
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn set(&self, value: Term) {
        *self.0.slot.borrow_mut() = Some(value);
    }

    pub(crate) fn reset(&self) {
        *self.0.slot.borrow_mut() = None;
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value() {
            None => write!(f, "_{}", self.0.id),
            Some(t) => write!(f, "_{} = {:?}", self.0.id, t),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(Numeric),
    Symbol(Symbol),
    Structure(Structure),
    Cons(Cons),
    Host(HostValue),
    Error(ErrorValue),
    Variable(Variable),
}

/// A handle on a node of the term graph. Non-variable values are immutable
/// and freely shared; cloning a term never copies structure.
#[derive(Debug, Clone)]
pub struct Term {
    value: Rc<Value>,
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Self {
            value: Rc::new(value),
        }
    }
}

impl Term {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The empty list.
    pub fn nil() -> Self {
        Term::from(Value::Symbol(Symbol::new("[]")))
    }

    pub fn cons(head: Term, tail: Term) -> Self {
        Term::from(Value::Cons(Cons { head, tail }))
    }

    /// A proper list ending in `[]`.
    pub fn list(elements: Vec<Term>) -> Self {
        Self::list_with_tail(elements, Term::nil())
    }

    pub fn list_with_tail(elements: Vec<Term>, tail: Term) -> Self {
        elements
            .into_iter()
            .rev()
            .fold(tail, |tail, head| Term::cons(head, tail))
    }

    /// Follow the variable chain to a non-variable term or an unbound
    /// variable. Chains are acyclic by construction, so this terminates.
    pub fn dereference(&self) -> Term {
        let mut term = self.clone();
        loop {
            let next = match term.value() {
                Value::Variable(v) => match v.value() {
                    Some(bound) => bound,
                    None => break,
                },
                _ => break,
            };
            term = next;
        }
        term
    }

    pub fn is_unbound_variable(&self) -> bool {
        matches!(self.dereference().value(), Value::Variable(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.dereference().value(), Value::Symbol(s) if s.0 == "[]")
    }

    pub fn is_cons(&self) -> bool {
        matches!(self.dereference().value(), Value::Cons(_))
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.dereference().value() {
            Value::Symbol(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Numeric> {
        match self.dereference().value() {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<Structure> {
        match self.dereference().value() {
            Value::Structure(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<Cons> {
        match self.dereference().value() {
            Value::Cons(c) => Some(c.clone()),
            _ => None,
        }
    }

    /// True if no unbound variable is reachable from this term.
    pub fn is_ground(&self) -> bool {
        let term = self.dereference();
        match term.value() {
            Value::Variable(_) => false,
            Value::Structure(s) => s.args.iter().all(|a| a.is_ground()),
            Value::Cons(c) => c.head.is_ground() && c.tail.is_ground(),
            Value::Number(_) | Value::Symbol(_) | Value::Host(_) | Value::Error(_) => true,
        }
    }

    /// Collect every unbound variable reachable from this term.
    pub fn variables(&self, vars: &mut HashSet<Variable>) {
        let term = self.dereference();
        match term.value() {
            Value::Variable(v) => {
                vars.insert(v.clone());
            }
            Value::Structure(s) => {
                for arg in &s.args {
                    arg.variables(vars);
                }
            }
            Value::Cons(c) => {
                c.head.variables(vars);
                c.tail.variables(vars);
            }
            _ => {}
        }
    }

    /// The standard order of terms: unbound variables first (by creation
    /// identity), then numbers, atoms, host values, error values, and
    /// compounds (arity, then functor, then arguments). Both operands are
    /// dereferenced, so bound terms compare via their values. A cons cell
    /// compares as the compound `'.'/2`.
    pub fn compare(&self, other: &Term) -> Ordering {
        let a = self.dereference();
        let b = other.dereference();
        match (a.value(), b.value()) {
            (Value::Variable(x), Value::Variable(y)) => x.id().cmp(&y.id()),
            (Value::Number(x), Value::Number(y)) => x.compare(y),
            (Value::Symbol(x), Value::Symbol(y)) => x.cmp(y),
            (Value::Host(x), Value::Host(y)) => x.address().cmp(&y.address()),
            (Value::Error(x), Value::Error(y)) => x.address().cmp(&y.address()),
            (x, y) if is_compound(x) && is_compound(y) => compare_compounds(x, y),
            (x, y) => type_rank(x).cmp(&type_rank(y)),
        }
    }
}

/// Term equality is standard-order equality, so bound variables compare
/// equal to their values.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.compare(other), Ordering::Equal)
    }
}

impl Eq for Term {}

fn is_compound(value: &Value) -> bool {
    matches!(value, Value::Structure(_) | Value::Cons(_))
}

fn type_rank(value: &Value) -> usize {
    match value {
        Value::Variable(_) => 0,
        Value::Number(_) => 1,
        Value::Symbol(_) => 2,
        Value::Host(_) => 3,
        Value::Error(_) => 4,
        Value::Structure(_) | Value::Cons(_) => 5,
    }
}

fn compare_compounds(left: &Value, right: &Value) -> Ordering {
    fn parts(value: &Value) -> (&str, Vec<&Term>) {
        match value {
            Value::Structure(s) => (s.functor.name(), s.args.iter().collect()),
            Value::Cons(c) => (".", vec![&c.head, &c.tail]),
            _ => unreachable!("compare_compounds called on non-compound"),
        }
    }

    let (lname, largs) = parts(left);
    let (rname, rargs) = parts(right);
    largs
        .len()
        .cmp(&rargs.len())
        .then_with(|| lname.cmp(rname))
        .then_with(|| {
            largs
                .iter()
                .zip(&rargs)
                .map(|(l, r)| l.compare(r))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
}
