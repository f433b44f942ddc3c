/// Binding state: the trail of undoable bindings, the binding epoch, and
/// the unification that records onto it.
///
/// The trail is owned by the engine; built-ins reach it only through the
/// bind/unify contract.
use crate::terms::{Term, Value, Variable};

/// Undo log of variable bindings, paired with the monotonic epoch counter
/// that stamps variable creation and decides whether a binding must be
/// recorded at all.
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<Variable>,
    epoch: u64,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position; pass it back to `undo_to` to roll back to here.
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Advance the binding epoch. Called when a choice point is pushed;
    /// the counter never moves backwards (popping a choice point leaves it
    /// where it is, which at worst trails a binding that undo makes
    /// unreachable).
    pub fn new_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Record a binding for undo. Only the binding path below calls this.
    pub fn push(&mut self, variable: Variable) {
        self.entries.push(variable);
    }

    /// Reset every variable recorded at or after `mark` to unbound and
    /// truncate the log. Calling twice with the same mark is a no-op the
    /// second time. This is the only way a variable is ever unbound.
    pub fn undo_to(&mut self, mark: usize) {
        while self.entries.len() > mark {
            if let Some(variable) = self.entries.pop() {
                variable.reset();
            }
        }
    }
}

impl Variable {
    /// Bind this (unbound, dereferenced) variable to `value`, which must
    /// itself be dereferenced.
    ///
    /// When `value` is another unbound variable, the younger of the two is
    /// bound to point at the older: older variables are more likely to be
    /// referenced from outside the current search branch, so keeping them
    /// canonical shortens chains for long-lived bindings. On equal epochs
    /// the argument is bound. A binding is trailed only when the bound
    /// variable's creation epoch predates the current epoch; variables born
    /// after the active choice point are unreachable once it is undone.
    pub fn bind(&self, value: Term, trail: &mut Trail) {
        if let Value::Variable(other) = value.value() {
            // Unifying a variable with itself must stay a no-op; binding
            // here would create the one cycle the invariants forbid.
            if self.same(other) {
                return;
            }
            if other.epoch() >= self.epoch() {
                other.set(Term::from(Value::Variable(self.clone())));
                if other.epoch() < trail.epoch() {
                    trail.push(other.clone());
                }
                return;
            }
        }
        self.set(value);
        if self.epoch() < trail.epoch() {
            trail.push(self.clone());
        }
    }
}

impl Term {
    /// Unify two terms, recording bindings on `trail`.
    ///
    /// Both operands are fully dereferenced first. Same-shape compounds
    /// recurse into their children; child bindings made before a failing
    /// child are left in place, and engine-level backtracking rolls them
    /// back through the trail. No occurs check is performed. Never
    /// allocates new variables.
    pub fn unify(&self, other: &Term, trail: &mut Trail) -> bool {
        let a = self.dereference();
        let b = other.dereference();
        match (a.value(), b.value()) {
            (Value::Variable(v), _) => {
                v.bind(b.clone(), trail);
                true
            }
            (_, Value::Variable(v)) => {
                v.bind(a.clone(), trail);
                true
            }
            (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Host(x), Value::Host(y)) => x.same(y),
            (Value::Error(x), Value::Error(y)) => x.same(y),
            (Value::Structure(x), Value::Structure(y)) => {
                x.functor == y.functor
                    && x.args.len() == y.args.len()
                    && x.args.iter().zip(&y.args).all(|(l, r)| l.unify(r, trail))
            }
            (Value::Cons(_), Value::Cons(_)) => unify_spines(a.clone(), b.clone(), trail),
            _ => false,
        }
    }
}

/// Unify two list spines iteratively so that long lists do not grow the
/// host stack; only the heads recurse.
fn unify_spines(mut left: Term, mut right: Term, trail: &mut Trail) -> bool {
    loop {
        let (lh, lt, rh, rt) = match (left.value(), right.value()) {
            (Value::Cons(l), Value::Cons(r)) => (
                l.head.clone(),
                l.tail.clone(),
                r.head.clone(),
                r.tail.clone(),
            ),
            _ => return left.unify(&right, trail),
        };
        if !lh.unify(&rh, trail) {
            return false;
        }
        left = lt.dereference();
        right = rt.dereference();
    }
}
