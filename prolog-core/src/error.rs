use serde::{Deserialize, Serialize};

use std::fmt;

use crate::formatting::ToPrologString;
use crate::terms::{Functor, Numeric, Structure, Symbol, Term, Value};

/// An erroneous condition raised while resolving a query.
///
/// This is the slow channel: ordinary logical failure travels through the
/// engine's fail continuation and never appears here. An error carries the
/// logical payload (exposed as a term for catch constructs) and, once it
/// has unwound through the trampoline, a goal trace captured exactly once.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "FormattedError")]
pub struct PrologError {
    pub kind: ErrorKind,
    trace: Option<GoalTrace>,
}

#[derive(Debug, Clone)]
pub enum ErrorKind {
    Logic(LogicError),
    Operational(OperationalError),
}

/// The logical error taxonomy. These are the conditions a Prolog-level
/// catch construct can intercept by matching the message term.
#[derive(Debug, Clone)]
pub enum LogicError {
    /// A required argument is an unbound variable.
    Instantiation { goal: Functor, argument: usize },
    /// An argument is bound but has the wrong shape.
    Type {
        goal: Functor,
        argument: usize,
        expected: String,
        culprit: Term,
    },
    /// An argument has the right shape but an invalid value.
    Domain {
        goal: Functor,
        argument: usize,
        domain: String,
        culprit: Term,
    },
    /// An arbitrary term surfaced via explicit raise.
    Raised { term: Term },
}

/// Engine-level conditions. Not part of the logical taxonomy and never
/// expressed as catchable terms with meaning to the program.
#[derive(Debug, Clone)]
pub enum OperationalError {
    ChoiceOverflow { limit: usize },
    StepBudgetExhausted { limit: u64 },
    InvalidState { msg: String },
}

/// The engine-level call chain captured when an error unwinds: the frame
/// of the instruction being executed, then the owner predicate of each
/// live choice point, newest first. Immutable after capture.
#[derive(Debug, Clone)]
pub struct GoalTrace(Vec<String>);

impl GoalTrace {
    pub(crate) fn new(frames: Vec<String>) -> Self {
        Self(frames)
    }

    pub fn frames(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GoalTrace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "goal trace (most recent goal first):")?;
        for frame in &self.0 {
            write!(f, "\n  at {}", frame)?;
        }
        Ok(())
    }
}

impl PrologError {
    pub fn trace(&self) -> Option<&GoalTrace> {
        self.trace.as_ref()
    }

    /// Attach the goal trace. Only the first call has any effect; the
    /// trace reflects the state at the raise site and must not be
    /// overwritten higher up the unwind.
    pub(crate) fn add_goal_trace(&mut self, trace: GoalTrace) {
        if self.trace.is_none() {
            self.trace = Some(trace);
        }
    }

    /// The logical payload as a term, for catch constructs and printing.
    pub fn message_term(&self) -> Term {
        match &self.kind {
            ErrorKind::Logic(e) => e.message_term(),
            ErrorKind::Operational(e) => e.message_term(),
        }
    }

    /// Plain rendering of the message term.
    pub fn message(&self) -> String {
        self.message_term().to_prolog()
    }

    /// Quoted rendering of the message term.
    pub fn quoted_message(&self) -> String {
        self.message_term().to_quoted()
    }
}

fn atom(name: &str) -> Term {
    Term::from(Value::Symbol(Symbol::new(name)))
}

fn int(value: usize) -> Term {
    Term::from(Value::Number(Numeric::Integer(value as i64)))
}

fn structure(functor: &str, args: Vec<Term>) -> Term {
    Term::from(Value::Structure(Structure {
        functor: Symbol::new(functor),
        args,
    }))
}

/// `context(name/arity, Argument)` locating the offending argument.
fn context(goal: &Functor, argument: usize) -> Term {
    structure(
        "context",
        vec![
            structure("/", vec![atom(goal.name.name()), int(goal.arity)]),
            int(argument),
        ],
    )
}

impl LogicError {
    fn message_term(&self) -> Term {
        match self {
            LogicError::Instantiation { goal, argument } => structure(
                "error",
                vec![atom("instantiation_error"), context(goal, *argument)],
            ),
            LogicError::Type {
                goal,
                argument,
                expected,
                culprit,
            } => structure(
                "error",
                vec![
                    structure("type_error", vec![atom(expected), culprit.clone()]),
                    context(goal, *argument),
                ],
            ),
            LogicError::Domain {
                goal,
                argument,
                domain,
                culprit,
            } => structure(
                "error",
                vec![
                    structure("domain_error", vec![atom(domain), culprit.clone()]),
                    context(goal, *argument),
                ],
            ),
            LogicError::Raised { term } => term.clone(),
        }
    }
}

impl OperationalError {
    fn message_term(&self) -> Term {
        match self {
            OperationalError::ChoiceOverflow { limit } => structure(
                "error",
                vec![
                    structure("resource_error", vec![atom("choice_points")]),
                    int(*limit),
                ],
            ),
            OperationalError::StepBudgetExhausted { limit } => structure(
                "error",
                vec![
                    structure("resource_error", vec![atom("steps")]),
                    int(*limit as usize),
                ],
            ),
            OperationalError::InvalidState { msg } => {
                structure("error", vec![atom("system_error"), atom(msg)])
            }
        }
    }
}

impl From<LogicError> for PrologError {
    fn from(kind: LogicError) -> Self {
        Self {
            kind: ErrorKind::Logic(kind),
            trace: None,
        }
    }
}

impl From<OperationalError> for PrologError {
    fn from(kind: OperationalError) -> Self {
        Self {
            kind: ErrorKind::Operational(kind),
            trace: None,
        }
    }
}

pub type PrologResult<T> = std::result::Result<T, PrologError>;

pub fn instantiation_error(goal: &Functor, argument: usize) -> PrologError {
    LogicError::Instantiation {
        goal: goal.clone(),
        argument,
    }
    .into()
}

pub fn type_error(goal: &Functor, argument: usize, expected: &str, culprit: &Term) -> PrologError {
    LogicError::Type {
        goal: goal.clone(),
        argument,
        expected: expected.to_string(),
        culprit: culprit.clone(),
    }
    .into()
}

pub fn domain_error(goal: &Functor, argument: usize, domain: &str, culprit: &Term) -> PrologError {
    LogicError::Domain {
        goal: goal.clone(),
        argument,
        domain: domain.to_string(),
        culprit: culprit.clone(),
    }
    .into()
}

/// Surface an arbitrary term as an error, the engine half of `throw/1`.
pub fn raise(term: Term) -> PrologError {
    LogicError::Raised { term }.into()
}

pub fn invalid_state<A>(msg: impl Into<String>) -> PrologResult<A> {
    Err(OperationalError::InvalidState { msg: msg.into() }.into())
}

pub(crate) fn choice_overflow(limit: usize) -> PrologError {
    OperationalError::ChoiceOverflow { limit }.into()
}

pub(crate) fn step_budget_exhausted(limit: u64) -> PrologError {
    OperationalError::StepBudgetExhausted { limit }.into()
}

impl std::error::Error for PrologError {}

impl fmt::Display for PrologError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Logic(e) => write!(f, "{}", e)?,
            ErrorKind::Operational(e) => write!(f, "{}", e)?,
        }
        if let Some(ref trace) = self.trace {
            write!(f, "\n{}", trace)?;
        }
        Ok(())
    }
}

impl fmt::Display for LogicError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Instantiation { goal, argument } => write!(
                f,
                "Instantiation error: argument {} of {} is an unbound variable",
                argument, goal
            ),
            Self::Type {
                goal,
                argument,
                expected,
                culprit,
            } => write!(
                f,
                "Type error: argument {} of {} must be {}, got: {}",
                argument,
                goal,
                expected,
                culprit.to_quoted()
            ),
            Self::Domain {
                goal,
                argument,
                domain,
                culprit,
            } => write!(
                f,
                "Domain error: argument {} of {} is outside {}: {}",
                argument,
                goal,
                domain,
                culprit.to_quoted()
            ),
            Self::Raised { term } => write!(f, "Uncaught error: {}", term.to_quoted()),
        }
    }
}

impl fmt::Display for OperationalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ChoiceOverflow { limit } => {
                write!(f, "Choice stack overflow: more than {} choice points", limit)
            }
            Self::StepBudgetExhausted { limit } => {
                write!(f, "Step budget exhausted after {} trampoline steps", limit)
            }
            Self::InvalidState { msg } => write!(f, "Invalid engine state: {}", msg),
        }
    }
}

/// Wire form of an error: the kind tag plus the rendered message.
#[derive(Clone, Serialize, Deserialize)]
pub struct FormattedError {
    pub kind: String,
    pub formatted: String,
}

impl From<PrologError> for FormattedError {
    fn from(other: PrologError) -> Self {
        let kind = match &other.kind {
            ErrorKind::Logic(LogicError::Instantiation { .. }) => "instantiation_error",
            ErrorKind::Logic(LogicError::Type { .. }) => "type_error",
            ErrorKind::Logic(LogicError::Domain { .. }) => "domain_error",
            ErrorKind::Logic(LogicError::Raised { .. }) => "raised",
            ErrorKind::Operational(_) => "operational",
        };
        Self {
            kind: kind.to_string(),
            formatted: other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantiation_message_term() {
        let error = instantiation_error(&Functor::new("atom_length", 2), 1);
        assert_eq!(
            error.message(),
            "error(instantiation_error, context(/(atom_length, 2), 1))"
        );
    }

    #[test]
    fn test_type_error_rendering() {
        let error = type_error(&Functor::new("succ", 2), 1, "integer", &atom!("a"));
        assert_eq!(
            error.to_string(),
            "Type error: argument 1 of succ/2 must be integer, got: a"
        );
    }

    #[test]
    fn test_trace_captured_once() {
        let mut error = raise(atom!("boom"));
        assert!(error.trace().is_none());

        error.add_goal_trace(GoalTrace::new(vec!["first/1".to_string()]));
        error.add_goal_trace(GoalTrace::new(vec!["second/2".to_string()]));
        assert_eq!(error.trace().unwrap().frames(), ["first/1"]);
    }

    #[test]
    fn test_serialized_form() {
        let error = raise(atom!("boom"));
        let json = serde_json::to_string(&error).unwrap();
        let formatted: FormattedError = serde_json::from_str(&json).unwrap();
        assert_eq!(formatted.kind, "raised");
        assert_eq!(formatted.formatted, "Uncaught error: boom");
    }
}
