use std::collections::HashMap;
use std::rc::Rc;

use crate::bindings::Trail;
use crate::error::{
    choice_overflow, invalid_state, step_budget_exhausted, GoalTrace, PrologResult,
};
use crate::instruction::{Continuation, Halt, Step};
use crate::messages::{LogLevel, MessageKind, MessageQueue};
use crate::terms::{Functor, Structure, Term, Value, Variable};

pub const MAX_CHOICE_POINTS: usize = 10_000;

/// A restore record for one untried alternative. Everything needed to
/// resume the other path: where the trail was, which epoch was current,
/// the continuation and argument registers of the owning goal, and the
/// cut barrier in force when it was created.
struct ChoicePoint {
    epoch: u64,
    cont: Continuation,
    next_alternative: Continuation,
    trail_mark: usize,
    cut_barrier: usize,
    owner: Functor,
    registers: Vec<Term>,
}

/// The execution core: term store clock, trail, choice-point stack, and
/// the register file, driven by a continuation trampoline.
///
/// One machine owns one query's mutable state; machines are not shared.
/// There is no global engine state anywhere: everything threads through
/// `&mut self`.
pub struct PrologVirtualMachine {
    trail: Trail,
    choices: Vec<ChoicePoint>,
    registers: Vec<Term>,
    cont: Continuation,
    cut_barrier: usize,

    /// Maximum size of the choice-point stack.
    stack_limit: usize,
    /// Optional bound on trampoline steps per query; the core has no
    /// clock, so callers impose timeouts by bounding steps.
    step_limit: Option<u64>,
    steps: u64,

    /// Logging flag.
    log_level: Option<LogLevel>,

    /// Output messages.
    pub messages: MessageQueue,
}

impl Default for PrologVirtualMachine {
    fn default() -> Self {
        Self::new(MessageQueue::new())
    }
}

impl PrologVirtualMachine {
    pub fn new(messages: MessageQueue) -> Self {
        let log_level = std::env::var("PROLOG_LOG")
            .ok()
            .and_then(|v| LogLevel::from_name(&v));
        Self {
            trail: Trail::new(),
            choices: vec![],
            registers: vec![],
            cont: Rc::new(Halt),
            cut_barrier: 0,
            stack_limit: MAX_CHOICE_POINTS,
            step_limit: None,
            steps: 0,
            log_level,
            messages,
        }
    }

    /// Bound the number of trampoline steps for subsequent queries.
    pub fn set_step_limit(&mut self, limit: Option<u64>) {
        self.step_limit = limit;
    }

    #[cfg(test)]
    fn set_stack_limit(&mut self, limit: usize) {
        self.stack_limit = limit;
    }

    pub fn set_log_level(&mut self, level: Option<LogLevel>) {
        self.log_level = level;
    }

    /// A fresh unbound variable stamped with the current epoch.
    pub fn new_variable(&self) -> Term {
        Term::from(Value::Variable(Variable::new(self.trail.epoch())))
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    /// Unify two terms against the engine's trail.
    pub fn unify(&mut self, left: &Term, right: &Term) -> bool {
        self.log(LogLevel::Trace, || format!("UNIFY: {} = {}", left, right));
        left.unify(right, &mut self.trail)
    }

    // *** Register file ***

    pub fn set_registers(&mut self, args: &[Term]) {
        self.registers.clear();
        self.registers.extend(args.iter().cloned());
    }

    pub fn argument(&self, index: usize) -> PrologResult<Term> {
        match self.registers.get(index) {
            Some(term) => Ok(term.clone()),
            None => invalid_state(format!("no argument register {}", index)),
        }
    }

    pub fn cont(&self) -> Continuation {
        self.cont.clone()
    }

    pub fn set_cont(&mut self, cont: Continuation) {
        self.cont = cont;
    }

    // *** Choice points and cut ***

    /// Record the cut barrier for the current invocation. Must happen at
    /// invocation entry, before any choice point for it is pushed.
    pub fn set_cut_barrier(&mut self) {
        self.cut_barrier = self.choices.len();
    }

    pub fn cut_barrier(&self) -> usize {
        self.cut_barrier
    }

    pub fn choice_depth(&self) -> usize {
        self.choices.len()
    }

    /// Push a choice point for `owner`, capturing the continuation
    /// register, the argument registers up to the owner's arity, the trail
    /// mark, and the barrier. Advances the binding epoch so that younger
    /// variables escape the trail.
    pub fn push_choice(
        &mut self,
        owner: Functor,
        next_alternative: Continuation,
    ) -> PrologResult<()> {
        if self.choices.len() >= self.stack_limit {
            return Err(choice_overflow(self.stack_limit));
        }
        let epoch = self.trail.new_epoch();
        let registers = self.registers.iter().take(owner.arity).cloned().collect();
        self.log(LogLevel::Trace, || format!("PUSH CHOICE: {}", owner));
        self.choices.push(ChoicePoint {
            epoch,
            cont: self.cont.clone(),
            next_alternative,
            trail_mark: self.trail.mark(),
            cut_barrier: self.cut_barrier,
            owner,
            registers,
        });
        Ok(())
    }

    /// The retry protocol. Pop the newest choice point, replay the trail
    /// back to its mark, restore the captured registers, continuation and
    /// barrier, and resume its alternative. With no choice point left the
    /// whole query fails.
    pub fn fail(&mut self) -> Step {
        self.log(LogLevel::Trace, || "BACKTRACK".to_string());
        match self.choices.pop() {
            None => Step::Fail,
            Some(choice) => {
                self.trail.undo_to(choice.trail_mark);
                self.registers = choice.registers;
                self.cont = choice.cont;
                self.cut_barrier = choice.cut_barrier;
                Step::Goto(choice.next_alternative)
            }
        }
    }

    /// Discard every choice point above `barrier` without running their
    /// alternatives and without touching the trail.
    pub fn cut(&mut self, barrier: usize) {
        self.log(LogLevel::Trace, || format!("CUT: to barrier {}", barrier));
        self.choices.truncate(barrier);
    }

    // *** Trampoline ***

    /// Run `goal` to its first solution. Returns `Ok(true)` on success
    /// (bindings are observable through the caller's term handles),
    /// `Ok(false)` when the search space is exhausted, and `Err` when an
    /// erroneous condition unwound uncaught.
    pub fn solve(&mut self, goal: Continuation) -> PrologResult<bool> {
        // A fresh query starts from a clean search state. Whatever the
        // previous query left behind (live choice points after a solution,
        // the unwound remains of an error) must not be failed into.
        self.choices.clear();
        self.trail.undo_to(0);
        self.cut_barrier = 0;
        self.steps = 0;
        self.cont = Rc::new(Halt);
        self.run(goal)
    }

    /// Search for the next solution by failing into the remaining choice
    /// points.
    pub fn retry(&mut self) -> PrologResult<bool> {
        match self.fail() {
            Step::Goto(next) => self.run(next),
            _ => Ok(false),
        }
    }

    /// The trampoline. One continuation is current at any instant; every
    /// step returns the next one, so logical recursion and backtracking
    /// never grow the host stack. Errors short-circuit here, picking up
    /// their goal trace exactly once on the way out.
    fn run(&mut self, goal: Continuation) -> PrologResult<bool> {
        let mut current = goal;
        loop {
            if let Some(limit) = self.step_limit {
                if self.steps >= limit {
                    let mut error = step_budget_exhausted(limit);
                    error.add_goal_trace(self.goal_trace(current.describe()));
                    return Err(error);
                }
            }
            self.steps += 1;
            match current.exec(self) {
                Ok(Step::Goto(next)) => current = next,
                Ok(Step::Succeed) => return Ok(true),
                Ok(Step::Fail) => return Ok(false),
                Err(mut error) => {
                    error.add_goal_trace(self.goal_trace(current.describe()));
                    return Err(error);
                }
            }
        }
    }

    /// Capture policy for diagnostic traces: the frame of the instruction
    /// being executed, then the owner of each live choice point, newest
    /// first.
    fn goal_trace(&self, current: String) -> GoalTrace {
        let mut frames = vec![current];
        frames.extend(self.choices.iter().rev().map(|c| c.owner.to_string()));
        GoalTrace::new(frames)
    }

    // *** Term services ***

    /// Copy a term, replacing each distinct unbound variable with one
    /// fresh variable per call. Bound structure is shared, not copied.
    /// Used to instantiate a clause before resolving against it.
    pub fn copy_term(&self, term: &Term) -> Term {
        fn copy(term: &Term, epoch: u64, seen: &mut HashMap<u64, Term>) -> Term {
            let term = term.dereference();
            match term.value() {
                Value::Variable(v) => seen
                    .entry(v.id())
                    .or_insert_with(|| Term::from(Value::Variable(Variable::new(epoch))))
                    .clone(),
                Value::Structure(s) => {
                    if s.args.iter().all(|a| a.is_ground()) {
                        return term.clone();
                    }
                    Term::from(Value::Structure(Structure {
                        functor: s.functor.clone(),
                        args: s.args.iter().map(|a| copy(a, epoch, seen)).collect(),
                    }))
                }
                Value::Cons(c) => {
                    if term.is_ground() {
                        return term.clone();
                    }
                    Term::cons(copy(&c.head, epoch, seen), copy(&c.tail, epoch, seen))
                }
                _ => term.clone(),
            }
        }
        let mut seen = HashMap::new();
        copy(term, self.trail.epoch(), &mut seen)
    }

    // *** Diagnostics ***

    fn log<F: FnOnce() -> String>(&self, level: LogLevel, msg: F) {
        if let Some(configured) = self.log_level {
            if configured.should_print_on_level(level) {
                self.messages
                    .push(MessageKind::Print, format!("[{}] {}", level, msg()));
            }
        }
    }

    /// The diagnostic interface for the logging predicate: forward a term
    /// to the message sink under a caller-supplied namespace. When the
    /// term wraps a host-level failure, the underlying failure is
    /// forwarded as well.
    pub fn log_term(&self, namespace: &str, level: LogLevel, term: &Term) {
        if let Some(configured) = self.log_level {
            if !configured.should_print_on_level(level) {
                return;
            }
        } else {
            return;
        }
        let kind = if level >= LogLevel::Warning {
            MessageKind::Warning
        } else {
            MessageKind::Print
        };
        self.messages
            .push(kind.clone(), format!("{} [{}] {}", namespace, level, term));
        if let Value::Error(e) = term.dereference().value() {
            self.messages
                .push(kind, format!("{} [{}] caused by: {}", namespace, level, e.source()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{instantiation_error, ErrorKind, LogicError, OperationalError};
    use crate::instruction::{Alternatives, Fail, Instruction, Invoke, NeckCut};

    /// Clause body for tests: unify one argument register with a value,
    /// then return to the continuation register.
    struct UnifyArg {
        index: usize,
        value: Term,
    }

    impl Instruction for UnifyArg {
        fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
            let arg = vm.argument(self.index)?;
            if vm.unify(&arg, &self.value) {
                Ok(Step::Goto(vm.cont()))
            } else {
                Ok(vm.fail())
            }
        }

        fn describe(&self) -> String {
            "unify_arg/2".to_string()
        }
    }

    fn two_clause_entry(name: &str, first: Continuation, second: Continuation) -> Continuation {
        Rc::new(Alternatives {
            owner: Functor::new(name, 1),
            clauses: vec![first, second],
        })
    }

    fn invoke(name: &str, args: Vec<Term>, entry: Continuation) -> Continuation {
        Rc::new(Invoke {
            goal: Functor::new(name, args.len()),
            args,
            entry,
            cont: Rc::new(Halt),
        })
    }

    #[test]
    fn test_choice_retry() {
        // p(1). p(2).  Query p(X), then ask for more solutions.
        let x = var!();
        let entry = two_clause_entry(
            "p",
            Rc::new(UnifyArg {
                index: 0,
                value: term!(1),
            }),
            Rc::new(UnifyArg {
                index: 0,
                value: term!(2),
            }),
        );
        let mut vm = PrologVirtualMachine::default();

        assert!(vm.solve(invoke("p", vec![x.clone()], entry)).unwrap());
        assert_eq!(x.dereference(), term!(1));
        assert_eq!(vm.choice_depth(), 1);

        // Retry undoes X = 1 before X = 2 is ever visible.
        assert!(vm.retry().unwrap());
        assert_eq!(x.dereference(), term!(2));
        assert_eq!(vm.choice_depth(), 0);

        assert!(!vm.retry().unwrap());
    }

    #[test]
    fn test_cut_discards_alternatives() {
        // p(X) :- !, X = 1.  p(2).
        let x = var!();
        let first: Continuation = Rc::new(NeckCut {
            cont: Rc::new(UnifyArg {
                index: 0,
                value: term!(1),
            }),
        });
        let second: Continuation = Rc::new(UnifyArg {
            index: 0,
            value: term!(2),
        });
        let entry = two_clause_entry("p", first, second);
        let mut vm = PrologVirtualMachine::default();

        assert!(vm.solve(invoke("p", vec![x.clone()], entry)).unwrap());
        assert_eq!(x.dereference(), term!(1));
        assert_eq!(vm.choice_depth(), 0);

        // The second clause is gone, and the cut did not undo X = 1.
        assert!(!vm.retry().unwrap());
        assert_eq!(x.dereference(), term!(1));
    }

    #[test]
    fn test_solve_resets_search_state() {
        let x = var!();
        let entry = two_clause_entry(
            "p",
            Rc::new(UnifyArg {
                index: 0,
                value: term!(1),
            }),
            Rc::new(UnifyArg {
                index: 0,
                value: term!(2),
            }),
        );
        let mut vm = PrologVirtualMachine::default();
        assert!(vm.solve(invoke("p", vec![x.clone()], entry)).unwrap());
        assert_eq!(vm.choice_depth(), 1);

        // A fresh query that fails must not resume the previous query's
        // untried alternative.
        assert!(!vm.solve(Rc::new(Fail)).unwrap());
        assert_eq!(vm.choice_depth(), 0);
        assert!(x.is_unbound_variable());
    }

    #[test]
    fn test_registers_restored_on_retry() {
        /// First clause: clobber the register file, then fail.
        struct Clobber;
        impl Instruction for Clobber {
            fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
                vm.set_registers(&[atom!("junk")]);
                Ok(vm.fail())
            }
        }

        let x = var!();
        let entry = two_clause_entry(
            "q",
            Rc::new(Clobber),
            Rc::new(UnifyArg {
                index: 0,
                value: term!(2),
            }),
        );
        let mut vm = PrologVirtualMachine::default();
        assert!(vm.solve(invoke("q", vec![x.clone()], entry)).unwrap());
        assert_eq!(x.dereference(), term!(2));
    }

    #[test]
    fn test_retry_prunes_trail() {
        // A variable older than the choice point must be trailed when
        // bound under it, and restored on retry.
        let x = var!();
        let entry = two_clause_entry(
            "p",
            Rc::new(UnifyArg {
                index: 0,
                value: term!(1),
            }),
            Rc::new(UnifyArg {
                index: 0,
                value: term!(2),
            }),
        );
        let mut vm = PrologVirtualMachine::default();
        assert!(vm.solve(invoke("p", vec![x.clone()], entry)).unwrap());
        assert_eq!(vm.trail().len(), 1);

        // Retry replays the trail, then the second clause binds again. The
        // epoch stays put after the pop, so the new binding is trailed too.
        assert!(vm.retry().unwrap());
        assert_eq!(vm.trail().len(), 1);
        assert_eq!(x.dereference(), term!(2));
    }

    #[test]
    fn test_error_trace_captured_once() {
        /// A built-in that requires its argument to be bound.
        struct RequireBound;
        impl Instruction for RequireBound {
            fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
                let goal = Functor::new("require_bound", 1);
                let arg = vm.argument(0)?;
                if arg.is_unbound_variable() {
                    return Err(instantiation_error(&goal, 1));
                }
                Ok(Step::Goto(vm.cont()))
            }

            fn describe(&self) -> String {
                "require_bound/1".to_string()
            }
        }

        let x = var!();
        let entry = two_clause_entry(
            "p",
            Rc::new(RequireBound),
            Rc::new(UnifyArg {
                index: 0,
                value: term!(2),
            }),
        );
        let mut vm = PrologVirtualMachine::default();
        let error = vm.solve(invoke("p", vec![x], entry)).unwrap_err();

        assert!(matches!(
            error.kind,
            ErrorKind::Logic(LogicError::Instantiation { .. })
        ));
        let trace = error.trace().expect("trace captured at raise time");
        assert!(!trace.is_empty());
        assert_eq!(trace.frames(), ["require_bound/1", "p/1"]);
        // Inspecting twice yields identical content.
        assert_eq!(trace.frames(), error.trace().unwrap().frames());
    }

    #[test]
    fn test_step_budget() {
        struct Spin;
        impl Instruction for Spin {
            fn exec(&self, _vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
                Ok(Step::Goto(Rc::new(Spin)))
            }
        }

        let mut vm = PrologVirtualMachine::default();
        vm.set_step_limit(Some(100));
        let error = vm.solve(Rc::new(Spin)).unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::Operational(OperationalError::StepBudgetExhausted { limit: 100 })
        ));
    }

    #[test]
    fn test_choice_stack_limit() {
        struct Churn;
        impl Instruction for Churn {
            fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
                vm.push_choice(Functor::new("churn", 0), Rc::new(Churn))?;
                Ok(Step::Goto(Rc::new(Churn)))
            }
        }

        let mut vm = PrologVirtualMachine::default();
        vm.set_stack_limit(2);
        let error = vm.solve(Rc::new(Churn)).unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::Operational(OperationalError::ChoiceOverflow { limit: 2 })
        ));
    }

    #[test]
    fn test_copy_term() {
        let vm = PrologVirtualMachine::default();
        let x = var!();
        let y = var!();
        let original = structure!("f", [x.clone(), x.clone(), y.clone(), "a"]);

        let copy = vm.copy_term(&original);
        let s = copy.as_structure().unwrap();

        // Sharing is preserved inside the copy, but the cells are fresh.
        assert_eq!(s.args[0].compare(&s.args[1]), std::cmp::Ordering::Equal);
        assert_ne!(s.args[0], x);
        assert_ne!(s.args[2], y);
        assert_eq!(s.args[3], atom!("a"));

        // Binding the original leaves the copy untouched.
        let mut vm = vm;
        assert!(vm.unify(&x, &term!(1)));
        assert!(s.args[0].is_unbound_variable());
    }

    #[test]
    fn test_log_term_forwards_host_failure() {
        let mut vm = PrologVirtualMachine::default();
        vm.set_log_level(Some(LogLevel::Info));

        vm.log_term("app.db", LogLevel::Info, &atom!("connected"));
        let message = vm.messages.next().unwrap();
        assert!(matches!(message.kind, MessageKind::Print));
        assert_eq!(message.msg, "app.db [info] connected");

        let failure = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let term = Term::from(Value::Error(crate::terms::ErrorValue::new(failure)));
        vm.log_term("app.db", LogLevel::Error, &term);

        let first = vm.messages.next().unwrap();
        assert!(matches!(first.kind, MessageKind::Warning));
        let second = vm.messages.next().unwrap();
        assert_eq!(second.msg, "app.db [error] caused by: disk on fire");

        // Below the configured level nothing is forwarded.
        vm.set_log_level(Some(LogLevel::Error));
        vm.log_term("app.db", LogLevel::Info, &atom!("ignored"));
        assert!(vm.messages.next().is_none());
    }
}
