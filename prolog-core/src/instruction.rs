use std::rc::Rc;

use crate::error::PrologResult;
use crate::terms::{Functor, Term};
use crate::vm::PrologVirtualMachine;

/// The remaining computation. The engine never inspects a continuation;
/// it only invokes the next one.
pub type Continuation = Rc<dyn Instruction>;

/// Outcome of one trampoline step.
#[must_use = "an unhandled step stalls the trampoline"]
pub enum Step {
    /// Run this continuation next.
    Goto(Continuation),
    /// Terminal: a solution was found.
    Succeed,
    /// Terminal: no choice point remains to retry.
    Fail,
}

/// A unit of execution: one resolution step, a compiled clause fragment,
/// or a built-in predicate.
///
/// Given the engine, an instruction unifies against its arguments and
/// returns the next continuation on success, returns `vm.fail()` on
/// logical failure, or raises a `PrologError` for erroneous conditions.
/// A built-in that offers nondeterministic alternatives must call
/// `vm.set_cut_barrier()` before pushing any choice point.
pub trait Instruction {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step>;

    /// Frame description used in captured goal traces.
    fn describe(&self) -> String {
        "<goal>".to_string()
    }
}

/// Terminal success; the continuation installed below the top-level goal.
pub struct Halt;

impl Instruction for Halt {
    fn exec(&self, _vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        Ok(Step::Succeed)
    }

    fn describe(&self) -> String {
        "halt/0".to_string()
    }
}

/// Unconditional logical failure, `fail/0`.
pub struct Fail;

impl Instruction for Fail {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        Ok(vm.fail())
    }

    fn describe(&self) -> String {
        "fail/0".to_string()
    }
}

/// Unify two terms, then continue.
pub struct Unify {
    pub left: Term,
    pub right: Term,
    pub cont: Continuation,
}

impl Instruction for Unify {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        if vm.unify(&self.left, &self.right) {
            Ok(Step::Goto(self.cont.clone()))
        } else {
            Ok(vm.fail())
        }
    }

    fn describe(&self) -> String {
        "=/2".to_string()
    }
}

/// A predicate call: load the arguments into the registers, set the
/// continuation register and the cut barrier, and jump to the predicate's
/// entry point. The barrier is recorded here, at invocation entry, before
/// the callee can push any choice point.
pub struct Invoke {
    pub goal: Functor,
    pub args: Vec<Term>,
    pub entry: Continuation,
    pub cont: Continuation,
}

impl Instruction for Invoke {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        vm.set_registers(&self.args);
        vm.set_cont(self.cont.clone());
        vm.set_cut_barrier();
        Ok(Step::Goto(self.entry.clone()))
    }

    fn describe(&self) -> String {
        self.goal.to_string()
    }
}

/// A predicate entry point with one continuation per clause. With more
/// than one viable clause, exactly one choice point is pushed before
/// committing to the first; the recorded alternative re-enters here with
/// the remaining clauses.
pub struct Alternatives {
    pub owner: Functor,
    pub clauses: Vec<Continuation>,
}

impl Instruction for Alternatives {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        match self.clauses.split_first() {
            None => Ok(vm.fail()),
            Some((first, rest)) => {
                if !rest.is_empty() {
                    let next = Rc::new(Alternatives {
                        owner: self.owner.clone(),
                        clauses: rest.to_vec(),
                    });
                    vm.push_choice(self.owner.clone(), next)?;
                }
                Ok(Step::Goto(first.clone()))
            }
        }
    }

    fn describe(&self) -> String {
        self.owner.to_string()
    }
}

/// Discard every choice point pushed since `barrier`, then continue.
/// Bindings are untouched; cut only removes future backtracking options.
///
/// The barrier must be the one in force at the owning invocation's entry.
/// Nested invocations overwrite the machine's barrier register and nothing
/// restores it on return, so a body that cuts after a call reads the
/// register at clause entry and builds the `Cut` with that value.
pub struct Cut {
    pub barrier: usize,
    pub cont: Continuation,
}

impl Instruction for Cut {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        vm.cut(self.barrier);
        Ok(Step::Goto(self.cont.clone()))
    }

    fn describe(&self) -> String {
        "!/0".to_string()
    }
}

/// Cut as the first goal of a clause body. No call has intervened since
/// the invocation entry, so the machine's barrier register still holds the
/// owning invocation's barrier.
pub struct NeckCut {
    pub cont: Continuation,
}

impl Instruction for NeckCut {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        vm.cut(vm.cut_barrier());
        Ok(Step::Goto(self.cont.clone()))
    }

    fn describe(&self) -> String {
        "!/0".to_string()
    }
}

/// Return to the continuation register: the tail of a clause body.
pub struct Proceed;

impl Instruction for Proceed {
    fn exec(&self, vm: &mut PrologVirtualMachine) -> PrologResult<Step> {
        Ok(Step::Goto(vm.cont()))
    }

    fn describe(&self) -> String {
        "proceed".to_string()
    }
}
