#[cfg(test)]
#[macro_use]
extern crate maplit;

#[macro_use]
pub mod macros;

pub mod bindings;
pub mod error;
pub mod formatting;
pub mod instruction;
pub mod messages;
mod numerics;
pub mod terms;
pub mod vm;

pub use bindings::Trail;
pub use error::{PrologError, PrologResult};
pub use formatting::ToPrologString;
pub use instruction::{Continuation, Instruction, Step};
pub use messages::{LogLevel, Message, MessageKind, MessageQueue};
pub use terms::{Functor, Numeric, Symbol, Term, Value, Variable};
pub use vm::PrologVirtualMachine;
