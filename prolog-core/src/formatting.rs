//! # Formatting
//!
//! Terms have two textual forms:
//!
//! 1. Plain strings: atoms written bare, for logs and error messages
//! 2. Quoted strings: atoms quoted and escaped whenever they would not
//!    read back as a single token, the form a reader could re-ingest
//!
//! Debug output stays with the Rust-derived `fmt::Debug` impls. Unbound
//! variables render as `_N` from their creation identity; bound variables
//! render as their dereferenced value in every form.

use std::fmt;

use crate::terms::{Cons, Functor, Symbol, Term, Value};

pub trait ToPrologString {
    fn to_prolog(&self) -> String;
    fn to_quoted(&self) -> String;
}

impl ToPrologString for Term {
    fn to_prolog(&self) -> String {
        let mut out = String::new();
        write_term(&mut out, self, false);
        out
    }

    fn to_quoted(&self) -> String {
        let mut out = String::new();
        write_term(&mut out, self, true);
        out
    }
}

impl ToPrologString for Value {
    fn to_prolog(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self, false);
        out
    }

    fn to_quoted(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self, true);
        out
    }
}

fn write_term(out: &mut String, term: &Term, quoted: bool) {
    write_value(out, term.dereference().value(), quoted)
}

fn write_value(out: &mut String, value: &Value, quoted: bool) {
    match value {
        Value::Variable(v) => match v.value() {
            None => {
                out.push('_');
                out.push_str(&v.id().to_string());
            }
            Some(bound) => write_term(out, &bound, quoted),
        },
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Symbol(s) => write_atom(out, s.name(), quoted),
        Value::Structure(s) => {
            write_atom(out, s.functor.name(), quoted);
            out.push('(');
            for (i, arg) in s.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_term(out, arg, quoted);
            }
            out.push(')');
        }
        Value::Cons(c) => write_list(out, c, quoted),
        Value::Host(h) => {
            out.push('<');
            out.push_str(h.repr());
            out.push('>');
        }
        Value::Error(e) => {
            out.push_str("<error: ");
            out.push_str(&e.source().to_string());
            out.push('>');
        }
    }
}

fn write_list(out: &mut String, cell: &Cons, quoted: bool) {
    out.push('[');
    write_term(out, &cell.head, quoted);
    let mut tail = cell.tail.dereference();
    loop {
        let next = match tail.value() {
            Value::Cons(c) => {
                out.push_str(", ");
                write_term(out, &c.head, quoted);
                c.tail.dereference()
            }
            Value::Symbol(s) if s.name() == "[]" => break,
            other => {
                out.push('|');
                write_value(out, other, quoted);
                break;
            }
        };
        tail = next;
    }
    out.push(']');
}

fn write_atom(out: &mut String, name: &str, quoted: bool) {
    if quoted && atom_needs_quotes(name) {
        out.push('\'');
        for c in name.chars() {
            match c {
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        }
        out.push('\'');
    } else {
        out.push_str(name);
    }
}

/// An atom reads back bare when it is a lowercase alphanumeric word, a
/// run of symbol characters, or one of the solo atoms.
fn atom_needs_quotes(name: &str) -> bool {
    if matches!(name, "[]" | "{}" | "!" | ";" | ",") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => !name.chars().all(is_symbol_char),
    }
}

fn is_symbol_char(c: char) -> bool {
    "+-*/\\^<>=~:.?@#&$".contains(c)
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_prolog())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_prolog())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Functor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Trail;

    #[test]
    fn test_plain_and_quoted_atoms() {
        assert_eq!(atom!("foo").to_prolog(), "foo");
        assert_eq!(atom!("foo").to_quoted(), "foo");
        assert_eq!(atom!("hello world").to_prolog(), "hello world");
        assert_eq!(atom!("hello world").to_quoted(), "'hello world'");
        assert_eq!(atom!("Caps").to_quoted(), "'Caps'");
        assert_eq!(atom!("+").to_quoted(), "+");
        assert_eq!(atom!("[]").to_quoted(), "[]");
        assert_eq!(atom!("it's").to_quoted(), "'it\\'s'");
    }

    #[test]
    fn test_structures_and_lists() {
        let t = structure!("point", [1, 2.5]);
        assert_eq!(t.to_prolog(), "point(1, 2.5)");

        let l = list![1, "two", 3];
        assert_eq!(l.to_prolog(), "[1, two, 3]");
        assert_eq!(list![].to_prolog(), "[]");
    }

    #[test]
    fn test_partial_list() {
        let tail = var!();
        let l = Term::list_with_tail(vec![term!(1), term!(2)], tail.clone());
        let id = match tail.value() {
            Value::Variable(v) => v.id(),
            _ => unreachable!(),
        };
        assert_eq!(l.to_prolog(), format!("[1, 2|_{}]", id));
    }

    #[test]
    fn test_bound_variable_renders_value() {
        let mut trail = Trail::new();
        let x = var!();
        assert!(x.unify(&structure!("f", [atom!("A b")]), &mut trail));
        assert_eq!(x.to_prolog(), "f(A b)");
        assert_eq!(x.to_quoted(), "f('A b')");
    }
}
