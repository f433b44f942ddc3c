use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a diagnostic message.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialOrd, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Should a message at `level` be emitted when this is the configured
    /// threshold?
    pub fn should_print_on_level(&self, level: LogLevel) -> bool {
        *self <= level
    }

    /// Parse a level name as found in the `PROLOG_LOG` environment
    /// variable. `off` and `0` mute logging entirely.
    pub fn from_name(name: &str) -> Option<LogLevel> {
        match name.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "off" | "0" => None,
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageKind {
    Print,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub msg: String,
}

/// Diagnostic sink shared between the engine and its host. The engine
/// pushes synchronously and never observes a result; the host drains at
/// its leisure.
#[derive(Clone, Debug)]
pub struct MessageQueue {
    messages: Arc<Mutex<VecDeque<Message>>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn next(&self) -> Option<Message> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.pop_front()
        } else {
            None
        }
    }

    pub fn push(&self, kind: MessageKind, msg: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push_back(Message { kind, msg });
        }
    }

    pub fn extend<T: IntoIterator<Item = Message>>(&self, iter: T) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.extend(iter)
        }
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
