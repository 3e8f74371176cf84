//! Console capability: one swappable method per log level

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::event::ConsoleLevel;

use super::capability::Capability;

/// One console method (`log`, `warn`, ...)
pub trait ConsoleMethod: Send + Sync {
    /// Handle a call with the given arguments
    fn call(&self, args: &[Value]);
}

impl<F> ConsoleMethod for F
where
    F: Fn(&[Value]) + Send + Sync,
{
    fn call(&self, args: &[Value]) {
        self(args);
    }
}

/// Default console method: forwards to `tracing` under target `console`
#[derive(Debug, Clone, Copy)]
pub struct TracingConsoleMethod {
    level: ConsoleLevel,
}

impl TracingConsoleMethod {
    /// Method for `level`
    #[must_use]
    pub fn new(level: ConsoleLevel) -> Self {
        Self { level }
    }
}

impl ConsoleMethod for TracingConsoleMethod {
    fn call(&self, args: &[Value]) {
        let message = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        match self.level {
            ConsoleLevel::Log | ConsoleLevel::Info => info!(target: "console", "{message}"),
            ConsoleLevel::Warn => warn!(target: "console", "{message}"),
            ConsoleLevel::Error => error!(target: "console", "{message}"),
            ConsoleLevel::Debug => debug!(target: "console", "{message}"),
        }
    }
}

/// The host console
#[derive(Debug)]
pub struct Console {
    methods: [Capability<dyn ConsoleMethod>; 5],
}

impl Console {
    /// Console whose methods are built by `make`
    pub fn with_methods(mut make: impl FnMut(ConsoleLevel) -> Arc<dyn ConsoleMethod>) -> Self {
        Self {
            methods: ConsoleLevel::ALL.map(|level| Capability::new(make(level))),
        }
    }

    /// Console that forwards to `tracing`
    #[must_use]
    pub fn tracing() -> Self {
        Self::with_methods(|level| Arc::new(TracingConsoleMethod::new(level)))
    }

    /// Slot for one level
    #[must_use]
    pub fn method(&self, level: ConsoleLevel) -> &Capability<dyn ConsoleMethod> {
        &self.methods[level.index()]
    }

    /// Call the method for `level`
    pub fn emit(&self, level: ConsoleLevel, args: &[Value]) {
        self.method(level).get().call(args);
    }

    /// `console.log`
    pub fn log(&self, args: &[Value]) {
        self.emit(ConsoleLevel::Log, args);
    }

    /// `console.warn`
    pub fn warn(&self, args: &[Value]) {
        self.emit(ConsoleLevel::Warn, args);
    }

    /// `console.error`
    pub fn error(&self, args: &[Value]) {
        self.emit(ConsoleLevel::Error, args);
    }

    /// `console.info`
    pub fn info(&self, args: &[Value]) {
        self.emit(ConsoleLevel::Info, args);
    }

    /// `console.debug`
    pub fn debug(&self, args: &[Value]) {
        self.emit(ConsoleLevel::Debug, args);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::tracing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_emit_routes_by_level() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let console = Console::with_methods(|level| {
            let seen = Arc::clone(&seen);
            Arc::new(move |args: &[Value]| seen.lock().push((level, args.to_vec())))
        });

        console.warn(&[json!("w")]);
        console.debug(&[json!(1), json!(2)]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (ConsoleLevel::Warn, vec![json!("w")]));
        assert_eq!(seen[1].0, ConsoleLevel::Debug);
    }
}
