use std::sync::Arc;

use serde_json::Value;

use crate::event::{ConsoleEvent, ConsoleLevel, Event, EventSink};
use crate::host::{ConsoleMethod, HostEnvironment};

use super::Interceptor;

/// Records console output at the configured levels
pub struct ConsoleInterceptor {
    levels: Vec<ConsoleLevel>,
    originals: Vec<(ConsoleLevel, Arc<dyn ConsoleMethod>)>,
    installed: bool,
}

impl ConsoleInterceptor {
    /// Interceptor for `levels`; repeated levels are wrapped once
    #[must_use]
    pub fn new(levels: Vec<ConsoleLevel>) -> Self {
        let mut unique = Vec::with_capacity(levels.len());
        for level in levels {
            if !unique.contains(&level) {
                unique.push(level);
            }
        }
        Self {
            levels: unique,
            originals: Vec::new(),
            installed: false,
        }
    }
}

struct RecordingConsole {
    level: ConsoleLevel,
    original: Arc<dyn ConsoleMethod>,
    sink: EventSink,
}

impl ConsoleMethod for RecordingConsole {
    fn call(&self, args: &[Value]) {
        let message = self.sink.stringify_args(args);
        self.sink.record(|timestamp| {
            Event::Console(ConsoleEvent {
                level: self.level,
                message,
                timestamp,
            })
        });
        self.original.call(args);
    }
}

impl Interceptor for ConsoleInterceptor {
    fn name(&self) -> &'static str {
        "console"
    }

    fn install(&mut self, host: &HostEnvironment, sink: &EventSink) {
        if self.installed {
            return;
        }
        for &level in &self.levels {
            let original = host.console().method(level).wrap(|original| {
                Arc::new(RecordingConsole {
                    level,
                    original,
                    sink: sink.clone(),
                })
            });
            self.originals.push((level, original));
        }
        self.installed = true;
    }

    fn uninstall(&mut self, host: &HostEnvironment) {
        if !self.installed {
            return;
        }
        // Reverse order so nested wraps unwind to the first original
        for (level, original) in self.originals.drain(..).rev() {
            host.console().method(level).replace(original);
        }
        self.installed = false;
    }

    fn is_installed(&self) -> bool {
        self.installed
    }
}
