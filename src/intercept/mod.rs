//! Interceptors over host capabilities
//!
//! Each interceptor wraps one family of host APIs, records an [`Event`] per
//! call through its [`EventSink`] and then delegates to the saved original.
//! Uninstalling puts the exact saved originals back.
//!
//! [`Event`]: crate::event::Event

mod console;
mod indexed_db;
pub mod network;
mod storage;

pub use console::ConsoleInterceptor;
pub use indexed_db::IndexedDbInterceptor;
pub use network::NetworkInterceptor;
pub use storage::StorageInterceptor;

use tracing::debug;

use crate::config::{InterceptorToggles, RecorderConfig};
use crate::event::EventSink;
use crate::host::HostEnvironment;

/// One family of wrapped host APIs
pub trait Interceptor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Wrap the host APIs, saving the originals. No-op if already installed.
    fn install(&mut self, host: &HostEnvironment, sink: &EventSink);

    /// Restore the saved originals. No-op if not installed.
    fn uninstall(&mut self, host: &HostEnvironment);

    /// Whether wrappers are in place
    fn is_installed(&self) -> bool;
}

/// The enabled interceptors of one recorder
pub struct InterceptorSet {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorSet {
    /// Set of explicit interceptors
    #[must_use]
    pub fn new(interceptors: Vec<Box<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    /// Interceptors enabled in `config`
    #[must_use]
    pub fn from_config(config: &RecorderConfig) -> Self {
        let InterceptorToggles {
            console,
            network,
            storage,
            indexed_db,
        } = config.interceptors;

        let mut interceptors: Vec<Box<dyn Interceptor>> = Vec::new();
        if console {
            interceptors.push(Box::new(ConsoleInterceptor::new(config.console.levels.clone())));
        }
        if network {
            interceptors.push(Box::new(NetworkInterceptor::new()));
        }
        if storage {
            interceptors.push(Box::new(StorageInterceptor::new()));
        }
        if indexed_db {
            interceptors.push(Box::new(IndexedDbInterceptor::new()));
        }
        Self::new(interceptors)
    }

    /// Install every interceptor against `sink`
    pub fn install_all(&mut self, host: &HostEnvironment, sink: &EventSink) {
        for interceptor in &mut self.interceptors {
            interceptor.install(host, sink);
            debug!(interceptor = interceptor.name(), session = sink.session(), "installed");
        }
    }

    /// Uninstall in reverse install order
    pub fn uninstall_all(&mut self, host: &HostEnvironment) {
        for interceptor in self.interceptors.iter_mut().rev() {
            if interceptor.is_installed() {
                interceptor.uninstall(host);
                debug!(interceptor = interceptor.name(), "uninstalled");
            }
        }
    }

    /// Whether any interceptor is installed
    #[must_use]
    pub fn any_installed(&self) -> bool {
        self.interceptors.iter().any(|i| i.is_installed())
    }

    /// Names of the interceptors in this set
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }
}

impl std::fmt::Debug for InterceptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorSet")
            .field("interceptors", &self.names())
            .field("installed", &self.any_installed())
            .finish()
    }
}
