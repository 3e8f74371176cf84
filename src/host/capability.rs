//! Swappable slot holding one host API implementation

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A host capability that interceptors can wrap and later restore.
///
/// Callers always go through [`Capability::get`], so replacing the slot
/// content redirects every subsequent call without touching shared globals.
pub struct Capability<T: ?Sized> {
    current: RwLock<Arc<T>>,
}

impl<T: ?Sized> Capability<T> {
    /// Slot holding `initial`
    pub fn new(initial: Arc<T>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Current implementation
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Install `next`, returning what was there
    pub fn replace(&self, next: Arc<T>) -> Arc<T> {
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Replace the current implementation with a wrapper built around it.
    ///
    /// Read and write happen under one lock. Returns the wrapped original.
    pub fn wrap(&self, build: impl FnOnce(Arc<T>) -> Arc<T>) -> Arc<T> {
        let mut current = self.current.write();
        let original = Arc::clone(&current);
        *current = build(Arc::clone(&original));
        original
    }

    /// Whether the slot holds exactly `candidate`
    pub fn is(&self, candidate: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.current.read(), candidate)
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Plain;
    impl Greeter for Plain {
        fn greet(&self) -> String {
            "hi".to_string()
        }
    }

    struct Loud(Arc<dyn Greeter>);
    impl Greeter for Loud {
        fn greet(&self) -> String {
            self.0.greet().to_uppercase()
        }
    }

    #[test]
    fn test_wrap_and_restore_identity() {
        let plain: Arc<dyn Greeter> = Arc::new(Plain);
        let slot = Capability::new(Arc::clone(&plain));

        let original = slot.wrap(|inner| Arc::new(Loud(inner)));
        assert!(Arc::ptr_eq(&original, &plain));
        assert_eq!(slot.get().greet(), "HI");
        assert!(!slot.is(&plain));

        slot.replace(original);
        assert!(slot.is(&plain));
        assert_eq!(slot.get().greet(), "hi");
    }
}
