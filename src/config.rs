use std::{borrow::Cow, fmt::Debug, sync::Arc};

use log::error;

use crate::Error;

/// What happens to a final error when a run has no completion callback
pub enum Unhandled<E> {
    /// Log it, then panic with [`Error::Unhandled`]
    Panic,
    /// Log it and carry on
    Log,
    /// Hand it to the hook
    Hook(Arc<dyn Fn(E) + Send + Sync>),
}

impl<E> Unhandled<E> {
    /// Wraps `f` into [`Unhandled::Hook`]
    pub fn hook<F>(f: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        Unhandled::Hook(Arc::new(f))
    }
}

impl<E> Default for Unhandled<E> {
    fn default() -> Self {
        Unhandled::Panic
    }
}

impl<E> Clone for Unhandled<E> {
    fn clone(&self) -> Self {
        match self {
            Unhandled::Panic => Unhandled::Panic,
            Unhandled::Log => Unhandled::Log,
            Unhandled::Hook(hook) => Unhandled::Hook(Arc::clone(hook)),
        }
    }
}

impl<E> Debug for Unhandled<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unhandled::Panic => f.write_str("Panic"),
            Unhandled::Log => f.write_str("Log"),
            Unhandled::Hook(_) => f.write_str("Hook"),
        }
    }
}

/// Settings of a [`Task`](crate::Task), copied into every run
pub struct Config<E> {
    /// Prefixes the log messages of a run
    pub name: Option<Cow<'static, str>>,
    /// Where a final error goes when nobody waits for it
    pub unhandled: Unhandled<E>,
}

impl<E> Config<E> {
    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("task")
    }
}

impl<E: Debug> Config<E> {
    /// Surfaces a final error that has no completion callback to go to
    pub(crate) fn surface(&self, e: E) {
        match &self.unhandled {
            Unhandled::Panic => {
                error!("{}: unhandled error {:?}", self.label(), e);
                panic!("{}", Error::Unhandled(e));
            }
            Unhandled::Log => error!("{}: unhandled error {:?}", self.label(), e),
            Unhandled::Hook(hook) => hook(e),
        }
    }
}

impl<E> Default for Config<E> {
    fn default() -> Self {
        Config {
            name: None,
            unhandled: Unhandled::default(),
        }
    }
}

impl<E> Clone for Config<E> {
    fn clone(&self) -> Self {
        Config {
            name: self.name.clone(),
            unhandled: self.unhandled.clone(),
        }
    }
}

impl<E> Debug for Config<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("unhandled", &self.unhandled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hook_receives_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let config: Config<usize> = Config {
            name: Some("hooked".into()),
            unhandled: Unhandled::hook(move |e| {
                counter.fetch_add(e, Ordering::SeqCst);
            }),
        };
        config.surface(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    #[should_panic(expected = "unhandled error in driven computation: \"boom\"")]
    fn panic_reraises() {
        Config::<&str>::default().surface("boom");
    }

    #[test]
    fn log_swallows() {
        let config: Config<&str> = Config {
            name: None,
            unhandled: Unhandled::Log,
        };
        config.surface("boom");
        assert_eq!(config.label(), "task");
    }
}
