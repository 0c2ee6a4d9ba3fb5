use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use log::warn;
use spin::Mutex;

use crate::{join, Aggregate, Task};

/// The outcome of a resolved [`Yieldable`] or of a whole run
///
/// `Err` is fed back as an error raised at the suspension point, `Ok` as the
/// value of the suspension.
pub type Outcome<V, E> = Result<V, E>;

/// A deferred operation, invoked once with its completion handler
///
/// A start failure is reported through the returned `Err`.
pub type Operation<V, E> = Box<dyn FnOnce(Settle<V, E>) -> Result<(), E> + Send>;

/// A normalized yieldable, ready to be started
pub(crate) type Start<V, E> = Box<dyn FnOnce(Settle<V, E>) + Send>;

/// The completion handler handed to an asynchronous operation
///
/// It is consumed when settled, so an operation can only settle once.
/// Settling may happen synchronously, inside the operation's start, or later
/// from any thread.
pub struct Settle<V, E> {
    inner: Box<dyn FnOnce(Outcome<V, E>) + Send>,
}

impl<V, E> Settle<V, E> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        let inner = Box::new(f);
        Settle { inner }
    }

    /// Settle with the given outcome
    pub fn settle(self, outcome: Outcome<V, E>) {
        (self.inner)(outcome)
    }

    /// Settle successfully with `value`
    pub fn ok(self, value: V) {
        self.settle(Ok(value))
    }

    /// Settle with an error
    pub fn err(self, error: E) {
        self.settle(Err(error))
    }

    /// Settle from a callback-style `(error, value)` pair
    ///
    /// A present error always wins, the value is then dropped.
    /// ```
    /// use codrive::*;
    /// let task = start(|| resolve(Yieldable::deferred(|settle: Settle<Value, String>| {
    ///     settle.callback(Some("boom".to_string()), Value::Int(1))
    /// })));
    /// assert_eq!(task.wait(), Err("boom".to_string()));
    /// ```
    pub fn callback(self, error: Option<E>, value: V) {
        match error {
            Some(error) => self.err(error),
            None => self.ok(value),
        }
    }
}

impl<V, E> Debug for Settle<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settle").finish_non_exhaustive()
    }
}

/// A value produced at a suspension point
///
/// Each variant describes a different piece of work to wait on.
pub enum Yieldable<V, E> {
    /// A callback-style operation, started with a completion handler
    Deferred(Operation<V, E>),
    /// Another driven computation; resolves to its final outcome
    Nested(Task<V, E>),
    /// Resolves to the values of all elements, in order
    Sequence(Vec<Yieldable<V, E>>),
    /// Resolves to the values of all elements, by key
    Mapping(BTreeMap<String, Yieldable<V, E>>),
    /// Already resolved
    Immediate(V),
}

impl<V, E> Yieldable<V, E> {
    /// A callback-style operation that settles its handler exactly once
    pub fn deferred<F>(op: F) -> Self
    where
        F: FnOnce(Settle<V, E>) + Send + 'static,
    {
        Yieldable::Deferred(Box::new(move |settle| {
            op(settle);
            Ok(())
        }))
    }

    /// A callback-style operation whose start may fail
    ///
    /// An `Err` returned before the handler settled becomes the outcome of the
    /// operation.
    pub fn try_deferred<F>(op: F) -> Self
    where
        F: FnOnce(Settle<V, E>) -> Result<(), E> + Send + 'static,
    {
        Yieldable::Deferred(Box::new(op))
    }

    /// Another driven computation
    pub fn nested(task: Task<V, E>) -> Self {
        Yieldable::Nested(task)
    }

    /// A value that is already resolved
    pub fn immediate(value: V) -> Self {
        Yieldable::Immediate(value)
    }

    /// Collects yieldables into a [`Yieldable::Sequence`]
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Yieldable<V, E>>,
    {
        Yieldable::Sequence(items.into_iter().collect())
    }

    /// Collects keyed yieldables into a [`Yieldable::Mapping`]
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Yieldable<V, E>)>,
    {
        let entries = entries.into_iter().map(|(k, y)| (k.into(), y));
        Yieldable::Mapping(entries.collect())
    }
}

impl<V, E> Yieldable<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    /// Turn the yielded value into a single start operation
    ///
    /// The start operation settles its handler exactly once, after the
    /// described work resolved.
    pub(crate) fn into_start(self) -> Start<V, E> {
        match self {
            Yieldable::Deferred(op) => Box::new(move |settle| start_deferred(op, settle)),
            Yieldable::Nested(task) => {
                Box::new(move |settle: Settle<V, E>| task.call(move |outcome| settle.settle(outcome)))
            }
            Yieldable::Sequence(items) => Box::new(move |settle| join::sequence(items, settle)),
            Yieldable::Mapping(entries) => Box::new(move |settle| join::mapping(entries, settle)),
            Yieldable::Immediate(value) => Box::new(move |settle: Settle<V, E>| settle.ok(value)),
        }
    }
}

/// Starts a deferred operation, turning a start failure into its outcome
///
/// The handler is kept aside so a failure reported after the operation already
/// settled is dropped instead of settling twice.
fn start_deferred<V, E>(op: Operation<V, E>, settle: Settle<V, E>)
where
    V: Send + 'static,
    E: Debug + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(settle)));
    let handle = {
        let slot = Arc::clone(&slot);
        Settle::new(move |outcome| {
            let settle = slot.lock().take();
            if let Some(settle) = settle {
                settle.settle(outcome)
            }
        })
    };
    if let Err(error) = op(handle) {
        let settle = slot.lock().take();
        match settle {
            Some(settle) => settle.err(error),
            None => warn!("operation failed after it settled, dropping {:?}", error),
        }
    }
}

impl<V, E> From<Task<V, E>> for Yieldable<V, E> {
    fn from(task: Task<V, E>) -> Self {
        Yieldable::Nested(task)
    }
}

impl<V, E> From<Vec<Yieldable<V, E>>> for Yieldable<V, E> {
    fn from(items: Vec<Yieldable<V, E>>) -> Self {
        Yieldable::Sequence(items)
    }
}

impl<V, E> From<BTreeMap<String, Yieldable<V, E>>> for Yieldable<V, E> {
    fn from(entries: BTreeMap<String, Yieldable<V, E>>) -> Self {
        Yieldable::Mapping(entries)
    }
}

impl<V: Debug, E> Debug for Yieldable<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Yieldable::Deferred(_) => f.write_str("Deferred"),
            Yieldable::Nested(task) => f.debug_tuple("Nested").field(task).finish(),
            Yieldable::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Yieldable::Mapping(entries) => f.debug_tuple("Mapping").field(entries).finish(),
            Yieldable::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
        }
    }
}
