//! The entry point: a re-invocable handle on a computation factory.

use std::{
    borrow::Cow,
    fmt::Debug,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use spin::Mutex;

use crate::{
    driver::{Completion, Driver},
    Aggregate, Computation, Config, DriveResult, Error, Outcome, Unhandled,
};

/// Builds a fresh computation and drives it with the given configuration
type Launch<V, E> = dyn Fn(Option<Completion<V, E>>, Config<E>) + Send + Sync;

/// A computation ready to be driven
///
/// Every invocation (`call`, `spawn`, `wait`, `.await`) builds a fresh
/// computation from the factory and drives it on its own, so a task can be run
/// any number of times. A task can also be yielded from another computation,
/// see [`Yieldable::Nested`](crate::Yieldable::Nested).
pub struct Task<V, E> {
    launch: Arc<Launch<V, E>>,
    config: Config<E>,
}

/// Creates a task from a computation factory
///
/// Nothing runs until the task is invoked.
/// ```
/// use codrive::*;
/// let task: Task<Value, String> = start(|| result(Value::Int(1)));
/// assert_eq!(task.wait(), Ok(Value::Int(1)));
/// ```
pub fn start<V, E, F>(factory: F) -> Task<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
    F: Fn() -> Computation<'static, V, E> + Send + Sync + 'static,
{
    let launch = move |completion: Option<Completion<V, E>>, config: Config<E>| {
        Driver::new(factory(), completion, config).run()
    };
    Task {
        launch: Arc::new(launch),
        config: Config::default(),
    }
}

/// Creates a task from a computation factory and its initial arguments
///
/// Each run receives its own clone of `args`.
/// ```
/// use codrive::*;
/// let task: Task<Value, String> = start_with(|n: i64| result(Value::Int(n * 2)), 21);
/// assert_eq!(task.wait(), Ok(Value::Int(42)));
/// ```
pub fn start_with<V, E, A, F>(factory: F, args: A) -> Task<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
    A: Clone + Send + Sync + 'static,
    F: Fn(A) -> Computation<'static, V, E> + Send + Sync + 'static,
{
    start(move || factory(args.clone()))
}

impl<V, E> Task<V, E> {
    /// Labels the runs of this task in log messages
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Sets what happens to a final error when a run has no callback
    pub fn on_unhandled(mut self, unhandled: Unhandled<E>) -> Self {
        self.config.unhandled = unhandled;
        self
    }

    /// The configuration every run of this task starts with
    pub fn config(&self) -> &Config<E> {
        &self.config
    }
}

impl<V, E> Task<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    /// Runs the task, delivering the final outcome to `done` exactly once
    ///
    /// `done` is called on whatever thread the last operation settled on, or
    /// before `call` returns if the run finished synchronously.
    pub fn call<F>(&self, done: F)
    where
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.run(Some(Box::new(done)))
    }

    /// Runs the task without a completion callback
    ///
    /// A final error goes to the unhandled-error channel configured with
    /// [`Task::on_unhandled`].
    pub fn spawn(&self) {
        self.run(None)
    }

    fn run(&self, completion: Option<Completion<V, E>>) {
        (self.launch)(completion, self.config.clone())
    }

    /// Runs the task and blocks the current thread until it finishes
    pub fn wait(&self) -> Outcome<V, E> {
        let (parker, unparker) = parking::pair();
        let slot = Arc::new(Mutex::new(None));
        let filled = Arc::clone(&slot);
        self.call(move |outcome| {
            *filled.lock() = Some(outcome);
            unparker.unpark();
        });
        loop {
            let outcome = slot.lock().take();
            match outcome {
                Some(outcome) => return outcome,
                None => parker.park(),
            }
        }
    }

    /// Like [`Task::wait`], giving up after `timeout`
    ///
    /// On timeout the run carries on, but its outcome is dropped.
    pub fn wait_timeout(&self, timeout: Duration) -> DriveResult<V, E> {
        let deadline = Instant::now() + timeout;
        let (parker, unparker) = parking::pair();
        let slot = Arc::new(Mutex::new(None));
        let filled = Arc::clone(&slot);
        self.call(move |outcome| {
            *filled.lock() = Some(outcome);
            unparker.unpark();
        });
        loop {
            let outcome = slot.lock().take();
            if let Some(outcome) = outcome {
                return outcome.map_err(Error::Failed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Incomplete);
            }
            parker.park_timeout(deadline - now);
        }
    }
}

impl<V, E> Clone for Task<V, E> {
    fn clone(&self) -> Self {
        Task {
            launch: Arc::clone(&self.launch),
            config: self.config.clone(),
        }
    }
}

impl<V, E> Debug for Task<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("config", &self.config).finish_non_exhaustive()
    }
}

/// A [`Future`] resolving to the final outcome of one run of a [`Task`]
///
/// The run starts on the first poll.
pub struct TaskFuture<V, E> {
    task: Option<Task<V, E>>,
    shared: Arc<Mutex<Shared<V, E>>>,
}

struct Shared<V, E> {
    outcome: Option<Outcome<V, E>>,
    waker: Option<Waker>,
}

impl<V, E> IntoFuture for Task<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    type Output = Outcome<V, E>;
    type IntoFuture = TaskFuture<V, E>;

    fn into_future(self) -> Self::IntoFuture {
        let shared = Shared {
            outcome: None,
            waker: None,
        };
        TaskFuture {
            task: Some(self),
            shared: Arc::new(Mutex::new(shared)),
        }
    }
}

impl<V, E> Future for TaskFuture<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    type Output = Outcome<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let mut shared = this.shared.lock();
            if let Some(outcome) = shared.outcome.take() {
                return Poll::Ready(outcome);
            }
            shared.waker = Some(cx.waker().clone());
        }
        if let Some(task) = this.task.take() {
            let shared = Arc::clone(&this.shared);
            task.call(move |outcome| {
                let waker = {
                    let mut shared = shared.lock();
                    shared.outcome = Some(outcome);
                    shared.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake()
                }
            });
            let outcome = this.shared.lock().outcome.take();
            if let Some(outcome) = outcome {
                return Poll::Ready(outcome);
            }
        }
        Poll::Pending
    }
}
