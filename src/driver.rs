//! The loop that drives one computation to its final outcome.
//!
//! The driver steps the computation until it suspends, starts the yielded
//! work, and resumes the computation with the outcome once it settles. An
//! outcome may arrive while the start operation is still running (it settled
//! synchronously), in which case it is parked in the state and picked up by
//! the loop, so synchronous chains never grow the stack.

use std::{fmt::Debug, mem, sync::Arc};

use log::{debug, trace, warn};
use spin::Mutex;

use crate::{step, Aggregate, Computation, Config, Outcome, Resume, Settle, Step};

/// Receives the final outcome of a run
pub(crate) type Completion<V, E> = Box<dyn FnOnce(Outcome<V, E>) + Send>;

enum State<V: 'static, E: 'static> {
    /// Not started yet
    Created(Computation<'static, V, E>),
    /// The body is executing, or the loop is about to resume it
    Running,
    /// The yielded work is being started; an outcome delivered meanwhile is
    /// kept in `early`
    Starting {
        ticket: u64,
        resume: Resume<'static, V, E, V>,
        early: Option<Outcome<V, E>>,
    },
    /// Waiting for the yielded work to settle
    Suspended {
        ticket: u64,
        resume: Resume<'static, V, E, V>,
    },
    /// Finished; nothing leaves this state
    Done,
}

impl<V, E> State<V, E> {
    fn name(&self) -> &'static str {
        match self {
            State::Created(_) => "created",
            State::Running => "running",
            State::Starting { .. } => "starting",
            State::Suspended { .. } => "suspended",
            State::Done => "done",
        }
    }
}

struct Inner<V: 'static, E: 'static> {
    state: State<V, E>,
    /// Identifies the current suspension point
    ticket: u64,
    completion: Option<Completion<V, E>>,
}

/// Drives a single computation
pub(crate) struct Driver<V: 'static, E: 'static> {
    inner: Mutex<Inner<V, E>>,
    config: Config<E>,
}

impl<V, E> Driver<V, E>
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    pub(crate) fn new(
        computation: Computation<'static, V, E>,
        completion: Option<Completion<V, E>>,
        config: Config<E>,
    ) -> Arc<Self> {
        let inner = Inner {
            state: State::Created(computation),
            ticket: 0,
            completion,
        };
        Arc::new(Driver {
            inner: Mutex::new(inner),
            config,
        })
    }

    /// Starts the computation and drives it as far as it goes synchronously
    pub(crate) fn run(self: &Arc<Self>) {
        let computation = {
            let mut inner = self.inner.lock();
            let state = mem::replace(&mut inner.state, State::Running);
            match state {
                State::Created(computation) => computation,
                other => {
                    warn!("{}: run called while {}", self.config.label(), other.name());
                    inner.state = other;
                    return;
                }
            }
        };
        debug!("{}: started", self.config.label());
        self.drive(computation)
    }

    fn drive(self: &Arc<Self>, mut current: Computation<'static, V, E>) {
        loop {
            let (yielded, resume) = match step(current) {
                Step::Done(outcome) => return self.complete(outcome),
                Step::Suspended { yielded, resume } => (yielded, resume),
            };

            let ticket = {
                let mut inner = self.inner.lock();
                inner.ticket += 1;
                let ticket = inner.ticket;
                inner.state = State::Starting {
                    ticket,
                    resume,
                    early: None,
                };
                ticket
            };
            trace!("{}: suspended at step {}", self.config.label(), ticket);

            let start = yielded.into_start();
            let driver = Arc::clone(self);
            start(Settle::new(move |outcome| driver.deliver(ticket, outcome)));

            let mut inner = self.inner.lock();
            let state = mem::replace(&mut inner.state, State::Running);
            match state {
                State::Starting {
                    resume,
                    early: Some(outcome),
                    ..
                } => {
                    drop(inner);
                    trace!("{}: step {} settled synchronously", self.config.label(), ticket);
                    current = resume(outcome);
                }
                State::Starting {
                    ticket,
                    resume,
                    early: None,
                } => {
                    inner.state = State::Suspended { ticket, resume };
                    return;
                }
                other => {
                    warn!("{}: start of step {} left the driver {}", self.config.label(), ticket, other.name());
                    inner.state = other;
                    return;
                }
            }
        }
    }

    /// Feeds the outcome of suspension `ticket` back into the computation
    fn deliver(self: &Arc<Self>, ticket: u64, outcome: Outcome<V, E>) {
        let mut inner = self.inner.lock();
        let state = mem::replace(&mut inner.state, State::Running);
        match state {
            State::Suspended {
                ticket: current,
                resume,
            } if current == ticket => {
                drop(inner);
                trace!("{}: resuming step {}", self.config.label(), ticket);
                self.drive(resume(outcome))
            }
            State::Starting {
                ticket: current,
                resume,
                early: None,
            } if current == ticket => {
                inner.state = State::Starting {
                    ticket,
                    resume,
                    early: Some(outcome),
                };
            }
            other => {
                let state = other.name();
                inner.state = other;
                drop(inner);
                warn!("{}: ignoring outcome for step {} while {}", self.config.label(), ticket, state);
            }
        }
    }

    fn complete(&self, outcome: Outcome<V, E>) {
        let completion = {
            let mut inner = self.inner.lock();
            inner.state = State::Done;
            inner.completion.take()
        };
        debug!(
            "{}: completed {}",
            self.config.label(),
            if outcome.is_ok() { "successfully" } else { "with an error" }
        );
        match (completion, outcome) {
            (Some(done), outcome) => done(outcome),
            (None, Err(error)) => self.config.surface(error),
            (None, Ok(_)) => trace!("{}: no completion callback, dropping the result", self.config.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolve, result, Unhandled, Value, Yieldable};

    type Co = Computation<'static, Value, &'static str>;
    type Outcomes = Arc<Mutex<Vec<Outcome<Value, &'static str>>>>;

    fn collect(computation: Co) -> (Arc<Driver<Value, &'static str>>, Outcomes) {
        let seen: Outcomes = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let completion: Completion<Value, &'static str> = Box::new(move |o| out.lock().push(o));
        let driver = Driver::new(computation, Some(completion), Config::default());
        (driver, seen)
    }

    fn count_to(n: i64, limit: i64) -> Co {
        if n == limit {
            return result(Value::Int(n));
        }
        resolve(Yieldable::immediate(Value::Int(n + 1)))
            .and_then(move |v| count_to(v.as_int().unwrap_or(limit), limit))
    }

    #[test]
    fn completes_without_suspending() {
        let (driver, seen) = collect(result(Value::Int(7)));
        driver.run();
        assert_eq!(*seen.lock(), vec![Ok(Value::Int(7))]);
        assert!(matches!(driver.inner.lock().state, State::Done));
    }

    #[test]
    fn synchronous_outcomes_do_not_grow_the_stack() {
        let (driver, seen) = collect(count_to(0, 100_000));
        driver.run();
        assert_eq!(*seen.lock(), vec![Ok(Value::Int(100_000))]);
    }

    #[test]
    fn waits_in_suspended_state() {
        let parked: Arc<Mutex<Option<Settle<Value, &'static str>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&parked);
        let body = resolve(Yieldable::deferred(move |settle| *slot.lock() = Some(settle)));
        let (driver, seen) = collect(body);

        driver.run();
        assert!(matches!(driver.inner.lock().state, State::Suspended { ticket: 1, .. }));
        assert!(seen.lock().is_empty());

        let settle = parked.lock().take();
        settle.expect("operation was started").ok(Value::Int(1));
        assert_eq!(*seen.lock(), vec![Ok(Value::Int(1))]);
    }

    #[test]
    fn stale_outcomes_are_ignored() {
        let parked: Arc<Mutex<Option<Settle<Value, &'static str>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&parked);
        let body = resolve(Yieldable::deferred(move |settle| *slot.lock() = Some(settle)));
        let (driver, seen) = collect(body);
        driver.run();

        driver.deliver(7, Ok(Value::Int(0)));
        assert!(seen.lock().is_empty());

        let settle = parked.lock().take();
        settle.expect("operation was started").ok(Value::Int(1));
        driver.deliver(1, Ok(Value::Int(2)));
        assert_eq!(*seen.lock(), vec![Ok(Value::Int(1))]);
    }

    #[test]
    fn runs_only_once() {
        let (driver, seen) = collect(result(Value::Int(1)));
        driver.run();
        driver.run();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn unhandled_error_goes_to_the_hook() {
        let seen: Outcomes = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let config = Config {
            name: Some("orphan".into()),
            unhandled: Unhandled::hook(move |e| out.lock().push(Err(e))),
        };
        let driver = Driver::<Value, &'static str>::new(crate::fail("lost"), None, config);
        driver.run();
        assert_eq!(*seen.lock(), vec![Err("lost")]);
    }

    #[test]
    fn success_without_callback_is_dropped() {
        let config = Config {
            name: None,
            unhandled: Unhandled::hook(|_: &'static str| panic!("no error expected")),
        };
        let driver = Driver::<Value, &'static str>::new(result(Value::Null), None, config);
        driver.run();
        assert!(matches!(driver.inner.lock().state, State::Done));
    }
}
