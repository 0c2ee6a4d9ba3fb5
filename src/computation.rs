use std::sync::Arc;

use spin::Mutex;

use crate::{Outcome, Yieldable};

/// A structure describing a suspendable body: it either waits on a
/// [`Yieldable`] to resolve, or has finished with a result or an error.
///
/// This requires something else to execute it, usually a
/// [`Task`](crate::Task). A suspension 'pauses' the body until the driver
/// feeds back the [`Outcome`] of the yielded value.
///
/// The body is built by chaining smaller computations together, much like
/// futures are chained with `and_then`. An error fed back at a suspension
/// point short-circuits the rest of the chain unless it is intercepted with
/// [`attempt`](crate::attempt) or [`catch`](crate::catch).
///
/// Chains may be any length and built in any shape, including in a loop
/// (`co = co.and_then(..)`): each [`step`] does a bounded amount of work per
/// chained function and runs in constant stack depth.
///
/// This is represented as a monad <https://en.wikipedia.org/wiki/Monad_(functional_programming)>
pub struct Computation<'a, V, E, R = V> {
    state: State<'a, V, E, R>,
}

/// The continuation of a suspended computation
pub type Resume<'a, V, E, R> =
    Box<dyn FnOnce(Outcome<V, E>) -> Computation<'a, V, E, R> + Send + 'a>;

/// Receives the result of a computation, returning what runs next
type Next<'a, V, E, R> = Box<dyn FnOnce(Result<R, E>) -> Program<'a, V, E> + Send + 'a>;

/// Runs a computation into the [`Next`] that follows it
type Run<'a, V, E, R> = Box<dyn FnOnce(Next<'a, V, E, R>) -> Program<'a, V, E> + Send + 'a>;

/// Continues a suspension with its outcome, then runs into the [`Next`]
type Continue<'a, V, E, R> =
    Box<dyn FnOnce(Outcome<V, E>, Next<'a, V, E, R>) -> Program<'a, V, E> + Send + 'a>;

/// Continues a program that already knows what follows it
type Proceed<'a, V, E> = Box<dyn FnOnce(Outcome<V, E>) -> Program<'a, V, E> + Send + 'a>;

/// Takes the result a halted program left behind
type Take<'a, R, E> = Box<dyn FnOnce() -> Option<Result<R, E>> + Send + 'a>;

/// The internal state of the machine
enum State<'a, V: 'a, E: 'a, R: 'a> {
    /// Finished, successfully or not
    Done(Result<R, E>),
    /// Paused until the yielded value resolves
    Suspended(Yieldable<V, E>, Continue<'a, V, E, R>),
    /// Chained onto a computation that has not run yet
    Chained(Run<'a, V, E, R>),
    /// Handed an outcome after [`step`] suspended; the program leaves its
    /// result for `Take` when it halts
    Resumed(Proceed<'a, V, E>, Outcome<V, E>, Take<'a, R, E>),
    /// A resumed computation with more chained onto it
    Forwarded(Proceed<'a, V, E>, Outcome<V, E>, Run<'a, V, E, R>),
}

/// The flattened form a computation runs in
///
/// Continuations return here instead of calling the next one, the loop in
/// [`step`] does the calling.
enum Program<'a, V: 'a, E: 'a> {
    /// More work before the next suspension
    Bounce(Box<dyn FnOnce() -> Program<'a, V, E> + 'a>),
    /// Waiting on a yielded value
    Suspend(Yieldable<V, E>, Proceed<'a, V, E>),
    /// Finished, the result went to the last [`Next`]
    Halt,
}

impl<'a, V, E, R> Computation<'a, V, E, R> {
    /// Runs into `next`, returning at the first bounce or suspension
    fn run(self, next: Next<'a, V, E, R>) -> Program<'a, V, E> {
        match self.state {
            State::Done(r) => next(r),
            State::Suspended(yielded, resume) => {
                Program::Suspend(yielded, Box::new(move |outcome| resume(outcome, next)))
            }
            State::Chained(run) => run(next),
            State::Resumed(proceed, outcome, take) => {
                Program::Bounce(Box::new(move || forward(proceed(outcome), taken(take), next)))
            }
            State::Forwarded(proceed, outcome, finish) => {
                Program::Bounce(Box::new(move || forward(proceed(outcome), finish, next)))
            }
        }
    }
}

/// Hands the result of `f` on to `next`, one bounce later
fn chain<'a, V, E, A, B, F>(f: F, next: Next<'a, V, E, B>) -> Next<'a, V, E, A>
where
    V: 'a,
    E: 'a,
    A: 'a,
    B: 'a,
    F: FnOnce(Result<A, E>) -> Computation<'a, V, E, B> + Send + 'a,
{
    Box::new(move |r: Result<A, E>| Program::Bounce(Box::new(move || f(r).run(next))))
}

/// Lets `finish` pick up once `program` halts
fn forward<'a, V: 'a, E: 'a, R: 'a>(
    program: Program<'a, V, E>,
    finish: Run<'a, V, E, R>,
    next: Next<'a, V, E, R>,
) -> Program<'a, V, E> {
    match program {
        Program::Bounce(more) => Program::Bounce(Box::new(move || forward(more(), finish, next))),
        Program::Suspend(yielded, proceed) => Program::Suspend(
            yielded,
            Box::new(move |outcome| forward(proceed(outcome), finish, next)),
        ),
        Program::Halt => finish(next),
    }
}

/// Passes what a halted program left behind to whatever follows
fn taken<'a, V: 'a, E: 'a, R: 'a>(take: Take<'a, R, E>) -> Run<'a, V, E, R> {
    Box::new(move |next: Next<'a, V, E, R>| match take() {
        Some(r) => next(r),
        None => Program::Halt,
    })
}

/// Return/unit. Creates a finished computation holding the value
///
/// This lifts the value into the computation 'world'
/// ```
/// use codrive::*;
/// let co: Computation<Value, String> = result(Value::Int(1));
/// ```
pub fn result<'a, V, E, R>(r: R) -> Computation<'a, V, E, R> {
    let state = State::Done(Ok(r));
    Computation { state }
}

/// Creates a finished computation that failed with `e`
///
/// Binding onto it short-circuits; only [`catch`](crate::catch) sees the error.
/// ```
/// use codrive::*;
/// let co: Computation<Value, String> = fail("boom".to_string());
/// ```
pub fn fail<'a, V, E, R>(e: E) -> Computation<'a, V, E, R> {
    let state = State::Done(Err(e));
    Computation { state }
}

/// Suspend on `yielded`, continuing with `f` once it resolves
///
/// `f` sees the raw outcome, errors included.
/// see also: [resolve](crate::resolve), [attempt](crate::attempt)
pub fn suspend<'a, V, E, R, F>(yielded: Yieldable<V, E>, f: F) -> Computation<'a, V, E, R>
where
    F: FnOnce(Outcome<V, E>) -> Computation<'a, V, E, R> + Send + 'a,
{
    let resume: Continue<'a, V, E, R> =
        Box::new(move |outcome: Outcome<V, E>, next: Next<'a, V, E, R>| f(outcome).run(next));
    let state = State::Suspended(yielded, resume);
    Computation { state }
}

/// Chain computations together.
///
/// The result of the first flows into `f`. An error in the first skips `f`
/// and becomes the error of the whole chain.
/// This is equivalent to and_then for the Future type.
/// ```
/// use codrive::*;
/// let co: Computation<Value, String> = bind(result(Value::Int(1)), |a| result(a));
/// ```
pub fn bind<'a, V, E, A, B, F>(m: Computation<'a, V, E, A>, f: F) -> Computation<'a, V, E, B>
where
    F: FnOnce(A) -> Computation<'a, V, E, B> + Send + 'a,
{
    then(m, |r: Result<A, E>| match r {
        Ok(a) => f(a),
        Err(e) => fail(e),
    })
}

/// Chain on the finished result of a computation, error or not.
///
/// This is the most general continuation; [bind] and [catch](crate::catch)
/// are specializations of it. A finished `m` is handed to `f` straight away,
/// otherwise `f` is queued behind whatever `m` still has to do.
pub fn then<'a, V, E, A, B, F>(m: Computation<'a, V, E, A>, f: F) -> Computation<'a, V, E, B>
where
    F: FnOnce(Result<A, E>) -> Computation<'a, V, E, B> + Send + 'a,
{
    let state = match m.state {
        State::Done(r) => return f(r),
        State::Suspended(yielded, resume) => {
            let resume: Continue<'a, V, E, B> =
                Box::new(move |outcome: Outcome<V, E>, next: Next<'a, V, E, B>| {
                    Program::Bounce(Box::new(move || resume(outcome, chain(f, next))))
                });
            State::Suspended(yielded, resume)
        }
        State::Chained(run) => State::Chained(behind(run, f)),
        State::Resumed(proceed, outcome, take) => {
            State::Forwarded(proceed, outcome, behind(taken(take), f))
        }
        State::Forwarded(proceed, outcome, finish) => {
            State::Forwarded(proceed, outcome, behind(finish, f))
        }
    };
    Computation { state }
}

/// Queues `f` behind `run`
fn behind<'a, V, E, A, B, F>(run: Run<'a, V, E, A>, f: F) -> Run<'a, V, E, B>
where
    V: 'a,
    E: 'a,
    A: 'a,
    B: 'a,
    F: FnOnce(Result<A, E>) -> Computation<'a, V, E, B> + Send + 'a,
{
    Box::new(move |next: Next<'a, V, E, B>| Program::Bounce(Box::new(move || run(chain(f, next)))))
}

/// A step wise evaluation of the computation
///
/// Either the computation has finished, or it is waiting on a yielded value.
/// In the latter case the continuation is returned, it's expected the driver
/// will call it once with the outcome of the yielded value.
pub enum Step<'a, V: 'a, E: 'a, R: 'a> {
    /// The final result
    Done(Result<R, E>),
    /// Waiting on a yielded value
    Suspended {
        /// The value to resolve
        yielded: Yieldable<V, E>,
        /// The rest of the computation
        resume: Resume<'a, V, E, R>,
    },
}

/// Runs the computation up to its next suspension, or to its end.
///
/// ```
/// use codrive::*;
/// let co: Computation<Value, String> = resolve(Yieldable::immediate(Value::Int(1)));
/// assert!(matches!(step(co), Step::Suspended { .. }));
/// ```
pub fn step<'a, V, E, R>(computation: Computation<'a, V, E, R>) -> Step<'a, V, E, R>
where
    E: Send,
    R: Send,
{
    let (mut program, take) = match computation.state {
        State::Done(r) => return Step::Done(r),
        State::Resumed(proceed, outcome, take) => (proceed(outcome), take),
        state => {
            let slot = Arc::new(Mutex::new(None));
            let fill = Arc::clone(&slot);
            let next: Next<'a, V, E, R> = Box::new(move |r: Result<R, E>| {
                *fill.lock() = Some(r);
                Program::Halt
            });
            let take: Take<'a, R, E> = Box::new(move || {
                let r = slot.lock().take();
                r
            });
            (Computation { state }.run(next), take)
        }
    };
    loop {
        program = match program {
            Program::Bounce(more) => more(),
            Program::Suspend(yielded, proceed) => {
                let resume: Resume<'a, V, E, R> = Box::new(move |outcome| {
                    let state = State::Resumed(proceed, outcome, take);
                    Computation { state }
                });
                return Step::Suspended { yielded, resume };
            }
            Program::Halt => {
                return match take() {
                    Some(r) => Step::Done(r),
                    None => unreachable!("computation halted without a result"),
                }
            }
        };
    }
}

impl<'a, V, E, R> core::fmt::Debug for Computation<'a, V, E, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.state {
            State::Done(Ok(_)) => f.write_str("Computation::Done(Ok)"),
            State::Done(Err(_)) => f.write_str("Computation::Done(Err)"),
            State::Suspended(..) => f.write_str("Computation::Suspended"),
            State::Chained(_) => f.write_str("Computation::Chained"),
            State::Resumed(..) | State::Forwarded(..) => f.write_str("Computation::Resumed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    type Co<R = Value> = Computation<'static, Value, &'static str, R>;

    fn feed<R: Send>(co: Co<R>, outcome: Outcome<Value, &'static str>) -> Co<R> {
        match step(co) {
            Step::Suspended { resume, .. } => resume(outcome),
            Step::Done(_) => panic!("expected a suspension"),
        }
    }

    #[test]
    fn result_is_done() {
        let co: Co<i32> = result(1);
        assert!(matches!(step(co), Step::Done(Ok(1))));
    }

    #[test]
    fn bind_skips_on_failure() {
        let co: Co<i32> = bind(fail("boom"), |_: i32| result(2));
        assert!(matches!(step(co), Step::Done(Err("boom"))));
    }

    #[test]
    fn bind_resumes_through_suspension() {
        let waiting: Co<Value> = suspend(Yieldable::immediate(Value::Null), |o| match o {
            Ok(v) => result(v),
            Err(e) => fail(e),
        });
        let co = bind(waiting, |v: Value| result(v.as_int().unwrap_or(0) * 10));

        let co = feed(co, Ok(Value::Int(4)));
        assert!(matches!(step(co), Step::Done(Ok(40))));
    }

    #[test]
    fn then_sees_errors() {
        let co: Co<&str> = then(fail("boom"), |r: Result<i32, _>| match r {
            Ok(_) => result("ok"),
            Err(e) => result(e),
        });
        assert!(matches!(step(co), Step::Done(Ok("boom"))));
    }

    /// Suspends once, resolving to `n + 1`
    fn next(n: i64) -> Co<i64> {
        suspend(Yieldable::immediate(Value::Int(n + 1)), |o| match o {
            Ok(v) => result(v.as_int().unwrap_or(0)),
            Err(e) => fail(e),
        })
    }

    #[test]
    fn chains_built_in_a_loop_run_in_constant_stack() {
        let mut co = next(0);
        for _ in 1..100_000 {
            co = bind(co, next);
        }

        let mut steps = 0;
        let total = loop {
            match step(co) {
                Step::Suspended {
                    yielded: Yieldable::Immediate(v),
                    resume,
                } => {
                    steps += 1;
                    co = resume(Ok(v));
                }
                Step::Suspended { .. } => panic!("only immediate values are yielded"),
                Step::Done(r) => break r,
            }
        };
        assert_eq!(total, Ok(100_000));
        assert_eq!(steps, 100_000);
    }

    #[test]
    fn binds_onto_a_resumed_computation() {
        let co = feed(next(0), Ok(Value::Int(5)));
        let co = bind(co, |n| result(n * 2));
        assert!(matches!(step(co), Step::Done(Ok(10))));
    }

    #[test]
    fn errors_skip_the_rest_of_a_long_chain() {
        let mut co = next(0);
        for _ in 0..1_000 {
            co = bind(co, next);
        }
        let co = feed(co, Err("boom"));
        assert!(matches!(step(co), Step::Done(Err("boom"))));
    }
}
