//! Combinators over [`suspend`], [`bind`] and [`then`] for the common shapes
//! of a body: waiting on a yieldable, recovering from errors, sequencing.

use super::*;

/// Suspend until `yielded` resolves, continuing with its value
///
/// An error outcome is raised at this point: the rest of the chain is skipped
/// unless a surrounding [catch] intercepts it.
/// ```
/// use codrive::*;
/// let co: Computation<Value, String> = resolve(Yieldable::immediate(Value::Int(1)));
/// ```
pub fn resolve<'a, V, E>(yielded: Yieldable<V, E>) -> Computation<'a, V, E, V> {
    suspend(yielded, |outcome| match outcome {
        Ok(value) => result(value),
        Err(error) => fail(error),
    })
}

/// Suspend until `yielded` resolves, continuing with its outcome
///
/// Errors are not raised, they are handed over as the `Err` side of the result.
/// This is a `try` around a single suspension point.
/// ```
/// use codrive::*;
/// let co: Computation<Value, String, Result<Value, String>> =
///     attempt(Yieldable::immediate(Value::Int(1)));
/// ```
pub fn attempt<'a, V, E>(yielded: Yieldable<V, E>) -> Computation<'a, V, E, Result<V, E>> {
    suspend(yielded, result)
}

/// Lift a plain result into a finished computation
pub fn from_result<'a, V, E, R>(r: Result<R, E>) -> Computation<'a, V, E, R> {
    match r {
        Ok(r) => result(r),
        Err(e) => fail(e),
    }
}

/// Transform the value `co` finishes with
///
/// An error raised in `co` skips `map` and is kept as is.
/// ```
/// use codrive::*;
/// let co: Computation<Value, String, i64> =
///     map(resolve(Yieldable::immediate(Value::Int(1))), |v| v.as_int().unwrap_or(0));
/// ```
pub fn map<'a, V, E, A, B, F>(co: Computation<'a, V, E, A>, map: F) -> Computation<'a, V, E, B>
where
    F: FnOnce(A) -> B + Send + 'a,
{
    bind(co, move |a| result(map(a)))
}

/// Intercept an error raised anywhere inside `co`
///
/// The handler may recover with a value, or fail again. A successful `co`
/// passes through untouched. This is a `try`/`catch` around a whole block.
pub fn catch<'a, V, E, R, F>(co: Computation<'a, V, E, R>, handler: F) -> Computation<'a, V, E, R>
where
    F: FnOnce(E) -> Computation<'a, V, E, R> + Send + 'a,
{
    then(co, |r| match r {
        Ok(r) => result(r),
        Err(e) => handler(e),
    })
}

/// Convert the error carried by the computation
///
/// Sugar over catch
pub fn map_err<'a, V, E, R, F>(co: Computation<'a, V, E, R>, f: F) -> Computation<'a, V, E, R>
where
    F: FnOnce(E) -> E + Send + 'a,
{
    catch(co, |e| fail(f(e)))
}

/// Pairs the values of two computations
///
/// Every suspension of `first` is resolved before `second` yields anything.
/// If either fails, the pair fails with that error.
pub fn tuple<'a, V, E, R1, R2>(
    first: Computation<'a, V, E, R1>,
    second: Computation<'a, V, E, R2>,
) -> Computation<'a, V, E, (R1, R2)>
where
    R1: Send + 'a,
    R2: Send,
    V: Send + 'a,
    E: Send + 'a,
{
    bind(first, move |a| map(second, move |b| (a, b)))
}

/// Keeps only the value of `right`, after `left` finished
///
/// `left` still runs for its suspensions, and its error still fails the pair.
pub fn right<'a, V, E, A, B>(
    left: Computation<'a, V, E, A>,
    right: Computation<'a, V, E, B>,
) -> Computation<'a, V, E, B>
where
    A: Send + 'a,
    B: Send,
    V: Send + 'a,
    E: Send + 'a,
{
    map(tuple(left, right), |(_, b)| b)
}

/// Drops the value `co` finishes with
///
/// An error raised in `co` is kept.
pub fn void<'a, V, E, A>(co: Computation<'a, V, E, A>) -> Computation<'a, V, E, ()> {
    map(co, |_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    type Co<R = Value> = Computation<'static, Value, &'static str, R>;

    fn feed<R: Send>(co: Co<R>, outcome: Outcome<Value, &'static str>) -> Co<R> {
        match step(co) {
            Step::Suspended { resume, .. } => resume(outcome),
            Step::Done(_) => panic!("expected a suspension"),
        }
    }

    #[test]
    fn resolve_raises_errors() {
        let co: Co<i64> = map(resolve(Yieldable::immediate(Value::Null)), |_| 1);
        let co = feed(co, Err("boom"));
        assert!(matches!(step(co), Step::Done(Err("boom"))));
    }

    #[test]
    fn attempt_hands_errors_over() {
        let co: Co<Result<Value, &'static str>> = attempt(Yieldable::immediate(Value::Null));
        let co = feed(co, Err("boom"));
        assert!(matches!(step(co), Step::Done(Ok(Err("boom")))));
    }

    #[test]
    fn catch_recovers_and_continues() {
        let failing: Co = resolve(Yieldable::immediate(Value::Null));
        let recovered = catch(failing, |_| result(Value::Int(0)));
        let co = bind(recovered, |_| resolve(Yieldable::immediate(Value::Null)));

        let co = feed(co, Err("boom"));
        let co = feed(co, Ok(Value::Int(1)));
        assert!(matches!(step(co), Step::Done(Ok(Value::Int(1)))));
    }

    #[test]
    fn catch_can_fail_again() {
        let co: Co = catch(fail("first"), |_| fail("second"));
        assert!(matches!(step(co), Step::Done(Err("second"))));
    }

    #[test]
    fn map_err_converts() {
        let co: Co = map_err(fail("inner"), |_| "outer");
        assert!(matches!(step(co), Step::Done(Err("outer"))));
    }

    #[test]
    fn tuple_runs_in_order() {
        let first: Co = resolve(Yieldable::immediate(Value::Null));
        let second: Co = resolve(Yieldable::immediate(Value::Null));
        let co = tuple(first, second);

        let co = feed(co, Ok(Value::Int(1)));
        let co = feed(co, Ok(Value::Int(2)));
        match step(co) {
            Step::Done(Ok((a, b))) => assert_eq!((a, b), (Value::Int(1), Value::Int(2))),
            _ => panic!("expected both values"),
        }
    }

    #[test]
    fn right_and_void_discard() {
        let co: Co<()> = void(right(result(Value::Int(1)), from_result(Ok(Value::Int(2)))));
        assert!(matches!(step(co), Step::Done(Ok(()))));
    }
}
