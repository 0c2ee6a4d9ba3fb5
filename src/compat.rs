//! Compatibility with do-notation
//!
//! As rust currently lacks the ability to define a generic 'bind'
//! operation, thus provides syntactic sugar.
//! It's not necessary to use the library, but does help with callback hell
//!```
//! use codrive::*;
//! use ::do_notation::m;
//!
//! // The body in do-notation
//! let task = start(|| -> Computation<'static, Value, String> {
//!     m! {
//!         a <- resolve(Yieldable::immediate(Value::Int(1)));
//!         b <- resolve(Yieldable::immediate(Value::Int(2)));
//!         let sum = a.as_int().unwrap_or(0) + b.as_int().unwrap_or(0);
//!         result(Value::Int(sum))
//!     }
//! });
//!
//! // Execute
//! assert_eq!(task.wait(), Ok(Value::Int(3)));
//!```
use crate::*;
use ::do_notation::Lift;

impl<'a, V, E, R> Lift<R> for Computation<'a, V, E, R> {
    /// Creates a computation from a value
    ///
    /// see [result](function@result)
    fn lift(a: R) -> Self {
        result(a)
    }
}

impl<'a, V: 'a, E: 'a, R: 'a> Computation<'a, V, E, R> {
    /// Chains computations
    ///
    /// see [bind](function@bind)
    pub fn and_then<F: 'a, B>(self, f: F) -> Computation<'a, V, E, B>
    where
        F: FnOnce(R) -> Computation<'a, V, E, B> + Send,
    {
        bind(self, f)
    }

    /// see [map](function@map)
    pub fn map<F: 'a, B>(self, f: F) -> Computation<'a, V, E, B>
    where
        F: FnOnce(R) -> B + Send,
    {
        map(self, f)
    }

    /// Recovers from an error raised anywhere in this computation
    ///
    /// see [catch](function@catch)
    pub fn or_else<F: 'a>(self, f: F) -> Computation<'a, V, E, R>
    where
        F: FnOnce(E) -> Computation<'a, V, E, R> + Send,
    {
        catch(self, f)
    }

    /// see [map_err](function@map_err)
    pub fn map_err<F: 'a>(self, f: F) -> Self
    where
        F: FnOnce(E) -> E + Send,
    {
        map_err(self, f)
    }

    /// see [then](function@then)
    pub fn then<F: 'a, B>(self, f: F) -> Computation<'a, V, E, B>
    where
        F: FnOnce(Result<R, E>) -> Computation<'a, V, E, B> + Send,
    {
        then(self, f)
    }
}
