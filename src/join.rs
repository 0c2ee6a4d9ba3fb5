//! Resolution of composite yieldables.
//!
//! Every element is started in order and may settle on any thread, in any
//! order. The aggregate settles once, after the last element did. When
//! elements fail, the first error to settle is the aggregate error.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use log::{debug, trace};
use spin::Mutex;

use crate::{Aggregate, Outcome, Settle, Yieldable};

type Assemble<V> = Box<dyn FnOnce(Vec<V>) -> V + Send>;

struct Join<V, E> {
    values: Vec<Option<V>>,
    remaining: usize,
    error: Option<E>,
    finish: Option<(Settle<V, E>, Assemble<V>)>,
}

impl<V, E> Join<V, E> {
    /// Records the outcome of one element, returning the aggregate once every
    /// element settled
    fn record(&mut self, index: usize, outcome: Outcome<V, E>) -> Option<(Settle<V, E>, Outcome<V, E>)> {
        match outcome {
            Ok(value) => self.values[index] = Some(value),
            Err(error) if self.error.is_none() => self.error = Some(error),
            Err(_) => debug!("element {index} failed after an earlier element, discarding its error"),
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }
        let (settle, assemble) = self.finish.take()?;
        let outcome = match self.error.take() {
            Some(error) => Err(error),
            None => Ok(assemble(self.values.drain(..).flatten().collect())),
        };
        Some((settle, outcome))
    }
}

/// Resolves every element, settling with their values in input order
pub(crate) fn sequence<V, E>(items: Vec<Yieldable<V, E>>, settle: Settle<V, E>)
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    join(items, settle, Box::new(V::from_seq))
}

/// Resolves every element, settling with their values under the same keys
pub(crate) fn mapping<V, E>(entries: BTreeMap<String, Yieldable<V, E>>, settle: Settle<V, E>)
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    let (keys, items): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
    let assemble = move |values: Vec<V>| V::from_map(keys.into_iter().zip(values).collect());
    join(items, settle, Box::new(assemble))
}

fn join<V, E>(items: Vec<Yieldable<V, E>>, settle: Settle<V, E>, assemble: Assemble<V>)
where
    V: Aggregate + Send + 'static,
    E: Debug + Send + 'static,
{
    if items.is_empty() {
        return settle.ok(assemble(Vec::new()));
    }
    let count = items.len();
    trace!("joining {count} elements");
    let shared = Arc::new(Mutex::new(Join {
        values: (0..count).map(|_| None).collect(),
        remaining: count,
        error: None,
        finish: Some((settle, assemble)),
    }));
    for (index, item) in items.into_iter().enumerate() {
        let shared = Arc::clone(&shared);
        let start = item.into_start();
        start(Settle::new(move |outcome| {
            let finished = shared.lock().record(index, outcome);
            if let Some((settle, outcome)) = finished {
                settle.settle(outcome)
            }
        }));
    }
}
