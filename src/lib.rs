#![doc = include_str!("../README.md")]

mod compat;
mod computation;
mod config;
mod driver;
mod error;
mod functions;
mod join;
mod task;
mod value;
mod yieldable;

pub use computation::*;
pub use config::*;
pub use error::*;
pub use functions::*;
pub use task::*;
pub use value::*;
pub use yieldable::*;
