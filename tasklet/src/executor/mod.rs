//! Deferred-call executor implementation.
//!
//! This module contains the pieces that make up the [`Executor`]:
//! - [`core`](self::core): the executor itself, with the post and drain protocol,
//! - [`builder`]: configuration of the executor and its arena,
//! - [`chain`]: the intrusive list of pending tasks,
//! - [`item`]: the type-erased node wrapping each posted closure.

pub(crate) mod builder;
pub(crate) mod chain;
pub(crate) mod core;
pub(crate) mod item;

pub use builder::ExecutorBuilder;
pub use self::core::Executor;
