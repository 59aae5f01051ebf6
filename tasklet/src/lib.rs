//! # Tasklet
//!
//! **Tasklet** is a deferred-call executor: a queue that lets any number of
//! threads hand off closures, and lets one thread run them all at a point of
//! its choosing, such as once per processing cycle of an audio pipeline.
//!
//! Unlike a thread pool, Tasklet owns no threads and never schedules itself.
//! Deciding that work should happen and actually doing it are decoupled:
//!
//! - [`Executor::post`] queues a closure from any thread, holding a lock only
//!   long enough to link one node,
//! - [`Executor::run`] detaches everything queued so far and invokes it on
//!   the calling thread, outside the lock, in posting order.
//!
//! Queued closures live in nodes carved from an [`arena`], so posting in a
//! steady state does not touch the system allocator.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::thread;
//! use tasklet::Executor;
//!
//! let executor = Arc::new(Executor::new());
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let producer = {
//!     let executor = executor.clone();
//!     let log = log.clone();
//!     thread::spawn(move || {
//!         for i in 0..3 {
//!             let log = log.clone();
//!             executor.post(move || log.lock().unwrap().push(i));
//!         }
//!     })
//! };
//! producer.join().unwrap();
//!
//! // Nothing has run yet.
//! assert!(log.lock().unwrap().is_empty());
//!
//! assert_eq!(executor.run(), Ok(3));
//! assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
//! ```
//!
//! ## Modules
//!
//! - [`arena`]: node storage and the default block arena

pub mod arena;

mod error;
mod executor;

pub use error::ExecError;
pub use executor::{Executor, ExecutorBuilder};
