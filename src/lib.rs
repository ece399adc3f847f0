//! Continuation-passing concurrency operations.
//!
//! The central type is [`Await<T>`]: a reusable recipe for a computation which
//! eventually succeeds with a `T`, fails with an [`Error`], or is cancelled.
//! Starting an `Await` hands it a continuation and returns a [`Cancel`]
//! handle; the continuation receives an [`Outcome<T>`] at most once.
//!
//! On top of that this crate provides combinators which start several
//! computations at once and decide between their results, sequential
//! composition of dependent steps, a bridge from push-style event sources,
//! and adapters to block on a result or `.await` it from async code. See the
//! [`deferred`] module for more.
//!
//! # Operations
//!
//! This library provides the following operations on arrays and vecs of
//! `Await`s:
//!
//! - [`deferred::All`]: Wait for every source to complete.
//! - [`deferred::Any`]: Wait for the first source to complete.
//! - [`deferred::Many`]: Race sources against a chooser, with a default result.
//!
//! And for individual `Await`s:
//!
//! - [`deferred::many2`]: Race two differently-typed sources.
//! - [`deferred::sequence`]: Run dependent steps one after the other.
//! - [`Await::condition`] and [`Await::event`]: Wait for an event source.
//! - [`Await::wait`]: Block the current thread on the outcome.
//!
//! # Examples
//!
//! ```rust
//! use cps_concurrency::prelude::*;
//! use cps_concurrency::config::SpawnThread;
//! use std::sync::Arc;
//!
//! let square = |n: u64| Await::operation(move || n * n, Arc::new(SpawnThread::default()));
//!
//! let squares = vec![square(1), square(2), square(3)]
//!     .all()
//!     .map(|results| results.into_iter().filter_map(|r| r.ok()).sum::<u64>());
//! assert_eq!(squares.wait_success(None).unwrap(), 14);
//! ```
//!
//! # Execution
//!
//! Nothing here owns a scheduler. Computations run wherever the [`Invoker`]
//! they were given puts them, and continuations run on whichever thread
//! delivers the outcome. Strategies travel in an explicit [`Config`] value,
//! so independent parts of a program (and independent tests) never share
//! mutable global state.
//!
//! [`Invoker`]: config::Invoker

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

/// The cps-concurrency prelude.
pub mod prelude {
    pub use super::deferred::All as _;
    pub use super::deferred::Any as _;
    pub use super::deferred::Many as _;
    pub use super::outcome::OptionExt as _;
    pub use super::outcome::ResultExt as _;

    pub use super::{Await, Cancel, Error, Outcome, Result};
}

pub mod config;
pub mod deferred;
pub mod fault;
pub mod gate;
pub mod outcome;

mod agent;
mod cancel;
mod error;

pub use agent::Agent;
pub use cancel::Cancel;
pub use config::Config;
pub use deferred::{Await, Continuation};
pub use error::{Error, ErrorKind, Result};
pub use outcome::Outcome;
