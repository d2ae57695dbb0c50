//! # axiom-arbiter 🍝
//!
//! Two deadlock-free ways to hand out **paired resources** on a ring, and a
//! timed benchmark that makes them fight for real.
//!
//! `N` workers sit around a ring of `N` resources; worker `i` needs resources
//! `i` and `(i + 1) mod N` at the same time before it can do anything. The
//! crate includes:
//!
//! - [`BusyWaitBoth`]: claims both resources atomically under one coarse
//!   [`SpinLock`], or neither, and polls until it succeeds.
//! - [`OrderedLocking`]: one blocking lock per resource, always taken in
//!   ascending index order, so no circular wait can ever form.
//! - [`Simulation`]: spawns one OS thread per worker, runs a warmup plus a
//!   measurement window, cancels everybody at the end and reports each
//!   worker's average wait.
//!
//! ## ✨ Features
//!
//! - ✅ Mutual exclusion for every strategy, checkable at runtime with [`Audited`]
//! - ⏱️ Warmup-excluded measurement window with a background cancel timer
//! - 🛑 Set-once [`CancelSignal`] that interrupts polls and sleeps promptly
//! - 🧯 Panicking workers release their pair and do not hang the run
//! - 📄 Tab-separated result records with an `INF` sentinel for starved workers
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use std::time::Duration;
//! use axiom_arbiter::{Config, Simulation, StrategyKind};
//!
//! let config = Config::default()
//!     .with_workers(4)
//!     .with_window(Duration::from_millis(10), Duration::from_millis(100))
//!     .with_pacing(
//!         Duration::from_micros(100)..=Duration::from_millis(1),
//!         Duration::from_micros(100)..=Duration::from_millis(1),
//!     );
//! let sim = Simulation::new(config).unwrap();
//!
//! let report = sim.run(StrategyKind::Ordered).unwrap();
//! assert_eq!(report.summary.per_worker.len(), 4);
//! for record in report.records() {
//!     println!("{record}");
//! }
//! ```
//!
//! ## 🧠 Design
//!
//! ### BusyWaitBoth
//!
//! A fixed table of "in use" flags sits behind a single [`SpinLock`]. Checking
//! both flags and setting both happens in one critical section, so a worker
//! never holds exactly one resource. Failed attempts nap for a short,
//! bounded [`BackOff`] interval and retry, re-checking cancellation on every
//! iteration. The CPU it burns while polling is part of what is measured.
//!
//! ### OrderedLocking
//!
//! Each resource has its own blocking lock. A worker always locks the lower
//! index of its pair first. Cancellation is checked before the first lock and
//! once right after; the wait for the second lock is not interruptible, and
//! an acquisition that lands after the window closed is simply not counted.
//!
//! ## ⚠️ Usage Notes
//!
//! - Build a fresh strategy per run; [`Simulation::run`] does this for you.
//! - Every successful `acquire` must be matched by exactly one `release`.
//! - Ring sizes below 2 are rejected.
//!
//! ## 📦 Modules
//!
//! - [`backoff`]: spin escalation and bounded polling naps
//! - [`spinlock`]: the coarse table lock
//! - [`strategy`]: the [`Arbiter`] trait and its implementations
//! - [`driver`]: runs and joins the workers
//! - [`report`]: result records and the output writer

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod ring;
pub mod spinlock;
pub mod stats;
pub mod strategy;
pub mod window;
pub mod worker;

pub use backoff::BackOff;
pub use cancel::CancelSignal;
pub use config::Config;
pub use driver::{RunReport, Simulation};
pub use error::ArbiterError;
pub use report::{Column, Record, ReportWriter};
pub use ring::{ResourceId, Ring, WorkerId};
pub use spinlock::SpinLock;
pub use stats::{Average, Stats, Summary, WorkerTally};
pub use strategy::{Arbiter, Audited, BusyWaitBoth, OrderedLocking, StrategyKind};
pub use window::{MeasurementWindow, WindowTimer};
pub use worker::{Phase, Worker, WorkerReport};
