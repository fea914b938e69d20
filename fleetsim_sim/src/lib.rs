//! FleetSim runner
//!
//! Loads a world description, wires it to an in-process [`LocalBus`] and
//! drives it for a fixed simulated duration, optionally paced to the wall
//! clock and with the GUI attached.
//!
//! ```text
//!   world.xml ──► SimRunner ──► World::run_simulation ──► DispatchPool
//!                    │                                       │
//!                    └──── LocalBus subscriptions ◄──────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fleetsim_sim::{RunnerConfig, SimRunner};
//!
//! let config = RunnerConfig::new("worlds/demo.world.xml")
//!     .with_duration(5.0)
//!     .with_subscription("/r1/laser1");
//!
//! let summary = SimRunner::new(config)?.run()?;
//! println!("{} steps", summary.steps);
//! ```
//!
//! [`LocalBus`]: fleetsim_env::LocalBus

mod runner;

pub use runner::{RunSummary, RunnerConfig, RunnerError, SimRunner};
