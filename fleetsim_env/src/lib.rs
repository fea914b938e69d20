//! FleetSim Transport Abstraction Layer
//!
//! This crate provides the seam between the simulator core and whatever
//! carries sensor observations out of the process:
//! - The [`Transport`] trait (topic advertisement + publish)
//! - The [`ObservationEnvelope`] wire record and its codec
//! - [`LocalBus`], an in-process pub/sub implementation
//!
//! # Example
//!
//! ```ignore
//! use fleetsim_env::{LocalBus, Transport};
//!
//! let bus = LocalBus::shared();
//! let scans = bus.subscribe("/r1/laser1");
//! bus.advertise("/r1/laser1")?;
//! // ... hand `bus` to a World, run the simulation ...
//! while let Ok(envelope) = scans.try_recv() {
//!     println!("{} @ {}", envelope.source_object_id, envelope.unix_timestamp);
//! }
//! ```

mod error;
mod local_bus;
mod transport;
mod types;

pub use error::EnvError;
pub use local_bus::{LocalBus, DEFAULT_SUBSCRIBER_CAPACITY};
pub use transport::Transport;
pub use types::ObservationEnvelope;
