//! Publish/subscribe transport abstraction.

use crate::error::EnvError;
use crate::types::ObservationEnvelope;

/// Abstraction for the pub/sub channel observations are published on.
///
/// # Implementations
///
/// - **In-process**: [`LocalBus`](crate::LocalBus), channel-based
/// - **Networked**: any broker client able to advertise and publish topics
///
/// # Topic Flow
///
/// ```text
/// World registration          Dispatch worker              Subscriber
///   |                            |                            |
///   |-- advertise(topic) ------->|                            |
///   |                            |-- publish(topic, env) ---->|
///   |                            |                            |-- recv() -> env
/// ```
///
/// Implementations are called concurrently from dispatch workers.
pub trait Transport: Send + Sync + 'static {
    /// Declares a topic before anything is published on it.
    ///
    /// Advertising an already advertised topic is a no-op.
    fn advertise(&self, topic: &str) -> Result<(), EnvError>;
    
    /// Publishes one envelope on a topic.
    ///
    /// # Returns
    /// * `Ok(())` - Envelope handed to the transport
    /// * `Err(EnvError::TopicNotAdvertised)` - Topic was never advertised
    /// * `Err(EnvError::TransportFailure)` - Immediate send failure
    ///
    /// # Note
    /// Success does not guarantee delivery to every subscriber.
    fn publish(&self, topic: &str, envelope: &ObservationEnvelope) -> Result<(), EnvError>;
    
    /// Returns true if the topic has been advertised.
    fn is_advertised(&self, topic: &str) -> bool;
}
