//! In-process implementation of [`Transport`] using crossbeam channels.

use crate::error::EnvError;
use crate::transport::Transport;
use crate::types::ObservationEnvelope;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// In-process pub/sub bus.
///
/// Each subscriber owns a bounded queue. A subscriber that falls behind
/// loses the newest messages rather than stalling the publisher, which
/// mirrors the high-water-mark behaviour of networked brokers.
pub struct LocalBus {
    /// Topics that have been advertised
    advertised: RwLock<HashSet<String>>,
    
    /// Subscriber queues per topic
    subscribers: RwLock<HashMap<String, Vec<Sender<ObservationEnvelope>>>>,
    
    /// Queue depth for new subscribers
    capacity: usize,
    
    /// Envelopes accepted by `publish`
    published: AtomicU64,
    
    /// Deliveries dropped because a subscriber queue was full
    dropped: AtomicU64,
}

impl LocalBus {
    /// Creates a bus with the default subscriber capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
    
    /// Creates a bus whose subscriber queues hold `capacity` envelopes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            advertised: RwLock::new(HashSet::new()),
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
    
    /// Creates an Arc-wrapped bus for sharing with a world.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
    
    /// Subscribes to a topic.
    ///
    /// Subscribing does not advertise the topic; a subscriber may attach
    /// before the publisher registers.
    pub fn subscribe(&self, topic: &str) -> Receiver<ObservationEnvelope> {
        let (tx, rx) = channel::bounded(self.capacity);
        let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subs.entry(topic.to_string()).or_default().push(tx);
        rx
    }
    
    /// Returns all advertised topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let advertised = self.advertised.read().unwrap_or_else(PoisonError::into_inner);
        let mut topics: Vec<String> = advertised.iter().cloned().collect();
        topics.sort();
        topics
    }
    
    /// Returns the number of envelopes accepted so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
    
    /// Returns the number of deliveries dropped on full subscriber queues.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalBus {
    fn advertise(&self, topic: &str) -> Result<(), EnvError> {
        if topic.is_empty() {
            return Err(EnvError::transport("cannot advertise an empty topic"));
        }
        let mut advertised = self.advertised.write().unwrap_or_else(PoisonError::into_inner);
        if advertised.insert(topic.to_string()) {
            tracing::debug!(topic, "advertised topic");
        }
        Ok(())
    }
    
    fn publish(&self, topic: &str, envelope: &ObservationEnvelope) -> Result<(), EnvError> {
        if !self.is_advertised(topic) {
            return Err(EnvError::TopicNotAdvertised(topic.to_string()));
        }
        
        self.published.fetch_add(1, Ordering::Relaxed);
        
        let mut disconnected = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for (idx, tx) in subs.get(topic).into_iter().flatten().enumerate() {
                match tx.try_send(envelope.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => disconnected.push(idx),
                }
            }
        }
        
        // Prune receivers that hung up. Subscribers only ever append, so
        // the recorded indices still refer to the same senders.
        if !disconnected.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = subs.get_mut(topic) {
                for idx in disconnected.into_iter().rev() {
                    if idx < list.len() {
                        list.remove(idx);
                    }
                }
            }
        }
        
        Ok(())
    }
    
    fn is_advertised(&self, topic: &str) -> bool {
        self.advertised
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(topic)
    }
}
