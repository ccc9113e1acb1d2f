//! Best-effort delivery of transactions to an external message broker.
//!
//! The relay owns its connection, opens it on first use and reopens it after
//! any publish failure. Nothing is acknowledged and nothing is queued: once
//! the retry policy gives up, the message is lost and the caller is told so.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::event::{Event, InternalTransaction};

/// Bounded attempts with exponential backoff between them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per message, including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt number `attempt` (starting from 0)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Opens connections to the broker.
pub trait Connector {
    type Connection: Publish;
    type Error: std::error::Error + Send + Sync + 'static;

    fn connect(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// Open connection to the broker.
pub trait Publish {
    type Error: std::error::Error + Send + Sync + 'static;

    fn publish(&mut self, route: &str, payload: &[u8]) -> Result<(), Self::Error>;
}

/// Failure of the broker client
pub type BrokerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Could not connect to the broker")]
    Connect(#[source] BrokerError),
    #[error("Could not publish the message")]
    Publish(#[source] BrokerError),
    #[error("Relay does not allow any attempts")]
    NoAttempts,
    #[error("Message dropped after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RelayError>,
    },
    #[error("Could not serialize the message")]
    Serialization(#[from] serde_json::Error),
}

pub struct TransactionRelay<C: Connector> {
    connector: C,
    connection: Option<C::Connection>,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<C: Connector> TransactionRelay<C> {
    /// Does not connect until the first message.
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self {
            connector,
            connection: None,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the way pauses between attempts are made.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    #[instrument(level = "debug", skip(self, payload), fields(len = payload.len()))]
    pub fn publish(&mut self, route: &str, payload: &[u8]) -> Result<(), RelayError> {
        let mut last_error = RelayError::NoAttempts;
        for attempt in 0..self.policy.max_attempts {
            match self.try_publish(route, payload) {
                Ok(()) => {
                    debug!("Message has been sent (attempt {})", attempt + 1);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Attempt {} failed: {:?}", attempt + 1, e);
                    last_error = e;
                }
            }
            if attempt + 1 < self.policy.max_attempts {
                (self.sleep)(self.policy.backoff(attempt));
            }
        }
        warn!("Giving up on the message for route {}", route);
        Err(RelayError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last: Box::new(last_error),
        })
    }

    /// Send value as JSON document.
    pub fn publish_json<T: Serialize + ?Sized>(
        &mut self,
        route: &str,
        value: &T,
    ) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(value)?;
        self.publish(route, &payload)
    }

    /// Send internal transactions of the event, if it has any.
    pub fn relay_transactions(&mut self, route: &str, event: &Event) -> Result<(), RelayError> {
        let transactions: &[InternalTransaction] = event.internal_transactions();
        if transactions.is_empty() {
            return Ok(());
        }
        self.publish_json(route, transactions)
    }

    fn try_publish(&mut self, route: &str, payload: &[u8]) -> Result<(), RelayError> {
        if self.connection.is_none() {
            debug!("Connecting to the broker");
            let connection = self
                .connector
                .connect()
                .map_err(|e| RelayError::Connect(Box::new(e)))?;
            self.connection = Some(connection);
        }
        let connection = self.connection.as_mut().expect("Connected just above");
        if let Err(e) = connection.publish(route, payload) {
            // the connection is unusable after a failure
            self.connection = None;
            return Err(RelayError::Publish(Box::new(e)));
        }
        Ok(())
    }
}
