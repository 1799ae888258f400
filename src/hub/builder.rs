//! Builder pattern for hub configuration.
//!
//! Provides a fluent API for configuring and creating [`Hub`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rtc_hub::Hub;
//!
//! # fn example() -> rtc_hub::Result<()> {
//! let hub = Hub::builder()
//!     .queue_capacity(512)
//!     .ping_period(Duration::from_secs(20))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::identifiers::IdGenerator;

use super::core::Hub;
use super::options::ConnectionOptions;

// ============================================================================
// HubBuilder
// ============================================================================

/// Builder for configuring a [`Hub`] instance.
///
/// Use [`Hub::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct HubBuilder {
    /// Options applied to every attached connection.
    options: ConnectionOptions,
    /// Custom connection id generator.
    id_generator: Option<IdGenerator>,
}

impl fmt::Debug for HubBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubBuilder")
            .field("options", &self.options)
            .field("custom_id_generator", &self.id_generator.is_some())
            .finish()
    }
}

// ============================================================================
// HubBuilder Implementation
// ============================================================================

impl HubBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all connection options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the outbound queue capacity per connection.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    /// Sets the read deadline window renewed by pongs.
    #[inline]
    #[must_use]
    pub fn pong_wait(mut self, pong_wait: Duration) -> Self {
        self.options.pong_wait = pong_wait;
        self
    }

    /// Sets the heartbeat ping interval.
    #[inline]
    #[must_use]
    pub fn ping_period(mut self, ping_period: Duration) -> Self {
        self.options.ping_period = ping_period;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn write_wait(mut self, write_wait: Duration) -> Self {
        self.options.write_wait = write_wait;
        self
    }

    /// Installs a custom connection id generator.
    ///
    /// The generator must return a unique string on every call. The
    /// default produces UUID v4 strings.
    ///
    /// # Arguments
    ///
    /// * `generator` - Called once per new connection
    #[inline]
    #[must_use]
    pub fn id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Builds the hub with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the options are inconsistent
    /// (see [`ConnectionOptions::validate`]).
    pub fn build(self) -> Result<Arc<Hub>> {
        self.options.validate()?;
        Ok(Hub::with_parts(self.options, self.id_generator))
    }
}

// ============================================================================
// Tests
// ============================================================================
