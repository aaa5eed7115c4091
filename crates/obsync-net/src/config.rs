//! Peer channel configuration.

use std::time::Duration;

/// Default buffering window after a channel is created.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(200);

/// Configuration for a buffered peer channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// How long new channels queue outgoing messages before flushing.
    pub grace_delay: Duration,
    /// Capacity of the peer event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            grace_delay: DEFAULT_GRACE_DELAY,
            event_capacity: 64,
        }
    }
}

/// Builder for channel configuration.
pub struct ChannelConfigBuilder {
    config: ChannelConfig,
}

impl ChannelConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ChannelConfig::default(),
        }
    }

    pub fn grace_delay(mut self, delay: Duration) -> Self {
        self.config.grace_delay = delay;
        self
    }

    pub fn grace_delay_ms(mut self, ms: u64) -> Self {
        self.config.grace_delay = Duration::from_millis(ms);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        // broadcast channels need room for at least one event
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ChannelConfig {
        self.config
    }
}

impl Default for ChannelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfigBuilder::new()
            .grace_delay_ms(50)
            .event_capacity(0)
            .build();

        assert_eq!(config.grace_delay, Duration::from_millis(50));
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.grace_delay, Duration::from_millis(200));
        assert_eq!(config.event_capacity, 64);
    }
}
