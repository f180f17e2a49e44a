use std::time::Duration;

use dashcan_frame::ChannelConfig;
use dashcan_signal::{DecoderConfig, SignalDecoder};

/// Watchdog deadline while the adapter is being attached.
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// Watchdog deadline between frames once attached.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(3);

/// Shortest pause between consumer iterations.
pub const MIN_SCAN_PERIOD: Duration = Duration::from_millis(10);

/// Session behavior config.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub attach_timeout: Duration,
    pub guard_timeout: Duration,
    /// Pause after each dispatched frame.
    pub scan_period: Duration,
    /// How long one consumer step waits for a frame.
    pub pop_timeout: Duration,
    pub channel: ChannelConfig,
    /// Decoding behavior for dispatchers built by the session.
    pub decoder: DecoderConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            scan_period: MIN_SCAN_PERIOD,
            pop_timeout: Duration::from_millis(250),
            channel: ChannelConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = timeout;
        self
    }

    /// Override the scan period. Values at or below [`MIN_SCAN_PERIOD`] are
    /// ignored.
    pub fn with_scan_period(mut self, period: Duration) -> Self {
        if period > MIN_SCAN_PERIOD {
            self.scan_period = period;
        }
        self
    }

    pub fn with_pop_timeout(mut self, timeout: Duration) -> Self {
        self.pop_timeout = timeout;
        self
    }

    pub fn with_channel_config(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_decoder_config(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// A signal decoder configured with [`decoder`](Self::decoder).
    pub fn signal_decoder(&self) -> SignalDecoder {
        SignalDecoder::with_config(self.decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_period_floor() {
        let config = SessionConfig::default().with_scan_period(Duration::from_millis(5));
        assert_eq!(config.scan_period, MIN_SCAN_PERIOD);
        let config = config.with_scan_period(MIN_SCAN_PERIOD);
        assert_eq!(config.scan_period, MIN_SCAN_PERIOD);
        let config = config.with_scan_period(Duration::from_millis(25));
        assert_eq!(config.scan_period, Duration::from_millis(25));
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.attach_timeout, Duration::from_secs(10));
        assert_eq!(config.guard_timeout, Duration::from_secs(3));
        assert_eq!(config.channel.poll_command, b"C02\r");
        assert_eq!(config.signal_decoder().config(), &DecoderConfig::default());
    }
}
