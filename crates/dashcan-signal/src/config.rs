/// When a steering-wheel frame counts as a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SteeringTrigger {
    /// Fire when the new value equals the button pattern.
    #[default]
    OnEntry,
    /// Fire when the previous value equalled the pattern and the new one
    /// differs, i.e. on release. Matches older head units.
    OnExit,
}

/// Controls signal decoding behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderConfig {
    pub steering_trigger: SteeringTrigger,
}

impl DecoderConfig {
    pub fn with_steering_trigger(mut self, trigger: SteeringTrigger) -> Self {
        self.steering_trigger = trigger;
        self
    }
}
