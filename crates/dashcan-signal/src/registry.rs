use std::collections::HashMap;

use crate::rule::{
    SignalKind, SignalRule, ENGINE_RPM_ID, ENGINE_TEMPERATURE_ID, PARK_DISTANCE_ID,
    STEERING_WHEEL_ID, VEHICLE_SPEED_ID,
};

/// Identifier-keyed table of decode rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<u32, SignalRule>,
}

impl RuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The E46-family dashboard set: RPM, speed, temperature, PDC, MFL.
    pub fn bmw() -> Self {
        let mut table = Self::new();
        table.register(ENGINE_RPM_ID, SignalKind::EngineRpm);
        table.register(VEHICLE_SPEED_ID, SignalKind::VehicleSpeed);
        table.register(ENGINE_TEMPERATURE_ID, SignalKind::EngineTemperature);
        table.register(PARK_DISTANCE_ID, SignalKind::ParkDistance);
        table.register(STEERING_WHEEL_ID, SignalKind::SteeringWheel);
        table
    }

    /// Register (or replace) the rule for an identifier.
    pub fn register(&mut self, id: u32, kind: SignalKind) {
        self.rules.insert(id, SignalRule::new(id, kind));
    }

    pub fn get(&self, id: u32) -> Option<&SignalRule> {
        self.rules.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut SignalRule> {
        self.rules.get_mut(&id)
    }

    /// Check if an identifier has a rule.
    pub fn has_rule(&self, id: u32) -> bool {
        self.rules.contains_key(&id)
    }

    /// Registered identifiers, ascending.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.rules.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Forget every stored value.
    pub fn reset(&mut self) {
        for rule in self.rules.values_mut() {
            rule.last = crate::rule::UNSET_VALUE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmw_table_covers_dashboard_ids() {
        let table = RuleTable::bmw();
        assert_eq!(table.ids(), vec![0xAA, 0x1B4, 0x1C2, 0x1D0, 0x1D6]);
        assert_eq!(table.get(0x1D6).map(|r| r.kind), Some(SignalKind::SteeringWheel));
        assert!(!table.has_rule(0x123));
    }

    #[test]
    fn register_replaces_rule() {
        let mut table = RuleTable::new();
        table.register(0x10, SignalKind::EngineRpm);
        table.register(0x10, SignalKind::EngineTemperature);
        assert_eq!(table.ids(), vec![0x10]);
        assert_eq!(table.get(0x10).map(|r| r.len), Some(8));
        assert_eq!(
            table.get(0x10).map(|r| r.kind),
            Some(SignalKind::EngineTemperature)
        );
    }
}
