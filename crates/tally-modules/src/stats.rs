//! Small numeric helpers shared by the reference modules.

use std::collections::BTreeMap;

use tally_types::AbilityId;

/// `amount` per second over `duration_ms`, or zero for an empty encounter.
pub fn per_second(amount: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    // Combat totals stay far below 2^52; the conversion is exact in practice.
    #[allow(clippy::cast_precision_loss)]
    let rate = amount as f64 * 1_000.0 / duration_ms as f64;
    rate
}

/// `part / whole` clamped to `0.0..=1.0`, or zero when `whole` is zero.
pub fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = part as f64 / whole as f64;
    value.clamp(0.0, 1.0)
}

/// Breakdown key for an ability.
pub fn ability_key(ability: Option<AbilityId>) -> String {
    ability.map_or_else(|| String::from("unknown"), |id| id.to_string())
}

/// Add `amount` to `key` in a breakdown.
pub fn add_to(breakdown: &mut BTreeMap<String, u64>, key: String, amount: u64) {
    let entry = breakdown.entry(key).or_insert(0);
    *entry = entry.saturating_add(amount);
}
