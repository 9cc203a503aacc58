//! Per-module settings decoded from the `modules.settings` config section.
//!
//! Each struct mirrors one module's section. Every field has a default so
//! an absent or partial section is valid.

use serde::Deserialize;
use tally_types::{AbilityId, ResourceType};

/// Settings for [`DamageDone`](crate::damage::DamageDone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DamageDoneSettings {
    /// Fold pet damage into the owner's total (default: true).
    #[serde(default = "default_true")]
    pub include_pets: bool,
}

impl Default for DamageDoneSettings {
    fn default() -> Self {
        Self { include_pets: true }
    }
}

/// Settings for [`ActiveTime`](crate::casts::ActiveTime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActiveTimeSettings {
    /// Time an instant cast occupies, in milliseconds (default: 1500).
    #[serde(default = "default_gcd_ms")]
    pub gcd_ms: u64,
}

impl Default for ActiveTimeSettings {
    fn default() -> Self {
        Self {
            gcd_ms: default_gcd_ms(),
        }
    }
}

/// Settings for [`ResourceEfficiency`](crate::resources::ResourceEfficiency).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceEfficiencySettings {
    /// Resource to evaluate instead of the participant's primary resource.
    #[serde(default)]
    pub resource: Option<ResourceType>,
}

/// Settings for [`CooldownWindows`](crate::cooldowns::CooldownWindows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CooldownWindowsSettings {
    /// Buff on the selected participant that marks a window.
    #[serde(default)]
    pub aura: Option<AbilityId>,

    /// Talent the participant must have for the module to run.
    #[serde(default)]
    pub talent: Option<AbilityId>,

    /// Maximum hits buffered per window (default: 4096).
    #[serde(default = "default_window_capacity")]
    pub capacity: usize,
}

impl Default for CooldownWindowsSettings {
    fn default() -> Self {
        Self {
            aura: None,
            talent: None,
            capacity: default_window_capacity(),
        }
    }
}

/// A secondary or primary stat a buff can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Strength.
    Strength,
    /// Agility.
    Agility,
    /// Intellect.
    Intellect,
    /// Stamina.
    Stamina,
    /// Critical strike.
    Crit,
    /// Haste.
    Haste,
    /// Mastery.
    Mastery,
    /// Versatility.
    Versatility,
}

impl StatKind {
    /// Snake-case name used in report keys.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Agility => "agility",
            Self::Intellect => "intellect",
            Self::Stamina => "stamina",
            Self::Crit => "crit",
            Self::Haste => "haste",
            Self::Mastery => "mastery",
            Self::Versatility => "versatility",
        }
    }
}

/// One stat-granting buff in [`StatTrackerSettings`].
///
/// The granted amount is `amount + per_rank * sum(ranks)`, where `ranks`
/// are the selected participant's selections of `trait`. A buff tied to a
/// trait the participant does not have is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatBuffSetting {
    /// The buff granting the stats.
    pub aura: AbilityId,

    /// Stats raised while the buff is up.
    pub stats: Vec<StatKind>,

    /// Flat amount per stack.
    #[serde(default)]
    pub amount: u64,

    /// Ranked trait the buff comes from.
    #[serde(default, rename = "trait")]
    pub trait_id: Option<AbilityId>,

    /// Amount added per trait rank.
    #[serde(default)]
    pub per_rank: u64,
}

/// Settings for [`StatTracker`](crate::procs::StatTracker).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatTrackerSettings {
    /// Stat buffs to track on the selected participant.
    #[serde(default)]
    pub buffs: Vec<StatBuffSetting>,
}

const fn default_true() -> bool {
    true
}

const fn default_gcd_ms() -> u64 {
    1_500
}

const fn default_window_capacity() -> usize {
    4_096
}
