//! Enumeration types for the Tally analysis engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The kind of a canonical timeline event.
///
/// Declaration order is significant: it is the secondary sort key the
/// normalizer uses for events sharing a timestamp, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Synthetic marker delivered once before any timeline event.
    EncounterStart,
    /// The encounter moved to a new phase.
    PhaseChange,
    /// A cast completed (instant or at the end of a cast time).
    Cast,
    /// Synthetic close of a [`EventKind::CastBegin`].
    CastEnd,
    /// A cast with a cast time started. Ranks after the closing kinds so a
    /// cast chained in the same millisecond opens after the previous one
    /// has ended.
    CastBegin,
    /// Damage dealt by a source to a target.
    Damage,
    /// Damage prevented by an absorb effect owned by the source.
    Absorb,
    /// Healing done by a source to a target.
    Heal,
    /// A resource (mana, rage, ...) changed on the target.
    ResourceChange,
    /// An aura was removed from the target.
    BuffRemove,
    /// An aura was applied to the target.
    BuffApply,
    /// An existing aura on the target had its duration refreshed.
    BuffRefresh,
    /// An existing aura on the target changed stack count.
    BuffStack,
    /// The target died.
    Death,
    /// The target was resurrected.
    Resurrect,
    /// Synthetic marker delivered once after every timeline event.
    EncounterEnd,
}

impl EventKind {
    /// Whether this kind is only ever produced by the engine itself.
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::EncounterStart | Self::CastEnd | Self::EncounterEnd)
    }

    /// Whether this kind is one of the aura lifecycle kinds.
    pub const fn is_aura(self) -> bool {
        matches!(
            self,
            Self::BuffApply | Self::BuffRefresh | Self::BuffStack | Self::BuffRemove
        )
    }
}

/// How a cast that began with [`EventKind::CastBegin`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CastOutcome {
    /// The cast finished and the ability went off.
    Completed,
    /// The cast was cancelled, interrupted, or superseded by a new cast.
    Cancelled,
    /// The encounter ended while the cast was still in progress.
    Unfinished,
}

/// Whether an aura is beneficial or harmful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AuraKind {
    /// A beneficial aura.
    Buff,
    /// A harmful aura.
    Debuff,
}

/// A secondary resource tracked by resource events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceType {
    /// Mana.
    Mana,
    /// Rage.
    Rage,
    /// Focus.
    Focus,
    /// Energy.
    Energy,
    /// Combo points.
    ComboPoints,
    /// Runic power.
    RunicPower,
    /// Holy power.
    HolyPower,
    /// Astral power.
    AstralPower,
    /// Insanity.
    Insanity,
    /// Fury.
    Fury,
}

impl ResourceType {
    /// Parse the snake-case log name of a resource.
    pub fn from_log_name(name: &str) -> Option<Self> {
        let resource = match name {
            "mana" => Self::Mana,
            "rage" => Self::Rage,
            "focus" => Self::Focus,
            "energy" => Self::Energy,
            "combo_points" => Self::ComboPoints,
            "runic_power" => Self::RunicPower,
            "holy_power" => Self::HolyPower,
            "astral_power" => Self::AstralPower,
            "insanity" => Self::Insanity,
            "fury" => Self::Fury,
            _ => return None,
        };
        Some(resource)
    }

    /// The snake-case log name, the inverse of [`ResourceType::from_log_name`].
    pub const fn log_name(self) -> &'static str {
        match self {
            Self::Mana => "mana",
            Self::Rage => "rage",
            Self::Focus => "focus",
            Self::Energy => "energy",
            Self::ComboPoints => "combo_points",
            Self::RunicPower => "runic_power",
            Self::HolyPower => "holy_power",
            Self::AstralPower => "astral_power",
            Self::Insanity => "insanity",
            Self::Fury => "fury",
        }
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// The combat role a participant fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Absorbs damage for the group.
    Tank,
    /// Restores health to the group.
    Healer,
    /// Deals damage.
    Damage,
}

/// What kind of combatant a participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ParticipantKind {
    /// A player character.
    #[default]
    Player,
    /// A pet or guardian owned by another participant.
    Pet,
    /// A non-player character (boss, add).
    Npc,
}

// ---------------------------------------------------------------------------
// Normalization and reporting
// ---------------------------------------------------------------------------

/// Why the normalizer dropped a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DropReason {
    /// The input line could not be parsed as a record at all.
    Unparseable,
    /// The record had no kind discriminator.
    MissingKind,
    /// The record had no timestamp.
    MissingTimestamp,
    /// The kind requires a source actor and none was given.
    MissingSource,
    /// The kind requires a target actor and none was given.
    MissingTarget,
    /// The kind requires an ability and none was given.
    MissingAbility,
    /// The kind requires an amount and none was given.
    MissingAmount,
    /// The amount was negative where only non-negative values make sense.
    NegativeAmount,
    /// The kind requires a stack count and none was given.
    MissingStacks,
    /// The kind requires a known resource type and none was given.
    MissingResource,
    /// A phase change without a phase number.
    MissingPhase,
}

/// The state of a module instance within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ModuleStatus {
    /// Receiving events normally.
    Active,
    /// Not relevant for this configuration; receives no events.
    Inactive,
    /// A handler failed; the module receives no further events.
    Degraded,
}
