//! Raw kind discriminators and the fields each one requires.

use tally_types::AuraKind;

/// A recognized raw record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    /// `begincast`: a cast with a cast time started.
    BeginCast,
    /// `cast`: a cast completed.
    Cast,
    /// `cast_cancelled`, `cast_failed`, `interrupt`: an in-progress cast stopped.
    CastCancelled,
    /// `damage`.
    Damage,
    /// `heal`.
    Heal,
    /// `absorbed`: damage prevented by the source's absorb.
    Absorbed,
    /// `applybuff`, `applydebuff`.
    ApplyAura(AuraKind),
    /// `refreshbuff`, `refreshdebuff`.
    RefreshAura(AuraKind),
    /// `applybuffstack`, `removebuffstack` and their debuff forms.
    AuraStack(AuraKind),
    /// `removebuff`, `removedebuff`.
    RemoveAura(AuraKind),
    /// `energize`, `resourcechange`.
    Resource,
    /// `death`.
    Death,
    /// `resurrect`.
    Resurrect,
    /// `phase`.
    Phase,
    /// `encounter_start`: boundary marker, consumed by the normalizer.
    EncounterStart,
    /// `encounter_end`: boundary marker, consumed by the normalizer.
    EncounterEnd,
}

impl RawKind {
    /// Parse a log discriminator. Matching is case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "begincast" => Self::BeginCast,
            "cast" => Self::Cast,
            "cast_cancelled" | "cast_failed" | "interrupt" => Self::CastCancelled,
            "damage" => Self::Damage,
            "heal" => Self::Heal,
            "absorbed" => Self::Absorbed,
            "applybuff" => Self::ApplyAura(AuraKind::Buff),
            "applydebuff" => Self::ApplyAura(AuraKind::Debuff),
            "refreshbuff" => Self::RefreshAura(AuraKind::Buff),
            "refreshdebuff" => Self::RefreshAura(AuraKind::Debuff),
            "applybuffstack" | "removebuffstack" => Self::AuraStack(AuraKind::Buff),
            "applydebuffstack" | "removedebuffstack" => Self::AuraStack(AuraKind::Debuff),
            "removebuff" => Self::RemoveAura(AuraKind::Buff),
            "removedebuff" => Self::RemoveAura(AuraKind::Debuff),
            "energize" | "resourcechange" => Self::Resource,
            "death" => Self::Death,
            "resurrect" => Self::Resurrect,
            "phase" => Self::Phase,
            "encounter_start" => Self::EncounterStart,
            "encounter_end" => Self::EncounterEnd,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether records of this kind must name a source actor.
    pub const fn requires_source(self) -> bool {
        matches!(
            self,
            Self::BeginCast
                | Self::Cast
                | Self::CastCancelled
                | Self::Damage
                | Self::Heal
                | Self::Absorbed
        )
    }

    /// Whether records of this kind must name a target actor.
    pub const fn requires_target(self) -> bool {
        matches!(
            self,
            Self::Damage
                | Self::Heal
                | Self::Absorbed
                | Self::ApplyAura(_)
                | Self::RefreshAura(_)
                | Self::AuraStack(_)
                | Self::RemoveAura(_)
                | Self::Resource
                | Self::Death
                | Self::Resurrect
        )
    }

    /// Whether records of this kind must name an ability.
    pub const fn requires_ability(self) -> bool {
        matches!(
            self,
            Self::BeginCast
                | Self::Cast
                | Self::CastCancelled
                | Self::Damage
                | Self::Heal
                | Self::Absorbed
                | Self::ApplyAura(_)
                | Self::RefreshAura(_)
                | Self::AuraStack(_)
                | Self::RemoveAura(_)
        )
    }
}
