//! Participants and the encounter roster.
//!
//! Static attributes (role, spec, talents, traits) are fixed for the whole encounter
//! and come from configuration. Runtime state such as active buffs or
//! resource levels is never stored here; analysis modules derive it from
//! the event stream.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ParticipantKind, ResourceType, Role};
use crate::ids::{AbilityId, ActorId};

/// A combatant or pet tracked through the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Participant {
    /// Log identifier.
    pub id: ActorId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Player, pet, or NPC.
    #[serde(default)]
    pub kind: ParticipantKind,
    /// Owning participant, for pets.
    #[serde(default)]
    pub owner: Option<ActorId>,
    /// Combat role, when known.
    #[serde(default)]
    pub role: Option<Role>,
    /// Class/specialization selection, e.g. `"mage/fire"`.
    #[serde(default)]
    pub spec: Option<String>,
    /// Primary resource the participant spends, if any.
    #[serde(default)]
    pub primary_resource: Option<ResourceType>,
    /// Selected talents.
    #[serde(default)]
    pub talents: BTreeSet<AbilityId>,
    /// Ranked traits by spell id, one rank per selection. A trait taken on
    /// two items appears with two ranks.
    #[serde(default)]
    pub traits: BTreeMap<AbilityId, Vec<u32>>,
    /// Average equipped item level.
    #[serde(default)]
    pub item_level: Option<u32>,
}

impl Participant {
    /// Create a player participant with only an id and name.
    pub fn player(id: ActorId, name: &str) -> Self {
        Self {
            id,
            name: String::from(name),
            kind: ParticipantKind::Player,
            owner: None,
            role: None,
            spec: None,
            primary_resource: None,
            talents: BTreeSet::new(),
            traits: BTreeMap::new(),
            item_level: None,
        }
    }

    /// Create a pet owned by `owner`.
    pub fn pet(id: ActorId, name: &str, owner: ActorId) -> Self {
        Self {
            kind: ParticipantKind::Pet,
            owner: Some(owner),
            ..Self::player(id, name)
        }
    }

    /// Whether the participant selected the given talent.
    pub fn has_talent(&self, talent: AbilityId) -> bool {
        self.talents.contains(&talent)
    }

    /// Whether the participant has at least one selection of `spell`.
    pub fn has_trait(&self, spell: AbilityId) -> bool {
        !self.trait_ranks(spell).is_empty()
    }

    /// Ranks of every selection of `spell`, empty when not selected.
    pub fn trait_ranks(&self, spell: AbilityId) -> &[u32] {
        self.traits.get(&spell).map_or(&[], Vec::as_slice)
    }
}

/// All participants of one encounter, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Roster {
    participants: BTreeMap<ActorId, Participant>,
}

impl Roster {
    /// Build a roster; later entries replace earlier ones with the same id.
    pub fn new(participants: impl IntoIterator<Item = Participant>) -> Self {
        Self {
            participants: participants.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Look up a participant.
    pub fn get(&self, id: ActorId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Iterate participants in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// The owner of a pet, or `None` for non-pets and unknown actors.
    pub fn owner_of(&self, id: ActorId) -> Option<ActorId> {
        self.participants.get(&id).and_then(|p| p.owner)
    }

    /// Whether `actor` is `owner` itself or a pet owned by it.
    pub fn is_self_or_pet(&self, actor: ActorId, owner: ActorId) -> bool {
        actor == owner || self.owner_of(actor) == Some(owner)
    }

    /// The id to credit for an actor's contribution: pets fold into owners.
    pub fn credited(&self, actor: ActorId) -> ActorId {
        self.owner_of(actor).unwrap_or(actor)
    }
}
