//! Stat buffs granted by ranked traits, and proc statistics built on them.
//!
//! [`StatTracker`] turns the configured stat buffs into amounts for the
//! selected participant. Buffs tied to a trait scale with the ranks of
//! every selection of that trait, and are dropped entirely when the
//! participant has none. [`StatProcs`] counts how often each tracked buff
//! procced and what it was worth over the encounter.

use std::collections::BTreeMap;

use tally_core::{
    ActorFilter, BuildContext, BuildError, Dep, DispatchScope, HandlerError, Handlers, Module,
    ModuleId,
};
use tally_types::{
    AbilityId, ActorId, Contribution, Event, EventKind, ModuleStatus, Participant, Stat,
};
use tracing::debug;

use crate::buffs::BuffTracker;
use crate::config::{StatBuffSetting, StatKind, StatTrackerSettings};
use crate::stats;

// ---------------------------------------------------------------------------
// Stat tracker
// ---------------------------------------------------------------------------

/// A resolved stat buff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatBuff {
    /// Stats the buff raises.
    pub stats: Vec<StatKind>,
    /// Amount per stack, trait ranks included.
    pub amount: u64,
    /// The trait the buff comes from, if any.
    pub from_trait: Option<AbilityId>,
}

impl StatBuff {
    fn resolve(setting: &StatBuffSetting, participant: Option<&Participant>) -> Option<Self> {
        let ranks = match setting.trait_id {
            None => 0,
            Some(spell) => {
                let ranks = participant.map(|p| p.trait_ranks(spell)).unwrap_or_default();
                if ranks.is_empty() {
                    return None;
                }
                ranks
                    .iter()
                    .fold(0_u64, |acc, rank| acc.saturating_add(u64::from(*rank)))
            }
        };
        Some(Self {
            stats: setting.stats.clone(),
            amount: setting
                .amount
                .saturating_add(setting.per_rank.saturating_mul(ranks)),
            from_trait: setting.trait_id,
        })
    }
}

/// Stats the selected participant gains from tracked buffs.
#[derive(Debug)]
pub struct StatTracker {
    tracker: Dep<BuffTracker>,
    buffs: BTreeMap<AbilityId, StatBuff>,
    current: BTreeMap<StatKind, u64>,
    peak: BTreeMap<StatKind, u64>,
}

impl StatTracker {
    /// Every resolved stat buff, by aura.
    pub const fn buffs(&self) -> &BTreeMap<AbilityId, StatBuff> {
        &self.buffs
    }

    /// The resolved buff for `aura`, if it is tracked.
    pub fn buff(&self, aura: AbilityId) -> Option<&StatBuff> {
        self.buffs.get(&aura)
    }

    /// Bonus to `stat` on the selected participant right now.
    pub fn current(&self, stat: StatKind) -> u64 {
        self.current.get(&stat).copied().unwrap_or(0)
    }

    /// Highest bonus to `stat` seen so far.
    pub fn peak(&self, stat: StatKind) -> u64 {
        self.peak.get(&stat).copied().unwrap_or(0)
    }

    /// Stats granted to `actor` by tracked buffs currently up, stacks
    /// multiplied in.
    pub fn bonus(&self, tracker: &BuffTracker, actor: ActorId) -> BTreeMap<StatKind, u64> {
        let mut totals = BTreeMap::new();
        for (aura, buff) in &self.buffs {
            let Some(active) = tracker.active(actor, *aura) else {
                continue;
            };
            let amount = buff
                .amount
                .saturating_mul(u64::from(active.stacks.max(1)));
            for stat in &buff.stats {
                let entry = totals.entry(*stat).or_insert(0_u64);
                *entry = entry.saturating_add(amount);
            }
        }
        totals
    }

    fn on_aura(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if !event.ability.is_some_and(|aura| self.buffs.contains_key(&aura)) {
            return Ok(());
        }
        let tracker = scope.get(self.tracker)?;
        self.current = self.bonus(tracker, scope.encounter().selected());
        for (stat, amount) in &self.current {
            let peak = self.peak.entry(*stat).or_insert(0);
            *peak = (*peak).max(*amount);
        }
        Ok(())
    }
}

impl Module for StatTracker {
    const ID: ModuleId = ModuleId::new("stat_tracker");
    const DEPENDENCIES: &'static [ModuleId] = &[BuffTracker::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let settings: StatTrackerSettings = ctx.settings()?;
        let participant = ctx.selected_participant();
        let buffs: BTreeMap<AbilityId, StatBuff> = settings
            .buffs
            .iter()
            .filter_map(|setting| {
                StatBuff::resolve(setting, participant).map(|buff| (setting.aura, buff))
            })
            .collect();
        debug!(
            configured = settings.buffs.len(),
            resolved = buffs.len(),
            "Resolved stat buffs"
        );
        ctx.set_active(!buffs.is_empty());
        Ok(Self {
            tracker: ctx.dependency::<BuffTracker>()?,
            buffs,
            current: BTreeMap::new(),
            peak: BTreeMap::new(),
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on_each(
            &[
                EventKind::BuffApply,
                EventKind::BuffRefresh,
                EventKind::BuffStack,
                EventKind::BuffRemove,
            ],
            ActorFilter::ToSelected,
            Self::on_aura,
        );
    }

    fn contribution(&self) -> Contribution {
        let from_traits = self
            .buffs
            .values()
            .filter(|buff| buff.from_trait.is_some())
            .count();
        Contribution::new()
            .with("stat_buffs", Stat::Count(self.buffs.len() as u64))
            .with("trait_buffs", Stat::Count(from_traits as u64))
            .with(
                "peak",
                Stat::Breakdown(
                    self.peak
                        .iter()
                        .map(|(stat, amount)| (String::from(stat.name()), *amount))
                        .collect(),
                ),
            )
    }
}

// ---------------------------------------------------------------------------
// Procs
// ---------------------------------------------------------------------------

/// Proc counts, uptime, and average stat gained per tracked buff.
#[derive(Debug)]
pub struct StatProcs {
    stats: Dep<StatTracker>,
    tracker: Dep<BuffTracker>,
    procs: BTreeMap<AbilityId, u64>,
    uptime_ms: BTreeMap<AbilityId, u64>,
    average: BTreeMap<StatKind, u64>,
    duration_ms: u64,
}

impl StatProcs {
    /// Times `aura` was applied or refreshed by the selected participant.
    pub fn procs(&self, aura: AbilityId) -> u64 {
        self.procs.get(&aura).copied().unwrap_or(0)
    }

    fn on_proc(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let Some(aura) = event.ability else {
            return Ok(());
        };
        if scope.get(self.stats)?.buff(aura).is_some() {
            let count = self.procs.entry(aura).or_insert(0);
            *count = count.saturating_add(1);
        }
        Ok(())
    }

    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let stat_tracker = scope.get(self.stats)?;
        let tracker = scope.get(self.tracker)?;
        let selected = scope.encounter().selected();
        self.duration_ms = scope.encounter().bounds().offset(event.timestamp);
        self.uptime_ms = stat_tracker
            .buffs()
            .keys()
            .map(|aura| (*aura, tracker.uptime(selected, *aura, event.timestamp)))
            .collect();

        self.average.clear();
        for (aura, buff) in stat_tracker.buffs() {
            let uptime = self.uptime_ms.get(aura).copied().unwrap_or(0);
            let gained = buff
                .amount
                .saturating_mul(uptime)
                .checked_div(self.duration_ms)
                .unwrap_or(0);
            for stat in &buff.stats {
                let entry = self.average.entry(*stat).or_insert(0);
                *entry = entry.saturating_add(gained);
            }
        }
        Ok(())
    }
}

impl Module for StatProcs {
    const ID: ModuleId = ModuleId::new("stat_procs");
    const DEPENDENCIES: &'static [ModuleId] = &[StatTracker::ID, BuffTracker::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let stats = ctx.dependency::<StatTracker>()?;
        let tracker = ctx.dependency::<BuffTracker>()?;
        let active = ctx.dependency_status(stats) == ModuleStatus::Active;
        ctx.set_active(active);
        Ok(Self {
            stats,
            tracker,
            procs: BTreeMap::new(),
            uptime_ms: BTreeMap::new(),
            average: BTreeMap::new(),
            duration_ms: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on_each(
                &[EventKind::BuffApply, EventKind::BuffRefresh],
                ActorFilter::BySelected,
                Self::on_proc,
            )
            .on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let total_procs = self
            .procs
            .values()
            .fold(0_u64, |acc, n| acc.saturating_add(*n));
        let total_uptime = self
            .uptime_ms
            .values()
            .fold(0_u64, |acc, ms| acc.saturating_add(*ms));
        let keyed = |map: &BTreeMap<AbilityId, u64>| -> BTreeMap<String, u64> {
            map.iter()
                .map(|(aura, value)| (aura.to_string(), *value))
                .collect()
        };

        let mut contribution = Contribution::new()
            .with("procs", Stat::Breakdown(keyed(&self.procs)))
            .with("total_procs", Stat::Count(total_procs))
            .with("uptime_ms", Stat::Breakdown(keyed(&self.uptime_ms)))
            .with(
                "average_uptime",
                Stat::Ratio(stats::ratio(total_uptime, self.duration_ms)),
            );
        for (aura, uptime) in &self.uptime_ms {
            contribution = contribution.with(
                &format!("uptime:{aura}"),
                Stat::Ratio(stats::ratio(*uptime, self.duration_ms)),
            );
        }
        for (stat, amount) in &self.average {
            contribution =
                contribution.with(&format!("average:{}", stat.name()), Stat::Amount(*amount));
        }
        contribution
    }
}
