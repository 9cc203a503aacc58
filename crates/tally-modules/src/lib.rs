//! Reference analysis modules for the Tally engine.
//!
//! Each module implements [`tally_core::Module`] and reads the canonical
//! timeline for one selected participant. Stateful trackers ([`BuffTracker`],
//! [`ResourceTracker`], [`Casts`]) own derived state; the statistics modules
//! built on them read that state through dependency handles.
//!
//! # Modules
//!
//! - [`buffs`] -- Aura tracking and per-aura uptime
//! - [`damage`] -- Damage done (pets folded into owners) and damage taken
//! - [`healing`] -- Effective healing, overhealing, and absorbs
//! - [`casts`] -- Cast outcomes and the active-time estimate
//! - [`deaths`] -- Deaths, resurrects, and time spent dead
//! - [`resources`] -- Resource ledgers and spending efficiency
//! - [`cooldowns`] -- Damage inside cooldown-aura windows
//! - [`procs`] -- Stat buffs from ranked traits, proc counts and uptime
//! - [`config`] -- Per-module settings sections

pub mod buffs;
pub mod casts;
pub mod config;
pub mod cooldowns;
pub mod damage;
pub mod deaths;
pub mod healing;
pub mod procs;
pub mod resources;
mod stats;

use tally_core::{ModuleRegistry, ResolveError};

pub use buffs::{ActiveAura, BuffTracker, BuffUptime};
pub use casts::{ActiveTime, Casts};
pub use cooldowns::{CooldownWindows, Window};
pub use damage::{DamageDone, DamageTaken};
pub use deaths::Deaths;
pub use healing::HealingDone;
pub use procs::{StatBuff, StatProcs, StatTracker};
pub use resources::{ResourceEfficiency, ResourceLedger, ResourceTracker};

/// A registry holding every reference module.
///
/// Declaration order puts trackers first, so modules with no dependency
/// relation between them replay in the order listed here.
pub fn default_registry() -> Result<ModuleRegistry, ResolveError> {
    let mut registry = ModuleRegistry::new();
    registry
        .register::<BuffTracker>()?
        .register::<ResourceTracker>()?
        .register::<DamageDone>()?
        .register::<HealingDone>()?
        .register::<DamageTaken>()?
        .register::<BuffUptime>()?
        .register::<Casts>()?
        .register::<ActiveTime>()?
        .register::<Deaths>()?
        .register::<ResourceEfficiency>()?
        .register::<CooldownWindows>()?
        .register::<StatTracker>()?
        .register::<StatProcs>()?;
    Ok(registry)
}
