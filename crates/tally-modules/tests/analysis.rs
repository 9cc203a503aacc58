//! Reference modules run end to end through `analyze` on small, hand-built
//! encounters with known answers.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use serde_json::json;
use tally_core::{AnalysisConfig, analyze};
use tally_modules::default_registry;
use tally_types::{
    AbilityId, ActorId, AnalysisReport, ModuleStatus, Participant, RawRecord, ResourceType, Role,
    Stat,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const SELECTED: u64 = 1;
const PET: u64 = 2;
const OTHER: u64 = 3;
const BOSS: u64 = 99;

const COOLDOWN_AURA: u32 = 777;
const COOLDOWN_TALENT: u32 = 888;

fn player() -> Participant {
    Participant {
        role: Some(Role::Damage),
        primary_resource: Some(ResourceType::Mana),
        ..Participant::player(ActorId(SELECTED), "Selected")
    }
}

fn config_with(selected: Participant) -> AnalysisConfig {
    AnalysisConfig::for_participant(
        ActorId(SELECTED),
        vec![
            selected,
            Participant::pet(ActorId(PET), "Pet", ActorId(SELECTED)),
            Participant::player(ActorId(OTHER), "Other"),
        ],
    )
}

fn config() -> AnalysisConfig {
    config_with(player())
}

/// A ten-second encounter wrapped around `records`.
fn encounter(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut all = vec![
        RawRecord::new("encounter_start", 0),
        RawRecord::new("encounter_end", 10_000),
    ];
    all.extend(records);
    all
}

fn hit(timestamp: u64, source: u64, amount: i64) -> RawRecord {
    RawRecord::new("damage", timestamp)
        .source(source)
        .target(BOSS)
        .ability(133)
        .amount(amount)
}

fn aura(kind: &str, timestamp: u64, ability: u32) -> RawRecord {
    RawRecord::new(kind, timestamp)
        .source(SELECTED)
        .target(SELECTED)
        .ability(ability)
}

fn cast(kind: &str, timestamp: u64, ability: u32) -> RawRecord {
    RawRecord::new(kind, timestamp)
        .source(SELECTED)
        .target(BOSS)
        .ability(ability)
}

fn energize(timestamp: u64, amount: i64, waste: u64) -> RawRecord {
    let mut record = RawRecord::new("resourcechange", timestamp)
        .target(SELECTED)
        .amount(amount)
        .resource("mana");
    record.waste = Some(waste);
    record
}

fn run(config: &AnalysisConfig, records: Vec<RawRecord>) -> AnalysisReport {
    analyze(&default_registry().unwrap(), config, encounter(records)).unwrap()
}

fn total(report: &AnalysisReport, module: &str, stat: &str) -> u64 {
    report
        .contribution(module)
        .and_then(|c| c.total(stat))
        .unwrap_or_else(|| panic!("{module}.{stat} missing"))
}

fn fraction(report: &AnalysisReport, module: &str, stat: &str) -> f64 {
    match report.contribution(module).and_then(|c| c.get(stat)) {
        Some(Stat::Ratio(value) | Stat::Rate(value)) => *value,
        other => panic!("{module}.{stat} is not fractional: {other:?}"),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ---------------------------------------------------------------------------
// Damage and healing
// ---------------------------------------------------------------------------

#[test]
fn pet_damage_folds_into_the_owner() {
    let report = run(
        &config(),
        vec![
            hit(1_000, SELECTED, 100),
            hit(1_500, PET, 50),
            hit(1_800, OTHER, 999),
        ],
    );
    assert_eq!(total(&report, "damage_done", "total"), 150);
    assert_eq!(total(&report, "damage_done", "pets"), 50);
    assert!(close(fraction(&report, "damage_done", "dps"), 15.0));
}

#[test]
fn pets_can_be_excluded_by_settings() {
    let mut config = config();
    config
        .modules
        .settings
        .insert(String::from("damage_done"), json!({ "include_pets": false }));
    let report = run(&config, vec![hit(1_000, SELECTED, 100), hit(1_500, PET, 50)]);
    assert_eq!(total(&report, "damage_done", "total"), 100);
    assert_eq!(total(&report, "damage_done", "pets"), 0);
}

#[test]
fn damage_taken_counts_hits_on_the_selected_participant() {
    let mut absorbed = RawRecord::new("damage", 2_000)
        .source(BOSS)
        .target(SELECTED)
        .ability(66)
        .amount(300);
    absorbed.absorbed = Some(120);
    let report = run(
        &config(),
        vec![
            absorbed,
            RawRecord::new("damage", 2_500)
                .source(BOSS)
                .target(OTHER)
                .ability(66)
                .amount(5_000),
        ],
    );
    assert_eq!(total(&report, "damage_taken", "total"), 300);
    assert_eq!(total(&report, "damage_taken", "absorbed"), 120);
}

#[test]
fn healing_splits_effective_overheal_and_absorbs() {
    let mut heal = RawRecord::new("heal", 1_000)
        .source(SELECTED)
        .target(OTHER)
        .ability(5)
        .amount(400);
    heal.overheal = Some(100);
    let shield = RawRecord::new("absorbed", 2_000)
        .source(SELECTED)
        .target(OTHER)
        .ability(6)
        .amount(200);
    let report = run(&config(), vec![heal, shield]);

    assert_eq!(total(&report, "healing_done", "effective"), 400);
    assert_eq!(total(&report, "healing_done", "overheal"), 100);
    assert_eq!(total(&report, "healing_done", "absorbs"), 200);
    assert!(close(fraction(&report, "healing_done", "hps"), 60.0));
    assert!(close(fraction(&report, "healing_done", "overheal_ratio"), 0.2));
}

// ---------------------------------------------------------------------------
// Auras
// ---------------------------------------------------------------------------

#[test]
fn uptime_covers_closed_and_still_open_applications() {
    let report = run(
        &config(),
        vec![
            aura("applybuff", 1_000, 500),
            aura("removebuff", 4_000, 500),
            aura("applybuff", 8_000, 500),
        ],
    );
    let Some(Stat::Breakdown(uptime)) = report
        .contribution("buff_uptime")
        .and_then(|c| c.get("uptime_ms"))
    else {
        panic!("uptime breakdown missing");
    };
    assert_eq!(uptime.get("500"), Some(&5_000));
    assert!(close(fraction(&report, "buff_uptime", "uptime:500"), 0.5));
    assert_eq!(total(&report, "buff_tracker", "applications"), 2);
    assert_eq!(total(&report, "buff_tracker", "active_at_end"), 1);
}

fn uptime_of(report: &AnalysisReport, aura: u32) -> Option<u64> {
    match report
        .contribution("buff_uptime")
        .and_then(|c| c.get("uptime_ms"))
    {
        Some(Stat::Breakdown(uptime)) => uptime.get(&aura.to_string()).copied(),
        other => panic!("uptime breakdown missing: {other:?}"),
    }
}

#[test]
fn repeated_removal_does_not_add_uptime() {
    let report = run(
        &config(),
        vec![
            aura("applybuff", 1_000, 500),
            aura("removebuff", 2_000, 500),
            aura("removebuff", 9_000, 500),
        ],
    );
    assert_eq!(uptime_of(&report, 500), Some(1_000));
}

#[test]
fn aura_up_before_the_pull_counts_from_the_start() {
    let mut stack = aura("applybuffstack", 4_000, 501);
    stack.stacks = Some(3);
    let report = run(
        &config(),
        vec![
            // Only a removal seen.
            aura("removebuff", 2_000, 499),
            // Refreshed, then removed.
            aura("refreshbuff", 5_000, 500),
            aura("removebuff", 8_000, 500),
            // Stacked and still up at the end.
            stack,
        ],
    );
    assert_eq!(uptime_of(&report, 499), Some(2_000));
    assert_eq!(uptime_of(&report, 500), Some(8_000));
    assert_eq!(uptime_of(&report, 501), Some(10_000));
    assert_eq!(total(&report, "buff_tracker", "applications"), 0);
}

// ---------------------------------------------------------------------------
// Casts
// ---------------------------------------------------------------------------

fn cast_sequence() -> Vec<RawRecord> {
    vec![
        cast("begincast", 1_000, 10),
        cast("cast", 2_500, 10),
        cast("cast", 4_000, 20),
        cast("begincast", 5_000, 30),
        cast("cast_cancelled", 5_600, 30),
    ]
}

#[test]
fn casts_and_active_time_follow_cast_bars_and_instants() {
    let report = run(&config(), cast_sequence());

    assert_eq!(total(&report, "casts", "casts"), 2);
    assert_eq!(total(&report, "casts", "instant"), 1);
    assert_eq!(total(&report, "casts", "cancelled"), 1);
    assert_eq!(total(&report, "casts", "average_cast_time"), 1_500);

    // 1500 ms cast bar + 600 ms cancelled bar + one 1500 ms instant.
    assert_eq!(total(&report, "active_time", "active_time"), 3_600);
    assert!(close(fraction(&report, "active_time", "active_ratio"), 0.36));
}

#[test]
fn active_time_is_skipped_for_tanks() {
    let tank = Participant {
        role: Some(Role::Tank),
        ..player()
    };
    let report = run(&config_with(tank), cast_sequence());
    assert!(report.contribution("active_time").is_none());
    assert_eq!(total(&report, "casts", "casts"), 2);
}

#[test]
fn unfinished_cast_closes_at_the_end_of_the_timeline() {
    let report = run(&config(), vec![cast("begincast", 9_000, 10)]);
    assert_eq!(total(&report, "casts", "unfinished"), 1);
    assert_eq!(report.normalization.synthesized, 1);
}

#[test]
fn chained_casts_in_the_same_millisecond_both_complete() {
    let report = run(
        &config(),
        vec![
            cast("begincast", 1_000, 10),
            cast("cast", 2_500, 10),
            cast("begincast", 2_500, 10),
            cast("cast", 4_000, 10),
        ],
    );
    assert_eq!(total(&report, "casts", "casts"), 2);
    assert_eq!(total(&report, "casts", "instant"), 0);
    assert_eq!(total(&report, "casts", "cancelled"), 0);
    assert_eq!(total(&report, "casts", "average_cast_time"), 1_500);
    assert_eq!(total(&report, "active_time", "active_time"), 3_000);
}

#[test]
fn cast_begun_as_the_previous_one_is_cancelled_completes() {
    let report = run(
        &config(),
        vec![
            cast("begincast", 1_000, 10),
            cast("cast_cancelled", 1_800, 10),
            cast("begincast", 1_800, 10),
            cast("cast", 3_300, 10),
        ],
    );
    assert_eq!(total(&report, "casts", "casts"), 1);
    assert_eq!(total(&report, "casts", "instant"), 0);
    assert_eq!(total(&report, "casts", "cancelled"), 1);
    assert_eq!(total(&report, "casts", "average_cast_time"), 1_500);
    // 800 ms cancelled bar + 1500 ms completed bar.
    assert_eq!(total(&report, "active_time", "active_time"), 2_300);
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[test]
fn resource_efficiency_reads_the_primary_resource_ledger() {
    let report = run(
        &config(),
        vec![
            energize(1_000, 100, 20),
            energize(2_000, -60, 0),
            energize(3_000, 50, 0),
            energize(4_000, -40, 0),
            cast("cast", 2_000, 20),
            cast("cast", 4_000, 20),
        ],
    );
    assert_eq!(total(&report, "resource_efficiency", "gained"), 150);
    assert_eq!(total(&report, "resource_efficiency", "spent"), 100);
    assert_eq!(total(&report, "resource_efficiency", "wasted"), 20);
    assert!(close(
        fraction(&report, "resource_efficiency", "waste_ratio"),
        20.0 / 150.0
    ));
    assert!(close(
        fraction(&report, "resource_efficiency", "casts_per_1000_spent"),
        20.0
    ));

    let Some(Stat::Breakdown(gained)) = report
        .contribution("resource_tracker")
        .and_then(|c| c.get("gained"))
    else {
        panic!("gained breakdown missing");
    };
    assert_eq!(gained.get("mana"), Some(&150));
}

#[test]
fn resource_efficiency_needs_a_known_resource() {
    let no_resource = Participant {
        primary_resource: None,
        ..player()
    };
    let report = run(&config_with(no_resource.clone()), vec![energize(1_000, 10, 0)]);
    assert!(report.contribution("resource_efficiency").is_none());
    assert!(report.contribution("resource_tracker").is_some());

    let mut config = config_with(no_resource);
    config
        .modules
        .settings
        .insert(String::from("resource_efficiency"), json!({ "resource": "mana" }));
    let report = run(&config, vec![energize(1_000, 10, 0)]);
    assert_eq!(total(&report, "resource_efficiency", "gained"), 10);
}

// ---------------------------------------------------------------------------
// Deaths
// ---------------------------------------------------------------------------

#[test]
fn time_dead_includes_a_death_open_at_the_end() {
    let death = |timestamp| RawRecord::new("death", timestamp).target(SELECTED);
    let report = run(
        &config(),
        vec![
            death(3_000),
            RawRecord::new("resurrect", 5_000).target(SELECTED),
            death(9_000),
            RawRecord::new("death", 9_500).target(OTHER),
        ],
    );
    assert_eq!(total(&report, "deaths", "deaths"), 2);
    assert_eq!(total(&report, "deaths", "resurrects"), 1);
    assert_eq!(total(&report, "deaths", "time_dead"), 3_000);
}

// ---------------------------------------------------------------------------
// Cooldown windows
// ---------------------------------------------------------------------------

fn cooldown_config(capacity: usize) -> AnalysisConfig {
    let mut selected = player();
    selected.talents.insert(AbilityId(COOLDOWN_TALENT));
    let mut config = config_with(selected);
    config.modules.settings.insert(
        String::from("cooldown_windows"),
        json!({ "aura": COOLDOWN_AURA, "talent": COOLDOWN_TALENT, "capacity": capacity }),
    );
    config
}

fn cooldown_fight() -> Vec<RawRecord> {
    vec![
        // Lands before the apply at the same millisecond.
        hit(2_000, SELECTED, 100),
        aura("applybuff", 2_000, COOLDOWN_AURA),
        hit(2_500, SELECTED, 200),
        hit(3_000, PET, 300),
        // Lands before the removal at the same millisecond.
        hit(4_000, SELECTED, 400),
        aura("removebuff", 4_000, COOLDOWN_AURA),
        hit(5_000, SELECTED, 500),
        aura("applybuff", 7_000, COOLDOWN_AURA),
        hit(8_000, SELECTED, 50),
    ]
}

#[test]
fn cooldown_windows_sum_damage_while_the_aura_is_up() {
    let report = run(&cooldown_config(4_096), cooldown_fight());

    assert_eq!(total(&report, "cooldown_windows", "windows"), 2);
    assert_eq!(total(&report, "cooldown_windows", "window_damage"), 950);
    assert_eq!(total(&report, "cooldown_windows", "best_window"), 900);
    assert_eq!(total(&report, "cooldown_windows", "window_time"), 5_000);
    assert_eq!(total(&report, "damage_done", "total"), 1_550);
    assert!(close(
        fraction(&report, "cooldown_windows", "damage_share"),
        950.0 / 1_550.0
    ));
}

#[test]
fn cooldown_windows_need_the_talent() {
    let mut config = cooldown_config(4_096);
    config.participants[0].talents.clear();
    let report = run(&config, cooldown_fight());
    assert!(report.contribution("cooldown_windows").is_none());
    assert_eq!(total(&report, "damage_done", "total"), 1_550);
}

#[test]
fn cooldown_windows_follow_the_pet_setting() {
    let mut config = cooldown_config(4_096);
    config
        .modules
        .settings
        .insert(String::from("damage_done"), json!({ "include_pets": false }));
    let report = run(&config, cooldown_fight());

    assert_eq!(total(&report, "cooldown_windows", "window_damage"), 650);
    assert_eq!(total(&report, "damage_done", "total"), 1_250);
    assert!(close(
        fraction(&report, "cooldown_windows", "damage_share"),
        650.0 / 1_250.0
    ));
}

#[test]
fn window_overflow_degrades_only_the_window_module() {
    let report = run(&cooldown_config(2), cooldown_fight());

    let windows = &report.modules["cooldown_windows"];
    assert_eq!(windows.status, ModuleStatus::Degraded);
    assert!(windows.incomplete);
    assert_eq!(windows.errors.len(), 1);
    assert_eq!(windows.errors[0].timestamp, 4_000);
    assert_eq!(report.degraded(), vec!["cooldown_windows"]);
    assert_eq!(total(&report, "damage_done", "total"), 1_550);
}

// ---------------------------------------------------------------------------
// Stat buffs and procs
// ---------------------------------------------------------------------------

const GIZMO_TRAIT: u32 = 300_168;
const HASTE_PROC: u32 = 300_172;
const PRIMARY_PROC: u32 = 300_174;
const UNTAKEN_TRAIT: u32 = 280_555;

fn proc_config() -> AnalysisConfig {
    let mut selected = player();
    selected
        .traits
        .insert(AbilityId(GIZMO_TRAIT), vec![400, 410]);
    let mut config = config_with(selected);
    config.modules.settings.insert(
        String::from("stat_tracker"),
        json!({
            "buffs": [
                { "aura": HASTE_PROC, "stats": ["haste"], "trait": GIZMO_TRAIT, "per_rank": 2 },
                {
                    "aura": PRIMARY_PROC,
                    "stats": ["strength", "agility", "intellect"],
                    "trait": GIZMO_TRAIT,
                    "per_rank": 2
                },
                { "aura": 55, "stats": ["crit"], "trait": UNTAKEN_TRAIT, "per_rank": 5 }
            ]
        }),
    );
    config
}

fn proc_fight() -> Vec<RawRecord> {
    vec![
        aura("applybuff", 1_000, HASTE_PROC),
        aura("removebuff", 3_000, HASTE_PROC),
        aura("applybuff", 5_000, HASTE_PROC),
        aura("refreshbuff", 6_000, HASTE_PROC),
        aura("removebuff", 7_000, HASTE_PROC),
        aura("applybuff", 8_000, PRIMARY_PROC),
        // Not a tracked stat buff.
        aura("applybuff", 8_500, 500),
    ]
}

#[test]
fn trait_stat_buffs_scale_with_ranks() {
    let report = run(&proc_config(), proc_fight());

    assert_eq!(total(&report, "stat_tracker", "stat_buffs"), 2);
    assert_eq!(total(&report, "stat_tracker", "trait_buffs"), 2);
    let Some(Stat::Breakdown(peak)) = report
        .contribution("stat_tracker")
        .and_then(|c| c.get("peak"))
    else {
        panic!("peak breakdown missing");
    };
    // 2 per rank over ranks 400 and 410.
    assert_eq!(peak.get("haste"), Some(&1_620));
    assert_eq!(peak.get("intellect"), Some(&1_620));
    assert_eq!(peak.get("crit"), None);
}

#[test]
fn procs_report_counts_uptime_and_average_stats() {
    let report = run(&proc_config(), proc_fight());

    let Some(Stat::Breakdown(procs)) = report
        .contribution("stat_procs")
        .and_then(|c| c.get("procs"))
    else {
        panic!("procs breakdown missing");
    };
    assert_eq!(procs.get(&HASTE_PROC.to_string()), Some(&3));
    assert_eq!(procs.get(&PRIMARY_PROC.to_string()), Some(&1));
    assert_eq!(total(&report, "stat_procs", "total_procs"), 4);

    assert!(close(
        fraction(&report, "stat_procs", &format!("uptime:{HASTE_PROC}")),
        0.4
    ));
    assert!(close(fraction(&report, "stat_procs", "average_uptime"), 0.6));
    assert_eq!(total(&report, "stat_procs", "average:haste"), 648);
    assert_eq!(total(&report, "stat_procs", "average:intellect"), 324);
}

#[test]
fn stat_modules_stay_off_without_a_matching_trait() {
    let mut config = proc_config();
    config.participants[0].traits.clear();
    let report = run(&config, proc_fight());
    assert!(report.contribution("stat_tracker").is_none());
    assert!(report.contribution("stat_procs").is_none());
    assert!(report.contribution("buff_uptime").is_some());
}

// ---------------------------------------------------------------------------
// Full registry
// ---------------------------------------------------------------------------

#[test]
fn every_module_reports_on_a_mixed_encounter() {
    let mut records = cooldown_fight();
    records.extend(cast_sequence());
    records.extend([
        energize(1_000, 100, 0),
        RawRecord::new("heal", 6_000)
            .source(SELECTED)
            .target(SELECTED)
            .ability(5)
            .amount(80),
        RawRecord::new("damage", 6_500)
            .source(BOSS)
            .target(SELECTED)
            .ability(66)
            .amount(80),
        RawRecord::new("phase", 5_000).phase(2),
    ]);
    let report = run(&cooldown_config(4_096), records);

    let ids: Vec<&str> = report.modules.keys().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec![
            "active_time",
            "buff_tracker",
            "buff_uptime",
            "casts",
            "cooldown_windows",
            "damage_done",
            "damage_taken",
            "deaths",
            "healing_done",
            "resource_efficiency",
            "resource_tracker",
        ]
    );
    assert!(report.degraded().is_empty());
    assert_eq!(report.selected, ActorId(SELECTED));
    assert_eq!(report.bounds.end, 10_000);
}

#[test]
fn selection_pulls_in_dependencies_only() {
    let mut config = config();
    config.modules.enabled = vec![String::from("active_time")];
    let report = run(&config, cast_sequence());
    let ids: Vec<&str> = report.modules.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["active_time", "casts"]);
}
