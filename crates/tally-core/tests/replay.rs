//! End-to-end replay tests: build, dispatch order, lifecycle markers,
//! activity, failure isolation, and result idempotence.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use tally_core::{
    ActorFilter, AnalysisConfig, BoundedQueue, BuildContext, BuildError, Dep, DispatchScope,
    HandlerError, Handlers, Module, ModuleId, ModuleRegistry, ResolveError, RunContext, RunError,
    analyze,
};
use tally_events::normalize;
use tally_types::{
    ActorId, Contribution, DropReason, Event, EventKind, ModuleStatus, Participant, RawRecord,
    Stat, Timestamp,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const SELECTED: u64 = 1;

const ALL_KINDS: [EventKind; 16] = [
    EventKind::EncounterStart,
    EventKind::PhaseChange,
    EventKind::CastBegin,
    EventKind::Cast,
    EventKind::CastEnd,
    EventKind::Damage,
    EventKind::Absorb,
    EventKind::Heal,
    EventKind::ResourceChange,
    EventKind::BuffRemove,
    EventKind::BuffApply,
    EventKind::BuffRefresh,
    EventKind::BuffStack,
    EventKind::Death,
    EventKind::Resurrect,
    EventKind::EncounterEnd,
];

fn damage(timestamp: u64, source: u64) -> RawRecord {
    RawRecord::new("damage", timestamp)
        .source(source)
        .target(99)
        .ability(133)
        .amount(100)
}

/// Ten damage events by the selected participant, 100 ms apart.
fn ten_hits() -> Vec<RawRecord> {
    (0..10).map(|i| damage(1_000 + i * 100, SELECTED)).collect()
}

fn config() -> AnalysisConfig {
    AnalysisConfig::for_participant(
        ActorId(SELECTED),
        vec![Participant::player(ActorId(SELECTED), "Tester")],
    )
}

fn registry(register: impl FnOnce(&mut ModuleRegistry) -> Result<(), ResolveError>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register(&mut registry).unwrap();
    registry
}

fn replayed(registry: &ModuleRegistry, config: &AnalysisConfig, records: Vec<RawRecord>) -> RunContext {
    let mut run = RunContext::build(registry, config, normalize(records)).unwrap();
    run.replay().unwrap();
    run
}

// ---------------------------------------------------------------------------
// Test modules
// ---------------------------------------------------------------------------

/// Counts every damage event.
#[derive(Default)]
struct Counter {
    hits: u64,
}

impl Module for Counter {
    const ID: ModuleId = ModuleId::new("a");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("hits", Stat::Count(self.hits))
    }
}

impl Counter {
    fn on_damage(&mut self, _: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.hits += 1;
        Ok(())
    }
}

/// Reads the counter on every damage event.
struct Observer {
    counter: Dep<Counter>,
    seen: Vec<u64>,
}

impl Module for Observer {
    const ID: ModuleId = ModuleId::new("b");
    const DEPENDENCIES: &'static [ModuleId] = &[Counter::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            counter: ctx.dependency::<Counter>()?,
            seen: Vec::new(),
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("observations", Stat::Count(self.seen.len() as u64))
    }
}

impl Observer {
    fn on_damage(&mut self, _: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let counter = scope.get(self.counter)?;
        self.seen.push(counter.hits);
        Ok(())
    }
}

/// Records every event it is handed, filtered to the selected participant.
#[derive(Default)]
struct Recorder {
    log: Vec<(EventKind, Timestamp)>,
    clock: Vec<Timestamp>,
    sequences: Vec<u64>,
}

impl Module for Recorder {
    const ID: ModuleId = ModuleId::new("recorder");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on_each(&ALL_KINDS, ActorFilter::BySelected, Self::record);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("events", Stat::Count(self.log.len() as u64))
    }
}

impl Recorder {
    fn record(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.log.push((event.kind(), event.timestamp));
        self.clock.push(scope.now());
        self.sequences.push(event.sequence);
        Ok(())
    }
}

/// Never active.
#[derive(Default)]
struct Dormant {
    seen: u64,
}

impl Module for Dormant {
    const ID: ModuleId = ModuleId::new("dormant");

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        ctx.set_active(false);
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on_each(&ALL_KINDS, ActorFilter::Any, Self::on_any);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("seen", Stat::Count(self.seen))
    }
}

impl Dormant {
    fn on_any(&mut self, _: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.seen += 1;
        Ok(())
    }
}

/// Depends on the dormant module and notes its status at the end.
struct Watcher {
    dormant: Dep<Dormant>,
    status: Option<ModuleStatus>,
}

impl Module for Watcher {
    const ID: ModuleId = ModuleId::new("watcher");
    const DEPENDENCIES: &'static [ModuleId] = &[Dormant::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let dormant = ctx.dependency::<Dormant>()?;
        assert_eq!(ctx.dependency_status(dormant), ModuleStatus::Inactive);
        Ok(Self {
            dormant,
            status: None,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new()
    }
}

impl Watcher {
    fn on_end(&mut self, _: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.status = Some(scope.status(self.dormant));
        // Inactive dependencies still resolve to their (untouched) state.
        assert_eq!(scope.get(self.dormant)?.seen, 0);
        Ok(())
    }
}

/// Fails on its fifth damage event.
#[derive(Default)]
struct Flaky {
    hits: u64,
}

impl Module for Flaky {
    const ID: ModuleId = ModuleId::new("c");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("hits", Stat::Count(self.hits))
    }
}

impl Flaky {
    fn on_damage(&mut self, _: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.hits += 1;
        if self.hits == 5 {
            return Err(HandlerError::failed("fifth hit rejected"));
        }
        Ok(())
    }
}

/// Independent counter running after the flaky module.
#[derive(Default)]
struct Steady {
    hits: u64,
}

impl Module for Steady {
    const ID: ModuleId = ModuleId::new("d");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("hits", Stat::Count(self.hits))
    }
}

impl Steady {
    fn on_damage(&mut self, _: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.hits += 1;
        Ok(())
    }
}

/// Mirrors the steady counter.
struct Mirror {
    steady: Dep<Steady>,
    last: u64,
}

impl Module for Mirror {
    const ID: ModuleId = ModuleId::new("e");
    const DEPENDENCIES: &'static [ModuleId] = &[Steady::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            steady: ctx.dependency::<Steady>()?,
            last: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("hits", Stat::Count(self.last))
    }
}

impl Mirror {
    fn on_damage(&mut self, _: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.last = scope.get(self.steady)?.hits;
        Ok(())
    }
}

/// Panics on its third damage event.
#[derive(Default)]
struct Panicky {
    hits: u64,
}

impl Module for Panicky {
    const ID: ModuleId = ModuleId::new("panicky");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("hits", Stat::Count(self.hits))
    }
}

impl Panicky {
    fn on_damage(&mut self, _: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.hits += 1;
        if self.hits == 3 {
            panic!("third hit");
        }
        Ok(())
    }
}

/// Buffers every hit in a tiny queue without flushing.
struct Hoarder {
    queue: BoundedQueue<u64>,
}

impl Module for Hoarder {
    const ID: ModuleId = ModuleId::new("hoarder");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            queue: BoundedQueue::new(3),
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::Any, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new().with("buffered", Stat::Count(self.queue.len() as u64))
    }
}

impl Hoarder {
    fn on_damage(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.queue.push(event.timestamp)
    }
}

/// Asks for a dependency it never declared.
struct Greedy;

impl Module for Greedy {
    const ID: ModuleId = ModuleId::new("greedy");

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        ctx.dependency::<Counter>()?;
        Ok(Self)
    }

    fn register(&self, _: &mut Handlers<Self>) {}

    fn contribution(&self) -> Contribution {
        Contribution::new()
    }
}

/// Claims the counter's id with a different type.
struct Impostor;

impl Module for Impostor {
    const ID: ModuleId = ModuleId::new("a");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self)
    }

    fn register(&self, _: &mut Handlers<Self>) {}

    fn contribution(&self) -> Contribution {
        Contribution::new()
    }
}

struct Ping;

impl Module for Ping {
    const ID: ModuleId = ModuleId::new("ping");
    const DEPENDENCIES: &'static [ModuleId] = &[Pong::ID];

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self)
    }

    fn register(&self, _: &mut Handlers<Self>) {}

    fn contribution(&self) -> Contribution {
        Contribution::new()
    }
}

struct Pong;

impl Module for Pong {
    const ID: ModuleId = ModuleId::new("pong");
    const DEPENDENCIES: &'static [ModuleId] = &[Ping::ID];

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self)
    }

    fn register(&self, _: &mut Handlers<Self>) {}

    fn contribution(&self) -> Contribution {
        Contribution::new()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn dependent_observes_dependency_updated_for_the_same_event() {
    // Register the dependent first; resolution still puts the counter ahead.
    let registry = registry(|r| {
        r.register::<Observer>()?.register::<Counter>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), vec![damage(1_000, SELECTED)]);

    assert_eq!(run.order(), vec![Counter::ID, Observer::ID]);
    assert_eq!(run.module::<Observer>().unwrap().seen, vec![1]);

    let run = replayed(&registry, &config(), ten_hits());
    assert_eq!(
        run.module::<Observer>().unwrap().seen,
        (1..=10).collect::<Vec<u64>>()
    );
}

#[test]
fn selecting_a_dependent_pulls_in_its_dependency() {
    let registry = registry(|r| {
        r.register::<Counter>()?
            .register::<Observer>()?
            .register::<Recorder>()?;
        Ok(())
    });
    let mut config = config();
    config.modules.enabled = vec![String::from("b")];
    let run = replayed(&registry, &config, ten_hits());
    assert_eq!(run.order(), vec![Counter::ID, Observer::ID]);
    assert!(run.status("recorder").is_none());
}

#[test]
fn cycle_between_typed_modules_is_fatal() {
    let registry = registry(|r| {
        r.register::<Ping>()?.register::<Pong>()?;
        Ok(())
    });
    let Err(err) = RunContext::build(&registry, &config(), normalize(ten_hits())) else {
        panic!("cycle must not build");
    };
    match err {
        RunError::Resolve {
            source: ResolveError::DependencyCycle { cycle },
        } => {
            assert_eq!(cycle, vec![Ping::ID, Pong::ID, Ping::ID]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle markers and filters
// ---------------------------------------------------------------------------

#[test]
fn start_and_end_markers_bracket_the_timeline_exactly_once() {
    let registry = registry(|r| {
        r.register::<Recorder>()?;
        Ok(())
    });
    // The second participant's hit is filtered out; the markers are not.
    let mut records = ten_hits();
    records.push(damage(1_050, 2));
    let run = replayed(&registry, &config(), records);
    let log = &run.module::<Recorder>().unwrap().log;

    assert_eq!(log.len(), 12);
    assert_eq!(log.first(), Some(&(EventKind::EncounterStart, 1_000)));
    assert_eq!(log.last(), Some(&(EventKind::EncounterEnd, 1_900)));
    let ends = log.iter().filter(|(kind, _)| *kind == EventKind::EncounterEnd).count();
    assert_eq!(ends, 1);

    let clock = &run.module::<Recorder>().unwrap().clock;
    assert!(clock.windows(2).all(|pair| pair[0] <= pair[1]));

    // Markers never share a sequence number with a timeline event.
    let sequences = &run.module::<Recorder>().unwrap().sequences;
    assert_eq!(sequences.first(), Some(&Event::START_SEQUENCE));
    assert_eq!(sequences.get(1), Some(&Event::FIRST_SEQUENCE));
    assert_eq!(sequences.last(), Some(&12));
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn end_marker_follows_last_event_even_with_earlier_override() {
    let registry = registry(|r| {
        r.register::<Recorder>()?;
        Ok(())
    });
    let mut config = config();
    config.encounter.end = Some(1_200);
    let mut run = RunContext::build(&registry, &config, config.normalizer().normalize(ten_hits()))
        .unwrap();
    let summary = run.replay().unwrap();

    assert_eq!(summary.ended_at, 1_900);
    assert_eq!(summary.events_replayed, 10);
    let log = &run.module::<Recorder>().unwrap().log;
    assert_eq!(log.last(), Some(&(EventKind::EncounterEnd, 1_900)));
}

#[test]
fn end_marker_is_delivered_for_an_empty_timeline() {
    let registry = registry(|r| {
        r.register::<Recorder>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), Vec::new());
    let log = &run.module::<Recorder>().unwrap().log;
    let kinds: Vec<EventKind> = log.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![EventKind::EncounterStart, EventKind::EncounterEnd]);
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[test]
fn inactive_module_receives_nothing_and_is_absent_from_report() {
    let registry = registry(|r| {
        r.register::<Dormant>()?.register::<Watcher>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), ten_hits());

    assert_eq!(run.status("dormant"), Some(ModuleStatus::Inactive));
    assert_eq!(run.module::<Dormant>().unwrap().seen, 0);
    assert_eq!(
        run.module::<Watcher>().unwrap().status,
        Some(ModuleStatus::Inactive)
    );

    let report = run.report();
    assert!(!report.modules.contains_key("dormant"));
    assert!(report.modules.contains_key("watcher"));
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[test]
fn failing_handler_degrades_only_its_module() {
    let registry = registry(|r| {
        r.register::<Flaky>()?
            .register::<Steady>()?
            .register::<Mirror>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), ten_hits());
    let report = run.report();

    let flaky = &report.modules["c"];
    assert_eq!(flaky.status, ModuleStatus::Degraded);
    assert!(flaky.incomplete);
    assert_eq!(flaky.contribution.total("hits"), Some(5));
    assert_eq!(flaky.errors.len(), 1);
    assert_eq!(flaky.errors[0].sequence, 5);
    assert_eq!(flaky.errors[0].event_kind, EventKind::Damage);
    assert_eq!(flaky.errors[0].message, "fifth hit rejected");

    assert_eq!(report.modules["d"].status, ModuleStatus::Active);
    assert_eq!(report.contribution("d").unwrap().total("hits"), Some(10));
    assert_eq!(report.contribution("e").unwrap().total("hits"), Some(10));
    assert_eq!(report.degraded(), vec!["c"]);
}

#[test]
fn panicking_handler_is_contained() {
    let registry = registry(|r| {
        r.register::<Panicky>()?.register::<Steady>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), ten_hits());
    let report = run.report();

    let panicky = &report.modules["panicky"];
    assert_eq!(panicky.status, ModuleStatus::Degraded);
    assert!(panicky.errors[0].message.contains("third hit"));
    assert_eq!(report.contribution("d").unwrap().total("hits"), Some(10));
}

#[test]
fn queue_overflow_degrades_the_buffering_module() {
    let registry = registry(|r| {
        r.register::<Hoarder>()?.register::<Counter>()?;
        Ok(())
    });
    let run = replayed(&registry, &config(), ten_hits());
    let report = run.report();

    let hoarder = &report.modules["hoarder"];
    assert_eq!(hoarder.status, ModuleStatus::Degraded);
    assert_eq!(hoarder.contribution.total("buffered"), Some(3));
    assert!(hoarder.errors[0].message.contains("overflow"));
    assert_eq!(report.contribution("a").unwrap().total("hits"), Some(10));
}

// ---------------------------------------------------------------------------
// Construction errors
// ---------------------------------------------------------------------------

#[test]
fn undeclared_dependency_is_a_build_error() {
    let registry = registry(|r| {
        r.register::<Counter>()?.register::<Greedy>()?;
        Ok(())
    });
    let result = RunContext::build(&registry, &config(), normalize(ten_hits()));
    assert!(matches!(
        result,
        Err(RunError::Build {
            source: BuildError::UndeclaredDependency { .. }
        })
    ));
}

#[test]
fn mistyped_dependency_is_a_build_error() {
    let registry = registry(|r| {
        r.register::<Impostor>()?.register::<Observer>()?;
        Ok(())
    });
    let result = RunContext::build(&registry, &config(), normalize(ten_hits()));
    assert!(matches!(
        result,
        Err(RunError::Build {
            source: BuildError::DependencyType { .. }
        })
    ));
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[test]
fn contributions_are_idempotent_and_replay_runs_once() {
    let registry = registry(|r| {
        r.register::<Counter>()?.register::<Observer>()?;
        Ok(())
    });
    let mut run = replayed(&registry, &config(), ten_hits());

    let first = run.report();
    let second = run.report();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    assert!(matches!(run.replay(), Err(RunError::AlreadyReplayed)));
    assert_eq!(run.report(), first);
}

#[test]
fn malformed_damage_is_dropped_and_the_rest_analyzed() {
    let registry = registry(|r| {
        r.register::<Counter>()?;
        Ok(())
    });
    let mut records = ten_hits();
    records.push(
        RawRecord::new("damage", 1_450)
            .target(99)
            .ability(133)
            .amount(100),
    );
    let report = analyze(&registry, &config(), records).unwrap();

    assert_eq!(report.normalization.received, 11);
    assert_eq!(report.normalization.dropped(), 1);
    assert_eq!(
        report.normalization.malformed.get(&DropReason::MissingSource),
        Some(&1)
    );
    assert_eq!(report.events_replayed, 10);
    assert_eq!(report.contribution("a").unwrap().total("hits"), Some(10));
}
