//! Integration tests for canonical ordering of the normalizer.
//!
//! The same logical timeline must normalize to the identical canonical
//! sequence regardless of the order (or duplication) of arrival.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tally_events::{normalize, parse_records};
use tally_types::{CastOutcome, EventKind, EventPayload, RawRecord};

fn logical_timeline() -> Vec<RawRecord> {
    vec![
        RawRecord::new("encounter_start", 0),
        RawRecord::new("begincast", 100).source(1).ability(10),
        RawRecord::new("applybuff", 100).source(1).target(1).ability(20),
        RawRecord::new("cast", 1_600).source(1).ability(10),
        RawRecord::new("damage", 1_600).source(1).target(9).ability(10).amount(4_000),
        RawRecord::new("damage", 1_600).source(2).target(9).ability(11).amount(300),
        RawRecord::new("heal", 1_700).source(3).target(1).ability(30).amount(900),
        RawRecord::new("energize", 1_800).target(1).ability(40).amount(25).resource("mana"),
        RawRecord::new("removebuff", 5_000).source(1).target(1).ability(20),
        RawRecord::new("begincast", 5_100).source(1).ability(10),
        RawRecord::new("phase", 6_000).phase(2),
        RawRecord::new("death", 7_000).target(9),
        RawRecord::new("encounter_end", 8_000),
    ]
}

#[test]
fn shuffled_arrival_yields_identical_sequence() {
    let expected = normalize(logical_timeline());
    let mut rng = StdRng::seed_from_u64(0x7a11);

    for _ in 0..50 {
        let mut shuffled = logical_timeline();
        shuffled.shuffle(&mut rng);
        let actual = normalize(shuffled);
        assert_eq!(actual.events, expected.events);
        assert_eq!(actual.bounds, expected.bounds);
    }
}

#[test]
fn duplicated_arrival_yields_identical_sequence() {
    let expected = normalize(logical_timeline());

    let mut doubled = logical_timeline();
    doubled.extend(logical_timeline().into_iter().skip(2).take(4));
    doubled.reverse();
    let actual = normalize(doubled);

    assert_eq!(actual.events, expected.events);
    assert_eq!(actual.stats.duplicates, 4);
}

#[test]
fn canonical_sequence_is_non_decreasing_and_closes_open_casts() {
    let timeline = normalize(logical_timeline());
    assert!(
        timeline
            .events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );

    let last = timeline.events.last().unwrap();
    assert_eq!(last.timestamp, 8_000);
    assert_eq!(
        last.payload,
        EventPayload::CastEnd {
            outcome: CastOutcome::Unfinished,
            began_at: 5_100
        }
    );

    // The completed cast's end sits directly after the cast itself.
    let cast_index = timeline
        .events
        .iter()
        .position(|e| e.kind() == EventKind::Cast)
        .unwrap();
    assert_eq!(timeline.events[cast_index + 1].kind(), EventKind::CastEnd);
}

#[test]
fn json_lines_document_normalizes_with_drop_counts() {
    let text = r#"
{"timestamp": 10, "type": "damage", "source_id": 1, "target_id": 2, "ability_id": 3, "amount": 50}
{"timestamp": 20, "type": "damage", "target_id": 2, "ability_id": 3, "amount": 50}
this line is garbage
{"timestamp": 30, "type": "heal", "source_id": 1, "target_id": 1, "ability_id": 4, "amount": 75}
"#;
    let parsed = parse_records(text).unwrap();
    let timeline = tally_events::Normalizer::new().normalize_parsed(parsed);

    assert_eq!(timeline.events.len(), 2);
    assert_eq!(timeline.stats.received, 4);
    assert_eq!(timeline.stats.accepted, 2);
    assert_eq!(timeline.stats.dropped(), 2);
}

fn cast_ends(records: Vec<RawRecord>) -> Vec<(u64, EventPayload)> {
    normalize(records)
        .events
        .into_iter()
        .filter(|e| e.kind() == EventKind::CastEnd)
        .map(|e| (e.timestamp, e.payload))
        .collect()
}

#[test]
fn chained_cast_in_the_same_millisecond_pairs_with_its_own_begin() {
    let records = vec![
        RawRecord::new("begincast", 1_000).source(1).ability(10),
        RawRecord::new("cast", 2_500).source(1).ability(10),
        RawRecord::new("begincast", 2_500).source(1).ability(10),
        RawRecord::new("cast", 4_000).source(1).ability(10),
    ];
    let expected = vec![
        (
            2_500,
            EventPayload::CastEnd {
                outcome: CastOutcome::Completed,
                began_at: 1_000,
            },
        ),
        (
            4_000,
            EventPayload::CastEnd {
                outcome: CastOutcome::Completed,
                began_at: 2_500,
            },
        ),
    ];
    assert_eq!(cast_ends(records.clone()), expected);

    let mut reversed = records;
    reversed.reverse();
    assert_eq!(cast_ends(reversed), expected);
}

#[test]
fn cancel_then_begin_in_the_same_millisecond_keeps_both_casts() {
    let records = vec![
        RawRecord::new("begincast", 1_000).source(1).ability(10),
        RawRecord::new("begincast", 1_800).source(1).ability(10),
        RawRecord::new("cast_cancelled", 1_800).source(1).ability(10),
        RawRecord::new("cast", 3_300).source(1).ability(10),
    ];
    assert_eq!(
        cast_ends(records),
        vec![
            (
                1_800,
                EventPayload::CastEnd {
                    outcome: CastOutcome::Cancelled,
                    began_at: 1_000,
                },
            ),
            (
                3_300,
                EventPayload::CastEnd {
                    outcome: CastOutcome::Completed,
                    began_at: 1_800,
                },
            ),
        ]
    );
}
