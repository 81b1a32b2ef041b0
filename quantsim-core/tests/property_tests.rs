//! Property tests: container ordering laws, datetime round-trips, series
//! arithmetic, and fill-rule invariants.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use quantsim_core::domain::{
    Bar, Bars, ErrorHandlingMode, OrderType, Position, PositionId, PositionSide,
    PositionsContainer, Series,
};
use quantsim_core::engine::manager::{EntryOutcome, PositionsManager};

fn datetime(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn position(id: u64, day: u32, hour: u32) -> Position {
    Position::new(
        PositionId(id),
        "SPY",
        PositionSide::Long,
        day as usize,
        datetime(day, hour),
        100.0,
        OrderType::Market,
        0.0,
        0.0,
        "entry",
        10,
        true,
    )
}

proptest! {
    /// Sorting by entry time is stable: equal keys keep insertion order.
    #[test]
    fn container_entry_sort_is_stable(days in proptest::collection::vec(1u32..=28, 1..40)) {
        let mut container = PositionsContainer::new();
        for (i, &day) in days.iter().enumerate() {
            container.push(position(i as u64 + 1, day, 12));
        }
        let mut expected: Vec<(u32, u64)> = days
            .iter()
            .enumerate()
            .map(|(i, &day)| (day, i as u64 + 1))
            .collect();
        expected.sort_by_key(|&(day, _)| day);

        container.sort_by_entry_time();
        let actual: Vec<u64> = container.iter().map(|p| p.id().0).collect();
        let expected_ids: Vec<u64> = expected.into_iter().map(|(_, id)| id).collect();
        prop_assert_eq!(actual, expected_ids);
    }

    /// Reversing twice restores the original order.
    #[test]
    fn container_reverse_is_involutive(count in 0usize..50) {
        let mut container = PositionsContainer::new();
        for i in 0..count {
            container.push(position(i as u64 + 1, (i % 28) as u32 + 1, 12));
        }
        let before: Vec<u64> = container.iter().map(|p| p.id().0).collect();
        container.reverse();
        container.reverse();
        let after: Vec<u64> = container.iter().map(|p| p.id().0).collect();
        prop_assert_eq!(before, after);
    }

    /// Disabling positions never changes the container's count.
    #[test]
    fn disable_preserves_count(count in 1usize..30, disable_mask in proptest::collection::vec(any::<bool>(), 30)) {
        let mut container = PositionsContainer::new();
        for i in 0..count {
            container.push(position(i as u64 + 1, (i % 28) as u32 + 1, 12));
        }
        for i in 0..count {
            if disable_mask[i] {
                container.get_mut(PositionId(i as u64 + 1)).unwrap().disable();
            }
        }
        prop_assert_eq!(container.len(), count);
        prop_assert!(container.enabled_count() <= container.len());
    }

    /// ISO datetime: serialize → parse → re-serialize is the identity.
    #[test]
    fn iso_datetime_roundtrip(
        day in 1u32..=28,
        month in 1u32..=12,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let dt = NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap();
        let text = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
        let parsed: NaiveDateTime = text.parse().unwrap();
        prop_assert_eq!(parsed, dt);
        prop_assert_eq!(parsed.format("%Y-%m-%dT%H:%M:%S").to_string(), text);
    }

    /// Element-wise add/sub are inverse operations where defined.
    #[test]
    fn series_add_sub_roundtrip(values in proptest::collection::vec(-1e6f64..1e6, 1..100)) {
        let a = Series::from_vec(values.clone());
        let b = Series::from_vec(values.iter().map(|v| v * 0.5 + 1.0).collect());
        let sum = a.add(&b).unwrap();
        let back = sum.sub(&b).unwrap();
        for i in 0..a.len() {
            prop_assert!((back.at(i) - a.at(i)).abs() < 1e-6);
        }
    }

    /// A buy-stop entry fills iff the bar's high reaches the stop, and the
    /// fill price is the open when gapping through, the stop otherwise.
    #[test]
    fn buy_stop_fill_rule(
        open in 10.0f64..200.0,
        spread_up in 0.0f64..50.0,
        spread_down in 0.0f64..50.0,
        stop in 10.0f64..250.0,
    ) {
        let high = open + spread_up;
        let low = open - spread_down;
        let close = (open + high + low) / 3.0;
        let bar = Bar {
            time: datetime(2, 16),
            open,
            high,
            low,
            close,
            volume: 1000.0,
            open_interest: 0.0,
            extra: None,
        };
        let bars = Bars::new("SPY", vec![bar], ErrorHandlingMode::Ignore).unwrap();
        let mut mgr = PositionsManager::new("prop");
        let outcome = mgr.buy_at_stop(&bars, 0, stop, 10, "entry").unwrap();

        if high >= stop {
            match outcome {
                EntryOutcome::Filled(id) => {
                    let price = mgr.container().get(id).unwrap().entry_price();
                    if open >= stop {
                        prop_assert_eq!(price, open);
                    } else {
                        prop_assert_eq!(price, stop);
                    }
                }
                other => prop_assert!(false, "expected a fill, got {:?}", other),
            }
        } else {
            prop_assert_eq!(outcome, EntryOutcome::Rejected);
        }
    }
}

#[test]
fn nan_comparisons_are_false() {
    let a = Series::from_vec(vec![f64::NAN, f64::NAN]);
    let b = Series::from_vec(vec![1.0, 1.0]);
    assert!(!a.crosses_over(&b, 1).unwrap());
    assert!(!a.crosses_under(&b, 1).unwrap());
    assert!(!a.turns_up(1).unwrap());
}
