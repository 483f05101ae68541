use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use time_range_engine::{
    format_time_range, list_defaults, parse_time_range, FormatOptions, ParseOutcome, TimeRange,
};

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    // 1990-01-01 .. 2100-01-01
    (631_152_000i64..4_102_444_800i64).prop_map(|s| Utc.timestamp_opt(s, 0).unwrap())
}

fn display_zone() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("UTC"),
        Just("UTC-08:00"),
        Just("+05:30"),
        Just("UTC+14:00"),
    ]
}

fn unit() -> impl Strategy<Value = (&'static str, Duration)> {
    prop_oneof![
        Just(("m", Duration::minutes(1))),
        Just(("h", Duration::hours(1))),
        Just(("d", Duration::days(1))),
        Just(("w", Duration::weeks(1))),
    ]
}

proptest! {
    #[test]
    fn compact_durations_are_deterministic(now in instant(), n in 1i64..2000, (suffix, width) in unit()) {
        let expr = format!("{n}{suffix}");
        let first = parse_time_range(&expr, now);
        let second = parse_time_range(&expr, now);
        prop_assert_eq!(&first, &second);

        let range = first.range().unwrap();
        prop_assert_eq!(range.end(), now);
        prop_assert_eq!(range.duration(), width * n as i32);
    }

    #[test]
    fn ago_phrases_end_at_now(now in instant(), n in 1i64..500) {
        let range = parse_time_range(&format!("{n} days ago"), now).range().unwrap();
        prop_assert_eq!(range.start(), now - Duration::days(n));
        prop_assert_eq!(range.end(), now);
    }

    #[test]
    fn arbitrary_input_never_panics_and_is_ordered(input in ".{0,40}", now in instant()) {
        match parse_time_range(&input, now) {
            ParseOutcome::Resolved { range, .. } => prop_assert!(range.start() < range.end()),
            ParseOutcome::Failed { .. } => {}
            ParseOutcome::Ambiguous { .. } => prop_assert!(false, "grammar never returns ambiguous"),
        }
    }

    #[test]
    fn preset_values_round_trip_through_grammar(now in instant()) {
        for preset in list_defaults() {
            let parsed = parse_time_range(preset.value(), now).range();
            prop_assert_eq!(parsed, Some(preset.range_at(now)));
        }
    }

    #[test]
    fn canonical_format_is_stable(a in instant(), b in instant(), offset_hours in -12i32..=14) {
        let options = FormatOptions::with_timezone(format!("UTC{offset_hours:+03}:00"));
        let forward = format_time_range(&TimeRange::new(a, b), &options);
        let reversed = format_time_range(&TimeRange::new(b, a), &options);
        prop_assert_eq!(&forward, &reversed);
        prop_assert_eq!(&forward, &format_time_range(&TimeRange::new(a, b), &options));
    }

    #[test]
    fn preset_ranges_round_trip_through_canonical_format(now in instant(), zone in display_zone()) {
        let options = FormatOptions::with_timezone(zone);
        for preset in list_defaults() {
            let range = preset.range_at(now);
            let text = format_time_range(&range, &options);
            prop_assert_eq!(parse_time_range(&text, now).range(), Some(range), "{}", text);
        }
    }

    #[test]
    fn calendar_ranges_round_trip_through_canonical_format(
        a in instant(),
        b in instant(),
        now in instant(),
        zone in display_zone(),
    ) {
        prop_assume!(a != b);
        let range = TimeRange::new(a, b);
        let text = format_time_range(&range, &FormatOptions::with_timezone(zone));
        prop_assert_eq!(parse_time_range(&text, now).range(), Some(range), "{}", text);
    }
}
