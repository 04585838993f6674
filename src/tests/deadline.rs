use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};

use crate::deadline::{is_closed, parse_deadline, parse_deadline_or_default};

#[test]
fn accepts_the_formats_admins_actually_type() -> Result<()> {
    let expected = Utc.with_ymd_and_hms(2024, 5, 10, 12, 30, 0).unwrap();
    for input in [
        "2024-05-10 12:30:00",
        "2024-05-10 12:30",
        "2024-05-10T12:30:00",
        "2024-05-10T12:30:00Z",
        "  2024-05-10 12:30:00  ",
    ] {
        assert_eq!(parse_deadline(input)?, expected, "input: {input:?}");
    }
    assert_eq!(
        parse_deadline("2024-05-10")?,
        Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap()
    );
    Ok(())
}

#[test]
fn rejects_garbage() {
    for input in ["", "soon", "10/05/2024", "2024-13-40 99:99"] {
        assert!(parse_deadline(input).is_err(), "input: {input:?}");
    }
}

#[test]
fn fallback_is_one_hour_from_now() {
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    assert_eq!(
        parse_deadline_or_default("not a date", now),
        now + Duration::hours(1)
    );
    // valid input is untouched
    assert_eq!(
        parse_deadline_or_default("2024-05-10 13:30", now),
        Utc.with_ymd_and_hms(2024, 5, 10, 13, 30, 0).unwrap()
    );
}

#[test]
fn closed_strictly_after_the_deadline() {
    let deadline = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    assert!(!is_closed(deadline, deadline - Duration::seconds(1)));
    assert!(!is_closed(deadline, deadline));
    assert!(is_closed(deadline, deadline + Duration::seconds(1)));
}
