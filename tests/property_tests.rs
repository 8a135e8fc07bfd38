/// Property-based tests using proptest
/// Tests invariants of payload validation and address normalization
use proptest::prelude::*;
use serde_json::json;

use crime_report_api::geocoder::normalize_address;
use crime_report_api::models::{names_match, normalize_day_of_week, ReportUpdate};

const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// Property: validation never panics, whatever the field contents
proptest! {
    #[test]
    fn validation_never_panics(
        crime_id in "\\PC*",
        date in "\\PC*",
        time in "\\PC*",
        zip in "\\PC*",
        crime_type in "\\PC*",
    ) {
        let payload = json!({
            "crime_id": crime_id,
            "date": date,
            "time": time,
            "zip_code": zip,
            "crime_type": crime_type,
        });
        if let Ok(update) = ReportUpdate::from_json(payload) {
            let _ = update.validate();
        }
    }

    #[test]
    fn well_formed_crime_ids_are_accepted(crime_id in "[A-Za-z0-9_-]{1,64}") {
        let update = ReportUpdate::from_json(json!({ "crime_id": crime_id.clone() })).unwrap();
        let validated = update.validate().unwrap();
        prop_assert_eq!(validated.report.crime_id, Some(crime_id));
    }

    #[test]
    fn overlong_crime_ids_are_rejected(crime_id in "[A-Za-z0-9]{65,80}") {
        let update = ReportUpdate::from_json(json!({ "crime_id": crime_id })).unwrap();
        prop_assert!(update.validate().is_err());
    }

    #[test]
    fn valid_calendar_dates_are_accepted(y in 1990i32..2100, m in 1u32..=12, d in 1u32..=28) {
        let date = format!("{:04}-{:02}-{:02}", y, m, d);
        let update = ReportUpdate::from_json(json!({ "date": date })).unwrap();
        prop_assert!(update.validate().is_ok());
    }
}

// Property: address normalization is stable
proptest! {
    #[test]
    fn normalization_is_idempotent(address in "\\PC*") {
        let once = normalize_address(&address);
        prop_assert_eq!(normalize_address(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }

    #[test]
    fn crime_type_names_match_ignoring_case(name in "[A-Za-z ]{1,30}") {
        prop_assert!(names_match(&name, &name.to_uppercase()));
        let padded = format!("  {}  ", name);
        prop_assert!(names_match(&padded, &name.to_lowercase()));
    }

    #[test]
    fn weekday_names_normalize_to_capitalized(index in 0usize..7, upper in any::<bool>(), short in any::<bool>()) {
        let day = DAYS[index];
        let mut input = if short { day[..3].to_string() } else { day.to_string() };
        input = if upper { input.to_uppercase() } else { input.to_lowercase() };
        prop_assert_eq!(normalize_day_of_week(&input), Some(day));
    }
}
