//! Business-timezone clock helpers.
//!
//! All calls are coordinated from Colombia, which observes a fixed UTC-5
//! offset with no daylight saving. Greetings and farewells follow the local
//! hour:
//! - 6:00-11:59 -> "Buenos días"
//! - 12:00-18:59 -> "Buenas tardes"
//! - 19:00-5:59 -> "Buenas noches"

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

/// Fixed UTC-5 offset for America/Bogota. Colombia has no DST.
fn bogota_offset() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).expect("UTC-5 is a valid fixed offset")
}

/// Time-of-day buckets used for greeting selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Manana,
    Tarde,
    Noche,
}

/// Current datetime in the business timezone (UTC-5).
pub fn business_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&bogota_offset())
}

/// Current date in the business timezone.
pub fn business_today() -> NaiveDate {
    business_now().date_naive()
}

/// Bucket for a given local hour (0-23).
pub fn time_of_day(hour: u32) -> TimeOfDay {
    match hour {
        6..=11 => TimeOfDay::Manana,
        12..=18 => TimeOfDay::Tarde,
        _ => TimeOfDay::Noche,
    }
}

/// Time-appropriate greeting for the current business hour.
pub fn greeting() -> &'static str {
    greeting_for(time_of_day(business_now().hour()))
}

/// Time-appropriate farewell for the current business hour.
pub fn farewell() -> &'static str {
    farewell_for(time_of_day(business_now().hour()))
}

fn greeting_for(period: TimeOfDay) -> &'static str {
    match period {
        TimeOfDay::Manana => "Buenos días",
        TimeOfDay::Tarde => "Buenas tardes",
        TimeOfDay::Noche => "Buenas noches",
    }
}

fn farewell_for(period: TimeOfDay) -> &'static str {
    match period {
        TimeOfDay::Manana => "Que tenga un excelente día",
        TimeOfDay::Tarde => "Que tenga una excelente tarde",
        TimeOfDay::Noche => "Que tenga una excelente noche",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morning_hours_map_to_manana() {
        for hour in 6..12 {
            assert_eq!(time_of_day(hour), TimeOfDay::Manana, "hour {}", hour);
        }
    }

    #[test]
    fn afternoon_hours_map_to_tarde() {
        for hour in 12..19 {
            assert_eq!(time_of_day(hour), TimeOfDay::Tarde, "hour {}", hour);
        }
    }

    #[test]
    fn night_hours_map_to_noche() {
        for hour in [19, 20, 21, 22, 23, 0, 1, 2, 3, 4, 5] {
            assert_eq!(time_of_day(hour), TimeOfDay::Noche, "hour {}", hour);
        }
    }

    #[test]
    fn greetings_match_period() {
        assert_eq!(greeting_for(TimeOfDay::Manana), "Buenos días");
        assert_eq!(greeting_for(TimeOfDay::Tarde), "Buenas tardes");
        assert_eq!(greeting_for(TimeOfDay::Noche), "Buenas noches");
    }

    #[test]
    fn farewells_match_period() {
        assert!(farewell_for(TimeOfDay::Manana).contains("día"));
        assert!(farewell_for(TimeOfDay::Tarde).contains("tarde"));
        assert!(farewell_for(TimeOfDay::Noche).contains("noche"));
    }

    #[test]
    fn business_now_is_five_hours_behind_utc() {
        let utc = Utc::now();
        let local = business_now();
        let diff = utc.timestamp() - local.naive_local().and_utc().timestamp();
        // Allow a second of slack between the two clock reads
        assert!((diff - 5 * 3600).abs() <= 1, "offset was {}", diff);
    }
}
