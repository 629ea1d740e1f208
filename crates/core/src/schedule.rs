//! Appointment date/time handling.

use crate::constants::{APPOINTMENT_DATE_FORMAT, APPOINTMENT_TIME_FORMAT};
use crate::error::{LabError, LabResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Combine a `YYYY-MM-DD` date and an `HH:mm` time into one wall-clock timestamp.
///
/// The result carries no offset: it is the literal lab-local appointment time and never depends
/// on the host timezone. Both parts must be zero-padded.
pub fn combine(date: &str, time: &str) -> LabResult<NaiveDateTime> {
    let date_str = date.trim();
    let time_str = time.trim();

    if date_str.len() != 10 {
        return Err(LabError::InvalidInput(format!(
            "appointment date '{date}' must be YYYY-MM-DD"
        )));
    }
    if time_str.len() != 5 {
        return Err(LabError::InvalidInput(format!(
            "appointment time '{time}' must be HH:mm"
        )));
    }

    let date = NaiveDate::parse_from_str(date_str, APPOINTMENT_DATE_FORMAT).map_err(|e| {
        LabError::InvalidInput(format!("appointment date '{date_str}' is invalid: {e}"))
    })?;
    let time = NaiveTime::parse_from_str(time_str, APPOINTMENT_TIME_FORMAT).map_err(|e| {
        LabError::InvalidInput(format!("appointment time '{time_str}' is invalid: {e}"))
    })?;

    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn combines_fields_literally() {
        let at = combine("2024-03-10", "09:30").expect("valid");
        assert_eq!(
            (at.year(), at.month(), at.day(), at.hour(), at.minute(), at.second()),
            (2024, 3, 10, 9, 30, 0)
        );
        assert_eq!(at.to_string(), "2024-03-10 09:30:00");
    }

    #[test]
    fn same_inputs_give_same_output() {
        assert_eq!(
            combine("2024-03-10", "09:30").unwrap(),
            combine("2024-03-10", "09:30").unwrap()
        );
    }

    #[test]
    fn distinct_inputs_give_distinct_outputs() {
        let base = combine("2024-03-10", "09:30").unwrap();
        assert_ne!(base, combine("2024-03-11", "09:30").unwrap());
        assert_ne!(base, combine("2024-03-10", "09:31").unwrap());
        assert_ne!(base, combine("2024-03-10", "21:30").unwrap());
    }

    #[test]
    fn rejects_malformed_parts() {
        for (date, time) in [
            ("2024-3-10", "09:30"),
            ("10/03/2024", "09:30"),
            ("2024-02-30", "09:30"),
            ("2024-03-10", "9:30"),
            ("2024-03-10", "24:00"),
            ("2024-03-10", "09:30:00"),
            ("", ""),
        ] {
            let err = combine(date, time).expect_err("malformed input");
            assert!(
                matches!(err, LabError::InvalidInput(_)),
                "({date}, {time})"
            );
        }
    }
}
