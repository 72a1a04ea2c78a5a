use chrono::{Datelike, Duration, NaiveDate};

/// First day of the month `date` belongs to.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_month_start() {
        let date = NaiveDate::from_ymd_opt(2001, 1, 7).unwrap();
        assert_eq!(month_start(date), NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
        assert_eq!(month_start(month_start(date)), month_start(date));
        let leap = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(month_start(leap), NaiveDate::from_ymd_opt(2000, 2, 1).unwrap());
    }
}
