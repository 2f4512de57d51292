// src/ledger/dates.rs

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

// Passo de calendário. Meses usam a aritmética do chrono, que prende no
// último dia válido (31/01 + 1 mês = 28/02 ou 29/02), sem transbordar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStep {
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl DateStep {
    pub fn apply(self, date: NaiveDate) -> Option<NaiveDate> {
        self.apply_times(date, 1)
    }

    /// Aplica o passo `times` vezes a partir da âncora, sem acumular o
    /// "encolhimento" de fim de mês (31/01 -> 31/03, e não 29/03).
    pub fn apply_times(self, anchor: NaiveDate, times: u32) -> Option<NaiveDate> {
        match self {
            DateStep::Days(n) => anchor.checked_add_days(Days::new(u64::from(n) * u64::from(times))),
            DateStep::Weeks(n) => {
                anchor.checked_add_days(Days::new(u64::from(n) * 7 * u64::from(times)))
            }
            DateStep::Months(n) => anchor.checked_add_months(Months::new(n.checked_mul(times)?)),
        }
    }
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    DateStep::Months(months).apply(date)
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_step_clamps_to_end_of_month() {
        assert_eq!(add_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months(date(2024, 11, 30), 3), Some(date(2025, 2, 28)));
    }

    #[test]
    fn repeated_steps_from_anchor_do_not_drift() {
        let step = DateStep::Months(1);
        assert_eq!(step.apply_times(date(2024, 1, 31), 2), Some(date(2024, 3, 31)));
        assert_eq!(step.apply_times(date(2024, 1, 31), 0), Some(date(2024, 1, 31)));
    }

    #[test]
    fn week_and_day_steps() {
        assert_eq!(DateStep::Weeks(2).apply(date(2024, 1, 1)), Some(date(2024, 1, 15)));
        assert_eq!(DateStep::Days(3).apply_times(date(2024, 2, 27), 1), Some(date(2024, 3, 1)));
    }

    #[test]
    fn start_helpers() {
        assert_eq!(start_of_month(date(2024, 2, 17)), date(2024, 2, 1));
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 17, 45, 3).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
    }
}
