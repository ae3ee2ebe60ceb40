//! Monthly MRR waterfall.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::SubscriptionEvent;

use super::replay::{chronological, LedgerReplay};
use super::{add_months, month_start_timestamp};

/// One calendar month of MRR movement, all values in cents.
///
/// `ending = starting + new + expansion - contraction - churned`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyMrr {
    pub month: NaiveDate,
    pub starting_cents: i64,
    pub new_cents: i64,
    pub expansion_cents: i64,
    pub contraction_cents: i64,
    pub churned_cents: i64,
    pub ending_cents: i64,
}

impl MonthlyMrr {
    fn opening(month: NaiveDate, starting_cents: i64) -> Self {
        Self {
            month,
            starting_cents,
            new_cents: 0,
            expansion_cents: 0,
            contraction_cents: 0,
            churned_cents: 0,
            ending_cents: starting_cents,
        }
    }

    fn record(&mut self, previous: i64, next: i64) {
        match (previous, next) {
            (p, n) if p == n => {}
            (0, n) => self.new_cents += n,
            (p, 0) => self.churned_cents += p,
            (p, n) if n > p => self.expansion_cents += n - p,
            (p, n) => self.contraction_cents += p - n,
        }
    }

    fn close(&mut self) {
        self.ending_cents = self.starting_cents + self.new_cents + self.expansion_cents
            - self.contraction_cents
            - self.churned_cents;
    }
}

/// Builds `months` consecutive months starting at `first_month`.
///
/// Entries before the window seed the first month's starting MRR; entries
/// after the last month are ignored.
pub fn build_waterfall(
    entries: &[SubscriptionEvent],
    first_month: NaiveDate,
    months: u32,
) -> Vec<MonthlyMrr> {
    let window_start = month_start_timestamp(first_month);
    let mut replay = LedgerReplay::new();
    let ordered = chronological(entries);
    let mut cursor = ordered.into_iter().peekable();

    while let Some(entry) = cursor.next_if(|e| e.created_at.is_before(&window_start)) {
        replay.apply(entry);
    }

    let mut waterfall = Vec::with_capacity(months as usize);
    let mut starting = replay.total_mrr_cents();

    for offset in 0..months {
        let month = add_months(first_month, offset);
        let month_end = month_start_timestamp(add_months(month, 1));
        let mut row = MonthlyMrr::opening(month, starting);

        while let Some(entry) = cursor.next_if(|e| e.created_at.is_before(&month_end)) {
            if let Some((previous, next)) = replay.apply(entry) {
                row.record(previous, next);
            }
        }

        row.close();
        starting = row.ending_cents;
        waterfall.push(row);
    }

    waterfall
}
