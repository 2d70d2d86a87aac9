//! Roll-ups of daily spend statements into currency totals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bcm_domain::{money, DailyStatement, LedgerBook};

/// Inclusive date filter; an open side matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpendFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SpendFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn up_to(date: NaiveDate) -> Self {
        Self {
            start_date: None,
            end_date: Some(date),
        }
    }

    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Spend split by category, in billing and in local currency.
///
/// `et` is media + data, `etf` adds the license fee, `etfm` adds the margin.
/// Totals are always sums of the stored categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendTotals {
    pub media: Decimal,
    pub data: Decimal,
    pub license_fee: Decimal,
    pub margin: Decimal,
    pub et_total: Decimal,
    pub etf_total: Decimal,
    pub etfm_total: Decimal,
    pub local_media: Decimal,
    pub local_data: Decimal,
    pub local_license_fee: Decimal,
    pub local_margin: Decimal,
    pub local_et_total: Decimal,
    pub local_etf_total: Decimal,
    pub local_etfm_total: Decimal,
}

#[derive(Default)]
struct NanoAccumulator {
    media: i128,
    data: i128,
    license_fee: i128,
    margin: i128,
    local_media: i128,
    local_data: i128,
    local_license_fee: i128,
    local_margin: i128,
}

impl NanoAccumulator {
    fn add(&mut self, row: &DailyStatement) {
        self.media += row.media_spend_nano as i128;
        self.data += row.data_spend_nano as i128;
        self.license_fee += row.license_fee_nano as i128;
        self.margin += row.margin_nano as i128;
        self.local_media += row.local_media_spend_nano as i128;
        self.local_data += row.local_data_spend_nano as i128;
        self.local_license_fee += row.local_license_fee_nano as i128;
        self.local_margin += row.local_margin_nano as i128;
    }

    fn into_totals(self) -> SpendTotals {
        let media = money::nano_sum_to_decimal(self.media);
        let data = money::nano_sum_to_decimal(self.data);
        let license_fee = money::nano_sum_to_decimal(self.license_fee);
        let margin = money::nano_sum_to_decimal(self.margin);
        let local_media = money::nano_sum_to_decimal(self.local_media);
        let local_data = money::nano_sum_to_decimal(self.local_data);
        let local_license_fee = money::nano_sum_to_decimal(self.local_license_fee);
        let local_margin = money::nano_sum_to_decimal(self.local_margin);

        let et_total = media + data;
        let etf_total = et_total + license_fee;
        let local_et_total = local_media + local_data;
        let local_etf_total = local_et_total + local_license_fee;
        SpendTotals {
            media,
            data,
            license_fee,
            margin,
            et_total,
            etf_total,
            etfm_total: etf_total + margin,
            local_media,
            local_data,
            local_license_fee,
            local_margin,
            local_et_total,
            local_etf_total,
            local_etfm_total: local_etf_total + local_margin,
        }
    }
}

/// Read-only aggregation over [`DailyStatement`] rows.
pub struct SpendService;

impl SpendService {
    pub fn aggregate<'a>(
        statements: impl IntoIterator<Item = &'a DailyStatement>,
        filter: SpendFilter,
    ) -> SpendTotals {
        let mut acc = NanoAccumulator::default();
        for row in statements {
            if filter.matches(row.date) {
                acc.add(row);
            }
        }
        acc.into_totals()
    }

    pub fn budget_spend(book: &LedgerBook, budget_id: Uuid, filter: SpendFilter) -> SpendTotals {
        Self::budgets_spend(book, &[budget_id], filter)
    }

    pub fn budgets_spend(book: &LedgerBook, budget_ids: &[Uuid], filter: SpendFilter) -> SpendTotals {
        Self::aggregate(
            book.statements
                .iter()
                .filter(|row| budget_ids.contains(&row.budget_id)),
            filter,
        )
    }

    /// Spend across every budget drawing from the credit.
    pub fn credit_spend(book: &LedgerBook, credit_id: Uuid, filter: SpendFilter) -> SpendTotals {
        let budget_ids: Vec<Uuid> = book.budgets_of_credit(credit_id).map(|b| b.id).collect();
        Self::budgets_spend(book, &budget_ids, filter)
    }
}
