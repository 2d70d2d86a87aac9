use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day of realised spend for a budget, in the billing currency and in
/// the account's local currency. Rows are replaced wholesale by the
/// producing job, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyStatement {
    pub budget_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub media_spend_nano: i64,
    #[serde(default)]
    pub data_spend_nano: i64,
    #[serde(default)]
    pub license_fee_nano: i64,
    #[serde(default)]
    pub margin_nano: i64,
    #[serde(default)]
    pub local_media_spend_nano: i64,
    #[serde(default)]
    pub local_data_spend_nano: i64,
    #[serde(default)]
    pub local_license_fee_nano: i64,
    #[serde(default)]
    pub local_margin_nano: i64,
}

impl DailyStatement {
    pub fn new(budget_id: Uuid, date: NaiveDate) -> Self {
        Self {
            budget_id,
            date,
            media_spend_nano: 0,
            data_spend_nano: 0,
            license_fee_nano: 0,
            margin_nano: 0,
            local_media_spend_nano: 0,
            local_data_spend_nano: 0,
            local_license_fee_nano: 0,
            local_margin_nano: 0,
        }
    }

    pub fn with_billing_spend(mut self, media: i64, data: i64, license_fee: i64, margin: i64) -> Self {
        self.media_spend_nano = media;
        self.data_spend_nano = data;
        self.license_fee_nano = license_fee;
        self.margin_nano = margin;
        self
    }

    pub fn with_local_spend(mut self, media: i64, data: i64, license_fee: i64, margin: i64) -> Self {
        self.local_media_spend_nano = media;
        self.local_data_spend_nano = data;
        self.local_license_fee_nano = license_fee;
        self.local_margin_nano = margin;
        self
    }

    /// Same figures in both currencies, for accounts billed in their own currency.
    pub fn with_spend(self, media: i64, data: i64, license_fee: i64, margin: i64) -> Self {
        self.with_billing_spend(media, data, license_fee, margin)
            .with_local_spend(media, data, license_fee, margin)
    }

    pub fn local_effective_spend_nano(&self) -> i64 {
        self.local_media_spend_nano + self.local_data_spend_nano
    }
}
