//! Advertiser-side owners: agencies, accounts, and the campaigns budgets fund.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Groups accounts; an agency-level credit covers every account it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
}

impl Agency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// An advertiser account. Its currency is the "local" currency of every
/// budget running on its campaigns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Stricter accounting mode: overlapping budgets share margin and fee,
    /// and freeing settles against the fee-and-margin inclusive total.
    #[serde(default)]
    pub uses_bcm_v2: bool,
}

impl Account {
    pub fn new(name: impl Into<String>, currency: CurrencyCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agency_id: None,
            currency,
            uses_bcm_v2: false,
        }
    }

    pub fn with_agency(mut self, agency_id: Uuid) -> Self {
        self.agency_id = Some(agency_id);
        self
    }

    pub fn with_bcm_v2(mut self, enabled: bool) -> Self {
        self.uses_bcm_v2 = enabled;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub account_id: Uuid,
    /// Lowering a running budget is only possible when the campaign-stop
    /// subsystem watches this campaign in real time.
    #[serde(default)]
    pub real_time_campaign_stop: bool,
}

impl Campaign {
    pub fn new(name: impl Into<String>, account_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            account_id,
            real_time_campaign_stop: false,
        }
    }

    pub fn with_real_time_campaign_stop(mut self, enabled: bool) -> Self {
        self.real_time_campaign_stop = enabled;
        self
    }
}

impl Identifiable for Agency {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identifiable for Account {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identifiable for Campaign {
    fn id(&self) -> Uuid {
        self.id
    }
}
