#![allow(dead_code)]

use std::path::Path;

use bcm_ledger::{
    bcm_core::{storage::BookStorage, FixedClock, LedgerContext},
    bcm_domain::{
        Account, Budget, Campaign, Credit, CreditOwner, CreditStatus, CurrencyCode,
        DailyStatement, LedgerBook,
    },
    LedgerManager,
};
use bcm_storage_json::{JsonBookStorage, StoragePaths};
use chrono::NaiveDate;
use uuid::Uuid;

pub const ACTOR: &str = "ops@example.com";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn context_on(today: NaiveDate) -> LedgerContext {
    LedgerContext::default().with_clock(FixedClock(today))
}

pub fn manager_in(root: &Path, today: NaiveDate) -> LedgerManager {
    let storage = JsonBookStorage::new(StoragePaths::under(root)).expect("json storage");
    LedgerManager::new(Box::new(storage), context_on(today))
}

/// Ids of the entities in [`january_book`].
pub struct Seeded {
    pub account_id: Uuid,
    pub campaign_id: Uuid,
    pub credit_id: Uuid,
    pub budget_id: Uuid,
}

/// A signed 1000 USD credit and a 400 USD January budget that spent 10 a day.
pub fn january_book(name: &str) -> (LedgerBook, Seeded) {
    let mut book = LedgerBook::new(name);
    let account_id =
        book.add_account(Account::new("Acme Retail", CurrencyCode::usd()).with_bcm_v2(true));
    let campaign_id = book.add_campaign(Campaign::new("Spring Launch", account_id));
    let mut credit = Credit::new(
        CreditOwner::Account(account_id),
        date(2024, 1, 1),
        date(2024, 12, 31),
        1_000,
        CurrencyCode::usd(),
    );
    credit.status = CreditStatus::Signed;
    let credit_id = book.add_credit(credit);
    let budget_id = book.add_budget(Budget::new(
        campaign_id,
        credit_id,
        date(2024, 1, 1),
        date(2024, 1, 31),
        400,
    ));
    for day in 1..=31 {
        book.record_statement(
            DailyStatement::new(budget_id, date(2024, 1, day)).with_spend(10_000_000_000, 0, 0, 0),
        );
    }
    (
        book,
        Seeded {
            account_id,
            campaign_id,
            credit_id,
            budget_id,
        },
    )
}

pub fn store_book(root: &Path, name: &str, book: &LedgerBook) {
    JsonBookStorage::new(StoragePaths::under(root))
        .expect("json storage")
        .save_book(name, book)
        .expect("save book");
}
