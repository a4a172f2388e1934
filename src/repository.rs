use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{BankAccount, Currency};

/// In-memory mock of the bank account store: a fixed list of accounts sorted
/// by id, which is what the cursor pagination pages over.
pub struct BankAccountRepository {
    accounts: Vec<BankAccount>,
}

impl Default for BankAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BankAccountRepository {
    pub fn new() -> Self {
        let mut accounts = vec![
            account("c6aa269a-812b-49d5-b178-a739a1ed74cc", Currency::Php, "2019-05-03T12:12:00+00:00"),
            account("410f5919-e50b-4790-aae3-65d2d4b21c77", Currency::Chf, "2020-12-03T10:15:30+00:00"),
            account("024bb503-5c0f-4d60-aa44-db19d87042f4", Currency::Chf, "2020-12-03T10:15:31+00:00"),
            account("48e4a484-af2c-4366-8cd4-25330597473f", Currency::Usd, "2007-08-07T19:01:22+04:00"),
        ];
        accounts.sort_by_key(|a| a.id);
        Self { accounts }
    }

    pub fn bank_accounts(&self) -> &[BankAccount] {
        &self.accounts
    }

    /// Accounts strictly after `id` in id order; the slice is empty when `id`
    /// is at or past the end.
    pub fn bank_accounts_after(&self, id: Uuid) -> &[BankAccount] {
        let start = self.accounts.partition_point(|account| account.id <= id);
        &self.accounts[start..]
    }
}

fn account(id: &str, currency: Currency, created_at: &str) -> BankAccount {
    BankAccount {
        id: Uuid::parse_str(id).expect("fixture account id"),
        currency,
        created_at: DateTime::parse_from_rfc3339(created_at)
            .expect("fixture account timestamp")
            .with_timezone(&Utc),
    }
}
