use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::InputError;

/// Currencies the toy bank deals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    /// Swiss Franc
    Chf,
    /// United States Dollar
    Usd,
    /// Philippine Peso
    Php,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub id: Uuid,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// A client of the bank. Mocked; resolved per account by the application
/// facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub middle_names: Vec<String>,
    pub last_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub id: Uuid,
}

/// Input for the create-bank-account mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBankAccountInput {
    pub first_name: String,
    pub age: u32,
}

impl CreateBankAccountInput {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.first_name.trim().is_empty() {
            return Err(InputError::BlankFirstName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_first_name_is_rejected() {
        let input = CreateBankAccountInput { first_name: "  ".to_owned(), age: 30 };
        assert_eq!(input.validate(), Err(InputError::BlankFirstName));
        let input = CreateBankAccountInput { first_name: "Joem".to_owned(), age: 30 };
        assert_eq!(input.validate(), Ok(()));
    }
}
