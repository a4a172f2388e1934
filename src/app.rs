use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    balance::{BalanceBatchFn, BalanceService},
    connection::{decode_cursor, encode_cursor, Connection},
    domain::{Asset, BankAccount, Client, CreateBankAccountInput, Currency},
    error::{CursorError, InputError, LoadError},
    publisher::{AccountEvents, BankAccountPublisher},
    repository::BankAccountRepository,
    scope::{RequestScope, ScopeIdentity},
};

/// Per-request scope wired for balance loading: account id keys, balance
/// values, the full account as key context.
pub type BalanceScope = RequestScope<Uuid, f64, BankAccount>;

/// In-process stand-in for the GraphQL resolver layer: queries against the
/// mock repository, mutations that publish subscription events, and batched
/// balance resolution through a per-request scope.
///
/// The surrounding request layer is expected to call [`BankApp::begin_request`]
/// once per logical operation and end (or drop) the returned scope when the
/// operation completes, including on error and cancellation paths.
pub struct BankApp {
    repository: BankAccountRepository,
    publisher: BankAccountPublisher,
    balances: Arc<BalanceService>,
}

impl Default for BankApp {
    fn default() -> Self {
        Self::new()
    }
}

impl BankApp {
    pub fn new() -> Self {
        Self {
            repository: BankAccountRepository::new(),
            publisher: BankAccountPublisher::new(),
            balances: Arc::new(BalanceService::new()),
        }
    }

    /// Opens the scope for one logical request. Balance lookups made through
    /// this scope coalesce into batched [`BalanceService`] calls and never
    /// share state with other scopes.
    pub fn begin_request(&self, identity: ScopeIdentity) -> BalanceScope {
        RequestScope::new(BalanceBatchFn, Arc::clone(&self.balances), identity)
    }

    /// Single-account query. Mocked: answers any id with a PHP account, the
    /// way the original demo resolver does.
    pub fn bank_account(&self, id: Uuid) -> BankAccount {
        tracing::info!(%id, "retrieving bank account");
        BankAccount { id, currency: Currency::Php, created_at: Utc::now() }
    }

    /// Cursor-paginated account listing over the repository.
    pub fn bank_accounts(
        &self,
        first: usize,
        after: Option<&str>,
    ) -> Result<Connection<BankAccount>, CursorError> {
        let accounts = match after {
            None => self.repository.bank_accounts(),
            Some(cursor) => self.repository.bank_accounts_after(decode_cursor(cursor)?),
        };
        Ok(Connection::paginate(accounts.iter().cloned(), first, after.is_some(), |account| {
            encode_cursor(account.id)
        }))
    }

    /// Resolves one account's balance through the scope's batch loader.
    ///
    /// Every balance requested while resolving one response registers here;
    /// the scope's worker collapses them into one downstream call. `Ok(None)`
    /// means the balance service does not know the account.
    pub async fn balance(
        &self,
        scope: &BalanceScope,
        account: &BankAccount,
    ) -> Result<Option<f64>, LoadError> {
        scope.loader().load(account.id, account.clone()).await
    }

    /// Client owning the account. Mocked with fixed data.
    pub fn client(&self, account: &BankAccount) -> Client {
        tracing::info!(account_id = %account.id, "requesting client data");
        Client {
            id: Uuid::new_v4(),
            first_name: "Elias".to_owned(),
            middle_names: Vec::new(),
            last_name: "Wrubel".to_owned(),
        }
    }

    /// Assets held by the account. Mocked empty.
    pub fn assets(&self, account: &BankAccount) -> Vec<Asset> {
        tracing::info!(account_id = %account.id, "requesting assets");
        Vec::new()
    }

    /// Create-account mutation; the new account is published to subscribers.
    pub fn create_bank_account(
        &self,
        input: &CreateBankAccountInput,
    ) -> Result<BankAccount, InputError> {
        input.validate()?;
        tracing::info!(first_name = %input.first_name, age = input.age, "creating bank account");
        Ok(self.touch_account(Uuid::new_v4()))
    }

    /// Update-account mutation; the touched account is published to
    /// subscribers.
    pub fn update_bank_account(&self, id: Uuid, name: &str, age: u32) -> BankAccount {
        tracing::info!(%id, name, age, "updating bank account");
        self.touch_account(id)
    }

    /// Subscription to all account events.
    pub fn subscribe(&self) -> AccountEvents {
        self.publisher.subscribe()
    }

    /// Subscription to events for a single account.
    pub fn subscribe_to(&self, id: Uuid) -> AccountEvents {
        self.publisher.subscribe_to(id)
    }

    fn touch_account(&self, id: Uuid) -> BankAccount {
        let account = BankAccount { id, currency: Currency::Php, created_at: Utc::now() };
        self.publisher.publish(account.clone());
        account
    }
}
