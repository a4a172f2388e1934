use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    batch_function::BatchFunction, domain::BankAccount, error::BatchError, scope::ScopeIdentity,
};

/// Mock of the downstream balance service.
///
/// One batched call per request resolves every account balance the response
/// needs; the service only knows about two accounts and stays silent about
/// the rest, which callers observe as an absent balance.
pub struct BalanceService {
    known_balances: HashMap<Uuid, f64>,
}

impl Default for BalanceService {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceService {
    pub fn new() -> Self {
        let known_balances = HashMap::from([
            (fixture_id("c6aa269a-812b-49d5-b178-a739a1ed74cc"), 1.00),
            (fixture_id("48e4a484-af2c-4366-8cd4-25330597473f"), 23431.22),
        ]);
        Self { known_balances }
    }

    /// Balances for the requested accounts. The contexts carry the full
    /// entities being resolved, not just the ids.
    pub fn balances_for(
        &self,
        accounts: &HashMap<Uuid, BankAccount>,
        identity: &ScopeIdentity,
    ) -> HashMap<Uuid, f64> {
        tracing::info!(
            account_ids = ?accounts.keys().collect::<Vec<_>>(),
            user_id = identity.user_id().unwrap_or("<anonymous>"),
            correlation_id = %identity.correlation_id(),
            "requesting balances"
        );
        accounts
            .keys()
            .filter_map(|id| self.known_balances.get(id).map(|balance| (*id, *balance)))
            .collect()
    }
}

fn fixture_id(id: &str) -> Uuid {
    Uuid::parse_str(id).expect("fixture account id")
}

/// Batch function collapsing all balance lookups registered during one
/// resolution pass into a single [`BalanceService`] call.
pub struct BalanceBatchFn;

#[async_trait]
impl BatchFunction<Uuid, f64> for BalanceBatchFn {
    type Context = Arc<BalanceService>;
    type KeyContext = BankAccount;

    async fn load(
        keys: &[Uuid],
        key_contexts: &HashMap<Uuid, BankAccount>,
        identity: &ScopeIdentity,
        service: &Arc<BalanceService>,
    ) -> Result<HashMap<Uuid, f64>, BatchError> {
        tracing::debug!(batch_size = keys.len(), "loading balances");
        Ok(service.balances_for(key_contexts, identity))
    }
}
