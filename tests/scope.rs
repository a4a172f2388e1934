use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bankload::{
    BankApp, BatchError, BatchFunction, LoadError, RequestScope, ScopeIdentity,
};
use futures::future;
use uuid::Uuid;

struct PerUserBatchFn;

#[async_trait]
impl BatchFunction<i64, i64> for PerUserBatchFn {
    type Context = Arc<HashMap<String, i64>>;
    type KeyContext = ();

    async fn load(
        keys: &[i64],
        _key_contexts: &HashMap<i64, ()>,
        identity: &ScopeIdentity,
        context: &Arc<HashMap<String, i64>>,
    ) -> Result<HashMap<i64, i64>, BatchError> {
        let user = identity.user_id().ok_or_else(|| BatchError::new("no user"))?;
        let value = context.get(user).copied().ok_or_else(|| BatchError::new("unknown user"))?;
        Ok(keys.iter().map(|k| (*k, value)).collect())
    }
}

#[tokio::test]
async fn concurrent_scopes_with_identical_keys_do_not_cross_contaminate() {
    let values = Arc::new(HashMap::from([("s1".to_owned(), 5), ("s2".to_owned(), 9)]));
    let s1 = RequestScope::new(PerUserBatchFn, Arc::clone(&values), ScopeIdentity::for_user("s1"));
    let s2 = RequestScope::new(PerUserBatchFn, Arc::clone(&values), ScopeIdentity::for_user("s2"));

    let (a, b) = future::join(s1.loader().load(1, ()), s2.loader().load(1, ())).await;
    assert_eq!(a, Ok(Some(5)));
    assert_eq!(b, Ok(Some(9)));
}

struct CountingBatchFn;

#[async_trait]
impl BatchFunction<i64, i64> for CountingBatchFn {
    type Context = Arc<AtomicU32>;
    type KeyContext = ();

    async fn load(
        keys: &[i64],
        _key_contexts: &HashMap<i64, ()>,
        _identity: &ScopeIdentity,
        batches: &Arc<AtomicU32>,
    ) -> Result<HashMap<i64, i64>, BatchError> {
        batches.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().map(|k| (*k, *k)).collect())
    }
}

#[tokio::test]
async fn scopes_never_share_a_batch_window() {
    let batches = Arc::new(AtomicU32::new(0));
    let s1 = RequestScope::new(CountingBatchFn, Arc::clone(&batches), ScopeIdentity::for_user("s1"));
    let s2 = RequestScope::new(CountingBatchFn, Arc::clone(&batches), ScopeIdentity::for_user("s2"));

    let (a, b) = future::join(s1.loader().load(7, ()), s2.loader().load(7, ())).await;
    assert_eq!(a, Ok(Some(7)));
    assert_eq!(b, Ok(Some(7)));
    // Same key, same instant, but one dispatch per scope.
    assert_eq!(batches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn a_scope_owns_exactly_one_loader() {
    let batches = Arc::new(AtomicU32::new(0));
    let scope = RequestScope::new(CountingBatchFn, batches, ScopeIdentity::anonymous());
    assert!(std::ptr::eq(scope.loader(), scope.loader()));
}

struct NeverBatchFn;

#[async_trait]
impl BatchFunction<i64, i64> for NeverBatchFn {
    type Context = ();
    type KeyContext = ();

    async fn load(
        _keys: &[i64],
        _key_contexts: &HashMap<i64, ()>,
        _identity: &ScopeIdentity,
        _context: &(),
    ) -> Result<HashMap<i64, i64>, BatchError> {
        future::pending::<()>().await;
        unreachable!("the batch never completes")
    }
}

#[tokio::test]
async fn ending_a_scope_cancels_pending_loads() {
    let scope = RequestScope::new(NeverBatchFn, (), ScopeIdentity::anonymous());
    let (outcome, ()) = future::join(scope.loader().load(1, ()), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        scope.end();
    })
    .await;
    assert_eq!(outcome, Err(LoadError::Cancelled));
}

#[tokio::test]
async fn loads_after_scope_end_fail_fast() {
    let batches = Arc::new(AtomicU32::new(0));
    let scope = RequestScope::new(CountingBatchFn, Arc::clone(&batches), ScopeIdentity::anonymous());
    assert_eq!(scope.loader().load(1, ()).await, Ok(Some(1)));

    scope.end();
    scope.end(); // idempotent
    assert_eq!(scope.loader().load(2, ()).await, Err(LoadError::ScopeEnded));
    assert_eq!(batches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loader_on_an_already_ended_scope_is_unusable() {
    let scope = RequestScope::new(NeverBatchFn, (), ScopeIdentity::anonymous());
    scope.end();
    assert_eq!(scope.loader().load(1, ()).await, Err(LoadError::ScopeEnded));
}

#[derive(Default)]
struct TeardownFlags {
    batch_started: AtomicBool,
    batch_dropped: AtomicBool,
}

struct TeardownGuard(Arc<TeardownFlags>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0.batch_dropped.store(true, Ordering::SeqCst);
    }
}

struct GuardedBatchFn;

#[async_trait]
impl BatchFunction<i64, i64> for GuardedBatchFn {
    type Context = Arc<TeardownFlags>;
    type KeyContext = ();

    async fn load(
        _keys: &[i64],
        _key_contexts: &HashMap<i64, ()>,
        _identity: &ScopeIdentity,
        flags: &Arc<TeardownFlags>,
    ) -> Result<HashMap<i64, i64>, BatchError> {
        flags.batch_started.store(true, Ordering::SeqCst);
        let _guard = TeardownGuard(Arc::clone(flags));
        future::pending::<()>().await;
        unreachable!("the batch never completes")
    }
}

// Dropping a scope without calling end() must tear the worker down exactly
// like an explicit end: the in-flight batch is dropped mid-await. (The
// caller-visible Cancelled on this path is asserted in
// ending_a_scope_cancels_pending_loads; drop and end share one
// implementation.)
#[tokio::test]
async fn dropping_a_scope_tears_down_its_worker() {
    let flags = Arc::new(TeardownFlags::default());
    {
        let scope =
            RequestScope::new(GuardedBatchFn, Arc::clone(&flags), ScopeIdentity::anonymous());
        let pending = scope.loader().load(1, ());
        assert!(tokio::time::timeout(Duration::from_millis(20), pending).await.is_err());
        assert!(flags.batch_started.load(Ordering::SeqCst));
        assert!(!flags.batch_dropped.load(Ordering::SeqCst));
    }
    // Give the runtime a chance to process the worker abort.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(flags.batch_dropped.load(Ordering::SeqCst));
}

// The demo scenario: two callers register {A, B} and {A, C} in one burst for
// user1; the balance service knows A and C only.
#[tokio::test]
async fn balance_scenario_one_batch_two_callers() {
    let app = BankApp::new();
    let scope = app.begin_request(ScopeIdentity::for_user("user1"));

    let a = app.bank_account(fixture_id("c6aa269a-812b-49d5-b178-a739a1ed74cc"));
    let b = app.bank_account(fixture_id("410f5919-e50b-4790-aae3-65d2d4b21c77"));
    let c = app.bank_account(fixture_id("48e4a484-af2c-4366-8cd4-25330597473f"));

    let caller1 = future::join(app.balance(&scope, &a), app.balance(&scope, &b));
    let caller2 = future::join(app.balance(&scope, &a), app.balance(&scope, &c));
    let ((c1_a, c1_b), (c2_a, c2_c)) = future::join(caller1, caller2).await;

    assert_eq!(c1_a, Ok(Some(1.00)));
    assert_eq!(c2_a, Ok(Some(1.00)));
    assert_eq!(c2_c, Ok(Some(23431.22)));
    // B was registered but the balance service does not know it: an absence,
    // delivered in the same dispatch as the hits.
    assert_eq!(c1_b, Ok(None));

    scope.end();
}

fn fixture_id(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap()
}
