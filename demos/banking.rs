use bankload::{BankApp, CreateBankAccountInput, ScopeIdentity};
use futures::future;

// Walks the demo end to end: page the mock accounts, resolve every balance
// through one request scope (a single batched service call), then run a
// mutation and watch it arrive on a subscription.
#[tokio::main]
async fn main() {
    let app = BankApp::new();

    let scope = app.begin_request(ScopeIdentity::for_user("user1"));
    let page = app.bank_accounts(4, None).expect("first page");

    let balances =
        future::join_all(page.edges.iter().map(|edge| app.balance(&scope, &edge.node))).await;
    for (edge, balance) in page.edges.iter().zip(balances) {
        match balance.expect("balance load") {
            Some(amount) => println!("{} ({:?}): {amount}", edge.node.id, edge.node.currency),
            None => println!("{} ({:?}): balance unknown", edge.node.id, edge.node.currency),
        }
    }
    scope.end();

    let mut events = app.subscribe();
    let input = CreateBankAccountInput { first_name: "Joem".to_owned(), age: 30 };
    let created = app.create_bank_account(&input).expect("valid input");
    let event = events.recv().await.expect("subscription event");
    assert_eq!(event.id, created.id);
    println!("created bank account {}", created.id);
}
