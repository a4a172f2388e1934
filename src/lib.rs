mod app;
mod balance;
mod batch_function;
mod cache;
mod connection;
mod domain;
mod error;
mod loader;
mod loader_op;
mod loader_worker;
mod publisher;
mod repository;
mod scope;
#[cfg(feature = "stats")]
mod stats;

pub use app::{BalanceScope, BankApp};
pub use balance::{BalanceBatchFn, BalanceService};
pub use batch_function::BatchFunction;
pub use connection::{decode_cursor, encode_cursor, Connection, Edge, PageInfo};
pub use domain::{Asset, BankAccount, Client, CreateBankAccountInput, Currency};
pub use error::{BatchError, CursorError, InputError, LoadError};
pub use loader::Loader;
pub use publisher::{AccountEvents, BankAccountPublisher};
pub use repository::BankAccountRepository;
pub use scope::{RequestScope, ScopeIdentity};
