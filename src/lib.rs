pub mod amount;
pub mod csv;
pub mod engine;
pub mod model;
pub mod store;

pub use amount::Amount;
pub use engine::Engine;
pub use model::{Account, AccountId, AccountType, Command, TransferReceipt, UserId};
pub use store::AccountStore;
