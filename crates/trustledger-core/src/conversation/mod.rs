pub mod dispatcher;
pub mod memory;
pub mod store;
pub mod types;

pub use dispatcher::{Dispatcher, LedgerStore};
pub use memory::MemoryStateStore;
pub use store::{RedisStateStore, StateStore};
pub use types::{ConversationState, ExpenseContext, StateEntry};
