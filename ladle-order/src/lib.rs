pub mod ledger;
pub mod memory;
pub mod models;
pub mod number;
pub mod repository;

pub use ledger::{CartLine, CheckoutRequest, FulfillmentProgress, LedgerConfig, OrderError, OrderLedger, TransitionError};
pub use memory::InMemoryOrderStore;
pub use models::{Address, Customer, Order, OrderItem, OrderStatus};
pub use repository::OrderRepository;
