pub mod in_memory_payment_store;
pub mod postgres_payment_store;

pub use in_memory_payment_store::InMemoryPaymentStore;
pub use postgres_payment_store::PostgresPaymentStore;
