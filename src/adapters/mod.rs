pub mod in_memory;
pub mod postgres_donation_repository;
pub mod postgres_transaction_repository;

pub use postgres_donation_repository::PostgresDonationRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
