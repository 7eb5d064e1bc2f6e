pub mod count;
pub mod delete;
pub mod migrate;
pub mod pool;
pub mod populate;

pub use delete::{DeleteOutcome, DeleteRequest, ScanStrategy};
pub use migrate::{MigrateOptions, MigrationReport};
pub use populate::{PopulateOptions, PopulateOutcome};
