pub mod error;
pub mod memory;
pub mod reader;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::ReportCache;
pub use reader::SubmissionReader;
pub use sqlite::SqliteStore;
pub use store::SubmissionStore;
