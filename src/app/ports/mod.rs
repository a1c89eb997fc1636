pub mod database;
pub mod metadata;

pub use database::{ConnectionProvider, DbError, DbSession, RawColumn, RawResultSet};
pub use metadata::MetadataProvider;
#[cfg(test)]
pub use metadata::MockMetadataProvider;
