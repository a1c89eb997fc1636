use async_trait::async_trait;

use crate::domain::connection::ConnectionId;
use crate::domain::{ColumnMeta, TableName};

use super::DbError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Declared primary-key columns in key order; empty when none is declared.
    async fn primary_key_columns(
        &self,
        connection: &ConnectionId,
        table: &TableName,
    ) -> Result<Vec<String>, DbError>;

    async fn table_columns(
        &self,
        connection: &ConnectionId,
        table: &TableName,
    ) -> Result<Vec<ColumnMeta>, DbError>;
}
