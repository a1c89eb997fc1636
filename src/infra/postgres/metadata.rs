use async_trait::async_trait;

use crate::app::ports::{DbError, MetadataProvider};
use crate::domain::connection::ConnectionId;
use crate::domain::{ColumnMeta, TableName};

use super::PgConnectionProvider;
use super::decode::map_error;

const PRIMARY_KEY_QUERY: &str = "
    SELECT kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
      AND tc.table_schema = kcu.table_schema
      AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = $1
      AND tc.table_name = $2
    ORDER BY kcu.ordinal_position";

const COLUMNS_QUERY: &str = "
    SELECT column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position";

#[async_trait]
impl MetadataProvider for PgConnectionProvider {
    async fn primary_key_columns(
        &self,
        connection: &ConnectionId,
        table: &TableName,
    ) -> Result<Vec<String>, DbError> {
        let session = self.checkout(connection).await?;
        let rows = session
            .client()?
            .query(PRIMARY_KEY_QUERY, &[&table.schema_or_default(), &table.name])
            .await
            .map_err(map_error)?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(map_error))
            .collect()
    }

    async fn table_columns(
        &self,
        connection: &ConnectionId,
        table: &TableName,
    ) -> Result<Vec<ColumnMeta>, DbError> {
        let session = self.checkout(connection).await?;
        let rows = session
            .client()?
            .query(COLUMNS_QUERY, &[&table.schema_or_default(), &table.name])
            .await
            .map_err(map_error)?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(map_error)?;
                let data_type: String = row.try_get(1).map_err(map_error)?;
                Ok(ColumnMeta::new(name, data_type))
            })
            .collect()
    }
}
