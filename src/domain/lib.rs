pub mod column;
pub mod connection;
pub mod history;
pub mod pg_type;
pub mod query_result;
pub mod row_change;
pub mod table;

pub use column::ColumnMeta;
pub use history::QueryHistoryItem;
pub use query_result::{CANCELLED_MESSAGE, QueryResult, ResultColumn, Row};
pub use row_change::{ModificationResult, RowChange, RowChangeKind};
pub use table::TableName;
