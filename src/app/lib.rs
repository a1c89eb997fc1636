pub use pgscribe_domain as domain;

pub mod execution;
pub mod execution_plan;
pub mod ports;
pub mod primary_key;
pub mod query_classifier;
pub mod query_history;
pub mod reconciler;
pub mod sql_lexer;
pub mod statement;
pub mod value_coercion;
pub mod write_statement;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use execution::{ExecuteError, QueryOrchestrator, QueryStatus};
pub use execution_plan::{ExecutionPlan, RunTarget, plan_execution};
pub use query_history::{HISTORY_CAPACITY, HistoryEvent, QueryHistory};
pub use reconciler::RowChangeReconciler;
