use tracing::warn;

use crate::query_classifier::{
    StatementKind, add_row_limit, classify, has_row_limit, mutating_keyword,
};
use crate::statement::{Statement, resolve_at, split};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    /// Run the buffer; only its first statement when it holds several
    Whole,
    /// Run the statement under this byte offset
    AtCursor(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Text to send, possibly with a row limit appended
    pub sql: String,
    pub statement: Statement,
    pub kind: StatementKind,
    pub mutating_keyword: Option<&'static str>,
    pub row_limit_applied: bool,
    /// Statements in the buffer that will not run
    pub skipped_statements: usize,
}

impl ExecutionPlan {
    /// Writes run only after the user confirms.
    pub fn needs_confirmation(&self) -> bool {
        self.kind.is_write()
    }
}

fn first_statement(buffer: &str) -> Option<(Statement, usize)> {
    let mut statements = split(buffer).into_iter();
    let first = statements.next()?;
    let skipped = statements.count();
    if skipped > 0 {
        warn!(skipped, "buffer holds several statements; running only the first");
    }
    Some((first, skipped))
}

/// Picks the statement to run, classifies it and caps unbounded reads at
/// `row_limit`. `None` when there is nothing to run.
pub fn plan_execution(
    buffer: &str,
    target: RunTarget,
    row_limit: Option<usize>,
) -> Option<ExecutionPlan> {
    let (statement, skipped_statements) = match target {
        RunTarget::Whole => first_statement(buffer)?,
        RunTarget::AtCursor(cursor) => {
            let resolved = resolve_at(buffer, cursor);
            // The resolver's whole-buffer fallback is not itself a statement
            if split(buffer).contains(&resolved) {
                (resolved, 0)
            } else {
                first_statement(buffer)?
            }
        }
    };

    let kind = classify(&statement.text);
    let (sql, row_limit_applied) = match row_limit {
        Some(limit) if kind == StatementKind::Read && !has_row_limit(&statement.text) => {
            (add_row_limit(&statement.text, limit), true)
        }
        _ => (statement.text.clone(), false),
    };

    Some(ExecutionPlan {
        sql,
        mutating_keyword: mutating_keyword(&statement.text),
        statement,
        kind,
        row_limit_applied,
        skipped_statements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_classifier::DEFAULT_ROW_LIMIT;

    #[test]
    fn whole_buffer_runs_first_statement_only() {
        let plan = plan_execution(
            "SELECT * FROM a; DELETE FROM b;",
            RunTarget::Whole,
            Some(DEFAULT_ROW_LIMIT),
        )
        .unwrap();

        assert_eq!(plan.sql, "SELECT * FROM a LIMIT 100");
        assert_eq!(plan.skipped_statements, 1);
        assert!(plan.row_limit_applied);
        assert!(!plan.needs_confirmation());
    }

    #[test]
    fn cursor_selects_write_statement() {
        let buffer = "SELECT 1;\nDELETE FROM b WHERE id = 3;";
        let cursor = buffer.find("DELETE").unwrap();

        let plan = plan_execution(buffer, RunTarget::AtCursor(cursor), Some(100)).unwrap();

        assert_eq!(plan.sql, "DELETE FROM b WHERE id = 3");
        assert_eq!(plan.kind, StatementKind::Write);
        assert_eq!(plan.mutating_keyword, Some("DELETE"));
        assert!(!plan.row_limit_applied);
        assert!(plan.needs_confirmation());
    }

    #[test]
    fn cursor_outside_any_statement_falls_back_to_first() {
        let buffer = "\n\nSELECT 1; SELECT 2";

        let plan = plan_execution(buffer, RunTarget::AtCursor(0), None).unwrap();

        assert_eq!(plan.sql, "SELECT 1");
        assert_eq!(plan.skipped_statements, 1);
    }

    #[test]
    fn existing_limit_is_kept() {
        let plan = plan_execution("SELECT * FROM t LIMIT 5", RunTarget::Whole, Some(100)).unwrap();

        assert_eq!(plan.sql, "SELECT * FROM t LIMIT 5");
        assert!(!plan.row_limit_applied);
    }

    #[test]
    fn no_row_limit_leaves_reads_unbounded() {
        let plan = plan_execution("SELECT * FROM t", RunTarget::Whole, None).unwrap();

        assert_eq!(plan.sql, "SELECT * FROM t");
    }

    #[test]
    fn empty_buffer_has_no_plan() {
        assert!(plan_execution("  -- nothing\n", RunTarget::Whole, Some(100)).is_none());
        assert!(plan_execution("   ", RunTarget::AtCursor(1), Some(100)).is_none());
    }
}
