//! Statement splitting and cursor resolution over a SQL buffer.

use crate::sql_lexer::scan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Whitespace-trimmed statement text, without its terminating semicolon
    pub text: String,
    /// Byte offset of `text` in the buffer
    pub start: usize,
    /// Byte offset one past the end of `text`
    pub end: usize,
    /// Byte offset of the terminating semicolon, if the statement had one
    pub terminator: Option<usize>,
}

impl Statement {
    fn from_range(buffer: &str, start: usize, end: usize, terminator: Option<usize>) -> Self {
        Self {
            text: buffer[start..end].to_string(),
            start,
            end,
            terminator,
        }
    }
}

/// Splits `buffer` at semicolons that sit outside strings and comments.
///
/// Segments that hold nothing but whitespace or comments are dropped; a final
/// segment without a semicolon is kept when it has content.
pub fn split(buffer: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut first_content: Option<usize> = None;
    let mut last_content_end = 0;
    let mut has_sql = false;

    for sc in scan(buffer) {
        if sc.is_live() && sc.ch == ';' {
            if has_sql && let Some(start) = first_content {
                statements.push(Statement::from_range(
                    buffer,
                    start,
                    last_content_end,
                    Some(sc.offset),
                ));
            }
            first_content = None;
            has_sql = false;
            continue;
        }

        if sc.ch.is_whitespace() {
            continue;
        }

        first_content.get_or_insert(sc.offset);
        last_content_end = sc.offset + sc.ch.len_utf8();
        if !sc.state.is_comment() {
            has_sql = true;
        }
    }

    if has_sql && let Some(start) = first_content {
        statements.push(Statement::from_range(buffer, start, last_content_end, None));
    }

    statements
}

/// Finds the statement under `cursor` (a byte offset).
///
/// Each statement owns the span from its first character up to where the
/// next statement begins, so the semicolon and the whitespace after it
/// resolve to the statement they close. A cursor before the first statement
/// or past the end of the buffer resolves to the whole buffer.
pub fn resolve_at(buffer: &str, cursor: usize) -> Statement {
    let statements = split(buffer);

    for (idx, statement) in statements.iter().enumerate() {
        let span_end = statements
            .get(idx + 1)
            .map_or(buffer.len() + 1, |next| next.start);
        if (statement.start..span_end).contains(&cursor) {
            return statement.clone();
        }
    }

    whole_buffer(buffer)
}

fn whole_buffer(buffer: &str) -> Statement {
    let trimmed_start = buffer.len() - buffer.trim_start().len();
    let trimmed_end = buffer.trim_end().len().max(trimmed_start);
    Statement::from_range(buffer, trimmed_start, trimmed_end, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn texts(buffer: &str) -> Vec<String> {
        split(buffer).into_iter().map(|s| s.text).collect()
    }

    mod split {
        use super::*;

        #[test]
        fn two_terminated_statements() {
            assert_eq!(texts("SELECT 1; SELECT 2;"), vec!["SELECT 1", "SELECT 2"]);
        }

        #[test]
        fn semicolon_in_string_is_not_a_boundary() {
            assert_eq!(
                texts("INSERT INTO t(x) VALUES (';')"),
                vec!["INSERT INTO t(x) VALUES (';')"]
            );
        }

        #[rstest]
        #[case("SELECT 1 -- a;b\n; SELECT 2", vec!["SELECT 1 -- a;b", "SELECT 2"])]
        #[case("SELECT /* ; */ 1; SELECT 2", vec!["SELECT /* ; */ 1", "SELECT 2"])]
        #[case("SELECT \"a;b\" FROM t;", vec!["SELECT \"a;b\" FROM t"])]
        #[case("CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql; SELECT f()",
            vec!["CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql", "SELECT f()"])]
        fn inert_semicolons_are_skipped(#[case] buffer: &str, #[case] expected: Vec<&str>) {
            assert_eq!(texts(buffer), expected);
        }

        #[rstest]
        #[case(";;  ;\n;")]
        #[case("   \n\t ")]
        #[case("")]
        #[case("-- only a comment\n;")]
        fn empty_segments_are_dropped(#[case] buffer: &str) {
            assert!(split(buffer).is_empty());
        }

        #[test]
        fn trailing_statement_without_semicolon_is_kept() {
            assert_eq!(texts("SELECT 1;\n  SELECT 2  \n"), vec!["SELECT 1", "SELECT 2"]);
        }

        #[test]
        fn leading_comment_belongs_to_statement() {
            assert_eq!(
                texts("-- fetch users\nSELECT * FROM users;"),
                vec!["-- fetch users\nSELECT * FROM users"]
            );
        }

        #[test]
        fn offsets_point_into_buffer() {
            let buffer = "  SELECT 1 ;  SELECT 2";
            let statements = split(buffer);
            assert_eq!(statements[0].start, 2);
            assert_eq!(statements[0].end, 10);
            assert_eq!(statements[0].terminator, Some(11));
            assert_eq!(&buffer[statements[1].start..statements[1].end], "SELECT 2");
            assert_eq!(statements[1].terminator, None);
        }

        #[test]
        fn no_statement_contains_a_live_semicolon() {
            let buffer = "SELECT ';'; UPDATE t SET a = 'x;y' /* ; */; DELETE FROM t";
            for statement in split(buffer) {
                let live_semicolons = scan(&statement.text)
                    .into_iter()
                    .filter(|c| c.is_live() && c.ch == ';')
                    .count();
                assert_eq!(live_semicolons, 0, "{}", statement.text);
            }
        }

        #[test]
        fn rejoining_reproduces_the_statement_sequence() {
            let buffer = "SELECT 1;\n\nUPDATE t SET a = ';';   DELETE FROM t";
            let joined = texts(buffer).join("; ");
            assert_eq!(texts(&joined), texts(buffer));
        }
    }

    mod resolve_at {
        use super::*;

        #[rstest]
        #[case(0, "SELECT 1")]
        #[case(8, "SELECT 1")]
        #[case(9, "SELECT 1")]
        #[case(10, "SELECT 2")]
        #[case(12, "SELECT 2")]
        #[case(19, "SELECT 2")]
        fn cursor_maps_to_owning_statement(#[case] cursor: usize, #[case] expected: &str) {
            assert_eq!(resolve_at("SELECT 1; SELECT 2;", cursor).text, expected);
        }

        #[test]
        fn cursor_past_end_falls_back_to_whole_buffer() {
            let statement = resolve_at("SELECT 1; SELECT 2;", 500);
            assert_eq!(statement.text, "SELECT 1; SELECT 2;");
        }

        #[test]
        fn cursor_in_leading_whitespace_falls_back_to_whole_buffer() {
            let statement = resolve_at("\n\nSELECT 1; SELECT 2", 0);
            assert_eq!(statement.text, "SELECT 1; SELECT 2");
            assert_eq!(statement.start, 2);
        }

        #[test]
        fn empty_buffer_resolves_to_empty_statement() {
            let statement = resolve_at("   ", 1);
            assert!(statement.text.is_empty());
        }

        #[test]
        fn multiline_buffer_resolves_middle_statement() {
            let buffer = "SELECT 1;\nUPDATE t SET a = 1;\nSELECT 3;";
            let cursor = buffer.find("SET").unwrap();
            assert_eq!(resolve_at(buffer, cursor).text, "UPDATE t SET a = 1");
        }
    }
}
