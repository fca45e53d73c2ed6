//! End-to-end tests: script text in, connection call log and reported outcome out.

use open_mainframe_sqlscript::{
    Call, MockConnection, Outcome, ParseError, QueryResult, ScriptError, SqlError, SqlScript,
    StatementKind,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("open_mainframe_sqlscript=debug,sqlscript::debug=info")
        .try_init();
}

/// Run `source` against `conn` and return (exec result, outcome, error statement).
fn run(source: &str, conn: &mut MockConnection, outer: bool) -> (bool, Outcome, String) {
    init_tracing();
    let mut script = SqlScript::new(source, conn);
    let ok = script.exec(outer);
    (ok, script.outcome(), script.last_error_statement().to_string())
}

// ─────── Plain SQL ───────

#[test]
fn test_plain_script_runs_in_source_order() {
    let mut conn = MockConnection::new();
    let (ok, outcome, stmt) = run(
        "CREATE TABLE t (x INT);\nINSERT INTO t VALUES (1);\nINSERT INTO t VALUES ('a;b');",
        &mut conn,
        false,
    );
    assert!(ok);
    assert_eq!(outcome, Outcome::Success);
    assert!(stmt.is_empty());
    assert_eq!(
        conn.executed(),
        vec![
            "CREATE TABLE t (x INT)",
            "INSERT INTO t VALUES (1)",
            "INSERT INTO t VALUES ('a;b')"
        ]
    );
}

#[test]
fn test_plain_script_reports_first_failure() {
    let mut conn = MockConnection::new();
    conn.fail_on(
        "nosuch",
        SqlError::statement(-204, "NOSUCH is an undefined name").with_sqlstate("42704"),
    );
    let mut script = SqlScript::new(
        "SELECT 1;\nSELECT * FROM nosuch;\nSELECT * FROM nosuch2;",
        &mut conn,
    );
    assert!(!script.exec(false));
    assert_eq!(script.last_error_statement(), "SELECT * FROM nosuch");
    let sql_error = script.last_error().and_then(ScriptError::sql_error).cloned();
    assert_eq!(sql_error.map(|e| e.sqlstate), Some("42704".to_string()));
    drop(script);
    assert_eq!(conn.executed().len(), 2);
}

// ─────── Conditionals ───────

#[test]
fn test_if_true_runs_only_first_branch() {
    let mut conn = MockConnection::new();
    let (ok, _, _) = run(
        "--if 1\nINSERT INTO t VALUES (1);\n--else\nINSERT INTO t VALUES (2);\n--endif",
        &mut conn,
        false,
    );
    assert!(ok);
    assert_eq!(conn.executed(), vec!["INSERT INTO t VALUES (1)"]);
}

#[test]
fn test_exactly_one_branch_per_chain() {
    let source = "--if SELECT flag_a\nSELECT 'a';\n--elseif SELECT flag_b\nSELECT 'b';\n--else\nSELECT 'c';\n--endif";
    let cases: [(i64, i64, &str); 4] = [
        (1, 1, "SELECT 'a'"),
        (1, 0, "SELECT 'a'"),
        (0, 1, "SELECT 'b'"),
        (0, 0, "SELECT 'c'"),
    ];
    for (a, b, expected) in cases {
        let mut conn = MockConnection::new();
        conn.add_result("flag_a", QueryResult::scalar(a));
        conn.add_result("flag_b", QueryResult::scalar(b));
        let (ok, _, _) = run(source, &mut conn, false);
        assert!(ok);
        let bodies: Vec<&str> = conn
            .executed()
            .into_iter()
            .filter(|sql| sql.starts_with("SELECT '"))
            .collect();
        assert_eq!(bodies, vec![expected], "flags a={a} b={b}");
    }
}

#[test]
fn test_nested_conditionals() {
    let mut conn = MockConnection::new();
    let (ok, _, _) = run(
        "--if 1\n--if 0\nSELECT 'inner';\n--else\nSELECT 'inner-else';\n--endif\nSELECT 'outer';\n--else\nSELECT 'no';\n--endif",
        &mut conn,
        false,
    );
    assert!(ok);
    assert_eq!(conn.executed(), vec!["SELECT 'inner-else'", "SELECT 'outer'"]);
}

// ─────── Try / catch ───────

#[test]
fn test_try_catch_handles_failure() {
    let mut conn = MockConnection::new().failing("missing_table");
    let (ok, outcome, _) = run(
        "--try\nDELETE FROM missing_table;\n--catch\nSELECT 'handled';\n--endtry",
        &mut conn,
        false,
    );
    assert!(ok);
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(
        conn.executed(),
        vec!["DELETE FROM missing_table", "SELECT 'handled'"]
    );
}

#[test]
fn test_try_transaction_rolls_back_then_catches() {
    let mut conn = MockConnection::new().failing("bad");
    let (ok, _, _) = run(
        "--trytransaction\nUPDATE t SET x=1;\nUPDATE bad SET x=1;\n--catch\n--endtry",
        &mut conn,
        false,
    );
    assert!(ok);
    assert_eq!(
        conn.calls,
        vec![
            Call::Begin,
            Call::Execute("UPDATE t SET x=1".into()),
            Call::Execute("UPDATE bad SET x=1".into()),
            Call::Rollback,
        ]
    );
}

#[test]
fn test_try_transaction_result_follows_catch_body() {
    let mut conn = MockConnection::new().failing("bad");
    let (ok, outcome, stmt) = run(
        "--trytransaction\nUPDATE bad SET x=1;\n--catch\nINSERT INTO bad_log VALUES (1);\n--endtry",
        &mut conn,
        false,
    );
    assert!(!ok);
    assert_eq!(outcome, Outcome::RuntimeError);
    assert_eq!(stmt, "INSERT INTO bad_log VALUES (1)");
    assert_eq!(conn.count(&Call::Rollback), 1);
    assert_eq!(conn.depth, 0);
}

// ─────── Transactions ───────

#[test]
fn test_outer_transaction_rolled_back_on_uncaught_failure() {
    let mut conn = MockConnection::new().failing("boom");
    let (ok, outcome, stmt) = run(
        "INSERT INTO t VALUES (1);\n--begin\nINSERT INTO t VALUES (2);\nSELECT boom;\n--endtransaction\nINSERT INTO t VALUES (3);",
        &mut conn,
        true,
    );
    assert!(!ok);
    assert_eq!(outcome, Outcome::RuntimeError);
    assert_eq!(stmt, "SELECT boom");
    assert_eq!(conn.calls.first(), Some(&Call::Begin));
    assert_eq!(conn.count(&Call::Commit), 0);
    assert_eq!(conn.count(&Call::Rollback), 2);
    assert_eq!(conn.calls.last(), Some(&Call::Rollback));
    assert_eq!(conn.depth, 0);
}

#[test]
fn test_outer_transaction_committed_after_recovered_failure() {
    let mut conn = MockConnection::new().failing("boom");
    let (ok, _, _) = run(
        "--try\nSELECT boom;\n--catch\n--endtry\nINSERT INTO t VALUES (1);",
        &mut conn,
        true,
    );
    assert!(ok);
    assert_eq!(conn.calls.first(), Some(&Call::Begin));
    assert_eq!(conn.calls.last(), Some(&Call::Commit));
    assert_eq!(conn.count(&Call::Rollback), 0);
}

#[test]
fn test_outer_commit_failure_rolls_back() {
    let mut conn = MockConnection::new();
    conn.fail_commit = Some(SqlError::transaction("could not serialize access"));
    let mut script = SqlScript::new("INSERT INTO t VALUES (1);", &mut conn);
    assert!(!script.exec(true));
    assert!(matches!(
        script.last_error(),
        Some(ScriptError::Transaction { .. })
    ));
    drop(script);
    assert_eq!(
        conn.calls,
        vec![
            Call::Begin,
            Call::Execute("INSERT INTO t VALUES (1)".into()),
            Call::Commit,
            Call::Rollback,
        ]
    );
}

// ─────── Parse errors ───────

#[test]
fn test_mismatched_nesting_never_touches_connection() {
    let sources = [
        "SELECT 1; --endif",
        "--else\nSELECT 1;",
        "--try\nSELECT 1;\n--endtry",
        "--catch",
        "--if 1\n--else\n--else\n--endif",
        "--begin\nSELECT 1;",
        "--if 1\nSELECT 1;",
        "SELECT 'unterminated;",
        "SELECT 1; /* open comment",
    ];
    for source in sources {
        let mut conn = MockConnection::new();
        let (ok, outcome, stmt) = run(source, &mut conn, true);
        assert!(!ok, "{source:?} should fail");
        assert_eq!(outcome, Outcome::ParseError, "{source:?}");
        assert!(!stmt.is_empty(), "{source:?} should report a statement");
        assert!(conn.calls.is_empty(), "{source:?} touched the connection");
    }
}

#[test]
fn test_parse_error_is_last_statement() {
    let script = SqlScript::new(
        "SELECT 1;\n--endtry\nSELECT 2;\n--if 1\n",
        MockConnection::new(),
    );
    let program = script.program();
    assert_eq!(program.len(), 2);
    assert_eq!(
        program.statements().last().map(|s| s.kind),
        Some(StatementKind::ParseError)
    );
    assert!(matches!(program.parse_error(), Some(ParseError::Unmatched { line: 2, .. })));
}

// ─────── Program shape ───────

#[test]
fn test_targets_always_in_range() {
    let sources = [
        "--if 1\n--elseif 2\n--elseif 3\n--else\n--endif",
        "--try\n--if 1\n--try\n--catch\n--endtry\n--endif\n--catch\n--trytransaction\n--catch\n--endtry\n--endtry",
        "--begin\n--if a\nSELECT 1;\n--else\n--begin\n--endtransaction\n--endif\n--endtransaction",
        "SELECT 1;\n--debug x\nSELECT 2;",
    ];
    for source in sources {
        let script = SqlScript::new(source, MockConnection::new());
        let program = script.program();
        assert!(program.is_executable(), "{source:?}: {:?}", program.parse_error());
        for stmt in program.statements() {
            if stmt.kind.has_target() {
                let target = stmt.target.expect("branch directive without target");
                assert!(target < program.len());
                assert!(target > program.statements().iter().position(|s| s == stmt).unwrap_or(0));
            } else {
                assert_eq!(stmt.target, None);
            }
        }
    }
}

#[test]
fn test_debug_directive_does_not_change_flow() {
    let mut conn = MockConnection::new();
    let mut script = SqlScript::new(
        "--debug start\nSELECT 1;\n--if 0\n--debug hidden\n--endif\n--debug end",
        &mut conn,
    );
    assert!(script.exec(false));
    assert_eq!(script.debug_messages(), &["start".to_string(), "end".to_string()]);
    drop(script);
    assert_eq!(conn.executed(), vec!["SELECT 1"]);
}
