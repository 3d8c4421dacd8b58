use super::*;
use crate::config::RoleOverrides;
use crate::dialect::{Mysql, Sqlite, SqlServer};
use crate::driver::{RecordingDriver, RecordingHandle};
use crate::error::DbError;
use crate::log::MemoryLogger;

fn sqlite() -> (Connection, RecordingHandle) {
    let driver = RecordingDriver::new(Arc::new(Sqlite::new()));
    let handle = driver.handle();
    (Connection::new(Box::new(driver)), handle)
}

fn with_savepoints(dialect: Arc<dyn Dialect>) -> (Connection, RecordingHandle) {
    let driver = RecordingDriver::new(dialect);
    let handle = driver.handle();
    let conn = Connection::builder(Box::new(driver)).savepoints(true).build();
    (conn, handle)
}

// ==================== Transactions ====================

#[test]
fn begin_and_commit_issue_real_commands() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    assert!(conn.in_transaction());
    assert_eq!(conn.transaction_level(), 0);
    assert!(conn.commit().unwrap());
    assert!(!conn.in_transaction());
    assert_eq!(handle.sql_log(), vec!["BEGIN", "COMMIT"]);
}

#[test]
fn commit_and_rollback_without_transaction_are_noops() {
    let (conn, handle) = sqlite();
    assert!(!conn.commit().unwrap());
    assert!(!conn.rollback(None).unwrap());
    assert!(handle.sql_log().is_empty());
}

#[test]
fn nested_levels_without_savepoints_are_bookkeeping() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    conn.begin().unwrap();
    assert_eq!(conn.transaction_level(), 1);
    assert!(conn.commit().unwrap());
    assert_eq!(conn.transaction_level(), 0);
    assert!(conn.in_transaction());
    conn.commit().unwrap();
    assert_eq!(handle.sql_log(), vec!["BEGIN", "COMMIT"]);
}

#[test]
fn nested_rollback_without_savepoints_rolls_back_everything_by_default() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    conn.begin().unwrap();
    assert!(conn.rollback(None).unwrap());
    assert!(!conn.in_transaction());
    assert_eq!(conn.transaction_level(), 0);
    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);
}

#[test]
fn nested_rollback_poisons_the_outer_commit() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    conn.begin().unwrap();
    assert!(conn.rollback(Some(false)).unwrap());
    assert_eq!(handle.sql_log(), vec!["BEGIN"]);
    assert!(conn.in_transaction());

    let err = conn.commit().unwrap_err();
    assert!(err.is_nested_rollback());
    assert!(!conn.in_transaction());
    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);

    // A fresh transaction is not affected.
    conn.begin().unwrap();
    assert!(conn.commit().unwrap());
}

#[test]
fn nested_rollback_with_savepoints_only_undoes_the_inner_level() {
    let (conn, handle) = with_savepoints(Arc::new(Sqlite::new()));
    assert!(conn.is_savepoints_enabled());
    conn.begin().unwrap();
    conn.begin().unwrap();
    assert!(conn.rollback(None).unwrap());
    assert!(conn.in_transaction());
    assert!(conn.commit().unwrap());
    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "SAVEPOINT LEVEL1",
            "ROLLBACK TO SAVEPOINT LEVEL1",
            "COMMIT"
        ]
    );
}

#[test]
fn nested_commit_releases_savepoint() {
    let (conn, handle) = with_savepoints(Arc::new(Mysql::new()));
    conn.begin().unwrap();
    conn.begin().unwrap();
    conn.begin().unwrap();
    assert_eq!(conn.transaction_level(), 2);
    conn.commit().unwrap();
    conn.commit().unwrap();
    conn.commit().unwrap();
    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "SAVEPOINT LEVEL1",
            "SAVEPOINT LEVEL2",
            "RELEASE SAVEPOINT LEVEL2",
            "RELEASE SAVEPOINT LEVEL1",
            "COMMIT"
        ]
    );
}

#[test]
fn sqlserver_savepoints_have_no_release() {
    let (conn, handle) = with_savepoints(Arc::new(SqlServer::new()));
    conn.begin().unwrap();
    conn.begin().unwrap();
    conn.commit().unwrap();
    conn.begin().unwrap();
    conn.rollback(None).unwrap();
    conn.commit().unwrap();
    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "SAVE TRANSACTION t1",
            "SAVE TRANSACTION t1",
            "ROLLBACK TRANSACTION t1",
            "COMMIT"
        ]
    );
}

#[test]
fn savepoints_can_be_toggled() {
    let (conn, _) = sqlite();
    assert!(!conn.is_savepoints_enabled());
    assert!(conn.enable_savepoints(true));
    assert!(conn.is_savepoints_enabled());
    assert!(!conn.enable_savepoints(false));
}

#[test]
fn transactional_commits_on_success() {
    let (conn, handle) = sqlite();
    let value = conn
        .transactional(|conn| {
            conn.execute("DELETE FROM articles", &[], &TypeMap::new())?;
            Ok(42_u64)
        })
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(
        handle.sql_log(),
        vec!["BEGIN", "DELETE FROM articles", "COMMIT"]
    );
}

#[test]
fn transactional_rolls_back_on_error() {
    let (conn, handle) = sqlite();
    let result: DbResult<()> =
        conn.transactional(|_| Err(DbError::invalid_argument("nope")));
    assert!(result.unwrap_err().is_invalid_argument());
    assert!(!conn.in_transaction());
    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);
}

#[test]
fn transactional_rolls_back_when_callback_returns_false() {
    let (conn, handle) = sqlite();
    assert!(!conn.transactional(|_| Ok(false)).unwrap());
    assert_eq!(conn.transactional(|_| Ok(None::<u64>)).unwrap(), None);
    assert_eq!(
        handle.sql_log(),
        vec!["BEGIN", "ROLLBACK", "BEGIN", "ROLLBACK"]
    );
}

#[test]
fn failed_inner_transactional_dooms_the_outer_one() {
    let (conn, handle) = sqlite();
    let result = conn.transactional(|conn| {
        let inner: DbResult<()> =
            conn.transactional(|_| Err(DbError::driver("constraint violation")));
        assert!(inner.is_err());
        Ok(())
    });
    assert!(result.unwrap_err().is_nested_rollback());
    assert!(!conn.in_transaction());
    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);
}

#[test]
fn disable_constraints_always_reenables() {
    let (conn, handle) = sqlite();
    let result: DbResult<()> =
        conn.disable_constraints(|_| Err(DbError::driver("foreign key mismatch")));
    assert!(result.is_err());
    assert_eq!(
        handle.sql_log(),
        vec!["PRAGMA foreign_keys = OFF", "PRAGMA foreign_keys = ON"]
    );

    handle.clear();
    let rows = conn
        .disable_constraints(|conn| {
            conn.execute("DELETE FROM tags", &[], &TypeMap::new())
                .map(|s| s.row_count())
        })
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(
        handle.sql_log(),
        vec![
            "PRAGMA foreign_keys = OFF",
            "DELETE FROM tags",
            "PRAGMA foreign_keys = ON"
        ]
    );
}

// ==================== Execution and retry ====================

#[test]
fn execute_binds_named_parameters_with_types() {
    let (conn, handle) = sqlite();
    let types = TypeMap::from_pairs([("active", "boolean")]);
    conn.execute(
        "UPDATE users SET active = :active WHERE id = :id",
        &[("active", Value::Int(1)), (":id", Value::Int(7))],
        &types,
    )
    .unwrap();
    let call = handle.last_call().unwrap();
    assert_eq!(
        call.params,
        vec![
            ("active".to_string(), Value::Bool(true)),
            ("id".to_string(), Value::Int(7))
        ]
    );
}

#[test]
fn lost_connection_is_retried_once_after_reconnecting() {
    let (conn, handle) = sqlite();
    conn.connect().unwrap();
    handle.fail_next(1);
    conn.execute("SELECT 1", &[], &TypeMap::new()).unwrap();
    assert_eq!(handle.connect_count(), 2);
    assert_eq!(handle.sql_log(), vec!["SELECT 1"]);
}

#[test]
fn retry_budget_is_bounded() {
    let (conn, handle) = sqlite();
    handle.fail_next(2);
    let err = conn.execute("SELECT 1", &[], &TypeMap::new()).unwrap_err();
    assert!(err.is_connection_lost());
    assert!(handle.sql_log().is_empty());
}

#[test]
fn no_retry_inside_a_transaction() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    handle.fail_next(1);
    let err = conn.execute("SELECT 1", &[], &TypeMap::new()).unwrap_err();
    assert!(err.is_connection_lost());
    assert_eq!(handle.connect_count(), 1);
}

#[test]
fn lost_connection_on_commit_is_reported() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    conn.execute("INSERT INTO t VALUES (1)", &[], &TypeMap::new())
        .unwrap();
    handle.fail_next(1);
    let err = conn.commit().unwrap_err();
    assert!(err.is_connection_lost());
    assert!(!conn.in_transaction());
    assert_eq!(handle.connect_count(), 1);
    assert_eq!(handle.sql_log(), vec!["BEGIN", "INSERT INTO t VALUES (1)"]);
}

#[test]
fn lost_connection_on_rollback_is_not_replayed() {
    let (conn, handle) = sqlite();
    conn.begin().unwrap();
    handle.fail_next(1);
    let err = conn.rollback(None).unwrap_err();
    assert!(err.is_connection_lost());
    assert!(!conn.in_transaction());
    assert_eq!(handle.connect_count(), 1);
    assert_eq!(handle.sql_log(), vec!["BEGIN"]);
}

#[test]
fn other_driver_errors_propagate_with_sql() {
    let (conn, handle) = sqlite();
    handle.fail_next_with("no such table: nope");
    let err = conn.execute("SELECT * FROM nope", &[], &TypeMap::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Driver error: no such table: nope (sql: SELECT * FROM nope)"
    );
}

#[test]
fn init_statements_run_after_each_connect() {
    let driver = RecordingDriver::new(Arc::new(Mysql::new()));
    let handle = driver.handle();
    let conn = Connection::builder(Box::new(driver))
        .init("SET NAMES utf8mb4")
        .build();
    conn.execute("SELECT 1", &[], &TypeMap::new()).unwrap();
    conn.disconnect();
    conn.execute("SELECT 2", &[], &TypeMap::new()).unwrap();
    assert_eq!(
        handle.sql_log(),
        vec!["SET NAMES utf8mb4", "SELECT 1", "SET NAMES utf8mb4", "SELECT 2"]
    );
}

#[test]
fn queries_route_by_role() {
    let read = RecordingDriver::new(Arc::new(Sqlite::new()));
    let write = RecordingDriver::new(Arc::new(Sqlite::new()));
    let (reads, writes) = (read.handle(), write.handle());
    let conn = Connection::with_drivers(Box::new(read), Box::new(write));
    assert!(conn.is_split());

    conn.select_query().select("id").from("users").execute().unwrap();
    conn.update_query("users").set("name", "x").execute().unwrap();
    conn.select_query()
        .select("id")
        .from("users")
        .use_write_role()
        .execute()
        .unwrap();

    assert_eq!(reads.sql_log(), vec!["SELECT id FROM users"]);
    assert_eq!(
        writes.sql_log(),
        vec!["UPDATE users SET name = :p0", "SELECT id FROM users"]
    );
}

#[test]
fn auto_quoting_is_shared_by_both_roles_of_one_driver() {
    let (conn, handle) = sqlite();
    conn.set_auto_quoting(true);
    assert!(conn.is_auto_quoting());
    conn.select_query().select("id").from("users").execute().unwrap();
    assert_eq!(handle.sql_log(), vec![r#"SELECT "id" FROM "users""#]);
}

#[test]
fn query_logging_reports_statements_and_failures() {
    let (conn, handle) = sqlite();
    let logger = Arc::new(MemoryLogger::new());
    conn.set_logger(logger.clone());
    conn.enable_query_logging(true);

    handle.push_result(&["id"], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    conn.execute("SELECT id FROM t WHERE a = :a", &[("a", Value::from("x"))], &TypeMap::new())
        .unwrap();
    handle.fail_next_with("boom");
    assert!(conn.execute("SELECT 2", &[], &TypeMap::new()).is_err());

    let logged = logger.queries();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].num_rows, 2);
    assert_eq!(logged[0].interpolate(), "SELECT id FROM t WHERE a = 'x'");
    assert_eq!(logged[0].role, Role::Write);
    assert!(logged[1].error.as_deref().is_some_and(|e| e.contains("boom")));

    conn.enable_query_logging(false);
    conn.execute("SELECT 3", &[], &TypeMap::new()).unwrap();
    assert_eq!(logger.queries().len(), 2);
}

#[test]
fn last_insert_id_comes_from_the_write_driver() {
    let (conn, handle) = sqlite();
    handle.set_last_insert_id(12_i64);
    assert_eq!(conn.last_insert_id(Some("users"), None).unwrap(), Value::Int(12));
}

// ==================== Configuration ====================

#[test]
fn from_config_builds_drivers_through_the_registry() {
    let registry = DriverRegistry::with_recording_drivers();
    let config = ConnectionConfig::new("recording")
        .dialect("postgres")
        .quote_identifiers(true)
        .savepoints(true);
    let conn = Connection::from_config(&config, &registry).unwrap();
    assert_eq!(conn.dialect().name(), "postgres");
    assert!(conn.is_auto_quoting());
    assert!(conn.is_savepoints_enabled());
    assert!(!conn.is_split());
}

#[test]
fn from_config_splits_roles_when_overrides_differ() {
    let registry = DriverRegistry::with_recording_drivers();
    let config = ConnectionConfig::new("recording").host("primary").read(RoleOverrides {
        host: Some("replica".to_string()),
        ..RoleOverrides::default()
    });
    let conn = Connection::from_config(&config, &registry).unwrap();
    assert!(conn.is_split());
}

#[test]
fn unknown_driver_is_reported() {
    let registry = DriverRegistry::with_recording_drivers();
    let err = Connection::from_config(&ConnectionConfig::new("oracle"), &registry).unwrap_err();
    assert!(matches!(err, DbError::MissingDriver(name) if name == "oracle"));
}
