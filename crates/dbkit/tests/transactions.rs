use dbkit::prelude::*;
use dbkit::{MemoryLogger, Mysql, Postgres, RecordingDriver, RecordingHandle, Sqlite};
use std::sync::Arc;

fn connect(dialect: Arc<dyn dbkit::Dialect>, savepoints: bool) -> (Connection, RecordingHandle) {
    let driver = RecordingDriver::new(dialect);
    let handle = driver.handle();
    let conn = Connection::builder(Box::new(driver))
        .savepoints(savepoints)
        .build();
    (conn, handle)
}

fn insert_article(conn: &Connection, title: &str) -> DbResult<u64> {
    conn.insert_query("articles")
        .insert(["title"])?
        .values([("title", title)])?
        .row_count()
}

#[test]
fn transactional_commits_every_statement_together() {
    let (conn, handle) = connect(Arc::new(Sqlite::new()), false);
    let inserted = conn
        .transactional(|c| {
            insert_article(c, "a")?;
            insert_article(c, "b")?;
            Ok(2u64)
        })
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "INSERT INTO articles (title) VALUES (:p0)",
            "INSERT INTO articles (title) VALUES (:p0)",
            "COMMIT",
        ]
    );
}

#[test]
fn failing_statement_rolls_the_transaction_back() {
    let (conn, handle) = connect(Arc::new(Sqlite::new()), false);
    let err = conn
        .transactional(|c| {
            insert_article(c, "a")?;
            handle.fail_next_with("UNIQUE constraint failed: articles.title");
            insert_article(c, "a")
        })
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE constraint failed"));
    assert!(!conn.in_transaction());
    assert_eq!(
        handle.sql_log(),
        vec!["BEGIN", "INSERT INTO articles (title) VALUES (:p0)", "ROLLBACK"]
    );
}

#[test]
fn nested_failure_with_savepoints_keeps_the_outer_work() {
    let (conn, handle) = connect(Arc::new(Postgres::new()), true);
    conn.transactional(|c| {
        insert_article(c, "kept")?;
        let inner: DbResult<()> = c.transactional(|c| {
            insert_article(c, "dropped")?;
            Err(DbError::driver("boom"))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "INSERT INTO articles (title) VALUES (:p0) RETURNING *",
            "SAVEPOINT LEVEL1",
            "INSERT INTO articles (title) VALUES (:p0) RETURNING *",
            "ROLLBACK TO SAVEPOINT LEVEL1",
            "COMMIT",
        ]
    );
}

#[test]
fn nested_failure_without_savepoints_dooms_the_outer_transaction() {
    let (conn, handle) = connect(Arc::new(Mysql::new()), false);
    let err = conn
        .transactional(|c| {
            insert_article(c, "a")?;
            let inner: DbResult<()> = c.transactional(|_| Err(DbError::driver("boom")));
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, DbError::NestedTransactionRollback(_)));
    assert!(!conn.in_transaction());
    assert_eq!(
        handle.sql_log(),
        vec!["BEGIN", "INSERT INTO articles (title) VALUES (:p0)", "ROLLBACK"]
    );
}

#[test]
fn lost_connection_outside_a_transaction_reconnects() {
    let (conn, handle) = connect(Arc::new(Sqlite::new()), false);
    conn.connect().unwrap();
    handle.fail_next(1);
    insert_article(&conn, "a").unwrap();
    assert_eq!(handle.connect_count(), 2);
    assert_eq!(handle.sql_log(), vec!["INSERT INTO articles (title) VALUES (:p0)"]);
}

#[test]
fn transaction_commands_are_logged() {
    let (conn, _handle) = connect(Arc::new(Sqlite::new()), false);
    let logger = Arc::new(MemoryLogger::new());
    conn.set_logger(logger.clone());
    conn.enable_query_logging(true);

    conn.transactional(|c| insert_article(c, "a")).unwrap();

    let logged: Vec<String> = logger.queries().into_iter().map(|q| q.sql).collect();
    assert_eq!(
        logged,
        vec!["BEGIN", "INSERT INTO articles (title) VALUES (:p0)", "COMMIT"]
    );
}
