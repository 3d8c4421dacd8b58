use dbkit::prelude::*;
use dbkit::{Dialect, MemoryLogger, Mysql, Postgres, RecordingDriver, Role, RoleOverrides, SqlServer, Sqlite};
use std::sync::Arc;

fn connect(dialect: Arc<dyn Dialect>) -> Connection {
    Connection::new(Box::new(RecordingDriver::new(dialect)))
}

fn paged_articles(conn: &Connection) -> String {
    conn.select_query()
        .select(["id", "title"])
        .from("articles")
        .where_([("author_id", 1)])
        .unwrap()
        .order([("id", "DESC")])
        .unwrap()
        .limit(10)
        .offset(20)
        .sql(None)
        .unwrap()
}

#[test]
fn one_query_four_dialects() {
    let portable = "SELECT id, title FROM articles WHERE author_id = :p0 ORDER BY id DESC LIMIT 10 OFFSET 20";
    assert_eq!(paged_articles(&connect(Arc::new(Mysql::new()))), portable);
    assert_eq!(paged_articles(&connect(Arc::new(Postgres::new()))), portable);
    assert_eq!(paged_articles(&connect(Arc::new(Sqlite::new()))), portable);
    assert_eq!(
        paged_articles(&connect(Arc::new(SqlServer::new()))),
        "SELECT id, title FROM articles WHERE author_id = :p0 ORDER BY id DESC \
         OFFSET 20 ROWS FETCH FIRST 10 ROWS ONLY"
    );
}

#[test]
fn quoting_follows_the_dialect() {
    let expected = [
        (Arc::new(Mysql::new()) as Arc<dyn Dialect>, "SELECT `id` FROM `articles`"),
        (Arc::new(Postgres::new()), "SELECT \"id\" FROM \"articles\""),
        (Arc::new(Sqlite::new()), "SELECT \"id\" FROM \"articles\""),
        (Arc::new(SqlServer::new()), "SELECT [id] FROM [articles]"),
    ];
    for (dialect, sql) in expected {
        let conn = connect(dialect);
        conn.set_auto_quoting(true);
        let compiled = conn.select_query().select("id").from("articles").sql(None).unwrap();
        assert_eq!(compiled, sql);
    }
}

#[test]
fn config_builds_a_connection_for_the_named_dialect() {
    let registry = DriverRegistry::with_recording_drivers();
    let config = ConnectionConfig::new("recording")
        .dialect("sqlserver")
        .savepoints(true);
    let conn = Connection::from_config(&config, &registry).unwrap();

    assert_eq!(conn.dialect().name(), "sqlserver");
    assert!(conn.is_savepoints_enabled());
    assert!(!conn.is_split());
    assert_eq!(
        conn.select_query().from("t").limit(3).sql(None).unwrap(),
        "SELECT TOP 3 * FROM t"
    );
}

#[test]
fn unknown_driver_is_reported() {
    let registry = DriverRegistry::with_recording_drivers();
    let err = Connection::from_config(&ConnectionConfig::new("oracle"), &registry).unwrap_err();
    assert!(matches!(err, DbError::MissingDriver(ref name) if name == "oracle"));
}

#[test]
fn split_config_routes_reads_and_writes() {
    let registry = DriverRegistry::with_recording_drivers();
    let config = ConnectionConfig::new("recording")
        .dialect("postgres")
        .host("primary")
        .read(RoleOverrides {
            host: Some("replica".to_string()),
            ..RoleOverrides::default()
        });
    let conn = Connection::from_config(&config, &registry).unwrap();
    assert!(conn.is_split());

    let logger = Arc::new(MemoryLogger::new());
    conn.set_logger(logger.clone());
    conn.enable_query_logging(true);

    conn.select_query().from("articles").all().unwrap();
    conn.delete_query("articles")
        .where_([("id", 1)])
        .unwrap()
        .execute()
        .unwrap();

    let roles: Vec<(String, Role)> = logger
        .queries()
        .into_iter()
        .map(|q| (q.sql, q.role))
        .collect();
    assert_eq!(
        roles,
        vec![
            ("SELECT * FROM articles".to_string(), Role::Read),
            ("DELETE FROM articles WHERE id = :p0".to_string(), Role::Write),
        ]
    );
}
