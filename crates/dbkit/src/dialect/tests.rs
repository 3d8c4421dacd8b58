use super::*;
use crate::connection::Connection;
use crate::driver::RecordingDriver;
use crate::expr::{CommonTableExpression, Expression, FunctionsBuilder};

fn connect(dialect: impl Dialect + 'static) -> Connection {
    Connection::new(Box::new(RecordingDriver::new(Arc::new(dialect))))
}

fn select_sql(conn: &Connection, function: FunctionExpression) -> String {
    conn.select_query().select(function).sql(None).unwrap()
}

fn names() -> [Expression; 2] {
    [Expression::identifier("first"), Expression::identifier("last")]
}

// ==================== Lookup and features ====================

#[test]
fn lookup_by_name_and_alias() {
    assert_eq!(by_name("mariadb").unwrap().name(), "mysql");
    assert_eq!(by_name("PostgreSQL").unwrap().name(), "postgres");
    assert_eq!(by_name("sqlite3").unwrap().name(), "sqlite");
    assert_eq!(by_name("mssql").unwrap().name(), "sqlserver");

    let err = by_name("oracle").unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn feature_matrix() {
    let mysql = Mysql::new();
    assert!(mysql.supports(Feature::Json));
    assert!(mysql.supports(Feature::SetOperationsOrderBy));
    assert!(!mysql.supports(Feature::Intersect));

    let sqlite = Sqlite::new();
    assert!(sqlite.supports(Feature::TruncateWithConstraints));
    assert!(sqlite.supports(Feature::Intersect));
    assert!(!sqlite.supports(Feature::IntersectAll));
    assert!(!sqlite.supports(Feature::Json));

    let postgres = Postgres::new();
    assert!(postgres.supports(Feature::IntersectAll));
    assert!(!postgres.supports(Feature::DisableConstraintWithoutTransaction));

    let sqlserver = SqlServer::new();
    assert!(sqlserver.supports(Feature::Savepoint));
    assert!(!sqlserver.supports(Feature::SetOperationsOrderBy));
}

#[test]
fn identifier_quote_characters() {
    assert_eq!(Mysql::new().quote_identifier("a.b"), "`a`.`b`");
    assert_eq!(Postgres::new().quote_identifier("a.b"), "\"a\".\"b\"");
    assert_eq!(Sqlite::new().quote_identifier("title"), "\"title\"");
    assert_eq!(SqlServer::new().quote_identifier("a.b"), "[a].[b]");
}

#[test]
fn transaction_and_constraint_statements() {
    let mysql = Mysql::new();
    assert_eq!(mysql.savepoint_sql("2"), "SAVEPOINT LEVEL2");
    assert_eq!(mysql.release_savepoint_sql("2").unwrap(), "RELEASE SAVEPOINT LEVEL2");
    assert_eq!(mysql.rollback_savepoint_sql("2"), "ROLLBACK TO SAVEPOINT LEVEL2");
    assert_eq!(mysql.disable_foreign_keys_sql(), "SET foreign_key_checks = 0");

    let sqlserver = SqlServer::new();
    assert_eq!(sqlserver.savepoint_sql("1"), "SAVE TRANSACTION t1");
    assert!(sqlserver.release_savepoint_sql("1").is_none());
    assert_eq!(sqlserver.rollback_savepoint_sql("1"), "ROLLBACK TRANSACTION t1");

    assert_eq!(Sqlite::new().enable_foreign_keys_sql(), "PRAGMA foreign_keys = ON");
}

// ==================== Function rewrites ====================

#[test]
fn mysql_keeps_portable_functions() {
    let conn = connect(Mysql::new());
    let f = FunctionsBuilder::new();
    assert_eq!(select_sql(&conn, f.concat(names())), "SELECT CONCAT(first, last)");
    assert_eq!(
        select_sql(&conn, f.date_add("created", 1, "DAY")),
        "SELECT DATE_ADD(created, INTERVAL 1 DAY)"
    );
    assert_eq!(select_sql(&conn, f.rand()), "SELECT RAND()");
}

#[test]
fn sqlite_function_rewrites() {
    let conn = connect(Sqlite::new());
    let f = FunctionsBuilder::new();
    assert_eq!(select_sql(&conn, f.concat(names())), "SELECT (first || last)");
    assert_eq!(select_sql(&conn, f.now()), "SELECT DATETIME('now')");
    assert_eq!(select_sql(&conn, f.current_date()), "SELECT DATE('now')");
    assert_eq!(select_sql(&conn, f.rand()), "SELECT RANDOM()");
    assert_eq!(
        select_sql(&conn, f.extract("month", "created")),
        "SELECT STRFTIME('%m', created)"
    );
    assert_eq!(
        select_sql(&conn, f.date_add("created", 1, "DAY")),
        "SELECT DATE(created, '+1 day')"
    );
    assert_eq!(
        select_sql(&conn, f.date_add("created", -2, "MONTH")),
        "SELECT DATE(created, '-2 month')"
    );
    assert_eq!(
        select_sql(&conn, f.day_of_week("created")),
        "SELECT (STRFTIME('%w', created) + 1)"
    );
}

#[test]
fn postgres_function_rewrites() {
    let conn = connect(Postgres::new());
    let f = FunctionsBuilder::new();
    assert_eq!(select_sql(&conn, f.concat(names())), "SELECT (first || last)");
    assert_eq!(select_sql(&conn, f.now()), "SELECT LOCALTIMESTAMP(0)");
    assert_eq!(
        select_sql(&conn, f.current_date()),
        "SELECT CAST(LOCALTIMESTAMP(0) AS date)"
    );
    assert_eq!(
        select_sql(&conn, f.date_add("created", 1, "DAY")),
        "SELECT (created + INTERVAL '1 DAY')"
    );
    assert_eq!(
        select_sql(&conn, f.day_of_week("created")),
        "SELECT (EXTRACT(DOW FROM created) + 1)"
    );
}

#[test]
fn sqlserver_function_rewrites() {
    let conn = connect(SqlServer::new());
    let f = FunctionsBuilder::new();
    assert_eq!(select_sql(&conn, f.concat(names())), "SELECT (first + last)");
    assert_eq!(select_sql(&conn, f.now()), "SELECT GETDATE()");
    assert_eq!(
        select_sql(&conn, f.current_time()),
        "SELECT CONVERT(time, GETDATE())"
    );
    assert_eq!(
        select_sql(&conn, f.extract("year", "created")),
        "SELECT DATEPART(YEAR, created)"
    );
    assert_eq!(
        select_sql(&conn, f.date_add("created", 3, "day")),
        "SELECT DATEADD(DAY, 3, created)"
    );
    assert_eq!(
        select_sql(&conn, f.day_of_week("created")),
        "SELECT DATEPART(weekday, created)"
    );
}

#[test]
fn rewrites_reach_nested_functions() {
    let conn = connect(Sqlite::new());
    let f = FunctionsBuilder::new();
    let sql = conn
        .select_query()
        .from("t")
        .where_([("created <", f.now())])
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE created < (DATETIME('now'))");
}

// ==================== LIMIT / OFFSET ====================

#[test]
fn offset_without_limit() {
    let sql = |dialect: Arc<dyn Dialect>| {
        Connection::new(Box::new(RecordingDriver::new(dialect)))
            .select_query()
            .from("t")
            .offset(5)
            .sql(None)
            .unwrap()
    };
    assert_eq!(
        sql(Arc::new(Mysql::new())),
        "SELECT * FROM t LIMIT 18446744073709551615 OFFSET 5"
    );
    assert_eq!(sql(Arc::new(Sqlite::new())), "SELECT * FROM t LIMIT -1 OFFSET 5");
    assert_eq!(sql(Arc::new(Postgres::new())), "SELECT * FROM t OFFSET 5");
}

#[test]
fn sqlserver_uses_top_for_a_bare_limit() {
    let conn = connect(SqlServer::new());
    let sql = conn
        .select_query()
        .select("id")
        .from("t")
        .limit(5)
        .sql(None)
        .unwrap();
    assert_eq!(sql, "SELECT TOP 5 id FROM t");
}

#[test]
fn sqlserver_pages_with_offset_fetch() {
    let conn = connect(SqlServer::new());
    let sql = conn
        .select_query()
        .from("t")
        .limit(5)
        .offset(10)
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM t ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );

    let sql = conn
        .select_query()
        .from("t")
        .order([("id", "ASC")])
        .unwrap()
        .page(2, Some(20))
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM t ORDER BY id ASC OFFSET 20 ROWS FETCH FIRST 20 ROWS ONLY"
    );
}

// ==================== Translation ====================

#[test]
fn distinct_on_is_native_only_on_postgres() {
    let build = |conn: &Connection| {
        conn.select_query()
            .distinct_on("author_id")
            .select(["author_id", "id"])
            .from("t")
            .sql(None)
            .unwrap()
    };
    assert_eq!(
        build(&connect(Postgres::new())),
        "SELECT DISTINCT ON (author_id) author_id, id FROM t"
    );
    assert_eq!(
        build(&connect(Sqlite::new())),
        "SELECT author_id, id FROM t GROUP BY author_id"
    );
}

#[test]
fn postgres_inserts_return_rows() {
    let conn = connect(Postgres::new());
    let query = conn
        .insert_query("t")
        .insert(["a"])
        .unwrap()
        .values([("a", 1)])
        .unwrap();
    assert_eq!(query.sql(None).unwrap(), "INSERT INTO t (a) VALUES (:p0) RETURNING *");

    let query = query.epilog("RETURNING id");
    assert_eq!(query.sql(None).unwrap(), "INSERT INTO t (a) VALUES (:p0) RETURNING id");
}

#[test]
fn sqlserver_insert_outputs_inserted_rows() {
    let conn = connect(SqlServer::new());
    let sql = conn
        .insert_query("t")
        .insert(["a"])
        .unwrap()
        .values([("a", 1)])
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(sql, "INSERT INTO t (a) OUTPUT INSERTED.* VALUES (:p0)");
}

#[test]
fn sqlserver_insert_with_triggers_uses_a_table_variable() {
    let conn = connect(SqlServer::new().with_insert_triggers(true));
    let sql = conn
        .insert_query("articles")
        .add_types([("views", "integer")])
        .insert(["title", "views"])
        .unwrap()
        .values([("title", Value::from("x")), ("views", Value::Int(1))])
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "DECLARE @inserted TABLE (title NVARCHAR(MAX), views INT); \
         INSERT INTO articles (title, views) OUTPUT INSERTED.title, INSERTED.views INTO @inserted \
         VALUES (:p0, :p1); SELECT * FROM @inserted"
    );
}

#[test]
fn having_inlines_aliased_aggregates() {
    let build = |conn: &Connection| {
        let query = conn.select_query();
        let count = query.func().count("id");
        query
            .select([("total", count)])
            .from("articles")
            .group("author_id")
            .having([("total >", 2)])
            .unwrap()
            .sql(None)
            .unwrap()
    };
    assert_eq!(
        build(&connect(Postgres::new())),
        "SELECT COUNT(id) AS \"total\" FROM articles GROUP BY author_id HAVING COUNT(id) > :p0"
    );
    assert_eq!(
        build(&connect(SqlServer::new())),
        "SELECT COUNT(id) AS [total] FROM articles GROUP BY author_id HAVING COUNT(id) > :p0"
    );
    assert_eq!(
        build(&connect(Mysql::new())),
        "SELECT COUNT(id) AS total FROM articles GROUP BY author_id HAVING total > :p0"
    );
}

#[test]
fn recursive_keyword_per_dialect() {
    let build = |conn: &Connection| {
        conn.select_query()
            .with(CommonTableExpression::new("tree", Expression::raw("SELECT 1")).recursive())
            .from("tree")
            .sql(None)
            .unwrap()
    };
    assert_eq!(
        build(&connect(Sqlite::new())),
        "WITH RECURSIVE tree AS (SELECT 1) SELECT * FROM tree"
    );
    assert_eq!(
        build(&connect(SqlServer::new())),
        "WITH tree AS (SELECT 1) SELECT * FROM tree"
    );
}
