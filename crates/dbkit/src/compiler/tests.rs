use super::*;
use crate::connection::Connection;
use crate::dialect::{Mysql, Postgres, Sqlite};
use crate::driver::RecordingDriver;
use crate::expr::{CommonTableExpression, WindowExpression};
use crate::value::Value;
use std::sync::Arc;

fn connect(dialect: impl Dialect + 'static) -> Connection {
    Connection::new(Box::new(RecordingDriver::new(Arc::new(dialect))))
}

#[test]
fn every_select_clause_in_order() {
    let conn = connect(Sqlite::new());
    let sql = conn
        .select_query()
        .epilog("FOR UPDATE")
        .limit(10)
        .offset(5)
        .order([("a.id", "ASC")])
        .unwrap()
        .window("w", WindowExpression::new().partition("a.id"))
        .having("COUNT(*) > 1")
        .unwrap()
        .group("a.id")
        .where_([("a.views >", 1)])
        .unwrap()
        .left_join(("u", "users"), "u.id = a.author_id")
        .unwrap()
        .from(("a", "articles"))
        .select("a.id")
        .with(CommonTableExpression::new("recent", Expression::raw("SELECT 1")))
        .comment("report")
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "/* report */ WITH recent AS (SELECT 1) SELECT a.id FROM articles a \
         LEFT JOIN users u ON u.id = a.author_id WHERE a.views > :p0 GROUP BY a.id \
         HAVING COUNT(*) > 1 WINDOW w AS (PARTITION BY a.id) ORDER BY a.id ASC \
         LIMIT 10 OFFSET 5 FOR UPDATE"
    );
}

#[test]
fn compile_leaves_the_query_untouched() {
    let conn = connect(Sqlite::new());
    let query = conn
        .select_query()
        .distinct_on("author_id")
        .select("author_id")
        .from("t");
    let mut binder = ValueBinder::new();
    let (compiled, sql) = compile_query(&Sqlite::new(), false, &query, &mut binder).unwrap();

    assert_eq!(sql, "SELECT author_id FROM t GROUP BY author_id");
    assert!(!compiled.clause_is_empty(ClauseName::Group));
    assert!(query.clause_is_empty(ClauseName::Group));
    assert!(!query.clause_is_empty(ClauseName::Distinct));
}

#[test]
fn auto_quoting_applies_to_the_compiled_copy() {
    let conn = connect(Postgres::new());
    conn.set_auto_quoting(true);
    let query = conn.select_query();
    let count = query.func().count("id");
    let query = query
        .select([("total", count)])
        .select("a.title")
        .from(("a", "articles"))
        .where_([("a.id", 1)])
        .unwrap()
        .order([("a.title", "DESC")])
        .unwrap();
    assert_eq!(
        query.sql(None).unwrap(),
        "SELECT COUNT(\"id\") AS \"total\", \"a\".\"title\" FROM \"articles\" \"a\" \
         WHERE \"a\".\"id\" = :p0 ORDER BY \"a\".\"title\" DESC"
    );

    conn.set_auto_quoting(false);
    assert_eq!(
        query.sql(None).unwrap(),
        "SELECT COUNT(id) AS \"total\", a.title FROM articles a WHERE a.id = :p0 ORDER BY a.title DESC"
    );
}

#[test]
fn raw_order_fragments_with_spaces_are_not_quoted() {
    let conn = connect(Mysql::new());
    conn.set_auto_quoting(true);
    let sql = conn
        .select_query()
        .from("t")
        .order("title DESC")
        .unwrap()
        .order("id")
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `t` ORDER BY title DESC, `id`");
}

#[test]
fn insert_columns_are_quoted() {
    let conn = connect(Mysql::new());
    conn.set_auto_quoting(true);
    let sql = conn
        .insert_query("articles")
        .insert(["title"])
        .unwrap()
        .values([("title", "x")])
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(sql, "INSERT INTO `articles` (`title`) VALUES (:p0)");
}

#[test]
fn ordered_union_keeps_branch_clauses() {
    let conn = connect(Mysql::new());
    let other = conn
        .select_query()
        .select("id")
        .from("b")
        .where_([("y", 2)])
        .unwrap()
        .order([("id", "DESC")])
        .unwrap()
        .limit(3);
    let sql = conn
        .select_query()
        .select("id")
        .from("a")
        .where_([("x", 1)])
        .unwrap()
        .order([("id", "ASC")])
        .unwrap()
        .union(other)
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "(SELECT id FROM a WHERE x = :p0 ORDER BY id ASC) UNION \
         (SELECT id FROM b WHERE y = :p1 ORDER BY id DESC LIMIT 3)"
    );
}

#[test]
fn sub_queries_share_the_placeholder_sequence() {
    let conn = connect(Sqlite::new());
    let authors = conn
        .select_query()
        .select("id")
        .from("authors")
        .where_([("active", true)])
        .unwrap();
    let mut binder = ValueBinder::new();
    let sql = conn
        .select_query()
        .from("articles")
        .where_([("status", "published")])
        .unwrap()
        .where_([("author_id IN", authors)])
        .unwrap()
        .sql(Some(&mut binder))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM articles WHERE (status = :p0 AND author_id IN (SELECT id FROM authors WHERE active = :p1))"
    );
    assert_eq!(binder.get(":p1").unwrap().value, Value::Bool(true));
}

#[test]
fn derived_tables_in_from() {
    let conn = connect(Sqlite::new());
    let inner = conn.select_query().select("id").from("articles").limit(5);
    let sql = conn
        .select_query()
        .select("recent.id")
        .from(("recent", inner))
        .sql(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT recent.id FROM (SELECT id FROM articles LIMIT 5) recent"
    );
}

#[test]
fn modifiers_on_write_statements() {
    let conn = connect(Mysql::new());
    let sql = conn
        .insert_query("t")
        .modifier("IGNORE")
        .insert(["a"])
        .unwrap()
        .values([("a", 1)])
        .unwrap()
        .sql(None)
        .unwrap();
    assert_eq!(sql, "INSERT IGNORE INTO t (a) VALUES (:p0)");

    let sql = conn
        .update_query("t")
        .modifier("LOW_PRIORITY")
        .set("a", 1)
        .sql(None)
        .unwrap();
    assert_eq!(sql, "UPDATE LOW_PRIORITY t SET a = :p0");

    let sql = conn
        .delete_query("t")
        .modifier("QUICK")
        .sql(None)
        .unwrap();
    assert_eq!(sql, "DELETE QUICK FROM t");
}

#[test]
fn update_without_table_is_incomplete() {
    let conn = connect(Sqlite::new());
    let mut query = conn.update_query("t").set("a", 1);
    query.parts.update = None;
    let err = query.sql(None).unwrap_err();
    assert!(matches!(err, DbError::IncompleteQuery(_)));
}

#[test]
fn unused_query_bindings_are_dropped() {
    let conn = connect(Sqlite::new());
    let query = conn
        .select_query()
        .from("t")
        .where_("a = :a1 OR a = :a")
        .unwrap()
        .bind(":a", 1, None);
    let mut binder = ValueBinder::new();
    query.sql(Some(&mut binder)).unwrap();
    assert_eq!(binder.len(), 1);
    assert_eq!(binder.get("a").unwrap().value, Value::Int(1));

    let query = conn.select_query().from("t").bind(":a", 1, None);
    let mut binder = ValueBinder::new();
    query.sql(Some(&mut binder)).unwrap();
    assert!(binder.is_empty());
}

#[test]
fn default_templates() {
    assert_eq!(default_template(ClauseName::Where), Some(" WHERE %s"));
    assert_eq!(default_template(ClauseName::Comment), Some("/* %s */ "));
    assert_eq!(default_template(ClauseName::Select), None);
    assert_eq!(default_clause_order(QueryType::Update)[2], ClauseName::Update);
}

#[test]
fn generated_placeholder_names_cannot_be_bound() {
    let conn = connect(Sqlite::new());
    let query = conn
        .select_query()
        .from("t")
        .where_([("a", 1)])
        .unwrap()
        .where_("b = :p0")
        .unwrap()
        .bind(":p0", 2, None);
    let err = query.sql(None).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));

    let query = conn.select_query().from("t").bind("p1", 2, None);
    assert!(query.sql(None).is_err());

    let query = conn
        .select_query()
        .from("t")
        .where_("b = :p0x")
        .unwrap()
        .bind(":p0x", 2, None);
    assert_eq!(query.sql(None).unwrap(), "SELECT * FROM t WHERE b = :p0x");
}
