use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dbkit::{
    Condition, Connection, Dialect, Mysql, Postgres, Query, RecordingDriver, SqlServer, Sqlite,
    Value, ValueBinder,
};
use std::sync::Arc;

fn connect(dialect: Arc<dyn Dialect>) -> Connection {
    Connection::new(Box::new(RecordingDriver::new(dialect)))
}

/// SELECT col0, col1, ... FROM t WHERE (col0 = :p0 AND col1 = :p1 ...)
fn build_select(conn: &Connection, n: usize) -> Query {
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let conditions: Vec<Condition> = (0..n)
        .map(|i| Condition::field(format!("col{i}"), i as i64))
        .collect();
    conn.select_query()
        .select(columns)
        .from("t")
        .where_(conditions)
        .unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_compile/select");
    let conn = connect(Arc::new(Sqlite::new()));

    for n in [1, 5, 10, 50, 100] {
        let query = build_select(&conn, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &query, |b, query| {
            b.iter(|| {
                let mut binder = ValueBinder::new();
                black_box(query.sql(Some(&mut binder)).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_build_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_compile/build_and_compile");
    let conn = connect(Arc::new(Sqlite::new()));

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let query = build_select(&conn, n);
                black_box(query.sql(None).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_compile/in_list");
    let conn = connect(Arc::new(Sqlite::new()));

    for n in [5, 20, 100, 500] {
        let values: Vec<Value> = (0..n).map(Value::Int).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let query = conn
                    .select_query()
                    .from("t")
                    .where_in_list("id", values.clone(), false)
                    .unwrap();
                black_box(query.sql(None).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_dialects(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_compile/dialect");
    let dialects: [Arc<dyn Dialect>; 4] = [
        Arc::new(Mysql::new()),
        Arc::new(Postgres::new()),
        Arc::new(Sqlite::new()),
        Arc::new(SqlServer::new()),
    ];

    for dialect in dialects {
        let name = dialect.name();
        let conn = connect(dialect);
        conn.set_auto_quoting(true);
        let query = build_select(&conn, 10)
            .order([("col0", "DESC")])
            .and_then(|q| q.page(3, Some(25)))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &query, |b, query| {
            b.iter(|| black_box(query.sql(None).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_build_and_compile,
    bench_in_list,
    bench_dialects
);
criterion_main!(benches);
