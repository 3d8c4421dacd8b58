use super::*;
use crate::types::TypeMap;

fn render(expr: impl Into<Expression>) -> (String, ValueBinder) {
    let mut binder = ValueBinder::new();
    let sql = expr.into().sql(&mut binder).unwrap();
    (sql, binder)
}

#[test]
fn comparisons_bind_values() {
    let (sql, binder) = render(QueryExpression::new().eq("id", 1).gt("score", 5));
    assert_eq!(sql, "(id = :p0 AND score > :p1)");
    assert_eq!(binder.get(":p1").unwrap().value, Value::Int(5));
}

#[test]
fn single_condition_renders_without_parens() {
    let (sql, _) = render(QueryExpression::new().like("title", "%rust%"));
    assert_eq!(sql, "title LIKE :p0");
}

#[test]
fn parses_field_operator_keys() {
    let group = QueryExpression::new()
        .add([("id IN", vec![1, 2, 3])])
        .unwrap()
        .add([("deleted IS", Value::Null)])
        .unwrap()
        .add([("published_at IS NOT", Value::Null)])
        .unwrap()
        .add([("title NOT LIKE", "draft%")])
        .unwrap();
    let (sql, binder) = render(group);
    assert_eq!(
        sql,
        "(id IN (:p0, :p1, :p2) AND deleted IS NULL AND published_at IS NOT NULL AND title NOT LIKE :p3)"
    );
    assert_eq!(binder.len(), 4);
}

#[test]
fn is_with_a_value_becomes_equality() {
    let (sql, _) = render(QueryExpression::new().add([("status IS", 3)]).unwrap());
    assert_eq!(sql, "status = :p0");
    let (sql, _) = render(QueryExpression::new().add([("status IS NOT", 3)]).unwrap());
    assert_eq!(sql, "status != :p0");
}

#[test]
fn null_without_operator_is_rejected() {
    let err = QueryExpression::new()
        .add([("deleted", Value::Null)])
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("missing operator (IS, IS NOT)"));
}

#[test]
fn comma_conjunction_allows_null_assignment() {
    let group = QueryExpression::with_conjunction(",")
        .add([("title", Value::Null)])
        .unwrap()
        .add([("body", "x")])
        .unwrap();
    let (sql, binder) = render(group);
    assert_eq!(sql, "(title = :p0, body = :p1)");
    assert_eq!(binder.get("p0").unwrap().value, Value::Null);
}

#[test]
fn type_map_supplies_hints_and_list_types() {
    let map = TypeMap::from_pairs([("id", "integer"), ("tags", "string[]")]);
    let group = QueryExpression::new()
        .with_type_map(map)
        .add([("id IN", vec![1, 2])])
        .unwrap()
        .add([("tags", vec!["a"])])
        .unwrap();
    let (sql, binder) = render(group);
    assert_eq!(sql, "(id IN (:p0, :p1) AND tags IN (:p2))");
    assert_eq!(binder.get(":p0").unwrap().type_name.as_deref(), Some("integer"));
    assert_eq!(binder.get(":p2").unwrap().type_name.as_deref(), Some("string"));
}

#[test]
fn empty_in_list_fails_at_render() {
    let group = QueryExpression::new().in_list("id", Vec::<i32>::new());
    let mut binder = ValueBinder::new();
    let err = Expression::from(group).sql(&mut binder).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid argument: Impossible to generate condition with empty list of values for field (id)"
    );
}

#[test]
fn nested_groups_and_negation() {
    let group = QueryExpression::new()
        .eq("a", 1)
        .or_group(|e| e.eq("b", 2).eq("c", 3))
        .not_group(|e| e.eq("d", 4).eq("e", 5));
    let (sql, _) = render(group);
    assert_eq!(
        sql,
        "(a = :p0 AND (b = :p1 OR c = :p2) AND NOT (d = :p3 AND e = :p4))"
    );
}

#[test]
fn condition_groups_parse_like_closures() {
    let group = QueryExpression::new()
        .add(vec![
            Condition::field("a", 1),
            Condition::or([("b", 2), ("c", 3)]),
            Condition::not(Condition::field("d", 4)),
        ])
        .unwrap();
    let (sql, _) = render(group);
    assert_eq!(sql, "(a = :p0 AND (b = :p1 OR c = :p2) AND NOT (d = :p3))");
}

#[test]
fn empty_nested_groups_are_skipped() {
    let group = QueryExpression::new()
        .eq("a", 1)
        .and_group(|e| e);
    let (sql, _) = render(group);
    assert_eq!(sql, "a = :p0");
}

#[test]
fn between_and_field_equality() {
    let group = QueryExpression::new()
        .between("age", 18, 65)
        .equal_fields("a.id", "b.author_id");
    let (sql, _) = render(group);
    assert_eq!(sql, "(age BETWEEN :p0 AND :p1 AND a.id = b.author_id)");
}

#[test]
fn is_null_over_an_expression_wraps_the_operand() {
    let coalesce = FunctionsBuilder::new().coalesce([Expression::identifier("a"), Expression::identifier("b")]);
    let (sql, _) = render(UnaryExpression::postfix("IS NULL", coalesce));
    assert_eq!(sql, "(COALESCE(a, b)) IS NULL");
}

#[test]
fn functions_render_with_conjunctions() {
    let f = FunctionsBuilder::new();
    assert_eq!(render(f.count("*")).0, "COUNT(*)");
    assert_eq!(render(f.cast("id", "text")).0, "CAST(id AS text)");
    assert_eq!(render(f.extract("year", "created")).0, "EXTRACT(YEAR FROM created)");
    assert_eq!(
        render(f.date_add("created", 1, "DAY")).0,
        "DATE_ADD(created, INTERVAL 1 DAY)"
    );
    assert_eq!(render(f.now()).0, "NOW()");
    assert_eq!(f.sum("total").return_type(), "float");
    assert_eq!(f.count("id").return_type(), "integer");
}

#[test]
fn function_values_are_bound() {
    let f = FunctionsBuilder::new();
    let (sql, binder) = render(f.coalesce([Expression::identifier("nick"), Expression::value("anon")]));
    assert_eq!(sql, "COALESCE(nick, :p0)");
    assert_eq!(binder.get(":p0").unwrap().value, Value::from("anon"));
}

#[test]
fn named_functions_validate_names() {
    let f = FunctionsBuilder::new();
    assert!(f.named("json_extract", [Expression::identifier("doc")]).is_ok());
    assert!(f.named("DROP TABLE x; --", Vec::<Expression>::new()).is_err());
}

#[test]
fn window_functions_and_frames() {
    let f = FunctionsBuilder::new();
    let window = WindowExpression::new()
        .partition("category_id")
        .order([("id", "desc")])
        .unwrap()
        .rows(Some(1), Some(0))
        .exclude_current();
    let (sql, _) = render(f.row_number().over(window));
    assert_eq!(
        sql,
        "ROW_NUMBER() OVER (PARTITION BY category_id ORDER BY id DESC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW EXCLUDE CURRENT ROW)"
    );

    assert_eq!(render(f.count("*").over_named("w")).0, "COUNT(*) OVER w");
    assert_eq!(
        render(WindowExpression::new().range(None, None)).0,
        "RANGE BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING"
    );
}

#[test]
fn lag_binds_its_offset() {
    let f = FunctionsBuilder::new();
    let (sql, binder) = render(f.lag("price", 2, Some(Value::Int(0))));
    assert_eq!(sql, "LAG(price, :p0, :p1) OVER ()");
    assert_eq!(binder.get(":p0").unwrap().type_name.as_deref(), Some("integer"));
}

#[test]
fn aggregate_filter_clause() {
    let f = FunctionsBuilder::new();
    let count = f.count("*").filter([("status", "active")]).unwrap();
    assert_eq!(render(count).0, "COUNT(*) FILTER (WHERE status = :p0)");
}

#[test]
fn order_by_lists() {
    let order = OrderByExpression::new()
        .add([("title", "asc")])
        .unwrap()
        .add("id DESC")
        .unwrap()
        .add(OrderClauseExpression::desc(FunctionsBuilder::new().count("id")))
        .unwrap();
    let (sql, _) = render(Expression::OrderBy(order));
    assert_eq!(sql, "ORDER BY title ASC, id DESC, COUNT(id) DESC");

    assert!(OrderByExpression::new().add([("title", "sideways")]).is_err());
}

#[test]
fn case_expressions() {
    let case = CaseExpression::new()
        .when([("status", 1)], "on")
        .unwrap()
        .otherwise("off");
    let (sql, binder) = render(case);
    assert_eq!(sql, "CASE WHEN status = :p0 THEN :p1 ELSE :p2 END");
    assert_eq!(binder.len(), 3);

    let simple = CaseExpression::of(Expression::identifier("kind"))
        .when_value("a", 1)
        .when_value("b", 2);
    assert_eq!(
        render(simple).0,
        "CASE kind WHEN :p0 THEN :p1 WHEN :p2 THEN :p3 END"
    );

    let mut binder = ValueBinder::new();
    assert!(CaseExpression::new().sql(&mut binder).is_err());
}

#[test]
fn common_table_expressions() {
    let cte = CommonTableExpression::new("recent", Expression::raw("SELECT 1"))
        .fields(["n"])
        .materialized();
    let (sql, _) = render(Expression::Cte(cte));
    assert_eq!(sql, "recent (n) AS MATERIALIZED (SELECT 1)");

    let mut binder = ValueBinder::new();
    let err = CommonTableExpression::named("empty").sql(&mut binder).unwrap_err();
    assert!(matches!(err, crate::error::DbError::IncompleteQuery(_)));
}

#[test]
fn values_fill_missing_columns_with_null() {
    let mut values = ValuesExpression::new(
        vec!["title".to_string(), "views".to_string()],
        TypeMap::from_pairs([("views", "integer")]),
    );
    values.add_row([("title", "first")]).unwrap();
    values
        .add_row(vec![("title", Operand::from("second")), ("views", Operand::from(3))])
        .unwrap();
    let (sql, binder) = render(Expression::Values(values.clone()));
    assert_eq!(sql, " VALUES (:p0, :p1), (:p2, :p3)");
    assert_eq!(binder.get(":p1").unwrap().value, Value::Null);
    assert_eq!(binder.get(":p3").unwrap().type_name.as_deref(), Some("integer"));

    assert!(values.add_row([("missing", 1)]).unwrap_err().is_invalid_argument());
}

#[test]
fn walk_visits_nested_nodes() {
    let group = QueryExpression::new()
        .eq("a", 1)
        .is_null("b")
        .or_group(|e| e.in_list(FunctionsBuilder::new().max("c"), vec![1]));
    let expr = Expression::from(group);

    let mut identifiers = Vec::new();
    expr.walk(&mut |node| {
        if let Expression::Identifier(id) = node {
            identifiers.push(id.name().to_string());
        }
    });
    assert_eq!(identifiers, vec!["b", "c"]);
}

#[test]
fn walk_mut_can_rewrite_nodes() {
    let mut expr = Expression::from(QueryExpression::new().is_null("b").is_not_null("c"));
    expr.walk_mut(&mut |node| {
        if let Expression::Identifier(id) = node {
            let renamed = format!("t.{}", id.name());
            id.set_name(renamed);
        }
    });
    let mut binder = ValueBinder::new();
    assert_eq!(expr.sql(&mut binder).unwrap(), "(t.b IS NULL AND t.c IS NOT NULL)");
}

#[test]
fn identifiers_with_collation() {
    let id = IdentifierExpression::new("title").collate("utf8mb4_bin");
    assert_eq!(id.sql(), "title COLLATE utf8mb4_bin");
}
