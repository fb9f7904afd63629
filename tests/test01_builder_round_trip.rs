use sql_dataport::prelude::*;

fn dialects() -> Vec<Box<dyn Dialect>> {
    vec![Box::new(MySqlDialect), Box::new(SqliteDialect)]
}

#[test]
fn parse_emit_parse_is_structurally_stable() -> Result<(), Box<dyn std::error::Error>> {
    let samples = [
        "select * from account",
        "select id, name from account where active = 1",
        "select id from account where active = 1 and name like 'a%' order by name desc",
        "select a, b from t limit 10,20",
        "select a from t limit 20 offset 10",
        "select top 5 id from account order by id",
        "select o.id, c.name from orders o inner join customer c on c.id = o.customer_id where o.total > 10",
    ];

    for dialect in dialects() {
        for sample in samples {
            let parsed = SelectCommandBuilder::from_sql(sample)?;
            let emitted = parsed.build_command_text(dialect.as_ref())?;
            let reparsed = SelectCommandBuilder::from_sql(&emitted)?;
            assert_eq!(parsed, reparsed, "round trip diverged for `{sample}`");
        }
    }
    Ok(())
}

#[test]
fn pagination_is_extracted_into_skip_and_take() -> Result<(), Box<dyn std::error::Error>> {
    let b = SelectCommandBuilder::from_sql("select a,b from t limit 10,20")?;
    assert_eq!(b.skip, Some(10));
    assert_eq!(b.take, Some(20));
    assert_eq!(b.fields, vec!["a", "b"]);
    assert!(b.where_fragments.is_empty());

    let b = SelectCommandBuilder::from_sql("select a from t limit 20 offset 10")?;
    assert_eq!(b.skip, Some(10));
    assert_eq!(b.take, Some(20));
    Ok(())
}

#[test]
fn join_clauses_survive_as_opaque_text() -> Result<(), Box<dyn std::error::Error>> {
    let sql = "select o.id from orders o inner join customer c on c.id = o.customer_id where o.total > 10";
    let b = SelectCommandBuilder::from_sql(sql)?;
    assert_eq!(b.table, "orders");
    assert_eq!(b.where_before, "o inner join customer c on c.id = o.customer_id");
    assert_eq!(b.where_fragments, vec!["o.total > 10"]);
    Ok(())
}

#[test]
fn missing_keywords_fail_at_parse_time() {
    assert!(matches!(
        SelectCommandBuilder::from_sql("delete from t"),
        Err(DataAccessError::ParseError { .. })
    ));
    assert!(matches!(
        SelectCommandBuilder::from_sql("select 1"),
        Err(DataAccessError::ParseError { .. })
    ));
}

#[test]
fn insert_and_update_builders_emit_dialect_quoting() -> Result<(), Box<dyn std::error::Error>> {
    let insert = InsertCommandBuilder::new("account")
        .set("name", SqlValue::Text("alice".into()))
        .set_expression("created", "datetime('now')");
    assert_eq!(
        insert.build_command_text(&SqliteDialect)?,
        "insert into \"account\"(\"name\", \"created\") values('alice', datetime('now'))"
    );

    let update = UpdateCommandBuilder::new("account")
        .set("name", SqlValue::Text("bob".into()))
        .query("id = 7");
    assert_eq!(
        update.build_command_text(&MySqlDialect)?,
        "update `account` set `name` = 'bob' where id = 7"
    );
    Ok(())
}

#[test]
fn raw_text_builders_pass_through_verbatim() -> Result<(), Box<dyn std::error::Error>> {
    let raw = "insert into t(a) values(1)";
    let insert = InsertCommandBuilder::from_sql(raw);
    assert_eq!(insert.build_command_text(&SqliteDialect)?, raw);
    Ok(())
}
