#![cfg(feature = "sqlite")]

use sql_dataport::prelude::*;

fn context() -> Result<(tempfile::TempDir, DataContext), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pipeline.db");
    let ctx = DataContext::open("sqlite", path.to_str().ok_or("path")?)?;
    ctx.execute_batch(
        "create table account(id integer primary key, name text, active int, flag char(1), profile json);
         insert into account(name, active, flag, profile) values('alice', 1, 'Y', '{\"city\":\"oslo\"}');
         insert into account(name, active, flag, profile) values('bob', 0, 'N', null);",
    )?;
    Ok((dir, ctx))
}

#[test]
fn insert_returns_generated_id() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("insert into account(name, active) values(?, ?)");
    cmd.timeout_seconds = 5;
    cmd.add_parameter("p1", SqlValue::Text("carol".into()));
    cmd.add_parameter("p2", SqlValue::Bool(true));
    let id = cmd.execute_scalar()?;
    assert_eq!(id, Some(SqlValue::Int(3)));
    Ok(())
}

#[test]
fn scalar_null_becomes_language_null() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    assert_eq!(ctx.command("select null").execute_scalar()?, None);
    assert_eq!(
        ctx.command("select profile from account where name = 'bob'")
            .execute_scalar()?,
        None
    );
    Ok(())
}

#[test]
fn non_query_reports_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("update account set active = @p1");
    cmd.add_parameter("p1", SqlValue::Int(1));
    assert_eq!(cmd.execute_non_query()?, 2);
    Ok(())
}

#[test]
fn reader_applies_declared_type_coercions() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("select name, flag, profile from account order by id");
    let mut reader = cmd.execute_reader()?;

    assert!(reader.read());
    assert_eq!(reader.ordinal("FLAG"), Some(1));
    assert_eq!(reader.get_by_name("name"), SqlValue::Text("alice".into()));
    assert_eq!(reader.get_value(1), SqlValue::Char('Y'));
    assert_eq!(
        reader.get_value(2),
        SqlValue::Json(serde_json::json!({"city": "oslo"}))
    );

    assert!(reader.read());
    assert_eq!(reader.get_value(2), SqlValue::Null);
    assert_eq!(
        reader.get_value_as(0, SqlKind::Blob),
        SqlValue::Blob(b"bob".to_vec())
    );
    assert!(!reader.read());
    reader.close();
    Ok(())
}

#[test]
fn function_call_wraps_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("");
    cmd.add_parameter("p1", SqlValue::Int(-5));
    assert_eq!(cmd.execute_function("abs")?, Some(SqlValue::Int(5)));
    Ok(())
}

#[test]
fn stored_procedures_are_unsupported_on_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("");
    assert!(matches!(
        cmd.execute_stored_procedure("whatever"),
        Err(DataAccessError::Unsupported(_))
    ));
    Ok(())
}

#[test]
fn builder_rendered_commands_execute() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let builder = SelectCommandBuilder::new("account")
        .select_fields(["name"])
        .query("active = 1")
        .sort("name")
        .take(1);
    let scalar = ctx.command_from(&builder)?.execute_scalar()?;
    assert_eq!(scalar, Some(SqlValue::Text("alice".into())));
    Ok(())
}

#[test]
fn binding_errors_surface_before_execution() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = context()?;
    let mut cmd = ctx.command("select @p1");
    let mut param = Parameter::new("p1", SqlValue::Text("not a number".into()));
    param.declared_kind = SqlKind::Int;
    cmd.parameters.push(param);
    assert!(matches!(
        cmd.execute_scalar(),
        Err(DataAccessError::ParameterError { .. })
    ));
    Ok(())
}
