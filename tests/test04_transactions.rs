#![cfg(feature = "sqlite")]

use sql_dataport::prelude::*;

fn setup() -> Result<(tempfile::TempDir, DataContext), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("txn.db");
    let ctx = DataContext::open("sqlite", path.to_str().ok_or("path")?)?;
    ctx.execute_batch("create table t(a int)")?;
    Ok((dir, ctx))
}

fn row_count(ctx: &DataContext) -> Result<Option<SqlValue>, DataAccessError> {
    ctx.command("select count(*) from t").execute_scalar()
}

#[test]
fn commit_persists_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let mut conn = ctx.pool().acquire()?;

    let tx = conn.begin_transaction()?;
    assert!(tx.is_active());
    conn.execute_batch("insert into t values(1)")?;
    conn.commit()?;

    let state = conn.transaction().ok_or("transaction detached")?;
    assert_eq!(state.state(), TransactionState::Committed);
    assert!(state.is_terminal());
    ctx.pool().release(conn);

    assert_eq!(row_count(&ctx)?, Some(SqlValue::Int(1)));
    Ok(())
}

#[test]
fn rollback_discards_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let mut conn = ctx.pool().acquire()?;

    conn.begin_transaction()?;
    conn.execute_batch("insert into t values(1)")?;
    conn.rollback()?;
    ctx.pool().release(conn);

    assert_eq!(row_count(&ctx)?, Some(SqlValue::Int(0)));
    Ok(())
}

#[test]
fn terminal_transitions_are_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let mut conn = ctx.pool().acquire()?;

    conn.begin_transaction()?;
    conn.commit()?;
    // A second commit or rollback after the terminal state is a no-op.
    conn.commit()?;
    conn.rollback()?;
    let state = conn.transaction().ok_or("transaction detached")?;
    assert_eq!(state.state(), TransactionState::Committed);
    ctx.pool().release(conn);
    Ok(())
}

#[test]
fn second_begin_returns_the_active_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let mut conn = ctx.pool().acquire()?;

    conn.begin_transaction()?;
    conn.execute_batch("insert into t values(1)")?;
    // Still the same transaction; no nested BEGIN is issued.
    let tx = conn.begin_transaction()?;
    assert!(tx.is_active());
    conn.commit()?;
    ctx.pool().release(conn);

    assert_eq!(row_count(&ctx)?, Some(SqlValue::Int(1)));
    Ok(())
}

#[test]
fn dangling_transaction_rolls_back_on_release() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let mut conn = ctx.pool().acquire()?;

    conn.begin_transaction()?;
    conn.execute_batch("insert into t values(1)")?;
    ctx.pool().release(conn);

    assert_eq!(row_count(&ctx)?, Some(SqlValue::Int(0)));
    Ok(())
}

#[test]
fn switching_database_reopens_against_the_new_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let first = dir.path().join("first.db");
    let second = dir.path().join("second.db");
    let ctx = DataContext::open("sqlite", first.to_str().ok_or("path")?)?;

    let mut conn = ctx.pool().acquire()?;
    assert_eq!(conn.database(), conn.original_database());

    conn.change_database(second.to_str())?;
    conn.execute_batch("create table only_here(a int)")?;
    assert_eq!(conn.database(), second.to_str().ok_or("path")?);

    conn.change_database(None)?;
    assert_eq!(conn.database(), conn.original_database());
    // The table exists only in the second file.
    assert!(conn.execute_batch("insert into only_here values(1)").is_err());
    Ok(())
}
