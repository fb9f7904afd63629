#![cfg(feature = "sqlite")]

use sql_dataport::prelude::*;

struct OrderRow {
    id: i64,
    customer_name: SqlValue,
    item_names: SqlValue,
}

impl Bindable for OrderRow {
    fn entity_type(&self) -> &'static str {
        "order"
    }

    fn entity_key(&self) -> String {
        self.id.to_string()
    }

    fn get_path(&self, path: &str) -> Option<SqlValue> {
        (path == "id").then_some(SqlValue::Int(self.id))
    }

    fn set_field(&mut self, field: &str, value: SqlValue) {
        match field {
            "customer_name" => self.customer_name = value,
            "item_names" => self.item_names = value,
            _ => {}
        }
    }
}

fn setup() -> Result<(tempfile::TempDir, DataContext), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("binder.db");
    let ctx = DataContext::open("sqlite", path.to_str().ok_or("path")?)?;
    ctx.execute_batch(
        "create table customer(id integer primary key, name text, profile json);
         create table orders(id integer primary key, customer_id int);
         create table item(order_id int, name text);
         insert into customer values(1, 'alice', '{\"address\":{\"city\":\"oslo\"}}');
         insert into orders values(10, 1);
         insert into item values(10, 'anvil');
         insert into item values(10, 'rope');",
    )?;
    Ok((dir, ctx))
}

#[test]
fn reader_placeholders_resolve_against_the_current_row(
) -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;

    let mut registry = BinderRegistry::new();
    registry.register(
        "order",
        "customer_name",
        ComputedBinding::new("customer", "name", BinderShape::Once, SqlKind::Text)
            .filter("id = $reader.customer_id"),
    );
    let binder = Binder::new(ctx.clone(), registry);

    let mut cmd = ctx.command("select id, customer_id from orders");
    let mut reader = cmd.execute_reader()?;
    assert!(reader.read());

    let mut row = OrderRow {
        id: 10,
        customer_name: SqlValue::Null,
        item_names: SqlValue::Null,
    };
    let value = binder.resolve(&mut row, "customer_name", Some(&reader))?;
    assert_eq!(value, SqlValue::Text("alice".into()));
    assert_eq!(row.customer_name, SqlValue::Text("alice".into()));
    reader.close();
    Ok(())
}

#[test]
fn reader_placeholders_descend_into_json_columns() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;

    let mut registry = BinderRegistry::new();
    registry.register(
        "order",
        "customer_name",
        ComputedBinding::new("customer", "name", BinderShape::Once, SqlKind::Text)
            .filter("json_extract(profile, '$.address.city') = $reader.profile.address.city"),
    );
    let binder = Binder::new(ctx.clone(), registry);

    let mut cmd = ctx.command("select id, profile from customer");
    let mut reader = cmd.execute_reader()?;
    assert!(reader.read());

    let mut row = OrderRow {
        id: 10,
        customer_name: SqlValue::Null,
        item_names: SqlValue::Null,
    };
    let value = binder.resolve(&mut row, "customer_name", Some(&reader))?;
    assert_eq!(value, SqlValue::Text("alice".into()));
    reader.close();
    Ok(())
}

#[test]
fn list_shape_collects_a_json_array() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;

    let mut registry = BinderRegistry::new();
    registry.register(
        "order",
        "item_names",
        ComputedBinding::new("item", "name", BinderShape::List, SqlKind::Json)
            .filter("order_id = $this.id")
            .sort("name"),
    );
    let binder = Binder::new(ctx, registry);

    let mut row = OrderRow {
        id: 10,
        customer_name: SqlValue::Null,
        item_names: SqlValue::Null,
    };
    let value = binder.resolve(&mut row, "item_names", None)?;
    assert_eq!(value, SqlValue::Json(serde_json::json!(["anvil", "rope"])));
    Ok(())
}

#[test]
fn uncached_bindings_execute_every_time() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;

    let mut registry = BinderRegistry::new();
    registry.register(
        "order",
        "item_names",
        ComputedBinding::new("item", "*", BinderShape::Count, SqlKind::Int)
            .filter("order_id = $this.id"),
    );
    let binder = Binder::new(ctx, registry);

    let mut row = OrderRow {
        id: 10,
        customer_name: SqlValue::Null,
        item_names: SqlValue::Null,
    };
    binder.resolve(&mut row, "item_names", None)?;
    binder.resolve(&mut row, "item_names", None)?;
    assert_eq!(binder.executions(), 2);
    Ok(())
}

#[test]
fn unregistered_fields_are_a_configuration_error() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, ctx) = setup()?;
    let binder = Binder::new(ctx, BinderRegistry::new());
    let mut row = OrderRow {
        id: 10,
        customer_name: SqlValue::Null,
        item_names: SqlValue::Null,
    };
    assert!(matches!(
        binder.resolve(&mut row, "customer_name", None),
        Err(DataAccessError::ConfigError(_))
    ));
    Ok(())
}
