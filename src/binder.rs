//! Declarative computed-property binding.
//!
//! A [`ComputedBinding`] describes how one derived field of an entity is
//! resolved: a source, a filter template, an optional sort, an output field,
//! and a result shape. Resolution renders a select builder, substitutes
//! `$this.<path>` and `$reader.<column>.<path>` placeholders, executes
//! through the command pipeline, and coerces the result to the target kind.
//! Caching is two-tier and opt-in per binding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use tracing::debug;

use crate::builder::{CommandTextBuilder, SelectCommandBuilder};
use crate::context::DataContext;
use crate::error::DataAccessError;
use crate::reader::Reader;
use crate::types::{SqlKind, SqlValue, coerce};

/// Shape of a resolved binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinderShape {
    /// Scalar `count(...)` aggregate.
    Count,
    /// Scalar `min(...)` aggregate.
    Min,
    /// First value of the first row.
    Once,
    /// Every value of the output column, as a JSON array.
    List,
    /// Every value of the output column, joined with a separator.
    JoinedList(String),
}

/// Declarative descriptor for one derived field.
#[derive(Debug, Clone)]
pub struct ComputedBinding {
    /// Source table name, or a raw `select ...` statement.
    pub source: String,
    /// Where-clause template; `$this.` and `$reader.` placeholders are
    /// substituted at resolution time.
    pub filter: Option<String>,
    /// Order-by template, substituted the same way.
    pub sort: Option<String>,
    /// Column the shape projects over.
    pub output_field: String,
    pub shape: BinderShape,
    /// Opt-in to both cache tiers.
    pub allow_cache: bool,
    pub target_kind: SqlKind,
}

impl ComputedBinding {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        output_field: impl Into<String>,
        shape: BinderShape,
        target_kind: SqlKind,
    ) -> Self {
        Self {
            source: source.into(),
            filter: None,
            sort: None,
            output_field: output_field.into(),
            shape,
            allow_cache: false,
            target_kind,
        }
    }

    #[must_use]
    pub fn filter(mut self, template: impl Into<String>) -> Self {
        self.filter = Some(template.into());
        self
    }

    #[must_use]
    pub fn sort(mut self, template: impl Into<String>) -> Self {
        self.sort = Some(template.into());
        self
    }

    #[must_use]
    pub fn cached(mut self) -> Self {
        self.allow_cache = true;
        self
    }
}

/// Accessor surface entities expose to the binder instead of reflection.
pub trait Bindable {
    /// Stable type tag used as half of the registry key.
    fn entity_type(&self) -> &'static str;

    /// Stable identity of this instance for the per-entity cache tier.
    fn entity_key(&self) -> String;

    /// Value at a dotted path (`id`, `address.city`).
    fn get_path(&self, path: &str) -> Option<SqlValue>;

    /// Store a resolved value on the entity.
    fn set_field(&mut self, field: &str, value: SqlValue);
}

/// Registration table: (entity type, field) → binding. Populated once at
/// startup, looked up by entity-type identity.
#[derive(Debug, Default)]
pub struct BinderRegistry {
    bindings: HashMap<(String, String), ComputedBinding>,
}

impl BinderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        entity_type: impl Into<String>,
        field: impl Into<String>,
        binding: ComputedBinding,
    ) {
        self.bindings
            .insert((entity_type.into(), field.into()), binding);
    }

    #[must_use]
    pub fn get(&self, entity_type: &str, field: &str) -> Option<&ComputedBinding> {
        self.bindings
            .get(&(entity_type.to_string(), field.to_string()))
    }
}

static THIS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$this\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)").unwrap());
static READER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$reader\.([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_]+)*)").unwrap());

/// Resolver over one data context and one registry.
#[derive(Debug)]
pub struct Binder {
    context: DataContext,
    registry: BinderRegistry,
    signature_cache: Mutex<HashMap<String, SqlValue>>,
    entity_cache: Mutex<HashMap<(String, String, String), SqlValue>>,
    executions: AtomicUsize,
}

impl Binder {
    #[must_use]
    pub fn new(context: DataContext, registry: BinderRegistry) -> Self {
        Self {
            context,
            registry,
            signature_cache: Mutex::new(HashMap::new()),
            entity_cache: Mutex::new(HashMap::new()),
            executions: AtomicUsize::new(0),
        }
    }

    /// Number of queries actually executed; cache hits do not count.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::Relaxed)
    }

    /// Resolve one derived field, store it on the entity, and return it.
    ///
    /// `row` supplies values for `$reader.` placeholders when the entity is
    /// being materialized from a result row.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when no binding is registered for the field;
    /// propagates builder and execution failures.
    pub fn resolve(
        &self,
        entity: &mut dyn Bindable,
        field: &str,
        row: Option<&Reader>,
    ) -> Result<SqlValue, DataAccessError> {
        let binding = self
            .registry
            .get(entity.entity_type(), field)
            .ok_or_else(|| {
                DataAccessError::ConfigError(format!(
                    "no binding registered for {}.{field}",
                    entity.entity_type()
                ))
            })?
            .clone();

        let entity_cache_key = (
            entity.entity_type().to_string(),
            entity.entity_key(),
            field.to_string(),
        );
        if binding.allow_cache {
            let cache = match self.entity_cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(value) = cache.get(&entity_cache_key) {
                debug!(field, "binder: entity cache hit");
                let value = value.clone();
                drop(cache);
                entity.set_field(field, value.clone());
                return Ok(value);
            }
        }

        let filter = binding
            .filter
            .as_deref()
            .map(|t| self.substitute(t, entity, row))
            .transpose()?;
        let sort = binding
            .sort
            .as_deref()
            .map(|t| self.substitute(t, entity, row))
            .transpose()?;

        let builder = build_select(&binding, filter.as_deref(), sort.as_deref())?;
        let sql = builder.build_command_text(self.context.dialect().as_ref())?;
        let signature = format!("{sql}|{:?}", binding.target_kind);

        if binding.allow_cache {
            let cache = match self.signature_cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(value) = cache.get(&signature) {
                debug!(field, "binder: signature cache hit");
                let value = value.clone();
                drop(cache);
                self.store_entity(&binding, entity_cache_key, &value);
                entity.set_field(field, value.clone());
                return Ok(value);
            }
        }

        let raw = self.execute(&binding, &sql)?;
        let value = coerce::to_kind(&raw, binding.target_kind);

        if binding.allow_cache {
            let mut cache = match self.signature_cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache.insert(signature, value.clone());
        }
        self.store_entity(&binding, entity_cache_key, &value);
        entity.set_field(field, value.clone());
        Ok(value)
    }

    fn store_entity(
        &self,
        binding: &ComputedBinding,
        key: (String, String, String),
        value: &SqlValue,
    ) {
        if binding.allow_cache {
            let mut cache = match self.entity_cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache.insert(key, value.clone());
        }
    }

    fn execute(&self, binding: &ComputedBinding, sql: &str) -> Result<SqlValue, DataAccessError> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        debug!(sql = %sql, "binder: executing");
        match &binding.shape {
            BinderShape::Count | BinderShape::Min | BinderShape::Once => {
                let scalar = self.context.command(sql).execute_scalar()?;
                Ok(scalar.unwrap_or(SqlValue::Null))
            }
            BinderShape::List => {
                let values = self.collect_column(sql)?;
                Ok(SqlValue::Json(serde_json::Value::Array(
                    values.iter().map(json_item).collect(),
                )))
            }
            BinderShape::JoinedList(separator) => {
                let values = self.collect_column(sql)?;
                let parts: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(coerce::to_text)
                    .collect();
                Ok(SqlValue::Text(parts.join(separator)))
            }
        }
    }

    fn collect_column(&self, sql: &str) -> Result<Vec<SqlValue>, DataAccessError> {
        let mut command = self.context.command(sql);
        let mut reader = command.execute_reader()?;
        let mut values = Vec::new();
        while reader.read() {
            values.push(reader.get_value(0));
        }
        reader.close();
        Ok(values)
    }

    /// Replace `$this.` and `$reader.` placeholders with dialect literals.
    /// Missing paths substitute a NULL literal.
    fn substitute(
        &self,
        template: &str,
        entity: &dyn Bindable,
        row: Option<&Reader>,
    ) -> Result<String, DataAccessError> {
        let dialect = self.context.dialect();

        let pass_one = THIS_PATH.replace_all(template, |caps: &regex::Captures| {
            let value = entity.get_path(&caps[1]).unwrap_or(SqlValue::Null);
            dialect.format_literal(&value)
        });

        let pass_two = READER_PATH.replace_all(&pass_one, |caps: &regex::Captures| {
            let value = row
                .map(|r| r.get_by_name(&caps[1]))
                .map(|v| descend(&v, caps[2].trim_start_matches('.')))
                .unwrap_or(SqlValue::Null);
            dialect.format_literal(&value)
        });

        Ok(pass_two.into_owned())
    }
}

fn json_item(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Int(i) => serde_json::Value::from(*i),
        SqlValue::Float(f) => serde_json::Value::from(*f),
        SqlValue::Bool(b) => serde_json::Value::from(*b),
        SqlValue::Json(j) => j.clone(),
        SqlValue::Null => serde_json::Value::Null,
        other => serde_json::Value::String(coerce::to_text(other)),
    }
}

/// Descend a dotted path inside a JSON value; empty path returns the value.
fn descend(value: &SqlValue, path: &str) -> SqlValue {
    if path.is_empty() {
        return value.clone();
    }
    let SqlValue::Json(json) = value else {
        return SqlValue::Null;
    };
    let mut current = json;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return SqlValue::Null,
        }
    }
    coerce::from_json(current)
}

fn build_select(
    binding: &ComputedBinding,
    filter: Option<&str>,
    sort: Option<&str>,
) -> Result<SelectCommandBuilder, DataAccessError> {
    let source = binding.source.trim();
    let mut builder = if source.to_ascii_lowercase().starts_with("select ") {
        SelectCommandBuilder::from_sql(source)?
    } else {
        SelectCommandBuilder::new(source)
    };

    let output = if binding.output_field.trim().is_empty() {
        "*"
    } else {
        binding.output_field.trim()
    };
    builder = match &binding.shape {
        BinderShape::Count => builder.select_fields([format!("count({output})")]),
        BinderShape::Min => builder.select_fields([format!("min({output})")]),
        BinderShape::Once => builder.select_fields([output.to_string()]).take(1),
        BinderShape::List | BinderShape::JoinedList(_) => {
            builder.select_fields([output.to_string()])
        }
    };

    if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
        builder = builder.query(filter);
    }
    if let Some(sort) = sort.filter(|s| !s.trim().is_empty()) {
        builder = builder.sort(sort);
    }
    Ok(builder)
}
