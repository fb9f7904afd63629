//! Raw-SQL ingestion for the select builder.
//!
//! Not a full grammar: ordered keyword-boundary scanning decomposes
//! `SELECT ... FROM ... [WHERE ...] [ORDER BY ...] [LIMIT ...]` text into
//! builder state. Anything between the table name and `where` (joins and the
//! like) is retained verbatim as the where-before fragment.

use std::sync::LazyLock;

use regex::Regex;

use crate::builder::select::SelectCommandBuilder;
use crate::builder::WhereOperator;
use crate::error::DataAccessError;

static SPACING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static STAR_AFTER_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bselect\s*\*").unwrap());
static STAR_BEFORE_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*\s*from\b").unwrap());
static TOP_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^top\s+(\d+)\s+").unwrap());
static PAGINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blimit\s+(\d+)(?:\s*,\s*(\d+)|\s+offset\s+(\d+))?").unwrap()
});

/// Parse a raw SELECT statement into structured builder state.
pub(super) fn parse_select(
    sql: &str,
    custom_table_expression: bool,
) -> Result<SelectCommandBuilder, DataAccessError> {
    let text = normalize(sql);
    let lower = text.to_lowercase();

    let select_at = lower
        .find("select ")
        .ok_or_else(|| DataAccessError::parse(sql, "missing `select` keyword"))?;
    let from_at = lower[select_at..]
        .find(" from ")
        .map(|i| i + select_at)
        .or_else(|| lower[select_at..].ends_with(" from").then(|| lower.len() - 5))
        .ok_or_else(|| DataAccessError::parse(sql, "missing `from` keyword"))?;

    let mut builder = SelectCommandBuilder {
        table: String::new(),
        custom_table_expression,
        fields: Vec::new(),
        where_fragments: Vec::new(),
        where_operator: WhereOperator::And,
        where_before: String::new(),
        order_by: Vec::new(),
        skip: None,
        take: None,
    };

    // Field list, with an optional row-limit prefix.
    let mut fields_text = text[select_at + "select ".len()..from_at].trim().to_string();
    if let Some(caps) = TOP_PREFIX.captures(&fields_text) {
        builder.take = caps[1].parse().ok();
        let prefix_len = caps[0].len();
        fields_text = fields_text[prefix_len..].trim().to_string();
    }
    builder.fields = fields_text
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if builder.fields.is_empty() {
        builder.fields.push("*".to_string());
    }

    // Everything after `from`, with any pagination fragment excised first.
    let mut rest = text[from_at + " from ".len().min(text.len() - from_at)..]
        .trim()
        .to_string();
    if let Some(caps) = PAGINATION.captures(&rest) {
        if let Some(take) = caps.get(2) {
            // limit skip,take
            builder.skip = caps[1].parse().ok();
            builder.take = take.as_str().parse().ok();
        } else if let Some(skip) = caps.get(3) {
            // limit take offset skip
            builder.take = caps[1].parse().ok();
            builder.skip = skip.as_str().parse().ok();
        } else {
            builder.take = caps[1].parse().ok();
        }
        let span = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        rest.replace_range(span.0..span.1, "");
        rest = normalize(&rest);
    }

    // Table name: first token run, honoring quote characters.
    let (table, after_table) = split_table(&rest, custom_table_expression);
    if table.is_empty() {
        return Err(DataAccessError::parse(sql, "missing table name after `from`"));
    }
    builder.table = table;

    // Where / order-by tails; text before `where` stays opaque.
    let after = after_table.trim().to_string();
    let after_lower = after.to_lowercase();
    let where_at = find_keyword(&after_lower, "where");
    let order_at = find_keyword(&after_lower, "order by");

    match (where_at, order_at) {
        (Some(w), Some(o)) if o > w => {
            builder.where_before = after[..w].trim().to_string();
            builder
                .where_fragments
                .push(after[w + "where".len()..o].trim().to_string());
            push_order(&mut builder, &after[o + "order by".len()..]);
        }
        (Some(w), _) => {
            builder.where_before = after[..w].trim().to_string();
            builder
                .where_fragments
                .push(after[w + "where".len()..].trim().to_string());
        }
        (None, Some(o)) => {
            builder.where_before = after[..o].trim().to_string();
            push_order(&mut builder, &after[o + "order by".len()..]);
        }
        (None, None) => {
            builder.where_before = after;
        }
    }
    builder.where_fragments.retain(|f| !f.is_empty());

    Ok(builder)
}

fn normalize(sql: &str) -> String {
    let collapsed = SPACING.replace_all(sql.trim(), " ");
    let collapsed = STAR_AFTER_SELECT.replace_all(&collapsed, "select *");
    let collapsed = STAR_BEFORE_FROM.replace_all(&collapsed, "* from");
    collapsed.trim_end_matches(';').trim().to_string()
}

/// Split the table token from the text following it. Quoted names end at the
/// closing quote character; bare names end at whitespace.
fn split_table(rest: &str, keep_quotes: bool) -> (String, &str) {
    let rest = rest.trim_start();
    let mut chars = rest.char_indices();
    let Some((_, first)) = chars.next() else {
        return (String::new(), rest);
    };

    let closing = match first {
        '"' => Some('"'),
        '[' => Some(']'),
        '`' => Some('`'),
        _ => None,
    };

    if let Some(close) = closing {
        if let Some(end) = rest[1..].find(close) {
            let inner = &rest[1..=end];
            let table = if keep_quotes {
                rest[..end + 2].to_string()
            } else {
                inner.to_string()
            };
            return (table, &rest[end + 2..]);
        }
        // Unterminated quote: treat as a bare token.
    }

    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    (rest[..end].to_string(), &rest[end..])
}

/// Locate ` keyword ` at a word boundary, returning the keyword offset.
fn find_keyword(lower: &str, keyword: &str) -> Option<usize> {
    if lower.starts_with(keyword)
        && lower[keyword.len()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
    {
        return Some(0);
    }
    let needle = format!(" {keyword}");
    let mut start = 0;
    while let Some(found) = lower[start..].find(&needle) {
        let at = start + found;
        let after = at + needle.len();
        if lower[after..].chars().next().is_none_or(char::is_whitespace) {
            return Some(at + 1);
        }
        start = after;
    }
    None
}

fn push_order(builder: &mut SelectCommandBuilder, tail: &str) {
    builder.order_by = tail
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
}
