// SQL front end: a bounded grammar recognized with compiled-once regex
// patterns, producing the typed request structures of the execution layer.
// Keywords are case-insensitive, identifiers are bare words, string literals
// are single-quoted, trailing semicolons optional. Any syntactic mismatch
// fails with InvalidSql carrying the offending statement text.

use crate::catalog::DataType;
use crate::common::{Row, Value};
use crate::error::{DbError, Result};
use crate::execution::{
    ColumnDefRequest, CompareOp, Condition, CreateTableRequest, DeleteRequest, Executor,
    IndexDefRequest, InsertRequest, JoinRequest, JoinType, OrderBy, OutputRow, QueryExecution,
    SelectRequest, UpdateRequest,
};
use crate::index::IndexStats;
use once_cell::sync::Lazy;
use regex::Regex;

/// A parsed SQL statement, ready for dispatch.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTableRequest),
    DropTable { table: String, if_exists: bool },
    Insert(InsertRequest),
    Select(SelectRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Join(JoinRequest),
    ShowTables,
    ShowIndexes,
    Describe { table: String },
    Explain(Box<Statement>),
}

/// One SHOW TABLES line.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub table_name: String,
    pub row_count: u64,
}

/// Dispatch result of one statement.
#[derive(Debug)]
pub enum SqlResponse {
    Rows(Vec<OutputRow>),
    Inserted(Row),
    Count(usize),
    Plan(QueryExecution),
    Tables(Vec<TableSummary>),
    TableDescription(crate::catalog::TableSchema),
    Indexes(Vec<IndexStats>),
    Created { table: String },
    Dropped { table: String, existed: bool },
}

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^CREATE\s+TABLE\s+([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*$").unwrap()
});
static DROP_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^DROP\s+TABLE\s+(?:(IF\s+EXISTS)\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap()
});
static INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^INSERT\s+INTO\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*VALUES\s*\((.*)\)\s*$")
        .unwrap()
});
static SELECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^SELECT\s+(.*?)\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+WHERE\s+(.*?))?(?:\s+ORDER\s+BY\s+(.*?))?(?:\s+LIMIT\s+(\d+))?(?:\s+OFFSET\s+(\d+))?\s*$",
    )
    .unwrap()
});
static JOIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^SELECT\s+(.*?)\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)\s+(?:(INNER|LEFT|RIGHT)\s+)?JOIN\s+([A-Za-z_][A-Za-z0-9_]*)\s+ON\s+([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)(?:\s+WHERE\s+(.*?))?(?:\s+LIMIT\s+(\d+))?(?:\s+OFFSET\s+(\d+))?\s*$",
    )
    .unwrap()
});
static UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^UPDATE\s+([A-Za-z_][A-Za-z0-9_]*)\s+SET\s+(.*?)(?:\s+WHERE\s+(.*))?\s*$")
        .unwrap()
});
static DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^DELETE\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+WHERE\s+(.*))?\s*$").unwrap()
});
static DESCRIBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:DESCRIBE|DESC)\s+([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap()
});
static SHOW_TABLES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^SHOW\s+TABLES$").unwrap());
static SHOW_INDEXES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^SHOW\s+INDEXES$").unwrap());
static VARCHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(VARCHAR|CHAR)\s*\(\s*(\d+)\s*\)$").unwrap());
static COLUMN_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+(\w+(?:\s*\(\s*\d+\s*\))?)(.*)$").unwrap()
});
static DEFAULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bDEFAULT\s+('[^']*'|\S+)").unwrap());
static NOT_NULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bNOT\s+NULL\b").unwrap());
static PRIMARY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^PRIMARY\s+KEY\s*\(([^)]*)\)$").unwrap());
static UNIQUE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^UNIQUE\s*\(([^)]*)\)$").unwrap());
static INDEX_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:INDEX|KEY)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\)$")
        .unwrap()
});
static IS_NULL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^([\w.]+)\s+IS\s+NULL$").unwrap());
static IS_NOT_NULL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^([\w.]+)\s+IS\s+NOT\s+NULL$").unwrap());
static LIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^([\w.]+)\s+LIKE\s+(.+)$").unwrap());
static COMPARISON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([\w.]+)\s*(>=|<=|<>|!=|>|<|=)\s*(.+)$").unwrap());
static ORDER_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^([\w.]+)(?:\s+(ASC|DESC))?$").unwrap());
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());
static JOIN_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bJOIN\b").unwrap());

/// Parse one SQL statement.
pub fn parse(sql: &str) -> Result<Statement> {
    let text = sql.trim().trim_end_matches(';').trim();
    if text.is_empty() {
        return Err(invalid(sql));
    }
    let upper = text.to_ascii_uppercase();

    if let Some(rest) = strip_keyword(text, "EXPLAIN") {
        let inner = parse(rest)?;
        return match inner {
            Statement::Select(_) | Statement::Update(_) | Statement::Delete(_) | Statement::Join(_) => {
                Ok(Statement::Explain(Box::new(inner)))
            }
            _ => Err(invalid(sql)),
        };
    }
    if SHOW_TABLES_RE.is_match(text) {
        return Ok(Statement::ShowTables);
    }
    if SHOW_INDEXES_RE.is_match(text) {
        return Ok(Statement::ShowIndexes);
    }
    if let Some(captures) = DESCRIBE_RE.captures(text) {
        return Ok(Statement::Describe {
            table: captures[1].to_string(),
        });
    }
    if upper.starts_with("CREATE") {
        return parse_create_table(text);
    }
    if upper.starts_with("DROP") {
        let captures = DROP_TABLE_RE.captures(text).ok_or_else(|| invalid(text))?;
        return Ok(Statement::DropTable {
            table: captures[2].to_string(),
            if_exists: captures.get(1).is_some(),
        });
    }
    if upper.starts_with("INSERT") {
        return parse_insert(text);
    }
    if upper.starts_with("SELECT") {
        if JOIN_KEYWORD_RE.is_match(text) {
            return parse_join(text);
        }
        return parse_select(text);
    }
    if upper.starts_with("UPDATE") {
        return parse_update(text);
    }
    if upper.starts_with("DELETE") {
        return parse_delete(text);
    }
    Err(invalid(text))
}

/// Run one statement against the executor.
pub fn execute_statement(executor: &Executor, statement: Statement) -> Result<SqlResponse> {
    match statement {
        Statement::CreateTable(request) => {
            let schema = executor.create_table(request)?;
            Ok(SqlResponse::Created {
                table: schema.table_name,
            })
        }
        Statement::DropTable { table, if_exists } => {
            let existed = executor.drop_table(&table, if_exists)?;
            Ok(SqlResponse::Dropped { table, existed })
        }
        Statement::Insert(request) => Ok(SqlResponse::Inserted(executor.insert(request)?)),
        Statement::Select(request) => Ok(SqlResponse::Rows(executor.select(request)?.0)),
        Statement::Update(request) => Ok(SqlResponse::Count(executor.update(request)?.0)),
        Statement::Delete(request) => Ok(SqlResponse::Count(executor.delete(request)?.0)),
        Statement::Join(request) => Ok(SqlResponse::Rows(executor.join(request)?.0)),
        Statement::ShowTables => {
            let mut tables = Vec::new();
            for name in executor.catalog().list_tables() {
                let schema = executor.catalog().get_table(&name)?;
                tables.push(TableSummary {
                    table_name: schema.table_name,
                    row_count: schema.row_count,
                });
            }
            Ok(SqlResponse::Tables(tables))
        }
        Statement::ShowIndexes => Ok(SqlResponse::Indexes(executor.indexes().list_all())),
        Statement::Describe { table } => Ok(SqlResponse::TableDescription(
            executor.catalog().get_table(&table)?,
        )),
        Statement::Explain(inner) => {
            let plan = match *inner {
                Statement::Select(request) => executor.select(request)?.1,
                Statement::Update(request) => executor.update(request)?.1,
                Statement::Delete(request) => executor.delete(request)?.1,
                Statement::Join(request) => executor.join(request)?.1,
                _ => {
                    return Err(DbError::InvalidSql {
                        sql: "EXPLAIN supports SELECT, UPDATE, DELETE and JOIN".to_string(),
                    })
                }
            };
            Ok(SqlResponse::Plan(plan))
        }
    }
}

/// Parse and execute in one step.
pub fn execute_sql(executor: &Executor, sql: &str) -> Result<SqlResponse> {
    execute_statement(executor, parse(sql)?)
}

// ============================================================================
// Statement parsers
// ============================================================================

fn parse_create_table(text: &str) -> Result<Statement> {
    let captures = CREATE_TABLE_RE.captures(text).ok_or_else(|| invalid(text))?;
    let table_name = captures[1].to_string();
    let body = captures[2].trim();

    let mut request = CreateTableRequest {
        table_name,
        columns: Vec::new(),
        primary_keys: Vec::new(),
        unique_keys: Vec::new(),
        indexes: Vec::new(),
    };

    for part in split_top_level(body, ',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid(text));
        }
        if let Some(captures) = PRIMARY_KEY_RE.captures(part) {
            request
                .primary_keys
                .extend(captures[1].split(',').map(|c| c.trim().to_string()));
        } else if let Some(captures) = UNIQUE_KEY_RE.captures(part) {
            request
                .unique_keys
                .extend(captures[1].split(',').map(|c| c.trim().to_string()));
        } else if let Some(captures) = INDEX_DEF_RE.captures(part) {
            request.indexes.push(IndexDefRequest {
                index_name: captures[1].to_string(),
                column_name: captures[2].to_string(),
                unique: false,
            });
        } else {
            request.columns.push(parse_column_def(part, text)?);
        }
    }
    if request.columns.is_empty() {
        return Err(invalid(text));
    }
    Ok(Statement::CreateTable(request))
}

fn parse_column_def(part: &str, statement: &str) -> Result<ColumnDefRequest> {
    let captures = COLUMN_DEF_RE.captures(part).ok_or_else(|| invalid(statement))?;
    let name = captures[1].to_string();
    let (data_type, max_length) = parse_type(captures[2].trim(), statement)?;
    let rest = captures[3].trim().to_string();

    let nullable = if NOT_NULL_RE.is_match(&rest) {
        Some(false)
    } else {
        None
    };
    let default_value = DEFAULT_RE.captures(&rest).map(|captures| {
        let literal = captures[1].trim();
        literal
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(literal)
            .to_string()
    });

    Ok(ColumnDefRequest {
        name,
        data_type,
        max_length,
        nullable,
        default_value,
    })
}

fn parse_type(text: &str, statement: &str) -> Result<(DataType, Option<u32>)> {
    if let Some(captures) = VARCHAR_RE.captures(text) {
        let length = captures[2].parse::<u32>().map_err(|_| invalid(statement))?;
        return Ok((DataType::Varchar, Some(length)));
    }
    let data_type = match text.to_ascii_uppercase().as_str() {
        "INT" | "INTEGER" => DataType::Integer,
        "BIGINT" => DataType::BigInt,
        "DECIMAL" | "NUMERIC" | "DOUBLE" | "FLOAT" => DataType::Decimal,
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "DATE" => DataType::Date,
        "TIMESTAMP" | "DATETIME" => DataType::Timestamp,
        "TEXT" | "CLOB" => DataType::Text,
        _ => return Err(invalid(statement)),
    };
    Ok((data_type, None))
}

fn parse_insert(text: &str) -> Result<Statement> {
    let captures = INSERT_RE.captures(text).ok_or_else(|| invalid(text))?;
    let table_name = captures[1].to_string();
    let columns: Vec<String> = captures[2]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let literals = split_top_level(&captures[3], ',');
    if columns.is_empty() || columns.len() != literals.len() {
        return Err(invalid(text));
    }

    let mut values = Vec::with_capacity(columns.len());
    for (column, literal) in columns.into_iter().zip(literals) {
        values.push((column, parse_literal(literal.trim())?));
    }
    Ok(Statement::Insert(InsertRequest { table_name, values }))
}

fn parse_select(text: &str) -> Result<Statement> {
    let captures = SELECT_RE.captures(text).ok_or_else(|| invalid(text))?;
    let projection = captures[1].trim();
    let columns = if projection == "*" {
        None
    } else {
        Some(
            projection
                .split(',')
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>(),
        )
    };

    let conditions = match captures.get(3) {
        Some(clause) => parse_where(clause.as_str())?,
        None => Vec::new(),
    };
    let order_by = match captures.get(4) {
        Some(clause) => parse_order_by(clause.as_str(), text)?,
        None => Vec::new(),
    };
    let limit = parse_count(captures.get(5), text)?;
    let offset = parse_count(captures.get(6), text)?;

    Ok(Statement::Select(SelectRequest {
        table_name: captures[2].to_string(),
        columns,
        conditions,
        order_by,
        limit,
        offset,
    }))
}

fn parse_join(text: &str) -> Result<Statement> {
    let captures = JOIN_RE.captures(text).ok_or_else(|| invalid(text))?;
    let projection = captures[1].trim();
    let columns = if projection == "*" {
        None
    } else {
        Some(
            projection
                .split(',')
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>(),
        )
    };

    let left_table = captures[2].to_string();
    let join_type = match captures.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
        None => JoinType::Inner,
        Some(kind) => match kind.as_str() {
            "INNER" => JoinType::Inner,
            "LEFT" => JoinType::Left,
            "RIGHT" => JoinType::Right,
            _ => return Err(invalid(text)),
        },
    };
    let right_table = captures[4].to_string();

    // The ON condition may name the tables in either order.
    let (qual_a, col_a) = (captures[5].to_string(), captures[6].to_string());
    let (qual_b, col_b) = (captures[7].to_string(), captures[8].to_string());
    let (left_column, right_column) = if qual_a == left_table && qual_b == right_table {
        (col_a, col_b)
    } else if qual_a == right_table && qual_b == left_table {
        (col_b, col_a)
    } else {
        return Err(invalid(text));
    };

    let conditions = match captures.get(9) {
        Some(clause) => parse_where(clause.as_str())?,
        None => Vec::new(),
    };
    let limit = parse_count(captures.get(10), text)?;
    let offset = parse_count(captures.get(11), text)?;

    Ok(Statement::Join(JoinRequest {
        left_table,
        right_table,
        left_column,
        right_column,
        join_type,
        columns,
        conditions,
        limit,
        offset,
    }))
}

fn parse_update(text: &str) -> Result<Statement> {
    let captures = UPDATE_RE.captures(text).ok_or_else(|| invalid(text))?;
    let table_name = captures[1].to_string();

    let mut set = Vec::new();
    for assignment in split_top_level(&captures[2], ',') {
        let (column, literal) = assignment.split_once('=').ok_or_else(|| invalid(text))?;
        set.push((column.trim().to_string(), parse_literal(literal.trim())?));
    }
    if set.is_empty() {
        return Err(invalid(text));
    }

    let conditions = match captures.get(3) {
        Some(clause) => parse_where(clause.as_str())?,
        None => Vec::new(),
    };
    Ok(Statement::Update(UpdateRequest {
        table_name,
        set,
        conditions,
    }))
}

fn parse_delete(text: &str) -> Result<Statement> {
    let captures = DELETE_RE.captures(text).ok_or_else(|| invalid(text))?;
    let conditions = match captures.get(2) {
        Some(clause) => parse_where(clause.as_str())?,
        None => Vec::new(),
    };
    Ok(Statement::Delete(DeleteRequest {
        table_name: captures[1].to_string(),
        conditions,
    }))
}

// ============================================================================
// Clause parsers
// ============================================================================

fn parse_where(clause: &str) -> Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    for part in split_on_and(clause) {
        let part = part.trim();
        if let Some(captures) = IS_NOT_NULL_RE.captures(part) {
            conditions.push(Condition {
                column: captures[1].to_string(),
                op: CompareOp::IsNotNull,
                value: Value::Null,
            });
        } else if let Some(captures) = IS_NULL_RE.captures(part) {
            conditions.push(Condition {
                column: captures[1].to_string(),
                op: CompareOp::IsNull,
                value: Value::Null,
            });
        } else if let Some(captures) = LIKE_RE.captures(part) {
            conditions.push(Condition {
                column: captures[1].to_string(),
                op: CompareOp::Like,
                value: parse_literal(captures[2].trim())?,
            });
        } else if let Some(captures) = COMPARISON_RE.captures(part) {
            let op = match &captures[2] {
                "=" => CompareOp::Eq,
                "!=" | "<>" => CompareOp::NotEq,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Gte,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Lte,
                _ => return Err(invalid(part)),
            };
            conditions.push(Condition {
                column: captures[1].to_string(),
                op,
                value: parse_literal(captures[3].trim())?,
            });
        } else {
            return Err(invalid(part));
        }
    }
    Ok(conditions)
}

fn parse_order_by(clause: &str, statement: &str) -> Result<Vec<OrderBy>> {
    let mut order_by = Vec::new();
    for part in clause.split(',') {
        let captures = ORDER_BY_RE
            .captures(part.trim())
            .ok_or_else(|| invalid(statement))?;
        order_by.push(OrderBy {
            column: captures[1].to_string(),
            descending: captures
                .get(2)
                .map(|m| m.as_str().eq_ignore_ascii_case("DESC"))
                .unwrap_or(false),
        });
    }
    Ok(order_by)
}

/// Literal typing: quoted string, boolean, 32-bit integer (widening on
/// overflow), decimal, NULL, else bare word as string.
fn parse_literal(text: &str) -> Result<Value> {
    if let Some(inner) = text.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'').ok_or_else(|| invalid(text))?;
        return Ok(Value::String(inner.to_string()));
    }
    if text.eq_ignore_ascii_case("NULL") {
        return Ok(Value::Null);
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return Ok(Value::Boolean(true));
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return Ok(Value::Boolean(false));
    }
    if INTEGER_RE.is_match(text) {
        if let Ok(value) = text.parse::<i32>() {
            return Ok(Value::Integer(value));
        }
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Value::BigInt(value));
        }
        return text
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid(text));
    }
    if DECIMAL_RE.is_match(text) {
        return text
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid(text));
    }
    Ok(Value::String(text.to_string()))
}

// ============================================================================
// Tokenization helpers
// ============================================================================

/// Split on a delimiter, respecting nested parentheses and single-quoted
/// strings.
fn split_top_level(text: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    for ch in text.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            '(' if !in_quote => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c == delimiter && depth == 0 && !in_quote => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Split a WHERE clause on the AND keyword, case-insensitively, outside
/// quoted strings.
fn split_on_and(clause: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let chars: Vec<char> = clause.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\'' {
            in_quote = !in_quote;
            current.push(chars[i]);
            i += 1;
            continue;
        }
        if !in_quote
            && i + 3 <= chars.len()
            && chars[i..i + 3]
                .iter()
                .collect::<String>()
                .eq_ignore_ascii_case("and")
            && (i == 0 || chars[i - 1].is_whitespace())
            && (i + 3 == chars.len() || chars[i + 3].is_whitespace())
        {
            parts.push(std::mem::take(&mut current));
            i += 3;
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_count(capture: Option<regex::Match<'_>>, statement: &str) -> Result<Option<usize>> {
    match capture {
        None => Ok(None),
        Some(m) => m
            .as_str()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid(statement)),
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        let rest = &text[keyword.len()..];
        if rest.starts_with(char::is_whitespace) {
            return Some(rest.trim_start());
        }
    }
    None
}

fn invalid(sql: &str) -> DbError {
    DbError::InvalidSql {
        sql: sql.to_string(),
    }
}
