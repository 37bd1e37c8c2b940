//! Parameter binding utilities for database queries.
//!
//! Queries are written with named `:name` placeholders. Before execution they
//! are compiled to PostgreSQL's positional `$n` form and the values are bound
//! in matching order. Values are never interpolated into the SQL text.
//!
//! Placeholders are found with the `sqlparser` PostgreSQL tokenizer, so
//! string literals, quoted identifiers, dollar-quoted bodies, comments and
//! `::` casts are left alone. Everything except a rewritten placeholder is
//! copied through byte for byte.

use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryParams};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};
use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;

/// A query in positional form together with its ordered values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl CompiledQuery {
    /// Build the driver argument buffer for this query.
    pub fn arguments(&self) -> Result<PgArguments, sqlx::Error> {
        to_arguments(&self.params)
    }
}

/// Compile `:name` placeholders in `sql` to `$n`, looking values up in `params`.
///
/// A name used more than once maps to the same position. Parameters that the
/// query never references are ignored.
pub fn compile(sql: &str, params: &QueryParams) -> DbResult<CompiledQuery> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize_with_location()
        .map_err(|e| DbError::invalid_input(format!("Could not tokenize query: {e}")))?;
    let offsets = SourceOffsets::new(sql);

    let mut out = String::with_capacity(sql.len() + 8);
    let mut names: Vec<&str> = Vec::new();
    let mut values: Vec<QueryParam> = Vec::new();
    let mut copied = 0;

    let mut iter = tokens.iter().peekable();
    while let Some(tok) = iter.next() {
        let (name, end) = match &tok.token {
            Token::Placeholder(p) if is_positional(p) => {
                return Err(DbError::invalid_input(
                    "Positional placeholders ($1) are not supported; use :name placeholders",
                ));
            }
            Token::Placeholder(p) if p.len() > 1 && p.starts_with(':') => {
                (p[1..].to_string(), &tok.span.end)
            }
            Token::Colon => match iter.peek().copied() {
                Some(next) if next.span.start == tok.span.end => match &next.token {
                    Token::Word(word) if word.quote_style.is_none() => {
                        let end = &next.span.end;
                        iter.next();
                        (word.value.clone(), end)
                    }
                    _ => continue,
                },
                _ => continue,
            },
            _ => continue,
        };

        let (key, value) = params.get_key_value(name.as_str()).ok_or_else(|| {
            DbError::invalid_input(format!("Missing value for parameter ':{name}'"))
        })?;
        let position = match names.iter().position(|n| *n == key.as_str()) {
            Some(p) => p + 1,
            None => {
                names.push(key.as_str());
                values.push(value.clone());
                values.len()
            }
        };

        let start = offsets.byte(&tok.span.start);
        out.push_str(&sql[copied..start]);
        out.push('$');
        out.push_str(&position.to_string());
        copied = offsets.byte(end);
    }
    out.push_str(&sql[copied..]);

    Ok(CompiledQuery {
        sql: out,
        params: values,
    })
}

fn is_positional(placeholder: &str) -> bool {
    placeholder
        .strip_prefix('$')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Maps tokenizer locations (1-based line and column, counted in chars) to
/// byte offsets into the source text.
struct SourceOffsets {
    /// Byte offset of every char, followed by the length of the text.
    chars: Vec<usize>,
    /// Index into `chars` of the first char of each line.
    lines: Vec<usize>,
}

impl SourceOffsets {
    fn new(sql: &str) -> Self {
        let mut chars = Vec::with_capacity(sql.len() + 1);
        let mut lines = vec![0];
        for (i, (byte, c)) in sql.char_indices().enumerate() {
            chars.push(byte);
            if c == '\n' {
                lines.push(i + 1);
            }
        }
        chars.push(sql.len());
        Self { chars, lines }
    }

    fn byte(&self, location: &Location) -> usize {
        let end = self.chars.len() - 1;
        let line = usize::try_from(location.line).unwrap_or(usize::MAX);
        let column = usize::try_from(location.column).unwrap_or(usize::MAX);
        let Some(&line_start) = line.checked_sub(1).and_then(|l| self.lines.get(l)) else {
            return self.chars[end];
        };
        let index = line_start.saturating_add(column.saturating_sub(1)).min(end);
        self.chars[index]
    }
}

/// Bind values in order into a PostgreSQL argument buffer.
pub fn to_arguments(params: &[QueryParam]) -> Result<PgArguments, sqlx::Error> {
    let mut args = PgArguments::default();
    for param in params {
        bind_param(&mut args, param).map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

fn bind_param(args: &mut PgArguments, param: &QueryParam) -> Result<(), sqlx::error::BoxDynError> {
    match param {
        QueryParam::Null => args.add(None::<String>),
        QueryParam::Bool(v) => args.add(*v),
        QueryParam::Int(v) => args.add(*v),
        QueryParam::Float(v) => args.add(*v),
        QueryParam::String(v) => args.add(v.as_str()),
        QueryParam::Bytes(v) => args.add(v.as_slice()),
        QueryParam::Date(v) => args.add(*v),
        QueryParam::Time(v) => args.add(*v),
        QueryParam::Timestamp(v) => args.add(*v),
        QueryParam::TimestampTz(v) => args.add(*v),
        QueryParam::Uuid(v) => args.add(*v),
        QueryParam::Json(v) => args.add(Json(v)),
    }
}
