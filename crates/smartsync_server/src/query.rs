//! SOQL and SOSL subsets.
//!
//! Supported SOQL:
//!
//! ```text
//! select f1, f2 from Type
//!     [where cond [and|or cond]...]
//!     [order by f [asc|desc] [nulls first|last], ...]
//!     [limit n] [offset n]
//! ```
//!
//! Conditions compare a field with a literal (`= != <> < <= > >=`), test
//! membership (`[not] in (...)`) or match a pattern (`like`). Literals are
//! quoted strings, numbers, `true`, `false`, `null` and unquoted ISO 8601
//! datetimes. Datetime literals compare with datetime field values by
//! instant, not by text.
//!
//! Supported SOSL:
//!
//! ```text
//! find {term} [in all fields|name fields]
//!     [returning Type[(f1, f2 [where cond] [order by ...] [limit n])], ...]
//!     [limit n]
//! ```

use crate::error::{ServerError, ServerResult};
use crate::objects::ObjectTable;
use serde_json::{Map, Value};
use smartsync_protocol::{names, timestamp};
use std::cmp::Ordering;

fn malformed(message: impl Into<String>) -> ServerError {
    ServerError::MalformedQuery(message.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Scalar(String),
    Braced(String),
    Symbol(&'static str),
}

fn tokenize(input: &str) -> ServerResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '\'' | '{' => {
                let close = if c == '\'' { '\'' } else { '}' };
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(malformed(format!("unterminated literal starting with {c}"))),
                        Some('\\') => {
                            let escaped = chars.get(i + 1).ok_or_else(|| malformed("dangling escape"))?;
                            text.push(match escaped {
                                'n' if close == '\'' => '\n',
                                't' if close == '\'' => '\t',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(&ch) if ch == close => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(if close == '\'' { Token::Text(text) } else { Token::Braced(text) });
            }
            '(' => {
                tokens.push(Token::Symbol("("));
                i += 1;
            }
            ')' => {
                tokens.push(Token::Symbol(")"));
                i += 1;
            }
            ',' => {
                tokens.push(Token::Symbol(","));
                i += 1;
            }
            '=' => {
                tokens.push(Token::Symbol("="));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Symbol("!="));
                i += 2;
            }
            '<' | '>' => {
                let symbol = match (c, chars.get(i + 1)) {
                    ('<', Some('=')) => "<=",
                    ('<', Some('>')) => "!=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    _ => ">",
                };
                i += if symbol.len() == 2 { 2 } else { 1 };
                tokens.push(Token::Symbol(symbol));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || ":.+-".contains(chars[i])) {
                    i += 1;
                }
                tokens.push(Token::Scalar(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(malformed(format!("unexpected character {other:?}"))),
        }
    }
    Ok(tokens)
}

/// A literal on the right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Numeric literal.
    Number(f64),
    /// Quoted string.
    Text(String),
    /// Datetime literal, epoch milliseconds.
    DateTime(i64),
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed `where` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Both sides hold.
    And(Box<Condition>, Box<Condition>),
    /// Either side holds.
    Or(Box<Condition>, Box<Condition>),
    /// The inner condition does not hold.
    Not(Box<Condition>),
    /// `field op literal`
    Compare {
        /// Field name.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: Literal,
    },
    /// `field [not] in (literals)`
    In {
        /// Field name.
        field: String,
        /// Candidates.
        values: Vec<Literal>,
        /// `not in`.
        negated: bool,
    },
    /// `field like 'pattern'`
    Like {
        /// Field name.
        field: String,
        /// Pattern with `%` and `_` wildcards.
        pattern: String,
    },
}

/// One `order by` item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    /// Field name.
    pub field: String,
    /// Descending order.
    pub descending: bool,
    /// Nulls sort after values.
    pub nulls_last: bool,
}

/// A parsed SOQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SoqlQuery {
    /// Selected fields, in order.
    pub fields: Vec<String>,
    /// Object type.
    pub object_type: String,
    /// Filter.
    pub condition: Option<Condition>,
    /// Sort order; empty keeps id order.
    pub order_by: Vec<OrderItem>,
    /// Maximum rows.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: usize,
}

/// One `returning` spec of a SOSL search.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturningSpec {
    /// Object type.
    pub object_type: String,
    /// Returned fields; empty returns `Id` only.
    pub fields: Vec<String>,
    /// Filter.
    pub condition: Option<Condition>,
    /// Sort order.
    pub order_by: Vec<OrderItem>,
    /// Maximum rows of this type.
    pub limit: Option<usize>,
}

/// A parsed SOSL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SoslSearch {
    /// Search term, unescaped.
    pub term: String,
    /// Only name fields are searched.
    pub name_fields_only: bool,
    /// Returning specs; empty searches every type.
    pub returning: Vec<ReturningSpec>,
    /// Maximum rows overall.
    pub limit: Option<usize>,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> ServerResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> ServerResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(malformed(format!("expected '{keyword}'")))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_symbol(&mut self, symbol: &str) -> ServerResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(malformed(format!("expected '{symbol}'")))
        }
    }

    fn identifier(&mut self, what: &str) -> ServerResult<String> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word),
            _ => Err(malformed(format!("expected {what}"))),
        }
    }

    fn number(&mut self, what: &str) -> ServerResult<usize> {
        match self.next() {
            Some(Token::Scalar(text)) => text.parse().map_err(|_| malformed(format!("invalid {what}: {text}"))),
            _ => Err(malformed(format!("expected {what}"))),
        }
    }

    fn finish(&self) -> ServerResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(malformed(format!("unexpected trailing input at {token:?}"))),
        }
    }

    /// Comma separated field names, stopping at any of `terminators`.
    fn field_list(&mut self, terminators: &[&str]) -> ServerResult<Vec<String>> {
        let mut fields = Vec::new();
        loop {
            if terminators.iter().any(|t| self.at_keyword(t)) {
                break;
            }
            if matches!(self.peek(), Some(Token::Symbol(")")) | None) {
                break;
            }
            fields.push(self.identifier("field name")?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        Ok(fields)
    }

    fn literal(&mut self) -> ServerResult<Literal> {
        match self.next() {
            Some(Token::Text(text)) => Ok(Literal::Text(text)),
            Some(Token::Scalar(text)) => {
                if let Some(millis) = timestamp::parse_millis(&text) {
                    Ok(Literal::DateTime(millis))
                } else {
                    text.parse()
                        .map(Literal::Number)
                        .map_err(|_| malformed(format!("invalid literal {text}")))
                }
            }
            Some(Token::Word(word)) => match word.to_ascii_lowercase().as_str() {
                "null" => Ok(Literal::Null),
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                _ => Err(malformed(format!("unsupported literal {word}"))),
            },
            other => Err(malformed(format!("expected a literal, found {other:?}"))),
        }
    }

    fn condition(&mut self) -> ServerResult<Condition> {
        let mut left = self.conjunction()?;
        while self.eat_keyword("or") {
            let right = self.conjunction()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> ServerResult<Condition> {
        let mut left = self.unary()?;
        while self.eat_keyword("and") {
            let right = self.unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> ServerResult<Condition> {
        if self.eat_keyword("not") {
            return Ok(Condition::Not(Box::new(self.unary()?)));
        }
        if self.eat_symbol("(") {
            let inner = self.condition()?;
            self.expect_symbol(")")?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> ServerResult<Condition> {
        let field = self.identifier("field name")?;
        let negated = self.eat_keyword("not");
        if self.eat_keyword("in") {
            self.expect_symbol("(")?;
            let mut values = vec![self.literal()?];
            while self.eat_symbol(",") {
                values.push(self.literal()?);
            }
            self.expect_symbol(")")?;
            return Ok(Condition::In { field, values, negated });
        }
        if self.eat_keyword("like") {
            let pattern = match self.literal()? {
                Literal::Text(text) => text,
                _ => return Err(malformed("like expects a quoted pattern")),
            };
            let like = Condition::Like { field, pattern };
            return Ok(if negated { Condition::Not(Box::new(like)) } else { like });
        }
        if negated {
            return Err(malformed("expected 'in' or 'like' after 'not'"));
        }
        let op = match self.next() {
            Some(Token::Symbol("=")) => CompareOp::Eq,
            Some(Token::Symbol("!=")) => CompareOp::Ne,
            Some(Token::Symbol("<")) => CompareOp::Lt,
            Some(Token::Symbol("<=")) => CompareOp::Le,
            Some(Token::Symbol(">")) => CompareOp::Gt,
            Some(Token::Symbol(">=")) => CompareOp::Ge,
            other => return Err(malformed(format!("expected an operator after {field}, found {other:?}"))),
        };
        let value = self.literal()?;
        Ok(Condition::Compare { field, op, value })
    }

    fn order_by(&mut self) -> ServerResult<Vec<OrderItem>> {
        let mut items = Vec::new();
        if !self.eat_keyword("order") {
            return Ok(items);
        }
        self.expect_keyword("by")?;
        loop {
            let field = self.identifier("order by field")?;
            let descending = if self.eat_keyword("desc") {
                true
            } else {
                self.eat_keyword("asc");
                false
            };
            let nulls_last = if self.eat_keyword("nulls") {
                if self.eat_keyword("last") {
                    true
                } else {
                    self.expect_keyword("first")?;
                    false
                }
            } else {
                descending
            };
            items.push(OrderItem {
                field,
                descending,
                nulls_last,
            });
            if !self.eat_symbol(",") {
                break;
            }
        }
        Ok(items)
    }

    fn limit(&mut self) -> ServerResult<Option<usize>> {
        if self.eat_keyword("limit") {
            Ok(Some(self.number("limit")?))
        } else {
            Ok(None)
        }
    }
}

impl SoqlQuery {
    /// Parses a statement.
    pub fn parse(text: &str) -> ServerResult<Self> {
        let mut parser = Parser::new(text)?;
        parser.expect_keyword("select")?;
        let fields = parser.field_list(&["from"])?;
        if fields.is_empty() {
            return Err(malformed("select without fields"));
        }
        parser.expect_keyword("from")?;
        let object_type = parser.identifier("object type")?;
        let condition = if parser.eat_keyword("where") {
            Some(parser.condition()?)
        } else {
            None
        };
        let order_by = parser.order_by()?;
        let limit = parser.limit()?;
        let offset = if parser.eat_keyword("offset") {
            parser.number("offset")?
        } else {
            0
        };
        parser.finish()?;
        Ok(Self {
            fields,
            object_type,
            condition,
            order_by,
            limit,
            offset,
        })
    }

    /// Runs the query and returns every matching row, projected.
    pub fn execute(&self, table: &ObjectTable) -> ServerResult<Vec<Value>> {
        if !table.has_type(&self.object_type) {
            return Err(ServerError::UnknownObject(self.object_type.clone()));
        }
        let mut rows: Vec<&Map<String, Value>> = table
            .records(&self.object_type)
            .into_iter()
            .filter(|record| self.condition.as_ref().map_or(true, |c| c.matches(record)))
            .collect();
        sort_rows(&mut rows, &self.order_by);
        Ok(rows
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|record| project(record, &self.fields))
            .collect())
    }
}

impl SoslSearch {
    /// Parses a statement.
    pub fn parse(text: &str) -> ServerResult<Self> {
        let mut parser = Parser::new(text)?;
        parser.expect_keyword("find")?;
        let term = match parser.next() {
            Some(Token::Braced(term)) | Some(Token::Text(term)) => term,
            _ => return Err(malformed("find expects a {term}")),
        };
        let mut name_fields_only = false;
        if parser.eat_keyword("in") {
            let group = parser.identifier("search group")?;
            parser.expect_keyword("fields")?;
            name_fields_only = group.eq_ignore_ascii_case("name");
        }
        let mut returning = Vec::new();
        if parser.eat_keyword("returning") {
            loop {
                returning.push(Self::returning_spec(&mut parser)?);
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        }
        let limit = parser.limit()?;
        parser.finish()?;
        Ok(Self {
            term,
            name_fields_only,
            returning,
            limit,
        })
    }

    fn returning_spec(parser: &mut Parser) -> ServerResult<ReturningSpec> {
        let object_type = parser.identifier("object type")?;
        let mut spec = ReturningSpec {
            object_type,
            fields: Vec::new(),
            condition: None,
            order_by: Vec::new(),
            limit: None,
        };
        if parser.eat_symbol("(") {
            spec.fields = parser.field_list(&["where", "order", "limit"])?;
            if parser.eat_keyword("where") {
                spec.condition = Some(parser.condition()?);
            }
            spec.order_by = parser.order_by()?;
            spec.limit = parser.limit()?;
            parser.expect_symbol(")")?;
        }
        Ok(spec)
    }

    /// Runs the search.
    pub fn execute(&self, table: &ObjectTable) -> Vec<Value> {
        let needle = self.term.replace(['*', '"'], "").trim().to_lowercase();
        let specs: Vec<ReturningSpec> = if self.returning.is_empty() {
            table
                .types()
                .into_iter()
                .map(|object_type| ReturningSpec {
                    object_type: object_type.to_string(),
                    fields: Vec::new(),
                    condition: None,
                    order_by: Vec::new(),
                    limit: None,
                })
                .collect()
        } else {
            self.returning.clone()
        };

        let mut results = Vec::new();
        for spec in &specs {
            let mut rows: Vec<&Map<String, Value>> = table
                .records(&spec.object_type)
                .into_iter()
                .filter(|record| self.term_matches(record, &needle))
                .filter(|record| spec.condition.as_ref().map_or(true, |c| c.matches(record)))
                .collect();
            sort_rows(&mut rows, &spec.order_by);
            let fields = if spec.fields.is_empty() {
                vec![names::ID.to_string()]
            } else {
                spec.fields.clone()
            };
            results.extend(
                rows.into_iter()
                    .take(spec.limit.unwrap_or(usize::MAX))
                    .map(|record| project(record, &fields)),
            );
        }
        results.truncate(self.limit.unwrap_or(usize::MAX));
        results
    }

    fn term_matches(&self, record: &Map<String, Value>, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        record
            .iter()
            .filter(|(key, _)| key.as_str() != names::ATTRIBUTES && key.as_str() != names::ID)
            .filter(|(key, _)| !self.name_fields_only || key.ends_with("Name"))
            .filter_map(|(_, value)| value.as_str())
            .any(|value| value.to_lowercase().contains(needle))
    }
}

/// Looks up a possibly dotted field path.
fn field_value<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let first = parts.next()?;
    let mut current = record
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(first))
        .map(|(_, value)| value)?;
    for part in parts {
        current = current.as_object()?.iter().find(|(key, _)| key.eq_ignore_ascii_case(part))?.1;
    }
    Some(current)
}

/// Projects a record onto `fields`, keeping its `attributes`.
pub(crate) fn project(record: &Map<String, Value>, fields: &[String]) -> Value {
    let mut row = Map::new();
    if let Some(attributes) = record.get(names::ATTRIBUTES) {
        row.insert(names::ATTRIBUTES.into(), attributes.clone());
    }
    for field in fields {
        let name = record
            .keys()
            .find(|key| key.eq_ignore_ascii_case(field))
            .cloned()
            .unwrap_or_else(|| field.clone());
        row.insert(name, field_value(record, field).cloned().unwrap_or(Value::Null));
    }
    Value::Object(row)
}

fn sort_rows(rows: &mut [&Map<String, Value>], order_by: &[OrderItem]) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for item in order_by {
            let left = field_value(a, &item.field).filter(|v| !v.is_null());
            let right = field_value(b, &item.field).filter(|v| !v.is_null());
            let ordering = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => if item.nulls_last { Ordering::Greater } else { Ordering::Less },
                (Some(_), None) => if item.nulls_last { Ordering::Less } else { Ordering::Greater },
                (Some(l), Some(r)) => {
                    let ordering = compare_json(l, r);
                    if item.descending { ordering.reverse() } else { ordering }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_json(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::String(l), Value::String(r)) => match (timestamp::parse_millis(l), timestamp::parse_millis(r)) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => l.to_lowercase().cmp(&r.to_lowercase()),
        },
        _ => left.to_string().cmp(&right.to_string()),
    }
}

/// Orders a field value against a literal; `None` when they don't compare.
fn compare_literal(value: &Value, literal: &Literal) -> Option<Ordering> {
    match literal {
        Literal::Null => None,
        Literal::Bool(expected) => value.as_bool().map(|actual| actual.cmp(expected)),
        Literal::Number(expected) => {
            let actual = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }?;
            actual.partial_cmp(expected)
        }
        Literal::DateTime(expected) => value
            .as_str()
            .and_then(timestamp::parse_millis)
            .map(|actual| actual.cmp(expected)),
        Literal::Text(expected) => match value {
            Value::String(actual) => Some(actual.to_lowercase().cmp(&expected.to_lowercase())),
            Value::Number(_) | Value::Bool(_) => Some(value.to_string().cmp(expected)),
            _ => None,
        },
    }
}

fn literal_equals(value: Option<&Value>, literal: &Literal) -> bool {
    match (value.filter(|v| !v.is_null()), literal) {
        (None, Literal::Null) => true,
        (None, _) | (Some(_), Literal::Null) => false,
        (Some(value), literal) => compare_literal(value, literal) == Some(Ordering::Equal),
    }
}

/// Matches `text` against a pattern with `%` and `_` wildcards, ignoring case.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    // matches[j]: pattern[..j] matches the text consumed so far
    let mut matches = vec![false; pattern.len() + 1];
    matches[0] = true;
    for j in 1..=pattern.len() {
        matches[j] = matches[j - 1] && pattern[j - 1] == '%';
    }
    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matches[j],
                '_' => matches[j - 1],
                p => matches[j - 1] && p == c,
            };
        }
        matches = next;
    }
    matches[pattern.len()]
}

impl Condition {
    /// Evaluates the condition against a record.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match self {
            Condition::And(left, right) => left.matches(record) && right.matches(record),
            Condition::Or(left, right) => left.matches(record) || right.matches(record),
            Condition::Not(inner) => !inner.matches(record),
            Condition::Compare { field, op, value } => {
                let actual = field_value(record, field);
                match op {
                    CompareOp::Eq => literal_equals(actual, value),
                    CompareOp::Ne => !literal_equals(actual, value),
                    _ => {
                        let ordering = actual
                            .filter(|v| !v.is_null())
                            .and_then(|v| compare_literal(v, value));
                        match (op, ordering) {
                            (_, None) => false,
                            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
                            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
                            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
                            (_, Some(o)) => o != Ordering::Less,
                        }
                    }
                }
            }
            Condition::In { field, values, negated } => {
                let actual = field_value(record, field);
                values.iter().any(|v| literal_equals(actual, v)) != *negated
            }
            Condition::Like { field, pattern } => field_value(record, field)
                .and_then(Value::as_str)
                .is_some_and(|text| like(text, pattern)),
        }
    }
}
