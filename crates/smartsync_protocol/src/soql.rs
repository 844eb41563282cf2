//! SOQL query builder.

/// Builds a SOQL `select` statement clause by clause.
///
/// # Example
///
/// ```rust
/// use smartsync_protocol::SoqlBuilder;
///
/// let soql = SoqlBuilder::with_fields(["Id", "Name"])
///     .from("Account")
///     .where_clause("Name like 'A%'")
///     .order_by("Name")
///     .limit(10)
///     .build();
/// assert_eq!(
///     soql.as_deref(),
///     Some("select Id, Name from Account where Name like 'A%' order by Name limit 10")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoqlBuilder {
    fields: String,
    from: Option<String>,
    where_clause: Option<String>,
    with: Option<String>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: usize,
    offset: usize,
}

/// Renders `value` as a quoted SOQL string literal, escaping backslashes
/// and single quotes.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl SoqlBuilder {
    /// Starts a query selecting a comma separated field list.
    pub fn with_fields_str(fields: impl Into<String>) -> Self {
        Self {
            fields: fields.into(),
            ..Self::default()
        }
    }

    /// Starts a query selecting the given fields.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        Self::with_fields_str(fields.join(", "))
    }

    /// Sets the object type.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the `where` clause.
    pub fn where_clause(mut self, condition: impl Into<String>) -> Self {
        self.where_clause = Some(condition.into());
        self
    }

    /// Sets the `with` clause.
    pub fn with(mut self, with: impl Into<String>) -> Self {
        self.with = Some(with.into());
        self
    }

    /// Sets the `group by` clause.
    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    /// Sets the `having` clause.
    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    /// Sets the `order by` clause.
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Sets the limit. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset. Zero means no offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Renders the statement, or `None` when fields or object type are missing.
    pub fn build(&self) -> Option<String> {
        let from = non_blank(&self.from)?;
        if self.fields.trim().is_empty() {
            return None;
        }

        let mut query = format!("select {} from {}", self.fields, from);
        if let Some(condition) = non_blank(&self.where_clause) {
            query.push_str(" where ");
            query.push_str(condition);
        }
        if let Some(with) = non_blank(&self.with) {
            query.push_str(" with ");
            query.push_str(with);
        }
        if let Some(group_by) = non_blank(&self.group_by) {
            query.push_str(" group by ");
            query.push_str(group_by);
        }
        if let Some(having) = non_blank(&self.having) {
            query.push_str(" having ");
            query.push_str(having);
        }
        if let Some(order_by) = non_blank(&self.order_by) {
            query.push_str(" order by ");
            query.push_str(order_by);
        }
        if self.limit > 0 {
            query.push_str(&format!(" limit {}", self.limit));
        }
        if self.offset > 0 {
            query.push_str(&format!(" offset {}", self.offset));
        }
        Some(query)
    }

    /// Renders the statement as a query url under `path`.
    pub fn build_with_path(&self, path: &str) -> Option<String> {
        if path.trim().is_empty() {
            return None;
        }
        let query = urlencoding::encode(&self.build()?).into_owned();
        let separator = if path.ends_with('/') { "" } else { "/" };
        Some(format!("{path}{separator}query?q={query}"))
    }
}
