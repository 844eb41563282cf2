//! SOSL search builders.

/// Characters with a meaning in SOSL search terms.
const RESERVED: [char; 15] = [
    '\\', '+', '^', '~', '\'', '-', '[', ']', '{', '}', '(', ')', '&', ':', '!',
];

/// Escapes SOSL reserved characters with a backslash.
pub fn escape_search_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One `returning` spec of a SOSL search: `Account(Id, Name where ... limit n)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoslReturningBuilder {
    object_name: String,
    fields: Option<String>,
    where_clause: Option<String>,
    order_by: Option<String>,
    with_network: Option<String>,
    limit: usize,
}

impl SoslReturningBuilder {
    /// Starts a returning spec for `object_name`.
    pub fn with_object_name(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            ..Self::default()
        }
    }

    /// Sets the comma separated field list.
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Sets the `where` clause.
    pub fn where_clause(mut self, condition: impl Into<String>) -> Self {
        self.where_clause = Some(condition.into());
        self
    }

    /// Sets the `order by` clause.
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Sets the `with network` filter.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.with_network = Some(network.into());
        self
    }

    /// Sets the limit. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the spec, or `None` without an object name.
    pub fn build(&self) -> Option<String> {
        if self.object_name.trim().is_empty() {
            return None;
        }
        let mut clauses = Vec::new();
        if let Some(fields) = self.fields.as_deref().filter(|f| !f.trim().is_empty()) {
            clauses.push(fields.to_string());
        }
        if let Some(condition) = self.where_clause.as_deref().filter(|w| !w.trim().is_empty()) {
            clauses.push(format!("where {condition}"));
        }
        if let Some(order_by) = self.order_by.as_deref().filter(|o| !o.trim().is_empty()) {
            clauses.push(format!("order by {order_by}"));
        }
        if let Some(network) = self.with_network.as_deref().filter(|n| !n.trim().is_empty()) {
            clauses.push(format!("with network = {network}"));
        }
        if self.limit > 0 {
            clauses.push(format!("limit {}", self.limit));
        }
        if clauses.is_empty() {
            Some(self.object_name.clone())
        } else {
            Some(format!("{}({})", self.object_name, clauses.join(" ")))
        }
    }
}

/// Builds a SOSL `find` statement.
///
/// # Example
///
/// ```rust
/// use smartsync_protocol::{SoslBuilder, SoslReturningBuilder};
///
/// let sosl = SoslBuilder::with_search_term("Acme-Corp")
///     .search_group("name fields")
///     .returning(SoslReturningBuilder::with_object_name("Account").fields("Id, Name"))
///     .build();
/// assert_eq!(
///     sosl.as_deref(),
///     Some("find {Acme\\-Corp} in name fields returning Account(Id, Name)")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoslBuilder {
    search_term: String,
    search_group: Option<String>,
    returning: Vec<SoslReturningBuilder>,
    division_filter: Option<String>,
    data_category: Option<String>,
    limit: usize,
}

impl SoslBuilder {
    /// Starts a search for `term`; reserved characters are escaped.
    pub fn with_search_term(term: &str) -> Self {
        Self {
            search_term: escape_search_term(term),
            ..Self::default()
        }
    }

    /// Sets the search group (`all fields`, `name fields`, ...).
    pub fn search_group(mut self, group: impl Into<String>) -> Self {
        self.search_group = Some(group.into());
        self
    }

    /// Adds a returning spec.
    pub fn returning(mut self, spec: SoslReturningBuilder) -> Self {
        self.returning.push(spec);
        self
    }

    /// Sets the division filter.
    pub fn division_filter(mut self, filter: impl Into<String>) -> Self {
        self.division_filter = Some(filter.into());
        self
    }

    /// Sets the data category filter.
    pub fn data_category(mut self, category: impl Into<String>) -> Self {
        self.data_category = Some(category.into());
        self
    }

    /// Sets the limit. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the statement, or `None` without a search term.
    pub fn build(&self) -> Option<String> {
        if self.search_term.trim().is_empty() {
            return None;
        }
        let mut query = format!("find {{{}}}", self.search_term);
        if let Some(group) = self.search_group.as_deref().filter(|g| !g.trim().is_empty()) {
            query.push_str(" in ");
            query.push_str(group);
        }
        let specs: Vec<String> = self.returning.iter().filter_map(SoslReturningBuilder::build).collect();
        if !specs.is_empty() {
            query.push_str(" returning ");
            query.push_str(&specs.join(", "));
        }
        if let Some(filter) = self.division_filter.as_deref().filter(|f| !f.trim().is_empty()) {
            query.push_str(" with ");
            query.push_str(filter);
        }
        if let Some(category) = self.data_category.as_deref().filter(|c| !c.trim().is_empty()) {
            query.push_str(" with data category ");
            query.push_str(category);
        }
        if self.limit > 0 {
            query.push_str(&format!(" limit {}", self.limit));
        }
        Some(query)
    }

    /// Renders the statement as a search url under `path`.
    pub fn build_with_path(&self, path: &str) -> Option<String> {
        if path.trim().is_empty() {
            return None;
        }
        let query = urlencoding::encode(&self.build()?).into_owned();
        let separator = if path.ends_with('/') { "" } else { "/" };
        Some(format!("{path}{separator}search?q={query}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape_search_term("a+b"), "a\\+b");
        assert_eq!(escape_search_term("(x)"), "\\(x\\)");
        assert_eq!(escape_search_term("plain"), "plain");
        assert_eq!(escape_search_term("c:\\"), "c\\:\\\\");
    }

    #[test]
    fn empty_term_builds_nothing() {
        assert_eq!(SoslBuilder::with_search_term("").build(), None);
    }

    #[test]
    fn full_statement() {
        let sosl = SoslBuilder::with_search_term("acme")
            .search_group("all fields")
            .returning(
                SoslReturningBuilder::with_object_name("Account")
                    .fields("Id, Name")
                    .where_clause("Industry = 'Tech'")
                    .order_by("Name")
                    .limit(5),
            )
            .returning(SoslReturningBuilder::with_object_name("Contact"))
            .division_filter("division = 'Global'")
            .limit(20)
            .build()
            .unwrap();
        assert_eq!(
            sosl,
            "find {acme} in all fields returning \
             Account(Id, Name where Industry = 'Tech' order by Name limit 5), Contact \
             with division = 'Global' limit 20"
        );
    }

    #[test]
    fn returning_without_object_is_skipped() {
        let sosl = SoslBuilder::with_search_term("x")
            .returning(SoslReturningBuilder::with_object_name(""))
            .build();
        assert_eq!(sosl.as_deref(), Some("find {x}"));
    }
}
