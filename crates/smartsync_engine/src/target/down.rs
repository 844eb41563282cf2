//! Sync down targets: what to fetch from the server.

use crate::context::RestContext;
use crate::error::{SyncError, SyncResult};
use crate::target::registry::TargetRegistry;
use serde_json::{json, Map, Value};
use smartsync_protocol::{
    names, quote_literal, recent_item_ids, search_records, timestamp, QueryResponse, RestRequest,
    SoqlBuilder,
};
use tracing::debug;

/// The query family of a sync down target.
#[derive(Debug, Clone, PartialEq)]
pub enum DownTargetKind {
    /// A SOQL query, paged through `nextRecordsUrl`.
    Soql {
        /// The query.
        query: String,
    },
    /// A SOSL search (single page).
    Sosl {
        /// The search.
        query: String,
    },
    /// Most recently used records of one object type (single page).
    Mru {
        /// Object type, e.g. `Account`.
        object_type: String,
        /// Fields to fetch.
        field_list: Vec<String>,
    },
    /// A target implemented outside the engine, resolved by name.
    Custom {
        /// Name the fetcher factory is registered under.
        name: String,
        /// Opaque parameters handed to the factory.
        params: Value,
    },
}

/// Describes what a sync down fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDownTarget {
    /// Query family.
    pub kind: DownTargetKind,
    /// Field holding the server id.
    pub id_field_name: String,
    /// Field holding the server modification date.
    pub modification_date_field_name: String,
}

/// One page of fetched records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchPage {
    /// Records of this page.
    pub records: Vec<Value>,
    /// Cursor for [`DownFetcher::continue_fetch`]; `None` on the last page.
    pub next_cursor: Option<String>,
    /// Total number of records of the whole fetch, `-1` when unknown.
    pub total_size: i64,
}

/// Fetch behaviour of a sync down target.
///
/// A fetcher is created per run. `continue_fetch` may only be called after
/// `start_fetch`, with the cursor of the previous page.
pub trait DownFetcher: Send {
    /// Fetches the first page of records modified after `max_time_stamp`
    /// (epoch ms; `<= 0` fetches everything).
    fn start_fetch(&mut self, ctx: &RestContext<'_>, max_time_stamp: i64) -> SyncResult<FetchPage>;

    /// Fetches the page behind `cursor`.
    fn continue_fetch(&mut self, ctx: &RestContext<'_>, cursor: &str) -> SyncResult<FetchPage>;
}

fn require_non_empty(value: &str, what: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::invalid_target(format!("{what} must not be empty")));
    }
    Ok(())
}

impl SyncDownTarget {
    fn with_kind(kind: DownTargetKind) -> Self {
        Self {
            kind,
            id_field_name: names::ID.to_string(),
            modification_date_field_name: names::LAST_MODIFIED_DATE.to_string(),
        }
    }

    /// A SOQL target.
    pub fn soql(query: impl Into<String>) -> SyncResult<Self> {
        let query = query.into();
        require_non_empty(&query, "soql query")?;
        Ok(Self::with_kind(DownTargetKind::Soql { query }))
    }

    /// A SOSL target.
    pub fn sosl(query: impl Into<String>) -> SyncResult<Self> {
        let query = query.into();
        require_non_empty(&query, "sosl query")?;
        Ok(Self::with_kind(DownTargetKind::Sosl { query }))
    }

    /// An MRU target.
    pub fn mru<I, S>(object_type: impl Into<String>, field_list: I) -> SyncResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let object_type = object_type.into();
        let field_list: Vec<String> = field_list.into_iter().map(Into::into).collect();
        require_non_empty(&object_type, "object type")?;
        if field_list.is_empty() {
            return Err(SyncError::invalid_target("mru target needs a field list"));
        }
        for field in &field_list {
            require_non_empty(field, "field name")?;
        }
        Ok(Self::with_kind(DownTargetKind::Mru {
            object_type,
            field_list,
        }))
    }

    /// A custom target resolved through the [`TargetRegistry`].
    pub fn custom(name: impl Into<String>, params: Value) -> SyncResult<Self> {
        let name = name.into();
        require_non_empty(&name, "custom target name")?;
        Ok(Self::with_kind(DownTargetKind::Custom { name, params }))
    }

    /// Overrides the id field.
    pub fn with_id_field_name(mut self, name: impl Into<String>) -> Self {
        self.id_field_name = name.into();
        self
    }

    /// Overrides the modification date field.
    pub fn with_modification_date_field_name(mut self, name: impl Into<String>) -> Self {
        self.modification_date_field_name = name.into();
        self
    }

    /// Persisted name of the query family.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            DownTargetKind::Soql { .. } => "soql",
            DownTargetKind::Sosl { .. } => "sosl",
            DownTargetKind::Mru { .. } => "mru",
            DownTargetKind::Custom { .. } => "custom",
        }
    }

    /// Latest modification timestamp among `records`, in epoch ms.
    ///
    /// Returns `-1` if any record lacks a parseable modification date, so
    /// that the checkpoint is left unchanged.
    pub fn latest_modification_time_stamp(&self, records: &[Value]) -> i64 {
        let mut latest = -1;
        for record in records {
            let Some(ts) = record
                .get(&self.modification_date_field_name)
                .and_then(Value::as_str)
                .and_then(timestamp::parse_millis)
            else {
                return -1;
            };
            latest = latest.max(ts);
        }
        latest
    }

    /// Creates the fetcher for one run.
    pub fn fetcher(&self, registry: &TargetRegistry) -> SyncResult<Box<dyn DownFetcher>> {
        let fetcher: Box<dyn DownFetcher> = match &self.kind {
            DownTargetKind::Soql { query } => Box::new(SoqlFetcher {
                query: query.clone(),
                modification_date_field_name: self.modification_date_field_name.clone(),
                started: false,
            }),
            DownTargetKind::Sosl { query } => Box::new(SoslFetcher {
                query: query.clone(),
                modification_date_field_name: self.modification_date_field_name.clone(),
            }),
            DownTargetKind::Mru {
                object_type,
                field_list,
            } => Box::new(MruFetcher {
                object_type: object_type.clone(),
                field_list: field_list.clone(),
                id_field_name: self.id_field_name.clone(),
                modification_date_field_name: self.modification_date_field_name.clone(),
            }),
            DownTargetKind::Custom { name, params } => registry.down_fetcher(name, params)?,
        };
        Ok(fetcher)
    }

    /// Encodes the target with its persisted key names.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::from(self.type_name()));
        match &self.kind {
            DownTargetKind::Soql { query } | DownTargetKind::Sosl { query } => {
                map.insert("query".into(), Value::from(query.clone()));
            }
            DownTargetKind::Mru {
                object_type,
                field_list,
            } => {
                map.insert("sobjectType".into(), Value::from(object_type.clone()));
                map.insert("fieldlist".into(), json!(field_list));
            }
            DownTargetKind::Custom { name, params } => {
                map.insert("name".into(), Value::from(name.clone()));
                map.insert("params".into(), params.clone());
            }
        }
        map.insert("idFieldName".into(), Value::from(self.id_field_name.clone()));
        map.insert(
            "modificationDateFieldName".into(),
            Value::from(self.modification_date_field_name.clone()),
        );
        Value::Object(map)
    }

    /// Decodes the [`Self::to_json`] form.
    pub fn from_json(json: &Value) -> SyncResult<Self> {
        let text = |key: &str| -> SyncResult<String> {
            json.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SyncError::invalid_target(format!("target without {key}")))
        };

        let target = match text("type")?.as_str() {
            "soql" => Self::soql(text("query")?)?,
            "sosl" => Self::sosl(text("query")?)?,
            "mru" => {
                let field_list: Vec<String> = json
                    .get("fieldlist")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                Self::mru(text("sobjectType")?, field_list)?
            }
            "custom" => Self::custom(
                text("name")?,
                json.get("params").cloned().unwrap_or(Value::Null),
            )?,
            other => return Err(SyncError::invalid_target(format!("unknown down target type {other:?}"))),
        };

        let mut target = target;
        if let Ok(name) = text("idFieldName") {
            target.id_field_name = name;
        }
        if let Ok(name) = text("modificationDateFieldName") {
            target.modification_date_field_name = name;
        }
        Ok(target)
    }
}

/// Clauses that may follow the `where` clause of a SOQL query.
const TRAILING_CLAUSES: [&str; 6] = ["group", "order", "limit", "offset", "with", "for"];

/// Adds `<field> > <iso timestamp>` to a SOQL query. An existing `where`
/// predicate is kept in parentheses after the new filter; otherwise a
/// `where` clause goes before any trailing clause.
///
/// Queries with `max_time_stamp <= 0`, or without a `from`, are returned
/// unchanged.
pub fn add_filter_for_resync(query: &str, field: &str, max_time_stamp: i64) -> String {
    if max_time_stamp <= 0 {
        return query.to_string();
    }
    let filter = format!("{field} > {}", timestamp::format_millis(max_time_stamp));
    let words = top_level_words(query);
    let Some(from) = words.iter().position(|(_, word)| word == "from") else {
        return query.to_string();
    };

    // Skip the object type, which may itself be named like a clause.
    let clauses = words.get(from + 2..).unwrap_or_default();
    let tail_at = clauses
        .iter()
        .enumerate()
        .find(|(i, (_, word))| match word.as_str() {
            "group" | "order" => clauses.get(i + 1).is_some_and(|(_, next)| next == "by"),
            other => TRAILING_CLAUSES.contains(&other),
        })
        .map_or(query.len(), |(_, (offset, _))| *offset);
    let tail = &query[tail_at..];
    let joined_tail = if tail.is_empty() { String::new() } else { format!(" {tail}") };

    let existing_where = clauses
        .iter()
        .find(|(offset, word)| word == "where" && *offset < tail_at)
        .map(|(offset, _)| *offset);
    match existing_where {
        Some(offset) => {
            let predicate_at = offset + "where".len();
            let predicate = query[predicate_at..tail_at].trim();
            format!("{} {filter} and ({predicate}){joined_tail}", &query[..predicate_at])
        }
        None => format!("{} where {filter}{joined_tail}", query[..tail_at].trim_end()),
    }
}

/// Lower-cased words of a query with their byte offsets, outside string
/// literals and parentheses.
fn top_level_words(query: &str) -> Vec<(usize, String)> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut in_literal = false;
    let mut escaped = false;
    let mut word_start = None;
    for (i, c) in query.char_indices() {
        if in_literal {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = word_start.take() {
            if depth == 0 {
                words.push((start, query[start..i].to_ascii_lowercase()));
            }
        }
        match c {
            '\'' => in_literal = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        if depth == 0 {
            words.push((start, query[start..].to_ascii_lowercase()));
        }
    }
    words
}

/// Pages through a SOQL query.
struct SoqlFetcher {
    query: String,
    modification_date_field_name: String,
    started: bool,
}

impl SoqlFetcher {
    fn page(&self, ctx: &RestContext<'_>, request: RestRequest) -> SyncResult<FetchPage> {
        let request = request.with_header(
            names::QUERY_OPTIONS_HEADER,
            format!("batchSize={}", ctx.page_size()),
        );
        let body = ctx.send_json(request)?;
        let page = QueryResponse::from_json(&body)?;
        Ok(FetchPage {
            records: page.records,
            next_cursor: page.next_records_url,
            total_size: page.total_size,
        })
    }
}

impl DownFetcher for SoqlFetcher {
    fn start_fetch(&mut self, ctx: &RestContext<'_>, max_time_stamp: i64) -> SyncResult<FetchPage> {
        let query = add_filter_for_resync(&self.query, &self.modification_date_field_name, max_time_stamp);
        debug!(%query, "starting soql fetch");
        let page = self.page(ctx, RestRequest::for_query(ctx.api_version(), &query)?)?;
        self.started = true;
        Ok(page)
    }

    fn continue_fetch(&mut self, ctx: &RestContext<'_>, cursor: &str) -> SyncResult<FetchPage> {
        if !self.started {
            return Err(not_started());
        }
        self.page(ctx, RestRequest::for_query_more(cursor)?)
    }
}

/// Runs a SOSL search.
///
/// The search API cannot filter on modification dates, so records not
/// modified after the checkpoint are dropped client side.
struct SoslFetcher {
    query: String,
    modification_date_field_name: String,
}

impl DownFetcher for SoslFetcher {
    fn start_fetch(&mut self, ctx: &RestContext<'_>, max_time_stamp: i64) -> SyncResult<FetchPage> {
        let body = ctx.send_json(RestRequest::for_search(ctx.api_version(), &self.query)?)?;
        let mut records = search_records(&body)?;
        if max_time_stamp > 0 {
            records.retain(|record| {
                record
                    .get(&self.modification_date_field_name)
                    .and_then(Value::as_str)
                    .and_then(timestamp::parse_millis)
                    .map_or(true, |ts| ts > max_time_stamp)
            });
        }
        Ok(FetchPage {
            total_size: records.len() as i64,
            records,
            next_cursor: None,
        })
    }

    fn continue_fetch(&mut self, _ctx: &RestContext<'_>, _cursor: &str) -> SyncResult<FetchPage> {
        Err(no_more_pages("sosl"))
    }
}

/// Fetches the recently viewed records of one object type.
struct MruFetcher {
    object_type: String,
    field_list: Vec<String>,
    id_field_name: String,
    modification_date_field_name: String,
}

impl DownFetcher for MruFetcher {
    fn start_fetch(&mut self, ctx: &RestContext<'_>, max_time_stamp: i64) -> SyncResult<FetchPage> {
        let metadata = ctx.send_json(RestRequest::for_metadata(ctx.api_version(), &self.object_type)?)?;
        let ids = recent_item_ids(&metadata, &self.id_field_name)?;
        if ids.is_empty() {
            return Ok(FetchPage {
                records: Vec::new(),
                next_cursor: None,
                total_size: 0,
            });
        }

        let in_list: Vec<String> = ids.iter().map(|id| quote_literal(id)).collect();
        let query = SoqlBuilder::with_fields(&self.field_list)
            .from(self.object_type.as_str())
            .where_clause(format!("{} IN ({})", self.id_field_name, in_list.join(", ")))
            .build()
            .ok_or_else(|| SyncError::invalid_target("mru target produced an empty query"))?;
        let query = add_filter_for_resync(&query, &self.modification_date_field_name, max_time_stamp);

        let body = ctx.send_json(RestRequest::for_query(ctx.api_version(), &query)?)?;
        let page = QueryResponse::from_json(&body)?;
        Ok(FetchPage {
            total_size: page.records.len() as i64,
            records: page.records,
            next_cursor: None,
        })
    }

    fn continue_fetch(&mut self, _ctx: &RestContext<'_>, _cursor: &str) -> SyncResult<FetchPage> {
        Err(no_more_pages("mru"))
    }
}

fn not_started() -> SyncError {
    SyncError::InvalidStateTransition {
        from: "not started".into(),
        to: "continue fetch".into(),
    }
}

fn no_more_pages(kind: &str) -> SyncError {
    SyncError::InvalidStateTransition {
        from: format!("{kind} single page"),
        to: "continue fetch".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::network::MockNetwork;

    #[test]
    fn constructors_validate() {
        assert!(SyncDownTarget::soql("").is_err());
        assert!(SyncDownTarget::sosl("  ").is_err());
        assert!(SyncDownTarget::mru("Account", Vec::<String>::new()).is_err());
        assert!(SyncDownTarget::mru("", ["Id"]).is_err());
        assert!(SyncDownTarget::custom("", Value::Null).is_err());

        let target = SyncDownTarget::soql("select Id from Account").unwrap();
        assert_eq!(target.id_field_name, "Id");
        assert_eq!(target.modification_date_field_name, "LastModifiedDate");
    }

    #[test]
    fn json_keys() {
        let target = SyncDownTarget::mru("Account", ["Id", "Name"])
            .unwrap()
            .with_modification_date_field_name("SystemModstamp");
        let json = target.to_json();
        assert_eq!(json["type"], "mru");
        assert_eq!(json["sobjectType"], "Account");
        assert_eq!(json["fieldlist"], json!(["Id", "Name"]));
        assert_eq!(json["modificationDateFieldName"], "SystemModstamp");
        assert_eq!(SyncDownTarget::from_json(&json).unwrap(), target);

        let custom = SyncDownTarget::custom("briefcase", json!({"limit": 5})).unwrap();
        assert_eq!(SyncDownTarget::from_json(&custom.to_json()).unwrap(), custom);

        assert!(SyncDownTarget::from_json(&json!({"type": "graphql"})).is_err());
        assert!(SyncDownTarget::from_json(&json!({"type": "soql"})).is_err());
    }

    #[test]
    fn resync_filter_injection() {
        let ts = 1_500;
        assert_eq!(
            add_filter_for_resync("select Id from Account", "LastModifiedDate", ts),
            "select Id from Account where LastModifiedDate > 1970-01-01T00:00:01.500Z"
        );
        assert_eq!(
            add_filter_for_resync(
                "select Id from Account where Name = 'x' limit 10",
                "LastModifiedDate",
                ts
            ),
            "select Id from Account where LastModifiedDate > 1970-01-01T00:00:01.500Z and (Name = 'x') limit 10"
        );
        assert_eq!(
            add_filter_for_resync("SELECT Id FROM Account ORDER BY Name", "SystemModstamp", ts),
            "SELECT Id FROM Account where SystemModstamp > 1970-01-01T00:00:01.500Z ORDER BY Name"
        );
        assert_eq!(
            add_filter_for_resync("select Id from Account", "LastModifiedDate", 0),
            "select Id from Account"
        );
    }

    #[test]
    fn resync_filter_binds_tighter_than_or() {
        assert_eq!(
            add_filter_for_resync(
                "select Id from Account where Name = 'a' or Name = 'b' order by Name",
                "LastModifiedDate",
                1_500
            ),
            "select Id from Account where LastModifiedDate > 1970-01-01T00:00:01.500Z and (Name = 'a' or Name = 'b') order by Name"
        );
    }

    #[test]
    fn resync_filter_handles_multi_line_queries() {
        let query = "select Id,\n  Name\nfrom Account\nwhere Name = 'a'\n  or Name = 'b'\nlimit 5";
        assert_eq!(
            add_filter_for_resync(query, "LastModifiedDate", 1_500),
            "select Id,\n  Name\nfrom Account\nwhere LastModifiedDate > 1970-01-01T00:00:01.500Z and (Name = 'a'\n  or Name = 'b') limit 5"
        );
        assert_eq!(
            add_filter_for_resync("select Id\nfrom Account\nlimit 5", "LastModifiedDate", 1_500),
            "select Id\nfrom Account where LastModifiedDate > 1970-01-01T00:00:01.500Z limit 5"
        );
    }

    #[test]
    fn resync_filter_ignores_keywords_in_literals_and_subqueries() {
        assert_eq!(
            add_filter_for_resync(
                "select Id, (select Id from Contacts where Email != null) from Order where Name = 'x where y limit 1'",
                "LastModifiedDate",
                1_500
            ),
            "select Id, (select Id from Contacts where Email != null) from Order where LastModifiedDate > 1970-01-01T00:00:01.500Z and (Name = 'x where y limit 1')"
        );
    }

    #[test]
    fn latest_time_stamp() {
        let target = SyncDownTarget::soql("select Id from Account").unwrap();
        let records = vec![
            json!({"LastModifiedDate": "1970-01-01T00:00:02.000+0000"}),
            json!({"LastModifiedDate": "1970-01-01T00:00:05.000+0000"}),
        ];
        assert_eq!(target.latest_modification_time_stamp(&records), 5_000);
        assert_eq!(target.latest_modification_time_stamp(&[]), -1);

        let garbled = vec![json!({"LastModifiedDate": "soon"})];
        assert_eq!(target.latest_modification_time_stamp(&garbled), -1);
    }

    #[test]
    fn soql_fetcher_pages() {
        let network = MockNetwork::new();
        network.push_json(
            200,
            json!({"totalSize": 3, "done": false, "records": [{"Id": "1"}, {"Id": "2"}],
                   "nextRecordsUrl": "/services/data/v60.0/query/cur-2"}),
        );
        network.push_json(200, json!({"totalSize": 3, "done": true, "records": [{"Id": "3"}]}));
        let config = SyncConfig::default().with_page_size(2);
        let ctx = RestContext::new(&network, &config);

        let target = SyncDownTarget::soql("select Id from Account").unwrap();
        let mut fetcher = target.fetcher(&TargetRegistry::new()).unwrap();

        let first = fetcher.start_fetch(&ctx, 0).unwrap();
        assert_eq!(first.total_size, 3);
        let cursor = first.next_cursor.unwrap();
        let second = fetcher.continue_fetch(&ctx, &cursor).unwrap();
        assert_eq!(second.records, vec![json!({"Id": "3"})]);
        assert!(second.next_cursor.is_none());

        let requests = network.requests();
        assert_eq!(requests[1].path, "/services/data/v60.0/query/cur-2");
        assert_eq!(
            requests[0].headers.get("Sforce-Query-Options").map(String::as_str),
            Some("batchSize=2")
        );
    }

    #[test]
    fn continue_before_start_is_rejected() {
        let network = MockNetwork::new();
        let config = SyncConfig::default();
        let ctx = RestContext::new(&network, &config);
        let target = SyncDownTarget::soql("select Id from Account").unwrap();
        let mut fetcher = target.fetcher(&TargetRegistry::new()).unwrap();

        assert!(matches!(
            fetcher.continue_fetch(&ctx, "/cursor"),
            Err(SyncError::InvalidStateTransition { .. })
        ));
        assert_eq!(network.request_count(), 0);
    }

    #[test]
    fn sosl_filters_old_records() {
        let network = MockNetwork::new();
        network.push_json(
            200,
            json!({"searchRecords": [
                {"Id": "old", "LastModifiedDate": "1970-01-01T00:00:01.000+0000"},
                {"Id": "new", "LastModifiedDate": "1970-01-01T00:00:09.000+0000"}
            ]}),
        );
        let config = SyncConfig::default();
        let ctx = RestContext::new(&network, &config);
        let target = SyncDownTarget::sosl("find {acme}").unwrap();
        let mut fetcher = target.fetcher(&TargetRegistry::new()).unwrap();

        let page = fetcher.start_fetch(&ctx, 5_000).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0]["Id"], "new");
        assert_eq!(page.total_size, 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn mru_queries_recent_ids() {
        let network = MockNetwork::new();
        network.push_json(200, json!({"recentItems": [{"Id": "001"}, {"Id": "002"}]}));
        network.push_json(200, json!({"totalSize": 2, "done": true, "records": [{"Id": "001"}, {"Id": "002"}]}));
        let config = SyncConfig::default();
        let ctx = RestContext::new(&network, &config);
        let target = SyncDownTarget::mru("Account", ["Id", "Name"]).unwrap();
        let mut fetcher = target.fetcher(&TargetRegistry::new()).unwrap();

        let page = fetcher.start_fetch(&ctx, 0).unwrap();
        assert_eq!(page.records.len(), 2);

        let requests = network.requests();
        assert_eq!(requests[0].path, "/services/data/v60.0/sobjects/Account");
        assert_eq!(
            requests[1].query_param("q").as_deref(),
            Some("select Id, Name from Account where Id IN ('001', '002')")
        );
    }

    #[test]
    fn mru_without_recent_items_is_empty() {
        let network = MockNetwork::new();
        network.push_json(200, json!({"recentItems": []}));
        let config = SyncConfig::default();
        let ctx = RestContext::new(&network, &config);
        let target = SyncDownTarget::mru("Account", ["Id"]).unwrap();
        let mut fetcher = target.fetcher(&TargetRegistry::new()).unwrap();

        let page = fetcher.start_fetch(&ctx, 0).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(network.request_count(), 1);
    }
}
