//! Well-known field and key names of the REST API.

/// Server id field of an sobject record.
pub const ID: &str = "Id";
/// Lower-case id key returned by create calls.
pub const LOWER_ID: &str = "id";
/// Modification timestamp field.
pub const LAST_MODIFIED_DATE: &str = "LastModifiedDate";
/// System modification timestamp field.
pub const SYSTEM_MODSTAMP: &str = "SystemModstamp";
/// Record name field.
pub const NAME: &str = "Name";

/// Records array of a query response.
pub const RECORDS: &str = "records";
/// Total size of a query response.
pub const TOTAL_SIZE: &str = "totalSize";
/// Url of the next query page.
pub const NEXT_RECORDS_URL: &str = "nextRecordsUrl";
/// Done flag of a query response.
pub const DONE: &str = "done";
/// Recent items array of a metadata response.
pub const RECENT_ITEMS: &str = "recentItems";
/// Records array of a search response.
pub const SEARCH_RECORDS: &str = "searchRecords";
/// Attributes object attached to every record.
pub const ATTRIBUTES: &str = "attributes";
/// Object type path inside a record.
pub const ATTRIBUTES_TYPE: &str = "attributes.type";
/// Object type key inside `attributes`.
pub const TYPE: &str = "type";
/// Url key inside `attributes`.
pub const URL: &str = "url";

/// Error message key of an error body.
pub const MESSAGE: &str = "message";
/// Error code key of an error body.
pub const ERROR_CODE: &str = "errorCode";

/// Composite request array key.
pub const COMPOSITE_REQUEST: &str = "compositeRequest";
/// Composite response array key.
pub const COMPOSITE_RESPONSE: &str = "compositeResponse";
/// All-or-none flag of a composite request.
pub const ALL_OR_NONE: &str = "allOrNone";
/// Reference id of a composite subrequest.
pub const REFERENCE_ID: &str = "referenceId";
/// Status code of a composite subresponse.
pub const HTTP_STATUS_CODE: &str = "httpStatusCode";

/// Maximum number of subrequests in one composite call.
pub const MAX_COMPOSITE_SUBREQUESTS: usize = 25;

/// Fields that are never sent back to the server on create or update.
pub const READ_ONLY_FIELDS: [&str; 3] = [ID, LAST_MODIFIED_DATE, SYSTEM_MODSTAMP];

/// Request header carrying query options such as `batchSize=500`.
pub const QUERY_OPTIONS_HEADER: &str = "Sforce-Query-Options";
