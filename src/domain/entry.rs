/// Validator record persisted per cache key.
///
/// Absent fields are empty strings, never a literal "null". The record is
/// stored as four pipe-delimited fields with a trailing delimiter:
///
/// ```text
/// file_name|etag|last_modified|cache_control|
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Resolved on-disk filename of the cached content (not a full path).
    pub file_name: String,
    pub etag: String,
    pub last_modified: String,
    pub cache_control: String,
}

impl CacheEntry {
    /// ETag validator, if one was captured.
    pub fn etag(&self) -> Option<&str> {
        non_empty(&self.etag)
    }

    /// Last-Modified validator, if one was captured.
    pub fn last_modified(&self) -> Option<&str> {
        non_empty(&self.last_modified)
    }

    pub fn has_validators(&self) -> bool {
        self.etag().is_some() || self.last_modified().is_some()
    }

    /// Serialize to the pipe-delimited record format.
    pub fn to_record(&self) -> String {
        format!(
            "{}|{}|{}|{}|",
            self.file_name, self.etag, self.last_modified, self.cache_control
        )
    }

    /// Parse a pipe-delimited record. Fields are trimmed; records with fewer
    /// than four fields are rejected so the caller can fall back to an empty
    /// entry.
    pub fn parse_record(record: &str) -> Option<Self> {
        let fields: Vec<&str> = record.split('|').map(str::trim).collect();
        if fields.len() < 4 {
            return None;
        }
        Some(Self {
            file_name: fields[0].to_string(),
            etag: fields[1].to_string(),
            last_modified: fields[2].to_string(),
            cache_control: fields[3].to_string(),
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
