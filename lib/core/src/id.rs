//! Execution identifiers.
//!
//! An execution id is a ULID: ids minted later sort after ids minted
//! earlier, so execution listings follow creation order without consulting a
//! timestamp column, and the creation instant can be read back from the id
//! itself. Flow and trigger identifiers are operator-chosen names and stay
//! plain strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Prefix on the display form of an execution id, e.g. `exec_01J9...`.
const PREFIX: &str = "exec";

/// Error returned when parsing an execution id from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse execution id: {}", self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Unique identifier for a single execution of a flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExecutionId(Ulid);

impl ExecutionId {
    /// Mints a fresh id stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Wraps an existing ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// The instant this id was minted, as carried in the ULID.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0.timestamp_ms() as i64)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}_{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = ParseIdError;

    /// Accepts both the display form (`exec_...`) and a bare ULID, so ids
    /// copied from logs and ids stored raw both resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(s);

        Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_form_is_prefixed_and_parses_back() {
        let id = ExecutionId::new();
        let display = id.to_string();

        assert!(display.starts_with("exec_"));
        let parsed: ExecutionId = display.parse().expect("display form should parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn accepts_a_bare_ulid() {
        let ulid = Ulid::new();
        let parsed: ExecutionId = ulid.to_string().parse().expect("bare ulid should parse");
        assert_eq!(parsed.as_ulid(), ulid);
    }

    #[test]
    fn rejects_text_that_is_not_an_id() {
        let result: Result<ExecutionId, _> = "yesterday's run".parse();
        let err = result.expect_err("should not parse");
        assert!(err.to_string().contains("failed to parse execution id"));
    }

    #[test]
    fn ids_sort_by_mint_time() {
        let earlier = ExecutionId::from_ulid(Ulid::from_parts(1_000, 999));
        let later = ExecutionId::from_ulid(Ulid::from_parts(2_000, 0));

        assert!(earlier < later);

        let mut ids = vec![later, earlier];
        ids.sort();
        assert_eq!(ids, vec![earlier, later]);
    }

    #[test]
    fn created_at_reads_the_ulid_timestamp() {
        let minted_ms: u64 = 1_715_680_800_000;
        let id = ExecutionId::from_ulid(Ulid::from_parts(minted_ms, 42));

        assert_eq!(id.created_at().timestamp_millis(), minted_ms as i64);
    }

    #[test]
    fn serializes_as_a_plain_string() {
        let id = ExecutionId::new();
        let value = serde_json::to_value(id).expect("serialize");

        let raw = value.as_str().expect("transparent string form");
        let parsed: ExecutionId = raw.parse().expect("round-trip");
        assert_eq!(parsed, id);
    }
}
