//! URL lifecycle states
//!
//! Every record enters the store as `Pending` and settles into exactly one of
//! the three terminal states. Terminal states are never left again.

use std::fmt;

/// Represents the crawl status of a single URL record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// Discovered and waiting in the frontier
    Pending,

    /// Fetched with an accepted content type
    Fetched,

    /// Transport error, timeout or non-2xx response
    Failed,

    /// Filtered out: binary extension, unaccepted content type, exclusion
    /// pattern or robots.txt
    Skipped,
}

impl UrlStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if moving from `self` to `next` is allowed
    ///
    /// Only `Pending -> {Fetched, Failed, Skipped}` moves are allowed, plus
    /// staying in place.
    pub fn can_transition_to(&self, next: UrlStatus) -> bool {
        *self == next || (*self == Self::Pending && next.is_terminal())
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetched" => Some(Self::Fetched),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Fetched, Self::Failed, Self::Skipped]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
