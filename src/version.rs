use std::fmt;

use crate::error::StompError;

/// STOMP protocol versions known to this client, ordered by preference
/// (1.2 over 1.1 over 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StompVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl StompVersion {
    /// Versions in descending preference order, the order advertised in
    /// the `accept-version` header.
    pub const PREFERRED: [StompVersion; 3] =
        [StompVersion::V1_2, StompVersion::V1_1, StompVersion::V1_0];

    /// Value used in `accept-version` and `version` headers.
    pub fn as_header_value(&self) -> &'static str {
        match self {
            StompVersion::V1_0 => "1.0",
            StompVersion::V1_1 => "1.1",
            StompVersion::V1_2 => "1.2",
        }
    }

    /// WebSocket subprotocol identifier registered for this version.
    pub fn subprotocol(&self) -> &'static str {
        match self {
            StompVersion::V1_0 => "v10.stomp",
            StompVersion::V1_1 => "v11.stomp",
            StompVersion::V1_2 => "v12.stomp",
        }
    }

    pub fn from_header_value(s: &str) -> Option<Self> {
        match s.trim() {
            "1.0" => Some(StompVersion::V1_0),
            "1.1" => Some(StompVersion::V1_1),
            "1.2" => Some(StompVersion::V1_2),
            _ => None,
        }
    }

    /// Comma-separated `accept-version` value, e.g. "1.2,1.1,1.0".
    pub fn accept_version_header() -> String {
        Self::PREFERRED
            .iter()
            .map(|v| v.as_header_value())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Resolve the version announced by a CONNECTED frame. A missing header
    /// means a STOMP 1.0 server; an unparseable one is a protocol error.
    pub fn negotiate(connected_version: Option<&str>) -> Result<Self, StompError> {
        match connected_version {
            None => Ok(StompVersion::V1_0),
            Some(v) => StompVersion::from_header_value(v)
                .ok_or_else(|| StompError::Transport(format!("unsupported version {v:?}"))),
        }
    }
}

impl fmt::Display for StompVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header_value())
    }
}
