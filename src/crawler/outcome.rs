//! Classification of a single listing fetch

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result of fetching one listing page.
///
/// Every transport or protocol failure is folded into a variant here so the
/// harvester can decide how to proceed without inspecting errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx with a JSON body
    Success { payload: Value, via_proxy: bool },
    /// 404
    NotFound,
    /// 5xx, or no response before the deadline when `status` is `None`
    ServerError { status: Option<u16> },
    /// Still blocked (403/429) after the proxy and every direct retry
    Blocked { status: u16 },
    /// 2xx whose body is not valid JSON
    Malformed { reason: String },
    /// 2xx with no body
    EmptyBody { status: u16 },
    /// Any other non-2xx status
    Failed { status: u16 },
    /// Connection-level failure
    Transport { message: String },
}

/// Payload-free discriminant of [`FetchOutcome`], used in reports and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NotFound,
    ServerError,
    Timeout,
    Blocked,
    Malformed,
    EmptyBody,
    Failed,
    Transport,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::Blocked => "blocked",
            Self::Malformed => "malformed",
            Self::EmptyBody => "empty_body",
            Self::Failed => "failed",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::NotFound => OutcomeKind::NotFound,
            Self::ServerError { status: None } => OutcomeKind::Timeout,
            Self::ServerError { .. } => OutcomeKind::ServerError,
            Self::Blocked { .. } => OutcomeKind::Blocked,
            Self::Malformed { .. } => OutcomeKind::Malformed,
            Self::EmptyBody { .. } => OutcomeKind::EmptyBody,
            Self::Failed { .. } => OutcomeKind::Failed,
            Self::Transport { .. } => OutcomeKind::Transport,
        }
    }

    /// HTTP status behind the outcome, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::ServerError { status } => *status,
            Self::Blocked { status } | Self::EmptyBody { status } | Self::Failed { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// How a response status steers the retry ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    NotFound,
    ServerError,
    Blocked,
    Failed,
}

/// Classify a response status
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        404 => StatusClass::NotFound,
        403 | 429 => StatusClass::Blocked,
        s if s >= 500 => StatusClass::ServerError,
        200..=299 => StatusClass::Ok,
        _ => StatusClass::Failed,
    }
}
