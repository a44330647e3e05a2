use crate::error::FailureKind;
use serde::{Deserialize, Serialize};

/// Status code recorded for a request that was never sent or never answered.
pub const NOT_ATTEMPTED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Error,
    Unknown,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "ok",
            ProbeStatus::Error => "error",
            ProbeStatus::Unknown => "unknown",
        }
    }
}

/// Input handed to a probe worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeJob {
    pub domain: String,
    pub username: Option<String>,
    /// Unix seconds; accounts checked at or after this are not selected.
    pub expiry: i64,
}

impl ProbeJob {
    pub fn new(domain: impl Into<String>, expiry: i64) -> Self {
        Self {
            domain: domain.into(),
            username: None,
            expiry,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Outcome of one probe of a domain's discovery endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub domain: String,
    pub actor: String,
    pub status: ProbeStatus,
    pub error: Option<FailureKind>,
    pub webfinger_status: i32,
    pub webfinger_location: Option<String>,
    pub hostmeta_status: i32,
    pub hostmeta_location: Option<String>,
    pub nodeinfo_status: i32,
    pub nodeinfo: Option<String>,
}

impl ProbeResult {
    pub fn new(domain: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            actor: actor.into(),
            status: ProbeStatus::Unknown,
            error: None,
            webfinger_status: NOT_ATTEMPTED,
            webfinger_location: None,
            hostmeta_status: NOT_ATTEMPTED,
            hostmeta_location: None,
            nodeinfo_status: NOT_ATTEMPTED,
            nodeinfo: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }

    /// True once webfinger failed in a way that makes host-meta pointless.
    pub fn should_fail_fast(&self) -> bool {
        self.status != ProbeStatus::Ok && self.error.is_some_and(|kind| kind.is_fail_fast())
    }

    pub(crate) fn mark_ok(&mut self) {
        self.status = ProbeStatus::Ok;
    }

    pub(crate) fn mark_failed(&mut self, kind: FailureKind) {
        self.status = ProbeStatus::Error;
        self.error = Some(kind);
    }
}
