use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Account ledger error: {0}")]
    Ledger(#[source] Box<dyn StdError + Send + Sync>),

    #[error("Missing username for {0}")]
    MissingUsername(String),
}

impl ScanError {
    pub fn ledger<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ScanError::Ledger(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a probe request failed to produce any HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The whole request ran past its deadline.
    Timeout,
    DomainNotFound,
    /// Connection refused.
    ServerNotFound,
    ConnectTimeout,
    SslCertExpired,
    SslCertAltnameInvalid,
    #[serde(rename = "unknown_error")]
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::DomainNotFound => "domain_not_found",
            FailureKind::ServerNotFound => "server_not_found",
            FailureKind::ConnectTimeout => "connect_timeout",
            FailureKind::SslCertExpired => "ssl_cert_expired",
            FailureKind::SslCertAltnameInvalid => "ssl_cert_altname_invalid",
            FailureKind::Unknown => "unknown_error",
        }
    }

    /// Failures after which the host-meta request is not worth sending.
    pub fn is_fail_fast(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::DomainNotFound)
    }

    /// Classify a transport-level reqwest failure.
    pub fn classify(err: &reqwest::Error) -> Self {
        let mut io_kind = None;
        let mut chain = String::new();
        let mut source: Option<&(dyn StdError + 'static)> = Some(err);

        while let Some(e) = source {
            if io_kind.is_none()
                && let Some(io_err) = e.downcast_ref::<io::Error>()
            {
                io_kind = Some(io_err.kind());
            }
            chain.push_str(&e.to_string().to_lowercase());
            chain.push('\n');
            source = e.source();
        }

        let kind = Self::from_parts(err.is_timeout(), err.is_connect(), io_kind, &chain);
        if kind == FailureKind::Unknown {
            warn!("Unclassified request failure: {}", chain.trim_end().replace('\n', ": "));
        }
        kind
    }

    /// Classification over the signals extracted from an error chain.
    /// `chain` is the lower-cased display text of every error in the chain.
    pub fn from_parts(
        timed_out: bool,
        connecting: bool,
        io_kind: Option<io::ErrorKind>,
        chain: &str,
    ) -> Self {
        if connecting && (timed_out || io_kind == Some(io::ErrorKind::TimedOut)) {
            return FailureKind::ConnectTimeout;
        }

        if timed_out {
            return FailureKind::Timeout;
        }

        if chain.contains("dns error")
            || chain.contains("failed to lookup address")
            || chain.contains("name or service not known")
            || chain.contains("no such host")
        {
            return FailureKind::DomainNotFound;
        }

        if io_kind == Some(io::ErrorKind::ConnectionRefused) || chain.contains("connection refused")
        {
            return FailureKind::ServerNotFound;
        }

        if io_kind == Some(io::ErrorKind::TimedOut) || chain.contains("timed out") {
            return FailureKind::ConnectTimeout;
        }

        if chain.contains("certificate") && chain.contains("expired") {
            return FailureKind::SslCertExpired;
        }

        if chain.contains("not valid for name")
            || chain.contains("notvalidforname")
            || chain.contains("hostname mismatch")
        {
            return FailureKind::SslCertAltnameInvalid;
        }

        FailureKind::Unknown
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
