use crate::error::{FailureKind, Result, ScanError};
use crate::result::{NOT_ATTEMPTED, ProbeJob, ProbeResult};
use reqwest::Client;
use reqwest::header::{ACCEPT, LOCATION};
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const ACCEPT_TYPES: &str = "application/activity+json, \
    application/ld+json, \
    application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\", \
    application/jrd+json, \
    application/json";

/// Account bookkeeping the probe reads from and writes to.
pub trait AccountLedger: Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    /// First account (by username) of `domain` not checked since `expiry`.
    fn select_account(
        &self,
        domain: &str,
        expiry: i64,
    ) -> std::result::Result<Option<String>, Self::Error>;

    /// Stamp the account as checked now with the given status label.
    fn record_check(
        &self,
        domain: &str,
        username: &str,
        status: &str,
    ) -> std::result::Result<(), Self::Error>;
}

/// Anything that can run a probe job; the dispatcher is generic over this.
pub trait Probe: Send + Sync + 'static {
    /// `Ok(None)` means there was no eligible account and nothing was done.
    fn probe(&self, job: ProbeJob) -> impl Future<Output = Result<Option<ProbeResult>>> + Send;
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub scheme: String,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            scheme: "https".to_string(),
            user_agent: format!(
                "Webfingerable/{} (+{})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_REPOSITORY")
            ),
        }
    }
}

impl ProbeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

/// What came back from a single endpoint request.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Responded {
        status: u16,
        location: Option<String>,
        label: String,
    },
    Failed(FailureKind),
}

impl Fetch {
    pub fn status_code(&self) -> i32 {
        match self {
            Fetch::Responded { status, .. } => i32::from(*status),
            Fetch::Failed(_) => NOT_ATTEMPTED,
        }
    }

    pub fn location(&self) -> Option<String> {
        match self {
            Fetch::Responded { location, .. } => location.clone(),
            Fetch::Failed(_) => None,
        }
    }

    /// Label written to the account's status column.
    pub fn label(&self) -> &str {
        match self {
            Fetch::Responded { label, .. } => label,
            Fetch::Failed(kind) => kind.as_str(),
        }
    }
}

pub struct Prober<L> {
    client: Client,
    config: ProbeConfig,
    ledger: L,
}

impl<L: AccountLedger> Prober<L> {
    pub fn new(config: ProbeConfig, ledger: L) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            config,
            ledger,
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Run the webfinger then host-meta checks for one domain.
    pub async fn run(&self, job: ProbeJob) -> Result<Option<ProbeResult>> {
        let ProbeJob {
            domain,
            username,
            expiry,
        } = job;

        let username = match username {
            Some(username) => username,
            None => {
                let selected = self
                    .ledger
                    .select_account(&domain, expiry)
                    .map_err(ScanError::ledger)?;
                match selected {
                    Some(username) => username,
                    None => {
                        debug!("No account of {} due for a check", domain);
                        return Ok(None);
                    }
                }
            }
        };

        if username.is_empty() {
            return Err(ScanError::MissingUsername(domain));
        }

        info!(">> {} {}", domain, username);

        let mut result = ProbeResult::new(&domain, &username);

        self.webfinger(&mut result, &domain, &username).await?;

        // Unreachable or nonexistent hosts won't answer host-meta either
        if result.should_fail_fast() {
            debug!("Skipping host-meta for {} after {:?}", domain, result.error);
            return Ok(Some(result));
        }

        self.hostmeta(&mut result, &domain).await?;

        Ok(Some(result))
    }

    async fn webfinger(&self, result: &mut ProbeResult, domain: &str, username: &str) -> Result<()> {
        let mut url = self.endpoint(domain, "/.well-known/webfinger")?;
        url.query_pairs_mut()
            .append_pair("resource", &format!("acct:{}@{}", username, domain));
        let fetch = self.request(url).await;

        result.webfinger_status = fetch.status_code();
        result.webfinger_location = fetch.location();

        self.ledger
            .record_check(domain, username, fetch.label())
            .map_err(ScanError::ledger)?;

        match fetch {
            Fetch::Responded { .. } => result.mark_ok(),
            Fetch::Failed(kind) => result.mark_failed(kind),
        }

        Ok(())
    }

    async fn hostmeta(&self, result: &mut ProbeResult, domain: &str) -> Result<()> {
        let url = self.endpoint(domain, "/.well-known/host-meta")?;
        let fetch = self.request(url).await;

        result.hostmeta_status = fetch.status_code();
        result.hostmeta_location = fetch.location();

        match fetch {
            Fetch::Responded { .. } => result.mark_ok(),
            Fetch::Failed(kind) => result.mark_failed(kind),
        }

        Ok(())
    }

    fn endpoint(&self, domain: &str, path_and_query: &str) -> Result<Url> {
        let raw = format!("{}://{}{}", self.config.scheme, domain, path_and_query);
        Url::parse(&raw).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Send one GET; redirects are reported, never followed.
    pub async fn request(&self, url: Url) -> Fetch {
        debug!("Fetching: {}...", url);

        let response = match self.client.get(url).header(ACCEPT, ACCEPT_TYPES).send().await {
            Ok(response) => response,
            Err(e) => return Fetch::Failed(FailureKind::classify(&e)),
        };

        let status = response.status();
        let location = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        } else if status.as_u16() < 300 {
            Some(response.url().to_string())
        } else {
            None
        };

        let label = status
            .canonical_reason()
            .map(|reason| reason.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"))
            .unwrap_or_else(|| status.as_u16().to_string());

        Fetch::Responded {
            status: status.as_u16(),
            location,
            label,
        }
    }
}

impl<L: AccountLedger> Probe for Prober<L> {
    async fn probe(&self, job: ProbeJob) -> Result<Option<ProbeResult>> {
        self.run(job).await
    }
}
