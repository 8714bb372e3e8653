use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::datasets::{DatasetTree, RawNode};
use crate::endpoints::{BASE_URL, CSW_PATH, DATASETS_PATH};
use crate::error::{Error, Result};
use crate::query::{Parameters, SearchCriteria};
use crate::search::{FeatureCollection, Search, SearchTransport};

/// Fixed CSW request keys; per-call parameters may not override these.
const CSW_FIXED: [(&str, &str); 4] = [
    ("service", "CSW"),
    ("version", "3.0.0"),
    ("request", "GetRecords"),
    ("outputFormat", "application/json"),
];

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    /// Per-request timeout. `None` disables it.
    pub timeout: Option<Duration>,
    pub verify_tls: bool,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Some(Duration::from_secs(120)),
            verify_tls: true,
            user_agent: concat!("gportal-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Blocking HTTP client for the G-Portal catalogue.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: HttpClient,
}

impl Client {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let base_url = Url::parse(&opts.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let user_agent = HeaderValue::from_str(&opts.user_agent)
            .map_err(|_| Error::InvalidOption(format!("invalid user agent: {}", opts.user_agent)))?;
        headers.insert(USER_AGENT, user_agent);

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .timeout(opts.timeout);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self { base_url, http })
    }

    /// Client against the public G-Portal with default options.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Validate `criteria` and bind the resulting query to this client.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Search<&Client>> {
        Ok(Search::new(self, criteria.build()?))
    }

    /// Fetch the spacecraft/sensor dataset tree.
    ///
    /// This relies on an undocumented endpoint of the web UI.
    pub fn datasets(&self) -> Result<DatasetTree> {
        let raw: Vec<RawNode> = self.get_json(DATASETS_PATH, &[])?;
        DatasetTree::from_raw(raw)
    }

    fn get_json<D: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<D> {
        let url = self.base_url.join(path)?;
        debug!(%url, "GET");

        let body = self
            .http
            .get(url)
            .query(query)
            .send()?
            .error_for_status()?
            .text()?;

        Ok(serde_json::from_str(&body)?)
    }
}

impl SearchTransport for Client {
    fn get_records(&self, params: &Parameters) -> Result<FeatureCollection> {
        let mut query: Vec<(String, String)> = params
            .to_query_pairs()
            .into_iter()
            .filter(|(k, _)| !CSW_FIXED.iter().any(|(fixed, _)| fixed == k))
            .collect();
        query.extend(
            CSW_FIXED
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        self.get_json(CSW_PATH, &query)
    }
}
