use std::{collections::HashMap, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::SolrURL;

/// Client for a single Solr core.
#[derive(Debug, Clone)]
pub struct SolrClient {
    http: reqwest::Client,
    base_url: SolrURL,
    core: String,
}

impl SolrClient {
    pub fn new(
        base_url: impl Into<String>,
        core: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SolrError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SolrError::Other(e.to_string()))?;

        Ok(Self {
            http,
            base_url: SolrURL::new(base_url),
            core: core.into(),
        })
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    fn core_url(&self, handler: &str) -> SolrURL {
        self.base_url.append_path(&self.core).append_path(handler)
    }

    /// Runs a `/select` request. `params` are sent verbatim as query parameters;
    /// `wt=json` is always added.
    pub async fn select<T: DeserializeOwned>(
        &self,
        params: &[(&str, String)],
    ) -> Result<SelectResponse<T>, SolrError> {
        let url = self.core_url("select");
        tracing::debug!(core = %self.core, "Solr select");

        let resp = self
            .http
            .get(url.as_ref())
            .query(params)
            .query(&[("wt", "json")])
            .send()
            .await
            .map_err(SolrError::from_transport)?;

        let resp = check_status(resp).await?;
        resp.json::<SelectResponse<T>>().await.map_err(|e| {
            SolrError::ParsingError(format!("Failed to parse select response: {}", e))
        })
    }

    /// Adds (or replaces) documents, optionally committing right away.
    pub async fn update<T: Serialize>(&self, docs: &[T], commit: bool) -> Result<(), SolrError> {
        let url = self.core_url("update");
        tracing::debug!(core = %self.core, docs = docs.len(), commit, "Solr update");

        let resp = self
            .http
            .post(url.as_ref())
            .query(&[("commit", commit.to_string()), ("wt", "json".to_string())])
            .json(docs)
            .send()
            .await
            .map_err(SolrError::from_transport)?;

        let resp = check_status(resp).await?;
        let body: UpdateResponse = resp.json().await.map_err(|e| {
            SolrError::ParsingError(format!("Failed to parse update response: {}", e))
        })?;

        if body.response_header.status != 0 {
            return Err(SolrError::ResponseError {
                status: body.response_header.status as u16,
                message: "update rejected".to_string(),
            });
        }

        Ok(())
    }

    /// Fetches the number of documents in this core from the core admin API.
    pub async fn num_docs(&self) -> Result<u64, SolrError> {
        let url = self.base_url.append_path("admin/cores");

        let resp = self
            .http
            .get(url.as_ref())
            .query(&[("action", "STATUS"), ("core", self.core.as_str()), ("wt", "json")])
            .send()
            .await
            .map_err(SolrError::from_transport)?;

        let resp = check_status(resp).await?;
        let body: CoreStatusResponse = resp.json().await.map_err(|e| {
            SolrError::ParsingError(format!("Failed to parse core status: {}", e))
        })?;

        body.status
            .get(&self.core)
            .and_then(|core| core.index.as_ref())
            .map(|index| index.num_docs)
            .ok_or_else(|| SolrError::ParsingError(format!("Core '{}' not found", self.core)))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SolrError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(SolrError::Unreachable(format!("{}: {}", status, message)))
    } else {
        Err(SolrError::ResponseError {
            status: status.as_u16(),
            message,
        })
    }
}

#[derive(Error, Debug)]
pub enum SolrError {
    #[error("Solr unreachable: {0}")]
    Unreachable(String),
    #[error("Solr responded with {status}: {message}")]
    ResponseError { status: u16, message: String },
    #[error("ParsingError: {0}")]
    ParsingError(String),
    #[error("Other: {0}")]
    Other(String),
}

impl SolrError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            SolrError::Unreachable(e.to_string())
        } else {
            SolrError::Other(e.to_string())
        }
    }

    /// Whether the service itself could not be reached (as opposed to rejecting the request).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SolrError::Unreachable(_))
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectResponse<T> {
    pub response: SelectDocs<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectDocs<T> {
    pub num_found: u64,
    #[serde(default)]
    pub max_score: Option<f64>,
    pub docs: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(rename = "responseHeader")]
    response_header: ResponseHeader,
}

#[derive(Debug, Deserialize)]
struct ResponseHeader {
    status: i32,
}

#[derive(Debug, Deserialize)]
struct CoreStatusResponse {
    status: HashMap<String, CoreStatus>,
}

#[derive(Debug, Deserialize)]
struct CoreStatus {
    index: Option<CoreIndex>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreIndex {
    num_docs: u64,
}
