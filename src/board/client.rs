use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::BoardError;
use super::types::{SearchPage, Vacancy, VacancySummary};

const USER_AGENT: &str = concat!("vacancy-scribe/", env!("CARGO_PKG_VERSION"));

/// Per-request bound for job board calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only client for the job board search and detail endpoints.
pub struct JobBoardClient {
    client: Client,
    search_url: String,
    api_key: String,
    experience: Vec<String>,
}

impl JobBoardClient {
    pub fn new(
        search_url: String,
        api_key: String,
        experience: Vec<String>,
    ) -> Result<Self, BoardError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            search_url,
            api_key,
            experience,
        })
    }

    /// One page of search results for `query`, filtered by the configured
    /// experience levels.
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, BoardError> {
        let mut params: Vec<(&str, String)> = self
            .experience
            .iter()
            .map(|level| ("experience", level.clone()))
            .collect();
        params.push(("text", query.to_string()));
        params.push(("per_page", per_page.to_string()));
        params.push(("page", page.to_string()));

        debug!(query, page, per_page, "searching vacancies");
        self.get_json(self.client.get(&self.search_url).query(&params), &self.search_url)
            .await
    }

    /// Full record behind a search result.
    pub async fn vacancy(&self, summary: &VacancySummary) -> Result<Vacancy, BoardError> {
        debug!(id = %summary.id, "fetching vacancy detail");
        self.get_json(self.client.get(&summary.url), &summary.url).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, BoardError> {
        let response = request.bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BoardError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| BoardError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
