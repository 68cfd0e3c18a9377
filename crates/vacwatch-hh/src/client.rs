//! hh.ru `/vacancies` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, warn};

use vacwatch_store::FilterSet;

use crate::types::SearchResponse;
use crate::{HhError, JobPosting};

/// Public hh.ru API.
pub const DEFAULT_API_URL: &str = "https://api.hh.ru";

/// Largest page the poller asks for.
pub const MAX_PER_PAGE: u32 = 50;

/// Whole-request timeout for a search.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// hh.ru rejects requests without a descriptive client identifier.
pub const USER_AGENT: &str = "VacancyBot/1.0";

/// Something that can produce a batch of vacancies for a filter set.
///
/// Implementations must not fail: transport or decoding problems are logged
/// and reported as an empty batch, so a bad fetch only costs one cycle.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch(&self, filters: &FilterSet) -> Vec<JobPosting>;
}

/// Connection settings for [`HhClient`].
#[derive(Debug, Clone)]
pub struct HhConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Capped at [`MAX_PER_PAGE`].
    pub per_page: u32,
}

impl Default for HhConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            per_page: MAX_PER_PAGE,
        }
    }
}

impl HhConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the hh.ru vacancy search.
pub struct HhClient {
    http: Client,
    config: HhConfig,
}

impl HhClient {
    pub fn new(config: HhConfig) -> Result<Self, HhError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { http, config })
    }

    /// Query string for a filter set.
    ///
    /// Experience is only sent when set. A positive salary floor also asks
    /// for vacancies that state a salary at all.
    pub fn query_params(&self, filters: &FilterSet) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("text", filters.position.trim().to_string()),
            ("area", filters.area_id.to_string()),
            ("per_page", self.config.per_page.min(MAX_PER_PAGE).to_string()),
            ("page", "0".to_string()),
        ];

        if let Some(experience) = filters.experience {
            params.push(("experience", experience.code().to_string()));
        }

        if filters.salary > 0 {
            params.push(("salary", filters.salary.to_string()));
            params.push(("only_with_salary", "true".to_string()));
        }

        params
    }

    /// Run one search, surfacing every failure.
    #[tracing::instrument(skip_all, fields(position = %filters.position, area = filters.area_id))]
    pub async fn search(&self, filters: &FilterSet) -> Result<Vec<JobPosting>, HhError> {
        let url = format!("{}/vacancies", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&self.query_params(filters))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(HhError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HhError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(found = parsed.found, items = parsed.items.len(), "search response");

        let postings: Vec<JobPosting> = parsed.items.into_iter().map(JobPosting::from).collect();
        info!(count = postings.len(), "fetched vacancies from hh.ru");
        Ok(postings)
    }
}

#[async_trait]
impl JobSource for HhClient {
    async fn fetch(&self, filters: &FilterSet) -> Vec<JobPosting> {
        match self.search(filters).await {
            Ok(postings) => postings,
            Err(e) if e.is_timeout() => {
                error!(timeout = ?self.config.timeout, "hh.ru request timed out");
                Vec::new()
            }
            Err(e @ HhError::RateLimited { .. }) => {
                warn!(error = %e, "hh.ru rate limited the search");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "hh.ru search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vacwatch_store::Experience;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HhClient {
        HhClient::new(HhConfig::default().with_base_url(server.uri())).unwrap()
    }

    fn filters() -> FilterSet {
        FilterSet {
            position: "Rust developer".to_string(),
            area_id: 2,
            experience: Some(Experience::Between3And6),
            salary: 200_000,
            ..FilterSet::default()
        }
    }

    #[test]
    fn query_includes_salary_mode_when_floor_is_set() {
        let client = HhClient::new(HhConfig::default()).unwrap();

        let params = client.query_params(&filters());

        assert_eq!(
            params,
            vec![
                ("text", "Rust developer".to_string()),
                ("area", "2".to_string()),
                ("per_page", "50".to_string()),
                ("page", "0".to_string()),
                ("experience", "between3And6".to_string()),
                ("salary", "200000".to_string()),
                ("only_with_salary", "true".to_string()),
            ]
        );
    }

    #[test]
    fn query_omits_optional_filters() {
        let client = HhClient::new(HhConfig::default()).unwrap();
        let filters = FilterSet {
            experience: None,
            salary: 0,
            ..filters()
        };

        let params = client.query_params(&filters);

        assert!(params.iter().all(|(k, _)| *k != "experience"));
        assert!(params.iter().all(|(k, _)| *k != "salary"));
        assert!(params.iter().all(|(k, _)| *k != "only_with_salary"));
    }

    #[test]
    fn page_size_is_capped() {
        let config = HhConfig {
            per_page: 500,
            ..HhConfig::default()
        };
        let client = HhClient::new(config).unwrap();

        let params = client.query_params(&filters());

        assert!(params.contains(&("per_page", "50".to_string())));
    }

    #[tokio::test]
    async fn search_sends_query_and_parses_items() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("text", "Rust developer"))
            .and(query_param("area", "2"))
            .and(query_param("only_with_salary", "true"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": 2,
                "pages": 1,
                "items": [
                    { "id": "1", "name": "Rust developer", "alternate_url": "https://hh.ru/vacancy/1" },
                    { "id": 2, "name": "Senior Rust developer" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let postings = client(&server).search(&filters()).await.unwrap();

        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].id, "1");
        assert_eq!(postings[0].url, "https://hh.ru/vacancy/1");
        assert_eq!(postings[1].id, "2");
    }

    #[tokio::test]
    async fn server_error_degrades_to_empty_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.search(&filters()).await.unwrap_err();
        assert!(matches!(err, HhError::Status { status: 500, .. }));

        assert!(client.fetch(&filters()).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_degrades_to_empty_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(matches!(
            client.search(&filters()).await.unwrap_err(),
            HhError::Json(_)
        ));
        assert!(client.fetch(&filters()).await.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let err = client(&server).search(&filters()).await.unwrap_err();

        assert!(matches!(
            err,
            HhError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "items": [{ "id": "1" }] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = HhClient::new(
            HhConfig::default()
                .with_base_url(server.uri())
                .with_timeout(Duration::from_millis(100)),
        )
        .unwrap();

        let err = client.search(&filters()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(client.fetch(&filters()).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_host_degrades_to_empty_batch() {
        let client = HhClient::new(
            HhConfig::default()
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        assert!(client.fetch(&filters()).await.is_empty());
    }
}
