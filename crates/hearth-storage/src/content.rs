//! HTTP client for the headless content store.
//!
//! Queries are rendered into the store's query language with `$param`
//! bindings and sent as idempotent GETs, so every call may be retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::{
    ApplicationDoc, ContentCondition, ContentOp, ContentQuery, ContentRecord, EventDoc,
    FilterValue, HouseDoc, RoomDoc, SortDirection, UserDoc,
};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    classify_reqwest_error, classify_status, BackoffPolicy, ContentCollection, RetryDisposition,
    StoreError, StoreResult,
};

/// A content document type the HTTP client knows how to project.
pub trait ContentDocument: ContentRecord + DeserializeOwned {
    /// Projection selecting exactly the fields the document struct declares.
    const PROJECTION: &'static str;
}

impl ContentDocument for HouseDoc {
    const PROJECTION: &'static str = r#"{ _id, name, "slug": slug.current, tagline, description, "heroImage": heroImage.asset->url, "gallery": gallery[].asset->url, amenities, city }"#;
}

impl ContentDocument for RoomDoc {
    const PROJECTION: &'static str =
        r#"{ _id, name, description, "images": images[].asset->url, features }"#;
}

impl ContentDocument for EventDoc {
    const PROJECTION: &'static str = r#"{ _id, title, "slug": slug.current, summary, "body": pt::text(body), "coverImage": coverImage.asset->url, tags, startsAt, endsAt, isPublic, featured }"#;
}

impl ContentDocument for UserDoc {
    const PROJECTION: &'static str =
        r#"{ _id, displayName, bio, "avatar": avatar.asset->url, pronouns, interests }"#;
}

impl ContentDocument for ApplicationDoc {
    const PROJECTION: &'static str = r#"{ _id, statement, answers[]{ question, answer }, portfolioUrl }"#;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            global_concurrency: 16,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// e.g. `https://<project>.api.sanity.io`
    pub base_url: String,
    pub dataset: String,
    pub api_version: String,
    pub token: Option<String>,
    /// Most ids accepted by one `batch_get` before the URL grows too long.
    pub max_batch_ids: usize,
    pub http: HttpClientConfig,
}

impl ContentStoreConfig {
    pub fn query_url(&self) -> StoreResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        let api_version = self.api_version.trim_start_matches('v');
        Url::parse(&format!(
            "{base}/v{api_version}/data/query/{}",
            self.dataset
        ))
        .map_err(|err| StoreError::Unavailable(format!("invalid content store url: {err}")))
    }
}

/// Retrying JSON GET client shared by every content collection.
#[derive(Debug)]
pub struct ContentFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    backoff: BackoffPolicy,
}

impl ContentFetcher {
    pub fn new(config: &HttpClientConfig) -> StoreResult<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            backoff: config.backoff,
        })
    }

    pub async fn get_json(&self, url: Url, token: Option<&str>) -> StoreResult<JsonValue> {
        let _permit = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("content fetcher is shut down".into()))?;

        let mut attempt = 0usize;
        loop {
            let mut request = self.client.get(url.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            let retry = match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<JsonValue>().await?);
                    }
                    let err = StoreError::HttpStatus {
                        status: status.as_u16(),
                        url: resp.url().path().to_string(),
                    };
                    (classify_status(status), err)
                }
                Err(err) => (classify_reqwest_error(&err), StoreError::Http(err)),
            };

            match retry {
                (RetryDisposition::Retryable, err) if attempt < self.backoff.max_retries => {
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %err, "retrying content store request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                (_, err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// A rendered query expression plus its `$name` bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub expression: String,
    pub params: Vec<(String, JsonValue)>,
}

fn param_value(value: &FilterValue) -> JsonValue {
    match value {
        FilterValue::Text(s) => JsonValue::String(s.clone()),
        FilterValue::Int(i) => JsonValue::from(*i),
        FilterValue::Bool(b) => JsonValue::Bool(*b),
        FilterValue::Time(t) => JsonValue::String(t.to_rfc3339()),
        FilterValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        FilterValue::List(items) => JsonValue::from(items.clone()),
    }
}

fn render_condition(condition: &ContentCondition, param: &str) -> (String, JsonValue) {
    let field = condition.field;
    match condition.op {
        ContentOp::Eq => (format!("{field} == ${param}"), param_value(&condition.value)),
        ContentOp::Gte => (format!("{field} >= ${param}"), param_value(&condition.value)),
        ContentOp::Lte => (format!("{field} <= ${param}"), param_value(&condition.value)),
        ContentOp::Match => {
            let term = match &condition.value {
                FilterValue::Text(s) => JsonValue::String(format!("*{}*", s.trim())),
                other => param_value(other),
            };
            (format!("{field} match ${param}"), term)
        }
        ContentOp::Contains => (format!("${param} in {field}"), param_value(&condition.value)),
        ContentOp::In => (format!("{field} in ${param}"), param_value(&condition.value)),
    }
}

/// Render `*[_type == $type && ...] | order(...) [offset...end] { projection }`.
pub fn render_list_query<D: ContentDocument>(
    query: &ContentQuery,
    limit: usize,
    offset: usize,
) -> RenderedQuery {
    let mut filters = vec!["_type == $type".to_string()];
    let mut params = vec![(
        "type".to_string(),
        JsonValue::String(D::CONTENT_TYPE.to_string()),
    )];
    for (idx, condition) in query.conditions.iter().enumerate() {
        let name = format!("p{idx}");
        let (clause, value) = render_condition(condition, &name);
        filters.push(clause);
        params.push((name, value));
    }

    let order = match query.order {
        Some(sort) => {
            let dir = match sort.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            format!(" | order({} {dir}, _id asc)", sort.column)
        }
        None => " | order(_id asc)".to_string(),
    };

    RenderedQuery {
        expression: format!(
            "*[{}]{order} [{offset}...{}] {}",
            filters.join(" && "),
            offset + limit,
            D::PROJECTION
        ),
        params,
    }
}

pub fn render_get_query<D: ContentDocument>(id: &str) -> RenderedQuery {
    RenderedQuery {
        expression: format!("*[_type == $type && _id == $id][0] {}", D::PROJECTION),
        params: vec![
            ("type".into(), JsonValue::String(D::CONTENT_TYPE.into())),
            ("id".into(), JsonValue::String(id.into())),
        ],
    }
}

pub fn render_batch_query<D: ContentDocument>(ids: &[String]) -> RenderedQuery {
    RenderedQuery {
        expression: format!(
            "*[_type == $type && _id in $ids] | order(_id asc) {}",
            D::PROJECTION
        ),
        params: vec![
            ("type".into(), JsonValue::String(D::CONTENT_TYPE.into())),
            ("ids".into(), JsonValue::from(ids.to_vec())),
        ],
    }
}

/// Content store reached over its HTTP query API.
#[derive(Debug)]
pub struct HttpContentStore {
    config: ContentStoreConfig,
    fetcher: ContentFetcher,
}

impl HttpContentStore {
    pub fn new(config: ContentStoreConfig) -> StoreResult<Self> {
        let fetcher = ContentFetcher::new(&config.http)?;
        Ok(Self { config, fetcher })
    }

    async fn run<T: DeserializeOwned>(&self, rendered: RenderedQuery) -> StoreResult<T> {
        let mut url = self.config.query_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", &rendered.expression);
            for (name, value) in &rendered.params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }

        debug!(expression = %rendered.expression, "content store query");
        let body = self
            .fetcher
            .get_json(url, self.config.token.as_deref())
            .instrument(info_span!("content_query", dataset = %self.config.dataset))
            .await?;
        let parsed: QueryResponse<T> = serde_json::from_value(body)
            .map_err(|err| StoreError::decode("content store response", err))?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl<D: ContentDocument> ContentCollection<D> for HttpContentStore {
    async fn query(&self, query: &ContentQuery, limit: usize, offset: usize) -> StoreResult<Vec<D>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.run(render_list_query::<D>(query, limit, offset)).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<D>> {
        self.run(render_get_query::<D>(id)).await
    }

    async fn batch_get(&self, ids: &[String]) -> StoreResult<Vec<D>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run(render_batch_query::<D>(ids)).await
    }

    fn batch_limit(&self) -> Option<usize> {
        Some(self.config.max_batch_ids.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hearth_core::Sort;

    #[test]
    fn list_query_binds_every_condition_as_a_parameter() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().unwrap();
        let query = ContentQuery::new()
            .ordered_by(Sort::asc("startsAt"))
            .and(ContentCondition::new(
                "isPublic",
                ContentOp::Eq,
                FilterValue::Bool(true),
            ))
            .and(ContentCondition::new(
                "startsAt",
                ContentOp::Gte,
                FilterValue::Time(at),
            ))
            .and(ContentCondition::new(
                "tags",
                ContentOp::Contains,
                FilterValue::text("garden"),
            ));

        let rendered = render_list_query::<EventDoc>(&query, 10, 20);
        assert!(rendered.expression.starts_with(
            "*[_type == $type && isPublic == $p0 && startsAt >= $p1 && $p2 in tags] | order(startsAt asc, _id asc) [20...30] {"
        ));
        assert_eq!(rendered.params[0], ("type".to_string(), JsonValue::from("event")));
        assert_eq!(rendered.params[1].1, JsonValue::Bool(true));
        assert_eq!(rendered.params[2].1, JsonValue::from("2026-03-01T00:00:00+00:00"));
        assert_eq!(rendered.params[3].1, JsonValue::from("garden"));
    }

    #[test]
    fn match_terms_are_wildcarded() {
        let query = ContentQuery::new().and(ContentCondition::new(
            "title",
            ContentOp::Match,
            FilterValue::text(" potluck "),
        ));
        let rendered = render_list_query::<EventDoc>(&query, 5, 0);
        assert_eq!(rendered.params[1].1, JsonValue::from("*potluck*"));
    }

    #[test]
    fn query_url_normalises_version_prefix_and_trailing_slash() {
        let config = ContentStoreConfig {
            base_url: "https://abc.api.sanity.io/".into(),
            dataset: "production".into(),
            api_version: "v2024-01-01".into(),
            token: None,
            max_batch_ids: 100,
            http: HttpClientConfig::default(),
        };
        assert_eq!(
            config.query_url().unwrap().as_str(),
            "https://abc.api.sanity.io/v2024-01-01/data/query/production"
        );
    }

    #[test]
    fn query_response_decodes_typed_documents() {
        let body = serde_json::json!({
            "ms": 4,
            "result": [{ "_id": "room-doc-1", "name": "Garden", "images": null, "features": ["desk"] }]
        });
        let parsed: QueryResponse<Vec<RoomDoc>> = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.result[0].features, vec!["desk".to_string()]);
        assert!(parsed.result[0].images.is_empty());
    }
}
