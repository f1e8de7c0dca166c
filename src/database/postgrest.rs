use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::BackendConfig;
use crate::database::client::{Condition, DatabaseError, Predicate, Query, QueryClient, QueryOp};
use crate::filter::is_valid_column;

/// `QueryClient` speaking the PostgREST dialect over HTTP
pub struct PostgrestClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
}

impl PostgrestClient {
    pub fn new(config: &BackendConfig) -> Result<Self, DatabaseError> {
        if config.url.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("BACKEND_URL"));
        }

        let mut base = Url::parse(&config.url).map_err(|_| DatabaseError::InvalidUrl(config.url.clone()))?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base
            .join("rest/v1/")
            .map_err(|_| DatabaseError::InvalidUrl(config.url.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, collection: &str) -> Result<Url, DatabaseError> {
        if !is_valid_column(collection) {
            return Err(DatabaseError::QueryError(format!("invalid collection name: {}", collection)));
        }
        self.base
            .join(collection)
            .map_err(|_| DatabaseError::InvalidUrl(collection.to_string()))
    }

    fn request(&self, method: Method, collection: &str, query: &Query) -> Result<RequestBuilder, DatabaseError> {
        let url = self.endpoint(collection)?;
        let pairs = query_pairs(query);
        debug!("{} {} {:?}", method, url, pairs);

        let mut request = self.http.request(method, url).query(&pairs);
        if !self.api_key.is_empty() {
            request = request.header("apikey", &self.api_key).bearer_auth(&self.api_key);
        }
        Ok(request)
    }

    fn require_predicates(query: &Query, action: &str) -> Result<(), DatabaseError> {
        if query.has_predicates() {
            Ok(())
        } else {
            Err(DatabaseError::QueryError(format!("refusing unfiltered {}", action)))
        }
    }
}

#[async_trait]
impl QueryClient for PostgrestClient {
    async fn select(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError> {
        let request = self.request(Method::GET, collection, query)?.query(&[("select", "*")]);
        let response = send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<i64, DatabaseError> {
        let request = self
            .request(Method::HEAD, collection, &query.predicates_only())?
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items");
        let response = send(request).await?;

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DatabaseError::QueryError("backend returned no Content-Range".to_string()))?;

        parse_content_range(range)
            .ok_or_else(|| DatabaseError::QueryError(format!("unexpected Content-Range: {}", range)))
    }

    async fn insert(&self, collection: &str, rows: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .request(Method::POST, collection, &Query::new())?
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn update(&self, collection: &str, query: &Query, patch: Value) -> Result<Vec<Value>, DatabaseError> {
        Self::require_predicates(query, "update")?;
        let request = self
            .request(Method::PATCH, collection, query)?
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn delete(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError> {
        Self::require_predicates(query, "delete")?;
        let request = self
            .request(Method::DELETE, collection, query)?
            .header("Prefer", "return=representation");
        let response = send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        let mut request = self.http.get(self.base.clone());
        if !self.api_key.is_empty() {
            request = request.header("apikey", &self.api_key).bearer_auth(&self.api_key);
        }
        send(request).await.map(|_| ())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, DatabaseError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => DatabaseError::NotFound(body),
        StatusCode::CONFLICT => DatabaseError::Conflict(body),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            DatabaseError::ConnectionError(format!("backend returned {}: {}", status, body))
        }
        _ => DatabaseError::QueryError(format!("backend returned {}: {}", status, body)),
    })
}

fn transport_error(err: reqwest::Error) -> DatabaseError {
    if err.is_connect() || err.is_timeout() {
        DatabaseError::ConnectionError(err.to_string())
    } else {
        DatabaseError::Http(err)
    }
}

/// Render a query chain as PostgREST URL parameters
pub fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut orders = Vec::new();

    for op in query.ops() {
        match op {
            QueryOp::Where(condition) => {
                pairs.push((condition.column.clone(), encode_condition(condition, false)));
            }
            QueryOp::AnyOf(conditions) if conditions.is_empty() => {}
            QueryOp::AnyOf(conditions) => {
                let group = conditions
                    .iter()
                    .map(|c| format!("{}.{}", c.column, encode_condition(c, true)))
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.push(("or".to_string(), format!("({})", group)));
            }
            QueryOp::Order { column, ascending } => {
                orders.push(format!("{}.{}", column, if *ascending { "asc" } else { "desc" }));
            }
            QueryOp::Range { limit, offset } => {
                pairs.push(("limit".to_string(), limit.to_string()));
                pairs.push(("offset".to_string(), offset.to_string()));
            }
        }
    }

    if !orders.is_empty() {
        pairs.push(("order".to_string(), orders.join(",")));
    }
    pairs
}

/// `op.value` form of one condition. Inside an `or=(...)` group scalar values
/// carrying reserved characters are double-quoted.
fn encode_condition(condition: &Condition, grouped: bool) -> String {
    let scalar = |v: &Value| {
        let text = value_text(v);
        if grouped && needs_quotes(&text) {
            quote(&text)
        } else {
            text
        }
    };

    match (condition.predicate, &condition.value) {
        (Predicate::Eq, Value::Null) => "is.null".to_string(),
        (Predicate::Neq, Value::Null) => "not.is.null".to_string(),
        (Predicate::Eq, v) => format!("eq.{}", scalar(v)),
        (Predicate::Neq, v) => format!("neq.{}", scalar(v)),
        (Predicate::Gt, v) => format!("gt.{}", scalar(v)),
        (Predicate::Gte, v) => format!("gte.{}", scalar(v)),
        (Predicate::Lt, v) => format!("lt.{}", scalar(v)),
        (Predicate::Lte, v) => format!("lte.{}", scalar(v)),
        (Predicate::Like, v) => format!("like.{}", scalar(v)),
        (Predicate::ILike, v) => format!("ilike.{}", scalar(v)),
        (Predicate::In, v) => format!("in.({})", list(v)),
        (Predicate::NotIn, v) => format!("not.in.({})", list(v)),
    }
}

fn list(value: &Value) -> String {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|v| {
            let text = value_text(v);
            if needs_quotes(&text) {
                quote(&text)
            } else {
                text
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| matches!(c, ',' | '(' | ')' | '"' | ':' | '\\') || c.is_whitespace())
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Total from `Content-Range: 0-9/42` or `*/0`
fn parse_content_range(raw: &str) -> Option<i64> {
    raw.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(query: &Query) -> Vec<(String, String)> {
        query_pairs(query)
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn renders_filters_order_and_range() {
        let mut query = Query::new()
            .eq("province_id", "p-1")
            .filter("name", Predicate::Like, "*jak*")
            .filter("status", Predicate::In, json!(["draft", "live"]));
        query
            .push(QueryOp::Order { column: "name".into(), ascending: true })
            .push(QueryOp::Range { limit: 20, offset: 40 });

        assert_eq!(
            pairs(&query),
            vec![
                pair("province_id", "eq.p-1"),
                pair("name", "like.*jak*"),
                pair("status", "in.(draft,live)"),
                pair("limit", "20"),
                pair("offset", "40"),
                pair("order", "name.asc"),
            ]
        );
    }

    #[test]
    fn renders_or_group_with_quoting() {
        let mut query = Query::new();
        query.push(QueryOp::AnyOf(vec![
            Condition::new("name", Predicate::ILike, "*new york*"),
            Condition::new("description", Predicate::ILike, "*jakarta*"),
        ]));

        assert_eq!(
            pairs(&query),
            vec![pair("or", "(name.ilike.\"*new york*\",description.ilike.*jakarta*)")]
        );
    }

    #[test]
    fn renders_null_and_negations() {
        let query = Query::new()
            .eq("deleted_at", Value::Null)
            .filter("end_date", Predicate::Neq, Value::Null)
            .filter("id", Predicate::NotIn, json!(["a,b", "c"]))
            .filter("featured", Predicate::Eq, true);

        assert_eq!(
            pairs(&query),
            vec![
                pair("deleted_at", "is.null"),
                pair("end_date", "not.is.null"),
                pair("id", "not.in.(\"a,b\",c)"),
                pair("featured", "eq.true"),
            ]
        );
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }

    #[test]
    fn builds_rest_endpoint_under_base_path() {
        let client = PostgrestClient::new(&BackendConfig {
            url: "https://example.supabase.co".to_string(),
            api_key: "k".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.endpoint("tech_stacks").unwrap().as_str(),
            "https://example.supabase.co/rest/v1/tech_stacks"
        );
        assert!(client.endpoint("bad;name").is_err());
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = PostgrestClient::new(&BackendConfig {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
        })
        .err()
        .unwrap();
        assert!(matches!(err, DatabaseError::ConfigMissing("BACKEND_URL")));
    }
}
