//! Remote data client.
//!
//! The shell performs the actual network I/O, so every call is split at its
//! suspension point: [`ApiClient`] prepares an authenticated `crux_http`
//! request, and the `parse_*` / [`expect_success`] functions interpret the
//! [`HttpResult`] that comes back. Nothing here retries; a failure is
//! returned to the caller, which offers a manual refresh.

use crux_http::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capabilities::{bearer, GuardError, Http, HttpError, HttpMethod, HttpResult, ValidatedUrl};
use crate::event::Event;
use crate::model::{ApiConfig, Collection, EntityKey, ListFilter, Session};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionError {
    #[error("You are not signed in")]
    MissingToken,
    #[error("No embassy selected")]
    MissingEmbassy,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientError {
    /// Non-2xx response, or a GraphQL response carrying errors.
    #[error("{message}")]
    Request { status: u16, message: String },

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("network error: {0}")]
    Transport(#[from] HttpError),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Request { status, message } => AppError::new(ErrorKind::from_status(status), message)
                .with_context("http_status", status.to_string()),
            ClientError::Precondition(PreconditionError::MissingToken) => {
                AppError::new(ErrorKind::Authentication, PreconditionError::MissingToken.to_string())
            }
            ClientError::Precondition(p) => AppError::new(ErrorKind::Precondition, p.to_string()),
            ClientError::Transport(t) => AppError::new(ErrorKind::Network, t.to_string()),
            ClientError::Decode(reason) => AppError::new(ErrorKind::Deserialization, reason),
        }
    }
}

/// One page of a collection as returned by a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "results")]
        items: Vec<T>,
        #[serde(default, alias = "totalCount", alias = "count")]
        total: Option<u64>,
    },
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Builds authenticated requests against the configured backend.
#[derive(Clone, Copy)]
pub struct ApiClient<'a> {
    config: &'a ApiConfig,
    session: &'a Session,
    http: &'a Http<Event>,
}

impl<'a> ApiClient<'a> {
    pub fn new(config: &'a ApiConfig, session: &'a Session, http: &'a Http<Event>) -> Self {
        Self {
            config,
            session,
            http,
        }
    }

    /// `GET {base}/{endpoint}?{params}`.
    pub fn fetch_collection(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<RequestBuilder<Event>, ClientError> {
        let token = self.token()?;
        let mut url = self.endpoint_url(endpoint)?;
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        self.request(HttpMethod::Get, url, token)
    }

    /// List request for one of the dashboard collections. The embassy id is
    /// a required filter.
    pub fn fetch_list(
        &self,
        collection: Collection,
        filter: &ListFilter,
    ) -> Result<RequestBuilder<Event>, ClientError> {
        if filter.embassy_id.is_none() {
            return Err(PreconditionError::MissingEmbassy.into());
        }
        self.fetch_collection(collection.path(), &filter.query_pairs())
    }

    pub fn mutate<B: Serialize>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<RequestBuilder<Event>, ClientError> {
        let token = self.token()?;
        let url = self.endpoint_url(endpoint)?;
        let request = self.request(method, url, token)?;
        match body {
            Some(body) => request
                .body_json(body)
                .map_err(|e| PreconditionError::InvalidRequest(e.to_string()).into()),
            None => Ok(request),
        }
    }

    /// `DELETE {base}/{collection}/{id}`. A blank id would address the whole
    /// collection, so it never leaves the core.
    pub fn delete(&self, key: &EntityKey) -> Result<RequestBuilder<Event>, ClientError> {
        if key.id.trim().is_empty() {
            return Err(PreconditionError::InvalidRequest(format!(
                "{} id is empty",
                key.collection.noun()
            ))
            .into());
        }
        let token = self.token()?;
        let mut url = self.endpoint_url(key.collection.path())?;
        url.path_segments_mut()
            .map_err(|()| PreconditionError::InvalidRequest("base URL cannot have a path".into()))?
            .push(&key.id);
        self.request(HttpMethod::Delete, url, token)
    }

    pub fn graphql(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<RequestBuilder<Event>, ClientError> {
        self.mutate(
            &self.config.graphql_path,
            HttpMethod::Post,
            Some(&GraphQlRequest { query, variables }),
        )
    }

    fn token(&self) -> Result<&'a str, PreconditionError> {
        self.session
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(PreconditionError::MissingToken)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ClientError> {
        let base = if self.config.base_url.ends_with('/') {
            self.config.base_url.clone()
        } else {
            format!("{}/", self.config.base_url)
        };
        let base = ValidatedUrl::new(base).map_err(invalid_request)?;
        base.as_url()
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| PreconditionError::InvalidRequest(e.to_string()).into())
    }

    fn request(
        &self,
        method: HttpMethod,
        url: Url,
        token: &str,
    ) -> Result<RequestBuilder<Event>, ClientError> {
        let url = ValidatedUrl::from_url(url).map_err(invalid_request)?;
        let authorization = bearer(token).map_err(invalid_request)?;
        Ok(self
            .http
            .request(method, url.into_url())
            .header("Accept", "application/json")
            .header("Authorization", authorization.as_str()))
    }
}

fn invalid_request(e: GuardError) -> ClientError {
    PreconditionError::InvalidRequest(e.to_string()).into()
}

pub fn generic_status_message(status: u16) -> String {
    format!("Request failed with status {status}")
}

/// Pulls a human-readable message out of a JSON error body. Understands
/// `{"message": ..}`, `{"error": ..}`, `{"error": {"message": ..}}` and
/// GraphQL's `{"errors": [{"message": ..}]}`.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;

    let candidates = [
        value.get("message"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("error"),
        value
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message")),
        value.get("detail"),
    ];

    let found = candidates
        .into_iter()
        .flatten()
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string);
    found
}

/// Status and body of a completed exchange. `crux_http` reports 4xx/5xx as
/// `Error::Http` with the body attached, so both arms land here.
struct Reply {
    status: u16,
    body: Vec<u8>,
}

fn into_reply(result: HttpResult) -> Result<Reply, ClientError> {
    match result {
        Ok(mut response) => Ok(Reply {
            status: response.status().into(),
            body: response.take_body().unwrap_or_default(),
        }),
        Err(HttpError::Http(e)) => Ok(Reply {
            status: e.code.into(),
            body: e.body.unwrap_or_default(),
        }),
        Err(HttpError::Json(reason)) => Err(ClientError::Decode(reason)),
        Err(e) => Err(ClientError::Transport(e)),
    }
}

/// Accepts any 2xx response; anything else becomes `ClientError::Request`.
fn check_status(result: HttpResult) -> Result<Reply, ClientError> {
    let reply = into_reply(result)?;
    if (200..300).contains(&reply.status) {
        return Ok(reply);
    }

    let message = extract_error_message(&reply.body)
        .unwrap_or_else(|| generic_status_message(reply.status));
    Err(ClientError::Request {
        status: reply.status,
        message,
    })
}

pub fn expect_success(result: HttpResult) -> Result<(), ClientError> {
    check_status(result).map(|_| ())
}

pub fn parse_json<T: DeserializeOwned>(result: HttpResult) -> Result<T, ClientError> {
    let reply = check_status(result)?;
    serde_json::from_slice(&reply.body).map_err(|e| ClientError::Decode(e.to_string()))
}

pub fn parse_collection<T: DeserializeOwned>(result: HttpResult) -> Result<Page<T>, ClientError> {
    Ok(match parse_json::<CollectionBody<T>>(result)? {
        CollectionBody::Bare(items) => Page { items, total: None },
        CollectionBody::Wrapped { items, total } => Page { items, total },
    })
}

pub fn parse_graphql<T: DeserializeOwned>(result: HttpResult) -> Result<T, ClientError> {
    let reply = check_status(result)?;
    let body: GraphQlResponse<T> = serde_json::from_slice(&reply.body)
        .map_err(|e| ClientError::Decode(e.to_string()))?;

    if let Some(error) = body.errors.into_iter().next() {
        return Err(ClientError::Request {
            status: reply.status,
            message: error.message,
        });
    }

    body.data
        .ok_or_else(|| ClientError::Decode("GraphQL response has no data".into()))
}
