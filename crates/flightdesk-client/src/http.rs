use crate::error::{ClientError, Result};
use crate::sse;
use crate::verify::EventVerifier;
use flightdesk_core::event::Event;
use flightdesk_core::flight::SearchParams;
use flightdesk_core::types::{RunId, ThreadId};
use flightdesk_core::JsonValue;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client as HttpClient, Url};
use serde::Serialize;

/// Verified event stream of one run.
pub type RunStream = BoxStream<'static, Result<Event>>;

/// Ids of a run. Both are chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIds {
    pub thread_id: ThreadId,
    pub run_id: RunId,
}

impl RunIds {
    pub fn new(thread_id: impl Into<ThreadId>, run_id: impl Into<RunId>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Fresh random thread and run ids.
    pub fn random() -> Self {
        Self::new(ThreadId::random(), RunId::random())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunBody<'a> {
    thread_id: &'a ThreadId,
    run_id: &'a RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_params: Option<&'a SearchParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_data: Option<&'a JsonValue>,
}

impl<'a> RunBody<'a> {
    fn new(ids: &'a RunIds) -> Self {
        Self {
            thread_id: &ids.thread_id,
            run_id: &ids.run_id,
            message: None,
            search_params: None,
            workflow_id: None,
            input_data: None,
        }
    }
}

/// Client for the `/api/agents/*` run endpoints.
///
/// Every run is decoded from SSE and checked by an [`EventVerifier`] as it
/// arrives, so a stream that breaks the run lifecycle ends in an error.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http_client: HttpClient,
    base_url: Url,
    header_map: HeaderMap,
    debug: bool,
}

impl RelayClient {
    /// Client for the service at `base_url`, e.g. `http://localhost:3001`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(HttpClient::new(), base_url)
    }

    /// Like [`RelayClient::new`], sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidUrl`] if `base_url` does not parse.
    pub fn with_client(http_client: HttpClient, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            http_client,
            base_url,
            header_map: HeaderMap::new(),
            debug: false,
        })
    }

    /// Extra headers sent with every run, such as `x-request-id`.
    pub fn with_headers(mut self, header_map: HeaderMap) -> Self {
        self.header_map = header_map;
        self
    }

    /// Logs each event type as it is verified.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Runs a flight search from structured parameters, optionally with a
    /// free-text hint.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent or the server rejects it.
    pub async fn flight_search(
        &self,
        ids: &RunIds,
        params: &SearchParams,
        message: Option<&str>,
    ) -> Result<RunStream> {
        let body = RunBody {
            search_params: Some(params),
            message,
            ..RunBody::new(ids)
        };
        self.run("api/agents/flight-search", &body).await
    }

    /// Runs a flight search from free text only.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent or the server rejects it.
    pub async fn ask(&self, ids: &RunIds, message: &str) -> Result<RunStream> {
        let body = RunBody {
            message: Some(message),
            ..RunBody::new(ids)
        };
        self.run("api/agents/flight-search", &body).await
    }

    /// Streams a chat reply.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent or the server rejects it.
    pub async fn chat(&self, ids: &RunIds, message: &str) -> Result<RunStream> {
        let body = RunBody {
            message: Some(message),
            ..RunBody::new(ids)
        };
        self.run("api/agents/chat", &body).await
    }

    /// Runs a named workflow.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent or the server rejects it.
    pub async fn workflow(
        &self,
        ids: &RunIds,
        workflow_id: &str,
        input_data: &JsonValue,
    ) -> Result<RunStream> {
        let body = RunBody {
            workflow_id: Some(workflow_id),
            input_data: Some(input_data),
            ..RunBody::new(ids)
        };
        self.run("api/agents/workflow", &body).await
    }

    async fn run(&self, path: &str, body: &RunBody<'_>) -> Result<RunStream> {
        let url = self.base_url.join(path).map_err(|e| ClientError::InvalidUrl {
            url: format!("{}{path}", self.base_url),
            message: e.to_string(),
        })?;
        log::debug!("starting run {} on {url}", body.run_id);

        let response = self
            .http_client
            .post(url)
            .headers(self.header_map.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("run rejected with {status}: {body}");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events = sse::decode(response.bytes_stream());
        Ok(EventVerifier::new()
            .with_debug(self.debug)
            .verify_stream(events))
    }
}

/// Drains a run, returning every event or the first error.
///
/// # Errors
///
/// The first transport, decode or protocol error in the stream.
pub async fn collect_run(stream: RunStream) -> Result<Vec<Event>> {
    use futures::TryStreamExt;
    stream.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_skips_absent_fields() {
        let ids = RunIds::new("t", "r");
        let body = RunBody {
            message: Some("hi"),
            ..RunBody::new(&ids)
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"threadId": "t", "runId": "r", "message": "hi"})
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            RelayClient::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn paths_join_onto_the_base() {
        let client = RelayClient::new("http://localhost:3001").unwrap();
        assert_eq!(
            client.base_url().join("api/agents/chat").unwrap().as_str(),
            "http://localhost:3001/api/agents/chat"
        );
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(RunIds::random(), RunIds::random());
    }
}
