//! HTTP client for the Elasticsearch `_bulk` API.

use async_trait::async_trait;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use sluice_core::{BackendError, BulkBackend, BulkItemResult, BulkResponse, CommandPair};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// A bulk backend that talks to an Elasticsearch-compatible server.
#[derive(Debug, Clone)]
pub struct ElasticsearchBulkClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, Option<String>)>,
    document_type: bool,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HttpBulkClientError {
    #[snafu(display("Request error"))]
    Request { source: reqwest::Error },
    #[snafu(display("Response error: status={status}, message={message}"))]
    Response { status: StatusCode, message: String },
    #[snafu(display("Failed to encode bulk body"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Failed to decode bulk response"))]
    Decode { source: serde_json::Error },
    #[snafu(display("Invalid bulk response: {message}"))]
    InvalidResponse { message: String },
}

pub type Result<T, E = HttpBulkClientError> = std::result::Result<T, E>;

#[derive(Serialize)]
struct ActionLine<'a> {
    index: ActionMetadata<'a>,
}

#[derive(Serialize)]
struct ActionMetadata<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id")]
    id: &'a str,
}

impl ElasticsearchBulkClient {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            credentials: None,
            document_type: true,
        }
    }

    /// Authenticate requests with HTTP basic auth.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    /// Whether to send the `_type` of documents.
    ///
    /// Servers from Elasticsearch 8 onwards reject it.
    pub fn with_document_type(mut self, document_type: bool) -> Self {
        self.document_type = document_type;
        self
    }

    /// Send the commands as one bulk request.
    pub async fn send(&self, commands: &[CommandPair]) -> Result<BulkResponse> {
        let body = encode_bulk_body(commands, self.document_type)?;
        let url = format!("{}/_bulk", self.base_url);

        debug!(%url, documents = commands.len(), bytes = body.len(), "sending bulk request");

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body);

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref());
        }

        let response = request.send().await.context(RequestSnafu {})?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.context(RequestSnafu {})?;
            return Err(HttpBulkClientError::Response { status, message });
        }

        let body = response.bytes().await.context(RequestSnafu {})?;
        decode_bulk_response(&body)
    }
}

#[async_trait]
impl BulkBackend for ElasticsearchBulkClient {
    async fn bulk(&self, commands: &[CommandPair]) -> std::result::Result<BulkResponse, BackendError> {
        self.send(commands).await.map_err(Into::into)
    }
}

/// Encodes the commands as newline-delimited JSON: one action line followed
/// by one document line per command.
pub fn encode_bulk_body(commands: &[CommandPair], document_type: bool) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    for command in commands {
        let action = ActionLine {
            index: ActionMetadata {
                index: &command.action.index,
                doc_type: document_type.then_some(command.action.doc_type.as_str()),
                id: &command.action.id,
            },
        };

        serde_json::to_writer(&mut body, &action).context(EncodeSnafu {})?;
        body.push(b'\n');
        serde_json::to_writer(&mut body, &command.document).context(EncodeSnafu {})?;
        body.push(b'\n');
    }

    Ok(body)
}

/// Decodes a raw `_bulk` response body.
pub fn decode_bulk_response(body: &[u8]) -> Result<BulkResponse> {
    let body: Value = serde_json::from_slice(body).context(DecodeSnafu {})?;
    parse_bulk_response(&body)
}

/// Extracts the per-item results from a `_bulk` response body.
///
/// Each item is an object with a single key, the action, holding the status.
pub fn parse_bulk_response(body: &Value) -> Result<BulkResponse> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .context(InvalidResponseSnafu {
            message: "missing items",
        })?;

    let items = items
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<BulkItemResult> {
            let result = item
                .as_object()
                .and_then(|action| action.values().next())
                .context(InvalidResponseSnafu {
                    message: format!("item {index} is not an action object"),
                })?;

            let status = result
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|status| u16::try_from(status).ok())
                .context(InvalidResponseSnafu {
                    message: format!("item {index} has no valid status"),
                })?;

            let mut item_result = BulkItemResult::new(status).with_raw(item.clone());
            if let Some(error) = result.get("error") {
                item_result = item_result.with_error(error.clone());
            }

            Ok(item_result)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BulkResponse { items })
}

impl From<HttpBulkClientError> for BackendError {
    fn from(error: HttpBulkClientError) -> Self {
        match error {
            HttpBulkClientError::Request { source } => BackendError::Request {
                message: source.to_string(),
            },
            HttpBulkClientError::Response { status, message } => BackendError::Response {
                status: status.as_u16(),
                message,
            },
            HttpBulkClientError::Encode { source } => BackendError::Request {
                message: format!("failed to encode bulk body: {source}"),
            },
            HttpBulkClientError::Decode { source } => BackendError::InvalidResponse {
                message: format!("undecodable body: {source}"),
            },
            HttpBulkClientError::InvalidResponse { message } => {
                BackendError::InvalidResponse { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sluice_core::{BulkAction, CommandPair};

    use super::*;

    fn command(id: &str, document: Value) -> CommandPair {
        CommandPair::new(
            BulkAction {
                index: "books".to_string(),
                doc_type: "book".to_string(),
                id: id.to_string(),
            },
            document,
        )
    }

    #[test]
    fn test_encode_bulk_body() {
        let commands = vec![
            command("1", json!({ "title": "Dune" })),
            command("2", json!({ "title": "Emma" })),
        ];

        let body = encode_bulk_body(&commands, true).unwrap();
        let body = String::from_utf8(body).unwrap();
        let lines: Vec<_> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            action,
            json!({ "index": { "_index": "books", "_type": "book", "_id": "1" } })
        );
        let document: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(document, json!({ "title": "Dune" }));
        let action: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(action["index"]["_id"], "2");
    }

    #[test]
    fn test_encode_without_document_type() {
        let body = encode_bulk_body(&[command("1", json!({}))], false).unwrap();
        let body = String::from_utf8(body).unwrap();
        let action: Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
        assert_eq!(action, json!({ "index": { "_index": "books", "_id": "1" } }));
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "took": 30,
            "errors": true,
            "items": [
                { "index": { "_index": "books", "_id": "1", "status": 201 } },
                { "index": { "_index": "books", "_id": "2", "status": 503 } },
                {
                    "index": {
                        "_index": "books",
                        "_id": "3",
                        "status": 400,
                        "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" }
                    }
                }
            ]
        });

        let response = parse_bulk_response(&body).unwrap();
        let statuses: Vec<_> = response.items.iter().map(|i| i.status).collect();
        assert_eq!(statuses, [201, 503, 400]);
        assert!(response.items[0].error.is_none());
        assert_eq!(
            response.items[2].error.as_ref().unwrap()["type"],
            "mapper_parsing_exception"
        );
        assert_eq!(response.items[1].raw, body["items"][1]);
    }

    #[test]
    fn test_undecodable_body_is_invalid_response() {
        let err = decode_bulk_response(b"<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, HttpBulkClientError::Decode { .. }));
        assert!(matches!(
            BackendError::from(err),
            BackendError::InvalidResponse { .. }
        ));

        let response = decode_bulk_response(br#"{"items":[{"index":{"status":201}}]}"#).unwrap();
        assert_eq!(response.items[0].status, 201);
    }

    #[test]
    fn test_parse_invalid_bulk_response() {
        let err = parse_bulk_response(&json!({ "took": 1 })).unwrap_err();
        assert!(matches!(err, HttpBulkClientError::InvalidResponse { .. }));

        let err = parse_bulk_response(&json!({ "items": [{ "index": {} }] })).unwrap_err();
        assert!(matches!(err, HttpBulkClientError::InvalidResponse { .. }));

        let err = parse_bulk_response(&json!({ "items": [42] })).unwrap_err();
        assert!(matches!(err, HttpBulkClientError::InvalidResponse { .. }));

        let backend_error = BackendError::from(err);
        assert!(matches!(backend_error, BackendError::InvalidResponse { .. }));
    }
}
