//! Remote extraction service client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blob::BlobRef;
use crate::config::HttpParserConfig;
use crate::error::{ConfigError, ExtractionError};
use crate::secrets::SecretSources;

use super::{DocumentParser, ParsedDocument};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum response body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest<'a> {
    blob_ref: &'a str,
    document_type_hint: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseResponse {
    confidence_score: i64,
    #[serde(default)]
    parsed_data: Map<String, Value>,
}

impl TryFrom<ParseResponse> for ParsedDocument {
    type Error = ExtractionError;

    fn try_from(response: ParseResponse) -> Result<Self, Self::Error> {
        ParsedDocument::from_raw_score(response.confidence_score, response.parsed_data)
    }
}

/// POSTs `{blobRef, documentTypeHint}` to an endpoint and expects
/// `{confidenceScore, parsedData}` back.
pub struct HttpDocumentParser {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HttpDocumentParser {
    pub fn new(config: &HttpParserConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let token = SecretSources::new(
            config.token.as_deref(),
            config.token_file.as_deref(),
            config.token_env_var.as_deref(),
        )
        .resolve()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DocumentParser for HttpDocumentParser {
    async fn parse_document(
        &self,
        blob_ref: &BlobRef,
        document_hint: &str,
    ) -> Result<ParsedDocument, ExtractionError> {
        let body = ParseRequest {
            blob_ref: blob_ref.as_str(),
            document_type_hint: document_hint,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Failed(format!(
                "parser returned {}: {}",
                status,
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        let parsed: ParseResponse = response.json().await?;
        debug!(
            "Parser scored {} at {} ({} fields)",
            blob_ref,
            parsed.confidence_score,
            parsed.parsed_data.len()
        );
        parsed.try_into()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
