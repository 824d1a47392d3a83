//! HTTP submission of onboarding artifacts to `POST /api/v1/contracts`.

use async_trait::async_trait;
use clausewatch_core::onboarding::Artifact;
use clausewatch_core::types::DbId;
use clausewatch_onboarding::{ArtifactSubmitter, Identity, SubmitError};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Multipart field the API reads the contract from.
const FILE_FIELD: &str = "file";

#[derive(Deserialize)]
struct SubmissionEnvelope {
    data: Submission,
}

#[derive(Deserialize)]
struct Submission {
    contract: ContractRef,
}

#[derive(Deserialize)]
struct ContractRef {
    id: DbId,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Submits artifacts as multipart uploads with a bearer token.
#[derive(Clone)]
pub struct HttpArtifactSubmitter {
    client: reqwest::Client,
    contracts_url: String,
}

impl HttpArtifactSubmitter {
    pub fn new(contracts_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            contracts_url: contracts_url.into(),
        }
    }
}

#[async_trait]
impl ArtifactSubmitter for HttpArtifactSubmitter {
    async fn submit(&self, artifact: &Artifact, identity: &Identity) -> Result<DbId, SubmitError> {
        let mut part = Part::bytes(artifact.bytes.to_vec()).file_name(artifact.file_name.clone());
        if let Some(content_type) = &artifact.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                SubmitError::Rejected(format!("Invalid content type '{content_type}': {e}"))
            })?;
        }

        let response = self
            .client
            .post(&self.contracts_url)
            .bearer_auth(identity.token())
            .multipart(Form::new().part(FILE_FIELD, part))
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SubmitError::Unauthorized(error_message(response).await))
            }
            s if s.is_success() => {
                let envelope: SubmissionEnvelope = response
                    .json()
                    .await
                    .map_err(|e| SubmitError::Rejected(format!("Unreadable response: {e}")))?;
                tracing::debug!(
                    contract_id = envelope.data.contract.id,
                    status = %status,
                    "Artifact accepted",
                );
                Ok(envelope.data.contract.id)
            }
            _ => Err(SubmitError::Rejected(format!(
                "{status}: {}",
                error_message(response).await
            ))),
        }
    }
}

/// The API's `{error, code}` message, or the status reason if the body has
/// none.
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}
