use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::config::Settings;
use crate::domain::{EnumValue, ObjectKind};
use crate::error::BiosubError;

/// Token handle for one archive session, opened once per batch.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
}

/// Identifier and lifecycle state assigned by the archive to a submitted
/// object.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub id: String,
    pub state: String,
}

/// Abstract contract of the remote submission service. The orchestrator only
/// talks to this trait, tests substitute an in-memory implementation.
pub trait ArchiveApi: Send + Sync {
    fn login(&self, settings: &Settings) -> Result<Session, BiosubError>;
    fn logout(&self, session: &Session) -> Result<(), BiosubError>;
    fn fetch_enums(&self, category: &str) -> Result<Vec<EnumValue>, BiosubError>;
    fn submit_object(
        &self,
        session: &Session,
        payload: &serde_json::Value,
        kind: ObjectKind,
        dry_run: bool,
    ) -> Result<SubmissionReceipt, BiosubError>;
    fn query_by_type(
        &self,
        session: &Session,
        kind: ObjectKind,
        state_filter: &str,
    ) -> Result<Vec<serde_json::Value>, BiosubError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    response: ResultSet<T>,
}

#[derive(Deserialize)]
struct ResultSet<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    session: SessionResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResult {
    session_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Blocking JSON client for the archive's submission API.
#[derive(Clone)]
pub struct ArchiveHttpClient {
    client: Client,
    base_url: String,
}

impl ArchiveHttpClient {
    pub fn new(base_url: &str) -> Result<Self, BiosubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("biosub/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BiosubError::ApiHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| BiosubError::ApiHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, BiosubError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "archive request failed".to_string());
        Err(BiosubError::ApiStatus { status, message })
    }
}

impl ArchiveApi for ArchiveHttpClient {
    fn login(&self, settings: &Settings) -> Result<Session, BiosubError> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .client
            .post(url)
            .form(&[
                ("username", settings.submitter_account.as_str()),
                ("password", settings.submitter_password.as_str()),
                ("loginType", "submitter"),
            ])
            .send()
            .map_err(|err| BiosubError::Credentials(err.to_string()))?;
        if response.status().as_u16() == 401 || response.status().as_u16() == 403 {
            return Err(BiosubError::Credentials(
                "archive rejected the submitter credentials".to_string(),
            ));
        }
        let envelope: Envelope<LoginResult> = Self::check_status(response)?
            .json()
            .map_err(|err| BiosubError::Credentials(err.to_string()))?;
        let result = envelope
            .response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| BiosubError::Credentials("login returned no session".to_string()))?;
        Ok(Session {
            token: result.session.session_token,
        })
    }

    fn logout(&self, session: &Session) -> Result<(), BiosubError> {
        let url = format!("{}/logout", self.base_url);
        let response = self
            .client
            .delete(url)
            .header("X-Token", &session.token)
            .send()
            .map_err(|err| BiosubError::ApiHttp(err.to_string()))?;
        Self::check_status(response)?;
        Ok(())
    }

    fn fetch_enums(&self, category: &str) -> Result<Vec<EnumValue>, BiosubError> {
        let url = format!("{}/enums/{category}", self.base_url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BiosubError::CatalogUnavailable(err.to_string()))?;
        let envelope: Envelope<EnumValue> = Self::check_status(response)
            .map_err(|err| BiosubError::CatalogUnavailable(err.to_string()))?
            .json()
            .map_err(|err| BiosubError::CatalogUnavailable(err.to_string()))?;
        Ok(envelope.response.result)
    }

    fn submit_object(
        &self,
        session: &Session,
        payload: &serde_json::Value,
        kind: ObjectKind,
        dry_run: bool,
    ) -> Result<SubmissionReceipt, BiosubError> {
        let action = if dry_run { "VALIDATE" } else { "SUBMIT" };
        let url = format!("{}/{}s?action={action}", self.base_url, kind.as_str());
        let submission_error = |message: String| BiosubError::Submission {
            kind: kind.as_str().to_string(),
            message,
        };
        let response = self
            .client
            .post(url)
            .header("X-Token", &session.token)
            .json(payload)
            .send()
            .map_err(|err| submission_error(err.to_string()))?;
        let envelope: Envelope<ObjectResult> = Self::check_status(response)
            .map_err(|err| submission_error(err.to_string()))?
            .json()
            .map_err(|err| submission_error(err.to_string()))?;
        let result = envelope
            .response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| submission_error("archive returned no object".to_string()))?;
        let id = result
            .id
            .ok_or_else(|| submission_error("archive returned no identifier".to_string()))?;
        Ok(SubmissionReceipt {
            id,
            state: result.status.unwrap_or_else(|| action.to_string()),
        })
    }

    fn query_by_type(
        &self,
        session: &Session,
        kind: ObjectKind,
        state_filter: &str,
    ) -> Result<Vec<serde_json::Value>, BiosubError> {
        let url = format!(
            "{}/{}s?status={state_filter}",
            self.base_url,
            kind.as_str()
        );
        let response = self
            .client
            .get(url)
            .header("X-Token", &session.token)
            .send()
            .map_err(|err| BiosubError::ApiHttp(err.to_string()))?;
        let envelope: Envelope<serde_json::Value> = Self::check_status(response)?
            .json()
            .map_err(|err| BiosubError::ApiHttp(err.to_string()))?;
        Ok(envelope.response.result)
    }
}
