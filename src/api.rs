//! REST API access.
//!
//! The panel only talks to the cluster through [`ApiClient`], so the poller and
//! dispatcher can be driven by an in-memory client in tests. [`HttpApiClient`]
//! is the production implementation on top of `reqwest`.

use crate::command::{ApiRequest, HttpMethod};
use crate::config::{ApiConfig, AuthConfig};
use crate::instance::{StatusRecord, VmIdentity};
use crate::{PanelError, Result, log_debug, log_info};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send one request and return the `data` member of the response envelope.
    async fn send(&self, request: &ApiRequest) -> Result<Value>;
}

/// `GET /nodes/{node}/qemu/{vmid}/status/current`
pub async fn fetch_status(api: &dyn ApiClient, identity: &VmIdentity) -> Result<StatusRecord> {
    let data = api.send(&ApiRequest::status_current(identity)).await?;
    if data.is_null() {
        return Ok(StatusRecord::default());
    }
    Ok(serde_json::from_value(data)?)
}

#[derive(Debug, Clone)]
enum Credentials {
    Anonymous,
    Token(String),
    Ticket { ticket: String, csrf_token: Option<String> },
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_prevention_token: Option<String>,
}

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: RwLock<Credentials>,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout())
            .build()?;

        let credentials = match &config.auth {
            None => Credentials::Anonymous,
            Some(AuthConfig::Token {
                user,
                token_id,
                secret,
            }) => Credentials::Token(format!("PVEAPIToken={}!{}={}", user, token_id, secret)),
            Some(AuthConfig::Ticket {
                ticket: Some(ticket),
                csrf_token,
                ..
            }) => Credentials::Ticket {
                ticket: ticket.clone(),
                csrf_token: csrf_token.clone(),
            },
            // Username/password: filled in by `login`.
            Some(AuthConfig::Ticket { .. }) => Credentials::Anonymous,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: RwLock::new(credentials),
        })
    }

    /// Build the client and, for password auth, obtain a ticket.
    pub async fn connect(config: &ApiConfig) -> Result<Self> {
        let api = Self::new(config)?;
        if let Some(AuthConfig::Ticket {
            username: Some(username),
            password: Some(password),
            ticket: None,
            ..
        }) = &config.auth
        {
            api.login(username, password).await?;
        }
        Ok(api)
    }

    /// `POST /access/ticket`
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        log_info!("Requesting API ticket for {}", username);

        let response = self
            .client
            .post(format!("{}/access/ticket", self.base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(PanelError::Auth(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        let body: Value = response.json().await?;
        let data: TicketData = serde_json::from_value(body.get("data").cloned().unwrap_or(Value::Null))
            .map_err(|e| PanelError::Auth(format!("malformed ticket response: {}", e)))?;

        let mut credentials = self
            .credentials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *credentials = Credentials::Ticket {
            ticket: data.ticket,
            csrf_token: data.csrf_prevention_token,
        };
        Ok(())
    }

    fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, request: &ApiRequest) -> Result<Value> {
        log_debug!("API request: {}", request);

        let url = self.url(&request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url).query(&request.params),
            HttpMethod::Delete => self.client.delete(url).query(&request.params),
            HttpMethod::Post => self.client.post(url).form(&request.params),
        };

        match self.credentials() {
            Credentials::Anonymous => {}
            Credentials::Token(value) => {
                builder = builder.header(reqwest::header::AUTHORIZATION, value);
            }
            Credentials::Ticket { ticket, csrf_token } => {
                builder = builder.header(reqwest::header::COOKIE, format!("PVEAuthCookie={}", ticket));
                if request.method != HttpMethod::Get {
                    if let Some(token) = csrf_token {
                        builder = builder.header("CSRFPreventionToken", token);
                    }
                }
            }
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PanelError::Api {
                status: status.as_u16(),
                status_text: status_text(status, &body),
            });
        }

        let body: Value = response.json().await?;
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

/// `"500 Internal Server Error: VM 100 already running"`; the detail comes
/// from the `message` or `errors` members when the server sends them.
fn status_text(status: reqwest::StatusCode, body: &str) -> String {
    let mut text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        if !trimmed.is_empty() && trimmed.len() < 200 {
            text.push_str(": ");
            text.push_str(trimmed);
        }
        return text;
    };

    let mut details = Vec::new();
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        details.push(message.trim().to_string());
    }
    if let Some(errors) = json.get("errors").and_then(Value::as_object) {
        for (param, error) in errors {
            let error = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            details.push(format!("{}: {}", param, error.trim()));
        }
    }
    if !details.is_empty() {
        text.push_str(": ");
        text.push_str(&details.join(", "));
    }
    text
}
