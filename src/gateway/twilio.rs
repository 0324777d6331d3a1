//! Twilio gateway over the Messages REST API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{OutboundSms, SentMessage, SmsGateway};

const PROVIDER: &str = "twilio";
const API_VERSION: &str = "2010-04-01";

/// Successful `Messages.json` response (only the fields we use).
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Twilio error document.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

/// Twilio REST client.
///
/// No request timeout is configured: a hung call blocks the caller.
pub struct TwilioClient {
    account_sid: String,
    auth_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn account_url(&self) -> String {
        format!(
            "{}/{API_VERSION}/Accounts/{}.json",
            self.api_base, self.account_sid
        )
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{API_VERSION}/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    fn transport(e: reqwest::Error) -> GatewayError {
        GatewayError::Transport {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        }
    }

    /// Turn a non-2xx response into a provider error.
    async fn provider_error(resp: reqwest::Response) -> GatewayError {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ApiError>(&text) {
            Ok(err) => (err.code, err.message.unwrap_or_else(|| text.clone())),
            Err(_) => (None, text),
        };
        GatewayError::Provider {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            code,
            message,
        }
    }
}

#[async_trait]
impl SmsGateway for TwilioClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send(&self, sms: &OutboundSms) -> Result<SentMessage, GatewayError> {
        let mut form: Vec<(&str, &str)> = vec![("Body", sms.body.as_str()), ("To", sms.to.as_str())];
        if let Some(from) = sms.from.as_deref() {
            form.push(("From", from));
        }

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(Self::transport)?;

        if !resp.status().is_success() {
            return Err(Self::provider_error(resp).await);
        }

        let resource: MessageResource =
            resp.json().await.map_err(|e| GatewayError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        Ok(SentMessage {
            external_id: resource.sid,
        })
    }

    async fn check_account(&self) -> Result<(), GatewayError> {
        let resp = self
            .client
            .get(self.account_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .send()
            .await
            .map_err(Self::transport)?;

        if !resp.status().is_success() {
            return Err(Self::provider_error(resp).await);
        }
        Ok(())
    }
}
