//! Outbound SMS and mail delivery over plain HTTP gateways.
//!
//! Both gateways are optional. An unconfigured channel logs the message and
//! reports success, which keeps local development working without secrets.

use crate::config::ServerConfig;
use crate::domain::repository::{DispatchError, DispatchPort};

#[derive(Clone)]
pub struct GatewayDispatcher {
    client: reqwest::Client,
    sms_url: Option<String>,
    mail_url: Option<String>,
    token: Option<String>,
}

impl GatewayDispatcher {
    pub fn new(sms_url: Option<String>, mail_url: Option<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            sms_url,
            mail_url,
            token,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.sms_gateway_url.clone(),
            config.mail_gateway_url.clone(),
            config.gateway_token.clone(),
        )
    }

    async fn post(&self, url: &str, payload: serde_json::Value) -> Result<(), DispatchError> {
        let mut request = self.client.post(url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DispatchError(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| DispatchError(e.to_string()))?;
        Ok(())
    }
}

impl DispatchPort for GatewayDispatcher {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), DispatchError> {
        match &self.sms_url {
            Some(url) => {
                self.post(url, serde_json::json!({ "to": phone, "body": body }))
                    .await
            }
            None => {
                tracing::info!(to = %phone, body = %body, "sms gateway unset, console delivery");
                Ok(())
            }
        }
    }

    async fn send_email(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        match &self.mail_url {
            Some(url) => {
                self.post(
                    url,
                    serde_json::json!({ "to": address, "subject": subject, "body": body }),
                )
                .await
            }
            None => {
                tracing::info!(to = %address, subject = %subject, body = %body, "mail gateway unset, console delivery");
                Ok(())
            }
        }
    }
}
