// service/payment_gateway.rs
use async_trait::async_trait;

use crate::service::error::ServiceError;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayAuthorization {
    pub auth_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCapture {
    pub external_txn_id: String,
}

/// External payment collaborator. Injected as a trait object so settlement
/// logic never constructs its own HTTP client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        amount: i64,
        currency: &str,
        payer_ref: &str,
    ) -> Result<GatewayAuthorization, ServiceError>;

    async fn capture(&self, auth_id: &str) -> Result<GatewayCapture, ServiceError>;

    async fn refund(&self, external_txn_id: &str, amount: i64) -> Result<(), ServiceError>;
}

/// JSON-over-HTTP gateway client. Declined operations surface as
/// PaymentGateway errors so callers never write ledger entries for them.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret_key: String) -> Self {
        HttpPaymentGateway {
            base_url,
            secret_key,
        }
    }

    async fn post(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .json(&payload)
            .send()
            .await?;

        let response_body: serde_json::Value = response.json().await?;
        Ok(response_body)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(
        &self,
        amount: i64,
        currency: &str,
        payer_ref: &str,
    ) -> Result<GatewayAuthorization, ServiceError> {
        let payload = serde_json::json!({
            "amount": amount,
            "currency": currency,
            "reference": payer_ref,
        });

        let response_body = self.post("/v1/authorize", payload).await?;

        if response_body["status"].as_bool().unwrap_or(false) {
            let auth_id = response_body["data"]["authorization_id"]
                .as_str()
                .ok_or_else(|| {
                    ServiceError::PaymentGateway(
                        "Authorize response missing authorization_id".to_string(),
                    )
                })?
                .to_string();

            Ok(GatewayAuthorization { auth_id })
        } else {
            Err(ServiceError::PaymentGateway(
                response_body["message"]
                    .as_str()
                    .unwrap_or("Authorization declined")
                    .to_string(),
            ))
        }
    }

    async fn capture(&self, auth_id: &str) -> Result<GatewayCapture, ServiceError> {
        let payload = serde_json::json!({
            "authorization_id": auth_id,
        });

        let response_body = self.post("/v1/capture", payload).await?;

        if response_body["status"].as_bool().unwrap_or(false) {
            let external_txn_id = response_body["data"]["transaction_id"]
                .as_str()
                .ok_or_else(|| {
                    ServiceError::PaymentGateway(
                        "Capture response missing transaction_id".to_string(),
                    )
                })?
                .to_string();

            Ok(GatewayCapture { external_txn_id })
        } else {
            Err(ServiceError::PaymentGateway(
                response_body["message"]
                    .as_str()
                    .unwrap_or("Capture declined")
                    .to_string(),
            ))
        }
    }

    async fn refund(&self, external_txn_id: &str, amount: i64) -> Result<(), ServiceError> {
        let payload = serde_json::json!({
            "transaction_id": external_txn_id,
            "amount": amount,
        });

        let response_body = self.post("/v1/refund", payload).await?;

        if response_body["status"].as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(ServiceError::PaymentGateway(
                response_body["message"]
                    .as_str()
                    .unwrap_or("Refund declined")
                    .to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_constructs() {
        let gateway = HttpPaymentGateway::new(
            "https://gateway.example.test".to_string(),
            "sk_test_123".to_string(),
        );
        assert_eq!(gateway.base_url, "https://gateway.example.test");
    }
}
