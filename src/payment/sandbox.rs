//! In-process gateway for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    GatewayError, InitializeRequest, Initialized, PaymentGateway, TransactionStatus, Verification,
};

/// Approves every initialized transaction for exactly the initialized
/// amount, unless an outcome was scripted with
/// [`SandboxGateway::set_outcome`].
#[derive(Debug, Clone, Default)]
pub struct SandboxGateway {
    transactions: Arc<Mutex<HashMap<String, Verification>>>,
    base_url: String,
}

impl SandboxGateway {
    /// Creates a sandbox whose authorization URLs live under `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            transactions: Arc::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Overrides what [`PaymentGateway::verify`] reports for `reference`.
    pub async fn set_outcome(&self, reference: &str, status: TransactionStatus, amount: i64) {
        self.transactions
            .lock()
            .await
            .insert(reference.to_string(), Verification { status, amount });
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initialize(&self, request: InitializeRequest) -> Result<Initialized, GatewayError> {
        if request.amount <= 0 {
            return Err(GatewayError::Rejected("amount must be positive".into()));
        }
        self.transactions.lock().await.insert(
            request.reference.clone(),
            Verification {
                status: TransactionStatus::Success,
                amount: request.amount,
            },
        );
        Ok(Initialized {
            authorization_url: format!("{}/sandbox/pay/{}", self.base_url, request.reference),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        self.transactions
            .lock()
            .await
            .get(reference)
            .copied()
            .ok_or_else(|| GatewayError::UnknownTransaction(reference.to_string()))
    }
}
