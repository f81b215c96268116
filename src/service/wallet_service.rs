// service/wallet_service.rs
use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::db::db::DBClient;
use crate::db::walletdb::WalletExt;
use crate::dtos::walletdtos::{TransactionResponseDto, WalletSummaryDto};
use crate::models::walletmodels::{TransactionType, Wallet, WalletTransaction};
use crate::service::error::ServiceError;

/// The only path to a wallet balance mutation. Every call takes a
/// caller-supplied idempotency reference and yields exactly one ledger entry.
#[derive(Debug, Clone)]
pub struct WalletService {
    db_client: Arc<DBClient>,
}

impl WalletService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        WalletService { db_client }
    }

    fn validate_amount(amount: i64) -> Result<(), ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::Validation(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }
        Ok(())
    }

    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError> {
        Self::validate_amount(amount)?;

        let transaction = self
            .db_client
            .credit_wallet(
                user_id,
                amount,
                TransactionType::Credit,
                description,
                reference,
                None,
                metadata,
                booking_id,
            )
            .await?;

        tracing::info!(
            "Wallet credit: user {} amount {} reference {}",
            user_id,
            amount,
            transaction.reference
        );
        Ok(transaction)
    }

    /// Credit tagged as a refund, carrying the gateway transaction it
    /// reverses when one exists.
    pub async fn refund(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
        external_reference: Option<String>,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError> {
        Self::validate_amount(amount)?;

        let transaction = self
            .db_client
            .credit_wallet(
                user_id,
                amount,
                TransactionType::Refund,
                description,
                reference,
                external_reference,
                metadata,
                booking_id,
            )
            .await?;

        tracing::info!(
            "Wallet refund: user {} amount {} reference {}",
            user_id,
            amount,
            transaction.reference
        );
        Ok(transaction)
    }

    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError> {
        Self::validate_amount(amount)?;

        let transaction = self
            .db_client
            .debit_wallet(
                user_id,
                amount,
                TransactionType::Debit,
                description,
                reference,
                metadata,
                booking_id,
            )
            .await?;

        tracing::info!(
            "Wallet debit: user {} amount {} reference {}",
            user_id,
            amount,
            transaction.reference
        );
        Ok(transaction)
    }

    pub async fn hold(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
    ) -> Result<WalletTransaction, ServiceError> {
        Self::validate_amount(amount)?;

        let transaction = self
            .db_client
            .hold_funds(user_id, amount, reference, description)
            .await?;

        tracing::info!(
            "Wallet hold placed: user {} amount {} reference {}",
            user_id,
            amount,
            transaction.reference
        );
        Ok(transaction)
    }

    pub async fn release(
        &self,
        user_id: Uuid,
        hold_reference: &str,
    ) -> Result<WalletTransaction, ServiceError> {
        let transaction = self.db_client.release_hold(user_id, hold_reference).await?;

        tracing::info!(
            "Wallet hold released: user {} hold {}",
            user_id,
            hold_reference
        );
        Ok(transaction)
    }

    pub async fn convert_hold(
        &self,
        user_id: Uuid,
        hold_reference: &str,
        withdrawal_reference: String,
        description: String,
        metadata: Option<JsonValue>,
    ) -> Result<WalletTransaction, ServiceError> {
        let transaction = self
            .db_client
            .convert_hold(
                user_id,
                hold_reference,
                withdrawal_reference,
                description,
                metadata,
            )
            .await?;

        tracing::info!(
            "Wallet hold converted to withdrawal: user {} hold {} entry {}",
            user_id,
            hold_reference,
            transaction.reference
        );
        Ok(transaction)
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, ServiceError> {
        self.db_client.get_wallet(user_id).await
    }

    pub async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        self.db_client.get_or_create_wallet(user_id).await
    }

    pub async fn get_wallet_summary(&self, user_id: Uuid) -> Result<WalletSummaryDto, ServiceError> {
        let summary = self.db_client.get_wallet_summary(user_id).await?;
        Ok(WalletSummaryDto::from_summary(&summary))
    }

    pub async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<WalletTransaction>, ServiceError> {
        self.db_client.get_transaction_by_reference(reference).await
    }

    pub async fn get_transaction_history(
        &self,
        user_id: Uuid,
        transaction_type: Option<TransactionType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionResponseDto>, ServiceError> {
        let transactions = self
            .db_client
            .get_wallet_transactions(user_id, transaction_type, limit, offset)
            .await?;

        Ok(transactions
            .iter()
            .map(TransactionResponseDto::from_transaction)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPool;

    #[test]
    fn test_amount_validation() {
        assert!(WalletService::validate_amount(1).is_ok());
        assert!(WalletService::validate_amount(0).is_err());
        assert!(WalletService::validate_amount(-100).is_err());
    }

    #[tokio::test]
    async fn wallet_service_compiles() {
        let pool = PgPool::connect_lazy("postgres://localhost/taskpay").unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let _service = WalletService::new(db_client);
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_credit_with_same_reference_applies_once(pool: PgPool) {
        let db_client = Arc::new(DBClient::new(pool));
        let service = WalletService::new(db_client);
        let user_id = Uuid::new_v4();

        let first = service
            .credit(
                user_id,
                100,
                "settle_replay_check".to_string(),
                "Settlement".to_string(),
                None,
                None,
            )
            .await
            .unwrap();
        let second = service
            .credit(
                user_id,
                100,
                "settle_replay_check".to_string(),
                "Settlement".to_string(),
                None,
                None,
            )
            .await
            .unwrap();

        // The retry returns the original ledger row instead of a new one
        assert_eq!(first.id, second.id);

        let wallet = service.get_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 100);
        assert_eq!(wallet.available_balance, 100);

        let history = service
            .get_transaction_history(user_id, None, 50, 0)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
