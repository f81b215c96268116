// db/withdrawaldb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::walletmodels::{WithdrawalMethod, WithdrawalRequest, WithdrawalStatus};
use crate::service::error::ServiceError;

const WITHDRAWAL_COLUMNS: &str = r#"
    id,
    user_id,
    wallet_id,
    amount,
    platform_fee,
    net_amount,
    withdrawal_method,
    account_name,
    account_number,
    bank_name,
    status,
    hold_reference,
    processed_by,
    processed_at,
    admin_notes,
    failure_reason,
    created_at,
    updated_at
"#;

#[async_trait]
pub trait WithdrawalExt {
    /// The id is generated by the caller so the wallet hold can carry it
    /// before this row exists.
    async fn create_withdrawal_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        wallet_id: Uuid,
        amount: i64,
        platform_fee: i64,
        net_amount: i64,
        withdrawal_method: WithdrawalMethod,
        account_name: String,
        account_number: String,
        bank_name: Option<String>,
        hold_reference: String,
    ) -> Result<WithdrawalRequest, ServiceError>;

    async fn get_withdrawal_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, ServiceError>;

    async fn get_withdrawals_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError>;

    /// Admin review queue, oldest first.
    async fn get_withdrawal_queue(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError>;

    /// Claims the request for an approving admin. Re-claiming a processing
    /// request is allowed so an interrupted approval can be retried.
    async fn mark_withdrawal_processing(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<WithdrawalRequest, ServiceError>;

    async fn mark_withdrawal_completed(
        &self,
        request_id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError>;

    async fn mark_withdrawal_failed(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        failure_reason: String,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError>;

    async fn mark_withdrawal_cancelled(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<WithdrawalRequest, ServiceError>;
}

#[async_trait]
impl WithdrawalExt for DBClient {
    async fn create_withdrawal_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        wallet_id: Uuid,
        amount: i64,
        platform_fee: i64,
        net_amount: i64,
        withdrawal_method: WithdrawalMethod,
        account_name: String,
        account_number: String,
        bank_name: Option<String>,
        hold_reference: String,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let request = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            INSERT INTO withdrawal_requests
            (id, user_id, wallet_id, amount, platform_fee, net_amount, withdrawal_method,
             account_name, account_number, bank_name, hold_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .bind(user_id)
        .bind(wallet_id)
        .bind(amount)
        .bind(platform_fee)
        .bind(net_amount)
        .bind(withdrawal_method)
        .bind(account_name)
        .bind(account_number)
        .bind(bank_name)
        .bind(hold_reference)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_withdrawal_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, ServiceError> {
        let request = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {} FROM withdrawal_requests WHERE id = $1",
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_withdrawals_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            SELECT {}
            FROM withdrawal_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn get_withdrawal_queue(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        let requests = match status {
            Some(status) => {
                sqlx::query_as::<_, WithdrawalRequest>(&format!(
                    r#"
                    SELECT {}
                    FROM withdrawal_requests
                    WHERE status = $1
                    ORDER BY created_at ASC
                    LIMIT $2 OFFSET $3
                    "#,
                    WITHDRAWAL_COLUMNS
                ))
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WithdrawalRequest>(&format!(
                    r#"
                    SELECT {}
                    FROM withdrawal_requests
                    ORDER BY created_at ASC
                    LIMIT $1 OFFSET $2
                    "#,
                    WITHDRAWAL_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(requests)
    }

    async fn mark_withdrawal_processing(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = 'processing'::withdrawal_status,
                processed_by = $2,
                updated_at = NOW()
            WHERE id = $1
            AND status IN ('pending'::withdrawal_status, 'processing'::withdrawal_status)
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(request) => Ok(request),
            None => Err(self.withdrawal_status_error(request_id).await),
        }
    }

    async fn mark_withdrawal_completed(
        &self,
        request_id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = 'completed'::withdrawal_status,
                processed_at = NOW(),
                admin_notes = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'::withdrawal_status
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .bind(admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(request) => Ok(request),
            None => Err(self.withdrawal_status_error(request_id).await),
        }
    }

    async fn mark_withdrawal_failed(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        failure_reason: String,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = 'failed'::withdrawal_status,
                processed_by = $2,
                processed_at = NOW(),
                failure_reason = $3,
                admin_notes = $4,
                updated_at = NOW()
            WHERE id = $1
            AND status IN ('pending'::withdrawal_status, 'processing'::withdrawal_status)
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .bind(admin_id)
        .bind(failure_reason)
        .bind(admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(request) => Ok(request),
            None => Err(self.withdrawal_status_error(request_id).await),
        }
    }

    async fn mark_withdrawal_cancelled(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = 'cancelled'::withdrawal_status, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'pending'::withdrawal_status
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(request) => Ok(request),
            None => {
                let current = self
                    .get_withdrawal_request(request_id)
                    .await?
                    .ok_or(ServiceError::WithdrawalNotFound(request_id))?;
                if current.user_id != user_id {
                    return Err(ServiceError::UnauthorizedAccess(user_id, request_id));
                }
                Err(ServiceError::InvalidWithdrawalStatus(request_id, current.status))
            }
        }
    }
}

impl DBClient {
    /// Resolves why a guarded withdrawal update matched no row.
    async fn withdrawal_status_error(&self, request_id: Uuid) -> ServiceError {
        match self.get_withdrawal_request(request_id).await {
            Ok(Some(current)) => {
                ServiceError::InvalidWithdrawalStatus(request_id, current.status)
            }
            Ok(None) => ServiceError::WithdrawalNotFound(request_id),
            Err(err) => err,
        }
    }
}
