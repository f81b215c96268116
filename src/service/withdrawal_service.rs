// service/withdrawal_service.rs
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::db::db::DBClient;
use crate::db::withdrawaldb::WithdrawalExt;
use crate::dtos::walletdtos::CreateWithdrawalDto;
use crate::models::walletmodels::{WithdrawalRequest, WithdrawalStatus};
use crate::service::error::ServiceError;
use crate::service::notification_service::NotificationService;
use crate::service::wallet_service::WalletService;

/// Withdrawal approval workflow. Funds are held at request time so the
/// amount a reviewer approves is still there when it gets paid out.
pub struct WithdrawalService {
    db_client: Arc<DBClient>,
    wallet_service: Arc<WalletService>,
    notification_service: Arc<NotificationService>,
    fee_bps: i64,
}

impl WithdrawalService {
    pub fn new(
        db_client: Arc<DBClient>,
        wallet_service: Arc<WalletService>,
        notification_service: Arc<NotificationService>,
        fee_bps: i64,
    ) -> Self {
        Self {
            db_client,
            wallet_service,
            notification_service,
            fee_bps,
        }
    }

    /// Flat basis-point fee, rounded down. Frozen on the request row at
    /// create time so later fee changes never touch queued requests.
    pub fn platform_fee(amount: i64, fee_bps: i64) -> i64 {
        amount * fee_bps / 10_000
    }

    pub async fn create_withdrawal(
        &self,
        dto: CreateWithdrawalDto,
    ) -> Result<WithdrawalRequest, ServiceError> {
        dto.validate()?;

        let wallet = self
            .wallet_service
            .get_wallet(dto.user_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(dto.user_id))?;

        let platform_fee = Self::platform_fee(dto.amount, self.fee_bps);
        let net_amount = dto.amount - platform_fee;

        // The request id seeds the hold reference, so it is generated here
        // rather than by the insert.
        let request_id = Uuid::new_v4();
        let hold_reference = format!("wdh_{}", request_id);

        self.wallet_service
            .hold(
                dto.user_id,
                dto.amount,
                hold_reference.clone(),
                format!("Hold for withdrawal request {}", request_id),
            )
            .await?;

        let request = match self
            .db_client
            .create_withdrawal_request(
                request_id,
                dto.user_id,
                wallet.id,
                dto.amount,
                platform_fee,
                net_amount,
                dto.withdrawal_method,
                dto.account_name,
                dto.account_number,
                dto.bank_name,
                hold_reference.clone(),
            )
            .await
        {
            Ok(request) => request,
            Err(err) => {
                // Back out the hold so a failed insert leaves no funds stuck.
                // No sweep reclaims orphan holds; a failed release is an
                // operator incident.
                if let Err(release_err) = self
                    .wallet_service
                    .release(dto.user_id, &hold_reference)
                    .await
                {
                    tracing::error!(
                        "Failed to release hold {} for user {} after withdrawal insert error: {}",
                        hold_reference,
                        dto.user_id,
                        release_err
                    );
                }
                return Err(err);
            }
        };

        self.notification_service
            .notify_withdrawal_created(&request)
            .await?;

        tracing::info!(
            "Withdrawal request {} created: user {} amount {} fee {}",
            request.id,
            request.user_id,
            request.amount,
            request.platform_fee
        );
        Ok(request)
    }

    /// Claims the request, converts the hold into a withdrawal debit, then
    /// records completion. Re-running after a partial failure resumes from
    /// wherever the money movement stopped.
    pub async fn approve_withdrawal(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let request = self
            .db_client
            .mark_withdrawal_processing(request_id, admin_id)
            .await?;

        let withdrawal_reference = format!("wd_{}", request_id);
        self.wallet_service
            .convert_hold(
                request.user_id,
                &request.hold_reference,
                withdrawal_reference,
                format!("Withdrawal to account {}", request.account_number),
                Some(serde_json::json!({
                    "withdrawal_request_id": request_id,
                    "platform_fee": request.platform_fee,
                    "net_amount": request.net_amount,
                })),
            )
            .await?;

        let completed = self
            .db_client
            .mark_withdrawal_completed(request_id, admin_notes)
            .await?;

        self.notification_service
            .notify_withdrawal_completed(&completed)
            .await?;

        tracing::info!(
            "Withdrawal request {} approved by admin {}",
            request_id,
            admin_id
        );
        Ok(completed)
    }

    /// The hold is released before the status flips: a row stuck in
    /// processing can be rejected again, stuck funds have no operator path.
    pub async fn reject_withdrawal(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        failure_reason: String,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let request = self
            .db_client
            .get_withdrawal_request(request_id)
            .await?
            .ok_or(ServiceError::WithdrawalNotFound(request_id))?;

        if request.status != WithdrawalStatus::Pending
            && request.status != WithdrawalStatus::Processing
        {
            return Err(ServiceError::InvalidWithdrawalStatus(
                request_id,
                request.status,
            ));
        }

        self.wallet_service
            .release(request.user_id, &request.hold_reference)
            .await?;

        let failed = self
            .db_client
            .mark_withdrawal_failed(request_id, admin_id, failure_reason, admin_notes)
            .await?;

        self.notification_service
            .notify_withdrawal_failed(&failed)
            .await?;

        tracing::info!(
            "Withdrawal request {} rejected by admin {}",
            request_id,
            admin_id
        );
        Ok(failed)
    }

    pub async fn cancel_withdrawal(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let request = self
            .db_client
            .get_withdrawal_request(request_id)
            .await?
            .ok_or(ServiceError::WithdrawalNotFound(request_id))?;

        if request.user_id != user_id {
            return Err(ServiceError::UnauthorizedAccess(user_id, request_id));
        }
        if request.status != WithdrawalStatus::Pending {
            return Err(ServiceError::InvalidWithdrawalStatus(
                request_id,
                request.status,
            ));
        }

        self.wallet_service
            .release(user_id, &request.hold_reference)
            .await?;

        let cancelled = self
            .db_client
            .mark_withdrawal_cancelled(request_id, user_id)
            .await?;

        self.notification_service
            .notify_withdrawal_cancelled(&cancelled)
            .await?;

        tracing::info!(
            "Withdrawal request {} cancelled by user {}",
            request_id,
            user_id
        );
        Ok(cancelled)
    }

    pub async fn get_withdrawal(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, ServiceError> {
        self.db_client.get_withdrawal_request(request_id).await
    }

    pub async fn get_user_withdrawals(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        self.db_client
            .get_withdrawals_by_user(user_id, limit, offset)
            .await
    }

    pub async fn get_withdrawal_queue(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        self.db_client
            .get_withdrawal_queue(status, limit, offset)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPool;

    #[test]
    fn test_platform_fee_zero_bps() {
        assert_eq!(WithdrawalService::platform_fee(50_000, 0), 0);
    }

    #[test]
    fn test_platform_fee_basis_points() {
        // 150 bps of 10,000 kobo
        assert_eq!(WithdrawalService::platform_fee(10_000, 150), 150);
    }

    #[test]
    fn test_platform_fee_rounds_down() {
        // 333 * 250 / 10_000 = 8.325
        assert_eq!(WithdrawalService::platform_fee(333, 250), 8);
    }

    #[tokio::test]
    async fn test_withdrawal_service_construction() {
        let pool = PgPool::connect_lazy("postgres://localhost/taskpay").unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let wallet_service = Arc::new(WalletService::new(db_client.clone()));
        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let service = WithdrawalService::new(
            db_client,
            wallet_service,
            notification_service,
            50,
        );
        assert_eq!(service.fee_bps, 50);
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_withdrawal_hold_approve_and_reject_flows(pool: PgPool) {
        use crate::models::walletmodels::WithdrawalMethod;

        let db_client = Arc::new(DBClient::new(pool));
        let wallet_service = Arc::new(WalletService::new(db_client.clone()));
        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let service = WithdrawalService::new(
            db_client.clone(),
            wallet_service.clone(),
            notification_service,
            0,
        );

        let user_id = Uuid::new_v4();
        wallet_service
            .credit(
                user_id,
                500,
                "seed_balance".to_string(),
                "Opening balance".to_string(),
                None,
                None,
            )
            .await
            .unwrap();

        let dto = CreateWithdrawalDto {
            user_id,
            amount: 200,
            withdrawal_method: WithdrawalMethod::BankTransfer,
            account_name: "Ada Obi".to_string(),
            account_number: "0123456789".to_string(),
            bank_name: None,
        };
        let request = service.create_withdrawal(dto).await.unwrap();

        // The hold keeps the balance intact and fences off the amount
        let wallet = wallet_service.get_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 500);
        assert_eq!(wallet.available_balance, 300);

        let admin_id = Uuid::new_v4();
        let completed = service
            .approve_withdrawal(request.id, admin_id, None)
            .await
            .unwrap();
        assert_eq!(completed.status, WithdrawalStatus::Completed);

        let wallet = wallet_service.get_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 300);
        assert_eq!(wallet.available_balance, 300);

        // A rejected request returns its hold in full
        let dto = CreateWithdrawalDto {
            user_id,
            amount: 200,
            withdrawal_method: WithdrawalMethod::BankTransfer,
            account_name: "Ada Obi".to_string(),
            account_number: "0123456789".to_string(),
            bank_name: None,
        };
        let request = service.create_withdrawal(dto).await.unwrap();

        let wallet = wallet_service.get_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.available_balance, 100);

        let failed = service
            .reject_withdrawal(request.id, admin_id, "Account mismatch".to_string(), None)
            .await
            .unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);

        let wallet = wallet_service.get_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 300);
        assert_eq!(wallet.available_balance, 300);
    }
}
