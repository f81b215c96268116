// dtos/walletdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::walletdb::WalletSummary;
use crate::models::walletmodels::*;
use crate::utils::currency::kobo_to_naira;

fn validate_account_number(account_number: &str) -> Result<(), validator::ValidationError> {
    if account_number.chars().all(|c| c.is_ascii_digit()) && account_number.len() == 10 {
        Ok(())
    } else {
        Err(validator::ValidationError::new("account_number must be 10 digits"))
    }
}

// Withdrawal DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateWithdrawalDto {
    pub user_id: Uuid,

    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64, // in kobo

    pub withdrawal_method: WithdrawalMethod,

    #[validate(length(min = 1, max = 100, message = "Account name is required"))]
    pub account_name: String,

    #[validate(
        length(min = 10, max = 10, message = "Account number must be 10 digits"),
        custom = "validate_account_number"
    )]
    pub account_number: String,

    #[validate(length(max = 255, message = "Bank name must be at most 255 characters"))]
    pub bank_name: Option<String>,
}

// Commission DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommissionTierInputDto {
    #[validate(range(min = 0, message = "Tier minimum cannot be negative"))]
    pub min_amount: i64, // in kobo, inclusive

    pub max_amount: Option<i64>, // in kobo, exclusive; None = unbounded

    #[validate(range(min = 0, max = 10000, message = "Rate must be between 0 and 10000 basis points"))]
    pub rate_bps: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateCommissionTiersDto {
    // Per-tier bounds and coverage are checked by the commission service
    #[validate(length(min = 1, message = "At least one tier is required"))]
    pub tiers: Vec<CommissionTierInputDto>,
}

// Wallet response DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletSummaryDto {
    pub balance: f64, // In Naira
    pub available_balance: f64,
    pub total_credited: f64,
    pub total_debited: f64,
    pub outstanding_holds: f64,
    pub pending_transactions: i64,
}

impl WalletSummaryDto {
    pub fn from_summary(summary: &WalletSummary) -> Self {
        WalletSummaryDto {
            balance: kobo_to_naira(summary.balance),
            available_balance: kobo_to_naira(summary.available_balance),
            total_credited: kobo_to_naira(summary.total_credited),
            total_debited: kobo_to_naira(summary.total_debited),
            outstanding_holds: kobo_to_naira(summary.outstanding_holds),
            pending_transactions: summary.pending_transactions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponseDto {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: f64, // In Naira
    pub balance_before: f64,
    pub balance_after: f64,
    pub status: TransactionStatus,
    pub reference: String,
    pub description: String,
    pub booking_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TransactionResponseDto {
    pub fn from_transaction(transaction: &WalletTransaction) -> Self {
        TransactionResponseDto {
            id: transaction.id,
            transaction_type: transaction.transaction_type,
            amount: kobo_to_naira(transaction.amount),
            balance_before: kobo_to_naira(transaction.balance_before),
            balance_after: kobo_to_naira(transaction.balance_after),
            status: transaction.status,
            reference: transaction.reference.clone(),
            description: transaction.description.clone(),
            booking_id: transaction.booking_id,
            created_at: transaction.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_number_validation() {
        assert!(validate_account_number("0123456789").is_ok());
        assert!(validate_account_number("012345678").is_err());
        assert!(validate_account_number("01234567890").is_err());
        assert!(validate_account_number("01234567ab").is_err());
    }

    #[test]
    fn test_withdrawal_dto_validation() {
        let dto = CreateWithdrawalDto {
            user_id: Uuid::new_v4(),
            amount: 50_000,
            withdrawal_method: WithdrawalMethod::BankTransfer,
            account_name: "Ada Obi".to_string(),
            account_number: "0123456789".to_string(),
            bank_name: Some("First Bank".to_string()),
        };
        assert!(dto.validate().is_ok());

        let bad_amount = CreateWithdrawalDto { amount: 0, ..dto };
        assert!(bad_amount.validate().is_err());
    }
}
