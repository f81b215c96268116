// models/walletmodels.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Hold,
    Release,
    Withdrawal,
    Refund,
}

impl TransactionType {
    /// Signed effect of a completed entry of this type on the displayed
    /// balance. Holds and releases move available_balance only.
    pub fn signed_effect(&self, amount: i64) -> i64 {
        match self {
            TransactionType::Credit | TransactionType::Refund => amount,
            TransactionType::Debit | TransactionType::Withdrawal => -amount,
            TransactionType::Hold | TransactionType::Release => 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "withdrawal_method", rename_all = "snake_case")]
pub enum WithdrawalMethod {
    BankTransfer,
    MobileMoney,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,           // in kobo
    pub available_balance: i64, // balance minus outstanding holds
    pub currency: String,
    pub total_credited: i64,
    pub total_debited: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64, // in kobo, always positive
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub reference: String, // Unique idempotency reference
    pub external_reference: Option<String>, // Payment gateway reference
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub booking_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: i64,       // in kobo
    pub platform_fee: i64, // frozen at create time
    pub net_amount: i64,   // amount - platform_fee
    pub withdrawal_method: WithdrawalMethod,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: Option<String>,
    pub status: WithdrawalStatus,
    pub hold_reference: String,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommissionTier {
    pub id: Uuid,
    pub version: i32,
    pub min_amount: i64,         // inclusive, in kobo
    pub max_amount: Option<i64>, // exclusive; NULL = unbounded
    pub rate_bps: i64,           // basis points (1/100th of a percent)
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CommissionTier {
    pub fn contains(&self, amount: i64) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount < max)
    }
}

pub fn generate_transaction_reference() -> String {
    format!("TPY_{}", uuid::Uuid::new_v4().to_string().replace("-", "").to_uppercase()[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_effects() {
        assert_eq!(TransactionType::Credit.signed_effect(500), 500);
        assert_eq!(TransactionType::Refund.signed_effect(500), 500);
        assert_eq!(TransactionType::Debit.signed_effect(500), -500);
        assert_eq!(TransactionType::Withdrawal.signed_effect(500), -500);
        assert_eq!(TransactionType::Hold.signed_effect(500), 0);
        assert_eq!(TransactionType::Release.signed_effect(500), 0);
    }

    #[test]
    fn test_tier_contains() {
        let tier = CommissionTier {
            id: Uuid::nil(),
            version: 1,
            min_amount: 1000,
            max_amount: Some(5000),
            rate_bps: 1500,
            created_by: None,
            created_at: None,
        };
        assert!(!tier.contains(999));
        assert!(tier.contains(1000));
        assert!(tier.contains(4999));
        assert!(!tier.contains(5000));

        let open_tier = CommissionTier {
            max_amount: None,
            min_amount: 5000,
            ..tier
        };
        assert!(open_tier.contains(5000));
        assert!(open_tier.contains(i64::MAX));
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_transaction_reference();
        assert!(reference.starts_with("TPY_"));
        assert_eq!(reference.len(), 20);
    }
}
