// models/bookingmodel.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    ProviderRejected,
    Expired,
}

impl BookingStatus {
    pub fn to_str(&self) -> &str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::ProviderRejected => "provider_rejected",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::ProviderRejected
                | BookingStatus::Expired
        )
    }

    /// Statuses a booking may be cancelled from.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::InProgress
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_sub_status", rename_all = "snake_case")]
pub enum JobSubStatus {
    Pending,
    Accepted,
    OnWay,
    InProgress,
    Completed,
}

impl JobSubStatus {
    /// Position in the forward-only chain. Moves must strictly increase.
    pub fn rank(&self) -> u8 {
        match self {
            JobSubStatus::Pending => 0,
            JobSubStatus::Accepted => 1,
            JobSubStatus::OnWay => 2,
            JobSubStatus::InProgress => 3,
            JobSubStatus::Completed => 4,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            JobSubStatus::Pending => "pending",
            JobSubStatus::Accepted => "accepted",
            JobSubStatus::OnWay => "on_way",
            JobSubStatus::InProgress => "in_progress",
            JobSubStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_state", rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Authorized,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "booking_request_status", rename_all = "lowercase")]
pub enum BookingRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "dispute_resolution", rename_all = "snake_case")]
pub enum DisputeResolution {
    CustomerFavored,
    ProviderFavored,
    PartialRefund,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub service_name: String,
    pub status: BookingStatus,
    pub current_sub_status: JobSubStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_hours: i32,
    pub base_price: BigDecimal,
    pub additional_fees: BigDecimal,
    pub total_amount: BigDecimal,
    pub currency: String,
    pub payment_state: PaymentState,
    pub external_transaction_ref: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>, // in kobo
    pub is_disputed: bool,
    pub dispute_reason: Option<String>,
    pub dispute_resolution: Option<DisputeResolution>,
    pub dispute_escalated: bool,
    pub dispute_resolved_by: Option<Uuid>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    pub dispute_admin_notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW()
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingStatusHistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub sub_status: JobSubStatus,
    pub actor: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingRequest {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub status: BookingRequestStatus,
    pub response_at: Option<DateTime<Utc>>,
    pub response_note: Option<String>,
    pub estimated_start: Option<DateTime<Utc>>,
    pub estimated_duration_hours: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_status_ranks_are_strictly_ordered() {
        let chain = [
            JobSubStatus::Pending,
            JobSubStatus::Accepted,
            JobSubStatus::OnWay,
            JobSubStatus::InProgress,
            JobSubStatus::Completed,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::ProviderRejected.is_terminal());
        assert!(BookingStatus::Expired.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_cancellable_statuses() {
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(BookingStatus::Confirmed.is_cancellable());
        assert!(BookingStatus::InProgress.is_cancellable());
        assert!(!BookingStatus::Completed.is_cancellable());
        assert!(!BookingStatus::Expired.is_cancellable());
    }
}
