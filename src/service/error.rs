use thiserror::Error;
use uuid::Uuid;
use crate::models::{
    bookingmodel::{BookingStatus, JobSubStatus, PaymentState},
    walletmodels::WithdrawalStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("Booking request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    #[error("Withdrawal request {0} not found")]
    WithdrawalNotFound(Uuid),

    #[error("No outstanding hold for reference {0}")]
    HoldNotFound(String),

    #[error("Booking {0} is in status {1:?}")]
    InvalidBookingStatus(Uuid, BookingStatus),

    #[error("Booking {0} cannot move from {1:?} to {2:?}")]
    InvalidSubStatusTransition(Uuid, JobSubStatus, JobSubStatus),

    #[error("Withdrawal {0} is in status {1:?}")]
    InvalidWithdrawalStatus(Uuid, WithdrawalStatus),

    #[error("Booking {0} payment is in state {1:?}")]
    InvalidPaymentState(Uuid, PaymentState),

    #[error("Offer no longer available for booking {0}")]
    OfferNoLongerAvailable(Uuid),

    #[error("Booking {0} already has an open dispute")]
    DisputeAlreadyOpen(Uuid),

    #[error("Booking {0} has no open dispute")]
    DisputeNotOpen(Uuid),

    #[error("Dispute on booking {0} was already resolved")]
    DisputeAlreadyResolved(Uuid),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("User {0} is not authorized to perform this action on {1}")]
    UnauthorizedAccess(Uuid, Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    /// Conflict errors are expected under racing acceptance and should be
    /// surfaced to the caller as a soft failure, not an alert.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::OfferNoLongerAvailable(_))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        ServiceError::PaymentGateway(error.to_string())
    }
}
