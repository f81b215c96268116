// dtos/bookingdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::bookingmodel::*;

// Booking DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBookingDto {
    pub customer_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Service name is required"))]
    pub service_name: String,

    pub scheduled_at: DateTime<Utc>,

    #[validate(range(min = 1, max = 720, message = "Duration must be between 1 and 720 hours"))]
    pub duration_hours: i32,

    #[validate(range(min = 0.01, message = "Base price must be positive"))]
    pub base_price: f64, // In Naira

    #[validate(range(min = 0.0, message = "Additional fees cannot be negative"))]
    pub additional_fees: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DispatchRequestsDto {
    pub booking_id: Uuid,

    #[validate(length(min = 1, message = "At least one candidate provider is required"))]
    pub provider_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AcceptRequestDto {
    pub provider_id: Uuid,

    pub estimated_start: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 720, message = "Estimated duration must be between 1 and 720 hours"))]
    pub estimated_duration_hours: Option<i32>,

    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RejectRequestDto {
    pub provider_id: Uuid,

    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdvanceJobStatusDto {
    pub actor: Uuid,

    pub new_sub_status: JobSubStatus,

    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelBookingDto {
    pub cancelled_by: Uuid,

    #[validate(length(min = 1, max = 500, message = "Cancellation reason is required"))]
    pub reason: String,
}

// Dispute DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RaiseDisputeDto {
    pub raised_by: Uuid,

    #[validate(length(min = 1, max = 1000, message = "Dispute reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResolveDisputeDto {
    pub resolution: DisputeResolution,

    #[validate(length(max = 1000, message = "Admin notes must be at most 1000 characters"))]
    pub admin_notes: Option<String>,

    #[validate(range(min = 1, message = "Refund amount must be positive"))]
    pub refund_amount: Option<i64>, // in kobo

    #[validate(range(min = 1, message = "Penalty amount must be positive"))]
    pub penalty_amount: Option<i64>, // in kobo
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingDetailsDto {
    pub booking: Booking,
    pub history: Vec<BookingStatusHistoryEntry>,
    pub requests: Vec<BookingRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancellationOutcomeDto {
    pub booking: Booking,
    pub refund_amount: i64, // in kobo
    pub refund_percent: u32,
}
