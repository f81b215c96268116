// service/notification_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    models::bookingmodel::*,
    models::walletmodels::WithdrawalRequest,
    service::error::ServiceError,
    utils::currency::format_kobo_as_naira,
};

/// Fire-and-forget collaborator: callers ignore delivery failures, and
/// sweeper-emitted events are deduplicated per (user, type, booking).
#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
}

impl NotificationService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    pub async fn notify_offer_received(
        &self,
        provider_id: Uuid,
        booking: &Booking,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            "Booking offer notification: provider {} offered booking {}",
            provider_id,
            booking.id
        );

        self.store_notification(
            provider_id,
            "booking_offer".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
                "scheduled_at": booking.scheduled_at,
                "total_amount": booking.total_amount,
            })),
            format!("New booking offer: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_offer_closed(
        &self,
        provider_id: Uuid,
        booking: &Booking,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            provider_id,
            "offer_closed".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
            })),
            format!("Booking offer no longer available: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_booking_confirmed(
        &self,
        booking: &Booking,
        provider_id: Uuid,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            "Booking confirmation notification: booking {} accepted by provider {}",
            booking.id,
            provider_id
        );

        self.store_notification(
            booking.customer_id,
            "booking_confirmed".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
                "provider_id": provider_id,
                "scheduled_at": booking.scheduled_at,
            })),
            format!("A provider accepted your booking: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_job_status_update(
        &self,
        booking: &Booking,
        sub_status: JobSubStatus,
        note: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "job_status_update".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "sub_status": sub_status.to_str(),
                "note": note,
            })),
            format!(
                "Booking {}: job is now {}",
                booking.service_name,
                sub_status.to_str()
            ),
        )
        .await
    }

    pub async fn notify_booking_completed(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "booking_completed".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
            })),
            format!("Booking completed: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_payment_received(
        &self,
        provider_id: Uuid,
        booking: &Booking,
        net_amount: i64,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            "Settlement notification: provider {} credited {} for booking {}",
            provider_id,
            net_amount,
            booking.id
        );

        self.store_notification(
            provider_id,
            "payment_received".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "amount": net_amount,
                "currency": booking.currency,
            })),
            format!("Payment of {} received", format_kobo_as_naira(net_amount)),
        )
        .await
    }

    pub async fn notify_payment_authorized(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "payment_authorized".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "total_amount": booking.total_amount,
                "currency": booking.currency,
            })),
            format!("Payment authorized for booking: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_booking_cancelled(
        &self,
        booking: &Booking,
        refund_amount: i64,
    ) -> Result<(), ServiceError> {
        let metadata = serde_json::json!({
            "service_name": booking.service_name,
            "refund_amount": refund_amount,
            "cancelled_by": booking.cancelled_by,
        });

        self.store_notification(
            booking.customer_id,
            "booking_cancelled".to_string(),
            Some(booking.id),
            Some(metadata.clone()),
            format!(
                "Booking cancelled: {}. Refund: {}",
                booking.service_name,
                format_kobo_as_naira(refund_amount)
            ),
        )
        .await?;

        if let Some(provider_id) = booking.provider_id {
            self.store_notification(
                provider_id,
                "booking_cancelled".to_string(),
                Some(booking.id),
                Some(metadata),
                format!("Booking cancelled: {}", booking.service_name),
            )
            .await?;
        }

        Ok(())
    }

    pub async fn notify_booking_expired(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "booking_expired".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
            })),
            format!(
                "No provider accepted your booking in time: {}",
                booking.service_name
            ),
        )
        .await
    }

    pub async fn notify_redispatch_needed(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "redispatch_needed".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
            })),
            format!(
                "All providers declined; booking {} needs new candidates",
                booking.service_name
            ),
        )
        .await
    }

    pub async fn notify_all_offers_declined(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "provider_rejected".to_string(),
            Some(booking.id),
            Some(serde_json::json!({
                "service_name": booking.service_name,
            })),
            format!(
                "No provider accepted your booking for {}",
                booking.service_name
            ),
        )
        .await
    }

    /// Sweeper reminder, suppressed after the first delivery per recipient.
    pub async fn notify_booking_reminder(&self, booking: &Booking) -> Result<bool, ServiceError> {
        let mut stored = self
            .store_notification_once(
                booking.customer_id,
                "booking_reminder".to_string(),
                booking.id,
                Some(serde_json::json!({
                    "scheduled_at": booking.scheduled_at,
                })),
                format!(
                    "Reminder: {} is scheduled for {}",
                    booking.service_name, booking.scheduled_at
                ),
            )
            .await?;

        if let Some(provider_id) = booking.provider_id {
            stored |= self
                .store_notification_once(
                    provider_id,
                    "booking_reminder".to_string(),
                    booking.id,
                    Some(serde_json::json!({
                        "scheduled_at": booking.scheduled_at,
                    })),
                    format!(
                        "Reminder: {} is scheduled for {}",
                        booking.service_name, booking.scheduled_at
                    ),
                )
                .await?;
        }

        Ok(stored)
    }

    /// Sweeper overdue flag, suppressed after the first delivery per recipient.
    pub async fn notify_booking_overdue(&self, booking: &Booking) -> Result<bool, ServiceError> {
        let mut stored = self
            .store_notification_once(
                booking.customer_id,
                "booking_overdue".to_string(),
                booking.id,
                Some(serde_json::json!({
                    "scheduled_at": booking.scheduled_at,
                })),
                format!(
                    "Booking {} has not started on schedule",
                    booking.service_name
                ),
            )
            .await?;

        if let Some(provider_id) = booking.provider_id {
            stored |= self
                .store_notification_once(
                    provider_id,
                    "booking_overdue".to_string(),
                    booking.id,
                    Some(serde_json::json!({
                        "scheduled_at": booking.scheduled_at,
                    })),
                    format!(
                        "Booking {} is overdue; please update its job status",
                        booking.service_name
                    ),
                )
                .await?;
        }

        Ok(stored)
    }

    pub async fn notify_dispute_raised(
        &self,
        booking: &Booking,
        raised_by: Uuid,
    ) -> Result<(), ServiceError> {
        let metadata = serde_json::json!({
            "raised_by": raised_by,
            "reason": booking.dispute_reason,
        });

        self.store_notification(
            booking.customer_id,
            "dispute_raised".to_string(),
            Some(booking.id),
            Some(metadata.clone()),
            format!("Dispute opened on booking: {}", booking.service_name),
        )
        .await?;

        if let Some(provider_id) = booking.provider_id {
            self.store_notification(
                provider_id,
                "dispute_raised".to_string(),
                Some(booking.id),
                Some(metadata),
                format!("Dispute opened on booking: {}", booking.service_name),
            )
            .await?;
        }

        Ok(())
    }

    pub async fn notify_dispute_escalated(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.store_notification(
            booking.customer_id,
            "dispute_escalated".to_string(),
            Some(booking.id),
            None,
            format!("Dispute escalated on booking: {}", booking.service_name),
        )
        .await
    }

    pub async fn notify_dispute_resolved(
        &self,
        booking: &Booking,
        resolution: DisputeResolution,
    ) -> Result<(), ServiceError> {
        let metadata = serde_json::json!({
            "resolution": resolution,
            "admin_notes": booking.dispute_admin_notes,
        });
        let message = format!("Dispute resolved on booking: {}", booking.service_name);

        self.store_notification(
            booking.customer_id,
            "dispute_resolved".to_string(),
            Some(booking.id),
            Some(metadata.clone()),
            message.clone(),
        )
        .await?;

        if let Some(provider_id) = booking.provider_id {
            self.store_notification(
                provider_id,
                "dispute_resolved".to_string(),
                Some(booking.id),
                Some(metadata),
                message,
            )
            .await?;
        }

        Ok(())
    }

    pub async fn notify_withdrawal_created(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            request.user_id,
            "withdrawal_requested".to_string(),
            None,
            Some(serde_json::json!({
                "request_id": request.id,
                "amount": request.amount,
                "net_amount": request.net_amount,
            })),
            format!(
                "Withdrawal request of {} received",
                format_kobo_as_naira(request.amount)
            ),
        )
        .await
    }

    pub async fn notify_withdrawal_completed(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            request.user_id,
            "withdrawal_completed".to_string(),
            None,
            Some(serde_json::json!({
                "request_id": request.id,
                "net_amount": request.net_amount,
            })),
            format!(
                "Withdrawal of {} completed",
                format_kobo_as_naira(request.net_amount)
            ),
        )
        .await
    }

    pub async fn notify_withdrawal_failed(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            request.user_id,
            "withdrawal_failed".to_string(),
            None,
            Some(serde_json::json!({
                "request_id": request.id,
                "failure_reason": request.failure_reason,
            })),
            format!(
                "Withdrawal of {} was not processed",
                format_kobo_as_naira(request.amount)
            ),
        )
        .await
    }

    pub async fn notify_withdrawal_cancelled(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<(), ServiceError> {
        self.store_notification(
            request.user_id,
            "withdrawal_cancelled".to_string(),
            None,
            Some(serde_json::json!({
                "request_id": request.id,
            })),
            format!(
                "Withdrawal request of {} cancelled",
                format_kobo_as_naira(request.amount)
            ),
        )
        .await
    }

    async fn store_notification(
        &self,
        user_id: Uuid,
        notification_type: String,
        booking_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
        message: String,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
            (user_id, type, booking_id, metadata, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(booking_id)
        .bind(metadata)
        .bind(message)
        .execute(&self.db_client.pool)
        .await?;

        Ok(())
    }

    /// Inserts only when no notification with the same (user, type, booking)
    /// exists. Returns whether a row was stored.
    async fn store_notification_once(
        &self,
        user_id: Uuid,
        notification_type: String,
        booking_id: Uuid,
        metadata: Option<serde_json::Value>,
        message: String,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications
            (user_id, type, booking_id, metadata, message)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (
                SELECT 1 FROM notifications
                WHERE user_id = $1 AND type = $2 AND booking_id = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(booking_id)
        .bind(metadata)
        .bind(message)
        .execute(&self.db_client.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserNotification>, ServiceError> {
        let notifications = sqlx::query_as::<_, UserNotification>(
            r#"
            SELECT id, user_id, type, booking_id, metadata, message, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_client.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db_client.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true
            WHERE user_id = $1 AND is_read = false
            "#,
        )
        .bind(user_id)
        .execute(&self.db_client.pool)
        .await?;

        Ok(())
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub r#type: String,
    pub booking_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub message: String,
    pub is_read: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}
