// db/bookingdb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::bookingmodel::*;
use crate::service::error::ServiceError;

const BOOKING_COLUMNS: &str = r#"
    id,
    customer_id,
    provider_id,
    service_name,
    status,
    current_sub_status,
    scheduled_at,
    duration_hours,
    base_price,
    additional_fees,
    total_amount,
    currency,
    payment_state,
    external_transaction_ref,
    cancelled_by,
    cancellation_reason,
    cancelled_at,
    refund_amount,
    is_disputed,
    dispute_reason,
    dispute_resolution,
    dispute_escalated,
    dispute_resolved_by,
    dispute_resolved_at,
    dispute_admin_notes,
    created_at,
    updated_at
"#;

const REQUEST_COLUMNS: &str = r#"
    id,
    booking_id,
    provider_id,
    status,
    response_at,
    response_note,
    estimated_start,
    estimated_duration_hours,
    created_at,
    updated_at
"#;

/// Result of a provider winning the acceptance race: the confirmed booking,
/// the accepted request, and every sibling offer that was closed with it.
#[derive(Debug)]
pub struct AcceptOutcome {
    pub booking: Booking,
    pub request: BookingRequest,
    pub expired_requests: Vec<BookingRequest>,
}

#[derive(Debug)]
pub struct RejectOutcome {
    pub booking: Booking,
    pub request: BookingRequest,
    /// True when this rejection closed the last open request and no sibling
    /// had been accepted.
    pub exhausted: bool,
}

#[derive(Debug)]
pub struct RequestExpiryOutcome {
    pub request: BookingRequest,
    pub booking: Booking,
    /// True when expiring this request left the parent booking with no open
    /// offers and cascaded it to expired.
    pub booking_expired: bool,
}

#[async_trait]
pub trait BookingExt {
    async fn create_booking(
        &self,
        customer_id: Uuid,
        service_name: String,
        scheduled_at: DateTime<Utc>,
        duration_hours: i32,
        base_price: BigDecimal,
        additional_fees: BigDecimal,
        total_amount: BigDecimal,
    ) -> Result<Booking, ServiceError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, ServiceError>;

    async fn get_bookings_by_customer(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError>;

    async fn get_bookings_by_provider(
        &self,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError>;

    async fn get_booking_history(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<BookingStatusHistoryEntry>, ServiceError>;

    /// One pending request per candidate, skipping providers that already
    /// hold one for this booking. Fails unless the booking is still pending.
    async fn create_booking_requests(
        &self,
        booking_id: Uuid,
        provider_ids: &[Uuid],
    ) -> Result<(Booking, Vec<BookingRequest>), ServiceError>;

    async fn get_booking_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<BookingRequest>, ServiceError>;

    async fn get_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<BookingRequest>, ServiceError>;

    /// First acceptance wins under the booking row lock: the booking moves
    /// pending -> confirmed with this provider assigned, and every other
    /// pending request is closed.
    async fn accept_booking_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        estimated_start: Option<DateTime<Utc>>,
        estimated_duration_hours: Option<i32>,
        note: Option<String>,
    ) -> Result<AcceptOutcome, ServiceError>;

    async fn reject_booking_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        note: Option<String>,
        mark_rejected_if_exhausted: bool,
    ) -> Result<RejectOutcome, ServiceError>;

    /// Forward-only move along the sub-status chain, appended to the history
    /// journal in the same transaction. Status, payment state and the gateway
    /// transaction reference piggyback on the same row update when the move
    /// implies them.
    async fn advance_job_status(
        &self,
        booking_id: Uuid,
        next: JobSubStatus,
        actor: Uuid,
        note: Option<String>,
        new_status: Option<BookingStatus>,
        new_payment_state: Option<PaymentState>,
        new_external_ref: Option<String>,
    ) -> Result<Booking, ServiceError>;

    async fn record_payment_authorized(
        &self,
        booking_id: Uuid,
        external_transaction_ref: String,
    ) -> Result<Booking, ServiceError>;

    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        cancelled_by: Uuid,
        reason: String,
        refund_amount: i64,
        new_payment_state: Option<PaymentState>,
    ) -> Result<(Booking, Vec<BookingRequest>), ServiceError>;

    async fn raise_dispute(
        &self,
        booking_id: Uuid,
        reason: String,
    ) -> Result<Booking, ServiceError>;

    async fn escalate_dispute(&self, booking_id: Uuid) -> Result<Booking, ServiceError>;

    async fn resolve_dispute(
        &self,
        booking_id: Uuid,
        admin_id: Uuid,
        resolution: DisputeResolution,
        admin_notes: Option<String>,
        refund_amount: Option<i64>,
        new_payment_state: Option<PaymentState>,
    ) -> Result<Booking, ServiceError>;

    async fn get_stale_pending_requests(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BookingRequest>, ServiceError>;

    /// Compare-and-swap expiry of one stale request. Returns None when the
    /// request was accepted or closed in the meantime.
    async fn expire_stale_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<RequestExpiryOutcome>, ServiceError>;

    async fn get_confirmed_bookings_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, ServiceError>;

    async fn get_overdue_confirmed_bookings(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, ServiceError>;
}

#[async_trait]
impl BookingExt for DBClient {
    async fn create_booking(
        &self,
        customer_id: Uuid,
        service_name: String,
        scheduled_at: DateTime<Utc>,
        duration_hours: i32,
        base_price: BigDecimal,
        additional_fees: BigDecimal,
        total_amount: BigDecimal,
    ) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings
            (customer_id, service_name, scheduled_at, duration_hours,
             base_price, additional_fees, total_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(customer_id)
        .bind(service_name)
        .bind(scheduled_at)
        .bind(duration_hours)
        .bind(base_price)
        .bind(additional_fees)
        .bind(total_amount)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(&mut tx, booking.id, JobSubStatus::Pending, customer_id, None).await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, ServiceError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn get_bookings_by_customer(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE customer_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOKING_COLUMNS
        ))
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn get_bookings_by_provider(
        &self,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE provider_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOKING_COLUMNS
        ))
        .bind(provider_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn get_booking_history(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<BookingStatusHistoryEntry>, ServiceError> {
        let entries = sqlx::query_as::<_, BookingStatusHistoryEntry>(
            r#"
            SELECT id, booking_id, sub_status, actor, note, created_at
            FROM booking_status_history
            WHERE booking_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn create_booking_requests(
        &self,
        booking_id: Uuid,
        provider_ids: &[Uuid],
    ) -> Result<(Booking, Vec<BookingRequest>), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }

        let mut created = Vec::with_capacity(provider_ids.len());
        for provider_id in provider_ids {
            // Duplicate offers to the same provider are skipped, not errors
            let inserted = sqlx::query_as::<_, BookingRequest>(&format!(
                r#"
                INSERT INTO booking_requests (booking_id, provider_id)
                VALUES ($1, $2)
                ON CONFLICT (booking_id, provider_id) DO NOTHING
                RETURNING {}
                "#,
                REQUEST_COLUMNS
            ))
            .bind(booking_id)
            .bind(provider_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(request) = inserted {
                created.push(request);
            }
        }

        tx.commit().await?;
        Ok((booking, created))
    }

    async fn get_booking_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<BookingRequest>, ServiceError> {
        let request = sqlx::query_as::<_, BookingRequest>(&format!(
            "SELECT {} FROM booking_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<BookingRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            SELECT {}
            FROM booking_requests
            WHERE booking_id = $1
            ORDER BY created_at ASC
            "#,
            REQUEST_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn accept_booking_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        estimated_start: Option<DateTime<Utc>>,
        estimated_duration_hours: Option<i32>,
        note: Option<String>,
    ) -> Result<AcceptOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request = fetch_request(&mut tx, request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if request.provider_id != provider_id {
            return Err(ServiceError::UnauthorizedAccess(provider_id, request_id));
        }

        let booking = lock_booking(&mut tx, request.booking_id).await?;

        // Re-read under the parent lock; a sibling may have won first
        let request = fetch_request(&mut tx, request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if booking.status != BookingStatus::Pending
            || request.status != BookingRequestStatus::Pending
        {
            return Err(ServiceError::OfferNoLongerAvailable(booking.id));
        }

        let accepted = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            UPDATE booking_requests
            SET status = 'accepted'::booking_request_status,
                response_at = NOW(),
                response_note = $2,
                estimated_start = $3,
                estimated_duration_hours = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(note.clone())
        .bind(estimated_start)
        .bind(estimated_duration_hours)
        .fetch_one(&mut *tx)
        .await?;

        let expired_requests = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            UPDATE booking_requests
            SET status = 'expired'::booking_request_status, updated_at = NOW()
            WHERE booking_id = $1 AND id <> $2 AND status = 'pending'::booking_request_status
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(booking.id)
        .bind(request_id)
        .fetch_all(&mut *tx)
        .await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET provider_id = $2,
                status = 'confirmed'::booking_status,
                current_sub_status = 'accepted'::job_sub_status,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(provider_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(&mut tx, booking.id, JobSubStatus::Accepted, provider_id, note).await?;

        tx.commit().await?;
        Ok(AcceptOutcome {
            booking,
            request: accepted,
            expired_requests,
        })
    }

    async fn reject_booking_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        note: Option<String>,
        mark_rejected_if_exhausted: bool,
    ) -> Result<RejectOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request = fetch_request(&mut tx, request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if request.provider_id != provider_id {
            return Err(ServiceError::UnauthorizedAccess(provider_id, request_id));
        }

        let mut booking = lock_booking(&mut tx, request.booking_id).await?;

        let request = fetch_request(&mut tx, request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if request.status != BookingRequestStatus::Pending {
            return Err(ServiceError::OfferNoLongerAvailable(booking.id));
        }

        let rejected = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            UPDATE booking_requests
            SET status = 'rejected'::booking_request_status,
                response_at = NOW(),
                response_note = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        let open_count = sqlx::query(
            "SELECT COUNT(*) as count FROM booking_requests WHERE booking_id = $1 AND status = 'pending'::booking_request_status",
        )
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?
        .get::<i64, _>("count");

        let exhausted = open_count == 0 && booking.status == BookingStatus::Pending;

        if exhausted && mark_rejected_if_exhausted {
            booking = sqlx::query_as::<_, Booking>(&format!(
                r#"
                UPDATE bookings
                SET status = 'provider_rejected'::booking_status, updated_at = NOW()
                WHERE id = $1 AND status = 'pending'::booking_status
                RETURNING {}
                "#,
                BOOKING_COLUMNS
            ))
            .bind(booking.id)
            .fetch_one(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(RejectOutcome {
            booking,
            request: rejected,
            exhausted,
        })
    }

    async fn advance_job_status(
        &self,
        booking_id: Uuid,
        next: JobSubStatus,
        actor: Uuid,
        note: Option<String>,
        new_status: Option<BookingStatus>,
        new_payment_state: Option<PaymentState>,
        new_external_ref: Option<String>,
    ) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if booking.status != BookingStatus::Confirmed
            && booking.status != BookingStatus::InProgress
        {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }

        // Forward moves only, one step at a time
        if next.rank() != booking.current_sub_status.rank() + 1 {
            return Err(ServiceError::InvalidSubStatusTransition(
                booking_id,
                booking.current_sub_status,
                next,
            ));
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET current_sub_status = $2,
                status = COALESCE($3, status),
                payment_state = COALESCE($4, payment_state),
                external_transaction_ref = COALESCE($5, external_transaction_ref),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(next)
        .bind(new_status)
        .bind(new_payment_state)
        .bind(new_external_ref)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(&mut tx, booking_id, next, actor, note).await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn record_payment_authorized(
        &self,
        booking_id: Uuid,
        external_transaction_ref: String,
    ) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if booking.status != BookingStatus::Pending && booking.status != BookingStatus::Confirmed {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }
        if booking.payment_state != PaymentState::Pending {
            return Err(ServiceError::InvalidPaymentState(
                booking_id,
                booking.payment_state,
            ));
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET payment_state = 'authorized'::payment_state,
                external_transaction_ref = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(external_transaction_ref)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        cancelled_by: Uuid,
        reason: String,
        refund_amount: i64,
        new_payment_state: Option<PaymentState>,
    ) -> Result<(Booking, Vec<BookingRequest>), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if !booking.status.is_cancellable() {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }

        let closed_requests = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            UPDATE booking_requests
            SET status = 'expired'::booking_request_status, updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending'::booking_request_status
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = 'cancelled'::booking_status,
                cancelled_by = $2,
                cancellation_reason = $3,
                cancelled_at = NOW(),
                refund_amount = $4,
                payment_state = COALESCE($5, payment_state),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(cancelled_by)
        .bind(reason)
        .bind(refund_amount)
        .bind(new_payment_state)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((booking, closed_requests))
    }

    async fn raise_dispute(
        &self,
        booking_id: Uuid,
        reason: String,
    ) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if booking.status != BookingStatus::InProgress
            && booking.status != BookingStatus::Completed
        {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }
        if booking.is_disputed {
            return Err(ServiceError::DisputeAlreadyOpen(booking_id));
        }
        // Resolution is terminal; a resolved booking cannot be re-disputed
        if booking.dispute_resolution.is_some() {
            return Err(ServiceError::DisputeAlreadyResolved(booking_id));
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET is_disputed = TRUE, dispute_reason = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn escalate_dispute(&self, booking_id: Uuid) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if !booking.is_disputed {
            return Err(ServiceError::DisputeNotOpen(booking_id));
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET dispute_escalated = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn resolve_dispute(
        &self,
        booking_id: Uuid,
        admin_id: Uuid,
        resolution: DisputeResolution,
        admin_notes: Option<String>,
        refund_amount: Option<i64>,
        new_payment_state: Option<PaymentState>,
    ) -> Result<Booking, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;

        if !booking.is_disputed {
            return Err(ServiceError::DisputeNotOpen(booking_id));
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET is_disputed = FALSE,
                dispute_resolution = $2,
                dispute_resolved_by = $3,
                dispute_resolved_at = NOW(),
                dispute_admin_notes = $4,
                refund_amount = COALESCE($5, refund_amount),
                payment_state = COALESCE($6, payment_state),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(resolution)
        .bind(admin_id)
        .bind(admin_notes)
        .bind(refund_amount)
        .bind(new_payment_state)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn get_stale_pending_requests(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BookingRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            SELECT {}
            FROM booking_requests
            WHERE status = 'pending'::booking_request_status AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            REQUEST_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn expire_stale_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<RequestExpiryOutcome>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let request = fetch_request(&mut tx, request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        let booking = lock_booking(&mut tx, request.booking_id).await?;

        // A last-moment acceptance wins; expire only if still pending
        let expired = sqlx::query_as::<_, BookingRequest>(&format!(
            r#"
            UPDATE booking_requests
            SET status = 'expired'::booking_request_status, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'::booking_request_status
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let expired = match expired {
            Some(request) => request,
            None => return Ok(None),
        };

        let open_count = sqlx::query(
            "SELECT COUNT(*) as count FROM booking_requests WHERE booking_id = $1 AND status = 'pending'::booking_request_status",
        )
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?
        .get::<i64, _>("count");

        let cascade = open_count == 0 && booking.status == BookingStatus::Pending;
        let booking = if cascade {
            sqlx::query_as::<_, Booking>(&format!(
                r#"
                UPDATE bookings
                SET status = 'expired'::booking_status, updated_at = NOW()
                WHERE id = $1 AND status = 'pending'::booking_status
                RETURNING {}
                "#,
                BOOKING_COLUMNS
            ))
            .bind(booking.id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            booking
        };

        tx.commit().await?;
        Ok(Some(RequestExpiryOutcome {
            request: expired,
            booking,
            booking_expired: cascade,
        }))
    }

    async fn get_confirmed_bookings_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, ServiceError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'confirmed'::booking_status
            AND scheduled_at >= $1 AND scheduled_at < $2
            ORDER BY scheduled_at ASC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn get_overdue_confirmed_bookings(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, ServiceError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'confirmed'::booking_status AND scheduled_at < $1
            ORDER BY scheduled_at ASC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }
}

async fn lock_booking(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    booking_id: Uuid,
) -> Result<Booking, ServiceError> {
    sqlx::query_as::<_, Booking>(&format!(
        "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
        BOOKING_COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ServiceError::BookingNotFound(booking_id))
}

async fn fetch_request(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request_id: Uuid,
) -> Result<Option<BookingRequest>, sqlx::Error> {
    sqlx::query_as::<_, BookingRequest>(&format!(
        "SELECT {} FROM booking_requests WHERE id = $1",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn insert_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    booking_id: Uuid,
    sub_status: JobSubStatus,
    actor: Uuid,
    note: Option<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO booking_status_history (booking_id, sub_status, actor, note) VALUES ($1, $2, $3, $4)",
    )
    .bind(booking_id)
    .bind(sub_status)
    .bind(actor)
    .bind(note)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::postgres::PgPool;

    async fn seeded_booking(db: &DBClient) -> Booking {
        db.create_booking(
            Uuid::new_v4(),
            "Deep cleaning".to_string(),
            Utc::now() + Duration::hours(48),
            4,
            BigDecimal::from(200),
            BigDecimal::from(0),
            BigDecimal::from(200),
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_second_acceptance_loses_the_race(pool: PgPool) {
        let db = DBClient::new(pool);
        let booking = seeded_booking(&db).await;
        let provider_a = Uuid::new_v4();
        let provider_b = Uuid::new_v4();
        let (_, requests) = db
            .create_booking_requests(booking.id, &[provider_a, provider_b])
            .await
            .unwrap();
        let request_a = requests
            .iter()
            .find(|request| request.provider_id == provider_a)
            .unwrap();
        let request_b = requests
            .iter()
            .find(|request| request.provider_id == provider_b)
            .unwrap();

        let outcome = db
            .accept_booking_request(request_a.id, provider_a, None, None, None)
            .await
            .unwrap();
        assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
        assert_eq!(outcome.booking.provider_id, Some(provider_a));
        assert_eq!(outcome.expired_requests.len(), 1);
        assert_eq!(outcome.expired_requests[0].provider_id, provider_b);

        let err = db
            .accept_booking_request(request_b.id, provider_b, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OfferNoLongerAvailable(_)));

        let booking = db.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.provider_id, Some(provider_a));
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_expiry_skips_request_accepted_meanwhile(pool: PgPool) {
        let db = DBClient::new(pool);
        let booking = seeded_booking(&db).await;
        let provider = Uuid::new_v4();
        let (_, requests) = db
            .create_booking_requests(booking.id, &[provider])
            .await
            .unwrap();
        db.accept_booking_request(requests[0].id, provider, None, None, None)
            .await
            .unwrap();

        let outcome = db.expire_stale_request(requests[0].id).await.unwrap();
        assert!(outcome.is_none());

        let request = db
            .get_booking_request(requests[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, BookingRequestStatus::Accepted);
        let booking = db.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_expiring_last_open_request_cascades_to_booking(pool: PgPool) {
        let db = DBClient::new(pool);
        let booking = seeded_booking(&db).await;
        let (_, requests) = db
            .create_booking_requests(booking.id, &[Uuid::new_v4()])
            .await
            .unwrap();

        let outcome = db
            .expire_stale_request(requests[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.request.status, BookingRequestStatus::Expired);
        assert!(outcome.booking_expired);
        assert_eq!(outcome.booking.status, BookingStatus::Expired);
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_resolved_dispute_cannot_be_reraised(pool: PgPool) {
        let db = DBClient::new(pool);
        let booking = seeded_booking(&db).await;
        let provider = Uuid::new_v4();
        let (_, requests) = db
            .create_booking_requests(booking.id, &[provider])
            .await
            .unwrap();
        db.accept_booking_request(requests[0].id, provider, None, None, None)
            .await
            .unwrap();
        db.advance_job_status(
            booking.id,
            JobSubStatus::OnWay,
            provider,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();
        db.advance_job_status(
            booking.id,
            JobSubStatus::InProgress,
            provider,
            None,
            Some(BookingStatus::InProgress),
            None,
            None,
        )
        .await
        .unwrap();

        db.raise_dispute(booking.id, "Work not finished".to_string())
            .await
            .unwrap();
        let resolved = db
            .resolve_dispute(
                booking.id,
                Uuid::new_v4(),
                DisputeResolution::Resolved,
                None,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!resolved.is_disputed);

        let err = db
            .raise_dispute(booking.id, "Trying again".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DisputeAlreadyResolved(_)));
    }
}
