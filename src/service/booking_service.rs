// service/booking_service.rs
use std::sync::Arc;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use uuid::Uuid;
use validator::Validate;

use crate::db::bookingdb::BookingExt;
use crate::db::db::DBClient;
use crate::dtos::bookingdtos::{
    AcceptRequestDto, AdvanceJobStatusDto, BookingDetailsDto, CancelBookingDto,
    CancellationOutcomeDto, CreateBookingDto, RaiseDisputeDto, ResolveDisputeDto,
};
use crate::models::bookingmodel::{Booking, BookingStatus, JobSubStatus, PaymentState};
use crate::service::commission_service::CommissionService;
use crate::service::error::ServiceError;
use crate::service::notification_service::NotificationService;
use crate::service::payment_gateway::PaymentGateway;
use crate::service::wallet_service::WalletService;
use crate::utils::currency::decimal_to_kobo;

/// Booking lifecycle orchestration. Money effects always go through the
/// wallet service; this component never writes ledger rows itself.
pub struct BookingService {
    db_client: Arc<DBClient>,
    wallet_service: Arc<WalletService>,
    commission_service: Arc<CommissionService>,
    notification_service: Arc<NotificationService>,
    payment_gateway: Arc<dyn PaymentGateway>,
    refund_full_window_hours: i64,
    refund_partial_window_hours: i64,
}

impl BookingService {
    pub fn new(
        db_client: Arc<DBClient>,
        wallet_service: Arc<WalletService>,
        commission_service: Arc<CommissionService>,
        notification_service: Arc<NotificationService>,
        payment_gateway: Arc<dyn PaymentGateway>,
        refund_full_window_hours: i64,
        refund_partial_window_hours: i64,
    ) -> Self {
        Self {
            db_client,
            wallet_service,
            commission_service,
            notification_service,
            payment_gateway,
            refund_full_window_hours,
            refund_partial_window_hours,
        }
    }

    pub async fn create_booking(&self, dto: CreateBookingDto) -> Result<Booking, ServiceError> {
        dto.validate()?;

        if dto.scheduled_at <= Utc::now() {
            return Err(ServiceError::Validation(
                "Scheduled time must be in the future".to_string(),
            ));
        }

        let base_price = Self::price_to_decimal(dto.base_price).ok_or_else(|| {
            ServiceError::Validation("Base price is not a valid amount".to_string())
        })?;
        let additional_fees = Self::price_to_decimal(dto.additional_fees).ok_or_else(|| {
            ServiceError::Validation("Additional fees are not a valid amount".to_string())
        })?;
        let total_amount = &base_price + &additional_fees;

        let booking = self
            .db_client
            .create_booking(
                dto.customer_id,
                dto.service_name,
                dto.scheduled_at,
                dto.duration_hours,
                base_price,
                additional_fees,
                total_amount,
            )
            .await?;

        tracing::info!(
            "Booking {} created by customer {}",
            booking.id,
            booking.customer_id
        );
        Ok(booking)
    }

    /// f64 price intake normalized to two decimals, rounding half up.
    /// Truncation would turn 0.29 into 0.28 whenever the nearest double
    /// sits just below the written value.
    fn price_to_decimal(value: f64) -> Option<BigDecimal> {
        BigDecimal::from_f64(value).map(|amount| amount.with_scale_round(2, RoundingMode::HalfUp))
    }

    pub async fn get_booking_details(
        &self,
        booking_id: Uuid,
    ) -> Result<BookingDetailsDto, ServiceError> {
        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;
        let history = self.db_client.get_booking_history(booking_id).await?;
        let requests = self.db_client.get_requests_for_booking(booking_id).await?;

        Ok(BookingDetailsDto {
            booking,
            history,
            requests,
        })
    }

    pub async fn get_customer_bookings(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError> {
        self.db_client
            .get_bookings_by_customer(customer_id, limit, offset)
            .await
    }

    pub async fn get_provider_bookings(
        &self,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, ServiceError> {
        self.db_client
            .get_bookings_by_provider(provider_id, limit, offset)
            .await
    }

    /// Runs the gateway authorization for the full booking amount and records
    /// the returned reference. Legal while the booking is pending or
    /// confirmed and nothing has been authorized yet.
    pub async fn authorize_payment(&self, booking_id: Uuid) -> Result<Booking, ServiceError> {
        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if booking.status != BookingStatus::Pending && booking.status != BookingStatus::Confirmed {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }
        if booking.payment_state != PaymentState::Pending {
            return Err(ServiceError::InvalidPaymentState(
                booking_id,
                booking.payment_state,
            ));
        }

        let amount = decimal_to_kobo(&booking.total_amount);
        let payer_reference = format!("bk_{}", booking.id);
        let authorization = self
            .payment_gateway
            .authorize(amount, &booking.currency, &payer_reference)
            .await?;

        let updated = self
            .db_client
            .record_payment_authorized(booking_id, authorization.auth_id)
            .await?;

        self.notification_service
            .notify_payment_authorized(&updated)
            .await?;

        tracing::info!(
            "Payment authorized for booking {}: {} kobo",
            booking_id,
            amount
        );
        Ok(updated)
    }

    /// First acceptance wins; everyone else holding an open offer for this
    /// booking is told it closed.
    pub async fn accept_by_provider(
        &self,
        request_id: Uuid,
        dto: AcceptRequestDto,
    ) -> Result<Booking, ServiceError> {
        dto.validate()?;

        let outcome = self
            .db_client
            .accept_booking_request(
                request_id,
                dto.provider_id,
                dto.estimated_start,
                dto.estimated_duration_hours,
                dto.note,
            )
            .await?;

        self.notification_service
            .notify_booking_confirmed(&outcome.booking, dto.provider_id)
            .await?;

        let results =
            futures::future::join_all(outcome.expired_requests.iter().map(|request| {
                self.notification_service
                    .notify_offer_closed(request.provider_id, &outcome.booking)
            }))
            .await;
        for result in results {
            if let Err(err) = result {
                tracing::error!("Failed to notify closed offer: {}", err);
            }
        }

        tracing::info!(
            "Booking {} confirmed: provider {} accepted request {}",
            outcome.booking.id,
            dto.provider_id,
            request_id
        );
        Ok(outcome.booking)
    }

    /// Forward move along the job sub-status chain. Reaching completed
    /// captures an authorized payment and settles the provider's net share.
    pub async fn advance_job_status(
        &self,
        booking_id: Uuid,
        dto: AdvanceJobStatusDto,
    ) -> Result<Booking, ServiceError> {
        dto.validate()?;

        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if booking.provider_id != Some(dto.actor) {
            return Err(ServiceError::UnauthorizedAccess(dto.actor, booking_id));
        }

        // Completion already committed: replaying the move re-runs only the
        // settlement leg, and only if its ledger entry is missing.
        if dto.new_sub_status == JobSubStatus::Completed
            && booking.status == BookingStatus::Completed
            && booking.current_sub_status == JobSubStatus::Completed
        {
            let settlement_reference = format!("settle_{}", booking.id);
            if self
                .wallet_service
                .get_transaction_by_reference(&settlement_reference)
                .await?
                .is_none()
            {
                self.settle_completed_booking(&booking).await?;
            }
            return Ok(booking);
        }

        let (new_status, new_payment_state, new_external_ref) = match dto.new_sub_status {
            JobSubStatus::InProgress => (Some(BookingStatus::InProgress), None, None),
            JobSubStatus::Completed => self.prepare_completion(&booking).await?,
            _ => (None, None, None),
        };

        let updated = self
            .db_client
            .advance_job_status(
                booking_id,
                dto.new_sub_status,
                dto.actor,
                dto.note.clone(),
                new_status,
                new_payment_state,
                new_external_ref,
            )
            .await?;

        self.notification_service
            .notify_job_status_update(&updated, dto.new_sub_status, dto.note.as_deref())
            .await?;

        if dto.new_sub_status == JobSubStatus::Completed {
            self.settle_completed_booking(&updated).await?;
        }

        tracing::info!(
            "Booking {} advanced to {}",
            booking_id,
            dto.new_sub_status.to_str()
        );
        Ok(updated)
    }

    /// Completion requires the payment captured. An authorized payment is
    /// captured here, before the status commit, so the gateway transaction
    /// reference lands on the same row update. Capture is idempotent per
    /// authorization reference at the gateway.
    async fn prepare_completion(
        &self,
        booking: &Booking,
    ) -> Result<(Option<BookingStatus>, Option<PaymentState>, Option<String>), ServiceError> {
        match booking.payment_state {
            PaymentState::Paid => Ok((Some(BookingStatus::Completed), None, None)),
            PaymentState::Authorized => {
                let auth_reference = booking.external_transaction_ref.clone().ok_or(
                    ServiceError::InvalidPaymentState(booking.id, booking.payment_state),
                )?;
                let capture = self.payment_gateway.capture(&auth_reference).await?;
                Ok((
                    Some(BookingStatus::Completed),
                    Some(PaymentState::Paid),
                    Some(capture.external_txn_id),
                ))
            }
            _ => Err(ServiceError::InvalidPaymentState(
                booking.id,
                booking.payment_state,
            )),
        }
    }

    /// Credits the provider's net share under the stable settlement
    /// reference. The credit replays as a no-op if it already landed.
    async fn settle_completed_booking(&self, booking: &Booking) -> Result<(), ServiceError> {
        let provider_id = booking
            .provider_id
            .ok_or(ServiceError::InvalidBookingStatus(booking.id, booking.status))?;

        let gross_amount = decimal_to_kobo(&booking.total_amount);
        let breakdown = self
            .commission_service
            .calculate_for_amount(gross_amount)
            .await?;

        self.wallet_service
            .credit(
                provider_id,
                breakdown.net_amount,
                format!("settle_{}", booking.id),
                format!("Settlement for booking {}", booking.service_name),
                Some(serde_json::json!({
                    "booking_id": booking.id,
                    "gross_amount": breakdown.gross_amount,
                    "commission": breakdown.commission,
                    "rate_bps": breakdown.rate_bps,
                    "tier_version": breakdown.version,
                })),
                Some(booking.id),
            )
            .await?;

        self.notification_service
            .notify_booking_completed(booking)
            .await?;
        self.notification_service
            .notify_payment_received(provider_id, booking, breakdown.net_amount)
            .await?;

        tracing::info!(
            "Booking {} settled: provider {} credited {} of {} gross",
            booking.id,
            provider_id,
            breakdown.net_amount,
            breakdown.gross_amount
        );
        Ok(())
    }

    /// Cancels a pre-completion booking. Captured money is refunded through
    /// the gateway before anything is recorded locally; the ledger entry is
    /// written only after gateway success. Re-invoking after the cancellation
    /// committed re-runs only a missing refund credit.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        dto: CancelBookingDto,
    ) -> Result<CancellationOutcomeDto, ServiceError> {
        dto.validate()?;

        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if dto.cancelled_by != booking.customer_id && booking.provider_id != Some(dto.cancelled_by)
        {
            return Err(ServiceError::UnauthorizedAccess(dto.cancelled_by, booking_id));
        }

        // Cancellation already committed: replaying the call re-runs only the
        // refund credit, and only if its ledger entry is missing.
        if booking.status == BookingStatus::Cancelled {
            return self.replay_cancellation_refund(booking).await;
        }

        if !booking.status.is_cancellable() {
            return Err(ServiceError::InvalidBookingStatus(booking_id, booking.status));
        }

        let refund_percent = Self::refund_percent(
            booking.scheduled_at,
            Utc::now(),
            self.refund_full_window_hours,
            self.refund_partial_window_hours,
        );
        let gross_amount = decimal_to_kobo(&booking.total_amount);
        let refund_amount = gross_amount * i64::from(refund_percent) / 100;

        let refunded = booking.payment_state == PaymentState::Paid && refund_amount > 0;
        if refunded {
            let external_reference = booking.external_transaction_ref.clone().ok_or(
                ServiceError::InvalidPaymentState(booking_id, booking.payment_state),
            )?;
            self.payment_gateway
                .refund(&external_reference, refund_amount)
                .await?;
        }

        let recorded_refund = if refunded { refund_amount } else { 0 };
        let new_payment_state = if refunded {
            Some(PaymentState::Refunded)
        } else {
            None
        };

        let (cancelled, closed_requests) = self
            .db_client
            .cancel_booking(
                booking_id,
                dto.cancelled_by,
                dto.reason,
                recorded_refund,
                new_payment_state,
            )
            .await?;

        if refunded {
            self.wallet_service
                .refund(
                    cancelled.customer_id,
                    refund_amount,
                    format!("bkrf_{}", booking_id),
                    format!("Refund for cancelled booking {}", cancelled.service_name),
                    cancelled.external_transaction_ref.clone(),
                    Some(serde_json::json!({ "refund_percent": refund_percent })),
                    Some(booking_id),
                )
                .await?;
        }

        self.notification_service
            .notify_booking_cancelled(&cancelled, recorded_refund)
            .await?;

        let results = futures::future::join_all(closed_requests.iter().map(|request| {
            self.notification_service
                .notify_offer_closed(request.provider_id, &cancelled)
        }))
        .await;
        for result in results {
            if let Err(err) = result {
                tracing::error!("Failed to notify closed offer: {}", err);
            }
        }

        tracing::info!(
            "Booking {} cancelled by {}: refund {}% ({} kobo)",
            booking_id,
            dto.cancelled_by,
            refund_percent,
            recorded_refund
        );
        Ok(CancellationOutcomeDto {
            booking: cancelled,
            refund_amount: recorded_refund,
            refund_percent,
        })
    }

    /// Recovery path for a cancellation whose wallet credit never landed.
    /// The recorded refund is credited under the stable `bkrf_` reference;
    /// a credit already on the ledger is left untouched.
    async fn replay_cancellation_refund(
        &self,
        booking: Booking,
    ) -> Result<CancellationOutcomeDto, ServiceError> {
        let refund_amount = booking.refund_amount.unwrap_or(0);
        let refund_percent = match booking.cancelled_at {
            Some(cancelled_at) => Self::refund_percent(
                booking.scheduled_at,
                cancelled_at,
                self.refund_full_window_hours,
                self.refund_partial_window_hours,
            ),
            None => 0,
        };

        if refund_amount > 0 {
            let refund_reference = format!("bkrf_{}", booking.id);
            if self
                .wallet_service
                .get_transaction_by_reference(&refund_reference)
                .await?
                .is_none()
            {
                self.wallet_service
                    .refund(
                        booking.customer_id,
                        refund_amount,
                        refund_reference,
                        format!("Refund for cancelled booking {}", booking.service_name),
                        booking.external_transaction_ref.clone(),
                        Some(serde_json::json!({ "refund_percent": refund_percent })),
                        Some(booking.id),
                    )
                    .await?;
                self.notification_service
                    .notify_booking_cancelled(&booking, refund_amount)
                    .await?;
                tracing::info!(
                    "Booking {} cancellation replayed: credited the missing {} kobo refund",
                    booking.id,
                    refund_amount
                );
            }
        }

        Ok(CancellationOutcomeDto {
            booking,
            refund_amount,
            refund_percent,
        })
    }

    /// Time-based cancellation refund: full refund outside the full window,
    /// half refund down to the partial window, nothing inside it.
    pub fn refund_percent(
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
        full_window_hours: i64,
        partial_window_hours: i64,
    ) -> u32 {
        let minutes_until = (scheduled_at - now).num_minutes();
        if minutes_until > full_window_hours * 60 {
            100
        } else if minutes_until >= partial_window_hours * 60 {
            50
        } else {
            0
        }
    }

    pub async fn raise_dispute(
        &self,
        booking_id: Uuid,
        dto: RaiseDisputeDto,
    ) -> Result<Booking, ServiceError> {
        dto.validate()?;

        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if dto.raised_by != booking.customer_id && booking.provider_id != Some(dto.raised_by) {
            return Err(ServiceError::UnauthorizedAccess(dto.raised_by, booking_id));
        }

        let disputed = self.db_client.raise_dispute(booking_id, dto.reason).await?;

        self.notification_service
            .notify_dispute_raised(&disputed, dto.raised_by)
            .await?;

        tracing::info!(
            "Dispute raised on booking {} by {}",
            booking_id,
            dto.raised_by
        );
        Ok(disputed)
    }

    pub async fn escalate_dispute(
        &self,
        booking_id: Uuid,
        actor: Uuid,
    ) -> Result<Booking, ServiceError> {
        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if actor != booking.customer_id && booking.provider_id != Some(actor) {
            return Err(ServiceError::UnauthorizedAccess(actor, booking_id));
        }

        let escalated = self.db_client.escalate_dispute(booking_id).await?;

        self.notification_service
            .notify_dispute_escalated(&escalated)
            .await?;

        tracing::info!("Dispute escalated on booking {} by {}", booking_id, actor);
        Ok(escalated)
    }

    /// A dispute refund can return at most what the booking charged.
    fn validate_refund_amount(refund_amount: i64, gross_amount: i64) -> Result<(), ServiceError> {
        if refund_amount > gross_amount {
            return Err(ServiceError::Validation(format!(
                "Refund of {} kobo exceeds the booking total of {} kobo",
                refund_amount, gross_amount
            )));
        }
        Ok(())
    }

    /// Admin resolution. The penalty debit runs first so an insufficient
    /// provider balance aborts before any gateway call.
    pub async fn resolve_dispute(
        &self,
        booking_id: Uuid,
        admin_id: Uuid,
        dto: ResolveDisputeDto,
    ) -> Result<Booking, ServiceError> {
        dto.validate()?;

        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if !booking.is_disputed {
            return Err(ServiceError::DisputeNotOpen(booking_id));
        }

        if let Some(refund_amount) = dto.refund_amount {
            Self::validate_refund_amount(refund_amount, decimal_to_kobo(&booking.total_amount))?;
        }

        if let Some(penalty_amount) = dto.penalty_amount {
            let provider_id = booking.provider_id.ok_or_else(|| {
                ServiceError::Validation(
                    "Booking has no assigned provider to penalize".to_string(),
                )
            })?;

            self.wallet_service
                .debit(
                    provider_id,
                    penalty_amount,
                    format!("dsppen_{}", booking_id),
                    format!("Dispute penalty for booking {}", booking.service_name),
                    Some(serde_json::json!({ "resolution": dto.resolution })),
                    Some(booking_id),
                )
                .await?;
        }

        let mut new_payment_state = None;
        if let Some(refund_amount) = dto.refund_amount {
            if booking.payment_state == PaymentState::Paid {
                let external_reference = booking.external_transaction_ref.clone().ok_or(
                    ServiceError::InvalidPaymentState(booking_id, booking.payment_state),
                )?;
                self.payment_gateway
                    .refund(&external_reference, refund_amount)
                    .await?;
                new_payment_state = Some(PaymentState::Refunded);
            }

            self.wallet_service
                .refund(
                    booking.customer_id,
                    refund_amount,
                    format!("dsprf_{}", booking_id),
                    format!("Dispute refund for booking {}", booking.service_name),
                    booking.external_transaction_ref.clone(),
                    Some(serde_json::json!({ "resolution": dto.resolution })),
                    Some(booking_id),
                )
                .await?;
        }

        let resolved = self
            .db_client
            .resolve_dispute(
                booking_id,
                admin_id,
                dto.resolution,
                dto.admin_notes,
                dto.refund_amount,
                new_payment_state,
            )
            .await?;

        self.notification_service
            .notify_dispute_resolved(&resolved, dto.resolution)
            .await?;

        tracing::info!(
            "Dispute on booking {} resolved by admin {}: {:?}",
            booking_id,
            admin_id,
            dto.resolution
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::payment_gateway::HttpPaymentGateway;
    use chrono::Duration;
    use sqlx::postgres::PgPool;

    #[test]
    fn test_refund_percent_outside_full_window() {
        let now = Utc::now();
        let percent = BookingService::refund_percent(now + Duration::hours(30), now, 24, 2);
        assert_eq!(percent, 100);
    }

    #[test]
    fn test_refund_percent_partial_window() {
        let now = Utc::now();
        let percent = BookingService::refund_percent(now + Duration::hours(10), now, 24, 2);
        assert_eq!(percent, 50);
    }

    #[test]
    fn test_refund_percent_inside_partial_window() {
        let now = Utc::now();
        let percent = BookingService::refund_percent(now + Duration::hours(1), now, 24, 2);
        assert_eq!(percent, 0);
    }

    #[test]
    fn test_refund_percent_window_edges() {
        let now = Utc::now();
        // Exactly on the full window edge drops to the partial rate
        assert_eq!(
            BookingService::refund_percent(now + Duration::hours(24), now, 24, 2),
            50
        );
        // Exactly on the partial window edge still refunds half
        assert_eq!(
            BookingService::refund_percent(now + Duration::hours(2), now, 24, 2),
            50
        );
    }

    #[test]
    fn test_refund_percent_past_schedule() {
        let now = Utc::now();
        let percent = BookingService::refund_percent(now - Duration::hours(1), now, 24, 2);
        assert_eq!(percent, 0);
    }

    #[test]
    fn test_price_intake_keeps_two_decimal_inputs() {
        // The nearest double to 0.29 sits just below it; truncation at
        // scale 2 yields 0.28
        assert_eq!(
            BookingService::price_to_decimal(0.29).unwrap().to_string(),
            "0.29"
        );
        assert_eq!(
            BookingService::price_to_decimal(123.45).unwrap().to_string(),
            "123.45"
        );
        assert_eq!(
            BookingService::price_to_decimal(50.0).unwrap().to_string(),
            "50.00"
        );
        assert!(BookingService::price_to_decimal(f64::NAN).is_none());
    }

    #[test]
    fn test_dispute_refund_cannot_exceed_booking_total() {
        assert!(BookingService::validate_refund_amount(5_000, 10_000).is_ok());
        assert!(BookingService::validate_refund_amount(10_000, 10_000).is_ok());
        assert!(BookingService::validate_refund_amount(10_001, 10_000).is_err());
        assert!(BookingService::validate_refund_amount(i64::MAX, 10_000).is_err());
    }

    #[tokio::test]
    async fn test_booking_service_construction() {
        let pool = PgPool::connect_lazy("postgres://localhost/taskpay").unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let wallet_service = Arc::new(WalletService::new(db_client.clone()));
        let commission_service = Arc::new(CommissionService::new(db_client.clone()));
        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
            "http://localhost:9090".to_string(),
            "sk_test".to_string(),
        ));
        let service = BookingService::new(
            db_client,
            wallet_service,
            commission_service,
            notification_service,
            gateway,
            24,
            2,
        );
        assert_eq!(service.refund_full_window_hours, 24);
    }

    #[sqlx::test]
    #[ignore] // Requires a running Postgres
    async fn test_cancelled_booking_replays_missing_refund_credit(pool: PgPool) {
        let db_client = Arc::new(DBClient::new(pool));
        let wallet_service = Arc::new(WalletService::new(db_client.clone()));
        let commission_service = Arc::new(CommissionService::new(db_client.clone()));
        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
            "http://localhost:9090".to_string(),
            "sk_test".to_string(),
        ));
        let service = BookingService::new(
            db_client.clone(),
            wallet_service.clone(),
            commission_service,
            notification_service,
            gateway,
            24,
            2,
        );

        let customer_id = Uuid::new_v4();
        let booking = db_client
            .create_booking(
                customer_id,
                "Deep cleaning".to_string(),
                Utc::now() + Duration::hours(48),
                4,
                BigDecimal::from(200),
                BigDecimal::from(0),
                BigDecimal::from(200),
            )
            .await
            .unwrap();

        // Cancellation committed with a recorded refund, but the wallet
        // credit never landed.
        db_client
            .cancel_booking(
                booking.id,
                customer_id,
                "Changed plans".to_string(),
                5_000,
                Some(PaymentState::Refunded),
            )
            .await
            .unwrap();

        let dto = CancelBookingDto {
            cancelled_by: customer_id,
            reason: "Changed plans".to_string(),
        };
        let outcome = service.cancel_booking(booking.id, dto).await.unwrap();
        assert_eq!(outcome.refund_amount, 5_000);

        let wallet = wallet_service
            .get_wallet(customer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 5_000);

        // A second replay finds the credit on the ledger and leaves it alone.
        let dto = CancelBookingDto {
            cancelled_by: customer_id,
            reason: "Changed plans".to_string(),
        };
        service.cancel_booking(booking.id, dto).await.unwrap();

        let wallet = wallet_service
            .get_wallet(customer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 5_000);
        assert_eq!(wallet.available_balance, 5_000);
    }
}
