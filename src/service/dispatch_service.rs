// service/dispatch_service.rs
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::db::bookingdb::{BookingExt, RejectOutcome};
use crate::db::db::DBClient;
use crate::dtos::bookingdtos::{AcceptRequestDto, DispatchRequestsDto, RejectRequestDto};
use crate::models::bookingmodel::{Booking, BookingRequest};
use crate::service::booking_service::BookingService;
use crate::service::error::ServiceError;
use crate::service::notification_service::NotificationService;

/// Offers a pending booking to candidate providers and routes their
/// responses. Provider selection itself belongs to the outer system.
pub struct DispatchService {
    db_client: Arc<DBClient>,
    booking_service: Arc<BookingService>,
    notification_service: Arc<NotificationService>,
    auto_redispatch: bool,
}

impl DispatchService {
    pub fn new(
        db_client: Arc<DBClient>,
        booking_service: Arc<BookingService>,
        notification_service: Arc<NotificationService>,
        auto_redispatch: bool,
    ) -> Self {
        Self {
            db_client,
            booking_service,
            notification_service,
            auto_redispatch,
        }
    }

    /// One pending offer per candidate; providers already holding one for
    /// this booking keep it unchanged.
    pub async fn dispatch(
        &self,
        dto: DispatchRequestsDto,
    ) -> Result<Vec<BookingRequest>, ServiceError> {
        dto.validate()?;

        let (booking, requests) = self
            .db_client
            .create_booking_requests(dto.booking_id, &dto.provider_ids)
            .await?;

        let results = futures::future::join_all(requests.iter().map(|request| {
            self.notification_service
                .notify_offer_received(request.provider_id, &booking)
        }))
        .await;
        for result in results {
            if let Err(err) = result {
                tracing::error!("Failed to notify dispatched offer: {}", err);
            }
        }

        tracing::info!(
            "Booking {} dispatched to {} providers",
            booking.id,
            requests.len()
        );
        Ok(requests)
    }

    pub async fn accept_request(
        &self,
        request_id: Uuid,
        dto: AcceptRequestDto,
    ) -> Result<Booking, ServiceError> {
        let provider_id = dto.provider_id;
        match self.booking_service.accept_by_provider(request_id, dto).await {
            Err(err) if err.is_conflict() => {
                // Lost races are routine, not alerts
                tracing::info!(
                    "Provider {} lost the acceptance race for request {}",
                    provider_id,
                    request_id
                );
                Err(err)
            }
            other => other,
        }
    }

    /// When the last open offer is declined with nothing accepted, the
    /// booking either waits for a re-offer (auto-redispatch on) or moves to
    /// provider_rejected (off).
    pub async fn reject_request(
        &self,
        request_id: Uuid,
        dto: RejectRequestDto,
    ) -> Result<RejectOutcome, ServiceError> {
        dto.validate()?;

        let outcome = self
            .db_client
            .reject_booking_request(request_id, dto.provider_id, dto.note, !self.auto_redispatch)
            .await?;

        if outcome.exhausted {
            if self.auto_redispatch {
                self.notification_service
                    .notify_redispatch_needed(&outcome.booking)
                    .await?;
            } else {
                self.notification_service
                    .notify_all_offers_declined(&outcome.booking)
                    .await?;
            }
        }

        tracing::info!(
            "Provider {} rejected request {} for booking {}",
            dto.provider_id,
            request_id,
            outcome.booking.id
        );
        Ok(outcome)
    }

    pub async fn get_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<BookingRequest>, ServiceError> {
        self.db_client.get_booking_request(request_id).await
    }

    pub async fn get_requests_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<BookingRequest>, ServiceError> {
        self.db_client.get_requests_for_booking(booking_id).await
    }
}
