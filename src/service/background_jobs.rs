// service/background_jobs.rs
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{interval, Duration};

use crate::db::bookingdb::BookingExt;
use crate::service::error::ServiceError;
use crate::AppState;

/// Upper bound on stale requests handled per sweep pass.
const EXPIRY_BATCH_SIZE: i64 = 100;

#[derive(Debug, Default)]
pub struct SweepCounters {
    pub requests_expired: u64,
    pub bookings_expired: u64,
    pub reminders_sent: u64,
    pub overdue_flagged: u64,
    pub skipped: u64,
}

/// Periodic lifecycle sweep: expires stale offers, reminds upcoming
/// bookings, flags overdue ones. Every scan-and-act unit is retryable; a
/// failure on one booking never aborts the rest of the pass.
pub async fn start_lifecycle_sweeper(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(app_state.env.sweep_interval_secs));

    tracing::info!(
        "Lifecycle sweeper started: interval {}s, request expiry {}h",
        app_state.env.sweep_interval_secs,
        app_state.env.request_expiry_hours
    );

    loop {
        interval.tick().await;

        tracing::info!("Running lifecycle sweep at {}", Utc::now());

        let counters = run_sweep(&app_state).await;

        tracing::info!(
            "Lifecycle sweep completed: {} requests expired, {} bookings expired, {} reminders, {} overdue, {} skipped",
            counters.requests_expired,
            counters.bookings_expired,
            counters.reminders_sent,
            counters.overdue_flagged,
            counters.skipped
        );
    }
}

pub async fn run_sweep(app_state: &AppState) -> SweepCounters {
    let mut counters = SweepCounters::default();

    if let Err(e) = expire_stale_requests(app_state, &mut counters).await {
        tracing::error!("Request expiry scan failed: {}", e);
    }
    if let Err(e) = send_schedule_reminders(app_state, &mut counters).await {
        tracing::error!("Reminder scan failed: {}", e);
    }
    if let Err(e) = flag_overdue_bookings(app_state, &mut counters).await {
        tracing::error!("Overdue scan failed: {}", e);
    }

    counters
}

/// Expires booking requests pending past the configured timeout. Expiry is
/// compare-and-swap, so a request accepted after the scan is left alone.
async fn expire_stale_requests(
    app_state: &AppState,
    counters: &mut SweepCounters,
) -> Result<(), ServiceError> {
    let cutoff = Utc::now() - ChronoDuration::hours(app_state.env.request_expiry_hours);
    let stale = app_state
        .db_client
        .get_stale_pending_requests(cutoff, EXPIRY_BATCH_SIZE)
        .await?;

    for request in stale {
        match app_state.db_client.expire_stale_request(request.id).await {
            Ok(Some(outcome)) => {
                counters.requests_expired += 1;
                let _ = app_state
                    .notification_service
                    .notify_offer_closed(outcome.request.provider_id, &outcome.booking)
                    .await;

                if outcome.booking_expired {
                    counters.bookings_expired += 1;
                    let _ = app_state
                        .notification_service
                        .notify_booking_expired(&outcome.booking)
                        .await;
                }
            }
            // Accepted or closed between the scan and the swap
            Ok(None) => counters.skipped += 1,
            Err(e) => tracing::error!("Failed to expire request {}: {}", request.id, e),
        }
    }

    Ok(())
}

/// Reminds both parties of confirmed bookings scheduled inside the lookahead
/// window. The notification store suppresses repeats per recipient.
async fn send_schedule_reminders(
    app_state: &AppState,
    counters: &mut SweepCounters,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let lookahead_end = now + ChronoDuration::minutes(app_state.env.reminder_lookahead_minutes);
    let upcoming = app_state
        .db_client
        .get_confirmed_bookings_in_window(now, lookahead_end)
        .await?;

    for booking in upcoming {
        match app_state
            .notification_service
            .notify_booking_reminder(&booking)
            .await
        {
            Ok(true) => counters.reminders_sent += 1,
            Ok(false) => {}
            Err(e) => tracing::error!("Failed to remind booking {}: {}", booking.id, e),
        }
    }

    Ok(())
}

/// Flags confirmed bookings whose start has passed the grace period without
/// the job moving. Notification only, no status mutation.
async fn flag_overdue_bookings(
    app_state: &AppState,
    counters: &mut SweepCounters,
) -> Result<(), ServiceError> {
    let cutoff = Utc::now() - ChronoDuration::minutes(app_state.env.overdue_grace_minutes);
    let overdue = app_state
        .db_client
        .get_overdue_confirmed_bookings(cutoff)
        .await?;

    for booking in overdue {
        match app_state
            .notification_service
            .notify_booking_overdue(&booking)
            .await
        {
            Ok(true) => counters.overdue_flagged += 1,
            Ok(false) => {}
            Err(e) => tracing::error!("Failed to flag overdue booking {}: {}", booking.id, e),
        }
    }

    Ok(())
}
