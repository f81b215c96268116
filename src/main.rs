mod config;
mod db;
mod dtos;
mod models;
mod service;
mod utils;

use std::sync::Arc;

use config::Config;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::LevelFilter;

use crate::db::db::DBClient;

use service::{
    booking_service::BookingService,
    commission_service::CommissionService,
    dispatch_service::DispatchService,
    notification_service::NotificationService,
    payment_gateway::{HttpPaymentGateway, PaymentGateway},
    wallet_service::WalletService,
    withdrawal_service::WithdrawalService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub booking_service: Arc<BookingService>,
    pub dispatch_service: Arc<DispatchService>,
    pub wallet_service: Arc<WalletService>,
    pub withdrawal_service: Arc<WithdrawalService>,
    pub commission_service: Arc<CommissionService>,
    pub notification_service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);

        let notification_service = Arc::new(NotificationService::new(db_client_arc.clone()));
        let wallet_service = Arc::new(WalletService::new(db_client_arc.clone()));
        let commission_service = Arc::new(CommissionService::new(db_client_arc.clone()));

        let payment_gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_secret_key.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            db_client_arc.clone(),
            wallet_service.clone(),
            commission_service.clone(),
            notification_service.clone(),
            payment_gateway,
            config.refund_full_window_hours,
            config.refund_partial_window_hours,
        ));

        let dispatch_service = Arc::new(DispatchService::new(
            db_client_arc.clone(),
            booking_service.clone(),
            notification_service.clone(),
            config.auto_redispatch_on_rejection,
        ));

        let withdrawal_service = Arc::new(WithdrawalService::new(
            db_client_arc.clone(),
            wallet_service.clone(),
            notification_service.clone(),
            config.withdrawal_fee_bps,
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            booking_service,
            dispatch_service,
            wallet_service,
            withdrawal_service,
            commission_service,
            notification_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    // Connect to PostgreSQL
    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            println!("✅ Connection to the database is successful!");

            let max_connections = 20;

            // Background task to monitor pool health
            let pool_for_monitoring = pool.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    let size = pool_for_monitoring.size();
                    let idle = pool_for_monitoring.num_idle();
                    tracing::debug!(
                        "Pool status - active: {}, idle: {}, total: {}",
                        size - idle as u32,
                        idle,
                        size
                    );

                    if size >= max_connections * 8 / 10 {
                        tracing::warn!(
                            "Connection pool at 80% capacity! Consider increasing max_connections"
                        );
                    }
                }
            });

            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);
    let app_state = Arc::new(AppState::new(db_client, config));

    // The lifecycle sweeper is this process's long-running loop
    service::background_jobs::start_lifecycle_sweeper(app_state).await;
}
