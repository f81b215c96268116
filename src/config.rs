// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    // Payment gateway configuration
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    // Cancellation refund windows
    pub refund_full_window_hours: i64,
    pub refund_partial_window_hours: i64,
    // Lifecycle sweeper
    pub request_expiry_hours: i64,
    pub reminder_lookahead_minutes: i64,
    pub overdue_grace_minutes: i64,
    pub sweep_interval_secs: u64,
    // Dispatch policy
    pub auto_redispatch_on_rejection: bool,
    // Withdrawals
    pub withdrawal_fee_bps: i64,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        // Payment gateway configurations (with defaults)
        let gateway_base_url = std::env::var("PAYMENT_GATEWAY_URL")
            .unwrap_or_else(|_| "http://localhost:9090".to_string());
        let gateway_secret_key = std::env::var("PAYMENT_GATEWAY_SECRET_KEY")
            .unwrap_or_else(|_| "test_secret_key".to_string());

        // Lifecycle timings (with defaults)
        let refund_full_window_hours = std::env::var("REFUND_FULL_WINDOW_HOURS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(24);
        let refund_partial_window_hours = std::env::var("REFUND_PARTIAL_WINDOW_HOURS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(2);
        let request_expiry_hours = std::env::var("REQUEST_EXPIRY_HOURS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(24);
        let reminder_lookahead_minutes = std::env::var("REMINDER_LOOKAHEAD_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(60);
        let overdue_grace_minutes = std::env::var("OVERDUE_GRACE_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(120);
        let sweep_interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(300);

        let auto_redispatch_on_rejection = std::env::var("AUTO_REDISPATCH_ON_REJECTION")
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);

        let withdrawal_fee_bps = std::env::var("WITHDRAWAL_FEE_BPS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);

        Config {
            database_url,
            gateway_base_url,
            gateway_secret_key,
            refund_full_window_hours,
            refund_partial_window_hours,
            request_expiry_hours,
            reminder_lookahead_minutes,
            overdue_grace_minutes,
            sweep_interval_secs,
            auto_redispatch_on_rejection,
            withdrawal_fee_bps,
        }
    }
}
