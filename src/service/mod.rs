pub mod background_jobs;
pub mod booking_service;
pub mod commission_service;
pub mod dispatch_service;
pub mod error;
pub mod notification_service;
pub mod payment_gateway;
pub mod wallet_service;
pub mod withdrawal_service;
