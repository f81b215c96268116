pub mod db;
pub mod bookingdb;
pub mod commissiondb;
pub mod walletdb;
pub mod withdrawaldb;
