pub mod bookingdtos;
pub mod walletdtos;
