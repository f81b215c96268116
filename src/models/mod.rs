pub mod bookingmodel;
pub mod walletmodels;
