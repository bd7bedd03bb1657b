//! LNURL-pay payment gateway.

pub mod gateway;

pub use gateway::{LnurlGateway, LnurlSettings};
