//! LNbits wallet backend.

pub mod wallet;

pub use wallet::{LnbitsWallet, WalletKeys};
