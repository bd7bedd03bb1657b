//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                 ┌────────────────────────────┐
//!   funding ───▶  │  Application (Bookie)      │ ───▶ LedgerStore
//!   operator ──▶  │  accumulator / settlement  │ ───▶ PayoutQueue
//!                 │  dispatcher / sweeper      │ ───▶ PaymentGateway ─▶ WalletBackend
//!                 └────────────────────────────┘
//! ```

pub mod inbound;
pub mod outbound;

pub use inbound::funding::PaidInvoice;
pub use outbound::gateway::{PaymentGateway, PaymentReceipt};
pub use outbound::queue::{PayoutQueue, QueuedPayout};
pub use outbound::store::LedgerStore;
pub use outbound::wallet::{DecodedInvoice, WalletBackend};
