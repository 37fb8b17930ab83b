//! Hongbao Core
//!
//! The packet lifecycle and its collaborators.
//!
//! ```text
//!  create:  policy ─▶ register identity ─▶ eon key ─▶ encrypt key ─▶ [password] ─▶ link ─▶ fund
//!
//!  redeem:  Locked ─▶ PasswordPending? ─▶ ThresholdDecrypting ─▶ KeyValidated
//!                  ─▶ BalanceChecked ─▶ Sweeping ─▶ Swept          (Failed from anywhere)
//! ```

pub mod clock;
pub mod error;
pub mod ledger;
pub mod packet;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CreateError, RedeemError};
pub use ledger::{FeeQuote, Ledger, LedgerError, MemoryLedger, SolanaLedger};
pub use packet::{
    CalendarEvent, CreateRequest, CreatedPacket, FundingStatus, LifecycleConfig,
    PacketLifecycle, RedeemOptions, RedemptionEvent, RedemptionSession, RedemptionState,
    ReleasePolicy, SweepReceipt, TimeRemaining,
};
pub use registry::{
    EncryptionParams, IdentityPrefix, KeyRegistry, LocalRegistry, RegistryError,
    ShutterRegistryClient,
};
