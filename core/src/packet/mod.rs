//! Packet creation and redemption

pub mod lifecycle;
pub mod policy;
pub mod session;

pub use lifecycle::{
    CreateRequest, CreatedPacket, FundingStatus, LifecycleConfig, PacketLifecycle, RedeemOptions,
};
pub use policy::{CalendarEvent, ReleasePolicy, TimeRemaining};
pub use session::{RedemptionEvent, RedemptionSession, RedemptionState, SweepReceipt};
