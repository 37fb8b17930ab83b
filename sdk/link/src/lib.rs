//! Shareable packet links.
//!
//! A link is the only durable artifact of a packet: a URL fragment
//! `#redeem?key=..&timestamp=..&amount=..&protected=..&identity=..` carrying
//! everything but the private key.

pub mod amount;
pub mod error;
pub mod link;
pub mod payload;

pub use amount::{Amount, DECIMALS, LAMPORTS_PER_SOL};
pub use error::LinkError;
pub use link::{PacketLink, REDEEM_ROUTE};
pub use payload::KeyPayload;
