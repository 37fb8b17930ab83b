//! Create and redeem a packet entirely in-process: a local keyper committee,
//! an in-memory ledger and a hand-driven clock.
//!
//! cargo run -p hongbao-core --example local_packet

use std::sync::Arc;

use hongbao_core::{
    CreateRequest, Ledger, LifecycleConfig, LocalRegistry, ManualClock, MemoryLedger,
    PacketLifecycle, RedeemError, RedeemOptions, ReleasePolicy,
};
use hongbao_keypair::Keypair;
use hongbao_link::PacketLink;
use hongbao_threshold::KeyperConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let clock = ManualClock::new(chrono::Utc::now().timestamp() as u64);
    let registry = Arc::new(LocalRegistry::generate(
        KeyperConfig::new(2, 3),
        Arc::new(clock.clone()),
    )?);
    let ledger = Arc::new(MemoryLedger::default());
    let lifecycle = PacketLifecycle::new(
        registry,
        ledger.clone(),
        Arc::new(clock.clone()),
        LifecycleConfig::default(),
    );

    let sender = Keypair::generate();
    ledger.credit(&sender.address(), 1_000_000_000).await;

    // 1. Create
    let packet = lifecycle
        .create(
            &sender,
            CreateRequest {
                amount: "0.01".parse()?,
                policy: ReleasePolicy::After(60),
                password: Some("abc123".into()),
            },
        )
        .await?;
    println!("Link: {}", packet.url);
    println!("Funding: {:?}", packet.funding);

    // 2. Too early
    let link = PacketLink::decode(&packet.url).ok_or_else(|| anyhow::anyhow!("bad link"))?;
    let recipient = Keypair::generate().address();
    let options = RedeemOptions {
        password: Some("abc123".into()),
        destination: recipient,
    };
    clock.advance(30);
    match lifecycle.redeem(&link, options.clone()).await {
        Err(RedeemError::Locked { remaining }) => println!("Locked for another {remaining}s"),
        other => println!("Unexpected: {other:?}"),
    }

    // 3. After release
    clock.advance(31);
    let receipt = lifecycle.redeem(&link, options.clone()).await?;
    println!(
        "Swept {} lamports to {} (fee {})",
        receipt.amount, receipt.destination, receipt.fee
    );
    println!("Recipient balance: {}", ledger.balance(&recipient).await?);

    // 4. Again
    match lifecycle.redeem(&link, options).await {
        Err(e) => println!("Second redeem: {e}"),
        Ok(_) => println!("Second redeem unexpectedly succeeded"),
    }

    Ok(())
}
