//! create / redeem / inspect / balance

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use hongbao_config::HongbaoConfig;
use hongbao_core::registry::RegistryClientConfig;
use hongbao_core::{
    Clock, CreateRequest, FundingStatus, Ledger, LifecycleConfig, PacketLifecycle,
    RedeemOptions, ReleasePolicy, ShutterRegistryClient, SolanaLedger, SystemClock,
    TimeRemaining,
};
use hongbao_keypair::{Address, Keypair};
use hongbao_link::{Amount, PacketLink};

use crate::{default_keypair_path, expand_home, load_keypair};

const DEFAULT_RELEASE: ReleasePolicy = ReleasePolicy::After(86_400);

#[derive(Debug, Clone)]
pub struct CreateArgs {
    pub amount: Amount,
    pub policy: ReleasePolicy,
    pub password: Option<String>,
    pub keypair: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Address(Address),
    Passkey(Vec<u8>),
    Keypair(PathBuf),
    /// Address of the configured keypair
    Default,
}

#[derive(Debug, Clone)]
pub struct RedeemArgs {
    pub link: String,
    pub password: Option<String>,
    pub destination: Destination,
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

pub fn parse_create_args(args: &[String]) -> Result<CreateArgs> {
    let amount_str = args.first().ok_or_else(|| anyhow!("missing <amount>"))?;
    let amount: Amount = amount_str.parse().map_err(|e| anyhow!("{}", e))?;

    let mut policy = None;
    let mut password = None;
    let mut keypair = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--in" => {
                let v = value(args, i, "--in")?;
                policy = Some(v.parse::<ReleasePolicy>()?);
                i += 1;
            }
            "--at" => {
                let v = value(args, i, "--at")?;
                // bare digits are a timestamp here, not a delay
                let policy_str = if v.bytes().all(|b| b.is_ascii_digit()) {
                    format!("@{v}")
                } else {
                    v.to_string()
                };
                policy = Some(policy_str.parse::<ReleasePolicy>()?);
                i += 1;
            }
            "--event" => {
                let v = value(args, i, "--event")?;
                match v.parse::<ReleasePolicy>()? {
                    p @ ReleasePolicy::Event(_) => policy = Some(p),
                    _ => bail!("unknown event {:?} (lunar-new-year, new-year)", v),
                }
                i += 1;
            }
            "--password" => {
                password = Some(value(args, i, "--password")?.to_string());
                i += 1;
            }
            "--keypair" => {
                keypair = Some(expand_home(value(args, i, "--keypair")?)?);
                i += 1;
            }
            other => bail!("unexpected argument {:?}", other),
        }
        i += 1;
    }

    Ok(CreateArgs {
        amount,
        policy: policy.unwrap_or(DEFAULT_RELEASE),
        password,
        keypair,
    })
}

pub fn parse_redeem_args(args: &[String]) -> Result<RedeemArgs> {
    let link = args.first().ok_or_else(|| anyhow!("missing <link>"))?.clone();

    let mut password = None;
    let mut destination = Destination::Default;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--password" => {
                password = Some(value(args, i, "--password")?.to_string());
                i += 1;
            }
            "--to" => {
                let v = value(args, i, "--to")?;
                destination = Destination::Address(v.parse()?);
                i += 1;
            }
            "--passkey" => {
                let v = value(args, i, "--passkey")?;
                let raw = hex::decode(v.strip_prefix("0x").unwrap_or(v))
                    .context("--passkey expects a hex credential id")?;
                destination = Destination::Passkey(raw);
                i += 1;
            }
            "--keypair" => {
                destination = Destination::Keypair(expand_home(value(args, i, "--keypair")?)?);
                i += 1;
            }
            other => bail!("unexpected argument {:?}", other),
        }
        i += 1;
    }

    Ok(RedeemArgs {
        link,
        password,
        destination,
    })
}

fn format_time(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn solana_ledger(config: &HongbaoConfig) -> Result<SolanaLedger> {
    SolanaLedger::new(
        &config.ledger.rpc_url,
        config.ledger.timeout(),
        &config.ledger.commitment,
    )
    .map_err(|e| anyhow!("{}", e))
}

fn lifecycle(config: &HongbaoConfig) -> Result<PacketLifecycle> {
    let registry = ShutterRegistryClient::new(RegistryClientConfig {
        url: config.registry.url.clone(),
        legacy_url: config.registry.legacy_url.clone(),
        timeout: config.registry.timeout(),
    })
    .map_err(|e| anyhow!("{}", e))?;

    Ok(PacketLifecycle::new(
        Arc::new(registry),
        Arc::new(solana_ledger(config)?),
        Arc::new(SystemClock),
        LifecycleConfig {
            call_timeout: config.lifecycle.call_timeout(),
            link_base_url: config.link.base_url.clone(),
        },
    ))
}

pub async fn run_create(args: CreateArgs, config: &HongbaoConfig) -> Result<()> {
    let keypair_path = match args.keypair {
        Some(path) => path,
        None => default_keypair_path(config)?,
    };
    let sender = load_keypair(&keypair_path)?;
    let lifecycle = lifecycle(config)?;

    println!("🧧 Creating packet of {} SOL...", args.amount);
    let packet = lifecycle
        .create(
            &sender,
            CreateRequest {
                amount: args.amount,
                policy: args.policy,
                password: args.password,
            },
        )
        .await?;

    println!("✅ Packet created");
    println!("  Account:  {}", packet.address);
    println!("  Opens at: {}", format_time(packet.release_timestamp));
    println!(
        "  Password: {}",
        if packet.link.protected { "yes" } else { "no" }
    );
    println!();
    println!("🔗 {}", packet.url);
    println!();

    match packet.funding {
        FundingStatus::Funded { signature } => println!("💸 Funded: {}", signature),
        FundingStatus::Failed { reason } => {
            println!("⚠️  Funding failed: {}", reason);
            println!(
                "   The link is still valid. Send {} SOL to {} to fund it.",
                args.amount, packet.address
            );
        }
    }
    Ok(())
}

pub async fn run_redeem(args: RedeemArgs, config: &HongbaoConfig) -> Result<()> {
    let link = PacketLink::decode(&args.link).ok_or_else(|| anyhow!("not a packet link"))?;

    let destination = match args.destination {
        Destination::Address(address) => address,
        Destination::Passkey(raw) => {
            let wallet = Keypair::from_credential_id(&raw)?;
            println!("🔐 Passkey wallet: {}", wallet.address());
            wallet.address()
        }
        Destination::Keypair(path) => load_keypair(&path)?.address(),
        Destination::Default => load_keypair(&default_keypair_path(config)?)?.address(),
    };

    let lifecycle = lifecycle(config)?;
    let remaining = lifecycle.time_remaining(&link);
    if !remaining.is_released() {
        println!("⏳ Locked for another {}", remaining);
    }

    println!("🧧 Redeeming {} SOL to {}...", link.amount, destination);
    let receipt = lifecycle
        .redeem(
            &link,
            RedeemOptions {
                password: args.password,
                destination,
            },
        )
        .await?;

    println!(
        "✅ Swept {} SOL (fee {} lamports)",
        Amount::from_lamports(receipt.amount),
        receipt.fee
    );
    println!("  Signature: {}", receipt.signature);
    Ok(())
}

pub fn run_inspect(input: &str) -> Result<()> {
    let link = PacketLink::decode(input).ok_or_else(|| anyhow!("not a packet link"))?;
    let payload = link.payload().map_err(|e| anyhow!("broken link: {}", e))?;
    let remaining = TimeRemaining::until(link.timestamp, SystemClock.now());

    println!("🧧 Packet");
    println!("  Amount:    {} SOL", link.amount);
    println!("  Opens at:  {}", format_time(link.timestamp));
    println!("  Key:       {}", payload.kind());
    println!(
        "  Password:  {}",
        if link.protected { "yes" } else { "no" }
    );
    match &link.identity {
        Some(identity) => println!("  Identity:  {}", identity),
        None => println!("  Identity:  none (legacy time-lock)"),
    }
    if remaining.is_released() {
        println!("🔓 Ready to redeem");
    } else {
        println!("⏳ Opens in {}", remaining);
    }
    Ok(())
}

pub async fn run_balance(address: &str, config: &HongbaoConfig) -> Result<()> {
    let address: Address = address.parse()?;
    let lamports = solana_ledger(config)?
        .balance(&address)
        .await
        .map_err(|e| anyhow!("{}", e))?;
    println!("{}: {} SOL", address, Amount::from_lamports(lamports));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hongbao_core::CalendarEvent;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_create_defaults() {
        let parsed = parse_create_args(&args("0.01")).unwrap();
        assert_eq!(parsed.amount.lamports(), 10_000_000);
        assert_eq!(parsed.policy, DEFAULT_RELEASE);
        assert!(parsed.password.is_none());
    }

    #[test]
    fn test_create_flags() {
        let parsed =
            parse_create_args(&args("8.88 --event lunar-new-year --password abc123")).unwrap();
        assert_eq!(
            parsed.policy,
            ReleasePolicy::Event(CalendarEvent::LunarNewYear)
        );
        assert_eq!(parsed.password.as_deref(), Some("abc123"));

        let parsed = parse_create_args(&args("1 --at 1767225600")).unwrap();
        assert_eq!(parsed.policy, ReleasePolicy::At(1_767_225_600));

        let parsed = parse_create_args(&args("1 --in 5m")).unwrap();
        assert_eq!(parsed.policy, ReleasePolicy::After(300));
    }

    #[test]
    fn test_create_rejects_junk() {
        assert!(parse_create_args(&args("")).is_err());
        assert!(parse_create_args(&args("abc")).is_err());
        assert!(parse_create_args(&args("1 --in")).is_err());
        assert!(parse_create_args(&args("1 --event 5m")).is_err());
        assert!(parse_create_args(&args("1 --bogus")).is_err());
    }

    #[test]
    fn test_redeem_destinations() {
        let addr = Keypair::generate().address();
        let parsed = parse_redeem_args(&args(&format!("#redeem?x --to {addr}"))).unwrap();
        assert_eq!(parsed.destination, Destination::Address(addr));

        let parsed = parse_redeem_args(&args("#redeem?x --passkey 0xc0ffee")).unwrap();
        assert_eq!(parsed.destination, Destination::Passkey(vec![0xc0, 0xff, 0xee]));

        let parsed = parse_redeem_args(&args("#redeem?x --password pw")).unwrap();
        assert_eq!(parsed.destination, Destination::Default);
        assert_eq!(parsed.password.as_deref(), Some("pw"));

        assert!(parse_redeem_args(&args("#redeem?x --to nope")).is_err());
    }
}
