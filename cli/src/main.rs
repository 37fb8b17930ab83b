mod packet;
mod registry;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::{env, fs, fs::OpenOptions};

use anyhow::{Context, Result, anyhow};
use hongbao_config::HongbaoConfig;
use hongbao_keypair::Keypair;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "create" => {
            let parsed = match packet::parse_create_args(&args[2..]) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    println!("Usage: create <amount> [--in DURATION|--at TIMESTAMP|--event NAME] [--password PW] [--keypair FILE]");
                    std::process::exit(1);
                }
            };
            if let Err(e) = packet::run_create(parsed, HongbaoConfig::global()).await {
                eprintln!("❌ Error creating packet: {:#}", e);
                std::process::exit(1);
            }
        }
        "redeem" => {
            let parsed = match packet::parse_redeem_args(&args[2..]) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    println!("Usage: redeem <link> [--password PW] [--to ADDRESS|--passkey CREDENTIAL_ID_HEX|--keypair FILE]");
                    std::process::exit(1);
                }
            };
            if let Err(e) = packet::run_redeem(parsed, HongbaoConfig::global()).await {
                eprintln!("❌ Error redeeming packet: {:#}", e);
                std::process::exit(1);
            }
        }
        "inspect" => {
            let Some(link) = args.get(2) else {
                println!("Usage: inspect <link>");
                return;
            };
            if let Err(e) = packet::run_inspect(link) {
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
        "balance" => {
            let Some(address) = args.get(2) else {
                println!("Usage: balance <address>");
                return;
            };
            if let Err(e) = packet::run_balance(address, HongbaoConfig::global()).await {
                eprintln!("❌ Error fetching balance: {:#}", e);
                std::process::exit(1);
            }
        }
        "genkey" => {
            let filename = args.get(2).cloned();
            if let Err(e) = genkey(filename) {
                eprintln!("❌ Error generating key: {:#}", e);
                std::process::exit(1);
            }
        }
        "registry" => {
            let bind = registry::parse_bind(&args[2..]);
            if let Err(e) = registry::run_registry(bind, HongbaoConfig::global()).await {
                eprintln!("❌ Error running registry: {:#}", e);
                std::process::exit(1);
            }
        }
        "config" => {
            show_config();
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Hongbao CLI - Time-Locked Gift Packets");
    println!();
    println!("USAGE:");
    println!("  hongbao <command> [args]");
    println!();
    println!("PACKET COMMANDS:");
    println!("  create <amount> [options]  Lock <amount> SOL in a new packet");
    println!("  redeem <link> [options]    Open a packet and sweep it to your wallet");
    println!("  inspect <link>             Show what a link carries and when it opens");
    println!();
    println!("ACCOUNT COMMANDS:");
    println!("  genkey [filename]          Generate a new keypair");
    println!("  balance <address>          Show an account's SOL balance");
    println!();
    println!("OTHER COMMANDS:");
    println!("  registry [--bind ADDR]     Run a local key-release registry");
    println!("  config                     Print the effective configuration");
    println!("  help                       Show this help message");
    println!();
    println!("CREATE OPTIONS:");
    println!("  --in <duration>            Opens after 60s, 5m, 2h, 1d ... (default: 1d)");
    println!("  --at <time>                Opens at a unix timestamp or RFC 3339 time");
    println!("  --event <name>             Opens at lunar-new-year or new-year");
    println!("  --password <pw>            Also require a password");
    println!("  --keypair <file>           Funding keypair (default: from config)");
    println!();
    println!("REDEEM OPTIONS:");
    println!("  --password <pw>            Password for protected packets");
    println!("  --to <address>             Destination address");
    println!("  --passkey <hex>            Derive the destination from a credential id");
    println!("  --keypair <file>           Destination is this keypair's address");
    println!();
    println!("EXAMPLES:");
    println!("  hongbao registry                               # Local registry on 127.0.0.1:8787");
    println!("  hongbao create 0.01 --in 60s                   # Opens in a minute");
    println!("  hongbao create 8.88 --event lunar-new-year --password abc123");
    println!("  hongbao inspect 'http://localhost:3000/#redeem?...'");
    println!("  hongbao redeem '#redeem?...' --to <address>");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  HB_CONFIG            Config file path");
    println!("  HB_REGISTRY_URL      Key-release registry endpoint");
    println!("  SOLANA_RPC_URL       Solana RPC endpoint");
    println!("  HB_KEYPAIR           Default keypair file");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

fn show_config() {
    match HongbaoConfig::default_config_path() {
        Some(path) => println!("# Default config path: {}", path.display()),
        None => println!("# No home directory; use HB_CONFIG or ./hongbao.toml"),
    }
    println!();
    match HongbaoConfig::global().to_toml() {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("❌ {:#}", e),
    }
}

fn home_dir() -> Result<PathBuf> {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| anyhow!("Could not determine home directory"))
}

/// `~/...` relative to the home directory
pub(crate) fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

fn keys_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".config").join("solana").join("hongbao"))
}

/// Keypair file from config, else `~/.config/solana/hongbao/id.json`
pub(crate) fn default_keypair_path(config: &HongbaoConfig) -> Result<PathBuf> {
    match &config.ledger.keypair_path {
        Some(path) => expand_home(path),
        None => Ok(keys_dir()?.join("id.json")),
    }
}

pub(crate) fn load_keypair(path: &Path) -> Result<Keypair> {
    println!("🔑 Loading keypair from {}...", path.display());
    Keypair::read_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn genkey(filename: Option<String>) -> Result<()> {
    let config_dir = keys_dir()?;

    // Use provided filename or default to "id.json"
    let key_filename = filename.unwrap_or_else(|| "id.json".to_string());
    let key_path = config_dir.join(&key_filename);

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
        println!("📁 Created directory: {}", config_dir.display());

        #[cfg(unix)]
        {
            // rwx------
            let mut perms = fs::metadata(&config_dir)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&config_dir, perms)?;
        }
    }

    if key_path.exists() {
        return Err(anyhow!(
            "File {} already exists. Remove it first or use a different filename.",
            key_path.display()
        ));
    }

    println!("🔐 Generating new keypair...");
    let key = Keypair::generate();

    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&key_path)?;

    #[cfg(unix)]
    {
        // rw-------
        let mut perms = f.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&key_path, perms)?;
    }

    f.write_all(key.to_json()?.as_bytes())?;

    println!("✅ Wrote new keypair to {}", key_path.display());
    println!("🔑 Address: {}", key.address());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        assert_eq!(
            expand_home("/tmp/id.json").unwrap(),
            PathBuf::from("/tmp/id.json")
        );
        if let Ok(home) = home_dir() {
            assert_eq!(expand_home("~/k.json").unwrap(), home.join("k.json"));
        }
    }

    #[test]
    fn test_load_keypair_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        let key = Keypair::generate();
        key.write_file(&path).unwrap();
        assert_eq!(load_keypair(&path).unwrap().address(), key.address());
    }
}
