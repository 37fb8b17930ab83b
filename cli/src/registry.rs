//! Local key-release registry for development

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use hongbao_config::HongbaoConfig;
use hongbao_core::{LocalRegistry, SystemClock, registry::serve};
use hongbao_threshold::KeyperConfig;
use tokio::net::TcpListener;

/// `--bind ADDR`, if given
pub fn parse_bind(args: &[String]) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--bind" {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub async fn run_registry(bind: Option<String>, config: &HongbaoConfig) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.dev_registry.bind.clone());
    let keypers = KeyperConfig::new(config.dev_registry.threshold, config.dev_registry.keypers);

    let registry = LocalRegistry::generate(keypers, Arc::new(SystemClock))
        .map_err(|e| anyhow!("Invalid keyper committee: {}", e))?;

    println!("🔑 Dealt a {}-of-{} keyper committee", keypers.threshold, keypers.total_keypers);
    println!("   Eon key: {}", registry.eon_key());

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    println!("🚀 Registry listening on http://{}", listener.local_addr()?);
    println!("   Point HB_REGISTRY_URL here to create packets against it.");

    serve(listener, Arc::new(registry)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        let args: Vec<String> = ["--bind", "0.0.0.0:9000"].map(String::from).to_vec();
        assert_eq!(parse_bind(&args).as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(parse_bind(&[]), None);
    }
}
