//! Solana ledger
//!
//! Native SOL balances and system-program transfers over JSON-RPC.

use std::time::Duration;

use async_trait::async_trait;
use hongbao_keypair::{Address, Signer};
use log::{debug, info};
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash,
    message::{AccountMeta, Instruction, Message},
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};

use super::{FeeQuote, Ledger, LedgerError};

/// `11111111111111111111111111111111`
const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// System program instruction index for `Transfer`
const SYSTEM_TRANSFER: u32 = 2;

pub struct SolanaLedger {
    rpc: RpcClient,
}

fn pubkey(address: &Address) -> Pubkey {
    Pubkey::new_from_array(address.to_bytes())
}

fn rpc_error(e: ClientError) -> LedgerError {
    match e.get_transaction_error() {
        Some(tx_err) => LedgerError::Rejected(tx_err.to_string()),
        None => LedgerError::Rpc(e.to_string()),
    }
}

fn parse_commitment(commitment: &str) -> Result<CommitmentConfig, LedgerError> {
    match commitment {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(LedgerError::Rpc(format!("unknown commitment level {other:?}"))),
    }
}

/// System program transfer; data is `u32 LE index || u64 LE lamports`
fn transfer_instruction(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

fn transfer_message(from: &Pubkey, to: &Pubkey, lamports: u64, blockhash: &Hash) -> Message {
    let ix = transfer_instruction(from, to, lamports);
    Message::new_with_blockhash(&[ix], Some(from), blockhash)
}

impl SolanaLedger {
    pub fn new(rpc_url: &str, timeout: Duration, commitment: &str) -> Result<Self, LedgerError> {
        let commitment = parse_commitment(commitment)?;
        info!("Solana ledger at {} ({:?})", rpc_url, commitment.commitment);
        Ok(Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                rpc_url.to_string(),
                timeout,
                commitment,
            ),
        })
    }
}

#[async_trait]
impl Ledger for SolanaLedger {
    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.rpc.get_balance(&pubkey(address)).await.map_err(rpc_error)
    }

    async fn fee_quote(&self, payer: &Address) -> Result<FeeQuote, LedgerError> {
        let payer = pubkey(payer);
        let blockhash = self.rpc.get_latest_blockhash().await.map_err(rpc_error)?;
        // fee depends on the message shape, not the amount
        let message = transfer_message(&payer, &payer, 0, &blockhash);
        let fee = self
            .rpc
            .get_fee_for_message(&message)
            .await
            .map_err(rpc_error)?;
        Ok(FeeQuote::flat(fee))
    }

    async fn transfer(
        &self,
        from: &dyn Signer,
        to: &Address,
        lamports: u64,
    ) -> Result<String, LedgerError> {
        let payer = pubkey(&from.address());
        let blockhash = self.rpc.get_latest_blockhash().await.map_err(rpc_error)?;
        let message = transfer_message(&payer, &pubkey(to), lamports, &blockhash);

        let signature = Signature::from(from.sign(&message.serialize()));
        let tx = Transaction {
            signatures: vec![signature],
            message,
        };

        debug!("Sending transfer of {} lamports from {}", lamports, payer);
        let sig = self
            .rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(rpc_error)?;
        Ok(sig.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_instruction_layout() {
        let from = Pubkey::new_from_array([1; 32]);
        let to = Pubkey::new_from_array([2; 32]);
        let ix = transfer_instruction(&from, &to, 1_000_000);

        assert_eq!(ix.program_id.to_string(), "11111111111111111111111111111111");
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_000_000u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    #[test]
    fn test_payer_is_first_account() {
        let from = Pubkey::new_from_array([1; 32]);
        let to = Pubkey::new_from_array([2; 32]);
        let message = transfer_message(&from, &to, 5, &Hash::default());
        assert_eq!(message.account_keys[0], from);
        assert_eq!(message.header.num_required_signatures, 1);
    }

    #[test]
    fn test_commitment_levels() {
        assert!(parse_commitment("confirmed").is_ok());
        assert!(parse_commitment("finalized").is_ok());
        assert!(parse_commitment("eventually").is_err());
    }
}
