//! `wallet-provider connect` command: interactive JSON-RPC session.
//!
//! Each stdin line is sent as one JSON-RPC message; every inbound message is
//! printed on its own stdout line. The session ends on SIGINT/SIGTERM, or
//! `linger` milliseconds after stdin closes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use wallet_provider::chain::{Chain, ChainId};

use crate::signal::SigDown;

/// Execute the `connect` command.
///
/// # Errors
///
/// Returns an error if the provider cannot be built, `chain_id` is unknown,
/// signal handlers cannot be installed, or stdin fails.
#[allow(clippy::print_stdout)]
pub async fn run(
    config_path: &Path,
    chain_id: &ChainId,
    linger: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (provider, _guard) = super::load_provider(config_path).await?;
    let chain = super::find_chain(&provider, chain_id).await?;
    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();

    let connection = chain.connect(Arc::new(|message: String| println!("{message}")));
    tracing::info!(chain = %chain.info().name, %chain_id, "session opened");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => connection.send(&line),
                None => {
                    tokio::select! {
                        () = shutdown.cancelled() => {}
                        () = tokio::time::sleep(Duration::from_millis(linger)) => sig_down.cancel(),
                    }
                    break;
                }
            },
        }
    }

    connection.disconnect();
    sig_down.recv().await;
    tracing::info!(%chain_id, "session closed");
    Ok(())
}
