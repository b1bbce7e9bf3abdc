//! Wallet Provider CLI
//!
//! Serves relay chains, parachains and keyring accounts described by a TOML
//! configuration file.
//!
//! ```sh
//! wallet-provider init                     # Generate default config.toml
//! wallet-provider chains                   # List chains as JSON
//! wallet-provider accounts --chain 0x…     # List accounts for a chain
//! wallet-provider sign --account 5… --origin https://app.example --payload p.json
//! wallet-provider connect --chain 0x…      # JSON-RPC over stdin/stdout
//! ```

mod cmd;
mod signal;

use clap::Parser;
use cmd::{Cli, Commands};

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    // wss:// endpoints need a process-wide rustls crypto provider
    if rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .is_err()
    {
        eprintln!("Error: failed to initialize rustls crypto provider");
        std::process::exit(1);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { output, force } => cmd::init::run(&output, force).map_err(Into::into),
        Commands::Chains { config } => cmd::chains::run(&config).await,
        Commands::Accounts { config, chain } => cmd::accounts::run(&config, chain.as_ref()).await,
        Commands::Sign {
            config,
            account,
            origin,
            payload,
        } => cmd::sign::run(&config, &account, &origin, &payload).await,
        Commands::Connect {
            config,
            chain,
            linger,
        } => cmd::connect::run(&config, &chain, linger).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
