//! `wallet-provider sign` command: sign a payload file for an origin.

use std::path::Path;

use serde_json::json;
use wallet_provider::account::AccountRegistry;
use wallet_provider::error::Error;
use wallet_provider::keyring::ChainAccounts;
use wallet_provider::signer::SignPayload;
use wallet_provider::ss58;

/// Reads a JSON [`SignPayload`] from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid payload.
pub async fn read_payload(path: &Path) -> Result<SignPayload, Error> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::config_with(format!("failed to read payload '{}'", path.display()), e)
    })?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidPayload(format!("'{}': {e}", path.display())))
}

/// Execute the `sign` command.
///
/// The account is looked up by the public key its address encodes, rendered
/// in the address's own SS58 format.
///
/// # Errors
///
/// Returns an error if the address is invalid, the account is unknown, or
/// signing is refused.
#[allow(clippy::print_stdout)]
pub async fn run(
    config_path: &Path,
    address: &str,
    origin: &str,
    payload_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let (provider, _guard) = super::load_provider(config_path).await?;
    let (public_key, format) =
        ss58::decode(address).map_err(|e| format!("invalid address '{address}': {e}"))?;
    let payload = read_payload(payload_path).await?;

    let accounts = ChainAccounts::new(provider.keyring().clone(), format)
        .get_accounts()
        .await?;
    let account = accounts
        .into_iter()
        .find(|account| account.public_key == public_key)
        .ok_or_else(|| Error::AccountNotFound(address.to_owned()))?;

    let signature = account.sign(origin, &payload).await?;
    let output = json!({
        "address": account.address,
        "signature": format!("0x{}", hex::encode(signature)),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_camel_case_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        let body = json!({
            "callData": "0x0500",
            "signedExtensions": {
                "CheckNonce": { "identifier": "CheckNonce", "value": "0x04", "additionalSigned": "0x" }
            },
            "metadata": format!("0x{}", hex::encode(b"meta")),
            "atBlockNumber": 7
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let payload = read_payload(&path).await.unwrap();
        assert_eq!(payload.call_data, vec![0x05, 0x00]);
        assert_eq!(payload.at_block_number, 7);
        assert_eq!(payload.signed_extensions["CheckNonce"].value, vec![0x04]);

        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            read_payload(&path).await,
            Err(Error::InvalidPayload(_))
        ));
    }
}
