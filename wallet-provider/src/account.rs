//! Accounts and the account registry contract.
//!
//! An [`Account`] is a signing identity: an immutable public key, the address
//! rendered for the chain it was obtained from, an optional display name and
//! the set of origins allowed to request signatures. Signing goes through the
//! account's [`PolkadotSigner`].
//!
//! [`AccountRegistry::on_accounts_change`] is a two-phase contract: the
//! callback is invoked synchronously with the current list before the
//! [`Subscription`] is returned, then again after every change.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::signer::SignPayload;
use crate::transport::{Callback, DeliveryGate};

/// Allowlist entry granting every origin.
pub const ANY_ORIGIN: &str = "*";

/// Capability to sign payloads with one key.
#[async_trait]
pub trait PolkadotSigner: Send + Sync + fmt::Debug {
    /// Public key of the account.
    fn public_key(&self) -> [u8; 32];

    /// Signs `payload` on behalf of `origin`.
    ///
    /// # Errors
    ///
    /// Rejects if the account was revoked or removed, if `origin` is not
    /// allowed, or if the payload is invalid.
    async fn sign(&self, origin: &str, payload: &SignPayload) -> Result<Vec<u8>>;
}

fn serialize_key<S: Serializer>(key: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(key)))
}

/// A signing identity exposed by a registry.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Raw public key.
    #[serde(serialize_with = "serialize_key")]
    pub public_key: [u8; 32],
    /// SS58 address for the chain the account was listed on.
    pub address: String,
    /// Name captured by the provider, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Origins allowed to request signatures.
    pub allowlist: BTreeSet<String>,
    #[serde(skip)]
    signer: Arc<dyn PolkadotSigner>,
}

impl Account {
    /// Creates an account backed by `signer`.
    pub fn new(
        address: String,
        display_name: Option<String>,
        allowlist: BTreeSet<String>,
        signer: Arc<dyn PolkadotSigner>,
    ) -> Self {
        Self {
            public_key: signer.public_key(),
            address,
            display_name,
            allowlist,
            signer,
        }
    }

    /// Whether `origin` passes this snapshot's allowlist.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        allowlist_permits(&self.allowlist, origin)
    }

    /// Signs `payload` on behalf of `origin`.
    ///
    /// Authorization is checked against the registry at signing time, not
    /// against this snapshot.
    ///
    /// # Errors
    ///
    /// See [`PolkadotSigner::sign`].
    pub async fn sign(&self, origin: &str, payload: &SignPayload) -> Result<Vec<u8>> {
        self.signer.sign(origin, payload).await
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("display_name", &self.display_name)
            .field("allowlist", &self.allowlist)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
            && self.address == other.address
            && self.display_name == other.display_name
            && self.allowlist == other.allowlist
    }
}

impl Eq for Account {}

/// `true` if `allowlist` contains `origin` or the wildcard entry.
#[must_use]
pub fn allowlist_permits(allowlist: &BTreeSet<String>, origin: &str) -> bool {
    allowlist.contains(ANY_ORIGIN) || allowlist.contains(origin)
}

/// Source of accounts with change notifications.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Current accounts.
    ///
    /// # Errors
    ///
    /// Rejects if the registry cannot produce a listing.
    async fn get_accounts(&self) -> Result<Vec<Account>>;

    /// Registers `callback`, invoking it synchronously once with the current
    /// accounts before returning, and again after every change.
    fn on_accounts_change(&self, callback: Callback<Vec<Account>>) -> Subscription;
}

/// Handle of an account-change registration.
///
/// Dropping the handle keeps the registration alive; call
/// [`Subscription::unsubscribe`] to end it.
#[must_use = "the registration stays active until `unsubscribe` is called"]
pub struct Subscription {
    gate: Arc<DeliveryGate>,
    on_unsubscribe: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    /// Builds a handle that closes `gate` and runs `on_unsubscribe` once.
    ///
    /// The registry must invoke the callback through [`DeliveryGate::run`]
    /// on the same gate.
    pub fn new(gate: Arc<DeliveryGate>, on_unsubscribe: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            gate,
            on_unsubscribe: Box::new(on_unsubscribe),
        }
    }

    /// Ends the registration. Idempotent; no callback invocation starts after
    /// the first call returns.
    ///
    /// Called from another thread, this waits for an invocation already in
    /// progress. Called from inside the callback, it returns immediately.
    pub fn unsubscribe(&self) {
        if self.gate.close() {
            (self.on_unsubscribe)();
        }
    }

    /// Whether the registration is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn wildcard_and_exact_origins() {
        let open: BTreeSet<String> = [ANY_ORIGIN.to_owned()].into();
        let scoped: BTreeSet<String> = ["https://app.example".to_owned()].into();
        assert!(allowlist_permits(&open, "https://anything"));
        assert!(allowlist_permits(&scoped, "https://app.example"));
        assert!(!allowlist_permits(&scoped, "https://evil.example"));
        assert!(!allowlist_permits(&BTreeSet::new(), "https://app.example"));
    }

    #[test]
    fn unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new(Arc::new(DeliveryGate::new()), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
