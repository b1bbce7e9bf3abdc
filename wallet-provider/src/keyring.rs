//! Local ed25519 keyring.
//!
//! The [`Keyring`] owns the provider's keys and is the only source of
//! account-change notifications. Chains expose it through a [`ChainAccounts`]
//! view that renders addresses in the chain's SS58 format.
//!
//! Every mutation bumps a version counter. A subscriber remembers the last
//! version it was given and skips older snapshots, so notifications for one
//! registration never go backwards even when mutations race. Callbacks run
//! without the keyring lock, inside their registration's [`DeliveryGate`], so
//! `unsubscribe` and delivery never overlap. Snapshots are rendered into the
//! subscriber's value type before the gate is entered.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use indexmap::IndexMap;

use crate::account::{Account, AccountRegistry, PolkadotSigner, Subscription, allowlist_permits};
use crate::error::{Error, Result};
use crate::signer::SignPayload;
use crate::ss58;
use crate::transport::{Callback, DeliveryGate};

/// Public view of an active key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// ed25519 public key.
    pub public_key: [u8; 32],
    /// Name captured by the provider.
    pub display_name: Option<String>,
    /// Origins allowed to request signatures.
    pub allowlist: BTreeSet<String>,
}

struct Entry {
    signing_key: SigningKey,
    display_name: Option<String>,
    allowlist: BTreeSet<String>,
    revoked: bool,
}

/// A registration, erased over the value its callback receives.
trait Listener: Send + Sync {
    /// Whether the initial call has completed.
    fn is_ready(&self) -> bool;

    fn deliver(&self, version: u64, snapshot: Vec<KeyInfo>);
}

struct Subscriber<T> {
    gate: Arc<DeliveryGate>,
    ready: AtomicBool,
    delivered: AtomicU64,
    render: Box<dyn Fn(Vec<KeyInfo>) -> T + Send + Sync>,
    callback: Callback<T>,
}

impl<T> Subscriber<T> {
    fn initial(&self, snapshot: Vec<KeyInfo>) {
        let value = (self.render)(snapshot);
        self.gate.run(|| (self.callback)(value));
    }
}

impl<T: 'static> Listener for Subscriber<T> {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn deliver(&self, version: u64, snapshot: Vec<KeyInfo>) {
        if !self.gate.is_open() || self.delivered.load(Ordering::Acquire) >= version {
            return;
        }
        let value = (self.render)(snapshot);
        self.gate.run(|| {
            if self.delivered.fetch_max(version, Ordering::AcqRel) < version {
                (self.callback)(value);
            }
        });
    }
}

#[derive(Default)]
struct State {
    entries: IndexMap<[u8; 32], Entry>,
    subscribers: HashMap<u64, Arc<dyn Listener>>,
    next_subscriber: u64,
    version: u64,
}

impl State {
    fn snapshot(&self) -> Vec<KeyInfo> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.revoked)
            .map(|(public_key, entry)| KeyInfo {
                public_key: *public_key,
                display_name: entry.display_name.clone(),
                allowlist: entry.allowlist.clone(),
            })
            .collect()
    }
}

#[derive(Default)]
struct Inner {
    state: RwLock<State>,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared store of signing keys.
#[derive(Clone, Default)]
pub struct Keyring {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Keyring")
            .field("accounts", &state.entries.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl Keyring {
    /// Creates an empty keyring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `change` and notifies subscribers if it reports a change.
    fn mutate(&self, change: impl FnOnce(&mut State) -> bool) -> bool {
        let (version, snapshot, subscribers) = {
            let mut state = self.inner.write();
            if !change(&mut state) {
                return false;
            }
            state.version += 1;
            let subscribers: Vec<_> = state
                .subscribers
                .values()
                .filter(|s| s.is_ready())
                .cloned()
                .collect();
            (state.version, state.snapshot(), subscribers)
        };
        for subscriber in subscribers {
            subscriber.deliver(version, snapshot.clone());
        }
        true
    }

    /// Adds the key derived from a 32-byte ed25519 seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] if the key is already present.
    pub fn add(
        &self,
        seed: &[u8; 32],
        display_name: Option<String>,
        allowlist: BTreeSet<String>,
    ) -> Result<[u8; 32]> {
        let signing_key = SigningKey::from_bytes(seed);
        let public_key = signing_key.verifying_key().to_bytes();
        let added = self.mutate(|state| {
            if state.entries.contains_key(&public_key) {
                return false;
            }
            state.entries.insert(
                public_key,
                Entry {
                    signing_key,
                    display_name,
                    allowlist,
                    revoked: false,
                },
            );
            true
        });
        if !added {
            return Err(Error::signer(format!(
                "key 0x{} is already in the keyring",
                hex::encode(public_key)
            )));
        }
        tracing::info!(public_key = %hex::encode(public_key), "account added");
        Ok(public_key)
    }

    /// Removes a key. Returns `false` if it was not present.
    pub fn remove(&self, public_key: &[u8; 32]) -> bool {
        self.mutate(|state| state.entries.shift_remove(public_key).is_some())
    }

    /// Revokes a key: it disappears from listings and can no longer sign.
    /// Returns `false` if it was absent or already revoked.
    pub fn revoke(&self, public_key: &[u8; 32]) -> bool {
        self.mutate(|state| match state.entries.get_mut(public_key) {
            Some(entry) if !entry.revoked => {
                entry.revoked = true;
                true
            }
            _ => false,
        })
    }

    /// Changes the display name. Returns `false` if nothing changed.
    pub fn set_display_name(&self, public_key: &[u8; 32], display_name: Option<String>) -> bool {
        self.mutate(|state| match state.entries.get_mut(public_key) {
            Some(entry) if !entry.revoked && entry.display_name != display_name => {
                entry.display_name = display_name;
                true
            }
            _ => false,
        })
    }

    /// Replaces the allowlist. Returns `false` if nothing changed.
    pub fn set_allowlist(&self, public_key: &[u8; 32], allowlist: BTreeSet<String>) -> bool {
        self.mutate(|state| match state.entries.get_mut(public_key) {
            Some(entry) if !entry.revoked && entry.allowlist != allowlist => {
                entry.allowlist = allowlist;
                true
            }
            _ => false,
        })
    }

    /// Active keys, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<KeyInfo> {
        self.inner.read().snapshot()
    }

    /// Registers `callback` for key changes.
    ///
    /// `callback` is invoked synchronously with the current keys before this
    /// returns. Changes committed while that first call runs are delivered
    /// right after it, so nothing is missed between the two phases.
    pub fn subscribe(&self, callback: Callback<Vec<KeyInfo>>) -> Subscription {
        self.subscribe_with(|keys| keys, callback)
    }

    /// Like [`Keyring::subscribe`], with every snapshot passed through
    /// `render` before `callback` sees it.
    ///
    /// `render` runs outside the registration's gate, so an `unsubscribe`
    /// racing with a slow render never waits on it.
    pub fn subscribe_with<T: 'static>(
        &self,
        render: impl Fn(Vec<KeyInfo>) -> T + Send + Sync + 'static,
        callback: Callback<T>,
    ) -> Subscription {
        let gate = Arc::new(DeliveryGate::new());
        let (id, subscriber, initial_version, initial) = {
            let mut state = self.inner.write();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            let subscriber = Arc::new(Subscriber {
                gate: Arc::clone(&gate),
                ready: AtomicBool::new(false),
                delivered: AtomicU64::new(state.version),
                render: Box::new(render),
                callback,
            });
            let listener: Arc<dyn Listener> = Arc::<Subscriber<T>>::clone(&subscriber);
            state.subscribers.insert(id, listener);
            (id, subscriber, state.version, state.snapshot())
        };

        subscriber.initial(initial);

        let catch_up = {
            let state = self.inner.write();
            subscriber.ready.store(true, Ordering::Release);
            (state.version > initial_version).then(|| (state.version, state.snapshot()))
        };
        if let Some((version, snapshot)) = catch_up {
            subscriber.deliver(version, snapshot);
        }

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(gate, move || {
            if let Some(inner) = inner.upgrade() {
                inner.write().subscribers.remove(&id);
            }
        })
    }

    /// Signs `payload` with the key `public_key` on behalf of `origin`.
    ///
    /// `address` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Rejects with [`Error::AccountNotFound`], [`Error::Revoked`],
    /// [`Error::Unauthorized`] or [`Error::InvalidPayload`].
    pub fn sign(
        &self,
        public_key: &[u8; 32],
        address: &str,
        origin: &str,
        payload: &SignPayload,
    ) -> Result<[u8; 64]> {
        let state = self.inner.read();
        let entry = state
            .entries
            .get(public_key)
            .ok_or_else(|| Error::AccountNotFound(address.to_owned()))?;
        if entry.revoked {
            return Err(Error::Revoked(address.to_owned()));
        }
        if !allowlist_permits(&entry.allowlist, origin) {
            tracing::warn!(%address, %origin, "signing request from origin outside allowlist");
            return Err(Error::Unauthorized {
                origin: origin.to_owned(),
                address: address.to_owned(),
            });
        }
        let message = payload.signing_payload()?;
        tracing::debug!(
            %address,
            %origin,
            at_block_number = payload.at_block_number,
            extensions = payload.signed_extensions.len(),
            "signing payload"
        );
        Ok(entry.signing_key.sign(&message).to_bytes())
    }
}

/// Signer for one keyring key, checking the keyring on every call.
#[derive(Debug, Clone)]
pub struct KeyringSigner {
    keyring: Keyring,
    public_key: [u8; 32],
    address: String,
}

#[async_trait]
impl PolkadotSigner for KeyringSigner {
    fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    async fn sign(&self, origin: &str, payload: &SignPayload) -> Result<Vec<u8>> {
        self.keyring
            .sign(&self.public_key, &self.address, origin, payload)
            .map(|signature| signature.to_vec())
    }
}

/// Keyring accounts as seen from one chain.
#[derive(Debug, Clone)]
pub struct ChainAccounts {
    keyring: Keyring,
    ss58_format: u16,
}

impl ChainAccounts {
    /// View of `keyring` with addresses in `ss58_format`.
    #[must_use]
    pub const fn new(keyring: Keyring, ss58_format: u16) -> Self {
        Self {
            keyring,
            ss58_format,
        }
    }

    fn to_accounts(keyring: &Keyring, ss58_format: u16, keys: Vec<KeyInfo>) -> Vec<Account> {
        keys.into_iter()
            .map(|key| {
                let address = ss58::encode(&key.public_key, ss58_format)
                    .unwrap_or_else(|_| format!("0x{}", hex::encode(key.public_key)));
                let signer = Arc::new(KeyringSigner {
                    keyring: keyring.clone(),
                    public_key: key.public_key,
                    address: address.clone(),
                });
                Account::new(address, key.display_name, key.allowlist, signer)
            })
            .collect()
    }
}

#[async_trait]
impl AccountRegistry for ChainAccounts {
    async fn get_accounts(&self) -> Result<Vec<Account>> {
        Ok(Self::to_accounts(
            &self.keyring,
            self.ss58_format,
            self.keyring.keys(),
        ))
    }

    fn on_accounts_change(&self, callback: Callback<Vec<Account>>) -> Subscription {
        let keyring = self.keyring.clone();
        let ss58_format = self.ss58_format;
        self.keyring.subscribe_with(
            move |keys| Self::to_accounts(&keyring, ss58_format, keys),
            callback,
        )
    }
}
