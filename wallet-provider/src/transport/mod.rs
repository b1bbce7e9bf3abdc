//! JSON-RPC transport abstraction.
//!
//! - [`JsonRpcConnection`]: a live session with `send` and `disconnect`.
//! - [`Connector`]: produces independent sessions for one chain.
//! - [`Dispatcher`]: ordered, cancellable delivery of inbound messages to the
//!   session's callback. Every connector in this crate builds on it.
//! - [`DeliveryGate`]: keeps callbacks from starting once a session or
//!   subscription has been closed.
//! - [`memory`]: in-process node, no network.
//! - [`ws`]: WebSocket connection to a node's JSON-RPC endpoint.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod gate;
pub mod memory;
pub mod ws;

pub use gate::DeliveryGate;

/// Listener invoked with each value pushed by the provider.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A live JSON-RPC session with a chain.
pub trait JsonRpcConnection: Send + Sync + fmt::Debug {
    /// Enqueues a JSON-RPC message for delivery to the chain.
    ///
    /// Messages that are not a valid JSON-RPC request are answered locally
    /// with an error response. Messages sent after [`disconnect`] are dropped.
    ///
    /// [`disconnect`]: JsonRpcConnection::disconnect
    fn send(&self, message: &str);

    /// Releases the session. Idempotent; no callback invocation starts after
    /// the first call returns.
    ///
    /// A call from another thread waits for a callback that is already
    /// running. A call from inside the callback returns immediately.
    fn disconnect(&self);
}

/// Produces JSON-RPC sessions for a chain.
///
/// Each call yields an independent session: messages sent on one are never
/// delivered to another's callback.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens a session delivering inbound messages to `on_message`.
    ///
    /// Must be called from within a tokio runtime.
    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection>;
}

/// Delivers inbound messages to a session callback, one at a time and in the
/// order they were handed over.
#[derive(Clone)]
pub struct Dispatcher {
    inbound: mpsc::UnboundedSender<String>,
    gate: Arc<DeliveryGate>,
    cancellation_token: CancellationToken,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Spawns the delivery task for `on_message`.
    #[must_use]
    pub fn spawn(on_message: Callback<String>) -> Self {
        let (inbound, mut rx) = mpsc::unbounded_channel::<String>();
        let gate = Arc::new(DeliveryGate::new());
        let cancellation_token = CancellationToken::new();

        let session = Arc::clone(&gate);
        let cancelled = cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    message = rx.recv() => {
                        let Some(message) = message else { break };
                        if !session.run(|| on_message(message)) {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            inbound,
            gate,
            cancellation_token,
        }
    }

    /// Queues `message` for the callback. No-op once closed.
    pub fn deliver(&self, message: String) {
        if !self.is_closed() {
            let _ = self.inbound.send(message);
        }
    }

    /// Closes the session. Returns `true` only for the call that closed it.
    ///
    /// Once this returns, the callback is not running and will not run again,
    /// unless this is called from inside the callback itself.
    pub fn close(&self) -> bool {
        let first = self.gate.close();
        self.cancellation_token.cancel();
        first
    }

    /// Whether [`Dispatcher::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.gate.is_open()
    }

    /// Token cancelled when the session closes, for transport tasks.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
