//! In-process JSON-RPC node.
//!
//! [`MemoryConnector`] answers requests with an [`RpcHandler`] on the calling
//! thread and pushes the answers through the session's [`Dispatcher`], so
//! responses keep the order of the requests that caused them.
//! [`StaticNode`] is the handler used for chains configured without RPC
//! endpoints: it serves the `chainSpec_v1` group from the chain's identity.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use super::{Callback, Connector, Dispatcher, JsonRpcConnection};
use crate::chain::ChainInfo;
use crate::jsonrpc::{self, INVALID_PARAMS, METHOD_NOT_FOUND, Request, Response};

/// Answers JSON-RPC requests for an in-process node.
pub trait RpcHandler: Send + Sync + fmt::Debug {
    /// Handles one request. Returns `None` for notifications that need no
    /// answer.
    fn handle(&self, request: &Request) -> Option<Response>;
}

/// Connector whose sessions are served by an [`RpcHandler`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    handler: Arc<dyn RpcHandler>,
}

impl MemoryConnector {
    /// Creates a connector backed by `handler`.
    pub fn new(handler: Arc<dyn RpcHandler>) -> Self {
        Self { handler }
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection> {
        tracing::debug!("opening in-process session");
        Box::new(MemoryConnection {
            dispatcher: Dispatcher::spawn(on_message),
            handler: Arc::clone(&self.handler),
        })
    }
}

#[derive(Debug)]
struct MemoryConnection {
    dispatcher: Dispatcher,
    handler: Arc<dyn RpcHandler>,
}

impl JsonRpcConnection for MemoryConnection {
    fn send(&self, message: &str) {
        if self.dispatcher.is_closed() {
            return;
        }
        let response = match jsonrpc::parse_request(message) {
            Ok(request) => self.handler.handle(&request),
            Err(error) => Some(error),
        };
        if let Some(response) = response {
            self.dispatcher.deliver(response.to_json());
        }
    }

    fn disconnect(&self) {
        if self.dispatcher.close() {
            tracing::debug!("in-process session closed");
        }
    }
}

const METHODS: [&str; 4] = [
    "chainSpec_v1_chainName",
    "chainSpec_v1_genesisHash",
    "chainSpec_v1_properties",
    "rpc_methods",
];

/// Node answering the `chainSpec_v1` methods from a [`ChainInfo`].
#[derive(Debug, Clone)]
pub struct StaticNode {
    info: ChainInfo,
}

impl StaticNode {
    /// Serves `info`.
    #[must_use]
    pub const fn new(info: ChainInfo) -> Self {
        Self { info }
    }
}

impl RpcHandler for StaticNode {
    fn handle(&self, request: &Request) -> Option<Response> {
        let id = request.id.clone()?;
        if METHODS.contains(&request.method.as_str()) && request.param(0).is_some() {
            return Some(Response::error(id, INVALID_PARAMS, "Invalid params"));
        }
        let result = match request.method.as_str() {
            "chainSpec_v1_chainName" => Value::from(self.info.name.clone()),
            "chainSpec_v1_genesisHash" => {
                Value::from(format!("0x{}", hex::encode(self.info.chain_id.block_hash())))
            }
            "chainSpec_v1_properties" => json!({
                "ss58Format": self.info.ss58_format,
                "tokenDecimals": self.info.decimals,
                "tokenSymbol": self.info.symbol,
            }),
            "rpc_methods" => json!({ "methods": METHODS }),
            _ => return Some(Response::error(id, METHOD_NOT_FOUND, "Method not found")),
        };
        Some(Response::success(id, result))
    }
}
