//! WebSocket connector.
//!
//! Every [`Connector::connect`] call opens its own socket to the first
//! reachable endpoint. Messages sent while the socket is still opening are
//! queued. When the socket fails or closes, each request still waiting for a
//! response is answered locally with an internal error carrying its id, and
//! the session goes quiet.

use futures::{SinkExt, StreamExt};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{Callback, Connector, Dispatcher, JsonRpcConnection};
use crate::error::Error;
use crate::jsonrpc::{self, INTERNAL_ERROR, Response};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Outgoing = (Option<Value>, String);

/// Connector speaking JSON-RPC over WebSocket to a node.
#[derive(Debug, Clone)]
pub struct WsConnector {
    endpoints: Vec<Url>,
}

impl WsConnector {
    /// Creates a connector trying `endpoints` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoints` is empty or any endpoint is not a
    /// `ws://` or `wss://` URL.
    pub fn new(endpoints: &[String]) -> Result<Self, Error> {
        if endpoints.is_empty() {
            return Err(Error::Transport("no WebSocket endpoints".to_owned()));
        }
        let endpoints = endpoints
            .iter()
            .map(|raw| {
                let url = Url::parse(raw)
                    .map_err(|e| Error::transport_with(format!("invalid endpoint '{raw}'"), e))?;
                match url.scheme() {
                    "ws" | "wss" => Ok(url),
                    scheme => Err(Error::Transport(format!(
                        "endpoint '{raw}' has unsupported scheme '{scheme}'"
                    ))),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { endpoints })
    }

    /// Configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}

impl Connector for WsConnector {
    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection> {
        let dispatcher = Dispatcher::spawn(on_message);
        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_session(self.endpoints.clone(), rx, dispatcher.clone()));
        Box::new(WsConnection {
            outgoing,
            dispatcher,
        })
    }
}

#[derive(Debug)]
struct WsConnection {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    dispatcher: Dispatcher,
}

impl JsonRpcConnection for WsConnection {
    fn send(&self, message: &str) {
        if self.dispatcher.is_closed() {
            return;
        }
        match jsonrpc::parse_request(message) {
            Ok(request) => {
                if let Err(mpsc::error::SendError((Some(id), _))) =
                    self.outgoing.send((request.id, message.to_owned()))
                {
                    self.dispatcher.deliver(transport_closed(id));
                }
            }
            Err(error) => self.dispatcher.deliver(error.to_json()),
        }
    }

    fn disconnect(&self) {
        if self.dispatcher.close() {
            tracing::debug!("WebSocket session closed by caller");
        }
    }
}

fn transport_closed(id: Value) -> String {
    Response::error(id, INTERNAL_ERROR, "transport closed").to_json()
}

async fn open(endpoints: &[Url]) -> Option<Socket> {
    for endpoint in endpoints {
        match connect_async(endpoint.as_str()).await {
            Ok((socket, _)) => {
                tracing::debug!(%endpoint, "WebSocket connected");
                return Some(socket);
            }
            Err(error) => tracing::warn!(%endpoint, %error, "WebSocket connect failed"),
        }
    }
    None
}

async fn run_session(
    endpoints: Vec<Url>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    dispatcher: Dispatcher,
) {
    let cancelled = dispatcher.cancellation_token();
    let mut pending: IndexMap<String, Value> = IndexMap::new();

    let socket = tokio::select! {
        () = cancelled.cancelled() => return,
        socket = open(&endpoints) => socket,
    };

    if let Some(socket) = socket {
        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                () = cancelled.cancelled() => {
                    let _ = sink.close().await;
                    return;
                }
                message = outgoing.recv() => {
                    let Some((id, text)) = message else { break };
                    if let Some(id) = id {
                        pending.insert(id.to_string(), id);
                    }
                    if let Err(error) = sink.send(Message::text(text)).await {
                        tracing::warn!(%error, "WebSocket send failed");
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.as_str().to_owned();
                        if let Some(id) = jsonrpc::response_id(&text) {
                            pending.shift_remove(&id.to_string());
                        }
                        dispatcher.deliver(text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("WebSocket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::warn!(%error, "WebSocket receive failed");
                        break;
                    }
                },
            }
        }
    }

    outgoing.close();
    while let Ok((id, _)) = outgoing.try_recv() {
        if let Some(id) = id {
            pending.insert(id.to_string(), id);
        }
    }
    for id in pending.into_values() {
        dispatcher.deliver(transport_closed(id));
    }
}
