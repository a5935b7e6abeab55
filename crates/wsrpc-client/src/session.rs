//! The session engine
//!
//! [`Session`] is the clonable public handle; the work happens in a
//! [`SessionEngine`] task that exclusively owns the transport, the
//! pending-request table, the method registry, and the id counter. All
//! transport events, timer expirations, and caller commands are funneled
//! through one `select!` loop, so the engine state is mutated from exactly
//! one logical thread and mutual exclusion is structural.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use wsrpc_json_rpc::{
    ErrorCode, ErrorObject, Frame, FrameError, FunctionHandler, HandlerResult, MethodHandler,
    MethodRegistry, Params, Request, Response, classify,
};

use crate::config::SessionConfig;
use crate::error::{CallError, ClientError, SessionError, TransportError};
use crate::pending::{PendingTable, ReplySender};
use crate::transport::{
    ABNORMAL_CLOSURE, BoxedTransport, EventReceiver, NORMAL_CLOSURE, TransportEvent,
    TransportFactory,
};

#[cfg(feature = "websocket")]
use crate::transport::WebSocketFactory;

/// Capacity of the subscribable error channel
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Observable lifecycle state, a projection of transport events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// How a `close()` settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseEvent {
    /// There was no connection to close; not an error
    NotConnected,
    /// The transport's close event fired
    Closed { code: u16, reason: String },
}

enum Command {
    Open {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Close {
        reply: oneshot::Sender<CloseEvent>,
    },
    Call {
        method: String,
        params: Option<Params>,
        reply: ReplySender,
    },
    Notify {
        method: String,
        params: Option<Params>,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Register {
        name: String,
        param_names: Vec<String>,
        handler: Arc<dyn MethodHandler>,
    },
    Unregister {
        name: String,
    },
}

/// Handle to a running session engine
///
/// Cloning is cheap; all clones drive the same engine. The engine task
/// stops when every handle has been dropped.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    errors: broadcast::Sender<SessionError>,
}

impl Session {
    /// Spawn a session engine over transports produced by `factory`
    pub fn new(factory: impl TransportFactory + 'static, config: SessionConfig) -> Self {
        Self::with_factory(Arc::new(factory), config)
    }

    pub(crate) fn with_factory(factory: Arc<dyn TransportFactory>, config: SessionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Closed);
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let engine = SessionEngine {
            factory,
            config,
            commands: command_rx,
            state: state_tx,
            errors: error_tx.clone(),
            transport: None,
            events: None,
            pending: PendingTable::new(),
            registry: MethodRegistry::new(),
            next_id: 1,
            open_waiter: None,
            close_waiter: None,
        };
        tokio::spawn(engine.run());

        Self {
            commands: command_tx,
            state: state_rx,
            errors: error_tx,
        }
    }

    /// Connect a fresh transport.
    ///
    /// Any existing transport is closed out first. Resolves when the new
    /// transport reports its open event, or fails with the error event.
    /// Concurrent `open()` calls are not idempotent-safe: each creates a
    /// fresh transport, and a superseded caller observes
    /// [`ClientError::SessionClosed`]. Callers must serialize.
    pub async fn open(&self) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Open { reply: reply_tx })
            .map_err(|_| ClientError::SessionClosed)?;
        reply_rx.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// Close the transport with a normal-closure code.
    ///
    /// Resolves with [`CloseEvent::NotConnected`] immediately when there
    /// is nothing to close, so closing an already-closed session is not an
    /// error. Outstanding calls are not failed proactively; they settle by
    /// their own timers.
    pub async fn close(&self) -> Result<CloseEvent, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Close { reply: reply_tx })
            .map_err(|_| ClientError::SessionClosed)?;
        reply_rx.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Invoke `method` on the peer and await its response.
    ///
    /// Fails before any I/O when the session is not open. On success the
    /// returned future settles with the peer's response, the peer's error,
    /// or a timeout after the configured request duration.
    pub async fn call(&self, method: &str, params: Option<Params>) -> Result<Response, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                method: method.to_string(),
                params,
                reply: reply_tx,
            })
            .map_err(|_| CallError::NotConnected)?;
        reply_rx.await.map_err(|_| CallError::NotConnected)?
    }

    /// Send a notification: no id, no correlation, no reply ever.
    pub async fn notify(&self, method: &str, params: Option<Params>) -> Result<(), CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Notify {
                method: method.to_string(),
                params,
                reply: reply_tx,
            })
            .map_err(|_| CallError::NotConnected)?;
        reply_rx.await.map_err(|_| CallError::NotConnected)?
    }

    /// Register a handler under `name` with its declared parameter names.
    ///
    /// Lookup is case-insensitive; re-registration under the same name
    /// replaces the previous handler. Handlers execute serially on the
    /// engine task, so a handler must not await `call` on its own session.
    pub fn register<H>(
        &self,
        name: &str,
        param_names: &[&str],
        handler: H,
    ) -> Result<(), ClientError>
    where
        H: MethodHandler + 'static,
    {
        self.commands
            .send(Command::Register {
                name: name.to_string(),
                param_names: param_names.iter().map(|p| p.to_string()).collect(),
                handler: Arc::new(handler),
            })
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Register a plain closure as a handler
    pub fn register_fn<F>(
        &self,
        name: &str,
        param_names: &[&str],
        handler: F,
    ) -> Result<(), ClientError>
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(
            name,
            param_names,
            FunctionHandler::new(move |args| {
                let outcome = handler(args);
                async move { outcome }.boxed()
            }),
        )
    }

    /// Remove a registered method; removing an absent entry is a no-op.
    pub fn unregister(&self, name: &str) -> Result<(), ClientError> {
        self.commands
            .send(Command::Unregister {
                name: name.to_string(),
            })
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Subscribe to connection- and protocol-level failures that cannot be
    /// attributed to a specific caller
    pub fn errors(&self) -> broadcast::Receiver<SessionError> {
        self.errors.subscribe()
    }
}

struct SessionEngine {
    factory: Arc<dyn TransportFactory>,
    config: SessionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SessionState>,
    errors: broadcast::Sender<SessionError>,
    transport: Option<BoxedTransport>,
    events: Option<EventReceiver>,
    pending: PendingTable,
    registry: MethodRegistry,
    next_id: i64,
    open_waiter: Option<oneshot::Sender<Result<(), ClientError>>>,
    close_waiter: Option<oneshot::Sender<CloseEvent>>,
}

impl SessionEngine {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break, // every handle dropped
                },
                event = Self::next_event(&mut self.events) => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => self.handle_transport_gone(),
                },
                Some(id) = self.pending.next_expired() => self.handle_timeout(id),
            }
        }
        debug!("session engine stopped");
    }

    async fn next_event(events: &mut Option<EventReceiver>) -> Option<TransportEvent> {
        match events {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn report(&self, error: SessionError) {
        debug!(error = %error, "reporting session error");
        // nobody subscribed is fine
        let _ = self.errors.send(error);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open { reply } => self.handle_open(reply).await,
            Command::Close { reply } => self.handle_close(reply).await,
            Command::Call {
                method,
                params,
                reply,
            } => self.handle_call(method, params, reply).await,
            Command::Notify {
                method,
                params,
                reply,
            } => self.handle_notify(method, params, reply).await,
            Command::Register {
                name,
                param_names,
                handler,
            } => {
                debug!(method = %name, "registering method");
                self.registry.register_arc(&name, param_names, handler);
            }
            Command::Unregister { name } => {
                debug!(method = %name, "unregistering method");
                self.registry.unregister(&name);
            }
        }
    }

    async fn handle_open(&mut self, reply: oneshot::Sender<Result<(), ClientError>>) {
        // an existing transport is closed out first, awaiting completion
        self.shutdown_transport().await;

        info!(endpoint = %self.factory.endpoint(), "opening session");
        self.set_state(SessionState::Connecting);

        let mut transport = self.factory.create();
        match transport.open() {
            Ok(events) => {
                self.transport = Some(transport);
                self.events = Some(events);
                // a superseded open waiter is dropped here; its caller
                // observes SessionClosed
                self.open_waiter = Some(reply);
            }
            Err(e) => {
                self.set_state(SessionState::Closed);
                let _ = reply.send(Err(ClientError::Transport(e)));
            }
        }
    }

    async fn handle_close(&mut self, reply: oneshot::Sender<CloseEvent>) {
        if self.transport.is_none() {
            let _ = reply.send(CloseEvent::NotConnected);
            return;
        }

        // outstanding calls are left to settle by their own timers
        if !self.pending.is_empty() {
            debug!(outstanding = self.pending.len(), "closing with requests in flight");
        }
        info!("closing session");
        self.set_state(SessionState::Closing);
        self.close_waiter = Some(reply);
        if let Some(transport) = self.transport.as_mut() {
            if transport.close(NORMAL_CLOSURE).await.is_err() {
                // the pump is already gone; its channel teardown settles the waiter
                warn!("close requested on a dead transport");
            }
        }
    }

    /// Close and drain a transport that is being replaced
    async fn shutdown_transport(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        debug!("replacing existing transport");
        let _ = transport.close(NORMAL_CLOSURE).await;
        if let Some(mut events) = self.events.take() {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Closed { code, reason } => {
                        self.finish_close(code, reason);
                        break;
                    }
                    TransportEvent::Error(message) => {
                        // pre-open failure: no close event will follow
                        self.finish_close(ABNORMAL_CLOSURE, message);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Terminal close processing: report abnormal closure, settle any
    /// close waiter, and transition to Closed. Reporting and resolving are
    /// not mutually exclusive.
    fn finish_close(&mut self, code: u16, reason: String) {
        if code != NORMAL_CLOSURE {
            self.report(SessionError::Connection {
                code,
                reason: reason.clone(),
            });
        }
        if let Some(waiter) = self.close_waiter.take() {
            let _ = waiter.send(CloseEvent::Closed { code, reason });
        }
        self.set_state(SessionState::Closed);
    }

    async fn handle_call(&mut self, method: String, params: Option<Params>, reply: ReplySender) {
        if self.current_state() != SessionState::Open {
            let _ = reply.send(Err(CallError::NotConnected));
            return;
        }

        // ids are monotonically increasing and never reused in a session
        let id = self.next_id;
        self.next_id += 1;

        let request = Request::call(id, method, params);
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(CallError::Send(e.to_string())));
                return;
            }
        };

        debug!(id, method = %request.method, "sending request");
        match self.send_text(text).await {
            Ok(()) => {
                self.pending
                    .insert(id, request, reply, self.config.timeouts.request);
            }
            Err(e) => {
                // send failed: no pending entry, no armed timer
                let _ = reply.send(Err(CallError::Send(e.to_string())));
            }
        }
    }

    async fn handle_notify(
        &mut self,
        method: String,
        params: Option<Params>,
        reply: oneshot::Sender<Result<(), CallError>>,
    ) {
        if self.current_state() != SessionState::Open {
            let _ = reply.send(Err(CallError::NotConnected));
            return;
        }

        let notification = Request::notification(method, params);
        let text = match serde_json::to_string(&notification) {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(CallError::Send(e.to_string())));
                return;
            }
        };

        debug!(method = %notification.method, "sending notification");
        let outcome = self
            .send_text(text)
            .await
            .map_err(|e| CallError::Send(e.to_string()));
        let _ = reply.send(outcome);
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport.send(text).await,
            None => Err(TransportError::NotConnected),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("session open");
                self.set_state(SessionState::Open);
                if let Some(waiter) = self.open_waiter.take() {
                    let _ = waiter.send(Ok(()));
                }
            }
            TransportEvent::Message(text) => self.handle_frame(&text).await,
            TransportEvent::Closed { code, reason } => {
                debug!(code, reason = %reason, "transport closed");
                self.transport = None;
                self.events = None;
                self.finish_close(code, reason);
            }
            TransportEvent::Error(message) => {
                if let Some(waiter) = self.open_waiter.take() {
                    // the connection attempt failed; no close event follows
                    self.transport = None;
                    self.events = None;
                    self.set_state(SessionState::Closed);
                    let _ = waiter.send(Err(ClientError::Transport(
                        TransportError::ConnectionFailed(message),
                    )));
                } else {
                    self.report(SessionError::Transport { message });
                }
            }
        }
    }

    /// The transport's event channel ended without a terminal close event
    fn handle_transport_gone(&mut self) {
        self.transport = None;
        self.events = None;
        if let Some(waiter) = self.open_waiter.take() {
            let _ = waiter.send(Err(ClientError::Transport(TransportError::Closed)));
        }
        if self.current_state() != SessionState::Closed || self.close_waiter.is_some() {
            self.finish_close(ABNORMAL_CLOSURE, "transport terminated".to_string());
        }
    }

    fn handle_timeout(&mut self, id: i64) {
        let Some(entry) = self.pending.expire(id) else {
            return;
        };
        let timeout_ms = self.config.timeouts.request.as_millis() as u64;
        warn!(id, method = %entry.request.method, timeout_ms, "request timed out");
        let _ = entry.reply.send(Err(CallError::Timeout { id, timeout_ms }));
    }

    async fn handle_frame(&mut self, text: &str) {
        match classify(text) {
            Ok(Frame::Response(response)) => self.handle_response(response),
            Ok(Frame::Request(request)) => self.handle_request(request).await,
            Err(error) => self.handle_invalid_frame(error).await,
        }
    }

    async fn handle_request(&mut self, request: Request) {
        debug!(method = %request.method, id = ?request.id, "dispatching inbound request");
        if let Some(response) = self.registry.dispatch(&request).await {
            self.send_response(response).await;
        }
    }

    fn handle_response(&mut self, response: Response) {
        let id = response.id;
        let Some(entry) = self.pending.complete(id) else {
            warn!(id, "response with no matching pending request");
            self.report(SessionError::UnmatchedResponse { id });
            return;
        };

        let outcome = if response.is_malformed() {
            Err(CallError::InvalidResponse {
                id,
                payload: serde_json::to_value(&response).unwrap_or(Value::Null),
            })
        } else if let Some(error) = response.error.clone() {
            Err(CallError::Rpc { id, error })
        } else {
            Ok(response)
        };
        let _ = entry.reply.send(outcome);
    }

    async fn handle_invalid_frame(&mut self, error: FrameError) {
        let id = error.id();
        let code = match &error {
            FrameError::Parse(_) => ErrorCode::ParseError,
            FrameError::Version { .. } | FrameError::Shape { .. } => ErrorCode::InvalidRequest,
        };
        let message = error.to_string();
        warn!(code = code.code(), %message, "invalid inbound frame");
        self.report(SessionError::Protocol {
            code,
            message: message.clone(),
        });

        // echo an error response when the frame carried a usable id
        if let Some(id) = id {
            let response = Response::error(id, ErrorObject::new(code, Some(message), None));
            self.send_response(response).await;
        }
    }

    async fn send_response(&mut self, response: Response) {
        // replies never go out unless the session is open
        if self.current_state() != SessionState::Open {
            debug!(id = response.id, "dropping reply; session is not open");
            return;
        }
        match serde_json::to_string(&response) {
            Ok(text) => {
                if let Err(e) = self.send_text(text).await {
                    warn!(error = %e, "failed to send response");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize response"),
        }
    }
}

/// Builder for creating sessions
pub struct SessionBuilder {
    factory: Option<Arc<dyn TransportFactory>>,
    url: Option<String>,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            factory: None,
            url: None,
            config: SessionConfig::default(),
        }
    }

    /// Connect over WebSocket to `url` (requires the `websocket` feature)
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Use a custom transport factory
    pub fn with_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Session, ClientError> {
        if let Some(factory) = self.factory {
            return Ok(Session::with_factory(factory, self.config));
        }

        #[cfg(feature = "websocket")]
        if let Some(url) = self.url {
            let factory = WebSocketFactory::new(&url, self.config.timeouts.connect)?;
            return Ok(Session::with_factory(Arc::new(factory), self.config));
        }

        Err(ClientError::Config(
            "no transport configured: set a URL or a factory".to_string(),
        ))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
