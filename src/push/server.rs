//! HTTP surface of the push protocol: device registry, command queue and
//! response correlation.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::rustls::ServerConfig as TlsServerConfig;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::{CallbackSlot, Command, CommandResponse};
use super::device::Device;
use super::exchange::ExchangeCommand;
use super::payload::{extract_str, extract_value};
use crate::bufpool::{BufferPool, DEFAULT_POOL_SIZE};
use crate::error::{Error, Result};

/// Push server settings.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Name reported in logs and used as the TLS server name.
    pub name: String,
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub address: String,
    /// PEM certificate chain; TLS is enabled when both files are set.
    pub cert_file: Option<PathBuf>,
    /// PEM private key.
    pub key_file: Option<PathBuf>,
    /// Number of pooled payload-assembly buffers.
    pub pool_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            address: "0.0.0.0:8080".to_string(),
            cert_file: None,
            key_file: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Callbacks extending the push server.
///
/// A hook may implement any subset: refuse or configure devices on their
/// initial exchange, and wrap the route stack with extra middleware.
pub trait ServerHook: Send + Sync + 'static {
    /// Called on a device's initial exchange; `None` blocks the device.
    fn on_initial_exchange(&self, device: &Device) -> Option<ExchangeCommand> {
        let _ = device;
        None
    }

    /// Wrap the route stack with additional middleware layers.
    fn wrap(&self, router: Router) -> Router {
        router
    }
}

/// Hook that blocks every device and adds no middleware.
pub struct NoopHook;

impl ServerHook for NoopHook {}

struct ServerState {
    options: ServerOptions,
    hook: Box<dyn ServerHook>,

    devices: DashMap<String, Device>,
    queues: DashMap<String, Vec<Command>>,
    callbacks: DashMap<String, CallbackSlot>,
    buffers: BufferPool,
}

impl ServerState {
    /// Register a device after a successful initial exchange.
    fn register(&self, device: Device) {
        if !self.devices.contains_key(&device.serial) {
            info!(sn = %device.serial, "registering device");
            self.devices.insert(device.serial.clone(), device);
        }
    }

    /// Queue commands for a registered device, assigning identifiers and
    /// capturing callbacks. Returns the assigned identifiers.
    fn enqueue(&self, serial: &str, commands: Vec<Command>) -> Result<Vec<String>> {
        if !self.devices.contains_key(serial) {
            return Err(Error::DeviceNotRegistered(serial.to_string()));
        }

        let mut ids = Vec::with_capacity(commands.len());
        let mut accepted = Vec::with_capacity(commands.len());

        for mut command in commands {
            command.id = Uuid::new_v4().to_string();
            if let Some(callback) = command.callback.take() {
                self.callbacks.insert(command.id.clone(), callback);
            }
            ids.push(command.id.clone());
            accepted.push(command);
        }

        self.queues
            .entry(serial.to_string())
            .or_default()
            .extend(accepted);

        Ok(ids)
    }

    /// Atomically hand over and empty a device's queue.
    fn flush_queue(&self, serial: &str) -> Vec<Command> {
        self.queues
            .remove(serial)
            .map(|(_, commands)| commands)
            .unwrap_or_default()
    }

    /// Route a correlated response to its registered callback.
    fn complete(&self, response: CommandResponse) -> Result<()> {
        let (_, callback) = self
            .callbacks
            .remove(&response.id)
            .ok_or_else(|| Error::CallbackNotFound(response.id.clone()))?;

        (callback.0)(response);
        Ok(())
    }

    fn clear(&self) {
        self.devices.clear();
        self.queues.clear();
        self.callbacks.clear();
    }
}

/// HTTP(S) server implementing the push protocol.
///
/// Devices reach it outbound: an initial exchange on `/iclock/cdata`
/// registers the device, command polls on `/iclock/getrequest` drain its
/// queue, and `/iclock/devicecmd` posts correlated responses back.
#[derive(Clone)]
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    /// Server that blocks every device; see [`Self::with_hook`].
    pub fn new(options: ServerOptions) -> Self {
        Self::with_hook(options, NoopHook)
    }

    /// Server driven by the given hook.
    pub fn with_hook(options: ServerOptions, hook: impl ServerHook) -> Self {
        let pool_size = options.pool_size.max(1);

        Self {
            state: Arc::new(ServerState {
                options,
                hook: Box::new(hook),
                devices: DashMap::new(),
                queues: DashMap::new(),
                callbacks: DashMap::new(),
                buffers: BufferPool::with_size(pool_size),
            }),
        }
    }

    /// Registered device by serial number.
    pub fn device(&self, serial: &str) -> Option<Device> {
        self.state.devices.get(serial).map(|d| d.clone())
    }

    /// Queue commands for delivery on the device's next poll.
    ///
    /// Each command receives a fresh identifier; callbacks are held until
    /// the correlated response arrives or the server shuts down.
    pub fn do_background(&self, serial: &str, commands: Vec<Command>) -> Result<Vec<String>> {
        self.state.enqueue(serial, commands)
    }

    /// Queue one command and wait for its correlated response.
    pub async fn do_sync(&self, serial: &str, mut command: Command) -> Result<CommandResponse> {
        let (tx, rx) = oneshot::channel();
        let previous = command.callback.take();

        command.callback = Some(CallbackSlot(Box::new(move |response: CommandResponse| {
            if let Some(previous) = previous {
                (previous.0)(response.clone());
            }
            let _ = tx.send(response);
        })));

        self.state.enqueue(serial, vec![command])?;

        rx.await.map_err(|_| Error::ServerClosed)
    }

    /// Build the route stack: hook middleware inside, request tracing and
    /// the panic trap outermost.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/iclock/cdata", get(handle_exchange))
            .route("/iclock/getrequest", get(handle_poll))
            .route("/iclock/devicecmd", post(handle_command_response))
            .fallback(handle_catch_all)
            .with_state(self.state.clone());

        self.state
            .hook
            .wrap(router)
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
    }

    /// Bind and serve until `shutdown` resolves; registries and pending
    /// callbacks are cleared on the way out.
    pub async fn serve(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let app = self.router();
        let options = &self.state.options;

        let listener = TcpListener::bind(&options.address).await?;

        let tls = match (&options.cert_file, &options.key_file) {
            (Some(cert), Some(key)) => Some(load_tls(cert, key)?),
            _ => None,
        };

        match tls {
            Some(acceptor) => {
                info!(name = %options.name, address = %options.address, "push service listening (https)");
                serve_tls(listener, acceptor, app, shutdown).await?;
            }
            None => {
                info!(address = %options.address, "push service listening (http)");
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
        }

        info!("push service stopped");
        self.state.clear();

        Ok(())
    }
}

async fn handle_exchange(
    State(state): State<Arc<ServerState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();

    let device = match Device::decode(query.as_bytes()) {
        Ok(device) => device,
        Err(e) => {
            debug!("rejecting malformed exchange: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let Some(command) = state.hook.on_initial_exchange(&device) else {
        info!(sn = %device.serial, "device blocked on initial exchange");
        return StatusCode::FORBIDDEN.into_response();
    };

    state.register(device);

    let mut buf = state.buffers.acquire().await;
    command.encode_into(&mut buf);

    (StatusCode::OK, buf.to_vec()).into_response()
}

async fn handle_poll(State(state): State<Arc<ServerState>>, RawQuery(query): RawQuery) -> Response {
    let query = query.unwrap_or_default();
    let query = query.as_bytes();

    let serial = extract_str(query, "SN", "");
    if serial.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    // info polls only refresh the registry
    if let Some(report) = extract_value(query, "INFO") {
        if let Some(mut device) = state.devices.get_mut(&serial) {
            device.options = String::from_utf8_lossy(report).into_owned();
        }
        return "OK".into_response();
    }

    let commands = state.flush_queue(&serial);
    if commands.is_empty() {
        return "OK".into_response();
    }

    debug!(sn = %serial, count = commands.len(), "delivering queued commands");

    let mut buf = state.buffers.acquire().await;
    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            buf.push(b'\n');
        }
        command.encode_into(&mut buf);
    }

    (StatusCode::OK, buf.to_vec()).into_response()
}

async fn handle_command_response(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let response = match CommandResponse::decode(&body) {
        Ok(response) => response,
        Err(e) => {
            debug!("rejecting malformed command response: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let id = response.id.clone();
    if let Err(e) = state.complete(response) {
        warn!(id = %id, "dropping command response: {e}");
    }

    "OK".into_response()
}

async fn handle_catch_all(uri: Uri) -> Response {
    debug!(path = %uri.path(), "unhandled request");

    // devices treat any /iclock endpoint as best-effort
    if uri.path().starts_with("/iclock") {
        "OK".into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn load_tls(cert: &Path, key: &Path) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert)?))
        .collect::<std::io::Result<Vec<_>>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key)?))?
        .ok_or_else(|| Error::Tls(format!("no private key in {}", key.display())))?;

    let config = TlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let app = app.clone();

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls_stream) => tls_stream,
                        Err(e) => {
                            debug!(%peer, "TLS handshake failed: {e}");
                            return;
                        }
                    };

                    let service = TowerToHyperService::new(
                        app.map_request(|request: axum::http::Request<_>| {
                            request.map(axum::body::Body::new)
                        }),
                    );

                    if let Err(e) = ConnectionBuilder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                        .await
                    {
                        debug!(%peer, "connection closed with error: {e}");
                    }
                });
            }
        }
    }

    Ok(())
}
