//! Minimal HTTP server for testing HTTP clients. Requests are answered only when they were
//! anticipated by the test, and the test decides when and how to respond.

use http_body_util::Full;
use hyper::{Request, Response, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, sync::oneshot};

pub use bytes::Bytes;
pub use hyper;
pub use hyper::StatusCode;

/// Method, URI and headers of a request received by the [`Server`].
pub type ReceivedRequest = Request<()>;

struct Pending {
    request_tx: oneshot::Sender<ReceivedRequest>,
    response_rx: oneshot::Receiver<Response<Full<Bytes>>>,
}

#[derive(Default)]
struct State {
    /// Requests anticipated with [`Server::anticipate`], keyed by path. Several anticipations of
    /// the same path are served in order.
    anticipated: HashMap<String, VecDeque<Pending>>,

    unexpected: Vec<String>,
}

pub struct Server {
    port: u16,
    state: Arc<Mutex<State>>,
}

impl Server {
    /// Create new [`Server`], and bind it to a random port.
    pub async fn bind() -> Server {
        let state = Arc::new(Mutex::new(State::default()));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);

                let state = state_clone.clone();
                tokio::task::spawn(async move {
                    let service = service_fn(move |request| handle(state.clone(), request));
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        log::debug!("Connection closed: {e}.");
                    }
                });
            }
        });

        Server { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL of this server, without the trailing slash.
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Anticipate a request for the given path. Query string is not taken into account when
    /// matching, use [`AnticipatedRequest::expect`] to inspect it.
    pub async fn anticipate(&self, path: impl Into<String>) -> AnticipatedRequest {
        let path = path.into();
        log::info!("Anticipating '{path}'.");
        let (request_tx, request_rx) = oneshot::channel();
        let (response_tx, response_rx) = oneshot::channel();
        self.state
            .lock()
            .unwrap()
            .anticipated
            .entry(path)
            .or_default()
            .push_back(Pending {
                request_tx,
                response_rx,
            });
        AnticipatedRequest {
            request_rx: Some(request_rx),
            response_tx,
        }
    }

    /// Requests which came, but were not anticipated.
    pub fn unexpected(&self) -> Vec<String> {
        self.state.lock().unwrap().unexpected.clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let unexpected = &self.state.lock().unwrap().unexpected;
        if !unexpected.is_empty() {
            panic!("there are unexpected requests: {unexpected:?}");
        }
    }
}

pub struct AnticipatedRequest {
    request_rx: Option<oneshot::Receiver<ReceivedRequest>>,
    response_tx: oneshot::Sender<Response<Full<Bytes>>>,
}

impl AnticipatedRequest {
    /// Wait until the request comes.
    pub async fn expect(&mut self) -> ReceivedRequest {
        let request_rx = self
            .request_rx
            .take()
            .expect("request was already expected");
        request_rx.await.unwrap()
    }

    pub async fn respond(self, payload: impl Into<Bytes>) {
        log::info!("Responding.");
        let _ = self.response_tx.send(Response::new(Full::new(payload.into())));
    }

    pub async fn respond_with_status(self, status: StatusCode) {
        log::info!("Responding with {status}.");
        let response = Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let _ = self.response_tx.send(response);
    }
}

async fn handle(
    state: Arc<Mutex<State>>,
    request: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    log::info!("Incoming request '{}'.", request.uri());

    let pending = state
        .lock()
        .unwrap()
        .anticipated
        .get_mut(request.uri().path())
        .and_then(VecDeque::pop_front);

    let Some(pending) = pending else {
        log::warn!("Unexpected '{}'.", request.uri());
        state
            .lock()
            .unwrap()
            .unexpected
            .push(request.uri().to_string());
        return Ok(Response::builder()
            .status(418)
            .body(Full::new(Bytes::from_static(b"unexpected")))
            .unwrap());
    };

    let mut received = Request::builder()
        .method(request.method().clone())
        .uri(request.uri().clone())
        .body(())
        .unwrap();
    *received.headers_mut() = request.headers().clone();

    // Test might not be interested in the request itself.
    let _ = pending.request_tx.send(received);

    match pending.response_rx.await {
        Ok(response) => Ok(response),
        Err(_) => Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}
