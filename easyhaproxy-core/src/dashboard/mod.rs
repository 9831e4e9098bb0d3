//! Loopback HTTP server for the static dashboard page.


use crate::logging::EASYHAPROXY;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use once_cell::sync::OnceCell;
use rust_embed::RustEmbed;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;

const ASSET_NAME: &str = "dashboard.html";
const PATHS: [&str; 3] = ["/", "/index.html", "/dashboard.html"];

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

static ASSET: OnceCell<Bytes> = OnceCell::new();

/// The page to serve: `path` when readable, otherwise the built-in one.
pub fn load_asset(path: &Path) -> Bytes {
    match fs::read(path) {
        Ok(content) => Bytes::from(content),
        Err(_) => Assets::get(ASSET_NAME)
            .map(|file| Bytes::from(file.data.into_owned()))
            .unwrap_or_default(),
    }
}

/// [`load_asset`], read once per process.
pub fn cached_asset(path: &Path) -> Bytes {
    ASSET.get_or_init(|| load_asset(path)).clone()
}

pub struct DashboardServer {
    listener: TcpListener,
    asset: Bytes,
}

impl DashboardServer {
    /// Binds `127.0.0.1:<port>`; port 0 picks a free one.
    pub async fn bind(port: u16, asset: Bytes) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        Ok(Self { listener, asset })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; runs for the lifetime of the process.
    pub async fn serve(self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(target: EASYHAPROXY, %addr, "dashboard server listening");
        }

        loop {
            let Ok((stream, _)) = self.listener.accept().await else {
                continue;
            };

            let asset = self.asset.clone();
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let response = respond(req.method(), req.uri().path(), &asset);
                async move { Ok::<_, Infallible>(response) }
            });

            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    }
}

/// Routes one request. HEAD bodies are dropped by hyper.
pub fn respond(method: &Method, path: &str, asset: &Bytes) -> Response<Full<Bytes>> {
    if !PATHS.contains(&path) {
        return empty(StatusCode::NOT_FOUND);
    }

    if method != Method::GET && method != Method::HEAD {
        return empty(StatusCode::METHOD_NOT_ALLOWED);
    }

    let mut response = Response::new(Full::new(asset.clone()));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, http::HeaderValue::from_static("text/html; charset=utf-8"));
    headers.insert(CONTENT_LENGTH, http::HeaderValue::from(asset.len()));
    response
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
