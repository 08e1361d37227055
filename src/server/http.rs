//! HTTP server implementation
//!
//! hyper http1 connections over TokioIo, one task per connection.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::routes::{self, FullBody};
use crate::services::Context;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub ctx: Context,
}

impl AppState {
    pub fn new(args: Args, ctx: Context) -> Self {
        Self { args, ctx }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    serve(listener, state).await
}

/// Accept connections on an already bound listener until the process ends.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    info!(
        "OpenCafe listening on {} as node {} ({} backend)",
        listener.local_addr()?,
        state.args.node_id,
        state.ctx.stores.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure master key fallback is active");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<FullBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = routes::route(&state, req).await;

    if response.status().is_server_error() {
        warn!("[{}] {} {} -> {}", addr, method, path, response.status());
    } else {
        debug!("[{}] {} {} -> {}", addr, method, path, response.status());
    }
    Ok(response)
}
