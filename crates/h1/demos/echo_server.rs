//! Streams every request body straight back to the client.
//!
//! ```text
//! cargo run --example echo_server
//! curl -v -H 'Transfer-Encoding: chunked' --data-binary @Cargo.toml http://127.0.0.1:8080/echo
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response, StatusCode};
use micro_h1::config::ConnectionConfig;
use micro_h1::connection::HttpConnection;
use micro_h1::handler::Handler;
use micro_h1::protocol::BoxError;
use micro_h1::protocol::body::Body;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    type Error = BoxError;

    async fn call(&self, request: Request<Body>) -> Result<Response<Body>, Self::Error> {
        info!(method = %request.method(), path = request.uri().path(), "receive request");

        let body = match request.into_body() {
            Body::Stream(mut inbound) => {
                let (sender, body) = Body::channel();
                tokio::spawn(async move {
                    while let Some(item) = inbound.next_item().await {
                        if sender.push(item).is_err() {
                            break;
                        }
                    }
                });
                body
            }
            buffered => buffered,
        };

        Ok(Response::builder().status(StatusCode::OK).body(body)?)
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return;
    }

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let handler = Arc::new(EchoHandler);
    let config = ConnectionConfig::default();

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        let config = config.clone();

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::with_config(reader, writer, config);
            // failures were already reported by the connection's error sink
            if connection.process(handler).await.is_ok() {
                info!(%remote_addr, "finished process, connection shutdown");
            }
        });
    }
}
