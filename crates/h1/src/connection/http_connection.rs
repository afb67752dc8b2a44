use std::sync::Arc;

use futures::StreamExt;
use http::header::CONNECTION;
use http::{HeaderValue, Method, Response, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::FramedRead;
use tracing::{error, info, trace, warn};

use crate::codec::RequestDecoder;
use crate::config::ConnectionConfig;
use crate::connection::serializer::ResponseSerializer;
use crate::connection::state::{Dispatch, RequestAssembler};
use crate::handler::Handler;
use crate::protocol::body::Body;
use crate::protocol::{BodyError, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, SendError};
use crate::sink::{ErrorSink, LogErrorSink};

type InboundMessage = Message<(RequestHeader, PayloadSize)>;
type InboundEvent = Option<Result<InboundMessage, ParseError>>;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";
const CLOSE: HeaderValue = HeaderValue::from_static("close");

/// An HTTP connection that feeds inbound events to the request state machine,
/// calls the responder and writes its response back
///
/// `HttpConnection` handles the full lifecycle of an HTTP connection, including:
/// - Reading and decoding requests
/// - Buffering or streaming request bodies
/// - Handling expect-continue mechanism
/// - Serializing responses back to clients
/// - Reporting failures to the error sink and closing the connection
///
/// One request is in flight at a time. A transfer-chunked request body keeps
/// flowing into the responder's stream while the responder runs.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
///
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    serializer: ResponseSerializer<W>,
    assembler: RequestAssembler,
    config: ConnectionConfig,
    sink: Arc<dyn ErrorSink>,
    keep_alive: bool,
}

enum Progress<T> {
    Responded(T),
    Inbound(InboundEvent),
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig) -> Self {
        let sink: Arc<dyn ErrorSink> = Arc::new(LogErrorSink);
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), config.read_buffer_capacity),
            serializer: ResponseSerializer::new(writer, Arc::clone(&sink)),
            assembler: RequestAssembler::new(config.max_body_size),
            keep_alive: config.keep_alive,
            config,
            sink,
        }
    }

    /// Replaces the default [`LogErrorSink`].
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.serializer.set_error_sink(Arc::clone(&sink));
        self.sink = sink;
        self
    }

    /// Serves requests until the peer closes the connection, keep-alive ends,
    /// or a failure occurs.
    ///
    /// # Errors
    ///
    /// Returns the failure that closed the connection. It has already been
    /// reported to the error sink.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            let Some(dispatch) = self.read_request().await? else {
                info!("cant read more request, break this connection down");
                return Ok(());
            };

            let (request, original_method) = dispatch.into_parts();
            let version = request.version();
            let response = self.respond(handler.as_ref(), request).await?;

            self.drain_request().await?;
            self.send_response(response, &original_method, version).await?;

            if !self.keep_alive {
                info!("keep-alive not allowed, connection shutdown");
                return Ok(());
            }
        }
    }

    /// Reads inbound events until the state machine dispatches a request.
    ///
    /// Returns `None` when the peer closed the connection between requests.
    async fn read_request(&mut self) -> Result<Option<Dispatch>, HttpError> {
        loop {
            let message = match self.framed_read.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) if self.assembler.is_ready() => {
                    error!(cause = %e, "can't receive next request");
                    let error = self.fail(e.into());
                    self.send_bad_request().await;
                    return Err(error);
                }
                event @ (Some(Err(_)) | None) if !self.assembler.is_ready() => {
                    self.on_inbound(event)?;
                    continue;
                }
                _ => return Ok(None),
            };

            let continue_for = match &message {
                Message::Header((header, payload_size)) if header.expects_continue() => Some(*payload_size),
                _ => None,
            };

            if let Some(dispatch) = self.on_message(message).map_err(|e| self.fail(e))? {
                return Ok(Some(dispatch));
            }

            if let Some(payload_size) = continue_for {
                self.check_declared_length(payload_size)?;
                self.send_continue().await?;
            }
        }
    }

    /// Awaits the responder while still feeding inbound events to a streamed request body.
    async fn respond<H: Handler>(&mut self, handler: &H, request: http::Request<Body>) -> Result<Response<Body>, HttpError> {
        let mut call = handler.call(request);

        loop {
            let progress = select! {
                biased;
                response = &mut call => Progress::Responded(response),
                event = self.framed_read.next(), if !self.assembler.is_ready() => Progress::Inbound(event),
            };

            match progress {
                Progress::Responded(Ok(response)) => return Ok(response),
                Progress::Responded(Err(e)) => return Err(self.fail(HttpError::handler(e))),
                Progress::Inbound(event) => self.on_inbound(event)?,
            }
        }
    }

    /// Drives the rest of a streamed request body the responder did not read,
    /// so the next request starts at a message boundary.
    async fn drain_request(&mut self) -> Result<(), HttpError> {
        if !self.assembler.is_ready() {
            trace!("skip unread request body");
        }

        while !self.assembler.is_ready() {
            let event = self.framed_read.next().await;
            self.on_inbound(event)?;
        }
        Ok(())
    }

    /// Refuses a body whose declared length is already over the limit, before
    /// the client is invited to send it.
    fn check_declared_length(&self, payload_size: PayloadSize) -> Result<(), HttpError> {
        let max_body_size = self.config.max_body_size;
        if let PayloadSize::Length(length) = payload_size {
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            if length > max_body_size {
                warn!(length, max_body_size, "declared body too large, refuse to continue");
                return Err(self.fail(ParseError::too_large_body(length, max_body_size).into()));
            }
        }
        Ok(())
    }

    fn on_message(&mut self, message: InboundMessage) -> Result<Option<Dispatch>, HttpError> {
        match message {
            Message::Header((header, _payload_size)) => {
                let keep_alive = self.config.keep_alive && header.keep_alive();
                self.assembler.on_head(header)?;
                self.keep_alive = keep_alive;
                Ok(None)
            }
            Message::Payload(PayloadItem::Chunk(bytes)) => self.assembler.on_body_fragment(bytes),
            Message::Payload(PayloadItem::Eof) => self.assembler.on_end(),
        }
    }

    /// Handles an inbound event while a request body is in progress.
    fn on_inbound(&mut self, event: InboundEvent) -> Result<(), HttpError> {
        match event {
            Some(Ok(message)) => match self.on_message(message) {
                Ok(None) => Ok(()),
                Ok(Some(_)) => Err(self.fail(HttpError::protocol_violation("request completed while another is in flight"))),
                Err(e) => Err(self.fail(e)),
            },
            Some(Err(e)) => {
                self.assembler.abort(BodyError::from(&e));
                Err(self.fail(e.into()))
            }
            None => {
                self.assembler.abort(BodyError::aborted("connection closed by peer"));
                Err(self.fail(ParseError::invalid_body("connection closed before end of request body").into()))
            }
        }
    }

    async fn send_response(&mut self, response: Response<Body>, original_method: &Method, version: Version) -> Result<(), HttpError> {
        let (mut head, body) = response.into_parts();
        if version == Version::HTTP_10 && body.is_stream() {
            // HTTP/1.0 peers cannot read chunked framing, the body ends with the connection
            head.version = Version::HTTP_10;
            self.keep_alive = false;
        }
        if !self.keep_alive {
            head.headers.insert(CONNECTION, CLOSE);
        }

        let head = Response::from_parts(head, ());
        self.serializer.serialize(head, body, original_method).await.map_err(|e| self.fail(e.into()))
    }

    async fn send_continue(&mut self) -> Result<(), HttpError> {
        let writer = self.serializer.get_mut();
        let result = async {
            writer.write_all(CONTINUE).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                info!("receive expect request header, sent continue response");
                Ok(())
            }
            Err(e) => Err(self.fail(SendError::io(e).into())),
        }
    }

    /// Answers a request head that could not be parsed; the connection closes afterwards.
    async fn send_bad_request(&mut self) {
        let mut head = Response::new(());
        *head.status_mut() = StatusCode::BAD_REQUEST;
        head.headers_mut().insert(CONNECTION, CLOSE);

        if let Err(e) = self.serializer.serialize(head, Body::empty(), &Method::GET).await {
            error!(cause = %e, "can't send bad request response");
        }
    }

    fn fail(&self, error: HttpError) -> HttpError {
        self.sink.report(&error);
        error
    }
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("assembler", &self.assembler)
            .field("config", &self.config)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}
