//! IPC client implementation

use clockwork_api::{Command, Event, Request, Response, ResponsePayload, ResponseResult};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::{IpcError, IpcResult};

/// Request/response client for clockworkd
pub struct IpcClient {
    lines: LineReader,
    writer: OwnedWriteHalf,
    next_request_id: u64,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let (read_half, writer) = UnixStream::connect(socket_path).await?.into_split();

        Ok(Self {
            lines: LineReader::new(read_half),
            writer,
            next_request_id: 1,
        })
    }

    /// Send a command and wait for the response carrying its request id.
    ///
    /// Responses to other ids (and malformed-line rejections with id 0) are
    /// skipped.
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut json = serde_json::to_string(&Request::new(request_id, command))?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;

        loop {
            let line = self.lines.next_line().await?;
            let response: Response = serde_json::from_str(&line)?;
            if response.request_id == request_id {
                return Ok(response);
            }
            debug!(expected = request_id, got = response.request_id, "Skipping unrelated response");
        }
    }

    /// Like [`send`](Self::send), with error responses turned into
    /// [`IpcError::Rejected`]
    pub async fn call(&mut self, command: Command) -> IpcResult<ResponsePayload> {
        match self.send(command).await?.result {
            ResponseResult::Ok(payload) => Ok(payload),
            ResponseResult::Err(e) => Err(IpcError::Rejected {
                code: e.code,
                message: e.message,
            }),
        }
    }

    /// Turn this connection into an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        if let ResponseResult::Err(e) = self.send(Command::SubscribeEvents).await?.result {
            return Err(IpcError::ServerError(e.message));
        }

        Ok(EventStream {
            lines: self.lines,
            _writer: self.writer,
        })
    }
}

/// Events pushed by clockworkd to a subscribed connection
pub struct EventStream {
    lines: LineReader,
    // Dropping the write half would shut down our side of the socket
    _writer: OwnedWriteHalf,
}

impl EventStream {
    pub async fn next(&mut self) -> IpcResult<Event> {
        let line = self.lines.next_line().await?;
        Ok(serde_json::from_str(&line)?)
    }
}

struct LineReader {
    reader: BufReader<OwnedReadHalf>,
    buf: String,
}

impl LineReader {
    fn new(read_half: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(read_half),
            buf: String::new(),
        }
    }

    /// Next non-blank line, trimmed
    async fn next_line(&mut self) -> IpcResult<String> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf).await? == 0 {
                return Err(IpcError::ConnectionClosed);
            }
            let line = self.buf.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }
}
