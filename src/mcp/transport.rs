//! Line-level guard in front of the MCP service.
//!
//! Every newline-delimited message from the client is screened before the
//! service sees it. Lines that are not UTF-8 JSON, and requests whose `id`
//! is `null`, are answered here with a JSON-RPC error so one bad line never
//! ends the session.

use rmcp::ServiceExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::server::PullRequestReviewServer;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;

const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("stdio failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP service failed: {0}")]
    Service(String),
}

#[derive(Debug, PartialEq)]
enum Screened {
    Skip,
    Forward,
    Reject(Value),
}

fn error_reply(code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": code, "message": message }
    })
}

fn screen(line: &[u8]) -> Screened {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!(error = %e, "message is not valid UTF-8");
            return Screened::Reject(error_reply(PARSE_ERROR, format!("Parse error: {}", e)));
        }
    };
    if text.is_empty() {
        return Screened::Skip;
    }

    let raw: Value = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "unparseable message");
            return Screened::Reject(error_reply(PARSE_ERROR, format!("Parse error: {}", e)));
        }
    };

    let Some(message) = raw.as_object() else {
        return Screened::Reject(error_reply(
            INVALID_REQUEST,
            "Invalid request: expected a JSON object".to_string(),
        ));
    };
    // A present-but-null id is neither a request nor a notification.
    if message.get("id") == Some(&Value::Null) {
        return Screened::Reject(error_reply(
            INVALID_REQUEST,
            "Invalid request: id must not be null".to_string(),
        ));
    }

    Screened::Forward
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

/// Serve on stdin/stdout until the client closes stdin.
pub async fn serve_stdio(server: PullRequestReviewServer) -> Result<(), ServeError> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run `server` over newline-delimited JSON-RPC on `input`/`output`.
///
/// The service talks to an in-process pipe. Screened lines are copied
/// into it, and its replies are relayed to `output` together with the
/// replies produced by the guard itself.
pub async fn serve<R, W>(server: PullRequestReviewServer, input: R, mut output: W) -> Result<(), ServeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (client_side, service_side) = tokio::io::duplex(PIPE_CAPACITY);
    let service = tokio::spawn(async move {
        let running = server
            .serve(tokio::io::split(service_side))
            .await
            .map_err(|e| ServeError::Service(e.to_string()))?;
        running
            .waiting()
            .await
            .map_err(|e| ServeError::Service(e.to_string()))?;
        debug!("MCP service stopped");
        Ok::<(), ServeError>(())
    });

    let (from_service, mut to_service) = tokio::io::split(client_side);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

    let pump = async move {
        let mut input = BufReader::new(input);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            match screen(&buf) {
                Screened::Skip => {}
                Screened::Forward => {
                    to_service.write_all(&buf).await?;
                    if !buf.ends_with(b"\n") {
                        to_service.write_all(b"\n").await?;
                    }
                    to_service.flush().await?;
                }
                Screened::Reject(reply) => {
                    // The relay only stops once the service is gone.
                    let _ = reply_tx.send(reply.to_string());
                }
            }
        }
        info!("client closed connection");
        to_service.shutdown().await?;
        Ok::<(), std::io::Error>(())
    };

    let relay = async {
        let mut service_lines = BufReader::new(from_service).lines();
        let mut replies_open = true;
        loop {
            tokio::select! {
                reply = reply_rx.recv(), if replies_open => match reply {
                    Some(reply) => write_line(&mut output, &reply).await?,
                    None => replies_open = false,
                },
                line = service_lines.next_line() => match line? {
                    Some(line) => write_line(&mut output, &line).await?,
                    None => break,
                },
            }
        }
        while let Ok(reply) = reply_rx.try_recv() {
            write_line(&mut output, &reply).await?;
        }
        Ok::<(), std::io::Error>(())
    };

    tokio::pin!(pump);
    tokio::pin!(relay);
    let mut pump_done = false;
    loop {
        tokio::select! {
            pumped = &mut pump, if !pump_done => {
                pumped?;
                pump_done = true;
            }
            relayed = &mut relay => {
                relayed?;
                break;
            }
        }
    }

    service
        .await
        .map_err(|e| ServeError::Service(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::FakeFetcher;
    use std::sync::Arc;
    use tokio::io::{DuplexStream, Lines};

    const PR_URL: &str = "https://api.github.test/repos/octocat/hello-world/pulls/42";

    fn pr_json() -> Value {
        json!({
            "title": "Fix typo",
            "number": 42,
            "user": { "login": "octocat" },
            "html_url": "https://github.com/octocat/hello-world/pull/42",
            "state": "open",
            "body": "Fixes a typo in the README",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "additions": 1,
            "deletions": 1,
            "changed_files": 1
        })
    }

    fn reply_code(screened: Screened) -> i64 {
        match screened {
            Screened::Reject(reply) => {
                assert_eq!(reply["id"], Value::Null);
                reply["error"]["code"].as_i64().unwrap()
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        assert_eq!(reply_code(screen(b"\xff\xfe{\"jsonrpc\":\"2.0\"}\n")), PARSE_ERROR);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert_eq!(reply_code(screen(b"{not json\n")), PARSE_ERROR);
    }

    #[test]
    fn test_null_id_is_invalid_request() {
        let line = br#"{"jsonrpc":"2.0","id":null,"method":"tools/list"}"#;
        assert_eq!(reply_code(screen(line)), INVALID_REQUEST);
    }

    #[test]
    fn test_non_object_is_invalid_request() {
        assert_eq!(reply_code(screen(b"[1, 2]\n")), INVALID_REQUEST);
    }

    #[test]
    fn test_notification_and_request_are_forwarded() {
        let notification = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let request = br#"{"jsonrpc":"2.0","id":0,"method":"ping"}"#;
        assert_eq!(screen(notification), Screened::Forward);
        assert_eq!(screen(request), Screened::Forward);
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert_eq!(screen(b"  \r\n"), Screened::Skip);
    }

    struct Client {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
        seen: Vec<Value>,
    }

    impl Client {
        async fn send(&mut self, line: &[u8]) {
            self.input.write_all(line).await.unwrap();
            self.input.write_all(b"\n").await.unwrap();
            self.input.flush().await.unwrap();
        }

        async fn send_json(&mut self, message: Value) {
            self.send(message.to_string().as_bytes()).await;
        }

        /// Read replies until one matches, keeping the others.
        async fn reply_where(&mut self, matches: impl Fn(&Value) -> bool) -> Value {
            if let Some(pos) = self.seen.iter().position(&matches) {
                return self.seen.remove(pos);
            }
            loop {
                let line = self.output.next_line().await.unwrap().expect("server closed output");
                let reply: Value = serde_json::from_str(&line).unwrap();
                if matches(&reply) {
                    return reply;
                }
                self.seen.push(reply);
            }
        }

        async fn reply_to(&mut self, id: i64) -> Value {
            self.reply_where(|reply| reply["id"] == json!(id)).await
        }
    }

    fn start(fetcher: FakeFetcher) -> (Client, tokio::task::JoinHandle<Result<(), ServeError>>) {
        let (client_in, server_in) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_out, client_out) = tokio::io::duplex(PIPE_CAPACITY);
        let server = PullRequestReviewServer::new(Arc::new(fetcher));
        let handle = tokio::spawn(serve(server, server_in, server_out));
        let client = Client {
            input: client_in,
            output: BufReader::new(client_out).lines(),
            seen: Vec::new(),
        };
        (client, handle)
    }

    async fn initialize(client: &mut Client) -> Value {
        client
            .send_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "test-client", "version": "0.1.0" }
                }
            }))
            .await;
        let reply = client.reply_to(1).await;
        client
            .send_json(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        reply
    }

    #[tokio::test]
    async fn test_initialize_and_list_tools() {
        let (mut client, handle) = start(FakeFetcher::new());

        let init = initialize(&mut client).await;
        assert_eq!(init["result"]["serverInfo"]["name"], "github-pullrequest-review");
        assert!(init["result"]["capabilities"]["tools"].is_object());

        client
            .send_json(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await;
        let list = client.reply_to(2).await;
        let mut names: Vec<&str> = list["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["get-pull-request", "get-pull-request-files"]);
        for tool in list["result"]["tools"].as_array().unwrap() {
            assert_eq!(tool["inputSchema"]["type"], "object");
        }

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_lines_do_not_end_session() {
        let (mut client, handle) = start(FakeFetcher::new().with(PR_URL, Ok(pr_json())));
        initialize(&mut client).await;

        client.send(b"\xff\xfe\xfd").await;
        let parse_error = client
            .reply_where(|reply| reply["error"]["code"] == json!(PARSE_ERROR))
            .await;
        assert_eq!(parse_error["id"], Value::Null);

        client.send(br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).await;
        let invalid = client
            .reply_where(|reply| reply["error"]["code"] == json!(INVALID_REQUEST))
            .await;
        assert_eq!(invalid["id"], Value::Null);

        client
            .send_json(json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" }))
            .await;
        let ping = client.reply_to(3).await;
        assert!(ping["result"].is_object());

        client
            .send_json(json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {
                    "name": "get-pull-request",
                    "arguments": { "owner": "octocat", "repo": "hello-world", "pr_number": 42 }
                }
            }))
            .await;
        let call = client.reply_to(4).await;
        let text = call["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Fix typo (#42)"));
        assert!(text.contains("Fixes a typo in the README"));
        assert_ne!(call["result"]["isError"], json!(true));

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_rejected() {
        let (mut client, handle) = start(FakeFetcher::new());
        initialize(&mut client).await;

        client
            .send_json(json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": {
                    "name": "get-pull-request-files",
                    "arguments": { "owner": "octocat", "repo": "hello-world", "pr_number": "42" }
                }
            }))
            .await;
        let reply = client.reply_to(5).await;
        assert!(reply["error"]["code"].is_i64());

        client
            .send_json(json!({ "jsonrpc": "2.0", "id": 6, "method": "ping" }))
            .await;
        assert!(client.reply_to(6).await["result"].is_object());

        drop(client);
        handle.await.unwrap().unwrap();
    }
}
