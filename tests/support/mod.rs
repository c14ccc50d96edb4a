#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use busgate::Server;
use busgate::bus::MockBus;
use busgate::config::CredentialsConfig;
use busgate::frontend::SessionRegistry;
use busgate::gateway::ProcessCache;
use busgate::wamp::cra::auth_signature;
use busgate::wamp::uri;

pub const KEY: &str = "cloudeebus";
pub const SECRET: &str = "secret";

const WAIT: Duration = Duration::from_secs(3);

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

pub struct TestGateway {
    pub addr: SocketAddr,
    pub bus: MockBus,
    pub cache: Arc<ProcessCache>,
    pub sessions: Arc<SessionRegistry>,
}

/// In-process gateway on an ephemeral port, backed by the mock bus and the
/// built-in credential table.
pub async fn start_gateway() -> TestGateway {
    let bus = MockBus::new();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

    let server = Server::bind(addr, bus.connector(), CredentialsConfig::builtin())
        .expect("bind gateway");

    let gateway = TestGateway {
        addr: server.local_addr().unwrap(),
        bus,
        cache: server.process_cache(),
        sessions: server.sessions(),
    };

    tokio::spawn(server.run());
    gateway
}

impl TestGateway {
    pub async fn client(&self) -> Client {
        Client::connect(self.addr).await
    }

    pub async fn authenticated_client(&self) -> Client {
        let mut client = self.client().await;
        let reply = client.authenticate(KEY, SECRET, &[]).await;
        assert_eq!(reply[0], 3, "authentication failed: {reply}");
        client
    }

    pub async fn wait_for_sessions(&self, expected: usize) {
        let sessions = self.sessions.clone();
        wait_until(|| {
            let sessions = sessions.clone();
            async move { sessions.active().await == expected }
        })
        .await;
    }
}

// -----------------------------------------------------------------------------
// ----- Client ----------------------------------------------------------------

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    backlog: VecDeque<Value>,
    next_call: u64,
    pub session_id: String,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}"))
            .await
            .expect("websocket connect");

        let mut client = Client {
            ws,
            backlog: VecDeque::new(),
            next_call: 0,
            session_id: String::new(),
        };

        let welcome = client.recv().await.expect("welcome");
        assert_eq!(welcome[0], 0, "expected WELCOME, got {welcome}");
        assert_eq!(welcome[2], 1);
        client.session_id = welcome[1].as_str().unwrap().to_string();
        client
    }

    pub async fn send_frame(&mut self, frame: Value) {
        self.ws
            .send(Message::text(frame.to_string()))
            .await
            .expect("send frame");
    }

    /// Next server frame, or `None` once the server closed the socket.
    pub async fn recv(&mut self) -> Option<Value> {
        if let Some(frame) = self.backlog.pop_front() {
            return Some(frame);
        }
        self.recv_wire().await
    }

    /// Issues a CALL and returns its CALLRESULT or CALLERROR frame. Other
    /// frames received meanwhile are kept for [`Client::recv`].
    pub async fn call(&mut self, procedure: &str, args: Vec<Value>) -> Value {
        self.next_call += 1;
        let call_id = format!("c{}", self.next_call);

        let mut frame = vec![json!(2), json!(call_id), json!(procedure)];
        frame.extend(args);
        self.send_frame(Value::Array(frame)).await;

        loop {
            let reply = self.recv_wire().await.expect("connection closed before reply");
            let is_reply = reply[0] == 3 || reply[0] == 4;
            if is_reply && reply[1] == call_id {
                return reply;
            }
            self.backlog.push_back(reply);
        }
    }

    pub async fn register(&mut self, fields: &[&str]) -> Value {
        self.call(uri::PROCEDURE_REGISTER, vec![json!(fields)]).await
    }

    pub async fn dbus_send(&mut self, fields: &[&str]) -> Value {
        self.call(uri::PROCEDURE_SEND, vec![json!(fields)]).await
    }

    /// Runs the challenge-response handshake and returns the reply to `auth`.
    pub async fn authenticate(&mut self, key: &str, secret: &str, permissions: &[&str]) -> Value {
        let extra = json!({"permissions": json!(permissions).to_string()});
        let challenge = self.call(uri::PROCEDURE_AUTHREQ, vec![json!(key), extra]).await;
        if challenge[0] != 3 {
            return challenge;
        }

        let challenge = challenge[2].as_str().expect("challenge string");
        let signature = auth_signature(challenge, secret);
        self.call(uri::PROCEDURE_AUTH, vec![json!(signature)]).await
    }

    /// Frames that arrived while waiting for a call reply and were not read.
    pub fn recv_pending(&self) -> usize {
        self.backlog.len()
    }

    pub async fn expect_closed(&mut self) {
        if let Some(frame) = self.recv().await {
            panic!("expected the connection to close, got {frame}");
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        // Drain until the server acknowledges.
        while let Ok(Some(Ok(_))) = timeout(WAIT, self.ws.next()).await {}
    }

    async fn recv_wire(&mut self) -> Option<Value> {
        loop {
            let next = timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for a frame");

            match next {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("JSON frame"));
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Helpers ---------------------------------------------------------------

pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

pub fn reserve_port(host: &str) -> u16 {
    let addr = format!("{host}:0");
    let listener = TcpListener::bind(&addr).expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

pub fn spawn_busgate(host: &str, port: u16) -> std::process::Child {
    let exe = env!("CARGO_BIN_EXE_busgate");

    Command::new(exe)
        .env("BUSGATE_HOST", host)
        .env("BUSGATE_PORT", port.to_string())
        .env_remove("BUSGATE_CREDENTIALS_FILE")
        .spawn()
        .expect("spawn busgate")
}

pub async fn wait_for_listen(host: &str, port: u16) {
    let addr = format!("{host}:{port}");
    for _ in 0..50 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("busgate did not start listening on {addr}");
}
