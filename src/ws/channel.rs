//! Persistent streaming connection to the remote service, with reconnect

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::event::CoreEvent;
use crate::config::Config;

use super::protocol::{decode_server_msg, ClientMsg};

/// Capacity of the hand-off between senders and the channel task
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Messages held while disconnected. Oldest are dropped once full.
#[derive(Debug)]
pub struct OutboundQueue {
    buf: VecDeque<ClientMsg>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, msg: ClientMsg) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
            self.dropped += 1;
        }
        self.buf.push_back(msg);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Take everything except switch messages; the latest switch is re-sent
    /// separately on connect
    pub fn drain_for_flush(&mut self) -> Vec<ClientMsg> {
        self.buf.drain(..).filter(|m| !m.is_switch()).collect()
    }
}

/// Fire-and-forget handle for outbound messages
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<ClientMsg>,
}

impl OutboundSender {
    pub fn send(&self, msg: ClientMsg) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound channel full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbound channel closed");
            }
        }
    }

    #[cfg(test)]
    pub fn detached() -> (Self, mpsc::Receiver<ClientMsg>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

/// Why a connected session ended
enum Disconnect {
    Lost,
    Shutdown,
}

pub struct ConnectionChannel {
    session_id: Uuid,
    url: String,
    reconnect_min: Duration,
    reconnect_max: Duration,
    connect_timeout: Duration,
    ping_interval: Duration,
    idle_timeout: Duration,
    outbound_rx: mpsc::Receiver<ClientMsg>,
    queue: OutboundQueue,
    last_switch: Option<ClientMsg>,
    events: mpsc::Sender<CoreEvent>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionChannel {
    /// Start the channel task for `session_id`
    pub fn connect(
        config: Arc<Config>,
        session_id: Uuid,
        events: mpsc::Sender<CoreEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (OutboundSender, JoinHandle<()>) {
        let (tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let channel = Self {
            session_id,
            url: config.session_ws_url(session_id),
            reconnect_min: config.reconnect_min,
            reconnect_max: config.reconnect_max,
            connect_timeout: config.connect_timeout,
            ping_interval: config.ping_interval,
            idle_timeout: config.idle_timeout,
            outbound_rx,
            queue: OutboundQueue::new(config.outbound_buffer),
            last_switch: None,
            events,
            shutdown,
        };
        let handle = tokio::spawn(channel.run());
        (OutboundSender { tx }, handle)
    }

    async fn run(mut self) {
        let mut backoff = self.reconnect_min;

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.set_status(ChannelStatus::Connecting).await;

            match self.attempt_connect().await {
                None => break,
                Some(Ok(stream)) => {
                    info!(session_id = %self.session_id, url = %self.url, "Streaming channel connected");
                    backoff = self.reconnect_min;
                    self.set_status(ChannelStatus::Connected).await;
                    let reason = self.run_connected(stream).await;
                    self.set_status(ChannelStatus::Disconnected).await;
                    if let Disconnect::Shutdown = reason {
                        break;
                    }
                    warn!(session_id = %self.session_id, "Streaming channel lost, reconnecting");
                }
                Some(Err(e)) => {
                    warn!(
                        session_id = %self.session_id,
                        error = %e,
                        retry_ms = backoff.as_millis() as u64,
                        "Streaming channel connect failed"
                    );
                    self.set_status(ChannelStatus::Disconnected).await;
                }
            }

            if !self.wait_backoff(backoff).await {
                break;
            }
            backoff = (backoff * 2).min(self.reconnect_max);
        }

        info!(session_id = %self.session_id, "Streaming channel stopped");
    }

    /// One bounded connect attempt. Outbound messages are held meanwhile.
    /// Returns None on shutdown.
    async fn attempt_connect(&mut self) -> Option<Result<WsStream, String>> {
        let connect = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.clone()),
        );
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => {
                    return Some(match result {
                        Ok(Ok((stream, _))) => Ok(stream),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("no handshake within {:?}", self.connect_timeout)),
                    });
                }
                _ = self.shutdown.changed() => return None,
                msg = self.outbound_rx.recv() => match msg {
                    Some(msg) => self.hold(msg),
                    None => return None,
                },
            }
        }
    }

    /// Sleep before the next attempt while still queueing outbound messages.
    /// Returns false on shutdown.
    async fn wait_backoff(&mut self, backoff: Duration) -> bool {
        let sleep = tokio::time::sleep(backoff);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                _ = self.shutdown.changed() => return false,
                msg = self.outbound_rx.recv() => match msg {
                    Some(msg) => self.hold(msg),
                    None => return false,
                },
            }
        }
    }

    fn hold(&mut self, msg: ClientMsg) {
        if msg.is_switch() {
            self.last_switch = Some(msg.clone());
        }
        let dropped = self.queue.dropped();
        self.queue.push(msg);
        if self.queue.dropped() > dropped {
            debug!(session_id = %self.session_id, queued = self.queue.len(), "Outbound queue full, dropped oldest");
        }
    }

    async fn run_connected<S>(&mut self, stream: S) -> Disconnect
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut source) = stream.split();

        // Current variant first, then everything held while offline
        let mut pending: Vec<ClientMsg> = self.last_switch.iter().cloned().collect();
        pending.extend(self.queue.drain_for_flush());
        if !pending.is_empty() {
            debug!(session_id = %self.session_id, count = pending.len(), "Flushing outbound queue");
        }
        let mut pending = pending.into_iter();

        while let Some(msg) = pending.next() {
            if send_msg(&mut sink, &msg).await.is_err() {
                self.hold(msg);
                for rest in pending {
                    self.hold(rest);
                }
                return Disconnect::Lost;
            }
        }

        let mut last_seen = Instant::now();
        let mut keepalive = interval(self.ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        keepalive.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Disconnect::Shutdown;
                }
                msg = self.outbound_rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = sink.send(Message::Close(None)).await;
                        return Disconnect::Shutdown;
                    };
                    if msg.is_switch() {
                        self.last_switch = Some(msg.clone());
                    }
                    if let Err(e) = send_msg(&mut sink, &msg).await {
                        debug!(session_id = %self.session_id, error = %e, "Streaming send failed");
                        self.hold(msg);
                        return Disconnect::Lost;
                    }
                }
                _ = keepalive.tick() => {
                    if last_seen.elapsed() >= self.idle_timeout {
                        warn!(session_id = %self.session_id, "Streaming channel idle, dropping connection");
                        return Disconnect::Lost;
                    }
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        debug!(session_id = %self.session_id, error = %e, "Keepalive ping failed");
                        return Disconnect::Lost;
                    }
                }
                frame = source.next() => {
                    if let Some(Ok(_)) = frame {
                        last_seen = Instant::now();
                    }
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let event = match decode_server_msg(&text) {
                                Ok(msg) => CoreEvent::Inbound(msg),
                                Err(e) => CoreEvent::Malformed {
                                    source: "stream",
                                    error: e.to_string(),
                                },
                            };
                            if self.events.send(event).await.is_err() {
                                return Disconnect::Shutdown;
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            warn!(session_id = %self.session_id, "Received binary frame, ignoring");
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(session_id = %self.session_id, "Server closed streaming channel");
                            return Disconnect::Lost;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(session_id = %self.session_id, error = %e, "Streaming channel error");
                            return Disconnect::Lost;
                        }
                    }
                }
            }
        }
    }

    async fn set_status(&self, status: ChannelStatus) {
        let _ = self.events.send(CoreEvent::ChannelStatus(status)).await;
    }
}

/// Send a message over the stream
async fn send_msg<K>(sink: &mut K, msg: &ClientMsg) -> Result<(), String>
where
    K: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameVariant;
    use crate::ws::protocol::ServerMsg;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::{routing::get, Router};
    use tokio::time::timeout;

    fn switch(game: GameVariant) -> ClientMsg {
        ClientMsg::SwitchGame {
            session_id: Uuid::nil(),
            game,
        }
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let mut queue = OutboundQueue::new(2);
        queue.push(switch(GameVariant::Fighting));
        queue.push(switch(GameVariant::Badminton));
        queue.push(switch(GameVariant::Racing));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
    }

    /// Test server: reports every received text frame, answers the first
    /// frame of each connection with an AI action, then closes the first
    /// connection to force a reconnect.
    async fn spawn_server() -> (String, mpsc::UnboundedReceiver<String>) {
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let router = Router::new().route(
            "/ws/:id",
            get(move |ws: WebSocketUpgrade| {
                let seen_tx = seen_tx.clone();
                let n = connections.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { ws.on_upgrade(move |socket| serve_socket(socket, seen_tx, n == 0)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("ws://{}", addr), seen_rx)
    }

    async fn serve_socket(mut socket: WebSocket, seen: mpsc::UnboundedSender<String>, close_after_first: bool) {
        if let Some(Ok(AxumMessage::Text(text))) = socket.recv().await {
            let _ = seen.send(text);
            let reply = r#"{"type":"ai_action","current_game_action":"block","strategy":"defensive","confidence":0.5}"#;
            let _ = socket.send(AxumMessage::Text(reply.to_string())).await;
            let _ = socket.send(AxumMessage::Text("garbage".to_string())).await;
        }
        if close_after_first {
            let _ = socket.send(AxumMessage::Close(None)).await;
            return;
        }
        while let Some(Ok(msg)) = socket.recv().await {
            if let AxumMessage::Text(text) = msg {
                let _ = seen.send(text);
            }
        }
    }

    #[tokio::test]
    async fn connects_resends_switch_and_reconnects() {
        let (base, mut seen) = spawn_server().await;
        let config = Arc::new(Config {
            ws_base_url: base,
            reconnect_min: Duration::from_millis(10),
            reconnect_max: Duration::from_millis(50),
            ..Default::default()
        });
        let (events_tx, mut events) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (outbound, handle) = ConnectionChannel::connect(config, Uuid::nil(), events_tx, shutdown_rx);
        outbound.send(switch(GameVariant::Racing));

        // First connection receives the switch
        let first = timeout(Duration::from_secs(5), seen.recv()).await.unwrap().unwrap();
        assert!(first.contains("switch_game") && first.contains("racing"));

        // Second connection receives it again after the server hung up
        let second = timeout(Duration::from_secs(5), seen.recv()).await.unwrap().unwrap();
        assert!(second.contains("switch_game") && second.contains("racing"));

        let mut connected = 0;
        let mut ai_actions = 0;
        let mut malformed = 0;
        while connected < 2 || ai_actions < 2 || malformed < 2 {
            match timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap() {
                CoreEvent::ChannelStatus(ChannelStatus::Connected) => connected += 1,
                CoreEvent::Inbound(ServerMsg::AiAction(action)) => {
                    assert_eq!(action.current_game_action, "block");
                    ai_actions += 1;
                }
                CoreEvent::Malformed { .. } => malformed += 1,
                _ => {}
            }
        }

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reports_disconnected_when_unreachable() {
        let config = Arc::new(Config {
            // Nothing listens on port 9 locally
            ws_base_url: "ws://127.0.0.1:9".to_string(),
            reconnect_min: Duration::from_millis(10),
            reconnect_max: Duration::from_millis(20),
            outbound_buffer: 4,
            ..Default::default()
        });
        let (events_tx, mut events) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound, handle) = ConnectionChannel::connect(config, Uuid::nil(), events_tx, shutdown_rx);

        for _ in 0..10 {
            outbound.send(switch(GameVariant::Badminton));
        }

        let mut disconnected = false;
        while !disconnected {
            if let CoreEvent::ChannelStatus(ChannelStatus::Disconnected) =
                timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap()
            {
                disconnected = true;
            }
        }

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    async fn next_status(events: &mut mpsc::Receiver<CoreEvent>, wanted: ChannelStatus) {
        loop {
            match timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap() {
                CoreEvent::ChannelStatus(status) if status == wanted => return,
                _ => {}
            }
        }
    }

    /// Serve `/ws/:id` on `listener`, reporting every text frame
    fn serve_recorder(listener: tokio::net::TcpListener) -> mpsc::UnboundedReceiver<String> {
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let router = Router::new().route(
            "/ws/:id",
            get(move |ws: WebSocketUpgrade| {
                let seen_tx = seen_tx.clone();
                async move {
                    ws.on_upgrade(move |mut socket| async move {
                        while let Some(Ok(msg)) = socket.recv().await {
                            if let AxumMessage::Text(text) = msg {
                                let _ = seen_tx.send(text);
                            }
                        }
                    })
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        seen_rx
    }

    #[tokio::test]
    async fn held_actions_flush_after_switch_in_send_order() {
        use crate::game::{GameState, PlayerAction};

        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = reserved.local_addr().unwrap();
        drop(reserved);

        let config = Arc::new(Config {
            ws_base_url: format!("ws://{addr}"),
            reconnect_min: Duration::from_millis(20),
            reconnect_max: Duration::from_millis(40),
            outbound_buffer: 3,
            ..Default::default()
        });
        let (events_tx, mut events) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound, handle) = ConnectionChannel::connect(config, Uuid::nil(), events_tx, shutdown_rx);

        let state = GameState::initial(GameVariant::Fighting);
        let actions: Vec<PlayerAction> = (0..4).map(|_| PlayerAction::movement(&state)).collect();
        outbound.send(switch(GameVariant::Fighting));
        for action in &actions {
            outbound.send(ClientMsg::PlayerAction {
                session_id: Uuid::nil(),
                game: GameVariant::Fighting,
                action: action.clone(),
            });
        }

        // Nothing listens yet, so everything is held
        next_status(&mut events, ChannelStatus::Disconnected).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let mut seen = serve_recorder(listener);

        let mut frames = Vec::new();
        while frames.len() < 4 {
            let text = timeout(Duration::from_secs(5), seen.recv()).await.unwrap().unwrap();
            frames.push(serde_json::from_str::<serde_json::Value>(&text).unwrap());
        }

        assert_eq!(frames[0]["type"], "switch_game");
        assert_eq!(frames[0]["game"], "fighting");
        // Capacity 3 held the switch and four actions; the two oldest went
        let ids: Vec<String> = frames[1..]
            .iter()
            .map(|f| f["action"]["id"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<String> = actions[1..].iter().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, expected);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stalled_handshake_gives_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer the upgrade request
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = Arc::new(Config {
            ws_base_url: format!("ws://{addr}"),
            connect_timeout: Duration::from_millis(100),
            reconnect_min: Duration::from_millis(10),
            reconnect_max: Duration::from_millis(20),
            ..Default::default()
        });
        let (events_tx, mut events) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_outbound, handle) = ConnectionChannel::connect(config, Uuid::nil(), events_tx, shutdown_rx);

        timeout(
            Duration::from_secs(2),
            next_status(&mut events, ChannelStatus::Disconnected),
        )
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn silent_peer_is_dropped_after_idle_timeout() {
        // Upgrades, then never reads, so pings go unanswered
        let router = Router::new().route(
            "/ws/:id",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|socket| async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(socket);
                })
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = Arc::new(Config {
            ws_base_url: format!("ws://{addr}"),
            ping_interval: Duration::from_millis(50),
            idle_timeout: Duration::from_millis(150),
            reconnect_min: Duration::from_millis(10),
            reconnect_max: Duration::from_millis(20),
            ..Default::default()
        });
        let (events_tx, mut events) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_outbound, handle) = ConnectionChannel::connect(config, Uuid::nil(), events_tx, shutdown_rx);

        next_status(&mut events, ChannelStatus::Connected).await;
        timeout(
            Duration::from_secs(2),
            next_status(&mut events, ChannelStatus::Disconnected),
        )
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
