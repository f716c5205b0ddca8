//! WebSocket transport for [`TemiBridge`].
//!
//! [`WsTransport`] accepts WebSocket connections and speaks the JSON frames
//! defined in [`crate::protocol`]:
//!
//! 1. **Calls** are dispatched synchronously, one at a time per connection,
//!    and answered with a `reply` frame carrying the same `id`.
//!
//! 2. **Listens** open one subscription per channel.  Each subscription is
//!    forwarded to the client by its own task as `event` frames, followed by
//!    `endOfStream` when the stream ends (cancel, teardown, or a native
//!    disconnect).  Listening again on the same channel replaces the old
//!    subscription.
//!
//! Closing the connection cancels every subscription it opened.
//!
//! Outbound frames go through a per-connection queue bounded by the bridge's
//! stream capacity.  When a client stops reading, forwarders wait on that
//! queue, their streams fill, and the stream adapter drops further events
//! for them with a `warn`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use temi_types::{BridgeError, EventSourceId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::facade::TemiBridge;
use crate::protocol::{ClientFrame, ServerFrame, decode_client_frame, encode_server_frame};
use crate::stream::{EventStream, SubscriptionHandle};

#[derive(Clone)]
pub struct WsTransport {
    bridge: Arc<TemiBridge>,
}

impl WsTransport {
    pub fn new(bridge: Arc<TemiBridge>) -> Self {
        Self { bridge }
    }

    /// Bind `addr` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the TCP listener cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Channel(format!("ws bind error on {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), BridgeError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "websocket transport listening");
        }
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let transport = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = transport.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| BridgeError::Channel(format!("ws handshake from {peer}: {e}")))?;
        info!(peer = %peer, "ws client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel(self.bridge.stream_capacity());
        let mut session = Session::new(Arc::clone(&self.bridge), out_tx);

        loop {
            tokio::select! {
                // Event and end-of-stream frames from the forwarding tasks.
                Some(frame) = out_rx.recv() => {
                    if send_frame(&mut ws_tx, &frame).await.is_err() {
                        break;
                    }
                }
                // Frames from the client.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!(peer = %peer, error = %e, "ws read error");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = session.handle_text(text.as_str()) {
                                if send_frame(&mut ws_tx, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        info!(peer = %peer, subscriptions = session.len(), "ws client disconnected");
        Ok(())
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), BridgeError>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = encode_server_frame(frame)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|_| BridgeError::Channel("ws send failed".into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

struct Subscription {
    handle: SubscriptionHandle,
    forwarder: JoinHandle<()>,
}

/// Per-connection state: the live subscriptions, keyed by source.
struct Session {
    bridge: Arc<TemiBridge>,
    outbound: mpsc::Sender<ServerFrame>,
    subscriptions: HashMap<EventSourceId, Subscription>,
}

impl Session {
    fn new(bridge: Arc<TemiBridge>, outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            bridge,
            outbound,
            subscriptions: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Handle one client frame, returning the frame to answer with directly.
    fn handle_text(&mut self, text: &str) -> Option<ServerFrame> {
        let frame = match decode_client_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "undecodable client frame");
                return Some(error_frame(e));
            }
        };

        match frame {
            ClientFrame::Call { id, method, args } => Some(ServerFrame::Reply {
                id,
                result: self.bridge.dispatch(&method, &args).into(),
            }),
            ClientFrame::Listen { channel } => self.listen(channel).err().map(error_frame),
            ClientFrame::Cancel { channel } => self.cancel(channel).err().map(error_frame),
        }
    }

    fn listen(&mut self, channel: String) -> Result<(), BridgeError> {
        let source = EventSourceId::from_channel_name(&channel)
            .ok_or_else(|| BridgeError::Unrecognized(channel.clone()))?;

        if let Some(old) = self.subscriptions.remove(&source) {
            old.forwarder.abort();
            self.bridge.cancel(old.handle);
        }

        let stream = self.bridge.subscribe(source)?;
        let handle = stream.handle();
        let forwarder = tokio::spawn(forward(channel, stream, self.outbound.clone()));
        self.subscriptions.insert(source, Subscription { handle, forwarder });
        Ok(())
    }

    fn cancel(&mut self, channel: String) -> Result<(), BridgeError> {
        let source =
            EventSourceId::from_channel_name(&channel).ok_or(BridgeError::Unrecognized(channel))?;
        if let Some(sub) = self.subscriptions.remove(&source) {
            // The forwarder sees the stream end and sends endOfStream.
            self.bridge.cancel(sub.handle);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, sub) in self.subscriptions.drain() {
            sub.forwarder.abort();
            self.bridge.cancel(sub.handle);
        }
    }
}

fn error_frame(e: BridgeError) -> ServerFrame {
    ServerFrame::Error {
        message: e.to_string(),
    }
}

// Awaits room in the outbound queue; a stalled client backs up into its stream.
async fn forward(channel: String, mut stream: EventStream, outbound: mpsc::Sender<ServerFrame>) {
    while let Some(event) = stream.recv().await {
        let frame = ServerFrame::Event {
            channel: channel.clone(),
            event,
        };
        if outbound.send(frame).await.is_err() {
            return;
        }
    }
    let _ = outbound.send(ServerFrame::EndOfStream { channel }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use temi_hal::sim::SimRobot;
    use temi_types::{BatteryData, RobotEvent, Value};
    use tokio::time::timeout;

    use crate::facade::BridgeConfig;
    use crate::protocol::CallResult;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn session() -> (Arc<SimRobot>, Session, mpsc::Receiver<ServerFrame>) {
        session_with_capacity(BridgeConfig::default().stream_capacity)
    }

    fn session_with_capacity(stream_capacity: usize) -> (Arc<SimRobot>, Session, mpsc::Receiver<ServerFrame>) {
        let robot = Arc::new(SimRobot::demo());
        let bridge = Arc::new(TemiBridge::attach(
            robot.clone(),
            robot.clone(),
            BridgeConfig { stream_capacity },
        ));
        let (tx, rx) = mpsc::channel(bridge.stream_capacity());
        (robot, Session::new(bridge, tx), rx)
    }

    async fn next_frame(rx: &mut mpsc::Receiver<ServerFrame>) -> Result<ServerFrame, Box<dyn std::error::Error>> {
        Ok(timeout(Duration::from_secs(2), rx.recv())
            .await?
            .ok_or("outbound channel closed")?)
    }

    #[tokio::test]
    async fn call_frames_get_replies() {
        let (_robot, mut session, _rx) = session();
        let reply = session.handle_text(r#"{"op":"call","id":5,"method":"temi_get_locations"}"#);
        let Some(ServerFrame::Reply { id, result }) = reply else {
            panic!("expected a reply, got {reply:?}");
        };
        assert_eq!(id, 5);
        assert!(matches!(result, CallResult::Success { value: Value::List(_) }));

        let reply = session.handle_text(r#"{"op":"call","id":6,"method":"temi_moonwalk"}"#);
        assert!(matches!(
            reply,
            Some(ServerFrame::Reply {
                id: 6,
                result: CallResult::NotImplemented
            })
        ));
    }

    #[tokio::test]
    async fn garbage_gets_an_error_frame() {
        let (_robot, mut session, _rx) = session();
        assert!(matches!(session.handle_text("{not json"), Some(ServerFrame::Error { .. })));
        assert!(matches!(
            session.handle_text(r#"{"op":"listen","channel":"temi/nowhere_stream"}"#),
            Some(ServerFrame::Error { .. })
        ));
    }

    #[tokio::test]
    async fn listen_forwards_events_then_cancel_ends_stream() -> TestResult {
        let (robot, mut session, mut rx) = session();
        assert!(session
            .handle_text(r#"{"op":"listen","channel":"temi/robot_ready_stream"}"#)
            .is_none());
        robot.emit(RobotEvent::RobotReady(true));

        let ServerFrame::Event { channel, event } = next_frame(&mut rx).await? else {
            return Err("expected an event frame".into());
        };
        assert_eq!(channel, "temi/robot_ready_stream");
        assert_eq!(event.payload, Value::Bool(true));

        session.handle_text(r#"{"op":"cancel","channel":"temi/robot_ready_stream"}"#);
        assert_eq!(
            next_frame(&mut rx).await?,
            ServerFrame::EndOfStream {
                channel: "temi/robot_ready_stream".into()
            }
        );
        assert_eq!(robot.total_listener_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_on_unknown_channel_gets_an_error_frame() {
        let (_robot, mut session, _rx) = session();
        let reply = session.handle_text(r#"{"op":"cancel","channel":"temi/nowhere_stream"}"#);
        let Some(ServerFrame::Error { message }) = reply else {
            panic!("expected an error frame, got {reply:?}");
        };
        assert!(message.contains("temi/nowhere_stream"), "{message}");

        // A known channel that was never listened to is not an error.
        assert!(session
            .handle_text(r#"{"op":"cancel","channel":"temi/asr_stream"}"#)
            .is_none());
    }

    #[tokio::test]
    async fn slow_client_keeps_the_outbound_queue_bounded() -> TestResult {
        let (robot, mut session, mut rx) = session_with_capacity(4);
        session.handle_text(r#"{"op":"listen","channel":"temi/robot_ready_stream"}"#);

        // Nobody reads `rx` while the robot floods the channel.
        for _ in 0..1000 {
            robot.emit(RobotEvent::RobotReady(true));
            tokio::task::yield_now().await;
        }

        let mut queued = 0;
        while let Ok(frame) = rx.try_recv() {
            assert!(matches!(frame, ServerFrame::Event { .. }), "{frame:?}");
            queued += 1;
        }
        assert!(queued > 0, "no event reached the outbound queue");
        assert!(queued <= 4, "outbound queue held {queued} frames with capacity 4");

        // Overflow was dropped upstream; the subscription itself is intact.
        assert_eq!(robot.listener_count(EventSourceId::RobotReady), 1);
        assert!(matches!(next_frame(&mut rx).await?, ServerFrame::Event { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn relisten_replaces_the_subscription() {
        let (robot, mut session, _rx) = session();
        session.handle_text(r#"{"op":"listen","channel":"temi/asr_stream"}"#);
        session.handle_text(r#"{"op":"listen","channel":"temi/asr_stream"}"#);
        assert_eq!(session.len(), 1);
        assert_eq!(robot.listener_count(EventSourceId::AsrResult), 1);
        assert_eq!(session.bridge.active_sources(), vec![EventSourceId::AsrResult]);
    }

    #[tokio::test]
    async fn dropping_the_session_cancels_everything() {
        let (robot, mut session, _rx) = session();
        session.handle_text(r#"{"op":"listen","channel":"temi/asr_stream"}"#);
        session.handle_text(r#"{"op":"listen","channel":"temi/nlp_stream"}"#);
        assert_eq!(robot.total_listener_count(), 2);
        drop(session);
        assert_eq!(robot.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn end_to_end_over_a_socket() -> TestResult {
        let robot = Arc::new(SimRobot::demo());
        let bridge = Arc::new(TemiBridge::attach(robot.clone(), robot.clone(), BridgeConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(WsTransport::new(Arc::clone(&bridge)).serve(listener));

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await?;

        client
            .send(Message::Text(r#"{"op":"call","id":1,"method":"temi_battery_data"}"#.into()))
            .await?;
        let reply = timeout(Duration::from_secs(2), client.next()).await?.ok_or("closed")??;
        let reply: serde_json::Value = serde_json::from_str(reply.to_text()?)?;
        assert_eq!(reply["op"], "reply");
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["status"], "success");
        assert_eq!(reply["result"]["value"]["batteryPercentage"], 87);

        client
            .send(Message::Text(r#"{"op":"listen","channel":"temi/battery_status_changed_stream"}"#.into()))
            .await?;
        timeout(Duration::from_secs(2), async {
            while robot.listener_count(EventSourceId::BatteryStatusChanged) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        robot.set_battery(BatteryData::new(40, true));

        let event = timeout(Duration::from_secs(2), client.next()).await?.ok_or("closed")??;
        let event: serde_json::Value = serde_json::from_str(event.to_text()?)?;
        assert_eq!(event["op"], "event");
        assert_eq!(event["channel"], "temi/battery_status_changed_stream");
        assert_eq!(event["event"]["payload"]["batteryPercentage"], 40);
        assert_eq!(event["event"]["payload"]["isCharging"], true);

        client.close(None).await?;
        timeout(Duration::from_secs(2), async {
            while robot.total_listener_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;

        server.abort();
        Ok(())
    }
}
