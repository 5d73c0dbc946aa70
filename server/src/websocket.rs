//! Real-time fan-out over WebSocket.
//!
//! `WsHub` is an actor holding the `(user_id → sessions)` registry; every
//! `events:deal` event forwarded into it is broadcast to all registered
//! sessions. Client reads are ignored apart from heartbeat traffic, and
//! any read failure tears the session down and deregisters it. The actor
//! mailbox serializes registry access, so broadcasts never race
//! connect/disconnect.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, Addr, AsyncContext, Context, Handler, Message, StreamHandler};
use actix_web_actors::ws;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::Event;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

// --- Hub actor ---

#[derive(Default)]
pub struct WsHub {
    sessions: HashMap<Uuid, Addr<WsSession>>,
    user_sessions: HashMap<String, HashSet<Uuid>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for WsHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        info!("websocket hub started");
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: Uuid,
    pub user_id: String,
    pub addr: Addr<WsSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
    pub user_id: String,
}

/// An event from the bus, to be pushed to every connected client.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct BusEvent(pub Event);

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct WsText(pub String);

impl Handler<Connect> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!(session = %msg.id, user_id = %msg.user_id, "websocket session connected");
        self.sessions.insert(msg.id, msg.addr);
        self.user_sessions
            .entry(msg.user_id)
            .or_default()
            .insert(msg.id);
    }
}

impl Handler<Disconnect> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!(session = %msg.id, "websocket session disconnected");
        self.sessions.remove(&msg.id);
        if let Some(sessions) = self.user_sessions.get_mut(&msg.user_id) {
            sessions.remove(&msg.id);
            if sessions.is_empty() {
                self.user_sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<BusEvent> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: BusEvent, _ctx: &mut Context<Self>) {
        let json = match serde_json::to_string(&msg.0) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize event for broadcast");
                return;
            }
        };
        for addr in self.sessions.values() {
            addr.do_send(WsText(json.clone()));
        }
    }
}

// --- Per-connection session actor ---

pub struct WsSession {
    pub id: Uuid,
    pub user_id: String,
    pub hb: Instant,
    pub hub: Addr<WsHub>,
}

impl WsSession {
    pub fn new(user_id: String, hub: Addr<WsHub>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            hb: Instant::now(),
            hub,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(session = %act.id, "heartbeat timeout, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        self.hub.do_send(Connect {
            id: self.id,
            user_id: self.user_id.clone(),
            addr: ctx.address(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.hub.do_send(Disconnect {
            id: self.id,
            user_id: self.user_id.clone(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(_) => ctx.stop(),
            // Client pushes are ignored; this channel is server → client.
            _ => {}
        }
    }
}

impl Handler<WsText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}
