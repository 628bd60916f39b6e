//! Network adapter: one TCP control channel, one UDP data channel.
//!
//! TCP carries the reliable conversation (connect, lobby join/leave,
//! accept/reject); UDP carries gameplay traffic (inputs in, snapshots and
//! events out). The adapter owns the client table and the session registry;
//! simulation state is never touched from here -- inputs go through each
//! session's [`NetSync`] queue and outbound payloads come back out of it
//! after the tick barrier.
//!
//! Error policy (spec'd): malformed packets are dropped silently with a
//! counter bump; inputs for unknown players are dropped at debug level;
//! lobby-level failures are answered with SERVER_REJECT and the connection
//! is closed.

pub mod tcp;
pub mod udp;

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config;
use crate::levels::LevelSpec;
use crate::session::Session;
use crate::sync::NetSync;
use crate::waves::{MapConfig, WaveManager};

/// Game mode byte carried in CLIENT_JOIN_LOBBY.
pub const MODE_SCROLLER: u8 = 0;
pub const MODE_ARENA: u8 = 1;

// ---------------------------------------------------------------------------
// Client and session tables
// ---------------------------------------------------------------------------

/// One connected client.
#[derive(Debug)]
pub struct ClientInfo {
    pub name: String,
    /// Learned from the client's first UDP datagram.
    pub udp_addr: Option<SocketAddr>,
    pub last_seen: Instant,
}

/// A registered session plus its lobby key.
#[derive(Clone)]
pub struct SessionHandle {
    pub session: Arc<Mutex<Session>>,
    pub net: NetSync,
    pub mode: u8,
    pub map_id: u16,
}

/// State shared between the network threads and the main loop.
pub struct ServerShared {
    pub clients: Mutex<HashMap<u32, ClientInfo>>,
    pub sessions: Mutex<HashMap<u32, SessionHandle>>,
    /// player_id -> session_id.
    pub player_sessions: Mutex<HashMap<u32, u32>>,
    /// Wave maps preloaded at startup; a load failure is fatal before any
    /// client connects.
    pub maps: HashMap<u16, MapConfig>,
    pub next_player_id: AtomicU32,
    pub next_session_id: AtomicU32,
    pub malformed_packets: AtomicU64,
    pub shutdown: Arc<AtomicBool>,
}

impl ServerShared {
    pub fn new(maps: HashMap<u16, MapConfig>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            player_sessions: Mutex::new(HashMap::new()),
            maps,
            next_player_id: AtomicU32::new(1),
            next_session_id: AtomicU32::new(1),
            malformed_packets: AtomicU64::new(0),
            shutdown,
        }
    }

    pub fn note_malformed(&self) {
        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn allocate_player_id(&self) -> u32 {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The session a player currently sits in.
    pub fn session_of(&self, player_id: u32) -> Option<SessionHandle> {
        let session_id = *self.player_sessions.lock().unwrap().get(&player_id)?;
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }

    /// Find a joinable session for the lobby key or create one.
    pub fn find_or_create_session(&self, mode: u8, map_id: u16) -> (u32, SessionHandle) {
        let mut sessions = self.sessions.lock().unwrap();
        for (&id, handle) in sessions.iter() {
            if handle.mode == mode && handle.map_id == map_id {
                let active = handle.session.lock().map(|s| s.is_active()).unwrap_or(false);
                if active {
                    return (id, handle.clone());
                }
            }
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = if mode == MODE_ARENA {
            Session::arena(id)
        } else {
            let map = self
                .maps
                .get(&map_id)
                .or_else(|| self.maps.get(&1))
                .cloned()
                .unwrap_or_else(|| MapConfig {
                    name: "fallback".into(),
                    scroll_speed: None,
                    loop_waves: false,
                    completion: Default::default(),
                    checkpoints: vec![],
                    waves: vec![],
                });
            let levels = vec![LevelSpec {
                name: format!("map-{map_id}"),
                map: map.clone(),
            }];
            Session::scroller(id, WaveManager::new(map), levels)
        };
        let net = session.net();
        let handle = SessionHandle {
            session: Arc::new(Mutex::new(session)),
            net,
            mode,
            map_id,
        };
        sessions.insert(id, handle.clone());
        info!(session = id, mode, map_id, "session created");
        (id, handle)
    }

    /// Detach a player from their session and forget them.
    pub fn drop_player(&self, player_id: u32) {
        if let Some(handle) = self.session_of(player_id) {
            if let Ok(mut session) = handle.session.lock() {
                session.remove_player(player_id);
            }
        }
        self.player_sessions.lock().unwrap().remove(&player_id);
        self.clients.lock().unwrap().remove(&player_id);
    }

    /// Disconnect clients that have been silent for too long; their queued
    /// state drops with them.
    pub fn reap_timed_out_clients(&self) {
        let now = Instant::now();
        let stale: Vec<u32> = self
            .clients
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, info)| {
                now.duration_since(info.last_seen).as_secs_f32() > config::CLIENT_TIMEOUT
            })
            .map(|(&id, _)| id)
            .collect();
        for player_id in stale {
            warn!(player = player_id, "client timed out");
            self.drop_player(player_id);
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkServer
// ---------------------------------------------------------------------------

/// Owns the sockets and the receive threads.
pub struct NetworkServer {
    pub shared: Arc<ServerShared>,
    udp: UdpSocket,
    tcp_thread: Option<std::thread::JoinHandle<()>>,
    udp_thread: Option<std::thread::JoinHandle<()>>,
}

impl NetworkServer {
    /// Bind both sockets and start the receive threads.
    pub fn start(
        tcp_port: u16,
        udp_port: u16,
        bind_public: bool,
        maps: HashMap<u16, MapConfig>,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let host = if bind_public { "0.0.0.0" } else { "127.0.0.1" };

        let listener = TcpListener::bind((host, tcp_port))
            .with_context(|| format!("binding TCP control socket on {host}:{tcp_port}"))?;
        listener
            .set_nonblocking(true)
            .context("setting TCP listener non-blocking")?;

        let udp = UdpSocket::bind((host, udp_port))
            .with_context(|| format!("binding UDP data socket on {host}:{udp_port}"))?;
        udp.set_read_timeout(Some(std::time::Duration::from_millis(50)))
            .context("setting UDP read timeout")?;

        info!(host, tcp_port, udp_port, "network server listening");

        let shared = Arc::new(ServerShared::new(maps, shutdown));

        let tcp_shared = Arc::clone(&shared);
        let tcp_thread = std::thread::Builder::new()
            .name("tcp-control".into())
            .spawn(move || tcp::accept_loop(listener, tcp_shared))
            .context("spawning TCP thread")?;

        let udp_shared = Arc::clone(&shared);
        let udp_socket = udp.try_clone().context("cloning UDP socket")?;
        let udp_thread = std::thread::Builder::new()
            .name("udp-data".into())
            .spawn(move || udp::receive_loop(udp_socket, udp_shared))
            .context("spawning UDP thread")?;

        Ok(Self {
            shared,
            udp,
            tcp_thread: Some(tcp_thread),
            udp_thread: Some(udp_thread),
        })
    }

    /// Drain every session's outbound buffers and transmit to its members.
    /// Called by the main loop after the tick barrier.
    pub fn flush_outgoing(&self) {
        let sessions: Vec<(u32, SessionHandle)> = {
            let sessions = self.shared.sessions.lock().unwrap();
            sessions.iter().map(|(&id, h)| (id, h.clone())).collect()
        };
        for (session_id, handle) in sessions {
            let packets = handle.net.drain_packets();
            if packets.is_empty() {
                continue;
            }
            let recipients: Vec<SocketAddr> = {
                let members = self.shared.player_sessions.lock().unwrap();
                let clients = self.shared.clients.lock().unwrap();
                members
                    .iter()
                    .filter(|(_, &sid)| sid == session_id)
                    .filter_map(|(player_id, _)| {
                        clients.get(player_id).and_then(|c| c.udp_addr)
                    })
                    .collect()
            };
            for packet in &packets {
                for addr in &recipients {
                    if let Err(err) = self.udp.send_to(packet, addr) {
                        debug!(%addr, %err, "udp send failed");
                    }
                }
            }
        }
    }

    /// Stop accepting, join the receive threads, flush what is pending, and
    /// release the sockets.
    pub fn shutdown(mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.tcp_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.udp_thread.take() {
            let _ = thread.join();
        }
        self.flush_outgoing();
        info!("network server stopped");
    }
}

/// Load every known wave map from the assets directory. Fatal on error: a
/// server with unreadable maps must not start.
pub fn load_maps(assets_dir: &Path) -> anyhow::Result<HashMap<u16, MapConfig>> {
    let mut maps = HashMap::new();
    for map_id in 1..=3u16 {
        let path = assets_dir.join(MapConfig::file_for_map(map_id));
        let config = MapConfig::load(&path)?;
        maps.insert(map_id, config);
    }
    Ok(maps)
}
