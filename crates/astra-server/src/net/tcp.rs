//! TCP control channel.
//!
//! Each accepted connection gets its own thread running a small framed-packet
//! conversation: CLIENT_CONNECT negotiates a player id (SERVER_ACCEPT or
//! SERVER_REJECT with a reason), then JOIN_LOBBY / LEAVE_LOBBY / DISCONNECT
//! manage session membership. Gameplay traffic never rides this channel.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use astra_protocol::packet::{frame, PacketHeader, PacketType, RejectReason, HEADER_SIZE};
use astra_protocol::payload::{
    ClientConnect, ClientEjectMass, ClientInput, ClientJoinLobby, ClientLeaveLobby, ClientSplit,
    ServerAccept, ServerReject, Wire,
};

use crate::config::{self, arena};
use crate::net::{ClientInfo, ServerShared, MODE_ARENA};
use crate::sync::PlayerCommand;

/// Accept loop: non-blocking accept polled against the shutdown flag.
pub fn accept_loop(listener: TcpListener, shared: Arc<ServerShared>) {
    while !shared.shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "tcp connection accepted");
                let shared = Arc::clone(&shared);
                let _ = std::thread::Builder::new()
                    .name(format!("tcp-client-{addr}"))
                    .spawn(move || {
                        if let Err(err) = client_loop(stream, &shared) {
                            debug!(%addr, %err, "tcp client closed");
                        }
                    });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!(%err, "tcp accept failed");
                std::thread::sleep(Duration::from_millis(200));
            }
        }
    }
}

/// Read one framed packet. Returns `Ok(None)` on clean EOF.
fn read_packet(stream: &mut TcpStream) -> std::io::Result<Option<(PacketHeader, BytesMut)>> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    match stream.read_exact(&mut header_bytes) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let header = match PacketHeader::decode(&header_bytes) {
        Ok(header) => header,
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad packet header",
            ))
        }
    };
    let mut payload = BytesMut::zeroed(header.payload_len as usize);
    stream.read_exact(&mut payload)?;
    Ok(Some((header, payload)))
}

fn send_packet(
    stream: &mut TcpStream,
    packet_type: PacketType,
    sequence: u16,
    payload: &[u8],
) -> std::io::Result<()> {
    stream.write_all(&frame(packet_type, sequence, payload))
}

fn reject(stream: &mut TcpStream, reason: RejectReason, message: &str) -> std::io::Result<()> {
    let payload = ServerReject::new(reason, message);
    send_packet(stream, PacketType::ServerReject, 0, &payload.to_bytes())
}

/// One client's control conversation, until disconnect or shutdown.
fn client_loop(mut stream: TcpStream, shared: &ServerShared) -> anyhow::Result<()> {
    stream.set_read_timeout(Some(Duration::from_millis(250)))?;
    let mut player_id: Option<u32> = None;
    let mut sequence: u16 = 0;

    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        let (header, payload) = match read_packet(&mut stream) {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                shared.note_malformed();
                break;
            }
            Err(err) => return Err(err.into()),
        };

        match header.packet_type {
            PacketType::ClientConnect => {
                let Ok(connect) = ClientConnect::decode(&payload) else {
                    shared.note_malformed();
                    continue;
                };
                if connect.client_version != config::PROTOCOL_VERSION {
                    info!(
                        version = connect.client_version,
                        "rejecting client: version mismatch"
                    );
                    reject(&mut stream, RejectReason::VersionMismatch, "wrong protocol version")?;
                    break;
                }
                let name = connect.name();
                if name.is_empty() {
                    reject(&mut stream, RejectReason::InvalidName, "empty player name")?;
                    break;
                }
                if shared.clients.lock().unwrap().len() >= config::MAX_PLAYERS {
                    info!("rejecting client: server full");
                    reject(&mut stream, RejectReason::ServerFull, "server is full")?;
                    break;
                }

                let id = shared.allocate_player_id();
                shared.clients.lock().unwrap().insert(
                    id,
                    ClientInfo {
                        name: name.clone(),
                        udp_addr: None,
                        last_seen: Instant::now(),
                    },
                );
                player_id = Some(id);
                info!(player = id, name, "client accepted");

                let accept = ServerAccept {
                    assigned_player_id: id,
                    map_width: arena::MAP_WIDTH,
                    map_height: arena::MAP_HEIGHT,
                    starting_mass: arena::STARTING_MASS,
                    server_tick_rate: config::TICK_RATE as u8,
                    max_players: config::MAX_PLAYERS as u8,
                };
                sequence = sequence.wrapping_add(1);
                send_packet(
                    &mut stream,
                    PacketType::ServerAccept,
                    sequence,
                    &accept.to_bytes(),
                )?;
            }
            PacketType::ClientJoinLobby => {
                let Ok(join) = ClientJoinLobby::decode(&payload) else {
                    shared.note_malformed();
                    continue;
                };
                let Some(id) = player_id.filter(|&id| id == join.player_id) else {
                    debug!(player = join.player_id, "join for unauthenticated player");
                    continue;
                };
                let name = shared
                    .clients
                    .lock()
                    .unwrap()
                    .get(&id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();

                let (session_id, handle) =
                    shared.find_or_create_session(join.game_mode, join.map_id);
                {
                    let mut session = handle.session.lock().unwrap();
                    session.add_player(id, &name, (join.difficulty % 3) * 5);
                    // Late joiners get the world replayed.
                    if session.player_count() > 1 || join.game_mode == MODE_ARENA {
                        session.resync_client(id, id);
                    }
                }
                shared.player_sessions.lock().unwrap().insert(id, session_id);
                info!(player = id, session = session_id, "player joined lobby");
            }
            PacketType::ClientLeaveLobby => {
                let Ok(leave) = ClientLeaveLobby::decode(&payload) else {
                    shared.note_malformed();
                    continue;
                };
                if player_id == Some(leave.player_id) {
                    if let Some(handle) = shared.session_of(leave.player_id) {
                        if let Ok(mut session) = handle.session.lock() {
                            session.remove_player(leave.player_id);
                        }
                    }
                    shared
                        .player_sessions
                        .lock()
                        .unwrap()
                        .remove(&leave.player_id);
                    info!(player = leave.player_id, "player left lobby");
                }
            }
            PacketType::ClientDisconnect => {
                break;
            }
            PacketType::ClientPing => {
                // Keep-alive over TCP just refreshes the timeout clock.
                if let Some(id) = player_id {
                    if let Some(client) = shared.clients.lock().unwrap().get_mut(&id) {
                        client.last_seen = Instant::now();
                    }
                }
            }
            PacketType::ClientInput | PacketType::ClientSplit | PacketType::ClientEjectMass => {
                // Gameplay packets belong on UDP, but tolerate them here:
                // decode and queue exactly as the data channel would.
                let Some((id, handle)) = player_id
                    .and_then(|id| shared.session_of(id).map(|handle| (id, handle)))
                else {
                    debug!("gameplay packet before lobby join");
                    continue;
                };
                match header.packet_type {
                    PacketType::ClientInput => match ClientInput::decode(&payload) {
                        Ok(input) => handle.net.queue_input(id, PlayerCommand::Move(input)),
                        Err(_) => shared.note_malformed(),
                    },
                    PacketType::ClientSplit => match ClientSplit::decode(&payload) {
                        Ok(_) => handle.net.queue_input(id, PlayerCommand::Split),
                        Err(_) => shared.note_malformed(),
                    },
                    PacketType::ClientEjectMass => match ClientEjectMass::decode(&payload) {
                        Ok(eject) => handle.net.queue_input(
                            id,
                            PlayerCommand::EjectMass {
                                dir_x: eject.direction_x,
                                dir_y: eject.direction_y,
                            },
                        ),
                        Err(_) => shared.note_malformed(),
                    },
                    _ => {}
                }
            }
            other => {
                debug!(?other, "unexpected packet on control channel");
                shared.note_malformed();
            }
        }
    }

    if let Some(id) = player_id {
        shared.drop_player(id);
        info!(player = id, "client disconnected");
    }
    Ok(())
}
