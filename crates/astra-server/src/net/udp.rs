//! UDP data channel.
//!
//! Receives gameplay packets (input, split, eject, skin, ping), validates
//! them, and pushes commands onto the owning session's input queue without
//! ever locking the session itself. The first datagram from a player also
//! teaches us their return address for outbound traffic.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use astra_protocol::packet::{frame, validate, PacketType};
use astra_protocol::payload::{
    ClientEjectMass, ClientInput, ClientPing, ClientSetSkin, ClientSplit, ServerPong, Wire,
};

use crate::net::ServerShared;
use crate::sync::PlayerCommand;

const MAX_DATAGRAM: usize = 2048;

/// Receive loop: polls with a short timeout so the shutdown flag is honored.
pub fn receive_loop(socket: UdpSocket, shared: Arc<ServerShared>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while !shared.shutdown.load(Ordering::Acquire) {
        let (len, addr) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                debug!(%err, "udp recv error");
                continue;
            }
        };
        handle_datagram(&socket, &shared, &buf[..len], addr);
    }
}

fn handle_datagram(socket: &UdpSocket, shared: &ServerShared, data: &[u8], addr: SocketAddr) {
    let (header, payload) = match validate(data) {
        Ok(validated) => validated,
        Err(_) => {
            shared.note_malformed();
            return;
        }
    };

    match header.packet_type {
        PacketType::ClientInput => {
            let Ok(input) = ClientInput::decode(payload) else {
                shared.note_malformed();
                return;
            };
            if !touch_client(shared, input.player_id, addr) {
                return;
            }
            if let Some(handle) = shared.session_of(input.player_id) {
                handle
                    .net
                    .queue_input(input.player_id, PlayerCommand::Move(input));
            }
        }
        PacketType::ClientSplit => {
            let Ok(split) = ClientSplit::decode(payload) else {
                shared.note_malformed();
                return;
            };
            if !touch_client(shared, split.player_id, addr) {
                return;
            }
            if let Some(handle) = shared.session_of(split.player_id) {
                handle.net.queue_input(split.player_id, PlayerCommand::Split);
            }
        }
        PacketType::ClientEjectMass => {
            let Ok(eject) = ClientEjectMass::decode(payload) else {
                shared.note_malformed();
                return;
            };
            if !touch_client(shared, eject.player_id, addr) {
                return;
            }
            if let Some(handle) = shared.session_of(eject.player_id) {
                handle.net.queue_input(
                    eject.player_id,
                    PlayerCommand::EjectMass {
                        dir_x: eject.direction_x,
                        dir_y: eject.direction_y,
                    },
                );
            }
        }
        PacketType::ClientSetSkin => {
            let Ok(skin) = ClientSetSkin::decode(payload) else {
                shared.note_malformed();
                return;
            };
            if !touch_client(shared, skin.player_id, addr) {
                return;
            }
            if let Some(handle) = shared.session_of(skin.player_id) {
                handle
                    .net
                    .queue_input(skin.player_id, PlayerCommand::SetSkin(skin.skin_id));
            }
        }
        PacketType::ClientPing => {
            let Ok(ping) = ClientPing::decode(payload) else {
                shared.note_malformed();
                return;
            };
            touch_client(shared, ping.player_id, addr);
            let pong = ServerPong {
                client_timestamp: ping.client_timestamp,
                server_timestamp: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u32,
            };
            let packet = frame(PacketType::ServerPong, header.sequence, &pong.to_bytes());
            let _ = socket.send_to(&packet, addr);
        }
        _ => {
            shared.note_malformed();
        }
    }
}

/// Refresh a known client's liveness and return address. Unknown player ids
/// are dropped here, which is the authorization boundary for UDP traffic.
fn touch_client(shared: &ServerShared, player_id: u32, addr: SocketAddr) -> bool {
    let mut clients = shared.clients.lock().unwrap();
    match clients.get_mut(&player_id) {
        Some(client) => {
            client.last_seen = Instant::now();
            if client.udp_addr != Some(addr) {
                client.udp_addr = Some(addr);
            }
            true
        }
        None => {
            debug!(player = player_id, %addr, "udp packet from unknown player");
            false
        }
    }
}
