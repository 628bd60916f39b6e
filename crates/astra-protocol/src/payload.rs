//! Fixed-size payload layouts.
//!
//! Every payload implements [`Wire`]: an exact `WIRE_SIZE`, an infallible
//! `encode` appending exactly that many bytes, and a length-checked `decode`.
//! Integers are big-endian (the `bytes` default); floats are IEEE-754
//! little-endian byte strings. Fixed-width name fields are NUL-padded and
//! truncated to leave a terminating NUL, matching what clients expect.

use bytes::{Buf, BufMut, BytesMut};

use crate::packet::{DestroyReason, DisconnectReason, EntityType, RejectReason};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Wire trait and primitives
// ---------------------------------------------------------------------------

/// A fixed-size wire payload.
pub trait Wire: Sized {
    /// Exact encoded size in bytes.
    const WIRE_SIZE: usize;

    /// Append exactly [`WIRE_SIZE`](Self::WIRE_SIZE) bytes to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decode from the front of `data`.
    fn decode(data: &[u8]) -> Result<Self, ProtocolError>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::WIRE_SIZE);
        self.encode(&mut buf);
        buf
    }
}

#[inline]
fn put_f32(buf: &mut BytesMut, value: f32) {
    buf.put_slice(&value.to_le_bytes());
}

#[inline]
fn get_f32(buf: &mut &[u8]) -> f32 {
    let mut bytes = [0u8; 4];
    buf.copy_to_slice(&mut bytes);
    f32::from_le_bytes(bytes)
}

#[inline]
fn check_len(data: &[u8], need: usize) -> Result<(), ProtocolError> {
    if data.len() < need {
        Err(ProtocolError::Truncated {
            need,
            got: data.len(),
        })
    } else {
        Ok(())
    }
}

/// NUL-pad `s` into an `N`-byte field, truncating so the last byte stays NUL.
pub fn encode_fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let take = s.len().min(N - 1);
    out[..take].copy_from_slice(&s.as_bytes()[..take]);
    out
}

/// Read a NUL-terminated string out of a fixed field.
pub fn decode_fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// CLIENT_CONNECT (0x01), 33 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConnect {
    pub client_version: u8,
    pub player_name: [u8; 32],
}

impl ClientConnect {
    pub fn new(client_version: u8, name: &str) -> Self {
        Self {
            client_version,
            player_name: encode_fixed_str(name),
        }
    }

    pub fn name(&self) -> String {
        decode_fixed_str(&self.player_name)
    }
}

impl Wire for ClientConnect {
    const WIRE_SIZE: usize = 33;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.client_version);
        buf.put_slice(&self.player_name);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        let client_version = data.get_u8();
        let mut player_name = [0u8; 32];
        data.copy_to_slice(&mut player_name);
        Ok(Self {
            client_version,
            player_name,
        })
    }
}

/// CLIENT_DISCONNECT (0x02), 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientDisconnect {
    pub player_id: u32,
    pub reason: DisconnectReason,
}

impl Wire for ClientDisconnect {
    const WIRE_SIZE: usize = 5;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.reason as u8);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            reason: DisconnectReason::try_from(data.get_u8())?,
        })
    }
}

/// CLIENT_PING (0x04), 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientPing {
    pub player_id: u32,
    pub client_timestamp: u32,
}

impl Wire for ClientPing {
    const WIRE_SIZE: usize = 8;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u32(self.client_timestamp);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            client_timestamp: data.get_u32(),
        })
    }
}

/// CLIENT_INPUT (0x10), 16 bytes.
///
/// In Arena mode `target_x`/`target_y` are the world-space movement target.
/// In Scroller mode the client packs an [`input_flags`](crate::packet::input_flags)
/// word into the bit pattern of `target_x`; `target_y` is unused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientInput {
    pub player_id: u32,
    pub target_x: f32,
    pub target_y: f32,
    pub sequence: u32,
}

impl ClientInput {
    /// Build a Scroller-mode input carrying a flags word.
    pub fn from_flags(player_id: u32, flags: u32, sequence: u32) -> Self {
        Self {
            player_id,
            target_x: f32::from_bits(flags),
            target_y: 0.0,
            sequence,
        }
    }

    /// Read the Scroller-mode flags word back out.
    pub fn flags(&self) -> u32 {
        self.target_x.to_bits()
    }
}

impl Wire for ClientInput {
    const WIRE_SIZE: usize = 16;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        put_f32(buf, self.target_x);
        put_f32(buf, self.target_y);
        buf.put_u32(self.sequence);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            target_x: get_f32(&mut data),
            target_y: get_f32(&mut data),
            sequence: data.get_u32(),
        })
    }
}

/// CLIENT_SPLIT (0x11), 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSplit {
    pub player_id: u32,
}

impl Wire for ClientSplit {
    const WIRE_SIZE: usize = 4;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
        })
    }
}

/// CLIENT_EJECT_MASS (0x12), 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientEjectMass {
    pub player_id: u32,
    pub direction_x: f32,
    pub direction_y: f32,
}

impl Wire for ClientEjectMass {
    const WIRE_SIZE: usize = 12;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        put_f32(buf, self.direction_x);
        put_f32(buf, self.direction_y);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            direction_x: get_f32(&mut data),
            direction_y: get_f32(&mut data),
        })
    }
}

/// CLIENT_SET_SKIN (0x13), 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSetSkin {
    pub player_id: u32,
    pub skin_id: u8,
}

impl Wire for ClientSetSkin {
    const WIRE_SIZE: usize = 5;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.skin_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            skin_id: data.get_u8(),
        })
    }
}

/// CLIENT_JOIN_LOBBY (0x14), 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientJoinLobby {
    pub player_id: u32,
    pub game_mode: u8,
    pub difficulty: u8,
    pub map_id: u16,
}

impl Wire for ClientJoinLobby {
    const WIRE_SIZE: usize = 8;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.game_mode);
        buf.put_u8(self.difficulty);
        buf.put_u16(self.map_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            game_mode: data.get_u8(),
            difficulty: data.get_u8(),
            map_id: data.get_u16(),
        })
    }
}

/// CLIENT_LEAVE_LOBBY (0x15), 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientLeaveLobby {
    pub player_id: u32,
}

impl Wire for ClientLeaveLobby {
    const WIRE_SIZE: usize = 4;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
        })
    }
}

// ---------------------------------------------------------------------------
// Server -> Client: connection
// ---------------------------------------------------------------------------

/// SERVER_ACCEPT (0x81), 18 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerAccept {
    pub assigned_player_id: u32,
    pub map_width: f32,
    pub map_height: f32,
    pub starting_mass: f32,
    pub server_tick_rate: u8,
    pub max_players: u8,
}

impl Wire for ServerAccept {
    const WIRE_SIZE: usize = 18;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.assigned_player_id);
        put_f32(buf, self.map_width);
        put_f32(buf, self.map_height);
        put_f32(buf, self.starting_mass);
        buf.put_u8(self.server_tick_rate);
        buf.put_u8(self.max_players);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            assigned_player_id: data.get_u32(),
            map_width: get_f32(&mut data),
            map_height: get_f32(&mut data),
            starting_mass: get_f32(&mut data),
            server_tick_rate: data.get_u8(),
            max_players: data.get_u8(),
        })
    }
}

/// SERVER_REJECT (0x82), 65 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReject {
    pub reason_code: RejectReason,
    pub reason_message: [u8; 64],
}

impl ServerReject {
    pub fn new(reason_code: RejectReason, message: &str) -> Self {
        Self {
            reason_code,
            reason_message: encode_fixed_str(message),
        }
    }

    pub fn message(&self) -> String {
        decode_fixed_str(&self.reason_message)
    }
}

impl Wire for ServerReject {
    const WIRE_SIZE: usize = 65;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.reason_code as u8);
        buf.put_slice(&self.reason_message);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        let reason_code = RejectReason::try_from(data.get_u8())?;
        let mut reason_message = [0u8; 64];
        data.copy_to_slice(&mut reason_message);
        Ok(Self {
            reason_code,
            reason_message,
        })
    }
}

/// SERVER_PONG (0x85), 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPong {
    pub client_timestamp: u32,
    pub server_timestamp: u32,
}

impl Wire for ServerPong {
    const WIRE_SIZE: usize = 8;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.client_timestamp);
        buf.put_u32(self.server_timestamp);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            client_timestamp: data.get_u32(),
            server_timestamp: data.get_u32(),
        })
    }
}

// ---------------------------------------------------------------------------
// Server -> Client: world state
// ---------------------------------------------------------------------------

/// Fixed-point scale for snapshot velocities: world-units/sec × 32.
pub const VELOCITY_SCALE: f32 = 32.0;

/// Pack a velocity component into the snapshot's i16 fixed-point field.
pub fn pack_velocity(v: f32) -> i16 {
    (v * VELOCITY_SCALE)
        .clamp(i16::MIN as f32, i16::MAX as f32)
        .round() as i16
}

/// Unpack a snapshot velocity field back to world-units/sec.
pub fn unpack_velocity(v: i16) -> f32 {
    v as f32 / VELOCITY_SCALE
}

/// SERVER_SNAPSHOT (0xA0) fixed header, 6 bytes, followed by
/// `entity_count` × [`EntityState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    pub server_tick: u32,
    pub entity_count: u16,
}

impl Wire for SnapshotHeader {
    const WIRE_SIZE: usize = 6;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.server_tick);
        buf.put_u16(self.entity_count);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            server_tick: data.get_u32(),
            entity_count: data.get_u16(),
        })
    }
}

/// One entity record inside a snapshot, 25 bytes.
///
/// `owner_id` is the owning player for cells/projectiles (0 for unowned);
/// `subtype` carries the skin/color index for players and the enemy variant
/// for enemies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub entity_id: u32,
    pub entity_type: EntityType,
    pub position_x: f32,
    pub position_y: f32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub health: u16,
    pub flags: u8,
    pub owner_id: u32,
    pub subtype: u8,
}

impl Wire for EntityState {
    const WIRE_SIZE: usize = 25;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.entity_id);
        buf.put_u8(self.entity_type as u8);
        put_f32(buf, self.position_x);
        put_f32(buf, self.position_y);
        buf.put_i16(self.velocity_x);
        buf.put_i16(self.velocity_y);
        buf.put_u16(self.health);
        buf.put_u8(self.flags);
        buf.put_u32(self.owner_id);
        buf.put_u8(self.subtype);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            entity_id: data.get_u32(),
            entity_type: EntityType::try_from(data.get_u8())?,
            position_x: get_f32(&mut data),
            position_y: get_f32(&mut data),
            velocity_x: data.get_i16(),
            velocity_y: data.get_i16(),
            health: data.get_u16(),
            flags: data.get_u8(),
            owner_id: data.get_u32(),
            subtype: data.get_u8(),
        })
    }
}

/// Encode a full snapshot payload: header plus records.
pub fn encode_snapshot(server_tick: u32, states: &[EntityState]) -> BytesMut {
    let mut buf =
        BytesMut::with_capacity(SnapshotHeader::WIRE_SIZE + states.len() * EntityState::WIRE_SIZE);
    SnapshotHeader {
        server_tick,
        entity_count: states.len() as u16,
    }
    .encode(&mut buf);
    for state in states {
        state.encode(&mut buf);
    }
    buf
}

/// Decode a full snapshot payload back into its records.
pub fn decode_snapshot(data: &[u8]) -> Result<(SnapshotHeader, Vec<EntityState>), ProtocolError> {
    let header = SnapshotHeader::decode(data)?;
    let mut rest = &data[SnapshotHeader::WIRE_SIZE..];
    let need = header.entity_count as usize * EntityState::WIRE_SIZE;
    check_len(rest, need)?;
    let mut states = Vec::with_capacity(header.entity_count as usize);
    for _ in 0..header.entity_count {
        states.push(EntityState::decode(rest)?);
        rest = &rest[EntityState::WIRE_SIZE..];
    }
    Ok((header, states))
}

// ---------------------------------------------------------------------------
// Server -> Client: entity events
// ---------------------------------------------------------------------------

/// SERVER_ENTITY_SPAWN (0xB0), 29 bytes.
///
/// `stat` is the mass for Arena entities and the max health for Scroller
/// entities; `color` doubles as the enemy subtype word in Scroller mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntitySpawn {
    pub entity_id: u32,
    pub entity_type: EntityType,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub stat: f32,
    pub color: u32,
    pub owner_id: u32,
    pub owner_tag: [u8; 4],
}

impl Wire for ServerEntitySpawn {
    const WIRE_SIZE: usize = 29;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.entity_id);
        buf.put_u8(self.entity_type as u8);
        put_f32(buf, self.spawn_x);
        put_f32(buf, self.spawn_y);
        put_f32(buf, self.stat);
        buf.put_u32(self.color);
        buf.put_u32(self.owner_id);
        buf.put_slice(&self.owner_tag);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        let entity_id = data.get_u32();
        let entity_type = EntityType::try_from(data.get_u8())?;
        let spawn_x = get_f32(&mut data);
        let spawn_y = get_f32(&mut data);
        let stat = get_f32(&mut data);
        let color = data.get_u32();
        let owner_id = data.get_u32();
        let mut owner_tag = [0u8; 4];
        data.copy_to_slice(&mut owner_tag);
        Ok(Self {
            entity_id,
            entity_type,
            spawn_x,
            spawn_y,
            stat,
            color,
            owner_id,
            owner_tag,
        })
    }
}

/// SERVER_ENTITY_DESTROY (0xB1), 17 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerEntityDestroy {
    pub entity_id: u32,
    pub reason: DestroyReason,
    pub position_x: f32,
    pub position_y: f32,
    pub killer_id: u32,
}

impl Wire for ServerEntityDestroy {
    const WIRE_SIZE: usize = 17;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.entity_id);
        buf.put_u8(self.reason as u8);
        put_f32(buf, self.position_x);
        put_f32(buf, self.position_y);
        buf.put_u32(self.killer_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            entity_id: data.get_u32(),
            reason: DestroyReason::try_from(data.get_u8())?,
            position_x: get_f32(&mut data),
            position_y: get_f32(&mut data),
            killer_id: data.get_u32(),
        })
    }
}

/// SERVER_CELL_MERGE (0xB2), 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerCellMerge {
    pub surviving_id: u32,
    pub absorbed_id: u32,
    pub combined_mass: f32,
}

impl Wire for ServerCellMerge {
    const WIRE_SIZE: usize = 12;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.surviving_id);
        buf.put_u32(self.absorbed_id);
        put_f32(buf, self.combined_mass);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            surviving_id: data.get_u32(),
            absorbed_id: data.get_u32(),
            combined_mass: get_f32(&mut data),
        })
    }
}

/// SERVER_PROJECTILE_SPAWN (0xB3), 23 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerProjectileSpawn {
    pub entity_id: u32,
    pub entity_type: EntityType,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub damage: u16,
}

impl Wire for ServerProjectileSpawn {
    const WIRE_SIZE: usize = 23;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.entity_id);
        buf.put_u8(self.entity_type as u8);
        put_f32(buf, self.spawn_x);
        put_f32(buf, self.spawn_y);
        put_f32(buf, self.velocity_x);
        put_f32(buf, self.velocity_y);
        buf.put_u16(self.damage);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            entity_id: data.get_u32(),
            entity_type: EntityType::try_from(data.get_u8())?,
            spawn_x: get_f32(&mut data),
            spawn_y: get_f32(&mut data),
            velocity_x: get_f32(&mut data),
            velocity_y: get_f32(&mut data),
            damage: data.get_u16(),
        })
    }
}

/// SERVER_EXPLOSION (0xB4), 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerExplosion {
    pub position_x: f32,
    pub position_y: f32,
    pub scale: f32,
    pub source_id: u32,
}

impl Wire for ServerExplosion {
    const WIRE_SIZE: usize = 16;

    fn encode(&self, buf: &mut BytesMut) {
        put_f32(buf, self.position_x);
        put_f32(buf, self.position_y);
        put_f32(buf, self.scale);
        buf.put_u32(self.source_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            position_x: get_f32(&mut data),
            position_y: get_f32(&mut data),
            scale: get_f32(&mut data),
            source_id: data.get_u32(),
        })
    }
}

/// SERVER_SCORE_UPDATE (0xB5), 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerScoreUpdate {
    pub player_id: u32,
    pub score: u32,
    pub delta: u32,
}

impl Wire for ServerScoreUpdate {
    const WIRE_SIZE: usize = 12;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u32(self.score);
        buf.put_u32(self.delta);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            score: data.get_u32(),
            delta: data.get_u32(),
        })
    }
}

/// SERVER_POWERUP_COLLECTED (0xB6), 13 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPowerupCollected {
    pub player_id: u32,
    pub bonus_kind: u8,
    pub position_x: f32,
    pub position_y: f32,
}

impl Wire for ServerPowerupCollected {
    const WIRE_SIZE: usize = 13;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.bonus_kind);
        put_f32(buf, self.position_x);
        put_f32(buf, self.position_y);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            bonus_kind: data.get_u8(),
            position_x: get_f32(&mut data),
            position_y: get_f32(&mut data),
        })
    }
}

/// SERVER_PLAYER_RESPAWN (0xB7), 13 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPlayerRespawn {
    pub player_id: u32,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub lives_remaining: u8,
}

impl Wire for ServerPlayerRespawn {
    const WIRE_SIZE: usize = 13;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        put_f32(buf, self.spawn_x);
        put_f32(buf, self.spawn_y);
        buf.put_u8(self.lives_remaining);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            spawn_x: get_f32(&mut data),
            spawn_y: get_f32(&mut data),
            lives_remaining: data.get_u8(),
        })
    }
}

/// SERVER_PLAYER_LEVEL_UP (0xB8), 6 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPlayerLevelUp {
    pub player_id: u32,
    pub level: u8,
    pub skin_id: u8,
}

impl Wire for ServerPlayerLevelUp {
    const WIRE_SIZE: usize = 6;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.level);
        buf.put_u8(self.skin_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            level: data.get_u8(),
            skin_id: data.get_u8(),
        })
    }
}

/// SERVER_WAVE_START (0xB9), 28 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerWaveStart {
    pub wave_number: u32,
    pub total_waves: u16,
    pub scroll_distance: f32,
    pub expected_enemies: u16,
    pub wave_name: [u8; 16],
}

impl ServerWaveStart {
    pub fn name(&self) -> String {
        decode_fixed_str(&self.wave_name)
    }
}

impl Wire for ServerWaveStart {
    const WIRE_SIZE: usize = 28;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.wave_number);
        buf.put_u16(self.total_waves);
        put_f32(buf, self.scroll_distance);
        buf.put_u16(self.expected_enemies);
        buf.put_slice(&self.wave_name);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        let wave_number = data.get_u32();
        let total_waves = data.get_u16();
        let scroll_distance = get_f32(&mut data);
        let expected_enemies = data.get_u16();
        let mut wave_name = [0u8; 16];
        data.copy_to_slice(&mut wave_name);
        Ok(Self {
            wave_number,
            total_waves,
            scroll_distance,
            expected_enemies,
            wave_name,
        })
    }
}

/// SERVER_WAVE_COMPLETE (0xBA), 13 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerWaveComplete {
    pub wave_number: u32,
    pub completion_time_ms: u32,
    pub enemies_killed: u16,
    pub bonus_points: u16,
    pub all_waves_complete: u8,
}

impl Wire for ServerWaveComplete {
    const WIRE_SIZE: usize = 13;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.wave_number);
        buf.put_u32(self.completion_time_ms);
        buf.put_u16(self.enemies_killed);
        buf.put_u16(self.bonus_points);
        buf.put_u8(self.all_waves_complete);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            wave_number: data.get_u32(),
            completion_time_ms: data.get_u32(),
            enemies_killed: data.get_u16(),
            bonus_points: data.get_u16(),
            all_waves_complete: data.get_u8(),
        })
    }
}

// ---------------------------------------------------------------------------
// Server -> Client: game events
// ---------------------------------------------------------------------------

/// SERVER_PLAYER_EATEN (0xC0), 12 bytes. Sent when a player loses their
/// last cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPlayerEaten {
    pub player_id: u32,
    pub killer_id: u32,
    pub final_mass: f32,
}

impl Wire for ServerPlayerEaten {
    const WIRE_SIZE: usize = 12;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u32(self.killer_id);
        put_f32(buf, self.final_mass);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            killer_id: data.get_u32(),
            final_mass: get_f32(&mut data),
        })
    }
}

/// One leaderboard row, 40 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub player_id: u32,
    pub player_name: [u8; 32],
    pub total_mass: f32,
}

impl LeaderboardEntry {
    pub fn new(player_id: u32, name: &str, total_mass: f32) -> Self {
        Self {
            player_id,
            player_name: encode_fixed_str(name),
            total_mass,
        }
    }

    pub fn name(&self) -> String {
        decode_fixed_str(&self.player_name)
    }
}

impl Wire for LeaderboardEntry {
    const WIRE_SIZE: usize = 40;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_slice(&self.player_name);
        put_f32(buf, self.total_mass);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        let player_id = data.get_u32();
        let mut player_name = [0u8; 32];
        data.copy_to_slice(&mut player_name);
        let total_mass = get_f32(&mut data);
        Ok(Self {
            player_id,
            player_name,
            total_mass,
        })
    }
}

/// Encode a SERVER_LEADERBOARD (0xC1) payload: `entry_count u8` then the
/// entries. At most 10 entries go on the wire.
pub fn encode_leaderboard(entries: &[LeaderboardEntry]) -> BytesMut {
    let count = entries.len().min(10);
    let mut buf = BytesMut::with_capacity(1 + count * LeaderboardEntry::WIRE_SIZE);
    buf.put_u8(count as u8);
    for entry in &entries[..count] {
        entry.encode(&mut buf);
    }
    buf
}

/// Decode a SERVER_LEADERBOARD payload.
pub fn decode_leaderboard(data: &[u8]) -> Result<Vec<LeaderboardEntry>, ProtocolError> {
    check_len(data, 1)?;
    let count = data[0] as usize;
    let mut rest = &data[1..];
    check_len(rest, count * LeaderboardEntry::WIRE_SIZE)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(LeaderboardEntry::decode(rest)?);
        rest = &rest[LeaderboardEntry::WIRE_SIZE..];
    }
    Ok(entries)
}

/// SERVER_PLAYER_SKIN (0xC2), 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerPlayerSkin {
    pub player_id: u32,
    pub skin_id: u8,
}

impl Wire for ServerPlayerSkin {
    const WIRE_SIZE: usize = 5;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.player_id);
        buf.put_u8(self.skin_id);
    }

    fn decode(mut data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(data, Self::WIRE_SIZE)?;
        Ok(Self {
            player_id: data.get_u32(),
            skin_id: data.get_u8(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Wire + PartialEq + std::fmt::Debug>(payload: T) {
        let bytes = payload.to_bytes();
        assert_eq!(bytes.len(), T::WIRE_SIZE, "encoded length != WIRE_SIZE");
        assert_eq!(T::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn wire_sizes_are_frozen() {
        assert_eq!(ClientConnect::WIRE_SIZE, 33);
        assert_eq!(ClientDisconnect::WIRE_SIZE, 5);
        assert_eq!(ClientPing::WIRE_SIZE, 8);
        assert_eq!(ClientInput::WIRE_SIZE, 16);
        assert_eq!(ClientSplit::WIRE_SIZE, 4);
        assert_eq!(ClientEjectMass::WIRE_SIZE, 12);
        assert_eq!(ClientSetSkin::WIRE_SIZE, 5);
        assert_eq!(ClientJoinLobby::WIRE_SIZE, 8);
        assert_eq!(ClientLeaveLobby::WIRE_SIZE, 4);
        assert_eq!(ServerAccept::WIRE_SIZE, 18);
        assert_eq!(ServerReject::WIRE_SIZE, 65);
        assert_eq!(ServerPong::WIRE_SIZE, 8);
        assert_eq!(SnapshotHeader::WIRE_SIZE, 6);
        assert_eq!(EntityState::WIRE_SIZE, 25);
        assert_eq!(ServerEntitySpawn::WIRE_SIZE, 29);
        assert_eq!(ServerEntityDestroy::WIRE_SIZE, 17);
        assert_eq!(ServerCellMerge::WIRE_SIZE, 12);
        assert_eq!(ServerProjectileSpawn::WIRE_SIZE, 23);
        assert_eq!(ServerExplosion::WIRE_SIZE, 16);
        assert_eq!(ServerScoreUpdate::WIRE_SIZE, 12);
        assert_eq!(ServerPowerupCollected::WIRE_SIZE, 13);
        assert_eq!(ServerPlayerRespawn::WIRE_SIZE, 13);
        assert_eq!(ServerPlayerLevelUp::WIRE_SIZE, 6);
        assert_eq!(ServerWaveStart::WIRE_SIZE, 28);
        assert_eq!(ServerWaveComplete::WIRE_SIZE, 13);
        assert_eq!(ServerPlayerEaten::WIRE_SIZE, 12);
        assert_eq!(LeaderboardEntry::WIRE_SIZE, 40);
        assert_eq!(ServerPlayerSkin::WIRE_SIZE, 5);
    }

    #[test]
    fn client_payload_roundtrips() {
        roundtrip(ClientConnect::new(1, "orbital"));
        roundtrip(ClientDisconnect {
            player_id: 3,
            reason: DisconnectReason::Timeout,
        });
        roundtrip(ClientPing {
            player_id: 3,
            client_timestamp: 0xDEADBEEF,
        });
        roundtrip(ClientInput {
            player_id: 9,
            target_x: 123.25,
            target_y: -44.5,
            sequence: 77,
        });
        roundtrip(ClientSplit { player_id: 5 });
        roundtrip(ClientEjectMass {
            player_id: 5,
            direction_x: 0.6,
            direction_y: -0.8,
        });
        roundtrip(ClientJoinLobby {
            player_id: 2,
            game_mode: 1,
            difficulty: 2,
            map_id: 3,
        });
    }

    #[test]
    fn server_payload_roundtrips() {
        roundtrip(ServerAccept {
            assigned_player_id: 7,
            map_width: 4000.0,
            map_height: 4000.0,
            starting_mass: 20.0,
            server_tick_rate: 32,
            max_players: 16,
        });
        roundtrip(ServerReject::new(RejectReason::ServerFull, "lobby is full"));
        roundtrip(ServerEntitySpawn {
            entity_id: 12,
            entity_type: EntityType::EnemyTank,
            spawn_x: 1800.0,
            spawn_y: 340.0,
            stat: 60.0,
            color: 0x00FF00FF,
            owner_id: 0,
            owner_tag: [0; 4],
        });
        roundtrip(ServerEntityDestroy {
            entity_id: 12,
            reason: DestroyReason::Killed,
            position_x: 100.0,
            position_y: 50.0,
            killer_id: 1,
        });
        roundtrip(ServerProjectileSpawn {
            entity_id: 40,
            entity_type: EntityType::ProjectilePlayer,
            spawn_x: 120.0,
            spawn_y: 130.0,
            velocity_x: 400.0,
            velocity_y: 0.0,
            damage: 10,
        });
        roundtrip(ServerWaveStart {
            wave_number: 2,
            total_waves: 5,
            scroll_distance: 200.0,
            expected_enemies: 3,
            wave_name: encode_fixed_str("Wave 2"),
        });
        roundtrip(ServerPlayerEaten {
            player_id: 4,
            killer_id: 2,
            final_mass: 88.5,
        });
    }

    #[test]
    fn snapshot_roundtrips_and_sizes() {
        let states = vec![
            EntityState {
                entity_id: 1,
                entity_type: EntityType::Player,
                position_x: 100.0,
                position_y: 200.0,
                velocity_x: pack_velocity(120.0),
                velocity_y: pack_velocity(-30.0),
                health: 100,
                flags: 0,
                owner_id: 1,
                subtype: 2,
            },
            EntityState {
                entity_id: 9,
                entity_type: EntityType::Food,
                position_x: 1.5,
                position_y: 2.5,
                velocity_x: 0,
                velocity_y: 0,
                health: 0,
                flags: 0,
                owner_id: 0,
                subtype: 0,
            },
        ];
        let buf = encode_snapshot(31, &states);
        assert_eq!(buf.len(), 6 + 2 * 25);

        let (header, decoded) = decode_snapshot(&buf).unwrap();
        assert_eq!(header.server_tick, 31);
        assert_eq!(header.entity_count, 2);
        assert_eq!(decoded, states);
    }

    #[test]
    fn velocity_fixed_point_is_close() {
        for v in [-800.0f32, -1.0, 0.0, 0.5, 333.3, 1000.0] {
            let packed = pack_velocity(v);
            assert!((unpack_velocity(packed) - v).abs() <= 1.0 / VELOCITY_SCALE);
        }
        // Saturates instead of wrapping.
        assert_eq!(pack_velocity(10_000.0), i16::MAX);
        assert_eq!(pack_velocity(-10_000.0), i16::MIN);
    }

    #[test]
    fn leaderboard_caps_at_ten_entries() {
        let entries: Vec<_> = (0..14)
            .map(|i| LeaderboardEntry::new(i, &format!("p{i}"), i as f32 * 10.0))
            .collect();
        let buf = encode_leaderboard(&entries);
        assert_eq!(buf.len(), 1 + 10 * 40);
        let decoded = decode_leaderboard(&buf).unwrap();
        assert_eq!(decoded.len(), 10);
        assert_eq!(decoded[3].name(), "p3");
    }

    #[test]
    fn fixed_str_truncates_and_keeps_nul() {
        let field: [u8; 8] = encode_fixed_str("abcdefghijk");
        assert_eq!(&field, b"abcdefg\0");
        assert_eq!(decode_fixed_str(&field), "abcdefg");
        let short: [u8; 8] = encode_fixed_str("ab");
        assert_eq!(decode_fixed_str(&short), "ab");
    }

    #[test]
    fn scroller_flags_survive_the_float_field() {
        use crate::packet::input_flags;
        let flags = input_flags::UP | input_flags::RIGHT | input_flags::FIRE;
        let input = ClientInput::from_flags(1, flags, 5);
        let decoded = ClientInput::decode(&input.to_bytes()).unwrap();
        assert_eq!(decoded.flags(), flags);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let buf = ClientInput {
            player_id: 1,
            target_x: 0.0,
            target_y: 0.0,
            sequence: 0,
        }
        .to_bytes();
        assert!(matches!(
            ClientInput::decode(&buf[..10]),
            Err(ProtocolError::Truncated { need: 16, got: 10 })
        ));
    }
}
