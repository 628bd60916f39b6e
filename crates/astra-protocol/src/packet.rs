//! Packet header, packet type codes, entity type codes, and reason enums.
//!
//! The exact numeric values are on-the-wire contract; clients match on them
//! byte for byte.

use bytes::{Buf, BufMut, BytesMut};

use crate::ProtocolError;

/// First magic byte of every packet.
pub const MAGIC_HI: u8 = 0xAB;
/// Second magic byte of every packet.
pub const MAGIC_LO: u8 = 0x7E;
/// Size of the fixed packet header in bytes.
pub const HEADER_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// Packet type identifiers.
///
/// Range allocation:
/// - `0x01-0x04`: connection management (client to server)
/// - `0x10-0x1F`: player input (client to server)
/// - `0x81-0x8F`: connection responses (server to client)
/// - `0xA0-0xAF`: world state (server to client)
/// - `0xB0-0xBF`: entity events (server to client)
/// - `0xC0-0xCF`: game events (server to client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    ClientConnect = 0x01,
    ClientDisconnect = 0x02,
    ClientPing = 0x04,
    ClientInput = 0x10,
    ClientSplit = 0x11,
    ClientEjectMass = 0x12,
    ClientSetSkin = 0x13,
    ClientJoinLobby = 0x14,
    ClientLeaveLobby = 0x15,
    ServerAccept = 0x81,
    ServerReject = 0x82,
    ServerPong = 0x85,
    ServerSnapshot = 0xA0,
    ServerEntitySpawn = 0xB0,
    ServerEntityDestroy = 0xB1,
    ServerCellMerge = 0xB2,
    ServerProjectileSpawn = 0xB3,
    ServerExplosion = 0xB4,
    ServerScoreUpdate = 0xB5,
    ServerPowerupCollected = 0xB6,
    ServerPlayerRespawn = 0xB7,
    ServerPlayerLevelUp = 0xB8,
    ServerWaveStart = 0xB9,
    ServerWaveComplete = 0xBA,
    ServerPlayerEaten = 0xC0,
    ServerLeaderboard = 0xC1,
    ServerPlayerSkin = 0xC2,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use PacketType::*;
        Ok(match value {
            0x01 => ClientConnect,
            0x02 => ClientDisconnect,
            0x04 => ClientPing,
            0x10 => ClientInput,
            0x11 => ClientSplit,
            0x12 => ClientEjectMass,
            0x13 => ClientSetSkin,
            0x14 => ClientJoinLobby,
            0x15 => ClientLeaveLobby,
            0x81 => ServerAccept,
            0x82 => ServerReject,
            0x85 => ServerPong,
            0xA0 => ServerSnapshot,
            0xB0 => ServerEntitySpawn,
            0xB1 => ServerEntityDestroy,
            0xB2 => ServerCellMerge,
            0xB3 => ServerProjectileSpawn,
            0xB4 => ServerExplosion,
            0xB5 => ServerScoreUpdate,
            0xB6 => ServerPowerupCollected,
            0xB7 => ServerPlayerRespawn,
            0xB8 => ServerPlayerLevelUp,
            0xB9 => ServerWaveStart,
            0xBA => ServerWaveComplete,
            0xC0 => ServerPlayerEaten,
            0xC1 => ServerLeaderboard,
            0xC2 => ServerPlayerSkin,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Entity type identifiers used in snapshots and spawn/destroy events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityType {
    Player = 0x01,
    EnemyBasic = 0x02,
    EnemyFast = 0x03,
    EnemyTank = 0x04,
    EnemyBoss = 0x05,
    ProjectilePlayer = 0x06,
    ProjectileEnemy = 0x07,
    Wall = 0x08,
    BonusHealth = 0x09,
    BonusShield = 0x0A,
    BonusSpeed = 0x0B,
    Food = 0x0C,
    Virus = 0x0D,
    EjectedMass = 0x0E,
    PlayerCell = 0x0F,
}

impl TryFrom<u8> for EntityType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use EntityType::*;
        Ok(match value {
            0x01 => Player,
            0x02 => EnemyBasic,
            0x03 => EnemyFast,
            0x04 => EnemyTank,
            0x05 => EnemyBoss,
            0x06 => ProjectilePlayer,
            0x07 => ProjectileEnemy,
            0x08 => Wall,
            0x09 => BonusHealth,
            0x0A => BonusShield,
            0x0B => BonusSpeed,
            0x0C => Food,
            0x0D => Virus,
            0x0E => EjectedMass,
            0x0F => PlayerCell,
            other => return Err(ProtocolError::UnknownEntityType(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

/// Why a connection attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    ServerFull = 0x01,
    VersionMismatch = 0x02,
    InvalidName = 0x03,
}

impl TryFrom<u8> for RejectReason {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => RejectReason::ServerFull,
            0x02 => RejectReason::VersionMismatch,
            0x03 => RejectReason::InvalidName,
            other => return Err(ProtocolError::UnknownReason(other)),
        })
    }
}

/// Why an entity left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DestroyReason {
    Eaten = 0x01,
    Merged = 0x02,
    Decayed = 0x03,
    OutOfBounds = 0x04,
    Killed = 0x05,
}

impl TryFrom<u8> for DestroyReason {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => DestroyReason::Eaten,
            0x02 => DestroyReason::Merged,
            0x03 => DestroyReason::Decayed,
            0x04 => DestroyReason::OutOfBounds,
            0x05 => DestroyReason::Killed,
            other => return Err(ProtocolError::UnknownReason(other)),
        })
    }
}

/// Why a client disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectReason {
    UserQuit = 0x01,
    Timeout = 0x02,
    Kicked = 0x03,
    ServerShutdown = 0x04,
}

impl TryFrom<u8> for DisconnectReason {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => DisconnectReason::UserQuit,
            0x02 => DisconnectReason::Timeout,
            0x03 => DisconnectReason::Kicked,
            0x04 => DisconnectReason::ServerShutdown,
            other => return Err(ProtocolError::UnknownReason(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Input flags (Scroller mode)
// ---------------------------------------------------------------------------

/// Direction and trigger flags for Scroller-mode input. The client packs
/// these into the `target_x` field of the input payload (see
/// [`payload::ClientInput`](crate::payload::ClientInput)).
pub mod input_flags {
    pub const UP: u32 = 1 << 0;
    pub const DOWN: u32 = 1 << 1;
    pub const LEFT: u32 = 1 << 2;
    pub const RIGHT: u32 = 1 << 3;
    pub const FIRE: u32 = 1 << 4;
    pub const FIRE_RELEASE: u32 = 1 << 5;
}

// ---------------------------------------------------------------------------
// PacketHeader
// ---------------------------------------------------------------------------

/// The fixed 8-byte header preceding every payload.
///
/// Layout: `magic_hi u8, magic_lo u8, packet_type u8, flags u8,
/// payload_len u16 BE, sequence u16 BE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub payload_len: u16,
    pub sequence: u16,
}

impl PacketHeader {
    /// Append the 8 header bytes to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(MAGIC_HI);
        buf.put_u8(MAGIC_LO);
        buf.put_u8(self.packet_type as u8);
        buf.put_u8(self.flags);
        buf.put_u16(self.payload_len);
        buf.put_u16(self.sequence);
    }

    /// Decode a header from the front of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                need: HEADER_SIZE,
                got: data.len(),
            });
        }
        let mut buf = data;
        let hi = buf.get_u8();
        let lo = buf.get_u8();
        if hi != MAGIC_HI || lo != MAGIC_LO {
            return Err(ProtocolError::BadMagic(hi, lo));
        }
        let packet_type = PacketType::try_from(buf.get_u8())?;
        let flags = buf.get_u8();
        let payload_len = buf.get_u16();
        let sequence = buf.get_u16();
        Ok(Self {
            packet_type,
            flags,
            payload_len,
            sequence,
        })
    }
}

/// Frame a payload into a complete packet: header plus payload bytes.
pub fn frame(packet_type: PacketType, sequence: u16, payload: &[u8]) -> BytesMut {
    let header = PacketHeader {
        packet_type,
        flags: 0,
        payload_len: payload.len() as u16,
        sequence,
    };
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    header.encode(&mut buf);
    buf.put_slice(payload);
    buf
}

/// Validate a whole datagram: magic, known type, and length agreement.
/// Returns the header and the payload slice.
pub fn validate(data: &[u8]) -> Result<(PacketHeader, &[u8]), ProtocolError> {
    let header = PacketHeader::decode(data)?;
    let payload = &data[HEADER_SIZE..];
    if payload.len() != header.payload_len as usize {
        return Err(ProtocolError::LengthMismatch {
            header: header.payload_len as usize,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = PacketHeader {
            packet_type: PacketType::ServerSnapshot,
            flags: 0,
            payload_len: 131,
            sequence: 42,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(PacketHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn header_layout_is_frozen() {
        let header = PacketHeader {
            packet_type: PacketType::ClientInput,
            flags: 0x07,
            payload_len: 0x0102,
            sequence: 0x0304,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        // Big-endian u16s, magic first.
        assert_eq!(&buf[..], &[0xAB, 0x7E, 0x10, 0x07, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn bad_magic_rejected() {
        let data = [0x00, 0x7E, 0x10, 0, 0, 0, 0, 0];
        assert_eq!(
            PacketHeader::decode(&data),
            Err(ProtocolError::BadMagic(0x00, 0x7E))
        );
    }

    #[test]
    fn unknown_type_rejected() {
        let data = [MAGIC_HI, MAGIC_LO, 0x7F, 0, 0, 0, 0, 0];
        assert_eq!(
            PacketHeader::decode(&data),
            Err(ProtocolError::UnknownPacketType(0x7F))
        );
    }

    #[test]
    fn truncated_header_rejected() {
        let data = [MAGIC_HI, MAGIC_LO, 0x10];
        assert!(matches!(
            PacketHeader::decode(&data),
            Err(ProtocolError::Truncated { need: 8, got: 3 })
        ));
    }

    #[test]
    fn validate_checks_payload_length() {
        let packet = frame(PacketType::ClientSplit, 1, &[0, 0, 0, 9]);
        let (header, payload) = validate(&packet).unwrap();
        assert_eq!(header.packet_type, PacketType::ClientSplit);
        assert_eq!(payload, &[0, 0, 0, 9]);

        let mut tampered = packet.to_vec();
        tampered.pop();
        assert!(matches!(
            validate(&tampered),
            Err(ProtocolError::LengthMismatch { header: 4, actual: 3 })
        ));
    }

    #[test]
    fn packet_type_codes_are_exact() {
        assert_eq!(PacketType::ClientConnect as u8, 0x01);
        assert_eq!(PacketType::ClientInput as u8, 0x10);
        assert_eq!(PacketType::ClientJoinLobby as u8, 0x14);
        assert_eq!(PacketType::ServerAccept as u8, 0x81);
        assert_eq!(PacketType::ServerSnapshot as u8, 0xA0);
        assert_eq!(PacketType::ServerEntitySpawn as u8, 0xB0);
        assert_eq!(PacketType::ServerWaveComplete as u8, 0xBA);
        assert_eq!(PacketType::ServerPlayerEaten as u8, 0xC0);
        assert_eq!(PacketType::ServerPlayerSkin as u8, 0xC2);
    }

    #[test]
    fn entity_type_codes_are_exact() {
        assert_eq!(EntityType::Player as u8, 0x01);
        assert_eq!(EntityType::EnemyBoss as u8, 0x05);
        assert_eq!(EntityType::Wall as u8, 0x08);
        assert_eq!(EntityType::Food as u8, 0x0C);
        assert_eq!(EntityType::PlayerCell as u8, 0x0F);
    }

    #[test]
    fn every_packet_type_roundtrips_through_u8() {
        for code in 0x00..=0xFFu8 {
            if let Ok(pt) = PacketType::try_from(code) {
                assert_eq!(pt as u8, code);
            }
        }
    }
}
