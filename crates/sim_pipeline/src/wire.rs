//! Wire translation: byte-order conversion and fixed-point encoding.
//!
//! Inbound frames arrive from the transport in network byte order; the parse
//! functions here convert every multi-byte field to host order exactly once,
//! at the queue boundary, so stage code never sees a big-endian value.
//! Outbound state is encoded as fixed-point integers: positions at
//! centimeter resolution, orientations at one ten-thousandth of a radian.
//! The loss of sub-resolution precision is deliberate; the authoritative
//! `f64` state never leaves the zone.

use world_core::{Actor, ActorId, SkillId, UserId, Vec3};

use crate::requests::{ActionRequest, LoginRequest};

/// Fixed-point scale for positions and velocities (units to hundredths).
pub const POSITION_SCALE: f64 = 100.0;

/// Fixed-point scale for orientations and rotation rates (radians to
/// ten-thousandths).
pub const ORIENTATION_SCALE: f64 = 10_000.0;

/// Encodes a world-space value as a fixed-point integer.
pub fn encode_fixed(value: f64, scale: f64) -> i32 {
    (value * scale).round() as i32
}

/// Decodes a fixed-point integer back to a world-space value.
pub fn decode_fixed(raw: i32, scale: f64) -> f64 {
    raw as f64 / scale
}

fn encode_vec(v: Vec3, scale: f64) -> [i32; 3] {
    [
        encode_fixed(v.x, scale),
        encode_fixed(v.y, scale),
        encode_fixed(v.z, scale),
    ]
}

/// Fixed-point snapshot of one actor's simulated state, as broadcast to
/// every connected session by the update stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRecord {
    /// Raw actor id
    pub actor: u64,
    /// Position, fixed-point at [`POSITION_SCALE`]
    pub position: [i32; 3],
    /// Orientation, fixed-point at [`ORIENTATION_SCALE`]
    pub rotation: [i32; 3],
    /// Movement velocity, fixed-point at [`POSITION_SCALE`]
    pub movement: [i32; 3],
}

impl PositionRecord {
    /// Snapshots an actor into wire form.
    pub fn encode(actor: &Actor) -> Self {
        Self {
            actor: actor.id.0,
            position: encode_vec(actor.position, POSITION_SCALE),
            rotation: encode_vec(actor.rotation, ORIENTATION_SCALE),
            movement: encode_vec(actor.movement, POSITION_SCALE),
        }
    }

    /// Serializes the record in network byte order for the transport.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 9 * 4);
        out.extend_from_slice(&self.actor.to_be_bytes());
        for field in [self.position, self.rotation, self.movement] {
            for component in field {
                out.extend_from_slice(&component.to_be_bytes());
            }
        }
        out
    }

    /// The position in world space (at fixed-point resolution).
    pub fn decode_position(&self) -> Vec3 {
        Vec3::new(
            decode_fixed(self.position[0], POSITION_SCALE),
            decode_fixed(self.position[1], POSITION_SCALE),
            decode_fixed(self.position[2], POSITION_SCALE),
        )
    }
}

/// Cursor over an inbound frame that pops network-order fields.
///
/// Every accessor returns `None` on underrun; a frame too short to parse is
/// dropped by the caller, never partially applied.
struct FrameReader<'a> {
    buf: &'a [u8],
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|raw| raw as i32)
    }

    fn u64(&mut self) -> Option<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Some(u64::from_be_bytes(raw))
    }
}

/// Parses a login frame.
///
/// Layout: `[u16 name_len][name][u16 pass_len][password][u64 actor]`, all
/// integers big-endian. Returns `None` on underrun or a name that is not
/// UTF-8.
pub fn parse_login(frame: &[u8]) -> Option<LoginRequest> {
    let mut reader = FrameReader::new(frame);
    let name_len = reader.u16()? as usize;
    let name = std::str::from_utf8(reader.take(name_len)?).ok()?;
    let pass_len = reader.u16()? as usize;
    let password = reader.take(pass_len)?.to_vec();
    let actor = ActorId(reader.u64()?);
    Some(LoginRequest {
        user: name.to_string(),
        password,
        actor,
    })
}

/// Parses an action frame.
///
/// Layout: `[u64 user][u64 actor][u32 skill][i32 power][u64 target]`, all
/// integers big-endian; a zero target means "no target".
pub fn parse_action(frame: &[u8]) -> Option<ActionRequest> {
    let mut reader = FrameReader::new(frame);
    let user = UserId(reader.u64()?);
    let actor = ActorId(reader.u64()?);
    let skill = SkillId(reader.u32()?);
    let power = reader.i32()?;
    let target = match reader.u64()? {
        0 => None,
        id => Some(ActorId(id)),
    };
    Some(ActionRequest {
        user,
        actor,
        skill,
        power,
        target,
    })
}
