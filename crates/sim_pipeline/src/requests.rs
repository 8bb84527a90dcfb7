//! Request and outbound packet types carried by the stage pools.
//!
//! Inbound requests are already in host byte order by the time they reach a
//! pool; the boundary conversion lives in [`wire`](crate::wire). Login
//! requests carry the raw password bytes and are scrubbed in place by the
//! access stage the moment authentication has consumed them, so credential
//! material never outlives its one hop through the queue.

use world_core::{ActorId, SkillId, UserId};

/// Credentials plus the actor the controller wants to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account name as sent by the client
    pub user: String,
    /// Raw password bytes; zeroed by [`scrub`](Self::scrub) after use
    pub password: Vec<u8>,
    /// Actor the controller asks to drive on success
    pub actor: ActorId,
}

impl LoginRequest {
    /// Overwrites the password bytes with zeroes and empties the buffer.
    ///
    /// Called by the access stage immediately after the authentication
    /// check, success or failure.
    pub fn scrub(&mut self) {
        for byte in &mut self.password {
            *byte = 0;
        }
        self.password.clear();
    }
}

/// Orderly departure of an authenticated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutRequest {
    pub user: UserId,
}

/// Item type of the access pool: login and logout share one queue so their
/// relative order per controller is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequest {
    Login(LoginRequest),
    Logout(LogoutRequest),
}

/// A skill invocation by a controller against an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRequest {
    /// Requesting controller
    pub user: UserId,
    /// Actor the skill is performed by
    pub actor: ActorId,
    /// Requested skill; substituted by the registry if not valid
    pub skill: SkillId,
    /// Requested power level, clamped by the skill definition
    pub power: i32,
    /// Optional target actor
    pub target: Option<ActorId>,
}

/// One motion integration step for an actor.
///
/// Moving actors re-enqueue themselves; stationary actors drop out of the
/// loop until an action or spawn pushes them again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionRequest {
    pub actor: ActorId,
}

/// One broadcast of an actor's post-integration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    pub actor: ActorId,
}

/// Payload of an outbound packet, before the per-session sequence stamp.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Result of a login attempt
    LoginAck { ok: bool },
    /// Confirmation of an orderly logout
    LogoutAck,
    /// Return code of an executed skill handler
    ActionAck { code: i32 },
    /// Fixed-point state record of a simulated actor
    PositionUpdate(crate::wire::PositionRecord),
}

/// A sequenced packet bound for one session's transport.
///
/// The sequence number is private to the receiving session and stamped at
/// enqueue time, so each client observes a gapless monotonic stream
/// regardless of how many actors it is watching.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPacket {
    pub sequence: u32,
    pub body: OutboundBody,
}
