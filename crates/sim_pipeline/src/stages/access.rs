//! Access stage: login and logout.
//!
//! Login authenticates against the provider, scrubs the password bytes the
//! moment they have been consumed, links the controller to its requested
//! actor under the take-over protocol, and opens a session with a running
//! send queue. Logout unwinds all of it in reverse.

use tracing::{debug, error, info};
use world_core::Zone;

use crate::auth::AuthProvider;
use crate::requests::{LoginRequest, LogoutRequest, OutboundBody};
use crate::session::SessionRegistry;

/// What a login attempt came to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session opened and driver link established
    Accepted(world_core::UserId),
    /// The user already has a live session; nothing changed
    Duplicate,
    /// Bad credentials, unknown actor, or a lost take-over race
    Rejected,
}

/// Processes one login request.
///
/// The password is scrubbed before this function returns on every path,
/// including rejection. A duplicate login (user already has a session) is a
/// no-op without an acknowledgment; every other rejection acks with a
/// failure code so the client can give up promptly.
pub fn handle_login(
    zone: &Zone,
    sessions: &SessionRegistry,
    provider: &dyn AuthProvider,
    req: &mut LoginRequest,
) -> LoginOutcome {
    let authenticated = provider.check_authentication(&req.user, &req.password);
    req.scrub();

    let Some(user) = authenticated else {
        debug!("🔐 Login rejected for `{}`: bad credentials", req.user);
        sessions.deliver_unsessioned(OutboundBody::LoginAck { ok: false });
        return LoginOutcome::Rejected;
    };

    if sessions.contains(user) {
        debug!("🔐 Duplicate login for {}, ignored", user);
        return LoginOutcome::Duplicate;
    }

    if !zone.contains_actor(req.actor) || !provider.may_drive(user, req.actor) {
        debug!("🔐 Login rejected for {}: cannot drive {}", user, req.actor);
        sessions.deliver_unsessioned(OutboundBody::LoginAck { ok: false });
        return LoginOutcome::Rejected;
    }

    if !zone.connect_driver(user, req.actor) {
        debug!("🔐 Login rejected for {}: {} already taken over", user, req.actor);
        sessions.deliver_unsessioned(OutboundBody::LoginAck { ok: false });
        return LoginOutcome::Rejected;
    }

    let skills = provider.player_skills(user);
    match sessions.register(user, req.actor, skills) {
        Ok(session) => {
            session.send(OutboundBody::LoginAck { ok: true });
            info!("🔐 {} logged in, driving {}", user, req.actor);
            LoginOutcome::Accepted(user)
        }
        Err(e) => {
            error!("Failed to open session for {}: {e}", user);
            zone.disconnect_driver(user, req.actor);
            sessions.deliver_unsessioned(OutboundBody::LoginAck { ok: false });
            LoginOutcome::Rejected
        }
    }
}

/// Processes one logout request.
///
/// Severs every driver link the controller holds, closes the session, and
/// delivers the logout ack as the session's final packet. Logging out a
/// user with no session is a no-op.
///
/// # Returns
///
/// `true` when a session was actually closed.
pub fn handle_logout(zone: &Zone, sessions: &SessionRegistry, req: LogoutRequest) -> bool {
    let Some(session) = sessions.close(req.user, OutboundBody::LogoutAck) else {
        debug!("🔐 Logout for {} with no session, ignored", req.user);
        return false;
    };
    if let Some(actor) = session.slave() {
        zone.disconnect_driver(req.user, actor);
    }
    for actor in zone.release_driver(req.user) {
        debug!("🔗 {} reverted to its default controller", actor);
    }
    info!("🔐 {} logged out", req.user);
    true
}
