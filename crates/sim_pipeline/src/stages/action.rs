//! Action stage: validated skill execution.
//!
//! A request survives four checks before its handler runs: the requester
//! has a session, the requester is the actor's live driver, the skill
//! resolves to a valid definition, and any target is interactive. The
//! effective power is the requested power floored at the controller's
//! authorized level, then clamped to the skill's band. Requests that fail a
//! check are dropped without acknowledgment; only an executed handler's
//! return code is acked.

use tracing::debug;
use world_core::Zone;

use crate::requests::{ActionRequest, OutboundBody};
use crate::session::SessionRegistry;
use crate::skills::{SkillContext, SkillRegistry};

/// Processes one action request.
///
/// # Returns
///
/// The handler's return code when the skill executed, `None` when the
/// request was dropped at any validation step.
pub fn handle(
    zone: &Zone,
    sessions: &SessionRegistry,
    skills: &SkillRegistry,
    req: &ActionRequest,
) -> Option<i32> {
    let Some(session) = sessions.get(req.user) else {
        debug!("⚔️ Action from {} without a session, dropped", req.user);
        return None;
    };

    if zone.driver_of(req.actor) != Some(req.user) {
        debug!("⚔️ {} is not driving {}, action dropped", req.user, req.actor);
        return None;
    }

    let Some((skill, def)) = skills.resolve(req.skill) else {
        debug!("⚔️ Unresolvable skill {}, action dropped", req.skill);
        return None;
    };

    if let Some(target) = req.target {
        match zone.get_actor(target) {
            None => {
                debug!("⚔️ Target {} does not exist, action dropped", target);
                return None;
            }
            Some(actor) if actor.flags.non_interactive => {
                debug!("⚔️ Target {} is non-interactive, action dropped", target);
                return None;
            }
            Some(_) => {}
        }
    }

    let power = req
        .power
        .max(session.authorized_level(skill))
        .clamp(def.lower, def.upper);

    let ctx = SkillContext {
        zone,
        actor: req.actor,
        target: req.target,
        power,
    };
    let Some(code) = skills.invoke(skill, &ctx) else {
        debug!("⚔️ Skill {} has no handler, action dropped", skill);
        return None;
    };

    session.send(OutboundBody::ActionAck { code });
    Some(code)
}
