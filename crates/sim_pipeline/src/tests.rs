//! Scenario tests exercising the stages together over a real zone.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use world_core::{Actor, ActorId, SkillId, UserId, Vec3, Zone, ZoneConfig};

use crate::auth::MemoryAuthProvider;
use crate::error::PipelineError;
use crate::requests::{ActionRequest, LoginRequest, LogoutRequest, OutboundBody};
use crate::session::{CollectingSink, SessionRegistry};
use crate::simulation::{PoolSizes, Simulation};
use crate::skills::{SkillDef, SkillRegistry};
use crate::stages::access::{self, LoginOutcome};
use crate::stages::{action, motion, update};

const ALICE: UserId = UserId(7);
const BOB: UserId = UserId(8);
const AVATAR: ActorId = ActorId(1);

fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached within 2s");
}

fn provider() -> MemoryAuthProvider {
    MemoryAuthProvider::new()
        .with_account("alice", b"secret", ALICE)
        .with_account("bob", b"hunter2", BOB)
        .with_grant("alice", SkillId(1), 40)
}

fn world() -> (Zone, Arc<CollectingSink>, SessionRegistry) {
    let zone = Zone::new(ZoneConfig::default());
    zone.spawn(Actor::new(AVATAR, Vec3::new(10.0, 10.0, 10.0)))
        .expect("spawn failed");
    let sink = Arc::new(CollectingSink::new());
    let sessions = SessionRegistry::new(sink.clone());
    (zone, sink, sessions)
}

fn login(user: &str, password: &[u8], actor: ActorId) -> LoginRequest {
    LoginRequest {
        user: user.to_string(),
        password: password.to_vec(),
        actor,
    }
}

#[test]
fn login_opens_session_scrubs_password_and_links_driver() {
    let (zone, sink, sessions) = world();
    let provider = provider();

    let mut req = login("alice", b"secret", AVATAR);
    let outcome = access::handle_login(&zone, &sessions, &provider, &mut req);
    assert_eq!(outcome, LoginOutcome::Accepted(ALICE));
    assert!(req.password.is_empty(), "password must be scrubbed");
    assert_eq!(zone.driver_of(AVATAR), Some(ALICE));
    assert_eq!(sessions.get(ALICE).and_then(|s| s.slave()), Some(AVATAR));

    wait_for(|| sink.delivered_to(ALICE).len() == 1);
    assert_eq!(
        sink.delivered_to(ALICE)[0].body,
        OutboundBody::LoginAck { ok: true }
    );
}

#[test]
fn duplicate_login_is_a_silent_no_op() {
    let (zone, sink, sessions) = world();
    let provider = provider();

    let mut first = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut first);
    wait_for(|| sink.delivered().len() == 1);

    let mut second = login("alice", b"secret", AVATAR);
    let outcome = access::handle_login(&zone, &sessions, &provider, &mut second);
    assert_eq!(outcome, LoginOutcome::Duplicate);
    assert!(second.password.is_empty(), "duplicate path must still scrub");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sink.delivered().len(), 1, "no ack on the no-op path");
}

#[test]
fn bad_credentials_ack_failure_without_a_session() {
    let (zone, sink, sessions) = world();
    let provider = provider();

    let mut req = login("alice", b"wrong", AVATAR);
    let outcome = access::handle_login(&zone, &sessions, &provider, &mut req);
    assert_eq!(outcome, LoginOutcome::Rejected);
    assert!(sessions.is_empty());
    assert_eq!(zone.driver_of(AVATAR), None);

    let unsessioned = sink.delivered_to(UserId(0));
    assert_eq!(unsessioned.len(), 1);
    assert_eq!(unsessioned[0].body, OutboundBody::LoginAck { ok: false });
    assert_eq!(unsessioned[0].sequence, 0);
}

#[test]
fn second_controller_loses_the_takeover_race() {
    let (zone, sink, sessions) = world();
    let provider = provider();

    let mut first = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut first);

    let mut second = login("bob", b"hunter2", AVATAR);
    let outcome = access::handle_login(&zone, &sessions, &provider, &mut second);
    assert_eq!(outcome, LoginOutcome::Rejected);
    assert_eq!(zone.driver_of(AVATAR), Some(ALICE), "loser must not disturb the link");
    assert!(!sessions.contains(BOB));
    assert_eq!(sink.delivered_to(UserId(0)).len(), 1);
}

#[test]
fn logout_severs_links_and_frees_the_actor() {
    let (zone, sink, sessions) = world();
    let provider = provider();

    let mut req = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut req);

    assert!(access::handle_logout(&zone, &sessions, LogoutRequest { user: ALICE }));
    assert!(sessions.is_empty());
    assert_eq!(zone.driver_of(AVATAR), None);
    assert_eq!(
        sink.delivered_to(ALICE).last().map(|p| p.body.clone()),
        Some(OutboundBody::LogoutAck)
    );

    // The actor is takeable again.
    let mut retry = login("bob", b"hunter2", AVATAR);
    assert_eq!(
        access::handle_login(&zone, &sessions, &provider, &mut retry),
        LoginOutcome::Accepted(BOB)
    );

    // A second logout for alice has nothing to do.
    assert!(!access::handle_logout(&zone, &sessions, LogoutRequest { user: ALICE }));
}

#[test]
fn action_power_is_floored_then_clamped() {
    let (zone, _sink, sessions) = world();
    let provider = provider();
    let mut req = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut req);

    let skills = SkillRegistry::new();
    skills.register(SkillId(1), SkillDef::valid(0, 100));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    skills.set_handler(
        SkillId(1),
        Arc::new(move |ctx| {
            record.lock().unwrap().push(ctx.power);
            ctx.power
        }),
    );

    let request = |power| ActionRequest {
        user: ALICE,
        actor: AVATAR,
        skill: SkillId(1),
        power,
        target: None,
    };
    // Above the band: clamped to the upper bound.
    assert_eq!(action::handle(&zone, &sessions, &skills, &request(250)), Some(100));
    // Below the authorized level: floored up to it.
    assert_eq!(action::handle(&zone, &sessions, &skills, &request(10)), Some(40));
    assert_eq!(action::handle(&zone, &sessions, &skills, &request(-5)), Some(40));
    // Between the floor and the cap: passes through.
    assert_eq!(action::handle(&zone, &sessions, &skills, &request(70)), Some(70));
    assert_eq!(*seen.lock().unwrap(), vec![100, 40, 40, 70]);
}

#[test]
fn invalid_skill_executes_its_substitute() {
    let (zone, _sink, sessions) = world();
    let provider = provider();
    let mut req = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut req);

    let skills = SkillRegistry::new();
    skills.register(SkillId(1), SkillDef::valid(0, 100));
    skills.register(SkillId(2), SkillDef::substituted_by(SkillId(1)));
    skills.set_handler(SkillId(1), Arc::new(|ctx| ctx.power));

    let request = ActionRequest {
        user: ALICE,
        actor: AVATAR,
        skill: SkillId(2),
        power: 10,
        target: None,
    };
    // Substituted skill runs skill 1's handler with skill 1's band and
    // alice's grant for skill 1.
    assert_eq!(action::handle(&zone, &sessions, &skills, &request), Some(40));
}

#[test]
fn action_requires_the_live_driver_and_an_interactive_target() {
    let (zone, _sink, sessions) = world();
    let provider = provider();
    let mut req = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut req);

    let mut statue = Actor::new(ActorId(2), Vec3::new(12.0, 10.0, 10.0));
    statue.flags.non_interactive = true;
    zone.spawn(statue).unwrap();

    let skills = SkillRegistry::new();
    skills.register(SkillId(1), SkillDef::valid(0, 100));
    skills.set_handler(SkillId(1), Arc::new(|_| 0));

    let mut request = ActionRequest {
        user: BOB,
        actor: AVATAR,
        skill: SkillId(1),
        power: 10,
        target: None,
    };
    // Bob is not driving the avatar (and has no session).
    assert_eq!(action::handle(&zone, &sessions, &skills, &request), None);

    // A non-interactive target drops the request.
    request.user = ALICE;
    request.target = Some(ActorId(2));
    assert_eq!(action::handle(&zone, &sessions, &skills, &request), None);

    // A missing target drops it too.
    request.target = Some(ActorId(99));
    assert_eq!(action::handle(&zone, &sessions, &skills, &request), None);

    request.target = None;
    assert_eq!(action::handle(&zone, &sessions, &skills, &request), Some(0));
}

#[test]
fn stationary_actor_passes_through_motion_unchanged() {
    let (zone, _sink, _sessions) = world();
    let before = zone.get_actor(AVATAR).unwrap().position;

    let outcome = motion::integrate(&zone, AVATAR, Instant::now()).unwrap();
    assert!(!outcome.requeue, "stationary actor must drop out of the loop");
    assert_eq!(outcome.old_pos, outcome.new_pos);
    assert_eq!(zone.get_actor(AVATAR).unwrap().position, before);

    assert!(motion::integrate(&zone, ActorId(99), Instant::now()).is_none());
}

#[test]
fn moving_actor_advances_and_keeps_octree_membership() {
    let (zone, _sink, _sessions) = world();
    let start = Vec3::new(200.0, 50.0, 10.0);
    zone.spawn(Actor::new(ActorId(2), start).with_movement(Vec3::new(80.0, 0.0, 0.0)))
        .unwrap();
    let then = Instant::now() - Duration::from_secs(1);
    zone.with_actor_mut(ActorId(2), |a| a.last_update = then);

    let outcome = motion::integrate(&zone, ActorId(2), Instant::now()).unwrap();
    assert!(outcome.requeue);
    assert!(outcome.elapsed >= 1.0);
    assert!(outcome.new_pos.x > start.x + 75.0, "one full second must integrate");

    // Nearby query from its own position finds it: membership followed.
    let nearby: HashSet<ActorId> = zone.nearby_actor_ids(ActorId(2)).into_iter().collect();
    assert!(nearby.contains(&ActorId(2)));
}

#[test]
fn world_edge_halts_the_actor() {
    let (zone, _sink, _sessions) = world();
    // Default grid spans 1024 units along x.
    let start = Vec3::new(1020.0, 50.0, 10.0);
    zone.spawn(Actor::new(ActorId(2), start).with_movement(Vec3::new(100.0, 0.0, 0.0)))
        .unwrap();
    let then = Instant::now() - Duration::from_secs(1);
    zone.with_actor_mut(ActorId(2), |a| a.last_update = then);

    let outcome = motion::integrate(&zone, ActorId(2), Instant::now()).unwrap();
    assert!(!outcome.requeue, "halted actor must not requeue");
    assert_eq!(outcome.new_pos, start);
    let actor = zone.get_actor(ActorId(2)).unwrap();
    assert_eq!(actor.position, start);
    assert!(!actor.is_moving());
}

#[test]
fn update_broadcasts_to_every_session_but_skips_invisible_actors() {
    let (zone, sink, sessions) = world();
    let provider = provider();
    let mut a = login("alice", b"secret", AVATAR);
    access::handle_login(&zone, &sessions, &provider, &mut a);

    let mut ghost = Actor::new(ActorId(2), Vec3::new(30.0, 30.0, 10.0));
    ghost.flags.invisible = true;
    zone.spawn(ghost).unwrap();

    assert_eq!(update::broadcast(&zone, &sessions, AVATAR), 1);
    assert_eq!(update::broadcast(&zone, &sessions, ActorId(2)), 0);
    assert_eq!(update::broadcast(&zone, &sessions, ActorId(99)), 0);

    wait_for(|| {
        sink.delivered_to(ALICE)
            .iter()
            .any(|p| matches!(&p.body, OutboundBody::PositionUpdate(r) if r.actor == AVATAR.0))
    });
}

#[test]
fn send_nearby_actors_refreshes_the_whole_neighborhood() {
    let provider = Arc::new(
        provider()
            .with_object(Actor::new(AVATAR, Vec3::new(10.0, 10.0, 10.0)))
            .with_object(Actor::new(ActorId(2), Vec3::new(12.0, 10.0, 10.0)))
            .with_object(Actor::new(ActorId(3), Vec3::new(900.0, 900.0, 100.0))),
    );
    let sink = Arc::new(CollectingSink::new());
    let sim = Simulation::new(
        ZoneConfig::default(),
        provider.clone(),
        sink.clone(),
        PoolSizes {
            access: 1,
            action: 1,
            motion: 1,
            update: 1,
        },
    );
    sim.start().expect("start failed");

    let mut req = login("alice", b"secret", AVATAR);
    access::handle_login(sim.zone(), sim.sessions(), provider.as_ref(), &mut req);
    wait_for(|| sim.sessions().contains(ALICE));

    // The avatar and its leaf-mate get broadcast; the far actor does not.
    assert_eq!(sim.send_nearby_actors(AVATAR).expect("enqueue failed"), 2);
    wait_for(|| {
        let seen: HashSet<u64> = sink
            .delivered_to(ALICE)
            .iter()
            .filter_map(|p| match &p.body {
                OutboundBody::PositionUpdate(r) => Some(r.actor),
                _ => None,
            })
            .collect();
        seen.contains(&AVATAR.0) && seen.contains(&2)
    });
    assert!(
        !sink
            .delivered_to(ALICE)
            .iter()
            .any(|p| matches!(&p.body, OutboundBody::PositionUpdate(r) if r.actor == 3)),
        "actor outside the neighborhood must not be broadcast"
    );

    // An unknown actor has no neighborhood to refresh.
    assert_eq!(sim.send_nearby_actors(ActorId(99)).unwrap(), 0);
    sim.stop();
}

#[test]
fn pipeline_end_to_end_over_real_pools() {
    let provider = Arc::new(
        provider()
            .with_object(Actor::new(AVATAR, Vec3::new(10.0, 10.0, 10.0)))
            .with_object(
                Actor::new(ActorId(2), Vec3::new(50.0, 50.0, 10.0))
                    .with_movement(Vec3::new(1.0, 0.0, 0.0)),
            ),
    );
    let sink = Arc::new(CollectingSink::new());
    let sim = Simulation::new(
        ZoneConfig::default(),
        provider,
        sink.clone(),
        PoolSizes {
            access: 1,
            action: 1,
            motion: 1,
            update: 1,
        },
    );
    assert_eq!(sim.zone().actor_count(), 2);
    sim.start().expect("start failed");

    let mut frame = Vec::new();
    frame.extend_from_slice(&5u16.to_be_bytes());
    frame.extend_from_slice(b"alice");
    frame.extend_from_slice(&6u16.to_be_bytes());
    frame.extend_from_slice(b"secret");
    frame.extend_from_slice(&AVATAR.0.to_be_bytes());
    assert!(sim.submit_login_frame(&frame).expect("submit failed"));
    assert!(!sim.submit_login_frame(&frame[..3]).expect("malformed must drop"));

    wait_for(|| sim.sessions().contains(ALICE));
    // The preloaded moving actor keeps integrating and broadcasting.
    wait_for(|| {
        sink.delivered_to(ALICE)
            .iter()
            .any(|p| matches!(&p.body, OutboundBody::PositionUpdate(r) if r.actor == 2))
    });

    sim.stop();
    assert!(matches!(
        sim.submit_logout(ALICE),
        Err(PipelineError::Pool(_))
    ));
}
