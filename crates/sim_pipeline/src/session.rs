//! Connected controllers and their outbound send queues.
//!
//! A [`Session`] is one authenticated controller: its driven actor, its
//! authorized skill levels, and a single-worker send queue that serializes
//! outbound packets toward the transport. The per-session sequence counter
//! is stamped at enqueue time, so each client observes a gapless monotonic
//! stream no matter how many update workers are broadcasting.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace};
use uuid::Uuid;
use worker_pool::{PoolError, WorkerPool};
use world_core::{ActorId, SkillId, UserId};

use crate::requests::{OutboundBody, OutboundPacket};

/// The transport seam: delivers one sequenced packet to one controller.
///
/// Implementations must be callable from any send worker; delivery failures
/// are the transport's problem and must not propagate back into the
/// pipeline.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, user: UserId, packet: OutboundPacket);
}

/// Sink that logs deliveries at trace level; used by the standalone server
/// binary until a real transport is attached.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl PacketSink for LoggingSink {
    fn deliver(&self, user: UserId, packet: OutboundPacket) {
        trace!("📤 {} <- seq {} {:?}", user, packet.sequence, packet.body);
    }
}

/// Sink that records every delivery for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    delivered: Mutex<Vec<(UserId, OutboundPacket)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn delivered(&self) -> Vec<(UserId, OutboundPacket)> {
        self.delivered.lock().expect("sink lock poisoned").clone()
    }

    /// Packets delivered to one controller, in order.
    pub fn delivered_to(&self, user: UserId) -> Vec<OutboundPacket> {
        self.delivered
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, packet)| packet.clone())
            .collect()
    }
}

impl PacketSink for CollectingSink {
    fn deliver(&self, user: UserId, packet: OutboundPacket) {
        self.delivered
            .lock()
            .expect("sink lock poisoned")
            .push((user, packet));
    }
}

/// One authenticated controller.
pub struct Session {
    /// Authenticated user id
    pub user: UserId,
    /// Opaque session token handed to the transport
    pub token: Uuid,
    /// Actor this controller is currently driving
    slave: Mutex<Option<ActorId>>,
    /// Authorized power level per skill, fixed at login
    skills: HashMap<SkillId, i32>,
    sequence: AtomicU32,
    send_queue: WorkerPool<OutboundPacket>,
}

impl Session {
    fn new(user: UserId, slave: ActorId, skills: HashMap<SkillId, i32>) -> Self {
        Self {
            user,
            token: Uuid::new_v4(),
            slave: Mutex::new(Some(slave)),
            skills,
            sequence: AtomicU32::new(0),
            send_queue: WorkerPool::new(format!("send-{}", user.0), 1),
        }
    }

    /// The actor this controller is driving, if any.
    pub fn slave(&self) -> Option<ActorId> {
        *self.slave.lock().expect("slave lock poisoned")
    }

    /// Replaces the driven actor (or clears it on despawn).
    pub fn set_slave(&self, actor: Option<ActorId>) {
        *self.slave.lock().expect("slave lock poisoned") = actor;
    }

    /// The authorized power level for a skill, zero if ungranted.
    pub fn authorized_level(&self, skill: SkillId) -> i32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    /// Stamps the next sequence number and enqueues a packet.
    ///
    /// A packet pushed while the send queue is stopping is dropped; the
    /// session is on its way out and the transport will reap the socket.
    pub fn send(&self, body: OutboundBody) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let _ = self.send_queue.push(OutboundPacket { sequence, body });
    }

    /// Consumes the next sequence number without enqueueing.
    ///
    /// Used for the final packet of a closing session, delivered directly
    /// after the send queue has drained out of the registry.
    fn take_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of packets waiting in the send queue.
    pub fn queued(&self) -> usize {
        self.send_queue.queue_size()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &self.token)
            .field("slave", &self.slave())
            .field("queued", &self.queued())
            .finish()
    }
}

/// All live sessions, keyed by user id.
///
/// Session lifetime follows the access stage exactly: `register` on a
/// successful login, `remove` on logout or when a despawn severs the last
/// driver link.
pub struct SessionRegistry {
    sessions: DashMap<UserId, Arc<Session>>,
    sink: Arc<dyn PacketSink>,
}

impl SessionRegistry {
    /// Creates an empty registry delivering through `sink`.
    pub fn new(sink: Arc<dyn PacketSink>) -> Self {
        Self {
            sessions: DashMap::new(),
            sink,
        }
    }

    /// Creates a session with a running single-worker send queue.
    ///
    /// # Errors
    ///
    /// [`PoolError::Spawn`] if the send worker cannot be started; no session
    /// is registered in that case.
    pub fn register(
        &self,
        user: UserId,
        slave: ActorId,
        skills: HashMap<SkillId, i32>,
    ) -> Result<Arc<Session>, PoolError> {
        let session = Arc::new(Session::new(user, slave, skills));
        let sink = self.sink.clone();
        session.send_queue.start(move |packet: OutboundPacket| {
            sink.deliver(user, packet);
            Ok(())
        })?;
        info!("🔐 Session opened for {} (token {})", user, session.token);
        self.sessions.insert(user, session.clone());
        Ok(session)
    }

    /// Closes a session: stops its send queue and delivers one final packet
    /// directly through the sink.
    ///
    /// Returns the removed session, or `None` if the user had none.
    pub fn close(&self, user: UserId, farewell: OutboundBody) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&user)?;
        session.send_queue.stop();
        self.sink.deliver(
            user,
            OutboundPacket {
                sequence: session.take_sequence(),
                body: farewell,
            },
        );
        info!("🔐 Session closed for {}", user);
        Some(session)
    }

    /// The live session for a user.
    pub fn get(&self, user: UserId) -> Option<Arc<Session>> {
        self.sessions.get(&user).map(|entry| entry.value().clone())
    }

    /// Whether a user has a live session.
    pub fn contains(&self, user: UserId) -> bool {
        self.sessions.contains_key(&user)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Delivers a body through the sink without any session.
    ///
    /// Rejected logins have no session to queue on; their failure ack goes
    /// straight out, stamped with sequence zero.
    pub fn deliver_unsessioned(&self, body: OutboundBody) {
        self.sink.deliver(UserId(0), OutboundPacket { sequence: 0, body });
    }

    /// Enqueues a body on every live session's send queue.
    ///
    /// # Returns
    ///
    /// The number of sessions the body was enqueued for.
    pub fn broadcast(&self, body: OutboundBody) -> usize {
        let mut count = 0;
        for entry in self.sessions.iter() {
            entry.value().send(body.clone());
            count += 1;
        }
        count
    }

    /// Stops every send queue. Sessions remain listed but inert; used only
    /// during full shutdown.
    pub fn stop_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().send_queue.stop();
        }
        debug!("🔐 All session send queues stopped");
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within 1s");
    }

    #[test]
    fn sequence_numbers_are_per_session_and_gapless() {
        let sink = Arc::new(CollectingSink::new());
        let registry = SessionRegistry::new(sink.clone());
        registry.register(UserId(1), ActorId(10), HashMap::new()).unwrap();
        registry.register(UserId(2), ActorId(20), HashMap::new()).unwrap();

        for _ in 0..3 {
            registry.broadcast(OutboundBody::LogoutAck);
        }
        wait_for(|| sink.delivered().len() == 6);

        for user in [UserId(1), UserId(2)] {
            let seqs: Vec<u32> = sink
                .delivered_to(user)
                .iter()
                .map(|p| p.sequence)
                .collect();
            assert_eq!(seqs, vec![0, 1, 2]);
        }
    }

    #[test]
    fn close_delivers_a_final_sequenced_packet() {
        let sink = Arc::new(CollectingSink::new());
        let registry = SessionRegistry::new(sink.clone());
        let session = registry.register(UserId(1), ActorId(10), HashMap::new()).unwrap();
        session.send(OutboundBody::LoginAck { ok: true });
        wait_for(|| !sink.delivered().is_empty());

        assert!(registry.close(UserId(1), OutboundBody::LogoutAck).is_some());
        assert!(!registry.contains(UserId(1)));
        assert!(registry.close(UserId(1), OutboundBody::LogoutAck).is_none());

        let packets = sink.delivered_to(UserId(1));
        assert_eq!(packets.last().map(|p| p.body.clone()), Some(OutboundBody::LogoutAck));
        assert_eq!(packets.last().map(|p| p.sequence), Some(1));
    }

    #[test]
    fn authorized_level_defaults_to_zero() {
        let sink = Arc::new(CollectingSink::new());
        let registry = SessionRegistry::new(sink);
        let mut skills = HashMap::new();
        skills.insert(SkillId(3), 40);
        let session = registry.register(UserId(1), ActorId(10), skills).unwrap();
        assert_eq!(session.authorized_level(SkillId(3)), 40);
        assert_eq!(session.authorized_level(SkillId(4)), 0);
        assert_eq!(session.slave(), Some(ActorId(10)));
    }
}
