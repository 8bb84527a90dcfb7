//! The authentication/authorization collaborator seam.
//!
//! The pipeline never stores accounts or permissions itself; it asks an
//! [`AuthProvider`] at login and at world load. Production deployments back
//! this with a database service; [`MemoryAuthProvider`] is the in-process
//! implementation used by tests and the standalone server binary.

use std::collections::HashMap;
use world_core::{Actor, ActorId, SkillId, UserId};

use crate::skills::SkillDef;

/// Answers the pipeline's identity and permission questions.
///
/// Implementations must be cheap to call from access workers; a blocking
/// backend should cache or pool on its side of the seam.
pub trait AuthProvider: Send + Sync {
    /// Verifies credentials.
    ///
    /// # Returns
    ///
    /// The authenticated user's id, or `None` when the credentials are
    /// rejected.
    fn check_authentication(&self, user: &str, password: &[u8]) -> Option<UserId>;

    /// The authorized power level of `user` for `skill`.
    ///
    /// Zero means "not specifically authorized". Single-skill probe for
    /// collaborators that cannot enumerate grants up front; the pipeline
    /// itself caches the bulk [`player_skills`](Self::player_skills) answer
    /// into the session at login and floors action power against that cache.
    fn check_authorization(&self, user: UserId, skill: SkillId) -> i32;

    /// Whether `user` may drive `actor` at all.
    fn may_drive(&self, user: UserId, actor: ActorId) -> bool;

    /// The server's full skill table, fetched once at startup.
    fn server_skills(&self) -> Vec<(SkillId, SkillDef)>;

    /// Per-skill authorized levels for one controller, fetched at login.
    fn player_skills(&self, user: UserId) -> HashMap<SkillId, i32>;

    /// The persistent world objects to load into the zone at startup.
    fn server_objects(&self) -> Vec<Actor>;
}

struct Account {
    password: Vec<u8>,
    id: UserId,
    skills: HashMap<SkillId, i32>,
}

/// In-memory [`AuthProvider`] populated up front, immutable afterwards.
#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: HashMap<String, Account>,
    skills: Vec<(SkillId, SkillDef)>,
    objects: Vec<Actor>,
}

impl MemoryAuthProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account, builder style.
    pub fn with_account(mut self, name: &str, password: &[u8], id: UserId) -> Self {
        self.accounts.insert(
            name.to_string(),
            Account {
                password: password.to_vec(),
                id,
                skills: HashMap::new(),
            },
        );
        self
    }

    /// Grants an account an authorized power level for a skill.
    pub fn with_grant(mut self, name: &str, skill: SkillId, level: i32) -> Self {
        if let Some(account) = self.accounts.get_mut(name) {
            account.skills.insert(skill, level);
        }
        self
    }

    /// Adds a server skill definition, builder style.
    pub fn with_skill(mut self, skill: SkillId, def: SkillDef) -> Self {
        self.skills.push((skill, def));
        self
    }

    /// Adds a persistent world object, builder style.
    pub fn with_object(mut self, actor: Actor) -> Self {
        self.objects.push(actor);
        self
    }
}

impl AuthProvider for MemoryAuthProvider {
    fn check_authentication(&self, user: &str, password: &[u8]) -> Option<UserId> {
        let account = self.accounts.get(user)?;
        if account.password == password {
            Some(account.id)
        } else {
            None
        }
    }

    fn check_authorization(&self, user: UserId, skill: SkillId) -> i32 {
        self.accounts
            .values()
            .find(|account| account.id == user)
            .and_then(|account| account.skills.get(&skill).copied())
            .unwrap_or(0)
    }

    fn may_drive(&self, _user: UserId, _actor: ActorId) -> bool {
        true
    }

    fn server_skills(&self) -> Vec<(SkillId, SkillDef)> {
        self.skills.clone()
    }

    fn player_skills(&self, user: UserId) -> HashMap<SkillId, i32> {
        self.accounts
            .values()
            .find(|account| account.id == user)
            .map(|account| account.skills.clone())
            .unwrap_or_default()
    }

    fn server_objects(&self) -> Vec<Actor> {
        self.objects.clone()
    }
}
