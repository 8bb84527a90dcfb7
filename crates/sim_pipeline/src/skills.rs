//! The pluggable skill registry.
//!
//! Skill *definitions* (validity, substitution target, power band) come from
//! the authorization collaborator at startup; skill *handlers* are closures
//! registered by the embedding application. The action stage resolves a
//! request against both before anything touches the world.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use world_core::{ActorId, SkillId, Zone};

/// Everything a skill handler may see and touch.
///
/// Handlers mutate the world only through the zone's synchronized methods,
/// so they are safe to run from any action worker concurrently.
pub struct SkillContext<'a> {
    /// The shared world state
    pub zone: &'a Zone,
    /// Actor performing the skill
    pub actor: ActorId,
    /// Optional target actor
    pub target: Option<ActorId>,
    /// Effective power after clamping and authorization flooring
    pub power: i32,
}

/// A skill's effect, returning the code acknowledged back to the requester.
pub type SkillHandler = Arc<dyn Fn(&SkillContext<'_>) -> i32 + Send + Sync>;

/// Server-defined properties of one skill.
#[derive(Debug, Clone, Copy)]
pub struct SkillDef {
    /// Invalid skills are substituted with `default_skill` instead of failing
    pub valid: bool,
    /// Substitute used when this skill is not valid
    pub default_skill: SkillId,
    /// Minimum effective power
    pub lower: i32,
    /// Maximum effective power
    pub upper: i32,
}

impl SkillDef {
    /// A valid skill with the given power band.
    pub fn valid(lower: i32, upper: i32) -> Self {
        Self {
            valid: true,
            default_skill: SkillId(0),
            lower,
            upper,
        }
    }

    /// An invalid (retired or renamed) skill that redirects to a substitute.
    pub fn substituted_by(default_skill: SkillId) -> Self {
        Self {
            valid: false,
            default_skill,
            lower: 0,
            upper: 0,
        }
    }
}

struct SkillEntry {
    def: SkillDef,
    handler: Option<SkillHandler>,
}

/// Concurrent registry of skill definitions and their handlers.
#[derive(Default)]
pub struct SkillRegistry {
    entries: DashMap<SkillId, SkillEntry>,
}

impl SkillRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a skill definition, keeping any installed
    /// handler.
    pub fn register(&self, skill: SkillId, def: SkillDef) {
        self.entries
            .entry(skill)
            .and_modify(|entry| entry.def = def)
            .or_insert(SkillEntry { def, handler: None });
    }

    /// Installs the effect handler for a previously registered skill.
    ///
    /// Returns `false` (and installs nothing) when the skill is unknown.
    pub fn set_handler(&self, skill: SkillId, handler: SkillHandler) -> bool {
        match self.entries.get_mut(&skill) {
            Some(mut entry) => {
                entry.handler = Some(handler);
                true
            }
            None => false,
        }
    }

    /// The definition of a skill, if registered.
    pub fn def_of(&self, skill: SkillId) -> Option<SkillDef> {
        self.entries.get(&skill).map(|entry| entry.def)
    }

    /// Resolves a requested skill to the one that will actually execute.
    ///
    /// An invalid skill is replaced by its configured substitute (one level
    /// deep; a substitute that is itself invalid resolves to nothing).
    /// Returns `None` for unknown skills and dead-end substitutions.
    pub fn resolve(&self, skill: SkillId) -> Option<(SkillId, SkillDef)> {
        let def = self.def_of(skill)?;
        if def.valid {
            return Some((skill, def));
        }
        let substitute = self.def_of(def.default_skill)?;
        if !substitute.valid {
            debug!("Skill {} substitute {} is itself invalid", skill, def.default_skill);
            return None;
        }
        debug!("Skill {} substituted by {}", skill, def.default_skill);
        Some((def.default_skill, substitute))
    }

    /// Runs the handler of a (resolved, valid) skill.
    ///
    /// Returns `None` when no handler is installed; the action stage treats
    /// that as a dropped request, not a protocol failure.
    pub fn invoke(&self, skill: SkillId, ctx: &SkillContext<'_>) -> Option<i32> {
        let handler = self.entries.get(&skill)?.handler.clone()?;
        Some(handler(ctx))
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.len())
            .finish()
    }
}
