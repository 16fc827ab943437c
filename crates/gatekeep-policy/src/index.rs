//! The in-memory authorization index.

use gatekeep_core::{ActionType, PrincipalId, ResourceType};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Grants and groupings, keyed for constant-time enforcement.
///
/// Adds are idempotent and removals of absent edges are no-ops; each mutator
/// reports whether anything changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyIndex {
    grants: HashMap<String, HashSet<(ResourceType, ActionType)>>,
    groupings: HashMap<PrincipalId, BTreeSet<String>>,
}

impl PolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_grant(&mut self, role: &str, resource: ResourceType, action: ActionType) -> bool {
        self.grants
            .entry(role.to_string())
            .or_default()
            .insert((resource, action))
    }

    pub fn remove_grant(&mut self, role: &str, resource: ResourceType, action: ActionType) -> bool {
        let Some(grants) = self.grants.get_mut(role) else {
            return false;
        };
        let removed = grants.remove(&(resource, action));
        if grants.is_empty() {
            self.grants.remove(role);
        }
        removed
    }

    /// Remove `(resource, action)` from every role. Returns how many roles lost it.
    pub fn remove_permission(&mut self, resource: ResourceType, action: ActionType) -> usize {
        let mut affected = 0;
        self.grants.retain(|_, grants| {
            if grants.remove(&(resource, action)) {
                affected += 1;
            }
            !grants.is_empty()
        });
        affected
    }

    pub fn add_grouping(&mut self, principal: PrincipalId, role: &str) -> bool {
        self.groupings
            .entry(principal)
            .or_default()
            .insert(role.to_string())
    }

    pub fn remove_grouping(&mut self, principal: PrincipalId, role: &str) -> bool {
        let Some(roles) = self.groupings.get_mut(&principal) else {
            return false;
        };
        let removed = roles.remove(role);
        if roles.is_empty() {
            self.groupings.remove(&principal);
        }
        removed
    }

    /// Drop a role together with every grant it holds and every grouping to it.
    pub fn delete_role(&mut self, role: &str) -> bool {
        let mut changed = self.grants.remove(role).is_some();
        self.groupings.retain(|_, roles| {
            changed |= roles.remove(role);
            !roles.is_empty()
        });
        changed
    }

    /// `true` iff some role grouped to `principal` is granted `(resource, action)`.
    pub fn enforce(&self, principal: PrincipalId, resource: ResourceType, action: ActionType) -> bool {
        self.groupings.get(&principal).is_some_and(|roles| {
            roles.iter().any(|role| {
                self.grants
                    .get(role)
                    .is_some_and(|grants| grants.contains(&(resource, action)))
            })
        })
    }

    /// Role names grouped to `principal`, sorted.
    pub fn roles_for(&self, principal: PrincipalId) -> Vec<String> {
        self.groupings
            .get(&principal)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn grant_count(&self) -> usize {
        self.grants.values().map(HashSet::len).sum()
    }

    pub fn grouping_count(&self) -> usize {
        self.groupings.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.groupings.is_empty()
    }
}
