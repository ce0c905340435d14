// ── Access control ──
//
// Read-only capability handed to the client-connect hook: given a pool's
// ACL flags and a user's group memberships, decide whether the user may
// connect. Group membership itself lives elsewhere; `GroupProvider` is
// the seam, with implementations picked by configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::PoolSpec;

/// Source of group memberships.
pub trait GroupProvider: Send + Sync {
    /// Groups `user_id` belongs to. Unknown users belong to none.
    fn groups(&self, user_id: &str) -> Vec<String>;
}

/// Which [`GroupProvider`] implementation a node uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GroupProviderKind {
    /// Memberships listed in the configuration file.
    #[default]
    Static,
    /// Nobody is in any group.
    None,
}

/// Memberships fixed at configuration load.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupProvider {
    members: HashMap<String, Vec<String>>,
}

impl StaticGroupProvider {
    pub fn new(members: HashMap<String, Vec<String>>) -> Self {
        Self { members }
    }
}

impl GroupProvider for StaticGroupProvider {
    fn groups(&self, user_id: &str) -> Vec<String> {
        self.members.get(user_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoGroups;

impl GroupProvider for NoGroups {
    fn groups(&self, _user_id: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Build the provider selected by `kind`. `members` is only used by the
/// static provider.
pub fn group_provider(
    kind: GroupProviderKind,
    members: HashMap<String, Vec<String>>,
) -> Box<dyn GroupProvider> {
    match kind {
        GroupProviderKind::Static => Box::new(StaticGroupProvider::new(members)),
        GroupProviderKind::None => Box::new(NoGroups),
    }
}

// ── Policy ──────────────────────────────────────────────────────────

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum AccessDecision {
    Allow,
    Deny { reason: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// A pool's ACL flags.
#[derive(Debug, Clone, Copy)]
pub struct AclPolicy<'a> {
    pub enable_acl: bool,
    pub acl_group_list: &'a [String],
}

impl<'a> AclPolicy<'a> {
    pub fn for_pool(pool: &'a PoolSpec) -> Self {
        Self {
            enable_acl: pool.enable_acl,
            acl_group_list: &pool.acl_group_list,
        }
    }

    /// Group-membership check only.
    pub fn check(&self, provider: &dyn GroupProvider, user_id: &str) -> AccessDecision {
        if !self.enable_acl {
            return AccessDecision::Allow;
        }
        let groups = provider.groups(user_id);
        if groups.iter().any(|g| self.acl_group_list.contains(g)) {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny {
                reason: format!("user '{user_id}' is not a member of any permitted group"),
            }
        }
    }

    /// Full connect decision: the account/certificate must be active
    /// (as reported by the user store) and the group check must pass.
    pub fn check_connect(
        &self,
        provider: &dyn GroupProvider,
        user_id: &str,
        account_active: bool,
    ) -> AccessDecision {
        if account_active {
            self.check(provider, user_id)
        } else {
            AccessDecision::Deny {
                reason: format!("user '{user_id}' is disabled"),
            }
        }
    }
}
