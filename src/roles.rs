use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AppError;

/// Role
///
/// The closed role vocabulary of the club. Variants are declared from the lowest to the highest
/// precedence so that the derived `Ord` matches `precedence_of`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Member,
    ContentManager,
    Moderator,
    PeerEducator,
    Advisor,
    Admin,
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Superadmin,
        Role::Admin,
        Role::Advisor,
        Role::PeerEducator,
        Role::Moderator,
        Role::ContentManager,
        Role::Member,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::ContentManager => "content_manager",
            Role::Moderator => "moderator",
            Role::PeerEducator => "peer_educator",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Parses a stored role name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// precedence_of
///
/// Display rank of a role: `superadmin` is 7, `member` is 1.
/// Only used for badges and "highest role" summaries, never for allow/deny.
pub const fn precedence_of(role: Role) -> u8 {
    match role {
        Role::Superadmin => 7,
        Role::Admin => 6,
        Role::Advisor => 5,
        Role::PeerEducator => 4,
        Role::Moderator => 3,
        Role::ContentManager => 2,
        Role::Member => 1,
    }
}

/// Capability
///
/// A named, checkable permission. Roles grant capabilities; handlers ask for capabilities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub enum Capability {
    #[serde(rename = "area.member.enter")]
    EnterMemberArea,
    #[serde(rename = "area.admin.enter")]
    EnterAdminArea,
    #[serde(rename = "area.superadmin.enter")]
    EnterSuperadminArea,
    #[serde(rename = "content.create")]
    CreateContent,
    #[serde(rename = "content.approve")]
    ApproveContent,
    #[serde(rename = "content.archive")]
    ArchiveContent,
    #[serde(rename = "content.viewUnpublished")]
    ViewUnpublishedContent,
    #[serde(rename = "moderation.queue.view")]
    ViewModerationQueue,
    #[serde(rename = "users.view")]
    ViewUsers,
    #[serde(rename = "users.deactivate")]
    DeactivateUsers,
    #[serde(rename = "users.manageRoles")]
    ManageRoles,
    #[serde(rename = "users.delete")]
    DeleteUsers,
    #[serde(rename = "events.register")]
    RegisterForEvents,
    #[serde(rename = "events.manage")]
    ManageEvents,
    #[serde(rename = "sessions.record")]
    RecordSessions,
    #[serde(rename = "reports.view")]
    ViewReports,
}

impl Capability {
    pub const ALL: [Capability; 16] = [
        Capability::EnterMemberArea,
        Capability::EnterAdminArea,
        Capability::EnterSuperadminArea,
        Capability::CreateContent,
        Capability::ApproveContent,
        Capability::ArchiveContent,
        Capability::ViewUnpublishedContent,
        Capability::ViewModerationQueue,
        Capability::ViewUsers,
        Capability::DeactivateUsers,
        Capability::ManageRoles,
        Capability::DeleteUsers,
        Capability::RegisterForEvents,
        Capability::ManageEvents,
        Capability::RecordSessions,
        Capability::ViewReports,
    ];

    /// The wire name, e.g. `content.approve`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::EnterMemberArea => "area.member.enter",
            Capability::EnterAdminArea => "area.admin.enter",
            Capability::EnterSuperadminArea => "area.superadmin.enter",
            Capability::CreateContent => "content.create",
            Capability::ApproveContent => "content.approve",
            Capability::ArchiveContent => "content.archive",
            Capability::ViewUnpublishedContent => "content.viewUnpublished",
            Capability::ViewModerationQueue => "moderation.queue.view",
            Capability::ViewUsers => "users.view",
            Capability::DeactivateUsers => "users.deactivate",
            Capability::ManageRoles => "users.manageRoles",
            Capability::DeleteUsers => "users.delete",
            Capability::RegisterForEvents => "events.register",
            Capability::ManageEvents => "events.manage",
            Capability::RecordSessions => "sessions.record",
            Capability::ViewReports => "reports.view",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AppError;

    /// An unrecognized name is a defect at the call site, not a denial.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == name)
            .ok_or_else(|| AppError::UnknownCapability(name.to_string()))
    }
}

/// One row of the grant table: what a role grants directly and which roles it includes.
struct Grant {
    role: Role,
    includes: &'static [Role],
    capabilities: &'static [Capability],
}

// The role hierarchy lives in `includes`. Precedence plays no part here, so a role with a
// narrow grant can be added anywhere in the display order without inheriting anything.
const GRANTS: &[Grant] = &[
    Grant {
        role: Role::Member,
        includes: &[],
        capabilities: &[
            Capability::EnterMemberArea,
            Capability::CreateContent,
            Capability::RegisterForEvents,
        ],
    },
    Grant {
        role: Role::ContentManager,
        includes: &[Role::Member],
        capabilities: &[Capability::ViewUnpublishedContent],
    },
    Grant {
        role: Role::Moderator,
        includes: &[Role::Member],
        capabilities: &[Capability::ApproveContent, Capability::ViewModerationQueue],
    },
    Grant {
        role: Role::PeerEducator,
        includes: &[Role::Member],
        capabilities: &[Capability::RecordSessions],
    },
    Grant {
        role: Role::Advisor,
        includes: &[Role::Member],
        capabilities: &[Capability::ViewReports],
    },
    Grant {
        role: Role::Admin,
        includes: &[
            Role::Advisor,
            Role::PeerEducator,
            Role::Moderator,
            Role::ContentManager,
        ],
        capabilities: &[
            Capability::EnterAdminArea,
            Capability::ArchiveContent,
            Capability::ViewUsers,
            Capability::DeactivateUsers,
            Capability::ManageEvents,
        ],
    },
    Grant {
        role: Role::Superadmin,
        includes: &[Role::Admin],
        capabilities: &[
            Capability::EnterSuperadminArea,
            Capability::ManageRoles,
            Capability::DeleteUsers,
        ],
    },
];

fn grant_for(role: Role) -> Option<&'static Grant> {
    GRANTS.iter().find(|grant| grant.role == role)
}

/// RoleSet
///
/// The set of recognized roles a principal holds. Construction from stored names drops
/// unrecognized roles and coerces an empty input to `{member}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let set: BTreeSet<Role> = roles.into_iter().collect();
        if set.is_empty() {
            return Self::member();
        }
        Self(set)
    }

    pub fn member() -> Self {
        Self(BTreeSet::from([Role::Member]))
    }

    /// from_names
    ///
    /// Builds a role set from stored role strings. An empty input means "unset" and becomes
    /// `{member}`. Names the server does not recognize contribute nothing.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_any = false;
        let mut roles = BTreeSet::new();
        for name in names {
            seen_any = true;
            match Role::parse(name.as_ref()) {
                Some(role) => {
                    roles.insert(role);
                }
                None => tracing::debug!(role = %name.as_ref(), "ignoring unrecognized role"),
            }
        }
        if !seen_any {
            return Self::member();
        }
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn union(&self, other: &RoleSet) -> RoleSet {
        RoleSet(self.0.union(&other.0).copied().collect())
    }

    /// Role names for storage, highest precedence first.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().rev().map(|role| role.as_str().to_string()).collect()
    }

    pub fn to_vec(&self) -> Vec<Role> {
        self.0.iter().rev().copied().collect()
    }
}

impl Default for RoleSet {
    fn default() -> Self {
        Self::member()
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(RoleSet::from_names)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        RoleSet::new(iter)
    }
}

/// highest_role
///
/// The highest-precedence role present, for display. A set with no recognized role
/// reports `member`.
pub fn highest_role(roles: &RoleSet) -> Role {
    roles
        .iter()
        .max_by_key(|role| precedence_of(*role))
        .unwrap_or(Role::Member)
}

/// capabilities_of
///
/// Union of the capabilities granted by every held role, following `includes` transitively.
pub fn capabilities_of(roles: &RoleSet) -> BTreeSet<Capability> {
    let mut capabilities = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut pending: Vec<Role> = roles.iter().collect();

    while let Some(role) = pending.pop() {
        if !visited.insert(role) {
            continue;
        }
        if let Some(grant) = grant_for(role) {
            capabilities.extend(grant.capabilities.iter().copied());
            pending.extend(grant.includes.iter().copied());
        }
    }

    capabilities
}
