//! Role-based access control.
//!
//! Roles form a closed set. Each role maps to a static list of back-office features;
//! a user's visible features and navigation are the union over their roles. Role
//! assignment follows a rank order: an administrator may only grant or revoke roles
//! ranked strictly below their own highest role, and `root` is never assignable.

use std::collections::BTreeSet;

use serde::Serialize;

string_enum! {
    pub enum Role {
        Root => "root",
        SuperAdmin => "super_admin",
        Admin => "admin",
        Editor => "editor",
        Moderator => "moderator",
        Owner => "owner",
        Resident => "resident",
        Tenant => "tenant",
    }
}

string_enum! {
    /// A section of the administrative back office.
    pub enum AdminFeature {
        Users => "users",
        Claims => "claims",
        Buildings => "buildings",
        Directory => "directory",
        Publications => "publications",
        Feedback => "feedback",
        Media => "media",
        Settings => "settings",
        AuditLog => "audit_log",
    }
}

use AdminFeature as F;

const ALL_FEATURES: &[AdminFeature] = &[
    F::Users,
    F::Claims,
    F::Buildings,
    F::Directory,
    F::Publications,
    F::Feedback,
    F::Media,
    F::Settings,
    F::AuditLog,
];

const ADMIN_FEATURES: &[AdminFeature] = &[
    F::Users,
    F::Claims,
    F::Buildings,
    F::Directory,
    F::Publications,
    F::Feedback,
    F::Media,
    F::AuditLog,
];

const EDITOR_FEATURES: &[AdminFeature] = &[F::Publications, F::Directory, F::Media];

const MODERATOR_FEATURES: &[AdminFeature] = &[F::Claims, F::Feedback, F::Users];

impl Role {
    pub fn permissions(self) -> &'static [AdminFeature] {
        match self {
            Role::Root | Role::SuperAdmin => ALL_FEATURES,
            Role::Admin => ADMIN_FEATURES,
            Role::Editor => EDITOR_FEATURES,
            Role::Moderator => MODERATOR_FEATURES,
            Role::Owner | Role::Resident | Role::Tenant => &[],
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Role::Root => 100,
            Role::SuperAdmin => 90,
            Role::Admin => 80,
            Role::Editor | Role::Moderator => 50,
            Role::Owner | Role::Resident | Role::Tenant => 10,
        }
    }
}

/// Parses stored role names, ignoring anything outside the closed set.
pub fn parse_roles<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Role> {
    let roles: BTreeSet<Role> = names.into_iter().filter_map(Role::parse).collect();
    roles.into_iter().collect()
}

pub fn features_for(roles: &[Role]) -> BTreeSet<AdminFeature> {
    roles
        .iter()
        .flat_map(|role| role.permissions().iter().copied())
        .collect()
}

pub fn has_feature(roles: &[Role], feature: AdminFeature) -> bool {
    roles.iter().any(|role| role.permissions().contains(&feature))
}

pub fn is_staff(roles: &[Role]) -> bool {
    roles.iter().any(|role| !role.permissions().is_empty())
}

pub fn highest_rank(roles: &[Role]) -> u8 {
    roles.iter().map(|role| role.rank()).max().unwrap_or(0)
}

/// Whether an actor holding `actor_roles` may grant or revoke `role`.
pub fn can_assign(actor_roles: &[Role], role: Role) -> bool {
    let actor = highest_rank(actor_roles);
    role != Role::Root && actor >= Role::Admin.rank() && role.rank() < actor
}

/// Moderators hold the `users` feature for reading only; changes need admin rank.
pub fn can_manage_accounts(actor_roles: &[Role]) -> bool {
    highest_rank(actor_roles) >= Role::Admin.rank()
}

/// Whether an actor may act on (block, change roles of) a user holding `target_roles`.
pub fn outranks(actor_roles: &[Role], target_roles: &[Role]) -> bool {
    highest_rank(actor_roles) > highest_rank(target_roles)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<AdminFeature>,
}

const fn nav(label: &'static str, path: &'static str, feature: Option<AdminFeature>) -> NavItem {
    NavItem {
        label,
        path,
        feature,
    }
}

const ADMIN_NAV: &[NavItem] = &[
    nav("Dashboard", "/admin", None),
    nav("Users", "/admin/users", Some(F::Users)),
    nav("Claims", "/admin/claims", Some(F::Claims)),
    nav("Buildings", "/admin/buildings", Some(F::Buildings)),
    nav("Publications", "/admin/publications", Some(F::Publications)),
    nav("Directory", "/admin/directory", Some(F::Directory)),
    nav("Feedback", "/admin/feedback", Some(F::Feedback)),
    nav("Media", "/admin/media", Some(F::Media)),
    nav("Audit log", "/admin/audit", Some(F::AuditLog)),
    nav("Settings", "/admin/settings", Some(F::Settings)),
];

const CABINET_NAV: &[NavItem] = &[
    nav("Profile", "/cabinet", None),
    nav("My claims", "/cabinet/claims", None),
    nav("My property", "/cabinet/property", None),
];

const ADMIN_ENTRY: NavItem = nav("Administration", "/admin", None);

/// Back-office navigation visible to `roles`, in menu order. Empty for non-staff.
pub fn admin_navigation(roles: &[Role]) -> Vec<NavItem> {
    if !is_staff(roles) {
        return Vec::new();
    }
    let features = features_for(roles);
    ADMIN_NAV
        .iter()
        .filter(|item| item.feature.map_or(true, |f| features.contains(&f)))
        .copied()
        .collect()
}

/// Personal cabinet navigation for any signed-in user.
pub fn cabinet_navigation(roles: &[Role]) -> Vec<NavItem> {
    let mut items = CABINET_NAV.to_vec();
    if is_staff(roles) {
        items.push(ADMIN_ENTRY);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residents_have_no_features() {
        let roles = [Role::Owner, Role::Tenant];
        assert!(features_for(&roles).is_empty());
        assert!(!is_staff(&roles));
        assert!(admin_navigation(&roles).is_empty());
        assert_eq!(cabinet_navigation(&roles).len(), 3);
    }

    #[test]
    fn features_are_unioned() {
        let roles = [Role::Editor, Role::Moderator];
        let features = features_for(&roles);
        assert!(features.contains(&AdminFeature::Publications));
        assert!(features.contains(&AdminFeature::Claims));
        assert!(!features.contains(&AdminFeature::Settings));
        assert!(has_feature(&roles, AdminFeature::Media));
    }

    #[test]
    fn only_super_admins_see_settings() {
        assert!(!has_feature(&[Role::Admin], AdminFeature::Settings));
        assert!(has_feature(&[Role::SuperAdmin], AdminFeature::Settings));
        assert!(has_feature(&[Role::Root], AdminFeature::Settings));
    }

    #[test]
    fn navigation_keeps_menu_order() {
        let paths: Vec<_> = admin_navigation(&[Role::Editor])
            .into_iter()
            .map(|item| item.path)
            .collect();
        assert_eq!(
            paths,
            ["/admin", "/admin/publications", "/admin/directory", "/admin/media"]
        );

        let cabinet = cabinet_navigation(&[Role::Editor]);
        assert_eq!(cabinet.last().map(|i| i.path), Some("/admin"));
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let roles = parse_roles(["admin", "janitor", "admin", "tenant"]);
        assert_eq!(roles, vec![Role::Admin, Role::Tenant]);
    }

    #[test]
    fn assignment_follows_rank() {
        assert!(can_assign(&[Role::Root], Role::SuperAdmin));
        assert!(!can_assign(&[Role::Root], Role::Root));
        assert!(can_assign(&[Role::Admin], Role::Editor));
        assert!(!can_assign(&[Role::Admin], Role::Admin));
        assert!(!can_assign(&[Role::Moderator], Role::Resident));
        assert!(!can_assign(&[Role::Owner], Role::Tenant));
    }

    #[test]
    fn outranking() {
        assert!(outranks(&[Role::Admin], &[Role::Editor, Role::Owner]));
        assert!(!outranks(&[Role::Admin], &[Role::Admin]));
        assert!(outranks(&[Role::Moderator], &[]));
        assert!(!can_manage_accounts(&[Role::Moderator, Role::Owner]));
        assert!(can_manage_accounts(&[Role::Admin]));
    }
}
