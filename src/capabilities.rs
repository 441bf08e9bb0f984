use std::collections::HashSet;

use crate::models::PostRow;
use crate::php::PhpValue;

/// Flat, additive-only permission set. Role data is user-configurable so
/// capability names stay an open string set rather than a closed enum.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet(HashSet<String>);

impl CapabilitySet {
    pub fn grant(&mut self, cap: &str) {
        self.0.insert(cap.to_string());
    }

    pub fn has(&self, cap: &str) -> bool {
        self.0.contains(cap)
    }

    pub fn has_all<'a>(&self, caps: impl IntoIterator<Item = &'a str>) -> bool {
        caps.into_iter().all(|c| self.has(c))
    }
}

/// An authenticated actor, constructed fresh per request. Never cached.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
    pub roles: Vec<String>,
    pub caps: CapabilitySet,
}

/// Merges an account's role-assignment map with the site's role
/// definitions into a resolved capability set. Assigned names that do not
/// match a defined role are treated as directly-assigned capabilities. A
/// capability is present if any assigned role grants it; there are no
/// negative grants.
pub fn resolve_capabilities(
    assignment: &PhpValue,
    role_definitions: &PhpValue,
) -> (Vec<String>, CapabilitySet) {
    let mut roles = Vec::new();
    let mut caps = CapabilitySet::default();

    for (key, assigned) in assignment.entries() {
        let Some(name) = key.as_str() else { continue };
        if !assigned.is_truthy() {
            continue;
        }
        match role_definitions.get(name) {
            Some(role) => {
                roles.push(name.to_string());
                if let Some(granted) = role.get("capabilities") {
                    for (cap, on) in granted.entries() {
                        if let Some(cap) = cap.as_str() {
                            if on.is_truthy() {
                                caps.grant(cap);
                            }
                        }
                    }
                }
            }
            None => caps.grant(name),
        }
    }

    (roles, caps)
}

/// Primitive capabilities required to edit a given post, derived from
/// ownership and status. All of them must be held.
pub fn edit_post_caps(actor_id: i64, post: &PostRow) -> Vec<&'static str> {
    let mut required = Vec::new();
    if post.post_author == actor_id {
        if post.is_published() {
            required.push("edit_published_posts");
        } else {
            required.push("edit_posts");
        }
    } else {
        required.push("edit_others_posts");
        if post.is_published() {
            required.push("edit_published_posts");
        } else if post.post_status == "private" {
            required.push("edit_private_posts");
        }
    }
    required
}

pub fn can_edit_post(user: &CurrentUser, post: &PostRow) -> bool {
    user.caps.has_all(edit_post_caps(user.id, post))
}

/// Capability gating term assignment for a taxonomy. The per-term model
/// of the upstream platform is out of scope; the assignment capability
/// falls back to plain `edit_posts` when the role data does not carry the
/// taxonomy-specific one.
pub fn can_assign_terms(user: &CurrentUser, taxonomy: &str) -> bool {
    let specific = match taxonomy {
        "category" => "assign_categories",
        "post_tag" => "assign_post_tags",
        _ => return user.caps.has("edit_posts"),
    };
    user.caps.has(specific) || user.caps.has("edit_posts")
}

pub fn can_set_sticky(user: &CurrentUser) -> bool {
    user.caps.has("edit_others_posts") || user.caps.has("publish_posts")
}

#[cfg(test)]
pub fn test_user(id: i64, caps: &[&str]) -> CurrentUser {
    let mut set = CapabilitySet::default();
    for c in caps {
        set.grant(c);
    }
    CurrentUser {
        id,
        login: format!("user{id}"),
        roles: vec![],
        caps: set,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::php;

    fn post(author: i64, status: &str) -> PostRow {
        PostRow {
            id: 42,
            post_author: author,
            post_date: "2026-01-10 09:00:00".into(),
            post_date_gmt: "2026-01-10 09:00:00".into(),
            post_content: String::new(),
            post_title: String::new(),
            post_excerpt: String::new(),
            post_status: status.into(),
            comment_status: "open".into(),
            ping_status: "open".into(),
            post_password: String::new(),
            post_name: String::new(),
            post_modified: "2026-01-10 09:00:00".into(),
            post_modified_gmt: "2026-01-10 09:00:00".into(),
            post_parent: 0,
            guid: String::new(),
            menu_order: 0,
            post_type: "post".into(),
        }
    }

    #[test]
    fn resolves_union_of_assigned_roles() {
        let roles = php::decode(concat!(
            "a:2:{s:6:\"author\";a:2:{s:4:\"name\";s:6:\"Author\";",
            "s:12:\"capabilities\";a:1:{s:10:\"edit_posts\";b:1;}}",
            "s:6:\"editor\";a:2:{s:4:\"name\";s:6:\"Editor\";",
            "s:12:\"capabilities\";a:2:{s:17:\"edit_others_posts\";b:1;",
            "s:12:\"delete_posts\";b:0;}}}"
        ))
        .unwrap();
        let assigned =
            php::decode("a:2:{s:6:\"author\";b:1;s:6:\"editor\";b:1;}").unwrap();

        let (names, caps) = resolve_capabilities(&assigned, &roles);
        assert_eq!(names, vec!["author", "editor"]);
        assert!(caps.has("edit_posts"));
        assert!(caps.has("edit_others_posts"));
        assert!(!caps.has("delete_posts"));
    }

    #[test]
    fn unassigned_roles_grant_nothing() {
        let roles = php::decode(concat!(
            "a:1:{s:6:\"editor\";a:2:{s:4:\"name\";s:6:\"Editor\";",
            "s:12:\"capabilities\";a:1:{s:10:\"edit_posts\";b:1;}}}"
        ))
        .unwrap();
        let assigned = php::decode("a:1:{s:6:\"editor\";b:0;}").unwrap();
        let (names, caps) = resolve_capabilities(&assigned, &roles);
        assert!(names.is_empty());
        assert!(!caps.has("edit_posts"));
    }

    #[test]
    fn unknown_assignment_is_a_direct_capability() {
        let roles = PhpValue::Arr(vec![]);
        let assigned = php::decode("a:1:{s:13:\"publish_posts\";b:1;}").unwrap();
        let (names, caps) = resolve_capabilities(&assigned, &roles);
        assert!(names.is_empty());
        assert!(caps.has("publish_posts"));
    }

    #[test]
    fn owner_of_draft_needs_base_edit_only() {
        assert_eq!(edit_post_caps(7, &post(7, "draft")), vec!["edit_posts"]);
    }

    #[test]
    fn owner_of_published_needs_edit_published() {
        assert_eq!(
            edit_post_caps(7, &post(7, "publish")),
            vec!["edit_published_posts"]
        );
        assert_eq!(
            edit_post_caps(7, &post(7, "future")),
            vec!["edit_published_posts"]
        );
    }

    #[test]
    fn non_owner_needs_edit_others_plus_status_cap() {
        assert_eq!(
            edit_post_caps(7, &post(9, "draft")),
            vec!["edit_others_posts"]
        );
        assert_eq!(
            edit_post_caps(7, &post(9, "publish")),
            vec!["edit_others_posts", "edit_published_posts"]
        );
        assert_eq!(
            edit_post_caps(7, &post(9, "private")),
            vec!["edit_others_posts", "edit_private_posts"]
        );
    }

    #[test]
    fn partial_satisfaction_is_denial() {
        let user = test_user(7, &["edit_others_posts"]);
        assert!(!can_edit_post(&user, &post(9, "publish")));
    }

    #[test]
    fn term_assignment_falls_back_to_edit_posts() {
        let plain = test_user(1, &["edit_posts"]);
        assert!(can_assign_terms(&plain, "category"));
        assert!(can_assign_terms(&plain, "post_tag"));

        let specific = test_user(2, &["assign_categories"]);
        assert!(can_assign_terms(&specific, "category"));
        assert!(!can_assign_terms(&specific, "post_tag"));
    }

    #[test]
    fn sticky_needs_edit_others_or_publish() {
        assert!(can_set_sticky(&test_user(1, &["publish_posts"])));
        assert!(can_set_sticky(&test_user(1, &["edit_others_posts"])));
        assert!(!can_set_sticky(&test_user(1, &["edit_posts"])));
    }
}
