use std::collections::{HashMap, HashSet};

/// Role granted when no group maps to anything. Downstream authorization
/// assumes every authenticated user holds at least one role.
pub const DEFAULT_ROLE: &str = "user";

/// Map external group names to internal roles through the organization's
/// configured dictionary. The result is the union over all groups; an
/// empty union collapses to the default role.
pub fn map_roles(
    groups: &HashSet<String>,
    role_mapping: &HashMap<String, Vec<String>>,
) -> HashSet<String> {
    let mut roles: HashSet<String> = groups
        .iter()
        .filter_map(|group| role_mapping.get(group))
        .flatten()
        .cloned()
        .collect();

    if roles.is_empty() {
        roles.insert(DEFAULT_ROLE.to_string());
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn mapping(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(group, roles)| {
                (
                    group.to_string(),
                    roles.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_union_across_groups() {
        let roles = map_roles(
            &groups(&["eng", "ops"]),
            &mapping(&[("eng", &["developer"]), ("ops", &["operator", "developer"])]),
        );
        assert_eq!(roles, groups(&["developer", "operator"]));
    }

    #[test]
    fn test_unmapped_groups_get_default_role() {
        let roles = map_roles(&groups(&["marketing"]), &mapping(&[("eng", &["developer"])]));
        assert_eq!(roles, groups(&[DEFAULT_ROLE]));
    }

    #[test]
    fn test_no_groups_get_default_role() {
        let roles = map_roles(&HashSet::new(), &HashMap::new());
        assert_eq!(roles, groups(&[DEFAULT_ROLE]));
    }
}
