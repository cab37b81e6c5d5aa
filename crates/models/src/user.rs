use crate::config::SsoProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A user record owned by an organization.
///
/// `roles` is always derived from `groups` through the organization's role
/// mapping and is never edited directly. `external_id` is the provider's
/// subject identifier and, together with `sso_provider`, the natural key
/// for federation within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseUser {
    pub id: Uuid,
    pub organization_id: Uuid,

    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    pub groups: HashSet<String>,
    pub roles: HashSet<String>,

    pub is_active: bool,

    pub sso_provider: Option<SsoProvider>,
    pub external_id: Option<String>,

    pub last_login: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnterpriseUser {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = EnterpriseUser {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "a@acme.com".to_string(),
            first_name: None,
            last_name: None,
            groups: HashSet::new(),
            roles: HashSet::new(),
            is_active: true,
            sso_provider: None,
            external_id: None,
            last_login: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "a@acme.com");

        let named = EnterpriseUser {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..user
        };
        assert_eq!(named.display_name(), "Ada Lovelace");
    }
}
