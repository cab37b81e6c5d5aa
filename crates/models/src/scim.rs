use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SCIM 2.0 Protocol Types
// ============================================================================

/// SCIM User Resource (RFC 7643)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    pub schemas: Vec<String>,

    /// Our user ID.
    pub id: String,

    /// External identifier from the IdP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Unique username (typically email).
    pub user_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<ScimEmail>,

    pub active: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ScimGroupRef>,

    pub meta: ScimMeta,
}

impl ScimUser {
    pub fn schemas() -> Vec<String> {
        vec!["urn:ietf:params:scim:schemas:core:2.0:User".to_string()]
    }
}

/// SCIM Name component
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

/// SCIM Email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimEmail {
    pub value: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// SCIM Group Reference (for a user's groups)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimGroupRef {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// SCIM Resource Metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    pub resource_type: String,
    pub created: String,
    pub last_modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ScimMeta {
    pub fn new(
        resource_type: &str,
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
        base_url: &str,
        id: &str,
    ) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            created: created.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            last_modified: updated.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            location: Some(format!("{}/scim/v2/{}s/{}", base_url, resource_type, id)),
        }
    }
}

/// SCIM List Response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    pub schemas: Vec<String>,
    pub total_results: i64,
    pub items_per_page: i64,
    pub start_index: i64,
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    pub fn new(resources: Vec<T>, total: i64, start: i64, count: i64) -> Self {
        Self {
            schemas: vec!["urn:ietf:params:scim:api:messages:2.0:ListResponse".to_string()],
            total_results: total,
            items_per_page: count,
            start_index: start,
            resources,
        }
    }
}

/// SCIM Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimError {
    pub schemas: Vec<String>,
    pub detail: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
}

impl ScimError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            schemas: vec!["urn:ietf:params:scim:api:messages:2.0:Error".to_string()],
            detail: detail.into(),
            status,
            scim_type: None,
        }
    }

    pub fn with_type(mut self, scim_type: &str) -> Self {
        self.scim_type = Some(scim_type.to_string());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized")
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(409, detail).with_type("uniqueness")
    }

    /// PUT/PATCH/DELETE are deliberately unsupported; sync jobs must be
    /// able to detect the gap rather than see a silent no-op.
    pub fn unsupported(operation: &str) -> Self {
        Self::new(501, format!("{} is not supported", operation)).with_type("unsupported")
    }
}

/// Request to create a SCIM user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScimUser {
    pub schemas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub groups: Vec<ScimGroupRef>,
}

fn default_active() -> bool {
    true
}

impl CreateScimUser {
    /// Primary email, first email, or the userName as a last resort.
    pub fn email(&self) -> String {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or(self.emails.first())
            .map(|e| e.value.clone())
            .unwrap_or_else(|| self.user_name.clone())
    }
}

/// SCIM Service Provider Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    pub schemas: Vec<String>,
    pub patch: SupportedFeature,
    pub bulk: SupportedFeature,
    pub filter: SupportedFeature,
    pub change_password: SupportedFeature,
    pub sort: SupportedFeature,
    pub etag: SupportedFeature,
    pub authentication_schemes: Vec<AuthenticationScheme>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedFeature {
    pub supported: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationScheme {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub authentication_type: String,
    pub primary: bool,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        let unsupported = SupportedFeature { supported: false };
        Self {
            schemas: vec![
                "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig".to_string(),
            ],
            patch: SupportedFeature { supported: false },
            bulk: unsupported.clone(),
            filter: unsupported.clone(),
            change_password: unsupported.clone(),
            sort: unsupported.clone(),
            etag: unsupported,
            authentication_schemes: vec![AuthenticationScheme {
                name: "OAuth Bearer Token".to_string(),
                description: "Authentication scheme using the OAuth Bearer Token Standard"
                    .to_string(),
                authentication_type: "oauthbearertoken".to_string(),
                primary: true,
            }],
        }
    }
}
