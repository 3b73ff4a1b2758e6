//! Tenant registry
//!
//! Typed operations over the shared directory store: tenants, their custom
//! domains, user accounts and password reset tokens.

use crate::error::{Result, StorageError, TenantError};
use crate::params;
use crate::password::PasswordHasher;
use crate::provisioner::DomainProvisioner;
use crate::storage::{Record, Statement, StorageGateway};
use crate::tenant::{Tenant, validate_custom_domain, validate_subdomain};
use chrono::{DateTime, Utc};
use inscribe_log::{info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Reset tokens are valid for one hour
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

const TENANT_COLUMNS: &str =
    "id, subdomain, custom_domain, display_name, created_at, provider_metadata";

const USER_COLUMNS: &str = "id, email, password_hash, tenant_id, created_at";

/// A user account. Each user owns exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

#[derive(Deserialize)]
struct TenantRow {
    id: String,
    subdomain: String,
    custom_domain: Option<String>,
    display_name: String,
    created_at: DateTime<Utc>,
    provider_metadata: Option<String>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            subdomain: row.subdomain,
            custom_domain: row.custom_domain,
            display_name: row.display_name,
            created_at: row.created_at,
            provider_metadata: row
                .provider_metadata
                .and_then(|raw| serde_json::from_str(&raw).ok()),
        }
    }
}

#[derive(Deserialize)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    tenant_id: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            tenant_id: row.tenant_id,
            created_at: row.created_at,
            password_hash: row.password_hash,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(record: Record) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| {
        TenantError::Storage(StorageError::Decode {
            column: "<row>".to_string(),
            reason: e.to_string(),
        })
    })
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid || email.len() > 254 {
        return Err(TenantError::Invalid(format!(
            "'{}' is not a valid email address",
            raw.trim()
        )));
    }
    Ok(email)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Registry of tenants and their owners
pub struct TenantRegistry {
    storage: Arc<StorageGateway>,
    main_domain: String,
    provisioner: Arc<dyn DomainProvisioner>,
    hasher: PasswordHasher,
}

impl TenantRegistry {
    pub fn new(
        storage: Arc<StorageGateway>,
        main_domain: impl Into<String>,
        provisioner: Arc<dyn DomainProvisioner>,
    ) -> Self {
        Self {
            storage,
            main_domain: main_domain.into(),
            provisioner,
            hasher: PasswordHasher::new(),
        }
    }

    pub fn main_domain(&self) -> &str {
        &self.main_domain
    }

    pub fn storage(&self) -> &Arc<StorageGateway> {
        &self.storage
    }

    // ========== Tenants ==========

    /// Register a new tenant
    pub async fn create_tenant(&self, subdomain: &str, display_name: &str) -> Result<Tenant> {
        let subdomain = validate_subdomain(subdomain)?;
        let tenant = Tenant::new(subdomain, display_name.trim());

        self.storage
            .run(
                None,
                &format!("INSERT INTO tenants ({TENANT_COLUMNS}) VALUES (?, ?, NULL, ?, ?, NULL)"),
                &params![
                    &tenant.id,
                    &tenant.subdomain,
                    &tenant.display_name,
                    tenant.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| match e {
                e if e.is_constraint() => {
                    TenantError::Conflict(format!("subdomain '{}'", tenant.subdomain))
                }
                e => e.into(),
            })?;

        info!(tenant = %tenant.subdomain, id = %tenant.id, "Tenant created");
        Ok(tenant)
    }

    /// Create a tenant and its owner in one transaction
    pub async fn register_owner(
        &self,
        subdomain: &str,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(Tenant, User)> {
        let subdomain = validate_subdomain(subdomain)?;
        let email = normalize_email(email)?;
        let password_hash = self.hasher.hash(password)?;

        if self.find_by_subdomain(&subdomain).await?.is_some() {
            return Err(TenantError::Conflict(format!("subdomain '{}'", subdomain)));
        }
        if self.find_user_by_email(&email).await?.is_some() {
            return Err(TenantError::Conflict(format!("email '{}'", email)));
        }

        let display_name = match display_name.trim() {
            "" => subdomain.clone(),
            name => name.to_string(),
        };
        let tenant = Tenant::new(subdomain, display_name);
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            tenant_id: tenant.id.clone(),
            created_at: tenant.created_at,
            password_hash,
        };

        let statements = vec![
            Statement::new(
                format!("INSERT INTO tenants ({TENANT_COLUMNS}) VALUES (?, ?, NULL, ?, ?, NULL)"),
                params![
                    &tenant.id,
                    &tenant.subdomain,
                    &tenant.display_name,
                    tenant.created_at.to_rfc3339()
                ],
            ),
            Statement::new(
                format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
                params![
                    &user.id,
                    &user.email,
                    &user.password_hash,
                    &user.tenant_id,
                    user.created_at.to_rfc3339()
                ],
            ),
        ];

        // A concurrent registration can still win the race between the checks and here
        self.storage
            .transaction(None, &statements)
            .await
            .map_err(|e| match e {
                e if e.is_constraint() => {
                    TenantError::Conflict("subdomain or email already registered".to_string())
                }
                e => e.into(),
            })?;

        info!(tenant = %tenant.subdomain, user = %user.id, "Registered tenant owner");
        Ok((tenant, user))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>> {
        self.find_tenant_where("id = ?", id).await
    }

    pub async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        self.find_tenant_where("subdomain = ?", &subdomain.to_ascii_lowercase())
            .await
    }

    pub async fn find_by_custom_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        self.find_tenant_where("custom_domain = ?", &domain.to_ascii_lowercase())
            .await
    }

    async fn find_tenant_where(&self, clause: &str, value: &str) -> Result<Option<Tenant>> {
        let record = self
            .storage
            .query_one(
                None,
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE {clause}"),
                &params![value],
            )
            .await?;
        record
            .map(|r| decode::<TenantRow>(r).map(Tenant::from))
            .transpose()
    }

    /// Custom domain linked to `subdomain`, if any
    pub async fn custom_domain_for(&self, subdomain: &str) -> Result<Option<String>> {
        Ok(self
            .find_by_subdomain(subdomain)
            .await?
            .and_then(|t| t.custom_domain))
    }

    /// Every linked custom domain, mapped to its tenant's subdomain
    pub async fn custom_domain_map(&self) -> Result<HashMap<String, String>> {
        let records = self
            .storage
            .query(
                None,
                "SELECT custom_domain, subdomain FROM tenants WHERE custom_domain IS NOT NULL",
                &[],
            )
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let domain = r.get("custom_domain")?.as_str()?.to_string();
                let subdomain = r.get("subdomain")?.as_str()?.to_string();
                Some((domain, subdomain))
            })
            .collect())
    }

    /// Link a custom domain to a tenant, registering it with the DNS provider.
    ///
    /// Nothing is persisted when the provider call fails.
    pub async fn attach_custom_domain(&self, subdomain: &str, domain: &str) -> Result<Tenant> {
        let domain = validate_custom_domain(domain, &self.main_domain)?;
        let mut tenant = self
            .find_by_subdomain(subdomain)
            .await?
            .ok_or_else(|| TenantError::NotFound(subdomain.to_string()))?;

        if tenant.custom_domain.as_deref() == Some(domain.as_str()) {
            return Ok(tenant);
        }
        if let Some(owner) = self.find_by_custom_domain(&domain).await? {
            if owner.id != tenant.id {
                return Err(TenantError::Conflict(format!("domain '{}'", domain)));
            }
        }

        let metadata = self.provisioner.register(&domain).await.inspect_err(|e| {
            warn!(tenant = %tenant.subdomain, domain = %domain, error = %e, "Domain provisioning failed");
        })?;

        self.storage
            .run(
                None,
                "UPDATE tenants SET custom_domain = ?, provider_metadata = ? WHERE id = ?",
                &params![&domain, metadata.to_string(), &tenant.id],
            )
            .await
            .map_err(|e| match e {
                e if e.is_constraint() => TenantError::Conflict(format!("domain '{}'", domain)),
                e => e.into(),
            })?;

        info!(tenant = %tenant.subdomain, domain = %domain, "Custom domain attached");
        tenant.custom_domain = Some(domain);
        tenant.provider_metadata = Some(metadata);
        Ok(tenant)
    }

    // ========== Users ==========

    pub async fn create_user(&self, tenant_id: &str, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email)?;
        if self.find_by_id(tenant_id).await?.is_none() {
            return Err(TenantError::NotFound(tenant_id.to_string()));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            tenant_id: tenant_id.to_string(),
            created_at: Utc::now(),
            password_hash: self.hasher.hash(password)?,
        };

        self.storage
            .run(
                None,
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
                &params![
                    &user.id,
                    &user.email,
                    &user.password_hash,
                    &user.tenant_id,
                    user.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| match e {
                e if e.is_constraint() => TenantError::Conflict(format!("email '{}'", user.email)),
                e => e.into(),
            })?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user_where("email = ?", &email.trim().to_ascii_lowercase())
            .await
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_user_where("id = ?", id).await
    }

    async fn find_user_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let record = self
            .storage
            .query_one(
                None,
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}"),
                &params![value],
            )
            .await?;
        record
            .map(|r| decode::<UserRow>(r).map(User::from))
            .transpose()
    }

    /// Check an email/password pair
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .find_user_by_email(email)
            .await?
            .ok_or(TenantError::Unauthorized)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(TenantError::Unauthorized);
        }
        Ok(user)
    }

    pub async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        let password_hash = self.hasher.hash(new_password)?;
        let result = self
            .storage
            .run(
                None,
                "UPDATE users SET password_hash = ? WHERE id = ?",
                &params![password_hash, user_id],
            )
            .await?;

        if result.rows_affected == 0 {
            return Err(TenantError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    // ========== Password reset ==========

    /// Issue a single-use reset token. Only its SHA-256 digest is stored.
    pub async fn create_reset_token(&self, user_id: &str) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at = Utc::now().timestamp() + RESET_TOKEN_TTL_SECS;

        self.storage
            .run(
                None,
                "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at, used) VALUES (?, ?, ?, 0)",
                &params![hash_token(&token), user_id, expires_at],
            )
            .await?;

        Ok(token)
    }

    /// Mark a token used and return its user. Unknown, expired and already
    /// used tokens are all rejected the same way.
    pub async fn consume_reset_token(&self, token: &str) -> Result<User> {
        let token_hash = hash_token(token.trim());
        let now = Utc::now().timestamp();

        let claimed = self
            .storage
            .run(
                None,
                "UPDATE password_reset_tokens SET used = 1 WHERE token_hash = ? AND used = 0 AND expires_at > ?",
                &params![&token_hash, now],
            )
            .await?;
        if claimed.rows_affected == 0 {
            return Err(TenantError::Invalid(
                "reset token is invalid or has expired".to_string(),
            ));
        }

        let record = self
            .storage
            .query_one(
                None,
                "SELECT user_id FROM password_reset_tokens WHERE token_hash = ?",
                &params![&token_hash],
            )
            .await?;
        let user_id = record
            .and_then(|r| r.get("user_id")?.as_str().map(str::to_string))
            .ok_or_else(|| TenantError::NotFound("reset token user".to_string()))?;

        self.find_user_by_id(&user_id)
            .await?
            .ok_or(TenantError::NotFound(user_id))
    }

    /// Set the user's new password and burn `token`, both or neither
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User> {
        let password_hash = self.hasher.hash(new_password)?;
        let token_hash = hash_token(token.trim());
        let now = Utc::now().timestamp();

        let statements = [
            Statement::new(
                "UPDATE users SET password_hash = ? WHERE id = (SELECT user_id FROM password_reset_tokens \
                 WHERE token_hash = ? AND used = 0 AND expires_at > ?)",
                params![password_hash, &token_hash, now],
            ),
            Statement::new(
                "UPDATE password_reset_tokens SET used = 1 WHERE token_hash = ? AND used = 0 AND expires_at > ? \
                 AND user_id IN (SELECT id FROM users)",
                params![&token_hash, now],
            ),
        ];
        let results = self.storage.transaction(None, &statements).await?;
        if results.iter().any(|r| r.rows_affected == 0) {
            return Err(TenantError::Invalid(
                "reset token is invalid or has expired".to_string(),
            ));
        }

        let record = self
            .storage
            .query_one(
                None,
                "SELECT user_id FROM password_reset_tokens WHERE token_hash = ?",
                &params![&token_hash],
            )
            .await?;
        let user_id = record
            .and_then(|r| r.get("user_id")?.as_str().map(str::to_string))
            .ok_or_else(|| TenantError::NotFound("reset token user".to_string()))?;
        let user = self
            .find_user_by_id(&user_id)
            .await?
            .ok_or(TenantError::NotFound(user_id))?;

        info!(user = %user.id, "Password reset");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::provisioner::NoOpProvisioner;
    use crate::storage::StorageConfig;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct FailingProvisioner;

    #[async_trait]
    impl DomainProvisioner for FailingProvisioner {
        async fn register(&self, domain: &str) -> std::result::Result<Value, ProvisionError> {
            Err(ProvisionError::Rejected {
                domain: domain.to_string(),
                status: 400,
                message: "nope".into(),
            })
        }
    }

    fn registry(dir: &tempfile::TempDir, provisioner: Arc<dyn DomainProvisioner>) -> TenantRegistry {
        let storage = Arc::new(StorageGateway::new(StorageConfig::new(dir.path())));
        TenantRegistry::new(storage, "inscribe.so", provisioner)
    }

    #[tokio::test]
    async fn test_create_and_find_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));

        let tenant = registry.create_tenant("Dhaval", "Dhaval's notes").await.unwrap();
        assert_eq!(tenant.subdomain, "dhaval");

        let found = registry.find_by_subdomain("dhaval").await.unwrap().unwrap();
        assert_eq!(found.id, tenant.id);
        assert_eq!(found.display_name, "Dhaval's notes");
        assert_eq!(registry.find_by_id(&tenant.id).await.unwrap().unwrap().subdomain, "dhaval");
        assert!(registry.find_by_subdomain("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_reserved_subdomains() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));

        registry.create_tenant("dhaval", "D").await.unwrap();
        assert!(matches!(
            registry.create_tenant("dhaval", "D2").await,
            Err(TenantError::Conflict(_))
        ));
        assert!(matches!(
            registry.create_tenant("admin", "A").await,
            Err(TenantError::Reserved(_))
        ));
        assert!(matches!(
            registry
                .register_owner("blog", "B", "b@example.com", "long enough pw")
                .await,
            Err(TenantError::Reserved(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_custom_domain() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));
        registry.create_tenant("abhinav", "A").await.unwrap();
        registry.create_tenant("dhaval", "D").await.unwrap();

        let tenant = registry
            .attach_custom_domain("abhinav", "Abhinav.dev")
            .await
            .unwrap();
        assert_eq!(tenant.custom_domain.as_deref(), Some("abhinav.dev"));
        assert_eq!(tenant.provider_metadata, Some(json!({"status": "skipped"})));

        assert_eq!(
            registry.custom_domain_for("abhinav").await.unwrap().as_deref(),
            Some("abhinav.dev")
        );
        assert_eq!(registry.custom_domain_for("dhaval").await.unwrap(), None);

        let map = registry.custom_domain_map().await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("abhinav.dev").map(String::as_str), Some("abhinav"));

        let stored = registry.find_by_custom_domain("abhinav.dev").await.unwrap().unwrap();
        assert_eq!(stored.provider_metadata, Some(json!({"status": "skipped"})));

        // Claimed by another tenant
        assert!(matches!(
            registry.attach_custom_domain("dhaval", "abhinav.dev").await,
            Err(TenantError::Conflict(_))
        ));
        // Under the main domain
        assert!(matches!(
            registry.attach_custom_domain("dhaval", "x.inscribe.so").await,
            Err(TenantError::Invalid(_))
        ));
        assert!(matches!(
            registry.attach_custom_domain("ghost", "ghost.dev").await,
            Err(TenantError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_provisioning_failure_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(FailingProvisioner));
        registry.create_tenant("abhinav", "A").await.unwrap();

        let err = registry
            .attach_custom_domain("abhinav", "abhinav.dev")
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::Provisioning(_)));
        assert_eq!(registry.custom_domain_for("abhinav").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_register_owner_and_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));

        let (tenant, user) = registry
            .register_owner("dhaval", "", "Dhaval@Example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(tenant.display_name, "dhaval");
        assert_eq!(user.email, "dhaval@example.com");
        assert_eq!(user.tenant_id, tenant.id);

        let verified = registry
            .verify_credentials("DHAVAL@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(verified.id, user.id);
        assert!(matches!(
            registry.verify_credentials("dhaval@example.com", "wrong-password").await,
            Err(TenantError::Unauthorized)
        ));
        assert!(matches!(
            registry.verify_credentials("nobody@example.com", "hunter2hunter2").await,
            Err(TenantError::Unauthorized)
        ));

        registry.update_password(&user.id, "correct horse battery").await.unwrap();
        assert!(registry.verify_credentials("dhaval@example.com", "correct horse battery").await.is_ok());
        assert!(matches!(
            registry.update_password("missing", "correct horse battery").await,
            Err(TenantError::NotFound(_))
        ));

        // Same email, different subdomain
        assert!(matches!(
            registry
                .register_owner("other", "", "dhaval@example.com", "hunter2hunter2")
                .await,
            Err(TenantError::Conflict(_))
        ));
        assert!(registry.find_by_subdomain("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_user_for_existing_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));
        let tenant = registry.create_tenant("team", "Team").await.unwrap();

        let user = registry
            .create_user(&tenant.id, "editor@example.com", "long-enough")
            .await
            .unwrap();
        assert_eq!(
            registry.find_user_by_id(&user.id).await.unwrap().unwrap().email,
            "editor@example.com"
        );
        assert!(matches!(
            registry.create_user("missing", "x@example.com", "long-enough").await,
            Err(TenantError::NotFound(_))
        ));
        assert!(matches!(
            registry.create_user(&tenant.id, "not-an-email", "long-enough").await,
            Err(TenantError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));
        let (_, user) = registry
            .register_owner("dhaval", "D", "d@example.com", "old-password")
            .await
            .unwrap();

        let token = registry.create_reset_token(&user.id).await.unwrap();
        assert_eq!(token.len(), 64);

        let reset = registry.reset_password(&token, "new-password").await.unwrap();
        assert_eq!(reset.id, user.id);
        assert!(registry.verify_credentials("d@example.com", "new-password").await.is_ok());
        assert!(registry.verify_credentials("d@example.com", "old-password").await.is_err());

        assert!(matches!(
            registry.reset_password(&token, "another-password").await,
            Err(TenantError::Invalid(_))
        ));
        assert!(matches!(
            registry.consume_reset_token("deadbeef").await,
            Err(TenantError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_token() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));
        let (_, user) = registry
            .register_owner("dhaval", "D", "d@example.com", "old-password")
            .await
            .unwrap();
        let token = registry.create_reset_token(&user.id).await.unwrap();

        assert!(matches!(
            registry.reset_password(&token, "short").await,
            Err(TenantError::Invalid(_))
        ));

        let storage = registry.storage();
        storage
            .run(
                None,
                "CREATE TRIGGER lock_passwords BEFORE UPDATE OF password_hash ON users \
                 BEGIN SELECT RAISE(ABORT, 'passwords locked'); END",
                &[],
            )
            .await
            .unwrap();
        assert!(registry.reset_password(&token, "new-password").await.is_err());
        storage
            .run(None, "DROP TRIGGER lock_passwords", &[])
            .await
            .unwrap();

        let reset = registry.reset_password(&token, "new-password").await.unwrap();
        assert_eq!(reset.id, user.id);
        assert!(registry.verify_credentials("d@example.com", "new-password").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir, Arc::new(NoOpProvisioner));
        let (_, user) = registry
            .register_owner("dhaval", "D", "d@example.com", "old-password")
            .await
            .unwrap();

        let token = registry.create_reset_token(&user.id).await.unwrap();
        registry
            .storage()
            .run(
                None,
                "UPDATE password_reset_tokens SET expires_at = ?",
                &params![Utc::now().timestamp() - 1],
            )
            .await
            .unwrap();

        assert!(matches!(
            registry.consume_reset_token(&token).await,
            Err(TenantError::Invalid(_))
        ));
        assert!(matches!(
            registry.reset_password(&token, "new-password").await,
            Err(TenantError::Invalid(_))
        ));
    }
}
