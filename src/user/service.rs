use std::sync::Arc;

use validator::Validate;

use crate::error::{Result, ServerError};
use crate::identity::{IdentityProvider, UserClaims};
use crate::profile::{Profile, ProfileStore};
use crate::user::{CallerContext, Provisioned, ProvisionRequest};

/// Admin user provisioner.
///
/// Composes the identity provider and the profile store; stateless between
/// invocations. The three outbound calls run strictly in order and are not
/// transactional: a failure after account creation leaves the account on the
/// provider with no profile record. Known gap, surfaced as `internal`.
#[derive(Clone)]
pub struct Provisioner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl Provisioner {
    /// Create a new [`Provisioner`].
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self { identity, profiles }
    }

    /// Create an account, attach its role claim and persist its profile.
    ///
    /// The permission check runs first, then validation; neither reaches a
    /// collaborator on failure.
    pub async fn provision(
        &self,
        ctx: &CallerContext,
        request: ProvisionRequest,
    ) -> Result<Provisioned> {
        if !ctx.is_admin() {
            return Err(ServerError::PermissionDenied);
        }

        request.validate()?;

        let account = self
            .identity
            .create_account(
                &request.email,
                &request.password,
                &request.display_name,
            )
            .await?;

        self.identity
            .set_claims(
                &account.uid,
                &UserClaims {
                    role: request.role.clone(),
                },
            )
            .await?;

        self.profiles
            .write(
                &account.uid,
                &Profile {
                    display_name: request.display_name,
                    email: request.email,
                    role: request.role,
                },
            )
            .await?;

        metrics::counter!("users_provisioned_total").increment(1);
        tracing::info!(
            uid = account.uid,
            caller = ctx.subject.as_deref().unwrap_or_default(),
            "user provisioned"
        );

        Ok(Provisioned {
            success: true,
            message: format!("User {} created.", account.email),
            uid: account.uid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::fakes::{MemoryIdentity, MemoryProfiles};

    fn provisioner(
        identity: &Arc<MemoryIdentity>,
        profiles: &Arc<MemoryProfiles>,
    ) -> Provisioner {
        Provisioner::new(
            Arc::clone(identity) as Arc<dyn IdentityProvider>,
            Arc::clone(profiles) as Arc<dyn ProfileStore>,
        )
    }

    fn admin() -> CallerContext {
        CallerContext {
            subject: Some("root".into()),
            role: Some("admin".into()),
        }
    }

    fn request() -> ProvisionRequest {
        ProvisionRequest {
            email: "new@provisa.dev".into(),
            password: "P$soW%920$n&".into(),
            display_name: "New User".into(),
            role: "editor".into(),
        }
    }

    #[tokio::test]
    async fn test_denies_anonymous_caller() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        let err = service
            .provision(&CallerContext::anonymous(), request())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "permission-denied");
        assert_eq!(identity.calls(), 0);
        assert!(profiles.rows().is_empty());
    }

    #[tokio::test]
    async fn test_denies_non_admin_role() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        let ctx = CallerContext {
            subject: Some("mallory".into()),
            role: Some("user".into()),
        };
        let err = service.provision(&ctx, request()).await.unwrap_err();

        assert_eq!(err.code(), "permission-denied");
        assert_eq!(identity.calls(), 0);
        assert!(profiles.rows().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_fields_before_any_call() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        for missing in ["email", "password", "displayName", "role"] {
            let mut req = request();
            match missing {
                "email" => req.email.clear(),
                "password" => req.password.clear(),
                "displayName" => req.display_name.clear(),
                _ => req.role.clear(),
            }

            let err = service.provision(&admin(), req).await.unwrap_err();
            assert_eq!(err.code(), "invalid-argument");
        }

        assert_eq!(identity.calls(), 0);
        assert!(profiles.rows().is_empty());
    }

    #[tokio::test]
    async fn test_provisions_user() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        let result = service.provision(&admin(), request()).await.unwrap();

        assert!(result.success);
        assert!(result.message.contains("new@provisa.dev"));

        let accounts = identity.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].uid, result.uid);
        assert_eq!(
            identity.claims_of(&result.uid).map(|c| c.role),
            Some("editor".to_string())
        );

        let rows = profiles.rows();
        assert_eq!(rows.len(), 1);
        let (profile, created_at) = rows.get(&result.uid).unwrap();
        assert_eq!(profile.email, "new@provisa.dev");
        assert_eq!(profile.display_name, "New User");
        assert_eq!(profile.role, "editor");
        assert!(*created_at <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        identity.seed("uid-0", "new@provisa.dev");

        let err = service.provision(&admin(), request()).await.unwrap_err();

        assert_eq!(err.code(), "already-exists");
        assert_eq!(identity.accounts().len(), 1);
        // No claims call, no profile write.
        assert!(identity.claims_of("uid-0").is_none());
        assert!(profiles.rows().is_empty());
    }

    #[tokio::test]
    async fn test_second_provision_never_duplicates() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        service.provision(&admin(), request()).await.unwrap();
        let err = service.provision(&admin(), request()).await.unwrap_err();

        assert_eq!(err.code(), "already-exists");
        assert_eq!(identity.accounts().len(), 1);
        assert_eq!(profiles.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_profile_failure_leaves_account_behind() {
        let identity = Arc::new(MemoryIdentity::default());
        let profiles = Arc::new(MemoryProfiles::failing());
        let service = provisioner(&identity, &profiles);

        let err = service.provision(&admin(), request()).await.unwrap_err();

        assert_eq!(err.code(), "internal");
        // Current behavior: the created account is not rolled back.
        assert_eq!(identity.accounts().len(), 1);
        assert!(identity.claims_of("uid-1").is_some());
        assert!(profiles.rows().is_empty());
    }

    #[tokio::test]
    async fn test_claims_failure_surfaces_internal() {
        let identity = Arc::new(MemoryIdentity::failing_claims());
        let profiles = Arc::new(MemoryProfiles::default());
        let service = provisioner(&identity, &profiles);

        let err = service.provision(&admin(), request()).await.unwrap_err();

        assert_eq!(err.code(), "internal");
        assert_eq!(identity.accounts().len(), 1);
        assert!(profiles.rows().is_empty());
    }
}
