//! Integration tests for the account, authorization and registry services.
//!
//! Tests: services → in-memory store → sharded cache → mail handoff
//!
//! Verifies:
//! - Login throttling and block expiry against a simulated clock
//! - Role/permission answers never outlive the mutation that changed them
//! - Registry uniqueness, seed data and protected rows

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use rolegate_auth::{
        AccountService, AuthError, AuthSettings, AuthorizationEngine, CredentialStore,
        MailDispatcher, MessageKind, RbacRegistry, RbacStore, Requirement, RoleStore, TokenError,
        TokenKeys, TokenPurpose, TokenService, User, UserStore,
    };
    use rolegate_core::{Clock, DomainError, ManualClock, PermissionId, RoleId, UserId};

    use crate::cache::ShardedAuthzCache;
    use crate::mail::{BackgroundMailDispatcher, MailError, Mailer, MemoryMailer};
    use crate::store::InMemoryRbacStore;

    const PASSWORD: &str = "correct-horse";

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<InMemoryRbacStore>,
        mailer: MemoryMailer,
        tokens: Arc<TokenService>,
        authz: Arc<AuthorizationEngine>,
        accounts: AccountService,
        registry: RbacRegistry,
    }

    async fn harness_with(settings: AuthSettings, mail: Option<Arc<dyn MailDispatcher>>) -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(InMemoryRbacStore::new());
        let dyn_store: Arc<dyn RbacStore> = store.clone();
        let cache = Arc::new(ShardedAuthzCache::new(settings.cache_ttl, dyn_clock.clone()));
        let mailer = MemoryMailer::new();
        let mail: Arc<dyn MailDispatcher> = match mail {
            Some(mail) => mail,
            None => Arc::new(mailer.clone()),
        };

        let keys = TokenKeys::new("integration-secret").unwrap();
        let tokens = Arc::new(TokenService::new(keys, dyn_clock.clone(), settings.token_ttl));
        let authz = Arc::new(AuthorizationEngine::new(
            dyn_store.clone(),
            cache,
            dyn_clock.clone(),
            settings.clone(),
        ));
        let accounts = AccountService::new(
            dyn_store.clone(),
            tokens.clone(),
            CredentialStore::with_cost(8, 1, 1).unwrap(),
            authz.clone(),
            mail,
            dyn_clock.clone(),
            settings,
        );
        let registry = RbacRegistry::new(dyn_store, authz.clone(), dyn_clock);
        assert!(registry.seed_defaults().await.unwrap());

        Harness {
            clock,
            store,
            mailer,
            tokens,
            authz,
            accounts,
            registry,
        }
    }

    async fn harness() -> Harness {
        harness_with(AuthSettings::default().with_admin_emails(["root@example.com"]), None).await
    }

    async fn register(h: &Harness, name: &str) -> User {
        h.accounts
            .register(name, &format!("{name}@example.com"), PASSWORD)
            .await
            .unwrap()
    }

    fn role_id(name: &str) -> RoleId {
        match name {
            "admin" => RoleId::new(1),
            "moderate" => RoleId::new(2),
            "users" => RoleId::new(3),
            other => panic!("unknown seed role {other}"),
        }
    }

    // ─── Account state machine ───

    #[tokio::test]
    async fn scenario_alice_throttled_then_released() {
        let h = harness().await;
        let alice = register(&h, "alice").await;

        for _ in 0..5 {
            let err = h.accounts.login("alice@example.com", "wrong").await.unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
        }
        let stored = h.accounts.get_user(alice.id).await.unwrap();
        assert!(stored.blocked);
        assert!(stored.block_time.is_some());
        assert!(h.accounts.is_blocked(alice.id).await.unwrap());

        // right password does not get through while throttled
        let err = h.accounts.login("alice@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::AccountBlocked);

        h.clock.advance(Duration::seconds(61));
        assert!(!h.accounts.is_blocked(alice.id).await.unwrap());
        let stored = h.accounts.get_user(alice.id).await.unwrap();
        assert_eq!(stored.login_attempts, 0);
        assert!(!stored.blocked);
        assert!(stored.block_time.is_none());

        let session = h.accounts.login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.user.id, alice.id);
        assert_eq!(session.token.claims.purpose, TokenPurpose::Session);
    }

    #[tokio::test]
    async fn typo_after_block_window_starts_a_fresh_count() {
        let h = harness().await;
        let alice = register(&h, "alice").await;
        for _ in 0..5 {
            let _ = h.accounts.login("alice@example.com", "wrong").await;
        }
        assert!(h.accounts.get_user(alice.id).await.unwrap().blocked);

        // no is_blocked call in between: the failed login itself must release
        h.clock.advance(Duration::seconds(61));
        let err = h.accounts.login("alice@example.com", "wrong").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        let stored = h.accounts.get_user(alice.id).await.unwrap();
        assert_eq!(stored.login_attempts, 1);
        assert!(!stored.blocked);
        assert!(!h.accounts.is_blocked(alice.id).await.unwrap());
        h.accounts.login("alice@example.com", PASSWORD).await.unwrap();
    }

    #[tokio::test]
    async fn successful_login_resets_attempts() {
        let h = harness().await;
        let alice = register(&h, "alice").await;
        for _ in 0..3 {
            let _ = h.accounts.login("alice@example.com", "wrong").await;
        }
        assert_eq!(h.accounts.get_user(alice.id).await.unwrap().login_attempts, 3);

        let session = h.accounts.login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.user.login_attempts, 0);
        assert!(session.user.last_login_attempt.is_none());
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let h = harness().await;
        let err = h.accounts.login("nobody@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn administrative_block_is_permanent_until_unblocked() {
        let h = harness().await;
        let bob = register(&h, "bob").await;
        let admin = UserId::new(99);

        h.accounts.block_account(bob.id, Some(admin)).await.unwrap();
        h.clock.advance(Duration::days(30));
        assert!(h.accounts.is_blocked(bob.id).await.unwrap());
        assert_eq!(
            h.accounts.login("bob@example.com", PASSWORD).await.unwrap_err(),
            AuthError::AccountBlocked
        );

        let unblocked = h.accounts.unblock_account(bob.id, Some(admin)).await.unwrap();
        assert_eq!(unblocked.audit.updated_by, Some(admin));
        assert!(h.accounts.login("bob@example.com", PASSWORD).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_block_checks_release_exactly_once() {
        let h = Arc::new(harness().await);
        let alice = register(&h, "alice").await;
        for _ in 0..5 {
            h.accounts.handle_failed_login(alice.id).await.unwrap();
        }
        h.clock.advance(Duration::seconds(60));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.accounts.is_blocked(alice.id).await.unwrap() })
            })
            .collect();
        for t in tasks {
            assert!(!t.await.unwrap());
        }
        let stored = h.accounts.get_user(alice.id).await.unwrap();
        assert_eq!(stored.login_attempts, 0);
        assert!(!stored.blocked);
    }

    // ─── Registration, confirmation, reset ───

    #[tokio::test]
    async fn registration_assigns_default_role_and_sends_confirmation() {
        let h = harness().await;
        let carol = register(&h, "carol").await;
        assert!(!carol.confirmed);
        assert!(h.authz.has_role(carol.id, "users").await.unwrap());
        assert!(!h.authz.has_role(carol.id, "admin").await.unwrap());

        let token = h
            .mailer
            .last_token("carol@example.com", MessageKind::Confirmation)
            .unwrap();
        assert!(h.accounts.confirm(carol.id, &token).await.unwrap());
        assert!(h.accounts.get_user(carol.id).await.unwrap().confirmed);
        // already confirmed: success without change
        assert!(!h.accounts.confirm(carol.id, &token).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let h = harness().await;
        register(&h, "dave").await;
        let err = h
            .accounts
            .register("dave", "other@example.com", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Domain(DomainError::DuplicateName(_))));
        let err = h
            .accounts
            .register("dave2", "dave@example.com", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Domain(DomainError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn confirmation_token_must_match_user_and_purpose() {
        let h = harness().await;
        let a = register(&h, "erin").await;
        let b = register(&h, "frank").await;

        let a_token = h
            .mailer
            .last_token("erin@example.com", MessageKind::Confirmation)
            .unwrap();
        assert_eq!(
            h.accounts.confirm(b.id, &a_token).await.unwrap_err(),
            AuthError::Token(TokenError::Invalid)
        );

        let session = h.tokens.issue_default(b.id, TokenPurpose::Session).unwrap();
        assert_eq!(
            h.accounts.confirm(b.id, &session.token).await.unwrap_err(),
            AuthError::Token(TokenError::Invalid)
        );

        h.clock.advance(Duration::seconds(300));
        assert_eq!(
            h.accounts.confirm(a.id, &a_token).await.unwrap_err(),
            AuthError::Token(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn password_reset_round_trip() {
        let h = harness().await;
        register(&h, "grace").await;

        assert_eq!(
            h.accounts
                .request_password_reset("missing@example.com")
                .await
                .unwrap_err(),
            AuthError::not_found()
        );

        h.accounts
            .request_password_reset("grace@example.com")
            .await
            .unwrap();
        let token = h
            .mailer
            .last_token("grace@example.com", MessageKind::PasswordReset)
            .unwrap();

        // a reset token is not a session token
        assert!(h.accounts.authenticate_session(&token).await.is_err());

        h.accounts.reset_password(&token, "new-password").await.unwrap();
        assert_eq!(
            h.accounts.login("grace@example.com", PASSWORD).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert!(h.accounts.login("grace@example.com", "new-password").await.is_ok());
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_registration() {
        struct Down;
        impl Mailer for Down {
            fn send(&self, _: &rolegate_auth::OutboundMessage) -> Result<(), MailError> {
                Err(MailError::Delivery("connection refused".into()))
            }
        }

        let dispatcher = Arc::new(BackgroundMailDispatcher::spawn(Down).unwrap());
        let mail: Arc<dyn MailDispatcher> = dispatcher.clone();
        let h = harness_with(AuthSettings::default(), Some(mail)).await;
        let user = register(&h, "heidi").await;
        assert_eq!(user.username, "heidi");

        dispatcher.shutdown();
        assert_eq!(dispatcher.stats().failed, 1);
        assert!(h.store.user_by_id(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sessions_refresh_last_seen_and_expire() {
        let h = harness().await;
        let ivan = register(&h, "ivan").await;
        let session = h.accounts.login("ivan@example.com", PASSWORD).await.unwrap();

        h.clock.advance(Duration::seconds(10));
        let user = h.accounts.authenticate_session(&session.token.token).await.unwrap();
        assert_eq!(user.id, ivan.id);
        assert_eq!(user.last_seen, h.clock.now());

        h.clock.advance(Duration::seconds(290));
        assert_eq!(
            h.accounts
                .authenticate_session(&session.token.token)
                .await
                .unwrap_err(),
            AuthError::Token(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn locale_must_be_supported() {
        let h = harness().await;
        let judy = register(&h, "judy").await;
        assert_eq!(h.accounts.update_locale(judy.id, "es").await.unwrap().locale, "es");
        assert!(matches!(
            h.accounts.update_locale(judy.id, "fr").await.unwrap_err(),
            AuthError::Domain(DomainError::Validation(_))
        ));
    }

    // ─── Authorization engine ───

    #[tokio::test]
    async fn admin_address_gets_admin_role() {
        let h = harness().await;
        let root = h
            .accounts
            .register("root", "ROOT@example.com", PASSWORD)
            .await
            .unwrap();
        assert!(h.authz.has_role(root.id, "admin").await.unwrap());

        // login keeps it idempotent
        h.accounts.login("ROOT@example.com", PASSWORD).await.unwrap();
        let roles = h.authz.user_roles(root.id).await.unwrap();
        assert_eq!(roles.iter().filter(|r| r.name == "admin").count(), 1);
    }

    #[tokio::test]
    async fn has_role_flips_after_add_role_despite_cached_false() {
        let h = harness().await;
        let kim = register(&h, "kim").await;
        assert!(!h.authz.has_role(kim.id, "admin").await.unwrap());

        assert!(h.authz.add_role(kim.id, role_id("admin"), None).await.unwrap());
        assert!(h.authz.has_role(kim.id, "admin").await.unwrap());
        // second add is a no-op
        assert!(!h.authz.add_role(kim.id, role_id("admin"), None).await.unwrap());
    }

    #[tokio::test]
    async fn scenario_moderate_write_revoked_immediately() {
        let h = harness().await;
        let leo = register(&h, "leo").await;
        let write = PermissionId::new(1);
        h.registry
            .update_role(role_id("moderate"), "moderate", "Moderator role", Some(&[write][..]), None)
            .await
            .unwrap();

        h.authz.add_role(leo.id, role_id("moderate"), None).await.unwrap();
        assert!(h.authz.has_role_permission(leo.id, "moderate", "write").await.unwrap());
        assert!(!h.authz.has_role_permission(leo.id, "moderate", "delete").await.unwrap());

        h.authz.remove_role(leo.id, role_id("moderate"), None).await.unwrap();
        assert!(!h.authz.has_role_permission(leo.id, "moderate", "write").await.unwrap());
        assert_eq!(
            h.authz
                .authorize(leo.id, &Requirement::role_permission("moderate", "write"))
                .await
                .unwrap_err(),
            AuthError::unauthorized()
        );
    }

    #[tokio::test]
    async fn colon_in_names_does_not_leak_cached_grants() {
        let h = harness().await;
        let bob = register(&h, "bob").await;
        let ef = h
            .registry
            .create_permission("ef", "Edit files", None, None)
            .await
            .unwrap();
        let role = h
            .registry
            .create_role("ab:cd", "Colon role", &[ef.id], None)
            .await
            .unwrap();
        h.authz.add_role(bob.id, role.role.id, None).await.unwrap();

        assert!(h.authz.has_role_permission(bob.id, "ab:cd", "ef").await.unwrap());
        assert!(!h.authz.has_role(bob.id, "ab").await.unwrap());
        // same characters, split differently: must be answered on its own
        assert!(!h.authz.has_role_permission(bob.id, "ab", "cd:ef").await.unwrap());
    }

    #[tokio::test]
    async fn registry_changes_invalidate_cached_answers() {
        let h = harness().await;
        let mia = register(&h, "mia").await;
        h.authz.add_role(mia.id, role_id("admin"), None).await.unwrap();
        assert!(h.authz.has_role_permission(mia.id, "admin", "delete").await.unwrap());

        // unlink every permission from admin
        h.registry
            .update_role(role_id("admin"), "admin", "Admin role", Some(&[][..]), None)
            .await
            .unwrap();
        assert!(!h.authz.has_role_permission(mia.id, "admin", "delete").await.unwrap());

        // renaming the role changes name-based answers too
        h.registry
            .update_role(role_id("admin"), "root", "Admin role", None, None)
            .await
            .unwrap();
        assert!(!h.authz.has_role(mia.id, "admin").await.unwrap());
        assert!(h.authz.has_role(mia.id, "root").await.unwrap());
    }

    #[tokio::test]
    async fn role_assignment_refreshes_updated_stamp() {
        let h = harness().await;
        let ned = register(&h, "ned").await;
        h.clock.advance(Duration::seconds(5));
        let actor = UserId::new(42);
        h.authz.add_role(ned.id, role_id("moderate"), Some(actor)).await.unwrap();
        let stored = h.accounts.get_user(ned.id).await.unwrap();
        assert_eq!(stored.audit.updated_by, Some(actor));
        assert_eq!(stored.audit.updated_at, h.clock.now());
    }

    #[tokio::test]
    async fn unknown_user_or_role_is_not_found() {
        let h = harness().await;
        let olga = register(&h, "olga").await;
        assert_eq!(
            h.authz.add_role(olga.id, RoleId::new(404), None).await.unwrap_err(),
            AuthError::not_found()
        );
        assert_eq!(
            h.authz.add_role(UserId::new(404), role_id("users"), None).await.unwrap_err(),
            AuthError::not_found()
        );
    }

    // ─── Registry ───

    #[tokio::test]
    async fn seed_is_idempotent() {
        let h = harness().await;
        assert!(!h.registry.seed_defaults().await.unwrap());

        let roles = h.registry.list_roles().await.unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["admin", "moderate", "users"]);
        assert_eq!(roles[0].id, RoleId::ADMIN);

        let perms = h.registry.role_permissions(RoleId::ADMIN).await.unwrap();
        let colors: Vec<_> = perms.iter().map(|p| p.color.as_str()).collect();
        assert_eq!(colors, ["#8ac926", "#1982c4", "#ff595e"]);
    }

    #[tokio::test]
    async fn role_names_are_unique_and_case_sensitive() {
        let h = harness().await;
        h.registry.create_role("editor", "Edits", &[], None).await.unwrap();
        assert!(matches!(
            h.registry.create_role("editor", "Again", &[], None).await.unwrap_err(),
            AuthError::Domain(DomainError::DuplicateName(_))
        ));
        assert!(h.registry.create_role("Editor", "Other", &[], None).await.is_ok());

        // renaming onto an existing name is also a duplicate; keeping one's own name is not
        let created = h.registry.create_role("viewer", "Views", &[], None).await.unwrap();
        assert!(matches!(
            h.registry
                .update_role(created.role.id, "editor", "Views", None, None)
                .await
                .unwrap_err(),
            AuthError::Domain(DomainError::DuplicateName(_))
        ));
        assert!(
            h.registry
                .update_role(created.role.id, "viewer", "Still views", None, None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unknown_permission_ids_are_not_found() {
        let h = harness().await;
        assert_eq!(
            h.registry
                .create_role("ghost", "Haunts", &[PermissionId::new(77)], None)
                .await
                .unwrap_err(),
            AuthError::not_found()
        );
        assert!(h.store.role_by_name("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_role_cannot_be_deleted() {
        let h = harness().await;
        assert!(matches!(
            h.registry.delete_role(RoleId::ADMIN).await.unwrap_err(),
            AuthError::Domain(DomainError::Conflict(_))
        ));
        h.registry.delete_role(role_id("moderate")).await.unwrap();
        assert_eq!(
            h.registry.delete_role(role_id("moderate")).await.unwrap_err(),
            AuthError::not_found()
        );
    }

    #[tokio::test]
    async fn permission_crud_and_cascade() {
        let h = harness().await;
        let p = h
            .registry
            .create_permission("publish", "Publish posts", Some("#00ff00"), None)
            .await
            .unwrap();
        assert!(matches!(
            h.registry
                .create_permission("publish", "Again", None, None)
                .await
                .unwrap_err(),
            AuthError::Domain(DomainError::DuplicateName(_))
        ));

        let updated = h
            .registry
            .update_permission(p.id, "publish", "Publish articles", None, None)
            .await
            .unwrap();
        assert_eq!(updated.color, "#ffffff");

        let role = h
            .registry
            .create_role("writer", "Writes", &[p.id], None)
            .await
            .unwrap();
        assert_eq!(role.permissions.len(), 1);

        h.registry.delete_permission(p.id).await.unwrap();
        assert!(h.registry.role_permissions(role.role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_with_role_lists_members() {
        let h = harness().await;
        let a = register(&h, "pat").await;
        let b = register(&h, "quinn").await;
        let members = h.registry.users_with_role(role_id("users")).await.unwrap();
        let ids: Vec<_> = members.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}
