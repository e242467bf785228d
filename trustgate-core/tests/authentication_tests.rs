//! End-to-end authentication flows through the reconciliation engine
//!
//! Each test wires a real engine from the in-memory backends and drives
//! it with synthetic requests, checking profile creation, group
//! synchronization, caching behavior and logout handling.

use trustgate_core::adapter::HeaderIdentityAdapter;
use trustgate_core::auth::TrustedAuthenticator;
use trustgate_core::config::TrustedAuthConfig;
use trustgate_core::directory::{MemoryDirectory, UserDirectory};
use trustgate_core::error::AuthError;
use trustgate_core::model::DocRef;
use trustgate_core::pages::MemoryPageStore;
use trustgate_core::persistence::SessionPersistenceStore;
use trustgate_core::request::RequestContext;

struct Harness {
    engine: TrustedAuthenticator,
    directory: MemoryDirectory,
    pages: MemoryPageStore,
}

fn harness(config: TrustedAuthConfig) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let directory = MemoryDirectory::new();
    let pages = MemoryPageStore::new();
    let engine = TrustedAuthenticator::new(
        config.clone(),
        Box::new(HeaderIdentityAdapter::new(config.adapter.clone())),
        Box::new(SessionPersistenceStore::new()),
        Box::new(directory.clone()),
        Box::new(pages.clone()),
    )
    .unwrap();
    Harness {
        engine,
        directory,
        pages,
    }
}

fn base_config(toml: &str) -> TrustedAuthConfig {
    TrustedAuthConfig::from_toml_str(toml).unwrap()
}

fn request(user: &str, groups: &str) -> RequestContext {
    RequestContext::new()
        .with_header("remote_user", user)
        .with_header("remote_groups", groups)
        .with_path("/bin", "/view/Main/")
}

#[test]
fn test_first_authentication_creates_profile_and_groups() {
    let config = base_config(
        r#"
        [adapter]
        group_fields = ["remote_groups"]

        [property_mappings]
        email = "remote_mail"

        [group_mappings]
        "XWiki.Editors" = ["editor"]
        "XWiki.Admins" = ["admin"]
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "editor|viewer")
        .with_header("remote_mail", "jdoe@example.com");
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.jdoe");

    let profile = h
        .directory
        .user_properties(&DocRef::new("XWiki", "jdoe"))
        .unwrap();
    assert_eq!(profile.get("email").map(String::as_str), Some("jdoe@example.com"));
    assert_eq!(profile.get("active").map(String::as_str), Some("1"));

    let editors = h.directory.members_of(&DocRef::new("XWiki", "Editors")).unwrap();
    assert_eq!(editors, vec!["XWiki.jdoe"]);
}

#[test]
fn test_unchanged_authentication_performs_zero_writes() {
    let config = base_config(
        r#"
        [adapter]
        group_fields = ["remote_groups"]

        [group_mappings]
        "XWiki.Editors" = ["editor"]
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "editor");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();
    let writes_after_first = h.directory.write_count();

    // same user, same session: cache hit short-circuits synchronization
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.jdoe");
    assert_eq!(h.directory.write_count(), writes_after_first);
}

#[test]
fn test_profile_name_normalization() {
    let config = base_config(
        r#"
        case_style = "lowercase"
        user_profile_replacements = [[".", "="], ["@", "_"]]
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("Test.User@example.com", "");
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.test=user_example=com");
}

#[test]
fn test_missing_identity_clears_untrusted_cache() {
    let config = base_config("");
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    // identity disappears: cache must be cleared and access is public
    let mut ctx = ctx.without_header("remote_user");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
}

#[test]
fn test_missing_identity_trusted_on_missing_keeps_cached_user() {
    let config = base_config(
        r#"
        [persistence]
        trusted_on_missing_auth = true
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    let mut ctx = ctx.without_header("remote_user");
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.jdoe");
}

#[test]
fn test_trusted_store_short_circuits_the_adapter() {
    let config = base_config(
        r#"
        [persistence]
        trusted = true
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();
    let writes_after_first = h.directory.write_count();

    // a different asserted identity must be ignored while the trusted
    // cache holds a principal
    let mut ctx = ctx.with_header("remote_user", "intruder");
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.jdoe");
    assert_eq!(h.directory.write_count(), writes_after_first);
    assert!(!h
        .directory
        .exists(&DocRef::new("XWiki", "intruder"))
        .unwrap());
}

#[test]
fn test_changed_identity_resynchronizes() {
    let config = base_config("");
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    let mut ctx = ctx.with_header("remote_user", "asmith");
    let principal = h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(principal.serialize(), "XWiki.asmith");
    assert!(h.directory.exists(&DocRef::new("XWiki", "asmith")).unwrap());
}

#[test]
fn test_differing_uid_and_name_is_an_integration_error() {
    let config = base_config(
        r#"
        [adapter]
        auth_field = "remote_user"
        id_field = "remote_name"
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("uid-1234", "").with_header("remote_name", "jdoe");
    let err = h.engine.authenticate(&mut ctx).unwrap_err();
    assert_eq!(
        err,
        AuthError::UnsupportedIdentityMapping {
            uid: "uid-1234".to_string(),
            name: "jdoe".to_string(),
        }
    );
}

#[test]
fn test_dynamic_role_creates_group_and_records_provenance() {
    let config = base_config(
        r#"
        main_wiki = "main"

        [adapter]
        group_fields = ["remote_groups"]

        [dynamic_roles.provenance]
        page = "XWiki.RoleRegistry"
        property_name = "values"

        [[dynamic_roles.rules]]
        name = "projects"
        role_prefix = "proj-"
        role_suffix = "-admin"
        group_prefix = "Group."
        "#,
    );
    let mut h = harness(config);
    h.pages
        .seed_field("main:XWiki.RoleRegistry", "App.Registry", 0, "values", "");

    let mut ctx = request("jdoe", "proj-42-admin");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    assert!(h.directory.has_group(&DocRef::new("Group", "42")));
    let members = h.directory.members_of(&DocRef::new("Group", "42")).unwrap();
    assert_eq!(members, vec!["XWiki.jdoe"]);

    assert_eq!(h.pages.save_count("main:XWiki.RoleRegistry"), 1);
    assert_eq!(
        h.pages
            .stored_value("main:XWiki.RoleRegistry", "App.Registry", 0, "values")
            .as_deref(),
        Some("|Group.42=proj-42-admin")
    );
}

#[test]
fn test_lost_dynamic_role_removes_derived_group() {
    let config = base_config(
        r#"
        [adapter]
        group_fields = ["remote_groups"]

        [[dynamic_roles.rules]]
        name = "projects"
        role_prefix = "proj-"
        role_suffix = "-admin"
        group_prefix = "Group."
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "proj-42-admin");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert_eq!(
        h.directory.members_of(&DocRef::new("Group", "42")).unwrap(),
        vec!["XWiki.jdoe"]
    );

    // the role claim disappears on a later request in a fresh session
    let mut ctx = request("jdoe", "other");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();
    assert!(h
        .directory
        .members_of(&DocRef::new("Group", "42"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_wildcard_rule_fails_closed() {
    let config = base_config(
        r#"
        [adapter]
        group_fields = ["remote_groups"]

        [[dynamic_roles.rules]]
        name = "catch-all"
        role_prefix = "proj-"
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "proj-42-admin");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
    // nothing was cached either, the next request is denied again
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
}

#[test]
fn test_directory_outage_degrades_to_anonymous() {
    let config = base_config(
        r#"
        [adapter]
        group_fields = ["remote_groups"]

        [[dynamic_roles.rules]]
        name = "projects"
        role_prefix = "proj-"
        group_prefix = "Group."
        "#,
    );
    let mut h = harness(config);
    h.directory.fail_group_queries(true);

    let mut ctx = request("jdoe", "proj-42-admin");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
}

#[test]
fn test_sharded_group_membership() {
    let config = base_config(
        r#"
        sharded_groups = ["AllEmployees"]

        [adapter]
        group_fields = ["remote_groups"]

        [group_mappings]
        "XWiki.AllEmployees" = ["employee"]
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "employee");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    // membership went to a consistently-hashed shard registered under
    // the parent group
    let parent = DocRef::new("XWiki", "AllEmployees");
    let members = h.directory.members_of(&parent).unwrap();
    assert_eq!(members.len(), 1);
    let shard = &members[0];
    assert!(shard.starts_with("XWiki.AllEmployees-Shard"), "unexpected shard {shard}");
    assert_eq!(
        h.directory
            .members_of(&DocRef::parse(shard, "XWiki"))
            .unwrap(),
        vec!["XWiki.jdoe"]
    );
}

#[test]
fn test_logout_request_clears_cache_and_requests_redirect() {
    let config = base_config(
        r#"
        [adapter]
        logout_url = "https://sso.example.com/logout?back=__REDIRECT__"
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    h.engine.authenticate(&mut ctx).unwrap().unwrap();

    let mut ctx = RequestContext::new()
        .with_header("remote_user", "jdoe")
        .with_path("/bin", "/logout/XWiki/jdoe");
    let principal = h.engine.authenticate(&mut ctx).unwrap();
    // the logout request itself still authenticates
    assert!(principal.is_some());
    assert_eq!(
        ctx.external_logout(),
        Some("https://sso.example.com/logout?back=__REDIRECT__")
    );

    // cache was cleared within this session
    let mut ctx = ctx.without_header("remote_user");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());
}

#[test]
fn test_shared_secret_rejects_unauthenticated_proxy() {
    let config = base_config(
        r#"
        [adapter]
        secret_field = "proxy_secret"
        secret_value = "s3cret"
        "#,
    );
    let mut h = harness(config);

    let mut ctx = request("jdoe", "");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_none());

    let mut ctx = request("jdoe", "").with_header("proxy_secret", "s3cret");
    assert!(h.engine.authenticate(&mut ctx).unwrap().is_some());
}
