use super::*;
use std::collections::HashMap;

#[test]
fn precedence_defaults_file_env() {
    let file = SyncConfigOverride {
        users_root: Some("accounts".into()),
        premium_claim: Some("plan_pro".into()),
        reload_on_connect: Some(false),
        ..Default::default()
    };
    let mut vars = HashMap::new();
    vars.insert("USERSYNC_PREMIUM_CLAIM".to_string(), "tier_paid".to_string());
    vars.insert("USERSYNC_CLEAR_ON_DISCONNECT".to_string(), "no".to_string());
    let env = SyncConfigOverride::from_env_with(|k| vars.get(k).cloned());

    let eff = SyncConfig::from_layers(Some(&file), &env);
    assert_eq!(eff.users_root, "accounts");
    assert_eq!(eff.premium_claim, "tier_paid");
    assert!(!eff.reload_on_connect);
    assert!(!eff.clear_on_disconnect);
    assert_eq!(eff.collection_suffix, "s");
    assert_eq!(eff.error_notice, "Something went wrong, check console.");
}

#[test]
fn env_ignores_blank_and_unparsable_values() {
    let env = SyncConfigOverride::from_env_with(|k| match k {
        "USERSYNC_USERS_ROOT" => Some("   ".into()),
        "USERSYNC_RELOAD_ON_CONNECT" => Some("maybe".into()),
        _ => None,
    });
    assert_eq!(env, SyncConfigOverride::default());
}

#[test]
fn json_file_with_partial_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("usersync.json");
    std::fs::write(&path, r#"{ "collection_suffix": "_items" }"#).unwrap();
    let ov = SyncConfigOverride::from_json_file(&path).unwrap();
    let eff = SyncConfig::default().with_override(&ov);
    assert_eq!(eff.collection_suffix, "_items");
    assert_eq!(eff.users_root, "users");
}

#[test]
fn missing_file_reports_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("absent.json");
    let err = SyncConfigOverride::from_json_file(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}
