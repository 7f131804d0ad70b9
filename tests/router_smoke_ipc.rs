mod common;

use common::{open_school, temp_dir, Sidecar, ADMIN_PASSWORD};
use serde_json::json;

#[test]
fn health_and_unknown_methods() {
    let mut sc = Sidecar::spawn();
    let health = sc.request_ok(None, "health", json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert_eq!(health["workspacePath"], json!(null));

    let code = sc.request_err(None, "grades.frobnicate", json!({}));
    assert_eq!(code, "not_implemented");
    let code = sc.request_err(None, "nope", json!({}));
    assert_eq!(code, "not_implemented");

    let resp = sc.send_raw("{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));
}

#[test]
fn methods_need_a_workspace_first() {
    let mut sc = Sidecar::spawn();
    let code = sc.request_err(
        None,
        "auth.signIn",
        json!({ "username": "admin", "password": ADMIN_PASSWORD }),
    );
    assert_eq!(code, "no_workspace");
    let code = sc.request_err(Some("token"), "lessons.list", json!({}));
    assert_eq!(code, "no_workspace");
    let code = sc.request_err(None, "workspace.select", json!({}));
    assert_eq!(code, "bad_params");
}

#[test]
fn bootstrap_sign_in_and_sign_out() {
    let (mut sc, admin) = open_school("schoold-auth");

    let code = sc.request_err(
        None,
        "auth.bootstrapAdmin",
        json!({ "username": "admin2", "password": ADMIN_PASSWORD, "name": "B", "surname": "C" }),
    );
    assert_eq!(code, "forbidden");

    let me = sc.request_ok(Some(&admin), "auth.whoami", json!({}));
    assert_eq!(me["role"], json!("admin"));

    let code = sc.request_err(
        None,
        "auth.signIn",
        json!({ "username": "admin", "password": "wrong-password" }),
    );
    assert_eq!(code, "unauthenticated");

    sc.request_ok(Some(&admin), "auth.signOut", json!({}));
    let code = sc.request_err(Some(&admin), "auth.whoami", json!({}));
    assert_eq!(code, "unauthenticated");
}

#[test]
fn settings_are_admin_only_and_range_checked() {
    let (mut sc, admin) = open_school("schoold-setup");
    sc.create(
        &admin,
        "parents.create",
        common::parent_params("family1"),
    );
    let parent = sc.sign_in("family1", common::USER_PASSWORD);

    let settings = sc.request_ok(Some(&parent), "setup.get", json!({}));
    assert_eq!(settings["lists"]["pageSize"], json!(10));
    let code = sc.request_err(
        Some(&parent),
        "setup.update",
        json!({ "section": "lists", "patch": { "pageSize": 20 } }),
    );
    assert_eq!(code, "forbidden");

    for patch in [
        json!({ "section": "lists", "patch": { "pageSize": 0 } }),
        json!({ "section": "lists", "patch": { "colour": "red" } }),
        json!({ "section": "accounts", "patch": { "minPasswordLength": 4 } }),
        json!({ "section": "grid", "patch": {} }),
    ] {
        let code = sc.request_err(Some(&admin), "setup.update", patch);
        assert_eq!(code, "bad_params");
    }

    sc.request_ok(
        Some(&admin),
        "setup.update",
        json!({ "section": "accounts", "patch": { "minPasswordLength": 12 } }),
    );
    let mut params = common::parent_params("family2");
    params["password"] = json!("elevenchars");
    let code = sc.request_err(Some(&admin), "parents.create", params);
    assert_eq!(code, "bad_params");
}

#[test]
fn reselecting_a_workspace_keeps_data() {
    let workspace = temp_dir("schoold-reopen");
    let mut sc = Sidecar::spawn();
    let path = json!({ "path": workspace.to_string_lossy() });
    sc.request_ok(None, "workspace.select", path.clone());
    sc.request_ok(
        None,
        "auth.bootstrapAdmin",
        json!({ "username": "admin", "password": ADMIN_PASSWORD, "name": "A", "surname": "B" }),
    );
    let admin = sc.sign_in("admin", ADMIN_PASSWORD);
    sc.create(&admin, "grades.create", json!({ "level": 3 }));
    drop(sc);

    let mut sc = Sidecar::spawn();
    sc.request_ok(None, "workspace.select", path);
    let admin = sc.sign_in("admin", ADMIN_PASSWORD);
    let forms = sc.request_ok(Some(&admin), "forms.relatedData", json!({ "table": "class" }));
    assert_eq!(forms["grades"][0]["level"], json!(3));
}
