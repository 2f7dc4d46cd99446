mod common;

use castellan_authz::{EnforcementModule, ModuleError, PolicyModule};
use common::{RBAC_MODEL, RBAC_WILDCARD_MODEL, memory_config, row};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn blog_module() -> EnforcementModule {
    EnforcementModule::from_value(
        "authz",
        &memory_config(
            json!([
                ["admin", "/api/posts", "GET"],
                ["admin", "/api/posts", "DELETE"],
                ["editor", "/api/posts", "GET"],
            ]),
            json!([["alice", "admin"], ["bob", "editor"]]),
        ),
    )
    .expect("module")
}

#[tokio::test]
async fn role_member_inherits_exact_matches_only() {
    let module = EnforcementModule::from_value(
        "authz",
        &memory_config(
            json!([["admin", "/api/posts", "GET"]]),
            json!([["alice", "admin"]]),
        ),
    )
    .expect("module");
    module.initialize().await.expect("initialize");

    assert!(module.enforce("alice", "/api/posts", "GET").await.expect("enforce"));
    assert!(!module.enforce("alice", "/api/posts", "DELETE").await.expect("enforce"));
}

#[tokio::test]
async fn unmatched_requests_deny_without_error() {
    let module = blog_module();
    module.initialize().await.expect("initialize");

    for (sub, obj, act) in [
        ("mallory", "/api/posts", "GET"),
        ("bob", "/api/posts", "DELETE"),
        ("alice", "/api/users", "GET"),
        ("", "", ""),
    ] {
        assert!(!module.enforce(sub, obj, act).await.expect("enforce"));
    }
}

#[tokio::test]
async fn initialize_twice_gives_same_answers() {
    let module = blog_module();
    let queries = [
        ("alice", "/api/posts", "GET"),
        ("alice", "/api/posts", "DELETE"),
        ("bob", "/api/posts", "GET"),
        ("bob", "/api/posts", "DELETE"),
    ];

    module.initialize().await.expect("initialize");
    let mut first = Vec::new();
    for (s, o, a) in queries {
        first.push(module.enforce(s, o, a).await.expect("enforce"));
    }

    module.initialize().await.expect("initialize again");
    let mut second = Vec::new();
    for (s, o, a) in queries {
        second.push(module.enforce(s, o, a).await.expect("enforce"));
    }
    assert_eq!(first, second);
    assert_eq!(first, vec![true, true, true, false]);
}

#[tokio::test]
async fn add_then_remove_round_trip() {
    let module = blog_module();
    module.initialize().await.expect("initialize");
    let rule = row(&["carol", "/api/reports", "GET"]);

    assert!(module.add_policy(rule.clone()).await.expect("add"));
    assert!(module.enforce("carol", "/api/reports", "GET").await.expect("enforce"));

    assert!(module.remove_policy(rule).await.expect("remove"));
    assert!(!module.enforce("carol", "/api/reports", "GET").await.expect("enforce"));
}

#[tokio::test]
async fn roles_compose_transitively() {
    let module = EnforcementModule::from_value("authz", &json!({"model": RBAC_MODEL}))
        .expect("module");
    module.initialize().await.expect("initialize");

    module
        .add_role_assignment(row(&["dave", "junior"]))
        .await
        .expect("assign");
    module
        .add_role_assignment(row(&["junior", "staff"]))
        .await
        .expect("assign");
    module
        .add_policy(row(&["staff", "/wiki", "GET"]))
        .await
        .expect("add");

    assert!(module.enforce("dave", "/wiki", "GET").await.expect("enforce"));
    assert!(module.enforce("junior", "/wiki", "GET").await.expect("enforce"));
    assert!(!module.enforce("dave", "/wiki", "PUT").await.expect("enforce"));
}

#[tokio::test]
async fn wildcard_action_lives_in_the_matcher() {
    let module = EnforcementModule::from_value(
        "authz",
        &json!({
            "model": RBAC_WILDCARD_MODEL,
            "policies": [["admin", "/api/*", "*"]],
            "roleAssignments": [["alice", "admin"]],
        }),
    )
    .expect("module");
    module.initialize().await.expect("initialize");

    assert!(module.enforce("alice", "/api/posts/7", "PATCH").await.expect("enforce"));
    assert!(!module.enforce("alice", "/admin", "GET").await.expect("enforce"));
}

#[tokio::test]
async fn concurrent_decisions_and_mutations() {
    let module = Arc::new(blog_module());
    module.initialize().await.expect("initialize");

    let mut tasks = Vec::new();
    for i in 0..16 {
        let module = Arc::clone(&module);
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                let user = format!("user-{i}");
                module
                    .add_role_assignment(vec![user.clone(), "editor".into()])
                    .await
                    .expect("assign");
                assert!(module.enforce(&user, "/api/posts", "GET").await.expect("enforce"));
            } else {
                assert!(module.enforce("alice", "/api/posts", "GET").await.expect("enforce"));
            }
        }));
    }
    for task in tasks {
        task.await.expect("task");
    }
}

#[tokio::test]
async fn polling_start_stop_cycle() {
    let mut config = memory_config(json!([]), json!([]));
    config["watcher"] = json!({"type": "polling", "interval": "20ms"});
    let module = EnforcementModule::from_value("authz", &config).expect("module");
    module.initialize().await.expect("initialize");

    module.start();
    module.start();
    assert!(module.is_running());
    tokio::time::sleep(Duration::from_millis(60)).await;
    module.stop().await;
    assert!(!module.is_running());

    // Stopping twice, or restarting after a stop, is fine.
    module.stop().await;
    module.start();
    assert!(module.is_running());
    module.stop().await;
}

#[tokio::test]
async fn stop_before_start_is_noop() {
    let module = blog_module();
    module.stop().await;
    assert!(!module.is_running());
}

#[tokio::test]
async fn construction_errors_are_config_errors() {
    for config in [
        json!({}),
        json!({"model": RBAC_MODEL, "policies": [["a", "b"]]}),
        json!({"model": RBAC_MODEL, "roleAssignments": [["a"]]}),
        json!({"model": RBAC_MODEL, "adapter": {"type": "redis"}}),
        json!({"model": RBAC_MODEL, "watcher": {"type": "polling", "interval": "fast"}}),
    ] {
        let err = EnforcementModule::from_value("authz", &config)
            .err()
            .expect("invalid config");
        assert!(err.is_config(), "{err}");
    }
}

#[tokio::test]
async fn uninitialized_module_reports_name() {
    let module = blog_module();
    let err = module
        .enforce("alice", "/api/posts", "GET")
        .await
        .expect_err("uninitialized");
    assert!(matches!(err, ModuleError::NotInitialized { .. }));
    assert!(err.to_string().contains("\"authz\""));
}
