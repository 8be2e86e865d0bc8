//! End-to-end resource lifecycles through the provider, against an
//! in-process controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use juju_common::client::{ModelsApi, SecretsApi};
use juju_common::{CreateModelInput, LocalController, ReadSecretInput};
use juju_provider::client::StaticConnector;
use juju_provider::diag::AttributePath;
use juju_provider::state::{
    bool_value, get_int_attr, get_string_attr, get_string_set_attr, int_value, make_state, string_map_value,
    string_value, Value,
};
use juju_provider::JujuProvider;

fn provider_config(skip_failed_deletion: bool) -> Value {
    make_state(vec![
        ("controller_addresses", string_value("10.0.0.1:17070")),
        ("username", string_value("admin")),
        ("password", string_value("hunter2")),
        ("skip_failed_deletion", bool_value(skip_failed_deletion)),
    ])
}

async fn configured(controller: Arc<LocalController>, jaas: bool, skip_failed_deletion: bool) -> JujuProvider {
    let data_dir = tempfile::tempdir().unwrap();
    let provider = JujuProvider::new(Arc::new(StaticConnector::new(controller, jaas)))
        .with_juju_data_dir(data_dir.path())
        .with_env(|_| None);
    let diags = provider.configure(&provider_config(skip_failed_deletion)).await;
    assert!(!diags.has_error(), "configure failed: {diags}");
    provider
}

/// Plan then apply a create from config alone
async fn create(provider: &JujuProvider, type_name: &str, config: &Value) -> Value {
    let plan = provider
        .plan_resource_change(type_name, &Value::Null, config, config)
        .await
        .unwrap();
    assert!(!plan.diagnostics.has_error(), "plan failed: {}", plan.diagnostics);

    let (state, diags) = provider
        .apply_resource_change(type_name, &Value::Null, &plan.planned_state)
        .await
        .unwrap();
    assert!(!diags.has_error(), "apply failed: {diags}");
    assert!(state.is_fully_known());
    state
}

fn with(state: &Value, key: &str, value: Value) -> Value {
    let mut next = state.clone();
    next.set(key, value);
    next
}

#[tokio::test]
async fn model_create_read_import_delete() {
    let controller = Arc::new(LocalController::new());
    let provider = configured(controller.clone(), false, false).await;

    let config = make_state(vec![
        ("name", string_value("development")),
        (
            "config",
            string_map_value(&BTreeMap::from([("logging-config".to_string(), "<root>=INFO".to_string())])),
        ),
    ]);
    let state = create(&provider, "juju_model", &config).await;
    let uuid = get_string_attr(&state, "uuid");
    assert!(!uuid.is_empty());
    assert_eq!(get_string_attr(&state, "id"), uuid);
    assert_eq!(get_string_attr(&state, "name"), "development");
    assert!(!get_string_attr(&state, "cloud").is_empty());

    let model = controller.read_model(&uuid).await.unwrap();
    assert_eq!(model.config.get("logging-config").map(String::as_str), Some("<root>=INFO"));

    let (refreshed, diags) = provider.read_resource("juju_model", &state).await.unwrap();
    assert!(diags.is_empty());
    let refreshed = refreshed.unwrap();
    assert_eq!(get_string_attr(&refreshed, "name"), "development");
    assert_eq!(get_string_attr(&refreshed, "uuid"), uuid);

    let (imported, diags) = provider.import_resource_state("juju_model", &uuid).await.unwrap();
    assert!(!diags.has_error(), "{diags}");
    assert_eq!(get_string_attr(&imported.unwrap(), "name"), "development");

    let (gone, diags) = provider.apply_resource_change("juju_model", &state, &Value::Null).await.unwrap();
    assert!(!diags.has_error(), "{diags}");
    assert!(gone.is_null());

    let (after, diags) = provider.read_resource("juju_model", &state).await.unwrap();
    assert!(after.is_none());
    assert!(!diags.has_error());
}

#[tokio::test]
async fn service_account_block_ignores_password_environment() {
    let data_dir = tempfile::tempdir().unwrap();
    let provider = JujuProvider::new(Arc::new(StaticConnector::new(Arc::new(LocalController::new_jaas()), true)))
        .with_juju_data_dir(data_dir.path())
        .with_env(|key| match key {
            "JUJU_USERNAME" => Some("admin".to_string()),
            "JUJU_PASSWORD" => Some("pw".to_string()),
            _ => None,
        });
    let config = make_state(vec![
        ("controller_addresses", string_value("10.0.0.1:17070")),
        ("client_id", string_value("svc")),
        ("client_secret", string_value("shh")),
    ]);
    let diags = provider.configure(&config).await;
    assert!(!diags.has_error(), "configure failed: {diags}");
}

#[tokio::test]
async fn unchanged_model_plans_no_diff_and_rename_replaces() {
    let controller = Arc::new(LocalController::new());
    let provider = configured(controller, false, false).await;

    let config = make_state(vec![("name", string_value("staging"))]);
    let state = create(&provider, "juju_model", &config).await;

    let plan = provider
        .plan_resource_change("juju_model", &state, &state, &config)
        .await
        .unwrap();
    assert!(plan.requires_replace.is_empty());
    assert_eq!(plan.planned_state, state);

    let renamed_config = make_state(vec![("name", string_value("production"))]);
    let proposed = with(&state, "name", string_value("production"));
    let plan = provider
        .plan_resource_change("juju_model", &state, &proposed, &renamed_config)
        .await
        .unwrap();
    assert!(plan.requires_replace.contains(&AttributePath::root("name")));
}

#[tokio::test]
async fn import_of_missing_model_is_an_error() {
    let provider = configured(Arc::new(LocalController::new()), false, false).await;
    let (state, diags) = provider
        .import_resource_state("juju_model", "6f1c0b6e-2d5a-4c47-9a55-7f5b2f5b9c11")
        .await
        .unwrap();
    assert!(state.is_none());
    assert!(diags.has_error());
}

#[tokio::test]
async fn application_deploys_and_scales() {
    let controller = Arc::new(LocalController::new());
    let model = controller
        .create_model(CreateModelInput {
            name: "apps".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let provider = configured(controller, false, false).await;

    let config = make_state(vec![
        ("model_uuid", string_value(&model.uuid)),
        ("name", string_value("database")),
        ("units", int_value(2)),
        (
            "charm",
            Value::List(vec![make_state(vec![("name", string_value("postgresql"))])]),
        ),
    ]);
    let state = create(&provider, "juju_application", &config).await;
    assert_eq!(get_int_attr(&state, "units", 0), 2);
    assert_eq!(get_string_set_attr(&state, "machines").len(), 2);
    assert_eq!(get_string_attr(&state, "id"), format!("{}:database", model.uuid));

    let scaled_config = with(&config, "units", int_value(3));
    let proposed = with(&state, "units", int_value(3));
    let plan = provider
        .plan_resource_change("juju_application", &state, &proposed, &scaled_config)
        .await
        .unwrap();
    assert!(!plan.diagnostics.has_error(), "{}", plan.diagnostics);
    assert!(plan.requires_replace.is_empty());

    let (scaled, diags) = provider
        .apply_resource_change("juju_application", &state, &plan.planned_state)
        .await
        .unwrap();
    assert!(!diags.has_error(), "{diags}");
    assert_eq!(get_int_attr(&scaled, "units", 0), 3);
    assert_eq!(get_string_set_attr(&scaled, "machines").len(), 3);
}

#[tokio::test]
async fn removing_application_storage_forces_replacement() {
    let controller = Arc::new(LocalController::new());
    let model = controller
        .create_model(CreateModelInput {
            name: "stateful".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let provider = configured(controller, false, false).await;

    let config = make_state(vec![
        ("model_uuid", string_value(&model.uuid)),
        ("name", string_value("database")),
        (
            "charm",
            Value::List(vec![make_state(vec![("name", string_value("postgresql"))])]),
        ),
        (
            "storage",
            Value::List(vec![make_state(vec![
                ("label", string_value("pgdata")),
                ("size", string_value("10G")),
            ])]),
        ),
    ]);
    let state = create(&provider, "juju_application", &config).await;

    let mut without_storage = config.clone();
    without_storage.set("storage", Value::Null);
    let proposed = with(&state, "storage", Value::List(Vec::new()));
    let plan = provider
        .plan_resource_change("juju_application", &state, &proposed, &without_storage)
        .await
        .unwrap();
    assert!(!plan.diagnostics.has_error(), "{}", plan.diagnostics);
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.requires_replace, vec![AttributePath::root("storage")]);
}

#[tokio::test]
async fn secret_values_are_stored_encoded_and_readable_by_name() {
    let controller = Arc::new(LocalController::new());
    let model = controller
        .create_model(CreateModelInput {
            name: "secrets".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let provider = configured(controller.clone(), false, false).await;

    let config = make_state(vec![
        ("model_uuid", string_value(&model.uuid)),
        ("name", string_value("db-password")),
        (
            "value",
            string_map_value(&BTreeMap::from([("password".to_string(), "s3cret".to_string())])),
        ),
    ]);
    let state = create(&provider, "juju_secret", &config).await;
    let secret_id = get_string_attr(&state, "secret_id");
    assert!(!secret_id.is_empty());

    let stored = controller
        .read_secret(ReadSecretInput {
            model_uuid: model.uuid.clone(),
            secret_id: Some(secret_id.clone()),
            name: None,
        })
        .await
        .unwrap();
    assert_eq!(stored.value.get("password").map(String::as_str), Some("czNjcmV0"));

    let lookup = make_state(vec![
        ("model_uuid", string_value(&model.uuid)),
        ("name", string_value("db-password")),
    ]);
    let (found, diags) = provider.read_data_source("juju_secret", &lookup).await.unwrap();
    assert!(!diags.has_error(), "{diags}");
    assert_eq!(get_string_attr(&found, "secret_id"), secret_id);
}

#[tokio::test]
async fn failed_deletion_keeps_state_unless_skipped() {
    let state = make_state(vec![
        ("id", string_value("0b1f3d52-8f0e-4b6a-a1f4-9a3c2b1d0e5f")),
        ("uuid", string_value("0b1f3d52-8f0e-4b6a-a1f4-9a3c2b1d0e5f")),
        ("name", string_value("vanished")),
    ]);

    let strict = configured(Arc::new(LocalController::new()), false, false).await;
    let (kept, diags) = strict.apply_resource_change("juju_model", &state, &Value::Null).await.unwrap();
    assert!(diags.has_error());
    assert_eq!(kept, state);

    let lenient = configured(Arc::new(LocalController::new()), false, true).await;
    let (dropped, diags) = lenient.apply_resource_change("juju_model", &state, &Value::Null).await.unwrap();
    assert!(!diags.has_error());
    assert!(!diags.is_empty());
    assert!(dropped.is_null());
}

#[tokio::test]
async fn jaas_resources_require_jaas() {
    let config = make_state(vec![("name", string_value("operators"))]);

    let plain = configured(Arc::new(LocalController::new()), false, false).await;
    let plan = plain
        .plan_resource_change("juju_jaas_group", &Value::Null, &config, &config)
        .await
        .unwrap();
    let (state, diags) = plain
        .apply_resource_change("juju_jaas_group", &Value::Null, &plan.planned_state)
        .await
        .unwrap();
    assert!(diags.has_error());
    assert!(state.is_null());

    let jaas = configured(Arc::new(LocalController::new_jaas()), true, false).await;
    let state = create(&jaas, "juju_jaas_group", &config).await;
    assert_eq!(get_string_attr(&state, "name"), "operators");
    assert!(!get_string_attr(&state, "uuid").is_empty());
}

#[tokio::test]
async fn listing_models() {
    let controller = Arc::new(LocalController::new());
    for name in ["alpha", "beta"] {
        controller
            .create_model(CreateModelInput {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    let provider = configured(controller, false, false).await;

    let (listed, diags) = provider.list_resources("juju_model", &Value::Null).await.unwrap();
    assert!(diags.is_empty());
    let mut names: Vec<String> = listed.iter().map(|m| get_string_attr(&m.state, "name")).collect();
    names.sort();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert!(listed.iter().all(|m| m.display_name.starts_with("admin/")));

    assert!(provider.list_resources("juju_offer", &Value::Null).await.is_err());
}
