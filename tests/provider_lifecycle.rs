//! End-to-end lifecycle tests driving the provider against a mock API.

use hemmer_provider_pagerduty::testing::{
    assert_plan_changes_attribute, assert_plan_has_changes, assert_plan_no_changes,
    assert_plan_replaces, assert_plan_updates_in_place, ProviderHarness,
};
use hemmer_provider_pagerduty::{PagerDutyProvider, ProviderError};
use httptest::{matchers::*, responders::*, Expectation, Server};
use serde_json::{json, Value};

async fn harness(server: &Server) -> ProviderHarness<PagerDutyProvider> {
    let harness = ProviderHarness::new(PagerDutyProvider::new());
    harness
        .configure(json!({
            "api_token": "test-token",
            "api_url_override": server.url_str(""),
            "skip_credentials_validation": true,
        }))
        .await
        .expect("configure should succeed");
    harness
}

fn business_service_body() -> Value {
    json!({
        "business_service": {
            "id": "PT4KHLK",
            "name": "Checkout",
            "description": "Managed by Hemmer",
            "type": "business_service",
            "html_url": "https://example.pagerduty.com/business-services/PT4KHLK",
            "self": "https://api.pagerduty.com/business_services/PT4KHLK",
            "summary": "Checkout",
            "point_of_contact": "",
            "team": null,
        }
    })
}

#[tokio::test]
async fn business_service_create_read_update_delete() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/business_services"),
            request::headers(contains(("authorization", "Token token=test-token"))),
        ])
        .respond_with(json_encoded(business_service_body())),
    );
    // Create re-reads the resource after the write.
    server.expect(
        Expectation::matching(request::method_path("GET", "/business_services/PT4KHLK"))
            .times(2)
            .respond_with(json_encoded(business_service_body())),
    );
    server.expect(
        Expectation::matching(request::method_path("PUT", "/business_services/PT4KHLK"))
            .respond_with(json_encoded(json!({
                "business_service": {
                    "id": "PT4KHLK",
                    "name": "Checkout v2",
                    "description": "Managed by Hemmer",
                    "type": "business_service",
                }
            }))),
    );
    server.expect(
        Expectation::matching(request::method_path("DELETE", "/business_services/PT4KHLK"))
            .respond_with(status_code(204)),
    );

    let harness = harness(&server).await;

    let plan = harness
        .plan_create("pagerduty_business_service", json!({"name": "Checkout"}))
        .await
        .unwrap();
    assert_plan_has_changes(&plan);
    assert_eq!(plan.planned_state["description"], "Managed by Hemmer");

    let created = harness
        .create("pagerduty_business_service", plan.planned_state)
        .await
        .unwrap();
    assert_eq!(created["id"], "PT4KHLK");

    let read = harness
        .read("pagerduty_business_service", created.clone())
        .await
        .unwrap();
    assert_eq!(read["name"], "Checkout");

    let mut planned = read.clone();
    planned["name"] = json!("Checkout v2");
    let plan = harness
        .plan_update("pagerduty_business_service", read.clone(), planned)
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_attribute(&plan, "name");

    let updated = harness
        .update("pagerduty_business_service", read, plan.planned_state)
        .await
        .unwrap();
    assert_eq!(updated["name"], "Checkout v2");

    harness
        .delete("pagerduty_business_service", updated)
        .await
        .unwrap();
}

#[tokio::test]
async fn business_service_plan_is_stable() {
    let server = Server::run();
    let harness = harness(&server).await;

    let state = json!({
        "id": "PT4KHLK",
        "name": "Checkout",
        "description": "Managed by Hemmer",
        "type": "business_service",
    });
    let plan = harness
        .plan_update("pagerduty_business_service", state.clone(), state)
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
}

#[tokio::test]
async fn maintenance_window_read_forgets_missing_resource() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/maintenance_windows/PW1MWIN"))
            .times(1)
            .respond_with(status_code(404).body(r#"{"error":{"message":"Not Found"}}"#)),
    );

    let harness = harness(&server).await;
    let state = harness
        .read("pagerduty_maintenance_window", json!({"id": "PW1MWIN"}))
        .await
        .unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn maintenance_window_delete_tolerates_ended_window() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("DELETE", "/maintenance_windows/PW1MWIN"))
            .respond_with(status_code(405).body(r#"{"error":{"message":"Method Not Allowed"}}"#)),
    );

    let harness = harness(&server).await;
    harness
        .delete("pagerduty_maintenance_window", json!({"id": "PW1MWIN"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn maintenance_window_rejects_bad_timestamps() {
    let server = Server::run();
    let harness = harness(&server).await;

    let result = harness
        .validate_resource_config(
            "pagerduty_maintenance_window",
            json!({
                "start_time": "not a timestamp",
                "end_time": "2026-09-01T20:00:00Z",
                "services": ["P1SVC"],
            }),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn incident_custom_field_create_rereads_after_write() {
    let server = Server::run();
    let field = json!({
        "field": {
            "id": "PF1ELD",
            "name": "environment",
            "display_name": "Environment",
            "data_type": "string",
            "field_type": "single_value",
            "default_value": "production",
        }
    });
    server.expect(
        Expectation::matching(request::method_path("POST", "/incidents/custom_fields"))
            .respond_with(json_encoded(field.clone())),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/incidents/custom_fields/PF1ELD"))
            .respond_with(json_encoded(field)),
    );

    let harness = harness(&server).await;
    let state = harness
        .create(
            "pagerduty_incident_custom_field",
            json!({
                "name": "environment",
                "display_name": "Environment",
                "data_type": "string",
                "field_type": "single_value",
                "default_value": "production",
            }),
        )
        .await
        .unwrap();
    assert_eq!(state["id"], "PF1ELD");
    assert_eq!(state["default_value"], "production");
}

#[tokio::test]
async fn incident_custom_field_validation_rejects_unknown_enums() {
    let server = Server::run();
    let harness = harness(&server).await;

    let result = harness
        .validate_resource_config(
            "pagerduty_incident_custom_field",
            json!({
                "name": "environment",
                "display_name": "Environment",
                "data_type": "uuid",
                "field_type": "many_values",
            }),
        )
        .await;
    let err = result.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Unknown data_type uuid"));
    assert!(message.contains("Unknown field_type many_values"));
}

#[tokio::test]
async fn incident_custom_field_option_read_searches_listing() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/incidents/custom_fields/PF1ELD/field_options",
        ))
        .respond_with(json_encoded(json!({
            "field_options": [
                {"id": "POPT1", "data": {"data_type": "string", "value": "production"}},
                {"id": "POPT2", "data": {"data_type": "string", "value": "staging"}},
            ],
        }))),
    );

    let harness = harness(&server).await;
    let state = harness
        .read(
            "pagerduty_incident_custom_field_option",
            json!({"id": "POPT2", "field": "PF1ELD"}),
        )
        .await
        .unwrap();
    assert_eq!(state["value"], "staging");
}

#[tokio::test]
async fn incident_custom_field_option_read_forgets_vanished_option() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/incidents/custom_fields/PF1ELD/field_options",
        ))
        .respond_with(json_encoded(json!({"field_options": []}))),
    );

    let harness = harness(&server).await;
    let state = harness
        .read(
            "pagerduty_incident_custom_field_option",
            json!({"id": "POPT9", "field": "PF1ELD"}),
        )
        .await
        .unwrap();
    assert!(state.is_null());
}

fn dependency_state() -> Value {
    json!({
        "id": "D1EPND",
        "dependency": [{
            "type": "service_dependency",
            "supporting_service": [{"id": "PT4KHLK", "type": "business_service"}],
            "dependent_service": [{"id": "P1SVC", "type": "service"}],
        }],
    })
}

fn dependency_relationship() -> Value {
    json!({
        "id": "D1EPND",
        "type": "service_dependency",
        "supporting_service": {"id": "PT4KHLK", "type": "business_service_reference"},
        "dependent_service": {"id": "P1SVC", "type": "technical_service_reference"},
    })
}

#[tokio::test]
async fn service_dependency_associate_and_disassociate() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/service_dependencies/associate"))
            .respond_with(json_encoded(json!({
                "relationships": [dependency_relationship()],
            }))),
    );
    // Delete lists the dependent service's relationships first.
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/service_dependencies/technical_services/P1SVC",
        ))
        .respond_with(json_encoded(json!({
            "relationships": [dependency_relationship()],
        }))),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "POST",
            "/service_dependencies/disassociate",
        ))
        .respond_with(json_encoded(json!({
            "relationships": [dependency_relationship()],
        }))),
    );

    let harness = harness(&server).await;
    let created = harness
        .create("pagerduty_service_dependency", dependency_state())
        .await
        .unwrap();
    assert_eq!(created["id"], "D1EPND");
    // Reference types come back normalized to request-side names.
    assert_eq!(
        created["dependency"][0]["supporting_service"][0]["type"],
        "business_service"
    );
    assert_eq!(
        created["dependency"][0]["dependent_service"][0]["type"],
        "service"
    );

    harness
        .delete("pagerduty_service_dependency", created)
        .await
        .unwrap();
}

#[tokio::test]
async fn service_dependency_read_forgets_missing_relationship() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/service_dependencies/technical_services/P1SVC",
        ))
        .respond_with(json_encoded(json!({"relationships": []}))),
    );

    let harness = harness(&server).await;
    let state = harness
        .read("pagerduty_service_dependency", dependency_state())
        .await
        .unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn service_dependency_replacement_on_changed_block() {
    let server = Server::run();
    let harness = harness(&server).await;

    let mut proposed = dependency_state();
    proposed["dependency"][0]["dependent_service"][0]["id"] = json!("P2SVC");
    let plan = harness
        .plan_update("pagerduty_service_dependency", dependency_state(), proposed)
        .await
        .unwrap();
    assert_plan_replaces(&plan);
}

#[tokio::test]
async fn service_dependency_import_parses_composite_id() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/service_dependencies/business_services/PT4KHLK",
        ))
        .respond_with(json_encoded(json!({
            "relationships": [dependency_relationship()],
        }))),
    );

    let harness = harness(&server).await;
    let imported = harness
        .import_resource("pagerduty_service_dependency", "PT4KHLK.business_service.D1EPND")
        .await
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].state["id"], "D1EPND");

    let err = harness
        .import_resource("pagerduty_service_dependency", "not-a-composite-id")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("supporting_service_id"));
}

#[tokio::test]
async fn incident_custom_field_option_import_is_not_supported() {
    let server = Server::run();
    let harness = harness(&server).await;

    // An option id alone cannot recover the parent field, so import is
    // declined outright rather than producing unusable state.
    let err = harness
        .import_resource("pagerduty_incident_custom_field_option", "O1PTN")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unimplemented(_)));
}

#[tokio::test]
async fn data_sources_resolve_by_name() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/services"),
            request::query(url_decoded(contains(("query", "Checkout API")))),
        ])
        .respond_with(json_encoded(json!({
            "services": [{
                "id": "P1SVC",
                "name": "Checkout API",
                "type": "service",
                "escalation_policy": {"id": "PESC1"},
                "teams": [],
            }],
            "more": false,
        }))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/extension_schemas"))
            .respond_with(json_encoded(json!({
                "extension_schemas": [
                    {"id": "PEX2", "label": "Slack", "type": "extension_schema"},
                ],
                "more": false,
            }))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/incidents/custom_fields"))
            .respond_with(json_encoded(json!({
                "fields": [{
                    "id": "PF1ELD",
                    "name": "environment",
                    "display_name": "Environment",
                    "data_type": "string",
                    "field_type": "single_value_fixed",
                }],
                "more": false,
            }))),
    );

    let harness = harness(&server).await;

    let service = harness
        .read_data_source("pagerduty_service", json!({"name": "Checkout API"}))
        .await
        .unwrap();
    assert_eq!(service["id"], "P1SVC");
    assert_eq!(service["escalation_policy"], "PESC1");

    let extension = harness
        .read_data_source("pagerduty_extension_schema", json!({"name": "SLACK"}))
        .await
        .unwrap();
    assert_eq!(extension["id"], "PEX2");

    let field = harness
        .read_data_source(
            "pagerduty_incident_custom_field",
            json!({"name": "environment"}),
        )
        .await
        .unwrap();
    assert_eq!(field["id"], "PF1ELD");
    assert_eq!(field["field_type"], "single_value_fixed");
}

#[tokio::test]
async fn provider_config_validation_flags_wrong_types() {
    let harness = ProviderHarness::new(PagerDutyProvider::new());
    let result = harness
        .validate_provider_config(json!({"api_token": 12345}))
        .await;
    assert!(result.is_err());
}
