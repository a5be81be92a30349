//! Integration tests for the reconciler using wiremock
//!
//! These tests run the reconciler against a mocked management endpoint,
//! checking the requests it sends and how it reads each response code.

use apim_sync::apim::{ApimClient, ApimCredentials, ApimError, ClientSettings, ServiceCoordinates};
use apim_sync::reconciler::{
    ApiVersion, Backend, BackendKind, BackendRegistry, Deployment, Descriptor, Presence,
    ResourceReconciler,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "SharedAccessSignature integration&202612&c2lnbmF0dXJl";
const API_VERSION: &str = "2019-12-01";
const SERVICE_PATH: &str =
    "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/svc1";

fn api_path(id: &str) -> String {
    format!("{}/apis/{}", SERVICE_PATH, id)
}

fn reconciler(server: &MockServer) -> ResourceReconciler {
    let client = ApimClient::new(
        ClientSettings {
            coordinates: ServiceCoordinates::new("sub1", "rg1", "svc1"),
            management_endpoint: server.uri(),
            api_version: API_VERSION.to_string(),
            request_timeout: None,
        },
        ApimCredentials::from_token(TOKEN),
    )
    .expect("client should build");

    let backends = BackendRegistry::new().with_backend(
        BackendKind::Realtime,
        Backend::new("https://luna.example.com", "/api/{product}/{deployment}/predict"),
    );
    ResourceReconciler::new(client, backends)
}

fn churn_v1() -> Descriptor {
    Descriptor::versioned(ApiVersion::new("churn", "prod", "v1"), BackendKind::Realtime)
}

fn churn_v1_record() -> serde_json::Value {
    json!({
        "name": "prod-v1",
        "properties": {
            "displayName": "prod-v1",
            "apiVersion": "v1",
            "serviceUrl": "https://luna.example.com/api/churn/prod/predict",
            "path": "churn/prod",
            "apiVersionSetId": format!("{}/apiVersionSets/prod", SERVICE_PATH)
        }
    })
}

mod existence {
    use super::*;

    /// A missing resource reads as absent, and as present once created
    #[tokio::test]
    async fn test_exists_then_create_then_exists() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(201).set_body_json(churn_v1_record()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(churn_v1_record()))
            .mount(&server)
            .await;

        let reconciler = reconciler(&server);
        let descriptor = churn_v1();

        assert!(!reconciler.exists(&descriptor).await.unwrap());
        reconciler.create(&descriptor).await.unwrap();
        assert!(reconciler.exists(&descriptor).await.unwrap());
    }

    /// Every non-success status reads as absent through `exists`
    #[tokio::test]
    async fn test_exists_false_on_any_failure_status() {
        for status in [401u16, 403, 429, 500, 503] {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path(api_path("prod-v1")))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let exists = reconciler(&server).exists(&churn_v1()).await.unwrap();
            assert!(!exists, "status {} should read as absent", status);
        }
    }

    /// `probe` keeps 404 apart from other failures
    #[tokio::test]
    async fn test_probe_distinguishes_absent_from_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let reconciler = reconciler(&server);
        assert_eq!(reconciler.probe(&churn_v1()).await.unwrap(), Presence::Absent);
        assert_eq!(
            reconciler.probe(&churn_v1()).await.unwrap(),
            Presence::Unknown(reqwest::StatusCode::TOO_MANY_REQUESTS)
        );
    }

    /// A success status with a body that is not a record is a server error
    #[tokio::test]
    async fn test_exists_malformed_success_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = reconciler(&server).exists(&churn_v1()).await.unwrap_err();
        match err {
            ApimError::Server { body, .. } => assert_eq!(body, "<html>proxy</html>"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    /// Existence probes carry the token and the pinned api-version
    #[tokio::test]
    async fn test_exists_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod")))
            .and(query_param("api-version", API_VERSION))
            .and(header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "prod"})))
            .expect(1)
            .mount(&server)
            .await;

        let descriptor = Descriptor::origin(Deployment::new("churn", "prod"));
        assert!(reconciler(&server).exists(&descriptor).await.unwrap());
    }
}

mod mutation {
    use super::*;

    /// Create sends an overwriting PUT with the materialized record
    #[tokio::test]
    async fn test_create_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(api_path("prod-v1")))
            .and(query_param("api-version", API_VERSION))
            .and(header("Authorization", TOKEN))
            .and(header("If-Match", "*"))
            .and(body_json(churn_v1_record()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        reconciler(&server).create(&churn_v1()).await.unwrap();
    }

    /// Update is the same PUT as create
    #[tokio::test]
    async fn test_update_is_put() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(api_path("prod-v1")))
            .and(header("If-Match", "*"))
            .and(body_json(churn_v1_record()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        reconciler(&server).update(&churn_v1()).await.unwrap();
    }

    /// Origin versions go out with an empty service URL
    #[tokio::test]
    async fn test_create_origin_version() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(api_path("prod")))
            .and(body_json(json!({
                "name": "prod",
                "properties": {
                    "displayName": "prod",
                    "apiVersion": "prod",
                    "serviceUrl": "",
                    "path": "churn/prod",
                    "apiVersionSetId": format!("{}/apiVersionSets/prod", SERVICE_PATH)
                }
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let descriptor = Descriptor::origin(Deployment::new("churn", "prod"));
        reconciler(&server).create(&descriptor).await.unwrap();
    }

    /// A rejected create surfaces the literal response body
    #[tokio::test]
    async fn test_create_failure_carries_body() {
        let server = MockServer::start().await;
        let body = r#"{"error":{"code":"ValidationError","message":"Invalid serviceUrl"}}"#;

        Mock::given(method("PUT"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;

        let err = reconciler(&server).create(&churn_v1()).await.unwrap_err();
        assert_eq!(err.response_body(), Some(body));
        assert!(err.to_string().contains("Invalid serviceUrl"));
    }

    /// Deleting a missing resource sends no DELETE, however often it runs
    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let reconciler = reconciler(&server);
        reconciler.delete(&churn_v1()).await.unwrap();
        reconciler.delete(&churn_v1()).await.unwrap();
    }

    /// Deleting an existing resource sends a DELETE with If-Match
    #[tokio::test]
    async fn test_delete_existing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(churn_v1_record()))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(api_path("prod-v1")))
            .and(header("If-Match", "*"))
            .and(query_param("api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        reconciler(&server).delete(&churn_v1()).await.unwrap();
    }

    /// Caller query parameters ride along, but api-version stays pinned
    #[tokio::test]
    async fn test_delete_with_extra_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .and(query_param("deleteRevisions", "true"))
            .and(query_param("api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(churn_v1_record()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(api_path("prod-v1")))
            .and(query_param("deleteRevisions", "true"))
            .and(query_param("api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        reconciler(&server)
            .with_query_param("api-version", "1999-01-01")
            .with_query_param("deleteRevisions", "true")
            .delete(&churn_v1())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_carries_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(churn_v1_record()))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(409).set_body_string("conflict: api in use"))
            .mount(&server)
            .await;

        let err = reconciler(&server).delete(&churn_v1()).await.unwrap_err();
        assert!(matches!(err, ApimError::Server { ref body, .. } if body == "conflict: api in use"));
    }

    /// A version whose backend is not registered fails before any request
    #[tokio::test]
    async fn test_create_unregistered_backend() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let descriptor =
            Descriptor::versioned(ApiVersion::new("churn", "prod", "v1"), BackendKind::Train);
        let err = reconciler(&server).create(&descriptor).await.unwrap_err();
        assert!(matches!(err, ApimError::UnknownBackend(_)));
    }
}

mod batch {
    use super::*;

    /// Apply creates what is missing, updates what exists and collects failures
    #[tokio::test]
    async fn test_apply_mixed_batch() {
        let server = MockServer::start().await;

        // prod: exists
        Mock::given(method("GET"))
            .and(path(api_path("prod")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "prod"})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(api_path("prod")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // prod-v1: missing
        Mock::given(method("GET"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(api_path("prod-v1")))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        // prod-v2: missing, rejected
        Mock::given(method("GET"))
            .and(path(api_path("prod-v2")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(api_path("prod-v2")))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad version"))
            .mount(&server)
            .await;

        let descriptors = vec![
            Descriptor::origin(Deployment::new("churn", "prod")),
            churn_v1(),
            Descriptor::versioned(ApiVersion::new("churn", "prod", "v2"), BackendKind::Realtime),
        ];

        let report = reconciler(&server).apply(&descriptors, 2).await.unwrap();

        assert_eq!(report.created, vec!["prod-v1".to_string()]);
        assert_eq!(report.updated, vec!["prod".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "prod-v2");
        assert_eq!(report.failed[0].1.response_body(), Some("bad version"));
        assert!(!report.is_success());
    }
}
