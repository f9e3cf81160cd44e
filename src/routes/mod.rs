//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/analyze` - Run an analysis through the LLM gateway
//! - `/api/users/{user_id}/ideas` - Saved ideas
//! - `/api/settings` - Tier and API key management
//! - `/api/tiers` - Tier catalog

pub mod analysis;
pub mod health;
pub mod ideas;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::settings;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router(state.clone()))
        .merge(analysis::router(state.clone()))
        .merge(ideas::router(state.clone()))
        .merge(settings::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LLMConfig, ServerConfig, TierProfiles};
    use crate::db::MemoryIdeasStore;
    use crate::gateway::Gateway;
    use crate::llm::provider::tests::{reply, ScriptedAdapter};
    use crate::settings::{SettingsStorage, Tier};
    use crate::types::{GatewayError, GatewayResult, LLMResponse};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const IDEA_JSON: &str = r#"{"rating": 8, "swot": {"strengths": ["cheap"], "weaknesses": ["niche"], "opportunities": ["schools"], "threats": ["incumbents"]}, "niches": ["tutors"], "products": ["course"], "monetization": ["subscription"], "mvp": "A waitlist page."}"#;

    struct TestApp {
        router: Router,
        settings: Arc<SettingsStorage>,
        adapter: Arc<ScriptedAdapter>,
        _dir: TempDir,
    }

    fn test_app(outcomes: Vec<GatewayResult<LLMResponse>>) -> TestApp {
        let dir = TempDir::new().unwrap();
        let config = Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            database: None,
            llm: LLMConfig {
                free_fallback_models: vec![],
                ..LLMConfig::default()
            },
            tiers: TierProfiles::default(),
            settings_dir: Some(dir.path().to_path_buf()),
        };

        let settings = Arc::new(SettingsStorage::with_path(
            dir.path().to_path_buf(),
            config.tiers.clone(),
        ));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let gateway = Arc::new(Gateway::new(settings.clone(), adapter.clone(), &config.llm));

        let state = AppState {
            config,
            gateway,
            ideas: Arc::new(MemoryIdeasStore::new()),
            settings: settings.clone(),
        };

        TestApp {
            router: create_router(state),
            settings,
            adapter,
            _dir: dir,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn analyze_body(input: &str) -> Value {
        json!({"task_kind": "idea_analysis", "free_text_input": input})
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(vec![]);
        let (status, body) = send(&app.router, Method::GET, "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ideas_store"], "memory");
    }

    #[tokio::test]
    async fn test_analyze_returns_tagged_result() {
        let app = test_app(vec![reply(&format!("```json\n{}\n```", IDEA_JSON))]);
        app.settings.set_tier_key(Tier::Free, "sk-or-test-1234").await.unwrap();

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/analyze",
            Some(analyze_body("Peer tutoring marketplace")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_kind"], "idea_analysis");
        assert_eq!(body["result"]["rating"], 8);
        assert_eq!(body["result"]["mvp"], "A waitlist page.");
        assert_eq!(
            app.adapter.models_called(),
            vec![TierProfiles::default().free.model]
        );
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_input() {
        let app = test_app(vec![]);
        app.settings.set_tier_key(Tier::Free, "sk-or-test-1234").await.unwrap();

        let (status, body) = send(&app.router, Method::POST, "/api/analyze", Some(analyze_body("   "))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert!(app.adapter.models_called().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_key() {
        let app = test_app(vec![reply(IDEA_JSON)]);
        let (status, body) = send(&app.router, Method::POST, "/api/analyze", Some(analyze_body("Meal kits"))).await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "missing_credential");
        assert!(app.adapter.models_called().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_error_mapping() {
        let cases = [
            (Err(GatewayError::RateLimited), StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            (
                Err(GatewayError::upstream(Some(500), "boom")),
                StatusCode::BAD_GATEWAY,
                "upstream_failure",
            ),
            (reply("I cannot help with that."), StatusCode::UNPROCESSABLE_ENTITY, "parse_failure"),
        ];

        for (outcome, expected_status, expected_kind) in cases {
            let app = test_app(vec![outcome]);
            app.settings.set_tier_key(Tier::Free, "sk-or-test-1234").await.unwrap();

            let (status, body) =
                send(&app.router, Method::POST, "/api/analyze", Some(analyze_body("Meal kits"))).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["error"], expected_kind);
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_save_and_list_ideas() {
        let app = test_app(vec![]);
        let user = uuid::Uuid::new_v4();
        let uri = format!("/api/users/{}/ideas", user);
        let analysis: Value = serde_json::from_str(IDEA_JSON).unwrap();

        let (status, saved) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(json!({"title": "Tutoring", "description": "Peer tutoring", "analysis": analysis})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["rating"], 8);
        assert_eq!(saved["digital_products"], json!(["course"]));
        assert_eq!(saved["swot_analysis"]["threats"], json!(["incumbents"]));

        let (status, listed) = send(&app.router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], saved["id"]);
    }

    #[tokio::test]
    async fn test_save_idea_rejects_invalid_analysis() {
        let app = test_app(vec![]);
        let uri = format!("/api/users/{}/ideas", uuid::Uuid::new_v4());
        let mut analysis: Value = serde_json::from_str(IDEA_JSON).unwrap();
        analysis["rating"] = json!(0);

        let (status, body) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(json!({"title": "Tutoring", "description": "", "analysis": analysis})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (_, listed) = send(&app.router, Method::GET, &uri, None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_settings_round_trip_masks_keys() {
        let app = test_app(vec![]);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/settings",
            Some(json!({"current_tier": "pro", "pro_key": "sk-or-secret-9876"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_tier"], "pro");

        let (_, body) = send(&app.router, Method::GET, "/api/settings", None).await;
        assert_eq!(body["pro"]["has_key"], true);
        assert_eq!(body["pro"]["key_hint"], "••••9876");
        assert_eq!(body["free"]["has_key"], false);
        assert!(!body.to_string().contains("sk-or-secret"));
    }

    #[tokio::test]
    async fn test_tier_catalog() {
        let app = test_app(vec![]);

        let (status, body) = send(&app.router, Method::GET, "/api/tiers", None).await;
        assert_eq!(status, StatusCode::OK);
        let tiers = body.as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["tier"], "free");
        assert_eq!(tiers[1]["price_usd"], 25);
        assert_eq!(tiers[2]["model"], "openai/gpt-4o:extended");
        assert!(!body.to_string().contains("api_key"));

        let (status, body) = send(&app.router, Method::GET, "/api/tiers/ULTRA", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ULTRA Tier");
        assert_eq!(body["token_limit"], 50000);

        let (status, body) = send(&app.router, Method::GET, "/api/tiers/enterprise", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settings_updates_keep_every_key() {
        let app = test_app(vec![]);

        let updates = [
            json!({"free_key": "sk-free-1111"}),
            json!({"pro_key": "sk-pro-2222"}),
            json!({"ultra_key": "sk-ultra-3333"}),
            json!({"current_tier": "pro"}),
        ];
        let handles: Vec<_> = updates
            .into_iter()
            .map(|body| {
                let router = app.router.clone();
                tokio::spawn(async move { send(&router, Method::POST, "/api/settings", Some(body)).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().0, StatusCode::OK);
        }

        let (_, body) = send(&app.router, Method::GET, "/api/settings", None).await;
        assert_eq!(body["current_tier"], "pro");
        assert_eq!(body["free"]["key_hint"], "••••1111");
        assert_eq!(body["pro"]["key_hint"], "••••2222");
        assert_eq!(body["ultra"]["key_hint"], "••••3333");
    }
}
