//! HTTP API Tests
//!
//! Drive the router in-process with `oneshot` over an in-memory engine.

#[cfg(test)]
mod http_api_tests {
    use anyhow::Result;
    use arbor_core::{NodeService, TreeConfig};
    use arbor_server::{create_router, AppState};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(config: TreeConfig) -> Router {
        create_router(AppState::new(NodeService::in_memory(config)))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&value)?)
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body)?).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn create(app: &Router, parent: i64, title: &str) -> Result<Value> {
        let (status, node) = send(
            app,
            Method::POST,
            "/api/node",
            Some(json!({ "parentNodeId": parent, "title": title })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", node);
        Ok(node)
    }

    #[tokio::test]
    async fn test_health_check() -> Result<()> {
        let (status, body) = send(&app(TreeConfig::default()), Method::GET, "/api/health", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_list() -> Result<()> {
        let app = app(TreeConfig::default());
        let node = create(&app, 1, "  Spruce ").await?;
        assert_eq!(node["title"], "Spruce");
        assert_eq!(node["parentNodeId"], 1);
        assert_eq!(node["depth"], 1);
        assert_eq!(node["ordering"], 1);

        let (status, listing) = send(&app, Method::GET, "/api/node", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["nodes"].as_array().map(Vec::len), Some(2));
        assert_eq!(listing["total"], 1);

        let (status, fetched) = send(&app, Method::GET, "/api/node/1", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["children"][0]["title"], "Spruce");
        Ok(())
    }

    #[tokio::test]
    async fn test_input_errors() -> Result<()> {
        let app = app(TreeConfig::default());

        let (status, err) = send(&app, Method::POST, "/api/node", Some(json!({ "title": "x" }))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_ARGUMENT");

        let (status, err) = send(
            &app,
            Method::POST,
            "/api/node",
            Some(json!({ "parentNodeId": 999, "title": "x" })),
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");

        let (status, _) = send(&app, Method::GET, "/api/node/abc", None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, err) = send(
            &app,
            Method::PATCH,
            "/api/node/1",
            Some(json!({ "title": "a title that is far too long" })),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_ARGUMENT");

        let (status, err) = send(&app, Method::DELETE, "/api/node/1", None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["code"], "FORBIDDEN");
        Ok(())
    }

    #[tokio::test]
    async fn test_structural_edits() -> Result<()> {
        let app = app(TreeConfig::default());
        let a = create(&app, 1, "A").await?;
        let b = create(&app, 1, "B").await?;
        let a1 = create(&app, a["id"].as_i64().unwrap_or_default(), "A1").await?;

        let (status, err) = send(
            &app,
            Method::PATCH,
            &format!("/api/node/{}/reattach", a["id"]),
            Some(json!({ "parentNodeId": a1["id"] })),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "CIRCULAR_DEPENDENCY");

        let (status, moved) = send(
            &app,
            Method::PATCH,
            &format!("/api/node/{}/reattach", a["id"]),
            Some(json!({ "parentNodeId": b["id"] })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["depth"], 2);

        let c = create(&app, 1, "C").await?;
        let (status, shifted) = send(
            &app,
            Method::PATCH,
            &format!("/api/node/{}/shift", c["id"]),
            Some(json!({ "direction": -1 })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shifted[0]["ordering"], 1);
        assert_eq!(shifted[1]["id"], b["id"]);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/node/{}/shift", c["id"]),
            Some(json!({ "direction": 2 })),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, reordered) = send(
            &app,
            Method::PATCH,
            &format!("/api/node/{}/reorder", b["id"]),
            Some(json!({ "parentNodeId": 1, "ordering": 1 })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reordered["node"]["ordering"], 1);
        assert_eq!(reordered["swapped"]["id"], c["id"]);

        let (status, deleted) = send(&app, Method::DELETE, &format!("/api/node/{}", b["id"]), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deletedNode"]["id"], b["id"]);
        assert_eq!(deleted["deletedCount"], 3);
        assert_eq!(deleted["updatedSiblings"][0]["id"], c["id"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_binary_tree_view() -> Result<()> {
        let app = app(TreeConfig::binary());
        let right = create(&app, 1, "right").await?;
        let left = create(&app, 1, "left").await?;

        let (status, err) = send(
            &app,
            Method::POST,
            "/api/node",
            Some(json!({ "parentNodeId": 1, "title": "third" })),
        )
        .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "CONFLICT");

        let (status, tree) = send(&app, Method::GET, "/api/tree", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tree["id"], 1);
        assert_eq!(tree["leftChild"]["id"], left["id"]);
        assert_eq!(tree["rightChild"]["id"], right["id"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_events_stream_committed_mutations() -> Result<()> {
        let app = app(TreeConfig::default());

        let request = Request::builder().uri("/api/events").body(Body::empty())?;
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let mut body = response.into_body();

        let node = create(&app, 1, "Spruce").await?;

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), body.frame())
            .await?
            .expect("stream should stay open")?;
        let data = frame.into_data().unwrap_or_default();
        let text = String::from_utf8(data.to_vec())?;

        assert!(text.starts_with("event: node:created"), "{}", text);
        assert!(text.contains(&format!("\"id\":{}", node["id"])), "{}", text);
        Ok(())
    }
}
