//! Thin HTTP client for the e2e tests.
//!
//! Keeps the session token from the last successful login and sends it via
//! the Authorization header on subsequent requests.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl TestClient {
    pub fn new(base_url: &str) -> Self {
        TestClient {
            base_url: base_url.to_owned(),
            client: reqwest::Client::new(),
            token: None,
        }
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", token),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.with_auth(self.client.get(self.url(path)))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Response {
        self.with_auth(self.client.get(self.url(path)).query(query))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.with_auth(self.client.post(self.url(path)).json(body))
            .send()
            .await
            .expect("POST request failed")
    }

    // =========================================================================
    // Auth
    // =========================================================================

    pub async fn register(&self, user_handle: &str, password: &str) -> Response {
        self.post_json(
            "/v1/auth/register",
            &json!({ "user_handle": user_handle, "password": password }),
        )
        .await
    }

    pub async fn login(&mut self, user_handle: &str, password: &str) -> Response {
        self.post_json(
            "/v1/auth/login",
            &json!({ "user_handle": user_handle, "password": password }),
        )
        .await
    }

    /// Logs in and stores the session token for subsequent requests.
    pub async fn login_ok(&mut self, user_handle: &str, password: &str) {
        let response = self.login(user_handle, password).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("login response was not JSON");
        let token = body["token"].as_str().expect("login response had no token");
        self.token = Some(token.to_owned());
    }

    pub async fn logout(&mut self) -> Response {
        let response = self.get("/v1/auth/logout").await;
        self.token = None;
        response
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn list_movies(&self, query: &[(&str, &str)]) -> Response {
        self.get_with_query("/v1/catalog/movies", query).await
    }

    pub async fn get_movie(&self, movie_id: i64) -> Response {
        self.get(&format!("/v1/catalog/movies/{}", movie_id)).await
    }

    pub async fn create_movie(&self, body: &Value) -> Response {
        self.post_json("/v1/catalog/movies", body).await
    }

    // =========================================================================
    // Ratings
    // =========================================================================

    pub async fn submit_rating(&self, movie_id: i64, body: &Value) -> Response {
        self.post_json(&format!("/v1/catalog/movies/{}/ratings", movie_id), body)
            .await
    }

    pub async fn movie_ratings(&self, movie_id: i64, query: &[(&str, &str)]) -> Response {
        self.get_with_query(&format!("/v1/catalog/movies/{}/ratings", movie_id), query)
            .await
    }

    pub async fn my_ratings(&self, query: &[(&str, &str)]) -> Response {
        self.get_with_query("/v1/user/ratings", query).await
    }
}

/// Asserts the status and parses the body as JSON.
pub async fn json_body(response: Response, expected_status: StatusCode) -> Value {
    let status = response.status();
    let text = response.text().await.expect("could not read response body");
    assert_eq!(status, expected_status, "unexpected status, body: {}", text);
    serde_json::from_str(&text).unwrap_or_else(|_| panic!("response was not JSON: {}", text))
}

/// Names of the violated fields in an InvalidInput error body.
pub fn violated_fields(body: &Value) -> Vec<String> {
    body["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f["field"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
