//! An in-process registry for exercising the client over real HTTP.
//!
//! Binds an ephemeral port on 127.0.0.1, records every request it sees, and
//! enforces the same token rule as the real registry: everything except
//! `/authenticate` and `/tracks` needs a valid `X-Authorization` header.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use registry_client::RegistryClient;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};

pub const TOKEN: &str = "bearer eyJhbGciOiJIUzI1NiJ9.mock.signature";
pub const ADMIN_USER: &str = "ece30861defaultadminuser";
pub const ADMIN_PASSWORD: &str = "correcthorsebatterystaple123";
pub const PAGE_SIZE: usize = 2;
pub const FIRST_PACKAGE_ID: u64 = 42;

const AUTH_FAILED: &str = "Authentication failed due to invalid or missing AuthenticationToken.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub x_authorization: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
struct StoredPackage {
    name: String,
    version: String,
    content: Option<String>,
    url: Option<String>,
    js_program: String,
}

#[derive(Debug, Default)]
struct Registry {
    packages: BTreeMap<u64, StoredPackage>,
    next_package_id: u64,
    permissions: HashMap<String, Value>,
    users: Vec<String>,
    groups: BTreeMap<u64, String>,
    group_users: HashMap<u64, Vec<u64>>,
    group_packages: HashMap<u64, Vec<u64>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Registry>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MockRegistry {
    pub base_url: String,
    state: Shared,
}

impl MockRegistry {
    /// Serve on the caller's runtime.
    pub async fn spawn() -> Self {
        Self::spawn_with_prefix(None).await
    }

    /// Serve every route below `prefix`, like a registry behind a reverse
    /// proxy. `base_url` includes the prefix.
    pub async fn spawn_under(prefix: &str) -> Self {
        Self::spawn_with_prefix(Some(prefix)).await
    }

    async fn spawn_with_prefix(prefix: Option<&str>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = new_state();
        let app = match prefix {
            Some(prefix) => Router::new().nest(prefix, app(state.clone())),
            None => app(state.clone()),
        };
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self {
            base_url: format!("http://{addr}{}", prefix.unwrap_or_default()),
            state,
        }
    }

    /// Serve from a background thread with its own runtime, for tests that
    /// block on a child process.
    pub fn spawn_in_thread() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = new_state();
        let app = app(state.clone());
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// A client holding the valid token.
    pub fn client(&self) -> RegistryClient {
        RegistryClient::builder()
            .base_url(&self.base_url)
            .token(SecretString::from(TOKEN.to_string()))
            .build()
            .unwrap()
    }

    /// A client without any token.
    pub fn anonymous_client(&self) -> RegistryClient {
        RegistryClient::builder().base_url(&self.base_url).build().unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().unwrap()
    }

    pub fn package_count(&self) -> usize {
        self.state.lock().packages.len()
    }

    /// Store a package directly, bypassing the API.
    pub fn seed_package(&self, name: &str, version: &str) -> u64 {
        let mut registry = self.state.lock();
        let id = registry.next_package_id;
        registry.next_package_id += 1;
        registry.packages.insert(
            id,
            StoredPackage {
                name: name.to_string(),
                version: version.to_string(),
                content: None,
                url: Some(format!("https://github.com/example/{name}")),
                js_program: String::new(),
            },
        );
        id
    }
}

fn new_state() -> Shared {
    let state = Shared::default();
    state.lock().next_package_id = FIRST_PACKAGE_ID;
    state
}

fn app(state: Shared) -> Router {
    Router::new()
        .route("/authenticate", put(authenticate))
        .route("/tracks", get(tracks))
        .route("/packages", post(list_packages))
        .route("/reset", delete(reset))
        .route("/package", post(upload_package))
        .route("/package/byRegEx", post(search_by_regex))
        .route("/package/{id}", get(get_package).post(update_package))
        .route("/package/{id}/cost", get(package_cost))
        .route("/package/{id}/rate", get(package_rate))
        .route("/logout", post(logout))
        .route("/Access/{user_id}", get(get_access).post(set_access))
        .route("/register", post(register))
        .route("/group", post(create_group))
        .route("/groups", get(list_groups))
        .route("/groups/{group_id}", get(group_users))
        .route("/add_user/{group_id}", post(add_user))
        .route("/add_package/{group_id}", post(add_package))
        .route("/history", post(history))
        .layer(middleware::from_fn_with_state(state.clone(), record_and_authorize))
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn record_and_authorize(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        x_authorization: header("x-authorization"),
        authorization: header("authorization"),
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    };
    let authorized = recorded.x_authorization.as_deref() == Some(TOKEN);
    let public = matches!(recorded.path.as_str(), "/authenticate" | "/tracks");
    state.lock().requests.push(recorded);

    if !public && !authorized {
        return error(StatusCode::FORBIDDEN, AUTH_FAILED);
    }
    next.run(Request::from_parts(parts, axum::body::Body::from(bytes))).await
}

async fn authenticate(Json(body): Json<Value>) -> Response {
    let name = body["User"]["name"].as_str();
    let password = body["Secret"]["password"].as_str();
    if name == Some(ADMIN_USER) && password == Some(ADMIN_PASSWORD) {
        // The registry answers with a bare JSON string
        return Json(json!(TOKEN)).into_response();
    }
    error(StatusCode::UNAUTHORIZED, "The user or password is invalid.")
}

async fn tracks() -> Json<Value> {
    Json(json!({ "plannedTracks": ["Access control track"] }))
}

#[derive(Deserialize)]
struct OffsetQuery {
    offset: Option<usize>,
}

async fn list_packages(
    State(state): State<Shared>,
    Query(query): Query<OffsetQuery>,
    Json(queries): Json<Vec<Value>>,
) -> Response {
    if queries.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "There is missing field(s) in the PackageQuery or it is formed improperly.",
        );
    }
    let registry = state.lock();
    let matching: Vec<Value> = registry
        .packages
        .iter()
        .filter(|(_, package)| {
            queries.iter().any(|q| {
                let name = q["Name"].as_str().unwrap_or_default();
                let version = q["Version"].as_str();
                (name == "*" || name == package.name) && version.map_or(true, |v| v == package.version)
            })
        })
        .map(|(id, package)| json!({ "Name": package.name, "Version": package.version, "ID": id.to_string() }))
        .collect();

    let offset = query.offset.unwrap_or(0);
    let page: Vec<Value> = matching.iter().skip(offset).take(PAGE_SIZE).cloned().collect();
    let mut response = Json(page).into_response();
    if offset + PAGE_SIZE < matching.len() {
        response
            .headers_mut()
            .insert("offset", (offset + PAGE_SIZE).to_string().parse().unwrap());
    }
    response
}

async fn reset(State(state): State<Shared>) -> StatusCode {
    let mut registry = state.lock();
    registry.packages.clear();
    registry.groups.clear();
    StatusCode::OK
}

fn package_json(id: u64, package: &StoredPackage) -> Value {
    let mut data = json!({ "JSProgram": package.js_program });
    if let Some(content) = &package.content {
        data["Content"] = json!(content);
    }
    if let Some(url) = &package.url {
        data["URL"] = json!(url);
    }
    json!({
        "metadata": { "Name": package.name, "Version": package.version, "ID": id.to_string() },
        "data": data,
    })
}

fn parse_id(id: &str) -> Option<u64> {
    id.parse().ok()
}

async fn upload_package(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let content = body["Content"].as_str().map(str::to_string);
    let url = body["URL"].as_str().map(str::to_string);
    let Some(name) = body["Name"].as_str().filter(|n| !n.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "There is missing field(s) in the PackageData.");
    };
    if content.is_some() == url.is_some() {
        return error(
            StatusCode::BAD_REQUEST,
            "There is missing field(s) in the PackageData or it is formed improperly (e.g. Content and URL are both set).",
        );
    }

    let mut registry = state.lock();
    if registry.packages.values().any(|p| p.name == name) {
        return error(StatusCode::CONFLICT, "Package exists already.");
    }
    let id = registry.next_package_id;
    registry.next_package_id += 1;
    let package = StoredPackage {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        content,
        url,
        js_program: body["JSProgram"].as_str().unwrap_or_default().to_string(),
    };
    let response = package_json(id, &package);
    registry.packages.insert(id, package);
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn get_package(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let registry = state.lock();
    match parse_id(&id).and_then(|id| registry.packages.get(&id).map(|p| (id, p))) {
        Some((id, package)) => Json(package_json(id, package)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Package doesn't exist"),
    }
}

async fn update_package(State(state): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let mut registry = state.lock();
    let Some(package) = parse_id(&id).and_then(|id| registry.packages.get_mut(&id)) else {
        return error(StatusCode::NOT_FOUND, "Package doesn't exist");
    };
    if body["metadata"]["Name"].as_str() != Some(package.name.as_str()) {
        return error(StatusCode::BAD_REQUEST, "Package name doesn't match.");
    }
    if let Some(version) = body["metadata"]["Version"].as_str() {
        package.version = version.to_string();
    }
    package.content = body["data"]["Content"].as_str().map(str::to_string);
    package.url = body["data"]["URL"].as_str().map(str::to_string);
    package.js_program = body["data"]["JSProgram"].as_str().unwrap_or_default().to_string();
    StatusCode::OK.into_response()
}

async fn search_by_regex(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(pattern) = body["RegEx"].as_str() else {
        return error(StatusCode::BAD_REQUEST, "There is missing field(s) in the PackageRegEx.");
    };
    let Ok(regex) = regex::Regex::new(pattern) else {
        return error(StatusCode::BAD_REQUEST, "Invalid regular expression.");
    };
    let registry = state.lock();
    let matches: Vec<Value> = registry
        .packages
        .iter()
        .filter(|(_, p)| regex.is_match(&p.name))
        .map(|(id, p)| json!({ "Name": p.name, "Version": p.version, "ID": id.to_string() }))
        .collect();
    if matches.is_empty() {
        return error(StatusCode::NOT_FOUND, "No package found under this regex.");
    }
    Json(matches).into_response()
}

#[derive(Deserialize)]
struct DependencyQuery {
    dependency: Option<bool>,
}

async fn package_cost(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<DependencyQuery>,
) -> Response {
    if !parse_id(&id).is_some_and(|id| state.lock().packages.contains_key(&id)) {
        return error(StatusCode::NOT_FOUND, "Package doesn't exist");
    }
    let mut report = serde_json::Map::new();
    if query.dependency.unwrap_or(false) {
        report.insert(id, json!({ "standaloneCost": 1.5, "totalCost": 2.75 }));
        report.insert("7".to_string(), json!({ "totalCost": 1.25 }));
    } else {
        report.insert(id, json!({ "totalCost": 1.5 }));
    }
    Json(Value::Object(report)).into_response()
}

async fn package_rate(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    match id.as_str() {
        // Failures without an `error` field
        "500" => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" }))).into_response(),
        "502" => return (StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>").into_response(),
        // Outlasts any client timeout a test sets
        "slow" => tokio::time::sleep(Duration::from_secs(5)).await,
        _ => {}
    }
    if !parse_id(&id).is_some_and(|id| state.lock().packages.contains_key(&id)) {
        return error(StatusCode::NOT_FOUND, "Package doesn't exist");
    }
    Json(json!({
        "BusFactor": 0.5, "BusFactorLatency": 1.0,
        "Correctness": 0.9, "CorrectnessLatency": 2.0,
        "RampUp": 0.75, "RampUpLatency": 3.0,
        "Responsiveness": 0.6, "ResponsivenessLatency": 4.0,
        "LicenseScore": 1.0, "LicenseScoreLatency": 5.0,
        "GoodPinningPractice": 0.25, "GoodPinningPracticeLatency": 6.0,
        "PullRequest": 0.4, "PullRequestLatency": 7.0,
        "NetScore": 0.7, "NetScoreLatency": 28.5,
    }))
    .into_response()
}

async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully." }))
}

async fn get_access(State(state): State<Shared>, Path(user_id): Path<String>) -> Response {
    if user_id == "missing" {
        return error(StatusCode::NOT_FOUND, "User not found.");
    }
    let permissions = state.lock().permissions.get(&user_id).cloned().unwrap_or_else(
        || json!({ "can_download": false, "can_search": true, "can_upload": false }),
    );
    Json(permissions).into_response()
}

async fn set_access(State(state): State<Shared>, Path(user_id): Path<String>, Json(body): Json<Value>) -> Response {
    state.lock().permissions.insert(user_id, body);
    Json(json!({ "message": "Permissions updated successfully." })).into_response()
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(name) = body["name"].as_str() else {
        return error(StatusCode::BAD_REQUEST, "Missing user name.");
    };
    let mut registry = state.lock();
    if registry.users.iter().any(|u| u == name) {
        return error(StatusCode::CONFLICT, "User already exists.");
    }
    registry.users.push(name.to_string());
    Json(json!({ "message": "User registered successfully." })).into_response()
}

async fn create_group(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(name) = body["name"].as_str().filter(|n| !n.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Group name is required.");
    };
    let mut registry = state.lock();
    let id = registry.groups.keys().max().copied().unwrap_or(0) + 1;
    registry.groups.insert(id, name.to_string());
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn list_groups(State(state): State<Shared>) -> Json<Value> {
    let groups: Vec<Value> = state
        .lock()
        .groups
        .iter()
        .map(|(id, name)| json!({ "id": id, "group_name": name }))
        .collect();
    Json(json!(groups))
}

async fn group_users(State(state): State<Shared>, Path(group_id): Path<u64>) -> Response {
    let registry = state.lock();
    if !registry.groups.contains_key(&group_id) {
        return error(StatusCode::NOT_FOUND, "Group not found.");
    }
    let users: Vec<Value> = registry
        .group_users
        .get(&group_id)
        .into_iter()
        .flatten()
        .map(|id| json!({ "id": id, "name": format!("user{id}") }))
        .collect();
    Json(json!(users)).into_response()
}

async fn add_user(State(state): State<Shared>, Path(group_id): Path<u64>, Json(body): Json<Value>) -> Response {
    let mut registry = state.lock();
    if !registry.groups.contains_key(&group_id) {
        return error(StatusCode::NOT_FOUND, "Group not found.");
    }
    let Some(user_id) = body["user_id"].as_u64() else {
        return error(StatusCode::BAD_REQUEST, "Missing user_id.");
    };
    registry.group_users.entry(group_id).or_default().push(user_id);
    Json(json!({ "message": "User added to group successfully." })).into_response()
}

async fn add_package(State(state): State<Shared>, Path(group_id): Path<u64>, Json(body): Json<Value>) -> Response {
    let mut registry = state.lock();
    if !registry.groups.contains_key(&group_id) {
        return error(StatusCode::NOT_FOUND, "Group not found.");
    }
    let Some(package_id) = body["package_id"].as_u64() else {
        return error(StatusCode::BAD_REQUEST, "Missing package_id.");
    };
    registry.group_packages.entry(group_id).or_default().push(package_id);
    Json(json!({ "message": "Package added to group successfully." })).into_response()
}

async fn history(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(id) = body["id"].as_u64() else {
        return error(StatusCode::BAD_REQUEST, "Missing package id.");
    };
    if !state.lock().packages.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "Package doesn't exist");
    }
    Json(json!([
        { "id": 1, "package_id": id, "user_id": 1, "action": "UPLOAD", "action_date": "2024-11-30T12:00:00.000Z" },
        { "id": 2, "package_id": id, "user_id": "2", "action": "DOWNLOAD", "action_date": "2024-12-01 08:30:00" },
    ]))
    .into_response()
}
