use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tabula_cli::{router, AppContext};
use tabula_expr::Limits;
use tabula_synth::{HeuristicBackend, ScriptedBackend, Synthesizer};
use tabula_table::Table;
use tower::ServiceExt;

const ORIGIN: &str = "http://localhost:5500";

fn table() -> Arc<Table> {
    let csv = "region,product,revenue\n\
               North,Widget,100\n\
               South,Gadget,250\n\
               North,Gadget,650\n";
    Arc::new(Table::from_reader(csv.as_bytes()).unwrap())
}

fn app_with(synthesizer: Synthesizer, limits: Limits) -> Router {
    let ctx = AppContext::new(table(), synthesizer, limits, 5);
    router(Arc::new(ctx), ORIGIN).unwrap()
}

fn app(backend: ScriptedBackend) -> Router {
    let synthesizer = Synthesizer::new(Arc::new(backend), Duration::from_secs(30));
    app_with(synthesizer, Limits::default())
}

fn post_query(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn total_of_a_column_is_answered() {
    let backend = ScriptedBackend::new("df['revenue'].sum()");
    let question = "What is the total of column revenue?";
    let (status, body) = send(
        app(backend.clone()),
        post_query(json!({ "query": question }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "query": question, "result": 1000 }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn missing_query_never_reaches_the_model() {
    for raw in [
        r#"{"query": ""}"#,
        r#"{"query": "   "}"#,
        r#"{}"#,
        r#"{"query": 42}"#,
        "not json",
        "",
    ] {
        let backend = ScriptedBackend::new("len(df)");
        let (status, body) = send(app(backend.clone()), post_query(raw)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
        assert_eq!(
            body,
            json!({ "error": "Query string is required.", "kind": "MissingQuery" })
        );
        assert_eq!(backend.calls(), 0);
    }
}

#[tokio::test]
async fn non_whitelisted_method_is_an_evaluation_error() {
    let backend = ScriptedBackend::new("df.to_csv('/etc/passwd')");
    let (status, body) = send(app(backend), post_query(r#"{"query":"export the table"}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "EvaluationError");
    assert!(body["error"].as_str().unwrap().contains("to_csv"));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out() {
    let backend = ScriptedBackend::new("len(df)").with_delay(Duration::from_secs(120));
    let (status, body) = send(app(backend), post_query(r#"{"query":"how many rows?"}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "SynthesisTimeout");
}

#[tokio::test]
async fn provider_failure_hides_detail() {
    let backend = ScriptedBackend::failing("connect error to 10.1.2.3:443");
    let (status, body) = send(app(backend), post_query(r#"{"query":"how many rows?"}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "SynthesisFailed");
    assert!(!body["error"].as_str().unwrap().contains("10.1.2.3"));
}

#[tokio::test]
async fn statement_output_is_an_invalid_expression() {
    let backend = ScriptedBackend::new("import os; os.system('ls')");
    let (status, body) = send(app(backend), post_query(r#"{"query":"list files"}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "InvalidExpression");
}

#[tokio::test]
async fn oversized_answer_is_rejected() {
    let synthesizer = Synthesizer::new(Arc::new(ScriptedBackend::new("df")), Duration::from_secs(30));
    let limits = Limits {
        max_result_cells: 4,
        ..Limits::default()
    };
    let (status, body) = send(
        app_with(synthesizer, limits),
        post_query(r#"{"query":"show everything"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "ResultTooLarge");
}

#[tokio::test]
async fn evaluation_past_its_deadline_is_an_evaluation_error() {
    let synthesizer = Synthesizer::new(
        Arc::new(ScriptedBackend::new("df[df['revenue'] > 0]['revenue'].sum()")),
        Duration::from_secs(30),
    );
    let limits = Limits {
        max_steps: u64::MAX,
        max_duration: Duration::ZERO,
        ..Limits::default()
    };
    let (status, body) = send(
        app_with(synthesizer, limits),
        post_query(r#"{"query":"total revenue"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "EvaluationError");
}

#[tokio::test]
async fn runaway_expression_is_rejected_and_server_keeps_answering() {
    let runaway = format!("df['revenue']{}.sum()", ".abs()".repeat(5_000));
    let (status, body) = send(
        app(ScriptedBackend::new(runaway)),
        post_query(r#"{"query":"total revenue"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "EvaluationError");

    let chain = format!("len(df){}", " + 1".repeat(100_000));
    let (status, _) = send(
        app(ScriptedBackend::new(chain)),
        post_query(r#"{"query":"rows plus a lot"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        app(ScriptedBackend::new("len(df)")),
        post_query(r#"{"query":"how many rows?"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 3);
}

#[tokio::test]
async fn shaped_answers() {
    let cases = [
        (
            "df.groupby('region')['revenue'].sum()",
            json!({ "North": 750, "South": 250 }),
        ),
        (
            "df[df['revenue'] > 200]['product'].tolist()",
            json!(["Gadget", "Gadget"]),
        ),
        (
            "df.nlargest(1, 'revenue')",
            json!([{ "region": "North", "product": "Gadget", "revenue": 650 }]),
        ),
    ];
    for (expression, expected) in cases {
        let (status, body) = send(
            app(ScriptedBackend::new(expression)),
            post_query(r#"{"query":"q"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{expression}");
        assert_eq!(body["result"], expected, "{expression}");
    }
}

#[tokio::test]
async fn heuristic_backend_end_to_end() {
    let synthesizer = Synthesizer::new(Arc::new(HeuristicBackend::new()), Duration::from_secs(30));
    let (status, body) = send(
        app_with(synthesizer, Limits::default()),
        post_query(r#"{"query":"total revenue per region"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({ "North": 750, "South": 250 }));
}

#[tokio::test]
async fn schema_is_stable() {
    let app = app(ScriptedBackend::new("len(df)"));
    let get = || Request::get("/schema").body(Body::empty()).unwrap();
    let (status, first) = send(app.clone(), get()).await;
    let (_, second) = send(app, get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(first["rows"], 3);
    assert_eq!(
        first["columns"],
        json!([
            { "name": "region", "dtype": "object" },
            { "name": "product", "dtype": "object" },
            { "name": "revenue", "dtype": "int64" }
        ])
    );
    assert!(first["preview"].as_str().unwrap().contains("revenue"));
}

#[tokio::test]
async fn health() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(ScriptedBackend::new("len(df)")), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn cors_admits_only_the_configured_origin() {
    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/query")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };
    let app = app(ScriptedBackend::new("len(df)"));

    let allowed = app.clone().oneshot(preflight(ORIGIN)).await.unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ORIGIN
    );

    let denied = app.oneshot(preflight("http://evil.example")).await.unwrap();
    assert!(denied
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
