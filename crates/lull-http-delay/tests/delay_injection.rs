//! End-to-end tests for the sleep_ms delay layer: configuration load through
//! the rewrite phase, timing floors, inheritance, and the tolerance policy
//! for bad request-time values.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_test::traced_test;

use lull_http_delay::config::Config;
use lull_http_delay::handler;
use lull_http_delay::pipeline::{PhaseOutcome, Pipeline};
use lull_http_delay::template::RequestData;

fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    let config: Config = serde_yaml::from_str(yaml).expect("config should parse");
    config.validate().expect("config should validate");
    let compiled = config.compile().expect("config should compile");

    let mut pipeline = Pipeline::new();
    handler::init(&mut pipeline, compiled);
    pipeline
}

fn request(path: &str) -> RequestData {
    RequestData::new("GET", path, None, &hyper::HeaderMap::new(), None)
}

fn request_with_header(name: &'static str, value: &'static str) -> RequestData {
    let mut headers = hyper::HeaderMap::new();
    headers.insert(
        hyper::header::HeaderName::from_static(name),
        hyper::header::HeaderValue::from_static(value),
    );
    RequestData::new("GET", "/", None, &headers, None)
}

#[tokio::test]
#[traced_test]
async fn literal_delay_pauses_and_brackets_with_two_log_events() {
    let pipeline = pipeline_from_yaml("sleep_ms: 40");

    let start = Instant::now();
    let outcome = pipeline.run_rewrite(&request("/")).await;
    assert_eq!(outcome, PhaseOutcome::Continue);
    assert!(start.elapsed() >= Duration::from_millis(40));

    logs_assert(|lines: &[&str]| {
        let sleeping: Vec<&&str> = lines
            .iter()
            .filter(|l| l.contains("sleeping for 40 ms"))
            .collect();
        if sleeping.len() != 2 {
            return Err(format!("expected 2 sleep log events, got {}", sleeping.len()));
        }
        if !sleeping[1].contains("finished sleeping for 40 ms") {
            return Err("second event should be the completion log".to_string());
        }
        Ok(())
    });
}

#[tokio::test]
#[traced_test]
async fn zero_delay_never_sleeps_and_never_logs_sleep_events() {
    let pipeline = pipeline_from_yaml("sleep_ms: 0");

    let start = Instant::now();
    let outcome = pipeline.run_rewrite(&request("/")).await;
    assert_eq!(outcome, PhaseOutcome::Continue);
    assert!(start.elapsed() < Duration::from_millis(20));

    logs_assert(|lines: &[&str]| {
        if lines.iter().any(|l| l.contains("sleeping")) {
            return Err("zero delay must not emit sleep log events".to_string());
        }
        Ok(())
    });
}

#[tokio::test]
async fn unset_scopes_inherit_transitively() {
    // Neither the server nor the route declares sleep_ms: the global 50
    // applies to both through the chain.
    let pipeline = pipeline_from_yaml(
        r#"
sleep_ms: 50
servers:
  - name: api
    routes:
      - path:
          prefix: "/reports"
"#,
    );

    for path in ["/reports/daily", "/elsewhere"] {
        let start = Instant::now();
        let outcome = pipeline.run_rewrite(&request(path)).await;
        assert_eq!(outcome, PhaseOutcome::Continue);
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "{path} should inherit the global delay"
        );
    }
}

#[tokio::test]
async fn child_declaration_wins_over_parent() {
    let pipeline = pipeline_from_yaml(
        r#"
sleep_ms: 200
servers:
  - name: api
    routes:
      - path:
          exact: "/fast"
        sleep_ms: 10
"#,
    );

    let start = Instant::now();
    pipeline.run_rewrite(&request("/fast")).await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(10));
    assert!(
        elapsed < Duration::from_millis(150),
        "child value should shadow the parent's 200 ms"
    );
}

#[tokio::test]
async fn negative_literal_fails_configuration_load() {
    let config: Config = serde_yaml::from_str("sleep_ms: -5").unwrap();
    assert!(config.compile().is_err());
}

#[tokio::test]
#[traced_test]
async fn bad_dynamic_value_is_logged_and_request_continues() {
    let pipeline = pipeline_from_yaml(r#"sleep_ms: "${request.headers.x-sleep-ms}""#);

    for req in [
        request("/"),
        request_with_header("x-sleep-ms", "-5"),
        request_with_header("x-sleep-ms", "later"),
    ] {
        let start = Instant::now();
        let outcome = pipeline.run_rewrite(&req).await;
        assert_eq!(outcome, PhaseOutcome::Continue);
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    assert!(logs_contain("invalid sleep_ms value"));
}

#[tokio::test]
async fn dynamic_value_resolves_per_request() {
    let pipeline = pipeline_from_yaml(r#"sleep_ms: "${request.headers.x-sleep-ms}""#);

    let start = Instant::now();
    let outcome = pipeline
        .run_rewrite(&request_with_header("x-sleep-ms", "30"))
        .await;
    assert_eq!(outcome, PhaseOutcome::Continue);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn concurrent_requests_are_delayed_independently() {
    let pipeline = Arc::new(pipeline_from_yaml(
        r#"
servers:
  - name: api
    routes:
      - path:
          exact: "/fast"
        sleep_ms: 10
      - path:
          exact: "/slow"
        sleep_ms: 200
"#,
    ));

    let fast = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            let start = Instant::now();
            pipeline.run_rewrite(&request("/fast")).await;
            start.elapsed()
        }
    });
    let slow = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            let start = Instant::now();
            pipeline.run_rewrite(&request("/slow")).await;
            start.elapsed()
        }
    });

    let (fast_elapsed, slow_elapsed) = (fast.await.unwrap(), slow.await.unwrap());
    assert!(fast_elapsed >= Duration::from_millis(10));
    assert!(
        fast_elapsed < Duration::from_millis(150),
        "fast request must not be held back by the slow one"
    );
    assert!(slow_elapsed >= Duration::from_millis(200));
}

#[tokio::test]
async fn config_loads_from_file() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "sleep_ms: 25\nservers:\n  - name: api\n    sleep_ms: 10\n"
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let compiled = config.compile().unwrap();
    assert_eq!(compiled.scopes.len(), 2);
}
