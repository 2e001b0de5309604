//! End-to-end tests: configuration document in, painted terminal out

use std::sync::Arc;
use std::time::Duration;

use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, MIN_REFRESH_INTERVAL_SECS};
use crate::scheduler::Scheduler;
use crate::tui::testing::buffer_lines;
use crate::tui::{Action, App, FocusCommand, RenderCoordinator};
use crate::widget::{instantiate, WidgetInstance, WidgetRegistry};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn load(doc: &str) -> Config {
    toml::from_str(doc).unwrap()
}

fn app_for(config: &Config) -> (App<TestBackend>, mpsc::UnboundedReceiver<usize>) {
    let set = instantiate(config, &WidgetRegistry::with_builtin()).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(set.instances, config.fetch_timeout(), tx);
    let terminal = Terminal::new(TestBackend::new(60, 6)).unwrap();
    let renderer =
        RenderCoordinator::new(terminal, config.grid.clone(), config.colors.clone()).unwrap();
    (App::new(scheduler, renderer), rx)
}

async fn refresh(app: &App<TestBackend>, rx: &mut mpsc::UnboundedReceiver<usize>, index: usize) {
    app.scheduler().trigger(index);
    let painted = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap();
    assert_eq!(painted, Some(index));
}

fn instance(app: &App<TestBackend>, index: usize) -> &Arc<WidgetInstance> {
    &app.scheduler().instances()[index]
}

fn two_columns(server: &MockServer, since: Option<&str>) -> Config {
    let since = since.map(|s| format!("since = \"{}\"", s)).unwrap_or_default();
    load(&format!(
        r#"
[grid]
columns = [1, 1]
rows = [1]

[widgets.security]
kind = "hibp"
enabled = true
position = {{ top = 0, left = 0, height = 1, width = 1 }}
accounts = ["me@example.com"]
base_url = "{uri}/api/breachedaccount/"
{since}

[widgets.uptime]
kind = "cmdrunner"
enabled = true
position = {{ top = 0, left = 1, height = 1, width = 1 }}
cmd = "true"
"#,
        uri = server.uri(),
        since = since
    ))
}

#[tokio::test]
async fn test_empty_breach_response_renders_clean() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("truncateResponse", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let (mut app, mut rx) = app_for(&two_columns(&server, None));
    assert_eq!(app.scheduler().instances().len(), 2);

    refresh(&app, &mut rx, 0).await;
    app.paint().unwrap();

    let state = instance(&app, 0).snapshot();
    assert!(state.last_error.is_none());
    let statuses = state.statuses.unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].records.is_empty());

    let lines = buffer_lines(app.renderer().terminal().backend().buffer());
    assert!(lines[0].starts_with("┌ security ─"), "got {:?}", lines[0]);
    assert!(!lines[0].contains(" ! "));
    assert!(lines[1].starts_with("│✓ me@example.com no breaches"));
    assert!(lines[0].contains("┌ uptime ─"));
}

#[tokio::test]
async fn test_since_keeps_only_newer_breaches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("truncateResponse", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"Name":"Old","Title":"Old","BreachDate":"2022-01-01"},
                {"Name":"New","Title":"New","BreachDate":"2024-01-01"}
            ]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (app, mut rx) = app_for(&two_columns(&server, Some("2023-01-01")));

    refresh(&app, &mut rx, 0).await;

    let statuses = instance(&app, 0).snapshot().statuses.unwrap();
    let dates: Vec<Option<&str>> = statuses[0].records.iter().map(|r| r.date.as_deref()).collect();
    assert_eq!(dates, vec![Some("2024-01-01")]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_breaches_on_screen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"Name":"Adobe"}]"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mut app, mut rx) = app_for(&two_columns(&server, None));

    refresh(&app, &mut rx, 0).await;
    while instance(&app, 0).is_fetching() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    refresh(&app, &mut rx, 0).await;
    app.paint().unwrap();

    let lines = buffer_lines(app.renderer().terminal().backend().buffer());
    assert!(lines[0].starts_with("┌ security  ! "), "got {:?}", lines[0]);
    assert!(lines[1].starts_with("│✗ me@example.com 1 breach"));
    assert!(lines[2].starts_with("│  Adobe"));
}

#[test]
fn test_non_positive_intervals_are_clamped() {
    let config = load(
        r#"
refresh_interval = 0

[grid]
columns = [1]
rows = [1, 1]

[widgets.inherits]
kind = "cmdrunner"
enabled = true
position = { top = 0, left = 0, height = 1, width = 1 }
cmd = "true"

[widgets.negative]
kind = "cmdrunner"
enabled = true
position = { top = 1, left = 0, height = 1, width = 1 }
refresh_interval = -5
cmd = "true"
"#,
    );

    let set = instantiate(&config, &WidgetRegistry::with_builtin()).unwrap();

    for instance in &set.instances {
        assert_eq!(
            instance.config().refresh_interval,
            Duration::from_secs(MIN_REFRESH_INTERVAL_SECS as u64)
        );
    }
    assert_eq!(set.warnings.len(), 2);
}

#[tokio::test]
async fn test_focus_cycles_through_declared_widgets() {
    let server = MockServer::start().await;
    let (mut app, _rx) = app_for(&two_columns(&server, None));

    assert_eq!(app.focus().state().focused(), Some(0));
    app.handle(Action::Focus(FocusCommand::Previous)).unwrap();
    assert_eq!(app.focus().state().focused(), Some(1));
    app.handle(Action::Focus(FocusCommand::Next)).unwrap();
    assert_eq!(app.focus().state().focused(), Some(0));
    app.handle(Action::Focus(FocusCommand::Right)).unwrap();
    assert_eq!(app.focus().state().focused(), Some(1));
}

#[test]
fn test_out_of_bounds_widget_is_fatal() {
    let config = load(
        r#"
[grid]
columns = [1, 1]
rows = [1]

[widgets.wide]
kind = "cmdrunner"
enabled = true
position = { top = 0, left = 1, height = 1, width = 2 }
cmd = "true"
"#,
    );

    let err = instantiate(&config, &WidgetRegistry::with_builtin()).unwrap_err();

    assert!(err.to_string().contains("'wide'"), "got {}", err);
}
