use client::time::TimeSource;
use client::verification::{
    CodePhase, Destination, Phase, SESSION_EXPIRED_MESSAGE,
    VerificationPoller, VerificationTimings,
};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::mock::{
    MockVerificationBackend, RecordingNavigator, Scripted,
};
use tokio::time::{Instant, sleep};

struct Harness {
    backend: MockVerificationBackend,
    navigator: RecordingNavigator,
    time_source: TimeSource,
}

impl Harness {
    fn new(backend: MockVerificationBackend) -> Self {
        Self {
            backend,
            navigator: RecordingNavigator::new(),
            time_source: TimeSource::starting_at(
                "2025-01-01T00:00:00Z".parse().unwrap(),
            ),
        }
    }

    fn now(&self) -> i64 {
        self.time_source.epoch_seconds()
    }

    fn poller(&self) -> VerificationPoller {
        VerificationPoller::new(
            Arc::new(self.backend.clone()),
            Arc::new(self.navigator.clone()),
            self.time_source.clone(),
            VerificationTimings::default(),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn expired_code_is_refreshed_exactly_once() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness
        .backend
        .push_code("OLD111", now - 1, Duration::ZERO)
        // slower than several ticks
        .push_code("NEW222", now + 300, Duration::from_secs(3));

    let poller = harness.poller();
    poller.start();

    sleep(Duration::from_millis(2500)).await;
    let view = poller.view();
    assert_eq!(view.code_phase, CodePhase::Expired);
    assert!(view.code_refreshing);
    assert_eq!(harness.backend.code_calls(), 2);

    sleep(Duration::from_secs(10)).await;
    let view = poller.view();
    assert_eq!(harness.backend.code_calls(), 2);
    assert_eq!(view.window.unwrap().code, "NEW222");
    assert_eq!(view.code_phase, CodePhase::Active);
    assert!(!view.code_refreshing);
    assert_eq!(view.code_error, None);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_refresh_is_not_retried_every_tick() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness.backend.push_code("OLD111", now + 2, Duration::ZERO);
    harness
        .backend
        .push_code_error("code service down", Duration::ZERO);

    let poller = harness.poller();
    poller.start();

    sleep(Duration::from_secs(30)).await;
    let view = poller.view();
    assert_eq!(harness.backend.code_calls(), 2);
    assert_eq!(view.code_error.as_deref(), Some("code service down"));
    assert_eq!(view.code_phase, CodePhase::Expired);
    assert_eq!(view.window.unwrap().code, "OLD111");
    assert_eq!(view.seconds_remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn verified_stops_polling_and_redirects_once() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness.backend.push_code("ABC123", now + 300, Duration::ZERO);
    harness
        .backend
        .push_status(Scripted::ok("pending"))
        .push_status(Scripted::ok("verified"));

    let started = Instant::now();
    let poller = harness.poller();
    poller.start();

    // second poll lands at 12s
    sleep(Duration::from_millis(13_500)).await;
    let view = poller.view();
    assert_eq!(view.phase, Phase::Verified);
    assert_eq!(view.redirect_countdown, Some(3));
    assert!(harness.navigator.visits().is_empty());

    sleep(Duration::from_secs(60)).await;
    let visits = harness.navigator.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].0, Destination::Dashboard);
    let redirected_after = visits[0].1 - started;
    assert!(redirected_after >= Duration::from_millis(14_500));
    assert!(redirected_after < Duration::from_millis(14_600));

    assert_eq!(harness.backend.status_calls(), 2);
    assert_eq!(poller.view().redirect_countdown, Some(0));
}

#[tokio::test(start_paused = true)]
async fn status_errors_do_not_stop_polling() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness.backend.push_code("ABC123", now + 300, Duration::ZERO);
    harness
        .backend
        .push_status(Scripted::err("status unavailable"))
        .push_status(Scripted::ok("pending"));

    let poller = harness.poller();
    poller.start();

    sleep(Duration::from_secs(1)).await;
    let view = poller.view();
    assert_eq!(view.phase, Phase::PollingStatus);
    assert_eq!(view.status_error.as_deref(), Some("status unavailable"));

    sleep(Duration::from_secs(12)).await;
    assert_eq!(poller.view().status_error, None);
    assert_eq!(harness.backend.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn session_failure_sends_user_to_login() {
    let harness = Harness::new(
        MockVerificationBackend::new().with_session_error("unauthorized"),
    );

    let poller = harness.poller();
    poller.start();

    sleep(Duration::from_secs(30)).await;
    let view = poller.view();
    assert_eq!(view.phase, Phase::SessionExpired);
    assert_eq!(view.session_error.as_deref(), Some(SESSION_EXPIRED_MESSAGE));
    assert_eq!(harness.navigator.destinations(), vec![Destination::Login]);
    assert_eq!(harness.backend.status_calls(), 0);
    assert_eq!(harness.backend.code_calls(), 0);
    assert!(!poller.refresh_code());
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_shares_the_in_flight_flag() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness
        .backend
        .push_code("FIRST1", now + 300, Duration::ZERO)
        .push_code("SECOND", now + 600, Duration::from_secs(5));

    let poller = harness.poller();
    // nothing to refresh for before the session is known
    assert!(!poller.refresh_code());
    poller.start();

    sleep(Duration::from_secs(1)).await;
    assert!(poller.refresh_code());
    assert!(!poller.refresh_code());
    assert!(poller.view().code_refreshing);

    sleep(Duration::from_secs(6)).await;
    let view = poller.view();
    assert_eq!(harness.backend.code_calls(), 2);
    assert_eq!(view.window.unwrap().code, "SECOND");
    assert!(!view.code_refreshing);

    // free again; the script is exhausted so this one fails
    assert!(poller.refresh_code());
    sleep(Duration::from_secs(1)).await;
    let view = poller.view();
    assert_eq!(harness.backend.code_calls(), 3);
    assert_eq!(view.code_error.as_deref(), Some("no code scripted"));
    assert_eq!(view.window.unwrap().code, "SECOND");
}

#[tokio::test(start_paused = true)]
async fn stop_halts_every_timer() {
    let harness =
        Harness::new(MockVerificationBackend::new().with_session("player-1"));
    let now = harness.now();
    harness.backend.push_code("ABC123", now + 300, Duration::ZERO);
    harness.backend.push_status(Scripted::ok("pending"));

    let poller = harness.poller();
    let mut rx = poller.subscribe();
    poller.start();
    sleep(Duration::from_secs(1)).await;

    poller.stop();
    rx.borrow_and_update();
    let status_calls = harness.backend.status_calls();

    sleep(Duration::from_secs(120)).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(harness.backend.status_calls(), status_calls);
    assert_eq!(harness.backend.code_calls(), 1);
    assert!(harness.navigator.visits().is_empty());
    assert!(!poller.refresh_code());
}

#[tokio::test]
async fn http_backend_reads_session_and_game_api() -> anyhow::Result<()> {
    use client::verification::{HttpVerificationBackend, VerificationBackend};
    use payloads::{GameClient, SubjectId};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let app = test_helpers::spawn_app().await;
    app.sign_in_as("player-7", false).await?;

    let game_api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/player-7/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "verified"})),
        )
        .expect(1)
        .mount(&game_api)
        .await;

    let backend = HttpVerificationBackend {
        gateway: app.client.clone(),
        game: GameClient::new(game_api.uri()),
    };
    // each poller task holds its own handle
    let shared = backend.clone();

    let user = backend.session_user().await?;
    assert_eq!(user.sub, SubjectId("player-7".into()));
    let status = shared.user_status(&user.sub).await?;
    assert!(status.is_verified());
    Ok(())
}
