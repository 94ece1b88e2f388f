//! Player sessions driving real streaming engines through a live relay.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use common::{channel, relay_config, TestHarness};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tvg_core::config::PlayerConfig;
use tvg_player::testing::{CallLog, MockFactory, MockSurface};
use tvg_player::{
    EngineError, EngineEvent, PlaybackStatus, PlayerSession, RelayEndpoint, StreamingEngineFactory,
    SurfaceEvent,
};

/// Drain engine events until the condition holds or a deadline passes.
async fn pump_until(session: &mut PlayerSession, what: &str, cond: impl Fn(&PlayerSession) -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        session.pump();
        if cond(session) {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}, status: {:?}", session.status());
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn fast_player_config() -> PlayerConfig {
    let mut config = tvg_core::Config::default().player;
    config.settle_delay_ms = 100;
    config.retry_delay_ms = 200;
    config
}

fn streaming_session(relay_addr: std::net::SocketAddr) -> PlayerSession {
    let relay = RelayEndpoint::new(&format!("http://{relay_addr}")).unwrap();
    PlayerSession::new(
        Arc::new(StreamingEngineFactory),
        MockSurface::new(CallLog::new()),
        relay,
        fast_player_config(),
    )
}

#[tokio::test]
async fn hls_channels_play_through_the_relay_and_retry_after_loss() {
    // A bare (non-pooled) server: dropping it must actually close the
    // listener, which pooled `MockServer::start()` servers do not do.
    let upstream = MockServer::builder().start().await;
    let playlist = "#EXTM3U\n\
                    #EXT-X-VERSION:3\n\
                    #EXT-X-TARGETDURATION:1\n\
                    #EXT-X-MEDIA-SEQUENCE:0\n\
                    #EXTINF:1,\n\
                    seg0.ts\n\
                    #EXTINF:1,\n\
                    seg1.ts\n";
    Mock::given(method("GET"))
        .and(path("/play/live.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(playlist))
        .mount(&upstream)
        .await;
    for seg in ["/play/seg0.ts", "/play/seg1.ts"] {
        Mock::given(method("GET"))
            .and(path(seg))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x47u8; 188], "video/mp2t"))
            .mount(&upstream)
            .await;
    }

    let (_h, relay_addr) = TestHarness::with_server(relay_config(&["127.0.0.1"], 5)).await;
    let mut session = streaming_session(relay_addr);

    // The engine fetches the manifest through the relay, then follows the
    // rewritten segment links back through it.
    session.assign_channel(channel(
        "live-1",
        "Live One",
        &format!("{}/play/live.m3u8", upstream.uri()),
    ));
    assert_eq!(*session.status(), PlaybackStatus::Loading);

    pump_until(&mut session, "playback to start", |s| {
        *s.status() == PlaybackStatus::Playing
    })
    .await;

    // Losing the upstream schedules a reload instead of surfacing an error.
    drop(upstream);
    pump_until(&mut session, "a scheduled retry", |s| s.retry_pending()).await;
    assert!(!matches!(session.status(), PlaybackStatus::Errored { .. }));

    // The reload also fails; the session keeps retrying, still without
    // entering the error state.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(session.poll_retry(Instant::now()));
    assert_eq!(*session.status(), PlaybackStatus::Loading);

    pump_until(&mut session, "the next scheduled retry", |s| {
        s.retry_pending()
    })
    .await;
    assert!(!matches!(session.status(), PlaybackStatus::Errored { .. }));
}

#[tokio::test]
async fn continuous_channels_play_to_the_end_through_the_relay() {
    let upstream = MockServer::start().await;
    let body: Vec<u8> = std::iter::repeat([0x47u8; 188])
        .take(64)
        .flatten()
        .collect();
    Mock::given(method("GET"))
        .and(path("/live/feed.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "video/mp2t"))
        .mount(&upstream)
        .await;

    let (_h, relay_addr) = TestHarness::with_server(relay_config(&["127.0.0.1"], 5)).await;
    let mut session = streaming_session(relay_addr);

    session.assign_channel(channel(
        "feed-1",
        "Feed One",
        &format!("{}/live/feed.ts", upstream.uri()),
    ));

    // A finite source settles, plays, and ends; Paused is only reachable
    // from active playback, so landing there proves the whole chain ran.
    pump_until(&mut session, "the stream to finish", |s| {
        *s.status() == PlaybackStatus::Paused
    })
    .await;
}

#[test]
fn an_unreachable_relay_is_a_connection_error() {
    tokio_test::block_on(async {
        let relay = RelayEndpoint::new("http://127.0.0.1:9").unwrap();
        let mut session = PlayerSession::new(
            Arc::new(StreamingEngineFactory),
            MockSurface::new(CallLog::new()),
            relay,
            fast_player_config(),
        );

        session.assign_channel(channel(
            "dead-1",
            "Dead One",
            "http://127.0.0.1:9/live/dead.ts",
        ));

        pump_until(&mut session, "the connection error", |s| {
            matches!(s.status(), PlaybackStatus::Errored { .. })
        })
        .await;

        assert_matches!(
            session.status(),
            PlaybackStatus::Errored { message } if message.contains("connection")
        );
    });
}

#[test]
fn two_sessions_operate_independently() {
    let relay = || RelayEndpoint::new("http://127.0.0.1:8402").unwrap();

    let log_a = CallLog::new();
    let factory_a = MockFactory::new(log_a.clone());
    let mut a = PlayerSession::new(
        factory_a.clone(),
        MockSurface::new(log_a.clone()),
        relay(),
        fast_player_config(),
    );

    let log_b = CallLog::new();
    let factory_b = MockFactory::new(log_b.clone());
    let mut b = PlayerSession::new(
        factory_b.clone(),
        MockSurface::new(log_b.clone()),
        relay(),
        fast_player_config(),
    );

    a.assign_channel(channel("a", "A", "http://origin.example/live/a.ts"));
    factory_b.fail_attach_with(EngineError::other("engine exploded"));
    b.assign_channel(channel("b", "B", "http://origin.example/live/b.ts"));

    // B's failure never touches A.
    assert_matches!(b.status(), PlaybackStatus::Errored { .. });
    assert_eq!(*a.status(), PlaybackStatus::Loading);
    assert_eq!(log_b.count_of("engine[0].dispose"), 1);
    assert_eq!(log_a.count_of("engine[0].dispose"), 0);

    factory_a.last_events().unwrap().send(EngineEvent::Settled).unwrap();
    a.pump();
    assert_eq!(*a.status(), PlaybackStatus::Playing);

    // Surface events follow the same isolation: B is errored and ignores
    // them, A reacts.
    a.handle_surface_event(SurfaceEvent::Waiting);
    b.handle_surface_event(SurfaceEvent::Waiting);
    assert_eq!(*a.status(), PlaybackStatus::Buffering);
    assert_matches!(b.status(), PlaybackStatus::Errored { .. });

    // Engines fetch through the relay, not the raw source.
    let built = factory_a.built();
    assert!(built[0].source_url.starts_with("http://127.0.0.1:8402/stream?url="));
}
