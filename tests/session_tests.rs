// Integration tests for the session lifecycle
//
// These tests drive a real SessionManager against the loopback transport
// under paused time, so backoff delays and frame intervals are exact.

mod common;

use anyhow::Result;
use common::{Harness, ScriptedCamera};
use lookout_client::capture::{FacingMode, StillImageSource, VideoFrame, VideoSource};
use lookout_client::error::{ConnectError, CredentialError, SessionClosed};
use lookout_client::location::LocationSample;
use lookout_client::session::SessionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn refused() -> Result<(), ConnectError> {
    Err(ConnectError::new("connection refused"))
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_ready() -> Result<()> {
    let mut h = Harness::new();
    h.transport.script_connect(refused());
    h.transport.script_connect(refused());

    let started = Instant::now();
    h.handle.start().await?;
    let stats = h.wait_for_state(SessionState::Ready).await;

    // 1s after the first failure, 2s after the second
    assert_eq!(started.elapsed(), Duration::from_millis(3000));
    assert_eq!(stats.attempt, 0);
    assert_eq!(stats.retry_delay_ms, None);
    assert_eq!(h.transport.connect_attempts(), 3);

    use SessionState::*;
    assert_eq!(
        h.states_seen(),
        vec![Connecting, Retrying, Connecting, Retrying, Connecting, Ready]
    );

    // Fresh identity per attempt
    let calls = h.issuer.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(room, _)| room == "lookout-room"));
    assert_ne!(calls[0].1, calls[1].1);
    assert_ne!(calls[1].1, calls[2].1);

    assert!(h
        .announcer
        .spoken()
        .contains(&"LookOut is ready".to_string()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_five_failures_reach_failed_until_reconnect() -> Result<()> {
    let mut h = Harness::new();
    for _ in 0..5 {
        h.transport.script_connect(refused());
    }

    h.handle.start().await?;
    let stats = h.wait_for_state(SessionState::Failed).await;
    assert_eq!(stats.status, "Connection failed. Please reconnect.");
    assert_eq!(h.transport.connect_attempts(), 5);
    assert!(h.announcer.spoken().contains(
        &"Connection lost. Please make sure LookOut is running and reconnect.".to_string()
    ));

    let states = h.states_seen();
    assert_eq!(states.last(), Some(&SessionState::Failed));
    assert_eq!(
        states.iter().filter(|s| **s == SessionState::Retrying).count(),
        4
    );

    // No automatic retry from Failed
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.connect_attempts(), 5);
    assert_eq!(h.handle.stats().state, SessionState::Failed);

    h.handle.reconnect().await?;
    let stats = h.wait_for_state(SessionState::Ready).await;
    assert_eq!(stats.attempt, 0);
    assert_eq!(h.transport.connect_attempts(), 6);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retry_hint_appears_after_three_failures() -> Result<()> {
    let h = Harness::new();
    for _ in 0..3 {
        h.transport.script_connect(refused());
    }

    h.handle.start().await?;
    let stats = h
        .wait_for(|s| s.status.contains("make sure LookOut is running"))
        .await;
    assert_eq!(stats.state, SessionState::Retrying);
    assert_eq!(stats.retry_delay_ms, Some(4000));

    h.wait_for_state(SessionState::Ready).await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_credential_failure_retries_without_joining() -> Result<()> {
    let h = Harness::new();
    h.issuer
        .fail_next(CredentialError::Unavailable("token service down".into()));

    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;

    assert_eq!(h.issuer.calls().len(), 2);
    assert_eq!(h.transport.connect_attempts(), 1);
    let credential = h.transport.last_credential().expect("joined with a credential");
    assert_eq!(credential.identity, h.issuer.calls()[1].1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() -> Result<()> {
    let h = Harness::new();
    h.handle.start().await?;
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;
    h.handle.start().await?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.transport.connect_attempts(), 1);
    assert_eq!(h.handle.stats().state, SessionState::Ready);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_frames_published_only_while_ready() -> Result<()> {
    let h = Harness::new();
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;

    let stats = h.wait_for(|s| s.frames_published >= 2).await;
    assert_eq!(stats.state, SessionState::Ready);

    let frames = h.transport.published_on("camera-frame");
    assert!(frames.len() >= 2);
    assert!(frames[0].payload.starts_with(&[0xFF, 0xD8]));

    // Drop, then keep failing until Failed
    for _ in 0..5 {
        h.transport.script_connect(refused());
    }
    h.transport.drop_session("network lost").await;
    h.wait_for(|s| s.state != SessionState::Ready).await;
    let frames_at_drop = h.transport.published_on("camera-frame").len();

    h.wait_for_state(SessionState::Failed).await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.transport.published_on("camera-frame").len(), frames_at_drop);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_first_frame_one_interval_after_ready() -> Result<()> {
    let h = Harness::new();
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;
    let ready_at = Instant::now();

    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert!(h.transport.published_on("camera-frame").is_empty());

    h.wait_for(|s| s.frames_published >= 1).await;
    assert!(ready_at.elapsed() >= Duration::from_millis(2000));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_last_known_location_published_on_ready() -> Result<()> {
    let h = Harness::new();
    h.locations.send(LocationSample::new(40.0, -74.0)).await?;
    h.locations.send(LocationSample::new(40.7128, -74.006)).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Nothing goes out before the session is up
    assert!(h.transport.published().is_empty());

    h.handle.start().await?;
    h.wait_for(|s| s.locations_published >= 1).await;

    let sent = h.transport.published_on("user-location");
    assert_eq!(sent.len(), 1);
    let json: serde_json::Value = serde_json::from_slice(&sent[0].payload)?;
    assert_eq!(json["type"], "location");
    assert_eq!(json["data"]["lat"], 40.7128);
    assert_eq!(json["data"]["lng"], -74.006);

    // Updates while ready go out immediately
    h.locations.send(LocationSample::new(40.75, -73.99)).await?;
    h.wait_for(|s| s.locations_published >= 2).await;
    assert_eq!(h.transport.published_on("user-location").len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_location_during_retry_is_not_published() -> Result<()> {
    let h = Harness::new();
    h.transport.script_connect(refused());

    h.handle.start().await?;
    h.wait_for_state(SessionState::Retrying).await;
    h.locations.send(LocationSample::new(1.0, 2.0)).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.transport.published_on("user-location").is_empty());

    h.wait_for(|s| s.locations_published >= 1).await;
    assert_eq!(h.transport.published_on("user-location").len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_publish_failures_do_not_change_state() -> Result<()> {
    let h = Harness::new();
    h.transport.fail_publishes(2);

    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;

    let stats = h.wait_for(|s| s.publish_failures >= 2).await;
    assert_eq!(stats.state, SessionState::Ready);

    let stats = h.wait_for(|s| s.frames_published >= 1).await;
    assert_eq!(stats.state, SessionState::Ready);
    assert_eq!(h.transport.connect_attempts(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_microphone_enabled_once_ready() -> Result<()> {
    let h = Harness::new();
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.transport.microphone_enabled());
    assert_eq!(h.handle.stats().capture_error, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_microphone_failure_is_not_fatal() -> Result<()> {
    let h = Harness::new();
    h.transport.fail_microphone("permission denied");

    h.handle.start().await?;
    let stats = h.wait_for(|s| s.capture_error.is_some()).await;
    assert_eq!(stats.state, SessionState::Ready);
    assert_eq!(
        stats.capture_error.as_deref(),
        Some("Unable to access microphone")
    );
    assert!(h.announcer.spoken().contains(
        &"Unable to access microphone. Please grant microphone permissions.".to_string()
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_camera_denied_shows_banner_and_session_continues() -> Result<()> {
    let camera = Arc::new(ScriptedCamera::denied());
    let h = Harness::with_camera(camera.clone());

    let stats = h.wait_for(|s| s.capture_error.is_some()).await;
    assert_eq!(stats.capture_error.as_deref(), Some("Unable to access camera"));
    assert!(h.announcer.spoken().contains(
        &"Unable to access camera. Please grant camera permissions.".to_string()
    ));

    // Released again after the failed start
    assert_eq!(camera.calls(), vec!["stop", "start:back", "stop"]);

    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;

    // Ticks fire but there is nothing to send
    let stats = h.wait_for(|s| s.frames_skipped >= 2).await;
    assert_eq!(stats.frames_published, 0);
    assert!(h.transport.published_on("camera-frame").is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flip_camera_switches_facing() -> Result<()> {
    let camera = Arc::new(StillImageSource::from_frame(VideoFrame::solid(
        4,
        4,
        [0, 0, 0],
    )));
    let h = Harness::with_camera(camera.clone());

    h.handle.flip_camera().await?;
    let stats = h.wait_for(|s| s.facing == FacingMode::User).await;
    assert_eq!(stats.capture_error, None);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.facing(), Some(FacingMode::User));
    assert!(h
        .announcer
        .spoken()
        .contains(&"Switching to front camera".to_string()));

    h.handle.flip_camera().await?;
    h.wait_for(|s| s.facing == FacingMode::Environment).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.facing(), Some(FacingMode::Environment));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flip_releases_camera_before_reopening() -> Result<()> {
    let camera = Arc::new(ScriptedCamera::new());
    let h = Harness::with_camera(camera.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.calls(), vec!["stop", "start:back"]);

    h.handle.flip_camera().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        camera.calls(),
        vec!["stop", "start:back", "stop", "start:front"]
    );
    assert!(camera.is_capturing());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_drop_handled_while_camera_restarts() -> Result<()> {
    // Reopening after a flip takes 30s
    let camera = Arc::new(ScriptedCamera::slow_from(2, Duration::from_secs(30)));
    let mut h = Harness::with_camera(camera.clone());

    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;
    h.states_seen();

    h.handle.flip_camera().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.calls().last().map(String::as_str), Some("start:front"));

    let dropped_at = Instant::now();
    h.transport.drop_session("network lost").await;
    h.wait_for(|s| s.state != SessionState::Ready).await;
    assert!(dropped_at.elapsed() < Duration::from_secs(1));
    assert_eq!(
        h.states_seen().first(),
        Some(&SessionState::Disconnected)
    );

    // The session recovers while the camera is still opening
    h.wait_for_state(SessionState::Ready).await;
    assert!(dropped_at.elapsed() < Duration::from_secs(30));
    assert!(!camera.is_capturing());

    h.wait_for(|_| camera.is_capturing()).await;
    assert_eq!(h.handle.stats().capture_error, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_superseded_camera_requests_are_skipped() -> Result<()> {
    let camera = Arc::new(ScriptedCamera::slow_from(1, Duration::from_secs(5)));
    let h = Harness::with_camera(camera.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Both flips queue up behind the initial, still opening, camera
    h.handle.flip_camera().await?;
    h.handle.flip_camera().await?;
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(
        camera.calls(),
        vec!["stop", "start:back", "stop", "start:back"]
    );
    assert_eq!(h.handle.stats().facing, FacingMode::Environment);
    assert_eq!(
        h.announcer.spoken(),
        vec!["Switching to front camera", "Switching to back camera"]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_session() -> Result<()> {
    let camera = Arc::new(ScriptedCamera::new());
    let h = Harness::with_camera(camera.clone());
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;
    assert!(h.transport.is_connected());

    h.handle.shutdown();
    h.task.await?;

    assert!(!h.transport.is_connected());
    assert!(!camera.is_capturing());
    assert_eq!(camera.calls().last().map(String::as_str), Some("stop"));
    assert_eq!(h.handle.stats().status, "Stopped");
    assert_eq!(h.handle.start().await, Err(SessionClosed));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcript_routes_speakers_and_ignores_noise() -> Result<()> {
    use lookout_client::transcript::Speaker;
    use lookout_client::transport::{TranscriptionSegment, TransportEvent};

    let h = Harness::new();
    h.handle.start().await?;
    h.wait_for_state(SessionState::Ready).await;

    h.transport
        .inject(TransportEvent::TranscriptionReceived {
            segments: vec![TranscriptionSegment::new("What is in front of me?")],
            participant: Some("user-1a2b3c4d".into()),
        })
        .await;
    h.transport
        .inject(TransportEvent::TranscriptionReceived {
            segments: vec![TranscriptionSegment::new("A crosswalk, the light is red.")],
            participant: Some("agent-AJ_xyz".into()),
        })
        .await;

    // Unparseable or unknown payloads change nothing
    h.transport
        .inject(TransportEvent::DataReceived {
            payload: b"not json".to_vec(),
            participant: Some("agent-AJ_xyz".into()),
            topic: Some("user-location".into()),
        })
        .await;
    h.transport
        .inject(TransportEvent::DataReceived {
            payload: br#"{"type":"mystery","value":1}"#.to_vec(),
            participant: None,
            topic: None,
        })
        .await;
    h.transport
        .inject(TransportEvent::TranscriptionReceived {
            segments: vec![TranscriptionSegment::new("   ")],
            participant: Some("agent-AJ_xyz".into()),
        })
        .await;
    h.transport
        .inject(TransportEvent::DataReceived {
            payload: br#"{"type":"agent-speech","text":"Wait for the green light."}"#.to_vec(),
            participant: Some("agent-AJ_xyz".into()),
            topic: None,
        })
        .await;

    let stats = h.wait_for(|s| s.transcript_entries == 3).await;
    assert_eq!(stats.state, SessionState::Ready);

    let transcript = h.handle.transcript();
    let tagged: Vec<(Speaker, &str)> = transcript
        .iter()
        .map(|e| (e.speaker, e.text.as_str()))
        .collect();
    assert_eq!(
        tagged,
        vec![
            (Speaker::User, "What is in front of me?"),
            (Speaker::Agent, "A crosswalk, the light is red."),
            (Speaker::Agent, "Wait for the green light."),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcript_keeps_five_most_recent() -> Result<()> {
    use lookout_client::transport::{TranscriptionSegment, TransportEvent};

    let h = Harness::new();
    let segments = (1..=7)
        .map(|i| TranscriptionSegment::new(format!("line {}", i)))
        .collect();
    h.transport
        .inject(TransportEvent::TranscriptionReceived {
            segments,
            participant: Some("agent-lookout".into()),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let texts: Vec<String> = h.handle.transcript().into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["line 3", "line 4", "line 5", "line 6", "line 7"]);
    assert_eq!(h.handle.stats().transcript_entries, 5);
    Ok(())
}
