//! Integration tests for exec create and the upgrade handshake.

mod common;

use common::{running_engine, CONTAINER};
use podlink::exec::frame::StreamKind;
use podlink::{Attachment, ExecConfig, ExecMode, PodlinkError, SessionState};
use podlink_test_utils::{write_frame, UpgradeBehavior};
use serde_json::json;
use tokio::io::AsyncReadExt;

// ============================================================================
// EXEC CREATE
// ============================================================================

#[tokio::test]
async fn create_registers_session_and_sends_full_descriptor() {
    let ctx = running_engine();
    let config = ExecConfig::new("echo").arg("test").detach(true);

    let exec_id = ctx.create(&config).await;
    let session = ctx.client.registry().get(&exec_id).unwrap();
    assert_eq!(session.state, SessionState::Created);
    assert_eq!(session.container, CONTAINER);
    assert_eq!(session.mode, ExecMode::piped(true));

    // Every attach boolean must reach the wire or the engine hangs the
    // started process.
    let body = ctx.engine.last_exec_body().unwrap();
    assert_eq!(body["Cmd"], json!(["echo", "test"]));
    assert_eq!(body["Detach"], json!(true));
    assert_eq!(body["Tty"], json!(false));
    for key in ["AttachStdin", "AttachStdout", "AttachStderr"] {
        assert_eq!(body[key], json!(true), "{key} missing or false");
    }
}

#[tokio::test]
async fn create_against_missing_container_surfaces_engine_error() {
    let ctx = running_engine();
    let err = ctx
        .client
        .create("ghost", &ExecConfig::new("true"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodlinkError::Engine { status: 404, .. }));
}

// ============================================================================
// SCENARIO A: INTERACTIVE NON-TTY ATTACH
// ============================================================================

#[tokio::test]
async fn scenario_a_interactive_echo() {
    let ctx = running_engine();
    let config = ExecConfig::new("sh");
    let (exec_id, mut stream, mut peer) = ctx.attach_interactive(&config).await;

    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Attached
    );

    // Stdin is raw bytes, no framing.
    stream.write(b"echo test\n").await.unwrap();
    let mut sent = [0u8; 10];
    peer.read_exact(&mut sent).await.unwrap();
    assert_eq!(&sent, b"echo test\n");

    // Peer answers with a framed stdout chunk, then closes.
    write_frame(&mut peer, StreamKind::Stdout, b"test\n").await;
    drop(peer);

    let mut stdout = stream.stdout().unwrap();
    let mut stderr = stream.stderr().unwrap();
    assert_eq!(stdout.read().await.unwrap().as_deref(), Some(b"test\n".as_slice()));
    assert_eq!(stdout.read().await.unwrap(), None);
    assert_eq!(stderr.read().await.unwrap(), None);

    stream.close().await.unwrap();
    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Closed
    );
}

// ============================================================================
// SCENARIO B: DETACHED EXEC
// ============================================================================

#[tokio::test]
async fn scenario_b_detach_releases_channel_immediately() {
    let ctx = running_engine();
    let config = ExecConfig::new("sleep").arg("60").detach(true);

    let exec_id = ctx.create(&config).await;
    let attachment = ctx.client.attach(&exec_id, config.mode()).await.unwrap();
    assert!(matches!(attachment, Attachment::Detached));

    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Detached
    );

    let body = ctx.engine.last_upgrade_body().unwrap();
    assert_eq!(body, json!({ "Detach": true, "Tty": false }));
}

// ============================================================================
// SCENARIO C: LIFECYCLE GUARD
// ============================================================================

#[tokio::test]
async fn scenario_c_stopped_container_never_reaches_the_wire() {
    let ctx = running_engine();
    let config = ExecConfig::new("true");
    let exec_id = ctx.create(&config).await;

    ctx.engine.set_container_status(CONTAINER, "stopped");

    let err = ctx.client.attach(&exec_id, config.mode()).await.unwrap_err();
    match err {
        PodlinkError::ContainerNotRunning { container, status } => {
            assert_eq!(container, CONTAINER);
            assert_eq!(status.as_str(), "stopped");
        }
        other => panic!("expected ContainerNotRunning, got {other:?}"),
    }

    assert_eq!(ctx.engine.upgrade_calls(), 0);
    // The guard is advisory; the session is still attachable once the
    // container comes back.
    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Created
    );
}

// ============================================================================
// SCENARIO D: STRUCTURED REJECTION
// ============================================================================

#[tokio::test]
async fn scenario_d_rejection_message_surfaces_verbatim() {
    let ctx = running_engine();
    ctx.engine.set_upgrade_behavior(UpgradeBehavior::Reject {
        status: 409,
        message: "container is paused".to_string(),
    });

    let config = ExecConfig::new("true");
    let exec_id = ctx.create(&config).await;

    let err = ctx.client.attach(&exec_id, config.mode()).await.unwrap_err();
    match err {
        PodlinkError::Rejected(message) => assert_eq!(message, "container is paused"),
        other => panic!("expected Rejected, got {other:?}"),
    }

    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Failed
    );
}

// ============================================================================
// TRANSPORT FAILURE
// ============================================================================

#[tokio::test]
async fn transport_failure_is_a_distinct_category() {
    let ctx = running_engine();
    ctx.engine
        .set_upgrade_behavior(UpgradeBehavior::Fail("connection reset".to_string()));

    let config = ExecConfig::new("true");
    let exec_id = ctx.create(&config).await;

    let err = ctx.client.attach(&exec_id, config.mode()).await.unwrap_err();
    assert!(matches!(err, PodlinkError::Transport(_)));

    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Failed
    );
}

// ============================================================================
// SINGLE-ATTACH AND PRECONDITIONS
// ============================================================================

#[tokio::test]
async fn attach_succeeds_at_most_once() {
    let ctx = running_engine();
    let config = ExecConfig::new("sh");
    let (exec_id, stream, _peer) = ctx.attach_interactive(&config).await;
    let issue_calls_after_first = ctx.engine.issue_calls();

    let err = ctx.client.attach(&exec_id, config.mode()).await.unwrap_err();
    assert!(matches!(err, PodlinkError::InvalidTransition { .. }));

    // The second attach is refused locally: no inspect, no upgrade.
    assert_eq!(ctx.engine.issue_calls(), issue_calls_after_first);
    assert_eq!(ctx.engine.upgrade_calls(), 1);

    stream.close().await.unwrap();
}

#[tokio::test]
async fn second_attach_fails_even_after_a_failed_first() {
    let ctx = running_engine();
    ctx.engine.set_upgrade_behavior(UpgradeBehavior::Reject {
        status: 500,
        message: "boom".to_string(),
    });

    let config = ExecConfig::new("true");
    let exec_id = ctx.create(&config).await;

    assert!(ctx.client.attach(&exec_id, config.mode()).await.is_err());
    let issue_calls_after_first = ctx.engine.issue_calls();

    let err = ctx.client.attach(&exec_id, config.mode()).await.unwrap_err();
    assert!(matches!(err, PodlinkError::InvalidTransition { .. }));
    assert_eq!(ctx.engine.issue_calls(), issue_calls_after_first);
    assert_eq!(ctx.engine.upgrade_calls(), 1);
}

#[tokio::test]
async fn mode_mismatch_is_detected_before_any_network_call() {
    let ctx = running_engine();
    let config = ExecConfig::new("sh");
    let exec_id = ctx.create(&config).await;
    let issue_calls_after_create = ctx.engine.issue_calls();

    let err = ctx
        .client
        .attach(&exec_id, ExecMode::tty(false))
        .await
        .unwrap_err();
    assert!(matches!(err, PodlinkError::ModeMismatch { .. }));

    assert_eq!(ctx.engine.issue_calls(), issue_calls_after_create);
    assert_eq!(ctx.engine.upgrade_calls(), 0);
    assert_eq!(
        ctx.client.registry().get(&exec_id).unwrap().state,
        SessionState::Created
    );
}

#[tokio::test]
async fn attach_unknown_session_fails() {
    let ctx = running_engine();
    let err = ctx
        .client
        .attach("no-such-exec", ExecMode::piped(false))
        .await
        .unwrap_err();
    assert!(matches!(err, PodlinkError::UnknownSession(_)));
}
