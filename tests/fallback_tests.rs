// Capability gating and the native-recognition fallback path.

mod common;

use common::{drain_events, harness, wait_for_event};
use virgil_voice::capability::Capability;
use virgil_voice::error::VoiceError;
use virgil_voice::session::{
    CaptureState, ConnectionState, FallbackState, SessionEvent,
};

#[tokio::test]
async fn unsupported_host_refuses_every_operation() {
    let mut h = harness(Capability::Unsupported, false);

    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, VoiceError::CapabilityUnsupported));

    let err = h.session.start_capture().await.unwrap_err();
    assert!(matches!(err, VoiceError::CapabilityUnsupported));

    // Deterministic no-ops: nothing moved.
    let stats = h.session.stats().await;
    assert_eq!(stats.state.connection, ConnectionState::Disconnected);
    assert_eq!(stats.state.capture, CaptureState::Idle);
    assert_eq!(h.transport.attempts(), 0);
    assert!(!h.capture.is_capturing());

    // And the explanatory message was surfaced.
    let events = drain_events(&mut h.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Error { message } if message.contains("not supported"))));
}

#[tokio::test]
async fn capture_falls_back_when_socket_never_connected() {
    let h = harness(Capability::StreamingCapable, true);

    // Streaming capable, but connect was never called (or never succeeded):
    // native recognition takes over instead of erroring.
    h.session.start_capture().await.unwrap();

    let recognizer = h.recognizer.as_ref().unwrap();
    assert!(recognizer.is_listening());
    assert!(!h.capture.is_capturing());

    let stats = h.session.stats().await;
    assert_eq!(stats.state.fallback, FallbackState::Listening);
    assert_eq!(stats.state.capture, CaptureState::Idle);
}

#[tokio::test]
async fn fallback_utterance_is_emitted_on_stop() {
    let mut h = harness(Capability::FallbackOnly, true);

    h.session.start_capture().await.unwrap();
    let recognizer = h.recognizer.as_ref().unwrap();
    recognizer.script_transcript("turn on the lights");

    h.session.stop_capture().await.unwrap();
    assert!(!recognizer.is_listening());
    assert_eq!(
        h.session.stats().await.state.fallback,
        FallbackState::Idle
    );

    let event = wait_for_event(&mut h.events, |e| {
        matches!(e, SessionEvent::Recognized { .. })
    })
    .await;
    match event {
        SessionEvent::Recognized { text } => assert_eq!(text, "turn on the lights"),
        _ => unreachable!(),
    }

    assert_eq!(
        h.session.latest_transcript().await.as_deref(),
        Some("turn on the lights")
    );
    let conversation = h.session.conversation().await;
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].text, "turn on the lights");
}

#[tokio::test]
async fn short_fallback_transcript_is_discarded_as_noise() {
    let mut h = harness(Capability::FallbackOnly, true);

    h.session.start_capture().await.unwrap();
    h.recognizer.as_ref().unwrap().script_transcript("ok");
    h.session.stop_capture().await.unwrap();

    let events = drain_events(&mut h.events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Recognized { .. })));
    assert!(h.session.conversation().await.is_empty());
}

#[tokio::test]
async fn fallback_capture_is_single_entry() {
    let h = harness(Capability::FallbackOnly, true);

    h.session.start_capture().await.unwrap();
    let err = h.session.start_capture().await.unwrap_err();
    assert!(matches!(err, VoiceError::InvalidState(_)));

    // Still listening; the failed start did not disturb the live episode.
    assert!(h.recognizer.as_ref().unwrap().is_listening());
}

#[tokio::test]
async fn streaming_only_host_without_recognizer_reports_no_input() {
    let h = harness(Capability::StreamingCapable, false);

    // Not connected and no native recognition to fall back to.
    let err = h.session.start_capture().await.unwrap_err();
    assert!(matches!(err, VoiceError::NoInputMethod));

    let stats = h.session.stats().await;
    assert_eq!(stats.state.capture, CaptureState::Idle);
    assert_eq!(stats.state.fallback, FallbackState::Unavailable);
}
