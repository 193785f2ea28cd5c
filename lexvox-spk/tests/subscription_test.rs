//! Tests for state change subscriptions

mod common;

use common::{engine_with, record_states, RecordingBackend};
use lexvox_spk::{BackendEvent, NarrationOptions, NarrationState, PlaybackStatus, UtteranceId};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_listener_sees_every_transition_in_order() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let (seen, _subscription) = record_states(&engine);

    engine.speak("inciso III", &NarrationOptions::default());
    backend.emit(UtteranceId(1), BackendEvent::Boundary { char_index: 7 });
    engine.pause();
    engine.resume();
    backend.emit(UtteranceId(1), BackendEvent::Ended);

    let statuses: Vec<_> = seen.lock().iter().map(|state| (state.status(), state.position)).collect();
    assert_eq!(
        statuses,
        vec![
            (PlaybackStatus::Speaking, 0),
            (PlaybackStatus::Speaking, 7),
            (PlaybackStatus::Paused, 7),
            (PlaybackStatus::Speaking, 7),
            (PlaybackStatus::Idle, 0),
        ]
    );
    // Full snapshots, not diffs
    assert_eq!(seen.lock()[2].text, "inciso três");
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let (seen, subscription) = record_states(&engine);

    engine.speak("texto", &NarrationOptions::default());
    assert_eq!(seen.lock().len(), 1);

    subscription.unsubscribe();
    assert!(!subscription.is_active());
    engine.stop();
    engine.speak("outro", &NarrationOptions::default());
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_double_unsubscribe_is_harmless() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let (_first, first) = record_states(&engine);
    let (second_seen, _second) = record_states(&engine);
    assert_eq!(engine.listener_count(), 2);

    first.unsubscribe();
    first.unsubscribe();

    // Only the targeted listener was removed
    assert_eq!(engine.listener_count(), 1);
    engine.speak("texto", &NarrationOptions::default());
    assert_eq!(second_seen.lock().len(), 1);
}

#[test]
fn test_unsubscribe_after_engine_dropped() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let (_seen, subscription) = record_states(&engine);

    drop(engine);
    subscription.unsubscribe();
    assert!(!subscription.is_active());
}

#[test]
fn test_dropping_subscription_keeps_listener() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let (seen, subscription) = record_states(&engine);

    drop(subscription);
    engine.speak("texto", &NarrationOptions::default());
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_multiple_listeners_all_notified() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let listeners: Vec<_> = (0..5).map(|_| record_states(&engine)).collect();

    engine.speak("texto", &NarrationOptions::default());
    engine.stop();

    for (seen, _) in &listeners {
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], NarrationState::idle());
    }
}

#[test]
fn test_listener_can_call_back_into_engine() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);

    // Stop as soon as playback starts
    let handle = engine.clone();
    let _subscription = engine.subscribe(move |state| {
        if state.is_speaking {
            handle.stop();
        }
    });

    engine.speak("texto", &NarrationOptions::default());
    assert!(engine.state().is_idle());
}

#[test]
fn test_listener_can_unsubscribe_itself() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);

    let slot: Arc<Mutex<Option<lexvox_spk::Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(Mutex::new(0));

    let slot_in_listener = slot.clone();
    let calls_in_listener = calls.clone();
    let subscription = engine.subscribe(move |_| {
        *calls_in_listener.lock() += 1;
        if let Some(subscription) = slot_in_listener.lock().as_ref() {
            subscription.unsubscribe();
        }
    });
    *slot.lock() = Some(subscription);

    engine.speak("texto", &NarrationOptions::default());
    engine.stop();
    assert_eq!(*calls.lock(), 1);
}

#[test]
fn test_panicking_listener_does_not_stall_delivery() {
    let backend = Arc::new(RecordingBackend::manual());
    let engine = engine_with(&backend);

    let panics = Arc::new(Mutex::new(0));
    let counter = panics.clone();
    let _faulty = engine.subscribe(move |state| {
        if state.is_speaking {
            *counter.lock() += 1;
            panic!("listener failure");
        }
    });
    let (seen, _healthy) = record_states(&engine);
    let mut updates = engine.watch();

    engine.speak("lei um", &NarrationOptions::default());
    backend.emit(UtteranceId(1), BackendEvent::Started);
    engine.stop();

    engine.speak("lei dois", &NarrationOptions::default());
    backend.emit(UtteranceId(2), BackendEvent::Started);
    backend.emit(UtteranceId(2), BackendEvent::Ended);

    let statuses: Vec<_> = seen.lock().iter().map(|state| state.status()).collect();
    assert_eq!(
        statuses,
        vec![
            PlaybackStatus::Speaking,
            PlaybackStatus::Idle,
            PlaybackStatus::Speaking,
            PlaybackStatus::Idle,
        ]
    );
    assert_eq!(seen.lock()[2].text, "lei dois");
    // The faulty listener stays registered and keeps being called
    assert_eq!(*panics.lock(), 2);
    assert_eq!(engine.listener_count(), 2);

    let mut watched = 0;
    while updates.try_recv().is_ok() {
        watched += 1;
    }
    assert_eq!(watched, 4);
    assert!(engine.state().is_idle());
}

#[tokio::test]
async fn test_watch_receives_snapshots() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(&backend);
    let mut updates = engine.watch();

    engine.speak("art. 1º", &NarrationOptions::default());
    engine.stop();

    let first = updates.recv().await.unwrap();
    assert!(first.is_speaking);
    assert_eq!(first.text, "artigo 1º");

    let second = updates.recv().await.unwrap();
    assert!(second.is_idle());
}
