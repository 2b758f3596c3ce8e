use crate::testing::{FakeEngineLibrary, FakeEngineSpec, Gate, QueueEvent, RecordingQueue};
use crate::{
    MessageKind, SpeechSwitchConfig, SpeechSwitchError, SpeechSwitchModule, UtteranceOutcome,
    VoiceParams,
};
use std::sync::Arc;
use std::time::Duration;

const ESPEAK_US: &str = "espeak English (America)";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn two_engines() -> FakeEngineLibrary {
    FakeEngineLibrary::new(vec![
        FakeEngineSpec::new("espeak", vec!["English (America),en-us"])
            .with_sample_rate(22_050)
            .with_frames(vec![vec![10; 300], vec![20; 300], vec![30; 100]]),
        FakeEngineSpec::new("festival", vec!["kal,en"]).with_sample_rate(16_000),
    ])
}

fn load(library: &FakeEngineLibrary, host: Arc<RecordingQueue>) -> SpeechSwitchModule {
    let module = SpeechSwitchModule::load(
        SpeechSwitchConfig::default().with_library_dir(std::env::temp_dir()),
        Arc::new(library.clone()),
        host,
    )
    .unwrap();
    module.init().unwrap();
    module
}

#[test]
fn discovers_two_engines_with_sentinel() {
    init_logging();
    let module = load(&two_engines(), RecordingQueue::new());

    let voices = module.list_voices();
    assert_eq!(voices.len(), 3);
    let first = voices[0].as_ref().unwrap();
    assert_eq!(first.display_name, ESPEAK_US);
    assert_eq!(first.language, "en-US");
    assert_eq!(voices[1].as_ref().unwrap().display_name, "festival kal");
    assert!(voices[2].is_none());
}

#[tokio::test]
async fn every_discovered_voice_can_be_selected() {
    init_logging();
    let library = two_engines();
    let module = load(&library, RecordingQueue::new());

    for entry in module.catalog().voices().to_vec() {
        module.select_voice(&entry.display_name).await.unwrap();
        let engine = entry.display_name.split(' ').next().unwrap();
        assert_eq!(module.current_engine().await.as_deref(), Some(engine));
    }
}

#[tokio::test]
async fn text_produces_frames_then_one_end() {
    init_logging();
    let library = two_engines();
    let host = RecordingQueue::new();
    let module = load(&library, host.clone());
    host.clear();

    module
        .speak(b"hello", MessageKind::Text, VoiceParams::default().with_voice(ESPEAK_US))
        .await
        .unwrap();
    let outcome = module.wait_idle().await.unwrap();
    assert!(matches!(outcome, UtteranceOutcome::Completed(_)));

    let frames = host.frames();
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| !f.is_empty() && f.sample_rate == 22_050));
    assert_eq!(frames.iter().map(|f| f.sample_count()).sum::<usize>(), 700);
    assert_eq!(host.count(&QueueEvent::End), 1);

    let events = host.events();
    let end_at = events.iter().position(|e| *e == QueueEvent::End).unwrap();
    assert!(events[end_at..].iter().all(|e| !matches!(e, QueueEvent::Push(_))));
}

#[tokio::test]
async fn char_space_is_a_literal_space() {
    init_logging();
    let library = two_engines();
    let module = load(&library, RecordingQueue::new());

    module
        .speak(b"space", MessageKind::Char, VoiceParams::default().with_voice(ESPEAK_US))
        .await
        .unwrap();
    module.wait_idle().await;

    assert_eq!(library.stats("espeak").chars, vec![" ".to_string()]);
}

#[tokio::test]
async fn unknown_voice_keeps_previous_selection() {
    init_logging();
    let library = two_engines();
    let module = load(&library, RecordingQueue::new());

    module.select_voice("festival kal").await.unwrap();
    let before = library.stats("festival");

    let err = module.select_voice("espeak Klingon").await.unwrap_err();
    assert!(matches!(err, SpeechSwitchError::UnknownVoice(_)));
    assert_eq!(module.current_engine().await.as_deref(), Some("festival"));

    let after = library.stats("festival");
    assert_eq!(after.stops, before.stops);
    assert_eq!(after.starts, before.starts);
    assert_eq!(after.voices_set, before.voices_set);
}

#[tokio::test]
async fn unknown_voice_in_speak_falls_back_to_live_engine() {
    init_logging();
    let library = two_engines();
    let module = load(&library, RecordingQueue::new());

    module.select_voice("festival kal").await.unwrap();
    module
        .speak(b"hi", MessageKind::Text, VoiceParams::default().with_voice("nope nope"))
        .await
        .unwrap();
    module.wait_idle().await;
    assert_eq!(library.stats("festival").spoken, vec!["hi".to_string()]);
}

#[tokio::test]
async fn rate_and_pitch_reach_engine_before_synthesis() {
    init_logging();
    let library = two_engines();
    let module = load(&library, RecordingQueue::new());

    let params = VoiceParams::default()
        .with_voice(ESPEAK_US)
        .with_rate(100)
        .with_pitch(-50);
    module.speak(b"fast", MessageKind::Text, params).await.unwrap();
    module.wait_idle().await;

    let stats = library.stats("espeak");
    assert_eq!(stats.speeds, vec![6.0]);
    assert_eq!(stats.pitches, vec![0.5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_synthesis_aborts_engine() {
    init_logging();
    let gate = Gate::new();
    let library = FakeEngineLibrary::new(vec![
        FakeEngineSpec::new("espeak", vec!["English (America),en-us"])
            .with_frames(vec![vec![1; 50]; 5])
            .holding_after_first_frame(gate.clone()),
    ]);
    let host = RecordingQueue::new();
    let module = load(&library, host.clone());

    module
        .speak(b"a long sentence", MessageKind::Text, VoiceParams::default())
        .await
        .unwrap();

    let waiter = gate.clone();
    let reached = tokio::task::spawn_blocking(move || waiter.wait_reached(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(reached);

    module.stop();
    gate.open();

    let outcome = module.wait_idle().await.unwrap();
    assert!(matches!(outcome, UtteranceOutcome::Cancelled(_)));
    assert_eq!(library.stats("espeak").callback_results, vec![false, true]);
    assert_eq!(host.count(&QueueEvent::End), 0);

    // The flag is cleared by the next accepted request.
    module
        .speak(b"again", MessageKind::Text, VoiceParams::default())
        .await
        .unwrap();
    let outcome = module.wait_idle().await.unwrap();
    assert!(matches!(outcome, UtteranceOutcome::Completed(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn switching_engine_mid_utterance_waits_for_worker() {
    init_logging();
    let gate = Gate::new();
    let library = FakeEngineLibrary::new(vec![
        FakeEngineSpec::new("espeak", vec!["English (America),en-us"])
            .holding_after_first_frame(gate.clone()),
        FakeEngineSpec::new("festival", vec!["kal,en"]),
    ]);
    let module = load(&library, RecordingQueue::new());

    module
        .speak(b"first", MessageKind::Text, VoiceParams::default().with_voice(ESPEAK_US))
        .await
        .unwrap();
    let waiter = gate.clone();
    let reached = tokio::task::spawn_blocking(move || waiter.wait_reached(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(reached);

    let observer = library.clone();
    let opener = gate.clone();
    let release = tokio::task::spawn_blocking(move || {
        std::thread::sleep(Duration::from_millis(20));
        let held = (observer.stats("espeak").stops, observer.stats("festival").starts);
        opener.open();
        held
    });

    module.select_voice("festival kal").await.unwrap();

    // Only the discovery instances were touched while espeak was speaking.
    assert_eq!(release.await.unwrap(), (1, 1));
    assert_eq!(module.current_engine().await.as_deref(), Some("festival"));
    assert_eq!(library.stats("espeak").stops, 2);
    assert_eq!(library.stats("espeak").spoken, vec!["first".to_string()]);
    assert_eq!(library.max_concurrent_speaks(), 1);
}

#[tokio::test]
async fn close_stops_engine_and_terminates_queue() {
    init_logging();
    let library = two_engines();
    let host = RecordingQueue::new();
    let module = load(&library, host.clone());

    module
        .speak(b"bye", MessageKind::Text, VoiceParams::default().with_voice(ESPEAK_US))
        .await
        .unwrap();
    module.close().await;

    // One throwaway instance during discovery, one live session.
    assert_eq!(library.stats("espeak").stops, 2);
    assert_eq!(host.events().last(), Some(&QueueEvent::Terminate));
}
