#[cfg(test)]
mod text_keyer_spec {
    use std::env;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};
    use hamcrest2::prelude::*;
    use rstest::*;
    use crate::libs::keyer_io::keyer_io::{KeyingEdge, KeyInput};
    use crate::libs::keyer_io::text_keyer::{keying_for_text, TextKeyer};
    use crate::libs::timing::keying_timing::DefaultKeyingTiming;
    use crate::libs::util::test_util::{panic_after, wait_n_ms};

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[fixture]
    fn timing() -> DefaultKeyingTiming {
        DefaultKeyingTiming::new(20).unwrap()
    }

    // Offsets from the start, in ms, with the direction of each edge.
    fn offsets(edges: &[KeyingEdge], start: Instant) -> Vec<(bool, u128)> {
        edges.iter().map(|e| (e.down, (e.at - start).as_millis())).collect()
    }

    #[rstest]
    fn single_dit(timing: DefaultKeyingTiming) {
        let start = Instant::now();
        let edges = keying_for_text("E", &timing, start);
        assert_that!(offsets(&edges, start), equal_to(vec![(true, 0), (false, 60)]));
    }

    #[rstest]
    fn symbols_within_a_character_are_one_unit_apart(timing: DefaultKeyingTiming) {
        let start = Instant::now();
        let edges = keying_for_text("A", &timing, start);
        assert_that!(offsets(&edges, start), equal_to(vec![(true, 0), (false, 60), (true, 120), (false, 300)]));
    }

    #[rstest]
    fn characters_are_three_units_apart(timing: DefaultKeyingTiming) {
        let start = Instant::now();
        let edges = keying_for_text("ET", &timing, start);
        assert_that!(offsets(&edges, start), equal_to(vec![(true, 0), (false, 60), (true, 240), (false, 420)]));
    }

    #[rstest]
    fn words_are_seven_units_apart(timing: DefaultKeyingTiming) {
        let start = Instant::now();
        let edges = keying_for_text("e  e", &timing, start);
        assert_that!(offsets(&edges, start), equal_to(vec![(true, 0), (false, 60), (true, 480), (false, 540)]));
    }

    #[rstest]
    fn unkeyable_text_gives_no_edges(timing: DefaultKeyingTiming) {
        assert_that!(keying_for_text("", &timing, Instant::now()).len(), equal_to(0));
        assert_that!(keying_for_text("  ~ # ", &timing, Instant::now()).len(), equal_to(0));
    }

    struct RecordingKeyInput {
        edges: Mutex<Vec<KeyingEdge>>,
    }

    impl RecordingKeyInput {
        fn new() -> Self {
            Self { edges: Mutex::new(vec![]) }
        }

        fn recorded(&self) -> Vec<KeyingEdge> {
            self.edges.lock().unwrap().clone()
        }
    }

    impl KeyInput for RecordingKeyInput {
        fn key_down_at(&self, at: Instant) -> bool {
            self.edges.lock().unwrap().push(KeyingEdge::down_at(at));
            true
        }

        fn key_up_at(&self, at: Instant) -> bool {
            self.edges.lock().unwrap().push(KeyingEdge::up_at(at));
            true
        }
    }

    #[test]
    fn text_is_played_into_the_key_input() {
        panic_after(Duration::from_secs(5), || {
            let recorder = Arc::new(RecordingKeyInput::new());
            let terminate = Arc::new(AtomicBool::new(false));
            let mut keyer = TextKeyer::new(recorder.clone(), 60, terminate).unwrap();
            let before = Instant::now();
            keyer.send("EE");
            keyer.wait();
            let edges = recorder.recorded();
            assert_that!(edges.iter().map(|e| e.down).collect::<Vec<bool>>(), equal_to(vec![true, false, true, false]));
            // Not delivered early.
            assert_that!(Instant::now().duration_since(before) >= Duration::from_millis(100), equal_to(true));
        });
    }

    #[test]
    fn termination_abandons_the_message_with_the_key_up() {
        panic_after(Duration::from_secs(5), || {
            let recorder = Arc::new(RecordingKeyInput::new());
            let terminate = Arc::new(AtomicBool::new(false));
            let mut keyer = TextKeyer::new(recorder.clone(), 5, terminate.clone()).unwrap();
            keyer.send("OOOOOOOOOO");
            wait_n_ms(100);
            terminate.store(true, Ordering::SeqCst);
            keyer.wait();
            let edges = recorder.recorded();
            assert_that!(edges.is_empty(), equal_to(false));
            assert_that!(edges.last().map(|e| e.down), has(false));
        });
    }

    #[test]
    fn zero_speed_is_rejected() {
        let recorder = Arc::new(RecordingKeyInput::new());
        let terminate = Arc::new(AtomicBool::new(false));
        assert_that!(TextKeyer::new(recorder, 0, terminate).is_err(), equal_to(true));
    }
}
