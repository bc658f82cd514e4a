#[cfg(test)]
mod decoder_spec {
    use std::env;
    use std::time::{Duration, Instant};
    use hamcrest2::prelude::*;
    use rstest::*;
    use crate::libs::decoder::decoder::{DecodedOutput, Decoder};
    use crate::libs::decoder::symbol_state::SymbolState;
    use crate::libs::keyer_io::keyer_io::KeyingEdge;
    use crate::libs::keyer_io::text_keyer::keying_for_text;
    use crate::libs::morse::morse_table::morse_table;
    use crate::libs::timing::keying_timing::DefaultKeyingTiming;

    const TICK: Duration = Duration::from_millis(10);

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[fixture]
    fn decoder() -> Decoder {
        Decoder::new(DefaultKeyingTiming::new(20).unwrap())
    }

    fn ms(start: Instant, offset: u64) -> Instant {
        start + Duration::from_millis(offset)
    }

    // Replays edges as a 10ms poller would see them: ticks at every poll interval from the start,
    // each edge delivered at its own time, then ticks until `end`.
    fn drive(decoder: &mut Decoder, start: Instant, edges: &[KeyingEdge], end: Instant) -> Vec<DecodedOutput> {
        let mut outputs = vec![];
        let mut next_tick = start;
        for edge in edges {
            while next_tick < edge.at {
                outputs.extend(decoder.tick(next_tick));
                next_tick += TICK;
            }
            if edge.down {
                outputs.extend(decoder.on_key_down(edge.at));
            } else {
                outputs.extend(decoder.on_key_up(edge.at));
            }
        }
        while next_tick <= end {
            outputs.extend(decoder.tick(next_tick));
            next_tick += TICK;
        }
        outputs
    }

    // No character has more than six symbols.
    fn eight_dits(start: Instant) -> Vec<KeyingEdge> {
        let mut edges = vec![];
        for n in 0..8 {
            edges.push(KeyingEdge::down_at(ms(start, n * 120)));
            edges.push(KeyingEdge::up_at(ms(start, n * 120 + 60)));
        }
        edges
    }

    #[rstest]
    fn starts_at_a_word_boundary_with_nothing_decoded(decoder: Decoder) {
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.state, equal_to(SymbolState::WordBoundary));
        assert_that!(snapshot.key_down, equal_to(false));
        assert_that!(snapshot.decoded_text.as_str(), equal_to(""));
        assert_that!(snapshot.morse_log.as_str(), equal_to(""));
        assert_that!(snapshot.pending_symbol.as_str(), equal_to(""));
    }

    #[rstest]
    fn first_key_down_begins_a_dit(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.state, equal_to(SymbolState::Dit));
        assert_that!(snapshot.key_down, equal_to(true));
        assert_that!(snapshot.pending_symbol.as_str(), equal_to("."));
        assert_that!(snapshot.morse_log.as_str(), equal_to(""));
    }

    #[rstest]
    fn just_under_three_units_is_a_dit(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 174)); // 2.9 units
        assert_that!(decoder.state(), equal_to(SymbolState::DitLocked));
        assert_that!(decoder.snapshot().pending_symbol.as_str(), equal_to("."));
        let outputs = decoder.tick(ms(start, 174 + 180));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("E".to_owned())]));
    }

    #[rstest]
    fn exactly_three_units_is_a_dah(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 180));
        assert_that!(decoder.state(), equal_to(SymbolState::DahLocked));
        assert_that!(decoder.snapshot().pending_symbol.as_str(), equal_to("-"));
    }

    #[rstest]
    fn just_over_three_units_is_a_dah(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 186)); // 3.1 units
        assert_that!(decoder.state(), equal_to(SymbolState::DahLocked));
        let outputs = decoder.tick(ms(start, 186 + 180));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("T".to_owned())]));
    }

    #[rstest]
    fn held_key_becomes_a_dah_while_still_down(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.tick(ms(start, 170));
        assert_that!(decoder.state(), equal_to(SymbolState::Dit));
        decoder.tick(ms(start, 180));
        assert_that!(decoder.state(), equal_to(SymbolState::Dah));
        assert_that!(decoder.snapshot().pending_symbol.as_str(), equal_to("-"));
    }

    #[rstest]
    fn a_then_a_word_space(mut decoder: Decoder) {
        let start = Instant::now();
        let edges = vec![
            KeyingEdge::down_at(start),
            KeyingEdge::up_at(ms(start, 50)),
            KeyingEdge::down_at(ms(start, 100)),
            KeyingEdge::up_at(ms(start, 300)),
        ];
        let outputs = drive(&mut decoder, start, &edges, ms(start, 800));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("A".to_owned()), DecodedOutput::WordSpace]));
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.decoded_text.as_str(), equal_to("A "));
        assert_that!(snapshot.morse_log.as_str(), equal_to(".-"));
        assert_that!(snapshot.display_morse().as_str(), equal_to(".- / "));
        assert_that!(snapshot.state, equal_to(SymbolState::WordBoundary));
    }

    #[rstest]
    fn character_closes_three_units_after_the_last_release(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 60));
        assert_that!(decoder.tick(ms(start, 239)).is_empty(), equal_to(true));
        assert_that!(decoder.tick(ms(start, 240)), equal_to(vec![DecodedOutput::Character("E".to_owned())]));
        assert_that!(decoder.state(), equal_to(SymbolState::CharBoundary));
        // The word gap runs from the release, not from the character boundary.
        assert_that!(decoder.tick(ms(start, 479)).is_empty(), equal_to(true));
        assert_that!(decoder.tick(ms(start, 480)), equal_to(vec![DecodedOutput::WordSpace]));
    }

    #[rstest]
    fn a_late_tick_closes_character_and_word_together(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 60));
        let outputs = decoder.tick(ms(start, 5000));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("E".to_owned()), DecodedOutput::WordSpace]));
    }

    #[rstest]
    fn a_key_down_closes_a_character_no_tick_saw(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 60));
        let outputs = decoder.on_key_down(ms(start, 240));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("E".to_owned())]));
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.state, equal_to(SymbolState::Dit));
        assert_that!(snapshot.morse_log.as_str(), equal_to(". "));
    }

    #[rstest]
    fn duplicate_edges_change_nothing(mut decoder: Decoder) {
        let start = Instant::now();
        assert_that!(decoder.on_key_up(start).is_empty(), equal_to(true));
        assert_that!(decoder.state(), equal_to(SymbolState::WordBoundary));

        decoder.on_key_down(start);
        let before = decoder.snapshot();
        assert_that!(decoder.on_key_down(ms(start, 500)).is_empty(), equal_to(true));
        assert_that!(decoder.snapshot(), equal_to(before));
    }

    #[rstest]
    fn unknown_sequence_decodes_to_the_empty_placeholder(mut decoder: Decoder) {
        let start = Instant::now();
        let edges = eight_dits(start);
        let outputs = drive(&mut decoder, start, &edges, ms(start, 2000));
        assert_that!(outputs, equal_to(vec![DecodedOutput::Character("".to_owned()), DecodedOutput::WordSpace]));
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.morse_log.as_str(), equal_to("........"));
        assert_that!(snapshot.decoded_text.as_str(), equal_to(" "));
    }

    #[test]
    fn unknown_sequence_decodes_to_a_configured_placeholder() {
        let mut decoder = Decoder::new(DefaultKeyingTiming::new(20).unwrap()).with_unknown_placeholder("?");
        let start = Instant::now();
        let edges = eight_dits(start);
        drive(&mut decoder, start, &edges, ms(start, 2000));
        assert_that!(decoder.snapshot().decoded_text.as_str(), equal_to("? "));
    }

    #[rstest]
    fn words_are_separated_in_the_morse_log(mut decoder: Decoder) {
        let timing = DefaultKeyingTiming::new(20).unwrap();
        let start = Instant::now();
        let edges = keying_for_text("A B", &timing, start);
        let end = edges.last().unwrap().at + Duration::from_millis(1000);
        drive(&mut decoder, start, &edges, end);
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.decoded_text.as_str(), equal_to("A B "));
        assert_that!(snapshot.display_morse().as_str(), equal_to(".- / -... / "));
    }

    #[rstest]
    fn every_table_entry_round_trips(#[values(5, 20, 40)] wpm: u8) {
        let timing = DefaultKeyingTiming::new(wpm).unwrap();
        for (ch, _) in morse_table() {
            let mut decoder = Decoder::new(timing);
            let start = Instant::now();
            let text = ch.to_string();
            let edges = keying_for_text(&text, &timing, start);
            let end = edges.last().unwrap().at + Duration::from_secs(3);
            drive(&mut decoder, start, &edges, end);
            assert_that!(decoder.snapshot().decoded_text, equal_to(format!("{} ", ch)));
        }
    }

    #[rstest]
    fn sentence_round_trips(mut decoder: Decoder) {
        let timing = DefaultKeyingTiming::new(20).unwrap();
        let start = Instant::now();
        let edges = keying_for_text("CQ CQ DE M0CUV K", &timing, start);
        let end = edges.last().unwrap().at + Duration::from_secs(1);
        drive(&mut decoder, start, &edges, end);
        assert_that!(decoder.snapshot().decoded_text.as_str(), equal_to("CQ CQ DE M0CUV K "));
    }

    #[rstest]
    fn speed_change_applies_to_later_symbols(mut decoder: Decoder) {
        decoder.set_keyer_speed(10).unwrap();
        assert_that!(decoder.get_keyer_speed(), equal_to(10));
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 300)); // 2.5 units at 10 WPM
        assert_that!(decoder.state(), equal_to(SymbolState::DitLocked));
        assert_that!(decoder.set_keyer_speed(0).is_err(), equal_to(true));
    }

    #[rstest]
    fn time_going_backwards_is_tolerated(mut decoder: Decoder) {
        let start = Instant::now() + Duration::from_secs(1);
        decoder.on_key_down(start);
        decoder.tick(start - Duration::from_millis(500));
        assert_that!(decoder.state(), equal_to(SymbolState::Dit));
        decoder.on_key_up(ms(start, 60));
        assert_that!(decoder.state(), equal_to(SymbolState::DitLocked));
    }

    #[rstest]
    fn clear_forgets_everything(mut decoder: Decoder) {
        let start = Instant::now();
        decoder.on_key_down(start);
        decoder.on_key_up(ms(start, 60));
        decoder.tick(ms(start, 1000));
        decoder.clear();
        let snapshot = decoder.snapshot();
        assert_that!(snapshot.state, equal_to(SymbolState::WordBoundary));
        assert_that!(snapshot.decoded_text.as_str(), equal_to(""));
        assert_that!(snapshot.display_morse().as_str(), equal_to(""));
    }
}
