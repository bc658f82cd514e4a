#[cfg(test)]
mod keying_timing_spec {
    use std::env;
    use std::time::Duration;
    use hamcrest2::prelude::*;
    use rstest::*;
    use crate::libs::timing::keying_timing::{DefaultKeyingTiming, KeyingTiming};

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[ctor::dtor]
    fn after_each() {}

    #[fixture]
    fn timing() -> DefaultKeyingTiming {
        DefaultKeyingTiming::new(20).unwrap()
    }

    #[rstest]
    fn twenty_wpm_has_a_sixty_ms_unit(timing: DefaultKeyingTiming) {
        assert_that!(timing.get_keyer_speed(), equal_to(20));
        assert_that!(timing.get_unit_ms(), equal_to(60.0));
        assert_that!(timing.get_dah_threshold_ms(), equal_to(180.0));
        assert_that!(timing.get_word_threshold_ms(), equal_to(420.0));
        assert_that!(timing.get_unit_duration(), equal_to(Duration::from_millis(60)));
    }

    #[test]
    fn thresholds_keep_the_one_three_seven_ratio_at_every_speed() {
        for wpm in 1 ..= u8::MAX {
            let timing = DefaultKeyingTiming::new(wpm).unwrap();
            let unit = timing.get_unit_ms();
            assert_that!(unit > 0.0, equal_to(true));
            assert_that!(timing.get_dah_threshold_ms(), equal_to(3.0 * unit));
            assert_that!(timing.get_word_threshold_ms(), equal_to(7.0 * unit));
        }
    }

    #[test]
    fn non_integer_units_are_not_truncated() {
        let timing = DefaultKeyingTiming::new(7).unwrap();
        assert_that!(timing.get_unit_ms(), equal_to(60000.0 / 350.0));
        assert_that!(timing.get_unit_duration(), equal_to(Duration::from_micros(171429)));
    }

    #[rstest]
    #[case(1, 1200.0)]
    #[case(4, 300.0)]
    #[case(61, 60000.0 / 3050.0)]
    #[case(255, 60000.0 / 12750.0)]
    fn unusual_speeds_still_have_timing(#[case] wpm: u8, #[case] unit_ms: f64) {
        let timing = DefaultKeyingTiming::new(wpm).unwrap();
        assert_that!(timing.get_keyer_speed(), equal_to(wpm));
        assert_that!(timing.get_unit_ms(), equal_to(unit_ms));
        assert_that!(timing.get_dah_threshold_ms(), equal_to(3.0 * unit_ms));
        assert_that!(timing.get_word_threshold_ms(), equal_to(7.0 * unit_ms));
    }

    #[rstest]
    fn zero_speed_is_rejected(mut timing: DefaultKeyingTiming) {
        assert_that!(DefaultKeyingTiming::new(0), err());
        assert_that!(timing.set_keyer_speed(0), err());
        // unchanged
        assert_that!(timing.get_keyer_speed(), equal_to(20));
        assert_that!(timing.get_unit_ms(), equal_to(60.0));
    }

    #[rstest]
    fn changing_speed_recomputes_all_thresholds(mut timing: DefaultKeyingTiming) {
        timing.set_keyer_speed(12).unwrap();
        assert_that!(timing.get_unit_ms(), equal_to(100.0));
        assert_that!(timing.get_dah_threshold_ms(), equal_to(300.0));
        assert_that!(timing.get_word_threshold_ms(), equal_to(700.0));
    }

    #[rstest]
    fn ten_ms_polling_is_fine_at_twenty_wpm_but_not_at_sixty(mut timing: DefaultKeyingTiming) {
        assert_that!(timing.poll_interval_is_adequate(Duration::from_millis(10)), equal_to(true));
        timing.set_keyer_speed(60).unwrap();
        assert_that!(timing.poll_interval_is_adequate(Duration::from_millis(10)), equal_to(false));
    }
}
