extern crate hamcrest2;

#[cfg(test)]
mod config_file_spec {
    use std::env;
    use std::fs;
    use std::time::Duration;
    use temp_testdir::TempDir;
    use crate::libs::config_file::config_file::ConfigurationStore;
    use hamcrest2::prelude::*;
    use std::path::Path;

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[ctor::dtor]
    fn after_each() {}

    fn temp_config_dir() -> (Box<Path>, TempDir) {
        // Return both objects as if temp_dir is not moved back to the caller, it'll drop and
        // delete.
        let temp_dir = TempDir::default();
        let temp = temp_dir.to_path_buf();
        assert_that!(temp.as_path(), dir_exists());

        (temp.into_boxed_path(), temp_dir)
    }

    #[test]
    fn new_config_creates_a_toml_file() {
        let (temp, _temp_dir) = temp_config_dir();
        let config = ConfigurationStore::new(temp).unwrap();

        let config_file_path = config.get_config_file_path();
        assert_that!(config_file_path, path_exists());
        assert_that!(config_file_path, file_exists());
        assert_that!(config_file_path.to_string_lossy(), matches_regex("morserelay.toml$"));
    }

    #[test]
    fn default_settings() {
        let (temp, _temp_dir) = temp_config_dir();
        let config = ConfigurationStore::new(temp.clone()).unwrap();

        assert_that!(config.get_wpm(), eq(20));
        assert_that!(config.get_local_frequency(), eq(400));
        assert_that!(config.get_remote_frequency(), eq(250));
        assert_that!(config.get_amplitude(), eq(8192));
        assert_that!(config.get_audio_out_device(), eq("".to_string()));
        assert_that!(config.get_relay_address(), eq("127.0.0.1:8080".to_string()));
        assert_that!(config.get_poll_interval_ms(), eq(10));
        assert_that!(config.get_unknown_placeholder(), eq("".to_string()));
    }

    #[test]
    fn settings_can_be_changed_persisted_and_reloaded() {
        let (temp, _temp_dir) = temp_config_dir();
        let mut config = ConfigurationStore::new(temp.clone()).unwrap();

        config.set_wpm(40).unwrap();
        config.set_local_frequency(600).unwrap();
        config.set_remote_frequency(700).unwrap();
        config.set_amplitude(1000).unwrap();
        config.set_audio_out_device("Built-in Output".to_string()).unwrap();
        config.set_relay_address("10.0.0.1:7373".to_string()).unwrap();
        config.set_poll_interval_ms(5).unwrap();
        config.set_unknown_placeholder("?".to_string()).unwrap();

        let reread_config = ConfigurationStore::new(temp.clone()).unwrap();

        assert_that!(reread_config.get_wpm(), eq(40));
        assert_that!(reread_config.get_local_frequency(), eq(600));
        assert_that!(reread_config.get_remote_frequency(), eq(700));
        assert_that!(reread_config.get_amplitude(), eq(1000));
        assert_that!(reread_config.get_audio_out_device(), eq("Built-in Output".to_string()));
        assert_that!(reread_config.get_relay_address(), eq("10.0.0.1:7373".to_string()));
        assert_that!(reread_config.get_poll_interval_ms(), eq(5));
        assert_that!(reread_config.get_unknown_placeholder(), eq("?".to_string()));
    }

    #[test]
    fn invalid_settings_are_rejected_and_not_stored() {
        let (temp, _temp_dir) = temp_config_dir();
        let mut config = ConfigurationStore::new(temp.clone()).unwrap();

        assert_that!(config.set_wpm(0), err());
        assert_that!(config.set_poll_interval_ms(0), err());
        assert_that!(config.get_wpm(), eq(20));
        assert_that!(config.get_poll_interval_ms(), eq(10));
    }

    #[test]
    fn unusual_speeds_are_stored() {
        let (temp, _temp_dir) = temp_config_dir();
        let mut config = ConfigurationStore::new(temp.clone()).unwrap();

        config.set_wpm(4).unwrap();
        assert_that!(ConfigurationStore::new(temp.clone()).unwrap().get_wpm(), eq(4));
        config.set_wpm(61).unwrap();
        assert_that!(ConfigurationStore::new(temp.clone()).unwrap().get_wpm(), eq(61));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let (temp, _temp_dir) = temp_config_dir();
        fs::write(temp.join("morserelay.toml"), "[keyer]\nwpm = 25\n").unwrap();
        let config = ConfigurationStore::new(temp.clone()).unwrap();

        assert_that!(config.get_wpm(), eq(25));
        assert_that!(config.get_relay_address(), eq("127.0.0.1:8080".to_string()));
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let (temp, _temp_dir) = temp_config_dir();
        fs::write(temp.join("morserelay.toml"), "[keyer\nwpm = ").unwrap();
        assert_that!(ConfigurationStore::new(temp.clone()).is_err(), equal_to(true));
    }

    #[test]
    fn session_config_reflects_the_settings() {
        let (temp, _temp_dir) = temp_config_dir();
        let mut config = ConfigurationStore::new(temp.clone()).unwrap();
        config.set_wpm(30).unwrap();
        config.set_unknown_placeholder("*".to_string()).unwrap();

        let session_config = config.session_config();
        assert_that!(session_config.keyer_speed, eq(30));
        assert_that!(session_config.poll_interval, eq(Duration::from_millis(10)));
        assert_that!(session_config.unknown_placeholder, eq("*".to_string()));
    }
}
