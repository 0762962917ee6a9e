#[test]
#[should_panic(expected = "invalid metric logger config")]
fn test_init_rejects_zero_flush_interval() {
    let credentials = hive::Credentials {
        public_key: "PUBLIC_KEY".parse().unwrap(),
        secret_key: "SECRET_KEY".parse().unwrap(),
    };
    let mut config = hive::Config::new(credentials, "http://127.0.0.1:9".parse().unwrap());
    config.flush_interval = 0;

    hive::init(config);
}
