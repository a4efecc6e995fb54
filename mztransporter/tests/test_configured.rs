use figment::{
    providers::{Format, Toml},
    Figment,
};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_mixture() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("./tests/data/mixture.toml"));
    let driver: mztransporter::MZTransporter = config.extract().unwrap();
    assert_eq!(driver.references.len(), 2);
    assert_eq!(driver.threads, Some(2));

    let summary = driver.run().unwrap();
    assert_eq!(summary.observed_peaks, 5);
    assert_eq!(summary.fitted_peaks, 5);
    assert!(summary.fitted_distance < 1e-9);
    assert!(summary.fitted_anomalies.is_empty());
    for reference in summary.references.iter() {
        assert!((reference.proportion - 0.5).abs() < 1e-12);
        assert!((reference.distance - 0.3).abs() < 1e-9);
    }
    assert_eq!(summary.references[1].peaks, 2);
}
