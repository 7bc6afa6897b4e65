use std::env;
use std::fs;

use figment::{
    providers::{Format, Toml},
    Figment,
};

use lcdeisotope::CollisionPolicy;

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_three_scans() {
    let output = env::temp_dir().join(format!("lcdeisotoper_test_{}.tsv", std::process::id()));
    let config = format!(
        r#"
        input_file = "./tests/data/three_scans.mgf"
        output_file = "{}"
        ms_level = 2
        threads = 2

        [processing.deisotoper]
        min_charge = 1
        max_charge = 3
        intensity_floor = 10.0

        [processing.lcms]
        collision_policy = "reject"
        "#,
        output.display().to_string().replace('\\', "/")
    );
    let config = Figment::new().merge(Toml::string(&config));
    let driver: lcdeisotoper::LCDeisotoper = config.extract().unwrap();
    assert_eq!(driver.processing.deisotoper.max_charge, 3);
    assert_eq!(
        driver.processing.lcms.collision_policy,
        CollisionPolicy::Reject
    );
    driver.main().unwrap();

    let text = fs::read_to_string(&output).unwrap();
    fs::remove_file(&output).unwrap();
    let rows: Vec<Vec<&str>> = text.lines().skip(1).map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.len(), lcdeisotoper::REPORT_HEADER.len());
    assert_eq!(row[0], "1000.00000");
    assert_eq!(row[1], "2");
    // apex, start and end scan
    assert_eq!(row[2], "1");
    assert_eq!(row[6], "0");
    assert_eq!(row[7], "2");
    assert_eq!(row[8], "3");
}

#[test]
fn test_write_config() {
    let output = env::temp_dir().join(format!("lcdeisotoper_config_{}.toml", std::process::id()));
    let table = env::temp_dir().join(format!("lcdeisotoper_table_{}.tsv", std::process::id()));
    let mut driver = lcdeisotoper::LCDeisotoper {
        input_file: "./tests/data/three_scans.mgf".into(),
        output_file: table.clone(),
        write_config: Some(output.clone()),
        ms_level: 2,
        charge_range: Some(lcdeisotoper::ArgChargeRange(2, 6)),
        ..Default::default()
    };
    driver.processing.elution.max_scan_gap = 4;
    driver.main().unwrap();

    let written: lcdeisotoper::ProcessingConfig = Figment::new()
        .merge(Toml::file_exact(&output))
        .extract()
        .unwrap();
    fs::remove_file(&output).unwrap();
    fs::remove_file(&table).unwrap();
    assert_eq!(written.deisotoper.min_charge, 2);
    assert_eq!(written.deisotoper.max_charge, 6);
    assert_eq!(written.elution.max_scan_gap, 4);
    assert_eq!(written, driver.effective_config());
}
