use std::path::PathBuf;

use tempfile::TempDir;

use ccdred_core::engine::{
    CombineMethod, CombineParams, LinearityCoefficients, Rejection, StatField, TrimSection,
};
use ccdred_core::error::ReductionError;
use ccdred_core::pipeline::ReductionConfig;

// ---------------------------------------------------------------------------
// TrimSection
// ---------------------------------------------------------------------------

#[test]
fn test_trim_section_parse_and_display() {
    let section: TrimSection = " [100:3996, 100:3996] ".parse().unwrap();
    assert_eq!(section, TrimSection::default());
    assert_eq!(section.to_string(), "[100:3996,100:3996]");
    assert_eq!((section.width(), section.height()), (3897, 3897));
}

#[test]
fn test_trim_section_rejects_bad_input() {
    for bad in ["100:3996,100:3996", "[0:10,1:10]", "[10:5,1:10]", "[a:b,1:2]", "[1:2]"] {
        assert!(
            matches!(bad.parse::<TrimSection>(), Err(ReductionError::InvalidSection(_))),
            "{bad} was accepted"
        );
    }
}

// ---------------------------------------------------------------------------
// ReductionConfig
// ---------------------------------------------------------------------------

#[test]
fn test_default_config_toml_round_trip() {
    let config = ReductionConfig::new("/data/night1");
    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("trim = \"[100:3996,100:3996]\""), "{text}");
    assert!(text.contains("[linearity]"));

    let parsed: ReductionConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: ReductionConfig = toml::from_str(
        r#"
        working_dir = "/data/night1"
        trim = "[50:2000,50:2000]"

        [combine]
        method = "Average"
        "#,
    )
    .unwrap();

    assert_eq!(config.working_dir, PathBuf::from("/data/night1"));
    assert_eq!(config.trim, TrimSection::new(50, 2000, 50, 2000).unwrap());
    assert!(config.display);
    assert!(!config.proceed);
    assert!(!config.debug);
    assert_eq!(config.normalization, StatField::Midpt);
    assert_eq!(config.linearity, LinearityCoefficients::schmidt());
    assert_eq!(
        config.combine,
        CombineParams {
            method: CombineMethod::Average,
            reject: Rejection::MinMax,
            nlow: 1,
            nhigh: 1,
        }
    );
}

#[test]
fn test_invalid_trim_in_toml_is_rejected() {
    let result: Result<ReductionConfig, _> = toml::from_str(
        r#"
        working_dir = "."
        trim = "[5:1,1:5]"
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_validate_accepts_existing_directory() {
    let tmp = TempDir::new().unwrap();
    assert!(ReductionConfig::new(tmp.path()).validate().is_ok());
}

#[test]
fn test_validate_rejects_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let config = ReductionConfig::new(tmp.path().join("missing"));
    assert!(matches!(config.validate(), Err(ReductionError::InvalidConfig(_))));
}

#[test]
fn test_validate_rejects_non_finite_coefficients() {
    let tmp = TempDir::new().unwrap();
    let config = ReductionConfig {
        linearity: LinearityCoefficients {
            c1: 1.0,
            c2: f64::NAN,
            c3: 0.0,
        },
        ..ReductionConfig::new(tmp.path())
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_spread_statistic_for_normalization() {
    let tmp = TempDir::new().unwrap();
    for field in [StatField::Npix, StatField::Stddev] {
        let config = ReductionConfig {
            normalization: field,
            ..ReductionConfig::new(tmp.path())
        };
        assert!(config.validate().is_err(), "{field} accepted");
    }
    let mean = ReductionConfig {
        normalization: StatField::Mean,
        ..ReductionConfig::new(tmp.path())
    };
    assert!(mean.validate().is_ok());
}

#[test]
fn test_calibration_settings_follow_config() {
    let config = ReductionConfig {
        linearity: LinearityCoefficients::sbig(),
        normalization: StatField::Mean,
        ..ReductionConfig::new(".")
    };
    let settings = config.calibration_settings();
    assert_eq!(settings.linearity, LinearityCoefficients::sbig());
    assert_eq!(settings.normalization, StatField::Mean);
    assert_eq!(settings.trim, config.trim);
}
