//! End-to-end data-package validation against the built-in HSDS schemas:
//! declared-order results, the AND verdict, and the relations toggle.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use validate_hsds::config::{NetworkConfig, ValidationConfig};
use validate_hsds::engine::{CheckCode, CsvEngine};
use validate_hsds::http_client::HttpFetcher;
use validate_hsds::package::{PackageOptions, PackageValidator};
use validate_hsds::validator::ResourceValidator;

fn package_validator() -> PackageValidator {
    PackageValidator::new(
        Arc::new(ResourceValidator::new(CsvEngine::default())),
        Arc::new(HttpFetcher::new(NetworkConfig::default()).unwrap()),
        ValidationConfig::default(),
    )
}

const ORGANIZATION_CSV: &str = "id,name,alternate_name,description,email,url,tax_status,tax_id,year_incorporated,legal_status\n\
o1,Harbor House,,Emergency shelter and meals,,,,,,\n\
o2,City Food Bank,,Food distribution,,,,,,\n";

/// `l2` references organization `o9`, which is not declared; `l3` leaves the
/// reference empty.
const LOCATION_CSV: &str = "id,organization_id,name,alternate_name,description,transportation,latitude,longitude\n\
l1,o1,Main Shelter,,,,47.6,-122.3\n\
l2,o9,Annex,,,,,\n\
l3,,Warehouse,,,,,\n";

fn write_package(dir: &Path) -> PathBuf {
    fs::write(dir.join("organization.csv"), ORGANIZATION_CSV).unwrap();
    fs::write(dir.join("location.csv"), LOCATION_CSV).unwrap();
    let descriptor = dir.join("datapackage.json");
    fs::write(
        &descriptor,
        r#"{
            "name": "hsds-sample",
            "resources": [
                {"name": "organization", "path": "organization.csv"},
                {"name": "location", "path": "location.csv"}
            ]
        }"#,
    )
    .unwrap();
    descriptor
}

#[tokio::test]
async fn test_results_follow_descriptor_order_and_builtin_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = write_package(dir.path());

    let report = package_validator()
        .validate_package(descriptor.to_str().unwrap(), PackageOptions::default())
        .await
        .unwrap();

    let names: Vec<&str> = report.results.iter().map(|r| r.resource.as_str()).collect();
    assert_eq!(names, vec!["organization", "location"]);
    assert!(report.is_valid());
}

#[tokio::test]
async fn test_relations_toggle_flags_dangling_reference() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = write_package(dir.path());
    let uri = descriptor.to_str().unwrap().to_string();
    let validator = package_validator();

    // Without relations the dangling o9 is ignored.
    let without = validator
        .validate_package(&uri, PackageOptions { relations: false })
        .await
        .unwrap();
    assert!(without.is_valid());

    // With relations the same package fails, on the referencing resource.
    let with = validator
        .validate_package(&uri, PackageOptions { relations: true })
        .await
        .unwrap();
    assert!(!with.is_valid());
    assert!(with.results[0].valid, "referenced resource must stay valid");

    let location = &with.results[1];
    assert!(!location.valid);
    let fk_errors: Vec<_> = location
        .errors
        .iter()
        .filter(|e| e.code == CheckCode::ForeignKeyError)
        .collect();
    // Only the dangling row; the empty reference on row 4 is not an error.
    assert_eq!(fk_errors.len(), 1);
    assert_eq!(fk_errors[0].row, Some(3));
    assert!(fk_errors[0].message.contains("o9"));
    assert!(fk_errors[0].message.contains("organization"));
}

#[tokio::test]
async fn test_overall_verdict_is_and_of_resource_verdicts() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = write_package(dir.path());
    // Break one resource: organization loses its required description column.
    fs::write(
        dir.path().join("organization.csv"),
        "id,name\no1,Harbor House\n",
    )
    .unwrap();

    let report = package_validator()
        .validate_package(descriptor.to_str().unwrap(), PackageOptions::default())
        .await
        .unwrap();

    assert!(!report.is_valid());
    assert!(!report.results[0].valid);
    assert!(report.results[1].valid);
}

#[tokio::test]
async fn test_generated_samples_pass_with_relations_left_empty() {
    // A package of generated conformant samples keeps all foreign keys
    // empty, so it must pass even with the relations pass enabled.
    let dir = tempfile::tempdir().unwrap();
    for name in ["organization", "location", "taxonomy"] {
        fs::write(
            dir.path().join(format!("{name}.csv")),
            common::sample_csv(name, 2),
        )
        .unwrap();
    }
    let descriptor = dir.path().join("datapackage.json");
    fs::write(
        &descriptor,
        r#"{
            "resources": [
                {"name": "organization", "path": "organization.csv"},
                {"name": "location", "path": "location.csv"},
                {"name": "taxonomy", "path": "taxonomy.csv"}
            ]
        }"#,
    )
    .unwrap();

    let report = package_validator()
        .validate_package(
            descriptor.to_str().unwrap(),
            PackageOptions { relations: true },
        )
        .await
        .unwrap();
    assert!(
        report.is_valid(),
        "errors: {:?}",
        report
            .results
            .iter()
            .flat_map(|r| r.errors.iter())
            .collect::<Vec<_>>()
    );
}
