// Integration tests for the project scaffold.

use std::path::Path;

/// Verify that config/league.toml is valid TOML.
#[test]
fn league_toml_is_valid() {
    let content =
        std::fs::read_to_string("config/league.toml").expect("config/league.toml should exist");
    let parsed: Result<toml::Value, _> = toml::from_str(&content);
    assert!(parsed.is_ok(), "config/league.toml is not valid TOML: {:?}", parsed.err());
}

/// Verify league.toml contains the expected league settings.
#[test]
fn league_toml_has_correct_settings() {
    let content = std::fs::read_to_string("config/league.toml").unwrap();
    let config: toml::Value = toml::from_str(&content).unwrap();

    let league = config.get("league").expect("league section should exist");
    assert_eq!(league.get("roster_size").unwrap().as_integer().unwrap(), 4);
    assert_eq!(league.get("budget").unwrap().as_integer().unwrap(), 1000);
    assert!(league.get("has_constructors").unwrap().as_bool().unwrap());
    assert!(league.get("has_sprint_points").unwrap().as_bool().unwrap());

    let database = config.get("database").expect("database section should exist");
    assert!(database.get("path").unwrap().as_str().is_some());
}

/// Verify the shipped config parses through the typed loader.
#[test]
fn league_toml_loads_through_the_config_module() {
    let config = paddock_engine::config::load_config_from(Path::new("."))
        .expect("shipped config should validate");
    assert_eq!(config.league.roster_size, 4);
    assert_eq!(config.league.budget, 1000);
}

/// Verify that all expected directories exist.
#[test]
fn directory_structure_exists() {
    let expected_dirs = ["src", "src/engine", "config", "tests", "tests/fixtures"];
    for dir in expected_dirs {
        assert!(Path::new(dir).is_dir(), "Expected directory '{}' to exist", dir);
    }
}

/// Verify that all expected source files exist.
#[test]
fn source_files_exist() {
    let expected_files = [
        "src/main.rs",
        "src/lib.rs",
        "src/config.rs",
        "src/db.rs",
        "src/import.rs",
        "src/model.rs",
        "src/engine/mod.rs",
        "src/engine/resolve.rs",
        "src/engine/score.rs",
        "src/engine/standings.rs",
        "src/engine/market.rs",
        "src/engine/dream_team.rs",
    ];
    for file in expected_files {
        assert!(Path::new(file).is_file(), "Expected source file '{}' to exist", file);
    }
}

/// Verify the sample results fixture keeps the importer's header contract.
#[test]
fn results_fixture_has_headers() {
    let content = std::fs::read_to_string("tests/fixtures/sample_results.csv")
        .expect("sample_results.csv should exist");
    assert!(
        content.starts_with("Rider,Main,Sprint"),
        "sample_results.csv should have correct headers"
    );
}
