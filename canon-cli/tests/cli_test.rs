//! Integration tests for the `canon` binary against local package directories

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_local_package(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(
        dir.join("package.json"),
        r#"{"name": "local.ig", "version": "0.1.0", "canonical": "http://example.org/ig", "fhirVersions": ["4.0.1"]}"#,
    )?;
    fs::write(
        dir.join(".index.json"),
        r#"{"index-version": 1, "files": [
            {"url": "http://example.org/ig/StructureDefinition/a", "type": "Patient", "kind": "resource", "version": "0.1.0"},
            {"url": "http://example.org/ig/StructureDefinition/b", "type": "Observation", "kind": "resource"},
            {"url": "http://example.org/ig/StructureDefinition/c", "type": "Patient", "kind": "logical"}
        ]}"#,
    )?;
    Ok(())
}

/// Run canon with a local package and an isolated working directory
fn run_canon(temp_dir: &TempDir, args: &[&str]) -> Result<String> {
    let package_dir = temp_dir.path().join("ig");
    write_local_package(&package_dir)?;

    let output = Command::new(env!("CARGO_BIN_EXE_canon"))
        .arg("--working-dir")
        .arg(temp_dir.path().join("work"))
        .arg("--local")
        .arg(&package_dir)
        .args(args)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "canon {:?} failed:\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8(output.stdout)?)
}

#[test]
fn test_packages_json() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let stdout = run_canon(&temp_dir, &["packages", "--json"])?;

    let packages: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(packages.as_array().map(|a| a.len()), Some(1));
    assert_eq!(packages[0]["id"]["name"], "local.ig");
    assert_eq!(packages[0]["canonical"], "http://example.org/ig");
    Ok(())
}

#[test]
fn test_search_by_type_json() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let stdout = run_canon(&temp_dir, &["search", "--type", "Patient", "--json"])?;

    let entries: serde_json::Value = serde_json::from_str(&stdout)?;
    let urls: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["url"].as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://example.org/ig/StructureDefinition/a",
            "http://example.org/ig/StructureDefinition/c"
        ]
    );
    Ok(())
}

#[test]
fn test_search_contains_post_filter() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let stdout = run_canon(
        &temp_dir,
        &["search", "--kind", "resource", "--contains", "/b", "--json"],
    )?;

    let entries: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(entries.as_array().map(|a| a.len()), Some(1));
    assert_eq!(entries[0]["type"], "Observation");
    Ok(())
}

#[test]
fn test_resolve_missing_url_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let result = run_canon(&temp_dir, &["resolve", "http://example.org/nothing"]);
    assert!(result.is_err());
    Ok(())
}
