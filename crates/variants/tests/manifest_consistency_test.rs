use std::collections::BTreeSet;
use std::path::PathBuf;

use tracker_variants::{full_matrix, Manifest, Variant};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn workspace_manifest() -> Manifest {
    Manifest::load(&workspace_root().join("variants.toml")).unwrap()
}

fn cargo_toml(path: &str) -> toml::Value {
    let raw = std::fs::read_to_string(workspace_root().join(path)).unwrap();
    toml::from_str(&raw).unwrap()
}

fn features_of(path: &str) -> BTreeSet<String> {
    cargo_toml(path)["features"]
        .as_table()
        .unwrap()
        .keys()
        .filter(|k| !matches!(k.as_str(), "default" | "full"))
        .cloned()
        .collect()
}

fn sdk_features() -> BTreeSet<String> {
    features_of("crates/web-sdk/Cargo.toml")
}

#[test]
fn test_manifest_declares_every_sdk_feature() {
    let manifest = workspace_manifest();
    let declared: BTreeSet<String> = manifest
        .feature_names()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(declared, sdk_features());
}

#[test]
fn test_host_forwards_every_sdk_feature() {
    let manifest = workspace_manifest();
    assert_eq!(manifest.build.package, "tracker-host");
    assert_eq!(features_of("src/tracker-host/Cargo.toml"), sdk_features());

    let host = cargo_toml("src/tracker-host/Cargo.toml");
    let forwarded = host["features"].as_table().unwrap();
    for feature in sdk_features() {
        let expected = toml::Value::Array(vec![format!("tracker-web-sdk/{feature}").into()]);
        assert_eq!(forwarded[&feature], expected, "{feature} not forwarded");
    }
    let sdk = &host["dependencies"]["tracker-web-sdk"];
    assert_eq!(sdk["default-features"].as_bool(), Some(false));
}

#[test]
fn test_delivery_uses_url_only_in_tests() {
    let delivery = cargo_toml("crates/delivery/Cargo.toml");
    assert!(delivery["dependencies"].get("url").is_none());
    assert!(delivery["dev-dependencies"].get("url").is_some());
}

#[test]
fn test_every_feature_has_a_marker() {
    let manifest = workspace_manifest();
    let source =
        std::fs::read_to_string(workspace_root().join("crates/web-sdk/src/features.rs")).unwrap();
    for feature in manifest.feature_names() {
        assert!(
            source.contains(&format!("\"{feature}\" =>")),
            "no marker for {feature}"
        );
    }
}

#[test]
fn test_published_variants_are_canonical_and_unique() {
    let manifest = workspace_manifest();
    let variants = manifest.declared_variants().unwrap();
    assert_eq!(variants.len(), manifest.variants.len());
    for variant in &variants {
        let reparsed = Variant::parse(&manifest, &format!("{variant}.js")).unwrap();
        assert_eq!(&reparsed, variant);
    }
}

#[test]
fn test_full_matrix_covers_every_axis() {
    let manifest = workspace_manifest();
    let axes = tracker_variants::matrix::axes(&manifest).len();
    let matrix = full_matrix(&manifest).unwrap();
    assert_eq!(matrix.len(), 1 << axes);
    assert!(matrix.iter().all(|v| !v.has("config")));
    assert_eq!(matrix[0].name(), "script");
}
