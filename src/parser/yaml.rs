use super::types::FeatureFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Features compiled into the binary, used when no path is given
const BUILTIN_FEATURES: &[(&str, &str)] = &[
    (
        "registration.yaml",
        include_str!("../../features/registration.yaml"),
    ),
    ("login.yaml", include_str!("../../features/login.yaml")),
];

/// Parse a YAML feature file
pub fn parse_feature_file(path: &Path) -> Result<FeatureFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_feature_content(&content, path)
}

/// Parse YAML content into a FeatureFile
pub fn parse_feature_content(content: &str, source_path: &Path) -> Result<FeatureFile> {
    let feature: FeatureFile = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid feature file: {}", source_path.display()))?;

    if feature.feature.trim().is_empty() {
        anyhow::bail!("Feature without a name in {}", source_path.display());
    }
    for scenario in &feature.scenarios {
        if scenario.steps.is_empty() {
            anyhow::bail!(
                "Scenario '{}' in {} has no steps",
                scenario.name,
                source_path.display()
            );
        }
    }
    Ok(feature)
}

/// Feature files under `path` (or `path` itself), sorted by name
pub fn collect_feature_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Load every feature under `path`
pub fn load_features(path: &Path) -> Result<Vec<FeatureFile>> {
    collect_feature_files(path)?
        .iter()
        .map(|file| parse_feature_file(file))
        .collect()
}

/// The registration and login features shipped with the binary
pub fn builtin_features() -> Result<Vec<FeatureFile>> {
    BUILTIN_FEATURES
        .iter()
        .map(|(name, content)| parse_feature_content(content, Path::new(name)))
        .collect()
}
