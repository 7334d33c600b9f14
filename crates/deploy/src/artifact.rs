//! Hardhat compilation artifacts.
//!
//! A contract `Name` compiled by Hardhat produces `artifacts/<source path>/Name.json` (ABI and
//! creation bytecode) next to `Name.dbg.json`, which points at the `build-info` file holding
//! the compiler version and the standard JSON input used for source verification.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::Deserialize;

use crate::DeployError;

const BUILD_INFO_DIR: &str = "build-info";

/// A compiled contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    #[serde(skip)]
    pub path: PathBuf,
}

impl Artifact {
    /// Fully qualified name as expected by explorers, e.g. `contracts/Zars.sol:Zars`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Load the compiler input and version this artifact was built with.
    pub fn build_info(&self) -> anyhow::Result<BuildInfo> {
        let dbg_path = self.path.with_extension("dbg.json");
        let content = std::fs::read_to_string(&dbg_path)
            .with_context(|| format!("Failed to read {}", dbg_path.display()))?;
        let dbg: DebugFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        let build_info_path = dbg_path
            .parent()
            .context("Artifact path must have a parent directory")?
            .join(dbg.build_info);
        let content = std::fs::read_to_string(&build_info_path)
            .with_context(|| format!("Failed to read {}", build_info_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", build_info_path.display()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    /// Relative to the directory of the debug file.
    build_info: PathBuf,
}

/// Compiler version and standard JSON input of a compilation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// e.g. `0.8.20+commit.a1b79de6`.
    pub solc_long_version: String,
    pub input: serde_json::Value,
}

impl BuildInfo {
    /// Compiler version in the `v0.8.20+commit.a1b79de6` form explorers expect.
    pub fn compiler_version(&self) -> String {
        format!("v{}", self.solc_long_version)
    }
}

/// Artifacts indexed by contract name.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    artifacts: BTreeMap<String, Artifact>,
}

impl Artifacts {
    /// Load the artifacts of `names` from a Hardhat artifacts directory.
    ///
    /// Every requested name must be found exactly once.
    pub fn load_hardhat<'a>(
        dir: &Path,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DeployError> {
        let mut files = Vec::new();
        collect_json_files(dir, &mut files).map_err(|source| DeployError::Artifact {
            artifact: dir.display().to_string(),
            source,
        })?;

        let mut artifacts = Self::default();
        for name in names {
            let file_name = format!("{name}.json");
            let mut matches = files
                .iter()
                .filter(|path| path.file_name().is_some_and(|f| f == file_name.as_str()));

            let artifact_error = |source| DeployError::Artifact {
                artifact: name.to_string(),
                source,
            };

            let path = matches.next().ok_or_else(|| {
                artifact_error(anyhow::anyhow!(
                    "no {file_name} found under {}",
                    dir.display()
                ))
            })?;
            if let Some(other) = matches.next() {
                return Err(artifact_error(anyhow::anyhow!(
                    "ambiguous artifact: {} and {}",
                    path.display(),
                    other.display()
                )));
            }

            let artifact = read_artifact(path).map_err(artifact_error)?;
            tracing::debug!(
                contract = %name,
                source = %artifact.source_name,
                path = %path.display(),
                "Artifact loaded"
            );
            artifacts.insert(artifact);
        }

        Ok(artifacts)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, name: &str) -> Result<&Artifact, DeployError> {
        self.artifacts
            .get(name)
            .ok_or_else(|| DeployError::Artifact {
                artifact: name.to_string(),
                source: anyhow::anyhow!("artifact not loaded"),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }
}

fn read_artifact(path: &Path) -> anyhow::Result<Artifact> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut artifact: Artifact = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if artifact.bytecode.is_empty() {
        anyhow::bail!(
            "{} has no creation bytecode (abstract contract or interface?)",
            path.display()
        );
    }
    artifact.path = path.to_path_buf();
    Ok(artifact)
}

/// Contract artifact files below `dir`, skipping build info and debug files.
fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == BUILD_INFO_DIR) {
                continue;
            }
            collect_json_files(&path, files)?;
        } else {
            let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
            if name.ends_with(".json") && !name.ends_with(".dbg.json") {
                files.push(path);
            }
        }
    }

    Ok(())
}
