//! JSON run configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bf_folder::{PriorParameters, RunInputs, RunMetadata, UnfoldParameters};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// One engine run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Result bundle path.
    pub output: PathBuf,
    pub inputs: RunInputs,
    #[serde(default)]
    pub metadata: RunMetadata,
    #[serde(default)]
    pub prior: PriorParameters,
    #[serde(default)]
    pub unfold: UnfoldParameters,
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_folder::{AlgorithmKind, PriorFamily};

    #[test]
    fn test_minimal_config_gets_defaults() {
        let src = r#"{
            "output": "out/run.json",
            "inputs": {
                "prior": {"file": "in.json", "name": "hPrior"},
                "smeared": {"file": "in.json", "name": "hSmeared"},
                "measured": {"file": "in.json", "name": "hMeasured"},
                "response": {"file": "in.json", "name": "hResponse"},
                "efficiency": {"file": "in.json", "name": "hEfficiency"}
            },
            "unfold": {"algorithm": "svd", "regularization": 6}
        }"#;
        let c: RunConfig = serde_json::from_str(src).unwrap();
        assert_eq!(c.unfold.algorithm, AlgorithmKind::Svd);
        assert_eq!(c.unfold.regularization, 6);
        assert_eq!(c.unfold.mc_iterations, UnfoldParameters::default().mc_iterations);
        assert_eq!(c.prior.family, PriorFamily::EmbeddingPassthrough);
        assert_eq!(c.metadata, RunMetadata::default());
    }
}
