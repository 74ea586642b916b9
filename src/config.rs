//! Engine tuning parameters, loadable from a TOML file the way the rest
//! of this family of tools keeps its configuration: plain structs with
//! serde defaults, deserialised straight out of [`toml_edit`]'s document
//! model rather than hand-rolled parsing.

use serde::{Deserialize, Serialize};

fn default_pca_components() -> usize {
    2
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of PCA components to retain. Clustering only ever looks at
    /// the first two, the rest are diagnostic.
    #[serde(rename = "pca-components")]
    pub pca_components: usize,

    /// Force a specific cluster count instead of using the automatic
    /// `determine_k` heuristic. Mostly useful for tests and demos.
    #[serde(rename = "cluster-count-override")]
    pub cluster_count_override: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pca_components: default_pca_components(),
            cluster_count_override: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml_edit::de::from_str(input)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.pca_components, 2);
        assert_eq!(cfg.cluster_count_override, None);
    }

    #[test]
    fn overrides_parse() {
        let cfg = EngineConfig::from_toml_str("cluster-count-override = 4\n").unwrap();
        assert_eq!(cfg.cluster_count_override, Some(4));
    }
}
