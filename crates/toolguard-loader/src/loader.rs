//! Directory-walking rule loader.
//!
//! Recursively picks up `.yaml`/`.yml` files (plain rule sets) and
//! `.signed.json` files (signed bundles), applying the signing-mode
//! policy to the latter, then builds a fresh [`LoadedRules`] index.

use crate::error::{LoaderError, LoaderResult};
use crate::fs::{FileSystem, RealFileSystem};
use crate::policy::{self, PolicyOutcome};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use toolguard_core::config::SigningPolicyConfig;
use toolguard_core::{LoadedRules, Rule, RuleSet};
use toolguard_signing::{verify_bundle, SignedBundle, SigningConfig};

pub struct RuleLoader {
    fs: Box<dyn FileSystem>,
    signing: Option<SigningPolicyConfig>,
    sources: Vec<(String, RuleSet)>,
    loaded: LoadedRules,
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new(Box::new(RealFileSystem), None)
    }
}

/// A rule file may be a full rule-set document, a bare list of rules, or
/// a single rule object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleDocument {
    Set(RuleSet),
    List(Vec<Rule>),
    Single(Rule),
}

impl RuleDocument {
    fn into_rule_set(self, source_id: &str) -> RuleSet {
        match self {
            RuleDocument::Set(rs) => rs,
            RuleDocument::List(rules) => synthesized_set(source_id, rules),
            RuleDocument::Single(rule) => synthesized_set(source_id, vec![rule]),
        }
    }
}

fn synthesized_set(source_id: &str, rules: Vec<Rule>) -> RuleSet {
    RuleSet {
        version: toolguard_core::model::SUPPORTED_RULESET_VERSION.to_string(),
        name: source_id.to_string(),
        description: None,
        rules,
        settings: None,
    }
}

impl RuleLoader {
    pub fn new(fs: Box<dyn FileSystem>, signing: Option<SigningPolicyConfig>) -> Self {
        Self {
            fs,
            signing,
            sources: Vec::new(),
            loaded: LoadedRules::default(),
        }
    }

    pub fn loaded_rules(&self) -> &LoadedRules {
        &self.loaded
    }

    /// Drop all rule sets loaded so far.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.rebuild_index();
    }

    /// Parse one YAML rule document from memory and add its rules under
    /// the given source identifier.
    pub fn load_from_string(&mut self, source_id: &str, content: &str) -> LoaderResult<()> {
        match serde_yaml::from_str::<RuleDocument>(content) {
            Ok(doc) => {
                let rule_set = doc.into_rule_set(source_id);
                if let Err(e) = rule_set.validate_version() {
                    tracing::warn!(source = source_id, error = %e, "skipping rule document with unsupported version");
                } else {
                    self.add_rule_set(source_id.to_string(), rule_set);
                }
            }
            Err(e) => {
                tracing::warn!(source = source_id, error = %e, "skipping unparseable rule document");
            }
        }
        Ok(())
    }

    /// Parse one `.yaml`/`.yml` file and add its rules, or verify+add one
    /// `.signed.json` bundle according to the signing-mode policy.
    pub fn load_from_file(&mut self, path: &Path) -> LoaderResult<()> {
        let path_str = path.to_string_lossy().to_string();
        let content = self.fs.read_file(path).map_err(|source| LoaderError::Io {
            path: path_str.clone(),
            source,
        })?;

        if is_signed_bundle(path) {
            if let Some(rule_set) = self.load_signed_bundle(&path_str, &content)? {
                self.add_rule_set(path_str, rule_set);
            }
            Ok(())
        } else if is_yaml(path) {
            self.load_from_string(&path_str, &content)
        } else {
            Ok(())
        }
    }

    fn load_signed_bundle(&self, path: &str, content: &str) -> LoaderResult<Option<RuleSet>> {
        match policy::decide(self.signing.as_ref()) {
            PolicyOutcome::SkipWithWarning(reason) => {
                tracing::warn!(path, reason, "skipping signed bundle");
                Ok(None)
            }
            PolicyOutcome::VerifyRequired => match self.verify_bundle_file(path, content) {
                Ok(rule_set) => Ok(Some(rule_set)),
                Err(e) => {
                    tracing::error!(path, error = %e, "signed bundle failed verification and signing is required");
                    Err(e)
                }
            },
            PolicyOutcome::VerifyBestEffort => match self.verify_bundle_file(path, content) {
                Ok(rule_set) => Ok(Some(rule_set)),
                Err(e) => {
                    tracing::warn!(path, error = %e, "skipping signed bundle that failed verification");
                    Ok(None)
                }
            },
        }
    }

    fn verify_bundle_file(&self, path: &str, content: &str) -> LoaderResult<RuleSet> {
        let bundle = SignedBundle::from_json(content).map_err(|source| LoaderError::BundleFormat {
            path: path.to_string(),
            source,
        })?;

        let config = self
            .signing
            .as_ref()
            .expect("bundles are only verified when signing settings are present");
        verify_bundle(&bundle, &trust_config(config)).map_err(|source| {
            LoaderError::BundleVerification {
                path: path.to_string(),
                source,
            }
        })?;

        let rule_set: RuleSet =
            serde_json::from_str(&bundle.payload).map_err(|source| LoaderError::BundlePayload {
                path: path.to_string(),
                source,
            })?;
        rule_set
            .validate_version()
            .map_err(|_| LoaderError::UnsupportedRuleSetVersion {
                path: path.to_string(),
                version: rule_set.version.clone(),
            })?;
        Ok(rule_set)
    }

    /// Recursively load every `.yaml`/`.yml`/`.signed.json` file under
    /// `root`. Clears previously loaded rule sets first, so repeated calls
    /// against the same directory never accumulate duplicates.
    pub fn load_from_directory(&mut self, root: &Path) -> LoaderResult<()> {
        self.clear();
        let paths = self.fs.walk_files(root).map_err(|source| LoaderError::Io {
            path: root.to_string_lossy().to_string(),
            source,
        })?;
        let mut relevant: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| is_yaml(p) || is_signed_bundle(p))
            .collect();
        relevant.sort();
        for path in relevant {
            self.load_from_file(&path)?;
        }
        Ok(())
    }

    /// Re-run `load_from_directory` against the same root used last time.
    pub fn reload(&mut self, root: &Path) -> LoaderResult<()> {
        self.load_from_directory(root)
    }

    pub fn add_rules(&mut self, rule_set: RuleSet) {
        self.add_rule_set(rule_set.name.clone(), rule_set);
    }

    fn add_rule_set(&mut self, source_id: String, rule_set: RuleSet) {
        self.sources.push((source_id, rule_set));
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.loaded = LoadedRules::from_sources(&self.sources)
            .expect("rule sets are version-checked before being added");
    }
}

fn trust_config(config: &SigningPolicyConfig) -> SigningConfig {
    SigningConfig {
        public_keys: config.public_keys.clone(),
        allow_rotation: config.allow_rotation,
        pinned_version: config.pinned_version.clone(),
        pinned_hash: config.pinned_hash.clone(),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn is_signed_bundle(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".signed.json")
}
