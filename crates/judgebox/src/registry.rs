//! Language profile registry
//!
//! Resolves a language id to the immutable profile the executors work from.
//! Built once from configuration; there is no mutation API.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::config::{Config, ConfigError, LanguageConfig, LanguageId, expand_command};

/// How to compile and run one language
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub id: LanguageId,
    pub name: String,
    pub image: String,
    pub extension: String,
    pub source_name: String,
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    pub timeout: Duration,
    pub env: HashMap<String, String>,
}

impl LanguageProfile {
    fn from_config(id: LanguageId, lang: &LanguageConfig) -> Self {
        Self {
            id,
            name: lang.name.clone(),
            image: lang.image.clone(),
            extension: lang.extension.to_string(),
            source_name: lang.source_name.clone(),
            compile: lang.compile.clone(),
            run: lang.run.clone(),
            timeout: Duration::from_millis(lang.timeout_ms),
            env: lang.env.clone(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Compile argv with placeholders expanded, if the language is compiled
    pub fn compile_command(&self, build_dir: &str) -> Option<Vec<String>> {
        self.compile
            .as_ref()
            .map(|cmd| expand_command(cmd, &self.source_name, build_dir))
    }

    /// Run argv with placeholders expanded
    pub fn run_command(&self, build_dir: &str) -> Vec<String> {
        expand_command(&self.run, &self.source_name, build_dir)
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
#[error("unsupported language '{0}'")]
pub struct UnsupportedLanguage(pub String);

/// Read-only table of language profiles
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: BTreeMap<LanguageId, LanguageProfile>,
}

impl LanguageRegistry {
    /// Build the registry from the configured languages
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut profiles = BTreeMap::new();
        for (key, lang) in &config.languages {
            let id: LanguageId = key.parse()?;
            profiles.insert(id, LanguageProfile::from_config(id, lang));
        }
        Ok(Self { profiles })
    }

    /// Resolve a language id string to its profile
    pub fn lookup(&self, language: &str) -> Result<&LanguageProfile, UnsupportedLanguage> {
        language
            .parse::<LanguageId>()
            .ok()
            .and_then(|id| self.profiles.get(&id))
            .ok_or_else(|| UnsupportedLanguage(language.to_string()))
    }

    pub fn get(&self, id: LanguageId) -> Option<&LanguageProfile> {
        self.profiles.get(&id)
    }

    /// Profiles in language id order
    pub fn iter(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
