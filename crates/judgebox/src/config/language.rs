use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Languages the judge knows how to compile and run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Python,
    Javascript,
    Java,
    Cpp,
    C,
}

impl LanguageId {
    /// Every supported language, in display order
    pub const ALL: [LanguageId; 5] = [
        LanguageId::Python,
        LanguageId::Javascript,
        LanguageId::Java,
        LanguageId::Cpp,
        LanguageId::C,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::Javascript => "javascript",
            LanguageId::Java => "java",
            LanguageId::Cpp => "cpp",
            LanguageId::C => "c",
        }
    }
}

impl FromStr for LanguageId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ConfigError::LanguageNotFound(s.to_string()))
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a programming language, as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Human-readable name for the language (e.g., "C++ 17 (GCC)")
    pub name: String,

    /// Container image used by the sandboxed executor
    pub image: String,

    /// File extension
    pub extension: FileExtension,

    /// Source file name inside the workspace. Java needs this to match
    /// the public class (`Main.java`).
    pub source_name: String,

    /// Compile command (None for interpreted languages)
    /// Placeholders: {source}, {build}
    #[serde(default)]
    pub compile: Option<Vec<String>>,

    /// Run command
    /// Placeholders: {source}, {build}
    pub run: Vec<String>,

    /// Wall-clock limit for the run step in milliseconds
    pub timeout_ms: u64,

    /// Extra environment variables for compile and run
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl LanguageConfig {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    pub(crate) fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let invalid = |what: &str| ConfigError::Invalid(format!("language '{id}' has {what}"));

        if self.name.is_empty() {
            return Err(invalid("empty name"));
        }
        if self.image.is_empty() {
            return Err(invalid("empty image"));
        }
        if self.extension.is_empty() {
            return Err(invalid("empty extension"));
        }
        if self.source_name.is_empty()
            || self.source_name.contains('/')
            || self.source_name.contains("..")
        {
            return Err(invalid("an invalid source name"));
        }
        if self.run.is_empty() {
            return Err(invalid("empty run command"));
        }
        if let Some(ref compile) = self.compile
            && compile.is_empty()
        {
            return Err(invalid("empty compile command"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("a zero timeout"));
        }
        Ok(())
    }
}

/// Expand placeholders in the given command
pub fn expand_command(command: &[String], source: &str, build_dir: &str) -> Vec<String> {
    command
        .iter()
        .map(|arg| arg.replace("{source}", source).replace("{build}", build_dir))
        .collect()
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl fmt::Display for FileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
