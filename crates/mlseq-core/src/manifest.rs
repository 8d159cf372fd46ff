//! Model catalog types returned by the conversion service.
//!
//! `GET {backend}/models` answers with a JSON object mapping model names to
//! manifests:
//!
//! ```json
//! {
//!   "diffsinger": {
//!     "format": "midi",
//!     "description": "Singing voice",
//!     "parameters": {
//!       "speaker": { "type": "enum", "values": ["a", "b"], "default": "a" },
//!       "gender": { "type": "float", "range": [-1.0, 1.0], "step": 0.1 }
//!     },
//!     "midi_parameters": ["lyrics"]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Midi parameter name for lyric data.
pub const LYRICS_PARAM: &str = "lyrics";

/// Payload format a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Standard MIDI file bytes.
    #[default]
    Midi,
    /// MusicXML text.
    MusicXml,
}

impl ModelFormat {
    /// Multipart field name and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Midi => "midi",
            ModelFormat::MusicXml => "musicxml",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single option value sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String or enum member.
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

/// Current parameter values, keyed by parameter name.
pub type ModelOptions = BTreeMap<String, OptionValue>;

/// Declared model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterDescriptor {
    /// On/off switch.
    Boolean {
        #[serde(default)]
        default: Option<bool>,
    },
    /// Free text.
    String {
        #[serde(default)]
        default: Option<String>,
    },
    /// Integer, optionally bounded.
    Int {
        #[serde(default)]
        default: Option<i64>,
        #[serde(default)]
        range: Option<(i64, i64)>,
        #[serde(default)]
        step: Option<i64>,
    },
    /// Float, optionally bounded.
    Float {
        #[serde(default)]
        default: Option<f64>,
        #[serde(default)]
        range: Option<(f64, f64)>,
        #[serde(default)]
        step: Option<f64>,
    },
    /// One of a fixed list of strings.
    Enum {
        values: Vec<String>,
        #[serde(default)]
        default: Option<String>,
    },
}

impl ParameterDescriptor {
    /// Default value, falling back to the lower bound or first enum member.
    pub fn default_value(&self) -> Option<OptionValue> {
        match self {
            ParameterDescriptor::Boolean { default } => {
                Some(OptionValue::Bool(default.unwrap_or(false)))
            }
            ParameterDescriptor::String { default } => {
                Some(OptionValue::Str(default.clone().unwrap_or_default()))
            }
            ParameterDescriptor::Int { default, range, .. } => default
                .or(range.map(|(lo, _)| lo))
                .map(OptionValue::Int),
            ParameterDescriptor::Float { default, range, .. } => default
                .or(range.map(|(lo, _)| lo))
                .map(OptionValue::Float),
            ParameterDescriptor::Enum { values, default } => default
                .clone()
                .or_else(|| values.first().cloned())
                .map(OptionValue::Str),
        }
    }

    /// Checks a value against the declared kind, range and members.
    pub fn check(&self, value: &OptionValue) -> Result<(), String> {
        match (self, value) {
            (ParameterDescriptor::Boolean { .. }, OptionValue::Bool(_)) => Ok(()),
            (ParameterDescriptor::String { .. }, OptionValue::Str(_)) => Ok(()),
            (ParameterDescriptor::Int { range, .. }, OptionValue::Int(v)) => match range {
                Some((lo, hi)) if v < lo || v > hi => {
                    Err(format!("{} outside range [{}, {}]", v, lo, hi))
                }
                _ => Ok(()),
            },
            (ParameterDescriptor::Float { range, .. }, value) => {
                let v = match value {
                    OptionValue::Float(v) => *v,
                    OptionValue::Int(v) => *v as f64,
                    other => return Err(format!("expected float, found '{}'", other)),
                };
                match range {
                    Some((lo, hi)) if v < *lo || v > *hi => {
                        Err(format!("{} outside range [{}, {}]", v, lo, hi))
                    }
                    _ => Ok(()),
                }
            }
            (ParameterDescriptor::Enum { values, .. }, OptionValue::Str(s)) => {
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of {:?}", s, values))
                }
            }
            (descriptor, value) => Err(format!(
                "value '{}' does not match parameter kind {}",
                value,
                descriptor.kind()
            )),
        }
    }

    /// Wire name of the parameter kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterDescriptor::Boolean { .. } => "boolean",
            ParameterDescriptor::String { .. } => "string",
            ParameterDescriptor::Int { .. } => "int",
            ParameterDescriptor::Float { .. } => "float",
            ParameterDescriptor::Enum { .. } => "enum",
        }
    }
}

/// Capability descriptor of a conversion model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Accepted payload format.
    #[serde(default, alias = "modelFormat")]
    pub format: ModelFormat,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterDescriptor>,
    /// Auxiliary data channels the model needs (e.g. `"lyrics"`).
    #[serde(default, alias = "midiParameters")]
    pub midi_parameters: Vec<String>,
    /// Silence the model prepends to rendered audio, in seconds at 120 bpm.
    #[serde(default, alias = "offset", skip_serializing_if = "Option::is_none")]
    pub lead_in_seconds: Option<f64>,
}

impl ModelManifest {
    /// Returns true if the model declares the given midi parameter.
    pub fn has_midi_param(&self, param: &str) -> bool {
        self.midi_parameters.iter().any(|p| p == param)
    }

    /// Option set built from every parameter's default.
    pub fn default_options(&self) -> ModelOptions {
        self.parameters
            .iter()
            .filter_map(|(key, descriptor)| descriptor.default_value().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Validates a value for a declared parameter.
    pub fn validate_option(&self, key: &str, value: &OptionValue) -> Result<(), String> {
        match self.parameters.get(key) {
            Some(descriptor) => descriptor
                .check(value)
                .map_err(|e| format!("parameter '{}': {}", key, e)),
            None => Err(format!("unknown parameter '{}'", key)),
        }
    }
}

/// Mapping of model name to manifest.
pub type ModelCatalog = BTreeMap<String, ModelManifest>;

/// The conversion profile selected for a track.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSelection {
    /// Model name; empty when nothing is selected.
    pub model: String,
    /// The model's manifest.
    pub manifest: ModelManifest,
    /// Current parameter values.
    pub options: ModelOptions,
}

impl ModelSelection {
    /// Creates a selection.
    pub fn new(model: impl Into<String>, manifest: ModelManifest, options: ModelOptions) -> Self {
        Self {
            model: model.into(),
            manifest,
            options,
        }
    }

    /// Returns true once a model name has been assigned.
    pub fn is_selected(&self) -> bool {
        !self.model.is_empty()
    }

    /// Payload format of the selected model.
    pub fn format(&self) -> ModelFormat {
        self.manifest.format
    }

    /// Returns true if the selected model declares the midi parameter.
    pub fn has_midi_param(&self, param: &str) -> bool {
        self.manifest.has_midi_param(param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = r#"{
        "diffsinger": {
            "format": "midi",
            "description": "Singing voice",
            "parameters": {
                "speaker": { "type": "enum", "values": ["a", "b"] },
                "gender": { "type": "float", "range": [-1.0, 1.0], "step": 0.1 },
                "breath": { "type": "boolean", "default": true },
                "steps": { "type": "int", "default": 20, "range": [1, 100] }
            },
            "midi_parameters": ["lyrics"],
            "offset": 0.5
        },
        "piano": { "modelFormat": "musicxml" }
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog: ModelCatalog = serde_json::from_str(CATALOG).unwrap();
        let singer = &catalog["diffsinger"];
        assert_eq!(singer.format, ModelFormat::Midi);
        assert!(singer.has_midi_param(LYRICS_PARAM));
        assert_eq!(singer.lead_in_seconds, Some(0.5));
        assert_eq!(catalog["piano"].format, ModelFormat::MusicXml);
        assert!(catalog["piano"].parameters.is_empty());
    }

    #[test]
    fn test_default_options() {
        let catalog: ModelCatalog = serde_json::from_str(CATALOG).unwrap();
        let options = catalog["diffsinger"].default_options();

        let mut expected = ModelOptions::new();
        expected.insert("breath".into(), OptionValue::Bool(true));
        expected.insert("gender".into(), OptionValue::Float(-1.0));
        expected.insert("speaker".into(), OptionValue::Str("a".into()));
        expected.insert("steps".into(), OptionValue::Int(20));
        assert_eq!(options, expected);
    }

    #[test]
    fn test_validate_option() {
        let catalog: ModelCatalog = serde_json::from_str(CATALOG).unwrap();
        let singer = &catalog["diffsinger"];

        assert!(singer
            .validate_option("speaker", &OptionValue::Str("b".into()))
            .is_ok());
        assert!(singer
            .validate_option("speaker", &OptionValue::Str("c".into()))
            .is_err());
        assert!(singer.validate_option("steps", &OptionValue::Int(101)).is_err());
        assert!(singer.validate_option("gender", &OptionValue::Int(0)).is_ok());
        assert!(singer
            .validate_option("breath", &OptionValue::Str("yes".into()))
            .is_err());
        assert!(singer.validate_option("missing", &OptionValue::Bool(true)).is_err());
    }

    #[test]
    fn test_options_serialize_flat() {
        let mut options = ModelOptions::new();
        options.insert("speaker".into(), OptionValue::Str("a".into()));
        options.insert("steps".into(), OptionValue::Int(4));
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(json, r#"{"speaker":"a","steps":4}"#);
    }
}
