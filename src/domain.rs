use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BiosubError;

/// Lifecycle state assigned to freshly loaded objects.
pub const NEW_STATE: &str = "NEW";
/// Terminal lifecycle state, packages in this state are never re-submitted.
pub const SUBMITTED_STATE: &str = "SUBMITTED";

/// A coded-field value. The archive represents codes as small integers but
/// compares them against enum tags as strings, so the YAML side may write
/// either `genderId: 1` or `genderId: "1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CodeRepr")]
pub struct Code(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Int(i64),
    Text(String),
}

impl From<CodeRepr> for Code {
    fn from(repr: CodeRepr) -> Self {
        match repr {
            CodeRepr::Int(value) => Code(value.to_string()),
            CodeRepr::Text(value) => Code(value),
        }
    }
}

impl Code {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Code {
    fn from(value: &str) -> Self {
        Code(value.to_string())
    }
}

/// Content digest read from a `<file>.md5` sidecar. Exactly 32 hex digits,
/// stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Md5(String);

impl Md5 {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Md5 {
    type Err = BiosubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static MD5_RE: OnceLock<Regex> = OnceLock::new();
        let re = MD5_RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());
        let trimmed = value.trim();
        if !re.is_match(trimmed) {
            return Err(BiosubError::Md5sumFile(format!(
                "'{trimmed}' is not a valid md5sum string"
            )));
        }
        Ok(Self(trimmed.to_lowercase()))
    }
}

impl fmt::Display for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The archive object kinds a package can carry. Ledger log files and
/// submission endpoints are named after these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Sample,
    Analysis,
    Experiment,
    Run,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Sample => "sample",
            ObjectKind::Analysis => "analysis",
            ObjectKind::Experiment => "experiment",
            ObjectKind::Run => "run",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Package flavor, declared by the workspace directory the batch lives in.
/// Unaligned reads submit an experiment/run pair, alignments and variations
/// submit an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Unaligned,
    Alignment,
    Variation,
}

impl PackageKind {
    /// Object kind of the package's metadata document and primary object.
    pub fn primary_kind(&self) -> ObjectKind {
        match self {
            PackageKind::Unaligned => ObjectKind::Experiment,
            PackageKind::Alignment | PackageKind::Variation => ObjectKind::Analysis,
        }
    }

    /// Detect the kind from a workspace batch directory name
    /// (`FQ.*` holds unaligned reads, `BAM.*` alignments, `VCF.*` variations).
    pub fn from_batch_dir(name: &str) -> Option<Self> {
        let prefix = name.split('.').next()?;
        match prefix {
            "FQ" => Some(PackageKind::Unaligned),
            "BAM" => Some(PackageKind::Alignment),
            "VCF" => Some(PackageKind::Variation),
            _ => None,
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Unaligned => write!(f, "unaligned"),
            PackageKind::Alignment => write!(f, "alignment"),
            PackageKind::Variation => write!(f, "variation"),
        }
    }
}

impl FromStr for PackageKind {
    type Err = BiosubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "unaligned" => Ok(PackageKind::Unaligned),
            "alignment" => Ok(PackageKind::Alignment),
            "variation" => Ok(PackageKind::Variation),
            _ => Err(BiosubError::InvalidKind(value.to_string())),
        }
    }
}

/// One `{tag, value}` pair of a remotely defined enum category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub tag: String,
    pub value: String,
}

/// A soft, accumulated finding from local validation. Never raised as an
/// error, a package may carry any number of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub object_type: String,
    pub object_alias: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' field {}: {}",
            self.object_type, self.object_alias, self.field, self.message
        )
    }
}

/// A soft finding from the remote file-existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for RemoteValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}: {}", self.field, self.message)
    }
}

/// Free-form `{tag, value}` attribute attached to submitted objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub tag: String,
    pub value: String,
}

impl Attribute {
    pub fn new(tag: &str, value: &str) -> Self {
        Self {
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }
}

/// Declared data file plus the checksums resolved from its sidecars.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub checksum_method: String,
    pub checksum: Md5,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unencrypted_checksum: Option<Md5>,
}

/// The biological sample a package describes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub subject_id: String,
    #[serde(default)]
    pub gender_id: Option<Code>,
    #[serde(default)]
    pub case_or_control_id: Option<Code>,
    #[serde(default)]
    pub phenotype: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(skip)]
    pub remote_id: Option<String>,
    #[serde(skip)]
    pub state: Option<String>,
}

/// Analysis record for alignment and variation packages. The alias is never
/// authored in metadata, it is derived from the directory name or restored
/// from the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(skip_deserializing)]
    pub alias: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genome_id: Option<Code>,
    #[serde(default)]
    pub experiment_type_id: serde_yaml::Value,
    #[serde(default)]
    pub chromosome_references: serde_yaml::Value,
    #[serde(default, skip_deserializing)]
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(skip)]
    pub remote_id: Option<String>,
    #[serde(skip)]
    pub state: Option<String>,
}

/// Sequencing experiment record for unaligned packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    #[serde(skip_deserializing)]
    pub alias: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub design_description: Option<String>,
    #[serde(default)]
    pub instrument_model_id: Option<Code>,
    #[serde(default)]
    pub library_source_id: Option<Code>,
    #[serde(default)]
    pub library_selection_id: Option<Code>,
    #[serde(default)]
    pub library_strategy_id: Option<Code>,
    #[serde(default)]
    pub library_layout_id: Option<Code>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(skip)]
    pub remote_id: Option<String>,
    #[serde(skip)]
    pub state: Option<String>,
}

/// Sequencing run record, paired with an experiment in unaligned packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(skip_deserializing)]
    pub alias: String,
    #[serde(default)]
    pub run_file_type_id: Option<Code>,
    #[serde(default, skip_deserializing)]
    pub files: Vec<FileDescriptor>,
    #[serde(skip)]
    pub remote_id: Option<String>,
    #[serde(skip)]
    pub state: Option<String>,
}

/// Common handle over the objects the status ledger tracks.
pub trait Trackable {
    fn kind(&self) -> ObjectKind;
    fn alias(&self) -> &str;
    fn set_alias(&mut self, alias: String);
    fn remote_id(&self) -> Option<&str>;
    fn set_remote_id(&mut self, id: String);
    fn state(&self) -> &str;
    fn set_state(&mut self, state: String);
}

macro_rules! impl_trackable {
    ($ty:ty, $kind:expr) => {
        impl Trackable for $ty {
            fn kind(&self) -> ObjectKind {
                $kind
            }

            fn alias(&self) -> &str {
                &self.alias
            }

            fn set_alias(&mut self, alias: String) {
                self.alias = alias;
            }

            fn remote_id(&self) -> Option<&str> {
                self.remote_id.as_deref()
            }

            fn set_remote_id(&mut self, id: String) {
                self.remote_id = Some(id);
            }

            fn state(&self) -> &str {
                self.state.as_deref().unwrap_or(NEW_STATE)
            }

            fn set_state(&mut self, state: String) {
                self.state = Some(state);
            }
        }
    };
}

impl_trackable!(Sample, ObjectKind::Sample);
impl_trackable!(Analysis, ObjectKind::Analysis);
impl_trackable!(Experiment, ObjectKind::Experiment);
impl_trackable!(Run, ObjectKind::Run);
