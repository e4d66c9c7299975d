use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::domain::{
    Analysis, Attribute, Experiment, FileDescriptor, Md5, PackageKind, RemoteValidationError, Run,
    Sample, Trackable, ValidationError,
};
use crate::error::BiosubError;
use crate::ledger;

const ENCRYPTED_SUFFIX: &str = ".gpg";

/// The scientific record a package submits alongside its sample.
#[derive(Debug, Clone)]
pub enum PrimaryObject {
    Analysis(Analysis),
    Sequencing { experiment: Experiment, run: Run },
}

/// One submission directory, loaded into memory. Lives for a single
/// invocation, durable state is only ever in the status ledger.
#[derive(Debug, Clone)]
pub struct Package {
    pub path: Utf8PathBuf,
    pub kind: PackageKind,
    pub sample: Sample,
    pub primary: PrimaryObject,
    pub local_errors: Vec<ValidationError>,
    pub remote_errors: Vec<RemoteValidationError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    #[serde(default)]
    file_name: Option<String>,
}

impl Package {
    /// Read the kind-specific metadata document and the md5 sidecars, then
    /// restore the latest known ledger state for every tracked object.
    /// Every failure here is structural: the directory is not a usable
    /// package and gets dropped from the batch.
    pub fn load(path: &Utf8Path, kind: PackageKind) -> Result<Self, BiosubError> {
        let path = Utf8PathBuf::from(path.as_str().trim_end_matches('/'));
        let directory = path
            .file_name()
            .ok_or_else(|| malformed(&path, "directory has no name"))?
            .to_string();

        let metadata_file = path.join(format!("{}.yaml", kind.primary_kind()));
        let content = fs::read_to_string(metadata_file.as_std_path()).map_err(|_| {
            malformed(&path, &format!("missing metadata document {metadata_file}"))
        })?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|err| malformed(&path, &format!("unparsable metadata: {err}")))?;

        match kind {
            PackageKind::Alignment | PackageKind::Variation => {
                forbid_authored_alias(&path, &doc, "analysis")?;
            }
            PackageKind::Unaligned => {
                forbid_authored_alias(&path, &doc, "experiment")?;
                forbid_authored_alias(&path, &doc, "run")?;
            }
        }

        let mut sample: Sample = section(&path, &doc, "sample")?;
        let files = parse_files(&path, &doc)?;

        let mut primary = match kind {
            PackageKind::Alignment | PackageKind::Variation => {
                let mut analysis: Analysis = section(&path, &doc, "analysis")?;
                analysis.alias = directory.clone();
                analysis.files = files;
                // The archive rejects analyses without at least one attribute.
                analysis
                    .attributes
                    .push(Attribute::new("submitted_using", "biosub"));
                PrimaryObject::Analysis(analysis)
            }
            PackageKind::Unaligned => {
                let mut experiment: Experiment = section(&path, &doc, "experiment")?;
                let mut run: Run = section(&path, &doc, "run")?;
                experiment.alias = directory.clone();
                run.alias = directory.clone();
                run.files = files;
                PrimaryObject::Sequencing { experiment, run }
            }
        };

        ledger::restore(&path, &mut sample);
        match &mut primary {
            PrimaryObject::Analysis(analysis) => ledger::restore(&path, analysis),
            PrimaryObject::Sequencing { experiment, run } => {
                ledger::restore(&path, experiment);
                ledger::restore(&path, run);
            }
        }

        Ok(Self {
            path,
            kind,
            sample,
            primary,
            local_errors: Vec::new(),
            remote_errors: Vec::new(),
        })
    }

    pub fn directory_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    /// Lifecycle state of the package, taken from the object submitted last
    /// in its kind's submission order.
    pub fn status(&self) -> &str {
        match &self.primary {
            PrimaryObject::Analysis(analysis) => analysis.state(),
            PrimaryObject::Sequencing { run, .. } => run.state(),
        }
    }

    pub fn files(&self) -> &[FileDescriptor] {
        match &self.primary {
            PrimaryObject::Analysis(analysis) => &analysis.files,
            PrimaryObject::Sequencing { run, .. } => &run.files,
        }
    }

    pub fn add_local_error(&mut self, object_type: &str, alias: &str, field: &str, message: String) {
        self.local_errors.push(ValidationError {
            object_type: object_type.to_string(),
            object_alias: alias.to_string(),
            field: field.to_string(),
            message,
        });
    }

    pub fn add_remote_error(&mut self, field: &str, message: String) {
        self.remote_errors.push(RemoteValidationError {
            field: field.to_string(),
            message,
        });
    }
}

fn malformed(path: &Utf8Path, reason: &str) -> BiosubError {
    BiosubError::MalformedPackage {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn section<T: serde::de::DeserializeOwned>(
    path: &Utf8Path,
    doc: &serde_yaml::Value,
    name: &str,
) -> Result<T, BiosubError> {
    let value = doc
        .get(name)
        .ok_or_else(|| malformed(path, &format!("missing '{name}' section")))?;
    serde_yaml::from_value(value.clone())
        .map_err(|err| malformed(path, &format!("invalid '{name}' section: {err}")))
}

/// Aliases are never authored: they come from the directory name or from a
/// prior submission via the ledger.
fn forbid_authored_alias(
    path: &Utf8Path,
    doc: &serde_yaml::Value,
    name: &str,
) -> Result<(), BiosubError> {
    if doc.get(name).and_then(|s| s.get("alias")).is_some() {
        return Err(malformed(
            path,
            &format!("can not have 'alias' for '{name}' in metadata"),
        ));
    }
    Ok(())
}

fn parse_files(path: &Utf8Path, doc: &serde_yaml::Value) -> Result<Vec<FileDescriptor>, BiosubError> {
    let entries = doc
        .get("files")
        .ok_or_else(|| malformed(path, "missing 'files' section"))?;
    let entries: Vec<FileEntry> = serde_yaml::from_value(entries.clone())
        .map_err(|err| malformed(path, &format!("invalid 'files' section: {err}")))?;

    let mut files = Vec::new();
    for entry in entries {
        // File entries without a fileName are silently skipped.
        let Some(file_name) = entry.file_name else {
            continue;
        };
        let data_file_name = file_name.rsplit('/').next().unwrap_or(&file_name);

        let checksum = read_md5_sidecar(&path.join(format!("{data_file_name}.md5")))?;
        let unencrypted_checksum = match data_file_name.strip_suffix(ENCRYPTED_SUFFIX) {
            Some(plain_name) => Some(read_md5_sidecar(&path.join(format!("{plain_name}.md5")))?),
            None => None,
        };

        files.push(FileDescriptor {
            file_name,
            checksum_method: "md5".to_string(),
            checksum,
            unencrypted_checksum,
        });
    }
    Ok(files)
}

fn read_md5_sidecar(sidecar: &Utf8Path) -> Result<Md5, BiosubError> {
    let content = fs::read_to_string(sidecar.as_std_path()).map_err(|_| {
        BiosubError::Md5sumFile(format!("please make sure md5sum file '{sidecar}' exists"))
    })?;
    let first_line = content.lines().next().unwrap_or_default();
    first_line.parse().map_err(|_| {
        BiosubError::Md5sumFile(format!(
            "please make sure md5sum file '{sidecar}' contains a valid md5sum string"
        ))
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const DIGEST: &str = "5d41402abc4b2a76b9719d911017c592";

    fn write_package(root: &std::path::Path, dir: &str, metadata: &str) -> Utf8PathBuf {
        let package_dir = root.join(dir);
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(package_dir.join("analysis.yaml"), metadata).unwrap();
        Utf8PathBuf::from_path_buf(package_dir).unwrap()
    }

    #[test]
    fn load_alignment_package() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_package(
            temp.path(),
            "SAMP01",
            concat!(
                "sample:\n  alias: SAMP01\n  subjectId: DO1234\n  genderId: 1\n",
                "  caseOrControlId: 2\n  phenotype: melanoma\n",
                "analysis:\n  genomeId: 15\n  experimentTypeId: [4]\n  chromosomeReferences: []\n",
                "files:\n  - fileName: SAMP01.bam.gpg\n",
            ),
        );
        fs::write(dir.join("SAMP01.bam.gpg.md5").as_std_path(), DIGEST).unwrap();
        fs::write(dir.join("SAMP01.bam.md5").as_std_path(), DIGEST).unwrap();

        let package = Package::load(&dir, PackageKind::Alignment).unwrap();
        assert_eq!(package.sample.alias, "SAMP01");
        assert_eq!(package.files().len(), 1);
        assert_eq!(package.files()[0].checksum.as_str(), DIGEST);
        assert!(package.files()[0].unencrypted_checksum.is_some());
        assert_eq!(package.status(), crate::domain::NEW_STATE);

        let PrimaryObject::Analysis(analysis) = &package.primary else {
            panic!("expected analysis primary object");
        };
        assert_eq!(analysis.alias, "SAMP01");
        assert_eq!(analysis.attributes[0].tag, "submitted_using");
    }

    #[test]
    fn load_rejects_authored_alias() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_package(
            temp.path(),
            "SAMP01",
            concat!(
                "sample:\n  alias: SAMP01\n",
                "analysis:\n  alias: sneaky\n  genomeId: 15\n",
                "files: []\n",
            ),
        );

        let err = Package::load(&dir, PackageKind::Alignment).unwrap_err();
        assert_matches!(err, BiosubError::MalformedPackage { .. });
    }

    #[test]
    fn load_rejects_missing_sidecar() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_package(
            temp.path(),
            "SAMP01",
            concat!(
                "sample:\n  alias: SAMP01\n",
                "analysis:\n  genomeId: 15\n",
                "files:\n  - fileName: SAMP01.bam\n",
            ),
        );

        let err = Package::load(&dir, PackageKind::Alignment).unwrap_err();
        assert_matches!(err, BiosubError::Md5sumFile(_));
    }

    #[test]
    fn load_rejects_invalid_sidecar_content() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_package(
            temp.path(),
            "SAMP01",
            concat!(
                "sample:\n  alias: SAMP01\n",
                "analysis:\n  genomeId: 15\n",
                "files:\n  - fileName: SAMP01.bam\n",
            ),
        );
        fs::write(dir.join("SAMP01.bam.md5").as_std_path(), "not-a-checksum").unwrap();

        let err = Package::load(&dir, PackageKind::Alignment).unwrap_err();
        assert_matches!(err, BiosubError::Md5sumFile(_));
    }

    #[test]
    fn load_skips_file_entries_without_name() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_package(
            temp.path(),
            "SAMP01",
            concat!(
                "sample:\n  alias: SAMP01\n",
                "analysis:\n  genomeId: 15\n",
                "files:\n  - fileType: bam\n",
            ),
        );

        let package = Package::load(&dir, PackageKind::Alignment).unwrap();
        assert!(package.files().is_empty());
    }

    #[test]
    fn load_missing_metadata_is_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("SAMP01")).unwrap();
        fs::create_dir_all(dir.as_std_path()).unwrap();

        let err = Package::load(&dir, PackageKind::Alignment).unwrap_err();
        assert_matches!(err, BiosubError::MalformedPackage { .. });
    }
}
