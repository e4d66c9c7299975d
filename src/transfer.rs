use suppaftp::FtpStream;
use tracing::debug;

use crate::error::BiosubError;
use crate::package::Package;

/// File-existence oracle for the remote transfer endpoint the data files
/// were uploaded to ahead of submission.
pub trait TransferEndpoint: Send + Sync {
    /// Whether `file_name` is present on the endpoint. A connection-level
    /// problem is an `Err`, never a silent `false`.
    fn exists(&self, file_name: &str) -> Result<bool, BiosubError>;
}

/// FTP-backed transfer endpoint, one short-lived session per lookup.
pub struct FtpTransfer {
    host: String,
    username: String,
    password: String,
}

impl FtpTransfer {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl TransferEndpoint for FtpTransfer {
    fn exists(&self, file_name: &str) -> Result<bool, BiosubError> {
        let mut ftp = FtpStream::connect((self.host.as_str(), 21))
            .map_err(|err| BiosubError::Connection(err.to_string()))?;
        ftp.login(&self.username, &self.password)
            .map_err(|err| BiosubError::Connection(err.to_string()))?;
        // SIZE answers 550 for an unknown path, which suppaftp surfaces as
        // an unexpected response, anything else is a transport problem.
        let found = match ftp.size(file_name) {
            Ok(_) => true,
            Err(suppaftp::FtpError::UnexpectedResponse(_)) => false,
            Err(err) => return Err(BiosubError::Connection(err.to_string())),
        };
        let _ = ftp.quit();
        debug!(file_name, found, "transfer endpoint lookup");
        Ok(found)
    }
}

/// Confirm every declared file of the package on the transfer endpoint.
/// Missing files accumulate as remote validation errors on the package, a
/// connection failure aborts the whole check with `Err`.
pub fn remote_check(
    package: &mut Package,
    endpoint: &dyn TransferEndpoint,
) -> Result<(), BiosubError> {
    let file_names: Vec<String> = package
        .files()
        .iter()
        .map(|file| file.file_name.clone())
        .collect();
    for file_name in file_names {
        if !endpoint.exists(&file_name)? {
            package.add_remote_error(
                "fileName",
                format!("File missing on the transfer endpoint: {file_name}"),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use crate::domain::PackageKind;

    use super::*;

    struct FixedEndpoint {
        present: Vec<&'static str>,
    }

    impl TransferEndpoint for FixedEndpoint {
        fn exists(&self, file_name: &str) -> Result<bool, BiosubError> {
            Ok(self.present.contains(&file_name))
        }
    }

    struct BrokenEndpoint;

    impl TransferEndpoint for BrokenEndpoint {
        fn exists(&self, _file_name: &str) -> Result<bool, BiosubError> {
            Err(BiosubError::Connection("connection refused".to_string()))
        }
    }

    const DIGEST: &str = "5d41402abc4b2a76b9719d911017c592";

    fn package_with_files(files: &[&str]) -> (tempfile::TempDir, Package) {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("SAMP01");
        std::fs::create_dir_all(&dir).unwrap();
        let mut metadata = String::from(
            "sample:\n  alias: SAMP01\nanalysis:\n  genomeId: 15\nfiles:\n",
        );
        for file in files {
            metadata.push_str(&format!("  - fileName: {file}\n"));
            std::fs::write(dir.join(format!("{file}.md5")), DIGEST).unwrap();
        }
        std::fs::write(dir.join("analysis.yaml"), metadata).unwrap();
        let dir = Utf8PathBuf::from_path_buf(dir).unwrap();
        let package = Package::load(&dir, PackageKind::Alignment).unwrap();
        (temp, package)
    }

    #[test]
    fn missing_files_accumulate_errors() {
        let (_temp, mut package) = package_with_files(&["a.bam", "b.bam"]);
        let endpoint = FixedEndpoint { present: vec!["a.bam"] };

        remote_check(&mut package, &endpoint).unwrap();
        assert_eq!(package.remote_errors.len(), 1);
        assert!(package.remote_errors[0].message.contains("b.bam"));
    }

    #[test]
    fn connection_failure_aborts_the_check() {
        let (_temp, mut package) = package_with_files(&["a.bam"]);
        let err = remote_check(&mut package, &BrokenEndpoint).unwrap_err();
        assert_matches!(err, BiosubError::Connection(_));
        assert!(package.remote_errors.is_empty());
    }
}
