use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::Utf8Path;
use tracing::warn;

use crate::domain::Trackable;
use crate::error::BiosubError;

const STATUS_DIR: &str = ".status";

/// One submission attempt as logged in a `.status/<kind>.log` file:
/// `id \t alias \t state \t unix-timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub id: String,
    pub alias: String,
    pub state: String,
    pub recorded_at: i64,
}

impl StatusRecord {
    /// Parse one ledger line. Lines that do not carry all four columns are
    /// ignored by the callers rather than treated as corruption.
    pub fn parse(line: &str) -> Option<Self> {
        let mut columns = line.trim_end_matches('\n').split('\t');
        let id = columns.next()?.to_string();
        let alias = columns.next()?.to_string();
        let state = columns.next()?.to_string();
        let recorded_at = columns.next()?.trim().parse().ok()?;
        Some(Self {
            id,
            alias,
            state,
            recorded_at,
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\n",
            self.id, self.alias, self.state, self.recorded_at
        )
    }
}

fn log_path(package_dir: &Utf8Path, kind: &str) -> camino::Utf8PathBuf {
    package_dir.join(STATUS_DIR).join(format!("{kind}.log"))
}

/// All records of one object kind, in append order. An absent or unreadable
/// log yields an empty history.
pub fn read_records(package_dir: &Utf8Path, kind: &str) -> Vec<StatusRecord> {
    let path = log_path(package_dir, kind);
    let Ok(content) = fs::read_to_string(path.as_std_path()) else {
        return Vec::new();
    };
    content.lines().filter_map(StatusRecord::parse).collect()
}

/// Current state of one object kind, defined as the last appended record.
pub fn latest(package_dir: &Utf8Path, kind: &str) -> Option<StatusRecord> {
    read_records(package_dir, kind).into_iter().last()
}

/// Re-adopt the most recent logged alias and state into a freshly loaded
/// object. When the in-memory alias is already set and differs from the
/// logged one the record belongs to a different logical object and nothing
/// is imported.
pub fn restore(package_dir: &Utf8Path, object: &mut dyn Trackable) {
    let kind = object.kind();
    let Some(record) = latest(package_dir, kind.as_str()) else {
        return;
    };

    if !object.alias().is_empty() && object.alias() != record.alias {
        // Likely a directory reused for a different sample. The original
        // tool ignored this silently, we at least say so.
        warn!(
            kind = kind.as_str(),
            logged = %record.alias,
            current = %object.alias(),
            "ledger alias differs from package alias, skipping restore"
        );
        return;
    }

    object.set_alias(record.alias);
    object.set_state(record.state);
    if !record.id.is_empty() {
        object.set_remote_id(record.id);
    }
}

/// Append one record with the object's current identifier, alias and state.
/// The log is append-only, a single newline-terminated line per call, so a
/// torn write can never damage earlier records.
pub fn record(package_dir: &Utf8Path, object: &dyn Trackable) -> Result<(), BiosubError> {
    let status_dir = package_dir.join(STATUS_DIR);
    fs::create_dir_all(status_dir.as_std_path())
        .map_err(|err| BiosubError::Filesystem(err.to_string()))?;

    let record = StatusRecord {
        id: object.remote_id().unwrap_or_default().to_string(),
        alias: object.alias().to_string(),
        state: object.state().to_string(),
        recorded_at: chrono::Utc::now().timestamp(),
    };

    let path = log_path(package_dir, object.kind().as_str());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| BiosubError::Filesystem(err.to_string()))?;
    file.write_all(record.to_line().as_bytes())
        .map_err(|err| BiosubError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use crate::domain::{NEW_STATE, SUBMITTED_STATE, Sample, Trackable};

    use super::*;

    fn temp_package() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn parse_round_trip() {
        let record = StatusRecord::parse("ID123\tSAMP03\tSUBMITTED\t1700000000").unwrap();
        assert_eq!(record.id, "ID123");
        assert_eq!(record.alias, "SAMP03");
        assert_eq!(record.state, SUBMITTED_STATE);
        assert_eq!(record.recorded_at, 1700000000);
    }

    #[test]
    fn parse_rejects_short_lines() {
        assert!(StatusRecord::parse("ID123\tSAMP03").is_none());
    }

    #[test]
    fn record_appends_and_latest_wins() {
        let (_temp, dir) = temp_package();
        let mut sample = Sample {
            alias: "SAMP01".to_string(),
            ..Sample::default()
        };

        record(&dir, &sample).unwrap();
        sample.set_remote_id("EGA001".to_string());
        sample.set_state(SUBMITTED_STATE.to_string());
        record(&dir, &sample).unwrap();

        let records = read_records(&dir, "sample");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, NEW_STATE);
        assert_eq!(records[1].state, SUBMITTED_STATE);

        let current = latest(&dir, "sample").unwrap();
        assert_eq!(current.id, "EGA001");
        assert_eq!(current.state, SUBMITTED_STATE);
    }

    #[test]
    fn restore_adopts_logged_state_when_alias_matches() {
        let (_temp, dir) = temp_package();
        std::fs::create_dir_all(dir.join(STATUS_DIR).as_std_path()).unwrap();
        std::fs::write(
            log_path(&dir, "sample").as_std_path(),
            "EGA042\tSAMP01\tSUBMITTED\t1700000000\n",
        )
        .unwrap();

        let mut sample = Sample {
            alias: "SAMP01".to_string(),
            ..Sample::default()
        };
        restore(&dir, &mut sample);
        assert_eq!(sample.state(), SUBMITTED_STATE);
        assert_eq!(sample.remote_id(), Some("EGA042"));
    }

    #[test]
    fn restore_adopts_alias_when_unset() {
        let (_temp, dir) = temp_package();
        std::fs::create_dir_all(dir.join(STATUS_DIR).as_std_path()).unwrap();
        std::fs::write(
            log_path(&dir, "analysis").as_std_path(),
            "EGA007\tSAMP01_analysis\tSUBMITTED\t1700000000\n",
        )
        .unwrap();

        let mut analysis = crate::domain::Analysis::default();
        restore(&dir, &mut analysis);
        assert_eq!(analysis.alias(), "SAMP01_analysis");
        assert_eq!(analysis.state(), SUBMITTED_STATE);
    }

    #[test]
    fn restore_is_noop_when_alias_differs() {
        let (_temp, dir) = temp_package();
        std::fs::create_dir_all(dir.join(STATUS_DIR).as_std_path()).unwrap();
        std::fs::write(
            log_path(&dir, "sample").as_std_path(),
            "EGA042\tOTHER\tSUBMITTED\t1700000000\n",
        )
        .unwrap();

        let mut sample = Sample {
            alias: "SAMP01".to_string(),
            ..Sample::default()
        };
        restore(&dir, &mut sample);
        assert_eq!(sample.state(), NEW_STATE);
        assert_eq!(sample.remote_id(), None);
        assert_eq!(sample.alias(), "SAMP01");
    }

    #[test]
    fn restore_without_log_is_noop() {
        let (_temp, dir) = temp_package();
        let mut sample = Sample::default();
        restore(&dir, &mut sample);
        assert_eq!(sample.state(), NEW_STATE);
    }
}
