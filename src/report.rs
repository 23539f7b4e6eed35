use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::{
    aws::{ManagedPolicy, Role},
    identity::AccountIdentity,
};

pub const REPORT_HEADER: &str =
    "ROLE_NAME;ROLE_PATH;ROLE_ID;ROLE_ARN;POLICY_NAMES;POLICY_ARNS;POLICY_TYPE;ACCOUNT_NAME;ACCOUNT_NR";
pub const REPORT_FILE_SUFFIX: &str = "IamRolesAndTheirPolicies.csv";

pub const NO_INLINE_POLICIES: &str = "NO-INLINE-POLICIES";
pub const NO_MANAGED_POLICIES: &str = "NO-MANAGED-POLICIES";
pub const NOT_APPLICABLE: &str = "N/A";

/// A policy column: either a sentinel standing in for "nothing here" or a list of values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyList {
    Empty(&'static str),
    Listed(Vec<String>),
}

impl fmt::Display for PolicyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyList::Empty(sentinel) => f.write_str(sentinel),
            PolicyList::Listed(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    // Single quotes unless the value itself contains one.
                    if value.contains('\'') && !value.contains('"') {
                        write!(f, "\"{value}\"")?;
                    } else {
                        write!(f, "'{}'", value.replace('\'', "\\'"))?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Inline,
    Managed,
    None,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::Inline => "inline",
            PolicyKind::Managed => "managed",
            PolicyKind::None => NOT_APPLICABLE,
        })
    }
}

/// The policies of one kind attached to a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyAttachment {
    pub kind: PolicyKind,
    pub names: PolicyList,
    pub arns: PolicyList,
}

impl PolicyAttachment {
    /// Inline policies have no identifiers of their own, so a populated
    /// attachment lists no ARNs.
    pub fn inline(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self {
                kind: PolicyKind::None,
                names: PolicyList::Empty(NO_INLINE_POLICIES),
                arns: PolicyList::Empty(NOT_APPLICABLE),
            }
        } else {
            Self {
                kind: PolicyKind::Inline,
                names: PolicyList::Listed(names),
                arns: PolicyList::Listed(Vec::new()),
            }
        }
    }

    pub fn managed(policies: Vec<ManagedPolicy>) -> Self {
        if policies.is_empty() {
            return Self {
                kind: PolicyKind::None,
                names: PolicyList::Empty(NO_MANAGED_POLICIES),
                arns: PolicyList::Empty(NOT_APPLICABLE),
            };
        }
        let (names, arns): (Vec<String>, Vec<String>) =
            policies.into_iter().map(|p| (p.name, p.arn)).unzip();
        Self {
            kind: PolicyKind::Managed,
            names: PolicyList::Listed(names),
            arns: PolicyList::Listed(arns),
        }
    }
}

/// One line of the report: a role, one of its policy attachments, and the account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRow {
    pub role_name: String,
    pub role_path: String,
    pub role_id: String,
    pub role_arn: String,
    pub policy_names: PolicyList,
    pub policy_arns: PolicyList,
    pub policy_type: PolicyKind,
    pub account_name: String,
    pub account_nr: String,
}

impl ReportRow {
    pub fn new(
        role: &Role,
        attachment: PolicyAttachment,
        account: &AccountIdentity,
        account_nr: &str,
    ) -> Self {
        Self {
            role_name: role.name.clone(),
            role_path: role.path.clone(),
            role_id: role.role_id.clone(),
            role_arn: role.arn.clone(),
            policy_names: attachment.names,
            policy_arns: attachment.arns,
            policy_type: attachment.kind,
            account_name: account.display_name.clone(),
            account_nr: account_nr.to_string(),
        }
    }
}

impl fmt::Display for ReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{};{};{};{}",
            self.role_name,
            self.role_path,
            self.role_id,
            self.role_arn,
            self.policy_names,
            self.policy_arns,
            self.policy_type,
            self.account_name,
            self.account_nr
        )
    }
}

/// Destination for report rows, prepared once per run.
pub trait ReportSink {
    /// Reset the destination and write the header.
    fn prepare_for_run(&mut self) -> io::Result<()>;

    /// Persist one row immediately.
    fn append(&mut self, row: &ReportRow) -> io::Result<()>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

/// Name of the report file for `date`, e.g. `2024-05-01.IamRolesAndTheirPolicies.csv`.
pub fn report_file_name(date: NaiveDate) -> String {
    format!("{}.{REPORT_FILE_SUFFIX}", date.format("%F"))
}

/// The dated, semicolon-delimited report file. Each row is written by opening
/// the file in append mode, so a crash leaves every completed row on disk.
#[derive(Clone, Debug)]
pub struct CsvReportFile {
    path: PathBuf,
    keep_existing: bool,
}

impl CsvReportFile {
    pub fn for_date(dir: &Path, date: NaiveDate) -> Self {
        Self { path: dir.join(report_file_name(date)), keep_existing: false }
    }

    pub fn for_today(dir: &Path) -> Self {
        Self::for_date(dir, Local::now().date_naive())
    }

    /// Keep rows from an earlier run on the same day instead of truncating.
    pub fn keep_existing(mut self, keep: bool) -> Self {
        self.keep_existing = keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for CsvReportFile {
    fn prepare_for_run(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if self.keep_existing {
            let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
            if has_content {
                debug!("Appending to existing report {}", self.path.display());
                return Ok(());
            }
        }

        let mut file = fs::File::create(&self.path)?;
        writeln!(file, "{REPORT_HEADER}")?;
        debug!("Created report {}", self.path.display());
        Ok(())
    }

    fn append(&mut self, row: &ReportRow) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{row}")
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
