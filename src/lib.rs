pub mod aws;
pub mod cli;
pub mod enumerate;
pub mod error;
pub mod identity;
pub mod profiles;
pub mod report;
pub mod util;
pub mod workflow;

pub use aws::{AccountApi, AwsConnector, ManagedPolicy, ProfileConnector, Role, RolePage};
pub use error::{ApiError, ConfigError, ProfileError, ReportError};
pub use identity::AccountIdentity;
pub use profiles::ProfileSource;
pub use report::{CsvReportFile, ReportRow, ReportSink};
pub use workflow::{run, RunOptions, RunSummary};
