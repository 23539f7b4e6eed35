use std::path::PathBuf;

use clap::Args;

use crate::{
    aws::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REGION},
    error::ConfigError,
    profiles::{ProfileSource, DEFAULT_CONFIG_FILE, DEFAULT_KEY, DEFAULT_SECTION},
    util::home_dir,
    workflow::DEFAULT_TITLE,
};

/// Options for the role-and-policy report
#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Report Options")]
pub struct ReportArgs {
    /// AWS profile to process (repeatable). Defaults to the profiles configuration file
    #[arg(long = "profile", short = 'p', value_name = "NAME")]
    pub profiles: Vec<String>,

    /// INI file declaring the profiles to process [default: ~/.aws/.python-profiles.conf]
    #[arg(long, value_name = "PATH", env = "IAM_REPORT_PROFILES_CONFIG")]
    pub profiles_config: Option<PathBuf>,

    /// Section of the profiles configuration file holding the profile list
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SECTION)]
    pub profiles_section: String,

    /// Key within the section whose value is the whitespace-separated profile list
    #[arg(long, value_name = "NAME", default_value = DEFAULT_KEY)]
    pub profiles_key: String,

    /// Label shown in progress messages and diagnostics
    #[arg(long, value_name = "TEXT", default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Directory the dated report is written to [default: system temp dir]
    #[arg(long, short = 'o', value_name = "DIR", env = "IAM_REPORT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Keep rows written earlier today instead of starting a fresh report
    #[arg(long)]
    pub append: bool,

    /// Exit with status 2 when any profile was skipped
    #[arg(long)]
    pub strict: bool,

    /// Region used when neither the profile nor the environment sets one
    #[arg(long, value_name = "REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Attempts per AWS request, including retries
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,
}

impl Default for ReportArgs {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            profiles_config: None,
            profiles_section: DEFAULT_SECTION.to_string(),
            profiles_key: DEFAULT_KEY.to_string(),
            title: DEFAULT_TITLE.to_string(),
            output_dir: None,
            append: false,
            strict: false,
            region: DEFAULT_REGION.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReportArgs {
    /// Explicit `--profile` values win; otherwise read the configuration file.
    pub fn profile_source(&self) -> Result<ProfileSource, ConfigError> {
        if !self.profiles.is_empty() {
            return Ok(ProfileSource::Explicit(self.profiles.clone()));
        }
        let path = match &self.profiles_config {
            Some(path) => path.clone(),
            None => home_dir()
                .map(|home| home.join(".aws").join(DEFAULT_CONFIG_FILE))
                .ok_or(ConfigError::NoHomeDirectory)?,
        };
        Ok(ProfileSource::ConfigFile {
            path,
            section: self.profiles_section.clone(),
            key: self.profiles_key.clone(),
        })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
