use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::{
    aws::ProfileConnector,
    enumerate::{enumerate_roles_and_policies, EnumerationSummary},
    error::{ProfileError, ReportError},
    identity::validate_credentials,
    profiles::ProfileSource,
    report::ReportSink,
    util::Counted,
};

pub const DEFAULT_TITLE: &str = "Enumerate IAM Roles and Policies";

/// Exit code used with `--strict` when at least one profile was skipped.
pub const EXIT_PROFILES_SKIPPED: i32 = 2;

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Free-text label used in progress messages and diagnostics.
    pub title: String,
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { title: DEFAULT_TITLE.to_string(), progress: false }
    }
}

#[derive(Debug)]
pub enum ProfileOutcome {
    Completed { profile: String, summary: EnumerationSummary },
    Skipped { profile: String, error: ProfileError },
}

impl ProfileOutcome {
    pub fn profile(&self) -> &str {
        match self {
            ProfileOutcome::Completed { profile, .. } | ProfileOutcome::Skipped { profile, .. } => {
                profile
            }
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProfileOutcome::Skipped { .. })
    }
}

/// Per-profile results of one run, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<ProfileOutcome>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn total_roles(&self) -> usize {
        self.completed_summaries().map(|s| s.roles).sum()
    }

    pub fn total_rows(&self) -> usize {
        self.completed_summaries().map(|s| s.rows).sum()
    }

    fn completed_summaries(&self) -> impl Iterator<Item = &EnumerationSummary> {
        self.outcomes.iter().filter_map(|o| match o {
            ProfileOutcome::Completed { summary, .. } => Some(summary),
            ProfileOutcome::Skipped { .. } => None,
        })
    }
}

/// Process exit code for a finished run. Skipped profiles only affect it in strict mode.
pub fn determine_exit_code(summary: &RunSummary, strict: bool) -> i32 {
    if strict && summary.skipped() > 0 {
        EXIT_PROFILES_SKIPPED
    } else {
        0
    }
}

/// Resolve the profiles, prepare the report once, then validate and enumerate
/// each profile in turn.
///
/// Only configuration problems and a report that cannot be prepared end the run;
/// every per-profile failure is logged and recorded in the returned summary.
pub async fn run<C, S>(
    options: &RunOptions,
    source: &ProfileSource,
    connector: &C,
    sink: &mut S,
) -> Result<RunSummary, ReportError>
where
    C: ProfileConnector,
    S: ReportSink,
{
    let profiles = source.resolve()?;
    info!("Running '{}' on {}", options.title, Counted::regular(profiles.len(), "profile"));

    sink.prepare_for_run()
        .map_err(|source| ReportError::Prepare { location: sink.location(), source })?;

    let mut summary = RunSummary { outcomes: Vec::with_capacity(profiles.len()) };
    for profile in profiles {
        let outcome = process_profile(options, &profile, connector, sink).await;
        summary.outcomes.push(outcome);
    }

    info!(
        "Finished '{}': {} completed, {} skipped, {} written for {}",
        options.title,
        Counted::regular(summary.completed(), "profile"),
        Counted::regular(summary.skipped(), "profile"),
        Counted::regular(summary.total_rows(), "row"),
        Counted::regular(summary.total_roles(), "role"),
    );
    Ok(summary)
}

async fn process_profile<C, S>(
    options: &RunOptions,
    profile: &str,
    connector: &C,
    sink: &mut S,
) -> ProfileOutcome
where
    C: ProfileConnector,
    S: ReportSink,
{
    let pb = spinner(options.progress, format!("Validating credentials for profile: {profile}"));
    let api = connector.connect(profile).await;

    if let Err(err) = validate_credentials(profile, &api).await {
        let message = match err {
            ProfileError::Connectivity { .. } => {
                format!("Skipping '{profile}': AWS endpoint unreachable")
            }
            ProfileError::Credential { .. } => {
                format!("Skipping '{profile}' due to invalid or expired credentials")
            }
            _ => format!("Skipping '{profile}' after an unexpected error"),
        };
        pb.abandon_with_message(message);
        log_skip(&options.title, &err);
        return ProfileOutcome::Skipped { profile: profile.to_string(), error: err };
    }
    pb.finish_with_message(format!("Credentials validated for profile: {profile}"));

    let pb = spinner(
        options.progress,
        format!("Casting '{}' spell on profile: {profile}", options.title),
    );
    match enumerate_roles_and_policies(&options.title, profile, &api, sink, Some(&pb)).await {
        Ok(summary) => {
            pb.finish_with_message(format!(
                "Spell '{}' successfully cast on account: {} ({})",
                options.title,
                summary.account.display_name,
                Counted::regular(summary.roles, "role")
            ));
            ProfileOutcome::Completed { profile: profile.to_string(), summary }
        }
        Err(err) => {
            pb.abandon_with_message(format!(
                "Failed to cast spell '{}' on account: {profile}",
                options.title
            ));
            log_skip(&options.title, &err);
            ProfileOutcome::Skipped { profile: profile.to_string(), error: err }
        }
    }
}

fn log_skip(title: &str, err: &ProfileError) {
    if err.is_unexpected() {
        error!("'{title}' aborted for profile '{}': {err}", err.profile());
    } else {
        warn!("Skipping profile '{}' during '{title}': {err}", err.profile());
    }
}

fn spinner(enabled: bool, message: String) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed_precise}]")
        .expect("progress bar style template should compile");
    let pb = ProgressBar::new_spinner().with_style(style).with_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AccountIdentity;

    fn completed(profile: &str, roles: usize) -> ProfileOutcome {
        ProfileOutcome::Completed {
            profile: profile.into(),
            summary: EnumerationSummary {
                account: AccountIdentity {
                    display_name: profile.into(),
                    account_id: "111111111111".into(),
                },
                roles,
                rows: roles * 2,
            },
        }
    }

    fn skipped(profile: &str) -> ProfileOutcome {
        ProfileOutcome::Skipped {
            profile: profile.into(),
            error: ProfileError::Credential { profile: profile.into(), reason: "expired".into() },
        }
    }

    #[test]
    fn summary_totals_count_only_completed_profiles() {
        let summary =
            RunSummary { outcomes: vec![completed("a", 3), skipped("b"), completed("c", 1)] };
        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.total_roles(), 4);
        assert_eq!(summary.total_rows(), 8);
        assert_eq!(summary.outcomes[1].profile(), "b");
    }

    #[test]
    fn exit_code_only_reflects_skips_in_strict_mode() {
        let clean = RunSummary { outcomes: vec![completed("a", 1)] };
        let partial = RunSummary { outcomes: vec![completed("a", 1), skipped("b")] };
        assert_eq!(determine_exit_code(&clean, true), 0);
        assert_eq!(determine_exit_code(&partial, false), 0);
        assert_eq!(determine_exit_code(&partial, true), EXIT_PROFILES_SKIPPED);
    }
}
