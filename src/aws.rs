#![allow(async_fn_in_trait)]

use std::fmt::Debug;

use aws_config::{
    meta::region::RegionProviderChain, profile::ProfileFileRegionProvider, retry::RetryConfig,
    BehaviorVersion, Region,
};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    Client as StsClient,
};
use tracing::{debug, trace};

use crate::error::ApiError;

/// Service error codes that mean the credentials themselves were rejected.
const AUTH_ERROR_CODES: &[&str] = &["InvalidClientTokenId", "ExpiredToken", "ExpiredTokenException"];

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// An IAM role as returned by `iam:ListRoles`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub path: String,
    pub role_id: String,
    pub arn: String,
}

impl Role {
    /// The account-id segment of the role ARN (`arn:aws:iam::<account>:role/...`).
    pub fn account_number(&self) -> Option<&str> {
        self.arn.split(':').nth(4).filter(|s| !s.is_empty())
    }
}

/// One page of roles plus the marker for the next page, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolePage {
    pub roles: Vec<Role>,
    pub next_marker: Option<String>,
}

/// A managed policy attached to a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedPolicy {
    pub name: String,
    pub arn: String,
}

/// The account-level calls the report needs, scoped to one profile's credentials.
pub trait AccountApi {
    /// Numeric account id of the caller (`sts:GetCallerIdentity`).
    async fn caller_account_id(&self) -> Result<String, ApiError>;

    async fn account_aliases(&self) -> Result<Vec<String>, ApiError>;

    /// Fetch the page of roles that starts at `marker` (`None` for the first page).
    async fn list_roles_page(&self, marker: Option<String>) -> Result<RolePage, ApiError>;

    async fn inline_policy_names(&self, role_name: &str) -> Result<Vec<String>, ApiError>;

    async fn attached_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<ManagedPolicy>, ApiError>;
}

/// Builds an [`AccountApi`] bound to a named profile.
pub trait ProfileConnector {
    type Api: AccountApi;

    async fn connect(&self, profile: &str) -> Self::Api;
}

/// Connects to AWS using the shared config/credentials files.
#[derive(Clone, Debug)]
pub struct AwsConnector {
    fallback_region: String,
    max_attempts: u32,
}

impl Default for AwsConnector {
    fn default() -> Self {
        Self { fallback_region: DEFAULT_REGION.to_string(), max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl AwsConnector {
    pub fn new(fallback_region: impl Into<String>) -> Self {
        Self { fallback_region: fallback_region.into(), ..Self::default() }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl ProfileConnector for AwsConnector {
    type Api = AwsAccountClient;

    async fn connect(&self, profile: &str) -> AwsAccountClient {
        // Region: the profile's own setting, then the environment, then the fallback.
        let region_provider = RegionProviderChain::first_try(
            ProfileFileRegionProvider::builder().profile_name(profile).build(),
        )
        .or_default_provider()
        .or_else(Region::new(self.fallback_region.clone()));

        let config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .region(region_provider)
            .retry_config(RetryConfig::standard().with_max_attempts(self.max_attempts))
            .load()
            .await;

        debug!(
            "Loaded AWS config for profile '{profile}' (region: {})",
            config.region().map(|r| r.as_ref()).unwrap_or("unknown")
        );

        AwsAccountClient { sts: StsClient::new(&config), iam: IamClient::new(&config) }
    }
}

/// [`AccountApi`] backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct AwsAccountClient {
    sts: StsClient,
    iam: IamClient,
}

impl AccountApi for AwsAccountClient {
    async fn caller_account_id(&self) -> Result<String, ApiError> {
        let caller = self.sts.get_caller_identity().send().await.map_err(classify_sdk_error)?;
        caller.account().map(str::to_string).ok_or_else(|| ApiError::Service {
            code: None,
            message: "GetCallerIdentity response missing Account".into(),
        })
    }

    async fn account_aliases(&self) -> Result<Vec<String>, ApiError> {
        let resp = self.iam.list_account_aliases().send().await.map_err(classify_sdk_error)?;
        Ok(resp.account_aliases().to_vec())
    }

    async fn list_roles_page(&self, marker: Option<String>) -> Result<RolePage, ApiError> {
        let resp =
            self.iam.list_roles().set_marker(marker).send().await.map_err(classify_sdk_error)?;

        let roles = resp
            .roles()
            .iter()
            .map(|role| Role {
                name: role.role_name().to_string(),
                path: role.path().to_string(),
                role_id: role.role_id().to_string(),
                arn: role.arn().to_string(),
            })
            .collect::<Vec<_>>();
        let next_marker =
            if resp.is_truncated() { resp.marker().map(str::to_string) } else { None };
        trace!("ListRoles returned {} roles (more: {})", roles.len(), next_marker.is_some());

        Ok(RolePage { roles, next_marker })
    }

    async fn inline_policy_names(&self, role_name: &str) -> Result<Vec<String>, ApiError> {
        let mut names = Vec::new();
        let mut marker = None;

        loop {
            let resp = self
                .iam
                .list_role_policies()
                .role_name(role_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(classify_sdk_error)?;
            names.extend(resp.policy_names().iter().cloned());

            if resp.is_truncated() {
                marker = resp.marker().map(str::to_string);
                if marker.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(names)
    }

    async fn attached_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<ManagedPolicy>, ApiError> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let resp = self
                .iam
                .list_attached_role_policies()
                .role_name(role_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(classify_sdk_error)?;
            for policy in resp.attached_policies() {
                if let (Some(name), Some(arn)) = (policy.policy_name(), policy.policy_arn()) {
                    policies.push(ManagedPolicy { name: name.to_string(), arn: arn.to_string() });
                }
            }

            if resp.is_truncated() {
                marker = resp.marker().map(str::to_string);
                if marker.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(policies)
    }
}

/// Sort an SDK failure into the categories the report workflow acts on.
///
/// The returned message is the `Display` chain of the failure; the full SDK
/// context is only logged at debug level.
pub fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    let context = DisplayErrorContext(&err).to_string();
    debug!("AWS SDK error: {context}");
    let summary = error_chain(&err);

    if let SdkError::ServiceError(ctx) = &err {
        let code = ctx.err().code().map(str::to_string);
        let message = ctx.err().message().map(str::to_string).unwrap_or(summary);
        return match code {
            Some(code) if AUTH_ERROR_CODES.contains(&code.as_str()) => {
                ApiError::Auth { code, message }
            }
            code => ApiError::Service { code, message },
        };
    }

    if is_missing_credentials(&context) {
        return ApiError::NoCredentials(summary);
    }

    match &err {
        SdkError::DispatchFailure(df) if df.is_io() || df.is_timeout() => {
            ApiError::Connectivity(summary)
        }
        SdkError::TimeoutError(_) => ApiError::Connectivity(summary),
        _ => ApiError::Service { code: None, message: summary },
    }
}

/// `outer: cause: root cause`, skipping causes already spelled out by their parent.
fn error_chain<E: std::error::Error + ?Sized>(err: &E) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !chain.ends_with(&text) {
            chain.push_str(": ");
            chain.push_str(&text);
        }
        source = cause.source();
    }
    chain
}

fn is_missing_credentials(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    detail.contains("CredentialsNotLoaded")
        || lower.contains("no credentials")
        || lower.contains("failed to load credentials")
        || lower.contains("credentials provider was not enabled")
        || lower.contains("no providers in chain provided credentials")
}
