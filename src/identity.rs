use tracing::{debug, error};

use crate::{
    aws::AccountApi,
    error::{ApiError, ProfileError},
};

/// Resolved account metadata for a validated profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountIdentity {
    /// First account alias, or the numeric id when the account has none.
    pub display_name: String,
    pub account_id: String,
}

/// Confirm the profile's credentials are usable with a read-only identity check.
///
/// Missing, invalid or expired credentials come back as
/// [`ProfileError::Credential`]; an unreachable endpoint as
/// [`ProfileError::Connectivity`]. Anything else the service returns is
/// surfaced as [`ProfileError::UnexpectedService`].
pub async fn validate_credentials<A: AccountApi>(
    profile: &str,
    api: &A,
) -> Result<(), ProfileError> {
    match api.caller_account_id().await {
        Ok(account_id) => {
            debug!("Credentials for profile '{profile}' resolve to account {account_id}");
            Ok(())
        }
        Err(err @ ApiError::Connectivity(_)) => {
            error!("Could not connect to AWS endpoint. Please check your internet connection.");
            Err(ProfileError::from_api(profile, err))
        }
        Err(err) => Err(ProfileError::from_api(profile, err)),
    }
}

/// Look up the account id and its display alias for an already validated profile.
pub async fn resolve_account_identity<A: AccountApi>(
    profile: &str,
    api: &A,
) -> Result<AccountIdentity, ProfileError> {
    let identity_failed = |err: ApiError| ProfileError::IdentityResolution {
        profile: profile.to_string(),
        reason: err.to_string(),
    };

    let account_id = api.caller_account_id().await.map_err(identity_failed)?;
    let aliases = api.account_aliases().await.map_err(identity_failed)?;
    let display_name = aliases.into_iter().next().unwrap_or_else(|| account_id.clone());

    Ok(AccountIdentity { display_name, account_id })
}
