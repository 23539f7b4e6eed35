use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::{
    aws::{AccountApi, Role},
    error::ProfileError,
    identity::{resolve_account_identity, AccountIdentity},
    report::{PolicyAttachment, ReportRow, ReportSink},
    util::Counted,
};

/// What one profile's enumeration produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationSummary {
    pub account: AccountIdentity,
    pub roles: usize,
    pub rows: usize,
}

/// Walk every role visible to `profile` and append two rows per role to `sink`:
/// one for its inline policies, one for its attached managed policies.
///
/// `title` only labels diagnostics. Rows are written as soon as each sub-query
/// returns; an error stops this profile but keeps the rows already written.
pub async fn enumerate_roles_and_policies<A, S>(
    title: &str,
    profile: &str,
    api: &A,
    sink: &mut S,
    progress: Option<&ProgressBar>,
) -> Result<EnumerationSummary, ProfileError>
where
    A: AccountApi,
    S: ReportSink,
{
    let profile = profile.replace('"', "");
    let account = resolve_account_identity(&profile, api).await?;

    if let Some(pb) = progress {
        pb.set_message(format!("Casting '{title}' spell on account: {}", account.display_name));
    }
    info!("Enumerating IAM roles for profile '{profile}' (account {})", account.display_name);

    let mut summary = EnumerationSummary { account, roles: 0, rows: 0 };
    let mut marker = None;
    let mut page_number = 0usize;

    loop {
        let page = api
            .list_roles_page(marker.take())
            .await
            .map_err(|err| ProfileError::from_api(&profile, err))?;
        page_number += 1;
        debug!(
            "Profile '{profile}': page {page_number} has {}",
            Counted::regular(page.roles.len(), "role")
        );

        for role in &page.roles {
            enumerate_role(&profile, role, &summary.account, api, sink, &mut summary.rows).await?;
            summary.roles += 1;
            if let Some(pb) = progress {
                pb.set_message(format!(
                    "Casting '{title}' spell on account: {} ({})",
                    summary.account.display_name,
                    Counted::regular(summary.roles, "role")
                ));
            }
        }

        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    info!(
        "Profile '{profile}': wrote {} for {}",
        Counted::regular(summary.rows, "row"),
        Counted::regular(summary.roles, "role")
    );
    Ok(summary)
}

async fn enumerate_role<A, S>(
    profile: &str,
    role: &Role,
    account: &AccountIdentity,
    api: &A,
    sink: &mut S,
    rows: &mut usize,
) -> Result<(), ProfileError>
where
    A: AccountApi,
    S: ReportSink,
{
    let account_nr = role_account_number(role, account);

    let inline = api
        .inline_policy_names(&role.name)
        .await
        .map_err(|err| ProfileError::from_api(profile, err))?;
    let inline_count = inline.len();
    write_row(
        profile,
        sink,
        &ReportRow::new(role, PolicyAttachment::inline(inline), account, &account_nr),
    )?;
    *rows += 1;

    let managed = api
        .attached_managed_policies(&role.name)
        .await
        .map_err(|err| ProfileError::from_api(profile, err))?;
    debug!(
        "Role {}: {}, {}",
        role.name,
        Counted::new(inline_count, "inline policy", "inline policies"),
        Counted::new(managed.len(), "managed policy", "managed policies")
    );
    write_row(
        profile,
        sink,
        &ReportRow::new(role, PolicyAttachment::managed(managed), account, &account_nr),
    )?;
    *rows += 1;

    Ok(())
}

/// Account number taken from the role ARN, checked against the resolved account.
fn role_account_number(role: &Role, account: &AccountIdentity) -> String {
    match role.account_number() {
        Some(nr) => {
            if nr != account.account_id {
                warn!(
                    "Role {} belongs to account {nr} but the profile resolved to account {}",
                    role.arn, account.account_id
                );
            }
            nr.to_string()
        }
        None => {
            warn!("Could not parse an account number from role ARN {}", role.arn);
            account.account_id.clone()
        }
    }
}

fn write_row<S: ReportSink>(
    profile: &str,
    sink: &mut S,
    row: &ReportRow,
) -> Result<(), ProfileError> {
    sink.append(row).map_err(|source| ProfileError::Report { profile: profile.to_string(), source })
}
