#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, io, rc::Rc};

use iam_role_report::{
    AccountApi, ApiError, ManagedPolicy, ProfileConnector, ReportRow, ReportSink, Role, RolePage,
};

pub fn role(account: &str, name: &str) -> Role {
    Role {
        name: name.to_string(),
        path: "/".to_string(),
        role_id: format!("AROA{}", name.to_ascii_uppercase().replace('-', "")),
        arn: format!("arn:aws:iam::{account}:role/{name}"),
    }
}

pub fn managed(name: &str) -> ManagedPolicy {
    ManagedPolicy { name: name.to_string(), arn: format!("arn:aws:iam::aws:policy/{name}") }
}

pub fn expired_token() -> ApiError {
    ApiError::Auth {
        code: "ExpiredToken".into(),
        message: "The security token included in the request is expired".into(),
    }
}

/// In-memory account: a caller identity, aliases, paged roles and per-role policies.
#[derive(Clone)]
pub struct FakeAccount {
    pub caller: Result<String, ApiError>,
    pub aliases: Result<Vec<String>, ApiError>,
    pub pages: Vec<Vec<Role>>,
    pub inline: HashMap<String, Result<Vec<String>, ApiError>>,
    pub managed: HashMap<String, Result<Vec<ManagedPolicy>, ApiError>>,
    pub requested_markers: Rc<RefCell<Vec<Option<String>>>>,
}

impl FakeAccount {
    pub fn new(account_id: &str) -> Self {
        Self {
            caller: Ok(account_id.to_string()),
            aliases: Ok(Vec::new()),
            pages: vec![Vec::new()],
            inline: HashMap::new(),
            managed: HashMap::new(),
            requested_markers: Rc::default(),
        }
    }

    pub fn failing(err: ApiError) -> Self {
        Self { caller: Err(err), ..Self::new("000000000000") }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases = Ok(vec![alias.to_string()]);
        self
    }

    pub fn with_pages(mut self, pages: Vec<Vec<Role>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_inline(mut self, role: &str, names: &[&str]) -> Self {
        self.inline.insert(role.to_string(), Ok(names.iter().map(|n| n.to_string()).collect()));
        self
    }

    pub fn with_managed(mut self, role: &str, policies: Vec<ManagedPolicy>) -> Self {
        self.managed.insert(role.to_string(), Ok(policies));
        self
    }

    pub fn with_inline_error(mut self, role: &str, err: ApiError) -> Self {
        self.inline.insert(role.to_string(), Err(err));
        self
    }

    pub fn requested_markers(&self) -> Vec<Option<String>> {
        self.requested_markers.borrow().clone()
    }
}

impl AccountApi for FakeAccount {
    async fn caller_account_id(&self) -> Result<String, ApiError> {
        self.caller.clone()
    }

    async fn account_aliases(&self) -> Result<Vec<String>, ApiError> {
        self.aliases.clone()
    }

    async fn list_roles_page(&self, marker: Option<String>) -> Result<RolePage, ApiError> {
        self.requested_markers.borrow_mut().push(marker.clone());
        let index = match marker {
            None => 0,
            Some(m) => m
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ApiError::Service {
                    code: Some("InvalidInput".into()),
                    message: format!("bad marker {m}"),
                })?,
        };
        let roles = self.pages.get(index).cloned().unwrap_or_default();
        let next_marker = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(RolePage { roles, next_marker })
    }

    async fn inline_policy_names(&self, role_name: &str) -> Result<Vec<String>, ApiError> {
        self.inline.get(role_name).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn attached_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<ManagedPolicy>, ApiError> {
        self.managed.get(role_name).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Hands out [`FakeAccount`]s by profile name; unknown profiles have no credentials.
#[derive(Default)]
pub struct FakeConnector {
    pub accounts: HashMap<String, FakeAccount>,
    pub connected: RefCell<Vec<String>>,
}

impl FakeConnector {
    pub fn with_account(mut self, profile: &str, account: FakeAccount) -> Self {
        self.accounts.insert(profile.to_string(), account);
        self
    }
}

impl ProfileConnector for FakeConnector {
    type Api = FakeAccount;

    async fn connect(&self, profile: &str) -> FakeAccount {
        self.connected.borrow_mut().push(profile.to_string());
        self.accounts.get(profile).cloned().unwrap_or_else(|| {
            FakeAccount::failing(ApiError::NoCredentials(format!("profile {profile} not found")))
        })
    }
}

/// Collects rows in memory.
#[derive(Default)]
pub struct MemorySink {
    pub prepared: usize,
    pub rows: Vec<ReportRow>,
}

impl MemorySink {
    pub fn rows_for_account(&self, account_nr: &str) -> Vec<&ReportRow> {
        self.rows.iter().filter(|r| r.account_nr == account_nr).collect()
    }

    pub fn rows_for_role(&self, role_name: &str) -> Vec<&ReportRow> {
        self.rows.iter().filter(|r| r.role_name == role_name).collect()
    }
}

impl ReportSink for MemorySink {
    fn prepare_for_run(&mut self) -> io::Result<()> {
        self.prepared += 1;
        self.rows.clear();
        Ok(())
    }

    fn append(&mut self, row: &ReportRow) -> io::Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
