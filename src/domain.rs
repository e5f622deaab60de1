use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// One file-or-folder node of the remote file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCatalogEntry", into = "RawCatalogEntry")]
pub struct CatalogEntry {
    identifier: String,
    name: String,
    path: String,
}

impl CatalogEntry {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, MirrorError> {
        let identifier = identifier.into();
        let name = name.into();
        let path = path.into();

        if identifier.trim().is_empty() {
            return Err(MirrorError::InvalidEntry(format!(
                "empty identifier for `{name}`"
            )));
        }
        if !path.starts_with('/') {
            return Err(MirrorError::InvalidEntry(format!(
                "{identifier}: path `{path}` must start with `/`"
            )));
        }
        let mut segments = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".");
        if segments.clone().next().is_none() {
            return Err(MirrorError::InvalidEntry(format!(
                "{identifier}: path `{path}` has no segments"
            )));
        }
        if segments.any(|segment| segment == "..") {
            return Err(MirrorError::InvalidEntry(format!(
                "{identifier}: path `{path}` escapes its scope"
            )));
        }

        Ok(Self {
            identifier,
            name,
            path,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-separated path relative to the scope root, always starting with `/`.
    pub fn remote_path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCatalogEntry {
    identifier: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "remotePath")]
    path: String,
}

impl TryFrom<RawCatalogEntry> for CatalogEntry {
    type Error = MirrorError;

    fn try_from(raw: RawCatalogEntry) -> Result<Self, Self::Error> {
        CatalogEntry::new(raw.identifier, raw.name, raw.path)
    }
}

impl From<CatalogEntry> for RawCatalogEntry {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            identifier: entry.identifier,
            name: entry.name,
            path: entry.path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Account,
    Organization,
    Project,
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeLevel::Account => write!(f, "account"),
            ScopeLevel::Organization => write!(f, "organization"),
            ScopeLevel::Project => write!(f, "project"),
        }
    }
}

/// Where an entry lives: account, account+organization, or account+organization+project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScope", into = "RawScope")]
pub struct ScopeContext {
    account: String,
    organization: Option<String>,
    project: Option<String>,
}

impl ScopeContext {
    /// Empty `organization` / `project` mean the scope stops above that level.
    pub fn new(account: &str, organization: &str, project: &str) -> Result<Self, MirrorError> {
        let account = account.trim();
        let organization = organization.trim();
        let project = project.trim();

        if account.is_empty() {
            return Err(MirrorError::InvalidScope("account is required".to_string()));
        }
        if !project.is_empty() && organization.is_empty() {
            return Err(MirrorError::InvalidScope(format!(
                "project `{project}` requires an organization"
            )));
        }
        for (label, value) in [
            ("account", account),
            ("organization", organization),
            ("project", project),
        ] {
            validate_identifier(label, value)?;
        }
        if organization == crate::scope::ACCOUNT_SCOPE_FOLDER {
            return Err(MirrorError::InvalidScope(format!(
                "organization `{organization}` collides with the account-scope folder"
            )));
        }

        Ok(Self {
            account: account.to_string(),
            organization: (!organization.is_empty()).then(|| organization.to_string()),
            project: (!project.is_empty()).then(|| project.to_string()),
        })
    }

    pub fn account(account: &str) -> Result<Self, MirrorError> {
        Self::new(account, "", "")
    }

    pub fn organization(account: &str, organization: &str) -> Result<Self, MirrorError> {
        Self::new(account, organization, "")
    }

    pub fn project(account: &str, organization: &str, project: &str) -> Result<Self, MirrorError> {
        Self::new(account, organization, project)
    }

    pub fn account_id(&self) -> &str {
        &self.account
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn level(&self) -> ScopeLevel {
        match (&self.organization, &self.project) {
            (Some(_), Some(_)) => ScopeLevel::Project,
            (Some(_), None) => ScopeLevel::Organization,
            _ => ScopeLevel::Account,
        }
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.account)?;
        if let Some(org) = &self.organization {
            write!(f, "/{org}")?;
        }
        if let Some(project) = &self.project {
            write!(f, "/{project}")?;
        }
        Ok(())
    }
}

fn validate_identifier(label: &str, value: &str) -> Result<(), MirrorError> {
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(MirrorError::InvalidScope(format!(
            "{label} identifier `{value}` is not a single path segment"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawScope {
    account: String,
    #[serde(default)]
    organization: String,
    #[serde(default)]
    project: String,
}

impl TryFrom<RawScope> for ScopeContext {
    type Error = MirrorError;

    fn try_from(raw: RawScope) -> Result<Self, Self::Error> {
        ScopeContext::new(&raw.account, &raw.organization, &raw.project)
    }
}

impl From<ScopeContext> for RawScope {
    fn from(scope: ScopeContext) -> Self {
        Self {
            account: scope.account,
            organization: scope.organization.unwrap_or_default(),
            project: scope.project.unwrap_or_default(),
        }
    }
}
