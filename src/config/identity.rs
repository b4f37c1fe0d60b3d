//! Fixed two-party identity table.
//!
//! Exactly one debtor and one creditor exist. Each has a credential record in
//! `promissoria.toml`; login matches a case-insensitive alias inside the typed
//! name plus an exact password. Discord user ids map to the same two roles.

use crate::models::{Role, User};
use serde::Deserialize;

/// One credential record.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// Display name
    pub name: String,
    /// Plain password compared verbatim
    pub password: String,
    /// Substring that must appear in the typed name; defaults to the first word of `name`
    #[serde(default)]
    pub login_alias: Option<String>,
    /// Tax document shown on the contract
    #[serde(default)]
    pub document: Option<String>,
    /// Phone shown on the contract
    #[serde(default)]
    pub phone: Option<String>,
    /// Discord user id of this party
    #[serde(default)]
    pub discord_id: Option<String>,
}

impl CredentialConfig {
    /// Placeholder debtor used when no config file exists.
    #[must_use]
    pub fn default_debtor() -> Self {
        Self {
            name: "Debtor".to_string(),
            password: "debtor123".to_string(),
            login_alias: None,
            document: None,
            phone: None,
            discord_id: None,
        }
    }

    /// Placeholder creditor used when no config file exists.
    #[must_use]
    pub fn default_creditor() -> Self {
        Self {
            name: "Creditor".to_string(),
            password: "creditor123".to_string(),
            login_alias: None,
            document: None,
            phone: None,
            discord_id: None,
        }
    }

    fn alias(&self) -> String {
        self.login_alias
            .clone()
            .or_else(|| self.name.split_whitespace().next().map(str::to_string))
            .unwrap_or_default()
            .to_lowercase()
    }

    fn matches(&self, typed_name: &str, password: &str) -> bool {
        let alias = self.alias();
        !alias.is_empty() && typed_name.contains(&alias) && password == self.password
    }
}

/// The debtor and creditor records.
#[derive(Debug, Clone)]
pub struct IdentityTable {
    debtor: CredentialConfig,
    creditor: CredentialConfig,
}

impl IdentityTable {
    /// Builds the table from the two configured records.
    #[must_use]
    pub const fn new(debtor: CredentialConfig, creditor: CredentialConfig) -> Self {
        Self { debtor, creditor }
    }

    /// Credential record for `role`.
    #[must_use]
    pub const fn credential(&self, role: Role) -> &CredentialConfig {
        match role {
            Role::Debtor => &self.debtor,
            Role::Creditor => &self.creditor,
        }
    }

    /// Fresh user record for `role`, without a PIX key.
    #[must_use]
    pub fn by_role(&self, role: Role) -> User {
        User {
            id: role.as_str().to_string(),
            name: self.credential(role).name.clone(),
            role,
            pix_key: None,
        }
    }

    /// Resolves a name/password pair. The debtor record is checked first.
    ///
    /// Entry point for front-ends with a login form. The Discord bot does not
    /// call it: it identifies callers through [`Self::by_discord_id`].
    #[must_use]
    pub fn login(&self, name: &str, password: &str) -> Option<User> {
        let typed = name.trim().to_lowercase();
        [Role::Debtor, Role::Creditor]
            .into_iter()
            .find(|role| self.credential(*role).matches(&typed, password))
            .map(|role| self.by_role(role))
    }

    /// User record of the other party.
    #[must_use]
    pub fn counterpart(&self, role: Role) -> User {
        self.by_role(role.counterpart())
    }

    /// Role of the party with this Discord id.
    #[must_use]
    pub fn by_discord_id(&self, discord_id: &str) -> Option<Role> {
        [Role::Debtor, Role::Creditor]
            .into_iter()
            .find(|role| self.credential(*role).discord_id.as_deref() == Some(discord_id))
    }
}
