//! Registry HTTP client.

use crate::error::{RegistryError, RegistryResult};
use crate::wire::{self, ListEntry};
use scoutsync_core::roster::parse_date;
use scoutsync_core::{Auth, HttpClient, HttpRequest, HttpResponse, MailingList, RegistryUser};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Default registry API endpoint.
pub const DEFAULT_REGISTRY_ENDPOINT: &str = "https://www.scoutnet.se/api";

/// Registry connection settings.
///
/// The registry issues separate keys for the list and member endpoints.
#[derive(Clone)]
pub struct RegistryConfig {
    /// API base URL.
    pub endpoint: String,
    /// Group id used as the basic-auth user name.
    pub api_id: String,
    /// Key for the custom-lists endpoints.
    pub lists_key: String,
    /// Key for the member-list endpoint.
    pub users_key: String,
}

impl RegistryConfig {
    /// Creates settings for the default endpoint.
    pub fn new(api_id: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_REGISTRY_ENDPOINT.to_string(),
            api_id: api_id.into(),
            lists_key: String::new(),
            users_key: String::new(),
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the custom-lists key.
    pub fn with_lists_key(mut self, key: impl Into<String>) -> Self {
        self.lists_key = key.into();
        self
    }

    /// Sets the member-list key.
    pub fn with_users_key(mut self, key: impl Into<String>) -> Self {
        self.users_key = key.into();
        self
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("endpoint", &self.endpoint)
            .field("api_id", &self.api_id)
            .field("lists_key", &"<redacted>")
            .field("users_key", &"<redacted>")
            .finish()
    }
}

/// Reads mailing lists and members from the registry.
#[derive(Debug)]
pub struct RegistryClient<C> {
    client: C,
    config: RegistryConfig,
}

impl<C: HttpClient> RegistryClient<C> {
    /// Creates a registry client.
    pub fn new(client: C, config: RegistryConfig) -> Self {
        Self { client, config }
    }

    /// Returns the settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn get(&self, url: &str, key: &str) -> RegistryResult<Value> {
        let request = HttpRequest::get(url).with_auth(Auth::Basic {
            username: self.config.api_id.clone(),
            password: key.to_string(),
        });
        debug!(url, "registry request");
        self.client
            .execute(&request)
            .and_then(HttpResponse::error_for_status)
            .and_then(|response| response.json())
            .map_err(|e| RegistryError::request(url, e))
    }

    /// Fetches mailing lists with at least one alias.
    ///
    /// Lists are fetched in the order the registry returns them. With
    /// `limit`, stops after that many lists have been fetched, counting lists
    /// without aliases too.
    pub fn fetch_lists(&self, limit: Option<usize>) -> RegistryResult<Vec<MailingList>> {
        let url = format!("{}/group/customlists", self.config.endpoint);
        let index = wire::parse_index(self.get(&url, &self.config.lists_key)?)
            .map_err(|e| RegistryError::malformed(&url, e))?;

        let mut lists = Vec::new();
        for (count, (key, entry)) in index.iter().enumerate() {
            if limit.is_some_and(|limit| count >= limit) {
                debug!(limit = ?limit, "list limit reached");
                break;
            }
            let list = self.fetch_list(key, entry)?;
            info!(
                list = %list.id,
                title = list.title.as_deref().unwrap_or(""),
                members = list.members.len(),
                "fetched list"
            );
            if list.aliases.is_empty() {
                debug!(list = %list.id, "excluding list without aliases");
            } else {
                debug!(list = %list.id, "including list");
                lists.push(list);
            }
        }
        Ok(lists)
    }

    fn fetch_list(&self, key: &str, entry: &ListEntry) -> RegistryResult<MailingList> {
        let body = self.get(&entry.link, &self.config.lists_key)?;
        let records =
            wire::records(&body).map_err(|e| RegistryError::malformed(&entry.link, e))?;

        let mut list = MailingList::new(entry.id(key));
        list.title = entry.title.clone();
        list.description = entry.description.clone();

        let mut members = BTreeSet::new();
        for (_, record) in records {
            let email = wire::field(record, "email").map(|e| e.to_lowercase());
            debug!(
                member = email.as_deref().unwrap_or("-"),
                first_name = wire::field(record, "first_name").as_deref().unwrap_or(""),
                last_name = wire::field(record, "last_name").as_deref().unwrap_or(""),
                list = %list.id,
                "adding member"
            );
            for extra in wire::extra_emails(record) {
                debug!(
                    address = %extra,
                    member = email.as_deref().unwrap_or("-"),
                    "additional address"
                );
                members.insert(extra.to_lowercase());
            }
            members.extend(email);
        }
        list.members = members;

        for alias in entry.alias_addresses() {
            list = list.with_alias(alias);
        }
        Ok(list)
    }

    /// Fetches every member of the group.
    pub fn fetch_users(&self) -> RegistryResult<Vec<RegistryUser>> {
        let url = format!("{}/group/memberlist", self.config.endpoint);
        let body = self.get(&url, &self.config.users_key)?;
        let records = wire::records(&body).map_err(|e| RegistryError::malformed(&url, e))?;

        let users: Vec<RegistryUser> = records
            .into_iter()
            .map(|(key, record)| parse_user(key, record))
            .collect();
        info!(users = users.len(), "fetched registry users");
        Ok(users)
    }
}

fn parse_user(key: &str, record: &Value) -> RegistryUser {
    let member_no = wire::field(record, "member_no").unwrap_or_else(|| key.to_string());
    let mut user = RegistryUser::new(
        member_no,
        wire::field(record, "first_name").unwrap_or_default(),
        wire::field(record, "last_name").unwrap_or_default(),
    );
    user.email_primary = wire::field(record, "email");
    user.email_alternate = wire::field(record, "contact_alt_email");
    user.email_mum = wire::field(record, "contact_email_mum");
    user.email_dad = wire::field(record, "contact_email_dad");
    user.unit = wire::field(record, "unit");
    user.mobile = wire::field(record, "contact_mobile_phone");
    user.role = wire::field(record, "group_role");
    user.date_of_birth =
        wire::field(record, "date_of_birth").and_then(|value| match parse_date(&value) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(member = %user.member_no, error = %e, "ignoring date of birth");
                None
            }
        });
    user
}
