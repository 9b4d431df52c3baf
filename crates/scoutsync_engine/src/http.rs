//! Admin Directory v1 over HTTP.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] and access tokens
//! via [`TokenSource`], so the directory can be driven by `reqwest` in the
//! binary and by canned responses in tests.

use crate::directory::{DirectoryApi, GroupRecord, Lookup};
use crate::error::{EngineError, EngineResult};
use scoutsync_core::{Auth, DirectoryUser, HttpClient, HttpRequest, HttpResponse, Page};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Base URL of the Admin Directory API.
pub const DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Supplies OAuth access tokens.
pub trait TokenSource {
    /// Returns a currently valid access token.
    fn access_token(&self) -> EngineResult<String>;
}

impl<T: TokenSource + ?Sized> TokenSource for &T {
    fn access_token(&self) -> EngineResult<String> {
        (**self).access_token()
    }
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn access_token(&self) -> EngineResult<String> {
        (**self).access_token()
    }
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> EngineResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupResource {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<GroupResource> for GroupRecord {
    fn from(group: GroupResource) -> Self {
        GroupRecord::new(group.email, group.name, group.description)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupsPage {
    #[serde(default)]
    groups: Vec<GroupResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AliasesPage {
    #[serde(default)]
    aliases: Vec<AliasResource>,
}

#[derive(Debug, Deserialize)]
struct AliasResource {
    alias: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersPage {
    #[serde(default)]
    members: Vec<MemberResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberResource {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersPage {
    #[serde(default)]
    users: Vec<UserResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResource {
    #[serde(default)]
    name: UserName,
    primary_email: String,
    #[serde(default)]
    phones: Vec<Phone>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserName {
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
}

#[derive(Debug, Deserialize)]
struct Phone {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl From<UserResource> for DirectoryUser {
    fn from(user: UserResource) -> Self {
        let mut out = DirectoryUser::new(
            user.name.given_name,
            user.name.family_name,
            user.primary_email,
        );
        out.mobile = user
            .phones
            .into_iter()
            .find(|phone| phone.kind.as_deref() == Some("mobile"))
            .and_then(|phone| phone.value);
        out
    }
}

/// The Admin Directory, reached over an [`HttpClient`].
#[derive(Debug)]
pub struct HttpDirectory<C, T> {
    client: C,
    tokens: T,
    domain: String,
    base_url: String,
}

impl<C: HttpClient, T: TokenSource> HttpDirectory<C, T> {
    /// Creates a directory client for `domain`.
    pub fn new(client: C, tokens: T, domain: impl Into<String>) -> Self {
        Self {
            client,
            tokens,
            domain: domain.into(),
            base_url: DIRECTORY_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn group_url(&self, group: &str) -> String {
        format!("{}/groups/{}", self.base_url, urlencoding::encode(group))
    }

    fn send(
        &self,
        operation: &'static str,
        target: &str,
        request: HttpRequest,
    ) -> EngineResult<HttpResponse> {
        let token = self.tokens.access_token()?;
        let request = request.with_auth(Auth::Bearer(token));
        debug!(method = %request.method, url = %request.url, "directory request");
        self.client
            .execute(&request)
            .and_then(HttpResponse::error_for_status)
            .map_err(|e| EngineError::request(operation, target, e))
    }

    fn fetch<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        target: &str,
        request: HttpRequest,
    ) -> EngineResult<R> {
        self.send(operation, target, request)?
            .json()
            .map_err(|e| EngineError::Protocol(format!("{operation} {target}: {e}")))
    }

    fn paged(request: HttpRequest, page_token: Option<&str>, max_results: u32) -> HttpRequest {
        let request = request.with_query("maxResults", max_results.to_string());
        match page_token {
            Some(token) => request.with_query("pageToken", token),
            None => request,
        }
    }

    fn group_body(group: &GroupRecord) -> serde_json::Value {
        json!({
            "email": group.address,
            "name": group.name.clone().unwrap_or_default(),
            "description": group.description.clone().unwrap_or_default(),
        })
    }
}

impl<C: HttpClient, T: TokenSource> DirectoryApi for HttpDirectory<C, T> {
    fn list_groups(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<GroupRecord>> {
        let request = HttpRequest::get(format!("{}/groups", self.base_url))
            .with_query("domain", &self.domain);
        let page: GroupsPage = self.fetch(
            "groups.list",
            &self.domain,
            Self::paged(request, page_token, max_results),
        )?;
        Ok(Page::new(
            page.groups.into_iter().map(GroupRecord::from).collect(),
            page.next_page_token,
        ))
    }

    fn get_group(&self, address: &str) -> EngineResult<Lookup<GroupRecord>> {
        let request = HttpRequest::get(self.group_url(address));
        match self.fetch::<GroupResource>("groups.get", address, request) {
            Ok(group) => Ok(Lookup::Found(group.into())),
            Err(e) if e.is_not_found() => Ok(Lookup::NotFound),
            Err(e) => Err(e),
        }
    }

    fn insert_group(&self, group: &GroupRecord) -> EngineResult<()> {
        let request =
            HttpRequest::post(format!("{}/groups", self.base_url), Self::group_body(group));
        self.send("groups.insert", &group.address, request).map(|_| ())
    }

    fn update_group(&self, group: &GroupRecord) -> EngineResult<()> {
        let request = HttpRequest::put(self.group_url(&group.address), Self::group_body(group));
        self.send("groups.update", &group.address, request).map(|_| ())
    }

    fn delete_group(&self, address: &str) -> EngineResult<()> {
        self.send("groups.delete", address, HttpRequest::delete(self.group_url(address)))
            .map(|_| ())
    }

    fn list_aliases(&self, group: &str) -> EngineResult<Vec<String>> {
        let url = format!("{}/aliases", self.group_url(group));
        let page: AliasesPage = self.fetch("groups.aliases.list", group, HttpRequest::get(url))?;
        Ok(page.aliases.into_iter().map(|a| a.alias).collect())
    }

    fn insert_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        let url = format!("{}/aliases", self.group_url(group));
        self.send("groups.aliases.insert", alias, HttpRequest::post(url, json!({ "alias": alias })))
            .map(|_| ())
    }

    fn delete_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        let url = format!("{}/aliases/{}", self.group_url(group), urlencoding::encode(alias));
        self.send("groups.aliases.delete", alias, HttpRequest::delete(url))
            .map(|_| ())
    }

    fn list_members(
        &self,
        group: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<String>> {
        let request = HttpRequest::get(format!("{}/members", self.group_url(group)));
        let page: MembersPage = self.fetch(
            "members.list",
            group,
            Self::paged(request, page_token, max_results),
        )?;
        Ok(Page::new(
            page.members.into_iter().filter_map(|m| m.email).collect(),
            page.next_page_token,
        ))
    }

    fn insert_member(&self, group: &str, member: &str) -> EngineResult<()> {
        let url = format!("{}/members", self.group_url(group));
        let body = json!({ "email": member, "role": "MEMBER" });
        self.send("members.insert", member, HttpRequest::post(url, body))
            .map(|_| ())
    }

    fn delete_member(&self, group: &str, member: &str) -> EngineResult<()> {
        let url = format!("{}/members/{}", self.group_url(group), urlencoding::encode(member));
        self.send("members.delete", member, HttpRequest::delete(url))
            .map(|_| ())
    }

    fn list_users(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<DirectoryUser>> {
        let request = HttpRequest::get(format!("{}/users", self.base_url))
            .with_query("domain", &self.domain);
        let page: UsersPage = self.fetch(
            "users.list",
            &self.domain,
            Self::paged(request, page_token, max_results),
        )?;
        Ok(Page::new(
            page.users.into_iter().map(DirectoryUser::from).collect(),
            page.next_page_token,
        ))
    }
}
