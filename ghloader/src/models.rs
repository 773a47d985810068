//! Record shapes decoded from archive lines.
//!
//! Each record lists its scalar fields explicitly; only those are ever
//! projected onto a vertex. Nested records are resolved into their own
//! vertices by the handler.

use gstorage::PropertyValue;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A record whose scalar fields can be copied onto a vertex.
pub trait Projectable {
    /// `(field name, value)` for every scalar field that is present.
    fn scalar_fields(&self) -> Vec<(&'static str, PropertyValue)>;
}

/// The scalar kinds a record field may declare.
pub trait Scalar: Sized + Clone + Into<PropertyValue> {
    fn from_json(value: Value) -> Option<Self>;
}

impl Scalar for String {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl Scalar for bool {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl Scalar for i64 {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Scalar for i32 {
    fn from_json(value: Value) -> Option<Self> {
        i64::from_json(value).and_then(|v| i32::try_from(v).ok())
    }
}

/// A scalar whose JSON type does not match the declared kind decodes as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Scalar,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(T::from_json))
}

macro_rules! field_key {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $key:literal) => {
        $key
    };
}

/// Declares a record: scalar fields (optionally renamed with `as "json_name"`)
/// followed by an optional block of nested, non-projected fields.
macro_rules! record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $field:ident $(as $key:literal)? : $ty:ty, )*
        }
        $( nested { $( $(#[$nmeta:meta])* $nfield:ident : $nty:ty, )* } )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
        pub struct $name {
            $(
                $( #[serde(rename = $key)] )?
                #[serde(default, deserialize_with = "lenient")]
                pub $field: Option<$ty>,
            )*
            $( $(
                $(#[$nmeta])*
                #[serde(default)]
                pub $nfield: $nty,
            )* )?
        }

        impl Projectable for $name {
            fn scalar_fields(&self) -> Vec<(&'static str, PropertyValue)> {
                let mut fields = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        fields.push((field_key!($field $(, $key)?), PropertyValue::from(value.clone())));
                    }
                )*
                fields
            }
        }
    };
}

record! {
    pub struct User {
        avatar_url: String,
        display_login: String,
        events_url: String,
        followers_url: String,
        following_url: String,
        gists_url: String,
        gravatar_id: String,
        html_url: String,
        id: i64,
        login: String,
        organizations_url: String,
        received_events_url: String,
        repos_url: String,
        site_admin: bool,
        starred_url: String,
        subscriptions_url: String,
        user_type as "type": String,
        url: String,
    }
}

record! {
    /// Attributes embedded next to a bare actor login in older archives.
    pub struct ActorAttributes {
        blog: String,
        company: String,
        email: String,
        gravatar_id: String,
        location: String,
        login: String,
        name: String,
        user_type as "type": String,
    }
}

record! {
    pub struct RepositoryBrief {
        created_at: String,
        description: String,
        fork: bool,
        forks: i32,
        has_downloads: bool,
        has_issues: bool,
        has_wiki: bool,
        homepage: String,
        id: i64,
        integrate_branch: String,
        language: String,
        master_branch: String,
        name: String,
        open_issues: i32,
        organization: String,
        owner: String,
        private: bool,
        pushed_at: String,
        size: i32,
        stargazers: i32,
        url: String,
        watchers: i32,
    }
}

record! {
    pub struct Page {
        action: String,
        html_url: String,
        page_name: String,
        sha: String,
        summary: String,
        title: String,
    }
}

record! {
    pub struct Team {
        id: i64,
        members_url: String,
        name: String,
        permission: String,
        repositories_url: String,
        slug: String,
        url: String,
    }
}

record! {
    pub struct Comment {
        body: String,
        commit_id: String,
        created_at: String,
        diff_hunk: String,
        html_url: String,
        id: i64,
        original_commit_id: String,
        original_position: i32,
        path: String,
        position: i32,
        pull_request_url: String,
        updated_at: String,
        url: String,
    }
    nested {
        user: Option<User>,
    }
}

record! {
    pub struct PullRequest {
        additions: i32,
        body: String,
        changed_files: i32,
        closed_at: String,
        comments: i32,
        comments_url: String,
        commits: i32,
        commits_url: String,
        created_at: String,
        deletions: i32,
        diff_url: String,
        html_url: String,
        id: i64,
        issue_url: String,
        merge_commit_sha: String,
        mergeable: String,
        mergeable_state: String,
        merged: bool,
        merged_at: String,
        number: i32,
        patch_url: String,
        review_comment_url: String,
        review_comments: i32,
        review_comments_url: String,
        state: String,
        statuses_url: String,
        title: String,
        updated_at: String,
        url: String,
    }
    nested {
        assignee: Option<User>,
        merged_by: Option<User>,
        user: Option<User>,
    }
}

record! {
    pub struct Release {
        assets_url: String,
        body: String,
        created_at: String,
        draft: bool,
        html_url: String,
        id: i64,
        name: String,
        prerelease: bool,
        published_at: String,
        tag_name: String,
        tarball_url: String,
        target_commitish: String,
        upload_url: String,
        url: String,
        zipball_url: String,
    }
    nested {
        author: Option<User>,
    }
}

record! {
    /// Type-dependent event body. Which nested fields are present decides
    /// which edges the event receives.
    pub struct Payload {
        action: String,
        after: String,
        before: String,
        comment_id: i64,
        commit: String,
        desc: String,
        description: String,
        distinct_size: i32,
        head: String,
        id: i64,
        issue: i64,
        issue_id: i64,
        master_branch: String,
        name: String,
        number: i32,
        push_id: i64,
        pusher_type: String,
        git_ref as "ref": String,
        ref_type: String,
        size: i32,
        url: String,
    }
    nested {
        comment: Option<Comment>,
        member: Option<User>,
        pages: Option<Vec<Page>>,
        pull_request: Option<PullRequest>,
        release: Option<Release>,
        shas: Option<Vec<Value>>,
        target: Option<User>,
        team: Option<Team>,
    }
}

/// The `actor` of an event: a bare login in older archives, an object in newer ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActorRef {
    Login(String),
    Embedded(User),
}

impl ActorRef {
    pub fn login(&self) -> Option<&str> {
        match self {
            ActorRef::Login(login) => Some(login),
            ActorRef::Embedded(user) => user.login.as_deref(),
        }
    }
}

/// One archived activity record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub actor: Option<ActorRef>,
    #[serde(default)]
    pub actor_attributes: Option<ActorAttributes>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default, deserialize_with = "lenient")]
    pub public: Option<bool>,
    #[serde(default, alias = "repo")]
    pub repository: Option<RepositoryBrief>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

impl Event {
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

impl Projectable for Event {
    fn scalar_fields(&self) -> Vec<(&'static str, PropertyValue)> {
        let mut fields = Vec::new();
        if let Some(ActorRef::Login(login)) = &self.actor {
            fields.push(("actor", PropertyValue::from(login.clone())));
        }
        if let Some(created_at) = &self.created_at {
            fields.push(("created_at", PropertyValue::from(created_at.clone())));
        }
        if let Some(id) = &self.id {
            fields.push(("id", PropertyValue::from(id.clone())));
        }
        // Existing graphs carry this flag as `public_`.
        if let Some(public) = self.public {
            fields.push(("public_", PropertyValue::from(public)));
        }
        if let Some(event_type) = &self.event_type {
            fields.push(("type", PropertyValue::from(event_type.clone())));
        }
        if let Some(url) = &self.url {
            fields.push(("url", PropertyValue::from(url.clone())));
        }
        fields
    }
}
