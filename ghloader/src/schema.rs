//! Vertex kinds, edge labels and the property keys the loader reserves.

use std::fmt;
use std::str::FromStr;

/// Property recording the kind of a vertex. Record fields named `type`
/// keep their own key, so the kind lives under `type_`.
pub const KIND_KEY: &str = "type_";
/// Property holding the prefixed natural key of entity vertices.
pub const NATURAL_KEY: &str = "natural_key";
/// Property set on every edge.
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Comment,
    Event,
    Page,
    PullRequest,
    Release,
    Repository,
    Team,
    User,
}

impl VertexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexKind::Comment => "Comment",
            VertexKind::Event => "Event",
            VertexKind::Page => "Page",
            VertexKind::PullRequest => "PullRequest",
            VertexKind::Release => "Release",
            VertexKind::Repository => "Repository",
            VertexKind::Team => "Team",
            VertexKind::User => "User",
        }
    }

    /// Prefix of the natural key; events have none.
    pub fn key_prefix(&self) -> Option<&'static str> {
        match self {
            VertexKind::Comment => Some("comment:"),
            VertexKind::Event => None,
            VertexKind::Page => Some("page:"),
            VertexKind::PullRequest => Some("pr:"),
            VertexKind::Release => Some("release:"),
            VertexKind::Repository => Some("repo:"),
            VertexKind::Team => Some("team:"),
            VertexKind::User => Some("user:"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Actor,
    Comment,
    Member,
    Page,
    PullRequest,
    Release,
    Repository,
    Target,
    Team,
}

impl Label {
    pub const ALL: [Label; 9] = [
        Label::Actor,
        Label::Comment,
        Label::Member,
        Label::Page,
        Label::PullRequest,
        Label::Release,
        Label::Repository,
        Label::Target,
        Label::Team,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Actor => "actor",
            Label::Comment => "comment",
            Label::Member => "member",
            Label::Page => "page",
            Label::PullRequest => "pull_request",
            Label::Release => "release",
            Label::Repository => "repository",
            Label::Target => "target",
            Label::Team => "team",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CommitCommentEvent,
    CreateEvent,
    DeleteEvent,
    DownloadEvent,
    FollowEvent,
    ForkApplyEvent,
    ForkEvent,
    GistEvent,
    GollumEvent,
    IssueCommentEvent,
    IssuesEvent,
    MemberEvent,
    PublicEvent,
    PullRequestEvent,
    PullRequestReviewCommentEvent,
    PushEvent,
    ReleaseEvent,
    TeamAddEvent,
    WatchEvent,
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            "CommitCommentEvent" => EventType::CommitCommentEvent,
            "CreateEvent" => EventType::CreateEvent,
            "DeleteEvent" => EventType::DeleteEvent,
            "DownloadEvent" => EventType::DownloadEvent,
            "FollowEvent" => EventType::FollowEvent,
            "ForkApplyEvent" => EventType::ForkApplyEvent,
            "ForkEvent" => EventType::ForkEvent,
            "GistEvent" => EventType::GistEvent,
            "GollumEvent" => EventType::GollumEvent,
            "IssueCommentEvent" => EventType::IssueCommentEvent,
            "IssuesEvent" => EventType::IssuesEvent,
            "MemberEvent" => EventType::MemberEvent,
            "PublicEvent" => EventType::PublicEvent,
            "PullRequestEvent" => EventType::PullRequestEvent,
            "PullRequestReviewCommentEvent" => EventType::PullRequestReviewCommentEvent,
            "PushEvent" => EventType::PushEvent,
            "ReleaseEvent" => EventType::ReleaseEvent,
            "TeamAddEvent" => EventType::TeamAddEvent,
            "WatchEvent" => EventType::WatchEvent,
            other => return Err(format!("unknown event type '{other}'")),
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_non_event_kind_has_a_prefix() {
        for kind in [
            VertexKind::Comment,
            VertexKind::Page,
            VertexKind::PullRequest,
            VertexKind::Release,
            VertexKind::Repository,
            VertexKind::Team,
            VertexKind::User,
        ] {
            assert!(kind.key_prefix().is_some(), "{}", kind.as_str());
        }
        assert!(VertexKind::Event.key_prefix().is_none());
    }

    #[test]
    fn event_types_parse() {
        assert_eq!("PushEvent".parse::<EventType>(), Ok(EventType::PushEvent));
        assert!("SponsorshipEvent".parse::<EventType>().is_err());
    }
}
