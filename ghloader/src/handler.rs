use std::sync::Arc;

use gstorage::graph::{GraphStore, VertexId};
use gstorage::{IdKind, IdPolicy, PropertyValue};
use serde_json::Value;

use crate::error::{LoaderError, Result};
use crate::identity::IdentityResolver;
use crate::mapper::{project, set_property};
use crate::models::{ActorRef, Event, Projectable};
use crate::params::HandlerOptions;
use crate::schema::{EventType, Label, VertexKind, KIND_KEY, NATURAL_KEY, TIMESTAMP_KEY};
use crate::timestamp::parse_timestamp_millis;

/// Turns one decoded event into an event vertex plus timestamped edges to
/// every entity it references.
pub struct EventHandler {
    resolver: IdentityResolver,
    options: HandlerOptions,
}

impl EventHandler {
    pub fn new(policy: Arc<dyn IdPolicy>, options: HandlerOptions) -> Self {
        Self::with_resolver(IdentityResolver::new(policy), options)
    }

    pub fn with_resolver(resolver: IdentityResolver, options: HandlerOptions) -> Self {
        Self { resolver, options }
    }

    pub fn for_store<S: GraphStore + ?Sized>(store: &S, options: HandlerOptions) -> Self {
        Self::new(store.id_policy(), options)
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Assembles `event` into `store` and returns the new event vertex.
    ///
    /// Nothing is committed here; transaction boundaries belong to the caller.
    pub fn handle<S: GraphStore + ?Sized>(&mut self, store: &mut S, event: &Event) -> Result<VertexId> {
        if self.check_type(event)?.is_none() {
            log::debug!("assembling event of unrecognized type {:?}", event.event_type);
        }
        let created_at = event
            .created_at
            .as_deref()
            .ok_or_else(|| LoaderError::InvalidEvent("event has no created_at".to_string()))?;
        let timestamp = parse_timestamp_millis(created_at)
            .map_err(|err| LoaderError::InvalidEvent(err.to_string()))?;

        let event_v = self.get_or_create(store, VertexKind::Event, None, None)?;
        project(store, event_v, event)?;

        if let Some(actor) = &event.actor {
            let user = match actor {
                ActorRef::Login(login) => self.get_or_create(
                    store,
                    VertexKind::User,
                    Some(login.clone()),
                    event.actor_attributes.as_ref().map(|a| a as &dyn Projectable),
                )?,
                ActorRef::Embedded(user) => self.get_or_create(
                    store,
                    VertexKind::User,
                    user.login.clone(),
                    Some(user),
                )?,
            };
            self.add_edge_to(store, event_v, user, Label::Actor, timestamp)?;
        }

        if let Some(repo) = &event.repository {
            let id = repo.id.map(|id| id.to_string());
            let repo_v = self.get_or_create(store, VertexKind::Repository, id, Some(repo))?;
            self.add_edge_to(store, event_v, repo_v, Label::Repository, timestamp)?;
        }

        let Some(payload) = &event.payload else {
            return Ok(event_v);
        };
        project(store, event_v, payload)?;

        if let Some(target) = &payload.target {
            let user = self.get_or_create(store, VertexKind::User, target.login.clone(), Some(target))?;
            self.add_edge_to(store, event_v, user, Label::Target, timestamp)?;
        }

        for page in payload.pages.iter().flatten() {
            let page_v = self.get_or_create(store, VertexKind::Page, page.sha.clone(), Some(page))?;
            self.add_edge_to(store, event_v, page_v, Label::Page, timestamp)?;
        }

        if let Some(member) = &payload.member {
            let user = self.get_or_create(store, VertexKind::User, member.login.clone(), Some(member))?;
            self.add_edge_to(store, event_v, user, Label::Member, timestamp)?;
        }

        if let Some(pr) = &payload.pull_request {
            let id = pr.id.map(|id| id.to_string());
            let pr_v = self.get_or_create(store, VertexKind::PullRequest, id, Some(pr))?;
            self.add_edge_to(store, event_v, pr_v, Label::PullRequest, timestamp)?;
        }

        if let Some(comment) = &payload.comment {
            let id = comment.id.map(|id| id.to_string());
            let comment_v = self.get_or_create(store, VertexKind::Comment, id, Some(comment))?;
            self.add_edge_to(store, event_v, comment_v, Label::Comment, timestamp)?;
        }

        if let Some(shas) = &payload.shas {
            // Only accepted entries consume an index.
            let accepted = shas.iter().filter_map(|sha| match sha {
                Value::String(s) => Some(s),
                _ => None,
            });
            for (i, sha) in accepted.enumerate() {
                let key = format!("sha_{}", i + 1);
                set_property(store, event_v, &key, PropertyValue::from(sha.as_str()))?;
            }
        }

        if let Some(release) = &payload.release {
            let id = release.id.map(|id| id.to_string());
            let release_v = self.get_or_create(store, VertexKind::Release, id, Some(release))?;
            self.add_edge_to(store, event_v, release_v, Label::Release, timestamp)?;
        }

        if let Some(team) = &payload.team {
            let id = team.id.map(|id| id.to_string());
            let team_v = self.get_or_create(store, VertexKind::Team, id, Some(team))?;
            self.add_edge_to(store, event_v, team_v, Label::Team, timestamp)?;
        }

        Ok(event_v)
    }

    fn check_type(&self, event: &Event) -> Result<Option<EventType>> {
        match event.event_type.as_deref() {
            Some(name) => match name.parse::<EventType>() {
                Ok(event_type) => Ok(Some(event_type)),
                Err(reason) if self.options.strict_event_types => {
                    Err(LoaderError::InvalidEvent(reason))
                }
                Err(_) => Ok(None),
            },
            None if self.options.strict_event_types => {
                Err(LoaderError::InvalidEvent("event has no type".to_string()))
            }
            None => Ok(None),
        }
    }

    /// Resolves the vertex for `natural` (or mints a fresh one when it is
    /// absent), creating it on first sight, then projects `source` onto it.
    fn get_or_create<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        kind: VertexKind,
        natural: Option<String>,
        source: Option<&dyn Projectable>,
    ) -> Result<VertexId> {
        let natural_key = natural.map(|value| format!("{}{value}", kind.key_prefix().unwrap_or_default()));
        let id = match &natural_key {
            Some(key) => self.resolver.hashed_id(key, IdKind::Vertex)?,
            None => self.fresh_vertex_id(store)?,
        };

        if store.get_vertex(id)?.is_none() {
            store.add_vertex(id)?;
            if let Some(key) = natural_key {
                set_property(store, id, NATURAL_KEY, PropertyValue::from(key))?;
            }
            set_property(store, id, KIND_KEY, PropertyValue::from(kind.as_str()))?;
        }

        if let Some(source) = source {
            project(store, id, source)?;
        }
        Ok(id)
    }

    fn fresh_vertex_id<S: GraphStore + ?Sized>(&mut self, store: &mut S) -> Result<VertexId> {
        loop {
            let id = self.resolver.random_id(IdKind::Vertex);
            if store.get_vertex(id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn add_edge_to<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        event_v: VertexId,
        in_v: VertexId,
        label: Label,
        timestamp: i64,
    ) -> Result<()> {
        let id = self.resolver.random_id(IdKind::Relation);
        store.add_edge(id, event_v, in_v, label.as_str())?;
        store.set_edge_property(id, TIMESTAMP_KEY, PropertyValue::Long(timestamp))?;
        Ok(())
    }
}
