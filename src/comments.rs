//! Comment → reply tree with optimistic entries and reaction toggles.
//!
//! Everything here is synchronous; [`crate::page::AnimePage`] drives the
//! network side and calls back into the tree to commit or roll back.

use std::collections::HashSet;

use crate::gateway::{EntryRef, ReactionKind};
use crate::types::{Comment, CreatedEntry, Reply};

/// The four reaction fields of a comment or reply.
///
/// `liked` and `disliked` are never both true after [`Reaction::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reaction {
    pub likes: u32,
    pub dislikes: u32,
    pub liked: bool,
    pub disliked: bool,
}

impl Reaction {
    /// Next state after the user presses `kind`, computed only from `self`.
    pub fn apply(self, kind: ReactionKind) -> Self {
        let mut next = self;
        match kind {
            ReactionKind::Like if self.liked => {
                next.liked = false;
                next.likes = next.likes.saturating_sub(1);
            }
            ReactionKind::Like => {
                next.liked = true;
                next.likes += 1;
                if self.disliked {
                    next.disliked = false;
                    next.dislikes = next.dislikes.saturating_sub(1);
                }
            }
            ReactionKind::Dislike if self.disliked => {
                next.disliked = false;
                next.dislikes = next.dislikes.saturating_sub(1);
            }
            ReactionKind::Dislike => {
                next.disliked = true;
                next.dislikes += 1;
                if self.liked {
                    next.liked = false;
                    next.likes = next.likes.saturating_sub(1);
                }
            }
        }
        next
    }

    /// Message shown once the server accepted the toggle from `self`.
    pub fn outcome_message(self, kind: ReactionKind) -> &'static str {
        match kind {
            ReactionKind::Like if self.liked => "Like removed",
            ReactionKind::Like => "Like added",
            ReactionKind::Dislike if self.disliked => "Dislike removed",
            ReactionKind::Dislike => "Dislike added",
        }
    }
}

trait Reactable {
    fn reaction(&self) -> Reaction;
    fn set_reaction(&mut self, reaction: Reaction);
}

macro_rules! impl_reactable {
    ($ty:ty) => {
        impl Reactable for $ty {
            fn reaction(&self) -> Reaction {
                Reaction {
                    likes: self.likes,
                    dislikes: self.dislikes,
                    liked: self.is_liked,
                    disliked: self.is_disliked,
                }
            }

            fn set_reaction(&mut self, reaction: Reaction) {
                self.likes = reaction.likes;
                self.dislikes = reaction.dislikes;
                self.is_liked = reaction.liked;
                self.is_disliked = reaction.disliked;
            }
        }
    };
}

impl_reactable!(Comment);
impl_reactable!(Reply);

/// Ownership is decided by login name, never the display name.
pub fn is_owner(real_username: &str, session_username: Option<&str>) -> bool {
    session_username.is_some_and(|user| user.eq_ignore_ascii_case(real_username))
}

/// Compose-box prefix when answering a reply.
pub fn reply_prefix(reply: &Reply) -> String {
    format!("@{} ", reply.display_name())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleBadge {
    Verified,
    Premium,
    Moderator,
    Admin,
}

/// Highest-precedence role for name colouring: admin > moderator > premium > verified.
pub fn role_badge(roles: &[String], verified: bool) -> Option<RoleBadge> {
    let from_roles = roles
        .iter()
        .filter_map(|role| match role.as_str() {
            "admin" => Some(RoleBadge::Admin),
            "moderator" => Some(RoleBadge::Moderator),
            "premium" => Some(RoleBadge::Premium),
            "verified" => Some(RoleBadge::Verified),
            _ => None,
        })
        .max();
    from_roles.or(verified.then_some(RoleBadge::Verified))
}

/// Loaded comments plus the per-entry reaction guards.
#[derive(Debug, Default)]
pub struct CommentTree {
    comments: Vec<Comment>,
    comment_reactions: HashSet<i64>,
    reply_reactions: HashSet<i64>,
}

impl CommentTree {
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        // keep optimistic entries that are still waiting on the server
        let pending: Vec<Comment> = self
            .comments
            .drain(..)
            .filter(|c| c.is_pending)
            .collect();
        self.comments = pending;
        self.comments.extend(comments);
    }

    /// Comments plus replies.
    pub fn total_count(&self) -> usize {
        self.comments.len() + self.comments.iter().map(|c| c.replies.len()).sum::<usize>()
    }

    pub fn comment(&self, id: i64) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn reply(&self, id: i64) -> Option<&Reply> {
        self.comments
            .iter()
            .flat_map(|c| c.replies.iter())
            .find(|r| r.id == id)
    }

    pub fn author(&self, target: EntryRef) -> Option<&str> {
        match target {
            EntryRef::Comment(id) => self.comment(id).map(|c| c.real_username.as_str()),
            EntryRef::Reply(id) => self.reply(id).map(|r| r.real_username.as_str()),
        }
    }

    /// True while the entry only exists locally under a temporary id.
    pub fn is_pending(&self, target: EntryRef) -> bool {
        match target {
            EntryRef::Comment(id) => self.comment(id).is_some_and(|c| c.is_pending),
            EntryRef::Reply(id) => self.reply(id).is_some_and(|r| r.is_pending),
        }
    }

    fn reply_mut(&mut self, id: i64) -> Option<&mut Reply> {
        self.comments
            .iter_mut()
            .flat_map(|c| c.replies.iter_mut())
            .find(|r| r.id == id)
    }

    fn reactable_mut(&mut self, target: EntryRef) -> Option<&mut dyn Reactable> {
        match target {
            EntryRef::Comment(id) => self
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .map(|c| c as &mut dyn Reactable),
            EntryRef::Reply(id) => self.reply_mut(id).map(|r| r as &mut dyn Reactable),
        }
    }

    fn guard(&mut self, target: EntryRef) -> (&mut HashSet<i64>, i64) {
        match target {
            EntryRef::Comment(id) => (&mut self.comment_reactions, id),
            EntryRef::Reply(id) => (&mut self.reply_reactions, id),
        }
    }

    pub fn reaction_in_flight(&self, target: EntryRef) -> bool {
        match target {
            EntryRef::Comment(id) => self.comment_reactions.contains(&id),
            EntryRef::Reply(id) => self.reply_reactions.contains(&id),
        }
    }

    /// Applies the toggle optimistically and returns the state to restore on failure.
    /// `None` when the entry is unknown or a toggle for it is still running.
    pub fn begin_reaction(&mut self, target: EntryRef, kind: ReactionKind) -> Option<Reaction> {
        if self.reaction_in_flight(target) {
            return None;
        }
        let entry = self.reactable_mut(target)?;
        let before = entry.reaction();
        entry.set_reaction(before.apply(kind));
        let (guard, id) = self.guard(target);
        guard.insert(id);
        Some(before)
    }

    pub fn finish_reaction(&mut self, target: EntryRef, rollback: Option<Reaction>) {
        let (guard, id) = self.guard(target);
        guard.remove(&id);
        if let Some(before) = rollback {
            if let Some(entry) = self.reactable_mut(target) {
                entry.set_reaction(before);
            }
        }
    }

    /// Unique negative id derived from the wall clock.
    pub fn temporary_id(&self, now_millis: i64) -> i64 {
        let mut id = -now_millis.max(1);
        while self.comment(id).is_some() || self.reply(id).is_some() {
            id -= 1;
        }
        id
    }

    pub fn insert_pending_comment(&mut self, comment: Comment) {
        self.comments.insert(0, comment);
    }

    pub fn commit_comment(&mut self, temp_id: i64, created: &CreatedEntry) -> bool {
        match self.comments.iter_mut().find(|c| c.id == temp_id) {
            Some(comment) => {
                comment.id = created.id;
                comment.created_at = created.created_at;
                comment.is_pending = false;
                for reply in &mut comment.replies {
                    reply.parent_id = created.id;
                }
                true
            }
            None => false,
        }
    }

    pub fn discard_comment(&mut self, temp_id: i64) {
        self.comments.retain(|c| c.id != temp_id);
    }

    pub fn insert_pending_reply(&mut self, reply: Reply) -> bool {
        match self.comments.iter_mut().find(|c| c.id == reply.parent_id) {
            Some(comment) => {
                comment.replies.push(reply);
                true
            }
            None => false,
        }
    }

    pub fn commit_reply(&mut self, temp_id: i64, created: &CreatedEntry) -> bool {
        match self.reply_mut(temp_id) {
            Some(reply) => {
                reply.id = created.id;
                reply.created_at = created.created_at;
                reply.is_pending = false;
                true
            }
            None => false,
        }
    }

    pub fn discard_reply(&mut self, temp_id: i64) {
        for comment in &mut self.comments {
            comment.replies.retain(|r| r.id != temp_id);
        }
    }

    pub fn set_text(&mut self, target: EntryRef, text: &str) -> bool {
        match target {
            EntryRef::Comment(id) => self
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .map(|c| c.text = text.to_string())
                .is_some(),
            EntryRef::Reply(id) => self
                .reply_mut(id)
                .map(|r| r.text = text.to_string())
                .is_some(),
        }
    }

    pub fn remove(&mut self, target: EntryRef) {
        match target {
            EntryRef::Comment(id) => self.comments.retain(|c| c.id != id),
            EntryRef::Reply(id) => self.discard_reply(id),
        }
    }
}
