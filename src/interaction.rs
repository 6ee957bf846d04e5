//! Optimistic like/repost counters and the profile follow toggle.

use std::fmt::Display;

use crate::api::types::{Post, Profile};
use crate::api::user_message;

/// Per-post engagement state as shown in a list row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInteraction {
    pub like_count: u64,
    pub repost_count: u64,
    pub liked: bool,
    pub reposted: bool,
    liking: bool,
    reposting: bool,
}

impl PostInteraction {
    pub fn from_post(post: &Post) -> Self {
        Self {
            like_count: post.like_count,
            repost_count: post.repost_count,
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.liking || self.reposting
    }

    /// Mark a like as in flight; `false` when one already is.
    pub fn begin_like(&mut self) -> bool {
        !std::mem::replace(&mut self.liking, true)
    }

    pub fn begin_repost(&mut self) -> bool {
        !std::mem::replace(&mut self.reposting, true)
    }

    /// Settle a like. Success bumps the counter by one; failure leaves it and
    /// returns the message to show.
    pub fn finish_like<E: Display>(&mut self, result: Result<(), E>) -> Option<String> {
        self.liking = false;
        match result {
            Ok(()) => {
                self.like_count += 1;
                self.liked = true;
                None
            }
            Err(e) => Some(user_message(&e)),
        }
    }

    pub fn finish_repost<E: Display>(&mut self, result: Result<(), E>) -> Option<String> {
        self.reposting = false;
        match result {
            Ok(()) => {
                self.repost_count += 1;
                self.reposted = true;
                None
            }
            Err(e) => Some(user_message(&e)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    Follow,
    Unfollow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowState {
    pub following: bool,
    pub followers_count: u64,
    in_flight: Option<FollowAction>,
}

impl FollowState {
    pub fn new(profile: &Profile, following: bool) -> Self {
        Self {
            following,
            followers_count: profile.followers_count,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The write to issue for a toggle, or `None` while one is pending.
    pub fn begin_toggle(&mut self) -> Option<FollowAction> {
        if self.in_flight.is_some() {
            return None;
        }
        let action = if self.following {
            FollowAction::Unfollow
        } else {
            FollowAction::Follow
        };
        self.in_flight = Some(action);
        Some(action)
    }

    pub fn finish_toggle<E: Display>(&mut self, result: Result<(), E>) -> Option<String> {
        let action = self.in_flight.take()?;
        match result {
            Ok(()) => {
                match action {
                    FollowAction::Follow => {
                        self.following = true;
                        self.followers_count += 1;
                    }
                    FollowAction::Unfollow => {
                        self.following = false;
                        self.followers_count = self.followers_count.saturating_sub(1);
                    }
                }
                None
            }
            Err(e) => Some(user_message(&e)),
        }
    }
}
