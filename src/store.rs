use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::FeedError;
use crate::{Interaction, InteractionKind, MainTab, Post, PostId, University, UniversityId, UserId};

/// Seed payload for batch commands and test fixtures: the records the
/// surrounding application would otherwise stream in over HTTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub universities: Vec<University>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

#[derive(Default)]
struct Tables {
    posts: HashMap<PostId, Post>,
    universities: HashMap<UniversityId, University>,
    interactions: Vec<Interaction>,
    exposures: HashMap<(UserId, MainTab), HashSet<PostId>>,
}

/// In-memory stand-in for the relational store. Everything goes through one
/// async mutex; callers work on snapshots so long computations never hold it.
pub struct FeedStore {
    tables: Mutex<Tables>,
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    pub async fn load_seed(path: &Path) -> Result<Self, String> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| format!("failed to read seed file: {}", err))?;
        let seed: SeedData =
            serde_json::from_str(&data).map_err(|err| format!("failed to parse seed file: {}", err))?;

        let store = Self::new();
        store.apply_seed(seed).await;
        Ok(store)
    }

    pub async fn apply_seed(&self, seed: SeedData) {
        let mut guard = self.tables.lock().await;
        for university in seed.universities {
            guard.universities.insert(university.id, university);
        }
        for post in seed.posts {
            guard.posts.insert(post.id, post);
        }
        guard.interactions.extend(seed.interactions);
    }

    pub async fn upsert_post(&self, post: Post) {
        let mut guard = self.tables.lock().await;
        guard.posts.insert(post.id, post);
    }

    pub async fn post(&self, id: PostId) -> Option<Post> {
        let guard = self.tables.lock().await;
        guard.posts.get(&id).cloned()
    }

    pub async fn posts_snapshot(&self) -> Vec<Post> {
        let guard = self.tables.lock().await;
        guard.posts.values().cloned().collect()
    }

    pub async fn update_post<F>(&self, id: PostId, apply: F) -> Result<Post, FeedError>
    where
        F: FnOnce(&mut Post),
    {
        let mut guard = self.tables.lock().await;
        let post = guard
            .posts
            .get_mut(&id)
            .ok_or_else(|| FeedError::not_found("post", id))?;
        apply(post);
        Ok(post.clone())
    }

    pub async fn upsert_university(&self, university: University) {
        let mut guard = self.tables.lock().await;
        guard.universities.insert(university.id, university);
    }

    pub async fn university(&self, id: UniversityId) -> Option<University> {
        let guard = self.tables.lock().await;
        guard.universities.get(&id).cloned()
    }

    pub async fn universities_snapshot(&self) -> Vec<University> {
        let guard = self.tables.lock().await;
        guard.universities.values().cloned().collect()
    }

    pub async fn update_university<F>(&self, id: UniversityId, apply: F) -> Result<University, FeedError>
    where
        F: FnOnce(&mut University),
    {
        let mut guard = self.tables.lock().await;
        let university = guard
            .universities
            .get_mut(&id)
            .ok_or_else(|| FeedError::not_found("university", id))?;
        apply(university);
        Ok(university.clone())
    }

    pub async fn has_interaction(&self, post_id: PostId, user_id: UserId, kind: InteractionKind) -> bool {
        let guard = self.tables.lock().await;
        guard
            .interactions
            .iter()
            .any(|i| i.post_id == post_id && i.user_id == user_id && i.kind == kind)
    }

    pub async fn insert_interaction(&self, interaction: Interaction) {
        let mut guard = self.tables.lock().await;
        guard.interactions.push(interaction);
    }

    /// Removes one matching row; returns false when none existed.
    pub async fn remove_interaction(
        &self,
        post_id: PostId,
        user_id: UserId,
        kind: InteractionKind,
    ) -> bool {
        let mut guard = self.tables.lock().await;
        let position = guard
            .interactions
            .iter()
            .position(|i| i.post_id == post_id && i.user_id == user_id && i.kind == kind);
        match position {
            Some(index) => {
                guard.interactions.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn interaction_counts(&self, post_id: PostId) -> HashMap<InteractionKind, u32> {
        let guard = self.tables.lock().await;
        let mut counts = HashMap::new();
        for interaction in guard.interactions.iter().filter(|i| i.post_id == post_id) {
            *counts.entry(interaction.kind).or_insert(0) += 1;
        }
        counts
    }

    pub async fn user_interactions(&self, post_id: PostId, user_id: UserId) -> HashSet<InteractionKind> {
        let guard = self.tables.lock().await;
        guard
            .interactions
            .iter()
            .filter(|i| i.post_id == post_id && i.user_id == user_id)
            .map(|i| i.kind)
            .collect()
    }

    pub async fn user_interaction_history(&self, user_id: UserId) -> Vec<Interaction> {
        let guard = self.tables.lock().await;
        let mut history: Vec<Interaction> = guard
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history
    }

    pub async fn exposure(&self, user_id: UserId, tab: MainTab) -> HashSet<PostId> {
        let guard = self.tables.lock().await;
        guard
            .exposures
            .get(&(user_id, tab))
            .cloned()
            .unwrap_or_default()
    }

    /// Set insertion; re-recording an already-served post is a no-op, which
    /// keeps concurrent pagination from the same user safe.
    pub async fn record_exposure(&self, user_id: UserId, tab: MainTab, post_ids: &[PostId]) -> usize {
        let mut guard = self.tables.lock().await;
        let seen = guard.exposures.entry((user_id, tab)).or_default();
        let mut added = 0;
        for id in post_ids {
            if seen.insert(*id) {
                added += 1;
            }
        }
        added
    }

    pub async fn clear_exposure_all(&self, user_id: UserId) -> usize {
        let mut guard = self.tables.lock().await;
        let mut cleared = 0;
        for tab in MainTab::ALL {
            if let Some(seen) = guard.exposures.remove(&(user_id, tab)) {
                cleared += seen.len();
            }
        }
        cleared
    }

    /// Drops only the given post ids from a tab's exposure set.
    pub async fn clear_exposure_posts(
        &self,
        user_id: UserId,
        tab: MainTab,
        post_ids: &HashSet<PostId>,
    ) -> usize {
        let mut guard = self.tables.lock().await;
        let Some(seen) = guard.exposures.get_mut(&(user_id, tab)) else {
            return 0;
        };
        let before = seen.len();
        seen.retain(|id| !post_ids.contains(id));
        before - seen.len()
    }
}
