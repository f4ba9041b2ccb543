// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Member ranking.

use serde::Serialize;
use std::sync::Arc;

use crate::db::{fields, Filter, OrderBy, UserStore};
use crate::error::Result;
use crate::models::{Role, UserRecord};

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub number_tree: i64,
    pub score: i64,
}

impl From<UserRecord> for LeaderboardEntry {
    fn from(user: UserRecord) -> Self {
        Self {
            name: user.name,
            number_tree: user.number_tree,
            score: user.score,
        }
    }
}

const RANKING: [OrderBy; 2] = [
    OrderBy::desc(fields::NUMBER_TREE),
    OrderBy::desc(fields::SCORE),
];

#[derive(Clone)]
pub struct Leaderboard {
    store: Arc<dyn UserStore>,
    size: usize,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn UserStore>, size: usize) -> Self {
        Self { store, size }
    }

    /// Top members using the configured board size.
    pub async fn top(&self) -> Result<Vec<LeaderboardEntry>> {
        self.top_members(self.size).await
    }

    /// Up to `n` members ranked by trees grown, then score. Admins never
    /// appear. Ties beyond both keys keep the store's natural order.
    pub async fn top_members(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        let users = self
            .store
            .scan_ordered(Some(Filter::eq(fields::ROLE, Role::Member)), &RANKING, n)
            .await?;

        Ok(users.into_iter().map(LeaderboardEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewUser;

    fn seed(store: &MemoryStore, id: &str, number_tree: i64, score: i64, role: Role) {
        let mut user = NewUser {
            name: id.to_uppercase(),
            phone: format!("08{id}"),
            age: None,
            gender: None,
        }
        .into_record();
        user.id = id.to_string();
        user.number_tree = number_tree;
        user.score = score;
        user.role = role;
        store.put(user);
    }

    #[tokio::test]
    async fn test_ranks_by_trees_then_score() {
        let store = MemoryStore::new();
        seed(&store, "a", 2, 100, Role::Member);
        seed(&store, "b", 2, 300, Role::Member);
        seed(&store, "c", 5, 0, Role::Member);
        seed(&store, "d", 99, 9999, Role::Admin);

        let board = Leaderboard::new(Arc::new(store), 10);
        let names: Vec<String> = board.top().await.unwrap().into_iter().map(|e| e.name).collect();

        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn test_limits_to_n() {
        let store = MemoryStore::new();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            seed(&store, id, i as i64, 0, Role::Member);
        }

        let board = Leaderboard::new(Arc::new(store), 10);
        let top = board.top_members(2).await.unwrap();

        assert_eq!(
            top,
            vec![
                LeaderboardEntry {
                    name: "E".to_string(),
                    number_tree: 4,
                    score: 0
                },
                LeaderboardEntry {
                    name: "D".to_string(),
                    number_tree: 3,
                    score: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_board() {
        let board = Leaderboard::new(Arc::new(MemoryStore::new()), 10);
        assert!(board.top().await.unwrap().is_empty());
    }
}
