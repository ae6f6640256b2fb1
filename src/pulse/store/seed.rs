//! 开发用的默认数据

use crate::pulse::store::document::Document;
use crate::pulse::store::types::collections;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

/// 默认登录用户
pub const SEED_USER_ID: &str = "user-123";

fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

fn rows(value: Value) -> Vec<serde_json::Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// 默认文档：4 名候选球员、2 条帖子（其一带投票）、默认用户资料，其余集合为空
pub fn default_document() -> Document {
    let now = Utc::now().to_rfc3339();
    let mut document = Document::new();

    document.set_rows(
        collections::PLAYERS,
        rows(json!([
            {
                "id": "1",
                "name": "Kylian Mbappé",
                "position": "Attaquant",
                "club": "Real Madrid",
                "photo": "https://images.unsplash.com/photo-1571019613454-1cb2f99b2d8b?w=400&h=400&fit=crop",
                "stats": { "goals": 45, "assists": 12, "matches": 50, "rating": 9.2 },
                "created_at": now
            },
            {
                "id": "2",
                "name": "Erling Haaland",
                "position": "Attaquant",
                "club": "Manchester City",
                "photo": "https://images.unsplash.com/photo-1556506751-69a7d6fb64dd?w=400&h=400&fit=crop",
                "stats": { "goals": 52, "assists": 8, "matches": 48, "rating": 9.0 },
                "created_at": now
            },
            {
                "id": "3",
                "name": "Jude Bellingham",
                "position": "Milieu",
                "club": "Real Madrid",
                "photo": "https://images.unsplash.com/photo-1543326727-cf6c39e8f84c?w=400&h=400&fit=crop",
                "stats": { "goals": 23, "assists": 15, "matches": 47, "rating": 8.8 },
                "created_at": now
            },
            {
                "id": "4",
                "name": "Pedri González",
                "position": "Milieu",
                "club": "FC Barcelone",
                "photo": "https://images.unsplash.com/photo-1574629810360-7efbbe195018?w=400&h=400&fit=crop",
                "stats": { "goals": 8, "assists": 22, "matches": 45, "rating": 8.5 },
                "created_at": now
            }
        ])),
    );

    document.set_rows(
        collections::POSTS,
        rows(json!([
            {
                "id": "1",
                "user_id": SEED_USER_ID,
                "author": { "name": "Alex Martin", "avatar": "", "verified": true },
                "content": "Mbappé est vraiment impressionnant cette saison ! Ses stats parlent d'elles-mêmes 🔥",
                "likes_count": 45,
                "comments_count": 12,
                "created_at": hours_ago(2)
            },
            {
                "id": "2",
                "user_id": "user-456",
                "author": { "name": "Sophie Durand", "avatar": "", "verified": false },
                "content": "Qui selon vous mérite le Ballon d'Or cette année ?",
                "poll": {
                    "question": "Votre favori pour le Ballon d'Or 2025 ?",
                    "options": [
                        { "text": "Mbappé", "votes": 45 },
                        { "text": "Haaland", "votes": 38 },
                        { "text": "Bellingham", "votes": 32 },
                        { "text": "Autre", "votes": 15 }
                    ]
                },
                "likes_count": 78,
                "comments_count": 23,
                "created_at": hours_ago(4)
            }
        ])),
    );

    document.set_rows(
        collections::PROFILES,
        rows(json!([
            {
                "user_id": SEED_USER_ID,
                "username": "Utilisateur Test",
                "bio": "Fan de football et du Ballon d'Or !",
                "avatar_url": "",
                "created_at": now
            }
        ])),
    );

    for name in [
        collections::VOTES,
        collections::LIKES,
        collections::COMMENTS,
        collections::MESSAGES,
        collections::NOTIFICATIONS,
        collections::GROUPS,
    ] {
        document.set_rows(name, Vec::new());
    }

    document
}
