//! Wire shapes of the Reddit listing API and the conversions into core types.

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use safepost_core::{ActivityItem, Author, ContentId, ContentItem};
use serde::Deserialize;

pub const PERMALINK_HOST: &str = "https://reddit.com";
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

impl<T> Listing<T> {
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.data.children.into_iter().map(|thing| thing.data)
    }
}

#[derive(Debug, Deserialize)]
pub struct LinkData {
    pub id: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
pub struct CommentData {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_utc: f64,
}

/// A node of a comment tree. `more` placeholders deserialize with no author.
#[derive(Debug, Default, Deserialize)]
pub struct CommentNode {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub replies: Replies,
}

/// Reddit sends an empty string instead of a listing when a comment has no
/// replies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Replies {
    Listing(Box<Listing<CommentNode>>),
    Empty(serde_json::Value),
}

impl Default for Replies {
    fn default() -> Self {
        Self::Empty(serde_json::Value::Null)
    }
}

pub fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{PERMALINK_HOST}{permalink}")
    }
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    let millis = (created_utc * 1000.0) as i64;
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

impl LinkData {
    pub fn into_content_item(self, fallback_scope: &str) -> ContentItem {
        let scope =
            if self.subreddit.is_empty() { fallback_scope.to_string() } else { self.subreddit };
        ContentItem {
            id: ContentId(self.id),
            scope,
            title: self.title,
            body: self.selftext,
            url: absolute_permalink(&self.permalink),
            score: self.score,
            existing_repliers: Vec::new(),
        }
    }

    /// Link posts carry their target in `url`, so it is part of the body the
    /// promotional check sees.
    pub fn into_activity(self) -> ActivityItem {
        let body = if self.is_self || self.url.is_empty() {
            self.selftext
        } else if self.selftext.is_empty() {
            self.url
        } else {
            format!("{}\n{}", self.selftext, self.url)
        };
        ActivityItem::post(body, timestamp(self.created_utc))
    }
}

impl CommentData {
    pub fn into_activity(self) -> ActivityItem {
        ActivityItem::comment(self.body, timestamp(self.created_utc))
    }
}

/// Breadth-first walk of a comment tree, returning the first `limit` named
/// authors. Deleted accounts and `more` placeholders are skipped.
pub fn flatten_authors(root: Listing<CommentNode>, limit: usize) -> Vec<Author> {
    let mut authors = Vec::new();
    let mut queue: VecDeque<CommentNode> = root.into_items().collect();

    while let Some(node) = queue.pop_front() {
        if authors.len() >= limit {
            break;
        }
        if let Some(author) = node.author.filter(|name| !name.is_empty() && name != DELETED_AUTHOR)
        {
            authors.push(Author::new(author));
        }
        if let Replies::Listing(replies) = node.replies {
            queue.extend(replies.into_items());
        }
    }

    authors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{absolute_permalink, flatten_authors, CommentNode, LinkData, Listing};
    use safepost_core::ActivityKind;

    fn comment(author: &str, replies: serde_json::Value) -> serde_json::Value {
        json!({"kind": "t1", "data": {"author": author, "body": "tip", "replies": replies}})
    }

    fn listing(children: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"kind": "Listing", "data": {"children": children}})
    }

    #[test]
    fn authors_are_flattened_breadth_first() {
        let tree = listing(vec![
            comment("alice", listing(vec![comment("carol", listing(vec![comment("erin", json!(""))]))])),
            comment("bob", listing(vec![comment("dave", json!(""))])),
            comment("[deleted]", json!("")),
            json!({"kind": "more", "data": {"count": 4, "children": ["x1", "x2"]}}),
        ]);
        let parsed: Listing<CommentNode> = match serde_json::from_value(tree) {
            Ok(parsed) => parsed,
            Err(error) => panic!("comment tree should parse: {error}"),
        };

        let names: Vec<String> =
            flatten_authors(parsed, 20).into_iter().map(|author| author.0).collect();
        assert_eq!(names, vec!["alice", "bob", "carol", "dave", "erin"]);
    }

    #[test]
    fn flatten_stops_at_limit() {
        let tree = listing(vec![
            comment("alice", json!("")),
            comment("bob", json!("")),
            comment("carol", json!("")),
        ]);
        let parsed: Listing<CommentNode> = match serde_json::from_value(tree) {
            Ok(parsed) => parsed,
            Err(error) => panic!("comment tree should parse: {error}"),
        };

        assert_eq!(flatten_authors(parsed, 2).len(), 2);
    }

    #[test]
    fn link_posts_expose_their_target_url_to_the_ratio_check() {
        let link: LinkData = match serde_json::from_value(json!({
            "id": "p1",
            "title": "My restoration",
            "selftext": "",
            "url": "https://restore.example/gallery",
            "is_self": false,
            "created_utc": 1_772_000_000.0
        })) {
            Ok(link) => link,
            Err(error) => panic!("link should parse: {error}"),
        };

        let activity = link.into_activity();
        assert_eq!(activity.kind, ActivityKind::Post);
        assert!(activity.contains_link("https://restore.example/"));
        assert_eq!(activity.created_at.timestamp(), 1_772_000_000);
    }

    #[test]
    fn permalinks_are_made_absolute_once() {
        assert_eq!(
            absolute_permalink("/r/OldPhotos/comments/abc/title/"),
            "https://reddit.com/r/OldPhotos/comments/abc/title/"
        );
        assert_eq!(absolute_permalink("https://reddit.com/r/x"), "https://reddit.com/r/x");
    }
}
