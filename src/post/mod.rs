use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized feed item produced by a response interceptor.
///
/// Never mutated after construction; lives only for the duration of one
/// scrape run and whatever export the caller performs afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub media: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        media: Vec<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            media,
            metadata,
        }
    }
}

/// Insertion-ordered, id-deduplicated collection of posts.
///
/// Scoped to one scrape run. Single writer (the channel drain in the
/// harvest loop), single reader, so no locking is involved.
#[derive(Debug, Default)]
pub struct PostStore {
    posts: Vec<Post>,
    seen: std::collections::HashSet<String>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a post unless its id was already seen. Re-offering a known
    /// id is a no-op, never an overwrite. Returns whether it was added.
    pub fn add(&mut self, post: Post) -> bool {
        if self.seen.contains(&post.id) {
            return false;
        }
        self.seen.insert(post.id.clone());
        self.posts.push(post);
        true
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Ordered view of everything collected so far. Callers must treat the
    /// slice as read-only once the scrape has returned.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Post {
        Post::new(id, format!("content for {}", id), vec![], None)
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let mut store = PostStore::new();
        assert!(store.add(post("a")));
        assert!(store.add(post("b")));
        assert!(!store.add(post("a")));
        assert!(!store.add(post("a")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_does_not_overwrite() {
        let mut store = PostStore::new();
        store.add(Post::new("a", "first", vec![], None));
        store.add(Post::new("a", "second", vec![], None));
        assert_eq!(store.posts()[0].content, "first");
    }

    #[test]
    fn test_first_seen_order_is_preserved() {
        let mut store = PostStore::new();
        for id in ["c", "a", "b"] {
            store.add(post(id));
        }
        store.add(post("a")); // re-offered, must not move
        let ids: Vec<&str> = store.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_serialization_shape() {
        let p = Post::new("1", "hello", vec!["https://img/1.jpg".into()], None);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["media"][0], "https://img/1.jpg");
        // absent metadata is omitted from the export payload
        assert!(json.get("metadata").is_none());
    }
}
