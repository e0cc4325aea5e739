use serde_json::Value;
use std::time::Duration;

use crate::post::Post;
use crate::provider::ProviderSpec;

pub fn spec() -> ProviderSpec {
    ProviderSpec {
        name: "instagram",
        base_url: "https://instagram.com",
        login_url: "https://instagram.com",
        requires_login: false,
        route_pattern: "*/query",
        ready_selector: None,
        settle: Duration::from_secs(4),
        parser: parse_timeline,
    }
}

/// Walks the GraphQL user-timeline connection. Instagram timeline payloads
/// carry no reshare marker, so every node is a candidate; anything with a
/// missing or renamed field is skipped, never an error.
fn parse_timeline(payload: &Value) -> Option<Vec<Post>> {
    let edges = payload
        .pointer("/data/xdt_api__v1__feed__user_timeline_graphql_connection/edges")?
        .as_array()?;

    let mut posts = Vec::new();
    for edge in edges {
        let node = match edge.get("node") {
            Some(node) => node,
            None => continue,
        };
        let id = match node.get("id").and_then(Value::as_str) {
            Some(id) => id,
            None => continue,
        };
        let content = node
            .pointer("/caption/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        posts.push(Post::new(id, content, extract_media(node), None));
    }
    Some(posts)
}

/// Media rule: a carousel contributes every pane in source order; with no
/// carousel a video wins over any still image; a plain post falls back to
/// its single image URL.
fn extract_media(node: &Value) -> Vec<String> {
    if let Some(panes) = node.get("carousel_media").and_then(Value::as_array) {
        return panes
            .iter()
            .filter_map(|pane| {
                pane.pointer("/image_versions2/candidates/0/url")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .collect();
    }
    if let Some(url) = node
        .pointer("/video_versions/0/url")
        .and_then(Value::as_str)
    {
        return vec![url.to_owned()];
    }
    node.pointer("/image_versions2/candidates/0/url")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timeline(nodes: Vec<Value>) -> Value {
        let edges: Vec<Value> = nodes.into_iter().map(|node| json!({ "node": node })).collect();
        json!({
            "data": {
                "xdt_api__v1__feed__user_timeline_graphql_connection": {
                    "edges": edges
                }
            }
        })
    }

    #[test]
    fn test_missing_data_path_yields_nothing() {
        assert!(parse_timeline(&json!({})).is_none());
        assert!(parse_timeline(&json!({ "data": {} })).is_none());
        assert!(parse_timeline(&json!({ "data": { "other_connection": [] } })).is_none());
    }

    #[test]
    fn test_carousel_media_in_source_order() {
        let payload = timeline(vec![json!({
            "id": "p1",
            "caption": { "text": "three images" },
            "carousel_media": [
                { "image_versions2": { "candidates": [{ "url": "https://img/1.jpg" }] } },
                { "image_versions2": { "candidates": [{ "url": "https://img/2.jpg" }] } },
                { "image_versions2": { "candidates": [{ "url": "https://img/3.jpg" }] } }
            ]
        })]);
        let posts = parse_timeline(&payload).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].media,
            vec!["https://img/1.jpg", "https://img/2.jpg", "https://img/3.jpg"]
        );
    }

    #[test]
    fn test_video_wins_over_still_image() {
        let payload = timeline(vec![json!({
            "id": "p2",
            "caption": { "text": "clip" },
            "video_versions": [{ "url": "https://vid/hd.mp4" }],
            "image_versions2": { "candidates": [{ "url": "https://img/cover.jpg" }] }
        })]);
        let posts = parse_timeline(&payload).unwrap();
        assert_eq!(posts[0].media, vec!["https://vid/hd.mp4"]);
    }

    #[test]
    fn test_single_image_fallback() {
        let payload = timeline(vec![json!({
            "id": "p3",
            "caption": { "text": "plain" },
            "image_versions2": { "candidates": [{ "url": "https://img/only.jpg" }] }
        })]);
        let posts = parse_timeline(&payload).unwrap();
        assert_eq!(posts[0].media, vec!["https://img/only.jpg"]);
    }

    #[test]
    fn test_no_media_at_all_is_empty() {
        let payload = timeline(vec![json!({ "id": "p4", "caption": { "text": "text only" } })]);
        let posts = parse_timeline(&payload).unwrap();
        assert!(posts[0].media.is_empty());
    }

    #[test]
    fn test_null_caption_becomes_empty_content() {
        let payload = timeline(vec![json!({ "id": "p5", "caption": null })]);
        let posts = parse_timeline(&payload).unwrap();
        assert_eq!(posts[0].content, "");
    }

    #[test]
    fn test_node_without_id_is_skipped() {
        let payload = timeline(vec![
            json!({ "caption": { "text": "no id here" } }),
            json!({ "id": "kept", "caption": { "text": "fine" } }),
        ]);
        let posts = parse_timeline(&payload).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "kept");
    }
}
