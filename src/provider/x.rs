use serde_json::Value;
use std::time::Duration;

use crate::post::Post;
use crate::provider::ProviderSpec;

pub fn spec() -> ProviderSpec {
    ProviderSpec {
        name: "x",
        base_url: "https://x.com",
        login_url: "https://x.com",
        requires_login: true,
        route_pattern: "*/UserTweets?variables=*",
        ready_selector: Some("div[data-testid=\"UserName\"]"),
        settle: Duration::from_secs(5),
        parser: parse_user_tweets,
    }
}

/// Walks the UserTweets timeline instructions, keeping only plain timeline
/// items. Retweets are the provider's reshared content and are excluded by
/// policy; anything missing an expected field is skipped.
fn parse_user_tweets(payload: &Value) -> Option<Vec<Post>> {
    let instructions = payload
        .pointer("/data/user/result/timeline_v2/timeline/instructions")?
        .as_array()?;
    let entries = instructions
        .iter()
        .find(|i| i.get("type").and_then(Value::as_str) == Some("TimelineAddEntries"))?
        .get("entries")?
        .as_array()?;

    let mut posts = Vec::new();
    for entry in entries {
        // cursors and modules share the entry list with tweets
        if entry.pointer("/content/entryType").and_then(Value::as_str)
            != Some("TimelineTimelineItem")
        {
            continue;
        }
        let result = match entry.pointer("/content/itemContent/tweet_results/result") {
            Some(result) => result,
            None => continue,
        };
        if result
            .pointer("/legacy/retweeted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }
        let id = match entry.get("entryId").and_then(Value::as_str) {
            Some(id) => id,
            None => continue,
        };
        let content = result
            .pointer("/legacy/full_text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let media = result
            .pointer("/legacy/entities/media")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| {
                        m.get("media_url_https")
                            .and_then(Value::as_str)
                            .map(str::to_owned)
                    })
                    .collect()
            })
            .unwrap_or_default();
        posts.push(Post::new(id, content, media, None));
    }
    Some(posts)
}
