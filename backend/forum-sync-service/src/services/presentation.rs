//! How a resource looks as a forum thread.

use crate::forum::{ForumChannel, ThreadAction, ThreadContent, MAX_APPLIED_TAGS};
use crate::models::{Resource, Snowflake, TagMapping};
use std::fmt::Write;
use tracing::warn;

pub const REPORT_RESOURCE_ID: &str = "report_resource";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn thread_title(resource: &Resource) -> String {
    resource.name.clone()
}

pub fn thread_body(resource: &Resource) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "# {}", resource.name);
    let _ = writeln!(body, "*By: {}*", resource.author);
    if let Some(description) = resource.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(body, "{}", description);
    }
    if let Some(user) = &resource.created_by_user_id {
        let _ = writeln!(body, "**Created by:** <@{}>", user);
    }
    if !resource.updated_by_user_ids.is_empty() {
        let mentions: Vec<String> = resource
            .updated_by_user_ids
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect();
        let _ = writeln!(body, "**Last updated by:** {}", mentions.join(", "));
    }
    let _ = writeln!(
        body,
        "**Created at:** {}",
        resource.created_at.format(TIMESTAMP_FORMAT)
    );
    let _ = writeln!(
        body,
        "**Last updated at:** {}",
        resource.updated_at.format(TIMESTAMP_FORMAT)
    );
    body
}

/// Link buttons are disabled once a resource is compromised. Reporting is
/// not wired up yet, so its button is always disabled.
pub fn thread_actions(resource: &Resource) -> Vec<ThreadAction> {
    let mut actions = Vec::new();
    let links = [
        ("Website", &resource.website_url),
        ("Discord", &resource.discord_url),
    ];
    for (label, url) in links {
        if let Some(url) = url.as_deref().filter(|u| !u.is_empty()) {
            actions.push(ThreadAction::Link {
                label: label.to_string(),
                url: url.to_string(),
                disabled: resource.is_compromised,
            });
        }
    }
    actions.push(ThreadAction::Button {
        label: "Report Resource".to_string(),
        custom_id: REPORT_RESOURCE_ID.to_string(),
        disabled: true,
    });
    actions
}

/// Forum tag ids for a resource's catalog tags.
///
/// Unmapped tags and mappings to tags the channel no longer offers are
/// dropped with a warning. At most `MAX_APPLIED_TAGS` are kept, in the
/// resource's tag order.
pub fn resolve_tags(
    resource: &Resource,
    mappings: &[TagMapping],
    channel: &ForumChannel,
) -> Vec<Snowflake> {
    let mut resolved: Vec<Snowflake> = Vec::new();
    for tag_id in &resource.tag_ids {
        let forum_tags: Vec<Snowflake> = mappings
            .iter()
            .filter(|m| &m.resource_tag_id == tag_id)
            .map(|m| m.id)
            .filter(|id| channel.has_tag(*id))
            .collect();
        if forum_tags.is_empty() {
            warn!(resource_id = %resource.id, tag_id = %tag_id, "No forum tag mapped for catalog tag");
        }
        for id in forum_tags {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }

    if resolved.len() > MAX_APPLIED_TAGS {
        warn!(
            resource_id = %resource.id,
            mapped = resolved.len(),
            "Too many forum tags for one thread, extra tags dropped"
        );
        resolved.truncate(MAX_APPLIED_TAGS);
    }
    resolved
}

pub fn render(resource: &Resource, tags: Vec<Snowflake>) -> ThreadContent {
    ThreadContent {
        title: thread_title(resource),
        body: thread_body(resource),
        tags,
        actions: thread_actions(resource),
        icon_url: resource.icon_url.clone().filter(|u| !u.is_empty()),
    }
}

pub fn compromised_notice(resource: &Resource) -> String {
    format!(
        "# Resource Compromised Notification\n\
         ## *{}* has been marked as compromised.\n\
         If you are using this mod or resource, please remove it immediately and secure your account.\n\
         @everyone",
        resource.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::ForumTag;
    use chrono::{TimeZone, Utc};

    fn resource() -> Resource {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Resource {
            id: "m1".into(),
            name: "Foo".into(),
            author: "Ana".into(),
            description: Some("Adds foo.".into()),
            discord_url: Some("https://discord.gg/foo".into()),
            website_url: None,
            icon_url: Some(String::new()),
            rating: 4.5,
            is_compromised: false,
            tag_ids: vec!["t1".into(), "t2".into()],
            created_by_user_id: Some("11".into()),
            updated_by_user_ids: vec!["12".into(), "13".into()],
            created_at: created,
            updated_at: created,
        }
    }

    fn channel(tags: &[Snowflake]) -> ForumChannel {
        ForumChannel {
            id: 200,
            guild_id: 100,
            name: "resources".into(),
            available_tags: tags
                .iter()
                .map(|id| ForumTag {
                    id: *id,
                    name: format!("tag-{}", id),
                })
                .collect(),
        }
    }

    #[test]
    fn body_lists_authorship_and_timestamps() {
        let body = thread_body(&resource());
        assert_eq!(
            body,
            "# Foo\n*By: Ana*\nAdds foo.\n**Created by:** <@11>\n\
             **Last updated by:** <@12>, <@13>\n\
             **Created at:** 2024-03-01 12:00:00\n**Last updated at:** 2024-03-01 12:00:00\n"
        );
    }

    #[test]
    fn compromised_disables_links_only_when_present() {
        let mut r = resource();
        r.is_compromised = true;
        let actions = thread_actions(&r);
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            &actions[0],
            ThreadAction::Link { label, disabled: true, .. } if label == "Discord"
        ));
        assert!(matches!(
            &actions[1],
            ThreadAction::Button { custom_id, disabled: true, .. } if custom_id == REPORT_RESOURCE_ID
        ));
    }

    #[test]
    fn empty_icon_is_omitted() {
        assert_eq!(render(&resource(), vec![]).icon_url, None);
    }

    #[test]
    fn unmapped_and_retired_tags_are_dropped() {
        let mappings = vec![TagMapping::new(501, "t1"), TagMapping::new(502, "t2")];
        // 502 is mapped but the channel no longer offers it
        let tags = resolve_tags(&resource(), &mappings, &channel(&[501]));
        assert_eq!(tags, vec![501]);
    }

    #[test]
    fn applied_tags_are_capped() {
        let mut r = resource();
        r.tag_ids = (1..=7).map(|i| format!("t{}", i)).collect();
        let mappings: Vec<TagMapping> = (1..=7)
            .map(|i| TagMapping::new(500 + i as u64, format!("t{}", i)))
            .collect();
        let ids: Vec<Snowflake> = (501..=507).collect();
        let tags = resolve_tags(&r, &mappings, &channel(&ids));
        assert_eq!(tags, vec![501, 502, 503, 504, 505]);
    }

    #[test]
    fn notice_names_resource_and_pings_everyone() {
        let notice = compromised_notice(&resource());
        assert!(notice.contains("## *Foo* has been marked as compromised."));
        assert!(notice.ends_with("@everyone"));
    }
}
