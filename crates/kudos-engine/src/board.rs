use std::collections::HashMap;

use tracing::error;

use kudos_db::models::{HistoryRow, LeaderboardRow};
use kudos_types::events::MessageEvent;

use crate::Engine;
use crate::extract;

const LEADERBOARD_LIMIT: u32 = 10;

/// One counterpart's share of a personal board: their per-emoji counts
/// and the total across them.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CounterpartKudos {
    pub username: String,
    pub emoji_counts: Vec<(String, i64)>,
    pub total: i64,
}

/// Group per-emoji history rows by counterpart. Rows arrive ordered by
/// count descending, so each group's emoji breakdown keeps that order;
/// groups order by total descending with ties broken by counterpart
/// username descending.
pub(crate) fn group_history(rows: Vec<HistoryRow>) -> Vec<CounterpartKudos> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, CounterpartKudos> = HashMap::new();

    for row in rows {
        let group = groups
            .entry(row.counterpart_id.clone())
            .or_insert_with(|| {
                order.push(row.counterpart_id.clone());
                CounterpartKudos {
                    username: row.counterpart_name.clone(),
                    emoji_counts: Vec::new(),
                    total: 0,
                }
            });
        group.emoji_counts.push((row.emoji, row.count));
        group.total += row.count;
    }

    let mut list: Vec<CounterpartKudos> = order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .collect();
    list.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| b.username.cmp(&a.username))
    });
    list
}

/// Render an emoji filter for a board heading: the literal word `all`
/// when nothing was specified, otherwise the tokens themselves.
fn format_emoji_filter(emojis: &[String]) -> String {
    if emojis.is_empty() {
        return "all".to_string();
    }
    emojis
        .iter()
        .map(|e| format!(":{}:", e))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_leaderboard_counts(rows: &[LeaderboardRow]) -> String {
    rows.iter()
        .enumerate()
        .map(|(i, row)| format!("{}. `{}` `{}`", i + 1, row.username, row.total))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_my_board(
    team: &str,
    title: &str,
    emojis: &[String],
    groups: &[CounterpartKudos],
) -> String {
    let total: i64 = groups.iter().map(|g| g.total).sum();

    let mut lines = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let mut line = format!("{}. `{}`: `{}`", i + 1, group.username, group.total);
        for (emoji, count) in &group.emoji_counts {
            line.push_str(&format!("\n\t:{}:: `{}`", emoji, count));
        }
        lines.push(line);
    }

    format!(
        "{} My {} Kudos ({})\nTotal Count: `{}`\n{}",
        team,
        title,
        format_emoji_filter(emojis),
        total,
        lines.join("\n")
    )
}

impl Engine {
    /// `@bot leaderboard [:emoji: ...]` — top recipients, posted to the
    /// channel. A storage failure aborts silently; query commands never
    /// surface internal faults.
    pub(crate) async fn leaderboard(&self, msg: &MessageEvent) {
        let emojis = extract::unique(extract::extract(&msg.text).emoji);

        let rows = match self.db.leaderboard(&emojis, LEADERBOARD_LIMIT) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error while querying for leaderboard: {}", e);
                return;
            }
        };

        let team = self.identity().map(|i| i.team_name).unwrap_or_default();
        let text = format!(
            "{} Leaderboard ({})\n{}",
            team,
            format_emoji_filter(&emojis),
            format_leaderboard_counts(&rows)
        );

        if let Err(e) = self.session.post_message(&msg.channel_id, &text).await {
            error!("Error while sending message to {}: {}", msg.channel_id, e);
        }
    }

    /// `@bot mykudos [:emoji: ...]` — the sender's received and given
    /// boards, delivered ephemerally so the channel stays quiet.
    pub(crate) async fn personal_stats(&self, msg: &MessageEvent) {
        let emojis = extract::unique(extract::extract(&msg.text).emoji);

        let user = match self.directory.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(e) => {
                error!("Error while querying for user: {}", e);
                return;
            }
        };

        let user_id = user.id.to_string();
        let received = match self.db.personal_history(&user_id, &emojis, true) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error while querying for received kudos: {}", e);
                return;
            }
        };
        let given = match self.db.personal_history(&user_id, &emojis, false) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error while querying for given kudos: {}", e);
                return;
            }
        };

        let team = self.identity().map(|i| i.team_name).unwrap_or_default();
        let text = format!(
            "{}\n\n{}",
            format_my_board(&team, "Received", &emojis, &group_history(received)),
            format_my_board(&team, "Given", &emojis, &group_history(given))
        );

        if let Err(e) = self
            .session
            .post_ephemeral(&msg.channel_id, &user.platform_id, &text)
            .await
        {
            error!("Error while sending message to {}: {}", msg.channel_id, e);
        }
    }

    /// `@bot help` — usage instructions, ephemeral.
    pub(crate) async fn help(&self, msg: &MessageEvent) {
        let user = match self.directory.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to get info for user {}: {}", msg.sender, e);
                return;
            }
        };

        let bot = self.identity().map(|i| i.bot_name).unwrap_or_default();
        let text = format!(
            "{bot} is a bot used to recognize someone for being awesome!\n\
             If you want to send someone a kudos simply @ them and send them an emoji. \
             Any emoji will work!\n\
             >`@username` :rainbow:\n\
             You can send a message along too if you like:\n\
             >`@username` :rainbow: for shipping the fix!\n\
             You can send kudos in multiple ways:\n\
             >Multiple kudos to one person `@username` :rainbow: :heart:\n\
             >One kudos to multiple people `@username` `@another.username` :rainbow:\n\
             >Multiple kudos to multiple people `@username` `@another.username` :rainbow: :heart:\n\
             You can show the overall leaderboard:\n\
             >`@{bot}` leaderboard\n\
             Or a leaderboard for a particular emoji\n\
             >`@{bot}` leaderboard :rainbow:\n\
             Your own totals, sent and received:\n\
             >`@{bot}` mykudos\n\
             You are limited to {quota} kudos per day to send, but can receive an \
             unlimited amount of kudos!",
            bot = bot,
            quota = self.daily_quota,
        );

        if let Err(e) = self
            .session
            .post_ephemeral(&msg.channel_id, &user.platform_id, &text)
            .await
        {
            error!("Error while sending message to {}: {}", msg.channel_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str, emoji: &str, count: i64) -> HistoryRow {
        HistoryRow {
            counterpart_id: id.to_string(),
            counterpart_name: name.to_string(),
            emoji: emoji.to_string(),
            count,
        }
    }

    #[test]
    fn grouping_sums_counterparts() {
        let groups = group_history(vec![
            row("a", "alice", "star", 4),
            row("a", "alice", "heart", 1),
            row("b", "bob", "wave", 2),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].username, "alice");
        assert_eq!(groups[0].total, 5);
        assert_eq!(
            groups[0].emoji_counts,
            vec![("star".to_string(), 4), ("heart".to_string(), 1)]
        );
        assert_eq!(groups[1].username, "bob");
        assert_eq!(groups[1].total, 2);
    }

    #[test]
    fn group_ties_break_by_name_descending() {
        let groups = group_history(vec![
            row("a", "alice", "star", 3),
            row("b", "bob", "star", 3),
        ]);

        let names: Vec<&str> = groups.iter().map(|g| g.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[test]
    fn empty_filter_renders_as_all() {
        assert_eq!(format_emoji_filter(&[]), "all");
        assert_eq!(
            format_emoji_filter(&["star".to_string(), "heart".to_string()]),
            ":star:, :heart:"
        );
    }

    #[test]
    fn leaderboard_lines_are_ranked() {
        let text = format_leaderboard_counts(&[
            LeaderboardRow {
                username: "alice".into(),
                total: 50,
            },
            LeaderboardRow {
                username: "bob".into(),
                total: 30,
            },
        ]);
        assert_eq!(text, "1. `alice` `50`\n2. `bob` `30`");
    }

    #[test]
    fn my_board_includes_total_and_breakdown() {
        let groups = group_history(vec![
            row("a", "alice", "star", 4),
            row("b", "bob", "heart", 2),
        ]);
        let text = format_my_board("acme", "Received", &[], &groups);

        assert!(text.starts_with("acme My Received Kudos (all)\nTotal Count: `6`\n"));
        assert!(text.contains("1. `alice`: `4`\n\t:star:: `4`"));
        assert!(text.contains("2. `bob`: `2`\n\t:heart:: `2`"));
    }
}
