use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use kudos_db::models::{GrantRow, QuotaOutcome};
use kudos_types::KudosError;
use kudos_types::events::MessageEvent;
use kudos_types::models::User;

use crate::Engine;
use crate::extract;

/// How a message's recipients and emoji tokens pair up into grants.
#[derive(Debug)]
pub(crate) struct GrantPlan {
    /// Each recipient with their coalesced (emoji, count) increments.
    pub per_recipient: Vec<(User, Vec<(String, i64)>)>,
    /// Discrete grant operations the shape implies; what the quota is
    /// charged for.
    pub to_give: u32,
}

/// Shape-matching: one recipient takes every emoji; one emoji goes to
/// every recipient; equal counts pair positionally; anything else is a
/// mismatch. Duplicate emoji tokens aimed at one recipient coalesce into
/// a single increment.
pub(crate) fn plan_grants(
    recipients: Vec<User>,
    emojis: Vec<String>,
) -> Result<GrantPlan, KudosError> {
    let r = recipients.len();
    let e = emojis.len();

    if r > 1 && e > 1 && r != e {
        return Err(KudosError::ShapeMismatch {
            recipients: r,
            emojis: e,
        });
    }

    let to_give = r.max(e) as u32;
    let per_recipient = if r == 1 {
        let mut recipients = recipients;
        vec![(recipients.remove(0), coalesce(emojis))]
    } else if e == 1 {
        let emoji = &emojis[0];
        recipients
            .into_iter()
            .map(|user| (user, vec![(emoji.clone(), 1)]))
            .collect()
    } else {
        recipients
            .into_iter()
            .zip(emojis)
            .map(|(user, emoji)| (user, vec![(emoji, 1)]))
            .collect()
    };

    Ok(GrantPlan {
        per_recipient,
        to_give,
    })
}

/// Accumulate duplicate emoji tokens, keeping first-appearance order.
fn coalesce(emojis: Vec<String>) -> Vec<(String, i64)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, i64> = HashMap::new();
    for emoji in emojis {
        if !counts.contains_key(&emoji) {
            order.push(emoji.clone());
        }
        *counts.entry(emoji).or_insert(0) += 1;
    }
    order
        .into_iter()
        .map(|emoji| {
            let count = counts[&emoji];
            (emoji, count)
        })
        .collect()
}

fn format_give_string(emojis: &[(String, i64)]) -> String {
    emojis
        .iter()
        .map(|(emoji, count)| format!(":{}:: `{}`", emoji, count))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Engine {
    /// A message in an enabled channel that matched no command: treat it
    /// as a grant attempt if it carries at least one mention and at least
    /// one valid emoji, otherwise ignore it.
    pub(crate) async fn give_kudos(&self, msg: &MessageEvent) {
        let extracted = extract::extract(&msg.text);
        if extracted.mentions.is_empty() || extracted.emoji.is_empty() {
            return;
        }

        // Throw out tokens that aren't actually emojis
        let mut valid = Vec::new();
        for name in &extracted.emoji {
            if self.emoji.is_known(name).await {
                valid.push(name.clone());
            }
        }
        if valid.is_empty() {
            return;
        }

        // The sender should always resolve
        let sender = match self.directory.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to get info for user {}: {}", msg.sender, e);
                return;
            }
        };

        if let Err(e) = self
            .execute_grant(&sender, &extracted.mentions, valid, msg)
            .await
        {
            self.notify_grant_error(&sender, e).await;
        }
    }

    async fn execute_grant(
        &self,
        sender: &User,
        mentions: &[String],
        emojis: Vec<String>,
        msg: &MessageEvent,
    ) -> Result<(), KudosError> {
        // Resolve mentions to users. Tokens the platform doesn't know are
        // simply not recipients; matching the mention syntax by accident
        // is unlikely but possible.
        let mut recipients = Vec::new();
        for handle in mentions {
            let user = match self.directory.resolve(handle).await {
                Ok(user) => user,
                Err(KudosError::Lookup(handle)) => {
                    debug!("Mention {} is not a user, skipping", handle);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if user.id == sender.id {
                return Err(KudosError::SelfGrant);
            }
            recipients.push(user);
        }

        // Nothing actually pointed at a user: not a kudos message
        if recipients.is_empty() {
            return Ok(());
        }

        let plan = plan_grants(recipients, emojis)?;

        let grants: Vec<GrantRow> = plan
            .per_recipient
            .iter()
            .flat_map(|(user, emojis)| {
                emojis.iter().map(|(emoji, count)| GrantRow {
                    recipient: user.id.to_string(),
                    emoji: emoji.clone(),
                    count: *count,
                })
            })
            .collect();

        // One transaction covers the quota charge and every ledger row:
        // a grant is never partially billed or partially recorded.
        let day = Utc::now().date_naive().to_string();
        let outcome = self
            .db
            .reserve_and_record(
                &sender.id.to_string(),
                &day,
                self.daily_quota,
                plan.to_give,
                &grants,
            )
            .map_err(KudosError::Storage)?;

        let remaining = match outcome {
            QuotaOutcome::Refused { remaining } => {
                return Err(KudosError::QuotaExceeded {
                    quota: self.daily_quota,
                    remaining,
                    requested: plan.to_give,
                });
            }
            QuotaOutcome::Reserved { remaining } => remaining,
        };

        let permalink = self.session.message_permalink(&msg.channel_id, &msg.ts);
        let left_string = if remaining == 0 {
            "You don't have any kudos left to give today.".to_string()
        } else {
            format!("You have {} kudos left to give today.", remaining)
        };

        for (recipient, emojis) in &plan.per_recipient {
            let give_string = format_give_string(emojis);
            self.dm(
                sender,
                &format!(
                    "You just sent the following kudos to `{}`: ({}). {}",
                    recipient.username, give_string, left_string
                ),
            )
            .await;
            self.dm(
                recipient,
                &format!(
                    "You just received kudos ({}) from `{}`! ({})",
                    give_string, sender.username, permalink
                ),
            )
            .await;
        }

        Ok(())
    }

    /// Map a failed grant to its user-facing notice. Quota and validation
    /// refusals state exact numbers; storage failures stay generic.
    async fn notify_grant_error(&self, sender: &User, err: KudosError) {
        match err {
            KudosError::SelfGrant => {
                self.dm(sender, "Sorry, but you can't give yourself kudos!")
                    .await;
            }
            KudosError::ShapeMismatch { recipients, emojis } => {
                self.dm(
                    sender,
                    &format!(
                        "Sorry, but I couldn't figure out how to give your kudos. You listed \
                         more than one recipient and more than one emoji, but the number of \
                         each doesn't match! I saw `{}` recipients and `{}` emojis.",
                        recipients, emojis
                    ),
                )
                .await;
                self.dm(
                    sender,
                    "You can list only one emoji which will go to everyone, or multiple \
                     emojis to go to one person. But multiple emojis to multiple people \
                     have to match counts!",
                )
                .await;
            }
            KudosError::QuotaExceeded {
                quota,
                remaining,
                requested,
            } => {
                info!("{} rate limited", sender.username);
                if remaining == 0 {
                    self.dm(
                        sender,
                        &format!(
                            "Sorry, you're out of kudos to give for now. You can only give \
                             {} every 24 hours.",
                            quota
                        ),
                    )
                    .await;
                } else {
                    self.dm(
                        sender,
                        &format!(
                            "Sorry, you tried to give {} kudos, but you only have {} kudos \
                             left to give today.",
                            requested, remaining
                        ),
                    )
                    .await;
                }
            }
            // Unresolvable mentions are skipped inline; reaching here
            // would be a logic error worth seeing in the logs.
            KudosError::Lookup(handle) => {
                warn!("Unexpected lookup failure for {} during grant", handle);
            }
            KudosError::Storage(e) => {
                error!(
                    "Failed to record kudos from {}: {}",
                    sender.username, e
                );
                self.dm(
                    sender,
                    "Sorry, something went wrong while trying to give your kudos",
                )
                .await;
            }
        }
    }
}
