/// Display rules for a conversation: day separators, sender grouping, and
/// the short timestamps used in list rows.
use crate::models::Message;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineItem {
    /// Start of a new local calendar day
    DaySeparator(NaiveDate),
    Message {
        message: Message,
        is_own: bool,
        /// Same sender and same day as the message right before it
        continues_group: bool,
    },
}

/// Lay out `messages` (already in chronological order) for display.
pub fn build_timeline<Tz: TimeZone>(messages: &[Message], viewer_id: Uuid, tz: &Tz) -> Vec<TimelineItem> {
    let mut items = Vec::with_capacity(messages.len() + 1);
    let mut previous: Option<(NaiveDate, Uuid)> = None;

    for message in messages {
        let day = message.created_at.with_timezone(tz).date_naive();
        let new_day = previous.map_or(true, |(prev_day, _)| prev_day != day);
        if new_day {
            items.push(TimelineItem::DaySeparator(day));
        }
        let continues_group =
            !new_day && previous.is_some_and(|(_, sender)| sender == message.sender_id);

        items.push(TimelineItem::Message {
            message: message.clone(),
            is_own: message.sender_id == viewer_id,
            continues_group,
        });
        previous = Some((day, message.sender_id));
    }

    items
}

/// Separator label, e.g. `"14.02.2025"`.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%d.%m.%Y").to_string()
}

/// Conversation list timestamp: `"HH:MM"` today, `"Dün"` yesterday, the date
/// otherwise.
pub fn format_list_timestamp<Tz: TimeZone>(ts: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = ts.with_timezone(tz);
    let day = local.date_naive();
    let today = now.with_timezone(tz).date_naive();

    if day == today {
        local.format("%H:%M").to_string()
    } else if Some(day) == today.checked_sub_signed(Duration::days(1)) {
        "Dün".to_string()
    } else {
        format_day(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::FixedOffset;

    fn istanbul() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn msg_at(sender_id: Uuid, rfc3339: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::nil(),
            sender_id,
            sender_role: Role::Courier,
            content: "x".into(),
            created_at: DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc),
            is_read: false,
        }
    }

    fn separators(items: &[TimelineItem]) -> usize {
        items
            .iter()
            .filter(|i| matches!(i, TimelineItem::DaySeparator(_)))
            .count()
    }

    #[test]
    fn test_separator_between_days_only() {
        let a = Uuid::new_v4();
        let same_day = vec![
            msg_at(a, "2025-02-14T08:00:00Z"),
            msg_at(a, "2025-02-14T15:00:00Z"),
        ];
        let items = build_timeline(&same_day, a, &istanbul());
        assert_eq!(separators(&items), 1);
        assert!(matches!(items[0], TimelineItem::DaySeparator(_)));

        let two_days = vec![
            msg_at(a, "2025-02-14T08:00:00Z"),
            msg_at(a, "2025-02-15T08:00:00Z"),
        ];
        let items = build_timeline(&two_days, a, &istanbul());
        assert_eq!(separators(&items), 2);
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_days_follow_local_time() {
        // 22:30 UTC is already the next day in Istanbul
        let a = Uuid::new_v4();
        let messages = vec![
            msg_at(a, "2025-02-14T20:00:00Z"),
            msg_at(a, "2025-02-14T22:30:00Z"),
        ];
        let items = build_timeline(&messages, a, &istanbul());
        assert_eq!(separators(&items), 2);
        assert_eq!(
            items[2],
            TimelineItem::DaySeparator(NaiveDate::from_ymd_opt(2025, 2, 15).unwrap())
        );

        let utc_items = build_timeline(&messages, a, &Utc);
        assert_eq!(separators(&utc_items), 1);
    }

    #[test]
    fn test_consecutive_messages_group_by_sender() {
        let business = Uuid::new_v4();
        let courier = Uuid::new_v4();
        let messages = vec![
            msg_at(business, "2025-02-14T08:00:00Z"),
            msg_at(business, "2025-02-14T08:01:00Z"),
            msg_at(courier, "2025-02-14T08:02:00Z"),
        ];
        let items = build_timeline(&messages, courier, &istanbul());
        let flags: Vec<(bool, bool)> = items
            .iter()
            .filter_map(|i| match i {
                TimelineItem::Message {
                    is_own,
                    continues_group,
                    ..
                } => Some((*is_own, *continues_group)),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![(false, false), (false, true), (true, false)]);
    }

    #[test]
    fn test_list_timestamps() {
        let tz = istanbul();
        let now = DateTime::parse_from_rfc3339("2025-02-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let today = DateTime::parse_from_rfc3339("2025-02-15T07:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let yesterday = DateTime::parse_from_rfc3339("2025-02-14T07:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let older = DateTime::parse_from_rfc3339("2025-01-02T07:05:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(format_list_timestamp(today, now, &tz), "10:05");
        assert_eq!(format_list_timestamp(yesterday, now, &tz), "Dün");
        assert_eq!(format_list_timestamp(older, now, &tz), "02.01.2025");
        assert!(build_timeline(&[], Uuid::nil(), &tz).is_empty());
    }
}
