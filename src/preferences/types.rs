use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::NotificationType;

/// Per-user notification preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub user_id: String,
    pub diary_reminder_enabled: bool,
    #[serde(with = "hhmm")]
    pub diary_reminder_time: NaiveTime,
    pub mood_analysis_enabled: bool,
    pub financial_insights_enabled: bool,
    pub achievement_notifications_enabled: bool,
    pub push_notifications_enabled: bool,
    pub email_notifications_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

pub fn default_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl NotificationSettings {
    /// Defaults applied when a user has no row yet
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            diary_reminder_enabled: true,
            diary_reminder_time: default_reminder_time(),
            mood_analysis_enabled: true,
            financial_insights_enabled: true,
            achievement_notifications_enabled: true,
            push_notifications_enabled: true,
            email_notifications_enabled: false,
            updated_at: Utc::now(),
        }
    }

    /// Whether producers may create a notification of this type for the user.
    /// SYSTEM notifications are never suppressed.
    pub fn allows(&self, notification_type: NotificationType) -> bool {
        match notification_type {
            NotificationType::DiaryReminder => self.diary_reminder_enabled,
            NotificationType::MoodAnalysis => self.mood_analysis_enabled,
            NotificationType::FinancialInsight => self.financial_insights_enabled,
            NotificationType::Achievement => self.achievement_notifications_enabled,
            NotificationType::System => true,
        }
    }

    /// Apply a partial update; absent fields keep their value
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.diary_reminder_enabled {
            self.diary_reminder_enabled = v;
        }
        if let Some(v) = update.diary_reminder_time {
            self.diary_reminder_time = v;
        }
        if let Some(v) = update.mood_analysis_enabled {
            self.mood_analysis_enabled = v;
        }
        if let Some(v) = update.financial_insights_enabled {
            self.financial_insights_enabled = v;
        }
        if let Some(v) = update.achievement_notifications_enabled {
            self.achievement_notifications_enabled = v;
        }
        if let Some(v) = update.push_notifications_enabled {
            self.push_notifications_enabled = v;
        }
        if let Some(v) = update.email_notifications_enabled {
            self.email_notifications_enabled = v;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial settings update from the settings endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub diary_reminder_enabled: Option<bool>,
    #[serde(default, with = "hhmm::option")]
    pub diary_reminder_time: Option<NaiveTime>,
    pub mood_analysis_enabled: Option<bool>,
    pub financial_insights_enabled: Option<bool>,
    pub achievement_notifications_enabled: Option<bool>,
    pub push_notifications_enabled: Option<bool>,
    pub email_notifications_enabled: Option<bool>,
}

/// `HH:MM` on the wire; `HH:MM:SS` is also accepted on input
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT).or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = NotificationSettings::defaults_for("u1");
        assert!(s.diary_reminder_enabled);
        assert_eq!(s.diary_reminder_time, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert!(s.push_notifications_enabled);
        assert!(!s.email_notifications_enabled);
        for t in NotificationType::ALL {
            assert!(s.allows(t));
        }
    }

    #[test]
    fn test_partial_update() {
        let mut s = NotificationSettings::defaults_for("u1");
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"moodAnalysisEnabled": false, "diaryReminderTime": "07:30"}"#).unwrap();
        s.apply(&update);

        assert!(!s.mood_analysis_enabled);
        assert!(!s.allows(NotificationType::MoodAnalysis));
        assert!(s.allows(NotificationType::FinancialInsight));
        assert_eq!(s.diary_reminder_time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(s.push_notifications_enabled);
    }

    #[test]
    fn test_system_never_suppressed() {
        let mut s = NotificationSettings::defaults_for("u1");
        s.diary_reminder_enabled = false;
        s.mood_analysis_enabled = false;
        s.financial_insights_enabled = false;
        s.achievement_notifications_enabled = false;
        assert!(s.allows(NotificationType::System));
        assert!(!s.allows(NotificationType::Achievement));
    }

    #[test]
    fn test_time_wire_format() {
        let s = NotificationSettings::defaults_for("u1");
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["diaryReminderTime"], "20:00");

        let bad = serde_json::from_str::<SettingsUpdate>(r#"{"diaryReminderTime": "25:99"}"#);
        assert!(bad.is_err());
    }
}
