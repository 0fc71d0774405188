use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

/// Database identifier of a notification
pub type NotificationId = i64;

/// Kind of notification, one per producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    DiaryReminder,
    MoodAnalysis,
    FinancialInsight,
    System,
    Achievement,
}

/// Default presentation for a notification type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMeta {
    pub default_action_url: &'static str,
    pub icon: &'static str,
    pub badge: &'static str,
}

const DEFAULT_ICON: &str = "/favicon.svg";

const fn display_meta(default_action_url: &'static str) -> DisplayMeta {
    DisplayMeta {
        default_action_url,
        icon: DEFAULT_ICON,
        badge: DEFAULT_ICON,
    }
}

static DIARY_REMINDER_DISPLAY: DisplayMeta = display_meta("/diary/new");
static MOOD_ANALYSIS_DISPLAY: DisplayMeta = display_meta("/dashboard");
static FINANCIAL_INSIGHT_DISPLAY: DisplayMeta = display_meta("/dashboard/financial");
static SYSTEM_DISPLAY: DisplayMeta = display_meta("/");
static ACHIEVEMENT_DISPLAY: DisplayMeta = display_meta("/dashboard");

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::DiaryReminder,
        NotificationType::MoodAnalysis,
        NotificationType::FinancialInsight,
        NotificationType::System,
        NotificationType::Achievement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DiaryReminder => "DIARY_REMINDER",
            NotificationType::MoodAnalysis => "MOOD_ANALYSIS",
            NotificationType::FinancialInsight => "FINANCIAL_INSIGHT",
            NotificationType::System => "SYSTEM",
            NotificationType::Achievement => "ACHIEVEMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Look up default display metadata for this type
    pub fn display(&self) -> &'static DisplayMeta {
        match self {
            NotificationType::DiaryReminder => &DIARY_REMINDER_DISPLAY,
            NotificationType::MoodAnalysis => &MOOD_ANALYSIS_DISPLAY,
            NotificationType::FinancialInsight => &FINANCIAL_INSIGHT_DISPLAY,
            NotificationType::System => &SYSTEM_DISPLAY,
            NotificationType::Achievement => &ACHIEVEMENT_DISPLAY,
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification.
///
/// `read_at` is set exactly when `is_read` is true, and `is_read` never
/// goes back to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
}

impl Notification {
    /// Channel-agnostic view sent over every delivery channel
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            id: self.id,
            notification_type: self.notification_type,
            title: self.title.clone(),
            message: self.message.clone(),
            is_read: self.is_read,
            created_at: self.created_at,
            read_at: self.read_at,
            action_url: self.action_url.clone(),
        }
    }

    /// Action URL, falling back to the type default
    pub fn click_action(&self) -> &str {
        self.action_url
            .as_deref()
            .unwrap_or(self.notification_type.display().default_action_url)
    }
}

/// Fields a producer supplies when creating a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action_url: Option<String>,
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        action_url: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            notification_type,
            title: title.into(),
            message: message.into(),
            action_url,
        }
    }

    /// Check column limits before the row is written
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.user_id.trim().is_empty() {
            return Err(StoreError::Validation("userId must not be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation("title must not be empty".into()));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title exceeds {} characters",
                MAX_TITLE_LEN
            )));
        }
        if self.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(StoreError::Validation(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        if let Some(url) = &self.action_url {
            if url.chars().count() > MAX_ACTION_URL_LEN {
                return Err(StoreError::Validation(format!(
                    "actionUrl exceeds {} characters",
                    MAX_ACTION_URL_LEN
                )));
            }
        }
        Ok(())
    }
}

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_ACTION_URL_LEN: usize = 200;

/// Wire body shared by the WebSocket, SSE and push data channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
}

impl NotificationPayload {
    pub fn click_action(&self) -> &str {
        self.action_url
            .as_deref()
            .unwrap_or(self.notification_type.display().default_action_url)
    }
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

/// Upper bound on page size accepted from clients
pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page_size() -> u32 {
    20
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }.clamped()
    }

    /// Size forced into `1..=MAX_PAGE_SIZE`
    pub fn clamped(self) -> Self {
        Self {
            page: self.page,
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_page_size(),
        }
    }
}

/// One page of results, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1) as u64;
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action_url: Option<&str>) -> Notification {
        Notification {
            id: 42,
            user_id: "user-1".to_string(),
            notification_type: NotificationType::FinancialInsight,
            title: "Insight".to_string(),
            message: "Spending is down".to_string(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            action_url: action_url.map(str::to_string),
        }
    }

    #[test]
    fn test_type_serialization() {
        let json = serde_json::to_string(&NotificationType::DiaryReminder).unwrap();
        assert_eq!(json, r#""DIARY_REMINDER""#);

        let parsed: NotificationType = serde_json::from_str(r#""ACHIEVEMENT""#).unwrap();
        assert_eq!(parsed, NotificationType::Achievement);
    }

    #[test]
    fn test_display_table_covers_every_type() {
        for t in NotificationType::ALL {
            assert!(t.display().default_action_url.starts_with('/'));
            assert_eq!(NotificationType::parse(t.as_str()), Some(t));
        }
        assert_eq!(
            NotificationType::FinancialInsight.display().default_action_url,
            "/dashboard/financial"
        );
        assert_eq!(NotificationType::System.display().default_action_url, "/");
    }

    #[test]
    fn test_display_defaults_per_type() {
        let expected = [
            (NotificationType::DiaryReminder, "/diary/new"),
            (NotificationType::MoodAnalysis, "/dashboard"),
            (NotificationType::FinancialInsight, "/dashboard/financial"),
            (NotificationType::System, "/"),
            (NotificationType::Achievement, "/dashboard"),
        ];
        for (t, url) in expected {
            let meta = t.display();
            assert_eq!(meta.default_action_url, url, "{}", t);
            assert_eq!(meta.icon, DEFAULT_ICON);
            assert_eq!(meta.badge, DEFAULT_ICON);
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = sample(None).payload();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["id"], 42);
        assert_eq!(value["type"], "FINANCIAL_INSIGHT");
        assert_eq!(value["isRead"], false);
        assert!(value["readAt"].is_null());
        assert!(value["actionUrl"].is_null());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_click_action_falls_back_to_type_default() {
        assert_eq!(sample(None).click_action(), "/dashboard/financial");
        assert_eq!(sample(Some("/custom")).click_action(), "/custom");
    }

    #[test]
    fn test_new_notification_limits() {
        let ok = NewNotification::new("u1", NotificationType::System, "Hi", "There", None);
        assert!(ok.validate().is_ok());

        let long_title = NewNotification::new("u1", NotificationType::System, "t".repeat(101), "m", None);
        assert!(matches!(long_title.validate(), Err(StoreError::Validation(_))));

        let empty_title = NewNotification::new("u1", NotificationType::System, "  ", "m", None);
        assert!(empty_title.validate().is_err());

        let long_url = NewNotification::new(
            "u1",
            NotificationType::System,
            "t",
            "m",
            Some(format!("/{}", "a".repeat(200))),
        );
        assert!(long_url.validate().is_err());

        // limits count characters, not bytes
        let hangul = NewNotification::new("u1", NotificationType::System, "알".repeat(100), "m", None);
        assert!(hangul.validate().is_ok());
    }

    #[test]
    fn test_page_math() {
        let page = Page::new(vec![1, 2], PageRequest::new(0, 2), 5);
        assert_eq!(page.total_pages, 3);

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);

        assert_eq!(PageRequest::new(3, 10).offset(), 30);
        assert_eq!(PageRequest::new(0, 0).size, 1);
        assert_eq!(PageRequest::new(0, 10_000).size, MAX_PAGE_SIZE);
    }
}
