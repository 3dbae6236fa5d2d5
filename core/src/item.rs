//! Patent stimuli shown to participants.
//!
//! Items are seeded externally and never mutated by the assignment engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The closed set of item categories used in this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Smart Interactive Beverage & Food Containers")]
    SmartContainers,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Automation")]
    Automation,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::SmartContainers,
        Category::Healthcare,
        Category::Automation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::SmartContainers => "Smart Interactive Beverage & Food Containers",
            Self::Healthcare => "Healthcare",
            Self::Automation => "Automation",
        }
    }

    /// Parse from the stored label
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label.trim())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fabricated-content severity attached to an item for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal status of the patent behind an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatentStatus {
    #[default]
    Active,
    Pending,
    Abandoned,
    Expired,
}

impl PatentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Abandoned => "abandoned",
            Self::Expired => "expired",
        }
    }

    /// Case-insensitive parse; importers lowercase spreadsheet values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            "abandoned" => Some(Self::Abandoned),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Per-level example text. An empty string means no content for that level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityVariants {
    #[serde(default)]
    pub low: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub high: String,
}

impl SeverityVariants {
    pub fn for_level(&self, level: Level) -> Option<&str> {
        let text = match level {
            Level::Low => &self.low,
            Level::Medium => &self.medium,
            Level::High => &self.high,
        };
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub category: Category,
    /// Display ordering only; never consulted by assignment.
    pub category_order: i64,
    #[serde(default)]
    pub classifications: String,
    pub name: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: PatentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub severity_variants: SeverityVariants,
}

/// Sort items for display: by category order, then name.
pub fn sort_for_display(items: &mut [Item]) {
    items.sort_by(|a, b| {
        a.category_order
            .cmp(&b.category_order)
            .then_with(|| a.name.cmp(&b.name))
    });
}
