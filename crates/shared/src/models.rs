use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default star rating when the model gives none
pub const DEFAULT_IMPORTANCE: u8 = 3;
pub const MAX_IMPORTANCE: u8 = 5;

/// A single item pulled from the RSS feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub published: String,
    pub summary: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published: published.into(),
            summary: summary.into(),
        }
    }
}

/// News section. Declaration order is the order sections are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "経済・景気")]
    Economy,
    #[serde(rename = "政治・政策")]
    Politics,
    #[serde(rename = "テクノロジー・DX")]
    Technology,
    #[serde(rename = "国際情勢")]
    International,
    #[serde(rename = "企業・産業")]
    Business,
    #[serde(rename = "金融・市場")]
    Markets,
    #[serde(rename = "その他")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Economy,
        Category::Politics,
        Category::Technology,
        Category::International,
        Category::Business,
        Category::Markets,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Economy => "経済・景気",
            Category::Politics => "政治・政策",
            Category::Technology => "テクノロジー・DX",
            Category::International => "国際情勢",
            Category::Business => "企業・産業",
            Category::Markets => "金融・市場",
            Category::Other => "その他",
        }
    }

    /// Map a label coming back from a model. Anything unrecognised lands in `Other`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or(Category::Other)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedArticle {
    /// 1-based position in the fetched article list
    pub index: usize,
    pub title: String,
    pub summary: String,
    pub importance: u8,
}

impl ClassifiedArticle {
    pub fn stars(&self) -> String {
        "★".repeat(self.importance as usize)
    }

    /// Filled plus empty stars, always five wide
    pub fn rating(&self) -> String {
        format!(
            "{}{}",
            "★".repeat(self.importance as usize),
            "☆".repeat((MAX_IMPORTANCE - self.importance) as usize)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTopic {
    #[serde(flatten)]
    pub article: ClassifiedArticle,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub summary: String,
    pub keywords: Vec<String>,
}

impl DailyTrend {
    pub fn unavailable() -> Self {
        Self {
            summary: "トレンド分析は取得できませんでした。".to_string(),
            keywords: Vec::new(),
        }
    }
}

/// Result of classifying one day's articles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestData {
    pub daily_trend: DailyTrend,
    pub categories: BTreeMap<Category, Vec<ClassifiedArticle>>,
    pub top_topics: Vec<TopTopic>,
}

impl DigestData {
    pub fn empty() -> Self {
        Self {
            daily_trend: DailyTrend::unavailable(),
            categories: BTreeMap::new(),
            top_topics: Vec::new(),
        }
    }

    pub fn classified_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Digest plus the name of whoever produced it
#[derive(Debug, Clone)]
pub struct Analysis {
    pub data: DigestData,
    pub provider: String,
}
