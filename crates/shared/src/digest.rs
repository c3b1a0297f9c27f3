use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Article, Category, DigestData, TopTopic};
use crate::summarizer::TOP_TOPIC_LIMIT;

/// LINE rejects text messages longer than this
pub const NOTIFICATION_CHAR_LIMIT: usize = 5000;

/// Highest rated topics first, at most five. Ties keep their incoming order.
pub fn top_five(topics: &[TopTopic]) -> Vec<TopTopic> {
    let mut ranked = topics.to_vec();
    ranked.sort_by(|a, b| b.article.importance.cmp(&a.article.importance));
    ranked.truncate(TOP_TOPIC_LIMIT);
    ranked
}

pub struct DigestGenerator;

impl DigestGenerator {
    fn format_day(date: &DateTime<FixedOffset>) -> String {
        date.format("%Y年%m月%d日").to_string()
    }

    pub fn generate_markdown(
        articles: &[Article],
        data: &DigestData,
        now: DateTime<FixedOffset>,
    ) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# 日経新聞サマリー - {}\n\n",
            Self::format_day(&now)
        ));
        md.push_str(&format!(
            "**生成時刻**: {}\n",
            now.format("%Y-%m-%d %H:%M:%S")
        ));
        md.push_str(&format!("**記事数**: {}件\n\n", articles.len()));
        md.push_str("---\n\n");

        // Trend
        md.push_str("## 📊 本日のトレンド\n\n");
        md.push_str(&format!("{}\n\n", data.daily_trend.summary));
        if !data.daily_trend.keywords.is_empty() {
            md.push_str(&format!(
                "**キーワード**: {}\n\n",
                data.daily_trend.keywords.join(", ")
            ));
        }
        md.push_str("---\n\n");

        // Top topics
        md.push_str("## 🔥 注目トピック TOP5\n\n");
        for (i, topic) in top_five(&data.top_topics).iter().enumerate() {
            md.push_str(&format!("### {}. {}\n", i + 1, topic.article.title));
            md.push_str(&format!(
                "**分野**: {} | **重要度**: {}\n",
                topic.category,
                topic.article.rating()
            ));
            md.push_str(&format!("> {}\n\n", topic.article.summary));
        }
        md.push_str("---\n\n");

        // Per-category sections, fixed order, empty ones skipped
        md.push_str("## 📂 分野別サマリー\n\n");
        for category in Category::ALL {
            let Some(items) = data.categories.get(&category) else {
                continue;
            };
            if items.is_empty() {
                continue;
            }
            md.push_str(&format!("### {}\n\n", category));
            for item in items {
                md.push_str(&format!("- **{}** {}\n", item.title, item.stars()));
                md.push_str(&format!("  - {}\n", item.summary));
            }
            md.push('\n');
        }
        md.push_str("---\n\n");

        // Every fetched article, exactly once
        md.push_str("## 📋 全記事一覧\n\n");
        for (i, article) in articles.iter().enumerate() {
            md.push_str(&format!(
                "{}. [{}]({})\n",
                i + 1,
                Self::escape_link_text(&article.title),
                article.link
            ));
        }

        md
    }

    fn escape_link_text(text: &str) -> String {
        text.replace('[', "\\[").replace(']', "\\]")
    }

    pub fn generate_notification(
        articles: &[Article],
        data: &DigestData,
        now: DateTime<FixedOffset>,
    ) -> String {
        let mut lines = vec![
            "📰 日経新聞 本日のサマリー".to_string(),
            format!("📅 {}", Self::format_day(&now)),
            format!("📊 本日の記事数: {}件", articles.len()),
            String::new(),
            "📈 本日のトレンド:".to_string(),
            data.daily_trend.summary.clone(),
            String::new(),
            "🔥 注目トピック TOP5:".to_string(),
        ];

        for (i, topic) in top_five(&data.top_topics).iter().enumerate() {
            lines.push(format!(
                "{}. [{}] {}",
                i + 1,
                topic.category,
                topic.article.title
            ));
            lines.push(format!("   {}", topic.article.stars()));
            // index is 1-based; 0 means the model did not say
            if let Some(article) = topic
                .article
                .index
                .checked_sub(1)
                .and_then(|idx| articles.get(idx))
            {
                lines.push(format!("   {}", article.link));
            }
        }

        Self::truncate_chars(&lines.join("\n"), NOTIFICATION_CHAR_LIMIT)
    }

    pub fn generate_error_notification(message: &str) -> String {
        Self::truncate_chars(
            &format!("⚠️ 日経新聞サマリー生成エラー\n\n{}", message),
            NOTIFICATION_CHAR_LIMIT,
        )
    }

    fn truncate_chars(text: &str, limit: usize) -> String {
        if text.chars().count() <= limit {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(limit - 1).collect();
        cut.push('…');
        cut
    }

    /// Write `<dir>/YYYY-MM-DD.md`, creating the directory if needed
    pub fn save(content: &str, dir: &Path, date: DateTime<FixedOffset>) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let filepath = dir.join(format!("{}.md", date.format("%Y-%m-%d")));

        fs::write(&filepath, content)
            .with_context(|| format!("Failed to write digest file: {}", filepath.display()))?;

        Ok(filepath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::fallback_categorize;
    use crate::models::{ClassifiedArticle, DailyTrend};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn jst_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 6, 7, 30, 0)
            .unwrap()
    }

    fn articles(n: usize) -> Vec<Article> {
        (1..=n)
            .map(|i| {
                Article::new(
                    format!("記事{}", i),
                    format!("https://example.com/{}", i),
                    "",
                    format!("概要{}", i),
                )
            })
            .collect()
    }

    fn topic(index: usize, importance: u8, category: Category) -> TopTopic {
        TopTopic {
            article: ClassifiedArticle {
                index,
                title: format!("記事{}", index),
                summary: format!("要約{}", index),
                importance,
            },
            category,
        }
    }

    fn ranked_data() -> DigestData {
        let top_topics = vec![
            topic(1, 2, Category::Economy),
            topic(2, 5, Category::Markets),
            topic(3, 4, Category::Politics),
            topic(4, 1, Category::Other),
            topic(5, 5, Category::Technology),
            topic(6, 3, Category::Business),
            topic(7, 4, Category::International),
        ];
        let mut categories = BTreeMap::new();
        for t in &top_topics {
            categories
                .entry(t.category)
                .or_insert_with(Vec::new)
                .push(t.article.clone());
        }
        DigestData {
            daily_trend: DailyTrend {
                summary: "本日は金融関連が中心".to_string(),
                keywords: vec!["日銀".to_string(), "円安".to_string()],
            },
            categories,
            top_topics,
        }
    }

    fn list_section(md: &str) -> &str {
        md.split("## 📋 全記事一覧").nth(1).unwrap()
    }

    #[test]
    fn test_top_five_sorted_descending() {
        let ranked = top_five(&ranked_data().top_topics);
        let indices: Vec<usize> = ranked.iter().map(|t| t.article.index).collect();

        assert_eq!(ranked.len(), 5);
        assert_eq!(indices, vec![2, 5, 3, 7, 6]);
    }

    #[test]
    fn test_top_five_short_list() {
        let ranked = top_five(&[topic(1, 1, Category::Other), topic(2, 3, Category::Other)]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].article.index, 2);
    }

    #[test]
    fn test_markdown_lists_every_article_once() {
        let articles = articles(12);
        let md = DigestGenerator::generate_markdown(&articles, &ranked_data(), jst_now());

        let entries = list_section(&md)
            .lines()
            .filter(|l| l.contains("](https://example.com/"))
            .count();
        assert_eq!(entries, 12);
        assert!(md.contains("**記事数**: 12件"));
        assert!(md.contains("12. [記事12](https://example.com/12)"));
    }

    #[test]
    fn test_markdown_header_and_trend() {
        let md = DigestGenerator::generate_markdown(&articles(3), &ranked_data(), jst_now());

        assert!(md.starts_with("# 日経新聞サマリー - 2025年01月06日\n"));
        assert!(md.contains("**生成時刻**: 2025-01-06 07:30:00"));
        assert!(md.contains("本日は金融関連が中心"));
        assert!(md.contains("**キーワード**: 日銀, 円安"));
    }

    #[test]
    fn test_markdown_omits_empty_keywords() {
        let mut data = ranked_data();
        data.daily_trend.keywords.clear();
        let md = DigestGenerator::generate_markdown(&articles(1), &data, jst_now());
        assert!(!md.contains("**キーワード**"));
    }

    #[test]
    fn test_markdown_top_topics_ranked_with_rating() {
        let md = DigestGenerator::generate_markdown(&articles(7), &ranked_data(), jst_now());

        assert!(md.contains("### 1. 記事2\n**分野**: 金融・市場 | **重要度**: ★★★★★\n> 要約2"));
        assert!(md.contains("### 5. 記事6\n**分野**: 企業・産業 | **重要度**: ★★★☆☆"));
        assert!(!md.contains("### 6."));
    }

    #[test]
    fn test_markdown_category_sections_in_fixed_order() {
        let md = DigestGenerator::generate_markdown(&articles(7), &ranked_data(), jst_now());
        let section = md.split("## 📂 分野別サマリー").nth(1).unwrap();

        let positions: Vec<usize> = Category::ALL
            .iter()
            .map(|c| section.find(&format!("### {}", c)).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert!(section.contains("- **記事2** ★★★★★\n  - 要約2"));
    }

    #[test]
    fn test_markdown_skips_empty_categories() {
        let data = fallback_categorize(&[Article::new("株価上昇", "https://x", "", "")]);
        let md = DigestGenerator::generate_markdown(&[], &data, jst_now());

        assert!(md.contains("### 金融・市場"));
        assert!(!md.contains("### その他"));
    }

    #[test]
    fn test_markdown_with_fallback_counts_all_articles() {
        let articles = articles(30);
        let data = fallback_categorize(&articles);
        let md = DigestGenerator::generate_markdown(&articles, &data, jst_now());

        let entries = list_section(&md)
            .lines()
            .filter(|l| l.contains("](https://example.com/"))
            .count();
        assert_eq!(entries, 30);
    }

    #[test]
    fn test_markdown_escapes_brackets_in_titles() {
        let articles = vec![Article::new("[速報] 円安", "https://x", "", "")];
        let md = DigestGenerator::generate_markdown(&articles, &DigestData::empty(), jst_now());
        assert!(md.contains("1. [\\[速報\\] 円安](https://x)"));
    }

    #[test]
    fn test_notification_lists_top_five_with_links() {
        let text = DigestGenerator::generate_notification(&articles(7), &ranked_data(), jst_now());

        assert!(text.starts_with("📰 日経新聞 本日のサマリー\n📅 2025年01月06日\n📊 本日の記事数: 7件"));
        assert!(text.contains("1. [金融・市場] 記事2\n   ★★★★★\n   https://example.com/2"));
        assert!(text.contains("5. [企業・産業] 記事6"));
        assert!(!text.contains("6. ["));
        assert!(!text.contains("記事4"));
    }

    #[test]
    fn test_notification_skips_link_for_unknown_index() {
        let mut data = DigestData::empty();
        data.top_topics = vec![topic(0, 4, Category::Other), topic(99, 3, Category::Other)];

        let text = DigestGenerator::generate_notification(&articles(2), &data, jst_now());

        assert!(text.contains("1. [その他] 記事0\n   ★★★★"));
        assert!(!text.contains("https://"));
    }

    #[test]
    fn test_notification_truncated_to_limit() {
        let mut data = DigestData::empty();
        data.daily_trend.summary = "長".repeat(NOTIFICATION_CHAR_LIMIT * 2);

        let text = DigestGenerator::generate_notification(&articles(1), &data, jst_now());

        assert_eq!(text.chars().count(), NOTIFICATION_CHAR_LIMIT);
        assert!(text.ends_with('…'));
    }

    #[test]
    fn test_error_notification() {
        let text = DigestGenerator::generate_error_notification("RSS feed returned error: 503");
        assert_eq!(
            text,
            "⚠️ 日経新聞サマリー生成エラー\n\nRSS feed returned error: 503"
        );
    }

    #[test]
    fn test_save_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("summaries");

        let path = DigestGenerator::save("# hello", &out, jst_now()).unwrap();

        assert_eq!(path, out.join("2025-01-06.md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# hello");
    }
}
