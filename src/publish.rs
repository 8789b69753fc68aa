// src/publish.rs
//! Static article generation for validated records, plus draft error reports
//! for records that failed validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use tokio::fs;

use crate::record::{self, Record};
use crate::template::{self, long_date, month_year, slugify, thousands};

pub const DEFAULT_BASE_URL: &str = "https://immiwatch.ca";
const DEFAULT_TEMPLATE: &str = include_str!("../templates/news_article.html");

/// Article pages live five levels below the site root.
const ARTICLE_ROOT_PATH: &str = "../../../../../";

const DAILY_INDEX_MARKER: &str = r#"<div class="news-grid">"#;
const CATEGORY_INDEX_MARKER: &str = r#"<div class="news-list">"#;

fn recent_news_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"<div class="recent-news">\s*<h3>🔥 Recent News</h3>"#)
            .expect("static recent-news regex")
    })
}

fn article_count_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"<span class="category-count">(\d+) Articles</span>"#)
            .expect("static article-count regex")
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub article_url: String,
    pub path: PathBuf,
    /// Listing pages that received the new entry.
    pub listings_updated: Vec<PathBuf>,
}

pub fn category_label(category: &str) -> (&'static str, &'static str) {
    match category {
        "policy-announcements" => ("📢", "Policy Announcements"),
        "program-delivery" => ("🏛️", "Program Delivery Updates"),
        "invitation-rounds" => ("🎯", "Invitation Rounds"),
        "atip-insights" => ("📊", "ATIP Insights"),
        "legal-decisions" => ("⚖️", "Legal Decisions"),
        "system-notices" => ("🔧", "System Notices"),
        "form-changes" => ("📄", "Form Changes"),
        "deadline-alerts" => ("⏰", "Deadline Alerts"),
        "statistical-reports" => ("📈", "Statistical Reports"),
        "scam-alerts" => ("🚨", "Scam Alerts"),
        "draw" | "draws" => ("🎯", "Express Entry Draws"),
        _ => ("📋", "Other Updates"),
    }
}

pub fn impact_label(impact: &str) -> &'static str {
    match impact {
        "critical" => "Critical Impact",
        "high" => "High Impact",
        "moderate" => "Important Impact",
        "low" => "Medium Impact",
        _ => "Low Impact",
    }
}

#[derive(Debug, Clone)]
pub struct Publisher {
    site_root: PathBuf,
    base_url: String,
    template: String,
}

impl Publisher {
    pub fn new(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub async fn load_template(self, path: &Path) -> Result<Self> {
        let tpl = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading article template {}", path.display()))?;
        Ok(self.with_template(tpl))
    }

    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// `<category>/<date>/<slug>` for a cleaned record.
    pub fn article_key(rec: &Record) -> (String, String, String) {
        let category = rec.text(record::CATEGORY).unwrap_or_else(|| "other".into());
        let date = rec.text(record::DATE).unwrap_or_else(|| "unknown".into());
        let slug = rec
            .text(record::SLUG)
            .map(|s| slugify(&s))
            .filter(|s| !s.is_empty())
            .or_else(|| rec.text(record::HEADLINE).map(|h| slugify(&h)))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "untitled".into());
        (category, date, slug)
    }

    pub fn article_url(&self, rec: &Record) -> String {
        let (category, date, slug) = Self::article_key(rec);
        format!("{}/news/daily/{category}/{date}/{slug}/", self.base_url)
    }

    pub fn article_path(&self, rec: &Record) -> PathBuf {
        let (category, date, slug) = Self::article_key(rec);
        self.site_root
            .join("news")
            .join("daily")
            .join(category)
            .join(date)
            .join(slug)
            .join("index.html")
    }

    /// Template variables for a cleaned record. Text values are HTML-escaped;
    /// the `*_SECTION`/`DRAW_DETAILS` values are markup built here.
    pub fn article_vars(&self, rec: &Record) -> BTreeMap<String, String> {
        let esc = |s: &str| html_escape::encode_double_quoted_attribute(s).into_owned();

        let headline = rec.text(record::HEADLINE).unwrap_or_default();
        let summary = rec.text(record::SUMMARY).unwrap_or_default();
        let date = rec.text(record::DATE).unwrap_or_default();
        let category = rec.text(record::CATEGORY).unwrap_or_default();
        let impact = rec.text(record::IMPACT).unwrap_or_default();
        let source = rec.text(record::SOURCE).unwrap_or_else(|| "IRCC".into());
        let programs = rec.list(record::PROGRAM_AFFECTED);
        let (icon, category_name) = category_label(&category);

        let mut keywords = vec![category_name.to_string(), "IRCC".to_string()];
        keywords.extend(programs.iter().cloned());
        if !date.is_empty() {
            keywords.push(month_year(&date));
        }

        let mut vars = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            vars.insert(k.to_string(), v);
        };
        put("TITLE", esc(&headline));
        put("DESCRIPTION", esc(&meta_description(&summary)));
        put("KEYWORDS", esc(&keywords.join(", ")));
        put("SUMMARY", esc(&summary));
        put("PUBLISH_DATE", esc(&date));
        put("PUBLISH_DATE_FORMATTED", esc(&long_date(&date)));
        put("PUBLISH_TIME", esc(&format!("{date}T15:00:00Z")));
        put("CATEGORY", esc(&category));
        put("CATEGORY_NAME", category_name.to_string());
        put("CATEGORY_ICON", icon.to_string());
        put("IMPACT", esc(&impact));
        put("IMPACT_TEXT", impact_label(&impact).to_string());
        put("SOURCE", esc(&source));
        put(
            "PROGRAMS",
            if programs.is_empty() {
                "Multiple immigration programs".to_string()
            } else {
                esc(&programs.join(", "))
            },
        );
        put("CANONICAL_URL", esc(&self.article_url(rec)));
        put("ROOT_PATH", ARTICLE_ROOT_PATH.to_string());
        put("DRAW_DETAILS", draw_details(rec, &date, &programs, &esc));
        put(
            "SOURCE_SECTION",
            match rec.text(record::SOURCE_URL) {
                Some(url) => format!(
                    r#"<div class="source-links"><h4>📚 Official Sources</h4><ul><li><a href="{}" target="_blank" rel="noopener noreferrer">Official {} Announcement</a></li></ul></div>"#,
                    esc(&url),
                    esc(&source)
                ),
                None => String::new(),
            },
        );
        vars
    }

    pub fn render_article(&self, rec: &Record) -> String {
        template::render(&self.template, &self.article_vars(rec))
    }

    /// Write the article page, then prepend it to the daily, main-news and
    /// category listings and bump the daily article count, for the pages
    /// that exist.
    pub async fn publish(&self, rec: &Record) -> Result<Published> {
        let html = self.render_article(rec);
        let leftover = template::placeholders(&html);
        if !leftover.is_empty() {
            tracing::warn!(?leftover, "article template has unresolved placeholders");
        }

        let path = self.article_path(rec);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(&path, html)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        let (category, date, slug) = Self::article_key(rec);
        let news = self.site_root.join("news");
        let daily = news.join("daily");
        let mut listings_updated = Vec::new();

        let daily_index = daily.join("index.html");
        let card = listing_card(rec, &format!("{category}/{date}/{slug}/"));
        let updated = update_listing(&daily_index, |content| {
            let inserted = insert_after_marker(content, DAILY_INDEX_MARKER, &card);
            bump_article_count(inserted.as_deref().unwrap_or(content)).or(inserted)
        })
        .await?;
        if updated {
            listings_updated.push(daily_index);
        }

        let news_index = news.join("index.html");
        let item = recent_news_item(rec, &format!("daily/{category}/{date}/{slug}/"));
        if update_listing(&news_index, |content| {
            insert_after_pattern(content, recent_news_re(), &item)
        })
        .await?
        {
            listings_updated.push(news_index);
        }

        let category_index = daily.join(&category).join("index.html");
        let item = listing_card(rec, &format!("{date}/{slug}/"));
        if update_listing(&category_index, |content| {
            insert_after_marker(content, CATEGORY_INDEX_MARKER, &item)
        })
        .await?
        {
            listings_updated.push(category_index);
        }

        let article_url = self.article_url(rec);
        tracing::info!(url = %article_url, path = %path.display(), "article written");
        Ok(Published {
            article_url,
            path,
            listings_updated,
        })
    }

    /// Draft error report for a record that could not be published.
    pub async fn write_draft(&self, rec: &Record, errors: &[String]) -> Result<PathBuf> {
        let date = rec
            .text(record::DATE)
            .filter(|d| crate::validate::is_date_format(d))
            .unwrap_or_else(|| "unknown".into());
        let slug = rec
            .text(record::HEADLINE)
            .map(|h| slugify(&h))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".into());
        let dir = self
            .site_root
            .join("news")
            .join("daily")
            .join("drafts")
            .join(date)
            .join(slug);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        let data = serde_json::to_string_pretty(rec).context("encoding draft record")?;
        let mut report = String::from("# Article Draft - Error Report\n\n## Error Details\n\n");
        for e in errors {
            report.push_str(&format!("- {e}\n"));
        }
        report.push_str("\n## Original Data\n\n```json\n");
        report.push_str(&data);
        report.push_str("\n```\n\n## Required Actions\n\n1. Fix the fields listed above in the source table.\n2. Re-trigger the automation.\n");

        let path = dir.join("ERROR_REPORT.md");
        fs::write(&path, report)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "draft error report written");
        Ok(path)
    }
}

fn meta_description(summary: &str) -> String {
    const MAX: usize = 160;
    if summary.chars().count() <= MAX {
        return summary.to_string();
    }
    let cut: String = summary.chars().take(MAX - 3).collect();
    format!("{}...", cut.trim_end())
}

fn draw_details(
    rec: &Record,
    date: &str,
    programs: &[String],
    esc: &dyn Fn(&str) -> String,
) -> String {
    let (Some(itas), Some(crs)) = (rec.int(record::INVITATION), rec.int(record::CUTOFF)) else {
        return String::new();
    };
    let program = if programs.is_empty() {
        rec.text(record::DRAW_TYPE)
            .unwrap_or_else(|| "Express Entry".into())
    } else {
        programs.join(", ")
    };
    format!(
        r#"<div class="draw-details"><h5>Draw Details:</h5><ul><li><strong>ITAs Issued:</strong> {}</li><li><strong>CRS Cutoff:</strong> {}</li><li><strong>Draw Date:</strong> {}</li><li><strong>Program:</strong> {}</li></ul></div>"#,
        thousands(itas),
        crs,
        esc(&long_date(date)),
        esc(&program)
    )
}

fn listing_card(rec: &Record, href: &str) -> String {
    let esc = |s: &str| html_escape::encode_double_quoted_attribute(s).into_owned();
    let headline = rec.text(record::HEADLINE).unwrap_or_default();
    let summary = rec.text(record::SUMMARY).unwrap_or_default();
    let date = rec.text(record::DATE).unwrap_or_default();
    let impact = rec.text(record::IMPACT).unwrap_or_default();
    format!(
        r#"
                <article class="news-card">
                    <h3><a href="{href}">{}</a></h3>
                    <div class="news-meta"><span>{}</span><span class="impact-indicator impact-{}">{}</span></div>
                    <p class="summary">{}</p>
                </article>"#,
        esc(&headline),
        esc(&date),
        esc(&impact),
        impact_label(&impact),
        esc(&summary),
        href = esc(href)
    )
}

fn recent_news_item(rec: &Record, href: &str) -> String {
    let esc = |s: &str| html_escape::encode_double_quoted_attribute(s).into_owned();
    let headline = rec.text(record::HEADLINE).unwrap_or_default();
    let date = rec.text(record::DATE).unwrap_or_default();
    let category = rec.text(record::CATEGORY).unwrap_or_default();
    let (_, category_name) = category_label(&category);
    format!(
        r#"
                    <div class="news-item">
                        <div class="news-item-title"><a href="{href}">{}</a></div>
                        <div class="news-item-meta"><span class="news-category-badge">{category_name}</span><span>{}</span></div>
                    </div>"#,
        esc(&headline),
        esc(&date),
        href = esc(href)
    )
}

/// Insert `snippet` right after the first `marker`. Pure helper for listings.
pub fn insert_after_marker(content: &str, marker: &str, snippet: &str) -> Option<String> {
    let at = content.find(marker)? + marker.len();
    Some(splice(content, at, snippet))
}

/// Insert `snippet` right after the first match of `pattern`.
pub fn insert_after_pattern(content: &str, pattern: &Regex, snippet: &str) -> Option<String> {
    let at = pattern.find(content)?.end();
    Some(splice(content, at, snippet))
}

/// `<span class="category-count">N Articles</span>` → `N+1`, first occurrence.
pub fn bump_article_count(content: &str) -> Option<String> {
    let caps = article_count_re().captures(content)?;
    let whole = caps.get(0)?;
    let n: u64 = caps[1].parse().ok()?;
    let mut out = String::with_capacity(content.len() + 2);
    out.push_str(&content[..whole.start()]);
    out.push_str(&format!(
        r#"<span class="category-count">{} Articles</span>"#,
        n + 1
    ));
    out.push_str(&content[whole.end()..]);
    Some(out)
}

fn splice(content: &str, at: usize, snippet: &str) -> String {
    let mut out = String::with_capacity(content.len() + snippet.len());
    out.push_str(&content[..at]);
    out.push_str(snippet);
    out.push_str(&content[at..]);
    out
}

/// Rewrite a listing page in place. A missing page is skipped; other read
/// errors propagate.
async fn update_listing<F>(path: &Path, edit: F) -> Result<bool>
where
    F: FnOnce(&str) -> Option<String>,
{
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("reading listing {}", path.display()));
        }
    };
    let Some(updated) = edit(&content) else {
        tracing::debug!(path = %path.display(), "listing marker not found");
        return Ok(false);
    };
    fs::write(path, updated)
        .await
        .with_context(|| format!("updating listing {}", path.display()))?;
    Ok(true)
}
