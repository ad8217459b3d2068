use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed sentiment label set, in canonical probability order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Positive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
        }
    }

    /// Position of this label in a [`Probabilities`] vector.
    pub fn index(&self) -> usize {
        match self {
            SentimentLabel::Negative => 0,
            SentimentLabel::Neutral => 1,
            SentimentLabel::Positive => 2,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    /// Case-insensitive; model configs spell labels as "Positive", "NEGATIVE", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "positive" => Ok(SentimentLabel::Positive),
            other => Err(format!("unknown sentiment label '{}'", other)),
        }
    }
}

/// Probabilities ordered negative, neutral, positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities(pub [f32; 3]);

impl Probabilities {
    pub fn neutral_fallback() -> Self {
        Probabilities([0.0, 1.0, 0.0])
    }

    pub fn get(&self, label: SentimentLabel) -> f32 {
        self.0[label.index()]
    }

    /// Label with the highest probability; ties resolve to the earlier label.
    pub fn argmax(&self) -> SentimentLabel {
        let mut best = SentimentLabel::Negative;
        for label in SentimentLabel::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: SentimentLabel,
    pub probabilities: Probabilities,
}

impl Classification {
    /// Result used for empty text and for items the model could not score.
    pub fn neutral_fallback() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            probabilities: Probabilities::neutral_fallback(),
        }
    }

    pub fn from_probabilities(probabilities: Probabilities) -> Self {
        Self {
            label: probabilities.argmax(),
            probabilities,
        }
    }

    pub fn score(&self) -> f64 {
        self.label.score()
    }
}

/// A Reddit submission as written to the raw per-entity CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub text: String,
    pub created_utc: f64,
    pub author: String,
    pub score: i64,
    pub num_comments: u64,
    pub upvote_ratio: Option<f64>,
    pub flair: Option<String>,
    pub permalink: String,
    pub url: String,
    pub subreddit: String,
    pub company: String,
}

impl RedditPost {
    pub const COLUMNS: [&'static str; 14] = [
        "id",
        "title",
        "text",
        "created_utc",
        "created_datetime",
        "author",
        "score",
        "num_comments",
        "upvote_ratio",
        "flair",
        "permalink",
        "url",
        "subreddit",
        "company",
    ];

    /// `created_utc` rendered as `YYYY-MM-DD HH:MM:SS` in UTC.
    pub fn created_datetime(&self) -> String {
        format_utc_seconds(self.created_utc as i64)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.title.clone(),
            self.text.clone(),
            self.created_utc.to_string(),
            self.created_datetime(),
            self.author.clone(),
            self.score.to_string(),
            self.num_comments.to_string(),
            self.upvote_ratio.map(|r| r.to_string()).unwrap_or_default(),
            self.flair.clone().unwrap_or_default(),
            self.permalink.clone(),
            self.url.clone(),
            self.subreddit.clone(),
            self.company.clone(),
        ]
    }
}

fn format_utc_seconds(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
