//! Keyword classifier: flat substring counting over lowercased ticket text.

use crate::config::ClassifierConfig;
use crate::tickets::{Category, Priority, Ticket};

/// How many entries of `keywords` occur somewhere in `text`. Each keyword
/// counts once no matter how often it repeats.
pub fn count_keywords(text: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|keyword| text.contains(keyword.as_str()))
        .count()
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword.as_str()))
}

/// Technical wins only with a strictly higher score; a nonzero tie goes to
/// ACCOUNT and no hits at all means TRAINING.
pub fn category_from_scores(technical: usize, account: usize) -> Category {
    if technical > account {
        Category::Technical
    } else if account > 0 {
        Category::Account
    } else {
        Category::Training
    }
}

/// Stateless classifier over injected keyword tables.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: ClassifierConfig,
}

impl Classifier {
    pub fn new(rules: ClassifierConfig) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierConfig {
        &self.rules
    }

    /// `text` must already be lowercased.
    pub fn category(&self, text: &str) -> Category {
        category_from_scores(
            count_keywords(text, &self.rules.technical_keywords),
            count_keywords(text, &self.rules.account_keywords),
        )
    }

    /// Rules run in a fixed order and each match overwrites the last:
    /// department → HIGH, critical keyword → CRITICAL, training keyword → LOW.
    /// A ticket that is both urgent and a "how to" ends up LOW.
    pub fn priority(&self, department: &str, text: &str) -> Priority {
        let mut priority = Priority::Medium;

        if self.rules.critical_departments.iter().any(|d| d == department) {
            priority = Priority::High;
        }

        if contains_any(text, &self.rules.critical_keywords) {
            priority = Priority::Critical;
        }

        if contains_any(text, &self.rules.low_priority_keywords) {
            priority = Priority::Low;
        }

        priority
    }

    pub fn classify(&self, ticket: &Ticket) -> (Category, Priority) {
        let text = ticket.normalized_text();
        (
            self.category(&text),
            self.priority(&ticket.department, &text),
        )
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
