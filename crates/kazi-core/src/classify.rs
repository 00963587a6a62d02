//! Opportunity categorization.
//!
//! The oracle is asked first. Its answer is only trusted if it normalizes to
//! one of the three category tokens; anything else, including an oracle
//! error, falls through to a keyword rule that needs no I/O.

use crate::models::{CategorizedRecord, Category, CategoryCounts, RawRecord};
use crate::traits::{ClassificationOracle, OracleRequest};

/// Descriptions are cut to this many characters before reaching the oracle.
pub const MAX_DESCRIPTION_CHARS: usize = 1500;

const ORACLE_TEMPERATURE: f32 = 0.1;
const ORACLE_MAX_TOKENS: u32 = 10;

const SYSTEM_PROMPT: &str =
    "You are a job classification expert. Respond with only: attachment, internship, or job";

/// Checked before the internship list; a match here decides the category.
const ATTACHMENT_KEYWORDS: &[&str] = &[
    "attachment",
    "industrial attachment",
    "field attachment",
    "introduction letter",
    "student",
    "undergraduate",
];

const INTERNSHIP_KEYWORDS: &[&str] = &[
    "internship",
    "intern",
    "graduate trainee",
    "graduate program",
    "fresh graduate",
    "recent graduate",
    "trainee",
];

/// Why the keyword rule was used instead of the oracle's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The oracle call itself failed.
    OracleFailed(String),
    /// The oracle answered with something other than a category token.
    InvalidAnswer(String),
}

/// Which path produced a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationPath {
    Oracle,
    Fallback(FallbackReason),
}

/// A category together with how it was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub path: ClassificationPath,
}

impl Classification {
    pub fn used_fallback(&self) -> bool {
        matches!(self.path, ClassificationPath::Fallback(_))
    }
}

/// Assigns categories using an oracle with a deterministic fallback.
pub struct Classifier<O: ClassificationOracle> {
    oracle: O,
}

impl<O: ClassificationOracle> Classifier<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Categorize one posting. Never fails.
    pub async fn classify(
        &self,
        title: &str,
        description: &str,
        company: Option<&str>,
    ) -> Classification {
        let request = OracleRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(title, description, company.unwrap_or_default()),
            temperature: ORACLE_TEMPERATURE,
            max_tokens: ORACLE_MAX_TOKENS,
        };

        let reason = match self.oracle.complete(&request).await {
            Ok(answer) => match answer.parse::<Category>() {
                Ok(category) => {
                    return Classification {
                        category,
                        path: ClassificationPath::Oracle,
                    };
                }
                Err(_) => FallbackReason::InvalidAnswer(answer),
            },
            Err(e) => FallbackReason::OracleFailed(e.to_string()),
        };

        let category = fallback_category(title, description);
        tracing::debug!(%title, %category, ?reason, "Oracle unusable, used keyword fallback");

        Classification {
            category,
            path: ClassificationPath::Fallback(reason),
        }
    }

    /// Categorize every record in order, one at a time.
    pub async fn classify_all(&self, records: Vec<RawRecord>) -> Vec<CategorizedRecord> {
        let mut categorized = Vec::with_capacity(records.len());
        let mut fallbacks = 0usize;

        for record in records {
            let classification = self
                .classify(&record.title, &record.description, Some(&record.company))
                .await;
            if classification.used_fallback() {
                fallbacks += 1;
            }
            categorized.push(CategorizedRecord::new(record, classification.category));
        }

        let counts = CategoryCounts::tally(&categorized);
        tracing::info!(
            total = categorized.len(),
            attachments = counts.attachment,
            internships = counts.internship,
            jobs = counts.job,
            fallbacks,
            "Classification complete"
        );

        categorized
    }
}

/// Build the user prompt sent to the oracle.
pub fn build_prompt(title: &str, description: &str, company: &str) -> String {
    let description = truncate_chars(description, MAX_DESCRIPTION_CHARS);
    format!(
        r#"You are an expert at categorizing job opportunities in Kenya.
Analyze the following job posting and categorize it into EXACTLY ONE category:

**Categories:**
1. **attachment** - Industrial/field attachments for CURRENT university/college students. These:
   - Require an introduction/attachment letter from the institution
   - Are typically 3-6 months duration
   - Are aimed at students fulfilling academic requirements
   - May be unpaid or stipend-based
   - Keywords: "industrial attachment", "field attachment", "student attachment", "introduction letter required"

2. **internship** - Graduate trainee programs for RECENT graduates. These:
   - Target fresh graduates (0-2 years experience)
   - Are typically 6-12 months duration
   - Often lead to full-time employment
   - Provide structured training programs
   - Keywords: "graduate trainee", "internship program", "fresh graduate", "recent graduate"

3. **job** - Full-time employment positions. These:
   - Require professional work experience
   - Are permanent or long-term contract positions
   - Have competitive salaries
   - Expect immediate contribution
   - Keywords: "2+ years experience", "permanent position", "full-time", "senior", "manager"

**Job Posting:**
Title: {title}
Company: {company}
Description: {description}

Respond with ONLY ONE WORD: attachment, internship, or job"#
    )
}

/// Keyword rule: any attachment keyword wins, then any internship keyword,
/// otherwise `Job`.
pub fn fallback_category(title: &str, description: &str) -> Category {
    let text = format!("{title} {description}").to_lowercase();

    if ATTACHMENT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        Category::Attachment
    } else if INTERNSHIP_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        Category::Internship
    } else {
        Category::Job
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testutil::*;

    #[tokio::test]
    async fn valid_oracle_answer_is_used() {
        let classifier = Classifier::new(MockOracle::new("internship"));
        let c = classifier
            .classify("Senior Engineer", "permanent role", Some("Acme"))
            .await;
        assert_eq!(c.category, Category::Internship);
        assert_eq!(c.path, ClassificationPath::Oracle);
    }

    #[tokio::test]
    async fn oracle_answer_is_normalized() {
        let classifier = Classifier::new(MockOracle::new("  Attachment\n"));
        let c = classifier.classify("Anything", "", None).await;
        assert_eq!(c.category, Category::Attachment);
        assert!(!c.used_fallback());
    }

    #[tokio::test]
    async fn invalid_answer_falls_back() {
        let classifier = Classifier::new(MockOracle::new("This is clearly a job posting."));
        let c = classifier
            .classify("Graduate Trainee Program", "12 month programme", None)
            .await;
        assert_eq!(c.category, Category::Internship);
        let reason = FallbackReason::InvalidAnswer("This is clearly a job posting.".into());
        assert_eq!(c.path, ClassificationPath::Fallback(reason));
    }

    #[tokio::test]
    async fn empty_answer_falls_back() {
        let classifier = Classifier::new(MockOracle::new(""));
        let c = classifier.classify("Data Analyst", "SQL and Python", None).await;
        assert_eq!(c.category, Category::Job);
        assert!(c.used_fallback());
    }

    #[tokio::test]
    async fn oracle_error_falls_back() {
        let classifier = Classifier::new(MockOracle::with_error(AppError::LlmError {
            message: "overloaded".into(),
            status_code: 503,
        }));
        let c = classifier
            .classify("Industrial Attachment", "for students", None)
            .await;
        assert_eq!(c.category, Category::Attachment);
        assert!(matches!(
            c.path,
            ClassificationPath::Fallback(FallbackReason::OracleFailed(ref msg))
                if msg.contains("overloaded")
        ));
    }

    #[tokio::test]
    async fn empty_inputs_still_yield_a_category() {
        let classifier = Classifier::new(MockOracle::with_error(AppError::Timeout(30)));
        let c = classifier.classify("", "", None).await;
        assert_eq!(c.category, Category::Job);
        assert!(Category::ALL.contains(&c.category));
    }

    #[tokio::test]
    async fn request_is_bounded_and_deterministic() {
        let oracle = MockOracle::new("job");
        let classifier = Classifier::new(oracle.clone());
        let long_description = "é".repeat(4000);

        classifier
            .classify("Cashier", &long_description, Some("Naivas"))
            .await;

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.temperature, 0.1);
        assert_eq!(req.max_tokens, 10);
        assert!(req.prompt.contains("Title: Cashier"));
        assert!(req.prompt.contains("Company: Naivas"));
        let described = req.prompt.matches('é').count();
        assert_eq!(described, MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn fallback_attachment_beats_internship() {
        let category = fallback_category(
            "Graduate Industrial Attachment Program",
            "Open to graduate trainee applicants; introduction letter required.",
        );
        assert_eq!(category, Category::Attachment);
    }

    #[test]
    fn fallback_defaults_to_job() {
        let category = fallback_category(
            "Senior Software Engineer",
            "5+ years experience, permanent position",
        );
        assert_eq!(category, Category::Job);
    }

    #[test]
    fn fallback_detects_internship() {
        assert_eq!(
            fallback_category("Marketing Intern", "Learn SEO and content"),
            Category::Internship
        );
        assert_eq!(
            fallback_category("Trainee Accountant", ""),
            Category::Internship
        );
    }

    #[test]
    fn fallback_is_case_insensitive() {
        assert_eq!(
            fallback_category("IT ATTACHMENT", "3RD YEAR STUDENTS"),
            Category::Attachment
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[tokio::test]
    async fn classify_all_keeps_order_and_isolates_records() {
        let oracle = MockOracle::with_answers(vec![
            Ok("attachment".into()),
            Err(AppError::Timeout(10)),
            Ok("nonsense".into()),
            Ok("job".into()),
        ]);
        let classifier = Classifier::new(oracle);

        let mut records: Vec<_> = (0..4).map(|i| make_record("fuzu", i)).collect();
        records[1].title = "Graduate Trainee".into();
        records[2].title = "Senior Manager".into();

        let categorized = classifier.classify_all(records.clone()).await;

        let categories: Vec<_> = categorized.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Attachment,
                Category::Internship,
                Category::Job,
                Category::Job
            ]
        );
        for (out, input) in categorized.iter().zip(&records) {
            assert_eq!(&out.record, input);
        }
    }

    #[tokio::test]
    async fn many_consecutive_fallbacks_are_independent() {
        let classifier = Classifier::new(MockOracle::with_error(AppError::RateLimitExceeded));
        let mut records = Vec::new();
        for i in 0..50 {
            let mut r = make_record("fuzu", i);
            r.title = if i % 2 == 0 {
                "Student Attachment".into()
            } else {
                "Accountant".into()
            };
            r.description = String::new();
            records.push(r);
        }

        let categorized = classifier.classify_all(records).await;

        for (i, r) in categorized.iter().enumerate() {
            let expected = if i % 2 == 0 {
                Category::Attachment
            } else {
                Category::Job
            };
            assert_eq!(r.category, expected);
        }
    }
}
