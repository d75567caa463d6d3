/// A quiz as stored in the catalogue, the shape consumed at session creation.
#[derive(Debug, Clone)]
pub struct QuizRecord {
    /// Catalogue identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Ordered questions.
    pub questions: Vec<QuestionRecord>,
    /// Per-question answer window; `None` falls back to the configured default.
    pub time_limit_secs: Option<u64>,
}

/// A single stored question.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    /// Question text.
    pub text: String,
    /// Ordered option texts.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    pub correct_option: usize,
}

/// Catalogue listing entry for admin pickers.
#[derive(Debug, Clone)]
pub struct QuizListItem {
    /// Catalogue identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Number of questions in the quiz.
    pub question_count: usize,
}

impl From<&QuizRecord> for QuizListItem {
    fn from(record: &QuizRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            question_count: record.questions.len(),
        }
    }
}
