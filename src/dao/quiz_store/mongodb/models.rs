use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{QuestionRecord, QuizRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    questions: Vec<MongoQuestionDocument>,
    #[serde(default)]
    time_limit_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    text: String,
    options: Vec<String>,
    correct_option: u32,
}

impl From<MongoQuizDocument> for QuizRecord {
    fn from(value: MongoQuizDocument) -> Self {
        Self {
            id: value.id,
            title: value.title,
            questions: value.questions.into_iter().map(Into::into).collect(),
            time_limit_secs: value.time_limit_secs,
        }
    }
}

impl From<MongoQuestionDocument> for QuestionRecord {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            text: value.text,
            options: value.options,
            correct_option: value.correct_option as usize,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
