use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ULID and ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EssayId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorQuestionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaperId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrainstormId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PomodoroId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSearchId(pub String);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EssayId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ErrorQuestionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BrainstormId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PomodoroId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceSearchId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn generate_note_id() -> NoteId {
    NoteId(format!("note_{}", ulid::Ulid::new()))
}

pub fn generate_essay_id() -> EssayId {
    EssayId(format!("essay_{}", ulid::Ulid::new()))
}

pub fn generate_error_question_id() -> ErrorQuestionId {
    ErrorQuestionId(format!("errq_{}", ulid::Ulid::new()))
}

pub fn generate_quote_id() -> QuoteId {
    QuoteId(format!("quote_{}", ulid::Ulid::new()))
}

pub fn generate_session_id() -> SessionId {
    SessionId(format!("sess_{}", ulid::Ulid::new()))
}

pub fn generate_document_id() -> DocumentId {
    DocumentId(format!("doc_{}", ulid::Ulid::new()))
}

pub fn generate_paper_id() -> PaperId {
    PaperId(format!("paper_{}", ulid::Ulid::new()))
}

pub fn generate_book_id() -> BookId {
    BookId(format!("book_{}", ulid::Ulid::new()))
}

pub fn generate_brainstorm_id() -> BrainstormId {
    BrainstormId(format!("brain_{}", ulid::Ulid::new()))
}

pub fn generate_pomodoro_id() -> PomodoroId {
    PomodoroId(format!("pomo_{}", ulid::Ulid::new()))
}

pub fn generate_problem_id() -> ProblemId {
    ProblemId(format!("prob_{}", ulid::Ulid::new()))
}

pub fn generate_resource_search_id() -> ResourceSearchId {
    ResourceSearchId(format!("rsearch_{}", ulid::Ulid::new()))
}

/// Individual search results are addressed by a plain string id.
pub fn generate_resource_id() -> String {
    format!("res_{}", ulid::Ulid::new())
}

// ============================================================================
// Chat Messages (LLM wire shape)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

// ============================================================================
// Review Schedule
// ============================================================================

/// Spaced-repetition state carried by every note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub review_count: i64,
    pub next_review_at: DateTime<Utc>,
}

// ============================================================================
// Notes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteMethod {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "cornell")]
    Cornell,
    #[serde(rename = "feynman")]
    Feynman,
}

impl NoteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteMethod::Free => "free",
            NoteMethod::Cornell => "cornell",
            NoteMethod::Feynman => "feynman",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(NoteMethod::Free),
            "cornell" => Some(NoteMethod::Cornell),
            "feynman" => Some(NoteMethod::Feynman),
            _ => None,
        }
    }
}

/// Cornell layout: cue column, summary strip, self-test questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornellData {
    #[serde(default)]
    pub cues: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeynmanResult {
    pub score: f64,
    pub level: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub simplified_explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub method: NoteMethod,
    pub cornell_data: Option<CornellData>,
    pub feynman_result: Option<FeynmanResult>,
    pub tags: Vec<String>,
    pub next_review_at: DateTime<Utc>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn review_state(&self) -> ReviewState {
        ReviewState {
            review_count: self.review_count,
            next_review_at: self.next_review_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateNoteRequest {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub method: NoteMethod,
    pub cornell_data: Option<CornellData>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateNoteRequest {
    pub title: String,
    pub content: String,
    pub method: NoteMethod,
    pub cornell_data: Option<CornellData>,
    pub tags: Vec<String>,
}

// ============================================================================
// Essays
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Essay {
    pub id: EssayId,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitEssayRequest {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayFeedback {
    pub analysis: EssayAnalysis,
    #[serde(default)]
    pub improvement_points: Vec<ImprovementPoint>,
    #[serde(default)]
    pub optimized_examples: Vec<OptimizedExample>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub overall_comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayAnalysis {
    pub structure_score: f64,
    pub language_score: f64,
    pub content_score: f64,
    pub overall_score: f64,
    #[serde(default)]
    pub structure_analysis: String,
    #[serde(default)]
    pub language_analysis: String,
    #[serde(default)]
    pub content_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementPoint {
    pub category: String,
    pub issue: String,
    pub suggestion: String,
    #[serde(default)]
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedExample {
    pub original_text: String,
    pub optimized_text: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub improvement_type: String,
}

// ============================================================================
// Error Questions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "easy")]
    Easy,
    #[default]
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "hard")]
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorQuestion {
    pub id: ErrorQuestionId,
    pub user_id: String,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub mastery_level: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddErrorQuestionRequest {
    pub user_id: String,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
    pub subject: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratePracticeRequest {
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub based_on_error_id: Option<ErrorQuestionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    pub total_errors: usize,
    pub subject_breakdown: BTreeMap<String, usize>,
    pub difficulty_breakdown: BTreeMap<String, usize>,
    pub weakest_subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakSubject {
    pub subject: String,
    pub average_mastery: f64,
    pub error_count: usize,
}

// ============================================================================
// Quotes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub content: String,
    pub theme: String,
    pub language: String,
    pub author: String,
    pub category: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// What the model returns when asked for a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuoteRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_quote_theme")]
    pub theme: String,
    #[serde(default = "default_quote_language")]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuoteRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_quote_theme")]
    pub theme: String,
    #[serde(default = "default_quote_language")]
    pub language: String,
    #[serde(default = "default_quote_style")]
    pub style: String,
}

fn default_quote_theme() -> String {
    "motivation".to_string()
}

fn default_quote_language() -> String {
    "zh".to_string()
}

fn default_quote_style() -> String {
    "inspirational".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteStatistics {
    pub total_quotes: usize,
    pub theme_breakdown: BTreeMap<String, usize>,
    pub language_breakdown: BTreeMap<String, usize>,
}

// ============================================================================
// Relaxation Chat
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxationSession {
    pub id: SessionId,
    pub user_id: String,
    pub messages: Vec<ChatEntry>,
    pub mood: Option<Mood>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "relaxed")]
    Relaxed,
    #[default]
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "stressed")]
    Stressed,
    #[serde(rename = "anxious")]
    Anxious,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Relaxed => "relaxed",
            Mood::Neutral => "neutral",
            Mood::Stressed => "stressed",
            Mood::Anxious => "anxious",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "relaxed" => Some(Mood::Relaxed),
            "neutral" => Some(Mood::Neutral),
            "stressed" => Some(Mood::Stressed),
            "anxious" => Some(Mood::Anxious),
            _ => None,
        }
    }
}

/// Sentiment read of a single user message, exactly as the model reported
/// it. The mood label is not checked and the stress level may be fractional
/// or out of range; callers resolve both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodReading {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub stress_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaxationSuggestions {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: SessionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub stress_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub assistant_message: AssistantMessage,
    pub mood: Mood,
    pub sentiment: Sentiment,
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDocumentRequest {
    pub user_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDocumentRequest {
    pub title: String,
    pub content: String,
}

/// Earlier turns of a conversation, supplied by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentChatRequest {
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateDocumentRequest {
    pub user_id: String,
    pub prompt: String,
}

/// What the model returns when asked to write a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentDraft {
    pub title: String,
    pub content: String,
}

// ============================================================================
// Papers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: PaperId,
    pub user_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
    pub translated_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePaperRequest {
    pub user_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
}

/// Text pulled out of an uploaded PDF, returned for the client to review
/// before it creates the paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperUpload {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperTranslation {
    pub translated_content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperQuestionRequest {
    pub question: String,
    /// Passage the reader selected, if the question is about one.
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAnswer {
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermsRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermAnnotations {
    pub annotations: Vec<TermAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAnnotation {
    pub term: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaperSummary {
    pub overview: String,
    pub key_findings: Vec<String>,
    pub methodology: String,
    pub conclusions: String,
    pub significance: String,
}

// ============================================================================
// Books and SQ3R Reading
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBookRequest {
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummaryRequest {
    #[serde(default = "default_summary_style")]
    pub style: String,
    #[serde(default = "default_summary_length")]
    pub max_length: u32,
}

impl Default for BookSummaryRequest {
    fn default() -> Self {
        Self {
            style: default_summary_style(),
            max_length: default_summary_length(),
        }
    }
}

fn default_summary_style() -> String {
    "concise".to_string()
}

fn default_summary_length() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub summary: String,
}

/// The five stages of Survey, Question, Read, Recite, Review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sq3rStage {
    Survey,
    Question,
    Read,
    Recite,
    Review,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sq3rGuideRequest {
    pub chapter_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sq3rGuide {
    pub steps: Vec<Sq3rStep>,
}

/// One stage of a generated guide. The stage label is kept as the model
/// wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sq3rStep {
    pub step: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub book_id: BookId,
    pub user_id: String,
    pub current_chapter: u32,
    pub total_chapters: u32,
    pub completed_steps: Vec<CompletedStep>,
    pub comprehension_score: f64,
}

impl ReadingProgress {
    /// Progress of a reader who has not started the book.
    pub fn not_started(book_id: BookId, user_id: impl Into<String>) -> Self {
        Self {
            book_id,
            user_id: user_id.into(),
            current_chapter: 1,
            total_chapters: 1,
            completed_steps: Vec::new(),
            comprehension_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
    pub step: Sq3rStage,
    pub completed: bool,
    #[serde(default)]
    pub user_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
    pub step_type: Sq3rStage,
    #[serde(default)]
    pub user_response: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorReply {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<BookId>,
}

// ============================================================================
// Brainstorm Panels
// ============================================================================

/// The viewpoints that take part in every panel discussion, in speaking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    Optimist,
    Pessimist,
    Realist,
    Creative,
}

impl Perspective {
    pub const PANEL: [Perspective; 4] = [
        Perspective::Optimist,
        Perspective::Pessimist,
        Perspective::Realist,
        Perspective::Creative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Optimist => "optimist",
            Perspective::Pessimist => "pessimist",
            Perspective::Realist => "realist",
            Perspective::Creative => "creative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelMessage {
    pub role: Perspective,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainstormStatus {
    #[default]
    Active,
    Completed,
}

impl BrainstormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrainstormStatus::Active => "active",
            BrainstormStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(BrainstormStatus::Active),
            "completed" => Some(BrainstormStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainstormSession {
    pub id: BrainstormId,
    pub user_id: String,
    pub topic: String,
    pub messages: Vec<PanelMessage>,
    pub synthesis: Option<String>,
    pub status: BrainstormStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBrainstormRequest {
    pub user_id: String,
    pub topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeepDiveRequest {
    pub focus_point: String,
}

/// `?userId=` filter on listing endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    pub user_id: String,
}

/// `?limit=` cap on history endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Pomodoro
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: PomodoroId,
    pub user_id: String,
    pub task: Option<String>,
    /// Planned length in minutes.
    pub duration: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPomodoroRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default = "default_pomodoro_minutes")]
    pub duration: u32,
}

fn default_pomodoro_minutes() -> u32 {
    25
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Minutes of completed focus time.
    pub total_focus_time: u64,
    pub average_session_length: f64,
    pub daily_stats: Vec<DailyFocus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFocus {
    pub date: NaiveDate,
    pub sessions: usize,
    pub focus_time: u64,
}

// ============================================================================
// Guided Problem Solving
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemRequest {
    pub user_id: String,
    pub question: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemAnalysis {
    #[serde(default)]
    pub problem_type: String,
    #[serde(default = "default_problem_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub required_concepts: Vec<String>,
    /// Minutes, as estimated by the model.
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_time: Option<f64>,
    #[serde(default)]
    pub solution_approach: Vec<String>,
}

fn default_problem_difficulty() -> String {
    Difficulty::Medium.as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAttempt {
    pub step_number: u32,
    pub user_input: String,
    pub timestamp: DateTime<Utc>,
    pub needs_hint: bool,
}

/// Everything stored about one guided solving session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub id: ProblemId,
    pub user_id: String,
    pub question: String,
    pub subject: String,
    pub analysis: ProblemAnalysis,
    pub current_step: u32,
    pub user_progress: Vec<StepAttempt>,
    pub hints_used: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl ProblemRecord {
    pub fn session(&self) -> ProblemSession {
        ProblemSession {
            id: self.id.clone(),
            problem_id: self.id.clone(),
            completed: self.completed,
            current_step: self.current_step,
            user_progress: self.user_progress.clone(),
        }
    }
}

/// Client view of a solving session. A session and the problem it works on
/// share one id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSession {
    pub id: ProblemId,
    pub problem_id: ProblemId,
    pub completed: bool,
    pub current_step: u32,
    pub user_progress: Vec<StepAttempt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessStepRequest {
    pub session_id: String,
    pub user_input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFeedback {
    pub feedback: String,
    pub should_proceed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    #[serde(default)]
    pub step_number: u32,
    #[serde(default)]
    pub hint_level: String,
    pub content: String,
    #[serde(default)]
    pub reveals_solution: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemOverview {
    pub id: ProblemId,
    pub question: String,
    pub subject: String,
    pub difficulty: String,
    pub problem_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSummary {
    pub problem_id: ProblemId,
    pub method: String,
    pub key_steps: Vec<String>,
    pub concepts: Vec<String>,
    /// Minutes from the start of the session to its latest step.
    pub time_spent: i64,
    pub hints_used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemHistory {
    pub problems: Vec<ProblemOverview>,
    pub sessions: Vec<ProblemSession>,
    pub summaries: Vec<SolutionSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimilarProblemsRequest {
    pub problem_id: String,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarProblem {
    pub question: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default = "default_problem_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub problem_type: String,
}

// ============================================================================
// Resource Search
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningResource {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub relevance_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub credibility_score: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publish_date: String,
}

/// What the model returns for a resource search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSearchReply {
    pub search_strategy: String,
    pub resources: Vec<LearningResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSearch {
    pub id: ResourceSearchId,
    pub user_id: String,
    pub query: String,
    pub search_strategy: String,
    pub resources: Vec<LearningResource>,
    /// Resources grouped by content type.
    pub categorized_resources: BTreeMap<String, Vec<LearningResource>>,
    pub total_results: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSearchRequest {
    pub user_id: String,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceFormat {
    #[default]
    Markdown,
    Plain,
    Json,
    Citation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatResourceRequest {
    pub format: ResourceFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedResource {
    pub content: String,
}

// ============================================================================
// Shared Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            message: "ok".to_string(),
        }
    }
}

// ============================================================================
// Lenient Decoding
// ============================================================================

/// Accept a number, a numeric string or null. Models are inconsistent about
/// quoting numbers.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(value)) => Some(value),
        Some(Loose::Text(raw)) => raw.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let note_id = generate_note_id();
        assert!(note_id.0.starts_with("note_"));
        assert_eq!(note_id.0.len(), 31); // "note_" + 26 chars

        assert!(generate_essay_id().0.starts_with("essay_"));
        assert!(generate_error_question_id().0.starts_with("errq_"));
        assert!(generate_quote_id().0.starts_with("quote_"));
        assert!(generate_session_id().0.starts_with("sess_"));
        assert!(generate_document_id().0.starts_with("doc_"));
        assert!(generate_paper_id().0.starts_with("paper_"));
        assert!(generate_book_id().0.starts_with("book_"));
        assert!(generate_brainstorm_id().0.starts_with("brain_"));
        assert!(generate_pomodoro_id().0.starts_with("pomo_"));
        assert!(generate_problem_id().0.starts_with("prob_"));
        assert!(generate_resource_search_id().0.starts_with("rsearch_"));
        assert!(generate_resource_id().starts_with("res_"));
    }

    #[test]
    fn test_note_serializes_camel_case() {
        let now = Utc::now();
        let note = Note {
            id: generate_note_id(),
            user_id: "u1".to_string(),
            title: "Ownership".to_string(),
            content: "Borrowing rules".to_string(),
            method: NoteMethod::Cornell,
            cornell_data: None,
            feynman_result: None,
            tags: vec!["rust".to_string()],
            next_review_at: now,
            review_count: 2,
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["method"], "cornell");
        assert_eq!(value["reviewCount"], 2);
        assert!(value.get("nextReviewAt").is_some());
    }

    #[test]
    fn test_create_note_request_defaults() {
        let request: CreateNoteRequest = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        assert_eq!(request.title, "T");
        assert_eq!(request.method, NoteMethod::Free);
        assert!(request.tags.is_empty());
        assert!(request.cornell_data.is_none());
    }

    #[test]
    fn test_feynman_reply_shape() {
        let raw = r#"{
            "score": 85,
            "level": "good",
            "strengths": ["clear definitions"],
            "weaknesses": [],
            "suggestions": ["add an example"],
            "simplifiedExplanation": "Each value has one owner."
        }"#;

        let result: FeynmanResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.score, 85.0);
        assert_eq!(result.simplified_explanation, "Each value has one owner.");
    }

    #[test]
    fn test_feynman_reply_requires_score() {
        let raw = r#"{"level": "good"}"#;
        assert!(serde_json::from_str::<FeynmanResult>(raw).is_err());
    }

    #[test]
    fn test_mood_reading_is_loose() {
        let reading: MoodReading = serde_json::from_str("{}").unwrap();
        assert_eq!(reading, MoodReading::default());

        let reading: MoodReading =
            serde_json::from_str(r#"{"mood":"calm","stressLevel":7.5}"#).unwrap();
        assert_eq!(reading.mood.as_deref(), Some("calm"));
        assert_eq!(reading.stress_level, Some(7.5));

        let reading: MoodReading =
            serde_json::from_str(r#"{"mood":null,"stressLevel":"8"}"#).unwrap();
        assert_eq!(reading.mood, None);
        assert_eq!(reading.stress_level, Some(8.0));

        let reading: MoodReading = serde_json::from_str(r#"{"stressLevel":"high"}"#).unwrap();
        assert_eq!(reading.stress_level, None);
    }

    #[test]
    fn test_paper_uses_abstract_key() {
        let request: CreatePaperRequest = serde_json::from_str(
            r#"{"title":"Attention","authors":["Vaswani"],"abstract":"Transformers."}"#,
        )
        .unwrap();
        assert_eq!(request.abstract_text, "Transformers.");
        assert_eq!(request.authors, vec!["Vaswani".to_string()]);
    }

    #[test]
    fn test_problem_analysis_tolerates_loose_numbers() {
        let analysis: ProblemAnalysis =
            serde_json::from_str(r#"{"problemType":"algebra","estimatedTime":"15"}"#).unwrap();
        assert_eq!(analysis.estimated_time, Some(15.0));
        assert_eq!(analysis.difficulty, "medium");
        assert!(analysis.required_concepts.is_empty());
    }

    #[test]
    fn test_request_defaults() {
        let request: StartPomodoroRequest = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert_eq!(request.duration, 25);
        assert!(request.task.is_none());

        let request: BookSummaryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.style, "concise");
        assert_eq!(request.max_length, 500);

        let request: FormatResourceRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.format, ResourceFormat::Markdown);
    }

    #[test]
    fn test_sq3r_stage_labels() {
        let request: CompleteStepRequest =
            serde_json::from_str(r#"{"stepType":"recite","userResponse":"summary"}"#).unwrap();
        assert_eq!(request.step_type, Sq3rStage::Recite);
        assert!(serde_json::from_str::<CompleteStepRequest>(r#"{"stepType":"skim"}"#).is_err());
    }

    #[test]
    fn test_quote_request_defaults() {
        let request: GenerateQuoteRequest = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert_eq!(request.theme, "motivation");
        assert_eq!(request.language, "zh");
        assert_eq!(request.style, "inspirational");
    }

    #[test]
    fn test_enum_round_trip_labels() {
        assert_eq!(NoteMethod::parse("feynman"), Some(NoteMethod::Feynman));
        assert_eq!(Difficulty::parse(Difficulty::Hard.as_str()), Some(Difficulty::Hard));
        assert_eq!(Mood::parse("sleepy"), None);
        assert_eq!(
            BrainstormStatus::parse(BrainstormStatus::Completed.as_str()),
            Some(BrainstormStatus::Completed)
        );
    }
}
