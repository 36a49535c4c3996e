use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use validator::Validate;

use crate::config::RagConfig;
use crate::database::models::{NewOption, NewQuestion, NewQuizWithQuestions};
use crate::database::vector_db::{InMemoryVectorStore, QdrantStore, ScoredChunk, VectorStore};
use crate::document::{load_corpus, TextSplitter};
use crate::llm::embeddings::EmbeddingGenerator;
use crate::llm::pricing::CostInfo;
use crate::llm::semantic_search::SemanticSearch;
use crate::providers::traits::CompletionProvider;

const QDRANT_COLLECTION: &str = "lms_corpus";

lazy_static! {
    static ref OPTION_LABEL: Regex = Regex::new(r"^\(?[A-Za-z][\).:]\s+").unwrap();
    static ref LETTER_ANSWER: Regex =
        Regex::new(r"^(?i:option\s+)?\(?([A-Za-z])[\).:]?$").unwrap();
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(range(min = 1, max = 50))]
    pub num_questions: u32,
    #[validate(range(min = 1))]
    pub total_marks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Retrieve by topic and let the model combine context with its own knowledge.
    #[default]
    RagPlusLlm,
    /// Retrieve by the whole request and restrict the model to the context.
    RagOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQuiz {
    pub quiz: QuizResponse,
    pub cost: CostInfo,
    pub mode: GenerationMode,
    /// Pages the retrieved context came from.
    pub source_pages: Vec<usize>,
}

const FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else, in exactly this shape:
{"title": "<quiz title>", "questions": [{"question": "<question text>", "options": ["<option>", "<option>", "<option>", "<option>"], "correct_answer": "<the correct option, copied exactly>"}]}
Every question must have at least two options, and correct_answer must be one of its options."#;

fn persona(subject: &str) -> String {
    format!("You are an undergrad level instructor of {}.", subject)
}

pub fn rag_plus_llm_prompt(request: &QuizRequest, hits: &[ScoredChunk]) -> String {
    let context = hits
        .iter()
        .map(|hit| format!("(Page {}) {}", hit.chunk.page, hit.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Create a multiple-choice quiz.\n\n\
         CONTEXT:\n{}\n\n\
         QUIZ PARAMETERS:\n\
         Topic: {}\n\
         Number of questions: {}\n\
         Total marks: {}\n\n\
         {}",
        context, request.topic, request.num_questions, request.total_marks, FORMAT_INSTRUCTIONS
    )
}

pub fn rag_only_prompt(request: &QuizRequest, hits: &[ScoredChunk]) -> String {
    let context = hits
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use ONLY the following context to generate a quiz.\n\
         CONTEXT:\n{}\n\n\
         QUIZ PARAMETERS:\n\
         Topic: {}\n\
         Number of questions: {}\n\
         Total marks: {}\n\n\
         Generate exactly {} questions.\n\n\
         {}",
        context,
        request.topic,
        request.num_questions,
        request.total_marks,
        request.num_questions,
        FORMAT_INSTRUCTIONS
    )
}

/// Extracts the outermost JSON object from a model reply.
fn json_body(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

fn strip_label(text: &str) -> &str {
    let trimmed = text.trim();
    match OPTION_LABEL.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    }
}

fn resolve_answer(question: &QuizQuestion) -> Option<usize> {
    let answer = question.correct_answer.trim();

    let by_text = question.options.iter().position(|option| {
        option.trim().eq_ignore_ascii_case(answer)
            || strip_label(option).eq_ignore_ascii_case(strip_label(answer))
    });
    if by_text.is_some() {
        return by_text;
    }

    let letter = LETTER_ANSWER.captures(answer)?.get(1)?.as_str();
    let index = (letter.chars().next()?.to_ascii_uppercase() as u8).checked_sub(b'A')? as usize;
    (index < question.options.len()).then_some(index)
}

/// Parses and checks a model reply; `correct_answer` is rewritten to the
/// exact text of the matching option.
pub fn parse_quiz(reply: &str) -> Result<QuizResponse> {
    let body = json_body(reply).ok_or_else(|| anyhow!("No JSON object in model reply"))?;
    let mut quiz: QuizResponse =
        serde_json::from_str(body).context("Model reply is not a valid quiz")?;

    if quiz.questions.is_empty() {
        bail!("Model returned a quiz with no questions");
    }

    for (i, question) in quiz.questions.iter_mut().enumerate() {
        question.options.retain(|o| !o.trim().is_empty());
        if question.options.len() < 2 {
            bail!("Question {} has fewer than two options", i + 1);
        }
        let index = resolve_answer(question).ok_or_else(|| {
            anyhow!(
                "Question {}: correct answer {:?} is not one of its options",
                i + 1,
                question.correct_answer
            )
        })?;
        question.correct_answer = question.options[index].clone();
    }

    Ok(quiz)
}

/// Splits `total` as evenly as possible; the first questions take the remainder.
pub fn distribute_marks(total: u32, count: usize) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let count_u32 = count as u32;
    let base = total / count_u32;
    let remainder = (total % count_u32) as usize;
    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Turns a generated quiz into rows for a single-transaction insert.
pub fn quiz_record(
    quiz: &QuizResponse,
    total_marks: u32,
    course_id: i64,
    created_by: Option<i64>,
) -> NewQuizWithQuestions {
    let marks = distribute_marks(total_marks, quiz.questions.len());
    let questions = quiz
        .questions
        .iter()
        .zip(marks)
        .map(|(question, marks)| NewQuestion {
            question_text: question.question.clone(),
            question_type: "mcq".to_string(),
            marks: Some(marks as i64),
            quiz_id: None,
            assignment_id: None,
            created_by,
            options: question
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| NewOption {
                    option_text: option.clone(),
                    is_correct: *option == question.correct_answer,
                    order_index: i as i64,
                })
                .collect(),
        })
        .collect();

    NewQuizWithQuestions {
        title: quiz.title.clone(),
        total_marks: Some(total_marks as i64),
        course_id,
        created_by,
        questions,
    }
}

pub struct QuizGenerator {
    provider: Arc<dyn CompletionProvider>,
    search: SemanticSearch,
    subject: String,
    top_k: usize,
}

impl QuizGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
    ) -> Self {
        let embeddings = EmbeddingGenerator::new(provider.clone());
        Self {
            provider,
            search: SemanticSearch::new(store, embeddings),
            subject: config.subject.clone(),
            top_k: config.top_k.max(1),
        }
    }

    /// Loads the configured corpus, picks a vector store and indexes it.
    pub async fn from_config(
        provider: Arc<dyn CompletionProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        let path = config
            .corpus_path
            .as_ref()
            .ok_or_else(|| anyhow!("RAG_CORPUS_PATH is not set"))?;
        let corpus = {
            let path = path.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || load_corpus(&path, &config)).await??
        };

        let store: Arc<dyn VectorStore> = match &config.qdrant_url {
            Some(url) => Arc::new(QdrantStore::connect(url, QDRANT_COLLECTION).await?),
            None => Arc::new(InMemoryVectorStore::new()),
        };

        let generator = Self::new(provider, store, config);
        generator.index(&corpus.pages, &corpus.splitter(config)).await?;
        Ok(generator)
    }

    /// Cleans, chunks, embeds and stores the given pages.
    pub async fn index(&self, pages: &[String], splitter: &TextSplitter) -> Result<usize> {
        let chunks = splitter.split_pages(pages);
        if chunks.is_empty() {
            bail!("Corpus produced no usable text");
        }
        info!(
            "Split {} page(s) into {} chunks (size {}, overlap {})",
            pages.len(),
            chunks.len(),
            splitter.chunk_size(),
            splitter.chunk_overlap()
        );
        self.search.index(chunks).await
    }

    pub async fn generate(
        &self,
        request: &QuizRequest,
        mode: GenerationMode,
    ) -> Result<GeneratedQuiz> {
        let (hits, prompt) = match mode {
            GenerationMode::RagPlusLlm => {
                let hits = self.search.search(&request.topic, self.top_k).await?;
                let prompt = rag_plus_llm_prompt(request, &hits);
                (hits, prompt)
            }
            GenerationMode::RagOnly => {
                let query = serde_json::to_string(request)?;
                let hits = self.search.search(&query, self.top_k).await?;
                let prompt = rag_only_prompt(request, &hits);
                (hits, prompt)
            }
        };

        let model_name = self.provider.get_model_info().await?;
        let start = Instant::now();
        let completion = self
            .provider
            .complete(&persona(&self.subject), &prompt)
            .await
            .context("Quiz completion request failed")?;
        let latency = start.elapsed().as_secs_f64();

        let quiz = parse_quiz(&completion.text)?;
        if quiz.questions.len() != request.num_questions as usize {
            warn!(
                "Asked for {} questions, model returned {}",
                request.num_questions,
                quiz.questions.len()
            );
        }

        let cost = CostInfo::new(&model_name, completion.usage, latency);
        info!(
            "Generated quiz {:?} with {} in {:.2}s ({} tokens, ${:.6})",
            quiz.title, cost.model_name, cost.latency_secs, cost.total_tokens, cost.cost_usd
        );

        let mut source_pages: Vec<usize> = hits.iter().map(|h| h.chunk.page).collect();
        source_pages.sort_unstable();
        source_pages.dedup();

        Ok(GeneratedQuiz {
            quiz,
            cost,
            mode,
            source_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::{Completion, TokenUsage};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const REPLY: &str = r#"Here is your quiz:
```json
{"title": "Logic Gates", "questions": [
  {"question": "Which gate outputs 1 only when all inputs are 1?", "options": ["AND", "OR", "NOT"], "correct_answer": "and"},
  {"question": "Which gate has a single input?", "options": ["A) NAND", "B) NOT"], "correct_answer": "B"}
]}
```"#;

    /// Embeds by keyword presence and replays a canned reply.
    struct ScriptedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<Completion> {
            self.prompts.lock().push(prompt.to_string());
            Ok(Completion {
                text: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 1000,
                    completion_tokens: 200,
                    total_tokens: 1200,
                },
            })
        }

        async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.contains("gate") as u8 as f32,
                        t.contains("flip") as u8 as f32,
                        0.1,
                    ]
                })
                .collect())
        }

        async fn get_model_info(&self) -> Result<String> {
            Ok("gpt-4.1-mini".into())
        }
    }

    fn request(num_questions: u32, total_marks: u32) -> QuizRequest {
        QuizRequest {
            topic: "logic gates".into(),
            num_questions,
            total_marks,
        }
    }

    #[test]
    fn parses_fenced_reply_and_resolves_answers() {
        let quiz = parse_quiz(REPLY).unwrap();
        assert_eq!(quiz.title, "Logic Gates");
        assert_eq!(quiz.questions[0].correct_answer, "AND");
        assert_eq!(quiz.questions[1].correct_answer, "B) NOT");
    }

    #[test]
    fn rejects_answer_outside_options() {
        let reply = r#"{"title": "T", "questions": [{"question": "Q", "options": ["X", "Y"], "correct_answer": "Z"}]}"#;
        assert!(parse_quiz(reply).is_err());
        let reply = r#"{"title": "T", "questions": [{"question": "Q", "options": ["X", "Y"], "correct_answer": "D"}]}"#;
        assert!(parse_quiz(reply).is_err());
        assert!(parse_quiz("no json here").is_err());
    }

    #[test]
    fn rejects_single_option_questions() {
        let reply = r#"{"title": "T", "questions": [{"question": "Q", "options": ["X", " "], "correct_answer": "X"}]}"#;
        assert!(parse_quiz(reply).is_err());
    }

    #[test]
    fn marks_remainder_goes_to_first_questions() {
        assert_eq!(distribute_marks(10, 3), vec![4, 3, 3]);
        assert_eq!(distribute_marks(2, 4), vec![1, 1, 0, 0]);
        assert!(distribute_marks(5, 0).is_empty());
    }

    #[test]
    fn request_bounds_are_validated() {
        assert!(request(10, 10).validate().is_ok());
        assert!(request(0, 10).validate().is_err());
        assert!(request(51, 10).validate().is_err());
        assert!(request(5, 0).validate().is_err());
    }

    #[test]
    fn record_marks_correct_option() {
        let quiz = parse_quiz(REPLY).unwrap();
        let record = quiz_record(&quiz, 5, 7, Some(1));
        assert_eq!(record.course_id, 7);
        assert_eq!(record.questions[0].marks, Some(3));
        assert_eq!(record.questions[1].marks, Some(2));
        assert!(record.questions[0].options[0].is_correct);
        assert!(!record.questions[0].options[1].is_correct);
        assert!(record.questions[1].options[1].is_correct);
        assert!(record.questions.iter().all(|q| q.question_type == "mcq"));
    }

    #[tokio::test]
    async fn generate_retrieves_context_and_reports_cost() {
        let provider = Arc::new(ScriptedProvider {
            reply: REPLY.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = QuizGenerator::new(
            provider.clone(),
            Arc::new(InMemoryVectorStore::new()),
            &RagConfig {
                top_k: 1,
                ..RagConfig::default()
            },
        );
        let pages = vec![
            "A flip flop stores a single bit of state.".to_string(),
            "An AND gate outputs 1 only when all inputs are 1.".to_string(),
        ];
        assert_eq!(generator.index(&pages, &TextSplitter::new(100, 50)).await.unwrap(), 2);

        let generated = generator
            .generate(&request(2, 5), GenerationMode::RagPlusLlm)
            .await
            .unwrap();
        assert_eq!(generated.quiz.questions.len(), 2);
        assert_eq!(generated.source_pages, vec![2]);
        assert_eq!(generated.cost.total_tokens, 1200);
        assert!(generated.cost.cost_usd > 0.0);

        let prompts = provider.prompts.lock();
        assert!(prompts[0].contains("(Page 2) An AND gate"));
        assert!(!prompts[0].contains("flip flop"));
    }

    #[tokio::test]
    async fn rag_only_prompt_restricts_to_context() {
        let provider = Arc::new(ScriptedProvider {
            reply: REPLY.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = QuizGenerator::new(
            provider.clone(),
            Arc::new(InMemoryVectorStore::new()),
            &RagConfig::default(),
        );
        generator
            .index(&["Logic gates combine inputs.".to_string()], &TextSplitter::new(100, 50))
            .await
            .unwrap();

        let generated = generator
            .generate(&request(2, 2), GenerationMode::RagOnly)
            .await
            .unwrap();
        assert_eq!(generated.mode, GenerationMode::RagOnly);
        assert!(provider.prompts.lock()[0].starts_with("Use ONLY the following context"));
    }

    #[tokio::test]
    async fn empty_corpus_cannot_be_indexed() {
        let provider = Arc::new(ScriptedProvider {
            reply: String::new(),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = QuizGenerator::new(
            provider,
            Arc::new(InMemoryVectorStore::new()),
            &RagConfig::default(),
        );
        assert!(generator
            .index(&["\u{2022}\u{2022}".to_string()], &TextSplitter::new(100, 50))
            .await
            .is_err());
    }
}
