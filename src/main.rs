use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use lms_server::api::{self, AppState};
use lms_server::config::AppConfig;
use lms_server::database::models::UserFilter;
use lms_server::database::Database;
use lms_server::llm::{GenerationMode, QuizGenerator, QuizRequest};
use lms_server::providers::traits::CompletionProvider;
use lms_server::providers::OpenAIProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Overrides DATABASE_PATH
    #[arg(long)]
    database: Option<String>,

    /// Overrides RAG_CORPUS_PATH
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Generate one quiz on TOPIC, print it and exit
    #[arg(long, value_name = "TOPIC")]
    generate_quiz: Option<String>,

    #[arg(long, default_value = "10")]
    num_questions: u32,

    #[arg(long, default_value = "10")]
    total_marks: u32,

    #[arg(long)]
    rag_only: bool,

    /// Print stored users and courses, then exit
    #[arg(long)]
    inspect: bool,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    colored::control::set_override(true);
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = &args.database {
        config.database_path = path.clone();
    }
    if let Some(corpus) = &args.corpus {
        config.rag.corpus_path = Some(corpus.clone());
    }

    let db = Database::new(&config.database_path).await?;

    let provider: Option<Arc<dyn CompletionProvider>> = match OpenAIProvider::new(&config.provider) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!("Quiz generation disabled: {}", e);
            None
        }
    };

    if args.inspect {
        return inspect(&db).await;
    }

    if let Some(topic) = &args.generate_quiz {
        let provider = provider.ok_or("OPENAI_API_KEY must be set to generate quizzes")?;
        return generate_once(&args, topic, provider, &config).await;
    }

    run_api_server(db, provider, config).await
}

async fn run_api_server(
    db: Database,
    provider: Option<Arc<dyn CompletionProvider>>,
    config: AppConfig,
) -> Result<(), BoxError> {
    let addr = ("0.0.0.0", config.port);
    let state = AppState::new(db, provider, config.rag);
    let app = api::create_api(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to port {}: {}", config.port, e))?;

    info!("LMS server listening on {}", listener.local_addr()?);
    println!("{}", format!("Ready on port {}", config.port).green());

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

async fn generate_once(
    args: &Args,
    topic: &str,
    provider: Arc<dyn CompletionProvider>,
    config: &AppConfig,
) -> Result<(), BoxError> {
    let request = QuizRequest {
        topic: topic.trim().to_string(),
        num_questions: args.num_questions,
        total_marks: args.total_marks,
    };
    request.validate()?;

    let mode = if args.rag_only {
        GenerationMode::RagOnly
    } else {
        GenerationMode::RagPlusLlm
    };

    println!("{}", "Indexing corpus...".yellow());
    let generator = QuizGenerator::from_config(provider, &config.rag).await?;
    let generated = generator.generate(&request, mode).await?;

    println!("\n{}", generated.quiz.title.bold().cyan());
    for (i, question) in generated.quiz.questions.iter().enumerate() {
        println!("\n{}. {}", i + 1, question.question.bold());
        for option in &question.options {
            if *option == question.correct_answer {
                println!("   {} {}", "✔".green(), option.green());
            } else {
                println!("   - {}", option);
            }
        }
    }

    let cost = &generated.cost;
    println!(
        "\n{} {} | {} prompt + {} completion tokens | ${:.6} | {:.2}s",
        "Model:".dimmed(),
        cost.model_name,
        cost.prompt_tokens,
        cost.completion_tokens,
        cost.cost_usd,
        cost.latency_secs
    );
    println!("{} {:?}", "Source pages:".dimmed(), generated.source_pages);
    Ok(())
}

async fn inspect(db: &Database) -> Result<(), BoxError> {
    println!("{}", "--- Users ---".bold());
    let users = db.list_users(UserFilter::default()).await?;
    if users.is_empty() {
        println!("No users found.");
    }
    for user in users {
        println!("ID: {}, Name: {}, Role: {}", user.id, user.name, user.role);
    }

    println!("\n{}", "--- Courses ---".bold());
    let courses = db.list_courses(None).await?;
    if courses.is_empty() {
        println!("No courses found.");
    }
    for course in courses {
        println!("ID: {}, Name: {}", course.id, course.name);
    }
    Ok(())
}
