use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ActionError, ControllerEvent, HttpGateway, TestPhase, TutorController,
    UploadFile, Workflow,
};
use shared::domain::{Material, MaterialId, TestQuestion};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Study materials, questions and generated tests from the terminal")]
struct Args {
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    course_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks that the backend answers.
    Health,
    Materials,
    /// Uploads a PDF or text file, then lists the course materials.
    Upload { path: PathBuf },
    /// Asks one question about a material.
    Ask {
        material_id: String,
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Generates a test for a material and walks through it.
    Quiz { material_id: String },
    Analytics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(course_id) = args.course_id {
        settings.course_id = course_id;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Command::Health = args.command {
        let health = HttpGateway::new(settings.api_base()?).health().await?;
        println!("{}: {}", health.status, health.message);
        return Ok(());
    }

    let controller = TutorController::from_settings(&settings)?;
    log_events(&controller);

    match args.command {
        Command::Health => {}
        Command::Materials => {
            controller.init().await?;
            print_materials(&controller.materials().materials().await);
        }
        Command::Upload { path } => {
            let file = UploadFile::from_path(&path).await?;
            controller.switch_view(Workflow::Upload).await?;
            let receipt = controller.upload(file).await?;
            println!(
                "{} ({}, {} characters)",
                receipt.message, receipt.title, receipt.text_length
            );
            print_materials(&controller.materials().materials().await);
        }
        Command::Ask {
            material_id,
            question,
        } => {
            controller.select_material(MaterialId::new(material_id)).await;
            controller.switch_view(Workflow::Chat).await?;
            let answer = controller.ask(&question.join(" ")).await?;
            println!("{}", answer.content);
        }
        Command::Quiz { material_id } => {
            run_quiz(&controller, MaterialId::new(material_id)).await?
        }
        Command::Analytics => {
            let snapshot = controller.open_analytics().await?;
            println!("materials:      {}", snapshot.total_materials);
            println!("chat messages:  {}", snapshot.chat_history_count);
            println!("tests taken:    {}", snapshot.tests_count);
            println!("content:        {} KB", snapshot.content_kb());
        }
    }

    Ok(())
}

fn log_events(controller: &TutorController) {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::Failed { workflow, failure }) => {
                    warn!(workflow = %workflow, failure = %failure, "workflow failed");
                }
                Ok(event) => debug!(?event, "controller event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn print_materials(materials: &[Material]) {
    if materials.is_empty() {
        println!("no materials uploaded yet");
        return;
    }
    for material in materials {
        println!(
            "{:<24} {:>6} KB  {}  {}",
            material.id.as_str(),
            material.size_kb(),
            material.created_at.format("%Y-%m-%d %H:%M"),
            material.title
        );
    }
}

async fn run_quiz(controller: &TutorController, material_id: MaterialId) -> Result<()> {
    let total = controller.start_test(material_id).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let state = controller.test().state().await;
        if state.phase == TestPhase::Completed {
            break;
        }
        let Some(question) = state.current_question() else {
            break;
        };

        println!();
        println!("Question {}/{}: {}", state.current_index + 1, total, question.question);
        for (index, option) in question.options.iter().enumerate() {
            println!("  {}. {}", TestQuestion::option_label(index), option);
        }

        let Some(line) = lines.next_line().await? else {
            println!("quiz abandoned");
            return Ok(());
        };
        let Some(answer) = question.parse_option(&line) else {
            println!(
                "answer with a letter between A and {}",
                TestQuestion::option_label(question.options.len().saturating_sub(1))
            );
            continue;
        };

        controller.select_answer(answer).await?;
        match controller.submit_answer().await {
            Ok(result) => {
                let verdict = if result.is_correct { "correct" } else { "incorrect" };
                println!("{verdict}: {}", result.feedback);
            }
            Err(err @ ActionError::Gateway(_)) => {
                println!("{}; answer again to retry", err.failure());
            }
            Err(err) => return Err(err.into()),
        }
    }

    let (correct, answered) = controller.test().state().await.score();
    println!();
    println!("score: {correct}/{answered}");
    Ok(())
}
