#![forbid(unsafe_code)]

mod catalog;
mod cli;
mod config;
mod db;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use learn_core::model::{
    Answers, CompletionRecord, LabId, NarrationAck, StageName, Verdict, XpAward,
};
use serde::Serialize;
use services::{AppServices, Clock, LabDefinition, LabError, LabRunner, NarrationPacer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::db::{normalize_sqlite_url, prepare_sqlite_file};

const RECENT_AWARDS: u32 = 10;

/// Stands in for the speech engine: prints the message and waits roughly as
/// long as it would take to say it.
struct Narrator {
    pacer: NarrationPacer,
    timeout: Option<Duration>,
}

impl Narrator {
    async fn speak(&self, run: &mut LabRunner) -> NarrationAck<StageName> {
        if let Some(text) = run.narration() {
            let wait = self.pacer.capped(text, self.timeout);
            println!("[{}] {text}", run.stage());
            tokio::time::sleep(wait).await;
        }
        run.narration_finished()
    }
}

#[derive(Serialize)]
struct ProgressReport {
    total_xp: u64,
    completions: Vec<CompletionRecord>,
    recent_awards: Vec<XpAward>,
}

fn parse_answers(raw: &str) -> Answers {
    raw.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(i, choice)| (i, choice.to_owned()))
        .collect()
}

async fn walk_to(run: &mut LabRunner, target: &StageName, narrator: &Narrator) -> Result<()> {
    while run.stage() != target {
        let Some(next) = run.controller().graph().successor(run.stage()).cloned() else {
            bail!("stage {target} is not ahead of {}", run.stage());
        };
        let text = format!("Next step: {next}.");
        run.advance(next, text)?;
        narrator.speak(run).await;
    }
    Ok(())
}

async fn run_lab(
    services: &AppServices,
    definition: std::sync::Arc<LabDefinition>,
    answer_sets: &[String],
    narrator: &Narrator,
) -> Result<()> {
    let quiz_stage = definition.quiz_stage().clone();
    let mut run = services.start_lab(definition).await;
    if run.already_completed() {
        println!("You have completed this lab before; replays earn reduced XP.");
    }
    narrator.speak(&mut run).await;
    walk_to(&mut run, &quiz_stage, narrator).await?;

    if answer_sets.is_empty() {
        println!(
            "Quiz has {} question(s). Pass --answers to submit.",
            run.definition().answer_key().len()
        );
        return Ok(());
    }

    for (attempt, raw) in answer_sets.iter().enumerate() {
        if run.quiz().is_terminal() {
            warn!(skipped = answer_sets.len() - attempt, "quiz closed, extra answers ignored");
            break;
        }
        match run.submit_quiz(parse_answers(raw)).await {
            Ok(_) => {}
            Err(LabError::Progress(err)) => {
                warn!(error = %err, "recording the award failed, retrying once");
                run.finalize_award().await?;
            }
            Err(err) => return Err(err.into()),
        }
        narrator.speak(&mut run).await;
    }

    match run.quiz().verdict() {
        Verdict::Correct => {
            if !run.is_finished() {
                run.advance_to_next("Lab complete. Great work!")?;
                narrator.speak(&mut run).await;
            }
        }
        Verdict::IncorrectFinal => {
            println!("Review the answers above and run the lab again.");
        }
        Verdict::Undetermined => {
            println!("One attempt left. Run again with another --answers.");
        }
    }
    Ok(())
}

async fn print_progress(services: &AppServices, json: bool) -> Result<()> {
    let progress = services.progress();
    let snapshot = progress.snapshot().await;
    let recent_awards = progress.recent_awards(None, RECENT_AWARDS).await?;
    let report = ProgressReport {
        total_xp: snapshot.total_xp,
        completions: snapshot.records,
        recent_awards,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Total XP: {}", report.total_xp);
    if report.completions.is_empty() {
        println!("No labs completed yet.");
    }
    for record in &report.completions {
        println!(
            "  {:<24} score {:>3}  xp {:>3}  runs {:>2}  last {}s",
            record.lab_id().as_str(),
            record.score().value(),
            record.xp_earned(),
            record.times_completed(),
            record.time_spent_secs(),
        );
    }
    Ok(())
}

async fn print_labs(services: &AppServices, catalog: &Catalog) {
    let progress = services.progress();
    for lab in catalog.iter() {
        let mark = if progress.is_completed(lab.lab_id()).await { "x" } else { " " };
        println!(
            "[{mark}] {:<24} {} ({} stages, {} questions)",
            lab.lab_id().as_str(),
            lab.title(),
            lab.stages().len(),
            lab.answer_key().len(),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let AppConfig {
        xp,
        labs,
        narration_timeout_ms,
    } = AppConfig::load(cli.config.as_deref())?;
    let policy = xp.validate().context("invalid xp policy")?;
    let catalog = Catalog::load(labs)?;
    let narrator = Narrator {
        pacer: NarrationPacer::default(),
        timeout: cli
            .narration_timeout_ms
            .or(narration_timeout_ms)
            .map(Duration::from_millis),
    };

    // Open + migrate SQLite here so the library crates never touch the filesystem.
    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system(), policy)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    info!(%db_url, "progress store ready");

    match cli.command {
        Commands::Run { lab_id, answers } => {
            let id = LabId::new(lab_id)?;
            let Some(definition) = catalog.get(&id) else {
                bail!("unknown lab {id}; see `labctl labs`");
            };
            run_lab(&services, definition, &answers, &narrator).await?;
        }
        Commands::Progress { json } => print_progress(&services, json).await?,
        Commands::Labs => print_labs(&services, &catalog).await,
    }
    Ok(())
}
