use std::path::PathBuf;

use {
    anyhow::Result,
    clap::{Subcommand, ValueEnum},
    edulift_client::ApiClient,
    serde_json::Value,
};

use crate::request_commands::read_body;

#[derive(Clone, Copy, ValueEnum)]
pub enum Assessment {
    Career,
    Talent,
}

#[derive(Subcommand)]
pub enum AssessAction {
    /// Submit a completed assessment (JSON file) and print the analysis.
    Analyze {
        #[arg(value_enum)]
        kind: Assessment,
        /// JSON file with the assessment answers.
        file: PathBuf,
    },
    /// List careers known to the guidance engine.
    Careers,
    /// List skills used by career guidance.
    Skills,
    /// List talent areas.
    TalentAreas,
    /// Print the aptitude question bank.
    AptitudeQuestions,
    /// List the multiple-intelligence types.
    IntelligenceTypes,
    /// Show test results, optionally for a single test.
    Results {
        #[arg(long)]
        test: Option<String>,
    },
    /// Aggregate analytics across all tests.
    Analytics,
}

pub async fn handle_assess(client: &ApiClient, action: AssessAction) -> Result<()> {
    let value = match action {
        AssessAction::Analyze { kind, file } => {
            let answers = read_body(&file)?;
            match kind {
                Assessment::Career => client.career_guidance().analyze(&answers).await?,
                Assessment::Talent => client.talent().analyze(&answers).await?,
            }
        },
        AssessAction::Careers => client.career_guidance().careers().await?,
        AssessAction::Skills => client.career_guidance().skills().await?,
        AssessAction::TalentAreas => client.talent().talent_areas().await?,
        AssessAction::AptitudeQuestions => client.talent().aptitude_questions().await?,
        AssessAction::IntelligenceTypes => client.talent().intelligence_types().await?,
        AssessAction::Results { test: Some(id) } => client.test_management().result(&id).await?,
        AssessAction::Results { test: None } => client.test_management().results().await?,
        AssessAction::Analytics => client.test_management().analytics().await?,
    };
    print_json(&value)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
