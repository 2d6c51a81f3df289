use std::fmt;

use inquire::{Select, Text};
use serde::Serialize;

use super::credentials::load_credentials;
use super::http_client::ApiClient;
use crate::server::dto::{ProjectDetail, ProjectSummary, SOURCE_PRESETS, TrackingLink};
use crate::types::Project;

#[derive(Serialize)]
struct CreateProjectBody {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    slug: Option<String>,
}

struct ProjectChoice(ProjectSummary);

impl fmt::Display for ProjectChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.project.name, self.0.project.slug)
    }
}

fn pick_project(client: &ApiClient, project_id: Option<String>) -> anyhow::Result<String> {
    if let Some(id) = project_id {
        return Ok(id);
    }

    let projects: Vec<ProjectSummary> = client.get("/projects")?;
    if projects.is_empty() {
        anyhow::bail!("No projects found. Create one with 'waitlist project new'.");
    }

    let choices: Vec<ProjectChoice> = projects.into_iter().map(ProjectChoice).collect();
    let selected = Select::new("Select project:", choices).prompt()?;
    Ok(selected.0.project.id)
}

pub fn run_project_list(json: bool) -> anyhow::Result<()> {
    let creds = load_credentials()?;
    let client = ApiClient::new(&creds)?;

    let projects: Vec<ProjectSummary> = client.get("/projects")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    println!();
    for summary in &projects {
        let last = summary
            .last_signup
            .as_ref()
            .map(|l| format!(", last from {} {}", l.source, l.ago))
            .unwrap_or_default();
        println!(
            "  {}  {}  {} signups{}",
            summary.project.name, summary.public_path, summary.signup_count, last
        );
        println!("    id: {}", summary.project.id);
    }
    println!();

    Ok(())
}

pub fn run_project_new(
    name: Option<String>,
    slug: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let creds = load_credentials()?;
    let client = ApiClient::new(&creds)?;

    let name = match name {
        Some(n) => n,
        None if non_interactive => anyhow::bail!("--name is required in non-interactive mode"),
        None => Text::new("Project name:").prompt()?,
    };

    let project: Project = client.post("/projects", &CreateProjectBody { name, slug })?;

    println!();
    println!("Created project '{}'", project.name);
    println!("  id:   {}", project.id);
    println!("  page: {}/p/{}", client.base_url(), project.slug);
    println!();

    Ok(())
}

pub fn run_project_stats(project_id: Option<String>, json: bool) -> anyhow::Result<()> {
    let creds = load_credentials()?;
    let client = ApiClient::new(&creds)?;

    let id = pick_project(&client, project_id)?;
    let detail: ProjectDetail = client.get(&format!("/projects/{id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let attribution = &detail.attribution;
    println!();
    println!("{} ({})", detail.project.name, detail.public_path);
    println!("  Total signups: {}", attribution.total);
    if !attribution.breakdown.is_empty() {
        println!();
        let width = attribution
            .breakdown
            .iter()
            .map(|c| c.source.len())
            .max()
            .unwrap_or(0);
        for entry in &attribution.breakdown {
            println!("  {:<width$}  {}", entry.source, entry.count);
        }
    }
    println!();

    Ok(())
}

pub fn run_project_link(project_id: Option<String>, src: Option<String>) -> anyhow::Result<()> {
    let creds = load_credentials()?;
    let client = ApiClient::new(&creds)?;

    let id = pick_project(&client, project_id)?;
    let src = match src {
        Some(s) => s,
        None => Select::new("Source:", SOURCE_PRESETS.to_vec())
            .prompt()?
            .to_string(),
    };

    let path = format!("/projects/{id}/link?src={}", urlencoding::encode(&src));
    let link: TrackingLink = client.get(&path)?;

    println!("{}", link.url);

    Ok(())
}
