//! Registry commands: list, create, import, remove, restore

use std::path::PathBuf;

use anyhow::{Context, Result};

use devdeck_core::lifecycle::{CreateRequest, Launcher};
use devdeck_core::model::ProjectConfig;
use devdeck_core::storage::KeyValueStore;

use crate::detect::detect_project;

fn print_project_row(project: &ProjectConfig, origin: &str) {
    println!(
        "  {:<20} {:<24} :{:<6} :{:<6} {}",
        project.id, project.name, project.frontend.port, project.backend.port, origin
    );
}

pub fn run_list<S: KeyValueStore>(launcher: &Launcher<S>) -> Result<()> {
    let projects = launcher.projects();
    if projects.is_empty() {
        println!("No projects registered. Use `devdeck create` or `devdeck import`.");
        return Ok(());
    }

    println!(
        "  {:<20} {:<24} {:<7} {:<7} {}",
        "ID", "NAME", "WEB", "API", "ORIGIN"
    );
    for project in &projects {
        let origin = if launcher.is_default(&project.id) {
            "built-in"
        } else {
            "custom"
        };
        print_project_row(project, origin);
    }

    let hidden = launcher.removed_defaults();
    if !hidden.is_empty() {
        println!("\n{} built-in project(s) hidden; see `devdeck removed`", hidden.len());
    }
    Ok(())
}

pub fn run_ports<S: KeyValueStore>(launcher: &Launcher<S>) -> Result<()> {
    let ports = launcher.next_ports();
    println!("frontend: {}", ports.frontend);
    println!("backend:  {}", ports.backend);
    Ok(())
}

pub fn run_removed<S: KeyValueStore>(launcher: &Launcher<S>) -> Result<()> {
    let removed = launcher.removed_defaults();
    if removed.is_empty() {
        println!("No built-in projects are hidden.");
        return Ok(());
    }
    for id in removed {
        println!("  {}  (restore with `devdeck restore {}`)", id, id);
    }
    Ok(())
}

pub async fn run_create<S: KeyValueStore>(
    launcher: &mut Launcher<S>,
    name: String,
    path: PathBuf,
    description: String,
) -> Result<()> {
    println!("Creating project...");
    let project = launcher
        .create_project(CreateRequest {
            name,
            description,
            path,
        })
        .await
        .context("failed to create project")?;

    println!("\nCreated: {} ({})", project.name, project.id);
    println!("  frontend  {}  :{}", project.frontend.path, project.frontend.port);
    println!("  backend   {}  :{}", project.backend.path, project.backend.port);
    println!("\nNext steps:");
    println!("  1. Install dependencies (npm install, pip install -r requirements.txt)");
    println!("  2. Run `devdeck up {}`", project.id);
    Ok(())
}

pub fn run_import<S: KeyValueStore>(
    launcher: &mut Launcher<S>,
    path: PathBuf,
    name: Option<String>,
    description: String,
) -> Result<()> {
    let path = std::fs::canonicalize(&path).unwrap_or(path);
    let detected = detect_project(&path)?;

    println!("Scanning {}...", path.display());
    println!(
        "  frontend: {}",
        describe(detected.has_frontend, detected.frontend_port)
    );
    println!(
        "  backend:  {}",
        describe(detected.has_backend, detected.backend_port)
    );

    let project = launcher
        .import_project(detected.into_request(name, description))
        .context("failed to import project")?;
    println!(
        "\nImported: {} ({}) on :{} / :{}",
        project.name, project.id, project.frontend.port, project.backend.port
    );
    Ok(())
}

fn describe(found: bool, port: Option<u16>) -> String {
    match (found, port) {
        (false, _) => "not found".into(),
        (true, Some(port)) => format!("found (port {})", port),
        (true, None) => "found (port will be allocated)".into(),
    }
}

pub fn run_remove<S: KeyValueStore>(launcher: &mut Launcher<S>, id: &str) -> Result<()> {
    let existed = launcher.project(id).is_ok();
    let built_in = launcher.is_default(id);
    launcher.remove_project(id)?;

    match (existed, built_in) {
        (false, _) => println!("No project '{}' to remove.", id),
        (true, true) => println!(
            "Hid built-in project '{}' (restore with `devdeck restore {}`)",
            id, id
        ),
        (true, false) => println!("Removed '{}'", id),
    }
    Ok(())
}

pub fn run_restore<S: KeyValueStore>(launcher: &mut Launcher<S>, id: &str) -> Result<()> {
    launcher.restore_default(id)?;
    println!("Restored '{}'", id);
    Ok(())
}
