//! Taskweave CLI - workflow synthesis and refinement

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use taskweave::error::{FixSuggestion, WeaveError};
use taskweave::validator::{GatewayValidator, LocalValidator, ValidationResult, WorkflowValidator};
use taskweave::{
    load_tasks, scaffold_workflow, ChainQuery, PermissionCheckConfig, RefinementEngine,
    ScaffoldOptions, TaskChain, TaskDefinition, WeaveConfig,
};

#[derive(Parser)]
#[command(name = "taskweave")]
#[command(about = "Taskweave - workflow synthesis and self-healing refinement")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List compatible task chains
    Chains {
        /// Task registry file or directory
        #[arg(short, long)]
        registry: PathBuf,

        /// Number of tasks per chain
        #[arg(short, long)]
        length: usize,

        /// First task of every chain
        #[arg(long)]
        from: Option<String>,

        /// Last task of every chain
        #[arg(long)]
        to: Option<String>,

        /// Stop after this many chains
        #[arg(long)]
        limit: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Generate a workflow from an ordered list of tasks
    Scaffold {
        #[arg(short, long)]
        registry: PathBuf,

        /// Comma-separated task names, in execution order
        #[arg(short, long, value_delimiter = ',', required = true)]
        tasks: Vec<String>,

        /// Workflow name (metadata.name)
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Permission-check task to run before every other step
        #[arg(long, requires_all = ["permission", "user_id_field"])]
        guard_task: Option<String>,

        #[arg(long, requires = "guard_task")]
        permission: Option<String>,

        /// Workflow input field holding the user id
        #[arg(long, requires = "guard_task")]
        user_id_field: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a workflow file offline
    Validate {
        /// Workflow YAML file
        file: PathBuf,

        #[arg(short, long)]
        registry: PathBuf,
    },

    /// Repair a workflow file until the validator accepts it
    Refine {
        /// Workflow YAML file
        file: PathBuf,

        #[arg(short, long)]
        registry: PathBuf,

        /// Override the configured iteration bound
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Gateway base URL (overrides config and WORKFLOW_GATEWAY_URL)
        #[arg(long, conflicts_with = "local")]
        gateway: Option<String>,

        /// Validate with the offline validator instead of the gateway
        #[arg(long)]
        local: bool,

        /// Write the final workflow to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Chains {
            registry,
            length,
            from,
            to,
            limit,
            json,
        } => list_chains(&registry, length, from, to, limit, json),
        Commands::Scaffold {
            registry,
            tasks,
            name,
            description,
            guard_task,
            permission,
            user_id_field,
            output,
        } => {
            let guard = match (guard_task, permission, user_id_field) {
                (Some(task), Some(permission), Some(field)) => {
                    Some(PermissionCheckConfig::new(task, permission, field))
                }
                _ => None,
            };
            scaffold(&registry, &tasks, name, description, guard, output.as_deref())
        }
        Commands::Validate { file, registry } => validate(&file, &registry),
        Commands::Refine {
            file,
            registry,
            max_iterations,
            gateway,
            local,
            output,
            json,
        } => {
            refine(
                &file,
                &registry,
                max_iterations,
                gateway,
                local,
                output.as_deref(),
                json,
            )
            .await
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.downcast_ref::<WeaveError>().and_then(|w| w.fix_suggestion()) {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

fn load_registry(path: &Path) -> anyhow::Result<Vec<TaskDefinition>> {
    let tasks = load_tasks(path)?;
    if tasks.is_empty() {
        tracing::warn!(path = %path.display(), "Task registry is empty");
    }
    Ok(tasks)
}

fn read_workflow(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_or_print(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn list_chains(
    registry: &Path,
    length: usize,
    from: Option<String>,
    to: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<bool> {
    let tasks = load_registry(registry)?;

    let mut query = ChainQuery::new(length);
    if let Some(first) = from {
        query = query.starting_with(first);
    }
    if let Some(last) = to {
        query = query.ending_with(last);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    let chains = query.run(&tasks);

    if json {
        let summary: Vec<_> = chains
            .iter()
            .map(|chain| {
                serde_json::json!({
                    "tasks": chain.task_names(),
                    "links": chain.links,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(true);
    }

    if chains.is_empty() {
        eprintln!("{} No compatible chains of length {}", "→".cyan(), length);
        return Ok(true);
    }
    for (i, chain) in chains.iter().enumerate() {
        println!("{:>3}. {}", i + 1, chain.task_names().join(" → "));
    }
    eprintln!("{} {} chain(s)", "→".cyan(), chains.len());
    Ok(true)
}

fn scaffold(
    registry: &Path,
    task_names: &[String],
    name: String,
    description: Option<String>,
    guard: Option<PermissionCheckConfig>,
    output: Option<&Path>,
) -> anyhow::Result<bool> {
    let registry = load_registry(registry)?;

    let tasks = task_names
        .iter()
        .map(|wanted| {
            registry
                .iter()
                .find(|t| &t.name == wanted)
                .cloned()
                .ok_or_else(|| WeaveError::UnknownTask {
                    name: wanted.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let chain = TaskChain::from_tasks(tasks)?;

    let mut options = ScaffoldOptions::new(name);
    if let Some(description) = description {
        options = options.description(description);
    }

    let mut workflow = scaffold_workflow(&chain, &options);
    if let Some(guard) = &guard {
        workflow = workflow.with_permission_check(guard);
    }

    write_or_print(output, &workflow.to_yaml()?)?;
    Ok(true)
}

fn print_result(result: &ValidationResult) {
    for error in &result.errors {
        match &error.code {
            Some(code) => eprintln!("  {} [{}] {}", "✗".red(), code, error.message),
            None => eprintln!("  {} {}", "✗".red(), error.message),
        }
    }
    for warning in &result.warnings {
        eprintln!("  {} {}", "!".yellow(), warning.message);
    }
}

fn validate(file: &Path, registry: &Path) -> anyhow::Result<bool> {
    let yaml = read_workflow(file)?;
    let tasks = load_registry(registry)?;

    let result = LocalValidator::new(&tasks).check(&yaml);
    if result.valid {
        println!("{} {} is valid", "✓".green(), file.display());
    } else {
        println!(
            "{} {} has {} error(s)",
            "✗".red(),
            file.display(),
            result.errors.len()
        );
    }
    print_result(&result);
    Ok(result.valid)
}

async fn refine(
    file: &Path,
    registry: &Path,
    max_iterations: Option<usize>,
    gateway: Option<String>,
    local: bool,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<bool> {
    let yaml = read_workflow(file)?;
    let tasks = load_registry(registry)?;

    let mut config = WeaveConfig::load()?.with_env();
    if let Some(url) = gateway {
        config.gateway.url = Some(url);
    }
    if let Some(max) = max_iterations {
        config.refine.max_iterations = max;
    }

    if config.refine.max_iterations == 0 {
        bail!("max iterations must be at least 1");
    }

    let validator: Arc<dyn WorkflowValidator> = if local {
        Arc::new(LocalValidator::new(&tasks))
    } else {
        Arc::new(GatewayValidator::new(&config.gateway)?)
    };

    eprintln!(
        "{} Refining {} with the {} validator (max {} iterations)",
        "→".cyan(),
        file.display(),
        validator.name().cyan().bold(),
        config.refine.max_iterations
    );

    let engine = RefinementEngine::with_config(validator, config.refine);
    let outcome = engine.refine_workflow(&yaml, &tasks, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if let Some(path) = output {
            write_or_print(Some(path), &outcome.yaml)?;
        }
    } else {
        for attempt in &outcome.history {
            eprintln!(
                "{} Iteration {}: {} error(s)",
                "→".cyan(),
                attempt.iteration,
                attempt.errors.len()
            );
            for fix in &attempt.fixes {
                eprintln!("    {} {}", "fix".green(), fix);
            }
        }
        write_or_print(output, &outcome.yaml)?;
    }

    if outcome.valid {
        eprintln!(
            "{} Valid after {} iteration(s)",
            "✓".green(),
            outcome.iterations
        );
    } else {
        eprintln!(
            "{} Stopped: {} ({} error(s) remain)",
            "✗".red(),
            outcome.termination_reason.to_string().red().bold(),
            outcome.errors.len()
        );
        for error in &outcome.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
    }

    Ok(outcome.valid)
}
