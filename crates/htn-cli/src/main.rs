//! HTN domain tool.
//!
//! - `htn validate` - load a domain file and run offline validation
//! - `htn domain` - print the task tree under a root
//! - `htn plan` - plan once against a blackboard given on the command line
//! - `htn run` - simulate agents for a number of ticks

mod stubs;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use ai_core::{BbValue, Blackboard, TickContext};
use ai_htn::{
    describe_domain, describe_plan, DomainLoader, HtnConfig, HtnPlanner, HtnPlannerConfig,
    HtnSystem, Literal, TaskId, TaskRegistry,
};
use ai_tools::{shared_sink, TracingSink, TRACE_SINK};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "htn")]
#[command(about = "Validate, inspect and simulate HTN domains", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Orchestrator configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a domain file and check it for problems
    Validate {
        domain: PathBuf,
    },

    /// Print the task tree under a root task
    Domain {
        domain: PathBuf,

        /// Root task (defaults to the file's `root`)
        #[arg(long)]
        root: Option<String>,
    },

    /// Plan once and print the result
    Plan {
        domain: PathBuf,

        #[arg(long)]
        root: Option<String>,

        /// Blackboard entry, `key=value` (bool, integer, float or string)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Simulate agents for a number of ticks
    Run {
        domain: PathBuf,

        #[arg(long)]
        root: Option<String>,

        #[arg(long, default_value_t = 100)]
        ticks: u64,

        /// Seconds per tick
        #[arg(long, default_value_t = 0.1)]
        dt: f32,

        #[arg(long, default_value_t = 1)]
        agents: u32,

        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Forward trace events to the log
        #[arg(long)]
        trace: bool,
    },
}

struct Domain {
    registry: TaskRegistry,
    root: Option<String>,
}

impl Domain {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read domain file {}", path.display()))?;
        let doc = DomainLoader::parse(&text)
            .with_context(|| format!("Failed to parse domain file {}", path.display()))?;
        let registry = stubs::loader_for(&doc)
            .load(&doc)
            .with_context(|| format!("Failed to load domain file {}", path.display()))?;
        Ok(Self {
            registry,
            root: doc.root,
        })
    }

    fn root(&self, explicit: Option<String>) -> Result<TaskId> {
        match explicit.or_else(|| self.root.clone()) {
            Some(root) => Ok(TaskId::from(root)),
            None => bail!("no root task given and the domain file declares none"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HtnConfig::default(),
    };

    match cli.command {
        Commands::Validate { domain } => validate(&domain, &config),
        Commands::Domain { domain, root } => {
            let domain = Domain::load(&domain)?;
            let root = domain.root(root)?;
            print!("{}", describe_domain(&domain.registry, &root));
            Ok(())
        }
        Commands::Plan { domain, root, set } => plan_once(&domain, root, &set, &config),
        Commands::Run {
            domain,
            root,
            ticks,
            dt,
            agents,
            set,
            trace,
        } => simulate(&domain, root, &config, ticks, dt, agents, &set, trace),
    }
}

fn load_config(path: &Path) -> Result<HtnConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: HtnConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

fn validate(path: &Path, config: &HtnConfig) -> Result<()> {
    let domain = Domain::load(path)?;
    let problems = domain.registry.problems(config.validation_depth);
    if problems.is_empty() {
        tracing::info!(tasks = domain.registry.len(), "Domain is valid");
        return Ok(());
    }
    for problem in &problems {
        tracing::error!("{problem}");
    }
    bail!("{} problem(s) in {}", problems.len(), path.display())
}

fn plan_once(path: &Path, root: Option<String>, set: &[String], config: &HtnConfig) -> Result<()> {
    let domain = Domain::load(path)?;
    let root = domain.root(root)?;
    let blackboard = blackboard_from(set)?;

    let registry = Rc::new(domain.registry);
    let planner = HtnPlanner::new(registry.clone()).with_config(HtnPlannerConfig {
        max_tasks: config.max_tasks,
    });
    match planner.plan(&root, &blackboard)? {
        Some(plan) => print!("{}", describe_plan(&registry, &root, &plan)),
        None => println!("no plan"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    path: &Path,
    root: Option<String>,
    config: &HtnConfig,
    ticks: u64,
    dt: f32,
    agents: u32,
    set: &[String],
    trace: bool,
) -> Result<()> {
    let domain = Domain::load(path)?;
    let root = domain.root(root)?;
    let blackboard = blackboard_from(set)?;

    let mut system: HtnSystem<u32> = HtnSystem::new(Rc::new(domain.registry), config.clone());
    for agent in 0..agents {
        let mut bb = blackboard.clone();
        if trace {
            bb.set(TRACE_SINK, shared_sink(TracingSink))?;
        }
        system.add_agent_with(agent, config.agent(&root), bb);
    }

    tracing::info!(agents, ticks, dt, root = %root, "Starting simulation");

    let mut ctx = TickContext::new(dt, config.seed);
    for _ in 0..ticks {
        let report = system.update(&ctx);
        for (agent, err) in &report.faults {
            tracing::error!(agent, %err, "Agent disabled");
        }
        ctx = ctx.next();
    }

    for (agent, state) in system.agents() {
        let steps = state
            .plan()
            .map(|plan| plan.task_ids().join(", "))
            .unwrap_or_default();
        println!("agent {agent}: {:?} [{steps}]", state.state());
    }
    Ok(())
}

fn blackboard_from(entries: &[String]) -> Result<Blackboard> {
    let mut blackboard = Blackboard::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("expected KEY=VALUE, got `{entry}`");
        };
        let value: BbValue = parse_literal(value).to_value();
        blackboard.set_value(key.trim().to_string(), value)?;
    }
    Ok(blackboard)
}

fn parse_literal(text: &str) -> Literal {
    let text = text.trim();
    if let Ok(v) = text.parse::<bool>() {
        Literal::Bool(v)
    } else if let Ok(v) = text.parse::<i64>() {
        Literal::Int(v)
    } else if let Ok(v) = text.parse::<f64>() {
        Literal::Float(v)
    } else {
        Literal::Str(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_values_become_literals() {
        assert_eq!(parse_literal("true"), Literal::Bool(true));
        assert_eq!(parse_literal(" 42 "), Literal::Int(42));
        assert_eq!(parse_literal("0.5"), Literal::Float(0.5));
        assert_eq!(parse_literal("north gate"), Literal::Str("north gate".into()));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(blackboard_from(&["seen_enemy".to_string()]).is_err());
        let bb = blackboard_from(&["seen_enemy=true".to_string()]).unwrap();
        assert!(bb.contains_name("seen_enemy"));
    }

    #[test]
    fn bundled_domain_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("domains/guard.yaml");
        let domain = Domain::load(&path).unwrap();
        assert!(domain.registry.validate(64).is_ok());
        assert_eq!(domain.root(None).unwrap(), TaskId::new("guard"));
    }
}
