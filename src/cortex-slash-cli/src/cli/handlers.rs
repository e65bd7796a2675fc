//! Command execution handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use cortex_slash_commands::{
    CommandInfo, CommandRegistry, ExecutionError, ExecutionResult, Executor, RegistrySnapshot,
    SlashCommandConfig, format_command, parse_invocation,
};

use super::args::{Cli, Commands, ListArgs, RunArgs, ShowArgs};

/// Dispatch the parsed command.
pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let config = load_config(&cli).await?;
    let (registry, executor) = build_pipeline(&config).await?;

    match cli.command {
        Commands::List(args) => run_list(&registry, args),
        Commands::Show(args) => run_show(&executor, args),
        Commands::Run(args) => run_invocation(&executor, args).await,
    }
}

/// Process exit code for a failed command.
///
/// Execution errors map to their own codes; anything else exits with 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ExecutionError>()
        .map(ExecutionError::exit_code)
        .unwrap_or(1)
}

/// Load the config file, then apply command-line overrides.
pub async fn load_config(cli: &Cli) -> Result<SlashCommandConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            SlashCommandConfig::load(path).await?
        }
        None => SlashCommandConfig::load_default().await?,
    };

    apply_overrides(&mut config, cli);
    debug!("Effective config: {:?}", config);
    Ok(config)
}

pub fn apply_overrides(config: &mut SlashCommandConfig, cli: &Cli) {
    if let Some(dir) = &cli.project_dir {
        config.project_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.user_dir {
        config.user_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.working_dir {
        config.working_dir = Some(dir.clone());
    }
    if let Some(secs) = cli.timeout {
        config.bash_timeout_secs = secs;
    }
}

/// Discover commands and build an executor over them.
pub async fn build_pipeline(
    config: &SlashCommandConfig,
) -> Result<(Arc<CommandRegistry>, Executor)> {
    let registry = Arc::new(CommandRegistry::new());
    registry
        .reload(&config.build_loader())
        .await
        .context("Failed to load commands")?;

    let executor = config.build_executor(registry.clone());
    Ok((registry, executor))
}

fn run_list(registry: &CommandRegistry, args: ListArgs) -> Result<()> {
    let snapshot = registry.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&list_json(&snapshot))?);
    } else {
        let commands = command_infos(&snapshot);
        print!("{}", format_list(&commands));
    }
    Ok(())
}

fn command_infos(snapshot: &RegistrySnapshot) -> Vec<CommandInfo> {
    snapshot
        .list()
        .iter()
        .map(|cmd| CommandInfo::from(cmd.as_ref()))
        .collect()
}

/// JSON listing: registry generation, load time, then the commands.
pub fn list_json(snapshot: &RegistrySnapshot) -> serde_json::Value {
    serde_json::json!({
        "version": snapshot.version(),
        "loaded_at": snapshot.loaded_at().to_rfc3339(),
        "commands": command_infos(snapshot),
    })
}

fn run_show(executor: &Executor, args: ShowArgs) -> Result<()> {
    let spec = args.name.trim_start_matches('/');
    let (namespace, name) = match spec.split_once(':') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, spec),
    };

    let Some(info) = executor.command_info(name, namespace) else {
        return Err(ExecutionError::NotFound {
            name: spec.to_string(),
            namespace: namespace.map(str::to_string),
            available: executor.list_names(),
        }
        .into());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", format_info(&info));
    }
    Ok(())
}

async fn run_invocation(executor: &Executor, args: RunArgs) -> Result<()> {
    let line = args.invocation_line();
    let Some(invocation) = parse_invocation(&line) else {
        return Err(ExecutionError::InvalidInvocation(line).into());
    };

    let result = executor
        .execute_full(
            &invocation.name,
            &invocation.args,
            invocation.namespace.as_deref(),
            !args.raw,
        )
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for line in result_notes(&result) {
        eprintln!("{line}");
    }
    println!("{}", result.prompt);
    Ok(())
}

/// One line per command: invocation form, then description.
pub fn format_list(commands: &[CommandInfo]) -> String {
    if commands.is_empty() {
        return "No commands found.\n".to_string();
    }

    let entries: Vec<(String, &CommandInfo)> = commands
        .iter()
        .map(|info| (format_command(&qualified(info), &info.hints), info))
        .collect();
    let width = entries.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (usage, info) in entries {
        out.push_str(&format!(
            "{usage:<width$}  {} [{}]\n",
            info.description, info.scope
        ));
    }
    out
}

pub fn format_info(info: &CommandInfo) -> String {
    let mut out = format!("/{}\n", qualified(info));
    out.push_str(&format!("  description: {}\n", info.description));
    out.push_str(&format!("  scope:       {}\n", info.scope));
    if let Some(hint) = &info.argument_hint {
        out.push_str(&format!("  arguments:   {hint}\n"));
    }
    if !info.hints.is_empty() {
        out.push_str(&format!("  uses:        {}\n", info.hints.join(" ")));
    }
    if !info.allowed_tools.is_empty() {
        out.push_str(&format!("  tools:       {}\n", info.allowed_tools.join(", ")));
        out.push_str(&format!("  bash:        {}\n", info.bash_access));
    }
    if let Some(model) = &info.model {
        out.push_str(&format!("  model:       {model}\n"));
    }
    if info.requires_approval {
        out.push_str("  approval:    required\n");
    }
    out.push_str(&format!("  source:      {}\n", info.source_path.display()));
    out
}

/// Warnings and approval notes printed to stderr next to the prompt.
pub fn result_notes(result: &ExecutionResult) -> Vec<String> {
    let mut notes: Vec<String> = result
        .warnings
        .iter()
        .map(|w| format!("warning: {w}"))
        .collect();

    if result.requires_approval {
        notes.push(match &result.approval_message {
            Some(message) => format!("approval required: {message}"),
            None => "approval required".to_string(),
        });
    }
    if let Some(model) = &result.model_override {
        notes.push(format!("model: {model}"));
    }
    notes
}

fn qualified(info: &CommandInfo) -> String {
    match &info.namespace {
        Some(ns) => format!("{ns}:{}", info.name),
        None => info.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use cortex_slash_commands::{CommandDefinition, CommandMetadata, CommandStore, Scope};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn info(name: &str, namespace: Option<&str>) -> CommandInfo {
        CommandInfo {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            scope: Scope::Project,
            description: format!("Describe {name}"),
            allowed_tools: Vec::new(),
            bash_access: "no bash commands allowed".to_string(),
            argument_hint: None,
            model: None,
            requires_approval: false,
            source_path: PathBuf::from(format!("/cmds/{name}.md")),
            hints: Vec::new(),
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "cortex-slash",
            "--working-dir",
            "/work/src",
            "--timeout",
            "7",
            "list",
        ])
        .expect("should parse");

        let mut config = SlashCommandConfig {
            working_dir: Some(PathBuf::from("/elsewhere")),
            ..Default::default()
        };
        apply_overrides(&mut config, &cli);

        assert_eq!(config.working_dir, Some(PathBuf::from("/work/src")));
        assert_eq!(config.bash_timeout_secs, 7);
        assert_eq!(config.project_dir, None);
    }

    #[test]
    fn test_format_list_aligns_columns() {
        let mut review = info("review", None);
        review.hints = vec!["$1".to_string()];
        let out = format_list(&[review, info("commit", Some("git"))]);

        assert_eq!(
            out,
            "/review $1   Describe review [project]\n/git:commit  Describe commit [project]\n"
        );
        assert_eq!(format_list(&[]), "No commands found.\n");
    }

    #[test]
    fn test_format_info() {
        let mut cmd = info("deploy", None);
        cmd.requires_approval = true;
        cmd.model = Some("gpt-4o".to_string());

        let out = format_info(&cmd);
        assert!(out.starts_with("/deploy\n"));
        assert!(out.contains("approval:    required"));
        assert!(out.contains("model:       gpt-4o"));
        assert!(out.contains("source:      /cmds/deploy.md"));
    }

    #[test]
    fn test_exit_code_per_error_kind() {
        let not_found = anyhow::Error::from(ExecutionError::NotFound {
            name: "deploy".to_string(),
            namespace: None,
            available: Vec::new(),
        });
        let depth = anyhow::Error::from(ExecutionError::DepthExceeded { max: 5 });
        let invalid = anyhow::Error::from(ExecutionError::InvalidInvocation("x".to_string()));
        let other = anyhow::anyhow!("Config file not found: /nope.toml");

        assert_eq!(exit_code(&not_found), 2);
        assert_eq!(exit_code(&depth), 3);
        assert_eq!(exit_code(&invalid), 4);
        assert_eq!(exit_code(&other), 1);
    }

    #[test]
    fn test_list_json_carries_snapshot_details() {
        let registry = CommandRegistry::new();
        registry.replace([CommandDefinition::new(
            "review",
            CommandMetadata {
                description: "Review code".to_string(),
                ..Default::default()
            },
            "Review $1",
            PathBuf::from("/cmds/review.md"),
        )]);

        let value = list_json(&registry.snapshot());

        assert_eq!(value["version"], 1);
        assert!(value["loaded_at"].as_str().is_some_and(|s| s.contains('T')));
        assert_eq!(value["commands"][0]["name"], "review");
        assert_eq!(value["commands"][0]["description"], "Review code");
    }

    #[test]
    fn test_result_notes() {
        let result = ExecutionResult {
            warnings: vec!["File not found: @x".to_string()],
            requires_approval: true,
            approval_message: Some("Touches prod".to_string()),
            ..Default::default()
        };

        assert_eq!(
            result_notes(&result),
            vec![
                "warning: File not found: @x".to_string(),
                "approval required: Touches prod".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_build_pipeline_and_render() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let commands = project.path().join(".cortex/commands");
        std::fs::create_dir_all(&commands).unwrap();
        std::fs::write(
            commands.join("hello.md"),
            "---\ndescription: Hello\n---\nHello $ARGUMENTS",
        )
        .unwrap();

        let config = SlashCommandConfig {
            project_dir: Some(project.path().to_path_buf()),
            user_dir: Some(user.path().to_path_buf()),
            ..Default::default()
        };
        let (registry, executor) = build_pipeline(&config).await.unwrap();

        assert_eq!(registry.list_names(), vec!["hello (project)".to_string()]);
        let result = executor
            .execute_full("hello", "world", None, false)
            .await
            .unwrap();
        assert_eq!(result.prompt, "Hello world");
    }
}
