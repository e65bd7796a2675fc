//! End-to-end tests: commands on disk, loaded into a registry, rendered by
//! an executor.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cortex_slash_commands::{
    CommandLoader, CommandRegistry, CommandStore, ExecutionError, Executor, MAX_COMPOSITION_DEPTH,
    PROJECT_COMMANDS_DIR, SlashCommandConfig, TRUNCATION_MARKER, TemplateProcessor,
};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

struct Fixture {
    project: TempDir,
    user: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            project: TempDir::new().unwrap(),
            user: TempDir::new().unwrap(),
        }
    }

    fn project_command(&self, relative: &str, content: &str) {
        write(
            &self.project.path().join(PROJECT_COMMANDS_DIR).join(relative),
            content,
        );
    }

    fn user_command(&self, relative: &str, content: &str) {
        write(&self.user.path().join(relative), content);
    }

    fn loader(&self) -> CommandLoader {
        CommandLoader::new(self.project.path(), Some(self.user.path().to_path_buf()))
    }

    async fn executor(&self) -> (Arc<CommandRegistry>, Executor) {
        let registry = Arc::new(CommandRegistry::new());
        registry.reload(&self.loader()).await.unwrap();
        let executor = Executor::new(
            registry.clone(),
            TemplateProcessor::new(self.project.path()),
        );
        (registry, executor)
    }
}

#[tokio::test]
async fn test_positional_arguments() {
    let fixture = Fixture::new();
    fixture.project_command("args.md", "---\ndescription: Args\n---\n$1,$2,$3");

    let (_, executor) = fixture.executor().await;

    let prompt = executor.execute("args", "one two three", None).await.unwrap();
    assert_eq!(prompt, "one,two,three");
}

#[tokio::test]
async fn test_empty_arguments_leave_out_of_range_literal() {
    let fixture = Fixture::new();
    fixture.project_command("empty.md", "---\ndescription: Empty\n---\n$ARGUMENTS,$4");

    let (_, executor) = fixture.executor().await;

    let prompt = executor.execute("empty", "", None).await.unwrap();
    assert_eq!(prompt, ",$4");
}

#[tokio::test]
async fn test_fallback_defaults() {
    let fixture = Fixture::new();
    fixture.project_command(
        "fallback.md",
        "---\ndescription: Fallback\n---\n{{$1 or \"x\"}}",
    );

    let (_, executor) = fixture.executor().await;

    assert_eq!(executor.execute("fallback", "", None).await.unwrap(), "x");
    assert_eq!(executor.execute("fallback", "y", None).await.unwrap(), "y");
}

#[tokio::test]
async fn test_file_inclusion_from_project() {
    let fixture = Fixture::new();
    write(&fixture.project.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }");
    fixture.project_command(
        "review.md",
        "---\ndescription: Review\nargument-hint: <file>\n---\nReview this:\n@$1",
    );

    let (_, executor) = fixture.executor().await;
    let result = executor
        .execute_full("review", "src/lib.rs", None, true)
        .await
        .unwrap();

    assert_eq!(
        result.prompt,
        "Review this:\n```\n# src/lib.rs\npub fn answer() -> u32 { 42 }\n```"
    );
    assert_eq!(result.files_included, 1);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
#[cfg_attr(windows, ignore = "Unix shell commands not available on Windows")]
async fn test_shell_and_nested_namespaced_command() {
    let fixture = Fixture::new();
    fixture.user_command(
        "git/branch.md",
        "---\ndescription: Branch\nallowed-tools: [bash]\n---\nBranch: !`echo main`",
    );
    fixture.project_command(
        "status.md",
        "---\ndescription: Status\n---\nStatus report\n/git:branch",
    );

    let (_, executor) = fixture.executor().await;
    let result = executor.execute_full("status", "", None, true).await.unwrap();

    assert_eq!(result.prompt, "Status report\nBranch: main");
    assert_eq!(result.bash_commands_executed, 1);
}

#[tokio::test]
#[cfg_attr(windows, ignore = "Unix shell commands not available on Windows")]
async fn test_slow_shell_does_not_stall_other_executions() {
    let fixture = Fixture::new();
    fixture.project_command(
        "slow.md",
        "---\ndescription: Slow\nallowed-tools: [bash]\n---\n!`sleep 2 && echo done`",
    );
    fixture.project_command("fast.md", "---\ndescription: Fast\n---\nquick $1");

    let (_, executor) = fixture.executor().await;
    let start = Instant::now();

    let (slow, (fast, fast_elapsed)) = tokio::join!(
        executor.execute("slow", "", None),
        async {
            let prompt = executor.execute("fast", "reply", None).await;
            (prompt, start.elapsed())
        }
    );

    assert_eq!(fast.unwrap(), "quick reply");
    assert!(
        fast_elapsed < Duration::from_secs(1),
        "fast command took {fast_elapsed:?}"
    );
    assert_eq!(slow.unwrap(), "done");
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn test_shell_without_permission_is_left_with_warning() {
    let fixture = Fixture::new();
    fixture.project_command("date.md", "---\ndescription: Date\n---\nToday: !`date`");

    let (_, executor) = fixture.executor().await;
    let result = executor.execute_full("date", "", None, true).await.unwrap();

    assert_eq!(result.prompt, "Today: !`date`");
    assert_eq!(result.bash_commands_executed, 0);
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_circular_commands_bounded() {
    let fixture = Fixture::new();
    fixture.project_command("ping.md", "---\ndescription: Ping\n---\nping\n/pong");
    fixture.project_command("pong.md", "---\ndescription: Pong\n---\npong\n/ping");

    let (_, executor) = fixture.executor().await;
    let result = executor.execute_full("ping", "", None, true).await.unwrap();

    let lines: Vec<&str> = result.prompt.lines().collect();
    assert_eq!(lines.len(), MAX_COMPOSITION_DEPTH + 2);
    assert_eq!(lines[0], "ping");
    assert_eq!(lines[1], "pong");
    assert_eq!(lines.last().copied(), Some("/ping"));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("circular"));
}

#[tokio::test]
async fn test_budget_from_frontmatter() {
    let fixture = Fixture::new();
    let body = "word ".repeat(200);
    fixture.project_command(
        "long.md",
        &format!("---\ndescription: Long\nmax-chars: 100\n---\n{body}"),
    );

    let (_, executor) = fixture.executor().await;
    let result = executor.execute_full("long", "", None, true).await.unwrap();

    assert!(result.prompt.chars().count() <= 100);
    assert!(result.prompt.ends_with(TRUNCATION_MARKER));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("Content truncated: 999 →"));
}

#[tokio::test]
async fn test_project_shadows_user_and_unknown_lists_both_scopes() {
    let fixture = Fixture::new();
    fixture.project_command("deploy.md", "---\ndescription: Project deploy\n---\nproject");
    fixture.user_command("deploy.md", "---\ndescription: User deploy\n---\nuser");
    fixture.user_command("lint.md", "---\ndescription: Lint\n---\nlint");

    let (registry, executor) = fixture.executor().await;

    assert_eq!(executor.execute("deploy", "", None).await.unwrap(), "project");

    let err = executor.execute("missing", "", None).await.unwrap_err();
    assert!(matches!(err, ExecutionError::NotFound { .. }));
    assert_eq!(
        registry.list_names(),
        vec!["deploy (project)".to_string(), "lint (user)".to_string()]
    );
    assert!(err.to_string().contains("deploy (project), lint (user)"));
}

#[tokio::test]
async fn test_reload_picks_up_new_commands() {
    let fixture = Fixture::new();
    fixture.project_command("first.md", "---\ndescription: First\n---\nfirst");

    let (registry, executor) = fixture.executor().await;
    assert!(executor.execute("second", "", None).await.is_err());
    let version = registry.version();

    fixture.project_command("second.md", "---\ndescription: Second\n---\nsecond");
    let count = registry.reload(&fixture.loader()).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(registry.version(), version + 1);
    assert_eq!(executor.execute("second", "", None).await.unwrap(), "second");
}

#[tokio::test]
async fn test_malformed_command_does_not_block_others() {
    let fixture = Fixture::new();
    fixture.project_command("good.md", "---\ndescription: Good\n---\ngood");
    fixture.project_command("nodesc.md", "---\nmodel: x\n---\nbody");
    fixture.project_command("badtools.md", "---\ndescription: Bad\nallowed-tools: bash\n---\nbody");

    let (registry, _) = fixture.executor().await;

    assert_eq!(registry.len(), 1);
    assert!(registry.lookup("good", None).is_some());
}

#[tokio::test]
async fn test_config_builds_working_pipeline() {
    let fixture = Fixture::new();
    fixture.project_command("hello.md", "---\ndescription: Hello\n---\nhello $1");

    let config = SlashCommandConfig {
        project_dir: Some(fixture.project.path().to_path_buf()),
        user_dir: Some(fixture.user.path().to_path_buf()),
        ..Default::default()
    };
    let registry = Arc::new(CommandRegistry::new());
    registry.reload(&config.build_loader()).await.unwrap();
    let executor = config.build_executor(registry);

    assert_eq!(executor.execute("hello", "there", None).await.unwrap(), "hello there");
}
