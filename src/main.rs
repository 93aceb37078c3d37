//! Purpose: `gradebook` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout (pretty on a terminal, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All table access goes through `api::Gradebook` (locks + atomic rewrites).
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use gradebook::api::{Error, ErrorKind, FieldUpdate, default_data_dir, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `gradebook --help` for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let config = gradebook::api::Config::new(cli.dir.unwrap_or_else(default_data_dir))
        .with_strict_fields(cli.strict);

    command_dispatch::dispatch_command(cli.command, config)
        .map_err(add_storage_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "gradebook",
    version,
    about = "Student, course, professor, grade and login records in plain CSV tables",
    long_about = None,
    after_help = r#"EXAMPLES
  $ gradebook course add DATA200 --name "Data Science" --credits 3
  $ gradebook student add --email ada@sjsu.edu --first Ada --last Lovelace \
      --course DATA200 --grade A --marks 91.5
  $ gradebook student update ada@sjsu.edu --set marks=95 --set grade=A
  $ gradebook search lovelace
  $ gradebook sort --by Marks --desc
  $ gradebook stats DATA200"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        env = "GRADEBOOK_DIR",
        help = "Directory holding the CSV tables (default: ~/.gradebook/data)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Reject unknown field names in updates instead of ignoring them")]
    strict: bool,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(arg_required_else_help = true, about = "Add, change, remove and list students")]
    Student {
        #[command(subcommand)]
        command: StudentCommand,
    },
    #[command(arg_required_else_help = true, about = "Add, change, remove and list courses")]
    Course {
        #[command(subcommand)]
        command: CourseCommand,
    },
    #[command(arg_required_else_help = true, about = "Add, change, remove and list professors")]
    Professor {
        #[command(subcommand)]
        command: ProfessorCommand,
    },
    #[command(arg_required_else_help = true, about = "Manage the grade scale")]
    Grade {
        #[command(subcommand)]
        command: GradeCommand,
    },
    #[command(arg_required_else_help = true, about = "Register users and check passwords")]
    Login {
        #[command(subcommand)]
        command: LoginCommand,
    },
    #[command(
        about = "Find students by first name, last name, email or course id",
        after_help = "Matching is a case-insensitive substring test."
    )]
    Search {
        term: String,
        #[command(flatten)]
        limit: LimitArgs,
    },
    #[command(about = "List students ordered by one field")]
    Sort {
        #[arg(long, default_value = "Marks", help = "Column or field name, e.g. Marks or Email_address")]
        by: String,
        #[arg(long, help = "Largest first")]
        desc: bool,
        #[command(flatten)]
        limit: LimitArgs,
    },
    #[command(about = "Count, average and median marks for one course")]
    Stats { course_id: String },
    #[command(arg_required_else_help = true, about = "Student reports by course, professor or student")]
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    #[command(about = "Every course with its marks statistics")]
    Overview,
    #[command(about = "Install the default A-F grade scale (skips grades already present)")]
    SeedGrades,
}

#[derive(Args, Clone, Copy)]
struct LimitArgs {
    #[arg(long, default_value_t = 20, help = "Show at most this many rows (0 = all)")]
    limit: usize,
}

#[derive(Args)]
struct KeyArg {
    key: String,
}

#[derive(Args)]
struct UpdateArgs {
    key: String,
    #[arg(
        long = "set",
        value_name = "FIELD=VALUE",
        required = true,
        value_parser = parse_field_update,
        help = "Field assignment; repeatable"
    )]
    updates: Vec<FieldUpdate>,
}

#[derive(Subcommand)]
enum StudentCommand {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        marks: f64,
    },
    Delete(KeyArg),
    #[command(after_help = "Fields: first_name, last_name, course_id, grade, marks")]
    Update(UpdateArgs),
    Get(KeyArg),
    List,
}

#[derive(Subcommand)]
enum CourseCommand {
    Add {
        course_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 3)]
        credits: u32,
    },
    Delete(KeyArg),
    #[command(after_help = "Fields: course_name, description, credits")]
    Update(UpdateArgs),
    Get(KeyArg),
    List,
}

#[derive(Subcommand)]
enum ProfessorCommand {
    Add {
        professor_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        rank: String,
        #[arg(long)]
        course: String,
    },
    Delete(KeyArg),
    #[command(after_help = "Fields: name, rank, course_id")]
    Update(UpdateArgs),
    Get(KeyArg),
    List,
}

#[derive(Subcommand)]
enum GradeCommand {
    Add {
        grade_id: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        range: String,
    },
    Delete(KeyArg),
    #[command(after_help = "Fields: grade, marks_range")]
    Update(UpdateArgs),
    Get(KeyArg),
    List,
}

#[derive(Subcommand)]
enum LoginCommand {
    Register {
        user_id: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "student")]
        role: String,
    },
    Verify {
        user_id: String,
        #[arg(long)]
        password: String,
    },
    Passwd {
        user_id: String,
        #[arg(long)]
        password: String,
    },
    Delete(KeyArg),
}

#[derive(Subcommand)]
enum ReportCommand {
    Course { course_id: String },
    Professor { professor_id: String },
    Student { email: String },
}

fn parse_field_update(input: &str) -> Result<FieldUpdate, String> {
    input.parse::<FieldUpdate>().map_err(|err| error_message(&err))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn add_storage_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::StorageUnavailable || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that --dir (or GRADEBOOK_DIR) points at a readable, writable directory.")
}

fn emit_json(value: Value) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::DuplicateKey => "duplicate key".to_string(),
        ErrorKind::Busy => "table is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::MalformedRecord => "malformed record".to_string(),
        ErrorKind::StorageUnavailable => "storage unavailable".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(entity) = err.entity() {
        inner.insert("entity".to_string(), json!(entity));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn colorize_label(label: &str, enabled: bool, code: &str) -> String {
    if !enabled {
        return label.to_string();
    }
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, "31"),
        error_message(err)
    )];
    if let (Some(entity), Some(key)) = (err.entity(), err.key()) {
        lines.push(format!("  {entity}: {key}"));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!("{} {hint}", colorize_label("hint:", use_color, "33")));
    }
    if let Some(path) = err.path() {
        lines.push(format!("  path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("  caused by: {cause}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Cli, clap_error_summary, error_json};
    use clap::Parser;
    use gradebook::api::{Error, ErrorKind};

    #[test]
    fn error_json_carries_entity_and_key() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("student not found")
            .with_entity("student")
            .with_key("ghost@x.edu");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["entity"], "student");
        assert_eq!(value["error"]["key"], "ghost@x.edu");
        assert!(value["error"].get("hint").is_none());
    }

    #[test]
    fn update_requires_assignment_syntax() {
        let parsed = Cli::try_parse_from(["gradebook", "student", "update", "a@x.edu", "--set", "marks"]);
        let err = parsed.err().expect("parse error");
        assert!(clap_error_summary(&err).contains("field=value"));

        let parsed = Cli::try_parse_from([
            "gradebook", "student", "update", "a@x.edu", "--set", "marks=90", "--set", "grade=A",
        ]);
        assert!(parsed.is_ok());
    }
}
