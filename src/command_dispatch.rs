//! Purpose: Hold top-level CLI command dispatch for `gradebook`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command opens one `Gradebook` session and closes it before returning.
//! Invariants: List-style output truncation (`--limit`) happens here, never in the library.

use serde::Serialize;

use super::*;
use gradebook::api::{
    Config, Course, Entity, Grade, Gradebook, Professor, Record, Repository, SaltedSha256, Student,
    Timed,
};

pub(super) fn dispatch_command(command: Command, config: Config) -> Result<RunOutcome, Error> {
    let gradebook = Gradebook::open(config)?;
    let outcome = run_command(&gradebook, command);
    gradebook.close();
    outcome
}

fn run_command(gradebook: &Gradebook, command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Student { command } => {
            let repo = gradebook.students();
            match command {
                StudentCommand::Add {
                    email,
                    first,
                    last,
                    course,
                    grade,
                    marks,
                } => add_entity(repo, Student::new(email, first, last, course, grade, marks)),
                StudentCommand::Delete(arg) => delete_entity(repo, &arg.key),
                StudentCommand::Update(args) => update_entity(repo, &args),
                StudentCommand::Get(arg) => get_entity(repo, &arg.key),
                StudentCommand::List => list_entities(repo),
            }
        }
        Command::Course { command } => {
            let repo = gradebook.courses();
            match command {
                CourseCommand::Add {
                    course_id,
                    name,
                    description,
                    credits,
                } => add_entity(
                    repo,
                    Course::new(course_id, name)
                        .with_description(description)
                        .with_credits(credits),
                ),
                CourseCommand::Delete(arg) => delete_entity(repo, &arg.key),
                CourseCommand::Update(args) => update_entity(repo, &args),
                CourseCommand::Get(arg) => get_entity(repo, &arg.key),
                CourseCommand::List => list_entities(repo),
            }
        }
        Command::Professor { command } => {
            let repo = gradebook.professors();
            match command {
                ProfessorCommand::Add {
                    professor_id,
                    name,
                    rank,
                    course,
                } => add_entity(repo, Professor::new(professor_id, name, rank, course)),
                ProfessorCommand::Delete(arg) => delete_entity(repo, &arg.key),
                ProfessorCommand::Update(args) => update_entity(repo, &args),
                ProfessorCommand::Get(arg) => get_entity(repo, &arg.key),
                ProfessorCommand::List => list_entities(repo),
            }
        }
        Command::Grade { command } => {
            let repo = gradebook.grades();
            match command {
                GradeCommand::Add {
                    grade_id,
                    grade,
                    range,
                } => add_entity(repo, Grade::new(grade_id, grade, range)),
                GradeCommand::Delete(arg) => delete_entity(repo, &arg.key),
                GradeCommand::Update(args) => update_entity(repo, &args),
                GradeCommand::Get(arg) => get_entity(repo, &arg.key),
                GradeCommand::List => list_entities(repo),
            }
        }
        Command::Login { command } => {
            let codec = SaltedSha256;
            match command {
                LoginCommand::Register {
                    user_id,
                    password,
                    role,
                } => {
                    gradebook.register_user(&user_id, &password, &role, &codec)?;
                    emit_json(json!({ "registered": { "user_id": user_id, "role": role } }));
                    Ok(RunOutcome::ok())
                }
                LoginCommand::Verify { user_id, password } => {
                    let verified = gradebook.verify_login(&user_id, &password, &codec)?;
                    emit_json(json!({ "user_id": user_id, "verified": verified }));
                    Ok(RunOutcome::ok())
                }
                LoginCommand::Passwd { user_id, password } => {
                    gradebook.change_password(&user_id, &password, &codec)?;
                    emit_json(json!({ "updated": { "user_id": user_id } }));
                    Ok(RunOutcome::ok())
                }
                LoginCommand::Delete(arg) => delete_entity(gradebook.logins(), &arg.key),
            }
        }
        Command::Search { term, limit } => {
            let term = term.to_lowercase();
            let found = gradebook.students().search(|record| {
                ["First_name", "Last_name", "Email_address", "Course_id"]
                    .iter()
                    .any(|column| record.get(column).to_lowercase().contains(&term))
            })?;
            emit_json(timed_rows_json("matches", found, limit.limit));
            Ok(RunOutcome::ok())
        }
        Command::Sort { by, desc, limit } => {
            let sorted = gradebook.students().sort_by(&by, desc)?;
            emit_json(timed_rows_json("students", sorted, limit.limit));
            Ok(RunOutcome::ok())
        }
        Command::Stats { course_id } => {
            let stats = gradebook.reports().course_statistics(&course_id)?;
            emit_json(json!({ "course_id": course_id, "stats": stats }));
            Ok(RunOutcome::ok())
        }
        Command::Report { command } => {
            let reports = gradebook.reports();
            let (label, id, students) = match command {
                ReportCommand::Course { course_id } => {
                    let students = reports.report_by_course(&course_id)?;
                    ("course_id", course_id, students)
                }
                ReportCommand::Professor { professor_id } => {
                    let students = reports.report_by_professor(&professor_id)?;
                    ("professor_id", professor_id, students)
                }
                ReportCommand::Student { email } => {
                    let students = reports.report_by_student(&email)?;
                    ("email", email, students)
                }
            };
            let mut map = Map::new();
            map.insert(label.to_string(), json!(id));
            map.insert("count".to_string(), json!(students.len()));
            map.insert("students".to_string(), to_value(&students)?);
            emit_json(Value::Object(map));
            Ok(RunOutcome::ok())
        }
        Command::Overview => {
            let overview = gradebook.reports().course_overview()?;
            emit_json(json!({ "courses": to_value(&overview)? }));
            Ok(RunOutcome::ok())
        }
        Command::SeedGrades => {
            let added = gradebook.seed_grade_scale()?;
            emit_json(json!({ "seeded": added }));
            Ok(RunOutcome::ok())
        }
    }
}

fn add_entity<E: Entity + Serialize>(repo: &Repository<E>, entity: E) -> Result<RunOutcome, Error> {
    repo.add(&entity)?;
    emit_json(json!({ "added": to_value(&entity)? }));
    Ok(RunOutcome::ok())
}

fn delete_entity<E: Entity>(repo: &Repository<E>, key: &str) -> Result<RunOutcome, Error> {
    repo.delete(key)?;
    emit_json(json!({ "deleted": { "entity": E::KIND, "key": key } }));
    Ok(RunOutcome::ok())
}

fn update_entity<E: Entity + Serialize>(
    repo: &Repository<E>,
    args: &UpdateArgs,
) -> Result<RunOutcome, Error> {
    repo.update(&args.key, &args.updates)?;
    let updated = repo.get(&args.key)?;
    emit_json(json!({ "updated": to_value(&updated)? }));
    Ok(RunOutcome::ok())
}

fn get_entity<E: Entity + Serialize>(repo: &Repository<E>, key: &str) -> Result<RunOutcome, Error> {
    let entity = repo.get(key)?.ok_or_else(|| {
        Error::new(ErrorKind::NotFound)
            .with_message(format!("{} not found", E::KIND))
            .with_entity(E::KIND)
            .with_key(key)
    })?;
    emit_json(to_value(&entity)?);
    Ok(RunOutcome::ok())
}

fn list_entities<E: Entity + Serialize>(repo: &Repository<E>) -> Result<RunOutcome, Error> {
    let entities = repo.list()?;
    let mut map = Map::new();
    map.insert(E::TABLE.to_string(), to_value(&entities)?);
    emit_json(Value::Object(map));
    Ok(RunOutcome::ok())
}

fn timed_rows_json(label: &str, timed: Timed<Vec<Record>>, limit: usize) -> Value {
    let total = timed.value.len();
    let shown = if limit == 0 { total } else { total.min(limit) };
    let mut map = Map::new();
    map.insert("count".to_string(), json!(total));
    map.insert("shown".to_string(), json!(shown));
    map.insert(
        "elapsed_secs".to_string(),
        json!(timed.elapsed.as_secs_f64()),
    );
    map.insert(
        label.to_string(),
        json!(timed.value.into_iter().take(shown).collect::<Vec<_>>()),
    );
    Value::Object(map)
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode json")
            .with_source(err)
    })
}
