// Concurrent writers against one table must not lose updates.
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use gradebook::api::{Config, Gradebook, Student};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_gradebook");
    Command::new(exe)
}

#[test]
fn concurrent_thread_adds_are_serialized() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gradebook = Arc::new(Gradebook::open(Config::new(temp.path())).expect("open"));

    let workers = 16;
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let gradebook = Arc::clone(&gradebook);
            thread::spawn(move || {
                let student = Student::new(
                    format!("s{i}@x.edu"),
                    "First",
                    "Last",
                    "DATA200",
                    "B",
                    50.0 + i as f64,
                );
                gradebook.students().add(&student)
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("join").expect("add");
    }

    let students = gradebook.students().list().expect("list");
    assert_eq!(students.len(), workers);
    for i in 0..workers {
        let email = format!("s{i}@x.edu");
        assert!(students.iter().any(|s| s.email == email), "lost {email}");
    }
}

#[test]
fn concurrent_process_adds_are_serialized() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("data");

    let workers = 8;
    let mut children = Vec::new();
    for i in 0..workers {
        let child = cmd()
            .env_remove("GRADEBOOK_DIR")
            .args([
                "--dir",
                dir.to_str().unwrap(),
                "course",
                "add",
                &format!("C{i}"),
                "--name",
                "Parallel",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn");
        children.push(child);
    }

    for mut child in children {
        let status = child.wait().expect("wait");
        assert!(status.success());
    }

    let gradebook = Gradebook::open(Config::new(&dir)).expect("open");
    assert_eq!(gradebook.courses().count().expect("count"), workers);
}
