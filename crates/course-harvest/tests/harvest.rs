// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end harvests against a scripted portal.
//!
//! Every test replays a small course site through the in-memory driver and
//! checks the files written under a temporary output root.

use std::path::Path;

use course_harvest::catalog::ResourceCatalog;
use course_harvest::config::Timing;
use course_harvest::download::{Extracted, ResourceDownloader};
use course_harvest::driver::memory::{ClickEffect, MemoryDriver, ScriptedDownload};
use course_harvest::driver::{PageDriver, SessionCookie};
use course_harvest::error::HarvestError;
use course_harvest::model::{Resource, ResourceKind};
use course_harvest::output::OutputLayout;
use course_harvest::progress::{self, Progress, ProgressEventKind};
use course_harvest::prompt::ScriptedPrompter;
use course_harvest::session::{read_cookie_jar, Credentials};
use course_harvest::{HarvestConfig, Harvester, RunSummary};

// ─────────────────────── helpers ───────────────────────

const HOME: &str = "https://portal.example";
const LOGIN: &str = "https://portal.example/login/index.php";
const DASHBOARD: &str = "https://portal.example/my/";
const COURSE: &str = "https://portal.example/course/view.php?id=9";

const NOTES: &str = "https://portal.example/mod/resource/view.php?id=1";
const LABS: &str = "https://portal.example/mod/folder/view.php?id=2";
const DOCS: &str = "https://portal.example/mod/url/view.php?id=3";
const QUIZ: &str = "https://portal.example/mod/quiz/view.php?id=4";
const HANDOUT: &str = "https://portal.example/mod/resource/view.php?id=5";
const EXTERNAL: &str = "https://external.example/x";

const CHECK: &str = "input[type='submit'][value='Check']";
const ARCHIVE: &str = "form[action*='download_folder.php'] button[type='submit']";

fn config(dir: &Path) -> HarvestConfig {
    HarvestConfig {
        base_url: HOME.to_string(),
        output_dir: dir.join("out"),
        cookie_file: dir.join("cookies.json"),
        timing: Timing::instant(),
        ..Default::default()
    }
}

fn credentials() -> Credentials {
    Credentials {
        username: "student".into(),
        password: "hunter2".into(),
    }
}

fn activity(href: &str, name: &str, marker: &str) -> String {
    format!(
        r#"<li class="activity"><a class="aalink" href="{href}"><span class="instancename">{name}<span class="accesshide "> {marker}</span></span></a></li>"#
    )
}

fn section(name: &str, activities: &[String]) -> String {
    format!(
        r##"<li class="section main"><h3 class="sectionname"><span><a href="#">{name}</a></span></h3><ul>{}</ul></li>"##,
        activities.concat()
    )
}

fn course_page() -> String {
    let week1 = section(
        "Week 1",
        &[
            activity("/mod/url/view.php?id=3", "Reference Docs", "URL"),
            activity("/mod/forum/view.php?id=8", "Announcements", "Forum"),
            activity("/mod/resource/view.php?id=1", "Lecture Notes", "File"),
            activity("/mod/folder/view.php?id=2", "Lab Files", "Folder"),
        ],
    );
    let week2 = section(
        "Week 2",
        &[
            activity("/mod/quiz/view.php?id=4", "Quiz 1", "Quiz"),
            activity("/mod/resource/view.php?id=5", "Missing Handout", "File"),
        ],
    );
    format!(
        r#"<html><body><nav class="navbar">Jane Student</nav>
           <ul class="topics">{week1}{week2}</ul><footer>Logged in as Jane</footer></body></html>"#
    )
}

fn attempt_page(n: usize) -> String {
    format!("https://portal.example/mod/quiz/attempt.php?attempt=7&page={n}")
}

fn question_page(n: usize, outcome: bool) -> String {
    let buttons: String = (0..3)
        .map(|i| {
            format!(
                r#"<a class="qnbutton" href="attempt.php?attempt=7&amp;page={i}">Question {}</a>"#,
                i + 1
            )
        })
        .collect();
    let outcome = if outcome {
        r#"<div class="outcome"><table><tr><th>Expected</th></tr><tr><td>42</td></tr></table></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><nav class="navbar">Jane Student</nav>
           <div class="qn_buttons">{buttons}</div>
           <div class="content">
             <div class="qtext"><p>Question {} asks for the answer.</p></div>
             <input type="button" class="answer_reset_btn" data-reload-text="int main() {{ return 0; }}">
             <div class="ui_wrapper"><textarea class="coderunner-answer"></textarea></div>
             <div class="prompt">Answer:</div>
             <input type="submit" value="Check">
             {outcome}
           </div>
           <footer>Logged in as Jane</footer></body></html>"#,
        n + 1
    )
}

/// A portal with one course holding every resource kind, one of them broken.
fn portal() -> MemoryDriver {
    let mut d = MemoryDriver::new();
    d.add_page(
        HOME,
        r#"<a href="/login/index.php">Log in</a>
           <a href="/course/view.php?id=9"> Intro to
              Programming </a>"#,
    );
    d.add_page(
        LOGIN,
        r#"<form><input id="username"><input id="password" type="password">
           <button class="btn-submit">Log in</button></form>"#,
    );
    d.add_page(DASHBOARD, r#"<h1>Dashboard</h1>"#);
    d.on_click(LOGIN, ".btn-submit", ClickEffect::Navigate(DASHBOARD.into()));
    d.add_page(COURSE, &course_page());

    d.add_download(NOTES, ScriptedDownload::new(Some("notes.pdf"), b"%PDF-1.7".to_vec()));

    d.add_page(
        LABS,
        r#"<form action="/mod/folder/download_folder.php"><button type="submit">Download folder</button></form>"#,
    );
    d.on_click(
        LABS,
        ARCHIVE,
        ClickEffect::Download(ScriptedDownload::new(Some("labs.zip"), b"PK\x03\x04".to_vec())),
    );

    d.add_redirect(DOCS, EXTERNAL);
    d.add_page(EXTERNAL, "<h1>Reference</h1>");

    d.add_page(
        QUIZ,
        r#"<div class="quizattempt"><form><button type="submit">Continue the last attempt</button></form></div>"#,
    );
    d.on_click(QUIZ, "button[type='submit']", ClickEffect::Navigate(attempt_page(0)));
    for n in 0..3 {
        d.add_page(&attempt_page(n), &question_page(n, false));
        d.on_click(&attempt_page(n), CHECK, ClickEffect::Replace(question_page(n, true)));
    }
    d
}

fn drain(rx: &mut progress::ProgressReceiver) -> Vec<ProgressEventKind> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event.event);
    }
    events
}

// ═══════════════════════════════════════════════════════
// CATALOG
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn catalog_groups_supported_resources_by_section() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    driver.navigate(COURSE).await.unwrap();

    let group = ResourceCatalog::new(&config.selectors)
        .scan(&driver)
        .await
        .unwrap();
    assert_eq!(group.section_names(), vec!["Week 1", "Week 2"]);

    let week1: Vec<_> = group
        .get("Week 1")
        .unwrap()
        .iter()
        .map(|r| (r.display_name.as_str(), r.kind))
        .collect();
    assert_eq!(
        week1,
        vec![
            ("Lecture Notes", ResourceKind::Document),
            ("Lab Files", ResourceKind::Folder),
            ("Reference Docs", ResourceKind::ExternalLink),
        ]
    );
    assert_eq!(group.len(), 5);
    assert_eq!(group.count_of(ResourceKind::Quiz), 1);
    let week2 = group.get("Week 2").unwrap();
    assert_eq!(week2[0].display_name, "Missing Handout");
    assert_eq!(week2[1].url, QUIZ);
}

// ═══════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn off_domain_link_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    let out = OutputLayout::new(&config.output_dir).course("Intro to Programming");

    let link = Resource::new("Reference Docs", DOCS, ResourceKind::ExternalLink);
    let extracted = ResourceDownloader::new(&config)
        .extract(&mut driver, &link, &out, &mut Progress::silent())
        .await
        .unwrap();

    let record = out.link_record("Reference Docs");
    assert_eq!(
        extracted,
        Extracted::Files(course_harvest::model::ExtractionArtifact {
            link_record: Some(record.clone()),
            ..Default::default()
        })
    );
    assert!(record.ends_with("links/Reference_Docs.txt"));
    let text = std::fs::read_to_string(&record).unwrap();
    assert_eq!(text, format!("Name: Reference Docs\nURL: {EXTERNAL}\n"));
}

#[tokio::test]
async fn quiz_questions_become_markdown_and_screenshots() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    let course = OutputLayout::new(&config.output_dir).course("Intro to Programming");

    let quiz = Resource::new("Quiz 1", QUIZ, ResourceKind::Quiz);
    let extracted = ResourceDownloader::new(&config)
        .extract(&mut driver, &quiz, &course, &mut Progress::silent())
        .await
        .unwrap();
    let Extracted::Quiz(summary) = extracted else {
        panic!("expected a quiz summary, got {extracted:?}");
    };
    assert_eq!(summary.questions, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.partial, 0);

    let out = course.quiz("Quiz 1");
    for n in ["1", "2", "3"] {
        let md = std::fs::read_to_string(out.markdown(n)).unwrap();
        assert!(md.contains(&format!("Question {n} asks for the answer.")), "{md}");
        assert!(md.contains("## Starter Code:\n\n```cpp\nint main() { return 0; }\n```"));
        assert!(!md.contains("Saved Code"), "placeholder leaked into {n}.md");
        assert!(!md.contains("Jane"));
        assert!(!md.contains("Answer:"));
        assert!(out.screenshot(n).exists());
    }
    // Each page was submitted once to reveal its outcome table.
    let checks = driver.clicks().iter().filter(|c| c.selector == CHECK).count();
    assert_eq!(checks, 3);
}

#[tokio::test]
async fn closed_quiz_is_reported_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    driver.add_page(QUIZ, "<p>This quiz closed on Monday.</p>");
    let course = OutputLayout::new(&config.output_dir).course("Intro to Programming");

    let quiz = Resource::new("Quiz 1", QUIZ, ResourceKind::Quiz);
    let err = ResourceDownloader::new(&config)
        .extract(&mut driver, &quiz, &course, &mut Progress::silent())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::QuizUnavailable(name)) if name == "Quiz 1"
    ));
}

// ═══════════════════════════════════════════════════════
// FULL RUNS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn full_run_logs_in_and_extracts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    let mut prompter = ScriptedPrompter::new(&[]).with_credentials(credentials());
    let (tx, mut rx) = progress::channel();
    let mut progress = Progress::new(Some(tx));

    let summary = Harvester::new(&config)
        .run(&mut driver, &mut prompter, &mut progress)
        .await
        .unwrap();
    assert_eq!(
        summary,
        RunSummary {
            courses: 1,
            resources: 5,
            succeeded: 4,
            failed: 1,
        }
    );
    assert_eq!(
        prompter.asked,
        vec![
            "Select courses".to_string(),
            "Select resources from Intro to Programming".to_string(),
        ]
    );

    let course = config.output_dir.join("Intro_to_Programming");
    assert!(course.join("course.png").exists());
    assert_eq!(std::fs::read(course.join("documents/notes.pdf")).unwrap(), b"%PDF-1.7");
    assert_eq!(std::fs::read(course.join("documents/labs.zip")).unwrap(), b"PK\x03\x04");
    assert!(course.join("links/Reference_Docs.txt").exists());
    assert!(course.join("Quiz_1/3.md").exists());
    assert!(course.join("Quiz_1/screenshots/3.png").exists());
    assert!(!course.join(".staging").exists());
    // The broken handout was attempted and did not stop the resources after it.
    assert!(driver.navigations().iter().any(|u| u == HANDOUT));

    // The session was saved for the next run.
    assert!(read_cookie_jar(&config.cookie_file).unwrap().is_empty());

    let events = drain(&mut rx);
    assert!(matches!(
        events.first(),
        Some(ProgressEventKind::CourseStarted { name, .. }) if name == "Intro to Programming"
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEventKind::ResourceFailed { name, kind: ResourceKind::Document, .. }
            if name == "Missing Handout"
    )));
    let questions = events
        .iter()
        .filter(|e| matches!(e, ProgressEventKind::QuestionProcessed { .. }))
        .count();
    assert_eq!(questions, 3);
    assert!(matches!(
        events.last(),
        Some(ProgressEventKind::RunComplete { courses: 1, resources: 5, .. })
    ));
}

#[tokio::test]
async fn saved_session_skips_login() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.courses = vec!["intro".to_string()];
    let jar = vec![SessionCookie {
        name: "MoodleSession".into(),
        value: "abc123".into(),
        domain: "portal.example".into(),
        path: "/".into(),
        expires: None,
        http_only: true,
        secure: true,
    }];
    std::fs::write(&config.cookie_file, serde_json::to_string(&jar).unwrap()).unwrap();

    let mut driver = portal();
    driver.add_page(HOME, r#"<a href="/course/view.php?id=9">Intro to Programming</a>"#);
    // Only the link gets picked.
    let mut prompter = ScriptedPrompter::new(&["3"]);

    let summary = Harvester::new(&config)
        .run(&mut driver, &mut prompter, &mut Progress::silent())
        .await
        .unwrap();
    assert_eq!(summary.resources, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(driver.cookies().await.unwrap(), jar);
    assert!(!driver.navigations().iter().any(|u| u == LOGIN));
    // Configured course names bypass the course prompt.
    assert_eq!(prompter.asked.len(), 1);
    assert!(config
        .output_dir
        .join("Intro_to_Programming/links/Reference_Docs.txt")
        .exists());
}

#[tokio::test]
async fn rejected_login_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    // Submitting leaves the browser on the form.
    driver.on_click(LOGIN, ".btn-submit", ClickEffect::Navigate(LOGIN.into()));
    let mut prompter = ScriptedPrompter::new(&[]).with_credentials(credentials());

    let err = Harvester::new(&config)
        .run(&mut driver, &mut prompter, &mut Progress::silent())
        .await
        .unwrap_err();
    let classified = err.downcast_ref::<HarvestError>().unwrap();
    assert!(matches!(classified, HarvestError::AuthenticationFailed(_)));
    assert!(prompter.asked.is_empty());
    assert!(!config.output_dir.exists());
}

#[tokio::test]
async fn declining_every_resource_writes_only_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut driver = portal();
    let mut prompter = ScriptedPrompter::new(&["all", ""]).with_credentials(credentials());

    let summary = Harvester::new(&config)
        .run(&mut driver, &mut prompter, &mut Progress::silent())
        .await
        .unwrap();
    assert_eq!(summary.courses, 1);
    assert_eq!(summary.resources, 0);

    let course = config.output_dir.join("Intro_to_Programming");
    assert!(course.join("course.png").exists());
    assert!(!course.join("documents").exists());
    assert!(!course.join("Quiz_1").exists());
}
