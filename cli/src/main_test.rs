use super::*;

#[test]
fn login_hint_names_the_surface_command() {
    assert!(login_hint("/doctor/login").contains("clinic doctor login"));
    assert!(login_hint("/patient/login").contains("clinic patient login"));
    assert_eq!(login_hint("/elsewhere"), "log in again");
}

#[test]
fn decision_json_shapes() {
    assert_eq!(
        decision_json("/doctor/login", &GuardDecision::Allow),
        json!({ "path": "/doctor/login", "decision": "allow" })
    );
    assert_eq!(
        decision_json("/doctor", &GuardDecision::Redirect("/doctor/login".into())),
        json!({ "path": "/doctor", "decision": "redirect", "to": "/doctor/login" })
    );
}

#[test]
fn session_json_reports_identity() {
    let session = SessionStore::in_memory();
    assert_eq!(session_json(&session), json!({ "logged_in": false, "role": "", "identity": null }));

    session.login(clinic_client::Role::Doctor, "abc", json!({ "id": 5 })).unwrap();
    assert_eq!(session_json(&session), json!({ "logged_in": true, "role": "doctor", "identity": { "id": 5 } }));
    assert_eq!(identity_id(&session).unwrap(), "5");
}

#[test]
fn identity_id_requires_session() {
    let session = SessionStore::in_memory();
    assert!(matches!(identity_id(&session), Err(CliError::Client(ClientError::NotLoggedIn))));
}

#[test]
fn client_errors_display_user_message() {
    let rejected = CliError::from(ClientError::Rejected { code: "9999".into(), msg: "bad record".into() });
    assert_eq!(rejected.to_string(), "bad record");

    let unreachable = CliError::from(ClientError::HttpStatus { status: 502, body: Value::Null });
    assert_eq!(unreachable.to_string(), clinic_client::error::CONNECTIVITY_MESSAGE);
}

#[tokio::test]
async fn failed_command_reports_connectivity_message() {
    let dir = std::env::temp_dir().join(format!("clinic-cli-{}", std::process::id()));
    let cli = Cli::try_parse_from([
        "clinic",
        "--api-url",
        "http://127.0.0.1:1/api",
        "--session-file",
        dir.join("session.json").to_str().unwrap(),
        "doctor",
        "summary",
        "r1",
    ])
    .unwrap();

    let err = run(cli).await.unwrap_err();
    assert_eq!(err.to_string(), clinic_client::error::CONNECTIVITY_MESSAGE);
}

#[test]
fn file_name_falls_back() {
    assert_eq!(file_name(Path::new("/tmp/cardiology.xlsx")), "cardiology.xlsx");
    assert_eq!(file_name(Path::new("/")), "upload");
}

#[test]
fn cli_parses_nested_subcommands() {
    let cli = Cli::try_parse_from([
        "clinic",
        "patient",
        "submit",
        "--questionnaire-id",
        "q1",
        "--department-id",
        "d1",
        "--answers",
        "{}",
        "--file-id",
        "f1",
        "--file-id",
        "f2",
    ])
    .unwrap();
    let Command::Patient(PatientCommand { command: PatientSubcommand::Submit(args) }) = cli.command else {
        panic!("expected patient submit");
    };
    assert_eq!(args.file_ids, vec!["f1", "f2"]);
}
