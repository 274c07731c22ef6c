use super::*;
use crate::utils::test_utils::rejected;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }
}

use test_helpers::parse_args;

#[test]
fn test_no_subcommand_means_chat() {
    let args = parse_args(&["chatdesk"]);
    assert!(args.command.is_none());
    assert!(args.base_url.is_none());
    assert!(args.store.is_none());
}

#[test]
fn test_global_flags_parse_after_subcommand() {
    let argv = [
        "chatdesk",
        "sessions",
        "--base-url",
        "http://example.test/ai",
        "--store",
        "memory",
        "--log",
        "chat.log",
    ];
    let args = parse_args(&argv);
    assert!(matches!(args.command, Some(Commands::Sessions)));
    assert_eq!(args.base_url.as_deref(), Some("http://example.test/ai"));
    assert_eq!(args.store, Some(CredentialBackend::Memory));
    assert_eq!(args.log, Some(PathBuf::from("chat.log")));
}

#[test]
fn test_send_joins_words_and_accepts_options() {
    let argv = [
        "chatdesk", "send", "-s", "s1", "--model", "llama3", "hello", "-there",
    ];
    match parse_args(&argv).command {
        Some(Commands::Send {
            text,
            session,
            model,
        }) => {
            assert_eq!(text.join(" "), "hello -there");
            assert_eq!(session.as_deref(), Some("s1"));
            assert_eq!(model.as_deref(), Some("llama3"));
        }
        _ => panic!("expected send subcommand for argv={argv:?}"),
    }
}

#[test]
fn test_send_requires_text() {
    assert!(Args::try_parse_from(["chatdesk", "send"]).is_err());
}

#[test]
fn test_login_username_and_password_are_optional() {
    match parse_args(&["chatdesk", "login"]).command {
        Some(Commands::Login { username, password }) => {
            assert!(username.is_none());
            assert!(password.is_none());
        }
        _ => panic!("expected login subcommand"),
    }
    match parse_args(&["chatdesk", "register", "bob", "--password", "pw"]).command {
        Some(Commands::Register { username, password }) => {
            assert_eq!(username.as_deref(), Some("bob"));
            assert_eq!(password.as_deref(), Some("pw"));
        }
        _ => panic!("expected register subcommand"),
    }
}

#[test]
fn test_set_without_value_parses() {
    match parse_args(&["chatdesk", "set"]).command {
        Some(Commands::Set { key, value }) => {
            assert!(key.is_none());
            assert!(value.is_empty());
        }
        _ => panic!("expected set subcommand"),
    }
    match parse_args(&["chatdesk", "set", "default-model", "llama3"]).command {
        Some(Commands::Set { key, value }) => {
            assert_eq!(key.as_deref(), Some("default-model"));
            assert_eq!(value, vec!["llama3"]);
        }
        _ => panic!("expected set subcommand"),
    }
}

#[test]
fn test_unknown_store_is_rejected() {
    assert!(Args::try_parse_from(["chatdesk", "--store", "vault"]).is_err());
}

#[test]
fn test_flag_overrides_environment_and_file() {
    let file = Config {
        base_url: Some("http://file/ai".to_string()),
        credential_store: Some(CredentialBackend::Keyring),
        ..Default::default()
    };

    let config = resolve_config(
        file.clone(),
        Some("http://env/ai".to_string()),
        None,
        None,
    );
    assert_eq!(config.base_url(), "http://env/ai");
    assert_eq!(config.credential_backend(), CredentialBackend::Keyring);

    let config = resolve_config(
        file,
        Some("http://env/ai".to_string()),
        Some("http://flag/ai".to_string()),
        Some(CredentialBackend::Memory),
    );
    assert_eq!(config.base_url(), "http://flag/ai");
    assert_eq!(config.credential_backend(), CredentialBackend::Memory);
}

#[test]
fn test_backend_failures_count_as_reported() {
    let api: Box<dyn Error> = Box::new(rejected(500, "boom"));
    assert!(already_reported(api.as_ref()));

    let session: Box<dyn Error> = Box::new(SessionError::Api(rejected(401, "expired")));
    assert!(already_reported(session.as_ref()));

    let empty_token: Box<dyn Error> = Box::new(ApiError::EmptyToken);
    assert!(!already_reported(empty_token.as_ref()));

    let local: Box<dyn Error> = Box::new(SessionError::UnknownSession("s9".to_string()));
    assert!(!already_reported(local.as_ref()));

    let plain: Box<dyn Error> = "Not signed in".into();
    assert!(!already_reported(plain.as_ref()));
}

#[test]
fn test_memory_store_needs_no_filesystem() {
    let store = open_store(CredentialBackend::Memory).unwrap();
    assert_eq!(store.get("token").unwrap(), None);
}
