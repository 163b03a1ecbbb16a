//! CLI entry point for authgate.

pub mod auth;
pub mod request;

use clap::{Parser, Subcommand};

/// authgate CLI
#[derive(Parser, Debug)]
#[command(name = "authgate", version, about = "authgate: authenticated backend client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session management
    Auth(AuthArgs),
    /// Show or change the API base URL
    Base(BaseArgs),
    /// Send an authenticated request
    Send(SendArgs),
    /// Upload files as multipart form data
    Upload(UploadArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in with email and password
    Login(CredentialArgs),
    /// Create an account (does not log in)
    Register(CredentialArgs),
    /// Show session status
    Status,
    /// Mint a new access token now
    Refresh,
    /// Forget the stored session
    Logout,
}

/// Email and password for `login` and `register`.
#[derive(Parser, Debug)]
pub struct CredentialArgs {
    pub email: String,

    #[arg(short, long, env = "AUTHGATE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Arguments for `authgate base`.
#[derive(Parser, Debug)]
pub struct BaseArgs {
    /// New base URL; prints the current one when omitted
    pub url: Option<String>,
}

/// Arguments for `authgate send`.
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Path relative to the API base, or an absolute URL
    pub path: String,

    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra header, `Name: value`
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,
}

/// Arguments for `authgate upload`.
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Path relative to the API base, or an absolute URL
    pub path: String,

    /// Text field, `name=value`
    #[arg(short = 'F', long = "field")]
    pub fields: Vec<String>,

    /// File field, `name=@path`
    #[arg(short = 'f', long = "file")]
    pub files: Vec<String>,
}

/// Split `name=value` (or `name=@path` for files).
pub(crate) fn split_assignment(raw: &str) -> Option<(&str, &str)> {
    let (name, value) = raw.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_auth_login_with_password() {
        let cli =
            Cli::try_parse_from(["authgate", "auth", "login", "a@b.com", "--password", "pw"])
                .unwrap();
        match cli.command {
            Commands::Auth(auth) => match auth.command {
                AuthCommands::Login(args) => {
                    assert_eq!(args.email, "a@b.com");
                    assert_eq!(args.password, "pw");
                }
                other => panic!("expected Login, got {other:?}"),
            },
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn parse_auth_status_and_logout() {
        let cli = Cli::try_parse_from(["authgate", "auth", "status"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Auth(AuthArgs {
                command: AuthCommands::Status
            })
        ));
        let cli = Cli::try_parse_from(["authgate", "auth", "logout"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Auth(AuthArgs {
                command: AuthCommands::Logout
            })
        ));
    }

    #[test]
    fn parse_send_with_defaults() {
        let cli = Cli::try_parse_from(["authgate", "send", "/tasks"]).unwrap();
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.path, "/tasks");
                assert_eq!(args.method, "GET");
                assert!(args.headers.is_empty());
                assert!(args.data.is_none());
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn parse_send_with_all_options() {
        let cli = Cli::try_parse_from([
            "authgate",
            "send",
            "/tasks",
            "-X",
            "POST",
            "-H",
            "X-Trace: 1",
            "-d",
            r#"{"name":"nightly"}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.method, "POST");
                assert_eq!(args.headers, vec!["X-Trace: 1".to_string()]);
                assert_eq!(args.data.as_deref(), Some(r#"{"name":"nightly"}"#));
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn parse_upload_fields_and_files() {
        let cli = Cli::try_parse_from([
            "authgate",
            "upload",
            "/validate",
            "-F",
            "mode=strict",
            "-f",
            "file=@rules.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.fields, vec!["mode=strict".to_string()]);
                assert_eq!(args.files, vec!["file=@rules.txt".to_string()]);
            }
            other => panic!("expected Upload, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["authgate"]).is_err());
    }

    #[test]
    fn split_assignment_requires_a_name() {
        assert_eq!(split_assignment("a=b=c"), Some(("a", "b=c")));
        assert_eq!(split_assignment("file=@x"), Some(("file", "@x")));
        assert_eq!(split_assignment("=x"), None);
        assert_eq!(split_assignment("novalue"), None);
    }
}
