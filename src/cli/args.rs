use clap::{ArgAction, Parser, Subcommand};
use humantime::Duration;
use registry_client::{PackageQuery, DEFAULT_AUTH_HEADER};
use tracing::Level;
use url::Url;

use crate::cli::models::{try_parse_query, Token};

#[derive(Parser)]
#[clap(version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Input {
    /// The registry to talk to
    #[arg(long, global = true, env = "REGISTRY_URL", default_value = "http://localhost:3000")]
    pub base_url: Url,

    /// The token to authenticate with, as printed by `login`
    #[arg(long, global = true, env = "REGISTRY_TOKEN", value_parser = Token::try_from_str)]
    pub token: Option<Token>,

    /// The header the token is sent under
    #[arg(long, global = true, env = "REGISTRY_AUTH_HEADER", default_value = DEFAULT_AUTH_HEADER)]
    pub auth_header: String,

    /// How long to wait for each request before giving up, e.g. `30s`
    #[arg(long, global = true, env = "REGISTRY_TIMEOUT")]
    pub timeout: Option<Duration>,

    /// The log level to use for the tracing subscriber
    #[arg(long, global = true, default_value = "info")]
    pub(crate) log_level: Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List packages matching one or more queries
    Packages {
        /// `name` or `name@version`; `*` matches every package. Repeatable
        #[arg(long = "query", value_parser = try_parse_query)]
        queries: Vec<PackageQuery>,

        /// Where to start in the result set
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: String,
    },

    /// Delete every package in the registry
    Reset,

    /// Show a package's metadata and contents
    Get {
        id: String,
    },

    /// Upload a new package, from a zip file or a repository URL
    Upload {
        /// The package name
        #[arg(long)]
        name: String,

        /// A zip archive to upload; sent base64 encoded
        #[arg(long, conflicts_with = "url")]
        content_file: Option<std::path::PathBuf>,

        /// A repository URL for the registry to ingest
        #[arg(long)]
        url: Option<String>,

        /// JavaScript run by the registry on download
        #[arg(long, default_value = "")]
        js_program: String,

        /// Ask the registry to strip unused code before storing
        #[arg(long, action(ArgAction::SetTrue))]
        debloat: bool,
    },

    /// Replace a package's metadata and contents
    #[command(disable_version_flag = true)]
    Update {
        id: String,

        #[arg(long)]
        name: String,

        /// The package's new version
        #[arg(long = "version", id = "package_version")]
        package_version: String,

        #[arg(long, conflicts_with = "url")]
        content_file: Option<std::path::PathBuf>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value = "")]
        js_program: String,

        #[arg(long, action(ArgAction::SetTrue))]
        debloat: bool,
    },

    /// Search packages by name or README with a regular expression
    Search {
        regex: String,
    },

    /// Show the size cost of a package
    Cost {
        id: String,

        /// Include the cost of the package's dependencies
        #[arg(long, action(ArgAction::SetTrue))]
        dependency: bool,
    },

    /// Show a package's quality metrics
    Rate {
        id: String,
    },

    /// List the registry's planned tracks
    Tracks,

    /// Exchange credentials for a token and print it
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, action(ArgAction::SetTrue))]
        admin: bool,
    },

    /// Invalidate the current token
    Logout,

    /// Read or change a user's permissions
    #[command(subcommand)]
    Permissions(PermissionsCommand),

    /// Create a user account
    Register {
        #[arg(long)]
        name: String,

        #[arg(long, env = "REGISTRY_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, action(ArgAction::SetTrue))]
        admin: bool,

        #[arg(long)]
        group_id: String,

        #[arg(long, action(ArgAction::SetTrue))]
        can_download: bool,

        #[arg(long, action(ArgAction::SetTrue))]
        can_search: bool,

        #[arg(long, action(ArgAction::SetTrue))]
        can_upload: bool,
    },

    /// Manage user groups
    #[command(subcommand)]
    Groups(GroupsCommand),

    /// Show the recorded actions for a package
    History {
        package_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PermissionsCommand {
    Get {
        user_id: String,
    },
    /// Replace a user's permissions. Unset flags are revoked
    Set {
        user_id: String,

        #[arg(long, action(ArgAction::SetTrue))]
        can_download: bool,

        #[arg(long, action(ArgAction::SetTrue))]
        can_search: bool,

        #[arg(long, action(ArgAction::SetTrue))]
        can_upload: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupsCommand {
    Create {
        name: String,
    },
    List,
    /// List the users in a group
    Users {
        group_id: String,
    },
    AddUser {
        group_id: String,
        user_id: String,
    },
    AddPackage {
        group_id: String,
        package_id: String,
    },
}
