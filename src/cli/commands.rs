use std::fmt::Write;
use std::path::Path;

use registry_client::{
    AuthCredential, ClientError, CostReport, Metrics, Package, PackageHistoryEntry, PackagePage, PackageQuery,
    PackageSource, PackageUpdate, PackageUpload, Permissions, RegistryClient, UpdateData, UpdateMetadata,
    UserRegistration,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::cli::args::{Command, GroupsCommand, PermissionsCommand};
use crate::cli::models::{
    parse_group_id, parse_history_package_id, parse_offset, parse_package_id, parse_user_id, require_group_name,
    require_package_id, require_package_name, require_user_id,
};

type Result<T> = std::result::Result<T, ClientError>;

/// Run one subcommand and return what should be printed on success.
pub async fn run(client: &RegistryClient, command: Command) -> Result<String> {
    match command {
        Command::Packages { queries, offset } => {
            let offset = parse_offset(&offset)?;
            let queries = if queries.is_empty() {
                vec![PackageQuery::all()]
            } else {
                queries
            };
            let page = client.get_packages_page(offset, &queries).await?;
            Ok(render_page(&page))
        }
        Command::Reset => {
            client.reset_registry().await?;
            Ok("Registry reset.".to_string())
        }
        Command::Get { id } => {
            let id = require_package_id(&id)?;
            Ok(render_package(&client.get_package_by_id(&id).await?))
        }
        Command::Upload {
            name,
            content_file,
            url,
            js_program,
            debloat,
        } => {
            let upload = PackageUpload {
                name: require_package_name(&name)?,
                source: package_source(content_file.as_deref(), url)?,
                js_program,
                debloat: debloat.then_some(true),
            };
            let package = client.upload_package(&upload).await?;
            Ok(format!("Package uploaded with ID: {}", package.metadata.id))
        }
        Command::Update {
            id,
            name,
            package_version,
            content_file,
            url,
            js_program,
            debloat,
        } => {
            let id = require_package_id(&id)?;
            let update = PackageUpdate {
                metadata: UpdateMetadata {
                    name: require_package_name(&name)?,
                    version: package_version.trim().to_string(),
                },
                data: UpdateData {
                    source: package_source(content_file.as_deref(), url)?,
                    js_program,
                    debloat: debloat.then_some(true),
                },
            };
            client.update_package_by_id(&id, &update).await?;
            Ok(format!("Package {id} updated."))
        }
        Command::Search { regex } => {
            let packages = client.get_packages_by_regex(&regex).await?;
            Ok(render_search(&packages))
        }
        Command::Cost { id, dependency } => {
            let id = require_package_id(&id)?;
            Ok(render_cost(&client.get_package_cost(&id, dependency).await?))
        }
        Command::Rate { id } => {
            let id = require_package_id(&id)?;
            Ok(render_metrics(&client.get_package_rating(&id).await?))
        }
        Command::Tracks => Ok(client.get_tracks().await?.join("\n")),
        Command::Login {
            username,
            password,
            admin,
        } => {
            let credential = AuthCredential::new(username.trim(), SecretString::from(password), admin);
            let token = client.authenticate(&credential).await?;
            info!("Logged in. Pass the printed token with --token or REGISTRY_TOKEN");
            Ok(token.expose_secret().to_string())
        }
        Command::Logout => client.logout().await,
        Command::Permissions(PermissionsCommand::Get { user_id }) => {
            let user_id = require_user_id(&user_id)?;
            Ok(render_permissions(&client.get_permissions(&user_id).await?))
        }
        Command::Permissions(PermissionsCommand::Set {
            user_id,
            can_download,
            can_search,
            can_upload,
        }) => {
            let user_id = require_user_id(&user_id)?;
            let permissions = Permissions {
                can_download,
                can_search,
                can_upload,
            };
            client.update_permissions(&user_id, &permissions).await
        }
        Command::Register {
            name,
            password,
            admin,
            group_id,
            can_download,
            can_search,
            can_upload,
        } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClientError::Validation("User name is required.".to_string()));
            }
            let registration = UserRegistration {
                name: name.to_string(),
                password: SecretString::from(password),
                is_admin: admin,
                group_id: parse_group_id(&group_id)?,
                can_download,
                can_search,
                can_upload,
            };
            client.register_user(&registration).await
        }
        Command::Groups(command) => run_groups(client, command).await,
        Command::History { package_id } => {
            let package_id = parse_history_package_id(&package_id)?;
            Ok(render_history(&client.get_history(package_id).await?))
        }
    }
}

async fn run_groups(client: &RegistryClient, command: GroupsCommand) -> Result<String> {
    match command {
        GroupsCommand::Create { name } => {
            let name = require_group_name(&name)?;
            let id = client.create_group(&name).await?;
            Ok(format!("Group created successfully with ID: {id}"))
        }
        GroupsCommand::List => {
            let groups = client.get_groups().await?;
            Ok(groups
                .iter()
                .map(|g| format!("{}\t{}", g.id, g.group_name))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        GroupsCommand::Users { group_id } => {
            let users = client.get_users_in_group(parse_group_id(&group_id)?).await?;
            Ok(users
                .iter()
                .map(|u| format!("{}\t{}", u.id, u.name))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        GroupsCommand::AddUser { group_id, user_id } => {
            let group_id = parse_group_id(&group_id)?;
            let user_id = parse_user_id(&user_id)?;
            client.assign_user_to_group(group_id, user_id).await
        }
        GroupsCommand::AddPackage { group_id, package_id } => {
            let group_id = parse_group_id(&group_id)?;
            let package_id = parse_package_id(&package_id)?;
            client.assign_package_to_group(group_id, package_id).await
        }
    }
}

/// Read a package's bytes from disk, or pass a URL through. `None` when
/// neither was given.
fn package_source(content_file: Option<&Path>, url: Option<String>) -> Result<Option<PackageSource>> {
    if let Some(path) = content_file {
        let bytes = std::fs::read(path)
            .map_err(|e| ClientError::Validation(format!("Failed to read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Read {} bytes of package content", bytes.len());
        return Ok(Some(PackageSource::from_bytes(&bytes)));
    }
    Ok(url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .map(PackageSource::Url))
}

fn render_page(page: &PackagePage) -> String {
    let mut out = if page.entries.is_empty() {
        "No packages found.".to_string()
    } else {
        page.entries
            .iter()
            .map(|p| format!("{}\t{}\t{}", p.id, p.name, p.version))
            .collect::<Vec<_>>()
            .join("\n")
    };
    if let Some(next) = page.next_offset {
        let _ = write!(out, "\nNext offset: {next}");
    }
    out
}

fn render_package(package: &Package) -> String {
    let mut out = format!(
        "ID: {}\nName: {}\nVersion: {}",
        package.metadata.id, package.metadata.name, package.metadata.version
    );
    if let Some(url) = &package.data.url {
        let _ = write!(out, "\nURL: {url}");
    }
    if let Some(content) = &package.data.content {
        let _ = write!(out, "\nContent: {} base64 characters", content.len());
    }
    if let Some(js_program) = package.data.js_program.as_deref().filter(|p| !p.is_empty()) {
        let _ = write!(out, "\nJSProgram:\n{js_program}");
    }
    out
}

fn render_search(packages: &[Package]) -> String {
    if packages.is_empty() {
        return "No packages found.".to_string();
    }
    packages
        .iter()
        .map(|p| format!("{}\t{}\t{}", p.metadata.id, p.metadata.name, p.metadata.version))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_cost(report: &CostReport) -> String {
    report
        .iter()
        .map(|(id, cost)| match cost.standalone_cost {
            Some(standalone) => format!("{id}\tstandalone {standalone:.2} MB\ttotal {:.2} MB", cost.total_cost),
            None => format!("{id}\ttotal {:.2} MB", cost.total_cost),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_metrics(metrics: &Metrics) -> String {
    metrics
        .scores()
        .iter()
        .map(|(name, score, latency)| format!("{name}: {score:.2} ({latency}ms)"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_permissions(permissions: &Permissions) -> String {
    format!(
        "Download: {}\nSearch: {}\nUpload: {}",
        permissions.can_download, permissions.can_search, permissions.can_upload
    )
}

fn render_history(entries: &[PackageHistoryEntry]) -> String {
    if entries.is_empty() {
        return "No history recorded.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let date = e.action_time().map_or_else(|| e.action_date.clone(), |time| time.to_rfc3339());
            format!("{date}\t{}\tuser {}", e.action, e.user_id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
