use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pulumiservice::config::Config;
use pulumiservice::resource::{self, dispatch, resolve_kind, Declaration, ResourceDef};
use pulumiservice::service::{format_service_error, ServiceClient};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Manage Pulumi Cloud resources from declaration files
#[derive(Parser, Debug)]
#[command(name = "pulumiservice", version = pulumiservice::VERSION, about, long_about = None)]
struct Args {
    /// Pulumi Cloud access token
    #[arg(long, env = "PULUMI_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Pulumi Cloud API URL
    #[arg(long)]
    service_url: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every resource kind
    Kinds,
    /// Show the fields of a resource kind
    Schema { kind: String },
    /// Check a declaration file without contacting Pulumi Cloud
    Validate { file: PathBuf },
    /// Create the resource declared in a file
    Create { file: PathBuf },
    /// Read a resource by kind and ID
    Read { kind: String, id: String },
    /// Update an existing resource to match a declaration file
    Update { id: String, file: PathBuf },
    /// Delete a resource by kind and ID
    Delete {
        kind: String,
        id: String,
        /// Declaration carrying inputs the service never returns, such as forceDestroy
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the configuration file and its values
    Show,
    /// Save a service URL or default organization; an empty value clears it
    Set {
        #[arg(long)]
        service_url: Option<String>,
        #[arg(long)]
        organization: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = level.as_filter()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("pulumiservice={}", filter)))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("pulumiservice {} started with log level: {:?}", pulumiservice::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("pulumiservice").join("pulumiservice.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".pulumiservice").join("pulumiservice.log");
    }
    PathBuf::from("pulumiservice.log")
}

/// On-disk declaration: `{ kind, properties }` in YAML or JSON
#[derive(Debug, Deserialize)]
struct DeclarationFile {
    kind: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl DeclarationFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Fill the organization from config when the file leaves it out
    fn with_default_organization(mut self, config: &Config) -> Self {
        let (Some(org), Some((_, def))) = (&config.organization, resolve_kind(&self.kind)) else {
            return self;
        };
        for field in ["organization", "organizationName"] {
            if def.field(field).is_some() && !self.properties.contains_key(field) {
                self.properties.insert(field.to_string(), Value::String(org.clone()));
            }
        }
        self
    }

    fn declare(self) -> Result<Declaration> {
        Declaration::new(&self.kind, self.properties)
            .with_context(|| format!("Invalid {} declaration", self.kind))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_service_error(&err));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();
    let connect = || -> Result<ServiceClient> {
        let service_url = config.effective_service_url(args.service_url.as_deref());
        let token = config.effective_token(args.access_token.as_deref())?;
        tracing::info!("Using Pulumi Cloud at {}", service_url);
        ServiceClient::new(&service_url, token)
    };

    match &args.command {
        Command::Kinds => {
            for key in resource::get_all_resource_keys() {
                if let Some(def) = resource::get_resource(key) {
                    println!("{:<30} {}", key, def.token);
                }
            }
            Ok(())
        }
        Command::Schema { kind } => {
            let (key, def) =
                resolve_kind(kind).ok_or_else(|| anyhow::anyhow!("Unknown resource kind: {}", kind))?;
            print_schema(key, def);
            Ok(())
        }
        Command::Validate { file } => {
            let decl_file = DeclarationFile::load(file)?.with_default_organization(&config);
            let failures = resource::check(&decl_file.kind, &decl_file.properties);
            if failures.is_empty() {
                println!("{}: valid {}", file.display(), decl_file.kind);
                return Ok(());
            }
            for failure in &failures {
                println!("{}: {}", file.display(), failure);
            }
            Err(anyhow::anyhow!("{} validation error(s)", failures.len()))
        }
        Command::Create { file } => {
            let decl = DeclarationFile::load(file)?
                .with_default_organization(&config)
                .declare()?;
            let client = connect()?;
            let created = dispatch::create(&client, decl).await?;
            print_declaration(&created)
        }
        Command::Read { kind, id } => {
            let client = connect()?;
            match dispatch::read(&client, kind, id, None).await? {
                Some(decl) => print_declaration(&decl),
                None => Err(anyhow::anyhow!("{} '{}' not found", kind, id)),
            }
        }
        Command::Update { id, file } => {
            let new = DeclarationFile::load(file)?
                .with_default_organization(&config)
                .declare()?;
            let client = connect()?;
            let updated = dispatch::update_by_id(&client, id, new).await?;
            print_declaration(&updated)
        }
        Command::Delete { kind, id, file } => {
            let client = connect()?;
            match file {
                Some(file) => {
                    let prior = DeclarationFile::load(file)?
                        .with_default_organization(&config)
                        .declare()?;
                    let current = dispatch::read(&client, kind, id, Some(&prior))
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", kind, id))?;
                    dispatch::delete(&client, &current).await?;
                }
                None => dispatch::delete_by_id(&client, kind, id).await?,
            }
            println!("Deleted {} '{}'", kind, id);
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Show => print_config(&config),
            ConfigAction::Set {
                service_url,
                organization,
            } => {
                if service_url.is_none() && organization.is_none() {
                    return Err(anyhow::anyhow!("Nothing to set; pass --service-url or --organization"));
                }
                let mut config = config.clone();
                if let Some(url) = service_url {
                    config.set_service_url(url)?;
                }
                if let Some(org) = organization {
                    config.set_organization(org)?;
                }
                config.save().context("Failed to save configuration")?;
                tracing::info!("Configuration saved");
                print_config(&config)
            }
        },
    }
}

fn print_config(config: &Config) -> Result<()> {
    if let Some(path) = Config::config_path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_declaration(decl: &Declaration) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&decl.to_masked_value())?);
    Ok(())
}

fn print_schema(key: &str, def: &ResourceDef) {
    println!("{} ({})", def.display_name, key);
    println!("token: {}", def.token);
    println!("id: {}", def.id_format);
    if !def.description.is_empty() {
        println!("{}", def.description);
    }
    println!();
    for field in &def.fields {
        let mut flags = Vec::new();
        if field.output {
            flags.push("output".to_string());
        } else if field.required {
            flags.push("required".to_string());
        } else {
            flags.push("optional".to_string());
        }
        if field.secret {
            flags.push("secret".to_string());
        }
        if field.replace_on_change || (def.replace_on_any_change && field.is_input()) {
            flags.push("replace".to_string());
        }
        if let Some(default) = &field.default {
            flags.push(format!("default={}", default));
        }
        if let Some(values) = field.allowed_values() {
            let values: Vec<String> = values.iter().map(Value::to_string).collect();
            flags.push(format!("one of [{}]", values.join(", ")));
        }
        println!(
            "  {:<22} {:<12} {}",
            field.name,
            field.field_type.as_str(),
            flags.join(", ")
        );
        if !field.description.is_empty() {
            println!("  {:<22} {}", "", field.description);
        }
    }
}
