use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn verify(
        &self,
        person_id: i64,
        session_id: i64,
        descriptor_values: &[f64],
        image: &[u8],
    ) -> zbus::Result<String>;
    async fn identify(&self, descriptor_values: &[f64]) -> zbus::Result<String>;
    async fn reconcile(&self, person_id: i64, subject_id: i64) -> zbus::Result<String>;
    async fn enroll(
        &self,
        person_id: i64,
        descriptor_values: &[f64],
        image: &[u8],
    ) -> zbus::Result<String>;
    async fn list_vectors(&self, person_id: i64) -> zbus::Result<String>;
    async fn remove_vector(&self, person_id: i64, vector_id: &str) -> zbus::Result<bool>;
    async fn remove_all_vectors(&self, person_id: i64) -> zbus::Result<u32>;
    async fn list_records(&self, person_id: i64, subject_id: i64) -> zbus::Result<String>;
    async fn summary(&self, person_id: i64, subject_id: i64) -> zbus::Result<String>;
    async fn get_session_window(&self, session_id: i64) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-verified attendance CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session_bus: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a person in to a session
    Verify {
        #[arg(long)]
        person: i64,
        #[arg(long)]
        session: i64,
        /// JSON file holding the face descriptor as an array of numbers
        #[arg(long)]
        descriptor: PathBuf,
        /// Captured image to store with the record
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Find the closest enrolled person for a descriptor
    Identify {
        #[arg(long)]
        descriptor: PathBuf,
    },
    /// Mark elapsed, unrecorded sessions of a subject absent
    Reconcile {
        #[arg(long)]
        person: i64,
        #[arg(long)]
        subject: i64,
    },
    /// Enroll a face descriptor for a person
    Enroll {
        #[arg(long)]
        person: i64,
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List enrolled face vectors
    Vectors {
        #[arg(long)]
        person: i64,
    },
    /// Remove one enrolled vector, or all of them with --all
    Remove {
        #[arg(long)]
        person: i64,
        /// Vector ID to remove
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// List attendance records for a subject
    Records {
        #[arg(long)]
        person: i64,
        #[arg(long)]
        subject: i64,
    },
    /// Present/late/absent counts for a subject
    Summary {
        #[arg(long)]
        person: i64,
        #[arg(long)]
        subject: i64,
    },
    /// Show a session's check-in window
    Window {
        #[arg(long)]
        session: i64,
    },
    /// Show daemon status
    Status,
}

fn read_descriptor(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    let values: Vec<f64> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of numbers", path.display()))?;
    if values.is_empty() {
        bail!("descriptor {} is empty", path.display());
    }
    Ok(values)
}

fn read_image(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display())),
        None => Ok(Vec::new()),
    }
}

/// Replies are compact JSON; reformat them for the terminal.
fn print_json(reply: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(reply).context("daemon returned malformed JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    let proxy = AttendanceProxy::new(&conn)
        .await
        .context("rollcalld is not reachable")?;
    tracing::debug!(session_bus = cli.session_bus, "connected to rollcalld");

    match cli.command {
        Commands::Verify {
            person,
            session,
            descriptor,
            image,
        } => {
            let values = read_descriptor(&descriptor)?;
            let image = read_image(image.as_deref())?;
            print_json(&proxy.verify(person, session, &values, &image).await?)?;
        }
        Commands::Identify { descriptor } => {
            let values = read_descriptor(&descriptor)?;
            print_json(&proxy.identify(&values).await?)?;
        }
        Commands::Reconcile { person, subject } => {
            print_json(&proxy.reconcile(person, subject).await?)?;
        }
        Commands::Enroll {
            person,
            descriptor,
            image,
        } => {
            let values = read_descriptor(&descriptor)?;
            let image = read_image(image.as_deref())?;
            let id = proxy.enroll(person, &values, &image).await?;
            println!("Enrolled vector {id} for person {person}");
        }
        Commands::Vectors { person } => {
            print_json(&proxy.list_vectors(person).await?)?;
        }
        Commands::Remove { person, id, all } => {
            if all {
                let removed = proxy.remove_all_vectors(person).await?;
                println!("Removed {removed} vector(s) for person {person}");
            } else if let Some(id) = id {
                if proxy.remove_vector(person, &id).await? {
                    println!("Removed vector {id}");
                } else {
                    bail!("no vector {id} for person {person}");
                }
            }
        }
        Commands::Records { person, subject } => {
            print_json(&proxy.list_records(person, subject).await?)?;
        }
        Commands::Summary { person, subject } => {
            print_json(&proxy.summary(person, subject).await?)?;
        }
        Commands::Window { session } => {
            print_json(&proxy.get_session_window(session).await?)?;
        }
        Commands::Status => {
            print_json(&proxy.status().await?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_remove_requires_id_or_all() {
        assert!(Cli::try_parse_from(["rollcall", "remove", "--person", "1"]).is_err());
        assert!(Cli::try_parse_from(["rollcall", "remove", "--person", "1", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["rollcall", "remove", "--person", "1", "abc"]).is_ok());
        assert!(
            Cli::try_parse_from(["rollcall", "remove", "--person", "1", "abc", "--all"]).is_err()
        );
    }

    #[test]
    fn test_read_descriptor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[0.25, -1.0, 3]").unwrap();
        assert_eq!(read_descriptor(file.path()).unwrap(), vec![0.25, -1.0, 3.0]);

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, "[]").unwrap();
        assert!(read_descriptor(empty.path()).is_err());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{\"x\": 1}}").unwrap();
        assert!(read_descriptor(bad.path()).is_err());
    }

    #[test]
    fn test_missing_image_is_empty() {
        assert!(read_image(None).unwrap().is_empty());
    }
}
