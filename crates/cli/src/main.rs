use anyhow::Context;
use clap::{Parser, Subcommand};
use pathlab_core::{
    Actor, BookingFilter, BookingService, CatalogService, CoreConfig, LabStore, LabTestFilter,
    NewLabTest, NewUser, PrescriptionService, UserRole, UserService,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pathlab")]
#[command(about = "Pathology lab booking store CLI")]
struct Cli {
    /// Lab data directory (defaults to `PATHLAB_DATA_DIR`, then `lab_data`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the lab data repository if it does not exist yet
    Init,
    /// Add catalog tests from a YAML list, skipping names already present
    SeedTests {
        /// YAML file holding a list of tests
        file: PathBuf,
    },
    /// Register an account
    CreateUser {
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Give the account the admin role
        #[arg(long)]
        admin: bool,
    },
    /// List catalog tests
    ListTests {
        /// Hide inactive tests
        #[arg(long)]
        active_only: bool,
    },
    /// List all bookings, latest appointment first
    ListBookings,
    /// List all prescriptions, newest first
    ListPrescriptions,
}

fn open_store(data_dir: Option<PathBuf>) -> anyhow::Result<Arc<LabStore>> {
    let data_dir = data_dir
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| std::env::var("PATHLAB_DATA_DIR").ok());
    let cfg = CoreConfig::from_values(data_dir, std::env::var("PATHLAB_LAB_NAME").ok())?;
    let store = LabStore::open(Arc::new(cfg))?;
    Ok(Arc::new(store))
}

fn read_seed_file(path: &Path) -> anyhow::Result<Vec<NewLabTest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_seed(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_seed(raw: &str) -> anyhow::Result<Vec<NewLabTest>> {
    let de = serde_yaml::Deserializer::from_str(raw);
    Ok(serde_path_to_error::deserialize(de)?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pathlab_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let actor = Actor::system("pathlab-cli")?;

    match cli.command {
        Some(Commands::Init) => {
            let store = open_store(cli.data_dir)?;
            println!("Lab data ready at {}", store.config().data_dir().display());
        }
        Some(Commands::SeedTests { file }) => {
            let tests = read_seed_file(&file)?;
            let catalog = CatalogService::new(open_store(cli.data_dir)?);
            let outcome = catalog.seed(&actor, tests)?;
            for test in &outcome.created {
                println!("Added {} ({}) at {}", test.name, test.category, test.price);
            }
            for name in &outcome.skipped {
                println!("Skipped {name}: already in the catalog");
            }
        }
        Some(Commands::CreateUser {
            name,
            email,
            phone,
            address,
            admin,
        }) => {
            let users = UserService::new(open_store(cli.data_dir)?);
            let role = if admin { UserRole::Admin } else { UserRole::User };
            let user = users.create(
                &actor,
                NewUser {
                    name,
                    email,
                    phone,
                    address,
                    role,
                },
            )?;
            println!("Created {} user {}: {}", user.role.as_str(), user.id, user.name);
        }
        Some(Commands::ListTests { active_only }) => {
            let catalog = CatalogService::new(open_store(cli.data_dir)?);
            let filter = LabTestFilter {
                active_only,
                ..LabTestFilter::default()
            };
            let tests = catalog.list(&filter)?;
            if tests.is_empty() {
                println!("No tests found.");
            }
            for t in tests {
                let state = if t.is_active { "active" } else { "inactive" };
                println!("{}  {}  [{}]  {}  {state}", t.id, t.name, t.category, t.price);
            }
        }
        Some(Commands::ListBookings) => {
            let bookings = BookingService::new(open_store(cli.data_dir)?);
            let list = bookings.list_all(&BookingFilter::default())?;
            if list.is_empty() {
                println!("No bookings found.");
            }
            for b in list {
                println!(
                    "{}  {}  {}  {}  total {}",
                    b.id, b.appointment_at, b.patient_name, b.status, b.total_price
                );
            }
        }
        Some(Commands::ListPrescriptions) => {
            let prescriptions = PrescriptionService::new(open_store(cli.data_dir)?);
            let list = prescriptions.list_all(None)?;
            if list.is_empty() {
                println!("No prescriptions found.");
            }
            for p in list {
                let booking = p.booking.map(|id| id.to_string()).unwrap_or_default();
                println!("{}  user {}  {}  {booking}", p.id, p.user_id, p.status);
            }
        }
        None => {
            println!("Use 'pathlab --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_seed_file_parses() {
        let tests = parse_seed(include_str!("../../../seed/tests.yaml")).expect("seed parses");
        assert_eq!(tests.len(), 7);
        assert!(tests.iter().any(|t| t.name == "CBC"));
    }

    #[test]
    fn seed_errors_name_the_field() {
        let err = parse_seed("- name: CBC\n  category: Hematology\n  price: lots\n")
            .expect_err("bad price");
        assert!(err.to_string().contains("price"), "{err}");
    }
}
