use clap::{Parser, Subcommand};
use dispensary_core::{
    CoreConfig, DeviceClient, DispatchCoordinator, DocumentId, FileStore, HttpDeviceClient,
    MedicineRepository, NonEmptyText, PatientRepository, PrescriptionSelector, PrescriptionState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispensary")]
#[command(about = "Prescription dispensary CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the dispensing device answers
    Ping,
    /// Show the dispensing device's status
    Status,
    /// List patients and their prescriptions
    Patients {
        /// Only patients registered by this staff member
        #[arg(long)]
        created_by: Option<String>,
    },
    /// List the medicine catalogue
    Medicines,
    /// Dispense one prescription through the device
    Dispense {
        /// Patient id
        patient_id: String,
        /// Prescription position, or its stable id
        prescription: String,
        /// Staff member dispensing
        #[arg(long)]
        staff: String,
        /// Units to dispense (default 1)
        #[arg(long)]
        quantity: Option<u32>,
    },
}

fn load_config() -> anyhow::Result<CoreConfig> {
    Ok(CoreConfig::from_env_values(
        std::env::var("PATIENT_DATA_DIR").ok(),
        std::env::var("DISPENSARY_DEVICE_URL").ok(),
        std::env::var("DISPENSARY_DEVICE_TIMEOUT_SECS").ok(),
    )?)
}

fn parse_selector(raw: &str) -> anyhow::Result<PrescriptionSelector> {
    Ok(match raw.parse::<usize>() {
        Ok(index) => index.into(),
        Err(_) => DocumentId::parse(raw)?.into(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dispensary=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config()?;
    let store = Arc::new(FileStore::new(cfg.patient_data_dir()));

    match cli.command {
        Some(Commands::Ping) => {
            let device = HttpDeviceClient::new(cfg.device())?;
            device.ping().await?;
            println!("Device at {} is reachable", device.base_url());
        }
        Some(Commands::Status) => {
            let status = HttpDeviceClient::new(cfg.device())?.status().await?;
            println!("Status: {}", status.status);
            if let Some(ip) = status.ip {
                println!("IP: {ip}");
            }
            println!("Uptime: {}s", status.uptime);
            println!("Dispensing: {}", status.dispensing);
            println!("Servo position: {}", status.servo_position);
        }
        Some(Commands::Patients { created_by }) => {
            let created_by = created_by.map(NonEmptyText::new).transpose()?;
            let patients = PatientRepository::new(store)
                .list(created_by.as_ref())
                .await?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in patients {
                println!(
                    "ID: {}, Name: {}, Age: {}, Created by: {}",
                    patient.id, patient.data.name, patient.data.age, patient.data.created_by
                );
                for (index, prescription) in patient.data.prescriptions.iter().enumerate() {
                    let medicine = prescription.medicine();
                    let status = match prescription.state() {
                        PrescriptionState::Active => "active".to_string(),
                        PrescriptionState::Dispensed(record) => format!(
                            "dispensed x{} by {} at {}",
                            record.quantity_dispensed, record.dispensed_by, record.dispensed_at
                        ),
                    };
                    println!(
                        "  [{index}] {} {} ({}) - {status}",
                        medicine.medicine_name, medicine.dosage, medicine.frequency
                    );
                }
            }
        }
        Some(Commands::Medicines) => {
            let medicines = MedicineRepository::new(store).list().await?;
            if medicines.is_empty() {
                println!("No medicines found.");
            }
            for medicine in medicines {
                let details = medicine.data.details;
                println!(
                    "ID: {}, Name: {}, Dosage: {}, Frequency: {}",
                    medicine.id, details.name, details.dosage, details.frequency
                );
            }
        }
        Some(Commands::Dispense {
            patient_id,
            prescription,
            staff,
            quantity,
        }) => {
            let patient_id = DocumentId::parse(&patient_id)?;
            let selector = parse_selector(&prescription)?;
            let staff = NonEmptyText::new(staff)?;
            let device: Arc<dyn DeviceClient> = Arc::new(HttpDeviceClient::new(cfg.device())?);
            let coordinator = DispatchCoordinator::new(PatientRepository::new(store), device);

            let dispensed = coordinator
                .dispatch(&patient_id, selector, quantity, &staff)
                .await?
                .prescription;
            let record = dispensed.dispense_record();
            println!(
                "Dispensed {} unit(s) of {} {} for patient {}",
                record.map_or(0, |r| r.quantity_dispensed),
                dispensed.medicine().medicine_name,
                dispensed.medicine().dosage,
                patient_id
            );
        }
        None => {
            println!("Use 'dispensary --help' for commands");
        }
    }

    Ok(())
}
