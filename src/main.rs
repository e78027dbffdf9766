use clap::{Parser, Subcommand};
use han_rs::{
    init_logger, log_info, message_channel, read_meter_message, setup_meter_connection, Config,
    ConnectionSettings, ConnectionType, MeterMessage, MqttSettings,
};

#[derive(Parser)]
#[command(name = "han-cli")]
#[command(about = "Read and detect HAN smart meter messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read messages from a serial HAN port
    Serial {
        port: String,
        #[arg(short, long, default_value = "2400")]
        baudrate: u32,
        #[arg(long, default_value = "8")]
        data_bits: u8,
        #[arg(long, default_value = "1")]
        stop_bits: u8,
    },
    /// Read messages from a TCP bridge in front of a HAN port
    Tcp { host: String, port: u16 },
    /// Subscribe to MQTT topics carrying meter payloads
    Mqtt {
        host: String,
        #[arg(short, long, default_value = "1883")]
        port: u16,
        /// Comma-separated topic list
        #[arg(short, long)]
        topics: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Classify one hex payload and print the verdict
    Classify { hex_payload: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serial {
            port,
            baudrate,
            data_bits,
            stop_bits,
        } => {
            let config = Config {
                connection_type: ConnectionType::Serial,
                settings: ConnectionSettings {
                    serial_port: Some(port),
                    baud_rate: baudrate,
                    data_bits,
                    stop_bits,
                    ..ConnectionSettings::default()
                },
                mqtt: None,
            };
            run_connection(config).await?;
        }
        Commands::Tcp { host, port } => {
            let config = Config {
                connection_type: ConnectionType::Tcp,
                settings: ConnectionSettings {
                    tcp_host: Some(host),
                    tcp_port: Some(port),
                    ..ConnectionSettings::default()
                },
                mqtt: None,
            };
            run_connection(config).await?;
        }
        Commands::Mqtt {
            host,
            port,
            topics,
            username,
            password,
        } => {
            let config = Config {
                connection_type: ConnectionType::Mqtt,
                settings: ConnectionSettings::default(),
                mqtt: Some(MqttSettings {
                    host,
                    port,
                    username,
                    password,
                    client_id: None,
                    topics,
                    keep_alive_secs: 60,
                }),
            };
            run_connection(config).await?;
        }
        Commands::Classify { hex_payload } => {
            classify_payload(&hex_payload);
        }
    }

    Ok(())
}

/// Run a long-lived source and print every accepted message
async fn run_connection(config: Config) -> anyhow::Result<()> {
    let (sender, mut receiver) = message_channel();
    let connection = setup_meter_connection(&config, sender).await?;
    log_info("Meter connection is up, waiting for messages");

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(message) => print_message(&message),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log_info("Shutting down");
                break;
            }
        }
    }
    connection.stop().await;
    Ok(())
}

fn print_message(message: &MeterMessage) {
    let payload = message.payload().map(hex::encode).unwrap_or_default();
    println!(
        "{} valid={} payload={payload}",
        message.message_type(),
        message.is_valid()
    );
}

fn classify_payload(hex_payload: &str) {
    match read_meter_message("cli", hex_payload.trim().as_bytes()) {
        Some(message) => println!(
            "{} valid={} bytes={}",
            message.message_type(),
            message.is_valid(),
            hex::encode(message.as_bytes())
        ),
        None => println!("no message"),
    }
}
