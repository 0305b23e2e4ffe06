//! pitemp - Raspberry Pi temperature and humidity monitor binary.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pitemp::config::{
    parse_duration, DEFAULT_IIO_DEVICE, DEFAULT_IP_IFACE, DEFAULT_LCD_ADDRESS, DEFAULT_LCD_MESSAGE,
    DEFAULT_SENSOR_PIN, DEFAULT_SENSOR_RETRIES,
};
use pitemp::display::lcd::DEGREE_SYMBOL;
use pitemp::{
    sensor, ApiReading, AppConfig, DisplayConfig, InitPolicy, Mode, Reading, RemoteConfig,
    SensorConfig, SensorKind, WebConfig, DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pitemp")]
#[command(about = "🌡️ pitemp - Raspberry Pi temperature and humidity monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Reads a DHT11 sensor, shows the reading on an LCD and/or PiOLED, \
and serves it over HTTP. In client mode, mirrors another pitemp's reading instead.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Deployment mode
    #[arg(long, value_enum, default_value_t = Mode::Server)]
    mode: Mode,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port (use 8081 for a client next to a server)
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Do not serve HTTP
    #[arg(long)]
    no_http: bool,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Sensor driver
    #[arg(long, value_enum, default_value_t = SensorKind::Iio)]
    sensor: SensorKind,

    /// BCM pin of the DHT11 data line (gpio driver)
    #[arg(long, default_value_t = DEFAULT_SENSOR_PIN)]
    sensor_pin: u8,

    /// IIO device directory (iio driver)
    #[arg(long, default_value = DEFAULT_IIO_DEVICE)]
    iio_device: PathBuf,

    /// Time between sensor polls
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    poll_interval: Duration,

    /// Sensor retries per poll
    #[arg(long, default_value_t = DEFAULT_SENSOR_RETRIES)]
    retries: u32,

    /// Drive a 20x4 character LCD
    #[arg(long)]
    lcd: bool,

    /// Time between LCD refreshes
    #[arg(long, value_parser = parse_duration, default_value = "2s")]
    lcd_interval: Duration,

    /// I²C address of the LCD backpack
    #[arg(long, value_parser = parse_i2c_address, default_value_t = DEFAULT_LCD_ADDRESS)]
    lcd_address: u16,

    /// Leave the LCD backlight and text on at exit
    #[arg(long)]
    lcd_keep_backlight: bool,

    /// LCD line 1 text shown until the first reading
    #[arg(long, default_value = DEFAULT_LCD_MESSAGE)]
    message: String,

    /// Character code of the LCD's degree glyph
    #[arg(long, value_parser = parse_char_code, default_value_t = DEGREE_SYMBOL)]
    lcd_degree_symbol: u8,

    /// Drive the PiOLED (default)
    #[arg(long, overrides_with = "no_oled")]
    oled: bool,

    /// Do not drive the PiOLED
    #[arg(long, overrides_with = "oled")]
    no_oled: bool,

    /// Time between PiOLED refreshes
    #[arg(long, value_parser = parse_duration, default_value = "500ms")]
    oled_interval: Duration,

    /// Leave the last image on the PiOLED at exit
    #[arg(long)]
    oled_keep_image: bool,

    /// Flag readings older than this as stale
    #[arg(long, value_parser = parse_duration, default_value = "3m")]
    stale_after: Duration,

    /// What to do when a display fails to initialize
    #[arg(long, value_enum, default_value_t = InitPolicy::Disable)]
    display_init: InitPolicy,

    /// Network interface whose address is shown (empty to disable)
    #[arg(long, default_value = DEFAULT_IP_IFACE)]
    ip_iface: String,

    /// Peer API URL for client mode, e.g. http://pitemp.local:8080/api
    #[arg(long)]
    server: Option<String>,

    /// Time between fetches from the peer
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    fetch_interval: Duration,

    /// Quit after this long (0 runs forever)
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    quit_after: Duration,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor (default)
    Run,

    /// Take a single sensor reading and exit
    Read(ReadArgs),
}

#[derive(clap::Args)]
struct ReadArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

impl Cli {
    fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            kind: self.sensor,
            pin: self.sensor_pin,
            iio_device: self.iio_device.clone(),
            poll_interval: self.poll_interval,
            retries: self.retries,
        }
    }

    fn app_config(&self) -> AppConfig {
        let mut displays = Vec::new();
        if self.lcd {
            displays.push(
                DisplayConfig::lcd()
                    .with_refresh_interval(self.lcd_interval)
                    .with_i2c_address(self.lcd_address)
                    .with_message(&self.message)
                    .with_degree_symbol(self.lcd_degree_symbol)
                    .with_stale_after(self.stale_after)
                    .with_init_policy(self.display_init)
                    .with_clear_on_exit(!self.lcd_keep_backlight),
            );
        }
        // --oled and --no-oled override each other; the OLED is on by default.
        if self.oled || !self.no_oled {
            displays.push(
                DisplayConfig::oled()
                    .with_refresh_interval(self.oled_interval)
                    .with_stale_after(self.stale_after)
                    .with_init_policy(self.display_init)
                    .with_clear_on_exit(!self.oled_keep_image),
            );
        }

        let web = (!self.no_http && self.mode != Mode::Standalone).then(|| {
            WebConfig::new(&self.host, self.port).with_cors(!self.no_cors)
        });

        let remote = self.server.as_ref().map(|url| RemoteConfig {
            fetch_interval: self.fetch_interval,
            ..RemoteConfig::new(url)
        });

        AppConfig::new(self.mode)
            .with_sensor(self.sensor_config())
            .with_remote(remote)
            .with_displays(displays)
            .with_web(web)
            .with_ip_iface(&self.ip_iface)
            .with_quit_after((!self.quit_after.is_zero()).then_some(self.quit_after))
    }
}

fn parse_i2c_address(input: &str) -> Result<u16, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid I²C address {:?}: {}", input, e))
}

fn parse_char_code(input: &str) -> Result<u8, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid character code {:?}: {}", input, e))
}

/// How long exit waits for a sensor read still running on the blocking pool.
const BLOCKING_GRACE: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(async {
        match &cli.command {
            Some(Commands::Read(args)) => read_command(&cli, args).await,
            Some(Commands::Run) | None => {
                print_banner();
                run_command(&cli).await
            }
        }
    });

    // An aborted poller leaves its DHT retries running on the blocking pool.
    runtime.shutdown_timeout(BLOCKING_GRACE);
    result
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else if cli.verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("🌡️ pitemp - Raspberry Pi temperature and humidity monitor");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

async fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.app_config();

    info!("Configuration:");
    info!("  - Mode: {:?}", config.mode);
    match &config.remote {
        Some(remote) => info!("  - Peer: {} every {:?}", remote.url, remote.fetch_interval),
        None => info!(
            "  - Sensor: {:?} every {:?}",
            config.sensor.kind, config.sensor.poll_interval
        ),
    }
    for display_cfg in &config.displays {
        info!("  - Display: {} every {:?}", display_cfg.kind, display_cfg.refresh_interval);
    }
    match &config.web {
        Some(web) => info!("  - HTTP: {} (CORS {})", web.bind_address(), web.enable_cors),
        None => info!("  - HTTP: disabled"),
    }

    let summary = pitemp::app::run(config)
        .await
        .context("pitemp failed to start")?;
    info!("Stopped {} activities", summary.activities.len());
    Ok(())
}

async fn read_command(cli: &Cli, args: &ReadArgs) -> anyhow::Result<()> {
    let config = cli.sensor_config();
    let retries = config.retries;
    let measurement = tokio::task::spawn_blocking(move || {
        let mut sensor = sensor::open_sensor(&config)?;
        sensor.read(retries)
    })
    .await
    .context("sensor task failed")??;

    let reading = Reading::new(measurement.temperature, measurement.humidity, chrono::Utc::now());
    match args.format {
        OutputFormat::Json => {
            let ip = pitemp::net::display_ip(&cli.ip_iface).unwrap_or_default();
            let api = ApiReading::from_reading(&reading, ip);
            println!("{}", serde_json::to_string_pretty(&api)?);
        }
        OutputFormat::Pretty => {
            println!("🌡️  Temperature: {:.1}°C", reading.temperature());
            println!("💧 Humidity: {:.1}%", reading.humidity());
        }
    }

    Ok(())
}
