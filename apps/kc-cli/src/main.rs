use clap::{Parser, Subcommand};
use kc_controls::GUARD_MARGIN_S;
use kc_core::{TemperatureUnit, convert_temperature};
use kc_project::{LoopDef, Plant, load_plant, plant_template, save_yaml};
use kc_runtime::{
    CycleRecord, RuntimeError, RuntimeResult, SimNode, SimulatedPlant, StopSignal, ThermalParams,
    ThermalPlant, compile_loop,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kc-cli")]
#[command(about = "Kettle-control CLI - PID and hysteresis temperature loops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a plant configuration file
    Validate {
        /// Path to the plant YAML or JSON file
        config_path: PathBuf,
    },
    /// List the control loops of a plant
    Loops {
        /// Path to the plant YAML or JSON file
        config_path: PathBuf,
    },
    /// Write a starter plant configuration
    Init {
        /// Where to write the YAML file
        config_path: PathBuf,
        /// Use degrees Fahrenheit
        #[arg(long)]
        fahrenheit: bool,
    },
    /// Run a loop against a simulated kettle
    Simulate {
        /// Path to the plant YAML or JSON file
        config_path: PathBuf,
        /// Loop ID to run
        loop_id: String,
        /// Simulated time in seconds
        #[arg(long, default_value_t = 3600.0)]
        duration: f64,
        /// Target temperature in the plant's unit
        #[arg(long)]
        setpoint: f64,
        /// Ambient temperature in the plant's unit (defaults to 20 °C)
        #[arg(long)]
        ambient: Option<f64>,
        /// Model a chiller instead of a heater
        #[arg(long)]
        cooling: bool,
        /// Print every Nth cycle
        #[arg(long, default_value_t = 24)]
        every: usize,
        /// Write every cycle to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> RuntimeResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Loops { config_path } => cmd_loops(&config_path),
        Commands::Init {
            config_path,
            fahrenheit,
        } => cmd_init(&config_path, fahrenheit),
        Commands::Simulate {
            config_path,
            loop_id,
            duration,
            setpoint,
            ambient,
            cooling,
            every,
            csv,
        } => cmd_simulate(
            &config_path,
            &loop_id,
            SimOptions {
                duration,
                setpoint,
                ambient,
                cooling,
                every: every.max(1),
            },
            csv.as_deref(),
        ),
    }
}

fn cmd_validate(config_path: &Path) -> RuntimeResult<()> {
    println!("Validating plant: {}", config_path.display());
    let plant = load_plant(config_path)?;
    println!(
        "✓ Plant is valid ({} sensors, {} loops)",
        plant.sensors.len(),
        plant.loops.len()
    );
    Ok(())
}

fn cmd_loops(config_path: &Path) -> RuntimeResult<()> {
    let plant = load_plant(config_path)?;

    if plant.loops.is_empty() {
        println!("No loops found in plant");
        return Ok(());
    }

    println!("Loops in {} ({}):", plant.name, plant.unit.symbol());
    for def in &plant.loops {
        let wiring = match def.inner_sensor() {
            Some(inner) => format!("{} -> {}", def.sensor, inner),
            None => def.sensor.clone(),
        };
        println!(
            "  {} - {} ({}, sensor {}, every {} s)",
            def.id,
            def.name,
            def.controller.kind_name(),
            wiring,
            def.update_interval_s
        );
    }
    Ok(())
}

fn cmd_init(config_path: &Path, fahrenheit: bool) -> RuntimeResult<()> {
    if config_path.exists() {
        return Err(RuntimeError::Config {
            message: format!("{} already exists", config_path.display()),
        });
    }
    let unit = if fahrenheit {
        TemperatureUnit::Fahrenheit
    } else {
        TemperatureUnit::Celsius
    };
    let plant = plant_template(unit);
    save_yaml(config_path, &plant)?;
    println!("✓ Wrote {} loops to {}", plant.loops.len(), config_path.display());
    Ok(())
}

struct SimOptions {
    duration: f64,
    setpoint: f64,
    ambient: Option<f64>,
    cooling: bool,
    every: usize,
}

fn cmd_simulate(
    config_path: &Path,
    loop_id: &str,
    options: SimOptions,
    csv_path: Option<&Path>,
) -> RuntimeResult<()> {
    let plant = load_plant(config_path)?;
    let def = plant
        .find_loop(loop_id)
        .ok_or_else(|| RuntimeError::Config {
            message: format!("unknown loop: {loop_id}"),
        })?;
    if def.update_interval_s <= GUARD_MARGIN_S {
        return Err(RuntimeError::Config {
            message: format!(
                "update interval of {} s leaves no time to sleep; cannot simulate",
                def.update_interval_s
            ),
        });
    }
    if !(options.duration.is_finite() && options.duration > 0.0) {
        return Err(RuntimeError::Config {
            message: "duration must be positive".to_string(),
        });
    }

    let sim = simulated_plant(&plant, def, &options)?;
    let mut control_loop = compile_loop(&plant, loop_id, sim.io(), Box::new(sim.clock()))?;
    tracing::info!(
        loop_id,
        duration_s = options.duration,
        setpoint = options.setpoint,
        cooling = options.cooling,
        "Starting simulation"
    );

    println!(
        "Simulating loop {} ({}) for {} s, setpoint {:.2}{}",
        def.id,
        def.controller.kind_name(),
        options.duration,
        options.setpoint,
        plant.unit.symbol()
    );
    println!(
        "{:>9} {:>9} {:>9} {:>9} {:>9}",
        "time_s", "actual", "inner_sp", "inner", "output"
    );

    let mut csv =
        String::from("time_s,setpoint,actual,inner_setpoint,inner_actual,output,integrator\n");
    let mut count = 0usize;
    let summary = control_loop.run_with_observer(&StopSignal::never(), |record| {
        if count % options.every == 0 {
            print_row(record);
        }
        push_csv_row(&mut csv, record);
        count += 1;
    })?;

    let final_plant = sim.plant();
    println!(
        "✓ {} cycles, {} overruns, kettle {:.2}{}, element {:.2}{}",
        summary.stats.cycles(),
        summary.stats.overruns(),
        final_plant.kettle(),
        plant.unit.symbol(),
        final_plant.element(),
        plant.unit.symbol()
    );

    if let Some(path) = csv_path {
        std::fs::write(path, csv)?;
        tracing::debug!(path = %path.display(), rows = count, "Wrote CSV export");
        println!("✓ Exported {count} cycles to {}", path.display());
    }
    Ok(())
}

/// Kettle node on the loop's sensor, element node on its inner sensor.
fn simulated_plant(
    plant: &Plant,
    def: &LoopDef,
    options: &SimOptions,
) -> RuntimeResult<SimulatedPlant> {
    let unit = plant.unit;
    let ambient = options
        .ambient
        .unwrap_or_else(|| convert_temperature(20.0, TemperatureUnit::Celsius, unit));

    let mut params = ThermalParams::default();
    params.heater_rate *= unit.celsius_degree();
    if options.cooling {
        params = params.cooling();
    }

    let mut sim = SimulatedPlant::new(ThermalPlant::new(params, ambient)?)
        .with_channel(def.sensor.as_str(), SimNode::Kettle)
        .with_setpoint(options.setpoint)
        .with_horizon(options.duration);
    if let Some(inner) = def.inner_sensor() {
        sim = sim.with_channel(inner, SimNode::Element);
    }
    Ok(sim)
}

fn print_row(record: &CycleRecord) {
    let step = &record.step;
    let (actual, inner_sp) = match &step.outer {
        Some(outer) => (outer.actual, format!("{:.2}", step.inner.target)),
        None => (step.inner.actual, "-".to_string()),
    };
    let inner = if step.outer.is_some() {
        format!("{:.2}", step.inner.actual)
    } else {
        "-".to_string()
    };
    println!(
        "{:>9.1} {:>9.2} {:>9} {:>9} {:>9}",
        record.started_at,
        actual,
        inner_sp,
        inner,
        step.output().to_string()
    );
}

fn push_csv_row(csv: &mut String, record: &CycleRecord) {
    let step = &record.step;
    let (setpoint, actual, inner_sp, inner_actual) = match &step.outer {
        Some(outer) => (
            outer.target,
            outer.actual,
            step.inner.target.to_string(),
            step.inner.actual.to_string(),
        ),
        None => (step.inner.target, step.inner.actual, String::new(), String::new()),
    };
    let integrator = step
        .inner
        .integrator
        .map(|v| v.to_string())
        .unwrap_or_default();
    // writing to a String cannot fail
    let _ = writeln!(
        csv,
        "{},{},{},{},{},{},{}",
        record.started_at,
        setpoint,
        actual,
        inner_sp,
        inner_actual,
        step.output().as_power(),
        integrator
    );
}
