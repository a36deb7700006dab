use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use fsnav_core::bus::config::{has_flag, locate_section, read_parameter};
use fsnav_core::plugins::alignment::{AlignmentGyrocompass, AlignmentLeveling, AlignmentYawZero};
use fsnav_core::plugins::attitude::{AttitudeMadgwick, AttitudeRodrigues};
use fsnav_core::plugins::calibration::{CalibrationLinear, CalibrationTemp, StaticDriftCompensation};
use fsnav_core::plugins::gravity::{GravityConstant, GravityNormal};
use fsnav_core::plugins::io::{
    AxisRemap, OutputWriter, ProgressReporter, RawInputReader, SensorWriter, StepSync,
};
use fsnav_core::plugins::motion::{MotionEuler, VerticalDamping};
use fsnav_core::Bus;

const CONFIG_BUFFER_SIZE: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "fsnav_ins")]
#[command(about = "strapdown INS runtime driven by a plugin bus")]
struct Args {
    /// path to the flat-text configuration file
    #[arg(long, default_value = "fsnav_ins.cfg")]
    config: PathBuf,

    /// print a progress line to stderr every N ticks
    #[arg(long, default_value_t = 1000)]
    progress_every: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading configuration file {:?}", args.config))?;
    if cfg.len() > CONFIG_BUFFER_SIZE {
        anyhow::bail!(
            "configuration exceeds {} bytes ({})",
            CONFIG_BUFFER_SIZE,
            cfg.len()
        );
    }

    // common/flag settings live outside any named section; calibration
    // and alignment presets live in the "imu" section
    let imu_section = locate_section(&cfg, "imu")
        .unwrap_or("")
        .to_string();
    let use_constant_gravity = has_flag(&cfg, "g_const");
    let use_leveling_alignment = has_flag(&cfg, "accs_align");
    let use_yaw_zero = has_flag(&cfg, "yaw_zero");
    let use_static_drift = has_flag(&imu_section, "static_drift");
    let madgwick_rate = read_parameter(&imu_section, "madgwick_feedback_rate", 0.0, None);
    let has_temp_coeffs = (1..=3).any(|i| {
        has_flag(&imu_section, &format!("df0{i}_a0")) || has_flag(&imu_section, &format!("nu0{i}_a1"))
    });

    let mut bus = Bus::new(cfg);

    // registration order matches the original's plugin roster: timing,
    // raw input + axis remap, calibration (+ optional static gyro drift
    // compensation), gravity, alignment, attitude, motion + vertical
    // damping, then the output writers.
    bus.add_plugin(Box::new(StepSync::new()), 1, 0)?;
    bus.add_plugin(Box::new(RawInputReader::new()), 1, 0)?;
    if has_temp_coeffs {
        bus.add_plugin(Box::new(CalibrationTemp::new()), 1, 0)?;
    } else {
        bus.add_plugin(Box::new(CalibrationLinear::new()), 1, 0)?;
    }
    bus.add_plugin(Box::new(AxisRemap), 1, 0)?;
    if use_static_drift {
        bus.add_plugin(Box::new(StaticDriftCompensation::new()), 1, 0)?;
    }
    bus.add_plugin(Box::new(SensorWriter::new()), 1, 0)?;
    if use_constant_gravity {
        bus.add_plugin(Box::new(GravityConstant::new()), 1, 0)?;
    } else {
        bus.add_plugin(Box::new(GravityNormal::new()), 1, 0)?;
    }
    if use_leveling_alignment {
        bus.add_plugin(Box::new(AlignmentLeveling::new()), 1, 0)?;
    } else {
        bus.add_plugin(Box::new(AlignmentGyrocompass::new()), 1, 0)?;
    }
    if use_yaw_zero {
        bus.add_plugin(Box::new(AlignmentYawZero::new()), 1, 0)?;
    }
    if madgwick_rate != 0.0 {
        bus.add_plugin(Box::new(AttitudeMadgwick::new()), 1, 0)?;
    } else {
        bus.add_plugin(Box::new(AttitudeRodrigues::new()), 1, 0)?;
    }
    bus.add_plugin(Box::new(MotionEuler::new()), 1, 0)?;
    bus.add_plugin(Box::new(VerticalDamping::new()), 1, 0)?;
    bus.add_plugin(Box::new(OutputWriter::new()), 1, 0)?;
    bus.add_plugin(Box::new(ProgressReporter::new(args.progress_every)), 1, 0)?;

    bus.init()?;
    info!("bus initialized, entering step loop");
    while bus.step() {}
    bus.terminate();

    Ok(())
}
