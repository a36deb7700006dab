//! External-collaborator plugins: timing sync, raw/converted sensor
//! stream readers, axis remap, solution/sensor writers, and a console
//! progress reporter. These are ordinary `Plugin`s (not part of the
//! library's default roster) so the binary wires them up the same way
//! it would wire up any other stage — the bus never special-cases I/O.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use log::warn;

use crate::bus::config::{locate_section, locate_token, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::{FsnavError, FsnavResult};

/// Resets per-tick validity flags, advances the simulated clock at a
/// fixed frequency, and requests termination once `step_limit` ticks
/// have elapsed. Must run before every other plugin each tick.
pub struct StepSync {
    dt: f64,
    step_limit: u64,
    time_limit: f64,
}

impl StepSync {
    pub fn new() -> Self {
        StepSync {
            dt: 0.01,
            step_limit: u64::MAX,
            time_limit: f64::INFINITY,
        }
    }
}

impl Plugin for StepSync {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        let freq = read_parameter(section, "freq", 100.0, Some((50.0, 3200.0)));
        self.dt = 1.0 / freq;
        // step_limit/time_limit are common settings, read outside any
        // named section rather than from "imu".
        self.step_limit = locate_token(&ctx.cfg, "step_limit")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(u64::MAX);
        self.time_limit = locate_token(&ctx.cfg, "time_limit")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::INFINITY);
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        ctx.imu.w_valid = false;
        ctx.imu.f_valid = false;
        ctx.imu.t = ctx.step_count as f64 * self.dt;
        ctx.imu.sol.dt = self.dt;
        ctx.imu.sol.dt_valid = true;
        if ctx.step_count > self.step_limit || ctx.imu.t > self.time_limit {
            ctx.mode = -1;
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "step_sync"
    }
}

fn open_input(ctx: &NavContext, key: &str) -> FsnavResult<BufReader<File>> {
    let path = locate_token(&ctx.cfg, key)
        .ok_or_else(|| FsnavError::ConfigParse(format!("missing {key} token")))?;
    File::open(path)
        .map(BufReader::new)
        .map_err(|_| FsnavError::ConfigNotFound(path.into()))
}

/// Reads already-converted sensor lines: six whitespace-separated
/// doubles, gyro in deg/s and accel in m/s^2.
pub struct ConvertedInputReader {
    reader: Option<BufReader<File>>,
}

impl ConvertedInputReader {
    pub fn new() -> Self {
        ConvertedInputReader { reader: None }
    }
}

impl Plugin for ConvertedInputReader {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        self.reader = Some(open_input(ctx, "sensors_in")?);
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            ctx.mode = -1;
            return;
        }
        let values: Vec<f64> = line.split_whitespace().filter_map(|v| v.parse().ok()).collect();
        if values.len() < 6 {
            warn!("malformed sensor line, skipping");
            return;
        }
        for i in 0..3 {
            ctx.imu.w[i] = values[i].to_radians();
        }
        for i in 0..3 {
            ctx.imu.f[i] = values[3 + i];
        }
        ctx.imu.w_valid = true;
        ctx.imu.f_valid = true;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "read_conv_input"
    }
}

const RAW_GYRO_SCALE: f64 = 0.00625; // deg/s per LSB, ADIS16505
const RAW_ACCEL_SCALE: f64 = 0.002447; // m/s^2 per LSB
const RAW_TEMP_SCALE: f64 = 0.1; // deg C per LSB

/// Reads raw ADIS16505 lines:
/// `DIAG_STAT,X_GYRO,Y_GYRO,Z_GYRO,X_ACCL,Y_ACCL,Z_ACCL[,TEMP_OUT]`,
/// comma/semicolon separated. When `TEMP_OUT` is present it is applied
/// to both the gyro and accelerometer temperature channels.
pub struct RawInputReader {
    reader: Option<BufReader<File>>,
}

impl RawInputReader {
    pub fn new() -> Self {
        RawInputReader { reader: None }
    }
}

impl Plugin for RawInputReader {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        self.reader = Some(open_input(ctx, "sensors_in")?);
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            ctx.mode = -1;
            return;
        }
        let fields: Vec<f64> = line
            .split(|c| c == ',' || c == ';')
            .filter_map(|v| v.trim().parse().ok())
            .collect();
        if fields.len() < 7 {
            warn!("malformed raw sensor line, skipping");
            return;
        }
        for i in 0..3 {
            ctx.imu.w[i] = (fields[1 + i] * RAW_GYRO_SCALE).to_radians();
            ctx.imu.f[i] = fields[4 + i] * RAW_ACCEL_SCALE;
        }
        ctx.imu.w_valid = true;
        ctx.imu.f_valid = true;
        if let Some(&raw_temp) = fields.get(7) {
            let temp = raw_temp * RAW_TEMP_SCALE;
            ctx.imu.tw = [temp; 3];
            ctx.imu.tf = [temp; 3];
            ctx.imu.tw_valid = true;
            ctx.imu.tf_valid = true;
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "read_raw_input_temp"
    }
}

/// Body -> navigation axis remap: `(X, Y, Z) -> (X, Z, -Y)`.
pub struct AxisRemap;

impl Plugin for AxisRemap {
    fn init(&mut self, _ctx: &mut NavContext) -> FsnavResult<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if ctx.imu.w_valid {
            ctx.imu.w = [ctx.imu.w[0], ctx.imu.w[2], -ctx.imu.w[1]];
        }
        if ctx.imu.f_valid {
            ctx.imu.f = [ctx.imu.f[0], ctx.imu.f[2], -ctx.imu.f[1]];
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "switch_imu_axes"
    }
}

fn open_output(ctx: &NavContext, key: &str) -> FsnavResult<BufWriter<File>> {
    let path = locate_token(&ctx.cfg, key)
        .ok_or_else(|| FsnavError::ConfigParse(format!("missing {key} token")))?;
    File::create(path)
        .map(BufWriter::new)
        .map_err(FsnavError::Io)
}

/// Writes calibrated sensor readings (gyro deg/s, accel m/s^2) for
/// offline inspection.
pub struct SensorWriter {
    writer: Option<BufWriter<File>>,
}

impl SensorWriter {
    pub fn new() -> Self {
        SensorWriter { writer: None }
    }
}

impl Plugin for SensorWriter {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        self.writer = Some(open_output(ctx, "sensors_out")?);
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if !ctx.imu.w_valid || !ctx.imu.f_valid {
            return;
        }
        let _ = writeln!(
            writer,
            "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
            ctx.imu.t,
            ctx.imu.w[0].to_degrees(),
            ctx.imu.w[1].to_degrees(),
            ctx.imu.w[2].to_degrees(),
            ctx.imu.f[0],
            ctx.imu.f[1],
            ctx.imu.f[2],
        );
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    fn name(&self) -> &'static str {
        "write_sensors"
    }
}

/// Writes the navigation solution: `time[s] lon[d] lat[d] hei[m] Ve Vn
/// Vu roll pitch heading[d]`.
pub struct OutputWriter {
    writer: Option<BufWriter<File>>,
}

impl OutputWriter {
    pub fn new() -> Self {
        OutputWriter { writer: None }
    }
}

impl Plugin for OutputWriter {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        self.writer = Some(open_output(ctx, "nav_out")?);
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let sol = &ctx.imu.sol;
        if !sol.llh_valid || !sol.v_valid || !sol.rpy_valid {
            return;
        }
        let _ = writeln!(
            writer,
            "{:.3} {:.8} {:.8} {:.3} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4}",
            ctx.imu.t,
            sol.llh[0].to_degrees(),
            sol.llh[1].to_degrees(),
            sol.llh[2],
            sol.v[0],
            sol.v[1],
            sol.v[2],
            sol.rpy[0].to_degrees(),
            sol.rpy[1].to_degrees(),
            sol.rpy[2].to_degrees(),
        );
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    fn name(&self) -> &'static str {
        "write_output"
    }
}

/// Prints a progress line to stderr every `every` ticks.
pub struct ProgressReporter {
    every: u64,
}

impl ProgressReporter {
    pub fn new(every: u64) -> Self {
        ProgressReporter { every: every.max(1) }
    }
}

impl Plugin for ProgressReporter {
    fn init(&mut self, _ctx: &mut NavContext) -> FsnavResult<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if ctx.step_count % self.every == 0 {
            eprintln!("step {} t={:.3}s", ctx.step_count, ctx.imu.t);
        }
    }

    fn terminate(&mut self, ctx: &mut NavContext) {
        eprintln!("done at step {}", ctx.step_count);
    }

    fn name(&self) -> &'static str {
        "print_progress"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_remap_applies_expected_permutation() {
        let mut ctx = NavContext::new(String::new());
        ctx.imu.w = [1.0, 2.0, 3.0];
        ctx.imu.w_valid = true;
        let mut plugin = AxisRemap;
        plugin.step(&mut ctx);
        assert_eq!(ctx.imu.w, [1.0, 3.0, -2.0]);
    }

    #[test]
    fn step_sync_requests_termination_past_step_limit() {
        let mut ctx = NavContext::new("{imu: freq = 100} step_limit = 2".to_string());
        let mut plugin = StepSync::new();
        plugin.init(&mut ctx).unwrap();
        ctx.step_count = 1;
        plugin.step(&mut ctx);
        assert_eq!(ctx.mode, 0);
        ctx.step_count = 3;
        plugin.step(&mut ctx);
        assert_eq!(ctx.mode, -1);
    }

    #[test]
    fn step_sync_requests_termination_past_time_limit() {
        let mut ctx = NavContext::new("{imu: freq = 100} time_limit = 0.02".to_string());
        let mut plugin = StepSync::new();
        plugin.init(&mut ctx).unwrap();
        ctx.step_count = 1;
        plugin.step(&mut ctx);
        assert_eq!(ctx.mode, 0);
        ctx.step_count = 5;
        plugin.step(&mut ctx);
        assert_eq!(ctx.mode, -1);
    }
}
