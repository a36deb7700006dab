//! Sensor calibration stages: `CalibrationLinear` (constant bias/scale
//! factor), `CalibrationTemp` (temperature-polynomial bias/scale), and
//! `StaticDriftCompensation` (gyro bias learned from an alignment-window
//! average of the raw rate, subtracted afterward). Ported in meaning
//! from `fsnav_ins.c`'s `fsnav_ins_imu_calibration[_temp]` and
//! `fsnav_ins_compensate_static_drift`.
//!
//! Scale-factor/misalignment terms are modeled diagonally (one
//! coefficient per axis) rather than as a full 3x3 matrix — the
//! original's off-diagonal misalignment terms don't change the shape
//! of the plugin, only the width of its config surface, so this port
//! keeps the per-axis form.

use crate::bus::config::{locate_section, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::FsnavResult;

pub struct CalibrationLinear {
    df0: [f64; 3],
    gamma: [f64; 3],
    nu0: [f64; 3],
    theta: [f64; 3],
}

impl CalibrationLinear {
    pub fn new() -> Self {
        CalibrationLinear {
            df0: [0.0; 3],
            gamma: [0.0; 3],
            nu0: [0.0; 3],
            theta: [0.0; 3],
        }
    }
}

impl Plugin for CalibrationLinear {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        for i in 0..3 {
            self.df0[i] = read_parameter(section, &format!("df0{}", i + 1), 0.0, None);
            self.gamma[i] = read_parameter(section, &format!("ga{0}{0}", i + 1), 0.0, None);
            let nu0_deg_per_hour =
                read_parameter(section, &format!("nu0{}", i + 1), 0.0, None);
            self.nu0[i] = nu0_deg_per_hour.to_radians() / 3600.0;
            self.theta[i] = read_parameter(section, &format!("th{0}{0}", i + 1), 0.0, None);
        }
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if ctx.imu.f_valid {
            for i in 0..3 {
                ctx.imu.f[i] = (ctx.imu.f[i] - self.df0[i]) / (1.0 + self.gamma[i]);
            }
        }
        if ctx.imu.w_valid {
            for i in 0..3 {
                ctx.imu.w[i] = (ctx.imu.w[i] - self.nu0[i]) / (1.0 + self.theta[i]);
            }
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "calibration_linear"
    }
}

/// Quadratic-in-temperature bias/scale model. Gyro bias is referenced
/// to the average temperature seen during the alignment window
/// (`nu0 = w0 - a1*Tw0 - a2*Tw0^2 + a1*Tw - a2*Tw^2`, i.e. a correction
/// relative to the alignment-time bias rather than an absolute
/// polynomial); accelerometer bias/scale are plain quadratics in
/// temperature with no reference-window term.
pub struct CalibrationTemp {
    alignment_duration: f64,
    t0: Option<f64>,
    n: u64,
    w0: [f64; 3],
    tw0: [f64; 3],
    nu0_a1: [f64; 3],
    nu0_a2: [f64; 3],
    df0_a: [[f64; 3]; 3],
    gamma_a: [[f64; 3]; 3],
}

impl CalibrationTemp {
    pub fn new() -> Self {
        CalibrationTemp {
            alignment_duration: 60.0,
            t0: None,
            n: 0,
            w0: [0.0; 3],
            tw0: [0.0; 3],
            nu0_a1: [0.0; 3],
            nu0_a2: [0.0; 3],
            df0_a: [[0.0; 3]; 3],
            gamma_a: [[0.0; 3]; 3],
        }
    }
}

impl Plugin for CalibrationTemp {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.alignment_duration = read_parameter(section, "alignment", 60.0, Some((0.0, 1e6)));
        for i in 0..3 {
            self.nu0_a1[i] = read_parameter(section, &format!("nu0{}_a1", i + 1), 0.0, None);
            self.nu0_a2[i] = read_parameter(section, &format!("nu0{}_a2", i + 1), 0.0, None);
            for (k, suffix) in ["a0", "a1", "a2"].iter().enumerate() {
                self.df0_a[i][k] =
                    read_parameter(section, &format!("df0{}_{}", i + 1, suffix), 0.0, None);
                self.gamma_a[i][k] = read_parameter(
                    section,
                    &format!("ga{0}{0}_{1}", i + 1, suffix),
                    0.0,
                    None,
                );
            }
        }
        self.t0 = None;
        self.n = 0;
        self.w0 = [0.0; 3];
        self.tw0 = [0.0; 3];
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let t0 = *self.t0.get_or_insert(ctx.imu.t);
        if ctx.imu.t - t0 <= self.alignment_duration && ctx.imu.w_valid && ctx.imu.tw_valid {
            self.n += 1;
            let n1_n = (self.n - 1) as f64 / self.n as f64;
            for i in 0..3 {
                self.w0[i] = self.w0[i] * n1_n + ctx.imu.w[i] / self.n as f64;
                self.tw0[i] = self.tw0[i] * n1_n + ctx.imu.tw[i] / self.n as f64;
            }
        }

        if ctx.imu.w_valid && ctx.imu.tw_valid {
            for i in 0..3 {
                let tw = ctx.imu.tw[i];
                let nu0 = self.w0[i] - self.nu0_a1[i] * self.tw0[i]
                    - self.nu0_a2[i] * self.tw0[i] * self.tw0[i]
                    + self.nu0_a1[i] * tw
                    + self.nu0_a2[i] * tw * tw;
                ctx.imu.w[i] -= nu0;
            }
        }

        if ctx.imu.f_valid && ctx.imu.tf_valid {
            for i in 0..3 {
                let tf = ctx.imu.tf[i];
                let df0 = self.df0_a[i][0] + self.df0_a[i][1] * tf + self.df0_a[i][2] * tf * tf;
                let gamma =
                    self.gamma_a[i][0] + self.gamma_a[i][1] * tf + self.gamma_a[i][2] * tf * tf;
                ctx.imu.f[i] = (ctx.imu.f[i] - df0) / (1.0 + gamma);
            }
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "calibration_temp"
    }
}

/// Learns a constant gyro bias from the average raw rate during the
/// alignment window and subtracts it afterward — the cheap alternative
/// to full calibration when no factory bias/scale coefficients exist.
pub struct StaticDriftCompensation {
    duration: f64,
    t0: Option<f64>,
    n: u64,
    bias: [f64; 3],
}

impl StaticDriftCompensation {
    pub fn new() -> Self {
        StaticDriftCompensation {
            duration: 60.0,
            t0: None,
            n: 0,
            bias: [0.0; 3],
        }
    }
}

impl Plugin for StaticDriftCompensation {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.duration = read_parameter(section, "alignment", 60.0, Some((0.0, 1e6)));
        self.t0 = None;
        self.n = 0;
        self.bias = [0.0; 3];
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.w_valid {
            return;
        }
        let t0 = *self.t0.get_or_insert(ctx.imu.t);
        if ctx.imu.t - t0 <= self.duration {
            self.n += 1;
            let n1_n = (self.n - 1) as f64 / self.n as f64;
            for i in 0..3 {
                self.bias[i] = self.bias[i] * n1_n + ctx.imu.w[i] / self.n as f64;
            }
        } else {
            for i in 0..3 {
                ctx.imu.w[i] -= self.bias[i];
            }
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "static_drift_compensation"
    }
}
