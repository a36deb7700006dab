//! Gravity model stages: `GravityConstant` averages accelerometer
//! magnitude during an initial alignment window and freezes the
//! result; `GravityNormal` evaluates the GRS-80 normal gravity formula
//! at the current position every tick.

use crate::bus::config::{locate_section, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::FsnavResult;
use crate::linal::norm3;

pub struct GravityConstant {
    alignment_duration: f64,
    t0: Option<f64>,
    n: u64,
    avg_magnitude: f64,
}

impl GravityConstant {
    pub fn new() -> Self {
        GravityConstant {
            alignment_duration: 60.0,
            t0: None,
            n: 0,
            avg_magnitude: 0.0,
        }
    }
}

impl Plugin for GravityConstant {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.alignment_duration = read_parameter(section, "alignment", 60.0, Some((0.0, 1e6)));
        self.t0 = None;
        self.n = 0;
        self.avg_magnitude = ctx.imu_const.ge;
        ctx.imu.g = [0.0, 0.0, -self.avg_magnitude];
        ctx.imu.g_valid = true;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        match self.t0 {
            None => self.t0 = Some(ctx.imu.t),
            Some(t0) => {
                if ctx.imu.t - t0 <= self.alignment_duration && ctx.imu.f_valid {
                    self.n += 1;
                    let magnitude = norm3(&ctx.imu.f);
                    let n1_n = (self.n - 1) as f64 / self.n as f64;
                    self.avg_magnitude = self.avg_magnitude * n1_n + magnitude / self.n as f64;
                }
            }
        }
        ctx.imu.g = [0.0, 0.0, -self.avg_magnitude];
        ctx.imu.g_valid = true;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "gravity_constant"
    }
}

pub struct GravityNormal {
    flattening: f64,
    second_harmonic: f64,
    m: f64,
}

impl GravityNormal {
    pub fn new() -> Self {
        GravityNormal {
            flattening: 0.0,
            second_harmonic: 0.0,
            m: 0.0,
        }
    }
}

impl Plugin for GravityNormal {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let e2 = ctx.imu_const.e2;
        let b_over_a = (1.0 - e2).sqrt();
        self.flattening = 1.0 - b_over_a;
        self.m = ctx.imu_const.u.powi(2) * ctx.imu_const.a / ctx.imu_const.ge;
        self.second_harmonic = 0.25 * self.flattening * (self.flattening + ctx.imu_const.fg);
        ctx.imu.g_valid = false;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let (lat, h) = if ctx.imu.sol.llh_valid {
            (ctx.imu.sol.llh[1], ctx.imu.sol.llh[2])
        } else {
            (ctx.imu_const.pi / 4.0, 0.0)
        };
        let a = ctx.imu_const.a;
        let ge = ctx.imu_const.ge;
        let fg = ctx.imu_const.fg;
        let sin_lat = lat.sin();
        let sin2 = (2.0 * lat).sin();
        let cos2 = (2.0 * lat).cos();

        let g_e = 0.0;
        let g_n = -fg * sin2 * h / a;
        let g_u = -ge
            * (1.0 + fg * sin_lat * sin_lat - self.second_harmonic * sin2 * sin2)
            * (1.0 - 2.0 * (1.0 + self.flattening * cos2 + self.m) * h / a);

        ctx.imu.g = [g_e, g_n, g_u];
        ctx.imu.g_valid = true;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "gravity_normal"
    }
}
