//! Initial attitude determination. spec.md names four entry points;
//! `original_source/`'s `fsnav_ins_alignment.h` only ever shipped a
//! header declaring three of them (`_static`, `_rotating`,
//! `_rotating_rpy`) — no `.c` body was retrieved, so these three are
//! built fresh from spec.md §4.4's formulas rather than ported, and
//! `_rotating`/`_rotating_rpy` (moving-base alignment) are left out, as
//! recorded in DESIGN.md.

use crate::bus::config::{locate_section, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::FsnavResult;
use crate::linal::{mat2quat, mat2rpy, norm3, quat2mat, rpy2quat};

fn publish_attitude(ctx: &mut NavContext, rpy: [f64; 3]) {
    let q = rpy2quat(&rpy);
    let l = quat2mat(&q);
    ctx.imu.sol.q = q;
    ctx.imu.sol.q_valid = true;
    ctx.imu.sol.l = l;
    ctx.imu.sol.l_valid = true;
    ctx.imu.sol.rpy = mat2rpy(&l);
    ctx.imu.sol.rpy_valid = true;
}

/// Accelerometer-only leveling: roll/pitch from the measured specific
/// force direction, heading left at zero (needs an external reference
/// or the gyrocompass stage to resolve).
pub struct AlignmentLeveling {
    duration: f64,
    t0: Option<f64>,
    n: u64,
    avg_f: [f64; 3],
}

impl AlignmentLeveling {
    pub fn new() -> Self {
        AlignmentLeveling {
            duration: 5.0,
            t0: None,
            n: 0,
            avg_f: [0.0; 3],
        }
    }
}

impl Plugin for AlignmentLeveling {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.duration = read_parameter(section, "alignment", 5.0, Some((0.0, 1e6)));
        self.t0 = None;
        self.n = 0;
        self.avg_f = [0.0; 3];
        ctx.imu.sol.q_valid = false;
        ctx.imu.sol.l_valid = false;
        ctx.imu.sol.rpy_valid = false;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.f_valid {
            return;
        }
        let t0 = *self.t0.get_or_insert(ctx.imu.t);
        if ctx.imu.t - t0 > self.duration {
            return;
        }
        self.n += 1;
        let n1_n = (self.n - 1) as f64 / self.n as f64;
        for i in 0..3 {
            self.avg_f[i] = self.avg_f[i] * n1_n + ctx.imu.f[i] / self.n as f64;
        }
        let f = self.avg_f;
        let roll = (-f[2]).atan2(f[1]);
        let pitch = f[0].atan2((f[1] * f[1] + f[2] * f[2]).sqrt());
        publish_attitude(ctx, [roll, pitch, 0.0]);
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "alignment_leveling"
    }
}

/// Gyrocompass alignment: levels from averaged specific force like
/// `AlignmentLeveling`, then resolves heading from the averaged angular
/// rate's projection onto the local horizontal (the component of earth
/// rate visible to a stationary platform).
pub struct AlignmentGyrocompass {
    duration: f64,
    t0: Option<f64>,
    n: u64,
    avg_f: [f64; 3],
    avg_w: [f64; 3],
}

impl AlignmentGyrocompass {
    pub fn new() -> Self {
        AlignmentGyrocompass {
            duration: 60.0,
            t0: None,
            n: 0,
            avg_f: [0.0; 3],
            avg_w: [0.0; 3],
        }
    }
}

impl Plugin for AlignmentGyrocompass {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.duration = read_parameter(section, "alignment", 60.0, Some((0.0, 1e6)));
        self.t0 = None;
        self.n = 0;
        self.avg_f = [0.0; 3];
        self.avg_w = [0.0; 3];
        ctx.imu.sol.q_valid = false;
        ctx.imu.sol.l_valid = false;
        ctx.imu.sol.rpy_valid = false;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.f_valid || !ctx.imu.w_valid {
            return;
        }
        let t0 = *self.t0.get_or_insert(ctx.imu.t);
        if ctx.imu.t - t0 > self.duration {
            return;
        }
        self.n += 1;
        let n1_n = (self.n - 1) as f64 / self.n as f64;
        for i in 0..3 {
            self.avg_f[i] = self.avg_f[i] * n1_n + ctx.imu.f[i] / self.n as f64;
            self.avg_w[i] = self.avg_w[i] * n1_n + ctx.imu.w[i] / self.n as f64;
        }
        let f = self.avg_f;
        let w = self.avg_w;
        let roll = (-f[2]).atan2(f[1]);
        let pitch = f[0].atan2((f[1] * f[1] + f[2] * f[2]).sqrt());

        // level the gyro-measured rate using roll/pitch, then the
        // leveled horizontal component points toward north (up to the
        // platform's heading offset from true earth rate)
        let (sr, cr) = roll.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let w_level_x = w[0] * cp + w[1] * sp * sr + w[2] * sp * cr;
        let w_level_y = w[1] * cr - w[2] * sr;
        let heading = if norm3(&w) > 1e-9 {
            w_level_x.atan2(w_level_y)
        } else {
            0.0
        };
        publish_attitude(ctx, [roll, pitch, heading]);
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "alignment_gyrocompass"
    }
}

/// Fixed attitude preset taken straight from config, for bench tests or
/// replay runs where the initial orientation is already known.
pub struct AlignmentPreset {
    roll_deg: f64,
    pitch_deg: f64,
    heading_deg: f64,
}

impl AlignmentPreset {
    pub fn new() -> Self {
        AlignmentPreset {
            roll_deg: 0.0,
            pitch_deg: 0.0,
            heading_deg: 0.0,
        }
    }
}

impl Plugin for AlignmentPreset {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.roll_deg = read_parameter(section, "roll", 0.0, Some((-180.0, 180.0)));
        self.pitch_deg = read_parameter(section, "pitch", 0.0, Some((-90.0, 90.0)));
        self.heading_deg = read_parameter(section, "heading", 0.0, Some((-360.0, 360.0)));
        publish_attitude(
            ctx,
            [
                self.roll_deg.to_radians(),
                self.pitch_deg.to_radians(),
                self.heading_deg.to_radians(),
            ],
        );
        Ok(())
    }

    fn step(&mut self, _ctx: &mut NavContext) {}

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "alignment_preset"
    }
}

/// Overrides heading to zero without touching roll/pitch, for setups
/// that resolve heading externally (e.g. magnetometer or GNSS course
/// over ground) and only need this plugin to clear a stale estimate.
/// Auto-suspends once the alignment window elapses, leaving whatever
/// heading the rest of the system has settled on alone from then on.
pub struct AlignmentYawZero {
    duration: f64,
    t0: Option<f64>,
}

impl AlignmentYawZero {
    pub fn new() -> Self {
        AlignmentYawZero {
            duration: 60.0,
            t0: None,
        }
    }
}

impl Plugin for AlignmentYawZero {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.duration = read_parameter(section, "alignment", 60.0, Some((0.0, 1e6)));
        self.t0 = None;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.sol.rpy_valid {
            return;
        }
        let t0 = *self.t0.get_or_insert(ctx.imu.t);
        if ctx.imu.t - t0 > self.duration {
            return;
        }
        let mut rpy = ctx.imu.sol.rpy;
        rpy[2] = 0.0;
        publish_attitude(ctx, rpy);
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "alignment_yaw_zero"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leveling_recovers_zero_attitude_from_vertical_specific_force() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AlignmentLeveling::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.f = [0.0, 0.0, 9.81];
        ctx.imu.f_valid = true;
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx);
        assert!(ctx.imu.sol.rpy_valid);
        assert!(ctx.imu.sol.rpy[0].abs() < 1e-9);
        assert!(ctx.imu.sol.rpy[1].abs() < 1e-9);
    }

    #[test]
    fn leveling_recovers_roll_from_tilted_specific_force() {
        // f = (sin(10 deg)*g, cos(10 deg)*g, 0) is specific force measured
        // by a platform rolled 10 degrees about its x axis: roll should
        // come back as 0 and pitch as ~10 degrees.
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AlignmentLeveling::new();
        plugin.init(&mut ctx).unwrap();
        let g = 9.81;
        let (s10, c10) = 10f64.to_radians().sin_cos();
        ctx.imu.f = [s10 * g, c10 * g, 0.0];
        ctx.imu.f_valid = true;
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx);
        assert!(ctx.imu.sol.rpy_valid);
        assert!(ctx.imu.sol.rpy[0].abs() < 1e-9);
        assert!((ctx.imu.sol.rpy[1] - 10f64.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn preset_applies_configured_angles() {
        let mut ctx = NavContext::new(String::new());
        ctx.cfg = "{imu: roll = 10 pitch = -5 heading = 90}".to_string();
        let mut plugin = AlignmentPreset::new();
        plugin.init(&mut ctx).unwrap();
        assert!((ctx.imu.sol.rpy[0] - 10f64.to_radians()).abs() < 1e-6);
        assert!((ctx.imu.sol.rpy[1] + 5f64.to_radians()).abs() < 1e-6);
        assert!((ctx.imu.sol.rpy[2] - 90f64.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn yaw_zero_clears_heading_only() {
        let mut ctx = NavContext::new(String::new());
        publish_attitude(&mut ctx, [0.2, 0.1, 1.0]);
        let mut plugin = AlignmentYawZero::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx);
        assert!(ctx.imu.sol.rpy[2].abs() < 1e-9);
        assert!((ctx.imu.sol.rpy[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn yaw_zero_stops_once_alignment_window_elapses() {
        let mut ctx = NavContext::new(String::new());
        ctx.cfg = "{imu: alignment = 1.0}".to_string();
        publish_attitude(&mut ctx, [0.2, 0.1, 1.0]);
        let mut plugin = AlignmentYawZero::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx);
        assert_eq!(ctx.imu.sol.rpy[2], 0.0);
        ctx.imu.t = 5.0;
        publish_attitude(&mut ctx, [0.2, 0.1, 0.7]);
        plugin.step(&mut ctx);
        assert!((ctx.imu.sol.rpy[2] - 0.7).abs() < 1e-9);
    }
}
