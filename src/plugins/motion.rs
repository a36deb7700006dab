//! Ellipsoid-referenced position/velocity integration
//! (`MotionEuler`, ported from `fsnav_ins_motion_euler`) and the
//! vertical-channel square-root Kalman damping stage
//! (`VerticalDamping`, ported from `fsnav_ins_motion_vertical_damping`).

use crate::bus::config::{locate_section, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::FsnavResult;
use crate::linal::kalman::scalar_update;
use crate::linal::{cross3, eul2mat, mat2quat, mat2rpy, mat3_vmul, mat3_vmul_t};

const POLE_EPS: f64 = 1.0 / 256.0;

pub struct MotionEuler {
    t0: Option<f64>,
}

impl MotionEuler {
    pub fn new() -> Self {
        MotionEuler { t0: None }
    }
}

impl Plugin for MotionEuler {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        let lon_deg = read_parameter(section, "lon", 0.0, Some((-180.0, 180.0)));
        let lat_deg = read_parameter(section, "lat", 0.0, Some((-90.0, 90.0)));
        let alt = read_parameter(section, "alt", 0.0, Some((-20e3, 50e3)));
        ctx.imu.sol.llh = [
            lon_deg.to_radians(),
            lat_deg.to_radians(),
            alt,
        ];
        ctx.imu.sol.llh_valid = true;
        ctx.imu.sol.v = [0.0, 0.0, 0.0];
        ctx.imu.sol.v_valid = true;
        self.t0 = None;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.sol.v_valid
            || !ctx.imu.sol.llh_valid
            || !ctx.imu.sol.l_valid
            || !ctx.imu.f_valid
            || !ctx.imu.g_valid
        {
            return;
        }
        let t0 = match self.t0 {
            None => {
                self.t0 = Some(ctx.imu.t);
                return;
            }
            Some(t0) => t0,
        };
        let dt = ctx.imu.t - t0;
        self.t0 = Some(ctx.imu.t);

        let a = ctx.imu_const.a;
        let e2 = ctx.imu_const.e2;
        let u = ctx.imu_const.u;

        let lon = ctx.imu.sol.llh[0];
        let lat = ctx.imu.sol.llh[1];
        let alt = ctx.imu.sol.llh[2];
        let sphi = lat.sin();
        let cphi = lat.cos();
        let e2s2 = e2 * sphi * sphi;
        let e4s4 = e2s2 * e2s2;

        let mut re_h = a * (1.0 + e2s2 / 2.0 + 3.0 * e4s4 / 8.0);
        let rn_h = re_h * (1.0 - e2) * (1.0 + e2s2 + e4s4 + e2s2 * e4s4) + alt;
        re_h += alt;

        ctx.imu.w_transport_valid = false;
        ctx.imu.sol.llh_valid = false;
        ctx.imu.sol.v_valid = false;

        let v = ctx.imu.sol.v; // (ve, vn, vu)
        let mut w_transport = [-v[1] / rn_h, v[0] / re_h, 0.0];
        let pole_guarded = cphi >= POLE_EPS;
        if pole_guarded {
            w_transport[2] = v[0] / re_h * lat.tan();
            ctx.imu.w_transport = w_transport;
            ctx.imu.w_transport_valid = true;
        } else {
            ctx.imu.w_transport = w_transport;
            ctx.imu.w_transport_valid = false;
        }

        let earth_rate = [0.0, u * cphi, u * sphi];
        let mut omega = [0.0; 3];
        for i in 0..3 {
            omega[i] = 2.0 * earth_rate[i] + w_transport[i];
        }
        let dvcor = cross3(&v, &omega);

        let dvrel = if ctx.imu.w_valid {
            let half = [
                ctx.imu.w[0] * dt / 2.0,
                ctx.imu.w[1] * dt / 2.0,
                ctx.imu.w[2] * dt / 2.0,
            ];
            let mid = eul2mat(&half);
            let f_mid = mat3_vmul(&mid, &ctx.imu.f);
            mat3_vmul_t(&ctx.imu.sol.l, &f_mid)
        } else {
            mat3_vmul_t(&ctx.imu.sol.l, &ctx.imu.f)
        };

        let g = ctx.imu.g;
        let mut v_new = v;
        for i in 0..3 {
            v_new[i] += (dvcor[i] + dvrel[i] + g[i]) * dt;
        }
        ctx.imu.sol.v = v_new;
        ctx.imu.sol.v_valid = true;

        let mut new_lon = lon;
        let mut new_lat = lat;
        let mut new_alt = alt;
        if pole_guarded {
            new_lon += v_new[0] * dt / (re_h * cphi);
        }
        new_lat += v_new[1] * dt / rn_h;
        new_alt += v_new[2] * dt;

        ctx.imu.sol.llh = [new_lon, new_lat, new_alt];
        ctx.imu.sol.llh_valid = true;

        if ctx.imu.sol.llh[1] < -ctx.imu_const.pi / 2.0
            || ctx.imu.sol.llh[1] > ctx.imu_const.pi / 2.0
        {
            flip_sol_over_pole(ctx);
        }

        // wrap longitude to (-pi, pi]
        let pi = ctx.imu_const.pi;
        let mut lon = ctx.imu.sol.llh[0];
        while lon > pi {
            lon -= 2.0 * pi;
        }
        while lon <= -pi {
            lon += 2.0 * pi;
        }
        ctx.imu.sol.llh[0] = lon;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "motion_euler"
    }
}

fn flip_sol_over_pole(ctx: &mut NavContext) {
    ctx.imu.sol.llh[0] += ctx.imu_const.pi;
    ctx.imu.sol.v[0] = -ctx.imu.sol.v[0];
    ctx.imu.sol.v[1] = -ctx.imu.sol.v[1];
    if ctx.imu.sol.l_valid {
        let mut l = ctx.imu.sol.l;
        for row in 0..3 {
            l[row * 3] = -l[row * 3];
            l[row * 3 + 1] = -l[row * 3 + 1];
        }
        ctx.imu.sol.l = l;
        ctx.imu.sol.q = mat2quat(&l);
        ctx.imu.sol.q_valid = true;
        ctx.imu.sol.rpy = mat2rpy(&l);
        ctx.imu.sol.rpy_valid = true;
    }
}

/// Two-state (altitude, vertical velocity) square-root Kalman damping
/// of the vertical channel, folding in a zero-vertical-velocity
/// pseudo-measurement every tick plus any available air-data altitude
/// and vertical-speed observations.
pub struct VerticalDamping {
    stdev_default: f64,
    t0: Option<f64>,
    air_alt_last: Option<f64>,
}

const VVS_DEFAULT: f64 = 1_048_576.0; // 2^20

impl VerticalDamping {
    pub fn new() -> Self {
        VerticalDamping {
            stdev_default: VVS_DEFAULT,
            t0: None,
            air_alt_last: None,
        }
    }
}

impl Plugin for VerticalDamping {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.stdev_default = match locate_token_f64(section, "vertical_damping_stdev") {
            Some(v) if v < 0.0 => VVS_DEFAULT,
            Some(v) => v,
            None => VVS_DEFAULT,
        };
        self.t0 = None;
        self.air_alt_last = None;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        let t0 = match self.t0 {
            None => {
                self.t0 = Some(ctx.imu.t);
                return;
            }
            Some(t0) => t0,
        };
        let dt = ctx.imu.t - t0;
        self.t0 = Some(ctx.imu.t);
        if dt <= 0.0 {
            return;
        }

        let x_prev = if ctx.imu.sol.llh_valid {
            ctx.imu.sol.llh[2]
        } else {
            0.0
        };
        let v_prev = if ctx.imu.sol.v_valid {
            ctx.imu.sol.v[2]
        } else {
            0.0
        };

        let mut y = [x_prev, v_prev];
        let vvs = self.stdev_default;
        let mut s = [vvs * dt, 0.0, 1.0];

        scalar_update(&mut y, &mut s, &[0.0, 1.0], 0.0, vvs);

        if let Some(air) = ctx.air.clone() {
            if air.alt_valid {
                let alt_prev = self.air_alt_last.unwrap_or(air.alt);
                let sigma = 2f64.sqrt() * if air.alt_std > 0.0 { air.alt_std } else { vvs };
                scalar_update(&mut y, &mut s, &[2.0, -dt], air.alt + alt_prev, sigma);
                scalar_update(&mut y, &mut s, &[0.0, dt], air.alt - alt_prev, sigma);
                self.air_alt_last = Some(air.alt);
            }
            if air.vv_valid {
                let sigma = if air.vv_std > 0.0 { air.vv_std } else { vvs };
                scalar_update(&mut y, &mut s, &[0.0, 1.0], air.vv - v_prev, sigma);
            }
        }

        let s_alt = (s[0] * s[0] + s[1] * s[1]).sqrt();
        let w = s_alt + s[2] * dt;

        if ctx.imu.sol.llh_valid {
            ctx.imu.sol.llh[2] = y[0];
            if ctx.imu.sol.v_valid && w > 0.0 {
                ctx.imu.sol.llh[2] += 2.0 * s_alt / w * (y[1] - v_prev) * dt;
            }
        }
        if ctx.imu.sol.v_valid && ctx.imu.sol.llh_valid && w > 0.0 && dt > 0.0 {
            ctx.imu.sol.v[2] += 2.0 * s[2] * dt / w * (y[0] - x_prev) / dt;
        }
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "motion_vertical_damping"
    }
}

fn locate_token_f64(section: &str, key: &str) -> Option<f64> {
    crate::bus::config::locate_token(section, key).and_then(|v| v.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_euler_at_rest_with_zero_gravity_stays_put() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = MotionEuler::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.sol.l_valid = true;
        ctx.imu.f = [0.0, 0.0, 0.0];
        ctx.imu.f_valid = true;
        ctx.imu.g = [0.0, 0.0, 0.0];
        ctx.imu.g_valid = true;
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx); // first touch
        ctx.imu.t = 1.0;
        plugin.step(&mut ctx);
        assert!((ctx.imu.sol.v[0]).abs() < 1e-9);
        assert!((ctx.imu.sol.v[1]).abs() < 1e-9);
        assert!((ctx.imu.sol.v[2]).abs() < 1e-9);
    }

    #[test]
    fn motion_euler_soft_skips_without_required_validity() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = MotionEuler::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.sol.l_valid = false; // missing attitude
        ctx.imu.f_valid = true;
        ctx.imu.g_valid = true;
        ctx.imu.t = 1.0;
        plugin.step(&mut ctx);
        assert_eq!(ctx.imu.sol.llh[2], 0.0);
    }

    #[test]
    fn vertical_damping_pulls_altitude_toward_air_data() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = VerticalDamping::new();
        ctx.cfg = "{imu: vertical_damping_stdev = 1.0}".to_string();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.sol.llh = [0.0, 0.0, 100.0];
        ctx.imu.sol.llh_valid = true;
        ctx.imu.sol.v = [0.0, 0.0, 0.0];
        ctx.imu.sol.v_valid = true;
        ctx.air = Some(crate::types::AirState {
            t: 0.0,
            alt: 95.0,
            alt_std: 0.5,
            alt_valid: true,
            vv: 0.0,
            vv_std: 0.1,
            vv_valid: false,
            speed: 0.0,
            speed_std: 0.0,
            speed_valid: false,
        });
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx); // first touch
        ctx.imu.t = 1.0;
        plugin.step(&mut ctx);
        assert!(ctx.imu.sol.llh[2] < 100.0);
    }
}
