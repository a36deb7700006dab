//! Attitude integrators: `AttitudeRodrigues` (exact port of the
//! original's Euler-vector/Rodrigues-formula integrator) and
//! `AttitudeMadgwick` (gradient-descent complementary filter, fused
//! with the same earth/transport-rate correction Rodrigues uses).

use crate::bus::config::{locate_section, read_parameter};
use crate::bus::{NavContext, Plugin};
use crate::error::FsnavResult;
use crate::linal::{
    eul2mat, mat2quat, mat2rpy, mmul3, mmul3_2t, quat2mat, quat_mul, quat_normalize,
};

/// `2^-20`, the gradient-descent step normalizer's zero-division guard.
const MADGWICK_EPSILON: f64 = 1.0 / 1_048_576.0;

pub struct AttitudeRodrigues {
    t0: Option<f64>,
}

impl AttitudeRodrigues {
    pub fn new() -> Self {
        AttitudeRodrigues { t0: None }
    }
}

impl Plugin for AttitudeRodrigues {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        ctx.imu.sol.q = [1.0, 0.0, 0.0, 0.0];
        ctx.imu.sol.q_valid = true;
        ctx.imu.sol.l = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        ctx.imu.sol.l_valid = true;
        ctx.imu.sol.rpy = [
            -ctx.imu_const.pi / 2.0,
            0.0,
            ctx.imu_const.pi / 2.0,
        ];
        ctx.imu.sol.rpy_valid = true;
        self.t0 = None;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.sol.l_valid || !ctx.imu.w_valid {
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

        let mut l = ctx.imu.sol.l;

        // L <- A*L, A built from the body-frame rotation vector w*dt
        let a = [
            ctx.imu.w[0] * dt,
            ctx.imu.w[1] * dt,
            ctx.imu.w[2] * dt,
        ];
        let c = eul2mat(&a);
        l = mmul3(&c, &l);

        // L <- L*C^T, C built from the nav-frame rotation vector
        // (transport rate + earth rate) * dt
        let mut c_vec = if ctx.imu.w_transport_valid {
            ctx.imu.w_transport
        } else {
            [0.0, 0.0, 0.0]
        };
        if ctx.imu.sol.llh_valid {
            let lat = ctx.imu.sol.llh[1];
            c_vec[1] += ctx.imu_const.u * lat.cos();
            c_vec[2] += ctx.imu_const.u * lat.sin();
        }
        for v in c_vec.iter_mut() {
            *v *= dt;
        }
        let c = eul2mat(&c_vec);
        l = mmul3_2t(&l, &c);

        ctx.imu.sol.l = l;
        ctx.imu.sol.q = mat2quat(&l);
        ctx.imu.sol.q_valid = true;
        ctx.imu.sol.rpy = mat2rpy(&l);
        ctx.imu.sol.rpy_valid = true;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "attitude_rodrigues"
    }
}

/// Madgwick-style complementary filter: integrates gyro (plus transport
/// and earth rate, the same correction Rodrigues applies) and pulls the
/// quaternion's "up" axis toward the measured specific-force direction
/// with gain `beta`.
pub struct AttitudeMadgwick {
    q: [f64; 4],
    beta: f64,
    t0: Option<f64>,
}

impl AttitudeMadgwick {
    pub fn new() -> Self {
        AttitudeMadgwick {
            q: [1.0, 0.0, 0.0, 0.0],
            beta: 0.1,
            t0: None,
        }
    }
}

impl Plugin for AttitudeMadgwick {
    fn init(&mut self, ctx: &mut NavContext) -> FsnavResult<()> {
        let section = locate_section(&ctx.cfg, "imu").unwrap_or(&ctx.cfg);
        self.beta = read_parameter(section, "madgwick_feedback_rate", 0.0, Some((0.0, 10.0)));
        self.q = [1.0, 0.0, 0.0, 0.0];
        ctx.imu.sol.q = self.q;
        ctx.imu.sol.q_valid = true;
        ctx.imu.sol.l = quat2mat(&self.q);
        ctx.imu.sol.l_valid = true;
        ctx.imu.sol.rpy = mat2rpy(&ctx.imu.sol.l);
        ctx.imu.sol.rpy_valid = true;
        self.t0 = None;
        Ok(())
    }

    fn step(&mut self, ctx: &mut NavContext) {
        if !ctx.imu.w_valid || !ctx.imu.f_valid {
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

        // step 1-5: gyro integration corrected by the gradient-descent
        // pull of the estimated "up" axis toward measured specific force
        let q = self.q;
        let w_quat = [0.0, ctx.imu.w[0], ctx.imu.w[1], ctx.imu.w[2]];
        let q_dot_gyro = quat_mul(&q, &w_quat).map(|v| 0.5 * v);

        let f_norm = (ctx.imu.f[0] * ctx.imu.f[0]
            + ctx.imu.f[1] * ctx.imu.f[1]
            + ctx.imu.f[2] * ctx.imu.f[2])
            .sqrt();
        let mut delta = [0.0; 4];
        if f_norm > 0.0 {
            let (ax, ay, az) = (
                ctx.imu.f[0] / f_norm,
                ctx.imu.f[1] / f_norm,
                ctx.imu.f[2] / f_norm,
            );
            let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
            // f_M(q) = R^T(q)*(0,0,1) - a_hat
            let f1 = 2.0 * (q1 * q3 - q0 * q2) - ax;
            let f2 = 2.0 * (q0 * q1 + q2 * q3) - ay;
            let f3 = 2.0 * (0.5 - q1 * q1 - q2 * q2) - az;
            // J_M^T * f_M, with J_M the analytic 3x4 Jacobian of f_M
            delta[0] = -2.0 * q2 * f1 + 2.0 * q1 * f2;
            delta[1] = 2.0 * q3 * f1 + 2.0 * q0 * f2 - 4.0 * q1 * f3;
            delta[2] = -2.0 * q0 * f1 + 2.0 * q3 * f2 - 4.0 * q2 * f3;
            delta[3] = 2.0 * q1 * f1 + 2.0 * q2 * f2;
        }
        let delta_norm = (delta[0] * delta[0]
            + delta[1] * delta[1]
            + delta[2] * delta[2]
            + delta[3] * delta[3])
            .sqrt();
        let scale = self.beta / (delta_norm + MADGWICK_EPSILON);

        let mut q_new = [0.0; 4];
        for i in 0..4 {
            q_new[i] = q[i] + (q_dot_gyro[i] - scale * delta[i]) * dt;
        }
        quat_normalize(&mut q_new);
        self.q = q_new;

        // step 6: same transport-plus-Earth-rate decrement as Rodrigues,
        // postmultiplying L by eul2mat(c)^T
        let mut l = quat2mat(&self.q);
        let mut c_vec = if ctx.imu.w_transport_valid {
            ctx.imu.w_transport
        } else {
            [0.0, 0.0, 0.0]
        };
        if ctx.imu.sol.llh_valid {
            let lat = ctx.imu.sol.llh[1];
            c_vec[1] += ctx.imu_const.u * lat.cos();
            c_vec[2] += ctx.imu_const.u * lat.sin();
        }
        for v in c_vec.iter_mut() {
            *v *= dt;
        }
        let c = eul2mat(&c_vec);
        l = mmul3_2t(&l, &c);

        self.q = mat2quat(&l);
        ctx.imu.sol.q = self.q;
        ctx.imu.sol.q_valid = true;
        ctx.imu.sol.l = l;
        ctx.imu.sol.l_valid = true;
        ctx.imu.sol.rpy = mat2rpy(&l);
        ctx.imu.sol.rpy_valid = true;
    }

    fn terminate(&mut self, _ctx: &mut NavContext) {}

    fn name(&self) -> &'static str {
        "attitude_madgwick"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rodrigues_init_matches_documented_identity_solution() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AttitudeRodrigues::new();
        plugin.init(&mut ctx).unwrap();
        assert_eq!(ctx.imu.sol.q, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            ctx.imu.sol.l,
            [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn rodrigues_soft_skips_without_rate() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AttitudeRodrigues::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.w_valid = false;
        ctx.imu.t = 1.0;
        plugin.step(&mut ctx);
        // unchanged from init
        assert_eq!(ctx.imu.sol.q, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rodrigues_zero_rate_holds_attitude() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AttitudeRodrigues::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.w = [0.0, 0.0, 0.0];
        ctx.imu.w_valid = true;
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx); // first touch records t0
        ctx.imu.t = 1.0;
        plugin.step(&mut ctx);
        for i in 0..9 {
            assert!((ctx.imu.sol.l[i] - [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0][i]).abs() < 1e-9);
        }
    }

    #[test]
    fn madgwick_quaternion_stays_normalized() {
        let mut ctx = NavContext::new("{imu: madgwick_feedback_rate = 0.1}".to_string());
        let mut plugin = AttitudeMadgwick::new();
        plugin.init(&mut ctx).unwrap();
        ctx.imu.w = [0.01, -0.02, 0.005];
        ctx.imu.w_valid = true;
        ctx.imu.f = [0.1, 0.2, 9.8];
        ctx.imu.f_valid = true;
        ctx.imu.t = 0.0;
        plugin.step(&mut ctx);
        ctx.imu.t = 0.1;
        plugin.step(&mut ctx);
        let q = ctx.imu.sol.q;
        let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn madgwick_reads_feedback_rate_from_config() {
        let mut ctx = NavContext::new("{imu: madgwick_feedback_rate = 2.5}".to_string());
        let mut plugin = AttitudeMadgwick::new();
        plugin.init(&mut ctx).unwrap();
        assert_eq!(plugin.beta, 2.5);
    }

    #[test]
    fn madgwick_defaults_to_zero_feedback_when_unconfigured() {
        let mut ctx = NavContext::new(String::new());
        let mut plugin = AttitudeMadgwick::new();
        plugin.init(&mut ctx).unwrap();
        assert_eq!(plugin.beta, 0.0);
    }
}
