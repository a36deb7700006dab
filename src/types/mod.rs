use serde::{Deserialize, Serialize};

/// Physical constants used throughout the inertial algorithms. Defaults
/// are GRS-80 (same reference ellipsoid the original FastSense core ships).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImuConst {
    pub pi: f64,
    pub rad2deg: f64,
    /// Earth rotation rate, rad/s
    pub u: f64,
    /// equatorial radius, m
    pub a: f64,
    /// eccentricity squared
    pub e2: f64,
    /// equatorial normal gravity, m/s^2
    pub ge: f64,
    /// gravity flattening coefficient
    pub fg: f64,
}

impl Default for ImuConst {
    fn default() -> Self {
        ImuConst {
            pi: std::f64::consts::PI,
            rad2deg: 180.0 / std::f64::consts::PI,
            u: 7.292115e-5,
            a: 6_378_137.0,
            e2: 6.69438002290e-3,
            ge: 9.7803253359,
            fg: 0.00344280402462,
        }
    }
}

/// Navigation solution shared by every stage. Mirrors the original's
/// `fsnav_sol`: every field has a companion validity flag, set by the
/// producing plugin and checked by every consumer before use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Solution {
    /// ECEF-like local Cartesian position, m
    pub x: [f64; 3],
    pub x_valid: bool,
    pub x_std: [f64; 3],

    /// longitude, latitude, altitude (rad, rad, m)
    pub llh: [f64; 3],
    pub llh_valid: bool,

    /// ENU velocity, m/s
    pub v: [f64; 3],
    pub v_valid: bool,
    pub v_std: [f64; 3],

    /// attitude quaternion (w, x, y, z)
    pub q: [f64; 4],
    pub q_valid: bool,

    /// attitude matrix, row-major 3x3
    pub l: [f64; 9],
    pub l_valid: bool,

    /// roll, pitch, heading, rad
    pub rpy: [f64; 3],
    pub rpy_valid: bool,

    pub dt: f64,
    pub dt_valid: bool,
}

impl Solution {
    /// Serializes the current solution to JSON, for consumers that want
    /// a snapshot of the navigation state without linking against the
    /// bus itself (e.g. a logging plugin or a test harness).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Solution {
            x: [0.0; 3],
            x_valid: false,
            x_std: [0.0; 3],
            llh: [0.0; 3],
            llh_valid: false,
            v: [0.0; 3],
            v_valid: false,
            v_std: [0.0; 3],
            q: [1.0, 0.0, 0.0, 0.0],
            q_valid: false,
            l: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            l_valid: false,
            rpy: [0.0; 3],
            rpy_valid: false,
            dt: 0.0,
            dt_valid: false,
        }
    }
}

/// Inertial measurement state, updated once per tick by the sensor
/// reader and consumed by calibration/alignment/attitude/motion stages.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImuState {
    pub t: f64,

    /// angular rate, rad/s (body frame)
    pub w: [f64; 3],
    pub w_valid: bool,

    /// specific force, m/s^2 (body frame)
    pub f: [f64; 3],
    pub f_valid: bool,

    /// gyro temperature per axis, deg C
    pub tw: [f64; 3],
    pub tw_valid: bool,

    /// accelerometer temperature per axis, deg C
    pub tf: [f64; 3],
    pub tf_valid: bool,

    /// transport rate, rad/s (navigation frame)
    pub w_transport: [f64; 3],
    pub w_transport_valid: bool,

    /// gravity vector, m/s^2 (navigation frame)
    pub g: [f64; 3],
    pub g_valid: bool,

    pub sol: Solution,
}

/// Air-data channel: barometric altitude, vertical velocity, airspeed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AirState {
    pub t: f64,
    pub alt: f64,
    pub alt_std: f64,
    pub alt_valid: bool,
    pub vv: f64,
    pub vv_std: f64,
    pub vv_valid: bool,
    pub speed: f64,
    pub speed_std: f64,
    pub speed_valid: bool,
}

/// External reference trajectory (e.g. for scoring), unused by the core
/// algorithms but carried through the bus the way the original does.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RefState {
    pub t: f64,
    pub g: [f64; 3],
    pub g_valid: bool,
    pub sol: Solution,
}
