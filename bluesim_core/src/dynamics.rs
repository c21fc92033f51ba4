//! The "DYNAMICS" Engine - BlueBot rigid-body integrator
//!
//! Advances one fish by one control interval. Fin thrust, hydrodynamic drag
//! and static buoyancy are resolved in the body frame, integrated with
//! explicit Euler sub-steps, and the body velocity is rotated back into the
//! global frame after every sub-step.

use bluesim_env::{EnvError, Environment, FishId, Kinematics};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MM_TO_M: f64 = 1.0 / 1000.0;
const M_TO_MM: f64 = 1000.0;

/// Fin gains in [-1, 1]. Clamping is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FinControl {
    pub dorsal: f64,
    pub caudal: f64,
    pub pect_r: f64,
    pub pect_l: f64,
}

impl FinControl {
    pub fn new(dorsal: f64, caudal: f64, pect_r: f64, pect_l: f64) -> Self {
        Self {
            dorsal,
            caudal,
            pect_r,
            pect_l,
        }
    }
}

/// Fin forces in newtons.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thrust {
    pub caudal: f64,
    pub pect_r: f64,
    pub pect_l: f64,
    pub dorsal: f64,
}

/// Robot and integration parameters.
///
/// Defaults describe the BlueBot: 150 mm long including fins, 0.5 kg
/// including added mass, integrated at 0.1 s sub-steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Euler sub-step (s)
    pub deltat: f64,
    /// Control frequency (Hz); one control interval is `1 / clock_freq`
    pub clock_freq: f64,

    /// Water density (kg/m^3)
    pub rho: f64,
    /// Length including fin (m)
    pub l_robot: f64,
    /// Width (m)
    pub w_robot: f64,
    /// Height (m)
    pub h_robot: f64,
    /// Mass including added mass (kg)
    pub m_robot: f64,

    pub c_dx_fwd: f64,
    pub c_dx_bwd: f64,
    pub c_dy_static: f64,
    pub c_dz: f64,
    pub c_dphi_static: f64,

    /// Lever arm of the pectoral fins (m)
    pub pect_dist: f64,
    /// Pectoral fin angle (rad)
    pub pect_angle: f64,
    /// Static buoyancy offset (N), acts on the vertical axis only
    pub f_buoy: f64,
    /// Maximum forward speed (m/s)
    pub vx_max: f64,

    pub f_caud_max: f64,
    pub f_pect_max: f64,
    pub f_dors_max: f64,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            deltat: 0.1,
            clock_freq: 1.0,
            rho: 998.0,
            l_robot: 0.150,
            w_robot: 0.050,
            h_robot: 0.080,
            m_robot: 2.0 * 0.25,
            c_dx_fwd: 0.5,
            c_dx_bwd: 1.0,
            c_dy_static: 2.1,
            c_dz: 0.7,
            c_dphi_static: 1.0,
            pect_dist: 0.055,
            pect_angle: PI / 6.0,
            f_buoy: 0.010,
            vx_max: 0.160,
            f_caud_max: 0.020,
            f_pect_max: 0.006,
            f_dors_max: 0.020,
        }
    }
}

impl DynamicsConfig {
    /// Rejects parameters that would make the integration meaningless.
    pub fn validate(&self) -> Result<(), EnvError> {
        let positive = [
            ("deltat", self.deltat),
            ("clock_freq", self.clock_freq),
            ("rho", self.rho),
            ("m_robot", self.m_robot),
            ("vx_max", self.vx_max),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EnvError::config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.substeps() == 0 {
            return Err(EnvError::config(format!(
                "deltat {} exceeds the control interval {}",
                self.deltat,
                self.interval()
            )));
        }
        Ok(())
    }

    /// Frontal area (m^2)
    pub fn a_x(&self) -> f64 {
        PI / 4.0 * self.h_robot * self.w_robot
    }

    /// Lateral area including fins (m^2)
    pub fn a_y(&self) -> f64 {
        PI / 4.0 * self.l_robot * self.h_robot + 2.0 * 0.00075
    }

    /// Top area (m^2)
    pub fn a_z(&self) -> f64 {
        PI / 4.0 * self.l_robot * self.w_robot
    }

    /// Moment of inertia about the vertical axis (kg*m^2)
    pub fn inertia(&self) -> f64 {
        self.m_robot / 5.0 * 0.25 * (self.l_robot.powi(2) + self.h_robot.powi(2))
    }

    /// Length of one control interval (s)
    pub fn interval(&self) -> f64 {
        1.0 / self.clock_freq
    }

    /// Sub-steps per control interval.
    pub fn substeps(&self) -> usize {
        (self.interval() / self.deltat).round() as usize
    }

    /// Scales fin gains to forces.
    pub fn thrust(&self, control: &FinControl) -> Thrust {
        Thrust {
            caudal: control.caudal * self.f_caud_max,
            pect_r: control.pect_r * self.f_pect_max,
            pect_l: control.pect_l * self.f_pect_max,
            dorsal: control.dorsal * self.f_dors_max,
        }
    }
}

/// Body-frame state carried between sub-steps.
#[derive(Debug, Clone, Copy)]
struct BodyState {
    /// [vx, vy, vz] in m/s, body frame
    velocity: Vector3<f64>,
    phi: f64,
    vphi: f64,
}

/// Euler integrator for the fish equations of motion.
#[derive(Debug, Clone)]
pub struct Dynamics {
    config: DynamicsConfig,
}

impl Dynamics {
    pub fn new(config: DynamicsConfig) -> Result<Self, EnvError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// Advances a fish stored in `env` by one control interval.
    ///
    /// The new position, velocity, heading and angular velocity are written
    /// back together; the new global position (mm) is returned.
    pub fn advance<E: Environment + ?Sized>(
        &self,
        env: &E,
        id: FishId,
        control: &FinControl,
    ) -> Result<Vector3<f64>, EnvError> {
        let state = env.kinematics(id)?;
        let next = self.step(&state, control);
        env.set_kinematics(id, next)?;
        Ok(next.position)
    }

    /// Integrates one control interval starting from `state`.
    pub fn step(&self, state: &Kinematics, control: &FinControl) -> Kinematics {
        let thrust = self.config.thrust(control);

        let g_velocity = state.velocity * MM_TO_M;
        let r_t_g = Rotation3::from_axis_angle(&Vector3::z_axis(), -state.phi);
        let mut body = BodyState {
            velocity: r_t_g * g_velocity,
            phi: state.phi,
            vphi: state.vphi,
        };

        let dt = self.config.deltat;
        let mut displacement = Vector3::zeros();
        let mut g_velocity_out = g_velocity;

        for _ in 0..self.config.substeps() {
            g_velocity_out = self.substep(&mut body, &thrust);
            displacement += dt * g_velocity_out;
        }

        Kinematics {
            position: state.position + displacement * M_TO_MM,
            velocity: g_velocity_out * M_TO_MM,
            phi: body.phi,
            vphi: body.vphi,
        }
    }

    /// One Euler sub-step. Returns the new velocity in the global frame (m/s).
    fn substep(&self, body: &mut BodyState, thrust: &Thrust) -> Vector3<f64> {
        let c = &self.config;
        let dt = c.deltat;

        let x_dot = body.velocity.x;
        let y_dot = body.velocity.y;
        let z_dot = body.velocity.z;
        let phi_dot = body.vphi;

        // Drag grows with forward speed
        let c_dphi = c.c_dphi_static + c.c_dphi_static * 9.0 * x_dot.abs() / c.vx_max;
        let c_dy = c.c_dy_static + c.c_dy_static * 4.0 * x_dot.abs() / c.vx_max;
        let c_dx = if x_dot > 0.0 { c.c_dx_fwd } else { c.c_dx_bwd };

        let (sin_p, cos_p) = c.pect_angle.sin_cos();
        let half_rho = 0.5 * c.rho;

        let vx_dot = (thrust.caudal - sin_p * thrust.pect_l - sin_p * thrust.pect_r
            - half_rho * c_dx * c.a_x() * signed_square(x_dot))
            / c.m_robot;
        let vy_dot = (cos_p * thrust.pect_l - cos_p * thrust.pect_r
            - half_rho * c_dy * c.a_y() * signed_square(y_dot))
            / c.m_robot;
        let vz_dot = (thrust.dorsal - c.f_buoy - half_rho * c.c_dz * c.a_z() * signed_square(z_dot))
            / c.m_robot;
        let vphi_dot = (c.pect_dist * cos_p * thrust.pect_l
            - c.pect_dist * cos_p * thrust.pect_r
            - half_rho * c_dphi * c.a_y() * signed_square(c.l_robot / 6.0 * phi_dot))
            / c.inertia();

        body.velocity = Vector3::new(x_dot + dt * vx_dot, y_dot + dt * vy_dot, z_dot + dt * vz_dot);
        body.phi += dt * phi_dot;
        body.vphi = phi_dot + dt * vphi_dot;

        Rotation3::from_axis_angle(&Vector3::z_axis(), body.phi) * body.velocity
    }
}

/// `sign(v) * v^2`
fn signed_square(v: f64) -> f64 {
    v * v.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dynamics() -> Dynamics {
        Dynamics::new(DynamicsConfig::default()).unwrap()
    }

    #[test]
    fn test_substep_count() {
        let config = DynamicsConfig::default();
        assert_eq!(config.substeps(), 10);

        let fast = DynamicsConfig {
            clock_freq: 2.0,
            ..Default::default()
        };
        assert_eq!(fast.substeps(), 5);
    }

    #[test]
    fn test_thrust_scaling() {
        let config = DynamicsConfig::default();
        let thrust = config.thrust(&FinControl::new(-1.0, 1.0, 0.5, 0.0));
        assert_relative_eq!(thrust.dorsal, -0.020);
        assert_relative_eq!(thrust.caudal, 0.020);
        assert_relative_eq!(thrust.pect_r, 0.003);
        assert_relative_eq!(thrust.pect_l, 0.0);
    }

    #[test]
    fn test_idle_fish_only_sinks() {
        let engine = dynamics();
        let c = engine.config().clone();
        let start = Kinematics::default();

        let mut state = start;
        for _ in 0..5 {
            state = engine.step(&state, &FinControl::default());

            assert_eq!(state.position.x, 0.0);
            assert_eq!(state.position.y, 0.0);
            assert_eq!(state.phi, 0.0);
            assert_eq!(state.vphi, 0.0);
        }

        // Buoyancy offset pulls the fish down, bounded by terminal velocity
        let v_terminal = (2.0 * c.f_buoy / (c.rho * c.c_dz * c.a_z())).sqrt();
        let bound = v_terminal * 5.0 * c.interval() * M_TO_MM;
        assert!(state.position.z < 0.0);
        assert!(state.position.z.abs() <= bound);
        assert!(state.velocity.z < 0.0);
    }

    #[test]
    fn test_idle_step_is_deterministic() {
        let engine = dynamics();
        let start = Kinematics::at_rest(Vector3::new(10.0, -5.0, 200.0), 0.3);
        let a = engine.step(&start, &FinControl::default());
        let b = engine.step(&start, &FinControl::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_caudal_thrust_accelerates_forward() {
        let engine = dynamics();
        let c = engine.config().clone();
        let thrust = c.thrust(&FinControl::new(0.0, 1.0, 0.0, 0.0));

        let mut body = BodyState {
            velocity: Vector3::zeros(),
            phi: 0.0,
            vphi: 0.0,
        };
        let mut last_vx = 0.0;
        for _ in 0..c.substeps() {
            engine.substep(&mut body, &thrust);
            assert!(body.velocity.x > last_vx);
            last_vx = body.velocity.x;
        }

        let next = engine.step(&Kinematics::default(), &FinControl::new(0.0, 1.0, 0.0, 0.0));
        assert!(next.position.x > 0.0);
        assert!(next.position.x < c.vx_max * c.interval() * M_TO_MM);
        assert_relative_eq!(next.position.y, 0.0);
        assert_relative_eq!(next.velocity.x, last_vx * M_TO_MM, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_rotates_motion() {
        let engine = dynamics();
        let facing_y = Kinematics::at_rest(Vector3::zeros(), PI / 2.0);
        let next = engine.step(&facing_y, &FinControl::new(0.0, 1.0, 0.0, 0.0));

        assert!(next.position.y > 0.0);
        assert_relative_eq!(next.position.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_right_pectoral_yaws_clockwise() {
        let engine = dynamics();
        let next = engine.step(&Kinematics::default(), &FinControl::new(0.0, 0.0, 1.0, 0.0));

        // Right pectoral alone yaws clockwise
        assert!(next.vphi < 0.0);
        assert!(next.phi < 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DynamicsConfig {
            deltat: 0.0,
            ..Default::default()
        };
        assert!(matches!(Dynamics::new(config), Err(EnvError::InvalidConfig(_))));

        // Sub-step longer than the control interval
        let config = DynamicsConfig {
            clock_freq: 50.0,
            ..Default::default()
        };
        assert!(matches!(Dynamics::new(config), Err(EnvError::InvalidConfig(_))));
    }
}
