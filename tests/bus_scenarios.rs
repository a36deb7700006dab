use fsnav_core::plugins::attitude::AttitudeRodrigues;
use fsnav_core::plugins::gravity::GravityConstant;
use fsnav_core::plugins::motion::MotionEuler;
use fsnav_core::Bus;

/// A stationary platform under constant-gravity alignment should end up
/// with near-zero velocity and an unchanged horizontal position after a
/// short run, since there is no commanded rate and the only specific
/// force is gravity cancellation.
#[test]
fn stationary_platform_stays_near_initial_position() {
    let cfg = "{imu: alignment = 0.2 lon = 10 lat = 45 alt = 100}".to_string();
    let mut bus = Bus::new(cfg);
    bus.add_plugin(Box::new(GravityConstant::new()), 1, 0).unwrap();
    bus.add_plugin(Box::new(AttitudeRodrigues::new()), 1, 0).unwrap();
    bus.add_plugin(Box::new(MotionEuler::new()), 1, 0).unwrap();
    bus.init().unwrap();

    let dt = 0.01;
    for i in 0..200 {
        let ctx = bus.ctx_mut();
        ctx.imu.t = i as f64 * dt;
        ctx.imu.w = [0.0, 0.0, 0.0];
        ctx.imu.w_valid = true;
        // specific force exactly cancels the frozen gravity estimate
        // once alignment has converged; close enough for g ~ 9.8
        ctx.imu.f = [0.0, 0.0, 9.8];
        ctx.imu.f_valid = true;
        bus.step();
    }

    let sol = &bus.ctx().imu.sol;
    assert!(sol.v_valid);
    assert!(sol.v[0].abs() < 0.5);
    assert!(sol.v[1].abs() < 0.5);
}

/// The scheduler must invoke a plugin registered with `(cycle, shift)`
/// exactly `floor((steps - shift + cycle - 1) / cycle)`-ish times; this
/// checks the simple case where shift is zero and cycle divides evenly.
#[test]
fn plugin_cadence_divides_step_count_evenly() {
    use fsnav_core::bus::{NavContext, Plugin};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Counter(Rc<RefCell<u32>>);
    impl Plugin for Counter {
        fn init(&mut self, _ctx: &mut NavContext) -> fsnav_core::FsnavResult<()> {
            Ok(())
        }
        fn step(&mut self, _ctx: &mut NavContext) {
            *self.0.borrow_mut() += 1;
        }
        fn terminate(&mut self, _ctx: &mut NavContext) {}
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    let mut bus = Bus::new(String::new());
    let hits = Rc::new(RefCell::new(0u32));
    bus.add_plugin(Box::new(Counter(hits.clone())), 5, 0).unwrap();
    bus.init().unwrap();
    for _ in 0..20 {
        bus.step();
    }
    // due is checked against tick before it increments: tick 0 is due
    // (0 % 5 == 0), then every 5th tick thereafter across 20 steps ->
    // ticks 0,5,10,15 are due -> 4 hits.
    assert_eq!(*hits.borrow(), 4);
    assert_eq!(bus.ctx().step_count, 20);
}

/// End of input stream (a plugin setting `mode < 0`) must stop the
/// step loop on the same tick without running further ticks.
#[test]
fn negative_mode_terminates_step_loop() {
    use fsnav_core::bus::{NavContext, Plugin};

    struct StopAtThree;
    impl Plugin for StopAtThree {
        fn init(&mut self, _ctx: &mut NavContext) -> fsnav_core::FsnavResult<()> {
            Ok(())
        }
        fn step(&mut self, ctx: &mut NavContext) {
            if ctx.step_count >= 3 {
                ctx.mode = -1;
            }
        }
        fn terminate(&mut self, _ctx: &mut NavContext) {}
        fn name(&self) -> &'static str {
            "stop_at_three"
        }
    }

    let mut bus = Bus::new(String::new());
    bus.add_plugin(Box::new(StopAtThree), 1, 0).unwrap();
    bus.init().unwrap();
    let mut ticks = 0;
    while bus.step() {
        ticks += 1;
    }
    assert_eq!(ticks, 2);
    assert_eq!(bus.ctx().step_count, 3);
    bus.terminate();
}
