use crate::NavContext;

/// A single pipeline stage. `init`/`terminate` run exactly once each,
/// at mode `0` and mode `< 0` respectively; `step` runs on whatever
/// cadence its `ScheduledPlugin` entry assigns, with `ctx.mode > 0`.
///
/// `init` is the only phase allowed to fail fatally (bad config, a
/// missing file) — `step`/`terminate` must soft-skip via validity
/// flags instead, matching the bus's error taxonomy.
pub trait Plugin {
    fn init(&mut self, ctx: &mut NavContext) -> crate::error::FsnavResult<()>;
    fn step(&mut self, ctx: &mut NavContext);
    fn terminate(&mut self, ctx: &mut NavContext);
    /// Human-readable name for logging, matching the original's
    /// one-function-per-stage naming (`fsnav_ins_attitude_rodrigues`, …).
    fn name(&self) -> &'static str;
}

/// Cadence + lifecycle state for one registered plugin.
pub struct ScheduledPlugin {
    pub plugin: Box<dyn Plugin>,
    /// run every `cycle` ticks (`cycle == 1` means every tick)
    pub cycle: u32,
    /// phase offset within the cycle
    pub shift: u32,
    /// running tick counter since registration
    pub tick: u32,
    pub suspended: bool,
}

impl ScheduledPlugin {
    pub fn new(plugin: Box<dyn Plugin>, cycle: u32, shift: u32) -> Self {
        ScheduledPlugin {
            plugin,
            cycle: cycle.max(1),
            shift: shift % cycle.max(1),
            tick: 0,
            suspended: false,
        }
    }

    pub fn due(&self) -> bool {
        !self.suspended && self.tick % self.cycle == self.shift
    }
}
