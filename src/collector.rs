//! The collection loop.
//!
//! One collector owns one environment layer, one working record, one episode
//! cache per slot and the cumulative counters. A single logical thread drives
//! the loop; the environment layer is where any real parallelism happens.
//! The collector is not reentrant: one in-flight `collect` per instance.

use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use tracing::{trace, warn};

use crate::buffer::ReplayBuffer;
use crate::cache::EpisodeCache;
use crate::core::{CollectError, Result};
use crate::env::{VectorEnv, VectorStep};
use crate::policy::{ActionNoise, Policy, PolicyOutput};
use crate::ready::ReadySet;
use crate::record::{Column, Hidden, Record, Value};
use crate::rng::RngStream;
use crate::stats::{self, CollectStats, RewardMetric};

/// Steps without a single finished episode before the missing-time-limit
/// warning fires.
const STEP_WARN_THRESHOLD: u64 = 100_000;

/// Hook run on the working record before transitions reach the caches, and
/// on fresh observations at environment-reset time (then it only sees
/// `obs`). Returned fields overwrite the working record's.
pub type PreprocessFn = Box<dyn FnMut(&Record) -> Record + Send>;

/// Optional collaborators wired in at construction.
#[derive(Default)]
pub struct CollectorOptions {
    pub preprocess: Option<PreprocessFn>,
    pub action_noise: Option<Box<dyn ActionNoise + Send>>,
    pub reward_metric: Option<RewardMetric>,
    /// Root seed for the collector's own sampling stream and the
    /// environment layer. Unseeded when `None`.
    pub seed: Option<u64>,
}

/// How much to collect in one call. Exactly one target by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectTarget {
    /// Stop once this many steps belong to completed episodes. The episode
    /// in progress is always finished first, so the result may overshoot.
    Step(usize),
    /// Stop once this many episodes completed, summed across all slots.
    Episode(usize),
    /// Stop once slot `i` has completed exactly `targets[i]` episodes.
    /// Episodes finishing in a slot whose target is already met are
    /// discarded, not stored.
    EpisodePerEnv(Vec<usize>),
}

/// Per-call collection parameters.
#[derive(Debug)]
pub struct CollectOptions {
    pub target: CollectTarget,
    /// Sample actions uniformly from each slot's action space instead of
    /// querying the policy. Rejected under an asynchronous layer.
    pub random: bool,
    /// Render after every step, then sleep this long. Purely a side effect.
    pub render: Option<Duration>,
}

impl CollectOptions {
    pub fn steps(n: usize) -> Self {
        Self { target: CollectTarget::Step(n), random: false, render: None }
    }

    pub fn episodes(n: usize) -> Self {
        Self { target: CollectTarget::Episode(n), random: false, render: None }
    }

    pub fn episodes_per_env(targets: Vec<usize>) -> Self {
        Self { target: CollectTarget::EpisodePerEnv(targets), random: false, render: None }
    }

    pub fn random(mut self, random: bool) -> Self {
        self.random = random;
        self
    }

    pub fn render(mut self, delay: Duration) -> Self {
        self.render = Some(delay);
        self
    }
}

/// Drives a policy against a vectorized environment layer and hands
/// complete episodes to the replay buffer.
pub struct Collector<E: VectorEnv, P: Policy> {
    policy: P,
    env: E,
    buffer: Option<Box<dyn ReplayBuffer + Send>>,
    preprocess: Option<PreprocessFn>,
    action_noise: Option<Box<dyn ActionNoise + Send>>,
    reward_metric: Option<RewardMetric>,
    env_num: usize,
    is_async: bool,
    ready: ReadySet,
    caches: Vec<EpisodeCache>,
    data: Record,
    rng: RngStream,
    collect_time: f64,
    collect_step: u64,
    collect_episode: u64,
}

impl<E: VectorEnv, P: Policy> Collector<E, P> {
    /// Build a collector and perform the initial full reset. With no buffer
    /// the collected data is discarded after statistics (evaluation runs).
    pub fn new(
        policy: P,
        mut env: E,
        buffer: Option<Box<dyn ReplayBuffer + Send>>,
        options: CollectorOptions,
    ) -> Self {
        let env_num = env.len();
        let is_async = env.is_async();
        let rng = match options.seed {
            Some(seed) => RngStream::seed_from_u64(seed),
            None => RngStream::from_entropy(),
        };
        if options.seed.is_some() {
            env.seed(options.seed);
        }
        let mut collector = Self {
            policy,
            env,
            buffer,
            preprocess: options.preprocess,
            action_noise: options.action_noise,
            reward_metric: options.reward_metric,
            env_num,
            is_async,
            ready: ReadySet::full(env_num),
            caches: (0..env_num).map(|_| EpisodeCache::new()).collect(),
            data: Record::transition(),
            rng,
            collect_time: 0.0,
            collect_step: 0,
            collect_episode: 0,
        };
        collector.reset();
        collector
    }

    /// Number of environment slots.
    pub fn env_num(&self) -> usize { self.env_num }

    /// Cumulative wall-clock seconds spent collecting.
    pub fn collect_time(&self) -> f64 { self.collect_time }

    /// Cumulative steps collected across calls.
    pub fn collect_step(&self) -> u64 { self.collect_step }

    /// Cumulative episodes collected across calls.
    pub fn collect_episode(&self) -> u64 { self.collect_episode }

    /// The configured buffer, if any.
    pub fn buffer(&self) -> Option<&(dyn ReplayBuffer + Send)> {
        self.buffer.as_deref()
    }

    /// Full reset: working record, environments, caches, buffer, cumulative
    /// counters and noise state.
    pub fn reset(&mut self) {
        self.data = Record::transition();
        self.reset_env();
        self.reset_buffer();
        self.collect_time = 0.0;
        self.collect_step = 0;
        self.collect_episode = 0;
        if let Some(noise) = self.action_noise.as_mut() {
            noise.reset();
        }
    }

    /// Drop everything in the permanent buffer.
    pub fn reset_buffer(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.reset();
        }
    }

    /// Reset every environment slot and clear every episode cache.
    pub fn reset_env(&mut self) {
        self.ready = ReadySet::full(self.env_num);
        let mut obs = self.env.reset(None);
        if let Some(pre) = self.preprocess.as_mut() {
            let mut probe = Record::new();
            probe.set("obs", Column::Values(obs.clone()));
            if let Some(Column::Values(new_obs)) = pre(&probe).get("obs") {
                if new_obs.len() == obs.len() {
                    obs = new_obs.clone();
                }
            }
        }
        self.data.set("obs", Column::Values(obs));
        for cache in &mut self.caches {
            cache.reset();
        }
    }

    /// Re-seed the environment layer and the collector's sampling stream.
    pub fn seed(&mut self, seed: Option<u64>) {
        if let Some(seed) = seed {
            self.rng = RngStream::seed_from_u64(seed);
        }
        self.env.seed(seed);
    }

    /// Render all environments once.
    pub fn render(&mut self) {
        self.env.render();
    }

    /// Close all environments.
    pub fn close(&mut self) {
        self.env.close();
    }

    /// Run the collection loop until the target is met and report
    /// statistics for this call.
    pub fn collect(&mut self, options: CollectOptions) -> Result<CollectStats> {
        let CollectOptions { target, random, render } = options;
        match &target {
            CollectTarget::Step(0) | CollectTarget::Episode(0) => {
                return Err(CollectError::EmptyTarget);
            }
            CollectTarget::EpisodePerEnv(targets) => {
                if targets.len() != self.env_num {
                    return Err(CollectError::TargetLength {
                        got: targets.len(),
                        envs: self.env_num,
                    });
                }
                if targets.iter().all(|&t| t == 0) {
                    return Err(CollectError::EmptyTarget);
                }
            }
            _ => {}
        }
        // Querying action spaces across an asynchronous layer may block
        // indefinitely, so this is rejected up front.
        if random && self.is_async {
            return Err(CollectError::RandomWithAsync);
        }

        let start = Instant::now();
        let mut step_count: u64 = 0;
        let mut raw_step_count: u64 = 0;
        let mut episode_count = vec![0u64; self.env_num];
        let mut reward_total: Option<Value> = None;
        let mut whole = Record::new();
        let mut warned = false;

        loop {
            // 1. Async: park the full-width record, work on the ready subset.
            if self.is_async {
                whole = std::mem::take(&mut self.data);
                self.data = whole.select(self.ready.ids());
            }
            let mut ids = self.ready.ids().to_vec();

            // 2. Previous hidden state, then clear the transient fields.
            let last_state: Option<Vec<Hidden>> = match self.data.get("state") {
                Some(Column::Hidden(h)) if !h.is_empty() => Some(h.clone()),
                _ => None,
            };
            self.data.set("state", Column::Empty);
            self.data.set("obs_next", Column::Empty);
            self.data.set("policy", Column::Empty);

            // 3. Pick actions.
            let mut acts: Vec<Value>;
            if random {
                let env = &self.env;
                let rng = &mut self.rng;
                acts = ids.iter().map(|&i| env.action_space(i).sample(&mut *rng)).collect();
            } else {
                let PolicyOutput { act, state, policy } =
                    self.policy.forward(&self.data, last_state.as_deref());
                acts = act;
                let hidden = state.unwrap_or_default();
                let mut aux = policy.unwrap_or_default();
                if !hidden.is_empty() {
                    self.data.set("state", Column::Hidden(hidden.clone()));
                    // duplicated into the auxiliary record so it survives
                    // the trip into storage
                    aux.set("state", Column::Hidden(hidden));
                }
                if !aux.is_empty() {
                    self.data.set("policy", Column::Nested(aux));
                }
            }
            if let Some(noise) = self.action_noise.as_mut() {
                for act in &mut acts {
                    let sample = noise.sample(act.numel());
                    act.add_noise(&sample);
                }
            }
            self.data.set("act", Column::Values(acts.clone()));

            // 4. Step the environment layer.
            let steps: Vec<VectorStep> = if self.is_async {
                // park computed actions and state before waiting, because
                // the slots that report back may be different ones
                self.data.scatter_into(&mut whole, &ids, self.env_num)?;
                let steps = self.env.step(&acts, Some(&ids));
                let finished: Vec<usize> = steps.iter().map(|s| s.env_id).collect();
                self.ready.replace(finished);
                ids = self.ready.ids().to_vec();
                self.data = whole.select(&ids);
                steps
            } else {
                self.env.step(&acts, None)
            };
            debug_assert_eq!(steps.len(), ids.len());

            // 5. Merge step results into the working record.
            let mut obs_next = Vec::with_capacity(steps.len());
            let mut rews = Vec::with_capacity(steps.len());
            let mut dones = Vec::with_capacity(steps.len());
            let mut infos = Vec::with_capacity(steps.len());
            for vs in steps {
                dones.push(vs.step.done());
                obs_next.push(vs.step.obs);
                rews.push(vs.step.reward);
                infos.push(vs.step.info);
            }
            self.data.set("obs_next", Column::Values(obs_next));
            self.data.set("rew", Column::Values(rews));
            self.data.set("done", Column::bools(dones));
            self.data.set("info", Column::Infos(infos));

            // 6. Render side effect.
            if let Some(delay) = render {
                self.env.render();
                thread::sleep(delay);
            }

            // 7. Preprocess hook, overwriting returned fields.
            if let Some(pre) = self.preprocess.as_mut() {
                let patch = pre(&self.data);
                self.data.merge(patch);
            }

            // 8. Per-environment bookkeeping. The hook may have rewritten
            // `done`, so flags are read back from the record.
            let done_flags: Vec<bool> = match self.data.get("done") {
                Some(Column::Values(v)) => {
                    v.iter().map(|x| matches!(x, Value::Bool(true))).collect()
                }
                _ => vec![false; ids.len()],
            };
            for (j, i) in self.ready.iter() {
                self.caches[i].add(self.data.row(j));
                raw_step_count += 1;
                if !done_flags[j] {
                    continue;
                }
                let counted = match &target {
                    CollectTarget::Step(_) | CollectTarget::Episode(_) => true,
                    CollectTarget::EpisodePerEnv(targets) => {
                        episode_count[i] < targets[i] as u64
                    }
                };
                if counted {
                    episode_count[i] += 1;
                    if let Some(episode_reward) = self.caches[i].total_reward()? {
                        match &mut reward_total {
                            None => reward_total = Some(episode_reward),
                            Some(total) => total.add_assign(&episode_reward).map_err(
                                |(expected, found)| crate::core::RecordError::KindMismatch {
                                    key: "rew".into(),
                                    expected,
                                    found,
                                },
                            )?,
                        }
                    }
                    step_count += self.caches[i].len() as u64;
                    if let Some(buffer) = self.buffer.as_mut() {
                        buffer.extend(&self.caches[i]);
                        trace!(env = i, len = self.caches[i].len(), "episode flushed");
                    }
                }
                // uncounted terminal episodes are discarded, not stored
                self.caches[i].reset();
                if let Some(Column::Hidden(h)) = self.data.get_mut("state") {
                    h[j].reset();
                }
            }

            // 9. Auto-reset finished slots; their fresh observation becomes
            // `obs_next`, then `obs_next` becomes the next `obs` everywhere.
            let finished_local: Vec<usize> = done_flags
                .iter()
                .enumerate()
                .filter_map(|(j, &d)| d.then_some(j))
                .collect();
            if !finished_local.is_empty() {
                let global: Vec<usize> = finished_local.iter().map(|&j| ids[j]).collect();
                let mut obs_reset = self.env.reset(Some(&global));
                if let Some(pre) = self.preprocess.as_mut() {
                    let mut probe = Record::new();
                    probe.set("obs", Column::Values(obs_reset.clone()));
                    if let Some(Column::Values(new_obs)) = pre(&probe).get("obs") {
                        if new_obs.len() == obs_reset.len() {
                            obs_reset = new_obs.clone();
                        }
                    }
                }
                if let Some(Column::Values(obs_next)) = self.data.get_mut("obs_next") {
                    for (&j, obs) in finished_local.iter().zip(obs_reset) {
                        obs_next[j] = obs;
                    }
                }
            }
            let next_obs = self.data.column("obs_next").clone();
            self.data.set("obs", next_obs);

            // 10. Async: write the subset back at its global indices.
            if self.is_async {
                self.data.scatter_into(&mut whole, &ids, self.env_num)?;
                self.data = std::mem::take(&mut whole);
            }

            // 11. Runaway-episode diagnostic. Non-fatal.
            if !warned
                && raw_step_count >= STEP_WARN_THRESHOLD
                && episode_count.iter().all(|&c| c == 0)
            {
                warn!(
                    steps = raw_step_count,
                    "no episode has finished yet; the environment may be missing a time limit"
                );
                warned = true;
            }

            // 12. Termination test.
            let finished = match &target {
                CollectTarget::Step(n) => step_count >= *n as u64,
                CollectTarget::Episode(n) => {
                    episode_count.iter().sum::<u64>() >= *n as u64
                }
                CollectTarget::EpisodePerEnv(targets) => episode_count
                    .iter()
                    .zip(targets)
                    .all(|(&count, &t)| count >= t as u64),
            };
            if finished {
                break;
            }
        }

        let duration = start.elapsed().as_secs_f64().max(stats::MIN_DURATION);
        let episodes: u64 = episode_count.iter().sum();
        self.collect_step += step_count;
        self.collect_episode += episodes;
        self.collect_time += duration;
        stats::finalize(
            step_count,
            episodes,
            reward_total.as_ref(),
            duration,
            self.reward_metric.as_ref(),
        )
    }

    /// Draw a batch from the permanent buffer (the entire contents when
    /// `batch_size` is zero) and run it through the policy's
    /// post-processing transform. No environment interaction happens here.
    pub fn sample(&mut self, batch_size: usize) -> Result<Record> {
        let buffer = self.buffer.as_mut().ok_or(CollectError::NoBuffer)?;
        let (batch, indices) = buffer.sample(batch_size);
        Ok(self.policy.process_fn(batch, &**buffer, &indices))
    }
}
