use rollout::{
    ActionSpace, CollectError, CollectOptions, Collector, CollectorOptions, Column, Env, EnvStep,
    Hidden, Info, MemoryBuffer, Policy, PolicyOutput, Record, Value, VectorEnv, VectorStep,
};

// Single environment identical to the sync test double: observations carry
// (slot id, step index).
struct MarkedEnv {
    id: usize,
    len: usize,
    t: usize,
}

impl Env for MarkedEnv {
    fn reset(&mut self, _seed: Option<u64>) -> (Value, Info) {
        self.t = 0;
        (Value::FloatVec(vec![self.id as f32, 0.0]), Info::new())
    }

    fn step(&mut self, _action: &Value) -> EnvStep {
        self.t += 1;
        EnvStep::new(
            Value::FloatVec(vec![self.id as f32, self.t as f32]),
            Value::Float(1.0),
            self.t >= self.len,
            false,
            Info::new(),
        )
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(2)
    }
}

struct InFlight {
    env_id: usize,
    remaining: usize,
    step: EnvStep,
}

// Deterministic asynchronous layer: each slot takes `latency[i]` ticks to
// report back, so the set of finished slots keeps changing and is usually a
// strict subset of the slots most recently stepped.
struct AsyncMarkedVecEnv {
    envs: Vec<MarkedEnv>,
    latency: Vec<usize>,
    in_flight: Vec<InFlight>,
}

impl AsyncMarkedVecEnv {
    fn new(lens: &[usize], latency: &[usize]) -> Self {
        assert_eq!(lens.len(), latency.len());
        let envs = lens
            .iter()
            .enumerate()
            .map(|(id, &len)| MarkedEnv { id, len, t: 0 })
            .collect();
        Self { envs, latency: latency.to_vec(), in_flight: Vec::new() }
    }
}

impl VectorEnv for AsyncMarkedVecEnv {
    fn len(&self) -> usize {
        self.envs.len()
    }

    fn is_async(&self) -> bool {
        true
    }

    fn reset(&mut self, ids: Option<&[usize]>) -> Vec<Value> {
        match ids {
            Some(ids) => ids.iter().map(|&i| self.envs[i].reset(None).0).collect(),
            None => {
                self.in_flight.clear();
                self.envs.iter_mut().map(|e| e.reset(None).0).collect()
            }
        }
    }

    fn step(&mut self, actions: &[Value], ids: Option<&[usize]>) -> Vec<VectorStep> {
        let ids = ids.expect("an asynchronous layer is always stepped with explicit ids");
        assert_eq!(actions.len(), ids.len());
        for (action, &i) in actions.iter().zip(ids) {
            let step = self.envs[i].step(action);
            self.in_flight.push(InFlight { env_id: i, remaining: self.latency[i], step });
        }
        loop {
            for pending in &mut self.in_flight {
                pending.remaining = pending.remaining.saturating_sub(1);
            }
            if self.in_flight.iter().all(|p| p.remaining > 0) {
                continue;
            }
            let mut finished = Vec::new();
            let mut still_pending = Vec::new();
            for pending in self.in_flight.drain(..) {
                if pending.remaining == 0 {
                    finished.push(VectorStep { env_id: pending.env_id, step: pending.step });
                } else {
                    still_pending.push(pending);
                }
            }
            self.in_flight = still_pending;
            return finished;
        }
    }

    fn seed(&mut self, _seed: Option<u64>) {}

    fn action_space(&self, index: usize) -> ActionSpace {
        self.envs[index].action_space()
    }

    fn render(&mut self) {}

    fn close(&mut self) {}
}

struct CountingRecurrent;

impl Policy for CountingRecurrent {
    fn forward(&mut self, batch: &Record, state: Option<&[Hidden]>) -> PolicyOutput {
        let Column::Values(obs) = batch.column("obs") else { panic!("obs missing") };
        let new_state: Vec<Hidden> = obs
            .iter()
            .enumerate()
            .map(|(j, o)| {
                let slot = match o {
                    Value::FloatVec(v) => v[0],
                    _ => panic!("unexpected obs"),
                };
                let prev = match state.and_then(|s| s.get(j)) {
                    Some(Hidden::Vector(v)) => v[0],
                    _ => 0.0,
                };
                Hidden::Vector(vec![prev + 1.0, slot])
            })
            .collect();
        PolicyOutput { act: vec![Value::Int(0); obs.len()], state: Some(new_state), policy: None }
    }
}

fn values<'a>(batch: &'a Record, key: &str) -> &'a [Value] {
    match batch.column(key) {
        Column::Values(v) => v,
        other => panic!("column `{key}` is not materialized: {other:?}"),
    }
}

fn obs_pair(value: &Value) -> (usize, usize) {
    match value {
        Value::FloatVec(v) => (v[0] as usize, v[1] as usize),
        other => panic!("unexpected observation {other:?}"),
    }
}

fn assert_complete_episodes(batch: &Record) -> Vec<(usize, usize)> {
    let obs = values(batch, "obs");
    let obs_next = values(batch, "obs_next");
    let dones = values(batch, "done");
    let mut episodes = Vec::new();
    let mut k = 0;
    while k < obs.len() {
        let (slot, start) = obs_pair(&obs[k]);
        assert_eq!(start, 0, "episode must start at its slot's reset");
        let mut t = 0;
        loop {
            let (s, step_t) = obs_pair(&obs[k]);
            assert_eq!(s, slot, "transition from a different slot inside an episode");
            assert_eq!(step_t, t, "gap inside an episode");
            let (s_next, t_next) = obs_pair(&obs_next[k]);
            assert_eq!((s_next, t_next), (slot, t + 1));
            let done = matches!(dones[k], Value::Bool(true));
            k += 1;
            t += 1;
            if done {
                break;
            }
            assert!(k < obs.len(), "stored episode is missing its terminal step");
        }
        episodes.push((slot, t));
    }
    episodes
}

#[test]
fn async_reordering_keeps_episodes_attached_to_their_slot() {
    let env = AsyncMarkedVecEnv::new(&[3, 4, 5], &[1, 2, 3]);
    let mut collector = Collector::new(
        CountingRecurrent,
        env,
        Some(Box::new(MemoryBuffer::with_seed(0))),
        CollectorOptions::default(),
    );

    let stats = collector.collect(CollectOptions::episodes(6)).unwrap();
    assert!(stats.episodes >= 6);

    let batch = collector.sample(0).unwrap();
    let episodes = assert_complete_episodes(&batch);
    assert_eq!(episodes.len() as u64, stats.episodes);
    // episode lengths always match their slot's fixed horizon
    for &(slot, len) in &episodes {
        assert_eq!(len, [3, 4, 5][slot]);
    }
}

#[test]
fn async_hidden_state_is_keyed_by_global_index() {
    let env = AsyncMarkedVecEnv::new(&[3, 4, 5], &[1, 3, 2]);
    let mut collector = Collector::new(
        CountingRecurrent,
        env,
        Some(Box::new(MemoryBuffer::with_seed(0))),
        CollectorOptions::default(),
    );
    collector.collect(CollectOptions::episodes(6)).unwrap();

    let batch = collector.sample(0).unwrap();
    let obs = values(&batch, "obs");
    let Column::Nested(aux) = batch.column("policy") else { panic!("policy missing") };
    let Column::Hidden(hidden) = aux.column("state") else { panic!("stored state missing") };
    assert_eq!(hidden.len(), obs.len());
    for (o, h) in obs.iter().zip(hidden) {
        let (slot, t) = obs_pair(o);
        // the recurrent counter only matches when every step of the episode
        // saw this slot's own previous state
        assert_eq!(h, &Hidden::Vector(vec![(t + 1) as f32, slot as f32]));
    }
}

#[test]
fn async_step_target_collects_complete_episodes() {
    let env = AsyncMarkedVecEnv::new(&[2, 3], &[1, 2]);
    let mut collector = Collector::new(
        CountingRecurrent,
        env,
        Some(Box::new(MemoryBuffer::with_seed(0))),
        CollectorOptions::default(),
    );
    let stats = collector.collect(CollectOptions::steps(12)).unwrap();
    assert!(stats.steps >= 12);

    let batch = collector.sample(0).unwrap();
    let episodes = assert_complete_episodes(&batch);
    let flushed: usize = episodes.iter().map(|(_, len)| len).sum();
    assert_eq!(flushed as u64, stats.steps);
}

#[test]
fn random_mode_is_rejected_under_async() {
    let env = AsyncMarkedVecEnv::new(&[2, 2], &[1, 1]);
    let mut collector =
        Collector::new(CountingRecurrent, env, None, CollectorOptions::default());
    let err = collector.collect(CollectOptions::episodes(1).random(true)).unwrap_err();
    assert!(matches!(err, CollectError::RandomWithAsync));
}
